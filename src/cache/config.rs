//! Client construction and validation.
//!
//! A [`Client`] is assembled with [`ClientBuilder`] and validated once in
//! [`ClientBuilder::build`]; nothing about it changes afterwards. Settings that
//! come from a configuration file can be loaded into [`CacheSettings`] and
//! applied with [`ClientBuilder::settings`]. The storage adapter always comes
//! from code.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use super::{Adapter, Client, Clock, SystemClock};

/// Longest TTL [`ClientBuilder::build`] accepts: one hundred 365-day years.
pub const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Errors raised while building a [`Client`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cache client adapter is not set")]
    MissingAdapter,

    #[error("cache client ttl is not set")]
    MissingTtl,

    #[error(
        "cache client ttl {0:?} is invalid, it must be greater than zero and at most {max:?}",
        max = MAX_TTL
    )]
    InvalidTtl(Duration),

    #[error("invalid cache settings: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Serializable subset of the client configuration.
///
/// # Examples
///
/// ```
/// use rttp_cache::cache::CacheSettings;
///
/// let settings = CacheSettings::from_json(r#"{ "ttl_secs": 30, "refresh_key": "refresh" }"#).unwrap();
/// assert_eq!(settings.ttl_secs, 30);
/// assert_eq!(settings.refresh_key.as_deref(), Some("refresh"));
/// assert!(!settings.debug);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSettings {
    /// Lifetime of a stored response in seconds.
    pub ttl_secs: u64,
    /// Query parameter that forces a refresh when present.
    pub refresh_key: Option<String>,
    /// Emit per-request lifecycle events at `debug` level.
    pub debug: bool,
}

impl CacheSettings {
    /// Parses settings from a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Builder for [`Client`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use rttp_cache::cache::{Client, ConfigError};
///
/// let err = Client::builder().ttl(Duration::from_secs(60)).build().unwrap_err();
/// assert!(matches!(err, ConfigError::MissingAdapter));
/// ```
#[derive(Default)]
#[must_use]
pub struct ClientBuilder {
    adapter: Option<Arc<dyn Adapter>>,
    ttl: Option<Duration>,
    refresh_key: Option<String>,
    debug: bool,
    clock: Option<Arc<dyn Clock>>,
}

impl ClientBuilder {
    /// Creates a builder with nothing set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the storage adapter. Required.
    pub fn adapter(mut self, adapter: Arc<dyn Adapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    /// Sets how long each response stays fresh. Required, must be non-zero
    /// and at most [`MAX_TTL`].
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Sets the query parameter whose presence forces a refresh. An empty name
    /// disables forced refresh.
    pub fn refresh_key(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.refresh_key = (!name.is_empty()).then_some(name);
        self
    }

    /// Turns per-request lifecycle logging on or off.
    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    /// Replaces the system clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Applies loaded settings. A zero `ttl_secs` leaves the TTL unset.
    pub fn settings(mut self, settings: CacheSettings) -> Self {
        if settings.ttl_secs > 0 {
            self.ttl = Some(Duration::from_secs(settings.ttl_secs));
        }
        if let Some(name) = settings.refresh_key {
            self = self.refresh_key(name);
        }
        self.debug(settings.debug)
    }

    /// Validates the configuration and builds the client.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MissingAdapter`] when no adapter was given.
    /// - [`ConfigError::MissingTtl`] when no TTL was given.
    /// - [`ConfigError::InvalidTtl`] when the TTL is zero, above [`MAX_TTL`],
    ///   or cannot be added to the clock's current time.
    pub fn build(self) -> Result<Client, ConfigError> {
        let adapter = self.adapter.ok_or(ConfigError::MissingAdapter)?;
        let ttl = self.ttl.ok_or(ConfigError::MissingTtl)?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        if ttl.is_zero() || ttl > MAX_TTL || clock.now().checked_add(ttl).is_none() {
            return Err(ConfigError::InvalidTtl(ttl));
        }

        Ok(Client::from_parts(
            adapter,
            ttl,
            self.refresh_key,
            self.debug,
            clock,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::testing::MemoryAdapter;

    fn adapter() -> Arc<dyn Adapter> {
        Arc::new(MemoryAdapter::default())
    }

    #[test]
    fn nothing_set_is_rejected() {
        assert!(matches!(
            ClientBuilder::new().build(),
            Err(ConfigError::MissingAdapter)
        ));
    }

    #[test]
    fn missing_ttl_is_rejected() {
        assert!(matches!(
            ClientBuilder::new().adapter(adapter()).build(),
            Err(ConfigError::MissingTtl)
        ));
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let err = ClientBuilder::new()
            .adapter(adapter())
            .ttl(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTtl(ttl) if ttl.is_zero()));
        assert!(err.to_string().contains("greater than zero"));
    }

    #[test]
    fn ttl_above_cap_is_rejected() {
        for ttl in [MAX_TTL + Duration::from_nanos(1), Duration::MAX] {
            let err = ClientBuilder::new()
                .adapter(adapter())
                .ttl(ttl)
                .build()
                .unwrap_err();
            assert!(matches!(err, ConfigError::InvalidTtl(rejected) if rejected == ttl));
        }
    }

    #[test]
    fn ttl_at_cap_builds() {
        let client = ClientBuilder::new()
            .adapter(adapter())
            .ttl(MAX_TTL)
            .build()
            .unwrap();
        assert_eq!(client.ttl(), MAX_TTL);
    }

    #[test]
    fn largest_json_ttl_is_rejected() {
        let settings = CacheSettings::from_json(r#"{"ttl_secs": 18446744073709551615}"#).unwrap();
        assert_eq!(settings.ttl_secs, u64::MAX);
        assert!(matches!(
            ClientBuilder::new().adapter(adapter()).settings(settings).build(),
            Err(ConfigError::InvalidTtl(_))
        ));
    }

    #[test]
    fn valid_configuration_builds() {
        let client = ClientBuilder::new()
            .adapter(adapter())
            .ttl(Duration::from_secs(60))
            .refresh_key("refresh")
            .debug(true)
            .build()
            .unwrap();
        assert_eq!(client.ttl(), Duration::from_secs(60));
        assert_eq!(client.refresh_key(), Some("refresh"));
        assert!(client.debug_enabled());
    }

    #[test]
    fn empty_refresh_key_disables_refresh() {
        let client = ClientBuilder::new()
            .adapter(adapter())
            .ttl(Duration::from_secs(1))
            .refresh_key("")
            .build()
            .unwrap();
        assert_eq!(client.refresh_key(), None);
        assert!(!client.debug_enabled());
    }

    #[test]
    fn settings_from_json() {
        let settings =
            CacheSettings::from_json(r#"{"ttl_secs": 90, "refresh_key": "fresh", "debug": true}"#)
                .unwrap();
        let client = ClientBuilder::new()
            .adapter(adapter())
            .settings(settings)
            .build()
            .unwrap();
        assert_eq!(client.ttl(), Duration::from_secs(90));
        assert_eq!(client.refresh_key(), Some("fresh"));
        assert!(client.debug_enabled());
    }

    #[test]
    fn settings_without_ttl_fail_validation() {
        let settings = CacheSettings::from_json("{}").unwrap();
        assert_eq!(settings, CacheSettings::default());
        assert!(matches!(
            ClientBuilder::new().adapter(adapter()).settings(settings).build(),
            Err(ConfigError::MissingTtl)
        ));
    }

    #[test]
    fn malformed_settings_rejected() {
        assert!(matches!(
            CacheSettings::from_json(r#"{"ttl": 5}"#),
            Err(ConfigError::Parse(_))
        ));
    }
}
