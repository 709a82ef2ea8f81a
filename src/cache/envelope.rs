//! The stored form of a cached response.
//!
//! Adapters only see opaque bytes, so an [`Envelope`] is written with an
//! explicit, versioned binary layout. All integers are big-endian.
//!
//! ```text
//! u8   version (= 1)
//! u32  body length, body bytes
//! u32  header count
//!      per header: u32 name length, name (UTF-8)
//!                  u32 value count, per value: u32 length, value (UTF-8)
//! i64  expiration seconds since the UNIX epoch, u32 nanoseconds
//! i64  last access seconds since the UNIX epoch, u32 nanoseconds
//! u64  frequency
//! ```

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::{Buf, BufMut};
use thiserror::Error;

use crate::http::{Headers, Response, StatusCode};

/// Current layout version written by [`Envelope::encode`].
pub const FORMAT_VERSION: u8 = 1;

const NANOS_PER_SEC: u32 = 1_000_000_000;

/// Errors produced while decoding stored bytes into an [`Envelope`].
///
/// The middleware treats every variant as a cache miss.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unsupported envelope version {0}")]
    UnsupportedVersion(u8),

    #[error("envelope truncated while reading {field}")]
    Truncated { field: &'static str },

    #[error("envelope {field} is not valid UTF-8")]
    InvalidUtf8 { field: &'static str },

    #[error("envelope {field} has out-of-range nanoseconds {nanos}")]
    InvalidTimestamp { field: &'static str, nanos: u32 },

    #[error("{0} unexpected trailing bytes after envelope")]
    TrailingBytes(usize),
}

/// Errors produced while encoding an [`Envelope`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("envelope {field} length {len} does not fit a u32 length prefix")]
    TooLong { field: &'static str, len: usize },
}

/// A cached response together with the bookkeeping adapters use for eviction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Response body.
    pub value: Vec<u8>,
    /// Response headers, one entry per name with its values in order.
    pub headers: Vec<(String, Vec<String>)>,
    /// The entry is stale from this instant on.
    pub expiration: SystemTime,
    /// When the entry was stored or last served.
    pub last_access: SystemTime,
    /// Number of times the entry has been stored or served, starting at 1.
    pub frequency: u64,
}

impl Envelope {
    /// Builds the envelope for a response captured at `stored_at`.
    ///
    /// Callers compute `expiration` themselves, typically with
    /// [`SystemTime::checked_add`], so an out-of-range TTL is handled before
    /// anything is built.
    pub fn new(
        value: Vec<u8>,
        headers: &Headers,
        stored_at: SystemTime,
        expiration: SystemTime,
    ) -> Self {
        Self {
            value,
            headers: headers.grouped(),
            expiration,
            last_access: stored_at,
            frequency: 1,
        }
    }

    /// Returns `true` while `now` is strictly before the expiration.
    pub fn is_fresh_at(&self, now: SystemTime) -> bool {
        self.expiration > now
    }

    /// Records a hit served at `now`.
    pub fn touch(&mut self, now: SystemTime) {
        self.last_access = now;
        self.frequency = self.frequency.saturating_add(1);
    }

    /// Builds the `200 OK` response served on a cache hit.
    pub fn to_response(&self) -> Response {
        render(StatusCode::Ok, &self.headers, self.value.clone())
    }

    /// Serializes the envelope.
    ///
    /// # Errors
    ///
    /// [`EncodeError::TooLong`] when a body, header name, value or count does
    /// not fit its `u32` length prefix.
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let header_len: usize = self
            .headers
            .iter()
            .map(|(name, values)| {
                8 + name.len() + values.iter().map(|v| 4 + v.len()).sum::<usize>()
            })
            .sum();
        let mut buf = Vec::with_capacity(1 + 4 + self.value.len() + 4 + header_len + 2 * 12 + 8);

        buf.put_u8(FORMAT_VERSION);
        put_bytes(&mut buf, &self.value, "value")?;

        put_len(&mut buf, self.headers.len(), "header count")?;
        for (name, values) in &self.headers {
            put_bytes(&mut buf, name.as_bytes(), "header name")?;
            put_len(&mut buf, values.len(), "header value count")?;
            for value in values {
                put_bytes(&mut buf, value.as_bytes(), "header value")?;
            }
        }

        put_time(&mut buf, self.expiration);
        put_time(&mut buf, self.last_access);
        buf.put_u64(self.frequency);
        Ok(buf)
    }

    /// Parses bytes produced by [`encode`](Self::encode).
    ///
    /// # Errors
    ///
    /// Any [`DecodeError`] when the input is not a complete version-1 envelope.
    pub fn decode(mut buf: &[u8]) -> Result<Self, DecodeError> {
        let version = get_u8(&mut buf, "version")?;
        if version != FORMAT_VERSION {
            return Err(DecodeError::UnsupportedVersion(version));
        }

        let value = get_bytes(&mut buf, "value")?.to_vec();

        let count = get_u32(&mut buf, "header count")?;
        let mut headers = Vec::new();
        for _ in 0..count {
            let name = get_string(&mut buf, "header name")?;
            let value_count = get_u32(&mut buf, "header value count")?;
            let mut values = Vec::new();
            for _ in 0..value_count {
                values.push(get_string(&mut buf, "header value")?);
            }
            headers.push((name, values));
        }

        let expiration = get_time(&mut buf, "expiration")?;
        let last_access = get_time(&mut buf, "last access")?;
        let frequency = get_u64(&mut buf, "frequency")?;

        if buf.has_remaining() {
            return Err(DecodeError::TrailingBytes(buf.remaining()));
        }

        Ok(Self {
            value,
            headers,
            expiration,
            last_access,
            frequency,
        })
    }
}

/// Builds a response whose multi-valued headers are folded into one
/// comma-joined line per name.
pub(crate) fn render(
    status: StatusCode,
    headers: &[(String, Vec<String>)],
    body: Vec<u8>,
) -> Response {
    headers
        .iter()
        .fold(Response::new(status), |response, (name, values)| {
            response.header(name.as_str(), values.join(","))
        })
        .body_bytes(body)
}

fn put_len(buf: &mut Vec<u8>, len: usize, field: &'static str) -> Result<(), EncodeError> {
    let prefix = u32::try_from(len).map_err(|_| EncodeError::TooLong { field, len })?;
    buf.put_u32(prefix);
    Ok(())
}

fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8], field: &'static str) -> Result<(), EncodeError> {
    put_len(buf, bytes.len(), field)?;
    buf.put_slice(bytes);
    Ok(())
}

fn put_time(buf: &mut Vec<u8>, time: SystemTime) {
    let (secs, nanos) = match time.duration_since(UNIX_EPOCH) {
        Ok(after) => (after.as_secs() as i64, after.subsec_nanos()),
        Err(err) => {
            // Before the epoch: floor the seconds so nanos stay non-negative.
            let before = err.duration();
            match before.subsec_nanos() {
                0 => (-(before.as_secs() as i64), 0),
                n => (-(before.as_secs() as i64) - 1, NANOS_PER_SEC - n),
            }
        }
    };
    buf.put_i64(secs);
    buf.put_u32(nanos);
}

fn ensure(buf: &[u8], needed: usize, field: &'static str) -> Result<(), DecodeError> {
    if buf.len() < needed {
        return Err(DecodeError::Truncated { field });
    }
    Ok(())
}

fn get_u8(buf: &mut &[u8], field: &'static str) -> Result<u8, DecodeError> {
    ensure(buf, 1, field)?;
    Ok(buf.get_u8())
}

fn get_u32(buf: &mut &[u8], field: &'static str) -> Result<u32, DecodeError> {
    ensure(buf, 4, field)?;
    Ok(buf.get_u32())
}

fn get_u64(buf: &mut &[u8], field: &'static str) -> Result<u64, DecodeError> {
    ensure(buf, 8, field)?;
    Ok(buf.get_u64())
}

fn get_bytes<'a>(buf: &mut &'a [u8], field: &'static str) -> Result<&'a [u8], DecodeError> {
    let len = get_u32(buf, field)? as usize;
    ensure(buf, len, field)?;
    let slice: &'a [u8] = *buf;
    let (bytes, rest) = slice.split_at(len);
    *buf = rest;
    Ok(bytes)
}

fn get_string(buf: &mut &[u8], field: &'static str) -> Result<String, DecodeError> {
    let bytes = get_bytes(buf, field)?;
    String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8 { field })
}

fn get_time(buf: &mut &[u8], field: &'static str) -> Result<SystemTime, DecodeError> {
    ensure(buf, 12, field)?;
    let secs = buf.get_i64();
    let nanos = buf.get_u32();
    if nanos >= NANOS_PER_SEC {
        return Err(DecodeError::InvalidTimestamp { field, nanos });
    }
    let time = if secs >= 0 {
        UNIX_EPOCH.checked_add(Duration::new(secs as u64, nanos))
    } else {
        UNIX_EPOCH
            .checked_sub(Duration::from_secs(secs.unsigned_abs()))
            .and_then(|t| t.checked_add(Duration::from_nanos(u64::from(nanos))))
    };
    time.ok_or(DecodeError::InvalidTimestamp { field, nanos })
}
