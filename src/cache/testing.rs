//! In-memory collaborators for tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::{Adapter, AdapterError, Clock};

/// A single-map adapter that can be told to fail.
#[derive(Default)]
pub(crate) struct MemoryAdapter {
    entries: Mutex<HashMap<(String, String), Vec<u8>>>,
    fail_get: AtomicBool,
    fail_set: AtomicBool,
}

impl MemoryAdapter {
    pub(crate) fn raw(&self, prefix: &str, key: &str) -> Option<Vec<u8>> {
        self.entries
            .lock()
            .unwrap()
            .get(&(prefix.to_owned(), key.to_owned()))
            .cloned()
    }

    pub(crate) fn insert_raw(&self, prefix: &str, key: &str, value: Vec<u8>) {
        self.entries
            .lock()
            .unwrap()
            .insert((prefix.to_owned(), key.to_owned()), value);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub(crate) fn fail_get(&self, fail: bool) {
        self.fail_get.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_set(&self, fail: bool) {
        self.fail_set.store(fail, Ordering::SeqCst);
    }
}

impl Adapter for MemoryAdapter {
    fn get(&self, prefix: &str, key: &str) -> Result<Option<Vec<u8>>, AdapterError> {
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(AdapterError::Unavailable("get disabled".into()));
        }
        Ok(self.raw(prefix, key))
    }

    fn set(&self, prefix: &str, key: &str, value: Vec<u8>) -> Result<(), AdapterError> {
        if self.fail_set.load(Ordering::SeqCst) {
            return Err(AdapterError::Unavailable("set disabled".into()));
        }
        self.insert_raw(prefix, key, value);
        Ok(())
    }

    fn release(&self, prefix: &str, key: &str) -> Result<(), AdapterError> {
        self.entries
            .lock()
            .unwrap()
            .remove(&(prefix.to_owned(), key.to_owned()));
        Ok(())
    }

    fn release_prefix(&self, prefix: &str) -> Result<(), AdapterError> {
        self.entries.lock().unwrap().retain(|(p, _), _| p != prefix);
        Ok(())
    }

    fn release_if_starts_with(&self, key_prefix: &str) -> Result<(), AdapterError> {
        self.entries
            .lock()
            .unwrap()
            .retain(|(_, k), _| !k.starts_with(key_prefix));
        Ok(())
    }
}

/// A clock that only moves when told to.
pub(crate) struct ManualClock {
    now: Mutex<SystemTime>,
}

impl ManualClock {
    pub(crate) fn new() -> Self {
        Self {
            now: Mutex::new(UNIX_EPOCH + Duration::from_secs(1_700_000_000)),
        }
    }

    pub(crate) fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.now.lock().unwrap()
    }
}

/// Routes `tracing` output through the test harness; safe to call repeatedly.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
