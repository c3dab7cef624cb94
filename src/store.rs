//! The in-memory key-value map, the authoritative state of the server.

use std::collections::BTreeMap;
use std::sync::Mutex;

use thiserror::Error;

/// Keys must be shorter than this many bytes.
pub const MAX_KEY_LEN: usize = 20;
/// Values must be shorter than this many bytes.
pub const MAX_VALUE_LEN: usize = 200;
/// The store never holds more than this many entries.
pub const MAX_ENTRIES: usize = 2000;

/// Rejections a [`Store::put`] can produce. Each maps to one HTTP status.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("key exceeds {max} characters")]
    KeyTooLong { max: usize },
    #[error("value exceeds {max} characters")]
    ValueTooLong { max: usize },
    #[error("store exceeds {max} entries")]
    StoreFull { max: usize },
}

/// Whether a `put` inserted a fresh key or replaced an existing value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Created,
    Updated,
}

/// Thread-safe map of string keys to string values.
///
/// A single mutex guards the whole map; every operation locks for the
/// duration of the call, so the limit checks and the mutation they guard
/// happen in one critical section. No operation performs I/O while holding
/// the lock. A `BTreeMap` keeps snapshot serialization deterministic.
#[derive(Default)]
pub struct Store {
    entries: Mutex<BTreeMap<String, String>>,
}

impl Store {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current value for a key, or `None` if the key is absent.
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    /// Inserts or overwrites an entry, reporting whether the key was new.
    ///
    /// The key and value length limits are checked first; the entry cap is
    /// checked only when the key is genuinely new, so overwriting an
    /// existing key always succeeds in a full store. A failed put never
    /// mutates the map.
    pub fn put(&self, key: String, value: String) -> Result<PutOutcome, StoreError> {
        if key.len() >= MAX_KEY_LEN {
            return Err(StoreError::KeyTooLong { max: MAX_KEY_LEN });
        }
        if value.len() >= MAX_VALUE_LEN {
            return Err(StoreError::ValueTooLong { max: MAX_VALUE_LEN });
        }

        let mut entries = self.entries.lock().unwrap();
        if !entries.contains_key(&key) && entries.len() >= MAX_ENTRIES {
            return Err(StoreError::StoreFull { max: MAX_ENTRIES });
        }
        match entries.insert(key, value) {
            None => Ok(PutOutcome::Created),
            Some(_) => Ok(PutOutcome::Updated),
        }
    }

    /// Removes a key, reporting whether it existed.
    pub fn delete(&self, key: &str) -> bool {
        self.entries.lock().unwrap().remove(key).is_some()
    }

    /// Returns a point-in-time copy of all entries.
    ///
    /// The clone happens under the lock; callers serialize or iterate the
    /// copy afterwards without blocking writers.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries.lock().unwrap().clone()
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
