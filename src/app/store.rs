//! Config store: the single, lock-protected [`StationConfig`] cell and its
//! persistence.
//!
//! Lock order is config → storage.  Paths that need both take the config
//! lock first; everything else holds at most one lock at a time.

use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{info, warn};

use crate::config::{STORAGE_KEY, STORAGE_NAMESPACE, StationConfig};
use crate::error::{self, StoreError};

use super::ports::StoragePort;

pub struct ConfigStore<S> {
    storage: Mutex<S>,
    config: Mutex<StationConfig>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<S: StoragePort> ConfigStore<S> {
    /// Wrap a storage backend; the in-memory config starts empty.
    pub fn new(storage: S) -> Self {
        Self {
            storage: Mutex::new(storage),
            config: Mutex::new(StationConfig::new()),
        }
    }

    /// Read the persisted record into memory.
    ///
    /// `loaded` is recomputed on every call: it is `true` only when a record
    /// was found and decoded.  A missing or corrupt record leaves the
    /// in-memory fields as they were.
    pub fn load(&self) -> Result<(), StoreError> {
        lock(&self.config).loaded = false;

        let stored = lock(&self.storage)
            .with_namespace(STORAGE_NAMESPACE, |session| session.get_str(STORAGE_KEY))?;
        let Some(text) = stored else {
            info!("NVS: no station config stored");
            return Err(StoreError::NotFound);
        };

        let mut config = lock(&self.config);
        match config.decode(&text) {
            Ok(()) => {
                config.loaded = true;
                info!("NVS: station config loaded ({} bytes)", text.len());
                Ok(())
            }
            Err(e) => {
                warn!("NVS: stored station config unreadable: {}", e);
                Err(StoreError::Corrupted(e))
            }
        }
    }

    /// Persist the current in-memory config and commit.
    pub fn save(&self) -> Result<(), StoreError> {
        let encoded = lock(&self.config).encode();
        self.persist(&encoded)
    }

    /// Erase the whole storage namespace, then reset the in-memory config.
    ///
    /// On failure the in-memory config is left untouched.
    pub fn clear(&self) -> Result<(), StoreError> {
        lock(&self.storage).with_namespace(STORAGE_NAMESPACE, |session| {
            session.erase_all()?;
            session.commit()
        })?;
        lock(&self.config).reset();
        info!("NVS: station config erased");
        Ok(())
    }

    /// Decode `text` on top of the current config, persist the result and
    /// make it live.
    ///
    /// Nothing changes in memory unless both the decode and the commit
    /// succeed, so a rejected or unsaved record never becomes active.
    pub fn apply(&self, text: &str) -> error::Result<StationConfig> {
        let mut config = lock(&self.config);
        let mut candidate = config.clone();
        candidate.decode(text)?;
        self.persist(&candidate.encode())?;
        candidate.loaded = true;
        *config = candidate.clone();
        info!("NVS: station config updated (ssid len={})", candidate.wifi_ssid.len());
        Ok(candidate)
    }

    /// Encoded form of the live config.
    pub fn encode(&self) -> String {
        lock(&self.config).encode()
    }

    /// Copy of the live config.
    pub fn snapshot(&self) -> StationConfig {
        lock(&self.config).clone()
    }

    pub fn is_loaded(&self) -> bool {
        lock(&self.config).loaded
    }

    /// Run `f` against the storage backend (diagnostics and tests).
    pub fn with_storage<T>(&self, f: impl FnOnce(&mut S) -> T) -> T {
        f(&mut lock(&self.storage))
    }

    fn persist(&self, encoded: &str) -> Result<(), StoreError> {
        let result = lock(&self.storage).with_namespace(STORAGE_NAMESPACE, |session| {
            session.set_str(STORAGE_KEY, encoded)?;
            session.commit()
        });
        match &result {
            Ok(()) => info!("NVS: station config saved ({} bytes)", encoded.len()),
            Err(e) => warn!("NVS: station config save failed: {}", e),
        }
        result
    }
}
