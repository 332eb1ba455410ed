//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`StoragePort`] for the station config record.
//!
//! - Every namespace access is bracketed by `nvs_open` / `nvs_close`; the
//!   handle is closed on every path, including errors from the closure.
//! - Writes and erases become durable only on `nvs_commit`.
//! - The simulation backend stages all writes in a working copy of the
//!   namespace and publishes it on commit, with fault injection for tests.

use crate::app::ports::{StoragePort, StorageSession};
use crate::error::StoreError;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;
#[cfg(target_os = "espidf")]
use log::{info, warn};

/// NVS namespace and key names are limited to 15 bytes.
const NVS_NAME_MAX: usize = 15;

#[cfg(target_os = "espidf")]
fn nvs_name(name: &str) -> Result<[u8; NVS_NAME_MAX + 1], StoreError> {
    let bytes = name.as_bytes();
    if bytes.len() > NVS_NAME_MAX {
        return Err(StoreError::Open);
    }
    let mut buf = [0u8; NVS_NAME_MAX + 1];
    buf[..bytes.len()].copy_from_slice(bytes);
    Ok(buf)
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF backend
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub struct NvsAdapter {
    _priv: (),
}

#[cfg(target_os = "espidf")]
impl NvsAdapter {
    /// Initialise NVS flash.
    ///
    /// On first boot or after a layout change the partition is erased and
    /// re-initialised.
    pub fn init() -> Result<Self, StoreError> {
        // SAFETY: called once from the main task before any other NVS access.
        let ret = unsafe { nvs_flash_init() };
        if ret == ESP_ERR_NVS_NO_FREE_PAGES as esp_err_t || ret == ESP_ERR_NVS_NEW_VERSION_FOUND as esp_err_t {
            warn!("NVS: erasing and re-initialising flash partition");
            if unsafe { nvs_flash_erase() } != ESP_OK as esp_err_t || unsafe { nvs_flash_init() } != ESP_OK as esp_err_t {
                return Err(StoreError::Open);
            }
        } else if ret != ESP_OK as esp_err_t {
            return Err(StoreError::Open);
        }
        info!("NVS: flash initialised");
        Ok(Self { _priv: () })
    }
}

#[cfg(target_os = "espidf")]
struct EspSession {
    handle: nvs_handle_t,
}

#[cfg(target_os = "espidf")]
impl StorageSession for EspSession {
    fn get_str(&mut self, key: &str) -> Result<Option<String>, StoreError> {
        let key = nvs_name(key)?;
        let mut len: usize = 0;
        // First call: length including the terminating NUL.
        let ret = unsafe {
            nvs_get_str(self.handle, key.as_ptr().cast(), core::ptr::null_mut(), &mut len)
        };
        if ret == ESP_ERR_NVS_NOT_FOUND as esp_err_t {
            return Ok(None);
        }
        if ret != ESP_OK as esp_err_t || len == 0 {
            return Err(StoreError::Read);
        }

        let mut buf = vec![0u8; len];
        let ret = unsafe {
            nvs_get_str(self.handle, key.as_ptr().cast(), buf.as_mut_ptr().cast(), &mut len)
        };
        if ret != ESP_OK as esp_err_t {
            return Err(StoreError::Read);
        }
        buf.truncate(len.saturating_sub(1));
        String::from_utf8(buf).map(Some).map_err(|_| StoreError::Read)
    }

    fn set_str(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let key = nvs_name(key)?;
        let value = std::ffi::CString::new(value).map_err(|_| StoreError::Write)?;
        let ret = unsafe { nvs_set_str(self.handle, key.as_ptr().cast(), value.as_ptr()) };
        if ret != ESP_OK as esp_err_t {
            warn!("NVS: set_str error {}", ret);
            return Err(StoreError::Write);
        }
        Ok(())
    }

    fn erase_all(&mut self) -> Result<(), StoreError> {
        if unsafe { nvs_erase_all(self.handle) } != ESP_OK as esp_err_t {
            return Err(StoreError::Write);
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        let ret = unsafe { nvs_commit(self.handle) };
        if ret != ESP_OK as esp_err_t {
            warn!("NVS: commit error {}", ret);
            return Err(StoreError::Commit);
        }
        Ok(())
    }
}

#[cfg(target_os = "espidf")]
impl StoragePort for NvsAdapter {
    fn with_namespace<T, F>(&mut self, namespace: &str, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut dyn StorageSession) -> Result<T, StoreError>,
    {
        let ns = nvs_name(namespace)?;
        let mut handle: nvs_handle_t = 0;
        let ret = unsafe {
            nvs_open(ns.as_ptr().cast(), nvs_open_mode_t_NVS_READWRITE, &mut handle)
        };
        if ret != ESP_OK as esp_err_t {
            warn!("NVS: open '{}' error {}", namespace, ret);
            return Err(StoreError::Open);
        }

        let mut session = EspSession { handle };
        let result = f(&mut session);
        unsafe { nvs_close(handle) };
        result
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation backend
// ───────────────────────────────────────────────────────────────

/// In-memory NVS with staged writes and fault injection.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone, Default)]
pub struct NvsAdapter {
    namespaces: HashMap<String, HashMap<String, String>>,
    opens: u32,
    closes: u32,
    fail_open: bool,
    fail_commit: bool,
}

#[cfg(not(target_os = "espidf"))]
impl NvsAdapter {
    pub fn new() -> Self {
        log::info!("NVS(sim): in-memory backend");
        Self::default()
    }

    /// Store `value` as if it had been committed earlier.
    pub fn insert_raw(&mut self, namespace: &str, key: &str, value: &str) {
        self.namespaces
            .entry(namespace.to_owned())
            .or_default()
            .insert(key.to_owned(), value.to_owned());
    }

    /// Committed value of `key`, if any.
    pub fn committed(&self, namespace: &str, key: &str) -> Option<&str> {
        self.namespaces.get(namespace)?.get(key).map(String::as_str)
    }

    /// Make the next `commit` fail.
    pub fn fail_next_commit(&mut self) {
        self.fail_commit = true;
    }

    /// Make the next namespace open fail.
    pub fn fail_next_open(&mut self) {
        self.fail_open = true;
    }

    pub fn open_count(&self) -> u32 {
        self.opens
    }

    pub fn close_count(&self) -> u32 {
        self.closes
    }
}

#[cfg(not(target_os = "espidf"))]
struct SimSession<'a> {
    committed: &'a mut HashMap<String, String>,
    working: HashMap<String, String>,
    fail_commit: &'a mut bool,
}

#[cfg(not(target_os = "espidf"))]
impl StorageSession for SimSession<'_> {
    fn get_str(&mut self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.working.get(key).cloned())
    }

    fn set_str(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        if key.len() > NVS_NAME_MAX {
            return Err(StoreError::Write);
        }
        self.working.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn erase_all(&mut self) -> Result<(), StoreError> {
        self.working.clear();
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        if core::mem::take(self.fail_commit) {
            return Err(StoreError::Commit);
        }
        self.committed.clone_from(&self.working);
        Ok(())
    }
}

#[cfg(not(target_os = "espidf"))]
impl StoragePort for NvsAdapter {
    fn with_namespace<T, F>(&mut self, namespace: &str, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut dyn StorageSession) -> Result<T, StoreError>,
    {
        if namespace.len() > NVS_NAME_MAX || core::mem::take(&mut self.fail_open) {
            return Err(StoreError::Open);
        }
        self.opens += 1;

        let committed = self.namespaces.entry(namespace.to_owned()).or_default();
        let working = committed.clone();
        let mut session = SimSession { committed, working, fail_commit: &mut self.fail_commit };
        let result = f(&mut session);
        drop(session);

        self.closes += 1;
        result
    }
}
