//! Core-pinned thread spawning for the ESP32 dual-core.
//!
//! Wraps `esp_pthread_set_cfg()` so that `std::thread` creates a FreeRTOS
//! task pinned to a specific CPU core with explicit priority and stack
//! size.  On non-ESP targets it falls back to a plain named thread.
//!
//! `esp_pthread_set_cfg()` applies to the *next* `pthread_create()` from
//! the calling thread, so the config → spawn pair must not be interleaved
//! with other thread creation on the same thread.

use std::io;
use std::thread::JoinHandle;

/// CPU core identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Core {
    /// Core 0: WiFi, BLE and lwIP live here.
    Pro = 0,
    /// Core 1: station tasks.
    App = 1,
}

/// Static description of one long-lived or one-shot task.
#[derive(Debug, Clone, Copy)]
pub struct TaskSpec {
    /// NUL-terminated, e.g. `"upload\0"`.
    pub name: &'static str,
    pub core: Core,
    pub priority: u8,
    pub stack_kb: usize,
}

pub const RECEIVE_TASK: TaskSpec = TaskSpec { name: "radio-rx\0", core: Core::App, priority: 2, stack_kb: 4 };
pub const UPLOAD_TASK: TaskSpec = TaskSpec { name: "upload\0", core: Core::App, priority: 3, stack_kb: 8 };
pub const COMMAND_TASK: TaskSpec = TaskSpec { name: "command\0", core: Core::Pro, priority: 4, stack_kb: 8 };
pub const SCAN_TASK: TaskSpec = TaskSpec { name: "wifi-scan\0", core: Core::App, priority: 1, stack_kb: 6 };

impl TaskSpec {
    fn display_name(&self) -> &'static str {
        self.name.trim_end_matches('\0')
    }
}

/// Spawn `f` on its own thread according to `spec`.
#[cfg(target_os = "espidf")]
pub fn spawn_task(spec: TaskSpec, f: impl FnOnce() + Send + 'static) -> io::Result<JoinHandle<()>> {
    // SAFETY: the config struct is fully initialised by the IDF helper and
    // `name` is NUL-terminated with 'static lifetime.
    let ret = unsafe {
        let mut cfg = esp_idf_svc::sys::esp_create_default_pthread_config();
        cfg.pin_to_core = spec.core as i32;
        cfg.prio = i32::from(spec.priority);
        cfg.stack_size = (spec.stack_kb * 1024) as _;
        cfg.thread_name = spec.name.as_ptr().cast();
        esp_idf_svc::sys::esp_pthread_set_cfg(&cfg)
    };
    if ret != esp_idf_svc::sys::ESP_OK as esp_idf_svc::sys::esp_err_t {
        return Err(io::Error::other(format!("esp_pthread_set_cfg failed: {ret}")));
    }

    log::info!(
        "Spawning '{}' on {:?} (pri={}, stack={}KB)",
        spec.display_name(),
        spec.core,
        spec.priority,
        spec.stack_kb
    );
    std::thread::Builder::new().name(spec.display_name().into()).spawn(f)
}

/// Simulation fallback: ignores core affinity and priority.
#[cfg(not(target_os = "espidf"))]
pub fn spawn_task(spec: TaskSpec, f: impl FnOnce() + Send + 'static) -> io::Result<JoinHandle<()>> {
    log::debug!("Spawning '{}' (sim, stack={}KB)", spec.display_name(), spec.stack_kb);
    std::thread::Builder::new()
        .name(spec.display_name().into())
        .stack_size(spec.stack_kb.max(64) * 1024)
        .spawn(f)
}
