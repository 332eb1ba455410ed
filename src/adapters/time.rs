//! Wall-clock adapter.
//!
//! Implements [`ClockPort`] for reading timestamps.
//!
//! - **`target_os = "espidf"`**: `gettimeofday()`, set by SNTP once the
//!   network is up.
//! - **`not(target_os = "espidf")`**: `std::time::SystemTime`.
//!
//! Until SNTP has synced, the ESP32 clock counts from 1970; readings are
//! still stamped and uploaded, with a warning.

use log::warn;

use crate::app::ports::ClockPort;

/// Anything earlier means the clock was never set (2020-01-01T00:00:00Z).
pub const EPOCH_2020: i64 = 1_577_836_800;

#[derive(Debug, Default, Clone, Copy)]
pub struct WallClock;

impl WallClock {
    pub fn new() -> Self {
        Self
    }

    /// Whether the clock looks synced.
    pub fn is_synced(&self) -> bool {
        self.now_secs() >= EPOCH_2020
    }

    #[cfg(target_os = "espidf")]
    fn now_secs(&self) -> i64 {
        let mut tv = esp_idf_svc::sys::timeval { tv_sec: 0, tv_usec: 0 };
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, core::ptr::null_mut()) } != 0 {
            return 0;
        }
        i64::from(tv.tv_sec)
    }

    #[cfg(not(target_os = "espidf"))]
    fn now_secs(&self) -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |d| d.as_secs() as i64)
    }
}

impl ClockPort for WallClock {
    fn epoch_secs(&self) -> i64 {
        let now = self.now_secs();
        if now < EPOCH_2020 {
            warn!("Clock: not synced yet (t={})", now);
        }
        now
    }
}

/// Start SNTP against the default pool; keep the handle alive to keep syncing.
#[cfg(target_os = "espidf")]
pub fn start_sntp() -> Result<esp_idf_svc::sntp::EspSntp<'static>, esp_idf_svc::sys::EspError> {
    let sntp = esp_idf_svc::sntp::EspSntp::new_default()?;
    log::info!("Clock: SNTP started");
    Ok(sntp)
}
