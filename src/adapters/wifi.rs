//! WiFi station-mode adapter.
//!
//! Implements [`NetworkPort`], [`ScanPort`] and [`PeripheralPort`]: it
//! reports connectivity to the uploader, enumerates access points for the
//! scanner and re-joins whatever network the current config names.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::wifi::BlockingWifi`.
//! - **all other targets**: a simulated radio with a canned scan list.
//!
//! ## Reconnection policy
//!
//! After a failed or lost connection the adapter retries from
//! [`WifiAdapter::poll_at`] with exponential backoff (2 s → 4 s → 8 s …
//! capped at 60 s).  An empty SSID means "stay offline".

use std::time::{Duration, Instant};

use log::{error, info, warn};

use crate::app::ports::{NetworkPort, PeripheralPort, ScanPort};
use crate::config::{StationConfig, TaskTimings};
use crate::error::NetworkError;
use crate::scan::NetworkInfo;
#[cfg(target_os = "espidf")]
use crate::scan::EncryptionKind;

#[cfg(target_os = "espidf")]
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};

// ───────────────────────────────────────────────────────────────
// Connection state
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiState {
    /// No network configured, or deliberately disconnected.
    Offline,
    Connected,
    Reconnecting { attempt: u32 },
}

const INITIAL_BACKOFF_SECS: u32 = 2;
const MAX_BACKOFF_SECS: u32 = 60;

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

/// SSIDs are opaque octets to the driver; only the length is checked.
fn validate_ssid(ssid: &str) -> Result<(), NetworkError> {
    if ssid.is_empty() || ssid.len() > 32 {
        return Err(NetworkError::InvalidSsid);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), NetworkError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(NetworkError::InvalidPassword);
    }
    Ok(())
}

#[cfg(target_os = "espidf")]
impl From<AuthMethod> for EncryptionKind {
    fn from(method: AuthMethod) -> Self {
        match method {
            AuthMethod::None => Self::Open,
            AuthMethod::WEP => Self::Wep,
            AuthMethod::WPA => Self::WpaPsk,
            AuthMethod::WPA2Personal => Self::Wpa2Psk,
            AuthMethod::WPAWPA2Personal => Self::WpaWpa2Psk,
            AuthMethod::WPA2Enterprise => Self::Wpa2Enterprise,
            AuthMethod::WPA3Personal => Self::Wpa3Psk,
            AuthMethod::WPA2WPA3Personal => Self::Wpa2Wpa3Psk,
            AuthMethod::WAPIPersonal => Self::WapiPsk,
            #[allow(unreachable_patterns)]
            _ => Self::Unknown,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Simulated radio
// ───────────────────────────────────────────────────────────────

/// Host-side stand-in for the WiFi driver.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone, Default)]
pub struct SimRadio {
    /// Whether connect attempts succeed.
    pub reachable: bool,
    /// Access points returned by a scan.
    pub visible: Vec<NetworkInfo>,
    /// Make scans fail.
    pub scan_fails: bool,
    /// Link state as seen by the driver.
    pub link_up: bool,
    /// Number of connect attempts made.
    pub connect_attempts: u32,
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    state: WifiState,
    ssid: heapless::String<32>,
    password: heapless::String<64>,
    backoff_secs: u32,
    next_retry: Option<Instant>,
    #[cfg(target_os = "espidf")]
    wifi: BlockingWifi<EspWifi<'static>>,
    #[cfg(not(target_os = "espidf"))]
    sim: SimRadio,
}

impl WifiAdapter {
    #[cfg(target_os = "espidf")]
    pub fn new(wifi: BlockingWifi<EspWifi<'static>>) -> Self {
        Self::with_driver(wifi)
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new(sim: SimRadio) -> Self {
        Self::with_driver(sim)
    }

    #[cfg(target_os = "espidf")]
    fn with_driver(wifi: BlockingWifi<EspWifi<'static>>) -> Self {
        Self {
            state: WifiState::Offline,
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            backoff_secs: INITIAL_BACKOFF_SECS,
            next_retry: None,
            wifi,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn with_driver(sim: SimRadio) -> Self {
        Self {
            state: WifiState::Offline,
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            backoff_secs: INITIAL_BACKOFF_SECS,
            next_retry: None,
            sim,
        }
    }

    pub fn state(&self) -> WifiState {
        self.state
    }

    /// Current reconnect backoff in seconds.
    pub fn backoff_secs(&self) -> u32 {
        self.backoff_secs
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim(&mut self) -> &mut SimRadio {
        &mut self.sim
    }

    pub fn set_credentials(&mut self, ssid: &str, password: &str) -> Result<(), NetworkError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        self.ssid.clear();
        self.ssid.push_str(ssid).map_err(|_| NetworkError::InvalidSsid)?;
        self.password.clear();
        self.password.push_str(password).map_err(|_| NetworkError::InvalidPassword)?;
        info!("WiFi: credentials updated (SSID='{}')", self.ssid);
        Ok(())
    }

    /// Try to join the configured network once.
    ///
    /// On failure the adapter enters reconnect mode and [`poll_at`](Self::poll_at)
    /// takes over.
    pub fn connect(&mut self) -> Result<(), NetworkError> {
        if self.ssid.is_empty() {
            return Err(NetworkError::NoCredentials);
        }
        info!("WiFi: connecting to '{}'", self.ssid);
        match self.platform_connect() {
            Ok(()) => {
                self.on_connected();
                Ok(())
            }
            Err(e) => {
                error!("WiFi: connection failed: {}", e);
                self.state = WifiState::Reconnecting { attempt: 0 };
                self.next_retry = Some(Instant::now() + self.backoff());
                Err(e)
            }
        }
    }

    /// Boot-time join: up to `wifi_connect_attempts` tries, pausing
    /// `wifi_connect_wait_ms` between them.
    pub fn connect_at_boot(&mut self, timings: &TaskTimings) -> Result<(), NetworkError> {
        let wait = Duration::from_millis(u64::from(timings.wifi_connect_wait_ms));
        let attempts = timings.wifi_connect_attempts.max(1);
        let mut last = NetworkError::NoCredentials;
        for attempt in 1..=attempts {
            match self.connect() {
                Ok(()) => return Ok(()),
                Err(NetworkError::NoCredentials) => return Err(NetworkError::NoCredentials),
                Err(e) => {
                    warn!("WiFi: boot connect attempt {}/{} failed", attempt, attempts);
                    last = e;
                }
            }
            if attempt < attempts {
                std::thread::sleep(wait);
            }
        }
        Err(last)
    }

    pub fn disconnect(&mut self) {
        self.platform_disconnect();
        self.state = WifiState::Offline;
        self.next_retry = None;
        self.backoff_secs = INITIAL_BACKOFF_SECS;
        info!("WiFi: disconnected");
    }

    /// Drive reconnection; call periodically.
    pub fn poll_at(&mut self, now: Instant) {
        match self.state {
            WifiState::Reconnecting { attempt } => {
                if self.next_retry.is_some_and(|at| now < at) {
                    return;
                }
                info!("WiFi: reconnect attempt {} (backoff {}s)", attempt + 1, self.backoff_secs);
                if self.platform_connect().is_ok() {
                    self.on_connected();
                    info!("WiFi: reconnected");
                } else {
                    self.backoff_secs = (self.backoff_secs * 2).min(MAX_BACKOFF_SECS);
                    self.state = WifiState::Reconnecting { attempt: attempt + 1 };
                    self.next_retry = Some(now + self.backoff());
                }
            }
            WifiState::Connected => {
                if !self.platform_is_connected() {
                    warn!("WiFi: connection lost, entering reconnect");
                    self.state = WifiState::Reconnecting { attempt: 0 };
                    self.next_retry = Some(now + self.backoff());
                }
            }
            WifiState::Offline => {}
        }
    }

    fn on_connected(&mut self) {
        self.state = WifiState::Connected;
        self.backoff_secs = INITIAL_BACKOFF_SECS;
        self.next_retry = None;
        info!("WiFi: connected to '{}'", self.ssid);
    }

    fn backoff(&self) -> Duration {
        Duration::from_secs(u64::from(self.backoff_secs))
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self) -> Result<(), NetworkError> {
        let auth_method = if self.password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPAWPA2Personal
        };
        let config = Configuration::Client(ClientConfiguration {
            ssid: self.ssid.as_str().try_into().map_err(|_| NetworkError::InvalidSsid)?,
            password: self
                .password
                .as_str()
                .try_into()
                .map_err(|_| NetworkError::InvalidPassword)?,
            auth_method,
            ..Default::default()
        });
        let _ = self.wifi.disconnect();
        self.wifi.set_configuration(&config).map_err(|_| NetworkError::ConnectionFailed)?;
        if !self.wifi.is_started().unwrap_or(false) {
            self.wifi.start().map_err(|_| NetworkError::ConnectionFailed)?;
        }
        self.wifi.connect().map_err(|_| NetworkError::ConnectionFailed)?;
        self.wifi.wait_netif_up().map_err(|_| NetworkError::ConnectionFailed)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self) -> Result<(), NetworkError> {
        self.sim.connect_attempts += 1;
        self.sim.link_up = self.sim.reachable;
        if self.sim.link_up {
            Ok(())
        } else {
            Err(NetworkError::ConnectionFailed)
        }
    }

    #[cfg(target_os = "espidf")]
    fn platform_disconnect(&mut self) {
        if self.wifi.is_connected().unwrap_or(false) {
            let _ = self.wifi.disconnect();
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_disconnect(&mut self) {
        self.sim.link_up = false;
    }

    #[cfg(target_os = "espidf")]
    fn platform_is_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_connected(&self) -> bool {
        self.sim.link_up
    }

    #[cfg(target_os = "espidf")]
    fn platform_scan(&mut self) -> Result<Vec<NetworkInfo>, NetworkError> {
        // Scanning needs a started driver even when no network is configured.
        if !self.wifi.is_started().unwrap_or(false) {
            self.wifi
                .set_configuration(&Configuration::Client(ClientConfiguration::default()))
                .map_err(|_| NetworkError::ScanFailed)?;
            self.wifi.start().map_err(|_| NetworkError::ScanFailed)?;
        }
        let found = self.wifi.scan().map_err(|_| NetworkError::ScanFailed)?;
        Ok(found
            .into_iter()
            .map(|ap| NetworkInfo {
                ssid: ap.ssid.as_str().to_owned(),
                rssi: ap.signal_strength,
                encryption: ap.auth_method.map_or(EncryptionKind::Unknown, EncryptionKind::from),
            })
            .collect())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_scan(&mut self) -> Result<Vec<NetworkInfo>, NetworkError> {
        if self.sim.scan_fails {
            return Err(NetworkError::ScanFailed);
        }
        Ok(self.sim.visible.clone())
    }
}

// ───────────────────────────────────────────────────────────────
// Ports
// ───────────────────────────────────────────────────────────────

impl NetworkPort for WifiAdapter {
    fn is_connected(&self) -> bool {
        self.state == WifiState::Connected && self.platform_is_connected()
    }

    fn maintain(&mut self) {
        self.poll_at(Instant::now());
    }
}

impl ScanPort for WifiAdapter {
    fn scan(&mut self) -> Result<Vec<NetworkInfo>, NetworkError> {
        self.platform_scan()
    }
}

impl PeripheralPort for WifiAdapter {
    fn reinitialize(&mut self, config: &StationConfig) {
        self.disconnect();
        self.ssid.clear();
        self.password.clear();

        if config.wifi_ssid.is_empty() {
            info!("WiFi: no network configured, staying offline");
            return;
        }
        if let Err(e) = self.set_credentials(&config.wifi_ssid, &config.wifi_pass) {
            warn!("WiFi: configured network rejected: {}", e);
            return;
        }
        // A failed connect leaves the adapter reconnecting.
        let _ = self.connect();
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
