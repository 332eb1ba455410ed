//! LoRa packet intake.
//!
//! - **ESP-IDF**: the on-board SX1276 on SPI2, polled by the receive task
//!   through [`Sx127x`](crate::drivers::sx127x::Sx127x).
//! - **all other targets**: a small bounded queue that tests and
//!   simulations fill with [`feed_packet_to`].  When the receive task falls
//!   behind, new packets are dropped, which matches the "latest wins" slot
//!   anyway.

use crate::app::ports::RadioPort;

/// Largest raw frame the receive task accepts.
pub const RAW_PACKET_CAP: usize = 64;

// ───────────────────────────────────────────────────────────────
// ESP-IDF: SX1276 on SPI2
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
use esp_idf_svc::hal::gpio::{Gpio5, Gpio14, Gpio18, Gpio19, Gpio27, Output, PinDriver};
#[cfg(target_os = "espidf")]
use esp_idf_svc::hal::spi::{SPI2, SpiDeviceDriver, SpiDriver, SpiDriverConfig, config::Config};
#[cfg(target_os = "espidf")]
use esp_idf_svc::hal::units::Hertz;

#[cfg(target_os = "espidf")]
use crate::drivers::sx127x::Sx127x;
#[cfg(target_os = "espidf")]
use crate::error::RadioError;

/// Transceiver wiring on the Heltec WiFi LoRa 32 (V2).
#[cfg(target_os = "espidf")]
pub struct LoraPins {
    pub sclk: Gpio5,
    pub mosi: Gpio27,
    pub miso: Gpio19,
    pub cs: Gpio18,
    pub reset: Gpio14,
}

#[cfg(target_os = "espidf")]
type LoraChip = Sx127x<SpiDeviceDriver<'static, SpiDriver<'static>>, PinDriver<'static, Gpio14, Output>>;

#[cfg(target_os = "espidf")]
pub struct RadioAdapter {
    chip: LoraChip,
}

#[cfg(target_os = "espidf")]
impl RadioAdapter {
    /// Bring up SPI2 and put the transceiver in continuous receive.
    pub fn open(spi: SPI2, pins: LoraPins, frequency_hz: u32) -> Result<Self, RadioError> {
        let config = Config::new()
            .baudrate(Hertz(8_000_000))
            .data_mode(embedded_hal::spi::MODE_0);
        let spi = SpiDeviceDriver::new_single(
            spi,
            pins.sclk,
            pins.mosi,
            Some(pins.miso),
            Some(pins.cs),
            &SpiDriverConfig::default(),
            &config,
        )
        .map_err(|_| RadioError::Bus)?;
        let reset = PinDriver::output(pins.reset).map_err(|_| RadioError::Bus)?;

        let mut chip = Sx127x::new(spi, reset);
        chip.init(frequency_hz)?;
        Ok(Self { chip })
    }
}

#[cfg(target_os = "espidf")]
impl RadioPort for RadioAdapter {
    fn poll_packet(&mut self, buf: &mut [u8]) -> Option<usize> {
        self.chip.poll_packet(buf)
    }
}

// ───────────────────────────────────────────────────────────────
// Host: packet queue
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
#[cfg(not(target_os = "espidf"))]
use embassy_sync::channel::Channel;

#[cfg(not(target_os = "espidf"))]
const QUEUE_DEPTH: usize = 4;

#[cfg(not(target_os = "espidf"))]
pub type RawPacket = heapless::Vec<u8, RAW_PACKET_CAP>;
#[cfg(not(target_os = "espidf"))]
pub type PacketQueue = Channel<CriticalSectionRawMutex, RawPacket, QUEUE_DEPTH>;

/// Queue one received packet on `queue`.  Returns `false` if it was dropped.
#[cfg(not(target_os = "espidf"))]
pub fn feed_packet_to(queue: &PacketQueue, bytes: &[u8]) -> bool {
    let Ok(packet) = RawPacket::from_slice(bytes) else {
        log::warn!("Radio: {}-byte packet exceeds frame buffer, dropped", bytes.len());
        return false;
    };
    if queue.try_send(packet).is_err() {
        log::warn!("Radio: packet queue full, dropped");
        return false;
    }
    true
}

#[cfg(not(target_os = "espidf"))]
pub struct RadioAdapter {
    queue: &'static PacketQueue,
}

#[cfg(not(target_os = "espidf"))]
impl RadioAdapter {
    pub fn with_queue(queue: &'static PacketQueue) -> Self {
        Self { queue }
    }
}

#[cfg(not(target_os = "espidf"))]
impl RadioPort for RadioAdapter {
    /// Returns the full packet length even when `buf` is shorter, so the
    /// caller can tell a truncated packet from a complete one.
    fn poll_packet(&mut self, buf: &mut [u8]) -> Option<usize> {
        let packet = self.queue.try_receive().ok()?;
        let n = packet.len().min(buf.len());
        buf[..n].copy_from_slice(&packet[..n]);
        Some(packet.len())
    }
}
