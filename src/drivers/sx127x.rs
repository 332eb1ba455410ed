//! Semtech SX1276/77/78 LoRa receiver over an `embedded-hal` SPI device.
//!
//! Only what packet intake needs: reset, silicon check, carrier frequency
//! and continuous receive.  Modem parameters (spreading factor, bandwidth,
//! coding rate, sync word) stay at the chip's reset defaults.
//!
//! Register access is one SPI transaction per register: the address byte
//! with bit 7 set for a write, clear for a read, then the data.

use core::time::Duration;

use embedded_hal::digital::OutputPin;
use embedded_hal::spi::{Operation, SpiDevice};
use log::{info, warn};

use crate::app::ports::RadioPort;
use crate::error::RadioError;

// ── Registers (LoRa mode) ─────────────────────────────────────

const REG_FIFO: u8 = 0x00;
const REG_OP_MODE: u8 = 0x01;
const REG_FRF_MSB: u8 = 0x06;
const REG_FRF_MID: u8 = 0x07;
const REG_FRF_LSB: u8 = 0x08;
const REG_LNA: u8 = 0x0C;
const REG_FIFO_ADDR_PTR: u8 = 0x0D;
const REG_FIFO_TX_BASE_ADDR: u8 = 0x0E;
const REG_FIFO_RX_BASE_ADDR: u8 = 0x0F;
const REG_FIFO_RX_CURRENT_ADDR: u8 = 0x10;
const REG_IRQ_FLAGS: u8 = 0x12;
const REG_RX_NB_BYTES: u8 = 0x13;
const REG_MODEM_CONFIG_3: u8 = 0x26;
const REG_VERSION: u8 = 0x42;

const WRITE_BIT: u8 = 0x80;

const MODE_LONG_RANGE: u8 = 0x80;
const MODE_SLEEP: u8 = 0x00;
const MODE_RX_CONTINUOUS: u8 = 0x05;

const IRQ_PAYLOAD_CRC_ERROR: u8 = 0x20;
const IRQ_RX_DONE: u8 = 0x40;

const LNA_BOOST_HF: u8 = 0x03;
const AGC_AUTO_ON: u8 = 0x04;

/// Value of `RegVersion` on SX1276/77/78 silicon.
pub const SILICON_VERSION: u8 = 0x12;

const FXOSC_HZ: u64 = 32_000_000;
const RESET_PULSE: Duration = Duration::from_millis(10);

/// `RegFrf` value for a carrier frequency (Fstep = 32 MHz / 2^19).
pub fn frf_for(frequency_hz: u32) -> u32 {
    ((u64::from(frequency_hz) << 19) / FXOSC_HZ) as u32
}

pub struct Sx127x<SPI, RST> {
    spi: SPI,
    reset: RST,
}

impl<SPI: SpiDevice, RST: OutputPin> Sx127x<SPI, RST> {
    pub fn new(spi: SPI, reset: RST) -> Self {
        Self { spi, reset }
    }

    /// Reset the chip, check its silicon version and leave it in
    /// continuous receive on `frequency_hz`.
    pub fn init(&mut self, frequency_hz: u32) -> Result<(), RadioError> {
        self.pulse_reset()?;

        let version = self.read(REG_VERSION)?;
        if version != SILICON_VERSION {
            return Err(RadioError::UnknownChip(version));
        }

        // LoRa mode can only be selected while asleep.
        self.write(REG_OP_MODE, MODE_LONG_RANGE | MODE_SLEEP)?;

        let frf = frf_for(frequency_hz);
        self.write(REG_FRF_MSB, (frf >> 16) as u8)?;
        self.write(REG_FRF_MID, (frf >> 8) as u8)?;
        self.write(REG_FRF_LSB, frf as u8)?;

        self.write(REG_FIFO_TX_BASE_ADDR, 0)?;
        self.write(REG_FIFO_RX_BASE_ADDR, 0)?;
        let lna = self.read(REG_LNA)?;
        self.write(REG_LNA, lna | LNA_BOOST_HF)?;
        self.write(REG_MODEM_CONFIG_3, AGC_AUTO_ON)?;

        self.write(REG_OP_MODE, MODE_LONG_RANGE | MODE_RX_CONTINUOUS)?;
        info!("LoRa: SX127x v{:#04x} listening on {} Hz", version, frequency_hz);
        Ok(())
    }

    /// Collect a completed frame, if one is waiting.
    ///
    /// Copies as much as fits into `buf` and returns the full frame length,
    /// so a caller can tell a truncated frame from a complete one.
    pub fn receive(&mut self, buf: &mut [u8]) -> Result<Option<usize>, RadioError> {
        let flags = self.read(REG_IRQ_FLAGS)?;
        if flags == 0 {
            return Ok(None);
        }
        // Write-one-to-clear.
        self.write(REG_IRQ_FLAGS, flags)?;

        if flags & IRQ_RX_DONE == 0 {
            return Ok(None);
        }
        if flags & IRQ_PAYLOAD_CRC_ERROR != 0 {
            return Err(RadioError::Crc);
        }

        let len = usize::from(self.read(REG_RX_NB_BYTES)?);
        let start = self.read(REG_FIFO_RX_CURRENT_ADDR)?;
        self.write(REG_FIFO_ADDR_PTR, start)?;

        let n = len.min(buf.len());
        self.spi
            .transaction(&mut [Operation::Write(&[REG_FIFO]), Operation::Read(&mut buf[..n])])
            .map_err(|_| RadioError::Bus)?;
        Ok(Some(len))
    }

    fn pulse_reset(&mut self) -> Result<(), RadioError> {
        self.reset.set_low().map_err(|_| RadioError::Bus)?;
        std::thread::sleep(RESET_PULSE);
        self.reset.set_high().map_err(|_| RadioError::Bus)?;
        std::thread::sleep(RESET_PULSE);
        Ok(())
    }

    fn read(&mut self, reg: u8) -> Result<u8, RadioError> {
        let mut value = [0u8];
        self.spi
            .transaction(&mut [Operation::Write(&[reg & !WRITE_BIT]), Operation::Read(&mut value)])
            .map_err(|_| RadioError::Bus)?;
        Ok(value[0])
    }

    fn write(&mut self, reg: u8, value: u8) -> Result<(), RadioError> {
        self.spi.write(&[reg | WRITE_BIT, value]).map_err(|_| RadioError::Bus)
    }
}

impl<SPI: SpiDevice, RST: OutputPin> RadioPort for Sx127x<SPI, RST> {
    fn poll_packet(&mut self, buf: &mut [u8]) -> Option<usize> {
        match self.receive(buf) {
            Ok(len) => len,
            Err(e) => {
                warn!("LoRa: frame dropped: {}", e);
                None
            }
        }
    }
}
