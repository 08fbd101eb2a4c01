//! Core types and data structures for fancon
//!
//! The enums in this module mirror the MAX6650 datasheet encodings: each
//! variant's `code()` is the raw bit pattern the driver packs into the
//! configuration register.

use crate::{FanconError, Result};
use serde::{Deserialize, Serialize};

/// MAX6650 ADD pin strapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddressLine {
    /// ADD tied to ground
    Gnd,
    /// ADD tied to VCC
    Vcc,
    /// ADD left floating
    NotConnected,
    /// ADD through a 10k resistor to ground
    Res10k,
}

impl AddressLine {
    /// 8-bit (write) bus address selected by this strapping
    pub fn bus_address(self) -> u8 {
        match self {
            AddressLine::Gnd => 0x90,
            AddressLine::Vcc => 0x96,
            AddressLine::NotConnected => 0x36,
            AddressLine::Res10k => 0x3E,
        }
    }
}

/// MAX6650 operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperatingMode {
    /// Software full-on
    FullOn,
    /// Software off
    Off,
    /// Closed-loop speed regulation against the tachometer
    ClosedLoop,
    /// Open-loop (DAC driven)
    OpenLoop,
}

impl OperatingMode {
    /// Two-bit mode field of the configuration register
    pub fn code(self) -> u8 {
        match self {
            OperatingMode::FullOn => 0,
            OperatingMode::Off => 1,
            OperatingMode::ClosedLoop => 2,
            OperatingMode::OpenLoop => 3,
        }
    }

    /// Decode the mode field from a configuration register value
    pub fn from_config_byte(byte: u8) -> Self {
        match (byte >> 4) & 0x03 {
            0 => OperatingMode::FullOn,
            1 => OperatingMode::Off,
            2 => OperatingMode::ClosedLoop,
            _ => OperatingMode::OpenLoop,
        }
    }
}

/// Fan supply voltage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FanVoltage {
    #[serde(rename = "5v")]
    V5,
    #[serde(rename = "12v")]
    V12,
}

impl FanVoltage {
    /// One-bit voltage field of the configuration register
    pub fn code(self) -> u8 {
        match self {
            FanVoltage::V5 => 0,
            FanVoltage::V12 => 1,
        }
    }
}

/// Tachometer prescaler (KSCALE)
///
/// Serialized as its factor (`k_scale = 16`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum KScale {
    X1,
    X2,
    X4,
    X8,
    X16,
}

impl KScale {
    /// Three-bit prescaler field of the configuration register
    pub fn code(self) -> u8 {
        match self {
            KScale::X1 => 0,
            KScale::X2 => 1,
            KScale::X4 => 2,
            KScale::X8 => 3,
            KScale::X16 => 4,
        }
    }

    /// Prescaler factor used in the KTACH equation
    pub fn factor(self) -> u32 {
        1 << self.code()
    }

    /// Decode the prescaler field from a configuration register value
    ///
    /// Codes 5..=7 are reserved on the chip and read back as 16.
    pub fn from_config_byte(byte: u8) -> Self {
        match byte & 0x07 {
            0 => KScale::X1,
            1 => KScale::X2,
            2 => KScale::X4,
            3 => KScale::X8,
            _ => KScale::X16,
        }
    }
}

impl TryFrom<u8> for KScale {
    type Error = FanconError;

    fn try_from(factor: u8) -> Result<Self> {
        match factor {
            1 => Ok(KScale::X1),
            2 => Ok(KScale::X2),
            4 => Ok(KScale::X4),
            8 => Ok(KScale::X8),
            16 => Ok(KScale::X16),
            other => Err(FanconError::InvalidInput(format!(
                "KSCALE must be one of 1, 2, 4, 8, 16, got {}",
                other
            ))),
        }
    }
}

impl From<KScale> for u8 {
    fn from(k: KScale) -> u8 {
        k.factor() as u8
    }
}

/// Lowest rated RPM the percent math can express (`rpm_max / 100` must be > 0)
pub const MIN_RATED_RPM: u16 = 100;

/// MAX6650 and fan configuration
///
/// Set once before the driver is initialized and read-only afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanControllerConfig {
    /// ADD pin strapping
    pub address_line: AddressLine,
    /// Chip operating mode
    pub operating_mode: OperatingMode,
    /// Fan supply voltage
    pub fan_voltage: FanVoltage,
    /// Tachometer prescaler
    pub k_scale: KScale,
    /// Rated full speed of the fan
    pub rpm_max: u16,
}

impl Default for FanControllerConfig {
    /// 12 V fan rated at 10500 RPM in closed loop. KSCALE 16 puts the full-speed
    /// KTACH at about 90, inside the chip's regulation range.
    fn default() -> Self {
        Self {
            address_line: AddressLine::Gnd,
            operating_mode: OperatingMode::ClosedLoop,
            fan_voltage: FanVoltage::V12,
            k_scale: KScale::X16,
            rpm_max: 10_500,
        }
    }
}

impl FanControllerConfig {
    /// Validate values the type system cannot rule out
    pub fn validate(&self) -> Result<()> {
        if self.rpm_max < MIN_RATED_RPM {
            return Err(FanconError::InvalidInput(format!(
                "rpm_max must be >= {}, got {}",
                MIN_RATED_RPM, self.rpm_max
            )));
        }
        Ok(())
    }
}
