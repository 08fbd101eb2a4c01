//! Addressable-register bus primitive
//!
//! Blocking reads and writes of N bytes at a device address + register
//! offset. [`RecoveringBus`] wraps a raw peripheral and re-initializes it
//! (de-init + init) after every failed transfer before reporting the failure,
//! so the next request starts from a clean bus state.
//!
//! Device addresses are 8-bit (write) addresses as printed in device
//! datasheets; adapters for 7-bit APIs shift them down.

use embedded_hal::i2c::{Error as _, I2c};
use fancon_core::{FanconError, Result};
use tracing::{debug, error, warn};

/// Bus clock selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusSpeed {
    /// Standard / fast mode
    Standard,
    /// Fast-mode plus
    FastPlus,
}

impl BusSpeed {
    pub fn from_fast_mode(fast_mode: bool) -> Self {
        if fast_mode {
            BusSpeed::FastPlus
        } else {
            BusSpeed::Standard
        }
    }
}

/// Register-addressed device access as seen by device drivers
pub trait RegisterBus {
    /// Write `data` starting at `register`
    fn write(&mut self, address: u8, register: u8, data: &[u8]) -> Result<()>;

    /// Fill `buffer` starting at `register`
    fn read(&mut self, address: u8, register: u8, buffer: &mut [u8]) -> Result<()>;

    /// Probe the device up to `trials` times
    fn is_device_ready(&mut self, address: u8, trials: u32) -> Result<()>;
}

/// Raw bus peripheral with an explicit lifecycle
pub trait BusPeripheral {
    /// Configure the peripheral
    fn init(&mut self, speed: BusSpeed) -> Result<()>;

    /// Release the peripheral
    fn deinit(&mut self);

    /// Register write transfer
    fn mem_write(&mut self, address: u8, register: u8, data: &[u8]) -> Result<()>;

    /// Register read transfer
    fn mem_read(&mut self, address: u8, register: u8, buffer: &mut [u8]) -> Result<()>;

    /// Address-only transfer; Ok when the device acknowledges
    fn probe(&mut self, address: u8) -> Result<()>;
}

/// Bus that re-initializes its peripheral after every failed transfer
pub struct RecoveringBus<P: BusPeripheral> {
    peripheral: P,
    speed: BusSpeed,
    attempts: u8,
    recoveries: u32,
}

impl<P: BusPeripheral> RecoveringBus<P> {
    /// Initialize `peripheral` and wrap it
    ///
    /// `attempts` is the number of transfers tried per request (at least 1).
    pub fn new(mut peripheral: P, speed: BusSpeed, attempts: u8) -> Result<Self> {
        peripheral.init(speed)?;
        debug!("Bus initialized ({:?}, {} attempt(s))", speed, attempts.max(1));
        Ok(Self {
            peripheral,
            speed,
            attempts: attempts.max(1),
            recoveries: 0,
        })
    }

    /// Number of de-init/re-init cycles performed so far
    pub fn recoveries(&self) -> u32 {
        self.recoveries
    }

    pub fn peripheral(&self) -> &P {
        &self.peripheral
    }

    pub fn peripheral_mut(&mut self) -> &mut P {
        &mut self.peripheral
    }

    fn recover(&mut self) {
        self.peripheral.deinit();
        if let Err(e) = self.peripheral.init(self.speed) {
            error!("Bus re-initialization failed: {}", e);
        }
        self.recoveries += 1;
    }

    fn transfer<R>(
        &mut self,
        what: &str,
        address: u8,
        register: u8,
        mut op: impl FnMut(&mut P) -> Result<R>,
    ) -> Result<R> {
        let mut attempt = 1;
        loop {
            match op(&mut self.peripheral) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(
                        "Bus {} 0x{:02X}/0x{:02X} failed (attempt {}/{}): {}",
                        what, address, register, attempt, self.attempts, e
                    );
                    self.recover();
                    if attempt >= self.attempts {
                        return Err(e);
                    }
                    attempt += 1;
                }
            }
        }
    }
}

impl<P: BusPeripheral> RegisterBus for RecoveringBus<P> {
    fn write(&mut self, address: u8, register: u8, data: &[u8]) -> Result<()> {
        self.transfer("write", address, register, |p| {
            p.mem_write(address, register, data)
        })
    }

    fn read(&mut self, address: u8, register: u8, buffer: &mut [u8]) -> Result<()> {
        self.transfer("read", address, register, |p| {
            p.mem_read(address, register, buffer)
        })
    }

    fn is_device_ready(&mut self, address: u8, trials: u32) -> Result<()> {
        for trial in 1..=trials {
            match self.peripheral.probe(address) {
                Ok(()) => return Ok(()),
                Err(e) => debug!("Probe 0x{:02X} trial {}/{}: {}", address, trial, trials, e),
            }
        }
        Err(FanconError::Bus(format!(
            "device 0x{:02X} not ready after {} trial(s)",
            address, trials
        )))
    }
}

/// [`BusPeripheral`] over any `embedded-hal` I2C implementation
///
/// The HAL owns clock setup, so `init`/`deinit` only track state; bus speed
/// is chosen when the HAL instance is constructed.
pub struct HalI2c<I: I2c> {
    i2c: I,
    scratch: Vec<u8>,
}

impl<I: I2c> HalI2c<I> {
    pub fn new(i2c: I) -> Self {
        Self {
            i2c,
            scratch: Vec::new(),
        }
    }

    pub fn into_inner(self) -> I {
        self.i2c
    }
}

fn hal_error<E: embedded_hal::i2c::Error>(address: u8, e: E) -> FanconError {
    FanconError::Bus(format!("0x{:02X}: {:?}", address, e.kind()))
}

impl<I: I2c> BusPeripheral for HalI2c<I> {
    fn init(&mut self, speed: BusSpeed) -> Result<()> {
        debug!("HAL I2C ready ({:?} requested)", speed);
        Ok(())
    }

    fn deinit(&mut self) {}

    fn mem_write(&mut self, address: u8, register: u8, data: &[u8]) -> Result<()> {
        self.scratch.clear();
        self.scratch.push(register);
        self.scratch.extend_from_slice(data);
        self.i2c
            .write(address >> 1, &self.scratch)
            .map_err(|e| hal_error(address, e))
    }

    fn mem_read(&mut self, address: u8, register: u8, buffer: &mut [u8]) -> Result<()> {
        self.i2c
            .write_read(address >> 1, &[register], buffer)
            .map_err(|e| hal_error(address, e))
    }

    fn probe(&mut self, address: u8) -> Result<()> {
        self.i2c
            .write(address >> 1, &[])
            .map_err(|e| hal_error(address, e))
    }
}
