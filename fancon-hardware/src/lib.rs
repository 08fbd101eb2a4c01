//! fancon-hardware
//!
//! Peripheral access for the fancon console: the byte-level console
//! transport, the register bus with its recovery wrapper, the MAX6650 fan
//! controller driver and the self-erase entry point. The flash interface
//! and the code that survives the erase come from `fancon-flash`.
//
//! Public API:
//! - `transport::ConsoleTransport`: polled console I/O (stdio, serial)
//! - `bus::RegisterBus` / `bus::RecoveringBus`: addressed register access
//! - `max6650::Max6650`: fan speed driver and its conversion functions
//! - `self_erase::run`: confirmed flash mass erase over a transport
//! - `sim`: simulated chip, flash and console for tests and `--mock` runs

pub mod bus;
pub mod max6650;
pub mod self_erase;
pub mod serial_driver;
pub mod sim;
pub mod transport;

pub use fancon_flash::flash;

pub use bus::{BusPeripheral, BusSpeed, HalI2c, RecoveringBus, RegisterBus};
pub use flash::{FlashBank, FlashController};
pub use max6650::Max6650;
pub use serial_driver::{find_console_port, SerialDriver};
pub use transport::{ConsoleTransport, StdioTransport};
