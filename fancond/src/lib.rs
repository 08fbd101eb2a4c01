//! fancon console
//!
//! Command console of the fancon firmware: the command registry and
//! handlers, the line-oriented console loop and the firmware context that
//! owns the peripherals.
//!
//! ```no_run
//! use fancond::{CommandRegistry, Console, FirmwareContext, Palette};
//! use fancon_core::FanControllerConfig;
//! use fancon_hardware::sim::{SimulatedFlash, SimulatedMax6650};
//! use fancon_hardware::{BusSpeed, RecoveringBus, StdioTransport};
//!
//! # fn example() -> fancon_core::Result<()> {
//! let bus = RecoveringBus::new(SimulatedMax6650::new(0x90), BusSpeed::Standard, 1)?;
//! let mut ctx = FirmwareContext::initialize(
//!     StdioTransport::new(),
//!     Some(bus),
//!     Some(FanControllerConfig::default()),
//!     SimulatedFlash::new(2),
//!     &Palette::plain(),
//! );
//! Console::new(CommandRegistry::default(), Palette::plain()).run(&mut ctx)
//! # }
//! ```

pub mod commands;
pub mod console;
pub mod context;

pub use commands::Command;
pub use console::{Console, CommandEntry, CommandRegistry, LineOutcome, Palette};
pub use context::FirmwareContext;
