//! fancon-flash
//!
//! The part of the fancon firmware that keeps running after the program
//! flash has been wiped, kept apart from the std-only host code so it links
//! into a bare-metal image on its own.
//
//! Public API:
//! - `flash::FlashController`: register-level program-flash access
//! - `console::RawConsole`: polled byte console with no error values
//! - `sequencer::SelfEraseSequencer`: confirmation state machine
//! - `ramfunc`: the erase and the terminal loop, placed in RAM on bare-metal ARM
//! - `stm32l4`: flash interface and USART register backends

#![cfg_attr(not(test), no_std)]

pub mod console;
#[cfg(test)]
mod fakes;
pub mod flash;
pub mod ramfunc;
pub mod sequencer;
pub mod stm32l4;

pub use console::RawConsole;
pub use flash::{FlashBank, FlashController, FLASH_KEY1, FLASH_KEY2};
pub use ramfunc::{erase_and_serve, RamNotices};
pub use sequencer::{EraseState, SelfEraseSequencer, SequenceError};
pub use stm32l4::{Stm32l4Flash, Stm32l4Usart};
