//! Self-erase over a console transport
//!
//! The confirmation state machine and everything that runs after the erase
//! live in `fancon-flash`; this module feeds them from a [`ConsoleTransport`].

use crate::flash::FlashController;
use crate::transport::ConsoleTransport;
use fancon_core::{FanconError, Result};
use fancon_flash::RawConsole;

pub use fancon_flash::{EraseState, SelfEraseSequencer, SequenceError};

/// A [`ConsoleTransport`] seen through the post-erase byte interface
///
/// Transmit errors are dropped and receive errors read as a closed console.
pub struct TransportConsole<T>(T);

impl<T: ConsoleTransport> TransportConsole<T> {
    pub fn new(transport: T) -> Self {
        Self(transport)
    }
}

impl<T: ConsoleTransport> RawConsole for TransportConsole<T> {
    #[cfg_attr(all(target_arch = "arm", target_os = "none"), link_section = ".data.ramfunc")]
    #[inline(always)]
    fn put(&mut self, byte: u8) {
        let _ = self.0.send_char(byte);
    }

    #[cfg_attr(all(target_arch = "arm", target_os = "none"), link_section = ".data.ramfunc")]
    #[inline(always)]
    fn get(&mut self) -> Option<u8> {
        self.0.receive_char().ok()
    }
}

fn to_fancon_error(err: SequenceError) -> FanconError {
    match err {
        SequenceError::ConsoleClosed => FanconError::Transport(err.to_string()),
        SequenceError::WrongState(_) => FanconError::InvalidInput(err.to_string()),
    }
}

/// Ask for confirmation on `transport`, then erase `flash` if accepted
///
/// Returns only when the operator declines or the transport fails before
/// an answer was accepted.
pub fn run<T: ConsoleTransport, F: FlashController>(transport: T, flash: F) -> Result<()> {
    SelfEraseSequencer::new(TransportConsole::new(transport), flash)
        .run()
        .map_err(to_fancon_error)
}
