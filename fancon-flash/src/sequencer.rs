//! Self-erase confirmation
//!
//! Mass-erases the program flash of the running device after an explicit
//! confirmation, then serves the console from RAM forever:
//!
//! ```text
//! Idle --request--> Confirming --'y'--> Erasing --> Disabled
//!                      |   ^
//!                  'n' |   | any other byte (re-prompt)
//!                      v   |
//!                     Idle
//! ```
//!
//! There is no way back from `Erasing`. Once the answer is accepted the
//! sequencer masks interrupts, copies its remaining output to RAM and hands
//! over to [`ramfunc::erase_and_serve`], which never returns.

use crate::console::RawConsole;
use crate::flash::FlashController;
use crate::ramfunc::{self, RamNotices};
use core::fmt;

const WARNING: &[u8] = b"\x1b[31m*WARNING: this operation is irreversible!\r\n";
const PROMPT: &[u8] =
    b"\x1b[33m\r\nPlease, type [Y] to confirm or [N] to reject the ERASE operation: \x1b[0m";
const ACCEPTED: &[u8] = b"\x1b[33m\r\nOperation accepted\r\n\x1b[0m";
const DECLINED: &[u8] = b"\x1b[33m\r\nOperation declined\r\n\x1b[0m";

/// Position in the erase sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EraseState {
    Idle,
    Confirming,
    Erasing,
    /// Flash wiped; only the RAM-resident terminal loop is left
    Disabled,
}

/// Why a sequencer call was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceError {
    /// The call does not apply in the current state
    WrongState(EraseState),
    /// The console stopped delivering bytes
    ConsoleClosed,
}

impl fmt::Display for SequenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceError::WrongState(state) => write!(f, "not allowed while {:?}", state),
            SequenceError::ConsoleClosed => write!(f, "console closed during confirmation"),
        }
    }
}

/// Drives one self-erase request over a byte console
pub struct SelfEraseSequencer<C: RawConsole, F: FlashController> {
    console: C,
    flash: F,
    state: EraseState,
}

impl<C: RawConsole, F: FlashController> SelfEraseSequencer<C, F> {
    pub fn new(console: C, flash: F) -> Self {
        Self {
            console,
            flash,
            state: EraseState::Idle,
        }
    }

    pub fn state(&self) -> EraseState {
        self.state
    }

    fn send(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.console.put(*byte);
        }
    }

    /// Warn and ask for confirmation (Idle -> Confirming)
    pub fn request(&mut self) -> Result<(), SequenceError> {
        if self.state != EraseState::Idle {
            return Err(SequenceError::WrongState(self.state));
        }
        self.send(WARNING);
        self.send(PROMPT);
        self.state = EraseState::Confirming;
        Ok(())
    }

    /// Feed one confirmation byte and return the resulting state
    ///
    /// `y`/`Y` erases the flash and does not return; `n`/`N` declines;
    /// anything else prompts again.
    pub fn answer(&mut self, byte: u8) -> Result<EraseState, SequenceError> {
        if self.state != EraseState::Confirming {
            return Err(SequenceError::WrongState(self.state));
        }
        self.console.put(byte);

        match byte {
            b'y' | b'Y' => {
                self.send(ACCEPTED);
                self.erase()
            }
            b'n' | b'N' => {
                self.send(DECLINED);
                self.state = EraseState::Idle;
            }
            _ => self.send(PROMPT),
        }
        Ok(self.state)
    }

    /// Request, then read answers until the operation is declined
    ///
    /// An accepted operation never comes back from here.
    pub fn run_confirmation(&mut self) -> Result<EraseState, SequenceError> {
        self.request()?;
        loop {
            let byte = self.console.get().ok_or(SequenceError::ConsoleClosed)?;
            let state = self.answer(byte)?;
            if state != EraseState::Confirming {
                return Ok(state);
            }
        }
    }

    /// Full request: returns only if declined
    pub fn run(mut self) -> Result<(), SequenceError> {
        self.run_confirmation().map(|_| ())
    }

    fn erase(&mut self) -> ! {
        self.state = EraseState::Erasing;
        self.flash.disable_interrupts();
        let notices = RamNotices::capture();
        ramfunc::erase_and_serve(&mut self.flash, &mut self.console, notices, &mut self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakeFlash, Op, Script};
    use crate::flash::{FlashBank, FLASH_KEY1, FLASH_KEY2};
    use crate::ramfunc::{INFO_NOTICE, NO_FUNC_NOTICE};
    use std::panic::{catch_unwind, AssertUnwindSafe};

    fn count(haystack: &str, needle: &str) -> usize {
        haystack.matches(needle).count()
    }

    #[test]
    fn test_decline_leaves_flash_untouched() {
        for answer in [b"n", b"N"] {
            let mut console = Script::new(answer);
            let mut flash = FakeFlash::new(2);

            let mut sequencer = SelfEraseSequencer::new(&mut console, &mut flash);
            assert_eq!(sequencer.state(), EraseState::Idle);
            assert_eq!(sequencer.run_confirmation(), Ok(EraseState::Idle));
            drop(sequencer);

            assert!(flash.ops.is_empty());
            let out = console.output_text();
            assert!(out.contains("*WARNING: this operation is irreversible!"));
            assert!(out.contains("Operation declined"));
            assert!(!out.contains("Operation accepted"));
        }
    }

    #[test]
    fn test_other_bytes_prompt_again() {
        let mut console = Script::new(b"x?\rn");
        let mut flash = FakeFlash::new(2);

        SelfEraseSequencer::new(&mut console, &mut flash)
            .run()
            .unwrap();

        assert_eq!(count(&console.output_text(), "Please, type [Y] to confirm or [N]"), 4);
        assert!(flash.ops.is_empty());
    }

    #[test]
    fn test_calls_out_of_order_are_refused() {
        let mut console = Script::default();
        let mut flash = FakeFlash::new(2);
        let mut sequencer = SelfEraseSequencer::new(&mut console, &mut flash);

        assert_eq!(
            sequencer.answer(b'y'),
            Err(SequenceError::WrongState(EraseState::Idle))
        );
        sequencer.request().unwrap();
        assert_eq!(
            sequencer.request(),
            Err(SequenceError::WrongState(EraseState::Confirming))
        );
        drop(sequencer);
        assert!(flash.ops.is_empty());
    }

    #[test]
    fn test_closed_console_aborts_confirmation() {
        let mut console = Script::new(b"x");
        let mut flash = FakeFlash::new(2);
        let mut sequencer = SelfEraseSequencer::new(&mut console, &mut flash);

        assert_eq!(
            sequencer.run_confirmation(),
            Err(SequenceError::ConsoleClosed)
        );
        assert_eq!(sequencer.state(), EraseState::Confirming);
        drop(sequencer);
        assert!(flash.ops.is_empty());
    }

    #[test]
    fn test_accept_hands_over_to_ram() {
        let mut console = Script::new(b"ab\rc\nd").panicking();
        let mut flash = FakeFlash::new(2);
        let mut sequencer = SelfEraseSequencer::new(&mut console, &mut flash);
        sequencer.request().unwrap();

        let result = catch_unwind(AssertUnwindSafe(|| sequencer.answer(b'Y')));
        assert!(result.is_err());
        assert_eq!(sequencer.state(), EraseState::Disabled);
        drop(sequencer);

        assert_eq!(
            flash.ops,
            [
                Op::DisableInterrupts,
                Op::Key(FLASH_KEY1),
                Op::Key(FLASH_KEY2),
                Op::DisableCaches,
                Op::MassErase(FlashBank::Bank1),
                Op::MassErase(FlashBank::Bank2),
                Op::Start,
                Op::Lock,
            ]
        );

        let text = console.output_text();
        let info = String::from_utf8_lossy(INFO_NOTICE).into_owned();
        let no_func = String::from_utf8_lossy(NO_FUNC_NOTICE).into_owned();
        let accepted_at = text.find("Operation accepted").unwrap();
        let info_at = text.find(info.as_str()).unwrap();
        assert!(accepted_at < info_at);
        assert_eq!(count(&text, &info), 1);

        let tail = &text[info_at + info.len()..];
        assert_eq!(tail, format!("ab\r{no_func}c\n{no_func}d"));
    }
}
