//! In-memory flash and console for the unit tests

use crate::console::RawConsole;
use crate::flash::{FlashBank, FlashController};
use std::cell::Cell;
use std::collections::VecDeque;

/// Polls that report busy after a start
pub const ERASE_POLLS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    DisableInterrupts,
    Key(u32),
    DisableCaches,
    MassErase(FlashBank),
    Start,
    Lock,
}

/// Records every register access
pub struct FakeFlash {
    pub ops: Vec<Op>,
    pub busy_polls: Cell<u32>,
    busy_left: Cell<u32>,
    banks: u8,
}

impl FakeFlash {
    pub fn new(banks: u8) -> Self {
        Self {
            ops: Vec::new(),
            busy_polls: Cell::new(0),
            busy_left: Cell::new(0),
            banks,
        }
    }
}

impl FlashController for FakeFlash {
    fn disable_interrupts(&mut self) {
        self.ops.push(Op::DisableInterrupts);
    }

    fn write_key(&mut self, key: u32) {
        self.ops.push(Op::Key(key));
    }

    fn is_busy(&self) -> bool {
        self.busy_polls.set(self.busy_polls.get() + 1);
        let left = self.busy_left.get();
        if left == 0 {
            return false;
        }
        self.busy_left.set(left - 1);
        true
    }

    fn disable_caches(&mut self) {
        self.ops.push(Op::DisableCaches);
    }

    fn set_mass_erase(&mut self, bank: FlashBank) {
        self.ops.push(Op::MassErase(bank));
    }

    fn start(&mut self) {
        self.ops.push(Op::Start);
        self.busy_left.set(ERASE_POLLS);
    }

    fn lock(&mut self) {
        self.ops.push(Op::Lock);
    }

    fn bank_count(&self) -> u8 {
        self.banks
    }
}

/// Console fed from a byte script
///
/// A drained script reads as a failed receiver, or panics when built with
/// [`Script::panicking`] so a loop that never returns can be left.
#[derive(Default)]
pub struct Script {
    input: VecDeque<u8>,
    output: Vec<u8>,
    panic_when_drained: bool,
}

impl Script {
    pub fn new(input: &[u8]) -> Self {
        Self {
            input: input.iter().copied().collect(),
            ..Default::default()
        }
    }

    pub fn panicking(mut self) -> Self {
        self.panic_when_drained = true;
        self
    }

    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    pub fn output_text(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

impl RawConsole for Script {
    fn put(&mut self, byte: u8) {
        self.output.push(byte);
    }

    fn get(&mut self) -> Option<u8> {
        match self.input.pop_front() {
            Some(byte) => Some(byte),
            None if self.panic_when_drained => panic!("console script drained"),
            None => None,
        }
    }
}
