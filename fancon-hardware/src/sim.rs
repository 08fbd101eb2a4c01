//! Simulated peripherals
//!
//! Stand-ins for the fan controller chip, the flash interface and the
//! console UART. Used by the unit and integration tests and by the harness
//! in `--mock` mode.

use crate::bus::{BusPeripheral, BusSpeed};
use crate::flash::{FlashBank, FlashController, FLASH_KEY1, FLASH_KEY2};
use crate::max6650::{CONFIG_REG, COUNT_REG, KTACH_CLOCK, SPEED_REG, TACH0_REG};
use crate::transport::ConsoleTransport;
use fancon_core::{FanconError, KScale, OperatingMode, Result};
use std::cell::Cell;
use std::collections::VecDeque;
use tracing::debug;

const REGISTER_COUNT: usize = 0x20;

/// Power-on configuration register value (full on, 12 V, KSCALE 4)
const POWER_ON_CONFIG: u8 = 0x0A;

/// MAX6650 register file answering on one bus address
///
/// The tachometer count is derived from the programmed registers: full on
/// reads 255, off reads 0, and in closed loop the fan settles exactly at the
/// regulated speed `992 x KSCALE / (KTACH + 1)` rps, counted over the
/// programmed count time and capped at 255.
#[derive(Debug)]
pub struct SimulatedMax6650 {
    address: u8,
    registers: [u8; REGISTER_COUNT],
    writes: Vec<(u8, Vec<u8>)>,
    speed: Option<BusSpeed>,
    init_count: u32,
    deinit_count: u32,
    ok_before_failure: u32,
    pending_failures: u32,
}

impl SimulatedMax6650 {
    /// Chip strapped to the 8-bit bus `address`
    pub fn new(address: u8) -> Self {
        let mut registers = [0u8; REGISTER_COUNT];
        registers[usize::from(CONFIG_REG)] = POWER_ON_CONFIG;
        registers[usize::from(SPEED_REG)] = u8::MAX;
        registers[usize::from(COUNT_REG)] = 0x02;

        Self {
            address,
            registers,
            writes: Vec::new(),
            speed: None,
            init_count: 0,
            deinit_count: 0,
            ok_before_failure: 0,
            pending_failures: 0,
        }
    }

    /// Successful register writes, oldest first
    pub fn writes(&self) -> &[(u8, Vec<u8>)] {
        &self.writes
    }

    /// Current register content; the tachometer register is computed
    pub fn register(&self, register: u8) -> u8 {
        if register == TACH0_REG {
            return self.tach_count();
        }
        self.registers[usize::from(register) % REGISTER_COUNT]
    }

    /// Fail the next `count` transfers
    pub fn fail_next(&mut self, count: u32) {
        self.fail_transfers_after(0, count);
    }

    /// Let `ok_count` transfers through, then fail `fail_count`
    pub fn fail_transfers_after(&mut self, ok_count: u32, fail_count: u32) {
        self.ok_before_failure = ok_count;
        self.pending_failures = fail_count;
    }

    pub fn init_count(&self) -> u32 {
        self.init_count
    }

    pub fn deinit_count(&self) -> u32 {
        self.deinit_count
    }

    /// Speed the peripheral was last initialized with
    pub fn bus_speed(&self) -> Option<BusSpeed> {
        self.speed
    }

    fn tach_count(&self) -> u8 {
        let config = self.registers[usize::from(CONFIG_REG)];
        match OperatingMode::from_config_byte(config) {
            OperatingMode::FullOn => u8::MAX,
            OperatingMode::Off => 0,
            OperatingMode::ClosedLoop | OperatingMode::OpenLoop => {
                let k_scale = KScale::from_config_byte(config).factor();
                let ktach = u32::from(self.registers[usize::from(SPEED_REG)]);
                let rps = KTACH_CLOCK * k_scale / (ktach + 1);
                let count_time = u32::from(self.registers[usize::from(COUNT_REG)]);
                (rps * 2 * count_time).min(u32::from(u8::MAX)) as u8
            }
        }
    }

    fn begin_transfer(&mut self, address: u8) -> Result<()> {
        if self.speed.is_none() {
            return Err(FanconError::Bus("peripheral not initialized".to_string()));
        }
        if self.ok_before_failure > 0 {
            self.ok_before_failure -= 1;
        } else if self.pending_failures > 0 {
            self.pending_failures -= 1;
            return Err(FanconError::Bus("injected transfer failure".to_string()));
        }
        if address != self.address {
            return Err(FanconError::Bus(format!("NACK from 0x{:02X}", address)));
        }
        Ok(())
    }
}

impl BusPeripheral for SimulatedMax6650 {
    fn init(&mut self, speed: BusSpeed) -> Result<()> {
        self.speed = Some(speed);
        self.init_count += 1;
        Ok(())
    }

    fn deinit(&mut self) {
        self.speed = None;
        self.deinit_count += 1;
    }

    fn mem_write(&mut self, address: u8, register: u8, data: &[u8]) -> Result<()> {
        self.begin_transfer(address)?;
        for (offset, byte) in data.iter().enumerate() {
            let index = (usize::from(register) + offset) % REGISTER_COUNT;
            self.registers[index] = *byte;
        }
        debug!("sim 0x{:02X}: write 0x{:02X} <- {:02X?}", address, register, data);
        self.writes.push((register, data.to_vec()));
        Ok(())
    }

    fn mem_read(&mut self, address: u8, register: u8, buffer: &mut [u8]) -> Result<()> {
        self.begin_transfer(address)?;
        for (offset, slot) in buffer.iter_mut().enumerate() {
            let index = (usize::from(register) + offset) % REGISTER_COUNT;
            *slot = self.register(index as u8);
        }
        Ok(())
    }

    fn probe(&mut self, address: u8) -> Result<()> {
        self.begin_transfer(address)
    }
}

/// One observable flash controller access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashOp {
    DisableInterrupts,
    WriteKey(u32),
    DisableCaches,
    SetMassErase(FlashBank),
    Start,
    Lock,
}

/// Flash interface model
///
/// Keys unlock the control register only when KEY2 directly follows KEY1;
/// a KEY1 always restarts the sequence. A start with
/// the control register unlocked and at least one bank selected counts as a
/// mass erase; the busy flag then stays set for a few polls.
#[derive(Debug)]
pub struct SimulatedFlash {
    banks: u8,
    ops: Vec<FlashOp>,
    unlocked: bool,
    key_stage: u8,
    selected: Vec<FlashBank>,
    erased: Vec<FlashBank>,
    erase_count: u32,
    busy_polls: Cell<u32>,
    interrupts_enabled: bool,
}

/// Busy polls reported after a start
const ERASE_BUSY_POLLS: u32 = 3;

impl SimulatedFlash {
    pub fn new(banks: u8) -> Self {
        Self {
            banks,
            ops: Vec::new(),
            unlocked: false,
            key_stage: 0,
            selected: Vec::new(),
            erased: Vec::new(),
            erase_count: 0,
            busy_polls: Cell::new(0),
            interrupts_enabled: true,
        }
    }

    /// All accesses, oldest first
    pub fn ops(&self) -> &[FlashOp] {
        &self.ops
    }

    /// Completed mass erases
    pub fn erase_count(&self) -> u32 {
        self.erase_count
    }

    /// Banks wiped by the last mass erase
    pub fn erased_banks(&self) -> &[FlashBank] {
        &self.erased
    }

    pub fn is_locked(&self) -> bool {
        !self.unlocked
    }

    pub fn interrupts_enabled(&self) -> bool {
        self.interrupts_enabled
    }
}

impl FlashController for SimulatedFlash {
    fn disable_interrupts(&mut self) {
        self.interrupts_enabled = false;
        self.ops.push(FlashOp::DisableInterrupts);
    }

    fn write_key(&mut self, key: u32) {
        self.ops.push(FlashOp::WriteKey(key));
        self.key_stage = match (self.key_stage, key) {
            (1, FLASH_KEY2) => {
                self.unlocked = true;
                0
            }
            (_, FLASH_KEY1) => 1,
            _ => 0,
        };
    }

    fn is_busy(&self) -> bool {
        let polls = self.busy_polls.get();
        if polls == 0 {
            return false;
        }
        self.busy_polls.set(polls - 1);
        true
    }

    fn disable_caches(&mut self) {
        self.ops.push(FlashOp::DisableCaches);
    }

    fn set_mass_erase(&mut self, bank: FlashBank) {
        self.ops.push(FlashOp::SetMassErase(bank));
        if self.unlocked && !self.selected.contains(&bank) {
            self.selected.push(bank);
        }
    }

    fn start(&mut self) {
        self.ops.push(FlashOp::Start);
        if self.unlocked && !self.selected.is_empty() {
            self.erased = std::mem::take(&mut self.selected);
            self.erase_count += 1;
            self.busy_polls.set(ERASE_BUSY_POLLS);
        }
    }

    fn lock(&mut self) {
        self.ops.push(FlashOp::Lock);
        self.unlocked = false;
        self.selected.clear();
    }

    fn bank_count(&self) -> u8 {
        self.banks
    }
}

/// Console transport fed from a script
///
/// Received bytes come from the queued input; sent bytes are collected.
/// When the input runs out, `receive_char` fails, or panics if the script
/// was built with [`ScriptedTransport::panic_when_drained`] (the only way
/// to leave a loop that never returns).
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    input: VecDeque<u8>,
    output: Vec<u8>,
    panic_when_drained: bool,
}

impl ScriptedTransport {
    pub fn new(input: &[u8]) -> Self {
        Self {
            input: input.iter().copied().collect(),
            ..Default::default()
        }
    }

    pub fn panic_when_drained(mut self) -> Self {
        self.panic_when_drained = true;
        self
    }

    /// Queue more input
    pub fn push_input(&mut self, input: &[u8]) {
        self.input.extend(input.iter().copied());
    }

    pub fn remaining_input(&self) -> usize {
        self.input.len()
    }

    pub fn output(&self) -> &[u8] {
        &self.output
    }

    pub fn output_text(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    /// Drain collected output
    pub fn take_output(&mut self) -> String {
        let text = self.output_text();
        self.output.clear();
        text
    }
}

impl ConsoleTransport for ScriptedTransport {
    fn send_char(&mut self, byte: u8) -> Result<()> {
        self.output.push(byte);
        Ok(())
    }

    fn receive_char(&mut self) -> Result<u8> {
        match self.input.pop_front() {
            Some(byte) => Ok(byte),
            None if self.panic_when_drained => panic!("console script drained"),
            None => Err(FanconError::Transport("console script drained".to_string())),
        }
    }
}
