//! Code that runs after the program flash is wiped
//!
//! Every function here is linked into `.data.ramfunc` on bare-metal ARM, is
//! never inlined into flash-resident callers, and only calls trait methods
//! whose implementations follow the same rule. Text printed after the erase
//! comes from [`RamNotices`], copied to the stack before the flash is touched.
//!
//! [`erase_and_serve`] is the only entry point used by the sequencer. It does
//! not return, so no flash-resident frame is ever resumed.

use crate::console::RawConsole;
use crate::flash::{FlashBank, FlashController, FLASH_KEY1, FLASH_KEY2};
use crate::sequencer::EraseState;

/// Printed once when the erase has completed
pub const INFO_NOTICE: &[u8] = b"\r\n\x1b[31mMCU FLASH was erased. Device is not functional now. It will not start after reset!\r\n\x1b[0m";

/// Printed on every line ending received afterwards
pub const NO_FUNC_NOTICE: &[u8] = b"\r\n\x1b[31mNo functional\r\n\x1b[0m";

const INFO_LEN: usize = INFO_NOTICE.len();
const NO_FUNC_LEN: usize = NO_FUNC_NOTICE.len();

const fn to_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    let mut i = 0;
    while i < N {
        out[i] = bytes[i];
        i += 1;
    }
    out
}

const INFO_ARRAY: [u8; INFO_LEN] = to_array(INFO_NOTICE);
const NO_FUNC_ARRAY: [u8; NO_FUNC_LEN] = to_array(NO_FUNC_NOTICE);

/// Post-erase notices held in RAM
#[derive(Debug, Clone)]
pub struct RamNotices {
    info: [u8; INFO_LEN],
    no_func: [u8; NO_FUNC_LEN],
}

impl RamNotices {
    /// Copy the notices out of read-only data
    ///
    /// Must run before the first flash register write.
    pub fn capture() -> Self {
        Self {
            info: core::hint::black_box(INFO_ARRAY),
            no_func: core::hint::black_box(NO_FUNC_ARRAY),
        }
    }

    pub fn info(&self) -> &[u8] {
        &self.info
    }

    pub fn no_func(&self) -> &[u8] {
        &self.no_func
    }
}

/// Wipe the flash, report it, then serve the dead console forever
///
/// Interrupts must already be masked and `notices` captured. `state` moves
/// to [`EraseState::Disabled`] once the erase is done.
#[cfg_attr(all(target_arch = "arm", target_os = "none"), link_section = ".data.ramfunc")]
#[inline(never)]
pub fn erase_and_serve<F, C>(
    flash: &mut F,
    console: &mut C,
    notices: RamNotices,
    state: &mut EraseState,
) -> !
where
    F: FlashController,
    C: RawConsole,
{
    mass_erase(flash);
    *state = EraseState::Disabled;
    announce(console, &notices);
    terminal_loop(console, &notices)
}

/// Unlock, mass-erase every bank, lock
///
/// Busy waits are unbounded and the result is not checked.
#[cfg_attr(all(target_arch = "arm", target_os = "none"), link_section = ".data.ramfunc")]
#[inline(never)]
pub fn mass_erase<F: FlashController>(flash: &mut F) {
    flash.write_key(FLASH_KEY1);
    flash.write_key(FLASH_KEY2);
    while flash.is_busy() {
        core::hint::spin_loop();
    }

    flash.disable_caches();

    let banks = flash.bank_count();
    let mut bank = 0;
    while bank < banks {
        flash.set_mass_erase(FlashBank::from_index(bank));
        bank += 1;
    }
    flash.start();
    while flash.is_busy() {
        core::hint::spin_loop();
    }

    flash.lock();
}

#[cfg_attr(all(target_arch = "arm", target_os = "none"), link_section = ".data.ramfunc")]
#[inline(never)]
fn put_all<C: RawConsole>(console: &mut C, bytes: &[u8]) {
    let mut i = 0;
    while i < bytes.len() {
        console.put(bytes[i]);
        i += 1;
    }
}

#[cfg_attr(all(target_arch = "arm", target_os = "none"), link_section = ".data.ramfunc")]
#[inline(never)]
fn announce<C: RawConsole>(console: &mut C, notices: &RamNotices) {
    put_all(console, &notices.info);
}

/// Echo one received byte; answer line endings with the no-function notice
#[cfg_attr(all(target_arch = "arm", target_os = "none"), link_section = ".data.ramfunc")]
#[inline(never)]
fn serve_once<C: RawConsole>(console: &mut C, notices: &RamNotices) -> Option<u8> {
    let byte = console.get()?;
    console.put(byte);
    if byte == b'\r' || byte == b'\n' {
        put_all(console, &notices.no_func);
    }
    Some(byte)
}

#[cfg_attr(all(target_arch = "arm", target_os = "none"), link_section = ".data.ramfunc")]
#[inline(never)]
fn terminal_loop<C: RawConsole>(console: &mut C, notices: &RamNotices) -> ! {
    loop {
        if serve_once(console, notices).is_none() {
            core::hint::spin_loop();
        }
    }
}
