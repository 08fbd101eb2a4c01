//! Program-flash controller abstraction
//!
//! The operations mirror the flash interface registers one to one, so the
//! erase sequence stays visible (and testable) in [`crate::ramfunc`] instead
//! of being hidden inside a backend.

/// First unlock key for the flash key register
pub const FLASH_KEY1: u32 = 0x4567_0123;
/// Second unlock key for the flash key register
pub const FLASH_KEY2: u32 = 0xCDEF_89AB;

/// Independently mass-erasable flash bank
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashBank {
    Bank1,
    Bank2,
}

impl FlashBank {
    /// Bank for a zero-based index; devices have at most two banks
    #[inline(always)]
    pub fn from_index(index: u8) -> Self {
        if index == 0 {
            FlashBank::Bank1
        } else {
            FlashBank::Bank2
        }
    }
}

/// Register-level access to the program-flash controller
///
/// Implementations used by the self-erase sequence must be callable after
/// the flash is wiped: no logging and no data read from flash.
pub trait FlashController {
    /// Mask all maskable interrupts, globally and permanently
    fn disable_interrupts(&mut self);

    /// Write one word to the key register
    fn write_key(&mut self, key: u32);

    /// An operation is in progress
    fn is_busy(&self) -> bool;

    /// Turn off instruction and data caches in front of the flash
    fn disable_caches(&mut self) {}

    /// Select `bank` for mass erase
    fn set_mass_erase(&mut self, bank: FlashBank);

    /// Start the selected operation
    fn start(&mut self);

    /// Lock the control register
    fn lock(&mut self);

    /// Number of banks present
    fn bank_count(&self) -> u8;
}

// Inlined into the RAM-resident callers; any out-of-line copy lands in RAM too
impl<F: FlashController + ?Sized> FlashController for &mut F {
    #[cfg_attr(all(target_arch = "arm", target_os = "none"), link_section = ".data.ramfunc")]
    #[inline(always)]
    fn disable_interrupts(&mut self) {
        (**self).disable_interrupts()
    }

    #[cfg_attr(all(target_arch = "arm", target_os = "none"), link_section = ".data.ramfunc")]
    #[inline(always)]
    fn write_key(&mut self, key: u32) {
        (**self).write_key(key)
    }

    #[cfg_attr(all(target_arch = "arm", target_os = "none"), link_section = ".data.ramfunc")]
    #[inline(always)]
    fn is_busy(&self) -> bool {
        (**self).is_busy()
    }

    #[cfg_attr(all(target_arch = "arm", target_os = "none"), link_section = ".data.ramfunc")]
    #[inline(always)]
    fn disable_caches(&mut self) {
        (**self).disable_caches()
    }

    #[cfg_attr(all(target_arch = "arm", target_os = "none"), link_section = ".data.ramfunc")]
    #[inline(always)]
    fn set_mass_erase(&mut self, bank: FlashBank) {
        (**self).set_mass_erase(bank)
    }

    #[cfg_attr(all(target_arch = "arm", target_os = "none"), link_section = ".data.ramfunc")]
    #[inline(always)]
    fn start(&mut self) {
        (**self).start()
    }

    #[cfg_attr(all(target_arch = "arm", target_os = "none"), link_section = ".data.ramfunc")]
    #[inline(always)]
    fn lock(&mut self) {
        (**self).lock()
    }

    #[cfg_attr(all(target_arch = "arm", target_os = "none"), link_section = ".data.ramfunc")]
    #[inline(always)]
    fn bank_count(&self) -> u8 {
        (**self).bank_count()
    }
}
