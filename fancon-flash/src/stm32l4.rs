//! STM32L4 register backends
//!
//! Flash interface and polled USART access through volatile reads and writes
//! at a register block base address. Both are used after the flash is gone,
//! so every method is placed in RAM on bare-metal ARM builds and touches
//! nothing but its registers.

use crate::console::RawConsole;
use crate::flash::{FlashBank, FlashController};

// Flash interface register offsets and bits (RM0351 section 3.7)
const FLASH_ACR: usize = 0x00;
const FLASH_KEYR: usize = 0x08;
const FLASH_SR: usize = 0x10;
const FLASH_CR: usize = 0x14;

const ACR_ICEN: u32 = 1 << 9;
const ACR_DCEN: u32 = 1 << 10;
const SR_BSY: u32 = 1 << 16;
const CR_MER1: u32 = 1 << 2;
const CR_MER2: u32 = 1 << 15;
const CR_STRT: u32 = 1 << 16;
const CR_LOCK: u32 = 1 << 31;

// USART register offsets and bits (RM0351 section 40.8)
const USART_ISR: usize = 0x1C;
const USART_RDR: usize = 0x24;
const USART_TDR: usize = 0x28;

const ISR_RXNE: u32 = 1 << 5;
const ISR_TC: u32 = 1 << 6;

#[derive(Debug)]
struct RegisterBlock {
    base: usize,
}

impl RegisterBlock {
    #[inline(always)]
    fn read(&self, offset: usize) -> u32 {
        // SAFETY: `base` points to a live register block (constructor contract)
        unsafe { core::ptr::read_volatile((self.base + offset) as *const u32) }
    }

    #[inline(always)]
    fn write(&mut self, offset: usize, value: u32) {
        // SAFETY: as above
        unsafe { core::ptr::write_volatile((self.base + offset) as *mut u32, value) }
    }

    #[inline(always)]
    fn set_bits(&mut self, offset: usize, bits: u32) {
        let value = self.read(offset);
        self.write(offset, value | bits);
    }

    #[inline(always)]
    fn clear_bits(&mut self, offset: usize, bits: u32) {
        let value = self.read(offset);
        self.write(offset, value & !bits);
    }
}

/// STM32L4 flash interface
#[derive(Debug)]
pub struct Stm32l4Flash {
    regs: RegisterBlock,
    banks: u8,
}

impl Stm32l4Flash {
    /// Flash interface at a register block address (0x4002_2000 on the
    /// STM32L476)
    ///
    /// # Safety
    /// `base` must point to at least 0x18 bytes of word-aligned memory that
    /// stays valid, and exclusively owned, for the life of the value.
    pub unsafe fn from_base(base: usize, banks: u8) -> Self {
        Self {
            regs: RegisterBlock { base },
            banks,
        }
    }
}

impl FlashController for Stm32l4Flash {
    #[cfg_attr(all(target_arch = "arm", target_os = "none"), link_section = ".data.ramfunc")]
    #[inline(never)]
    fn disable_interrupts(&mut self) {
        #[cfg(all(target_arch = "arm", target_os = "none"))]
        // SAFETY: masking interrupts cannot violate memory safety
        unsafe {
            core::arch::asm!("cpsid i", options(nomem, nostack, preserves_flags));
        }
        core::sync::atomic::compiler_fence(core::sync::atomic::Ordering::SeqCst);
    }

    #[cfg_attr(all(target_arch = "arm", target_os = "none"), link_section = ".data.ramfunc")]
    #[inline(never)]
    fn write_key(&mut self, key: u32) {
        self.regs.write(FLASH_KEYR, key);
    }

    #[cfg_attr(all(target_arch = "arm", target_os = "none"), link_section = ".data.ramfunc")]
    #[inline(never)]
    fn is_busy(&self) -> bool {
        self.regs.read(FLASH_SR) & SR_BSY != 0
    }

    #[cfg_attr(all(target_arch = "arm", target_os = "none"), link_section = ".data.ramfunc")]
    #[inline(never)]
    fn disable_caches(&mut self) {
        self.regs.clear_bits(FLASH_ACR, ACR_ICEN | ACR_DCEN);
    }

    #[cfg_attr(all(target_arch = "arm", target_os = "none"), link_section = ".data.ramfunc")]
    #[inline(never)]
    fn set_mass_erase(&mut self, bank: FlashBank) {
        let bit = match bank {
            FlashBank::Bank1 => CR_MER1,
            FlashBank::Bank2 => CR_MER2,
        };
        self.regs.set_bits(FLASH_CR, bit);
    }

    #[cfg_attr(all(target_arch = "arm", target_os = "none"), link_section = ".data.ramfunc")]
    #[inline(never)]
    fn start(&mut self) {
        self.regs.set_bits(FLASH_CR, CR_STRT);
    }

    #[cfg_attr(all(target_arch = "arm", target_os = "none"), link_section = ".data.ramfunc")]
    #[inline(never)]
    fn lock(&mut self) {
        self.regs.set_bits(FLASH_CR, CR_LOCK);
    }

    #[cfg_attr(all(target_arch = "arm", target_os = "none"), link_section = ".data.ramfunc")]
    #[inline(never)]
    fn bank_count(&self) -> u8 {
        self.banks
    }
}

/// Polled STM32L4 USART
#[derive(Debug)]
pub struct Stm32l4Usart {
    regs: RegisterBlock,
}

impl Stm32l4Usart {
    /// USART at a register block address (USART1 is 0x4001_3800 on the
    /// STM32L476), already configured by the startup code
    ///
    /// # Safety
    /// `base` must point to at least 0x2C bytes of word-aligned memory that
    /// stays valid, and exclusively owned, for the life of the value.
    pub unsafe fn from_base(base: usize) -> Self {
        Self {
            regs: RegisterBlock { base },
        }
    }
}

impl RawConsole for Stm32l4Usart {
    #[cfg_attr(all(target_arch = "arm", target_os = "none"), link_section = ".data.ramfunc")]
    #[inline(never)]
    fn put(&mut self, byte: u8) {
        self.regs.write(USART_TDR, u32::from(byte));
        while self.regs.read(USART_ISR) & ISR_TC == 0 {
            core::hint::spin_loop();
        }
    }

    #[cfg_attr(all(target_arch = "arm", target_os = "none"), link_section = ".data.ramfunc")]
    #[inline(never)]
    fn get(&mut self) -> Option<u8> {
        while self.regs.read(USART_ISR) & ISR_RXNE == 0 {
            core::hint::spin_loop();
        }
        Some((self.regs.read(USART_RDR) & 0xFF) as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flash::{FLASH_KEY1, FLASH_KEY2};

    fn word(regs: &[u32], offset: usize) -> u32 {
        regs[offset / 4]
    }

    #[test]
    fn test_flash_register_writes() {
        let mut regs = [0u32; 8];
        let mut flash = unsafe { Stm32l4Flash::from_base(regs.as_mut_ptr() as usize, 2) };
        regs[FLASH_ACR / 4] = ACR_ICEN | ACR_DCEN | 0x4;

        flash.write_key(FLASH_KEY1);
        assert_eq!(word(&regs, FLASH_KEYR), FLASH_KEY1);
        flash.write_key(FLASH_KEY2);
        assert_eq!(word(&regs, FLASH_KEYR), FLASH_KEY2);

        flash.disable_caches();
        assert_eq!(word(&regs, FLASH_ACR), 0x4);

        flash.set_mass_erase(FlashBank::Bank1);
        flash.set_mass_erase(FlashBank::Bank2);
        assert_eq!(word(&regs, FLASH_CR), CR_MER1 | CR_MER2);

        flash.start();
        flash.lock();
        assert_eq!(word(&regs, FLASH_CR), CR_MER1 | CR_MER2 | CR_STRT | CR_LOCK);
        assert_eq!(flash.bank_count(), 2);
    }

    #[test]
    fn test_flash_busy_flag() {
        let mut regs = [0u32; 8];
        let flash = unsafe { Stm32l4Flash::from_base(regs.as_mut_ptr() as usize, 1) };
        assert!(!flash.is_busy());
        regs[FLASH_SR / 4] = SR_BSY;
        assert!(flash.is_busy());
    }

    #[test]
    fn test_usart_polled_io() {
        let mut regs = [0u32; 12];
        regs[USART_ISR / 4] = ISR_RXNE | ISR_TC;
        regs[USART_RDR / 4] = 0x100 | u32::from(b'y');
        let mut usart = unsafe { Stm32l4Usart::from_base(regs.as_mut_ptr() as usize) };

        assert_eq!(usart.get(), Some(b'y'));
        usart.put(b'O');
        usart.put(b'K');
        assert_eq!(word(&regs, USART_TDR), u32::from(b'K'));
    }
}
