//! Board definitions
//!
//! Each supported board implements [`BoardConfig`] with the constants the
//! console firmware needs: console link parameters, the USB identity of the
//! debug probe's virtual COM port and the flash bank layout.
//!
//! Note: Actual hardware I/O is in the `fancon-hardware` crate. This module only
//! contains board specifications.

/// Hardware board configuration trait
///
/// # Example
///
/// ```
/// use fancon_core::board::{BoardConfig, NucleoL476};
///
/// const BANKS: u8 = NucleoL476::FLASH_BANKS;
/// assert_eq!(BANKS, 2);
/// ```
pub trait BoardConfig: Send + Sync + 'static {
    /// Human-readable board name
    const NAME: &'static str;

    /// Console baud rate
    const BAUD_RATE: u32;

    /// USB Vendor ID of the probe's virtual COM port
    const USB_VID: u16;

    /// USB Product ID of the probe's virtual COM port
    const USB_PID: u16;

    /// Number of independently mass-erasable flash banks
    const FLASH_BANKS: u8;

    /// Console input buffer length, terminator included
    const CONSOLE_LINE_LENGTH: usize;
}

/// NUCLEO-L476RG: STM32L476 with two 512 KiB flash banks, console on USART1,
/// bridged to the host through the on-board ST-LINK/V2-1.
pub struct NucleoL476;

impl BoardConfig for NucleoL476 {
    const NAME: &'static str = "NUCLEO-L476RG";
    const BAUD_RATE: u32 = 115_200;
    const USB_VID: u16 = 0x0483;
    const USB_PID: u16 = 0x374B;
    const FLASH_BANKS: u8 = 2;
    const CONSOLE_LINE_LENGTH: usize = 64;
}

/// Default board type used throughout the codebase
pub type DefaultBoard = NucleoL476;
