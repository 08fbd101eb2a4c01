//! Post-erase console primitive
//!
//! The erase path cannot build error values or log, so this trait only
//! moves bytes: a failed transmit is dropped and a failed receive is `None`.

/// Polled byte console
pub trait RawConsole {
    /// Transmit one byte, blocking until it has left the transmitter
    fn put(&mut self, byte: u8);

    /// Block until one byte is received; `None` if the receiver failed
    fn get(&mut self) -> Option<u8>;
}

impl<C: RawConsole + ?Sized> RawConsole for &mut C {
    #[cfg_attr(all(target_arch = "arm", target_os = "none"), link_section = ".data.ramfunc")]
    #[inline(always)]
    fn put(&mut self, byte: u8) {
        (**self).put(byte)
    }

    #[cfg_attr(all(target_arch = "arm", target_os = "none"), link_section = ".data.ramfunc")]
    #[inline(always)]
    fn get(&mut self) -> Option<u8> {
        (**self).get()
    }
}
