//! Console transport primitive
//!
//! Polled, byte-at-a-time I/O with no buffering beyond one character. The
//! self-erase sequence reaches a transport through
//! [`TransportConsole`](crate::self_erase::TransportConsole); on the device
//! the post-erase console is a `fancon_flash::RawConsole` instead.

use fancon_core::{FanconError, Result};
use std::io::{Read, Write};

/// Trait for console transport abstraction
///
/// Enables testing of the console and the erase sequencer without a UART by
/// allowing scripted implementations.
pub trait ConsoleTransport {
    /// Send one byte, blocking until it has left the transmitter
    fn send_char(&mut self, byte: u8) -> Result<()>;

    /// Block until one byte has been received
    fn receive_char(&mut self) -> Result<u8>;

    /// Send a byte string
    fn send_string(&mut self, bytes: &[u8]) -> Result<()> {
        for byte in bytes {
            self.send_char(*byte)?;
        }
        Ok(())
    }
}

impl<T: ConsoleTransport + ?Sized> ConsoleTransport for &mut T {
    fn send_char(&mut self, byte: u8) -> Result<()> {
        (**self).send_char(byte)
    }

    fn receive_char(&mut self) -> Result<u8> {
        (**self).receive_char()
    }

    fn send_string(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).send_string(bytes)
    }
}

/// Console over the host process's stdin/stdout
///
/// Used by the host harness when no serial device is configured.
pub struct StdioTransport {
    stdin: std::io::Stdin,
    stdout: std::io::Stdout,
}

impl StdioTransport {
    pub fn new() -> Self {
        Self {
            stdin: std::io::stdin(),
            stdout: std::io::stdout(),
        }
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleTransport for StdioTransport {
    fn send_char(&mut self, byte: u8) -> Result<()> {
        self.send_string(&[byte])
    }

    fn receive_char(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        match self.stdin.lock().read(&mut buf)? {
            0 => Err(FanconError::Transport("stdin closed".to_string())),
            _ => Ok(buf[0]),
        }
    }

    fn send_string(&mut self, bytes: &[u8]) -> Result<()> {
        let mut out = self.stdout.lock();
        out.write_all(bytes)?;
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder(Vec<u8>);

    impl ConsoleTransport for Recorder {
        fn send_char(&mut self, byte: u8) -> Result<()> {
            self.0.push(byte);
            Ok(())
        }

        fn receive_char(&mut self) -> Result<u8> {
            Err(FanconError::Transport("no input".to_string()))
        }
    }

    #[test]
    fn test_send_string_default_sends_every_byte() {
        let mut rec = Recorder(Vec::new());
        rec.send_string(b"OK\r\n").unwrap();
        assert_eq!(rec.0, b"OK\r\n");
    }

    #[test]
    fn test_mut_reference_forwards() {
        fn greet<T: ConsoleTransport>(mut transport: T) -> Result<u8> {
            transport.send_string(b"hi")?;
            transport.receive_char()
        }

        let mut rec = Recorder(Vec::new());
        assert!(greet(&mut rec).is_err());
        assert_eq!(rec.0, b"hi");
    }
}
