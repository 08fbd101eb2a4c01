//! Serial driver for serving the console on a host serial port
//!
//! Lets the host harness stand in for the MCU on a real UART (USB-serial
//! adapter, debug-probe virtual COM port or a pty).

use crate::transport::ConsoleTransport;
use fancon_core::{BoardConfig, DefaultBoard, FanconError, Result};
use std::io::{ErrorKind, Read, Write};
use std::marker::PhantomData;
use std::time::Duration;
use tokio_serial::SerialPort;
use tracing::{debug, error};

/// Poll interval of the blocking receive loop
const POLL_INTERVAL_MS: u64 = 10;

/// Serial driver for the console link
pub struct SerialDriver<B: BoardConfig = DefaultBoard> {
    port: Box<dyn SerialPort>,
    port_path: String,
    _board: PhantomData<B>,
}

impl<B: BoardConfig> SerialDriver<B> {
    /// Open a serial port with the console's 8N1, no flow control framing
    ///
    /// # Arguments
    /// * `port_path` - Path to the serial device (e.g., "/dev/ttyACM0")
    /// * `baud_rate` - Console baud rate
    pub fn new(port_path: &str, baud_rate: u32) -> Result<Self> {
        debug!("Opening serial port: {} @ {} baud", port_path, baud_rate);

        let port = tokio_serial::new(port_path, baud_rate)
            .timeout(Duration::from_millis(POLL_INTERVAL_MS))
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open()
            .map_err(|e| {
                error!("Failed to open serial port {}: {}", port_path, e);
                FanconError::Serial(format!("Failed to open serial port: {}", e))
            })?;

        debug!("Serial port opened successfully");

        Ok(Self {
            port,
            port_path: port_path.to_string(),
            _board: PhantomData,
        })
    }

    /// Get the port path
    pub fn port_path(&self) -> &str {
        &self.port_path
    }
}

impl<B: BoardConfig> ConsoleTransport for SerialDriver<B> {
    fn send_char(&mut self, byte: u8) -> Result<()> {
        self.send_string(&[byte])
    }

    fn receive_char(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        loop {
            match self.port.read(&mut buf) {
                Ok(1) => return Ok(buf[0]),
                Ok(_) => continue,
                Err(e) if e.kind() == ErrorKind::TimedOut => continue,
                Err(e) => {
                    error!("Read error on {}: {}", self.port_path, e);
                    return Err(FanconError::Serial(format!("Read error: {}", e)));
                }
            }
        }
    }

    fn send_string(&mut self, bytes: &[u8]) -> Result<()> {
        self.port
            .write_all(bytes)
            .and_then(|_| self.port.flush())
            .map_err(|e| FanconError::Serial(format!("Write failed: {}", e)))
    }
}

/// Find the console port by the board's USB VID/PID
pub fn find_console_port<B: BoardConfig>() -> Result<String> {
    debug!(
        "Searching for {} console (VID:0x{:04X}, PID:0x{:04X})",
        B::NAME,
        B::USB_VID,
        B::USB_PID
    );

    let ports = tokio_serial::available_ports().map_err(|e| {
        error!("Failed to enumerate serial ports: {}", e);
        FanconError::Serial(format!("Failed to enumerate ports: {}", e))
    })?;

    for port in ports {
        debug!("Checking port: {}", port.port_name);

        if let tokio_serial::SerialPortType::UsbPort(info) = &port.port_type {
            debug!("  USB Device - VID:{:04X} PID:{:04X}", info.vid, info.pid);

            if info.vid == B::USB_VID && info.pid == B::USB_PID {
                debug!("Found {} console at: {}", B::NAME, port.port_name);
                return Ok(port.port_name);
            }
        }
    }

    error!("{} console not found", B::NAME);
    Err(FanconError::DeviceNotFound)
}
