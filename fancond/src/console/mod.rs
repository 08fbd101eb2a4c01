//! Console loop
//!
//! Reads one whitespace-delimited token at a time, resolves it through the
//! [`CommandRegistry`] and reports the handler's outcome. Nothing a handler
//! returns ends the loop; only a failing transport does.

pub mod registry;

pub use registry::{CommandEntry, CommandRegistry, NO_PARAM};

use crate::commands::Command;
use crate::context::FirmwareContext;
use colored::{Color, Colorize};
use fancon_core::{BoardConfig, DefaultBoard, Result};
use fancon_hardware::{ConsoleTransport, FlashController, RegisterBus};
use tracing::{debug, warn};

/// Longest token kept by the line reader
pub const MAX_TOKEN_LEN: usize = DefaultBoard::CONSOLE_LINE_LENGTH - 1;

const BACKSPACE: u8 = 0x08;
const DELETE: u8 = 0x7F;

/// Console text styling
///
/// With colour disabled every method returns its input unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Palette {
    color: bool,
}

impl Palette {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    pub fn plain() -> Self {
        Self::new(false)
    }

    fn paint(&self, text: &str, color: Color) -> String {
        if self.color {
            text.color(color).to_string()
        } else {
            text.to_string()
        }
    }

    pub fn ok(&self, text: &str) -> String {
        self.paint(text, Color::Green)
    }

    pub fn error(&self, text: &str) -> String {
        self.paint(text, Color::Red)
    }

    pub fn notice(&self, text: &str) -> String {
        self.paint(text, Color::Yellow)
    }
}

/// Print the command menu
pub fn print_menu<T: ConsoleTransport>(
    transport: &mut T,
    registry: &CommandRegistry,
    palette: &Palette,
) -> Result<()> {
    let mut menu = String::from("\r\n\r\nUse next commands to control peripheral devices:\r\n");
    for entry in registry.entries() {
        menu.push_str(&format!("- {}{}\r\n", entry.name(), entry.param_hint()));
    }
    transport.send_string(palette.notice(&menu).as_bytes())?;
    transport.send_string(b"\r\n")
}

/// Read one token with echo and basic line editing
///
/// Leading whitespace is skipped and the token ends at the next whitespace
/// byte. CR and LF echo as CRLF; backspace and DEL remove the last byte and
/// echo `\b \b`. Bytes past [`MAX_TOKEN_LEN`] are echoed but dropped. A token
/// erased down to nothing is not returned; reading continues.
pub fn read_token<T: ConsoleTransport>(transport: &mut T) -> Result<String> {
    let mut token: Vec<u8> = Vec::with_capacity(MAX_TOKEN_LEN);
    loop {
        let byte = transport.receive_char()?;
        match byte {
            b'\r' | b'\n' => transport.send_string(b"\r\n")?,
            BACKSPACE | DELETE => {
                if token.pop().is_some() {
                    transport.send_string(b"\x08 \x08")?;
                }
                continue;
            }
            _ => transport.send_char(byte)?,
        }

        if byte.is_ascii_whitespace() {
            if !token.is_empty() {
                break;
            }
        } else if token.len() < MAX_TOKEN_LEN {
            token.push(byte);
        }
    }
    Ok(String::from_utf8_lossy(&token).into_owned())
}

/// What one console iteration did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    Executed { command: Command, ok: bool },
    NotFound(String),
}

/// Console front end
pub struct Console {
    registry: CommandRegistry,
    palette: Palette,
}

impl Console {
    pub fn new(registry: CommandRegistry, palette: Palette) -> Self {
        Self { registry, palette }
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn print_menu<T: ConsoleTransport>(&self, transport: &mut T) -> Result<()> {
        print_menu(transport, &self.registry, &self.palette)
    }

    /// Prompt, read one token and dispatch it
    pub fn run_once<T, B, F>(&self, ctx: &mut FirmwareContext<T, B, F>) -> Result<LineOutcome>
    where
        T: ConsoleTransport,
        B: RegisterBus,
        F: FlashController,
    {
        ctx.transport.send_string(b"\r\nWaiting for commands..\r\n\r\n")?;
        let line = read_token(&mut ctx.transport)?;
        debug!("Console line: {:?}", line);

        let Some((entry, param)) = self.registry.resolve(&line) else {
            let text = self
                .palette
                .notice(&format!("\r\nCommand \"{}\" is not found..\r\n", line));
            ctx.transport.send_string(text.as_bytes())?;
            return Ok(LineOutcome::NotFound(line));
        };

        let command = entry.command();
        let ok = match command.execute(ctx, &self.registry, &self.palette, param) {
            Ok(()) => true,
            Err(e) => {
                warn!("Command {} failed: {}", entry.name(), e);
                false
            }
        };

        let status = if ok {
            self.palette.ok("OK")
        } else {
            self.palette.error("ERROR")
        };
        ctx.transport
            .send_string(format!("Status: {}\r\n", status).as_bytes())?;
        if !ok {
            let text = self
                .palette
                .error(&format!("Function {} failed\r\n", entry.name()));
            ctx.transport.send_string(text.as_bytes())?;
        }

        Ok(LineOutcome::Executed { command, ok })
    }

    /// Print the menu, then serve lines until the transport fails
    pub fn run<T, B, F>(&self, ctx: &mut FirmwareContext<T, B, F>) -> Result<()>
    where
        T: ConsoleTransport,
        B: RegisterBus,
        F: FlashController,
    {
        self.print_menu(&mut ctx.transport)?;
        loop {
            self.run_once(ctx)?;
        }
    }
}
