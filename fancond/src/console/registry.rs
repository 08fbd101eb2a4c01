//! Command registry
//!
//! Fixed, ordered table of console commands. Table order is menu order and
//! also decides which entry wins when several names match one line.

use crate::commands::Command;
use fancon_core::{FanconError, Result};
use std::collections::HashSet;

/// Parameter value passed to handlers when none was given
pub const NO_PARAM: i32 = -1;

/// One console command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandEntry {
    name: &'static str,
    param_hint: &'static str,
    command: Command,
}

impl CommandEntry {
    pub fn new(name: &'static str, param_hint: &'static str, command: Command) -> Self {
        Self {
            name,
            param_hint,
            command,
        }
    }

    /// Entry for `command` with its standard name and hint
    pub fn standard(command: Command) -> Self {
        Self::new(command.name(), command.param_hint(), command)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Parameter description shown in the menu
    pub fn param_hint(&self) -> &'static str {
        self.param_hint
    }

    pub fn command(&self) -> Command {
        self.command
    }
}

/// Ordered command table
#[derive(Debug, Clone)]
pub struct CommandRegistry {
    entries: Vec<CommandEntry>,
}

impl CommandRegistry {
    /// Build a registry from entries in menu order
    ///
    /// Returns error if two entries share a name.
    pub fn new(entries: Vec<CommandEntry>) -> Result<Self> {
        let mut seen = HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.name) {
                return Err(FanconError::Config(format!(
                    "duplicate command name: {}",
                    entry.name
                )));
            }
        }
        Ok(Self { entries })
    }

    /// Entries in menu order
    pub fn entries(&self) -> &[CommandEntry] {
        &self.entries
    }

    /// Find the command named in `line` and its parameter
    ///
    /// An entry matches when its name occurs anywhere in the line; the
    /// first matching entry in table order wins. The parameter is the
    /// decimal number following the first `,`, or [`NO_PARAM`].
    pub fn resolve(&self, line: &str) -> Option<(&CommandEntry, i32)> {
        let entry = self.entries.iter().find(|e| line.contains(e.name))?;
        let param = line
            .split_once(',')
            .and_then(|(_, rest)| parse_leading_int(rest))
            .unwrap_or(NO_PARAM);
        Some((entry, param))
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self {
            entries: Command::ALL.iter().copied().map(CommandEntry::standard).collect(),
        }
    }
}

/// Decimal integer at the start of `text`, ignoring anything after it
///
/// Leading whitespace and one sign are accepted. Out-of-range values
/// saturate. Returns `None` when no digit follows.
pub fn parse_leading_int(text: &str) -> Option<i32> {
    let text = text.trim_start();
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    let len = digits.bytes().take_while(u8::is_ascii_digit).count();
    if len == 0 {
        return None;
    }

    let mut value: i64 = 0;
    for byte in digits[..len].bytes() {
        value = (value * 10 + i64::from(byte - b'0')).min(i64::from(i32::MAX) + 1);
    }
    if negative {
        value = -value;
    }
    Some(value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32)
}
