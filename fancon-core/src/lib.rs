//! fancon Core Library
//!
//! Shared types, board constants and configuration for the fancon console
//! firmware. Used by both the hardware crate and the console application.

pub mod board;
pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use board::*;
pub use config::{default_config_path, BusConfig, ConsoleConfig, StaticConfig};
pub use error::*;
pub use types::*;
