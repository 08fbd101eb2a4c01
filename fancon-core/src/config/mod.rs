//! Configuration types for fancon
//!
//! On the device every value is a compiled-in constant; the defaults of
//! [`StaticConfig`] reproduce those constants. The host harness can override
//! them from a TOML file read once at start-up.

mod paths;
mod static_config;

pub use paths::default_config_path;
pub use static_config::{BusConfig, ConsoleConfig, StaticConfig};
