//! Firmware context
//!
//! Owns every peripheral the console touches. Handlers get it by `&mut`;
//! nothing is global.

use crate::console::Palette;
use fancon_core::{FanControllerConfig, FanconError, Result};
use fancon_hardware::{ConsoleTransport, FlashController, Max6650, RegisterBus};
use tracing::{error, info, warn};

/// Readiness probe trials at start-up
pub const PROBE_TRIALS: u32 = 3;

pub struct FirmwareContext<T, B, F>
where
    T: ConsoleTransport,
    B: RegisterBus,
    F: FlashController,
{
    pub transport: T,
    pub fan: Option<Max6650<B>>,
    pub flash: F,
}

impl<T, B, F> FirmwareContext<T, B, F>
where
    T: ConsoleTransport,
    B: RegisterBus,
    F: FlashController,
{
    pub fn new(transport: T, fan: Option<Max6650<B>>, flash: F) -> Self {
        Self {
            transport,
            fan,
            flash,
        }
    }

    /// Bring up the fan controller and assemble the context
    ///
    /// A missing bus, a missing configuration or a failed initialization is
    /// reported on the console; the context is still built and the fan
    /// commands answer that the controller is unavailable. A chip that
    /// initializes but does not answer the readiness probe only logs a
    /// warning.
    pub fn initialize(
        mut transport: T,
        bus: Option<B>,
        fan_config: Option<FanControllerConfig>,
        flash: F,
        palette: &Palette,
    ) -> Self {
        let fan = match Max6650::initialize(bus, fan_config) {
            Ok(mut fan) => {
                if let Err(e) = fan.probe(PROBE_TRIALS) {
                    warn!("MAX6650 at 0x{:02X} is not responding: {}", fan.address(), e);
                }
                Some(fan)
            }
            Err(e) => {
                error!("MAX6650 initialization failed: {}", e);
                let text = palette.error("MAX6650 initialization error!\r\n");
                if let Err(e) = transport.send_string(text.as_bytes()) {
                    warn!("Console write failed: {}", e);
                }
                None
            }
        };

        if fan.is_some() {
            info!("Fan controller ready");
        }
        Self::new(transport, fan, flash)
    }

    /// The fan driver, or `Unavailable` when it failed to initialize
    pub fn fan_mut(&mut self) -> Result<&mut Max6650<B>> {
        self.fan.as_mut().ok_or_else(|| {
            FanconError::Unavailable("fan controller is not initialized".to_string())
        })
    }
}
