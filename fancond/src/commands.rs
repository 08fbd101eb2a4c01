//! Console command handlers

use crate::console::{print_menu, CommandRegistry, Palette};
use crate::context::FirmwareContext;
use fancon_core::{FanconError, Result};
use fancon_hardware::{ConsoleTransport, FlashController, RegisterBus};
use tracing::{debug, info};

/// Every command the console knows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    SetFanSpeed,
    GetFanSpeed,
    SelfErase,
    Help,
}

impl Command {
    /// Standard menu order
    pub const ALL: [Command; 4] = [
        Command::SetFanSpeed,
        Command::GetFanSpeed,
        Command::SelfErase,
        Command::Help,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Command::SetFanSpeed => "set_fan_speed",
            Command::GetFanSpeed => "get_fan_speed",
            Command::SelfErase => "self_erase",
            Command::Help => "help",
        }
    }

    pub fn param_hint(self) -> &'static str {
        match self {
            Command::SetFanSpeed => ",speed<0..100>",
            Command::GetFanSpeed | Command::Help => "",
            Command::SelfErase => " *Warning: this operation is irreversible",
        }
    }

    /// Run the handler
    ///
    /// `self_erase` does not return once the erase has been confirmed.
    pub fn execute<T, B, F>(
        self,
        ctx: &mut FirmwareContext<T, B, F>,
        registry: &CommandRegistry,
        palette: &Palette,
        param: i32,
    ) -> Result<()>
    where
        T: ConsoleTransport,
        B: RegisterBus,
        F: FlashController,
    {
        debug!("Executing {} (param {})", self.name(), param);
        match self {
            Command::SetFanSpeed => set_fan_speed(ctx, param),
            Command::GetFanSpeed => get_fan_speed(ctx),
            Command::SelfErase => self_erase(ctx),
            Command::Help => print_menu(&mut ctx.transport, registry, palette),
        }
    }
}

fn set_fan_speed<T, B, F>(ctx: &mut FirmwareContext<T, B, F>, param: i32) -> Result<()>
where
    T: ConsoleTransport,
    B: RegisterBus,
    F: FlashController,
{
    let target = u32::try_from(param).map_err(|_| {
        FanconError::InvalidInput(format!("speed should be in range 0..100, got {}", param))
    })?;

    let actual = ctx.fan_mut()?.set_speed(target)?;
    info!("Fan speed set to {}% (actual {}%)", target, actual);

    let text = format!("Set    speed: {}%\r\nActual speed: {}%\r\n", target, actual);
    ctx.transport.send_string(text.as_bytes())
}

fn get_fan_speed<T, B, F>(ctx: &mut FirmwareContext<T, B, F>) -> Result<()>
where
    T: ConsoleTransport,
    B: RegisterBus,
    F: FlashController,
{
    let actual = ctx.fan_mut()?.get_speed()?;
    let text = format!("Actual speed: {}%\r\n", actual);
    ctx.transport.send_string(text.as_bytes())
}

fn self_erase<T, B, F>(ctx: &mut FirmwareContext<T, B, F>) -> Result<()>
where
    T: ConsoleTransport,
    B: RegisterBus,
    F: FlashController,
{
    info!("Self-erase requested");
    fancon_hardware::self_erase::run(&mut ctx.transport, &mut ctx.flash)?;
    info!("Self-erase declined");
    Ok(())
}
