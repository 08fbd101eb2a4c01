//! fancon console harness
//!
//! Runs the firmware console on a host: over stdin/stdout, or over a serial
//! port so a terminal sees exactly what it would see on the board's UART.
//!
//! The host has no MAX6650 bus; `--mock` attaches a simulated chip. The
//! flash is always simulated, so `self_erase` is safe to try here.

use anyhow::Result;
use clap::Parser;
use fancon_core::{default_config_path, BoardConfig, DefaultBoard, StaticConfig};
use fancon_hardware::sim::{SimulatedFlash, SimulatedMax6650};
use fancon_hardware::{
    find_console_port, BusSpeed, ConsoleTransport, RecoveringBus, SerialDriver, StdioTransport,
};
use fancond::{CommandRegistry, Console, FirmwareContext, Palette};
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info, warn};

/// fancon console harness
#[derive(Parser, Debug)]
#[command(name = "fancond")]
#[command(version, about = "fancon fan controller console", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial device to serve the console on (e.g. /dev/ttyACM0), or "auto"
    /// to look for the board's debug probe
    ///
    /// Takes precedence over `console.device` in the config file. Without a
    /// device the console uses stdin/stdout.
    #[arg(short, long)]
    device: Option<String>,

    /// Attach a simulated MAX6650
    #[arg(long)]
    mock: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Disable console colours
    #[arg(long)]
    no_color: bool,
}

/// Console transport selected at start-up
enum HostTransport {
    Stdio(StdioTransport),
    Serial(SerialDriver),
}

impl ConsoleTransport for HostTransport {
    fn send_char(&mut self, byte: u8) -> fancon_core::Result<()> {
        match self {
            HostTransport::Stdio(t) => t.send_char(byte),
            HostTransport::Serial(t) => t.send_char(byte),
        }
    }

    fn receive_char(&mut self) -> fancon_core::Result<u8> {
        match self {
            HostTransport::Stdio(t) => t.receive_char(),
            HostTransport::Serial(t) => t.receive_char(),
        }
    }

    fn send_string(&mut self, bytes: &[u8]) -> fancon_core::Result<()> {
        match self {
            HostTransport::Stdio(t) => t.send_string(bytes),
            HostTransport::Serial(t) => t.send_string(bytes),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout may be the console
    init_tracing(args.verbose);

    info!("fancon console starting...");

    // Determine config path: CLI flag > env var > default
    let config_path = args.config.clone().unwrap_or_else(|| {
        std::env::var("FANCON_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_config_path())
    });
    info!("Configuration file: {}", config_path.display());

    let config = StaticConfig::load(&config_path)?;
    info!("Configuration loaded successfully");

    let color = config.console.color && !args.no_color;
    colored::control::set_override(color);
    let palette = Palette::new(color);

    let transport = open_transport(&args, &config)?;

    let bus_speed = BusSpeed::from_fast_mode(config.bus.fast_mode);
    let bus = if args.mock {
        let address = config
            .fan
            .map(|fan| fan.address_line.bus_address())
            .unwrap_or_default();
        info!("Mock mode: simulated MAX6650 at 0x{:02X}", address);
        Some(RecoveringBus::new(
            SimulatedMax6650::new(address),
            bus_speed,
            config.bus.attempts,
        )?)
    } else {
        warn!("No register bus on this host; fan commands need --mock");
        None
    };

    let flash = SimulatedFlash::new(DefaultBoard::FLASH_BANKS);
    let mut ctx = FirmwareContext::initialize(transport, bus, config.fan, flash, &palette);
    let console = Console::new(CommandRegistry::default(), palette);

    let worker = tokio::task::spawn_blocking(move || console.run(&mut ctx));

    tokio::select! {
        result = worker => match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => info!("Console closed: {}", e),
            Err(e) => error!("Console worker failed: {}", e),
        },
        _ = shutdown_signal() => {}
    }

    info!("fancon console stopped");
    // The worker may still be blocked in a read; do not wait for it
    std::process::exit(0)
}

fn open_transport(args: &Args, config: &StaticConfig) -> Result<HostTransport> {
    let device = args.device.clone().or_else(|| config.console.device.clone());
    let Some(device) = device else {
        info!("Console on stdin/stdout");
        return Ok(HostTransport::Stdio(StdioTransport::new()));
    };

    let path = if device == "auto" {
        find_console_port::<DefaultBoard>()?
    } else {
        device
    };

    let driver: SerialDriver = SerialDriver::new(&path, config.console.baud_rate)?;
    info!(
        "Console on {} @ {} baud",
        driver.port_path(),
        config.console.baud_rate
    );
    Ok(HostTransport::Serial(driver))
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        },
    }
}

/// Initialize tracing subscriber for logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
