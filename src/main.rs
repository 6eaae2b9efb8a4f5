//! `cytation` command-line tool
//!
//! Runs single operations against a Cytation 5 on the configured serial port and
//! prints results as JSON.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use cytation_daq::config::Settings;
use cytation_daq::payload::ShakeType;
use cytation_daq::{AppResult, Cytation5};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// TOML settings file (defaults to ./cytation.toml when present)
    #[clap(short, long, value_hint = clap::ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Serial port, overriding the configured one
    #[clap(short, long)]
    port: Option<String>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print serial number, firmware version and temperature
    Info,
    /// Move the plate carrier out
    Open,
    /// Move the plate carrier in
    Close,
    /// Read absorbance of the whole plate
    Absorbance {
        /// Wavelength in nm (230-999)
        wavelength: u32,
    },
    /// Read luminescence of the whole plate
    Luminescence {
        /// Read height in mm (4.5-13.88)
        focal_height: f64,
    },
    /// Read fluorescence of the whole plate
    Fluorescence {
        /// Excitation wavelength in nm (250-700)
        excitation: u32,
        /// Emission wavelength in nm (250-700)
        emission: u32,
        /// Read height in mm (4.5-13.88)
        focal_height: f64,
    },
    /// Shake for a number of seconds, then stop
    Shake {
        #[clap(value_enum)]
        motion: Motion,
        seconds: u64,
    },
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Motion {
    Linear,
    Orbital,
}

impl From<Motion> for ShakeType {
    fn from(motion: Motion) -> Self {
        match motion {
            Motion::Linear => ShakeType::Linear,
            Motion::Orbital => ShakeType::Orbital,
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[cfg(feature = "instrument_serial")]
fn connect(settings: Settings) -> AppResult<Cytation5> {
    Cytation5::connect(settings)
}

#[cfg(not(feature = "instrument_serial"))]
fn connect(_settings: Settings) -> AppResult<Cytation5> {
    Err(cytation_daq::DaqError::SerialFeatureDisabled)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => Settings::load().context("Failed to load settings")?,
    };
    if let Some(port) = cli.port {
        settings.serial.port = port;
    }
    init_logging(&settings.application.log_level);

    let mut reader = connect(settings)?;
    let result = run(&reader, cli.command).await;
    if let Err(e) = reader.shutdown().await {
        warn!(error = %e, "Shutdown failed");
    }
    result
}

async fn run(reader: &Cytation5, command: Commands) -> Result<()> {
    let output = match command {
        Commands::Info => serde_json::json!({
            "serial_number": reader.get_serial_number().await?,
            "firmware_version": reader.get_firmware_version().await?,
            "temperature_c": reader.get_current_temperature().await?,
        }),
        Commands::Open => {
            reader.open().await?;
            serde_json::json!({ "carrier": "open" })
        }
        Commands::Close => {
            reader.close().await?;
            serde_json::json!({ "carrier": "closed" })
        }
        Commands::Absorbance { wavelength } => {
            serde_json::to_value(reader.read_absorbance(wavelength).await?)?
        }
        Commands::Luminescence { focal_height } => {
            serde_json::to_value(reader.read_luminescence(focal_height).await?)?
        }
        Commands::Fluorescence {
            excitation,
            emission,
            focal_height,
        } => serde_json::to_value(
            reader
                .read_fluorescence(excitation, emission, focal_height)
                .await?,
        )?,
        Commands::Shake { motion, seconds } => {
            let elapsed = shake_for(
                reader,
                motion.into(),
                Duration::from_secs(seconds),
                tokio::signal::ctrl_c(),
            )
            .await?;
            serde_json::json!({ "shaken_for_s": elapsed.as_secs_f64() })
        }
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Shake for `limit` or until `interrupt` resolves, returning how long it ran.
async fn shake_for<F>(
    reader: &Cytation5,
    shake_type: ShakeType,
    limit: Duration,
    interrupt: F,
) -> AppResult<Duration>
where
    F: Future,
{
    reader.shake(shake_type).await?;
    let started = Instant::now();
    tokio::select! {
        _ = tokio::time::sleep(limit) => {}
        _ = interrupt => info!("Interrupted"),
    }
    let elapsed = started.elapsed();
    reader.stop_shaking().await?;
    Ok(elapsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cytation_daq::adapters::MockChannel;
    use cytation_daq::transport::TRIGGER_ACK;

    fn reader() -> Cytation5 {
        let (channel, _handle) = MockChannel::with_responder(|written| match written {
            b"O" => TRIGGER_ACK.to_vec(),
            b"x" => Vec::new(),
            [_] => b"\x06".to_vec(),
            _ => b"\x03".to_vec(),
        });
        Cytation5::new(channel, Settings::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupted_shake_reports_elapsed_time() {
        let reader = reader();
        let interrupt = tokio::time::sleep(Duration::from_secs(3));

        let elapsed = shake_for(&reader, ShakeType::Orbital, Duration::from_secs(60), interrupt)
            .await
            .unwrap();
        assert!(elapsed >= Duration::from_secs(3));
        assert!(elapsed < Duration::from_secs(4));
        assert!(!reader.is_shaking().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_shake_reports_limit() {
        let reader = reader();

        let elapsed = shake_for(
            &reader,
            ShakeType::Linear,
            Duration::from_secs(5),
            std::future::pending::<()>(),
        )
        .await
        .unwrap();
        assert!(elapsed >= Duration::from_secs(5));
        assert!(elapsed < Duration::from_secs(6));
    }
}
