use anyhow::{Context, Result};
use cabin_recorder::{Config, RecordingSession, SessionConfig};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cabin-recorder", version, about = "Synchronized in-vehicle audio and GPS recorder")]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = "config/cabin-recorder")]
    config: String,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List serial ports a GPS receiver could be attached to
    Ports,
    /// Record a session until Ctrl-C or the duration elapses
    Record(RecordArgs),
}

#[derive(Args)]
struct RecordArgs {
    /// GPS receiver port
    #[arg(long)]
    port: Option<String>,

    /// Read NMEA sentences from a file instead of a serial port
    #[arg(long, value_name = "FILE")]
    nmea_replay: Option<PathBuf>,

    /// Do not record audio
    #[arg(long)]
    no_audio: bool,

    /// Do not log GPS fixes
    #[arg(long)]
    no_gps: bool,

    /// Stop after this many seconds
    #[arg(long, value_name = "SECS")]
    duration: Option<u64>,

    /// Directory for the .wav and .csv files
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match cli.command {
        Command::Ports => {
            let ports = RecordingSession::list_available_ports()?;
            if ports.is_empty() {
                println!("No serial ports found");
            }
            for port in ports {
                println!("{}", port);
            }
            Ok(())
        }
        Command::Record(args) => {
            let cfg = Config::load(&cli.config)?;
            record(session_config(&cfg, &args), args.duration).await
        }
    }
}

fn session_config(cfg: &Config, args: &RecordArgs) -> SessionConfig {
    let mut config = SessionConfig::from(cfg);

    if let Some(port) = &args.port {
        config.gps_port = Some(port.clone());
    }
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    config.gps_replay = args.nmea_replay.clone();
    config.audio_enabled &= !args.no_audio;
    config.gps_enabled &= !args.no_gps;

    config
}

async fn record(config: SessionConfig, duration: Option<u64>) -> Result<()> {
    let mut session = RecordingSession::new(config);
    let timestamp = session.start()?;

    info!("Recording session {} (Ctrl-C to stop)", timestamp);

    match duration {
        Some(secs) => {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {
                    info!("Duration of {}s elapsed", secs);
                }
                result = tokio::signal::ctrl_c() => {
                    result.context("Failed to listen for Ctrl-C")?;
                }
            }
        }
        None => {
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
        }
    }

    // Joining the worker threads blocks
    let stats = tokio::task::spawn_blocking(move || session.stop())
        .await
        .context("Session stop task panicked")?;

    for error in &stats.errors {
        warn!("{}", error);
    }

    println!("{}", serde_json::to_string_pretty(&stats)?);

    Ok(())
}
