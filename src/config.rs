use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub session: OutputConfig,
    pub audio: AudioConfig,
    pub gps: GpsConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub output_dir: PathBuf,
    /// chrono format string for the shared session timestamp
    pub timestamp_format: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            timestamp_format: "%Y%m%d%H%M".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub enabled: bool,
    pub sample_rate: u32,
    pub channels: u16,
    pub volume: Option<f32>,
    pub read_timeout_ms: u64,
    pub stop_grace_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_rate: 44100,
            channels: 1,
            volume: None,
            read_timeout_ms: 1000,
            stop_grace_ms: 5,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GpsConfig {
    pub enabled: bool,
    /// First available port when unset
    pub port: Option<String>,
    pub baud_rate: u32,
    pub timeout_ms: u64,
}

impl Default for GpsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: None,
            baud_rate: 57600,
            timeout_ms: 800,
        }
    }
}

impl Config {
    /// Load `path` (any format the `config` crate recognizes by extension).
    /// A missing file yields the defaults.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
