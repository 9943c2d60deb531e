use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::audio::{AudioSourceConfig, RecorderConfig};
use crate::config::Config;
use crate::gps::{LoggerConfig, SerialSettings};

/// Configuration for a recording session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Directory receiving `<timestamp>.wav` and `<timestamp>.csv`
    pub output_dir: PathBuf,

    /// chrono format of the shared session timestamp
    /// Default: `%Y%m%d%H%M`
    pub timestamp_format: String,

    /// Record audio
    pub audio_enabled: bool,

    /// Sample rate requested from the audio device
    pub sample_rate: u32,

    /// Number of audio channels (1 = mono)
    pub channels: u16,

    /// Input level set after the audio stream opens
    pub volume: Option<f32>,

    /// Longest a single audio read may block
    pub read_timeout: Duration,

    /// Wait between signalling the audio thread and joining it
    pub stop_grace: Duration,

    /// Log GPS fixes
    pub gps_enabled: bool,

    /// Receiver port; the first available port when unset
    pub gps_port: Option<String>,

    /// Replay NMEA sentences from a file instead of a serial port
    pub gps_replay: Option<PathBuf>,

    pub baud_rate: u32,

    /// Serial read timeout
    pub gps_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for SessionConfig {
    fn from(cfg: &Config) -> Self {
        Self {
            output_dir: cfg.session.output_dir.clone(),
            timestamp_format: cfg.session.timestamp_format.clone(),
            audio_enabled: cfg.audio.enabled,
            sample_rate: cfg.audio.sample_rate,
            channels: cfg.audio.channels,
            volume: cfg.audio.volume,
            read_timeout: Duration::from_millis(cfg.audio.read_timeout_ms),
            stop_grace: Duration::from_millis(cfg.audio.stop_grace_ms),
            gps_enabled: cfg.gps.enabled,
            gps_port: cfg.gps.port.clone(),
            gps_replay: None,
            baud_rate: cfg.gps.baud_rate,
            gps_timeout: Duration::from_millis(cfg.gps.timeout_ms),
        }
    }
}

impl SessionConfig {
    pub fn recorder_config(&self) -> RecorderConfig {
        RecorderConfig {
            output_dir: self.output_dir.clone(),
            volume: self.volume,
            stop_grace: self.stop_grace,
            ..RecorderConfig::default()
        }
    }

    pub fn audio_source_config(&self) -> AudioSourceConfig {
        AudioSourceConfig {
            sample_rate: self.sample_rate,
            channels: self.channels,
            read_timeout_ms: self.read_timeout.as_millis() as u64,
        }
    }

    /// Logger settings for `port`
    pub fn logger_config(&self, port: &str) -> LoggerConfig {
        LoggerConfig {
            output_dir: self.output_dir.clone(),
            serial: SerialSettings {
                port: port.to_string(),
                baud_rate: self.baud_rate,
                timeout_ms: self.gps_timeout.as_millis() as u64,
            },
        }
    }
}
