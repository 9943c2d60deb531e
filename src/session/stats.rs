use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::PathBuf;

use crate::audio::AudioRecording;
use crate::gps::GpsLog;

/// Statistics about a recording session
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionStats {
    /// Shared timestamp naming the output files
    pub timestamp: Option<String>,

    /// When the session started
    pub started_at: Option<DateTime<Local>>,

    /// Total duration in seconds
    pub duration_secs: f64,

    /// Audio recording, if one was written
    pub audio: Option<AudioStats>,

    /// GPS log, if one was written
    pub gps: Option<GpsStats>,

    /// Failures of either loop
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AudioStats {
    pub path: PathBuf,
    pub sample_rate: u32,
    pub channels: u16,
    /// Bytes of sample data in the file
    pub data_size: u32,
    pub buffers: usize,
    /// Device error that ended capture early
    pub early_stop: Option<String>,
}

impl From<&AudioRecording> for AudioStats {
    fn from(recording: &AudioRecording) -> Self {
        Self {
            path: recording.path.clone(),
            sample_rate: recording.descriptor.sample_rate,
            channels: recording.descriptor.channels,
            data_size: recording.descriptor.data_size,
            buffers: recording.buffers,
            early_stop: recording.early_stop.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GpsStats {
    pub path: PathBuf,
    pub rows: usize,
    pub valid_fixes: usize,
    pub void_fixes: usize,
}

impl From<&GpsLog> for GpsStats {
    fn from(log: &GpsLog) -> Self {
        Self {
            path: log.path.clone(),
            rows: log.rows,
            valid_fixes: log.valid_fixes,
            void_fixes: log.void_fixes,
        }
    }
}
