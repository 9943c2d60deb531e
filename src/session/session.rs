use super::config::SessionConfig;
use super::stats::{AudioStats, GpsStats, SessionStats};
use crate::audio::{AudioInput, AudioRecorder, AudioSource, AudioSourceFactory};
use crate::gps::{list_ports, open_serial, CoordinateLog, GpsLogger, HandSide, LineReader, LineSource, Point3};
use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Local};
use std::fmt::Write;
use std::fs::{self, File};
use tracing::{debug, error, info, warn};

/// Opened inputs for one session; a `None` input leaves that loop idle
#[derive(Default)]
pub struct SessionInputs {
    pub audio: Option<Box<dyn AudioSource>>,
    pub gps: Option<Box<dyn LineSource>>,
}

/// A recording session that runs the audio recorder and the GPS logger
/// under one shared timestamp.
///
/// The two loops are independent: one failing to start, or failing
/// mid-session, does not stop the other.
pub struct RecordingSession {
    /// Session configuration
    config: SessionConfig,

    recorder: AudioRecorder,

    logger: GpsLogger,

    /// Timestamp of the running session
    timestamp: Option<String>,

    /// When the session started
    started_at: Option<DateTime<Local>>,

    /// Failures collected since the session started
    errors: Vec<String>,
}

impl RecordingSession {
    pub fn new(config: SessionConfig) -> Self {
        let recorder = AudioRecorder::new(config.recorder_config());
        let logger = GpsLogger::new(
            config.logger_config(config.gps_port.as_deref().unwrap_or_default()),
            CoordinateLog::new(),
        );

        Self {
            config,
            recorder,
            logger,
            timestamp: None,
            started_at: None,
            errors: Vec::new(),
        }
    }

    /// Serial ports a GPS receiver could be attached to
    pub fn list_available_ports() -> Result<Vec<String>> {
        list_ports()
    }

    /// Handle for the gesture pipeline
    pub fn coordinates(&self) -> CoordinateLog {
        self.logger.coordinates()
    }

    pub fn push_hand_sample(&self, side: HandSide, hand: Point3, finger: Point3) {
        self.logger.push_hand_sample(side, hand, finger);
    }

    /// Timestamp of the running session
    pub fn timestamp(&self) -> Option<&str> {
        self.timestamp.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.timestamp.is_some()
    }

    pub fn recorder(&self) -> &AudioRecorder {
        &self.recorder
    }

    pub fn logger(&self) -> &GpsLogger {
        &self.logger
    }

    /// Start a session timestamped now; returns the timestamp
    pub fn start(&mut self) -> Result<String> {
        let mut timestamp = String::new();
        write!(timestamp, "{}", Local::now().format(&self.config.timestamp_format))
            .map_err(|_| anyhow!("Invalid timestamp format: {}", self.config.timestamp_format))?;
        self.start_at(&timestamp)?;
        Ok(timestamp)
    }

    /// Open the configured devices and start every enabled loop
    pub fn start_at(&mut self, timestamp: &str) -> Result<()> {
        if self.is_active() {
            warn!("Recording session already started");
            return Ok(());
        }

        fs::create_dir_all(&self.config.output_dir)
            .with_context(|| format!("Failed to create output directory: {:?}", self.config.output_dir))?;

        let mut inputs = SessionInputs::default();
        let mut failures = Vec::new();

        if self.config.audio_enabled {
            match AudioSourceFactory::create(AudioInput::Microphone, self.config.audio_source_config()) {
                Ok(source) => inputs.audio = Some(source),
                Err(e) => failures.push(failure("audio", &e)),
            }
        }

        if self.config.gps_enabled {
            match self.open_gps() {
                Ok(source) => inputs.gps = Some(source),
                Err(e) => failures.push(failure("gps", &e)),
            }
        }

        self.launch(timestamp, inputs, failures)
    }

    /// Start the loops on inputs the caller already opened
    pub fn start_with(&mut self, timestamp: &str, inputs: SessionInputs) -> Result<()> {
        if self.is_active() {
            warn!("Recording session already started");
            return Ok(());
        }

        self.launch(timestamp, inputs, Vec::new())
    }

    /// Stop both loops and collect what they wrote.
    ///
    /// Stopping a session that never started returns empty statistics.
    pub fn stop(&mut self) -> SessionStats {
        if !self.is_active() {
            debug!("Recording session not active");
        } else {
            info!("Stopping recording session: {}", self.timestamp.as_deref().unwrap_or_default());
        }

        let mut stats = SessionStats {
            timestamp: self.timestamp.take(),
            started_at: self.started_at.take(),
            ..SessionStats::default()
        };

        match self.recorder.stop() {
            Ok(Some(recording)) => stats.audio = Some(AudioStats::from(&recording)),
            Ok(None) => {}
            Err(e) => self.errors.push(failure("audio", &e)),
        }

        match self.logger.stop() {
            Ok(Some(log)) => stats.gps = Some(GpsStats::from(&log)),
            Ok(None) => {}
            Err(e) => self.errors.push(failure("gps", &e)),
        }

        if let Some(started_at) = stats.started_at {
            let duration = Local::now().signed_duration_since(started_at);
            stats.duration_secs = duration.num_milliseconds() as f64 / 1000.0;
        }
        stats.errors = std::mem::take(&mut self.errors);

        info!("Recording session stopped ({:.1}s)", stats.duration_secs);
        stats
    }

    fn launch(&mut self, timestamp: &str, inputs: SessionInputs, failures: Vec<String>) -> Result<()> {
        info!("Starting recording session: {}", timestamp);

        self.errors = failures;
        let mut started = 0;

        if let Some(source) = inputs.audio {
            match self.recorder.start(timestamp, source) {
                Ok(()) => started += 1,
                Err(e) => self.errors.push(failure("audio", &e)),
            }
        }

        if let Some(source) = inputs.gps {
            match self.logger.start_with_source(timestamp, source) {
                Ok(()) => started += 1,
                Err(e) => self.errors.push(failure("gps", &e)),
            }
        }

        if started == 0 {
            let reasons = std::mem::take(&mut self.errors);
            if reasons.is_empty() {
                bail!("Nothing to record: audio and GPS are both disabled");
            }
            bail!("Recording session {} failed to start: {}", timestamp, reasons.join("; "));
        }

        self.timestamp = Some(timestamp.to_string());
        self.started_at = Some(Local::now());

        info!("Recording session started successfully");
        Ok(())
    }

    fn open_gps(&mut self) -> Result<Box<dyn LineSource>> {
        if let Some(path) = &self.config.gps_replay {
            let file = File::open(path)
                .with_context(|| format!("Failed to open NMEA replay file: {:?}", path))?;
            return Ok(Box::new(LineReader::new(file, path.display().to_string())));
        }

        let port = match &self.config.gps_port {
            Some(port) => port.clone(),
            None => list_ports()?
                .into_iter()
                .next()
                .context("No serial ports available for the GPS receiver")?,
        };

        let settings = self.config.logger_config(&port).serial;
        self.logger.set_port(port);

        Ok(Box::new(open_serial(&settings)?))
    }
}

fn failure(what: &str, e: &anyhow::Error) -> String {
    error!("{} failed: {:#}", what, e);
    format!("{}: {:#}", what, e)
}
