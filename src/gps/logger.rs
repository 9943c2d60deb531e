use anyhow::{bail, Context, Result};
use parking_lot::Mutex;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::coordinates::{CoordinateLog, HandSide, Point3, Traces};
use super::nmea::{self, GpsFix};
use super::serial::{open_serial, LineSource, ReadLineError, SerialSettings};

/// GPS logger lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggerPhase {
    Idle,
    Reading,
}

/// Configuration for the GPS logger
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Directory receiving `<timestamp>.csv`
    pub output_dir: PathBuf,
    /// Receiver port settings
    pub serial: SerialSettings,
}

/// A finished GPS log
#[derive(Debug, Clone, Default)]
pub struct GpsLog {
    /// Path of the CSV file
    pub path: PathBuf,
    /// Lines read from the receiver
    pub lines: usize,
    /// Rows written (one per fix)
    pub rows: usize,
    /// Rows carrying a position
    pub valid_fixes: usize,
    /// Rows written for void fixes
    pub void_fixes: usize,
}

/// Reads NMEA sentences on a background thread and writes one CSV row per
/// RMC fix, attaching the hand traces collected since the previous fix.
pub struct GpsLogger {
    config: LoggerConfig,
    coordinates: CoordinateLog,
    phase: Arc<Mutex<LoggerPhase>>,
    cancel: Option<CancellationToken>,
    worker: Option<JoinHandle<Result<GpsLog>>>,
}

impl GpsLogger {
    pub fn new(config: LoggerConfig, coordinates: CoordinateLog) -> Self {
        Self {
            config,
            coordinates,
            phase: Arc::new(Mutex::new(LoggerPhase::Idle)),
            cancel: None,
            worker: None,
        }
    }

    /// Handle the gesture pipeline pushes samples into
    pub fn coordinates(&self) -> CoordinateLog {
        self.coordinates.clone()
    }

    pub fn push_hand_sample(&self, side: HandSide, hand: Point3, finger: Point3) {
        self.coordinates.push(side, hand, finger);
    }

    /// Change the receiver port used by the next `start`
    pub fn set_port(&mut self, port: impl Into<String>) {
        self.config.serial.port = port.into();
    }

    pub fn phase(&self) -> LoggerPhase {
        *self.phase.lock()
    }

    pub fn is_running(&self) -> bool {
        self.phase() == LoggerPhase::Reading
    }

    /// Path the log for `timestamp` is written to
    pub fn output_path(&self, timestamp: &str) -> PathBuf {
        self.config.output_dir.join(format!("{}.csv", timestamp))
    }

    /// Open the configured serial port and start logging
    pub fn start(&mut self, timestamp: &str) -> Result<()> {
        self.reap_finished()?;

        let source = open_serial(&self.config.serial)?;
        self.start_with_source(timestamp, Box::new(source))
    }

    /// Start logging lines from an already opened source.
    ///
    /// Fails, closing `source`, while a log is still being written. A log
    /// whose input already ended is collected first.
    pub fn start_with_source(&mut self, timestamp: &str, mut source: Box<dyn LineSource>) -> Result<()> {
        if let Err(e) = self.reap_finished() {
            source.close();
            return Err(e);
        }

        let path = self.output_path(timestamp);
        if path.exists() {
            warn!("Overwriting existing GPS log: {}", path.display());
        }
        let file = match File::create(&path) {
            Ok(file) => file,
            Err(e) => {
                source.close();
                return Err(e).with_context(|| format!("Failed to create GPS log: {:?}", path));
            }
        };

        info!("Starting GPS logging: {} -> {}", source.name(), path.display());

        // Samples pushed before the session began belong to no fix
        self.coordinates.clear();

        let cancel = CancellationToken::new();
        *self.phase.lock() = LoggerPhase::Reading;

        let spawned = {
            let cancel = cancel.clone();
            let phase = Arc::clone(&self.phase);
            let coordinates = self.coordinates.clone();
            let writer = BufWriter::new(file);
            thread::Builder::new()
                .name("gps-ingest".to_string())
                .spawn(move || {
                    let result = ingest(source, writer, coordinates, cancel, path);
                    *phase.lock() = LoggerPhase::Idle;
                    result
                })
        };

        match spawned {
            Ok(worker) => {
                self.cancel = Some(cancel);
                self.worker = Some(worker);
                Ok(())
            }
            Err(e) => {
                *self.phase.lock() = LoggerPhase::Idle;
                Err(e).context("Failed to spawn GPS ingest thread")
            }
        }
    }

    /// Stop logging and wait until the CSV file is flushed and closed.
    ///
    /// Returns `None` when the logger was never started. A fatal device
    /// error during the session is returned here.
    pub fn stop(&mut self) -> Result<Option<GpsLog>> {
        let Some(worker) = self.worker.take() else {
            debug!("GPS logger not started, nothing to stop");
            return Ok(None);
        };

        info!("Stopping GPS logging");

        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }

        match worker.join() {
            Ok(result) => result.map(Some),
            Err(_) => bail!("GPS ingest thread panicked"),
        }
    }

    /// Join an ingest thread that already exited, or fail if one is running
    fn reap_finished(&mut self) -> Result<()> {
        let finished = match &self.worker {
            None => return Ok(()),
            // Idle once the thread has left its loop, even before it returns
            Some(worker) => worker.is_finished() || self.phase() == LoggerPhase::Idle,
        };
        if !finished {
            bail!("GPS logging already running");
        }

        match self.stop() {
            Ok(Some(log)) => info!(
                "Previous GPS log had ended on its own: {} ({} rows)",
                log.path.display(),
                log.rows
            ),
            Ok(None) => {}
            Err(e) => warn!("Previous GPS log failed: {:#}", e),
        }
        Ok(())
    }
}

impl Drop for GpsLogger {
    fn drop(&mut self) {
        if self.worker.is_some() {
            debug!("Dropping active GpsLogger, closing log");
            if let Err(e) = self.stop() {
                error!("GPS logging ended with error: {:#}", e);
            }
        }
    }
}

/// Format one CSV row: `time,lat,lon,{left},{right}`
pub fn format_row(fix: &GpsFix, traces: &Traces) -> String {
    format!(
        "{},{},{},{{{}}},{{{}}}",
        fix.utc_time, fix.latitude, fix.longitude, traces.left, traces.right
    )
}

fn ingest(
    mut source: Box<dyn LineSource>,
    mut writer: BufWriter<File>,
    coordinates: CoordinateLog,
    cancel: CancellationToken,
    path: PathBuf,
) -> Result<GpsLog> {
    let mut log = GpsLog {
        path,
        ..GpsLog::default()
    };

    let outcome = read_fixes(source.as_mut(), &mut writer, &coordinates, &cancel, &mut log);

    source.close();
    let flushed = writer.flush().context("Failed to flush GPS log");

    match &outcome {
        Ok(()) => info!(
            "GPS logging finished: {} rows ({} valid, {} void) from {} lines",
            log.rows, log.valid_fixes, log.void_fixes, log.lines
        ),
        Err(e) => error!("GPS logging stopped after {} rows: {:#}", log.rows, e),
    }

    outcome.and(flushed).map(|_| log)
}

fn read_fixes(
    source: &mut dyn LineSource,
    writer: &mut BufWriter<File>,
    coordinates: &CoordinateLog,
    cancel: &CancellationToken,
    log: &mut GpsLog,
) -> Result<()> {
    while !cancel.is_cancelled() {
        let line = match source.read_line() {
            Ok(line) => line,
            Err(ReadLineError::Timeout) => continue,
            Err(ReadLineError::Closed) => {
                info!("GPS input closed: {}", source.name());
                return Ok(());
            }
            Err(ReadLineError::Io(e)) => {
                return Err(e).with_context(|| format!("Failed to read from {}", source.name()));
            }
        };
        log.lines += 1;

        let Some(fix) = nmea::parse(&line) else {
            continue;
        };
        debug!("{}", line);

        let traces = coordinates.flush();
        writeln!(writer, "{}", format_row(&fix, &traces)).context("Failed to write GPS row")?;
        writer.flush().context("Failed to flush GPS row")?;

        log.rows += 1;
        if fix.valid {
            log.valid_fixes += 1;
        } else {
            log.void_fixes += 1;
        }
    }

    Ok(())
}
