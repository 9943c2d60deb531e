use anyhow::{anyhow, bail, Context, Result};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::buffer::SessionBuffer;
use super::source::{AudioSource, AudioStream};
use super::wave::{write_wave_file, WaveDescriptor, MAX_DATA_SIZE};

/// Audio recorder lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderPhase {
    Idle,
    Recording,
    Finalizing,
}

/// Configuration for the audio recorder
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Directory receiving `<timestamp>.wav`
    pub output_dir: PathBuf,
    /// Input level set on the stream after it opens
    pub volume: Option<f32>,
    /// Wait between signalling stop and joining the capture thread
    pub stop_grace: Duration,
    /// Most sample bytes one file may hold; capture ends early at this size
    pub data_limit: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            volume: None,
            stop_grace: Duration::from_millis(5),
            data_limit: MAX_DATA_SIZE,
        }
    }
}

/// A finished recording
#[derive(Debug, Clone)]
pub struct AudioRecording {
    /// Path of the WAV file
    pub path: PathBuf,
    /// Format and size written to the header
    pub descriptor: WaveDescriptor,
    /// Size implied by the sample counts the device reported
    pub reported_size: u64,
    /// Number of buffers read from the device
    pub buffers: usize,
    /// Device error that ended the recording before stop was requested
    pub early_stop: Option<String>,
}

/// Records one audio stream into a WAV file on a background thread.
///
/// The whole session is accumulated in memory; the file is written once,
/// after the capture loop exits, because the header needs the final size.
pub struct AudioRecorder {
    config: RecorderConfig,
    phase: Arc<Mutex<RecorderPhase>>,
    cancel: Option<CancellationToken>,
    worker: Option<JoinHandle<Result<AudioRecording>>>,
}

impl AudioRecorder {
    pub fn new(config: RecorderConfig) -> Self {
        Self {
            config,
            phase: Arc::new(Mutex::new(RecorderPhase::Idle)),
            cancel: None,
            worker: None,
        }
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> RecorderPhase {
        *self.phase.lock()
    }

    pub fn is_recording(&self) -> bool {
        self.phase() == RecorderPhase::Recording
    }

    /// Path the recording for `timestamp` is written to
    pub fn output_path(&self, timestamp: &str) -> PathBuf {
        self.config.output_dir.join(format!("{}.wav", timestamp))
    }

    /// Open `source` and start capturing.
    ///
    /// Returns once the stream is open. A source that cannot be opened is
    /// reported here and no file is created. Fails while a recording is
    /// still running; a recording that ended on its own is finalized first.
    pub fn start(&mut self, timestamp: &str, source: Box<dyn AudioSource>) -> Result<()> {
        self.reap_finished()?;

        let path = self.output_path(timestamp);
        if path.exists() {
            warn!("Overwriting existing recording: {}", path.display());
        }
        let cancel = CancellationToken::new();
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);

        info!("Starting audio recording: {} -> {}", source.name(), path.display());

        let worker = {
            let cancel = cancel.clone();
            let phase = Arc::clone(&self.phase);
            let volume = self.config.volume;
            let limit = self.config.data_limit;
            thread::Builder::new()
                .name("audio-capture".to_string())
                .spawn(move || capture(source, volume, limit, path, cancel, phase, ready_tx))
                .context("Failed to spawn audio capture thread")?
        };

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.cancel = Some(cancel);
                self.worker = Some(worker);
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = worker.join();
                Err(e)
            }
            Err(_) => {
                let _ = worker.join();
                Err(anyhow!("Audio capture thread exited during startup"))
            }
        }
    }

    /// Stop capturing and wait for the WAV file to be written.
    ///
    /// Returns `None` when the recorder was never started.
    pub fn stop(&mut self) -> Result<Option<AudioRecording>> {
        let Some(worker) = self.worker.take() else {
            debug!("Audio recorder not started, nothing to stop");
            return Ok(None);
        };

        info!("Stopping audio recording");

        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        thread::sleep(self.config.stop_grace);

        match worker.join() {
            Ok(result) => result.map(Some),
            Err(_) => bail!("Audio capture thread panicked"),
        }
    }

    /// Join a capture thread that already exited, or fail if one is running
    fn reap_finished(&mut self) -> Result<()> {
        let finished = match &self.worker {
            None => return Ok(()),
            // Idle once the thread has left its loop, even before it returns
            Some(worker) => worker.is_finished() || self.phase() == RecorderPhase::Idle,
        };
        if !finished {
            bail!("Audio recording already running");
        }

        match self.stop() {
            Ok(Some(recording)) => info!(
                "Previous recording had ended on its own: {} ({} bytes)",
                recording.path.display(),
                recording.descriptor.data_size
            ),
            Ok(None) => {}
            Err(e) => warn!("Previous recording failed: {:#}", e),
        }
        Ok(())
    }
}

impl Drop for AudioRecorder {
    fn drop(&mut self) {
        if self.worker.is_some() {
            debug!("Dropping active AudioRecorder, finalizing recording");
            if let Err(e) = self.stop() {
                error!("Failed to finalize audio recording on drop: {:#}", e);
            }
        }
    }
}

/// Resets the shared phase to idle however the capture thread exits
struct PhaseGuard(Arc<Mutex<RecorderPhase>>);

impl PhaseGuard {
    fn set(&self, phase: RecorderPhase) {
        *self.0.lock() = phase;
    }
}

impl Drop for PhaseGuard {
    fn drop(&mut self) {
        self.set(RecorderPhase::Idle);
    }
}

fn open_stream(source: &mut dyn AudioSource, volume: Option<f32>) -> Result<Box<dyn AudioStream>> {
    let mut stream = source
        .open()
        .with_context(|| format!("Failed to open audio source: {}", source.name()))?;

    if let Some(level) = volume {
        stream
            .set_volume(level)
            .with_context(|| format!("Failed to set input volume to {}", level))?;
    }

    Ok(stream)
}

fn capture(
    mut source: Box<dyn AudioSource>,
    volume: Option<f32>,
    limit: usize,
    path: PathBuf,
    cancel: CancellationToken,
    phase: Arc<Mutex<RecorderPhase>>,
    ready: mpsc::SyncSender<Result<()>>,
) -> Result<AudioRecording> {
    let phase = PhaseGuard(phase);

    let mut stream = match open_stream(source.as_mut(), volume) {
        Ok(stream) => stream,
        Err(e) => {
            error!("Audio recording failed to start: {:#}", e);
            let _ = ready.send(Err(e));
            bail!("Audio source did not open");
        }
    };

    let channels = stream.channels();
    let sample_rate = stream.sample_rate();

    phase.set(RecorderPhase::Recording);
    let _ = ready.send(Ok(()));
    info!("Begin audio recording ({}Hz, {} channels)", sample_rate, channels);

    let mut buffer = SessionBuffer::with_limit(limit);
    let mut early_stop = None;

    while !cancel.is_cancelled() {
        match stream.read_next() {
            Ok(chunk) if buffer.would_overflow(&chunk) => {
                warn!("WAVE size limit reached after {} bytes, ending recording", buffer.len());
                early_stop = Some(format!("WAVE size limit of {} bytes reached", limit));
                break;
            }
            Ok(chunk) => buffer.append(&chunk),
            Err(e) => {
                error!("Audio read failed, keeping {} bytes captured so far: {:#}", buffer.len(), e);
                early_stop = Some(format!("{:#}", e));
                break;
            }
        }
    }

    if let Err(e) = stream.close() {
        warn!("Failed to close audio stream: {:#}", e);
    }
    drop(stream);

    info!("End audio recording ({} buffers)", buffer.buffers());
    phase.set(RecorderPhase::Finalizing);

    let reported_size = buffer.reported_size();
    let buffers = buffer.buffers();
    if reported_size != buffer.len() as u64 {
        warn!(
            "Device reported {} bytes of samples but {} bytes were captured; header uses captured size",
            reported_size,
            buffer.len()
        );
    }

    let descriptor = write_wave_file(&path, channels, sample_rate, &buffer.into_bytes())?;

    Ok(AudioRecording {
        path,
        descriptor,
        reported_size,
        buffers,
        early_stop,
    })
}
