// Integration tests for the recording session
//
// These tests run the audio recorder and GPS logger together on in-memory
// inputs and check that they share a timestamp and fail independently.

use anyhow::{bail, Result};
use cabin_recorder::audio::{AudioBuffer, AudioSource, AudioStream};
use cabin_recorder::gps::{HandSide, LineSource, Point3, ReadLineError};
use cabin_recorder::{RecordingSession, SessionConfig, SessionInputs};
use std::fs;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

struct ToneSource {
    fail_open: bool,
}

impl AudioSource for ToneSource {
    fn open(&mut self) -> Result<Box<dyn AudioStream>> {
        if self.fail_open {
            bail!("no capture device");
        }
        Ok(Box::new(ToneStream))
    }

    fn name(&self) -> &str {
        "tone"
    }
}

struct ToneStream;

impl AudioStream for ToneStream {
    fn read_next(&mut self) -> Result<AudioBuffer> {
        thread::sleep(Duration::from_millis(2));
        Ok(AudioBuffer::from_samples(&[100, -100, 100, -100]))
    }

    fn set_volume(&mut self, _level: f32) -> Result<()> {
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        44100
    }

    fn channels(&self) -> u16 {
        1
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Hands out its lines, then times out until the session stops
struct ScriptedLines {
    lines: Vec<String>,
}

impl ScriptedLines {
    fn new(lines: &[&str]) -> Self {
        Self {
            lines: lines.iter().rev().map(|l| l.to_string()).collect(),
        }
    }
}

impl LineSource for ScriptedLines {
    fn read_line(&mut self) -> Result<String, ReadLineError> {
        match self.lines.pop() {
            Some(line) => Ok(line),
            None => {
                thread::sleep(Duration::from_millis(5));
                Err(ReadLineError::Timeout)
            }
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn config_in(dir: &Path) -> SessionConfig {
    SessionConfig {
        output_dir: dir.to_path_buf(),
        ..SessionConfig::default()
    }
}

fn wait_for_rows(path: &Path, rows: usize) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        let count = fs::read_to_string(path).map(|c| c.lines().count()).unwrap_or(0);
        if count >= rows {
            return;
        }
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_both_outputs_share_timestamp() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let mut session = RecordingSession::new(config_in(temp_dir.path()));

    let inputs = SessionInputs {
        audio: Some(Box::new(ToneSource { fail_open: false })),
        gps: Some(Box::new(ScriptedLines::new(&[
            "$GPRMC,120000,A,4807.038,N,01131.000,E,,,,,,",
        ]))),
    };
    session.start_with("202401011200", inputs)?;
    assert!(session.is_active());
    assert_eq!(session.timestamp(), Some("202401011200"));

    wait_for_rows(&temp_dir.path().join("202401011200.csv"), 1);
    let stats = session.stop();

    assert!(!session.is_active());
    assert!(stats.errors.is_empty(), "unexpected errors: {:?}", stats.errors);
    assert_eq!(stats.timestamp.as_deref(), Some("202401011200"));

    let audio = stats.audio.expect("audio stats");
    assert_eq!(audio.path, temp_dir.path().join("202401011200.wav"));
    assert!(audio.data_size > 0);
    assert_eq!(fs::metadata(&audio.path)?.len(), 44 + audio.data_size as u64);

    let gps = stats.gps.expect("gps stats");
    assert_eq!(gps.path, temp_dir.path().join("202401011200.csv"));
    assert_eq!(gps.rows, 1);

    Ok(())
}

#[test]
fn test_audio_failure_leaves_gps_running() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let mut session = RecordingSession::new(config_in(temp_dir.path()));

    let inputs = SessionInputs {
        audio: Some(Box::new(ToneSource { fail_open: true })),
        gps: Some(Box::new(ScriptedLines::new(&[]))),
    };
    session.start_with("gpsonly", inputs)?;
    assert!(session.logger().is_running());
    assert!(!session.recorder().is_recording());

    session.push_hand_sample(HandSide::Right, Point3::new(1.0, 2.0, 3.0), Point3::new(4.0, 5.0, 6.0));

    let stats = session.stop();

    assert_eq!(stats.errors.len(), 1);
    assert!(stats.errors[0].starts_with("audio"), "{}", stats.errors[0]);
    assert!(stats.audio.is_none());
    assert!(stats.gps.is_some());
    assert!(!temp_dir.path().join("gpsonly.wav").exists());

    Ok(())
}

#[test]
fn test_nothing_started_is_error() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let mut session = RecordingSession::new(config_in(temp_dir.path()));

    let inputs = SessionInputs {
        audio: Some(Box::new(ToneSource { fail_open: true })),
        gps: None,
    };

    let result = session.start_with("dead", inputs);
    assert!(result.is_err());
    assert!(!session.is_active());

    let result = session.start_with("empty", SessionInputs::default());
    assert!(result.is_err());

    Ok(())
}

#[test]
fn test_stop_without_start_returns_empty_stats() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let mut session = RecordingSession::new(config_in(temp_dir.path()));

    let stats = session.stop();

    assert!(stats.timestamp.is_none());
    assert!(stats.audio.is_none());
    assert!(stats.gps.is_none());
    assert!(stats.errors.is_empty());

    Ok(())
}

#[test]
fn test_replay_file_drives_gps_log() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let replay = temp_dir.path().join("drive.nmea");
    fs::write(
        &replay,
        "$GPGSA,A,3,04,05,,09,12,,,24,,,2.5\r\n\
         $GPRMC,120000,A,4807.038,N,01131.000,E,,,,,,\r\n\
         $GPRMC,120001,V,,,,,,,,,,\r\n",
    )?;

    let output = temp_dir.path().join("out");
    let mut session = RecordingSession::new(SessionConfig {
        output_dir: output.clone(),
        audio_enabled: false,
        gps_replay: Some(replay),
        ..SessionConfig::default()
    });

    session.start_at("replay")?;

    // The replay ends on its own at end of file
    let deadline = Instant::now() + Duration::from_secs(5);
    while session.logger().is_running() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    let stats = session.stop();

    assert!(stats.errors.is_empty(), "unexpected errors: {:?}", stats.errors);
    let gps = stats.gps.expect("gps stats");
    assert_eq!(gps.rows, 2);
    assert_eq!(gps.valid_fixes, 1);
    assert_eq!(gps.void_fixes, 1);
    assert_eq!(
        fs::read_to_string(output.join("replay.csv"))?,
        "120000,4807.038,01131.000,{},{}\n,,,{},{}\n"
    );

    Ok(())
}

#[test]
fn test_disabled_inputs_refuse_to_start() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let mut session = RecordingSession::new(SessionConfig {
        output_dir: temp_dir.path().to_path_buf(),
        audio_enabled: false,
        gps_enabled: false,
        ..SessionConfig::default()
    });

    assert!(session.start_at("idle").is_err());
    assert_eq!(fs::read_dir(temp_dir.path())?.count(), 0);

    Ok(())
}

#[cfg(not(feature = "microphone"))]
#[test]
fn test_microphone_unavailable_without_feature() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let mut session = RecordingSession::new(SessionConfig {
        output_dir: temp_dir.path().to_path_buf(),
        gps_enabled: false,
        ..SessionConfig::default()
    });

    let err = session.start_at("mic").expect_err("no audio backend compiled in");
    assert!(format!("{:#}", err).contains("microphone"), "{:#}", err);
    assert!(!temp_dir.path().join("mic.wav").exists());

    Ok(())
}
