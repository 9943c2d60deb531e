//! Microphone capture via cpal.
//!
//! cpal delivers samples on its own callback thread; the callback forwards
//! each buffer over a channel and `read_next` blocks on the receiving end.

use anyhow::{bail, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;
use tracing::{debug, info};

use super::source::{AudioBuffer, AudioSource, AudioSourceConfig, AudioStream};

type Delivery = std::result::Result<Vec<f32>, String>;

/// Default input device
pub struct MicrophoneSource {
    config: AudioSourceConfig,
}

impl MicrophoneSource {
    pub fn new(config: AudioSourceConfig) -> Self {
        Self { config }
    }
}

impl AudioSource for MicrophoneSource {
    fn open(&mut self) -> Result<Box<dyn AudioStream>> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .context("No input device available for audio capture")?;

        info!(
            "Audio capture using device: {}",
            device.name().unwrap_or_else(|_| "unknown".to_string())
        );

        let stream_config = cpal::StreamConfig {
            channels: self.config.channels,
            sample_rate: cpal::SampleRate(self.config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let (tx, rx) = mpsc::channel::<Delivery>();
        let err_tx = tx.clone();

        let stream = device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let _ = tx.send(Ok(data.to_vec()));
                },
                move |err| {
                    let _ = err_tx.send(Err(err.to_string()));
                },
                None,
            )
            .context("Failed to build input stream")?;

        stream.play().context("Failed to start input stream")?;

        Ok(Box::new(MicrophoneStream {
            stream: Some(stream),
            rx,
            gain: 1.0,
            sample_rate: self.config.sample_rate,
            channels: self.config.channels,
            read_timeout: Duration::from_millis(self.config.read_timeout_ms),
        }))
    }

    fn name(&self) -> &str {
        "microphone"
    }
}

struct MicrophoneStream {
    stream: Option<cpal::Stream>,
    rx: Receiver<Delivery>,
    gain: f32,
    sample_rate: u32,
    channels: u16,
    read_timeout: Duration,
}

impl AudioStream for MicrophoneStream {
    fn read_next(&mut self) -> Result<AudioBuffer> {
        match self.rx.recv_timeout(self.read_timeout) {
            Ok(Ok(data)) => {
                let samples: Vec<i16> = data
                    .iter()
                    .map(|&s| ((s * self.gain).clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                    .collect();
                Ok(AudioBuffer::from_samples(&samples))
            }
            Ok(Err(e)) => bail!("Input stream error: {}", e),
            Err(RecvTimeoutError::Timeout) => {
                bail!("No audio from input device for {:?}", self.read_timeout)
            }
            Err(RecvTimeoutError::Disconnected) => bail!("Input stream closed"),
        }
    }

    fn set_volume(&mut self, level: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&level) {
            bail!("Volume must be between 0.0 and 1.0, got {}", level);
        }
        self.gain = level;
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn close(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.take() {
            debug!("Stopping input stream");
            drop(stream);
        }
        Ok(())
    }
}
