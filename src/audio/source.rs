use anyhow::Result;

use super::wave::BYTES_PER_SAMPLE;

/// One buffer pulled from an audio stream
#[derive(Debug, Clone, Default)]
pub struct AudioBuffer {
    /// Raw little-endian 16-bit PCM bytes, interleaved
    pub bytes: Vec<u8>,
    /// Number of samples the device reports for this buffer
    pub sample_count: u32,
}

impl AudioBuffer {
    /// Build a buffer from decoded samples
    pub fn from_samples(samples: &[i16]) -> Self {
        Self {
            bytes: samples.iter().flat_map(|s| s.to_le_bytes()).collect(),
            sample_count: samples.len() as u32,
        }
    }

    /// Bytes implied by the reported sample count
    pub fn reported_size(&self) -> u64 {
        self.sample_count as u64 * BYTES_PER_SAMPLE as u64
    }
}

/// Configuration requested from an audio source
#[derive(Debug, Clone)]
pub struct AudioSourceConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Channel count (1 = mono)
    pub channels: u16,
    /// Longest a single read may block before the device is considered stalled
    pub read_timeout_ms: u64,
}

impl Default for AudioSourceConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,   // CD rate
            channels: 1,          // Mono
            read_timeout_ms: 1000,
        }
    }
}

/// An audio device that can be opened for capture.
///
/// The source is handed to the capture thread and opened there, so the
/// stream it returns does not need to be `Send`.
pub trait AudioSource: Send {
    /// Open a capture stream
    fn open(&mut self) -> Result<Box<dyn AudioStream>>;

    /// Source name for logging
    fn name(&self) -> &str;
}

/// An open capture stream
pub trait AudioStream {
    /// Block until the next buffer is available
    fn read_next(&mut self) -> Result<AudioBuffer>;

    /// Set the input level
    fn set_volume(&mut self, level: f32) -> Result<()>;

    /// Sample rate negotiated with the device
    fn sample_rate(&self) -> u32;

    /// Channel count negotiated with the device
    fn channels(&self) -> u16;

    /// Release the device
    fn close(&mut self) -> Result<()>;
}

/// Audio input kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioInput {
    /// Default microphone (requires the `microphone` feature)
    Microphone,
}

/// Audio source factory
pub struct AudioSourceFactory;

impl AudioSourceFactory {
    /// Create an audio source for the given input
    pub fn create(input: AudioInput, config: AudioSourceConfig) -> Result<Box<dyn AudioSource>> {
        match input {
            AudioInput::Microphone => {
                #[cfg(feature = "microphone")]
                {
                    use super::microphone::MicrophoneSource;
                    Ok(Box::new(MicrophoneSource::new(config)))
                }

                #[cfg(not(feature = "microphone"))]
                {
                    let _ = config;
                    anyhow::bail!("Microphone capture requires the `microphone` feature")
                }
            }
        }
    }
}
