pub mod buffer;
pub mod recorder;
pub mod source;
pub mod wave;

#[cfg(feature = "microphone")]
pub mod microphone;

pub use buffer::SessionBuffer;
pub use recorder::{AudioRecorder, AudioRecording, RecorderConfig, RecorderPhase};
pub use source::{AudioBuffer, AudioInput, AudioSource, AudioSourceConfig, AudioSourceFactory, AudioStream};
pub use wave::{encode_header, write_wave_file, WaveDescriptor, MAX_DATA_SIZE, WAVE_HEADER_SIZE};
