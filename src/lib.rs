pub mod audio;
pub mod config;
pub mod gps;
pub mod session;

pub use audio::{
    encode_header, AudioBuffer, AudioInput, AudioRecorder, AudioRecording, AudioSource,
    AudioSourceConfig, AudioSourceFactory, AudioStream, RecorderConfig, RecorderPhase,
    WaveDescriptor,
};
pub use config::Config;
pub use gps::{
    CoordinateLog, GpsFix, GpsLog, GpsLogger, HandSide, LineSource, LoggerConfig, LoggerPhase,
    Point3, SerialSettings,
};
pub use session::{RecordingSession, SessionConfig, SessionInputs, SessionStats};
