//! Recording session management
//!
//! This module provides the `RecordingSession` abstraction that manages:
//! - One shared timestamp for every file a session writes
//! - Audio capture into `<timestamp>.wav`
//! - GPS + hand coordinate logging into `<timestamp>.csv`
//! - Session statistics and collected failures

mod config;
mod session;
mod stats;

pub use config::SessionConfig;
pub use session::{RecordingSession, SessionInputs};
pub use stats::{AudioStats, GpsStats, SessionStats};
