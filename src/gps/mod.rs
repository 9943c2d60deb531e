//! GPS logging
//!
//! This module provides:
//! - NMEA recommended-minimum sentence parsing
//! - The hand coordinate log filled by the gesture pipeline
//! - Serial / replay line sources
//! - The `GpsLogger` that ties them together into a CSV log

pub mod coordinates;
pub mod logger;
pub mod nmea;
pub mod serial;

pub use coordinates::{CoordinateLog, HandSample, HandSide, Point3, Traces};
pub use logger::{format_row, GpsLog, GpsLogger, LoggerConfig, LoggerPhase};
pub use nmea::{parse, GpsFix};
pub use serial::{list_ports, open_serial, LineReader, LineSource, ReadLineError, SerialSettings};
