//! Line-oriented input from the GPS receiver.
//!
//! The receiver is normally a serial port, but any byte stream (a recorded
//! NMEA log, an in-memory cursor) can be read through the same
//! [`LineReader`].

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, BufReader, ErrorKind, Read};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Errors from reading one line
#[derive(Error, Debug)]
pub enum ReadLineError {
    /// Nothing arrived within the read timeout; the device is idle
    #[error("Read timed out")]
    Timeout,

    /// The underlying stream reached its end
    #[error("Input closed")]
    Closed,

    /// The device handle is broken
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Source of text lines
pub trait LineSource: Send {
    /// Read the next line, without its line terminator
    fn read_line(&mut self) -> Result<String, ReadLineError>;

    /// Release the underlying device
    fn close(&mut self) {}

    /// Source name for logging
    fn name(&self) -> &str;
}

/// Splits a byte stream into lines.
///
/// Bytes read before a timeout are kept and completed by the next read, so
/// a sentence straddling the timeout is not lost.
pub struct LineReader<R: Read> {
    reader: Option<BufReader<R>>,
    pending: Vec<u8>,
    name: String,
}

impl<R: Read> LineReader<R> {
    pub fn new(inner: R, name: impl Into<String>) -> Self {
        Self {
            reader: Some(BufReader::new(inner)),
            pending: Vec::new(),
            name: name.into(),
        }
    }

    fn take_line(&mut self) -> String {
        let mut line = std::mem::take(&mut self.pending);
        while matches!(line.last(), Some(b'\n') | Some(b'\r')) {
            line.pop();
        }
        String::from_utf8_lossy(&line).into_owned()
    }
}

impl<R: Read + Send> LineSource for LineReader<R> {
    fn read_line(&mut self) -> Result<String, ReadLineError> {
        let reader = self.reader.as_mut().ok_or(ReadLineError::Closed)?;

        match reader.read_until(b'\n', &mut self.pending) {
            Ok(0) => Err(ReadLineError::Closed),
            // The last line of a stream may lack a terminator
            Ok(_) => Ok(self.take_line()),
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                Err(ReadLineError::Timeout)
            }
            Err(e) => Err(ReadLineError::Io(e)),
        }
    }

    fn close(&mut self) {
        self.reader = None;
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Serial line settings for the GPS receiver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialSettings {
    /// Port name, e.g. `/dev/ttyUSB0` or `COM3`
    pub port: String,
    pub baud_rate: u32,
    /// Read/write timeout in milliseconds
    pub timeout_ms: u64,
}

impl SerialSettings {
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: 57600,
            timeout_ms: 800,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// A GPS receiver on a serial port
pub type SerialPortSource = LineReader<Box<dyn serialport::SerialPort>>;

/// Open the receiver: 8 data bits, no parity, 1 stop bit, no flow control
pub fn open_serial(settings: &SerialSettings) -> Result<SerialPortSource> {
    info!(
        "Opening serial port {} ({} baud, 8N1, timeout {}ms)",
        settings.port, settings.baud_rate, settings.timeout_ms
    );

    let port = serialport::new(&settings.port, settings.baud_rate)
        .data_bits(serialport::DataBits::Eight)
        .parity(serialport::Parity::None)
        .stop_bits(serialport::StopBits::One)
        .flow_control(serialport::FlowControl::None)
        .timeout(settings.timeout())
        .open()
        .with_context(|| format!("Failed to open serial port {}", settings.port))?;

    Ok(LineReader::new(port, settings.port.clone()))
}

/// Names of the serial ports present on this machine
pub fn list_ports() -> Result<Vec<String>> {
    let ports = serialport::available_ports().context("Failed to enumerate serial ports")?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}
