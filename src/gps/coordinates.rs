use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Which hand a sample belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandSide {
    Left,
    Right,
}

/// A position reported by the gesture pipeline
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for Point3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.x, self.y, self.z)
    }
}

/// One hand/finger observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HandSample {
    pub side: HandSide,
    pub hand: Point3,
    pub finger: Point3,
}

impl HandSample {
    /// Trace segment: `"hx hy hz:fx fy fz;"`
    pub fn trace_segment(&self) -> String {
        format!("{}:{};", self.hand, self.finger)
    }
}

/// Hand traces drained at a fix
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Traces {
    pub left: String,
    pub right: String,
}

#[derive(Debug, Default)]
struct Segments {
    left: Vec<String>,
    right: Vec<String>,
}

/// Hand samples collected between two GPS fixes.
///
/// Cloning yields another handle to the same log: the gesture pipeline
/// pushes from its own thread while the GPS logger flushes at each fix.
#[derive(Debug, Clone, Default)]
pub struct CoordinateLog {
    inner: Arc<Mutex<Segments>>,
}

impl CoordinateLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a hand/finger position for one side
    pub fn push(&self, side: HandSide, hand: Point3, finger: Point3) {
        self.record(HandSample { side, hand, finger });
    }

    pub fn record(&self, sample: HandSample) {
        let segment = sample.trace_segment();
        let mut segments = self.inner.lock();
        match sample.side {
            HandSide::Left => segments.left.push(segment),
            HandSide::Right => segments.right.push(segment),
        }
    }

    /// Take both traces and clear the log in one critical section
    pub fn flush(&self) -> Traces {
        let (left, right) = {
            let mut segments = self.inner.lock();
            (
                std::mem::take(&mut segments.left),
                std::mem::take(&mut segments.right),
            )
        };

        Traces {
            left: left.concat(),
            right: right.concat(),
        }
    }

    /// Drop everything collected so far
    pub fn clear(&self) {
        let mut segments = self.inner.lock();
        segments.left.clear();
        segments.right.clear();
    }

    /// Number of pending samples per side (left, right)
    pub fn pending(&self) -> (usize, usize) {
        let segments = self.inner.lock();
        (segments.left.len(), segments.right.len())
    }
}
