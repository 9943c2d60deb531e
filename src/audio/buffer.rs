use tracing::warn;

use super::source::AudioBuffer;
use super::wave::MAX_DATA_SIZE;

/// In-memory PCM accumulator for one recording session.
///
/// Bytes are only ever appended. A buffer that ends mid-sample has its odd
/// byte held back until the next append, so the stored length is always a
/// whole number of 16-bit samples.
#[derive(Debug)]
pub struct SessionBuffer {
    data: Vec<u8>,
    carry: Option<u8>,
    reported_size: u64,
    buffers: usize,
    limit: usize,
}

impl Default for SessionBuffer {
    fn default() -> Self {
        Self::with_limit(MAX_DATA_SIZE)
    }
}

impl SessionBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A buffer that refuses to grow past `limit` bytes
    pub fn with_limit(limit: usize) -> Self {
        Self {
            data: Vec::new(),
            carry: None,
            reported_size: 0,
            buffers: 0,
            limit,
        }
    }

    /// Whether appending `buffer` could take the stored bytes past the limit
    pub fn would_overflow(&self, buffer: &AudioBuffer) -> bool {
        let pending = self.data.len() + usize::from(self.carry.is_some());
        pending.saturating_add(buffer.bytes.len()) > self.limit
    }

    /// Append one device buffer
    pub fn append(&mut self, buffer: &AudioBuffer) {
        let mut bytes = buffer.bytes.as_slice();

        if let Some(first) = self.carry.take() {
            match bytes.split_first() {
                Some((&second, rest)) => {
                    self.data.extend_from_slice(&[first, second]);
                    bytes = rest;
                }
                None => self.carry = Some(first),
            }
        }

        let whole = bytes.len() & !1;
        self.data.extend_from_slice(&bytes[..whole]);
        if whole < bytes.len() {
            self.carry = Some(bytes[whole]);
        }

        self.reported_size += buffer.reported_size();
        self.buffers += 1;
    }

    /// Bytes of whole samples stored so far
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Running total of `sample_count * 2` across appended buffers
    pub fn reported_size(&self) -> u64 {
        self.reported_size
    }

    /// Number of buffers appended
    pub fn buffers(&self) -> usize {
        self.buffers
    }

    /// Consume the buffer, returning the sample bytes
    pub fn into_bytes(self) -> Vec<u8> {
        if self.carry.is_some() {
            warn!("Dropping dangling half sample at end of recording");
        }
        self.data
    }
}
