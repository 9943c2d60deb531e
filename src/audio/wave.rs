// PCM WAVE encoding
//
// The header is serialized by hand because its data size is only known once
// capture has finished: the whole session is held in memory, then the
// header and the samples are written in one pass.

use anyhow::{bail, Context, Result};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

/// Size of the canonical PCM WAVE header
pub const WAVE_HEADER_SIZE: usize = 44;

/// Samples are always written as 16-bit signed PCM
pub const BITS_PER_SAMPLE: u16 = 16;

/// Bytes per 16-bit sample
pub const BYTES_PER_SAMPLE: u16 = 2;

/// Largest data size whose RIFF chunk size (`36 + data`) still fits in 32 bits
pub const MAX_DATA_SIZE: usize = (u32::MAX - 36) as usize;

/// Format description of a WAVE file, derived at finalize time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveDescriptor {
    /// Number of interleaved channels
    pub channels: u16,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Size of the sample data in bytes
    pub data_size: u32,
}

impl WaveDescriptor {
    pub fn new(channels: u16, sample_rate: u32, data_size: u32) -> Self {
        Self {
            channels,
            sample_rate,
            data_size,
        }
    }

    /// RIFF chunk size: everything after the first 8 bytes
    pub fn chunk_size(&self) -> u32 {
        36 + self.data_size
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.channels as u32 * BYTES_PER_SAMPLE as u32
    }

    pub fn block_align(&self) -> u16 {
        self.channels * BYTES_PER_SAMPLE
    }

    /// Serialize the 44-byte header
    pub fn header(&self) -> [u8; WAVE_HEADER_SIZE] {
        encode_header(self.data_size, self.channels, self.sample_rate)
    }
}

/// Encode a 44-byte PCM WAVE header.
///
/// Multi-byte fields are little-endian; the four-character tags are written
/// as raw ASCII bytes.
pub fn encode_header(data_size: u32, channels: u16, sample_rate: u32) -> [u8; WAVE_HEADER_SIZE] {
    let byte_rate = sample_rate * channels as u32 * BYTES_PER_SAMPLE as u32;
    let block_align = channels * BYTES_PER_SAMPLE;

    let mut header = [0u8; WAVE_HEADER_SIZE];

    // RIFF descriptor
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&(36 + data_size).to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");

    // fmt subchunk
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&1u16.to_le_bytes()); // PCM
    header[22..24].copy_from_slice(&channels.to_le_bytes());
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    // data subchunk; samples follow immediately
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_size.to_le_bytes());

    header
}

/// Write a complete WAVE file: header followed by `data`.
///
/// The file is staged next to `path` with a `.part` suffix and renamed into
/// place once flushed, so `path` only ever holds a complete file. The
/// staging file is removed if any step fails.
pub fn write_wave_file(path: &Path, channels: u16, sample_rate: u32, data: &[u8]) -> Result<WaveDescriptor> {
    if data.len() > MAX_DATA_SIZE {
        bail!("Audio data exceeds the 4 GiB WAVE limit: {} bytes", data.len());
    }
    let data_size = u32::try_from(data.len()).context("Audio data exceeds the 4 GiB WAVE limit")?;
    let descriptor = WaveDescriptor::new(channels, sample_rate, data_size);

    let mut staging = path.as_os_str().to_owned();
    staging.push(".part");
    let staging = Path::new(&staging);

    let written = write_staged(staging, &descriptor, data).and_then(|()| {
        fs::rename(staging, path)
            .with_context(|| format!("Failed to move WAV file into place: {:?}", path))
    });
    if let Err(e) = written {
        if staging.exists() {
            if let Err(cleanup) = fs::remove_file(staging) {
                warn!("Failed to remove staging file {:?}: {}", staging, cleanup);
            }
        }
        return Err(e);
    }

    info!(
        "WAV file written: {} ({} bytes of audio, {}Hz, {} channels)",
        path.display(),
        data_size,
        sample_rate,
        channels
    );

    Ok(descriptor)
}

fn write_staged(staging: &Path, descriptor: &WaveDescriptor, data: &[u8]) -> Result<()> {
    let file = File::create(staging)
        .with_context(|| format!("Failed to create WAV file: {:?}", staging))?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(&descriptor.header())
        .context("Failed to write WAV header")?;
    writer
        .write_all(data)
        .context("Failed to write WAV samples")?;
    writer.flush().context("Failed to flush WAV file")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u32_at(header: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes([header[offset], header[offset + 1], header[offset + 2], header[offset + 3]])
    }

    fn u16_at(header: &[u8], offset: usize) -> u16 {
        u16::from_le_bytes([header[offset], header[offset + 1]])
    }

    #[test]
    fn test_header_layout_mono_44100() {
        let header = encode_header(900, 1, 44100);

        assert_eq!(&header[0..4], b"RIFF");
        assert_eq!(u32_at(&header, 4), 936);
        assert_eq!(&header[8..12], b"WAVE");
        assert_eq!(&header[12..16], b"fmt ");
        assert_eq!(u32_at(&header, 16), 16);
        assert_eq!(u16_at(&header, 20), 1);
        assert_eq!(u16_at(&header, 22), 1);
        assert_eq!(u32_at(&header, 24), 44100);
        assert_eq!(u32_at(&header, 28), 88200);
        assert_eq!(u16_at(&header, 32), 2);
        assert_eq!(u16_at(&header, 34), 16);
        assert_eq!(&header[36..40], b"data");
        assert_eq!(u32_at(&header, 40), 900);
    }

    #[test]
    fn test_header_derived_fields_stereo() {
        let descriptor = WaveDescriptor::new(2, 48000, 4);
        let header = descriptor.header();

        assert_eq!(u32_at(&header, 4), descriptor.chunk_size());
        assert_eq!(u32_at(&header, 28), 192000);
        assert_eq!(descriptor.byte_rate(), 192000);
        assert_eq!(u16_at(&header, 32), 4);
        assert_eq!(descriptor.block_align(), 4);
    }

    #[test]
    fn test_header_is_deterministic() {
        assert_eq!(encode_header(12345, 1, 16000), encode_header(12345, 1, 16000));
        assert_eq!(encode_header(0, 1, 44100).len(), WAVE_HEADER_SIZE);
    }
}
