// Integration tests for WAVE encoding
//
// These tests verify the hand-built header against its derived fields and
// check that written files are readable by a standard WAV decoder.

use anyhow::Result;
use cabin_recorder::audio::{
    encode_header, write_wave_file, WaveDescriptor, MAX_DATA_SIZE, WAVE_HEADER_SIZE,
};
use std::fs;
use tempfile::TempDir;

fn field_u32(header: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(header[offset..offset + 4].try_into().unwrap())
}

fn field_u16(header: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes(header[offset..offset + 2].try_into().unwrap())
}

#[test]
fn test_header_invariants_across_formats() {
    let cases: [(u32, u16, u32); 5] = [
        (0, 1, 44100),
        (900, 1, 44100),
        (1_000_000, 2, 48000),
        (4, 1, 8000),
        (u32::MAX - 36, 1, 16000),
    ];

    for (data_size, channels, sample_rate) in cases {
        let header = encode_header(data_size, channels, sample_rate);

        assert_eq!(header.len(), WAVE_HEADER_SIZE);
        assert_eq!(field_u32(&header, 4), 36 + data_size, "chunk size for {}", data_size);
        assert_eq!(field_u32(&header, 28), sample_rate * channels as u32 * 2, "byte rate");
        assert_eq!(field_u16(&header, 32), channels * 2, "block align");
        assert_eq!(field_u32(&header, 40), data_size, "data size");
        assert_eq!(header, encode_header(data_size, channels, sample_rate), "deterministic");
    }
}

#[test]
fn test_descriptor_matches_free_function() {
    let descriptor = WaveDescriptor::new(1, 44100, 900);

    assert_eq!(descriptor.header(), encode_header(900, 1, 44100));
    assert_eq!(descriptor.chunk_size(), 936);
    assert_eq!(descriptor.byte_rate(), 88200);
    assert_eq!(descriptor.block_align(), 2);
}

#[test]
fn test_written_file_size_is_header_plus_data() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("202401011200.wav");

    let buffers: [Vec<u8>; 3] = [vec![1; 200], vec![2; 300], vec![3; 400]];
    let data: Vec<u8> = buffers.concat();

    let descriptor = write_wave_file(&path, 1, 44100, &data)?;

    assert_eq!(descriptor.data_size, 900);
    assert_eq!(fs::metadata(&path)?.len(), 44 + 900);

    let bytes = fs::read(&path)?;
    assert_eq!(&bytes[..44], &encode_header(900, 1, 44100));
    assert_eq!(&bytes[44..], data.as_slice());

    Ok(())
}

#[test]
fn test_written_file_decodes_as_pcm() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("decode.wav");

    let samples: Vec<i16> = vec![0, 1, -1, i16::MAX, i16::MIN, 1234];
    let data: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
    write_wave_file(&path, 1, 44100, &data)?;

    let reader = hound::WavReader::open(&path)?;
    let spec = reader.spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, 44100);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(spec.sample_format, hound::SampleFormat::Int);

    let decoded: Vec<i16> = reader.into_samples::<i16>().collect::<Result<_, _>>()?;
    assert_eq!(decoded, samples);

    Ok(())
}

#[test]
fn test_no_staging_file_left_behind() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("staged.wav");

    write_wave_file(&path, 1, 44100, &[0, 0, 1, 0])?;

    let names: Vec<String> = fs::read_dir(temp_dir.path())?
        .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<Result<_, _>>()?;
    assert_eq!(names, vec!["staged.wav".to_string()]);

    Ok(())
}

#[test]
fn test_unwritable_path_fails() {
    let path = std::path::PathBuf::from("/nonexistent/dir/out.wav");

    assert!(write_wave_file(&path, 1, 44100, &[0, 0]).is_err());
}

#[test]
fn test_failed_rename_removes_staging_file() -> Result<()> {
    let temp_dir = TempDir::new()?;
    // A directory in the way makes the final rename fail
    let path = temp_dir.path().join("blocked.wav");
    fs::create_dir(&path)?;

    assert!(write_wave_file(&path, 1, 44100, &[0, 0, 1, 0]).is_err());

    let names: Vec<String> = fs::read_dir(temp_dir.path())?
        .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<Result<_, _>>()?;
    assert_eq!(names, vec!["blocked.wav".to_string()]);
    assert!(path.is_dir());

    Ok(())
}

#[test]
fn test_max_data_size_fills_riff_chunk_size() {
    assert_eq!(MAX_DATA_SIZE as u64 + 36, u32::MAX as u64);
    let header = encode_header(MAX_DATA_SIZE as u32, 1, 44100);
    assert_eq!(&header[4..8], &u32::MAX.to_le_bytes());
}
