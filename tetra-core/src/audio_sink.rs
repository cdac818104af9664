//! Fixed-format 16-bit PCM mono WAV writer with a rewrite-on-close header,
//! matching the byte layout the reference receiver's raw file sink emits.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

const HEADER_LEN: u64 = 44;

/// Writes mono 16-bit PCM samples to a WAV file, patching the RIFF chunk
/// size and data chunk size fields when the sink is finalized.
pub struct WavSink {
    file: File,
    sample_rate: u32,
    bytes_written: u64,
}

impl WavSink {
    pub fn create<P: AsRef<Path>>(path: P, sample_rate: u32) -> io::Result<Self> {
        let mut file = File::create(path)?;
        let header = Self::placeholder_header(sample_rate);
        file.write_all(&header)?;
        Ok(Self {
            file,
            sample_rate,
            bytes_written: 0,
        })
    }

    fn placeholder_header(sample_rate: u32) -> [u8; 44] {
        let mut header = [0u8; 44];
        let num_channels: u16 = 1;
        let bits_per_sample: u16 = 16;
        let byte_rate = sample_rate * num_channels as u32 * bits_per_sample as u32 / 8;
        let block_align: u16 = num_channels * bits_per_sample / 8;

        header[0..4].copy_from_slice(b"RIFF");
        header[8..12].copy_from_slice(b"WAVE");
        header[12..16].copy_from_slice(b"fmt ");
        header[16..20].copy_from_slice(&16u32.to_le_bytes());
        header[20..22].copy_from_slice(&1u16.to_le_bytes()); // PCM
        header[22..24].copy_from_slice(&num_channels.to_le_bytes());
        header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
        header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
        header[32..34].copy_from_slice(&block_align.to_le_bytes());
        header[34..36].copy_from_slice(&bits_per_sample.to_le_bytes());
        header[36..40].copy_from_slice(b"data");
        header
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Append interleaved 16-bit PCM samples (little-endian) to the stream.
    pub fn write_samples(&mut self, samples: &[i16]) -> io::Result<()> {
        for &sample in samples {
            self.file.write_all(&sample.to_le_bytes())?;
        }
        self.bytes_written += (samples.len() * 2) as u64;
        Ok(())
    }

    /// Patch the RIFF and data chunk size fields from the final file length,
    /// matching the reference receiver's close-time fixup.
    pub fn finalize(mut self) -> io::Result<()> {
        let file_size = HEADER_LEN + self.bytes_written;
        if file_size > HEADER_LEN {
            self.file.seek(SeekFrom::Start(4))?;
            self.file
                .write_all(&((file_size - 8) as u32).to_le_bytes())?;

            self.file.seek(SeekFrom::Start(40))?;
            self.file.write_all(&(self.bytes_written as u32).to_le_bytes())?;
        }
        self.file.flush()
    }
}

/// Read back a WAV file's 44-byte header fields, used by tests and tooling
/// to verify what `WavSink` produced.
pub struct WavHeaderInfo {
    pub riff_chunk_size: u32,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub data_chunk_size: u32,
}

pub fn read_header<P: AsRef<Path>>(path: P) -> io::Result<WavHeaderInfo> {
    let mut file = File::open(path)?;
    let mut header = [0u8; 44];
    file.read_exact(&mut header)?;
    Ok(WavHeaderInfo {
        riff_chunk_size: u32::from_le_bytes(header[4..8].try_into().unwrap()),
        sample_rate: u32::from_le_bytes(header[24..28].try_into().unwrap()),
        bits_per_sample: u16::from_le_bytes(header[34..36].try_into().unwrap()),
        data_chunk_size: u32::from_le_bytes(header[40..44].try_into().unwrap()),
    })
}
