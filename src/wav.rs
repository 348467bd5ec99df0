//! # Sample Formats and WAV Output
//!
//! Audio leaves this tool as standard RIFF/WAVE files: a 44-byte header
//! followed by interleaved PCM or IEEE-float samples, all multi-byte fields
//! little-endian.
//!
//! ```text
//! [RIFF][ChunkSize][WAVE][fmt ][16][fmt][ch][rate][byterate][align][bits][data][size]
//!   4       4        4     4    4    2   2    4       4        2      2     4     4
//! ```
//!
//! The writer keeps one [`Buffer`] per channel and interleaves at write-out;
//! a channel shorter than the longest is zero-padded per sample, so the data
//! section is always `channels × max(channel size)` bytes.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use crate::buffer::Buffer;
use crate::error::{Error, Result};

// =============================================================================
// Sample Format
// =============================================================================

/// Sample encodings a project can store, with the numeric constants the file
/// format uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    Int16,
    Int24,
    Float32,
}

impl SampleFormat {
    /// Parses the CLI spelling: `int16`, `int24` or `float`.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "int16" => Ok(SampleFormat::Int16),
            "int24" => Ok(SampleFormat::Int24),
            "float" => Ok(SampleFormat::Float32),
            other => Err(Error::UnsupportedSampleFormat(other.to_string())),
        }
    }

    /// Maps the stored `sampleformat` column value.
    pub fn from_raw(raw: i32) -> Result<Self> {
        match raw {
            0x0002_0001 => Ok(SampleFormat::Int16),
            0x0004_0001 => Ok(SampleFormat::Int24),
            0x0004_000F => Ok(SampleFormat::Float32),
            other => Err(Error::UnsupportedSampleFormat(other.to_string())),
        }
    }

    pub fn raw(self) -> i32 {
        match self {
            SampleFormat::Int16 => 0x0002_0001,
            SampleFormat::Int24 => 0x0004_0001,
            SampleFormat::Float32 => 0x0004_000F,
        }
    }

    /// Width of one sample in memory and in WAV output.
    pub fn bytes_per_sample(self) -> u32 {
        match self {
            SampleFormat::Int16 => 2,
            SampleFormat::Int24 => 3,
            SampleFormat::Float32 => 4,
        }
    }

    /// Width of one sample inside a `sampleblocks` blob. Int24 is stored
    /// padded to four bytes on disk.
    pub fn disk_bytes_per_sample(self) -> u32 {
        match self {
            SampleFormat::Int16 => 2,
            SampleFormat::Int24 => 4,
            SampleFormat::Float32 => 4,
        }
    }
}

// =============================================================================
// WAV Writer
// =============================================================================

/// Accumulates per-channel sample bytes and writes a WAV file on demand.
pub struct WaveFile {
    path: PathBuf,
    format: SampleFormat,
    sample_rate: u32,
    channels: Vec<Buffer>,
}

impl WaveFile {
    pub fn new(
        path: impl Into<PathBuf>,
        format: SampleFormat,
        sample_rate: u32,
        num_channels: u16,
    ) -> Self {
        Self {
            path: path.into(),
            format,
            sample_rate,
            channels: (0..num_channels).map(|_| Buffer::new()).collect(),
        }
    }

    /// Appends raw sample bytes to one channel.
    pub fn write_block(&mut self, data: &[u8], channel: u16) {
        self.channels[channel as usize].append(data);
    }

    /// Writes the header and the interleaved data section.
    pub fn write_file(&self) -> Result<()> {
        let file = File::create(&self.path)?;
        let mut out = BufWriter::new(file);

        let bytes_per_sample = self.format.bytes_per_sample();
        let num_channels = self.channels.len() as u32;

        let longest = self
            .channels
            .iter()
            .map(Buffer::size)
            .max()
            .unwrap_or(0) as u32;
        let data_size = num_channels * longest;

        let audio_format: u16 = if self.format == SampleFormat::Float32 {
            3 // IEEE float
        } else {
            1 // PCM
        };

        let mut header = Vec::with_capacity(44);
        header.extend_from_slice(b"RIFF");
        header.extend_from_slice(&(36 + data_size).to_le_bytes());
        header.extend_from_slice(b"WAVE");
        header.extend_from_slice(b"fmt ");
        header.extend_from_slice(&16u32.to_le_bytes());
        header.extend_from_slice(&audio_format.to_le_bytes());
        header.extend_from_slice(&(num_channels as u16).to_le_bytes());
        header.extend_from_slice(&self.sample_rate.to_le_bytes());
        header.extend_from_slice(
            &(self.sample_rate * num_channels * bytes_per_sample).to_le_bytes(),
        );
        header.extend_from_slice(&((num_channels * bytes_per_sample) as u16).to_le_bytes());
        header.extend_from_slice(&((bytes_per_sample * 8) as u16).to_le_bytes());
        header.extend_from_slice(b"data");
        header.extend_from_slice(&data_size.to_le_bytes());
        out.write_all(&header)?;

        let max_samples = longest / bytes_per_sample;
        let mut frame = vec![0u8; (num_channels * bytes_per_sample) as usize];

        for sample_index in 0..max_samples {
            let offset = (sample_index * bytes_per_sample) as usize;

            for (channel_index, channel) in self.channels.iter().enumerate() {
                let slot = channel_index * bytes_per_sample as usize;
                let dst = &mut frame[slot..slot + bytes_per_sample as usize];

                let copied = channel.read(dst, offset);
                dst[copied..].fill(0);
            }

            out.write_all(&frame)?;
        }

        out.flush()?;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
