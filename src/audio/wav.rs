//! Canonical 44-byte RIFF/WAVE header and in-memory stereo encoding.

use serde::{Deserialize, Serialize};

pub const HEADER_LEN: usize = 44;
/// Sample rate of transcoded output
pub const CANONICAL_SAMPLE_RATE: u32 = 48_000;
pub const CANONICAL_CHANNELS: u16 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    /// 16-bit signed integer PCM (format tag 1)
    #[default]
    Pcm16,
    /// 32-bit IEEE float (format tag 3)
    Float32,
}

impl SampleFormat {
    pub fn bytes_per_sample(self) -> u16 {
        match self {
            SampleFormat::Pcm16 => 2,
            SampleFormat::Float32 => 4,
        }
    }

    pub fn format_tag(self) -> u16 {
        match self {
            SampleFormat::Pcm16 => 1,
            SampleFormat::Float32 => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavSpec {
    pub channels: u16,
    pub sample_rate: u32,
    pub format: SampleFormat,
}

impl WavSpec {
    pub fn stereo(sample_rate: u32, format: SampleFormat) -> Self {
        Self {
            channels: CANONICAL_CHANNELS,
            sample_rate,
            format,
        }
    }

    pub fn block_align(&self) -> u16 {
        self.channels * self.format.bytes_per_sample()
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.block_align() as u32
    }
}

/// Build the fixed header for `num_frames` frames of audio.
///
/// ChunkSize = dataSize + 36, ByteRate = sampleRate * channels * bytesPerSample,
/// BlockAlign = channels * bytesPerSample.
pub fn header(spec: &WavSpec, num_frames: u32) -> [u8; HEADER_LEN] {
    let data_size = num_frames * spec.block_align() as u32;
    let mut h = [0u8; HEADER_LEN];

    h[0..4].copy_from_slice(b"RIFF");
    h[4..8].copy_from_slice(&(data_size + 36).to_le_bytes());
    h[8..12].copy_from_slice(b"WAVE");
    h[12..16].copy_from_slice(b"fmt ");
    h[16..20].copy_from_slice(&16u32.to_le_bytes());
    h[20..22].copy_from_slice(&spec.format.format_tag().to_le_bytes());
    h[22..24].copy_from_slice(&spec.channels.to_le_bytes());
    h[24..28].copy_from_slice(&spec.sample_rate.to_le_bytes());
    h[28..32].copy_from_slice(&spec.byte_rate().to_le_bytes());
    h[32..34].copy_from_slice(&spec.block_align().to_le_bytes());
    h[34..36].copy_from_slice(&(spec.format.bytes_per_sample() * 8).to_le_bytes());
    h[36..40].copy_from_slice(b"data");
    h[40..44].copy_from_slice(&data_size.to_le_bytes());
    h
}

/// L/R planar -> LRLR interleaved. The shorter channel bounds the frame count.
pub fn interleave(left: &[f32], right: &[f32]) -> Vec<f32> {
    let frames = left.len().min(right.len());
    let mut out = Vec::with_capacity(frames * 2);
    for i in 0..frames {
        out.push(left[i]);
        out.push(right[i]);
    }
    out
}

fn f32_to_i16(s: f32) -> i16 {
    let s = s.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

/// Complete WAV file (header + data) for a stereo buffer.
pub fn encode_stereo(left: &[f32], right: &[f32], sample_rate: u32, format: SampleFormat) -> Vec<u8> {
    let spec = WavSpec::stereo(sample_rate, format);
    let samples = interleave(left, right);
    let frames = (samples.len() / 2) as u32;

    let mut out = Vec::with_capacity(HEADER_LEN + samples.len() * format.bytes_per_sample() as usize);
    out.extend_from_slice(&header(&spec, frames));
    match format {
        SampleFormat::Pcm16 => {
            for s in samples {
                out.extend_from_slice(&f32_to_i16(s).to_le_bytes());
            }
        }
        SampleFormat::Float32 => {
            for s in samples {
                out.extend_from_slice(&s.to_le_bytes());
            }
        }
    }
    out
}
