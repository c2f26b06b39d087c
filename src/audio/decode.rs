use std::io::Cursor;

use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

use crate::error::{Error, Result};

/// Decoded planar stereo audio.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StereoBuffers {
    pub left: Vec<f32>,
    pub right: Vec<f32>,
    pub sample_rate: u32,
}

impl StereoBuffers {
    pub fn frames(&self) -> usize {
        self.left.len().min(self.right.len())
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.frames() as f64 / self.sample_rate as f64
        }
    }
}

fn hint_for(mime: Option<&str>) -> Hint {
    let mut hint = Hint::new();
    if let Some(mime) = mime {
        hint.mime_type(mime);
        let ext = if mime.contains("mp4") || mime.contains("m4a") {
            Some("m4a")
        } else if mime.contains("mpeg") {
            Some("mp3")
        } else if mime.contains("ogg") {
            Some("ogg")
        } else if mime.contains("flac") {
            Some("flac")
        } else if mime.contains("wav") {
            Some("wav")
        } else {
            None
        };
        if let Some(ext) = ext {
            hint.with_extension(ext);
        }
    }
    hint
}

fn decode_err(e: SymphoniaError) -> Error {
    Error::Decode(e.to_string())
}

/// Fully decode an in-memory container into planar stereo f32.
/// Mono is duplicated into both channels; channels past the second are dropped.
pub fn decode_stereo(bytes: Vec<u8>, mime: Option<&str>) -> Result<StereoBuffers> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let probed = symphonia::default::get_probe()
        .format(&hint_for(mime), mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(decode_err)?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| Error::Decode("no supported audio tracks".into()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(decode_err)?;
    let track_id = track.id;

    let mut out = StereoBuffers {
        sample_rate: track.codec_params.sample_rate.unwrap_or(0),
        ..Default::default()
    };

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(_)) => break,
            // Track list changed mid-stream; keep what we have
            Err(SymphoniaError::ResetRequired) => break,
            Err(err) => return Err(decode_err(err)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                out.sample_rate = spec.rate;
                let channels = spec.channels.count().max(1);

                let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                sample_buf.copy_interleaved_ref(decoded);

                for frame in sample_buf.samples().chunks(channels) {
                    out.left.push(frame[0]);
                    out.right.push(if channels > 1 { frame[1] } else { frame[0] });
                }
            }
            Err(SymphoniaError::IoError(_)) => break,
            Err(SymphoniaError::DecodeError(e)) => debug!(error = %e, "skipping corrupt packet"),
            Err(err) => return Err(decode_err(err)),
        }
    }

    if out.frames() == 0 || out.sample_rate == 0 {
        return Err(Error::Decode("stream contained no audio frames".into()));
    }
    Ok(out)
}

/// Resample both channels to `target_rate`. No-op when the rate already matches.
pub fn resample(buffers: StereoBuffers, target_rate: u32) -> Result<StereoBuffers> {
    if buffers.sample_rate == target_rate || buffers.frames() == 0 {
        return Ok(StereoBuffers {
            sample_rate: target_rate,
            ..buffers
        });
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let frames = buffers.frames();
    let mut resampler = SincFixedIn::<f32>::new(
        target_rate as f64 / buffers.sample_rate as f64,
        2.0,
        params,
        frames,
        2,
    )
    .map_err(|e| Error::Decode(format!("resampler setup: {}", e)))?;

    let mut left = buffers.left;
    let mut right = buffers.right;
    left.truncate(frames);
    right.truncate(frames);

    let waves_out = resampler
        .process(&[left, right], None)
        .map_err(|e| Error::Decode(format!("resample: {}", e)))?;

    let mut channels = waves_out.into_iter();
    Ok(StereoBuffers {
        left: channels.next().unwrap_or_default(),
        right: channels.next().unwrap_or_default(),
        sample_rate: target_rate,
    })
}
