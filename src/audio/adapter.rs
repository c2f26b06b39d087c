//! Turns a resolved stream into something the output can play directly.

use std::io::{Cursor, Read, Seek};
use std::sync::Arc;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::decode::{self, StereoBuffers};
use super::stream::Download;
use super::wav::{self, SampleFormat};
use crate::error::{Error, Result};

/// Whether the runtime can play the resolved container natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecSupport {
    #[default]
    Native,
    /// Always transcode into an in-memory WAV before playing
    Restricted,
}

/// Byte source a decoder can pull from on the audio side.
pub trait MediaReader: Read + Seek + Send + Sync + 'static {}
impl<T: Read + Seek + Send + Sync + 'static> MediaReader for T {}

/// What the output is handed: a network stream decoded as it arrives, or a
/// complete in-memory file.
#[derive(Debug, Clone)]
pub enum PlaybackSource {
    Stream(Download),
    Buffer(Arc<[u8]>),
}

impl PlaybackSource {
    pub fn is_buffer(&self) -> bool {
        matches!(self, PlaybackSource::Buffer(_))
    }

    /// Fresh reader positioned at the start of the media.
    pub fn reader(&self) -> Box<dyn MediaReader> {
        match self {
            PlaybackSource::Stream(download) => Box::new(download.reader()),
            PlaybackSource::Buffer(bytes) => Box::new(Cursor::new(bytes.clone())),
        }
    }
}

#[derive(Clone)]
pub struct FormatAdapter {
    client: Client,
    support: CodecSupport,
    format: SampleFormat,
    target_rate: u32,
}

impl FormatAdapter {
    pub fn new(client: Client, support: CodecSupport, format: SampleFormat) -> Self {
        Self {
            client,
            support,
            format,
            target_rate: wav::CANONICAL_SAMPLE_RATE,
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Start the single network fetch for a resolved stream URL.
    pub fn open(&self, url: &str) -> Download {
        Download::start(&self.client, url)
    }

    /// Native support streams the download as it arrives. Restricted support
    /// waits for the whole body and transcodes it.
    pub async fn adapt(&self, download: &Download, mime: Option<&str>) -> Result<PlaybackSource> {
        match self.support {
            CodecSupport::Native => Ok(PlaybackSource::Stream(download.clone())),
            CodecSupport::Restricted => {
                let bytes = download.bytes().await?;
                let mime = mime.map(str::to_string);
                let format = self.format;
                let target_rate = self.target_rate;

                // Full in-memory transcode, off the async workers
                let wav = tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
                    let decoded = decode::decode_stereo(bytes, mime.as_deref())?;
                    let resampled = decode::resample(decoded, target_rate)?;
                    Ok(wav::encode_stereo(
                        &resampled.left,
                        &resampled.right,
                        resampled.sample_rate,
                        format,
                    ))
                })
                .await
                .map_err(|e| Error::Decode(format!("transcode task: {}", e)))??;

                info!(bytes = wav.len(), "transcoded stream to wav");
                Ok(PlaybackSource::Buffer(Arc::from(wav)))
            }
        }
    }

    /// Rebuild a playable source from cached raw channels. Never touches the network.
    pub fn from_buffers(&self, buffers: &StereoBuffers) -> PlaybackSource {
        let bytes = wav::encode_stereo(&buffers.left, &buffers.right, buffers.sample_rate, self.format);
        PlaybackSource::Buffer(Arc::from(bytes))
    }
}
