//! OS-level now-playing surface and the transport commands it sends back.

use std::time::Duration;

use tracing::info;

use super::state::PlayerState;
use crate::catalog::Track;

#[derive(Debug, Clone, PartialEq)]
pub struct Artwork {
    pub src: String,
    /// "WxH"
    pub sizes: String,
    pub mime: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NowPlaying {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub artwork: Vec<Artwork>,
    pub duration: Duration,
}

impl NowPlaying {
    /// Cached thumbnail first, then every album image the catalog lists.
    pub fn from_track(track: &Track, cached_image: Option<&str>) -> Self {
        let mut artwork = Vec::with_capacity(track.album.images.len() + 1);
        if let Some(image) = cached_image {
            artwork.push(Artwork {
                src: image.to_string(),
                sizes: "640x640".into(),
                mime: "image/jpeg",
            });
        }
        artwork.extend(track.album.images.iter().map(|img| Artwork {
            src: img.url.clone(),
            sizes: format!(
                "{}x{}",
                img.width.map(|w| w.to_string()).unwrap_or_default(),
                img.height.map(|h| h.to_string()).unwrap_or_default()
            ),
            mime: if img.url.contains("png") { "image/png" } else { "image/jpeg" },
        }));

        Self {
            title: track.name.clone(),
            artist: track.artist_names(),
            album: track.album.name.clone(),
            artwork,
            duration: Duration::from_millis(track.duration_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaCommand {
    Play,
    Pause,
    PlayPause,
    Stop,
    Next,
    Previous,
    SeekTo(Duration),
    /// Relative seek in milliseconds
    SeekBy(i64),
    Quit,
}

pub trait MediaSession: Send + Sync {
    fn set_metadata(&self, now_playing: &NowPlaying);
    fn set_state(&self, _state: PlayerState) {}
}

/// Publishes to the log only.
#[derive(Debug, Default)]
pub struct LogSession;

impl MediaSession for LogSession {
    fn set_metadata(&self, now_playing: &NowPlaying) {
        info!(
            title = %now_playing.title,
            artist = %now_playing.artist,
            album = %now_playing.album,
            artwork = now_playing.artwork.len(),
            "now playing"
        );
    }
}
