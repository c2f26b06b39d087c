//! Catalog collaborator: where Track records, likes and recommendations come from.

pub mod local;
pub mod spotify;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use local::LocalCatalog;
pub use spotify::SpotifyCatalog;

/// Trailing window used when seeding recommendations.
pub const SEED_WINDOW: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artist {
    #[serde(default)]
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Album {
    pub name: String,
    #[serde(default)]
    pub images: Vec<Image>,
}

/// Immutable descriptive record for a playable song.
/// Field names follow the Spotify Web API track object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub artists: Vec<Artist>,
    #[serde(default)]
    pub album: Album,
    pub duration_ms: u64,
}

impl Track {
    /// "Artist A, Artist B"
    pub fn artist_names(&self) -> String {
        self.artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn primary_artist(&self) -> &str {
        self.artists.first().map(|a| a.name.as_str()).unwrap_or("")
    }

    /// Largest artwork is listed first by the catalog.
    pub fn artwork_url(&self) -> Option<&str> {
        self.album.images.first().map(|i| i.url.as_str())
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_ms as f64 / 1000.0
    }
}

/// Build the (seed_tracks, seed_artists) pair for a recommendation request.
pub fn recommendation_seeds(queue_ids: &[String], current: Option<&Track>) -> (Vec<String>, Vec<String>) {
    let tracks = trailing(queue_ids.iter().filter(|id| !id.is_empty()).cloned().collect());
    let artists = current
        .map(|t| {
            trailing(
                t.artists
                    .iter()
                    .filter(|a| !a.id.is_empty())
                    .map(|a| a.id.clone())
                    .collect(),
            )
        })
        .unwrap_or_default();
    (tracks, artists)
}

fn trailing(mut ids: Vec<String>) -> Vec<String> {
    let start = ids.len().saturating_sub(SEED_WINDOW);
    ids.drain(..start);
    ids
}

/// Read/write surface of the external catalog 🎵
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn track(&self, id: &str) -> Result<Track>;
    async fn recommendations(&self, seed_tracks: &[String], seed_artists: &[String]) -> Result<Vec<Track>>;
    async fn is_liked(&self, id: &str) -> Result<bool>;
    async fn set_liked(&self, id: &str, liked: bool) -> Result<()>;
}

#[cfg(test)]
pub(crate) fn test_track(id: &str, name: &str, artist: &str) -> Track {
    Track {
        id: id.to_string(),
        name: name.to_string(),
        artists: vec![Artist {
            id: format!("artist-{}", artist.to_lowercase()),
            name: artist.to_string(),
        }],
        album: Album {
            name: format!("{} album", name),
            images: vec![Image {
                url: format!("https://img.example/{}.jpg", id),
                width: Some(640),
                height: Some(640),
            }],
        },
        duration_ms: 180_000,
    }
}
