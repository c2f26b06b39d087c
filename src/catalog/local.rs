use std::collections::HashSet;
use std::fs;
use std::path::Path;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{Catalog, Track};
use crate::error::{Error, Result};

/// Offline catalog backed by a JSON array of tracks.
pub struct LocalCatalog {
    tracks: Vec<Track>,
    liked: Mutex<HashSet<String>>,
}

impl LocalCatalog {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self {
            tracks,
            liked: Mutex::new(HashSet::new()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let tracks: Vec<Track> = serde_json::from_str(&content)?;
        Ok(Self::new(tracks))
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }
}

#[async_trait]
impl Catalog for LocalCatalog {
    async fn track(&self, id: &str) -> Result<Track> {
        self.tracks
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| Error::Catalog(format!("unknown track id {}", id)))
    }

    async fn recommendations(&self, seed_tracks: &[String], seed_artists: &[String]) -> Result<Vec<Track>> {
        // Same-artist tracks first, then the rest of the library
        let fresh = self.tracks.iter().filter(|t| !seed_tracks.contains(&t.id));
        let (mut same, other): (Vec<&Track>, Vec<&Track>) =
            fresh.partition(|t| t.artists.iter().any(|a| seed_artists.contains(&a.id)));
        same.extend(other);
        Ok(same.into_iter().cloned().collect())
    }

    async fn is_liked(&self, id: &str) -> Result<bool> {
        Ok(self.liked.lock().contains(id))
    }

    async fn set_liked(&self, id: &str, liked: bool) -> Result<()> {
        let mut set = self.liked.lock();
        if liked {
            set.insert(id.to_string());
        } else {
            set.remove(id);
        }
        Ok(())
    }
}
