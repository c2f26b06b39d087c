//! Decoded-audio cache keyed by track id. Append-only, no eviction.

use std::collections::HashMap;
use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::audio::StereoBuffers;
use crate::catalog::Track;
use crate::error::{Error, Result};

/// Everything needed to replay a track without touching the network.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub buffers: StereoBuffers,
    pub track: Track,
    /// Thumbnail as a `data:` URI
    pub image: Option<String>,
}

#[async_trait]
pub trait TrackCache: Send + Sync {
    async fn get(&self, track_id: &str) -> Result<Option<CacheEntry>>;
    async fn put(&self, track_id: &str, entry: CacheEntry) -> Result<()>;
}

/// Session-only cache.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[async_trait]
impl TrackCache for MemoryCache {
    async fn get(&self, track_id: &str) -> Result<Option<CacheEntry>> {
        Ok(self.entries.lock().get(track_id).cloned())
    }

    async fn put(&self, track_id: &str, entry: CacheEntry) -> Result<()> {
        // First write wins; entries are never updated
        self.entries.lock().entry(track_id.to_string()).or_insert(entry);
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct Sidecar {
    track: Track,
    image: Option<String>,
}

/// Persistent cache: `<key>.wav` (32-bit float stereo) plus a `<key>.json` sidecar.
/// The sidecar is written last and marks the entry complete.
pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// `<cache_dir>/soundline/tracks`
    pub fn default_dir() -> PathBuf {
        let root = dirs::cache_dir().unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".cache")
        });
        root.join("soundline").join("tracks")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// SHA-256 hex of the id. Safe for any id and stable across builds.
    fn key(track_id: &str) -> String {
        format!("{:x}", Sha256::digest(track_id.as_bytes()))
    }

    fn paths(&self, track_id: &str) -> (PathBuf, PathBuf) {
        let key = Self::key(track_id);
        (self.dir.join(format!("{}.wav", key)), self.dir.join(format!("{}.json", key)))
    }

    fn read(wav_path: &Path, meta_path: &Path) -> Result<Option<CacheEntry>> {
        if !meta_path.exists() || !wav_path.exists() {
            return Ok(None);
        }

        let sidecar: Sidecar = serde_json::from_reader(BufReader::new(fs::File::open(meta_path)?))?;

        let mut reader = hound::WavReader::open(wav_path).map_err(|e| Error::Cache(e.to_string()))?;
        let spec = reader.spec();
        if spec.channels != 2 {
            return Err(Error::Cache(format!("expected stereo, found {} channels", spec.channels)));
        }

        let frames = reader.duration() as usize;
        let mut buffers = StereoBuffers {
            left: Vec::with_capacity(frames),
            right: Vec::with_capacity(frames),
            sample_rate: spec.sample_rate,
        };
        let mut samples = reader.samples::<f32>();
        while let (Some(l), Some(r)) = (samples.next(), samples.next()) {
            buffers.left.push(l.map_err(|e| Error::Cache(e.to_string()))?);
            buffers.right.push(r.map_err(|e| Error::Cache(e.to_string()))?);
        }

        Ok(Some(CacheEntry {
            buffers,
            track: sidecar.track,
            image: sidecar.image,
        }))
    }

    fn write(wav_path: &Path, meta_path: &Path, entry: &CacheEntry) -> Result<()> {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: entry.buffers.sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(wav_path, spec).map_err(|e| Error::Cache(e.to_string()))?;
        for (l, r) in entry.buffers.left.iter().zip(entry.buffers.right.iter()) {
            writer.write_sample(*l).map_err(|e| Error::Cache(e.to_string()))?;
            writer.write_sample(*r).map_err(|e| Error::Cache(e.to_string()))?;
        }
        writer.finalize().map_err(|e| Error::Cache(e.to_string()))?;

        let sidecar = Sidecar {
            track: entry.track.clone(),
            image: entry.image.clone(),
        };
        serde_json::to_writer(fs::File::create(meta_path)?, &sidecar)?;
        Ok(())
    }
}

#[async_trait]
impl TrackCache for DiskCache {
    async fn get(&self, track_id: &str) -> Result<Option<CacheEntry>> {
        let (wav_path, meta_path) = self.paths(track_id);
        let entry = tokio::task::spawn_blocking(move || Self::read(&wav_path, &meta_path))
            .await
            .map_err(|e| Error::Cache(e.to_string()))??;
        debug!(track_id, hit = entry.is_some(), "disk cache lookup");
        Ok(entry)
    }

    async fn put(&self, track_id: &str, entry: CacheEntry) -> Result<()> {
        let (wav_path, meta_path) = self.paths(track_id);
        if meta_path.exists() {
            return Ok(());
        }
        let frames = entry.buffers.frames();
        tokio::task::spawn_blocking(move || Self::write(&wav_path, &meta_path, &entry))
            .await
            .map_err(|e| Error::Cache(e.to_string()))??;
        info!(track_id, frames, "cached decoded track");
        Ok(())
    }
}
