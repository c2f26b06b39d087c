pub mod parse;
pub mod sync;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::catalog::Track;
use crate::error::Result;

pub use parse::{active_line, parse_lrc, LyricLine};
pub use sync::{LyricDisplay, LyricSynchronizer, SyncSettings};

pub const DEFAULT_ENDPOINT: &str = "https://lrclib.net";
const MAX_RETRIES: u8 = 2;
const RETRY_DELAY: Duration = Duration::from_millis(500);
/// Search hits must be within this many seconds of the track length
const DURATION_TOLERANCE: f64 = 3.0;

#[derive(Debug, Deserialize)]
pub struct LrclibResponse {
    #[serde(rename = "syncedLyrics")]
    pub synced_lyrics: Option<String>,
    #[serde(default)]
    pub instrumental: bool,
    pub duration: Option<f64>,
}

/// Lookup outcome. Missing lyrics are a normal result, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum LyricsFetchResult {
    /// Raw synced payload
    Found(String),
    Instrumental,
    NotFound,
}

#[async_trait]
pub trait LyricsProvider: Send + Sync {
    async fn fetch(&self, track: &Track) -> Result<LyricsFetchResult>;
}

#[derive(Serialize, Deserialize)]
struct CachedLyrics {
    synced: String,
}

/// lrclib.net client: exact lookup, then duration-filtered search, with a
/// disk cache of found payloads.
pub struct LrclibClient {
    client: Client,
    endpoint: String,
    cache_dir: Option<PathBuf>,
}

impl LrclibClient {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            cache_dir: Some(Self::default_cache_dir()),
        }
    }

    pub fn with_cache_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.cache_dir = dir;
        self
    }

    pub fn default_cache_dir() -> PathBuf {
        let cache_root = dirs::cache_dir().unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".cache")
        });
        cache_root.join("soundline").join("lyrics")
    }

    fn cache_path(dir: &Path, artist: &str, title: &str) -> PathBuf {
        // Fixed-length hashed name, no path traversal
        let digest = Sha256::digest(format!("{}{}", artist, title).as_bytes());
        dir.join(format!("{:x}.json", digest))
    }

    fn load_from_cache(path: &Path) -> Option<String> {
        let file = fs::File::open(path).ok()?;
        serde_json::from_reader::<_, CachedLyrics>(file).ok().map(|c| c.synced)
    }

    fn save_to_cache(path: &Path, synced: &str) {
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        if let Ok(file) = fs::File::create(path) {
            let _ = serde_json::to_writer(
                file,
                &CachedLyrics {
                    synced: synced.to_string(),
                },
            );
        }
    }

    fn spawn_save(path: Option<PathBuf>, synced: &str) {
        if let Some(path) = path {
            let synced = synced.to_string();
            tokio::task::spawn_blocking(move || Self::save_to_cache(&path, &synced));
        }
    }

    /// Strip remaster / feat. noise that confuses search.
    pub fn clean_title(title: &str) -> String {
        let t = title.to_lowercase();
        let t = t.split("feat.").next().unwrap_or(&t);
        let t = t.split("(feat").next().unwrap_or(t);

        let t = t
            .replace("remastered", "")
            .replace("remaster", "")
            .replace("single version", "")
            .replace("radio edit", "");

        let mut clean = String::new();
        let mut in_bracket = false;
        for c in t.chars() {
            match c {
                '(' | '[' => in_bracket = true,
                ')' | ']' => in_bracket = false,
                _ if !in_bracket => clean.push(c),
                _ => {}
            }
        }
        clean.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn classify(data: &LrclibResponse) -> LyricsFetchResult {
        if data.instrumental {
            return LyricsFetchResult::Instrumental;
        }
        match &data.synced_lyrics {
            Some(s) if !s.trim().is_empty() => LyricsFetchResult::Found(s.clone()),
            _ => LyricsFetchResult::NotFound,
        }
    }

    async fn get_exact(&self, track: &Track) -> Option<LyricsFetchResult> {
        let url = format!("{}/api/get", self.endpoint);
        let duration = track.duration_secs().to_string();
        let params = [
            ("track_name", track.name.as_str()),
            ("album_name", track.album.name.as_str()),
            ("artist_name", track.primary_artist()),
            ("duration", duration.as_str()),
        ];

        let mut attempt = 0;
        while attempt <= MAX_RETRIES {
            match self.client.get(&url).query(&params).send().await {
                Ok(resp) if resp.status().is_success() => {
                    // A bad body is a data problem, not worth retrying
                    return resp.json::<LrclibResponse>().await.ok().map(|d| Self::classify(&d));
                }
                Ok(resp) => {
                    debug!(status = %resp.status(), "exact lyrics lookup missed");
                    return None;
                }
                Err(e) => {
                    attempt += 1;
                    debug!(attempt, error = %e, "lyrics request failed");
                    tokio::time::sleep(RETRY_DELAY).await;
                }
            }
        }
        None
    }

    async fn search(&self, artist: &str, title: &str, duration_secs: f64) -> Result<LyricsFetchResult> {
        let url = format!("{}/api/search", self.endpoint);
        let q = format!("{} {}", artist, title);

        let mut attempt = 0;
        let resp = loop {
            match self.client.get(&url).query(&[("q", q.as_str())]).send().await {
                Ok(resp) => break resp,
                Err(e) => {
                    attempt += 1;
                    if attempt > MAX_RETRIES {
                        return Err(e.into());
                    }
                    tokio::time::sleep(RETRY_DELAY).await;
                }
            }
        };

        let results: Vec<LrclibResponse> = resp.json().await.unwrap_or_default();
        let matches_duration = |r: &LrclibResponse| {
            r.duration
                .map(|d| (d - duration_secs).abs() <= DURATION_TOLERANCE)
                .unwrap_or(false)
        };

        if let Some(found) = results
            .iter()
            .find(|r| r.synced_lyrics.is_some() && matches_duration(r))
        {
            return Ok(Self::classify(found));
        }
        if results.iter().any(|r| r.instrumental && matches_duration(r)) {
            return Ok(LyricsFetchResult::Instrumental);
        }
        Ok(LyricsFetchResult::NotFound)
    }
}

#[async_trait]
impl LyricsProvider for LrclibClient {
    async fn fetch(&self, track: &Track) -> Result<LyricsFetchResult> {
        let artist = track.primary_artist().to_string();
        let cache_path = self
            .cache_dir
            .as_deref()
            .map(|dir| Self::cache_path(dir, &artist, &track.name));

        if let Some(path) = cache_path.clone() {
            let cached = tokio::task::spawn_blocking(move || Self::load_from_cache(&path))
                .await
                .unwrap_or(None);
            if let Some(synced) = cached {
                debug!(track = %track.name, "lyrics cache hit");
                return Ok(LyricsFetchResult::Found(synced));
            }
        }

        if let Some(result) = self.get_exact(track).await {
            match &result {
                LyricsFetchResult::Found(synced) => {
                    Self::spawn_save(cache_path, synced);
                    return Ok(result);
                }
                LyricsFetchResult::Instrumental => return Ok(result),
                LyricsFetchResult::NotFound => {}
            }
        }

        let result = match self
            .search(&artist, &Self::clean_title(&track.name), track.duration_secs())
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "lyrics search failed");
                LyricsFetchResult::NotFound
            }
        };
        if let LyricsFetchResult::Found(synced) = &result {
            Self::spawn_save(cache_path, synced);
        }
        Ok(result)
    }
}
