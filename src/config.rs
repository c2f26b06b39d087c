//! User configuration stored in `config.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::app::keys::KeyConfig;
use crate::audio::{CodecSupport, SampleFormat};
use crate::error::{Error, Result};
use crate::lyrics::{SyncSettings, DEFAULT_ENDPOINT};
use crate::player::DEFAULT_MAX_LISTENERS;

pub const TOKEN_ENV: &str = "SOUNDLINE_SPOTIFY_TOKEN";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Search hosts, highest priority first
    #[serde(default = "default_mirrors")]
    pub mirrors: Vec<String>,
    #[serde(default = "default_allowed_mime")]
    pub allowed_mime: Vec<String>,
}

fn default_mirrors() -> Vec<String> {
    [
        "https://pipedapi.reallyaweso.me",
        "https://pipedapi.kavin.rocks",
        "https://pipedapi.adminforge.de",
        "https://api.piped.private.coffee",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_allowed_mime() -> Vec<String> {
    vec!["audio/mp4".to_string()]
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            mirrors: default_mirrors(),
            allowed_mime: default_allowed_mime(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    #[serde(default)]
    pub codec_support: CodecSupport,
    #[serde(default)]
    pub transcode_format: SampleFormat,
    #[serde(default = "default_volume")]
    pub volume: f32,
}

fn default_volume() -> f32 {
    1.0
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            codec_support: CodecSupport::default(),
            transcode_format: SampleFormat::default(),
            volume: default_volume(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Keep decoded tracks on disk between runs
    #[serde(default = "default_true")]
    pub persistent: bool,
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            persistent: true,
            directory: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LyricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_lyrics_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_250")]
    pub lead_offset_ms: u64,
    #[serde(default = "default_250")]
    pub appear_delay_ms: u64,
    #[serde(default = "default_poll_ms")]
    pub poll_interval_ms: u64,
}

fn default_lyrics_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_250() -> u64 {
    250
}

fn default_poll_ms() -> u64 {
    100
}

impl Default for LyricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_lyrics_endpoint(),
            lead_offset_ms: 250,
            appear_delay_ms: 250,
            poll_interval_ms: 100,
        }
    }
}

impl LyricsConfig {
    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            lead: Duration::from_millis(self.lead_offset_ms),
            appear_delay: Duration::from_millis(self.appear_delay_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub spotify_token: Option<String>,
    /// JSON array of tracks used when no token is set
    #[serde(default)]
    pub library: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualizerConfig {
    #[serde(default = "default_frame_ms")]
    pub frame_interval_ms: u64,
    #[serde(default = "default_smoothing")]
    pub smoothing: f32,
}

fn default_frame_ms() -> u64 {
    33
}

fn default_smoothing() -> f32 {
    0.8
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: default_frame_ms(),
            smoothing: default_smoothing(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventsConfig {
    #[serde(default = "default_max_listeners")]
    pub max_listeners: usize,
}

fn default_max_listeners() -> usize {
    DEFAULT_MAX_LISTENERS
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            max_listeners: DEFAULT_MAX_LISTENERS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub lyrics: LyricsConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub visualizer: VisualizerConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub keys: KeyConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            resolver: ResolverConfig::default(),
            playback: PlaybackConfig::default(),
            cache: CacheConfig::default(),
            lyrics: LyricsConfig::default(),
            catalog: CatalogConfig::default(),
            visualizer: VisualizerConfig::default(),
            events: EventsConfig::default(),
            keys: KeyConfig::default(),
        }
    }
}

impl Config {
    /// `~/.config/soundline`
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".config")
            })
            .join("soundline")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Log files live next to the track cache.
    pub fn log_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("soundline")
    }

    pub fn default_toml() -> Result<String> {
        toml::to_string_pretty(&Config::default()).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load from the default path, then apply environment overrides.
    pub fn load() -> Self {
        let mut config = Self::load_from(&Self::config_path());
        config.apply_env(std::env::var(TOKEN_ENV).ok());
        config
    }

    /// Missing file: defaults are written out. Broken file: defaults are
    /// used and the file is left alone.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            let config = Config::default();
            if let Err(e) = config.save_to(path) {
                warn!(path = %path.display(), error = %e, "could not write default config");
            } else {
                info!(path = %path.display(), "wrote default config");
            }
            return config;
        }

        match fs::read_to_string(path) {
            Ok(content) => Self::parse(&content).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "config unreadable, using defaults");
                Config::default()
            }),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "config unreadable, using defaults");
                Config::default()
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    fn apply_env(&mut self, token: Option<String>) {
        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            self.catalog.spotify_token = Some(token);
        }
    }
}
