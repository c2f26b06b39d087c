//! Response shapes of the Piped search / streams API.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SearchResults {
    #[serde(default)]
    pub items: Vec<SearchItem>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchItem {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub uploader_name: Option<String>,
    #[serde(default)]
    pub duration: Option<i64>,
}

impl SearchItem {
    /// "/watch?v=dQw4w9WgXcQ" -> "dQw4w9WgXcQ"
    pub fn video_id(&self) -> Option<&str> {
        let (_, rest) = self.url.split_once("v=")?;
        let id = rest.split('&').next().unwrap_or(rest);
        if id.is_empty() {
            None
        } else {
            Some(id)
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamsResponse {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub audio_streams: Vec<AudioStream>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioStream {
    pub url: String,
    #[serde(default)]
    pub bitrate: u32,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub codec: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
}

/// Highest declared bitrate among streams whose mime type starts with one of
/// `allowed` (empty = any).
pub fn best_stream(streams: &[AudioStream], allowed: &[String]) -> Option<AudioStream> {
    streams
        .iter()
        .filter(|s| !s.url.is_empty())
        .filter(|s| allowed.is_empty() || allowed.iter().any(|m| s.mime_type.starts_with(m.as_str())))
        .max_by_key(|s| s.bitrate)
        .cloned()
}
