use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{Catalog, Track};
use crate::error::{Error, Result};

const API_BASE: &str = "https://api.spotify.com/v1";

#[derive(Debug, Deserialize)]
struct RecommendationsResponse {
    #[serde(default)]
    tracks: Vec<Track>,
}

/// Spotify Web API catalog. The authorization flow lives outside the player;
/// this only needs a bearer token.
pub struct SpotifyCatalog {
    client: Client,
    token: String,
    base: String,
}

impl SpotifyCatalog {
    pub fn new(client: Client, token: impl Into<String>) -> Self {
        Self {
            client,
            token: token.into(),
            base: API_BASE.to_string(),
        }
    }

    /// Point at a different API root (proxies, tests).
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path)
    }

    fn check(status: reqwest::StatusCode, what: &str) -> Result<()> {
        if status.is_success() {
            Ok(())
        } else {
            Err(Error::Catalog(format!("{} failed: HTTP {}", what, status)))
        }
    }
}

#[async_trait]
impl Catalog for SpotifyCatalog {
    async fn track(&self, id: &str) -> Result<Track> {
        let resp = self
            .client
            .get(self.url(&format!("tracks/{}", id)))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::check(resp.status(), "track lookup")?;
        Ok(resp.json().await?)
    }

    async fn recommendations(&self, seed_tracks: &[String], seed_artists: &[String]) -> Result<Vec<Track>> {
        let tracks = seed_tracks.join(",");
        let artists = seed_artists.join(",");
        debug!(seed_tracks = %tracks, seed_artists = %artists, "requesting recommendations");

        let resp = self
            .client
            .get(self.url("recommendations"))
            .bearer_auth(&self.token)
            .query(&[("seed_tracks", tracks.as_str()), ("seed_artists", artists.as_str())])
            .send()
            .await?;
        Self::check(resp.status(), "recommendations")?;
        let data: RecommendationsResponse = resp.json().await?;
        Ok(data.tracks)
    }

    async fn is_liked(&self, id: &str) -> Result<bool> {
        let resp = self
            .client
            .get(self.url("me/tracks/contains"))
            .bearer_auth(&self.token)
            .query(&[("ids", id)])
            .send()
            .await?;
        Self::check(resp.status(), "liked lookup")?;
        let out: Vec<bool> = resp.json().await?;
        Ok(out.first().copied().unwrap_or(false))
    }

    async fn set_liked(&self, id: &str, liked: bool) -> Result<()> {
        let body = serde_json::json!({ "ids": [id] });
        let req = if liked {
            self.client.put(self.url("me/tracks"))
        } else {
            self.client.delete(self.url("me/tracks"))
        };
        let resp = req.bearer_auth(&self.token).json(&body).send().await?;
        Self::check(resp.status(), "like toggle")
    }
}
