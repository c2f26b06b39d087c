//! Resolver: catalog Track -> direct audio stream URL via a Piped mirror pool.

pub mod mirrors;
pub mod piped;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::catalog::Track;
use crate::error::{Error, Result};

pub use mirrors::MirrorPool;
pub use piped::{AudioStream, SearchItem, StreamsResponse};

const PROBE_TIMEOUT: Duration = Duration::from_secs(4);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// A playable network stream picked for a Track.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStream {
    pub url: String,
    pub bitrate: u32,
    pub mime_type: String,
    pub video_id: String,
}

#[async_trait]
pub trait StreamResolver: Send + Sync {
    async fn resolve(&self, track: &Track) -> Result<ResolvedStream>;

    /// Settle on a working backend before the first resolve.
    async fn warm_up(&self) -> Result<()> {
        Ok(())
    }
}

pub struct Resolver {
    client: Client,
    pool: MirrorPool,
    allowed_mime: Vec<String>,
}

impl Resolver {
    pub fn new(client: Client, pool: MirrorPool, allowed_mime: Vec<String>) -> Self {
        Self {
            client,
            pool,
            allowed_mime,
        }
    }

    /// "Title - Artist A, Artist B"
    pub fn search_query(track: &Track) -> String {
        format!("{} - {}", track.name, track.artist_names())
    }

    /// Probe hosts in priority order and adopt the first that answers.
    /// At most one attempt per host.
    pub async fn probe(&self) -> Result<usize> {
        for (i, host) in self.pool.hosts().iter().enumerate() {
            let url = format!("{}/healthcheck", host);
            match self.client.get(&url).timeout(PROBE_TIMEOUT).send().await {
                Ok(resp) if resp.status().is_success() => {
                    info!(mirror = %host, "adopted search mirror");
                    self.pool.adopt(i);
                    return Ok(i);
                }
                Ok(resp) => warn!(mirror = %host, status = %resp.status(), "mirror probe rejected"),
                Err(e) => warn!(mirror = %host, error = %e, "mirror probe failed"),
            }
        }
        Err(Error::MirrorsExhausted {
            attempts: self.pool.len(),
        })
    }

    /// GET against the active mirror, rotating through the pool on failure.
    /// Bounded to one attempt per mirror.
    async fn request<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let attempts = self.pool.len();
        let mut host_idx = self.pool.active_index();

        for _ in 0..attempts {
            let host = &self.pool.hosts()[host_idx];
            match self.try_request(host, path, query).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(mirror = %host, path, error = %e, "mirror request failed, rotating");
                    host_idx = self.pool.advance_from(host_idx);
                }
            }
        }

        Err(Error::MirrorsExhausted { attempts })
    }

    async fn try_request<T: DeserializeOwned>(&self, host: &str, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let resp = self
            .client
            .get(format!("{}{}", host, path))
            .query(query)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json().await?)
    }

    pub async fn search_songs(&self, query: &str) -> Result<Vec<SearchItem>> {
        let results: piped::SearchResults = self
            .request("/search", &[("q", query), ("filter", "music_songs")])
            .await?;
        Ok(results.items)
    }

    pub async fn streams(&self, video_id: &str) -> Result<StreamsResponse> {
        self.request(&format!("/streams/{}", video_id), &[]).await
    }
}

#[async_trait]
impl StreamResolver for Resolver {
    async fn resolve(&self, track: &Track) -> Result<ResolvedStream> {
        let query = Self::search_query(track);
        debug!(%query, "resolving track");

        // 1. First search hit is taken as authoritative
        let results = self.search_songs(&query).await?;
        let video_id = results
            .first()
            .and_then(|item| item.video_id())
            .map(str::to_string)
            .ok_or_else(|| Error::NoStreamFound(query.clone()))?;

        // 2. Highest-bitrate audio-only stream
        let streams = self.streams(&video_id).await?;
        let best = piped::best_stream(&streams.audio_streams, &self.allowed_mime)
            .ok_or_else(|| Error::NoStreamFound(query.clone()))?;

        info!(%video_id, bitrate = best.bitrate, mime = %best.mime_type, "stream resolved");
        Ok(ResolvedStream {
            url: best.url,
            bitrate: best.bitrate,
            mime_type: best.mime_type,
            video_id,
        })
    }

    async fn warm_up(&self) -> Result<()> {
        self.probe().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{test_track, Artist};

    #[test]
    fn test_search_query_joins_artists() {
        let mut t = test_track("1", "Song", "Alpha");
        t.artists.push(Artist {
            id: String::new(),
            name: "Beta".into(),
        });
        assert_eq!(Resolver::search_query(&t), "Song - Alpha, Beta");
    }

    #[tokio::test]
    async fn test_empty_pool_fails_fast() {
        let r = Resolver::new(Client::new(), MirrorPool::new(Vec::<String>::new()), vec![]);
        let err = r.resolve(&test_track("1", "Song", "Alpha")).await.unwrap_err();
        assert!(matches!(err, Error::MirrorsExhausted { attempts: 0 }));
    }

    #[tokio::test]
    async fn test_warm_up_adopts_first_healthy_mirror() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut sock, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = sock.read(&mut buf).await;
                let _ = sock
                    .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok")
                    .await;
            }
        });

        let pool = MirrorPool::new(["http://127.0.0.1:1".to_string(), format!("http://{}", addr)]);
        let r = Resolver::new(Client::new(), pool, vec![]);
        r.warm_up().await.unwrap();
        assert_eq!(r.pool.active_index(), 1);
    }
}
