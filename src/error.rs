//! Error types for soundline
//!
//! Resolution and decode failures end up here and drive the player into
//! `PlayerState::Error`. Cache misses and missing lyrics are not errors; they
//! surface as `None` / `LyricsFetchResult::NotFound`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Search returned nothing usable for the track
    #[error("No stream found for \"{0}\"")]
    NoStreamFound(String),

    /// Every mirror in the pool failed for one request
    #[error("All {attempts} mirrors unreachable")]
    MirrorsExhausted { attempts: usize },

    /// Fetched bytes could not be decoded
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Any fetch rejection
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Catalog collaborator failures (lookup, recommendations, likes)
    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Cache error: {0}")]
    Cache(String),

    /// Audio device or output thread failures
    #[error("Audio output error: {0}")]
    Output(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Errors that belong to the resolution stage of the play pipeline.
    pub fn is_resolution_failure(&self) -> bool {
        matches!(
            self,
            Error::NoStreamFound(_) | Error::MirrorsExhausted { .. } | Error::Network(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
