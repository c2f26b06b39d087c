use serde::{Deserialize, Serialize};

/// Lifecycle of the single output. Owned by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerState {
    #[default]
    Stopped,
    Loading,
    Playing,
    Paused,
    Error,
}

impl PlayerState {
    pub fn label(self) -> &'static str {
        match self {
            PlayerState::Stopped => "stopped",
            PlayerState::Loading => "loading",
            PlayerState::Playing => "playing",
            PlayerState::Paused => "paused",
            PlayerState::Error => "error",
        }
    }

    pub fn is_playing(self) -> bool {
        self == PlayerState::Playing
    }
}

impl std::fmt::Display for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
