pub mod engine;
pub mod events;
pub mod media_session;
#[cfg(feature = "mpris")]
pub mod mpris;
pub mod queue;
pub mod state;

pub use engine::{PlayOutcome, Player, PlayerParts};
pub use events::{EventBus, PlayerEvent, DEFAULT_MAX_LISTENERS};
pub use media_session::{LogSession, MediaCommand, MediaSession, NowPlaying};
pub use queue::{Queue, QueueEntry};
pub use state::PlayerState;
