//! D-Bus MPRIS surface so media keys and `playerctl` can drive the player.

use std::collections::HashMap;
use std::sync::Arc;

use async_io::{block_on, Timer};
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};
use zbus::{interface, Connection};
use zvariant::{OwnedValue, Value};

use super::media_session::{MediaCommand, MediaSession, NowPlaying};
use super::state::PlayerState;

const BUS_NAME: &str = "org.mpris.MediaPlayer2.soundline";
const OBJECT_PATH: &str = "/org/mpris/MediaPlayer2";

#[derive(Debug, Default)]
struct SharedState {
    state: PlayerState,
    now_playing: Option<NowPlaying>,
}

pub struct MprisSession {
    state: Arc<Mutex<SharedState>>,
}

impl MediaSession for MprisSession {
    fn set_metadata(&self, now_playing: &NowPlaying) {
        self.state.lock().now_playing = Some(now_playing.clone());
    }

    fn set_state(&self, state: PlayerState) {
        self.state.lock().state = state;
    }
}

struct RootIface {
    tx: UnboundedSender<MediaCommand>,
}

#[interface(name = "org.mpris.MediaPlayer2")]
impl RootIface {
    fn raise(&self) {}

    fn quit(&self) {
        let _ = self.tx.send(MediaCommand::Quit);
    }

    #[zbus(property)]
    fn can_quit(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_raise(&self) -> bool {
        false
    }

    #[zbus(property)]
    fn has_track_list(&self) -> bool {
        false
    }

    #[zbus(property)]
    fn identity(&self) -> &str {
        "soundline"
    }

    #[zbus(property)]
    fn supported_uri_schemes(&self) -> Vec<String> {
        vec![]
    }

    #[zbus(property)]
    fn supported_mime_types(&self) -> Vec<String> {
        vec![]
    }
}

struct PlayerIface {
    tx: UnboundedSender<MediaCommand>,
    state: Arc<Mutex<SharedState>>,
}

fn owned(value: Value<'_>) -> Option<OwnedValue> {
    OwnedValue::try_from(value).ok()
}

#[interface(name = "org.mpris.MediaPlayer2.Player")]
impl PlayerIface {
    fn next(&self) {
        let _ = self.tx.send(MediaCommand::Next);
    }

    fn previous(&self) {
        let _ = self.tx.send(MediaCommand::Previous);
    }

    fn play(&self) {
        let _ = self.tx.send(MediaCommand::Play);
    }

    fn pause(&self) {
        let _ = self.tx.send(MediaCommand::Pause);
    }

    fn play_pause(&self) {
        let _ = self.tx.send(MediaCommand::PlayPause);
    }

    fn stop(&self) {
        let _ = self.tx.send(MediaCommand::Stop);
    }

    /// Offset in microseconds
    fn seek(&self, offset: i64) {
        let _ = self.tx.send(MediaCommand::SeekBy(offset / 1000));
    }

    #[zbus(property)]
    fn playback_status(&self) -> &str {
        match self.state.lock().state {
            PlayerState::Playing => "Playing",
            PlayerState::Paused | PlayerState::Loading => "Paused",
            PlayerState::Stopped | PlayerState::Error => "Stopped",
        }
    }

    #[zbus(property)]
    fn can_control(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_play(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_pause(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_seek(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_go_next(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_go_previous(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn metadata(&self) -> HashMap<String, OwnedValue> {
        let mut map = HashMap::new();
        let state = self.state.lock();
        let Some(np) = state.now_playing.as_ref() else {
            return map;
        };

        let mut put = |key: &str, value: Value<'_>| {
            if let Some(v) = owned(value) {
                map.insert(key.to_string(), v);
            }
        };
        put("xesam:title", Value::from(np.title.clone()));
        put("xesam:artist", Value::from(vec![np.artist.clone()]));
        put("xesam:album", Value::from(np.album.clone()));
        put("mpris:length", Value::from(np.duration.as_micros() as i64));
        // Data URIs are not understood by most MPRIS clients
        if let Some(art) = np.artwork.iter().find(|a| !a.src.starts_with("data:")) {
            put("mpris:artUrl", Value::from(art.src.clone()));
        }
        map
    }
}

/// Register on the session bus from a dedicated thread.
pub fn spawn_mpris(tx: UnboundedSender<MediaCommand>) -> MprisSession {
    let state = Arc::new(Mutex::new(SharedState::default()));
    let state_for_thread = state.clone();

    std::thread::spawn(move || {
        block_on(async move {
            let connection = match Connection::session().await {
                Ok(c) => c,
                Err(e) => {
                    warn!(error = %e, "MPRIS: no session bus");
                    return;
                }
            };

            if let Err(e) = connection.request_name(BUS_NAME).await {
                warn!(error = %e, "MPRIS: failed to acquire name");
                return;
            }

            let object_server = connection.object_server();
            if let Err(e) = object_server.at(OBJECT_PATH, RootIface { tx: tx.clone() }).await {
                warn!(error = %e, "MPRIS: failed to register root interface");
                return;
            }
            if let Err(e) = object_server
                .at(
                    OBJECT_PATH,
                    PlayerIface {
                        tx,
                        state: state_for_thread,
                    },
                )
                .await
            {
                warn!(error = %e, "MPRIS: failed to register player interface");
                return;
            }
            info!(name = BUS_NAME, "MPRIS registered");

            loop {
                Timer::after(std::time::Duration::from_secs(3600)).await;
            }
        });
    });

    MprisSession { state }
}
