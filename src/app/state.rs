use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tracing::warn;

use super::events::AppEvent;
use super::keys::{Action, KeyConfig, SEEK_STEP_MS, VOLUME_STEP};
use crate::audio::visualizer::{Analyser, FrameRequest, Point, VisualizerWorker};
use crate::catalog::Track;
use crate::lyrics::LyricDisplay;
use crate::player::{Player, PlayerState};
use crate::theme::Theme;

const TOAST_DURATION: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone)]
pub struct Toast {
    pub message: String,
    pub deadline: Instant,
}

/// What the UI draws in one frame, read from the player once per tick.
#[derive(Debug, Clone, Default)]
pub struct NowPlayingView {
    pub track: Option<Arc<Track>>,
    pub state: PlayerState,
    pub position: Duration,
    pub duration: Option<Duration>,
    pub liked: Option<bool>,
    pub error: Option<String>,
    pub queue_len: usize,
    pub queue_index: usize,
}

pub struct App {
    pub player: Arc<Player>,
    pub theme: Theme,
    pub keys: KeyConfig,
    pub view: NowPlayingView,
    pub lyrics: Option<watch::Receiver<LyricDisplay>>,
    pub points: Vec<Point>,
    /// Canvas size of the last drawn spectrum panel, in canvas units
    pub spectrum_size: (f64, f64),
    pub toast: Option<Toast>,
    pub is_running: bool,
    analyser: Option<Analyser>,
    visualizer: VisualizerWorker,
    tx: mpsc::Sender<AppEvent>,
}

impl App {
    pub fn new(
        player: Arc<Player>,
        keys: KeyConfig,
        lyrics: Option<watch::Receiver<LyricDisplay>>,
        analyser: Option<Analyser>,
        tx: mpsc::Sender<AppEvent>,
    ) -> Self {
        Self {
            player,
            theme: Theme::default(),
            keys,
            view: NowPlayingView::default(),
            lyrics,
            points: Vec::new(),
            spectrum_size: (0.0, 0.0),
            toast: None,
            is_running: true,
            analyser,
            visualizer: VisualizerWorker::spawn(),
            tx,
        }
    }

    pub fn lyric_display(&self) -> Option<LyricDisplay> {
        self.lyrics.as_ref().map(|rx| rx.borrow().clone())
    }

    pub fn show_toast(&mut self, message: &str) {
        self.toast = Some(Toast {
            message: message.to_string(),
            deadline: Instant::now() + TOAST_DURATION,
        });
    }

    /// Called every tick to update state
    pub fn on_tick(&mut self) {
        if let Some(ref toast) = self.toast {
            if Instant::now() > toast.deadline {
                self.toast = None;
            }
        }

        let (entries, index) = self.player.queue_snapshot();
        self.view = NowPlayingView {
            track: self.player.current_track(),
            state: self.player.state(),
            position: self.player.position(),
            duration: self.player.duration(),
            liked: self.player.liked(),
            error: self.player.last_error(),
            queue_len: entries.len(),
            queue_index: index,
        };

        self.update_spectrum();
    }

    /// The spectrum is only analysed while playing; otherwise the panel is blank.
    fn update_spectrum(&mut self) {
        let playing = self.view.state == PlayerState::Playing;
        let (width, height) = self.spectrum_size;
        match self.analyser.as_mut() {
            Some(analyser) if playing && width > 0.0 && height > 0.0 => {
                self.visualizer.request(FrameRequest {
                    magnitudes: analyser.byte_frequency_data(),
                    width,
                    height,
                });
                self.points = self.visualizer.points().to_vec();
            }
            _ => {
                self.visualizer.clear();
                self.points.clear();
            }
        }
    }

    /// Transport actions run off the UI loop; results come back as `AppEvent::Status`.
    pub fn dispatch(&mut self, action: Action) {
        let player = self.player.clone();
        match action {
            Action::Quit => self.is_running = false,
            Action::Stop => player.stop(),
            Action::SeekForward => player.seek_by(SEEK_STEP_MS),
            Action::SeekBackward => player.seek_by(-SEEK_STEP_MS),
            Action::VolumeUp | Action::VolumeDown => {
                let delta = if action == Action::VolumeUp { VOLUME_STEP } else { -VOLUME_STEP };
                let volume = player.adjust_volume(delta);
                self.show_toast(&format!("Volume {}%", (volume * 100.0).round() as u32));
            }
            Action::PlayPause => {
                tokio::spawn(async move {
                    player.toggle().await;
                });
            }
            Action::Next => {
                tokio::spawn(async move {
                    player.next().await;
                });
            }
            Action::Previous => {
                tokio::spawn(async move {
                    player.prev().await;
                });
            }
            Action::ToggleLike => {
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let message = match player.toggle_like().await {
                        Ok(true) => "♥ Saved to liked songs".to_string(),
                        Ok(false) => "Removed from liked songs".to_string(),
                        Err(e) => {
                            warn!(error = %e, "like toggle failed");
                            format!("❌ {}", e)
                        }
                    };
                    let _ = tx.send(AppEvent::Status(message)).await;
                });
            }
        }
    }
}
