use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde::{Deserialize, Serialize};

/// Seek step for the arrow keys
pub const SEEK_STEP_MS: i64 = 5_000;
pub const VOLUME_STEP: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    PlayPause,
    Next,
    Previous,
    Stop,
    SeekForward,
    SeekBackward,
    ToggleLike,
    VolumeUp,
    VolumeDown,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    pub quit: String,
    pub quit_alt: String,
    pub play_pause: String,
    pub next_track: String,
    pub prev_track: String,
    pub stop: String,
    pub seek_forward: String,
    pub seek_backward: String,
    pub toggle_like: String,
    pub volume_up: String,
    pub volume_down: String,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            quit: "q".to_string(),
            quit_alt: "Esc".to_string(),
            play_pause: "Space".to_string(),
            next_track: "n".to_string(),
            prev_track: "p".to_string(),
            stop: "s".to_string(),
            seek_forward: "Right".to_string(),
            seek_backward: "Left".to_string(),
            toggle_like: "l".to_string(),
            volume_up: "+".to_string(),
            volume_down: "-".to_string(),
        }
    }
}

impl KeyConfig {
    pub fn matches(&self, event: KeyEvent, key_str: &str) -> bool {
        match key_str {
            "Space" => event.code == KeyCode::Char(' '),
            "Enter" => event.code == KeyCode::Enter,
            "Esc" => event.code == KeyCode::Esc,
            "Up" => event.code == KeyCode::Up,
            "Down" => event.code == KeyCode::Down,
            "Left" => event.code == KeyCode::Left,
            "Right" => event.code == KeyCode::Right,
            s if s.chars().count() == 1 => match s.chars().next() {
                // Uppercase bindings also accept shift + lowercase
                Some(ch) if ch.is_uppercase() => {
                    event.code == KeyCode::Char(ch)
                        || (event.code == KeyCode::Char(ch.to_ascii_lowercase())
                            && event.modifiers.contains(KeyModifiers::SHIFT))
                }
                Some(ch) => event.code == KeyCode::Char(ch),
                None => false,
            },
            _ => false,
        }
    }

    pub fn action(&self, event: KeyEvent) -> Option<Action> {
        if event.modifiers.contains(KeyModifiers::CONTROL) && event.code == KeyCode::Char('c') {
            return Some(Action::Quit);
        }
        let bindings = [
            (&self.quit, Action::Quit),
            (&self.quit_alt, Action::Quit),
            (&self.play_pause, Action::PlayPause),
            (&self.next_track, Action::Next),
            (&self.prev_track, Action::Previous),
            (&self.stop, Action::Stop),
            (&self.seek_forward, Action::SeekForward),
            (&self.seek_backward, Action::SeekBackward),
            (&self.toggle_like, Action::ToggleLike),
            (&self.volume_up, Action::VolumeUp),
            (&self.volume_down, Action::VolumeDown),
        ];
        bindings
            .into_iter()
            .find(|(key, _)| self.matches(event, key))
            .map(|(_, action)| action)
    }

    // Helper for UI display
    pub fn display(&self, key_str: &str) -> String {
        match key_str {
            "Left" => "←".to_string(),
            "Right" => "→".to_string(),
            "Up" => "↑".to_string(),
            "Down" => "↓".to_string(),
            _ => key_str.to_string(),
        }
    }
}
