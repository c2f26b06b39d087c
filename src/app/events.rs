use crossterm::event::Event;

use crate::player::MediaCommand;

pub enum AppEvent {
    Input(Event),
    /// Transport request from the OS media session
    Media(MediaCommand),
    /// Result of a background action worth showing in the footer
    Status(String),
    Tick,
}
