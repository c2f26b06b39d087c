pub mod app;
pub mod audio;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod lyrics;
pub mod player;
pub mod resolver;
pub mod theme;
pub mod ui;

pub use error::{Error, Result};
