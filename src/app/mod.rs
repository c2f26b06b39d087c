pub mod cli;
pub mod events;
pub mod keys;
pub mod lock;
pub mod state;

pub use state::*;
