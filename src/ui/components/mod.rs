pub mod lyrics;
pub mod player_card;
pub mod spectrum;
