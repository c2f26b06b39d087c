use std::path::PathBuf;

use clap::Parser;

/// soundline - stream catalog tracks in your terminal, with synced lyrics 🎵
#[derive(Parser, Debug, Default)]
#[command(name = "soundline", version, about)]
pub struct Args {
    /// Catalog track ids to queue, in order
    pub tracks: Vec<String>,

    /// Local library JSON (array of tracks) used instead of Spotify
    #[arg(long, short = 'l')]
    pub library: Option<PathBuf>,

    /// Force the transcode path even if the container plays natively
    #[arg(long)]
    pub restricted: bool,

    /// Keep decoded tracks in memory only
    #[arg(long)]
    pub no_cache: bool,

    /// Skip lyric lookups
    #[arg(long)]
    pub no_lyrics: bool,

    /// Generate default config.toml to stdout
    #[arg(long)]
    pub generate_config: bool,
}
