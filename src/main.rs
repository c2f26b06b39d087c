use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use crossterm::{
    event::{Event, EventStream, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use soundline::app::cli::Args;
use soundline::app::events::AppEvent;
use soundline::app::lock::try_acquire_audio_lock;
use soundline::app::App;
use soundline::audio::visualizer::Analyser;
use soundline::audio::{AudioOutput, CodecSupport, FormatAdapter, RodioOutput};
use soundline::cache::{DiskCache, MemoryCache, TrackCache};
use soundline::catalog::{Catalog, LocalCatalog, SpotifyCatalog, Track};
use soundline::config::Config;
use soundline::lyrics::{LrclibClient, LyricSynchronizer};
use soundline::player::{MediaCommand, MediaSession, Player, PlayerParts};
use soundline::resolver::{MirrorPool, Resolver};
use soundline::{theme, ui};

fn init_logging(level: &str) -> Result<WorkerGuard> {
    let dir = Config::log_dir();
    std::fs::create_dir_all(&dir).with_context(|| format!("creating log directory {}", dir.display()))?;
    let appender = tracing_appender::rolling::never(&dir, "soundline.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(guard)
}

/// Spotify when a token is configured, otherwise the local library.
/// Returns the library tracks too so an empty command line can queue them.
fn build_catalog(config: &Config, client: &reqwest::Client) -> Result<(Arc<dyn Catalog>, Vec<Track>)> {
    if let Some(token) = &config.catalog.spotify_token {
        info!("using Spotify catalog");
        return Ok((Arc::new(SpotifyCatalog::new(client.clone(), token.clone())), Vec::new()));
    }
    let Some(path) = &config.catalog.library else {
        bail!("no catalog: set SOUNDLINE_SPOTIFY_TOKEN or pass --library <json>");
    };
    let library = load_library(path)?;
    let tracks = library.tracks().to_vec();
    info!(path = %path.display(), tracks = tracks.len(), "using local library");
    Ok((Arc::new(library), tracks))
}

fn load_library(path: &Path) -> Result<LocalCatalog> {
    LocalCatalog::from_file(path).with_context(|| format!("reading library {}", path.display()))
}

fn build_cache(config: &Config, no_cache: bool) -> Arc<dyn TrackCache> {
    if no_cache || !config.cache.persistent {
        return Arc::new(MemoryCache::new());
    }
    let dir = config.cache.directory.clone().unwrap_or_else(DiskCache::default_dir);
    match DiskCache::new(&dir) {
        Ok(cache) => {
            info!(dir = %cache.dir().display(), "persistent track cache");
            Arc::new(cache)
        }
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "disk cache unavailable, keeping tracks in memory");
            Arc::new(MemoryCache::new())
        }
    }
}

#[cfg(feature = "mpris")]
fn build_session(tx: mpsc::UnboundedSender<MediaCommand>) -> Arc<dyn MediaSession> {
    Arc::new(soundline::player::mpris::spawn_mpris(tx))
}

#[cfg(not(feature = "mpris"))]
fn build_session(_tx: mpsc::UnboundedSender<MediaCommand>) -> Arc<dyn MediaSession> {
    Arc::new(soundline::player::LogSession)
}

#[tokio::main]
async fn main() -> Result<()> {
    human_panic::setup_panic!();
    let args = Args::parse();

    if args.generate_config {
        println!("{}", Config::default_toml()?);
        return Ok(());
    }

    let mut config = Config::load();
    if let Some(library) = &args.library {
        config.catalog.library = Some(library.clone());
    }
    if args.restricted {
        config.playback.codec_support = CodecSupport::Restricted;
    }
    let _log_guard = init_logging(&config.log_level)?;
    info!(version = env!("CARGO_PKG_VERSION"), "starting soundline");

    let Some(_audio_lock) = try_acquire_audio_lock() else {
        bail!("another soundline instance is already playing");
    };

    let client = reqwest::Client::builder()
        .user_agent(concat!("soundline/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("building HTTP client")?;

    let (catalog, library) = build_catalog(&config, &client)?;
    let resolver = Arc::new(Resolver::new(
        client.clone(),
        MirrorPool::new(config.resolver.mirrors.clone()),
        config.resolver.allowed_mime.clone(),
    ));
    let adapter = FormatAdapter::new(
        client.clone(),
        config.playback.codec_support,
        config.playback.transcode_format,
    );
    let output: Arc<dyn AudioOutput> = Arc::new(
        RodioOutput::spawn(config.playback.volume).context("opening audio output")?,
    );

    let (media_tx, mut media_rx) = mpsc::unbounded_channel();
    let player = Arc::new(Player::new(PlayerParts {
        catalog,
        resolver,
        adapter,
        cache: build_cache(&config, args.no_cache),
        output: output.clone(),
        session: build_session(media_tx),
        max_listeners: config.events.max_listeners,
        volume: config.playback.volume,
    }));
    let _end_watcher = player.spawn_end_watcher();

    let lyrics = if config.lyrics.enabled && !args.no_lyrics {
        let keep_on_disk = config.cache.persistent && !args.no_cache;
        let provider = LrclibClient::new(client.clone(), config.lyrics.endpoint.clone())
            .with_cache_dir(keep_on_disk.then(LrclibClient::default_cache_dir));
        let sync = Arc::new(LyricSynchronizer::new(
            Arc::new(provider),
            player.clone(),
            config.lyrics.sync_settings(),
        ));
        sync.attach(&player);
        Some(sync)
    } else {
        None
    };

    // Initial queue
    if !args.tracks.is_empty() {
        let loaded = player.load_ids(&args.tracks).await;
        if loaded == 0 {
            bail!("none of the {} requested tracks could be found", args.tracks.len());
        }
    } else if !library.is_empty() {
        player.load(library);
    }
    let starter = player.clone();
    tokio::spawn(async move {
        starter.autostart().await;
    });

    let (tx, mut rx) = mpsc::channel(100);
    let analyser = output.tap().map(|tap| Analyser::new(tap, config.visualizer.smoothing));
    let mut app = App::new(
        player.clone(),
        config.keys.clone(),
        lyrics.as_ref().map(|s| s.subscribe()),
        analyser,
        tx.clone(),
    );
    app.theme = theme::load_theme(&theme::theme_path());

    // 1. Input Event Task
    let tx_input = tx.clone();
    tokio::spawn(async move {
        let mut reader = EventStream::new();
        while let Some(Ok(event)) = reader.next().await {
            if tx_input.send(AppEvent::Input(event)).await.is_err() {
                break;
            }
        }
    });

    // 2. Media Session Task
    let tx_media = tx.clone();
    tokio::spawn(async move {
        while let Some(cmd) = media_rx.recv().await {
            if tx_media.send(AppEvent::Media(cmd)).await.is_err() {
                break;
            }
        }
    });

    // 3. Frame Tick Task
    let tx_tick = tx.clone();
    let frame = Duration::from_millis(config.visualizer.frame_interval_ms.max(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(frame);
        loop {
            interval.tick().await;
            if tx_tick.send(AppEvent::Tick).await.is_err() {
                break;
            }
        }
    });

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run(&mut terminal, &mut app, &mut rx).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    player.stop();
    info!("soundline exiting");
    result
}

async fn run(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    rx: &mut mpsc::Receiver<AppEvent>,
) -> Result<()> {
    while app.is_running {
        terminal.draw(|f| ui::ui(f, app))?;

        let Some(event) = rx.recv().await else { break };
        match event {
            AppEvent::Input(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                if let Some(action) = app.keys.action(key) {
                    app.dispatch(action);
                }
            }
            AppEvent::Input(_) => {}
            AppEvent::Media(MediaCommand::Quit) => app.is_running = false,
            AppEvent::Media(cmd) => {
                let player = app.player.clone();
                tokio::spawn(async move {
                    player.handle_media_command(cmd).await;
                });
            }
            AppEvent::Status(message) => app.show_toast(&message),
            AppEvent::Tick => app.on_tick(),
        }
    }
    Ok(())
}
