//! Playback engine: owns the output lifecycle and orchestrates
//! resolve -> adapt -> play, with the cache short-circuiting the network.
//!
//! Every play pipeline captures a generation number when it starts. Before it
//! touches the output or publishes anything it compares that number against
//! the live one; a newer play makes the older completion a no-op.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use parking_lot::Mutex;
use reqwest::Client;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::events::{EventBus, PlayerEvent};
use super::media_session::{MediaCommand, MediaSession, NowPlaying};
use super::queue::{Queue, QueueEntry};
use super::state::PlayerState;
use crate::audio::{decode, AudioOutput, Download, FormatAdapter, LoadTicket, OutputEvent, PlaybackSource};
use crate::cache::{CacheEntry, TrackCache};
use crate::catalog::{recommendation_seeds, Catalog, Track};
use crate::error::{Error, Result};
use crate::resolver::{ResolvedStream, StreamResolver};

/// How a single play request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    Playing,
    /// Superseded by a newer play before it could apply
    Stale,
    Failed,
    /// Nothing to play at the requested position
    Idle,
}

/// Collaborators the engine drives.
pub struct PlayerParts {
    pub catalog: Arc<dyn Catalog>,
    pub resolver: Arc<dyn StreamResolver>,
    pub adapter: FormatAdapter,
    pub cache: Arc<dyn TrackCache>,
    pub output: Arc<dyn AudioOutput>,
    pub session: Arc<dyn MediaSession>,
    pub max_listeners: usize,
    /// Initial output volume, 0.0..=1.0
    pub volume: f32,
}

struct Prepared {
    source: PlaybackSource,
    image: Option<String>,
    /// Set when the source came from the network and should be cached
    fetched: Option<(ResolvedStream, Download)>,
}

pub struct Player {
    catalog: Arc<dyn Catalog>,
    resolver: Arc<dyn StreamResolver>,
    adapter: FormatAdapter,
    cache: Arc<dyn TrackCache>,
    output: Arc<dyn AudioOutput>,
    session: Arc<dyn MediaSession>,
    queue: Mutex<Queue>,
    state: Mutex<PlayerState>,
    generation: Arc<AtomicU64>,
    /// The output holds the current entry's source
    source_ready: AtomicBool,
    volume: Mutex<f32>,
    artwork: Mutex<Option<String>>,
    liked: Mutex<Option<bool>>,
    last_error: Mutex<Option<String>>,
    events: EventBus<PlayerEvent>,
}

impl Player {
    pub fn new(parts: PlayerParts) -> Self {
        Self {
            catalog: parts.catalog,
            resolver: parts.resolver,
            adapter: parts.adapter,
            cache: parts.cache,
            output: parts.output,
            session: parts.session,
            queue: Mutex::new(Queue::new()),
            state: Mutex::new(PlayerState::Stopped),
            generation: Arc::new(AtomicU64::new(0)),
            source_ready: AtomicBool::new(false),
            volume: Mutex::new(parts.volume.clamp(0.0, 1.0)),
            artwork: Mutex::new(None),
            liked: Mutex::new(None),
            last_error: Mutex::new(None),
            events: EventBus::new(parts.max_listeners),
        }
    }

    // ---- observation ----

    pub fn on(&self, event: PlayerEvent, listener: impl Fn() + Send + Sync + 'static) -> bool {
        self.events.on(event, listener)
    }

    pub fn state(&self) -> PlayerState {
        *self.state.lock()
    }

    pub fn current_entry(&self) -> Option<QueueEntry> {
        self.queue.lock().current().cloned()
    }

    pub fn current_track(&self) -> Option<Arc<Track>> {
        self.current_entry().map(|e| e.track)
    }

    /// (entries, cursor) snapshot for display.
    pub fn queue_snapshot(&self) -> (Vec<QueueEntry>, usize) {
        let q = self.queue.lock();
        (q.entries().to_vec(), q.index())
    }

    pub fn position(&self) -> Duration {
        self.output.position()
    }

    pub fn duration(&self) -> Option<Duration> {
        let catalog = || self.current_track().map(|t| Duration::from_millis(t.duration_ms));
        if !self.source_ready.load(Ordering::SeqCst) {
            return catalog();
        }
        self.output.duration().or_else(catalog)
    }

    pub fn volume(&self) -> f32 {
        *self.volume.lock()
    }

    pub fn liked(&self) -> Option<bool> {
        *self.liked.lock()
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    pub fn output(&self) -> &Arc<dyn AudioOutput> {
        &self.output
    }

    // ---- queue mutations (each emits QueueChange before returning) ----

    pub fn add(&self, tracks: Vec<Track>) {
        self.queue.lock().add(tracks);
        self.events.emit(PlayerEvent::QueueChange);
    }

    pub fn remove(&self, pos: usize) -> Option<QueueEntry> {
        let removed = self.queue.lock().remove(pos);
        self.events.emit(PlayerEvent::QueueChange);
        removed
    }

    pub fn load(&self, tracks: Vec<Track>) {
        self.queue.lock().load(tracks);
        self.events.emit(PlayerEvent::QueueChange);
    }

    pub fn reset(&self) {
        self.queue.lock().reset();
        self.events.emit(PlayerEvent::QueueChange);
    }

    /// Fetch tracks by id from the catalog and load them. Unknown ids are skipped.
    pub async fn load_ids(&self, ids: &[String]) -> usize {
        let mut tracks = Vec::with_capacity(ids.len());
        for id in ids {
            match self.catalog.track(id).await {
                Ok(track) => tracks.push(track),
                Err(e) => warn!(id = %id, error = %e, "skipping unknown track"),
            }
        }
        let count = tracks.len();
        self.load(tracks);
        count
    }

    // ---- transport ----

    /// First playback after launch. The resolver settles on a backend
    /// before the cursor entry is resolved.
    pub async fn autostart(&self) -> PlayOutcome {
        if let Err(e) = self.resolver.warm_up().await {
            warn!(error = %e, "resolver warm-up failed");
        }
        self.start().await
    }

    /// Play the entry at the cursor.
    pub async fn start(&self) -> PlayOutcome {
        let pos = self.queue.lock().index();
        self.play_at(pos).await
    }

    /// Play `track` immediately, appending it to the queue.
    pub async fn play_track(&self, track: Track) -> PlayOutcome {
        let pos = {
            let mut q = self.queue.lock();
            q.add(std::iter::once(track));
            q.len() - 1
        };
        self.events.emit(PlayerEvent::QueueChange);
        self.play_at(pos).await
    }

    /// Jump to any queue position. The cursor lands one past it.
    pub async fn play_at(&self, pos: usize) -> PlayOutcome {
        let entry = {
            let mut q = self.queue.lock();
            let Some(entry) = q.get(pos).cloned() else {
                return PlayOutcome::Idle;
            };
            q.set_cursor(pos + 1);
            entry
        };
        self.events.emit(PlayerEvent::QueueChange);
        self.play_entry(entry).await
    }

    pub async fn next(&self) -> PlayOutcome {
        self.ensure_recommendations().await;

        let (pos, appended) = {
            let mut q = self.queue.lock();
            let appended = q.at_tail() && q.append_recommendation();
            (q.index(), appended)
        };
        if appended {
            self.events.emit(PlayerEvent::QueueChange);
        }
        self.play_at(pos).await
    }

    /// Replay the entry before the current one. No-op at the start of the queue.
    pub async fn prev(&self) -> PlayOutcome {
        let index = self.queue.lock().index();
        if index == 0 {
            return PlayOutcome::Idle;
        }
        self.play_at(index.saturating_sub(2)).await
    }

    /// play <-> pause. From stopped resumes the loaded source, or loads the
    /// current entry when a stop interrupted its load. From error retries.
    pub async fn toggle(&self) -> PlayOutcome {
        match self.state() {
            PlayerState::Playing => {
                self.set_state(PlayerState::Paused);
                PlayOutcome::Idle
            }
            PlayerState::Paused | PlayerState::Stopped if self.can_resume() => {
                self.set_state(PlayerState::Playing);
                PlayOutcome::Playing
            }
            PlayerState::Error | PlayerState::Stopped => match self.current_entry() {
                Some(entry) => self.play_entry(entry).await,
                None => self.start().await,
            },
            _ => PlayOutcome::Idle,
        }
    }

    pub fn pause(&self) {
        if self.state() == PlayerState::Playing {
            self.set_state(PlayerState::Paused);
        }
    }

    pub fn resume(&self) {
        if matches!(self.state(), PlayerState::Paused | PlayerState::Stopped) && self.can_resume() {
            self.set_state(PlayerState::Playing);
        }
    }

    /// Stopping supersedes any load still in flight.
    pub fn stop(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.set_state(PlayerState::Stopped);
    }

    /// Ignored until the current entry's source is loaded.
    pub fn seek(&self, position: Duration) {
        if !self.source_ready.load(Ordering::SeqCst) {
            return;
        }
        let position = match self.duration() {
            Some(d) => position.min(d),
            None => position,
        };
        self.output.seek(position);
    }

    pub fn seek_by(&self, delta_ms: i64) {
        let now = self.position().as_millis() as i64;
        self.seek(Duration::from_millis((now + delta_ms).max(0) as u64));
    }

    pub fn set_volume(&self, volume: f32) {
        let volume = volume.clamp(0.0, 1.0);
        *self.volume.lock() = volume;
        self.output.set_volume(volume);
    }

    /// Nudge the volume and return the new level.
    pub fn adjust_volume(&self, delta: f32) -> f32 {
        let volume = (self.volume() + delta).clamp(0.0, 1.0);
        self.set_volume(volume);
        volume
    }

    /// Flip the liked flag of the current track at the catalog.
    pub async fn toggle_like(&self) -> Result<bool> {
        let track = self
            .current_track()
            .ok_or_else(|| Error::Catalog("nothing is playing".into()))?;
        let liked = !self.catalog.is_liked(&track.id).await?;
        self.catalog.set_liked(&track.id, liked).await?;
        *self.liked.lock() = Some(liked);
        self.events.emit(PlayerEvent::MetadataChange);
        Ok(liked)
    }

    /// Returns false when the command asks the app to quit.
    pub async fn handle_media_command(&self, cmd: MediaCommand) -> bool {
        debug!(?cmd, "media command");
        match cmd {
            MediaCommand::Play if self.can_resume() => self.resume(),
            MediaCommand::Play => {
                self.toggle().await;
            }
            MediaCommand::Pause => self.pause(),
            MediaCommand::PlayPause => {
                self.toggle().await;
            }
            MediaCommand::Stop => self.stop(),
            MediaCommand::Next => {
                self.next().await;
            }
            MediaCommand::Previous => {
                self.prev().await;
            }
            MediaCommand::SeekTo(pos) => self.seek(pos),
            MediaCommand::SeekBy(ms) => self.seek_by(ms),
            MediaCommand::Quit => return false,
        }
        true
    }

    /// Advance automatically when the output reaches the end of a source.
    pub fn spawn_end_watcher(self: &Arc<Self>) -> JoinHandle<()> {
        let mut rx = self.output.subscribe();
        let player: Weak<Player> = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(OutputEvent::Ended) => {
                        let Some(player) = player.upgrade() else { break };
                        if player.state() == PlayerState::Playing {
                            debug!("source ended, advancing");
                            player.next().await;
                        }
                    }
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    // ---- internals ----

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn can_resume(&self) -> bool {
        self.source_ready.load(Ordering::SeqCst) && self.current_entry().is_some()
    }

    fn set_state(&self, state: PlayerState) {
        *self.state.lock() = state;
        match state {
            PlayerState::Playing => {
                self.output.resume_context();
                self.output.play();
                if let Some(track) = self.current_track() {
                    let image = self.artwork.lock().clone();
                    self.session.set_metadata(&NowPlaying::from_track(&track, image.as_deref()));
                }
                self.events.emit(PlayerEvent::MetadataChange);
            }
            PlayerState::Paused | PlayerState::Error => self.output.pause(),
            PlayerState::Stopped => {
                self.output.pause();
                self.output.seek(Duration::ZERO);
            }
            PlayerState::Loading => {}
        }
        self.session.set_state(state);
        self.events.emit(PlayerEvent::StateChange);
    }

    async fn play_entry(&self, entry: QueueEntry) -> PlayOutcome {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let track = entry.track.clone();
        info!(track = %track.name, artist = %track.artist_names(), generation, "loading track");

        self.source_ready.store(false, Ordering::SeqCst);
        self.output.pause();
        self.output.seek(Duration::ZERO);
        *self.artwork.lock() = None;
        *self.liked.lock() = None;
        *self.last_error.lock() = None;
        self.events.emit(PlayerEvent::TrackChange);
        self.set_state(PlayerState::Loading);

        let prepared = match self.prepare(&track, generation).await {
            Ok(Some(p)) => p,
            Ok(None) => return PlayOutcome::Stale,
            Err(e) => return self.fail(generation, e),
        };

        let ticket = LoadTicket::new(self.generation.clone(), generation);
        let applied = if ticket.is_current() {
            self.output.set_source(prepared.source, ticket).await
        } else {
            Ok(false)
        };
        match applied {
            Ok(true) if self.is_current(generation) => {}
            Ok(_) => {
                debug!(generation, "discarding stale source");
                if let Some((_, download)) = &prepared.fetched {
                    download.cancel();
                }
                return PlayOutcome::Stale;
            }
            Err(e) => {
                if let Some((_, download)) = &prepared.fetched {
                    download.cancel();
                }
                return self.fail(generation, e);
            }
        }

        self.source_ready.store(true, Ordering::SeqCst);
        *self.artwork.lock() = prepared.image;
        self.set_state(PlayerState::Playing);

        if let Some((stream, download)) = prepared.fetched {
            self.spawn_cache_write(track.clone(), stream, download);
        }
        self.refresh_liked(&track, generation).await;
        PlayOutcome::Playing
    }

    /// Cache hit short-circuits the resolver entirely.
    async fn prepare(&self, track: &Track, generation: u64) -> Result<Option<Prepared>> {
        match self.cache.get(&track.id).await {
            Ok(Some(entry)) => {
                info!(track_id = %track.id, "playing from cache");
                return Ok(Some(Prepared {
                    source: self.adapter.from_buffers(&entry.buffers),
                    image: entry.image,
                    fetched: None,
                }));
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "cache read failed, resolving instead"),
        }
        if !self.is_current(generation) {
            return Ok(None);
        }

        let stream = self.resolver.resolve(track).await?;
        if !self.is_current(generation) {
            return Ok(None);
        }

        let download = self.adapter.open(&stream.url);
        let source = match self.adapter.adapt(&download, Some(&stream.mime_type)).await {
            Ok(source) => source,
            Err(e) => {
                download.cancel();
                return Err(e);
            }
        };
        Ok(Some(Prepared {
            source,
            image: None,
            fetched: Some((stream, download)),
        }))
    }

    fn fail(&self, generation: u64, e: Error) -> PlayOutcome {
        if !self.is_current(generation) {
            debug!(error = %e, "stale pipeline failed");
            return PlayOutcome::Stale;
        }
        let stage = if e.is_resolution_failure() { "resolve" } else { "decode" };
        error!(stage, error = %e, "playback failed");
        *self.last_error.lock() = Some(e.to_string());
        self.set_state(PlayerState::Error);
        PlayOutcome::Failed
    }

    async fn ensure_recommendations(&self) {
        let (seed_tracks, seed_artists) = {
            let q = self.queue.lock();
            if !q.at_tail() || q.recommendations_len() > 0 {
                return;
            }
            recommendation_seeds(&q.track_ids(), q.current().map(|e| e.track.as_ref()))
        };
        if seed_tracks.is_empty() && seed_artists.is_empty() {
            return;
        }

        match self.catalog.recommendations(&seed_tracks, &seed_artists).await {
            Ok(tracks) => {
                debug!(count = tracks.len(), "recommendations fetched");
                self.queue.lock().extend_recommendations(tracks);
                self.events.emit(PlayerEvent::QueueChange);
            }
            Err(e) => warn!(error = %e, "recommendations unavailable"),
        }
    }

    async fn refresh_liked(&self, track: &Track, generation: u64) {
        match self.catalog.is_liked(&track.id).await {
            Ok(liked) if self.is_current(generation) => {
                *self.liked.lock() = Some(liked);
                self.events.emit(PlayerEvent::MetadataChange);
            }
            Ok(_) => {}
            Err(e) => debug!(error = %e, "liked status unavailable"),
        }
    }

    /// Write-behind: once playback is under way, decode the finished download
    /// independently of the output and store it.
    fn spawn_cache_write(&self, track: Arc<Track>, stream: ResolvedStream, download: Download) {
        let cache = self.cache.clone();
        let client = self.adapter.client().clone();
        tokio::spawn(async move {
            if let Err(e) = write_behind(&client, cache.as_ref(), &track, &stream, &download).await {
                warn!(track_id = %track.id, error = %e, "cache write failed");
            }
        });
    }
}

async fn write_behind(
    client: &Client,
    cache: &dyn TrackCache,
    track: &Track,
    stream: &ResolvedStream,
    download: &Download,
) -> Result<()> {
    let bytes = download.bytes().await?;
    let mime = stream.mime_type.clone();
    let buffers = tokio::task::spawn_blocking(move || decode::decode_stereo(bytes, Some(&mime)))
        .await
        .map_err(|e| Error::Decode(e.to_string()))??;

    let image = match track.artwork_url() {
        Some(url) => match image_data_uri(client, url).await {
            Ok(uri) => Some(uri),
            Err(e) => {
                debug!(error = %e, "thumbnail fetch failed");
                None
            }
        },
        None => None,
    };

    cache
        .put(
            &track.id,
            CacheEntry {
                buffers,
                track: track.clone(),
                image,
            },
        )
        .await
}

async fn image_data_uri(client: &Client, url: &str) -> Result<String> {
    let resp = client.get(url).send().await?.error_for_status()?;
    let mime = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("image/jpeg")
        .to_string();
    let bytes = resp.bytes().await?;
    Ok(format!("data:{};base64,{}", mime, STANDARD.encode(&bytes)))
}
