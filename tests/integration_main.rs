use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Notify};

use soundline::audio::wav::{encode_stereo, SampleFormat};
use soundline::audio::{
    AudioOutput, CodecSupport, FormatAdapter, LoadTicket, OutputEvent, PlaybackSource, StereoBuffers,
};
use soundline::cache::{CacheEntry, MemoryCache, TrackCache};
use soundline::catalog::{Album, Artist, Catalog, Image, Track};
use soundline::player::{
    MediaSession, NowPlaying, PlayOutcome, Player, PlayerEvent, PlayerParts, PlayerState,
};
use soundline::resolver::{MirrorPool, ResolvedStream, Resolver, StreamResolver};
use soundline::{Error, Result};

fn track(id: &str, name: &str, artist: &str) -> Track {
    Track {
        id: id.to_string(),
        name: name.to_string(),
        artists: vec![Artist {
            id: format!("artist-{}", artist.to_lowercase()),
            name: artist.to_string(),
        }],
        album: Album {
            name: format!("{} album", name),
            images: vec![],
        },
        duration_ms: 180_000,
    }
}

// ---- fakes ----

#[derive(Default)]
struct FakeCatalog {
    tracks: HashMap<String, Track>,
    recommendations: Vec<Track>,
    liked: Mutex<HashSet<String>>,
    recommendation_calls: AtomicUsize,
    seeds: Mutex<Vec<String>>,
}

impl FakeCatalog {
    fn with(tracks: &[Track], recommendations: Vec<Track>) -> Self {
        Self {
            tracks: tracks.iter().map(|t| (t.id.clone(), t.clone())).collect(),
            recommendations,
            ..Default::default()
        }
    }
}

#[async_trait]
impl Catalog for FakeCatalog {
    async fn track(&self, id: &str) -> Result<Track> {
        self.tracks
            .get(id)
            .cloned()
            .ok_or_else(|| Error::Catalog(format!("unknown {}", id)))
    }

    async fn recommendations(&self, seed_tracks: &[String], _seed_artists: &[String]) -> Result<Vec<Track>> {
        self.recommendation_calls.fetch_add(1, Ordering::SeqCst);
        *self.seeds.lock() = seed_tracks.to_vec();
        Ok(self.recommendations.clone())
    }

    async fn is_liked(&self, id: &str) -> Result<bool> {
        Ok(self.liked.lock().contains(id))
    }

    async fn set_liked(&self, id: &str, liked: bool) -> Result<()> {
        let mut set = self.liked.lock();
        if liked {
            set.insert(id.to_string());
        } else {
            set.remove(id);
        }
        Ok(())
    }
}

/// Counts calls; ids in `gates` wait for their Notify before answering.
#[derive(Default)]
struct CountingResolver {
    calls: AtomicUsize,
    base_url: String,
    mime: String,
    gates: HashMap<String, Arc<Notify>>,
    failing: HashSet<String>,
    /// Held back until notified, like a slow mirror health check
    warm_up_gate: Option<Arc<Notify>>,
    warmed: AtomicBool,
    resolved_cold: AtomicUsize,
}

impl CountingResolver {
    fn new() -> Self {
        Self {
            base_url: "http://127.0.0.1:1".into(),
            mime: "audio/mp4".into(),
            ..Default::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StreamResolver for CountingResolver {
    async fn resolve(&self, track: &Track) -> Result<ResolvedStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.warmed.load(Ordering::SeqCst) {
            self.resolved_cold.fetch_add(1, Ordering::SeqCst);
        }
        if let Some(gate) = self.gates.get(&track.id) {
            gate.notified().await;
        }
        if self.failing.contains(&track.id) {
            return Err(Error::NoStreamFound(track.name.clone()));
        }
        Ok(ResolvedStream {
            url: format!("{}/{}", self.base_url, track.id),
            bitrate: 128_000,
            mime_type: self.mime.clone(),
            video_id: format!("v-{}", track.id),
        })
    }

    async fn warm_up(&self) -> Result<()> {
        if let Some(gate) = &self.warm_up_gate {
            gate.notified().await;
        }
        self.warmed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct FakeOutput {
    sources: Mutex<Vec<PlaybackSource>>,
    playing: Mutex<bool>,
    position: Mutex<Duration>,
    seeks: Mutex<Vec<Duration>>,
    volume: Mutex<f32>,
    /// When set, opening a source waits here like a slow network stream
    open_gate: Mutex<Option<Arc<Notify>>>,
    opens: AtomicUsize,
    events: broadcast::Sender<OutputEvent>,
}

impl FakeOutput {
    fn new() -> Self {
        let (events, _) = broadcast::channel(8);
        Self {
            sources: Mutex::new(Vec::new()),
            playing: Mutex::new(false),
            position: Mutex::new(Duration::ZERO),
            seeks: Mutex::new(Vec::new()),
            volume: Mutex::new(1.0),
            open_gate: Mutex::new(None),
            opens: AtomicUsize::new(0),
            events,
        }
    }

    /// Pretend playback has reached `position`.
    fn advance_to(&self, position: Duration) {
        *self.position.lock() = position;
    }

    fn last_source(&self) -> Option<PlaybackSource> {
        self.sources.lock().last().cloned()
    }

    fn is_playing(&self) -> bool {
        *self.playing.lock()
    }

    fn finish(&self) {
        let _ = self.events.send(OutputEvent::Ended);
    }
}

#[async_trait]
impl AudioOutput for FakeOutput {
    async fn set_source(&self, source: PlaybackSource, ticket: LoadTicket) -> Result<bool> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let gate = self.open_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if !ticket.is_current() {
            return Ok(false);
        }
        *self.playing.lock() = false;
        *self.position.lock() = Duration::ZERO;
        self.sources.lock().push(source);
        Ok(true)
    }

    fn play(&self) {
        *self.playing.lock() = true;
    }

    fn pause(&self) {
        *self.playing.lock() = false;
    }

    fn seek(&self, position: Duration) {
        *self.position.lock() = position;
        self.seeks.lock().push(position);
    }

    fn set_volume(&self, volume: f32) {
        *self.volume.lock() = volume;
    }

    fn position(&self) -> Duration {
        *self.position.lock()
    }

    fn duration(&self) -> Option<Duration> {
        None
    }

    fn subscribe(&self) -> broadcast::Receiver<OutputEvent> {
        self.events.subscribe()
    }
}

#[derive(Default)]
struct RecordingSession {
    published: Mutex<Vec<NowPlaying>>,
}

impl MediaSession for RecordingSession {
    fn set_metadata(&self, now_playing: &NowPlaying) {
        self.published.lock().push(now_playing.clone());
    }
}

struct Harness {
    player: Arc<Player>,
    catalog: Arc<FakeCatalog>,
    resolver: Arc<CountingResolver>,
    cache: Arc<MemoryCache>,
    output: Arc<FakeOutput>,
    session: Arc<RecordingSession>,
}

fn harness_with(catalog: FakeCatalog, resolver: CountingResolver, max_listeners: usize) -> Harness {
    let catalog = Arc::new(catalog);
    let resolver = Arc::new(resolver);
    let cache = Arc::new(MemoryCache::new());
    let output = Arc::new(FakeOutput::new());
    let session = Arc::new(RecordingSession::default());
    let player = Arc::new(Player::new(PlayerParts {
        catalog: catalog.clone(),
        resolver: resolver.clone(),
        adapter: FormatAdapter::new(reqwest::Client::new(), CodecSupport::Native, SampleFormat::Pcm16),
        cache: cache.clone(),
        output: output.clone(),
        session: session.clone(),
        max_listeners,
        volume: 0.8,
    }));
    Harness {
        player,
        catalog,
        resolver,
        cache,
        output,
        session,
    }
}

fn harness(tracks: &[Track]) -> Harness {
    harness_with(FakeCatalog::with(tracks, vec![]), CountingResolver::new(), 10)
}

fn three() -> Vec<Track> {
    vec![
        track("t1", "One", "Alpha"),
        track("t2", "Two", "Beta"),
        track("t3", "Three", "Gamma"),
    ]
}

fn current_id(player: &Player) -> Option<String> {
    player.current_track().map(|t| t.id.clone())
}

async fn eventually(mut f: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !f() {
        assert!(tokio::time::Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn tiny_buffers() -> StereoBuffers {
    StereoBuffers {
        left: vec![0.0, 0.25, -0.25, 0.0],
        right: vec![0.0, -0.25, 0.25, 0.0],
        sample_rate: 48_000,
    }
}

/// Serves the same body with the given content type to every request.
/// Returns the base URL and the request paths seen so far.
async fn serve_body(body: Vec<u8>, content_type: &'static str) -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let paths = Arc::new(Mutex::new(Vec::new()));
    let seen = paths.clone();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else { break };
            let body = body.clone();
            let seen = seen.clone();
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                let mut request = Vec::new();
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let line = String::from_utf8_lossy(&request).lines().next().unwrap_or("").to_string();
                if let Some(path) = line.split_whitespace().nth(1) {
                    seen.lock().push(path.to_string());
                }
                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    content_type,
                    body.len()
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(&body).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    (format!("http://{}", addr), paths)
}

// ---- queue + cursor ----

#[tokio::test]
async fn test_load_then_next_twice_plays_second() {
    let h = harness(&three());
    h.player.load(three());

    assert_eq!(h.player.next().await, PlayOutcome::Playing);
    assert_eq!(current_id(&h.player).as_deref(), Some("t1"));
    assert_eq!(h.player.next().await, PlayOutcome::Playing);
    assert_eq!(current_id(&h.player).as_deref(), Some("t2"));

    let (_, index) = h.player.queue_snapshot();
    assert_eq!(index, 2);
    assert_eq!(h.player.state(), PlayerState::Playing);
    assert!(h.output.is_playing());
}

#[tokio::test]
async fn test_prev_steps_back_and_is_noop_at_start() {
    let h = harness(&three());
    h.player.load(three());
    assert_eq!(h.player.prev().await, PlayOutcome::Idle);
    assert!(h.player.current_entry().is_none());

    h.player.next().await;
    h.player.next().await;
    assert_eq!(h.player.prev().await, PlayOutcome::Playing);
    assert_eq!(current_id(&h.player).as_deref(), Some("t1"));
}

#[tokio::test]
async fn test_next_at_tail_appends_recommendation() {
    let seed = track("t1", "One", "Alpha");
    let recs = vec![track("r1", "Rec One", "Delta"), track("r2", "Rec Two", "Delta")];
    let h = harness_with(FakeCatalog::with(&[seed.clone()], recs), CountingResolver::new(), 10);
    h.player.load(vec![seed]);

    h.player.next().await;
    assert_eq!(current_id(&h.player).as_deref(), Some("t1"));
    h.player.next().await;
    assert_eq!(current_id(&h.player).as_deref(), Some("r1"));

    let (entries, _) = h.player.queue_snapshot();
    assert_eq!(entries[0].track.id, "t1");
    assert_eq!(entries[1].track.id, "r1");
    assert_eq!(h.catalog.recommendation_calls.load(Ordering::SeqCst), 1);
    assert_eq!(*h.catalog.seeds.lock(), vec!["t1".to_string()]);
}

#[tokio::test]
async fn test_remove_before_cursor_keeps_current() {
    let h = harness(&three());
    h.player.load(three());
    h.player.next().await;
    h.player.next().await;

    assert!(h.player.remove(0).is_some());
    assert_eq!(current_id(&h.player).as_deref(), Some("t2"));
    assert_eq!(h.player.queue_snapshot().1, 1);
}

#[tokio::test]
async fn test_play_track_appends_and_plays() {
    let h = harness(&[]);
    h.player.load(three());
    let extra = track("x1", "Extra", "Omega");
    assert_eq!(h.player.play_track(extra).await, PlayOutcome::Playing);
    let (entries, index) = h.player.queue_snapshot();
    assert_eq!(entries.len(), 4);
    assert_eq!(index, 4);
    assert_eq!(current_id(&h.player).as_deref(), Some("x1"));
}

#[tokio::test]
async fn test_load_ids_skips_unknown() {
    let h = harness(&three());
    let loaded = h
        .player
        .load_ids(&["t3".to_string(), "missing".to_string(), "t1".to_string()])
        .await;
    assert_eq!(loaded, 2);
    let (entries, _) = h.player.queue_snapshot();
    let ids: Vec<_> = entries.iter().map(|e| e.track.id.as_str()).collect();
    assert_eq!(ids, vec!["t3", "t1"]);
}

// ---- pipeline ----

#[tokio::test]
async fn test_cache_miss_resolves_stream() {
    let h = harness(&three());
    h.player.load(three());
    h.player.next().await;

    assert_eq!(h.resolver.calls(), 1);
    match h.output.last_source() {
        Some(PlaybackSource::Stream(download)) => assert!(download.url().ends_with("/t1")),
        other => panic!("expected a stream source, got {:?}", other.map(|s| s.is_buffer())),
    }
}

#[tokio::test]
async fn test_cache_hit_skips_resolver() {
    let h = harness(&three());
    let t1 = three().remove(0);
    h.cache
        .put(
            "t1",
            CacheEntry {
                buffers: tiny_buffers(),
                track: t1.clone(),
                image: Some("data:image/jpeg;base64,AA".into()),
            },
        )
        .await
        .unwrap();

    h.player.load(vec![t1]);
    assert_eq!(h.player.next().await, PlayOutcome::Playing);

    assert_eq!(h.resolver.calls(), 0);
    assert!(h.output.last_source().unwrap().is_buffer());
    let published = h.session.published.lock();
    let np = published.last().expect("metadata published");
    assert_eq!(np.artwork[0].src, "data:image/jpeg;base64,AA");
    assert_eq!(np.title, "One");
}

#[tokio::test]
async fn test_stale_completion_is_discarded() {
    let gate = Arc::new(Notify::new());
    let mut resolver = CountingResolver::new();
    resolver.gates.insert("t1".into(), gate.clone());
    let h = harness_with(FakeCatalog::with(&three(), vec![]), resolver, 10);
    h.player.load(three());

    let slow = {
        let player = h.player.clone();
        tokio::spawn(async move { player.play_at(0).await })
    };
    let resolver = h.resolver.clone();
    eventually(|| resolver.calls() == 1).await;

    assert_eq!(h.player.play_at(1).await, PlayOutcome::Playing);
    gate.notify_one();

    assert_eq!(slow.await.unwrap(), PlayOutcome::Stale);
    assert_eq!(current_id(&h.player).as_deref(), Some("t2"));
    assert_eq!(h.player.state(), PlayerState::Playing);
    let sources = h.output.sources.lock();
    assert_eq!(sources.len(), 1);
    assert!(matches!(&sources[0], PlaybackSource::Stream(d) if d.url().ends_with("/t2")));
}

#[tokio::test]
async fn test_resolution_failure_then_retry() {
    let mut resolver = CountingResolver::new();
    resolver.failing.insert("t1".into());
    let h = harness_with(FakeCatalog::with(&three(), vec![]), resolver, 10);
    h.player.load(three());

    assert_eq!(h.player.next().await, PlayOutcome::Failed);
    assert_eq!(h.player.state(), PlayerState::Error);
    assert!(h.player.last_error().unwrap().contains("One"));
    assert!(h.output.sources.lock().is_empty());

    // Toggle from error retries the same entry
    assert_eq!(h.player.toggle().await, PlayOutcome::Failed);
    assert_eq!(h.resolver.calls(), 2);

    // Moving on clears the error
    assert_eq!(h.player.next().await, PlayOutcome::Playing);
    assert!(h.player.last_error().is_none());
}

#[tokio::test]
async fn test_toggle_pause_resume_stop() {
    let h = harness(&three());
    h.player.load(three());
    h.player.next().await;

    h.player.toggle().await;
    assert_eq!(h.player.state(), PlayerState::Paused);
    assert!(!h.output.is_playing());

    h.player.toggle().await;
    assert_eq!(h.player.state(), PlayerState::Playing);
    assert!(h.output.is_playing());

    h.player.stop();
    assert_eq!(h.player.state(), PlayerState::Stopped);
    h.player.toggle().await;
    assert_eq!(h.player.state(), PlayerState::Playing);
    assert_eq!(current_id(&h.player).as_deref(), Some("t1"));
}

#[tokio::test]
async fn test_end_of_source_advances() {
    let h = harness(&three());
    let _watcher = h.player.spawn_end_watcher();
    h.player.load(three());
    h.player.next().await;

    h.output.finish();
    let player = h.player.clone();
    eventually(|| current_id(&player).as_deref() == Some("t2") && player.state() == PlayerState::Playing).await;
}

#[tokio::test]
async fn test_toggle_like_round_trip() {
    let h = harness(&three());
    h.player.load(three());
    h.player.next().await;
    assert_eq!(h.player.liked(), Some(false));

    assert!(h.player.toggle_like().await.unwrap());
    assert_eq!(h.player.liked(), Some(true));
    assert!(h.catalog.liked.lock().contains("t1"));

    assert!(!h.player.toggle_like().await.unwrap());
    assert!(!h.catalog.liked.lock().contains("t1"));
}

#[tokio::test]
async fn test_write_behind_then_replay_from_cache() {
    let left: Vec<f32> = (0..4_800).map(|i| (i as f32 * 0.01).sin() * 0.5).collect();
    let wav = encode_stereo(&left, &left, 48_000, SampleFormat::Pcm16);
    let (base, paths) = serve_body(wav, "audio/wav").await;

    let mut t1 = track("t1", "One", "Alpha");
    t1.album.images = vec![Image {
        url: format!("{}/cover.jpg", base),
        width: Some(640),
        height: Some(640),
    }];

    let mut resolver = CountingResolver::new();
    resolver.base_url = base;
    resolver.mime = "audio/wav".into();
    let h = harness_with(FakeCatalog::with(&[t1.clone()], vec![]), resolver, 10);

    h.player.load(vec![t1.clone(), t1]);
    assert_eq!(h.player.next().await, PlayOutcome::Playing);
    assert!(!h.output.last_source().unwrap().is_buffer());

    let cache = h.cache.clone();
    eventually(|| !cache.is_empty()).await;
    let entry = h.cache.get("t1").await.unwrap().unwrap();
    assert_eq!(entry.buffers.frames(), 4_800);
    assert!(entry.image.unwrap().starts_with("data:audio/wav;base64,"));
    // Playback and the cache share one download of the stream
    assert_eq!(paths.lock().iter().filter(|p| p.as_str() == "/t1").count(), 1);

    // Same track again: served from cache, resolver untouched
    assert_eq!(h.player.next().await, PlayOutcome::Playing);
    assert_eq!(h.resolver.calls(), 1);
    assert!(h.output.last_source().unwrap().is_buffer());
}

#[tokio::test]
async fn test_track_change_resets_playhead() {
    let gate = Arc::new(Notify::new());
    let mut resolver = CountingResolver::new();
    resolver.gates.insert("t2".into(), gate.clone());
    let h = harness_with(FakeCatalog::with(&three(), vec![]), resolver, 10);
    h.player.load(three());
    h.player.next().await;
    h.output.advance_to(Duration::from_secs(100));
    assert_eq!(h.player.position(), Duration::from_secs(100));

    let loading = {
        let player = h.player.clone();
        tokio::spawn(async move { player.next().await })
    };
    let resolver = h.resolver.clone();
    eventually(|| resolver.calls() == 2).await;

    // t2 is still resolving, yet nothing of t1's playhead leaks into it
    assert_eq!(h.player.state(), PlayerState::Loading);
    assert_eq!(current_id(&h.player).as_deref(), Some("t2"));
    assert_eq!(h.player.position(), Duration::ZERO);
    assert_eq!(h.output.seeks.lock().last(), Some(&Duration::ZERO));
    assert_eq!(h.player.duration(), Some(Duration::from_millis(180_000)));

    gate.notify_one();
    assert_eq!(loading.await.unwrap(), PlayOutcome::Playing);
}

#[tokio::test]
async fn test_stop_while_source_opens_keeps_output_clean() {
    let h = harness(&three());
    let gate = Arc::new(Notify::new());
    *h.output.open_gate.lock() = Some(gate.clone());
    h.player.load(three());

    let loading = {
        let player = h.player.clone();
        tokio::spawn(async move { player.next().await })
    };
    let output = h.output.clone();
    eventually(|| output.opens.load(Ordering::SeqCst) == 1).await;

    h.player.stop();
    gate.notify_one();

    assert_eq!(loading.await.unwrap(), PlayOutcome::Stale);
    assert!(h.output.sources.lock().is_empty());
    assert!(!h.output.is_playing());
    assert_eq!(h.player.state(), PlayerState::Stopped);

    // Seeking has nothing to act on until a source is loaded
    h.player.seek(Duration::from_secs(30));
    assert_eq!(h.player.position(), Duration::ZERO);

    // Play again loads the interrupted entry from scratch
    *h.output.open_gate.lock() = None;
    assert_eq!(h.player.toggle().await, PlayOutcome::Playing);
    assert_eq!(current_id(&h.player).as_deref(), Some("t1"));
    assert_eq!(h.output.sources.lock().len(), 1);
    assert_eq!(h.resolver.calls(), 2);
}

#[tokio::test]
async fn test_volume_is_clamped_and_forwarded() {
    let h = harness(&three());
    assert_eq!(h.player.volume(), 0.8);
    assert_eq!(h.player.adjust_volume(0.5), 1.0);
    assert_eq!(*h.output.volume.lock(), 1.0);
    assert_eq!(h.player.adjust_volume(-0.25), 0.75);
    h.player.set_volume(-3.0);
    assert_eq!(h.player.volume(), 0.0);
    assert_eq!(*h.output.volume.lock(), 0.0);
}

#[tokio::test]
async fn test_autostart_resolves_after_warm_up() {
    let gate = Arc::new(Notify::new());
    let mut resolver = CountingResolver::new();
    resolver.warm_up_gate = Some(gate.clone());
    let h = harness_with(FakeCatalog::with(&three(), vec![]), resolver, 10);
    h.player.load(three());

    let starting = {
        let player = h.player.clone();
        tokio::spawn(async move { player.autostart().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.resolver.calls(), 0);

    gate.notify_one();
    assert_eq!(starting.await.unwrap(), PlayOutcome::Playing);
    assert_eq!(h.resolver.calls(), 1);
    assert_eq!(h.resolver.resolved_cold.load(Ordering::SeqCst), 0);
}

// ---- resolver + events ----

#[tokio::test]
async fn test_unreachable_mirrors_bound_attempts() {
    let pool = MirrorPool::new(["http://127.0.0.1:1", "http://127.0.0.1:2", "http://127.0.0.1:3"]);
    let resolver = Resolver::new(reqwest::Client::new(), pool, vec!["audio/mp4".into()]);
    let err = resolver.resolve(&track("t1", "One", "Alpha")).await.unwrap_err();
    assert!(matches!(err, Error::MirrorsExhausted { attempts: 3 }));
}

#[tokio::test]
async fn test_listener_cap_drops_extra_listeners() {
    let h = harness_with(FakeCatalog::default(), CountingResolver::new(), 2);
    let fired = Arc::new(AtomicUsize::new(0));
    let mut accepted = Vec::new();
    for _ in 0..3 {
        let fired = fired.clone();
        accepted.push(h.player.on(PlayerEvent::QueueChange, move || {
            fired.fetch_add(1, Ordering::SeqCst);
        }));
    }
    assert_eq!(accepted, vec![true, true, false]);

    h.player.add(vec![track("t1", "One", "Alpha")]);
    assert_eq!(fired.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_track_change_fires_before_loading_state() {
    let h = harness(&three());
    let order = Arc::new(Mutex::new(Vec::new()));
    {
        let order = order.clone();
        h.player.on(PlayerEvent::TrackChange, move || order.lock().push("track"));
    }
    {
        let order = order.clone();
        h.player.on(PlayerEvent::StateChange, move || order.lock().push("state"));
    }
    h.player.load(three());
    h.player.next().await;

    let order = order.lock();
    assert_eq!(order.first(), Some(&"track"));
    // loading then playing
    assert_eq!(order.iter().filter(|e| **e == "state").count(), 2);
}
