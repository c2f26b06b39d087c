//! Keeps a prev/current/next lyric display in step with the playhead.
//!
//! Each track change starts a fresh session task and aborts the previous one.
//! A session also checks the live queue entry against the one it was started
//! for at every suspension point and quits quietly once they differ.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use super::parse::{active_line, parse_lrc, LyricLine};
use super::{LyricsFetchResult, LyricsProvider};
use crate::player::{Player, PlayerEvent, QueueEntry};

pub const DEFAULT_TEXT: &str = "♫⋆｡♪ ₊˚♬ ﾟ.";
pub const NOT_FOUND_TEXT: &str = "Can't find lyrics for this song.";
pub const INSTRUMENTAL_TEXT: &str = "Instrumental";

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LyricDisplay {
    pub prev: String,
    pub current: String,
    pub next: String,
    /// False while the slots are faded out
    pub visible: bool,
}

fn or_placeholder(text: &str) -> String {
    if text.trim().is_empty() {
        DEFAULT_TEXT.to_string()
    } else {
        text.to_string()
    }
}

impl LyricDisplay {
    fn placeholder(next: &str) -> Self {
        Self {
            prev: String::new(),
            current: DEFAULT_TEXT.to_string(),
            next: next.to_string(),
            visible: true,
        }
    }

    pub fn not_found() -> Self {
        Self::placeholder(NOT_FOUND_TEXT)
    }

    /// Before the first line is reached
    fn intro(lines: &[LyricLine]) -> Self {
        Self::placeholder(lines.first().map(|l| l.text.as_str()).unwrap_or(""))
    }

    /// Slots around line `i`. On the final line the next slot is left empty.
    pub fn for_line(lines: &[LyricLine], i: usize) -> Self {
        let prev = match i {
            0 => DEFAULT_TEXT.to_string(),
            _ => or_placeholder(&lines[i - 1].text),
        };
        let next = match lines.get(i + 1) {
            Some(line) => or_placeholder(&line.text),
            None => String::new(),
        };
        Self {
            prev,
            current: or_placeholder(&lines[i].text),
            next,
            visible: true,
        }
    }
}

/// Read side of the playback engine the synchronizer needs.
pub trait Playhead: Send + Sync {
    fn position(&self) -> Duration;
    fn current_instance(&self) -> Option<Uuid>;
}

impl Playhead for Player {
    fn position(&self) -> Duration {
        Player::position(self)
    }

    fn current_instance(&self) -> Option<Uuid> {
        self.current_entry().map(|e| e.instance_id)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SyncSettings {
    /// Subtracted from line starts to counter display lag
    pub lead: Duration,
    /// Pause between fading out and showing the new line
    pub appear_delay: Duration,
    pub poll_interval: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            lead: Duration::from_millis(250),
            appear_delay: Duration::from_millis(250),
            poll_interval: Duration::from_millis(100),
        }
    }
}

pub struct LyricSynchronizer {
    provider: Arc<dyn LyricsProvider>,
    playhead: Arc<dyn Playhead>,
    settings: SyncSettings,
    display: watch::Sender<LyricDisplay>,
    session: Mutex<Option<JoinHandle<()>>>,
}

impl LyricSynchronizer {
    pub fn new(provider: Arc<dyn LyricsProvider>, playhead: Arc<dyn Playhead>, settings: SyncSettings) -> Self {
        let (display, _) = watch::channel(LyricDisplay::default());
        Self {
            provider,
            playhead,
            settings,
            display,
            session: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<LyricDisplay> {
        self.display.subscribe()
    }

    /// Start a session for `entry`, superseding any running one.
    pub fn track_changed(&self, entry: QueueEntry) {
        let handle = tokio::spawn(run_session(
            self.provider.clone(),
            self.playhead.clone(),
            self.settings,
            self.display.clone(),
            entry,
        ));
        if let Some(previous) = self.session.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Follow the player's track changes until the player goes away.
    pub fn attach(self: &Arc<Self>, player: &Arc<Player>) -> JoinHandle<()> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        if !player.on(PlayerEvent::TrackChange, move || {
            let _ = tx.send(());
        }) {
            warn!("lyrics could not subscribe to track changes");
        }

        let sync = self.clone();
        let player: Weak<Player> = Arc::downgrade(player);
        tokio::spawn(async move {
            while rx.recv().await.is_some() {
                let Some(player) = player.upgrade() else { break };
                if let Some(entry) = player.current_entry() {
                    sync.track_changed(entry);
                }
            }
        })
    }
}

impl Drop for LyricSynchronizer {
    fn drop(&mut self) {
        if let Some(handle) = self.session.lock().take() {
            handle.abort();
        }
    }
}

async fn run_session(
    provider: Arc<dyn LyricsProvider>,
    playhead: Arc<dyn Playhead>,
    settings: SyncSettings,
    display: watch::Sender<LyricDisplay>,
    entry: QueueEntry,
) {
    let instance = entry.instance_id;
    let is_stale = || playhead.current_instance() != Some(instance);
    display.send_replace(LyricDisplay::default());

    let fetched = provider.fetch(&entry.track).await;
    if is_stale() {
        debug!(track = %entry.track.name, "lyrics fetch finished for a stale track");
        return;
    }

    let lines = match fetched {
        Ok(LyricsFetchResult::Found(raw)) => parse_lrc(&raw, Some(entry.track.duration_secs())),
        Ok(LyricsFetchResult::Instrumental) => {
            display.send_replace(LyricDisplay::placeholder(INSTRUMENTAL_TEXT));
            return;
        }
        Ok(LyricsFetchResult::NotFound) => Vec::new(),
        Err(e) => {
            warn!(error = %e, "lyrics fetch failed");
            Vec::new()
        }
    };
    if lines.is_empty() {
        display.send_replace(LyricDisplay::not_found());
        return;
    }

    display.send_replace(LyricDisplay::intro(&lines));

    let lead = settings.lead.as_secs_f64();
    let mut shown: Option<Uuid> = None;
    let mut ticker = tokio::time::interval(settings.poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        if is_stale() {
            return;
        }

        let position = playhead.position().as_secs_f64();
        let Some(i) = active_line(&lines, position, lead) else {
            continue;
        };
        if shown == Some(lines[i].id) {
            continue;
        }

        display.send_modify(|d| d.visible = false);
        tokio::time::sleep(settings.appear_delay).await;
        if is_stale() {
            return;
        }

        display.send_replace(LyricDisplay::for_line(&lines, i));
        shown = Some(lines[i].id);

        if i + 1 == lines.len() {
            debug!("final lyric line shown, polling stops");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{test_track, Track};
    use crate::error::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct FixedLyrics(LyricsFetchResult);

    #[async_trait]
    impl LyricsProvider for FixedLyrics {
        async fn fetch(&self, _track: &Track) -> Result<LyricsFetchResult> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct FakePlayhead {
        position_ms: AtomicU64,
        instance: Mutex<Option<Uuid>>,
    }

    impl Playhead for FakePlayhead {
        fn position(&self) -> Duration {
            Duration::from_millis(self.position_ms.load(Ordering::SeqCst))
        }

        fn current_instance(&self) -> Option<Uuid> {
            *self.instance.lock()
        }
    }

    fn fast() -> SyncSettings {
        SyncSettings {
            lead: Duration::from_millis(250),
            appear_delay: Duration::from_millis(10),
            poll_interval: Duration::from_millis(10),
        }
    }

    fn setup(result: LyricsFetchResult) -> (LyricSynchronizer, Arc<FakePlayhead>, QueueEntry) {
        let playhead = Arc::new(FakePlayhead::default());
        let entry = QueueEntry::new(test_track("t1", "Song", "Alpha"));
        *playhead.instance.lock() = Some(entry.instance_id);
        let sync = LyricSynchronizer::new(Arc::new(FixedLyrics(result)), playhead.clone(), fast());
        (sync, playhead, entry)
    }

    async fn wait_for(rx: &mut watch::Receiver<LyricDisplay>, f: impl FnMut(&LyricDisplay) -> bool) -> LyricDisplay {
        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(f))
            .await
            .expect("display never reached the expected state")
            .expect("sender dropped")
            .clone()
    }

    #[test]
    fn test_for_line_slots() {
        let lines = parse_lrc("[00:00.00] a\n[00:02.00]\n[00:04.00] c", Some(6.0));
        let first = LyricDisplay::for_line(&lines, 0);
        assert_eq!((first.prev.as_str(), first.current.as_str()), (DEFAULT_TEXT, "a"));
        assert_eq!(first.next, DEFAULT_TEXT);
        let last = LyricDisplay::for_line(&lines, 2);
        assert_eq!(last.current, "c");
        assert_eq!(last.next, "");
    }

    #[tokio::test]
    async fn test_shows_active_line() {
        let (sync, playhead, entry) = setup(LyricsFetchResult::Found("[00:00.00] a\n[00:02.00] b".into()));
        playhead.position_ms.store(2_100, Ordering::SeqCst);
        let mut rx = sync.subscribe();
        sync.track_changed(entry);

        let shown = wait_for(&mut rx, |d| d.current == "b").await;
        assert_eq!(shown.prev, "a");
        assert_eq!(shown.next, "");
        assert!(shown.visible);
    }

    #[tokio::test]
    async fn test_placeholder_when_missing() {
        let (sync, _playhead, entry) = setup(LyricsFetchResult::NotFound);
        let mut rx = sync.subscribe();
        sync.track_changed(entry);

        let shown = wait_for(&mut rx, |d| d.next == NOT_FOUND_TEXT).await;
        assert_eq!(shown.current, DEFAULT_TEXT);
        assert_eq!(shown.prev, "");
    }

    #[tokio::test]
    async fn test_stale_session_does_not_paint() {
        let (sync, playhead, entry) = setup(LyricsFetchResult::Found("[00:00.00] a\n[00:02.00] b".into()));
        // Another entry became current before the fetch completed
        *playhead.instance.lock() = Some(Uuid::new_v4());
        let rx = sync.subscribe();
        sync.track_changed(entry);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(*rx.borrow(), LyricDisplay::default());
    }

    #[tokio::test]
    async fn test_follows_playhead_forward() {
        let (sync, playhead, entry) =
            setup(LyricsFetchResult::Found("[00:00.00] a\n[00:02.00] b\n[00:04.00] c".into()));
        playhead.position_ms.store(500, Ordering::SeqCst);
        let mut rx = sync.subscribe();
        sync.track_changed(entry);

        let first = wait_for(&mut rx, |d| d.current == "a" && d.visible).await;
        assert_eq!(first.next, "b");

        playhead.position_ms.store(4_100, Ordering::SeqCst);
        let third = wait_for(&mut rx, |d| d.current == "c").await;
        assert_eq!(third.prev, "b");
    }
}
