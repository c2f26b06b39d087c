//! The single audio output. Only the playback engine assigns its source or
//! drives its transport; everyone else reads position and duration.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, error, info, warn};

use super::adapter::{MediaReader, PlaybackSource};
use super::tap::{SampleTap, Tapped};
use crate::error::{Error, Result};

type MediaDecoder = Decoder<Box<dyn MediaReader>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputEvent {
    /// The loaded source played to its end
    Ended,
}

/// Names one load request. It goes stale as soon as the engine starts a
/// newer playback operation, and a stale load must not reach the device.
#[derive(Debug, Clone)]
pub struct LoadTicket {
    live: Arc<AtomicU64>,
    generation: u64,
}

impl LoadTicket {
    pub fn new(live: Arc<AtomicU64>, generation: u64) -> Self {
        Self { live, generation }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self) -> bool {
        self.live.load(Ordering::SeqCst) == self.generation
    }
}

#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Replace the active source, leaving the output paused on it. Returns
    /// `Ok(false)` without touching the device when `ticket` went stale
    /// while the source was being opened.
    async fn set_source(&self, source: PlaybackSource, ticket: LoadTicket) -> Result<bool>;
    fn play(&self);
    fn pause(&self);
    fn seek(&self, position: Duration);
    fn set_volume(&self, volume: f32);
    fn position(&self) -> Duration;
    fn duration(&self) -> Option<Duration>;
    fn subscribe(&self) -> broadcast::Receiver<OutputEvent>;

    /// Outputs with a suspendable device context wake it here.
    fn resume_context(&self) {}

    /// Live sample window for analysis, if this output exposes one.
    fn tap(&self) -> Option<SampleTap> {
        None
    }
}

fn open_decoder(source: &PlaybackSource) -> Result<MediaDecoder> {
    Decoder::new(source.reader()).map_err(|e| Error::Decode(e.to_string()))
}

enum AudioCmd {
    Load {
        source: PlaybackSource,
        decoder: MediaDecoder,
        ticket: LoadTicket,
        reply: oneshot::Sender<Result<bool>>,
    },
    Play,
    Pause,
    Seek(Duration),
    Volume(f32),
    Quit,
}

/// Readouts shared between the audio thread and callers.
struct Shared {
    frames: Arc<AtomicU64>,
    base_ms: AtomicU64,
    rate: AtomicU32,
    duration_ms: AtomicU64,
    paused: AtomicBool,
    epoch: Arc<AtomicU64>,
}

impl Shared {
    fn reset(&self, base: Duration) {
        self.frames.store(0, Ordering::SeqCst);
        self.base_ms.store(base.as_millis() as u64, Ordering::SeqCst);
    }
}

/// rodio-backed output. A dedicated thread owns the device and sink.
pub struct RodioOutput {
    tx: Sender<AudioCmd>,
    shared: Arc<Shared>,
    tap: SampleTap,
    events: broadcast::Sender<OutputEvent>,
}

impl RodioOutput {
    pub fn spawn(volume: f32) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let (events, _) = broadcast::channel(16);
        let tap = SampleTap::new();
        let shared = Arc::new(Shared {
            frames: Arc::new(AtomicU64::new(0)),
            base_ms: AtomicU64::new(0),
            rate: AtomicU32::new(48_000),
            duration_ms: AtomicU64::new(0),
            paused: AtomicBool::new(true),
            epoch: Arc::new(AtomicU64::new(0)),
        });

        let thread_state = AudioThread {
            rx,
            shared: shared.clone(),
            tap: tap.clone(),
            events: events.clone(),
            volume,
        };
        thread::Builder::new()
            .name("soundline-audio".into())
            .spawn(move || thread_state.run(ready_tx))
            .map_err(|e| Error::Output(e.to_string()))?;

        ready_rx
            .recv()
            .map_err(|_| Error::Output("audio thread exited during startup".into()))??;

        Ok(Self {
            tx,
            shared,
            tap,
            events,
        })
    }

    fn send(&self, cmd: AudioCmd) {
        if self.tx.send(cmd).is_err() {
            warn!("audio thread is gone");
        }
    }
}

impl Drop for RodioOutput {
    fn drop(&mut self) {
        let _ = self.tx.send(AudioCmd::Quit);
    }
}

#[async_trait]
impl AudioOutput for RodioOutput {
    async fn set_source(&self, source: PlaybackSource, ticket: LoadTicket) -> Result<bool> {
        // Opening a stream blocks on the network, so it stays off the audio thread
        let opening = source.clone();
        let decoder = tokio::task::spawn_blocking(move || open_decoder(&opening))
            .await
            .map_err(|e| Error::Output(format!("decoder task: {}", e)))??;

        if !ticket.is_current() {
            debug!(generation = ticket.generation(), "dropping superseded source");
            return Ok(false);
        }

        let (reply, rx) = oneshot::channel();
        self.send(AudioCmd::Load {
            source,
            decoder,
            ticket,
            reply,
        });
        rx.await
            .map_err(|_| Error::Output("audio thread dropped load reply".into()))?
    }

    fn play(&self) {
        self.send(AudioCmd::Play);
    }

    fn pause(&self) {
        self.send(AudioCmd::Pause);
    }

    fn seek(&self, position: Duration) {
        // Readers see the new position before the audio thread rebuilds the sink
        self.shared.reset(position);
        self.send(AudioCmd::Seek(position));
    }

    fn set_volume(&self, volume: f32) {
        self.send(AudioCmd::Volume(volume));
    }

    fn position(&self) -> Duration {
        let rate = self.shared.rate.load(Ordering::Relaxed).max(1) as u64;
        let frames = self.shared.frames.load(Ordering::Relaxed);
        Duration::from_millis(self.shared.base_ms.load(Ordering::Relaxed) + frames * 1000 / rate)
    }

    fn duration(&self) -> Option<Duration> {
        match self.shared.duration_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<OutputEvent> {
        self.events.subscribe()
    }

    fn tap(&self) -> Option<SampleTap> {
        Some(self.tap.clone())
    }
}

struct AudioThread {
    rx: Receiver<AudioCmd>,
    shared: Arc<Shared>,
    tap: SampleTap,
    events: broadcast::Sender<OutputEvent>,
    volume: f32,
}

impl AudioThread {
    fn run(mut self, ready: mpsc::SyncSender<Result<()>>) {
        // OutputStream is !Send, so the device is opened on this thread
        let (_stream, handle) = match OutputStream::try_default() {
            Ok(pair) => {
                let _ = ready.send(Ok(()));
                pair
            }
            Err(e) => {
                error!(error = %e, "no audio output device");
                let _ = ready.send(Err(Error::Output(e.to_string())));
                return;
            }
        };
        info!("audio output opened");

        let mut sink: Option<Sink> = None;
        let mut current: Option<PlaybackSource> = None;

        while let Ok(cmd) = self.rx.recv() {
            match cmd {
                AudioCmd::Load {
                    source,
                    decoder,
                    ticket,
                    reply,
                } => {
                    // A newer operation may have started while this sat in the queue
                    if !ticket.is_current() {
                        let _ = reply.send(Ok(false));
                        continue;
                    }
                    let result = self.start(&handle, &mut sink, decoder, Duration::ZERO);
                    if result.is_ok() {
                        current = Some(source);
                    }
                    let _ = reply.send(result.map(|()| true));
                }
                AudioCmd::Play => {
                    if let Some(s) = &sink {
                        s.play();
                    }
                    self.shared.paused.store(false, Ordering::SeqCst);
                }
                AudioCmd::Pause => {
                    if let Some(s) = &sink {
                        s.pause();
                    }
                    self.shared.paused.store(true, Ordering::SeqCst);
                }
                AudioCmd::Seek(position) => {
                    let Some(source) = &current else {
                        continue;
                    };
                    let restarted = open_decoder(source).and_then(|d| self.start(&handle, &mut sink, d, position));
                    if let Err(e) = restarted {
                        warn!(error = %e, "seek failed");
                    }
                }
                AudioCmd::Volume(v) => {
                    self.volume = v.clamp(0.0, 1.0);
                    if let Some(s) = &sink {
                        s.set_volume(self.volume);
                    }
                }
                AudioCmd::Quit => break,
            }
        }

        if let Some(s) = sink {
            s.stop();
        }
        debug!("audio thread stopped");
    }

    /// Swap in a fresh sink playing `decoder` from `offset`.
    /// rodio 0.17 cannot seek in place, so the decoder is rebuilt and skipped forward.
    fn start(&self, handle: &OutputStreamHandle, sink: &mut Option<Sink>, decoder: MediaDecoder, offset: Duration) -> Result<()> {
        let total = decoder.total_duration();
        let rate = decoder.sample_rate();

        let new_sink = Sink::try_new(handle).map_err(|e| Error::Output(e.to_string()))?;
        new_sink.set_volume(self.volume);
        if self.shared.paused.load(Ordering::SeqCst) {
            new_sink.pause();
        }

        // Any end callback from the previous source is now stale
        let epoch = self.shared.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let epoch_handle = self.shared.epoch.clone();
        let events = self.events.clone();
        let on_end = Box::new(move || {
            if epoch_handle.load(Ordering::SeqCst) == epoch {
                let _ = events.send(OutputEvent::Ended);
            }
        });

        self.shared.reset(offset);
        self.shared.rate.store(rate, Ordering::SeqCst);
        if offset.is_zero() {
            self.shared
                .duration_ms
                .store(total.map(|d| d.as_millis() as u64).unwrap_or(0), Ordering::SeqCst);
        }
        self.tap.clear();

        let source = decoder.convert_samples::<f32>().skip_duration(offset);
        new_sink.append(Tapped::new(source, self.tap.clone(), self.shared.frames.clone(), on_end));

        if let Some(old) = sink.replace(new_sink) {
            old.stop();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_goes_stale_when_generation_moves() {
        let live = Arc::new(AtomicU64::new(3));
        let ticket = LoadTicket::new(live.clone(), 3);
        assert!(ticket.is_current());
        live.fetch_add(1, Ordering::SeqCst);
        assert!(!ticket.is_current());
        assert_eq!(ticket.generation(), 3);
    }
}
