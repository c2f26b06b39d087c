use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rodio::Source;

/// Samples kept for analysis (enough for overlap at the largest FFT size)
const TAP_CAPACITY: usize = 8192;
const FLUSH_EVERY: usize = 512;

/// Rolling mono window of what the output is currently playing.
/// Cloneable handle shared between the audio thread and the analyser.
#[derive(Clone)]
pub struct SampleTap {
    buffer: Arc<Mutex<VecDeque<f32>>>,
    sample_rate: Arc<AtomicU32>,
}

impl Default for SampleTap {
    fn default() -> Self {
        Self {
            buffer: Arc::new(Mutex::new(VecDeque::with_capacity(TAP_CAPACITY))),
            sample_rate: Arc::new(AtomicU32::new(48_000)),
        }
    }
}

impl SampleTap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.load(Ordering::Relaxed)
    }

    pub fn set_sample_rate(&self, rate: u32) {
        self.sample_rate.store(rate, Ordering::Relaxed);
    }

    /// Push already-downmixed mono samples.
    pub fn push_mono(&self, samples: &[f32]) {
        let mut buf = self.buffer.lock();
        buf.extend(samples.iter().copied());
        while buf.len() > TAP_CAPACITY {
            buf.pop_front();
        }
    }

    /// Latest `n` samples, oldest first. None until enough have arrived.
    pub fn latest(&self, n: usize) -> Option<Vec<f32>> {
        let buf = self.buffer.lock();
        if buf.len() < n {
            return None;
        }
        Some(buf.iter().skip(buf.len() - n).copied().collect())
    }

    pub fn clear(&self) {
        self.buffer.lock().clear();
    }
}

/// Source wrapper that feeds the tap, counts played frames, and fires a
/// callback once when the inner source runs dry.
pub struct Tapped<S> {
    inner: S,
    tap: SampleTap,
    frames_played: Arc<AtomicU64>,
    channels: u16,
    channel_pos: u16,
    frame_sum: f32,
    pending: Vec<f32>,
    on_end: Option<Box<dyn FnOnce() + Send>>,
}

impl<S> Tapped<S>
where
    S: Source<Item = f32>,
{
    pub fn new(
        inner: S,
        tap: SampleTap,
        frames_played: Arc<AtomicU64>,
        on_end: Box<dyn FnOnce() + Send>,
    ) -> Self {
        let channels = inner.channels().max(1);
        tap.set_sample_rate(inner.sample_rate());
        Self {
            inner,
            tap,
            frames_played,
            channels,
            channel_pos: 0,
            frame_sum: 0.0,
            pending: Vec::with_capacity(FLUSH_EVERY),
            on_end: Some(on_end),
        }
    }

    fn flush(&mut self) {
        if !self.pending.is_empty() {
            self.tap.push_mono(&self.pending);
            self.pending.clear();
        }
    }
}

impl<S> Iterator for Tapped<S>
where
    S: Source<Item = f32>,
{
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        match self.inner.next() {
            Some(sample) => {
                self.frame_sum += sample;
                self.channel_pos += 1;
                if self.channel_pos == self.channels {
                    self.pending.push(self.frame_sum / self.channels as f32);
                    self.frames_played.fetch_add(1, Ordering::Relaxed);
                    self.channel_pos = 0;
                    self.frame_sum = 0.0;
                    if self.pending.len() >= FLUSH_EVERY {
                        self.flush();
                    }
                }
                Some(sample)
            }
            None => {
                self.flush();
                if let Some(on_end) = self.on_end.take() {
                    on_end();
                }
                None
            }
        }
    }
}

impl<S> Source for Tapped<S>
where
    S: Source<Item = f32>,
{
    fn current_frame_len(&self) -> Option<usize> {
        self.inner.current_frame_len()
    }

    fn channels(&self) -> u16 {
        self.inner.channels()
    }

    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        self.inner.total_duration()
    }
}
