use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;

use spectrum_analyzer::scaling::divide_by_N;
use spectrum_analyzer::windows::hann_window;
use spectrum_analyzer::{samples_fft_to_spectrum, FrequencyLimit};
use tracing::debug;

use super::tap::SampleTap;

/// Transform size; yields FFT_SIZE / 2 frequency bins
pub const FFT_SIZE: usize = 256;
pub const BIN_COUNT: usize = FFT_SIZE / 2;

/// dB window mapped onto 0..=255
const MIN_DB: f32 = -100.0;
const MAX_DB: f32 = -30.0;

/// Byte-scaled frequency magnitudes read from the live signal.
pub struct Analyser {
    tap: SampleTap,
    smoothing: f32,
    smoothed: Vec<f32>,
}

impl Analyser {
    pub fn new(tap: SampleTap, smoothing: f32) -> Self {
        Self {
            tap,
            smoothing: smoothing.clamp(0.0, 0.99),
            smoothed: vec![0.0; BIN_COUNT],
        }
    }

    /// Latest magnitudes, 0..=255 per bin. All zero until the tap has a full window.
    pub fn byte_frequency_data(&mut self) -> Vec<u8> {
        let Some(samples) = self.tap.latest(FFT_SIZE) else {
            return vec![0; BIN_COUNT];
        };

        let windowed = hann_window(&samples);
        let spectrum = match samples_fft_to_spectrum(
            &windowed,
            self.tap.sample_rate(),
            FrequencyLimit::All,
            Some(&divide_by_N),
        ) {
            Ok(s) => s,
            Err(e) => {
                debug!(error = ?e, "fft failed");
                return vec![0; BIN_COUNT];
            }
        };

        let tau = self.smoothing;
        for (slot, (_, mag)) in self.smoothed.iter_mut().zip(spectrum.data().iter()) {
            *slot = tau * *slot + (1.0 - tau) * mag.val();
        }

        self.smoothed.iter().map(|&m| magnitude_to_byte(m)).collect()
    }
}

pub fn magnitude_to_byte(magnitude: f32) -> u8 {
    if magnitude <= 0.0 {
        return 0;
    }
    let db = 20.0 * magnitude.log10();
    let scaled = (db - MIN_DB) / (MAX_DB - MIN_DB) * 255.0;
    scaled.clamp(0.0, 255.0) as u8
}

/// One frame of work handed to the worker.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRequest {
    pub magnitudes: Vec<u8>,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub line_height: f64,
}

/// Bin magnitudes to evenly spaced (x, line height) pairs across the canvas.
pub fn compute_points(req: &FrameRequest) -> Vec<Point> {
    let n = req.magnitudes.len();
    if n == 0 {
        return Vec::new();
    }
    let step = if n > 1 { req.width / (n - 1) as f64 } else { 0.0 };

    req.magnitudes
        .iter()
        .enumerate()
        .map(|(i, &m)| Point {
            x: i as f64 * step,
            line_height: req.height * (m as f64 / 255.0) / 2.0,
        })
        .collect()
}

/// Stroke the curve as line segments in canvas coordinates (y grows upward
/// from the bottom, so `y = line_height` here; callers flip if needed).
///
/// First and last spans are straight, interior points are smoothed with
/// quadratic curves through the midpoints of neighbouring points.
pub fn curve_segments(points: &[Point], steps: usize) -> Vec<((f64, f64), (f64, f64))> {
    let pt = |p: &Point| (p.x, p.line_height);
    let mut out = Vec::new();
    if points.len() < 2 {
        return out;
    }

    let steps = steps.max(1);
    let last = points.len() - 1;

    // Straight into the second point
    out.push((pt(&points[0]), pt(&points[1])));
    let mut cursor = pt(&points[1]);

    for i in 2..last.saturating_sub(1) {
        let control = pt(&points[i]);
        let end = midpoint(control, pt(&points[i + 1]));
        let start = cursor;
        for s in 1..=steps {
            let next = quadratic(start, control, end, s as f64 / steps as f64);
            out.push((cursor, next));
            cursor = next;
        }
        cursor = end;
    }

    // Straight through the last two points
    if last >= 2 {
        if cursor != pt(&points[last - 1]) {
            out.push((cursor, pt(&points[last - 1])));
        }
        out.push((pt(&points[last - 1]), pt(&points[last])));
    }
    out
}

fn midpoint(a: (f64, f64), b: (f64, f64)) -> (f64, f64) {
    ((a.0 + b.0) / 2.0, (a.1 + b.1) / 2.0)
}

fn quadratic(p0: (f64, f64), c: (f64, f64), p1: (f64, f64), t: f64) -> (f64, f64) {
    let u = 1.0 - t;
    (
        u * u * p0.0 + 2.0 * u * t * c.0 + t * t * p1.0,
        u * u * p0.1 + 2.0 * u * t * c.1 + t * t * p1.1,
    )
}

/// Background thread doing the bin-to-point reduction.
/// Requests and replies cross by value; nothing is shared.
pub struct VisualizerWorker {
    tx: Sender<FrameRequest>,
    rx: Receiver<Vec<Point>>,
    latest: Vec<Point>,
}

impl VisualizerWorker {
    pub fn spawn() -> Self {
        let (req_tx, req_rx) = mpsc::channel::<FrameRequest>();
        let (resp_tx, resp_rx) = mpsc::channel();

        thread::Builder::new()
            .name("soundline-visualizer".into())
            .spawn(move || {
                while let Ok(mut req) = req_rx.recv() {
                    // Coalesce a backlog down to the newest frame
                    while let Ok(newer) = req_rx.try_recv() {
                        req = newer;
                    }
                    if resp_tx.send(compute_points(&req)).is_err() {
                        break;
                    }
                }
            })
            .ok();

        Self {
            tx: req_tx,
            rx: resp_rx,
            latest: Vec::new(),
        }
    }

    pub fn request(&self, req: FrameRequest) {
        let _ = self.tx.send(req);
    }

    /// Newest finished frame, or the previous one if nothing new arrived.
    pub fn points(&mut self) -> &[Point] {
        loop {
            match self.rx.try_recv() {
                Ok(points) => self.latest = points,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        &self.latest
    }

    pub fn clear(&mut self) {
        self.latest.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn test_points_span_width() {
        let req = FrameRequest {
            magnitudes: vec![0, 255, 51],
            width: 100.0,
            height: 40.0,
        };
        let points = compute_points(&req);
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].x, 0.0);
        assert_eq!(points[1].x, 50.0);
        assert_eq!(points[2].x, 100.0);
        assert_eq!(points[1].line_height, 20.0);
        assert!((points[2].line_height - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_magnitude_scaling_window() {
        assert_eq!(magnitude_to_byte(0.0), 0);
        // -100 dB and below is silence
        assert_eq!(magnitude_to_byte(1e-6), 0);
        // -30 dB and above saturates
        assert_eq!(magnitude_to_byte(0.5), 255);
        let mid = magnitude_to_byte(10f32.powf(-65.0 / 20.0));
        assert!((126..=129).contains(&mid), "got {}", mid);
    }

    #[test]
    fn test_curve_is_continuous_and_ends_on_last_point() {
        let req = FrameRequest {
            magnitudes: vec![10, 200, 30, 180, 60, 90],
            width: 50.0,
            height: 10.0,
        };
        let points = compute_points(&req);
        let segs = curve_segments(&points, 4);
        for pair in segs.windows(2) {
            let (a, b) = (pair[0].1, pair[1].0);
            assert!((a.0 - b.0).abs() < 1e-9 && (a.1 - b.1).abs() < 1e-9);
        }
        let last = segs.last().unwrap().1;
        assert_eq!(last, (points[5].x, points[5].line_height));
        assert_eq!(segs[0].0, (0.0, points[0].line_height));
    }

    #[test]
    fn test_analyser_silent_until_window_filled() {
        let tap = SampleTap::new();
        let mut analyser = Analyser::new(tap.clone(), 0.0);
        assert!(analyser.byte_frequency_data().iter().all(|&b| b == 0));

        let tone: Vec<f32> = (0..FFT_SIZE)
            .map(|i| (2.0 * std::f32::consts::PI * 3000.0 * i as f32 / 48_000.0).sin())
            .collect();
        tap.push_mono(&tone);
        let data = analyser.byte_frequency_data();
        assert_eq!(data.len(), BIN_COUNT);
        // 3 kHz lands in bin 16 at 187.5 Hz per bin
        let peak = data.iter().enumerate().max_by_key(|(_, &b)| b).map(|(i, _)| i).unwrap();
        assert!((15..=17).contains(&peak), "peak at {}", peak);
    }

    #[test]
    fn test_worker_round_trip() {
        let mut worker = VisualizerWorker::spawn();
        worker.request(FrameRequest {
            magnitudes: vec![255; 4],
            width: 30.0,
            height: 8.0,
        });
        let deadline = Instant::now() + Duration::from_secs(2);
        while worker.points().is_empty() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        let points = worker.points();
        assert_eq!(points.len(), 4);
        assert_eq!(points[3].x, 30.0);
        assert_eq!(points[0].line_height, 4.0);
    }
}
