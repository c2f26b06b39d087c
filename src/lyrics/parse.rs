//! `[mm:ss.xx] text` payloads into timed lines.

use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct LyricLine {
    /// Seconds
    pub start: f64,
    /// Seconds; the next line's start, or the track end for the last line
    pub end: f64,
    pub text: String,
    pub id: Uuid,
}

/// "03:25.50" -> 205_500 ms. Two-digit fractions are hundredths.
pub fn parse_timestamp(ts: &str) -> Option<u64> {
    let (min, rest) = ts.split_once(':')?;
    let min: u64 = min.trim().parse().ok()?;
    let (sec, frac) = match rest.split_once('.') {
        Some((s, f)) => (s, Some(f)),
        None => (rest, None),
    };
    let sec: u64 = sec.parse().ok()?;
    let ms = match frac {
        Some(f) if f.len() == 1 => f.parse::<u64>().ok()? * 100,
        Some(f) if f.len() == 2 => f.parse::<u64>().ok()? * 10,
        Some(f) => f.get(..3)?.parse::<u64>().ok()?,
        None => 0,
    };
    Some(min * 60_000 + sec * 1000 + ms)
}

/// Parse a synced payload. Metadata tags (`[ar:...]`) and untimed lines are
/// skipped; a line carrying several stamps is emitted once per stamp.
/// `track_end` closes the final line; None leaves it open-ended.
pub fn parse_lrc(content: &str, track_end: Option<f64>) -> Vec<LyricLine> {
    let mut stamped: Vec<(u64, String)> = Vec::new();

    for raw in content.lines() {
        let mut rest = raw.trim();
        let mut stamps = Vec::new();
        while let Some(stripped) = rest.strip_prefix('[') {
            let Some(close) = stripped.find(']') else { break };
            match parse_timestamp(&stripped[..close]) {
                Some(ms) => stamps.push(ms),
                None => break,
            }
            rest = &stripped[close + 1..];
        }
        let text = rest.trim();
        for ms in stamps {
            stamped.push((ms, text.to_string()));
        }
    }

    stamped.sort_by_key(|(ms, _)| *ms);

    let mut lines = Vec::with_capacity(stamped.len());
    for i in 0..stamped.len() {
        let start = stamped[i].0 as f64 / 1000.0;
        let end = match stamped.get(i + 1) {
            Some((next, _)) => *next as f64 / 1000.0,
            None => track_end.filter(|e| *e > start).unwrap_or(f64::INFINITY),
        };
        lines.push(LyricLine {
            start,
            end,
            text: stamped[i].1.clone(),
            id: Uuid::new_v4(),
        });
    }
    lines
}

/// First line whose window, pulled earlier by `lead`, contains `position`:
/// `start - lead <= position < end`.
pub fn active_line(lines: &[LyricLine], position: f64, lead: f64) -> Option<usize> {
    lines
        .iter()
        .position(|l| position >= l.start - lead && position < l.end)
}
