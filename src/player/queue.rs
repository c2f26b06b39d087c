//! Play history plus upcoming entries, with a cursor.
//!
//! The cursor points at the next entry to play. The "current" entry is the one
//! immediately behind it, so after playing position `p` the cursor is `p + 1`.
//! `0 <= index <= len` holds after every operation.

use std::collections::VecDeque;
use std::sync::Arc;

use uuid::Uuid;

use crate::catalog::Track;

#[derive(Debug, Clone, PartialEq)]
pub struct QueueEntry {
    /// Distinguishes repeated queuing of the same track
    pub instance_id: Uuid,
    pub track: Arc<Track>,
}

impl QueueEntry {
    pub fn new(track: Track) -> Self {
        Self::from_arc(Arc::new(track))
    }

    pub fn from_arc(track: Arc<Track>) -> Self {
        Self {
            instance_id: Uuid::new_v4(),
            track,
        }
    }
}

#[derive(Debug, Default)]
pub struct Queue {
    entries: Vec<QueueEntry>,
    index: usize,
    recommendations: VecDeque<Arc<Track>>,
}

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    pub fn get(&self, pos: usize) -> Option<&QueueEntry> {
        self.entries.get(pos)
    }

    /// The entry behind the cursor.
    pub fn current(&self) -> Option<&QueueEntry> {
        self.index.checked_sub(1).and_then(|i| self.entries.get(i))
    }

    /// Move the cursor. Clamped to the queue length.
    pub fn set_cursor(&mut self, index: usize) {
        self.index = index.min(self.entries.len());
    }

    pub fn add<I>(&mut self, tracks: I)
    where
        I: IntoIterator<Item = Track>,
    {
        self.entries.extend(tracks.into_iter().map(QueueEntry::new));
    }

    pub fn remove(&mut self, pos: usize) -> Option<QueueEntry> {
        if pos >= self.entries.len() {
            return None;
        }
        let removed = self.entries.remove(pos);
        // Keep the cursor on the same upcoming entry
        if pos < self.index {
            self.index -= 1;
        }
        self.index = self.index.min(self.entries.len());
        Some(removed)
    }

    /// Replace the sequence and rewind the cursor.
    pub fn load<I>(&mut self, tracks: I)
    where
        I: IntoIterator<Item = Track>,
    {
        self.entries.clear();
        self.recommendations.clear();
        self.index = 0;
        self.add(tracks);
    }

    pub fn reset(&mut self) {
        self.entries.clear();
        self.recommendations.clear();
        self.index = 0;
    }

    /// True when the cursor sits on (or past) the last entry.
    pub fn at_tail(&self) -> bool {
        self.index + 1 >= self.entries.len()
    }

    pub fn recommendations_len(&self) -> usize {
        self.recommendations.len()
    }

    pub fn extend_recommendations<I>(&mut self, tracks: I)
    where
        I: IntoIterator<Item = Track>,
    {
        self.recommendations.extend(tracks.into_iter().map(Arc::new));
    }

    /// Move one buffered recommendation onto the end of the queue.
    pub fn append_recommendation(&mut self) -> bool {
        match self.recommendations.pop_front() {
            Some(track) => {
                self.entries.push(QueueEntry::from_arc(track));
                true
            }
            None => false,
        }
    }

    pub fn track_ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.track.id.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::test_track;

    fn three() -> Vec<Track> {
        vec![
            test_track("t1", "One", "Alpha"),
            test_track("t2", "Two", "Beta"),
            test_track("t3", "Three", "Gamma"),
        ]
    }

    fn check(q: &Queue) {
        assert!(q.index() <= q.len(), "index {} > len {}", q.index(), q.len());
    }

    #[test]
    fn test_current_is_behind_cursor() {
        let mut q = Queue::new();
        q.load(three());
        assert!(q.current().is_none());
        q.set_cursor(1);
        assert_eq!(q.current().unwrap().track.id, "t1");
        q.set_cursor(3);
        assert_eq!(q.current().unwrap().track.id, "t3");
    }

    #[test]
    fn test_cursor_stays_in_bounds() {
        let mut q = Queue::new();
        q.add(three());
        check(&q);
        q.set_cursor(10);
        assert_eq!(q.index(), 3);
        q.remove(2);
        check(&q);
        q.remove(0);
        check(&q);
        assert_eq!(q.index(), 1);
        assert!(q.remove(5).is_none());
        q.remove(0);
        check(&q);
        assert_eq!(q.index(), 0);
        q.add(three());
        q.set_cursor(2);
        q.reset();
        check(&q);
        assert_eq!(q.len(), 0);
    }

    #[test]
    fn test_remove_before_cursor_keeps_upcoming() {
        let mut q = Queue::new();
        q.load(three());
        q.set_cursor(2);
        q.remove(0);
        assert_eq!(q.get(q.index()).unwrap().track.id, "t3");
        assert_eq!(q.current().unwrap().track.id, "t2");
    }

    #[test]
    fn test_load_replaces_and_rewinds() {
        let mut q = Queue::new();
        q.add(three());
        q.set_cursor(3);
        q.extend_recommendations(vec![test_track("r1", "Rec", "Delta")]);
        q.load(vec![test_track("t9", "Nine", "Omega")]);
        assert_eq!(q.len(), 1);
        assert_eq!(q.index(), 0);
        assert_eq!(q.recommendations_len(), 0);
    }

    #[test]
    fn test_repeated_track_gets_distinct_instances() {
        let mut q = Queue::new();
        let t = test_track("t1", "One", "Alpha");
        q.add(vec![t.clone(), t]);
        assert_ne!(q.get(0).unwrap().instance_id, q.get(1).unwrap().instance_id);
    }

    #[test]
    fn test_append_recommendation() {
        let mut q = Queue::new();
        q.add(vec![test_track("t1", "One", "Alpha")]);
        assert!(!q.append_recommendation());
        q.extend_recommendations(vec![test_track("r1", "Rec", "Delta")]);
        assert!(q.append_recommendation());
        assert_eq!(q.track_ids(), vec!["t1", "r1"]);
        assert_eq!(q.recommendations_len(), 0);
    }
}
