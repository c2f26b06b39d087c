use std::sync::atomic::{AtomicUsize, Ordering};

/// Ordered list of redundant search hosts, highest priority first.
/// `active` only ever moves forward (wrapping) when a host fails.
#[derive(Debug)]
pub struct MirrorPool {
    hosts: Vec<String>,
    active: AtomicUsize,
}

impl MirrorPool {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hosts: hosts
                .into_iter()
                .map(|h| h.into().trim_end_matches('/').to_string())
                .filter(|h| !h.is_empty())
                .collect(),
            active: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    pub fn active_index(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> Option<&str> {
        self.hosts.get(self.active_index()).map(|s| s.as_str())
    }

    pub fn adopt(&self, index: usize) {
        if index < self.hosts.len() {
            self.active.store(index, Ordering::SeqCst);
        }
    }

    /// Move to the next host after `failed` (wrapping). Concurrent callers that
    /// saw the same failing host only advance once.
    pub fn advance_from(&self, failed: usize) -> usize {
        if self.hosts.is_empty() {
            return 0;
        }
        let next = (failed + 1) % self.hosts.len();
        let _ = self
            .active
            .compare_exchange(failed, next, Ordering::SeqCst, Ordering::SeqCst);
        self.active_index()
    }
}
