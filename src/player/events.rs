//! Typed publish/subscribe with a per-event listener cap.
//!
//! Registrations past the cap are dropped (with a warning in the log) rather
//! than rejected with an error. Listeners run synchronously on the emitting
//! task, after the registry lock is released.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

pub const DEFAULT_MAX_LISTENERS: usize = 10;

pub type Listener = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerEvent {
    TrackChange,
    StateChange,
    MetadataChange,
    QueueChange,
}

pub struct EventBus<K> {
    max_listeners: usize,
    listeners: Mutex<HashMap<K, Vec<Listener>>>,
}

impl<K> EventBus<K>
where
    K: Copy + Eq + Hash + Debug,
{
    pub fn new(max_listeners: usize) -> Self {
        Self {
            max_listeners,
            listeners: Mutex::new(HashMap::new()),
        }
    }

    /// Register a listener. Returns false when the cap for `event` is reached
    /// and the listener was dropped.
    pub fn on(&self, event: K, listener: impl Fn() + Send + Sync + 'static) -> bool {
        let mut map = self.listeners.lock();
        let list = map.entry(event).or_default();
        if list.len() >= self.max_listeners {
            warn!(?event, cap = self.max_listeners, "listener cap reached, dropping registration");
            return false;
        }
        list.push(Arc::new(listener));
        true
    }

    pub fn emit(&self, event: K) {
        let snapshot: Vec<Listener> = match self.listeners.lock().get(&event) {
            Some(list) => list.clone(),
            None => return,
        };
        for listener in snapshot {
            listener();
        }
    }

    pub fn listener_count(&self, event: K) -> usize {
        self.listeners.lock().get(&event).map_or(0, Vec::len)
    }
}

impl<K> Default for EventBus<K>
where
    K: Copy + Eq + Hash + Debug,
{
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LISTENERS)
    }
}
