use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use logscope_types::{ClusterEvent, LogEntry};

/// Thread-safe ring buffer for log entries
///
/// Append-only from the consumer's point of view: entries are never mutated
/// in place, only evicted oldest-first when capacity is reached. Eviction
/// happens before the append, so the buffer never exceeds capacity at any
/// observable point.
#[derive(Clone)]
pub struct LogBuffer {
    /// Internal storage
    entries: Arc<RwLock<VecDeque<LogEntry>>>,

    /// Maximum capacity
    capacity: usize,

    /// Next entry ID
    next_id: Arc<AtomicU64>,
}

impl LogBuffer {
    /// Create a new log buffer with the given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity,
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Push a new entry, evicting oldest if at capacity. Returns the
    /// assigned entry ID.
    pub fn push(&self, mut entry: LogEntry) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        entry.id = id;
        let mut entries = self.entries.write();
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
        id
    }

    /// Get all entries in arrival order (cloned for the consumer)
    pub fn all(&self) -> Vec<LogEntry> {
        self.entries.read().iter().cloned().collect()
    }

    /// Get entries matching a predicate, in arrival order
    pub fn filtered<F>(&self, predicate: F) -> Vec<LogEntry>
    where
        F: Fn(&LogEntry) -> bool,
    {
        self.entries
            .read()
            .iter()
            .filter(|e| predicate(e))
            .cloned()
            .collect()
    }

    /// Total entry count
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Total number of entries ever pushed, including evicted ones
    pub fn total_pushed(&self) -> u64 {
        self.next_id.load(Ordering::SeqCst)
    }

    /// Get the last N entries
    pub fn tail(&self, n: usize) -> Vec<LogEntry> {
        let entries = self.entries.read();
        let start = entries.len().saturating_sub(n);
        entries.iter().skip(start).cloned().collect()
    }

    /// Clear all entries
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

/// Thread-safe ring buffer for cluster events, same retention policy as
/// [`LogBuffer`]
#[derive(Clone)]
pub struct EventBuffer {
    events: Arc<RwLock<VecDeque<ClusterEvent>>>,
    capacity: usize,
    next_id: Arc<AtomicU64>,
}

impl EventBuffer {
    /// Create a new event buffer with the given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            events: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity,
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Push a new event, evicting oldest if at capacity. Returns the
    /// assigned event ID.
    pub fn push(&self, mut event: ClusterEvent) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        event.id = id;
        let mut events = self.events.write();
        if events.len() >= self.capacity {
            events.pop_front();
        }
        events.push_back(event);
        id
    }

    /// Get all events in arrival order
    pub fn all(&self) -> Vec<ClusterEvent> {
        self.events.read().iter().cloned().collect()
    }

    /// Total event count
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clear all events
    pub fn clear(&self) {
        self.events.write().clear();
    }
}
