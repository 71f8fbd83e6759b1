use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::RwLock;
use tokio::sync::Notify;
use tracing::debug;

use logscope_types::ClusterEvent;

use crate::buffer::{EventBuffer, LogBuffer};
use crate::classify::{ClassifiedEntry, Classifier};
use crate::filter::{self, FilterCriteria, FilterUpdate};
use crate::stream::Producer;

/// Counts over the currently visible set
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub total: usize,
    pub critical: usize,
}

/// One viewer session: buffers, classifier, and the live filter criteria.
///
/// Cheap to clone; clones share the same underlying state, which is how the
/// stream controller's ingestion task and the consumer see one view.
#[derive(Clone)]
pub struct Session {
    logs: LogBuffer,
    events: EventBuffer,
    classifier: Arc<Classifier>,
    criteria: Arc<RwLock<FilterCriteria>>,

    /// Malformed producer entries dropped before buffering
    dropped: Arc<AtomicU64>,

    /// Wakes consumers when a tick appended new data
    notify: Arc<Notify>,

    /// Consumer-side rendered transcript, cleared by `reset`
    transcript: Arc<RwLock<Vec<String>>>,
}

impl Session {
    pub fn new(classifier: Classifier, log_capacity: usize, event_capacity: usize) -> Self {
        Self {
            logs: LogBuffer::new(log_capacity),
            events: EventBuffer::new(event_capacity),
            classifier: Arc::new(classifier),
            criteria: Arc::new(RwLock::new(FilterCriteria::default())),
            dropped: Arc::new(AtomicU64::new(0)),
            notify: Arc::new(Notify::new()),
            transcript: Arc::new(RwLock::new(Vec::new())),
        }
    }

    // ------------------------------------------------------------------
    // Ingestion
    // ------------------------------------------------------------------

    /// One atomic unit of ingestion work: poll the producer for at most one
    /// entry and one event, validate, append, then notify consumers if
    /// anything was appended.
    ///
    /// Malformed records are dropped rather than partially buffered; the
    /// drop is silent to the consumer but counted for diagnostics.
    pub fn ingest_tick(&self, producer: &mut dyn Producer) {
        let mut appended = false;

        if let Some(entry) = producer.next_log_entry() {
            if entry.validate() {
                self.logs.push(entry);
                appended = true;
            } else {
                self.dropped.fetch_add(1, Ordering::SeqCst);
                debug!(source = %entry.source, "dropped malformed log entry");
            }
        }

        if let Some(event) = producer.next_cluster_event() {
            if event.validate() {
                self.events.push(event);
                appended = true;
            } else {
                self.dropped.fetch_add(1, Ordering::SeqCst);
                debug!(reason = %event.reason, "dropped malformed cluster event");
            }
        }

        if appended {
            self.notify.notify_waiters();
        }
    }

    /// Number of malformed producer records dropped so far
    pub fn dropped_entries(&self) -> u64 {
        self.dropped.load(Ordering::SeqCst)
    }

    /// Total buffered entry count, before filtering
    pub fn entry_count(&self) -> usize {
        self.logs.len()
    }

    /// Total entries ever accepted from producers, including evicted ones
    pub fn ingested_entries(&self) -> u64 {
        self.logs.total_pushed()
    }

    /// Handle consumers can await for "new data available"
    pub fn notifier(&self) -> Arc<Notify> {
        Arc::clone(&self.notify)
    }

    // ------------------------------------------------------------------
    // Filtered views
    // ------------------------------------------------------------------

    /// The currently visible entries, classified, in arrival order
    pub fn visible_entries(&self) -> Vec<ClassifiedEntry> {
        self.visible_entries_at(Utc::now())
    }

    /// Same as [`visible_entries`](Self::visible_entries) with an injected
    /// clock for the time-range predicate
    pub fn visible_entries_at(&self, now: DateTime<Utc>) -> Vec<ClassifiedEntry> {
        let criteria = self.criteria.read();
        self.logs
            .all()
            .iter()
            .map(|e| self.classifier.annotate(e))
            .filter(|c| filter::matches(&criteria, c, now))
            .collect()
    }

    /// The currently visible cluster events, in arrival order
    pub fn visible_events(&self) -> Vec<ClusterEvent> {
        let criteria = self.criteria.read();
        filter::visible_events(&self.events.all(), &criteria)
    }

    /// Snapshot of the live criteria
    pub fn criteria(&self) -> FilterCriteria {
        self.criteria.read().clone()
    }

    /// Apply a partial criteria update
    pub fn update_filter(&self, update: FilterUpdate) {
        update.apply(&mut self.criteria.write());
    }

    // ------------------------------------------------------------------
    // Export and summary
    // ------------------------------------------------------------------

    /// Serialize the currently filtered view, one line per visible entry in
    /// display order. Stable: unchanged buffer and criteria yield
    /// byte-identical output.
    pub fn export_text(&self) -> String {
        self.export_text_at(Utc::now())
    }

    pub fn export_text_at(&self, now: DateTime<Utc>) -> String {
        let mut out = String::new();
        for classified in self.visible_entries_at(now) {
            out.push_str(&format!(
                "[{}] {} {}: {}\n",
                classified
                    .entry
                    .timestamp
                    .to_rfc3339_opts(SecondsFormat::Millis, true),
                classified.effective_level.as_str(),
                classified.entry.source,
                classified.entry.message
            ));
        }
        out
    }

    /// Total and critical counts over the filtered set
    pub fn summary_counts(&self) -> Summary {
        self.summary_counts_at(Utc::now())
    }

    pub fn summary_counts_at(&self, now: DateTime<Utc>) -> Summary {
        let visible = self.visible_entries_at(now);
        Summary {
            total: visible.len(),
            critical: visible.iter().filter(|c| c.is_critical()).count(),
        }
    }

    // ------------------------------------------------------------------
    // Consumer transcript
    // ------------------------------------------------------------------

    /// Record a line the consumer has rendered
    pub fn push_transcript(&self, line: impl Into<String>) {
        self.transcript.write().push(line.into());
    }

    /// Lines rendered since the last reset
    pub fn transcript(&self) -> Vec<String> {
        self.transcript.read().clone()
    }

    /// Clear the consumer-side transcript. Idempotent; the underlying
    /// buffers are untouched.
    pub fn reset(&self) {
        self.transcript.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use logscope_types::{EventType, InvolvedObject, LogEntry, LogLevel, TimeRange};
    use std::collections::HashSet;

    /// Producer scripted with a fixed queue of records
    struct ScriptedProducer {
        entries: Vec<LogEntry>,
        events: Vec<ClusterEvent>,
    }

    impl ScriptedProducer {
        fn with_entries(entries: Vec<LogEntry>) -> Self {
            Self {
                entries,
                events: Vec::new(),
            }
        }
    }

    impl Producer for ScriptedProducer {
        fn next_log_entry(&mut self) -> Option<LogEntry> {
            if self.entries.is_empty() {
                None
            } else {
                Some(self.entries.remove(0))
            }
        }

        fn next_cluster_event(&mut self) -> Option<ClusterEvent> {
            if self.events.is_empty() {
                None
            } else {
                Some(self.events.remove(0))
            }
        }
    }

    fn session() -> Session {
        Session::new(Classifier::default(), 100, 100)
    }

    fn entry_at(source: &str, message: &str, timestamp: DateTime<Utc>) -> LogEntry {
        let mut entry = LogEntry::new(source, message);
        entry.timestamp = timestamp;
        entry
    }

    #[test]
    fn test_mislabeled_error_is_visible_with_annotation() {
        // Stored level says Info, message says otherwise
        let now = Utc::now();
        let session = session();
        let mut entry = entry_at(
            "pod-a",
            "ERROR: Environment variable DATABASE_URL not found",
            now,
        );
        entry.level = LogLevel::Info;

        let mut producer = ScriptedProducer::with_entries(vec![entry]);
        session.ingest_tick(&mut producer);

        let visible = session.visible_entries_at(now);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].effective_level, LogLevel::Error);
        assert_eq!(
            visible[0].critical.as_ref().map(|c| c.description.as_str()),
            Some("Missing environment variable")
        );
    }

    #[test]
    fn test_level_mismatch_hides_entry() {
        let now = Utc::now();
        let session = session();
        let mut producer = ScriptedProducer::with_entries(vec![entry_at(
            "pod-a",
            "ERROR: Environment variable DATABASE_URL not found",
            now,
        )]);
        session.ingest_tick(&mut producer);

        session.update_filter(FilterUpdate {
            levels: Some(HashSet::from([LogLevel::Debug])),
            ..Default::default()
        });
        assert!(session.visible_entries_at(now).is_empty());
    }

    #[test]
    fn test_time_range_hides_older_duplicate() {
        let now = Utc::now();
        let session = session();
        let mut producer = ScriptedProducer::with_entries(vec![
            entry_at("pod-a", "same message", now - Duration::minutes(10)),
            entry_at("pod-a", "same message", now),
        ]);
        session.ingest_tick(&mut producer);
        session.ingest_tick(&mut producer);

        session.update_filter(FilterUpdate {
            time_range: Some(TimeRange::Last5m),
            ..Default::default()
        });

        let visible = session.visible_entries_at(now);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].entry.timestamp, now);
    }

    #[test]
    fn test_malformed_entries_dropped_and_counted() {
        let session = session();
        let mut producer = ScriptedProducer::with_entries(vec![
            LogEntry::new("pod-a", ""),
            LogEntry::new("pod-a", "fine"),
        ]);
        session.ingest_tick(&mut producer);
        session.ingest_tick(&mut producer);

        assert_eq!(session.entry_count(), 1);
        assert_eq!(session.dropped_entries(), 1);
    }

    #[test]
    fn test_malformed_event_dropped() {
        let now = Utc::now();
        let session = session();
        let mut producer = ScriptedProducer {
            entries: Vec::new(),
            events: vec![ClusterEvent {
                id: 0,
                event_type: EventType::Warning,
                reason: "BackOff".to_string(),
                message: "Back-off restarting".to_string(),
                source: "kubelet".to_string(),
                first_time: now,
                last_time: now,
                count: 0, // violates count >= 1
                involved_object: InvolvedObject {
                    kind: "Pod".to_string(),
                    name: "api".to_string(),
                    namespace: None,
                },
            }],
        };
        session.ingest_tick(&mut producer);

        assert!(session.visible_events().is_empty());
        assert_eq!(session.dropped_entries(), 1);
    }

    #[test]
    fn test_export_format_and_idempotence() {
        let now = Utc::now();
        let session = session();
        let mut producer = ScriptedProducer::with_entries(vec![
            entry_at("pod-a", "WARN: disk nearly full", now),
            entry_at("pod-b", "request served", now),
        ]);
        session.ingest_tick(&mut producer);
        session.ingest_tick(&mut producer);

        let first = session.export_text_at(now);
        let second = session.export_text_at(now);
        assert_eq!(first, second);

        let lines: Vec<&str> = first.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("] WARN pod-a: WARN: disk nearly full"));
        assert!(lines[1].contains("] INFO pod-b: request served"));
        assert!(first.ends_with('\n'));
    }

    #[test]
    fn test_summary_counts() {
        let now = Utc::now();
        let session = session();
        let mut producer = ScriptedProducer::with_entries(vec![
            entry_at("pod-a", "ERROR: connection refused", now),
            entry_at("pod-a", "request served", now),
        ]);
        session.ingest_tick(&mut producer);
        session.ingest_tick(&mut producer);

        assert_eq!(
            session.summary_counts_at(now),
            Summary {
                total: 2,
                critical: 1
            }
        );

        session.update_filter(FilterUpdate {
            critical_only: Some(true),
            ..Default::default()
        });
        assert_eq!(
            session.summary_counts_at(now),
            Summary {
                total: 1,
                critical: 1
            }
        );
    }

    #[test]
    fn test_reset_clears_transcript_only() {
        let now = Utc::now();
        let session = session();
        let mut producer =
            ScriptedProducer::with_entries(vec![entry_at("pod-a", "hello", now)]);
        session.ingest_tick(&mut producer);

        session.push_transcript("rendered: hello");
        assert_eq!(session.transcript().len(), 1);

        session.reset();
        assert!(session.transcript().is_empty());
        assert_eq!(session.entry_count(), 1);

        // Idempotent
        session.reset();
        assert!(session.transcript().is_empty());
    }

    #[test]
    fn test_empty_result_is_not_an_error() {
        let session = session();
        assert!(session.visible_entries().is_empty());
        assert_eq!(session.summary_counts(), Summary::default());
        assert_eq!(session.export_text(), "");
    }
}
