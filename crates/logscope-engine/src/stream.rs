use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use logscope_types::{ClusterEvent, LogEntry};

use crate::session::Session;

/// Source of new entries and events, polled once per tick.
///
/// A producer may return None for either stream on any tick; ticks are
/// independent and an empty tick simply contributes nothing.
pub trait Producer: Send {
    fn next_log_entry(&mut self) -> Option<LogEntry>;
    fn next_cluster_event(&mut self) -> Option<ClusterEvent>;
}

/// Ingestion state of the stream controller
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamState {
    Streaming,
    Paused,
}

/// Owns the ingestion lifecycle: a periodic task that polls the producer
/// and hands each tick's data to the session.
///
/// The single spawned task serializes ticks; a tick's append, classify, and
/// notify steps complete before the next tick can fire. While paused the
/// producer is not polled at all; resume takes effect at the next tick
/// boundary with no backlog catch-up.
pub struct StreamController {
    paused: Arc<AtomicBool>,
    cancel: CancellationToken,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl StreamController {
    /// Spawn the ingestion task. Initial state is Streaming.
    pub fn spawn<P>(session: Session, mut producer: P, period: Duration) -> Self
    where
        P: Producer + 'static,
    {
        let paused = Arc::new(AtomicBool::new(false));
        let cancel = CancellationToken::new();

        let task_paused = Arc::clone(&paused);
        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // A slow tick must delay the next one, never overlap it
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => break,

                    _ = interval.tick() => {
                        if task_paused.load(Ordering::SeqCst) {
                            continue;
                        }
                        session.ingest_tick(&mut producer);
                    }
                }
            }
        });

        Self {
            paused,
            cancel,
            task: Some(task),
        }
    }

    /// Stop polling the producer. Buffered entries remain filterable.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    /// Resume polling at the next tick boundary
    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn state(&self) -> StreamState {
        if self.paused.load(Ordering::SeqCst) {
            StreamState::Paused
        } else {
            StreamState::Streaming
        }
    }

    /// Stop the ingestion task entirely
    pub fn shutdown(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for StreamController {
    fn drop(&mut self) {
        self.shutdown();
    }
}
