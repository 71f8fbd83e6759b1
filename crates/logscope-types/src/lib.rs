//! Shared types for logscope
//!
//! This crate contains data structures used across multiple logscope crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Log Types
// ============================================================================

/// Log severity level
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Parse log level from common formats
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "trace" | "trc" | "trce" => Self::Trace,
            "debug" | "dbg" | "debg" => Self::Debug,
            "warn" | "warning" | "wrn" => Self::Warn,
            "error" | "err" | "erro" | "fatal" | "panic" => Self::Error,
            _ => Self::Info,
        }
    }

    /// Display string for export and badges
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

/// Time range for log filtering
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeRange {
    /// Show all buffered logs regardless of age
    #[default]
    All,
    /// Last 5 minutes
    Last5m,
    /// Last 1 hour
    Last1h,
    /// Last 24 hours
    Last24h,
}

impl TimeRange {
    /// Get the number of seconds for this time range
    pub fn as_seconds(&self) -> Option<i64> {
        match self {
            Self::All => None,
            Self::Last5m => Some(5 * 60),
            Self::Last1h => Some(60 * 60),
            Self::Last24h => Some(24 * 60 * 60),
        }
    }

    /// Get display label for this time range
    pub fn label(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Last5m => "5m",
            Self::Last1h => "1h",
            Self::Last24h => "24h",
        }
    }

    /// Parse a display label back into a time range
    pub fn from_label(s: &str) -> Option<Self> {
        match s {
            "all" => Some(Self::All),
            "5m" => Some(Self::Last5m),
            "1h" => Some(Self::Last1h),
            "24h" => Some(Self::Last24h),
            _ => None,
        }
    }

    /// Cycle to the next time range
    pub fn next(&self) -> Self {
        match self {
            Self::All => Self::Last5m,
            Self::Last5m => Self::Last1h,
            Self::Last1h => Self::Last24h,
            Self::Last24h => Self::All,
        }
    }

    /// Cycle to the previous time range
    pub fn prev(&self) -> Self {
        match self {
            Self::All => Self::Last24h,
            Self::Last5m => Self::All,
            Self::Last1h => Self::Last5m,
            Self::Last24h => Self::Last1h,
        }
    }
}

/// A single log entry as handed over by a producer
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogEntry {
    /// Unique sequential ID, assigned by the buffer on append
    pub id: u64,

    /// When the entry was recorded
    pub timestamp: DateTime<Utc>,

    /// Severity as declared by the producer. Filtering and display use
    /// the classifier's effective level instead; this field is kept for
    /// reference and is never rewritten.
    pub level: LogLevel,

    /// Free-text body
    pub message: String,

    /// Emitting unit, e.g. a pod name
    pub source: String,

    /// Optional sub-identifier within the source
    pub container: Option<String>,
}

impl LogEntry {
    /// Create a new log entry with minimal fields
    pub fn new(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: 0,
            timestamp: Utc::now(),
            level: LogLevel::Info,
            message: message.into(),
            source: source.into(),
            container: None,
        }
    }

    /// Check producer-supplied fields before the entry may be buffered
    pub fn validate(&self) -> bool {
        !self.message.is_empty() && !self.source.is_empty()
    }
}

// ============================================================================
// Cluster Event Types
// ============================================================================

/// Kind of cluster event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EventType {
    #[default]
    Normal,
    Warning,
}

impl From<&str> for EventType {
    fn from(s: &str) -> Self {
        match s {
            "Warning" => Self::Warning,
            _ => Self::Normal,
        }
    }
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Warning => "Warning",
        }
    }
}

/// The object a cluster event refers to
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InvolvedObject {
    pub kind: String,
    pub name: String,
    pub namespace: Option<String>,
}

/// A higher-level lifecycle event, distinct from a log line.
///
/// Repeated occurrences are collapsed into one record; `count` tracks how
/// often the event fired between `first_time` and `last_time`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClusterEvent {
    /// Unique sequential ID, assigned by the buffer on append
    pub id: u64,

    pub event_type: EventType,

    /// Short machine-readable code, e.g. "BackOff"
    pub reason: String,

    pub message: String,

    /// Reporting component
    pub source: String,

    pub first_time: DateTime<Utc>,
    pub last_time: DateTime<Utc>,

    /// Number of collapsed occurrences, at least 1
    pub count: u32,

    pub involved_object: InvolvedObject,
}

impl ClusterEvent {
    /// Check producer-supplied fields before the event may be buffered
    pub fn validate(&self) -> bool {
        self.count >= 1
            && self.last_time >= self.first_time
            && !self.message.is_empty()
            && !self.reason.is_empty()
    }
}
