//! Log processing engine for logscope
//!
//! This crate provides buffering, severity classification, critical-pattern
//! matching, multi-dimensional filtering, stream control, and export.

mod buffer;
mod classify;
mod config;
mod filter;
mod session;
mod stream;

pub use buffer::{EventBuffer, LogBuffer};
pub use classify::{
    Classification, ClassifiedEntry, Classifier, CriticalMatch, CriticalPattern, PatternError,
    PatternRule, PatternSet, detect_level,
};
pub use config::{ConfigError, load_pattern_rules};
pub use filter::{FilterCriteria, FilterUpdate, matches, visible_events};
pub use session::{Session, Summary};
pub use stream::{Producer, StreamController, StreamState};

// Re-export types used in our public API
pub use logscope_types::{ClusterEvent, EventType, InvolvedObject, LogEntry, LogLevel, TimeRange};
