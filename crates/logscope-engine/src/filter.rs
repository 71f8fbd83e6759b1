use std::collections::HashSet;

use chrono::{DateTime, Utc};

use logscope_types::{ClusterEvent, LogLevel, TimeRange};

use crate::classify::ClassifiedEntry;

/// The current view configuration, one live instance per viewer session.
///
/// An entry is visible iff it satisfies every set dimension simultaneously
/// (logical AND across dimensions, OR within a set-valued dimension).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterCriteria {
    /// Admitted effective levels
    pub levels: HashSet<LogLevel>,

    /// Admitted sources (empty = no source restriction)
    pub sources: HashSet<String>,

    /// Single-source pinning, distinct from the `sources` set
    /// (None = "all")
    pub selected_source: Option<String>,

    /// Case-insensitive substring filter over `message`
    pub search_query: String,

    pub time_range: TimeRange,

    /// When true, only entries carrying a critical annotation pass
    pub critical_only: bool,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            levels: HashSet::from([LogLevel::Info, LogLevel::Warn, LogLevel::Error]),
            sources: HashSet::new(),
            selected_source: None,
            search_query: String::new(),
            time_range: TimeRange::All,
            critical_only: false,
        }
    }
}

impl FilterCriteria {
    /// Toggle a level in or out of the admitted set
    pub fn toggle_level(&mut self, level: LogLevel) {
        if !self.levels.remove(&level) {
            self.levels.insert(level);
        }
    }
}

/// Partial update for [`FilterCriteria`]: only set fields are applied
#[derive(Clone, Debug, Default)]
pub struct FilterUpdate {
    pub levels: Option<HashSet<LogLevel>>,
    pub sources: Option<HashSet<String>>,
    pub selected_source: Option<Option<String>>,
    pub search_query: Option<String>,
    pub time_range: Option<TimeRange>,
    pub critical_only: Option<bool>,
}

impl FilterUpdate {
    pub fn apply(self, criteria: &mut FilterCriteria) {
        if let Some(levels) = self.levels {
            criteria.levels = levels;
        }
        if let Some(sources) = self.sources {
            criteria.sources = sources;
        }
        if let Some(selected) = self.selected_source {
            criteria.selected_source = selected;
        }
        if let Some(query) = self.search_query {
            criteria.search_query = query;
        }
        if let Some(range) = self.time_range {
            criteria.time_range = range;
        }
        if let Some(critical_only) = self.critical_only {
            criteria.critical_only = critical_only;
        }
    }
}

/// Check one classified entry against the criteria.
///
/// Pure: each predicate is independent and the verdict does not depend on
/// evaluation order. `now` is injected so the time-range predicate is
/// testable without a real clock.
pub fn matches(criteria: &FilterCriteria, classified: &ClassifiedEntry, now: DateTime<Utc>) -> bool {
    if criteria.critical_only && classified.critical.is_none() {
        return false;
    }

    if !criteria.levels.contains(&classified.effective_level) {
        return false;
    }

    if !criteria.sources.is_empty() && !criteria.sources.contains(&classified.entry.source) {
        return false;
    }

    if let Some(selected) = &criteria.selected_source {
        if selected != &classified.entry.source {
            return false;
        }
    }

    if !criteria.search_query.is_empty()
        && !classified
            .entry
            .message
            .to_lowercase()
            .contains(&criteria.search_query.to_lowercase())
    {
        return false;
    }

    if let Some(bound) = criteria.time_range.as_seconds() {
        let age = (now - classified.entry.timestamp).num_seconds();
        // Boundary is inclusive; negative age (producer clock ahead of
        // ours) is accepted.
        if age > bound {
            return false;
        }
    }

    true
}

/// Reduced pipeline for cluster events: only the search-text predicate
/// applies
pub fn visible_events(events: &[ClusterEvent], criteria: &FilterCriteria) -> Vec<ClusterEvent> {
    if criteria.search_query.is_empty() {
        return events.to_vec();
    }
    let query = criteria.search_query.to_lowercase();
    events
        .iter()
        .filter(|e| e.message.to_lowercase().contains(&query))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Classifier;
    use chrono::Duration;
    use logscope_types::{EventType, InvolvedObject, LogEntry};

    fn classified(source: &str, message: &str, age_seconds: i64, now: DateTime<Utc>) -> ClassifiedEntry {
        let mut entry = LogEntry::new(source, message);
        entry.timestamp = now - Duration::seconds(age_seconds);
        Classifier::default().annotate(&entry)
    }

    #[test]
    fn test_default_criteria_admit_plain_info() {
        let now = Utc::now();
        let criteria = FilterCriteria::default();
        let entry = classified("pod-a", "request served", 0, now);
        assert!(matches(&criteria, &entry, now));
    }

    #[test]
    fn test_level_dimension() {
        let now = Utc::now();
        let mut criteria = FilterCriteria::default();
        criteria.levels = HashSet::from([LogLevel::Debug]);

        // Effective level Error, not in {Debug}
        let entry = classified("pod-a", "ERROR: broken", 0, now);
        assert!(!matches(&criteria, &entry, now));

        let entry = classified("pod-a", "debug: cache hit", 0, now);
        assert!(matches(&criteria, &entry, now));
    }

    #[test]
    fn test_empty_sources_means_no_restriction() {
        let now = Utc::now();
        let mut criteria = FilterCriteria::default();
        let entry = classified("pod-a", "hello", 0, now);

        assert!(criteria.sources.is_empty());
        assert!(matches(&criteria, &entry, now));

        criteria.sources.insert("pod-b".to_string());
        assert!(!matches(&criteria, &entry, now));

        criteria.sources.insert("pod-a".to_string());
        assert!(matches(&criteria, &entry, now));
    }

    #[test]
    fn test_selected_source_pinning() {
        let now = Utc::now();
        let mut criteria = FilterCriteria::default();
        criteria.selected_source = Some("pod-b".to_string());

        let entry = classified("pod-a", "hello", 0, now);
        assert!(!matches(&criteria, &entry, now));

        criteria.selected_source = None;
        assert!(matches(&criteria, &entry, now));
    }

    #[test]
    fn test_search_query_case_insensitive() {
        let now = Utc::now();
        let mut criteria = FilterCriteria::default();
        criteria.search_query = "DataBase".to_string();

        let hit = classified("pod-a", "database connection ok", 0, now);
        let miss = classified("pod-a", "cache connection ok", 0, now);
        assert!(matches(&criteria, &hit, now));
        assert!(!matches(&criteria, &miss, now));
    }

    #[test]
    fn test_critical_only() {
        let now = Utc::now();
        let mut criteria = FilterCriteria::default();
        criteria.critical_only = true;

        let critical = classified("pod-a", "ERROR: connection refused", 0, now);
        let plain = classified("pod-a", "ERROR: something else entirely broke", 0, now);
        assert!(matches(&criteria, &critical, now));
        assert!(!matches(&criteria, &plain, now));
    }

    #[test]
    fn test_time_range_boundary_pinned_inclusive() {
        let now = Utc::now();
        let mut criteria = FilterCriteria::default();
        criteria.time_range = TimeRange::Last5m;

        assert!(matches(&criteria, &classified("pod-a", "x", 299, now), now));
        // Exactly at the bound is included
        assert!(matches(&criteria, &classified("pod-a", "x", 300, now), now));
        assert!(!matches(&criteria, &classified("pod-a", "x", 301, now), now));
    }

    #[test]
    fn test_future_timestamp_is_accepted() {
        let now = Utc::now();
        let mut criteria = FilterCriteria::default();
        criteria.time_range = TimeRange::Last5m;
        assert!(matches(&criteria, &classified("pod-a", "x", -30, now), now));
    }

    #[test]
    fn test_dimensions_are_independent_and_anded() {
        let now = Utc::now();
        let entry = classified("pod-a", "WARN: database slow", 100, now);

        // All dimensions set so that the entry passes each one
        let mut criteria = FilterCriteria::default();
        criteria.sources = HashSet::from(["pod-a".to_string()]);
        criteria.selected_source = Some("pod-a".to_string());
        criteria.search_query = "database".to_string();
        criteria.time_range = TimeRange::Last5m;
        assert!(matches(&criteria, &entry, now));

        // Flipping any single dimension flips the verdict
        let mut c = criteria.clone();
        c.levels = HashSet::from([LogLevel::Error]);
        assert!(!matches(&c, &entry, now));

        let mut c = criteria.clone();
        c.sources = HashSet::from(["pod-b".to_string()]);
        assert!(!matches(&c, &entry, now));

        let mut c = criteria.clone();
        c.selected_source = Some("pod-b".to_string());
        assert!(!matches(&c, &entry, now));

        let mut c = criteria.clone();
        c.search_query = "redis".to_string();
        assert!(!matches(&c, &entry, now));

        let mut c = criteria;
        c.critical_only = true;
        assert!(!matches(&c, &entry, now));
    }

    #[test]
    fn test_filter_update_applies_only_set_fields() {
        let mut criteria = FilterCriteria::default();
        criteria.search_query = "keep me".to_string();

        FilterUpdate {
            critical_only: Some(true),
            time_range: Some(TimeRange::Last1h),
            ..Default::default()
        }
        .apply(&mut criteria);

        assert!(criteria.critical_only);
        assert_eq!(criteria.time_range, TimeRange::Last1h);
        assert_eq!(criteria.search_query, "keep me");
        // Unsetting the pin requires the explicit Some(None)
        FilterUpdate {
            selected_source: Some(None),
            ..Default::default()
        }
        .apply(&mut criteria);
        assert_eq!(criteria.selected_source, None);
    }

    #[test]
    fn test_event_filtering_search_only() {
        let now = Utc::now();
        let event = |message: &str| ClusterEvent {
            id: 0,
            event_type: EventType::Warning,
            reason: "BackOff".to_string(),
            message: message.to_string(),
            source: "kubelet".to_string(),
            first_time: now,
            last_time: now,
            count: 1,
            involved_object: InvolvedObject {
                kind: "Pod".to_string(),
                name: "api".to_string(),
                namespace: None,
            },
        };
        let events = vec![event("Back-off restarting container"), event("Pulled image")];

        let mut criteria = FilterCriteria::default();
        assert_eq!(visible_events(&events, &criteria).len(), 2);

        criteria.search_query = "BACK-OFF".to_string();
        let visible = visible_events(&events, &criteria);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].message, "Back-off restarting container");
    }
}
