use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use logscope_types::{LogEntry, LogLevel};

/// Severity class of a matched critical pattern
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Critical,
    Error,
    Warning,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Error => "error",
            Self::Warning => "warning",
        }
    }
}

/// An uncompiled classification rule, as read from configuration
#[derive(Clone, Debug, Deserialize)]
pub struct PatternRule {
    pub pattern: String,
    pub classification: Classification,
    pub description: String,
    #[serde(default)]
    pub suggestion: Option<String>,
}

/// A compiled classification rule
#[derive(Clone, Debug)]
pub struct CriticalPattern {
    regex: Regex,
    pub classification: Classification,
    pub description: String,
    pub suggestion: Option<String>,
}

impl CriticalPattern {
    /// Check whether this rule matches a message
    pub fn is_match(&self, message: &str) -> bool {
        self.regex.is_match(message)
    }
}

/// Error compiling the pattern rule set. Fatal at startup: the rule list is
/// static configuration, not runtime data.
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("invalid pattern '{pattern}' ({description}): {source}")]
    InvalidRegex {
        pattern: String,
        description: String,
        #[source]
        source: regex::Error,
    },
}

/// Ordered, immutable list of critical patterns.
///
/// Evaluation is strictly first-match-wins: the first rule whose regex
/// matches a message is returned and later rules are not consulted, even if
/// they would also match.
#[derive(Clone, Debug)]
pub struct PatternSet {
    patterns: Vec<CriticalPattern>,
}

impl PatternSet {
    /// Compile an ordered rule list. Any invalid regex aborts the whole set.
    pub fn compile(rules: Vec<PatternRule>) -> Result<Self, PatternError> {
        let mut patterns = Vec::with_capacity(rules.len());
        for rule in rules {
            let regex = Regex::new(&rule.pattern).map_err(|source| PatternError::InvalidRegex {
                pattern: rule.pattern.clone(),
                description: rule.description.clone(),
                source,
            })?;
            patterns.push(CriticalPattern {
                regex,
                classification: rule.classification,
                description: rule.description,
                suggestion: rule.suggestion,
            });
        }
        Ok(Self { patterns })
    }

    /// The built-in rule list. Order matters: earlier rules take priority
    /// when a message could match more than one.
    pub fn default_rules() -> Vec<PatternRule> {
        fn rule(
            pattern: &str,
            classification: Classification,
            description: &str,
            suggestion: &str,
        ) -> PatternRule {
            PatternRule {
                pattern: pattern.to_string(),
                classification,
                description: description.to_string(),
                suggestion: Some(suggestion.to_string()),
            }
        }

        vec![
            rule(
                r"(?i)crash|fatal|segfault",
                Classification::Critical,
                "Application crash detected",
                "Check the container's exit code and recent code or image changes",
            ),
            rule(
                r"(?i)missing.{0,40}environment variable|environment variable.{0,40}(missing|not found|undefined)|undefined.{0,40}environment variable",
                Classification::Error,
                "Missing environment variable",
                "Verify the deployment's env entries and referenced ConfigMaps/Secrets",
            ),
            rule(
                r"(?i)connection refused|connection timed? out|timeout|unreachable",
                Classification::Error,
                "Network connectivity issue",
                "Check Service endpoints, network policies, and DNS resolution",
            ),
            rule(
                r"(?i)out of memory|\bOOM\b|OOMKilled|memory limit exceeded",
                Classification::Critical,
                "Memory limit exceeded",
                "Raise the container memory limit or investigate the leak",
            ),
            rule(
                r"(?i)permission denied|access denied|forbidden",
                Classification::Error,
                "Permission issue",
                "Review RBAC rules, service account, and file system permissions",
            ),
            rule(
                r"(?i)image.{0,40}not found|pull failed|ImagePullBackOff|ErrImagePull",
                Classification::Error,
                "Container image issue",
                "Check the image name, tag, and registry pull credentials",
            ),
            rule(
                r"(?i)(liveness|readiness) probe failed",
                Classification::Warning,
                "Health check failure",
                "Confirm the probe endpoint, port, and timing thresholds",
            ),
        ]
    }

    /// Compile the built-in rule list. The defaults are static and known
    /// valid, so this cannot fail.
    pub fn builtin() -> Self {
        Self::compile(Self::default_rules()).expect("built-in patterns are valid")
    }

    /// Return the first rule matching the message, or None
    pub fn match_critical(&self, message: &str) -> Option<&CriticalPattern> {
        self.patterns.iter().find(|p| p.is_match(message))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl Default for PatternSet {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Detect the effective severity of a message from its text alone.
///
/// Pure function of the message: the producer-declared level on the entry is
/// deliberately ignored, on the policy that message content is a more
/// reliable severity signal than a possibly mislabeled field. Defaults to
/// Info when no keyword matches.
pub fn detect_level(message: &str) -> LogLevel {
    let upper = message.to_uppercase();

    if upper.contains("ERROR") || upper.contains("FATAL") || upper.contains("PANIC") {
        LogLevel::Error
    } else if upper.contains("WARN") {
        // Covers both WARN and WARNING
        LogLevel::Warn
    } else if upper.contains("INFO") {
        // Covers both INFO and INFORMATION
        LogLevel::Info
    } else if upper.contains("DEBUG") || upper.contains("TRACE") {
        LogLevel::Debug
    } else {
        LogLevel::Info
    }
}

/// Critical annotation attached to a classified entry, an owned copy of the
/// matched rule's consumer-facing fields
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CriticalMatch {
    pub classification: Classification,
    pub description: String,
    pub suggestion: Option<String>,
}

/// A log entry together with its derived classification.
///
/// The underlying entry is untouched; effective level and critical
/// annotation are computed views.
#[derive(Clone, Debug)]
pub struct ClassifiedEntry {
    pub entry: LogEntry,
    pub effective_level: LogLevel,
    pub critical: Option<CriticalMatch>,
}

impl ClassifiedEntry {
    pub fn is_critical(&self) -> bool {
        self.critical.is_some()
    }
}

/// Classifier bundling the heuristic level detector with a pattern set
#[derive(Clone, Debug, Default)]
pub struct Classifier {
    patterns: PatternSet,
}

impl Classifier {
    pub fn new(patterns: PatternSet) -> Self {
        Self { patterns }
    }

    pub fn patterns(&self) -> &PatternSet {
        &self.patterns
    }

    /// Classify an entry without mutating it
    pub fn annotate(&self, entry: &LogEntry) -> ClassifiedEntry {
        let critical = self
            .patterns
            .match_critical(&entry.message)
            .map(|p| CriticalMatch {
                classification: p.classification,
                description: p.description.clone(),
                suggestion: p.suggestion.clone(),
            });

        ClassifiedEntry {
            entry: entry.clone(),
            effective_level: detect_level(&entry.message),
            critical,
        }
    }
}
