//! Error types and load result structures for the rule loader.

/// Errors that can occur while loading rule specifications.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// Filesystem I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The rule document is structurally invalid (bad JSON, wrong types,
    /// blank rule name, non-numeric threshold key).
    #[error("Malformed rule spec: {0}")]
    MalformedSpec(String),

    /// Filesystem watcher error.
    #[error("Notify watcher error: {0}")]
    Notify(#[from] notify::Error),
}

impl From<serde_json::Error> for RuleError {
    fn from(e: serde_json::Error) -> Self {
        RuleError::MalformedSpec(e.to_string())
    }
}

/// Result alias for rule operations.
pub type Result<T> = std::result::Result<T, RuleError>;

/// Outcome of loading a single rule entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadResult {
    /// Name of the rule as written in the document.
    pub rule_name: String,
    /// Status of the load attempt.
    pub status: LoadStatus,
}

/// Status of a single rule entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    /// Rule was accepted into the rule set.
    Loaded,
    /// Rule was left out (duplicate name, unknown expression kind, ...).
    Skipped { reason: String },
}
