//! Core [`RuleLoader`] struct: file-backed rule loading with optional hot-reload.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{info, warn};

use crate::schema::{Expression, RuleSpec, RuleSpecDocument};

use super::error::{LoadResult, LoadStatus, Result, RuleError};
use super::watcher::handle_fs_event;

/// Rules accepted from one document, plus what happened to every entry.
#[derive(Debug, Clone, Default)]
pub struct LoadOutcome {
    pub specs: Vec<RuleSpec>,
    pub results: Vec<LoadResult>,
}

/// Parse a JSON rule document into validated specs.
///
/// Structural problems fail the whole document with
/// [`RuleError::MalformedSpec`]. Per-rule problems do not: a repeated name
/// keeps the first entry and an unclassifiable expression drops the rule,
/// both with a warning.
pub fn load_str(json: &str) -> Result<LoadOutcome> {
    let documents: Vec<RuleSpecDocument> = serde_json::from_str(json)?;

    let mut outcome = LoadOutcome::default();
    let mut seen: HashSet<String> = HashSet::new();

    for doc in documents {
        let spec = RuleSpec::from_document(doc).map_err(RuleError::MalformedSpec)?;

        if !seen.insert(spec.name.clone()) {
            warn!(rule = %spec.name, "duplicate rule name, keeping first definition");
            outcome.results.push(LoadResult {
                rule_name: spec.name,
                status: LoadStatus::Skipped {
                    reason: "duplicate name".to_string(),
                },
            });
            continue;
        }

        if let Err(e) = Expression::parse(&spec.expression) {
            warn!(rule = %spec.name, expression = %spec.expression, error = %e, "rejecting rule");
            outcome.results.push(LoadResult {
                rule_name: spec.name,
                status: LoadStatus::Skipped {
                    reason: e.to_string(),
                },
            });
            continue;
        }

        outcome.results.push(LoadResult {
            rule_name: spec.name.clone(),
            status: LoadStatus::Loaded,
        });
        outcome.specs.push(spec);
    }

    Ok(outcome)
}

/// File-backed rule loader with optional hot-reload.
///
/// Holds the last successfully loaded rule set. A reload that fails leaves
/// that set in place.
pub struct RuleLoader {
    /// JSON rule file.
    path: PathBuf,
    /// Last good rule set, shared with the watcher callback.
    specs: Arc<RwLock<Arc<Vec<RuleSpec>>>>,
    /// Active filesystem watcher (held to keep it alive).
    _watcher: Option<RecommendedWatcher>,
}

impl RuleLoader {
    /// Create a loader for the given file. Nothing is read until
    /// [`reload`](Self::reload) is called.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            specs: Arc::new(RwLock::new(Arc::new(Vec::new()))),
            _watcher: None,
        }
    }

    /// Parse a rule file without touching the loader's current rule set.
    pub fn load_file(path: &Path) -> Result<LoadOutcome> {
        let contents = fs::read_to_string(path)?;
        load_str(&contents)
    }

    /// Re-read the rule file and replace the current rule set.
    ///
    /// On error the previous rule set is kept and the error returned.
    pub fn reload(&self) -> Result<Vec<LoadResult>> {
        let outcome = Self::load_file(&self.path)?;
        info!(
            path = %self.path.display(),
            rules = outcome.specs.len(),
            skipped = outcome.results.len() - outcome.specs.len(),
            "loaded rule file"
        );
        *self.specs.write().expect("specs lock poisoned") = Arc::new(outcome.specs);
        Ok(outcome.results)
    }

    /// Start a filesystem watcher on the rule file's directory.
    ///
    /// Changes to the rule file trigger a reload. Parse errors are logged as
    /// warnings; the previous rule set is kept.
    pub fn watch(&mut self) -> Result<()> {
        let specs = Arc::clone(&self.specs);
        let rule_file = self.path.clone();
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut watcher = notify::recommended_watcher(move |res: std::result::Result<notify::Event, notify::Error>| {
            match res {
                Ok(event) => handle_fs_event(&event, &rule_file, &specs),
                Err(e) => warn!(error = %e, "filesystem watcher error"),
            }
        })?;

        // Editors often replace the file, so watch the directory rather than the inode.
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        let _ = watcher.configure(notify::Config::default().with_poll_interval(Duration::from_millis(500)));

        info!(path = %self.path.display(), "watching rule file for changes");
        self._watcher = Some(watcher);
        Ok(())
    }

    /// Get the rule file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The current rule set.
    pub fn specs(&self) -> Arc<Vec<RuleSpec>> {
        self.specs.read().expect("specs lock poisoned").clone()
    }

    /// Atomically write a rule set to the rule file.
    ///
    /// Writes to a `.tmp` file first, then renames to the final path to
    /// avoid partial writes on crash.
    pub fn write_specs(&self, specs: &[RuleSpec]) -> Result<()> {
        let documents: Vec<RuleSpecDocument> = specs.iter().map(RuleSpec::to_document).collect();
        let json = serde_json::to_string_pretty(&documents)?;

        let file_name = self
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("rules.json");
        let tmp_path = self.path.with_file_name(format!(".{}.tmp", file_name));
        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, &self.path)?;

        info!(path = %self.path.display(), rules = specs.len(), "wrote rule file");

        *self.specs.write().expect("specs lock poisoned") = Arc::new(specs.to_vec());
        Ok(())
    }
}
