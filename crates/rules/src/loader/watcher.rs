//! Filesystem event handler for the notify watcher (hot-reload).

use std::path::Path;
use std::sync::{Arc, RwLock};

use notify::event::{CreateKind, ModifyKind};
use notify::{Event, EventKind};
use tracing::{info, warn};

use crate::schema::RuleSpec;

use super::core::load_str;

/// Handle a single filesystem event from the notify watcher.
pub(super) fn handle_fs_event(
    event: &Event,
    rule_file: &Path,
    specs: &Arc<RwLock<Arc<Vec<RuleSpec>>>>,
) {
    let touches_rule_file = event
        .paths
        .iter()
        .any(|p| p.file_name().is_some() && p.file_name() == rule_file.file_name());
    if !touches_rule_file {
        return;
    }

    match &event.kind {
        EventKind::Create(CreateKind::File)
        | EventKind::Create(CreateKind::Any)
        | EventKind::Modify(ModifyKind::Data(_))
        | EventKind::Modify(ModifyKind::Name(_))
        | EventKind::Modify(ModifyKind::Any) => reload_into(rule_file, specs),
        EventKind::Remove(_) => {
            warn!(path = %rule_file.display(), "rule file removed, keeping previous rules");
        }
        _ => {}
    }
}

/// Re-parse the rule file and swap it in, keeping the previous set on failure.
fn reload_into(rule_file: &Path, specs: &Arc<RwLock<Arc<Vec<RuleSpec>>>>) {
    let contents = match std::fs::read_to_string(rule_file) {
        Ok(c) => c,
        Err(e) => {
            warn!(path = %rule_file.display(), error = %e, "failed to read rule file during hot-reload");
            return;
        }
    };

    match load_str(&contents) {
        Ok(outcome) => {
            info!(path = %rule_file.display(), rules = outcome.specs.len(), "hot-reloaded rule file");
            *specs.write().expect("specs lock poisoned") = Arc::new(outcome.specs);
        }
        Err(e) => {
            warn!(
                path = %rule_file.display(),
                error = %e,
                "failed to parse rule file during hot-reload, keeping previous version"
            );
        }
    }
}
