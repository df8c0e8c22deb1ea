//! Duration-based escalation lookup.

use std::collections::{BTreeMap, BTreeSet};

use hauswatch_core::EscalationBoundary;

use crate::schema::EscalationLevel;

/// Message and notify groups for a violation of a given age.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Escalation {
    pub message: Option<String>,
    pub notify_groups: BTreeSet<String>,
}

impl Escalation {
    /// Look up both halves for a violation `elapsed_secs` old.
    ///
    /// Messages and notify groups come from separate maps, so each half is
    /// selected among the thresholds that define it.
    pub fn resolve(
        thresholds: &BTreeMap<u64, EscalationLevel>,
        elapsed_secs: u64,
        boundary: EscalationBoundary,
    ) -> Self {
        let message = select(
            thresholds
                .iter()
                .filter_map(|(k, level)| level.message.as_ref().map(|m| (*k, m))),
            elapsed_secs,
            boundary,
        )
        .cloned();

        let notify_groups = select(
            thresholds
                .iter()
                .filter_map(|(k, level)| level.notify_groups.as_ref().map(|g| (*k, g))),
            elapsed_secs,
            boundary,
        )
        .cloned()
        .unwrap_or_default();

        Self {
            message,
            notify_groups,
        }
    }

    /// The message, or a generic one when no threshold defines any.
    pub fn message_for(&self, rule_name: &str) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| format!("rule '{}' violated", rule_name))
    }
}

/// Walk thresholds in ascending key order.
///
/// The first key at or above `elapsed` decides: `PreviousHook` answers with
/// the entry before it (or the key itself when it is the lowest),
/// `MatchedKey` with the key itself. Past every key the highest entry wins.
pub fn select<'a, T: 'a>(
    entries: impl IntoIterator<Item = (u64, &'a T)>,
    elapsed: u64,
    boundary: EscalationBoundary,
) -> Option<&'a T> {
    let mut hook: Option<&'a T> = None;
    for (key, value) in entries {
        if key >= elapsed {
            return Some(match boundary {
                EscalationBoundary::PreviousHook => hook.unwrap_or(value),
                EscalationBoundary::MatchedKey => value,
            });
        }
        hook = Some(value);
    }
    hook
}

#[cfg(test)]
mod tests {
    use super::*;

    fn levels(entries: &[(u64, &str)]) -> BTreeMap<u64, EscalationLevel> {
        entries
            .iter()
            .map(|(k, m)| {
                (
                    *k,
                    EscalationLevel {
                        message: Some(m.to_string()),
                        notify_groups: None,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn boundary_table() {
        let thresholds = levels(&[(60, "low"), (600, "high")]);
        let cases = [
            (0, "low", "low"),
            (30, "low", "low"),
            (60, "low", "low"),
            (61, "low", "high"),
            (100, "low", "high"),
            (600, "low", "high"),
            (601, "high", "high"),
            (10_000, "high", "high"),
        ];
        for (elapsed, previous, matched) in cases {
            let got = Escalation::resolve(&thresholds, elapsed, EscalationBoundary::PreviousHook);
            assert_eq!(got.message.as_deref(), Some(previous), "previous hook at {elapsed}");
            let got = Escalation::resolve(&thresholds, elapsed, EscalationBoundary::MatchedKey);
            assert_eq!(got.message.as_deref(), Some(matched), "matched key at {elapsed}");
        }
    }

    #[test]
    fn three_levels_previous_hook() {
        let thresholds = levels(&[(60, "a"), (600, "b"), (3600, "c")]);
        let at = |elapsed| {
            Escalation::resolve(&thresholds, elapsed, EscalationBoundary::PreviousHook)
                .message
                .unwrap()
        };
        assert_eq!(at(10), "a");
        assert_eq!(at(700), "b");
        assert_eq!(at(3600), "b");
        assert_eq!(at(3601), "c");
    }

    #[test]
    fn messages_and_groups_resolve_independently() {
        let mut thresholds = levels(&[(60, "low"), (600, "high")]);
        thresholds.insert(
            300,
            EscalationLevel {
                message: None,
                notify_groups: Some(["family".to_string()].into_iter().collect()),
            },
        );

        let early = Escalation::resolve(&thresholds, 30, EscalationBoundary::PreviousHook);
        assert_eq!(early.message.as_deref(), Some("low"));
        assert!(early.notify_groups.contains("family"));

        let late = Escalation::resolve(&thresholds, 5000, EscalationBoundary::PreviousHook);
        assert_eq!(late.message.as_deref(), Some("high"));
        assert!(late.notify_groups.contains("family"));
    }

    #[test]
    fn no_thresholds() {
        let got = Escalation::resolve(&BTreeMap::new(), 120, EscalationBoundary::PreviousHook);
        assert_eq!(got, Escalation::default());
        assert_eq!(got.message_for("battery"), "rule 'battery' violated");
    }
}
