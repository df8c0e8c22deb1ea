//! Wire shape of one entry in a rule-specification JSON document.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// One rule as written in the JSON rule file.
///
/// Every field is optional on the wire; absent or `null` values become the
/// type's default. Threshold keys are elapsed seconds written as strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RuleSpecDocument {
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    #[serde(deserialize_with = "nullable")]
    pub expression: String,
    #[serde(deserialize_with = "nullable")]
    pub sensor_names: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub view_permissions: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub required_true_rules: Vec<String>,
    #[serde(alias = "OrRules", deserialize_with = "nullable")]
    pub required_false_rules: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub ok_message: String,
    #[serde(deserialize_with = "nullable")]
    pub error_messages: BTreeMap<String, String>,
    #[serde(deserialize_with = "nullable")]
    pub escalation: BTreeMap<String, Vec<String>>,
    #[serde(deserialize_with = "nullable")]
    pub invisible: bool,
    #[serde(deserialize_with = "nullable")]
    pub related_file_logs: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub priority: i64,
}

/// Treat an explicit `null` like an absent field.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
