use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_parse<T: FromStr>(profile: &str, key: &str, default: T) -> T {
    match profiled_env_opt(profile, key) {
        Some(raw) => match raw.parse() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(key, value = %raw, "unparsable config value, using default");
                default
            }
        },
        None => default,
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub rules: RulesConfig,
    pub model: ModelConfig,
    pub engine: EngineConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `HAUSWATCH_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("HAUSWATCH_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            rules: RulesConfig::from_env_profiled(p),
            model: ModelConfig::from_env_profiled(p),
            engine: EngineConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  rules:       file={}", self.rules.file.display());
        tracing::info!("  model:       file={}", self.model.file.display());
        tracing::info!(
            "  engine:      interval={}s, history={}, boundary={}",
            self.engine.interval_secs,
            self.engine.history_capacity,
            self.engine.escalation_boundary
        );
        tracing::info!(
            "  hours:       {:02}:00-{:02}:00",
            self.engine.working_hours.start_hour,
            self.engine.working_hours.end_hour
        );
    }
}

// ── Rules ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    pub file: PathBuf,
}

impl RulesConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            file: PathBuf::from(profiled_env_or(p, "RULES_FILE", "data/rules/home.json")),
        }
    }
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("data/rules/home.json"),
        }
    }
}

// ── Model snapshot ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub file: PathBuf,
}

impl ModelConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            file: PathBuf::from(profiled_env_or(p, "MODEL_FILE", "data/model/snapshot.json")),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("data/model/snapshot.json"),
        }
    }
}

// ── Engine ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub interval_secs: u64,
    pub history_capacity: usize,
    pub escalation_boundary: EscalationBoundary,
    pub working_hours: WorkingHours,
}

impl EngineConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            interval_secs: profiled_env_parse(p, "EVAL_INTERVAL_SECS", 5),
            history_capacity: profiled_env_parse(p, "HISTORY_CAPACITY", 30),
            escalation_boundary: profiled_env_parse(
                p,
                "ESCALATION_BOUNDARY",
                EscalationBoundary::PreviousHook,
            ),
            working_hours: WorkingHours {
                start_hour: profiled_env_parse(p, "WORKING_HOURS_START", 8),
                end_hour: profiled_env_parse(p, "WORKING_HOURS_END", 18),
            },
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            history_capacity: 30,
            escalation_boundary: EscalationBoundary::PreviousHook,
            working_hours: WorkingHours::default(),
        }
    }
}

/// Which threshold an elapsed violation duration resolves to.
///
/// `PreviousHook` answers with the greatest threshold strictly below the
/// elapsed time (the lowest one while nothing is below yet). `MatchedKey`
/// answers with the first threshold at or above it. Both saturate at the
/// highest threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationBoundary {
    #[default]
    PreviousHook,
    MatchedKey,
}

impl FromStr for EscalationBoundary {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "previous" | "previous_hook" => Ok(Self::PreviousHook),
            "matched" | "matched_key" => Ok(Self::MatchedKey),
            other => Err(format!("unknown escalation boundary '{}'", other)),
        }
    }
}

impl std::fmt::Display for EscalationBoundary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EscalationBoundary::PreviousHook => write!(f, "previous"),
            EscalationBoundary::MatchedKey => write!(f, "matched"),
        }
    }
}

/// Local-time working window, Monday to Friday, `[start_hour, end_hour)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingHours {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl Default for WorkingHours {
    fn default() -> Self {
        Self {
            start_hour: 8,
            end_hour: 18,
        }
    }
}
