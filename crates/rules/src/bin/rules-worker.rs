//! rules-worker: fixed-interval evaluation loop for the home rule engine.
//!
//! Each tick re-reads the model snapshot, runs one evaluation pass against
//! the current rule set and logs the most urgent active violations. The
//! rule file is watched and hot-reloaded; a broken edit keeps the previous
//! rules in force.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use hauswatch_core::HomeModel;
use hauswatch_rules::{RuleEngine, RuleLoader};

// ── CLI ─────────────────────────────────────────────────────────────

/// Home rules worker: periodic rule evaluation and escalation.
#[derive(Parser, Debug)]
#[command(name = "rules-worker", version, about)]
struct Cli {
    /// Config profile; keys are looked up as `{PROFILE}_{KEY}` first.
    #[arg(long, env = "HAUSWATCH_PROFILE")]
    profile: Option<String>,

    /// Rule document (overrides `RULES_FILE`).
    #[arg(long)]
    rules_file: Option<PathBuf>,

    /// Model snapshot (overrides `MODEL_FILE`).
    #[arg(long)]
    model_file: Option<PathBuf>,

    /// Seconds between passes (overrides `EVAL_INTERVAL_SECS`).
    #[arg(long)]
    interval: Option<u64>,

    /// Number of active violations to log after each pass.
    #[arg(long, env = "RULES_TOP_ISSUES", default_value_t = 5)]
    top: usize,

    /// Run a single pass, print the snapshot list as JSON and exit.
    #[arg(long)]
    once: bool,
}

// ── Pass ────────────────────────────────────────────────────────────

/// Read the model and run one pass. A model that cannot be read skips the tick.
fn tick(engine: &mut RuleEngine, loader: &RuleLoader, model_file: &Path, top: usize) {
    let mut model = match HomeModel::from_file(model_file) {
        Ok(m) => m,
        Err(e) => {
            warn!(path = %model_file.display(), error = %e, "failed to read model snapshot, skipping pass");
            return;
        }
    };

    let specs = loader.specs();
    let report = engine.run_pass(&specs, &mut model);

    for issue in engine.top_issues(top) {
        info!(
            rule = %issue.rule_name,
            priority = issue.priority,
            duration_secs = issue.duration_secs,
            sensors = ?issue.violated_sensors,
            notify = ?issue.notify_groups,
            "{}",
            issue.message
        );
    }
    if report.violated > top {
        info!(more = report.violated - top, "further active violations not shown");
    }
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    hauswatch_core::config::load_dotenv();
    let mut config = match &cli.profile {
        Some(profile) => hauswatch_core::Config::for_profile(profile),
        None => hauswatch_core::Config::from_env(),
    };
    if let Some(path) = cli.rules_file {
        config.rules.file = path;
    }
    if let Some(path) = cli.model_file {
        config.model.file = path;
    }
    if let Some(secs) = cli.interval {
        config.engine.interval_secs = secs;
    }
    config.log_summary();

    let mut loader = RuleLoader::new(config.rules.file.clone());
    loader
        .reload()
        .with_context(|| format!("loading rules from {}", config.rules.file.display()))?;

    let mut engine = RuleEngine::new(&config.engine);

    if cli.once {
        tick(&mut engine, &loader, &config.model.file, cli.top);
        println!("{}", serde_json::to_string_pretty(engine.snapshots().as_slice())?);
        return Ok(());
    }

    loader.watch()?;

    let mut ticker = tokio::time::interval(Duration::from_secs(config.engine.interval_secs.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(interval_secs = config.engine.interval_secs, "rules-worker starting");
    loop {
        tokio::select! {
            _ = ticker.tick() => tick(&mut engine, &loader, &config.model.file, cli.top),
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    info!(
        active = engine.records().len(),
        cleared = engine.history().len(),
        "rules-worker exited cleanly"
    );
    Ok(())
}
