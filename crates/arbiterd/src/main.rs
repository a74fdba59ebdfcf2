//! Arbiter validator daemon.
//!
//! Runs scoring rounds against a static node list on a fixed interval,
//! using the HTTP reference oracle, lexical overlap scoring and a sink that
//! logs each round as structured JSON.

mod nodes;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use arbiter_core::{
    init_tracing, LexicalOverlapScorer, NodeTarget, RoundRunner, StaticQuestionSource,
    TracingSink, ValidatorConfig, METRICS,
};
use clap::Parser;
use reference_oracle::{HttpOracle, OracleConfig};
use tokio::time::MissedTickBehavior;
use tracing::{info, Level};

use crate::nodes::load_nodes;

#[derive(Parser, Debug)]
#[command(name = "arbiterd")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Streams prompts to responder nodes and scores their answers", long_about = None)]
struct Cli {
    /// JSON file listing the nodes to query
    #[arg(long, env = "ARBITER_NODES")]
    nodes: PathBuf,

    /// JSON file of prompts, served round-robin
    #[arg(long, env = "ARBITER_QUESTIONS")]
    questions: PathBuf,

    /// Number of rounds to run; 0 runs until interrupted
    #[arg(long, default_value = "0")]
    rounds: u64,

    /// Seconds between round starts
    #[arg(long, default_value = "60")]
    interval_secs: u64,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; the process environment still applies.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    init_tracing(cli.json, level);

    let config = ValidatorConfig::from_env().context("Invalid validator configuration")?;
    let nodes = load_nodes(&cli.nodes)?;
    let questions = StaticQuestionSource::from_json_file(&cli.questions)
        .with_context(|| format!("Failed to load questions from {}", cli.questions.display()))?;
    let oracle_config = OracleConfig::from_env().context("Invalid oracle configuration")?;
    let oracle = HttpOracle::new(oracle_config).context("Failed to build reference oracle")?;

    info!(
        nodes = nodes.len(),
        questions = questions.len(),
        model = %config.model,
        provider = %config.provider,
        rotation = config.model_rotation.len(),
        verify_probability = config.verify_probability,
        "arbiterd starting"
    );

    let runner = RoundRunner::new(
        config,
        Arc::new(oracle),
        Arc::new(LexicalOverlapScorer),
        Arc::new(questions),
        Arc::new(TracingSink),
    )
    .context("Failed to build round runner")?;

    let interval = Duration::from_secs(cli.interval_secs.max(1));
    tokio::select! {
        completed = run_rounds(&runner, &nodes, cli.rounds, interval) => {
            info!(rounds = completed, "arbiterd finished");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, shutting down");
        }
    }

    METRICS.flush();
    Ok(())
}

/// Run `limit` rounds (forever when 0), one per `interval`. Returns the
/// number of rounds completed.
async fn run_rounds(runner: &RoundRunner, nodes: &[NodeTarget], limit: u64, interval: Duration) -> u64 {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let conversations = HashMap::new();

    let mut completed = 0;
    while limit == 0 || completed < limit {
        ticker.tick().await;
        let outcome = runner.run_and_score(nodes, &conversations).await;
        completed += 1;
        info!(
            round = completed,
            round_id = %outcome.round_id,
            provider = %outcome.choice.provider,
            model = %outcome.choice.model,
            verified = outcome.scores.verified_round,
            average = outcome.scores.average,
            excluded = outcome.query.excluded.len(),
            "round complete"
        );
        METRICS.flush();
    }
    completed
}
