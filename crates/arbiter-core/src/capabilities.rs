//! Capabilities consumed from external collaborators.
//!
//! - `ReferenceOracle`: trusted reference answer for a provider-shaped request
//! - `QuestionSource`: fresh prompts for a round
//! - `SimilarityScorer`: bounded comparison of a candidate against a reference
//! - `IncentiveSink`: receives the round's scores and log
//!
//! All traits are async and backend-agnostic. In-memory fakes live in the
//! `fakes` module.

use async_trait::async_trait;
use tracing::info;

use crate::domain::{OracleError, Question, ReferenceRequest, Result, RoundLog, ScoreMap};

/// Result type for oracle calls.
pub type OracleResult<T> = std::result::Result<T, OracleError>;

/// Generates trusted reference answers.
#[async_trait]
pub trait ReferenceOracle: Send + Sync {
    /// Answer `request` using the backend its variant names.
    ///
    /// A backend this oracle cannot serve returns
    /// `OracleError::UnsupportedProvider`.
    async fn generate_reference(&self, request: &ReferenceRequest) -> OracleResult<String>;
}

/// Produces prompts for nodes.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// Next prompt for `modality`. `desired_count` is the number of nodes in
    /// the round; `vision` asks for a prompt with an attached image.
    async fn next_question(&self, modality: &str, desired_count: usize, vision: bool) -> Result<Question>;
}

/// Compares a candidate answer against a reference.
#[async_trait]
pub trait SimilarityScorer: Send + Sync {
    /// Score in `[0, 1]`; 1 means equivalent.
    async fn score(&self, reference: &str, candidate: &str) -> f64;
}

/// Receives each round's terminal artifacts.
#[async_trait]
pub trait IncentiveSink: Send + Sync {
    async fn submit(&self, scores: &ScoreMap, log: &RoundLog) -> anyhow::Result<()>;
}

/// Sink that writes the round log as one structured `info!` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[async_trait]
impl IncentiveSink for TracingSink {
    async fn submit(&self, scores: &ScoreMap, log: &RoundLog) -> anyhow::Result<()> {
        let payload = serde_json::to_string(log)?;
        info!(
            event = "round.log",
            round_id = %log.round_id,
            nodes = scores.len(),
            verified = scores.verified_count(),
            payload = %payload,
        );
        Ok(())
    }
}
