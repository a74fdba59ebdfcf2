//! One full validator round: draw a model, query, score, log, submit.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, Instrument};
use uuid::Uuid;

use crate::capabilities::{IncentiveSink, QuestionSource, ReferenceOracle, SimilarityScorer};
use crate::config::{ModelChoice, ValidatorConfig};
use crate::dispatch::{Dispatcher, RoundQuery};
use crate::domain::{NodeId, NodeTarget, Result, RoundLog, ScoreMap, Turn};
use crate::metrics::METRICS;
use crate::obs::{emit_round_scored, emit_round_started, round_span};
use crate::sampler::ModelRotation;
use crate::scoring::ScoreAggregator;

/// Everything a round produced.
#[derive(Debug, Clone)]
pub struct RoundOutcome {
    pub round_id: Uuid,
    /// Provider and model drawn for the round.
    pub choice: ModelChoice,
    pub query: RoundQuery,
    pub scores: ScoreMap,
    pub log: RoundLog,
}

/// Wires the dispatcher, scorer and sink together for repeated rounds.
pub struct RoundRunner {
    config: Arc<ValidatorConfig>,
    dispatcher: Dispatcher,
    aggregator: ScoreAggregator,
    rotation: ModelRotation,
    questions: Arc<dyn QuestionSource>,
    sink: Arc<dyn IncentiveSink>,
}

impl RoundRunner {
    pub fn new(
        config: ValidatorConfig,
        oracle: Arc<dyn ReferenceOracle>,
        scorer: Arc<dyn SimilarityScorer>,
        questions: Arc<dyn QuestionSource>,
        sink: Arc<dyn IncentiveSink>,
    ) -> Result<Self> {
        config.validate()?;
        let aggregator = ScoreAggregator::from_config(oracle, scorer, &config)?;
        let rotation = ModelRotation::from_config(&config)?;
        let config = Arc::new(config);
        Ok(Self {
            dispatcher: Dispatcher::new(Arc::clone(&config)),
            config,
            aggregator,
            rotation,
            questions,
            sink,
        })
    }

    /// Replace the aggregator, e.g. to pin the verification decision.
    pub fn with_aggregator(mut self, aggregator: ScoreAggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    /// Replace the provider/model rotation.
    pub fn with_rotation(mut self, rotation: ModelRotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Query `nodes`, score their answers and hand the result to the sink.
    ///
    /// Always returns a complete outcome; per-node failures only lower that
    /// node's contribution. A sink failure is logged, not returned.
    pub async fn run_and_score(
        &self,
        nodes: &[NodeTarget],
        conversations: &HashMap<NodeId, Vec<Turn>>,
    ) -> RoundOutcome {
        let log = RoundLog::new(self.config.modality.clone());
        let round_id = log.round_id;
        let span = round_span(&round_id);

        async move {
            let choice = self.rotation.pick().clone();
            emit_round_started(&round_id, nodes.len(), &choice.model);

            let query = self
                .dispatcher
                .run_round_with(nodes, conversations, self.questions.as_ref(), &choice)
                .await;

            let scores = self
                .aggregator
                .score(
                    &query.batch,
                    &query.questions,
                    &choice,
                    self.config.weight,
                )
                .await;

            let log = log
                .with_model(choice.provider, choice.model.clone())
                .with_prompts(&query.questions)
                .with_batch(&query.batch)
                .with_scores(&scores)
                .finish();

            emit_round_scored(&round_id, scores.len(), scores.verified_count(), scores.average);
            METRICS.inc_rounds_scored();

            if let Err(e) = self.sink.submit(&scores, &log).await {
                error!(round_id = %round_id, error = %e, "incentive sink rejected round");
            }

            RoundOutcome {
                round_id,
                choice,
                query,
                scores,
                log,
            }
        }
        .instrument(span)
        .await
    }

    /// Stream caller-supplied conversations without scoring.
    pub fn organic(
        &self,
        queries: Vec<(NodeTarget, Vec<Turn>)>,
    ) -> mpsc::UnboundedReceiver<(NodeId, String)> {
        self.dispatcher.organic(queries)
    }
}
