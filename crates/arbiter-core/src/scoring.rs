//! Turn a batch of responses into a total score map.
//!
//! Scoring steps:
//! 1. The [`VerificationSampler`] decides whether this round is verified.
//! 2. If so, every node with text gets a reference answer from the oracle
//!    for its own question, concurrently, using the round's provider and
//!    model.
//! 3. Nodes with a reference are scored `similarity * weight`.
//! 4. Every other node in the batch gets the mean of the verified scores,
//!    or 0 when nothing was verified.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::capabilities::{ReferenceOracle, SimilarityScorer};
use crate::config::{ModelChoice, ValidatorConfig};
use crate::domain::{
    Batch, NodeId, NodeResponse, Question, ReferenceRequest, Result, SamplingParams, ScoreMap,
};
use crate::metrics::METRICS;
use crate::obs::emit_oracle_failed;
use crate::sampler::VerificationSampler;

/// Scores a round's batch against reference answers.
pub struct ScoreAggregator {
    oracle: Arc<dyn ReferenceOracle>,
    scorer: Arc<dyn SimilarityScorer>,
    sampler: VerificationSampler,
    sampling: SamplingParams,
}

impl ScoreAggregator {
    pub fn new(
        oracle: Arc<dyn ReferenceOracle>,
        scorer: Arc<dyn SimilarityScorer>,
        sampler: VerificationSampler,
        sampling: SamplingParams,
    ) -> Self {
        Self {
            oracle,
            scorer,
            sampler,
            sampling,
        }
    }

    pub fn from_config(
        oracle: Arc<dyn ReferenceOracle>,
        scorer: Arc<dyn SimilarityScorer>,
        config: &ValidatorConfig,
    ) -> Result<Self> {
        Ok(Self::new(
            oracle,
            scorer,
            VerificationSampler::new(config.verify_probability)?,
            config.sampling.clone(),
        ))
    }

    /// Draw the verification decision and score the batch.
    pub async fn score(
        &self,
        batch: &Batch,
        questions: &HashMap<NodeId, Question>,
        choice: &ModelChoice,
        weight: f64,
    ) -> ScoreMap {
        let verify = self.sampler.decide();
        self.score_with_decision(batch, questions, choice, weight, verify)
            .await
    }

    /// Score the batch with the verification decision already made.
    ///
    /// Every node in `batch` appears in the result.
    pub async fn score_with_decision(
        &self,
        batch: &Batch,
        questions: &HashMap<NodeId, Question>,
        choice: &ModelChoice,
        weight: f64,
        verify: bool,
    ) -> ScoreMap {
        let mut scores = ScoreMap::new(verify);

        if verify {
            let verified = self.verify(batch, questions, choice, weight).await;
            for (node, value) in verified {
                scores = scores.with_verified(node, value);
            }
        }

        let verified: Vec<f64> = scores.iter().map(|(_, value)| value).collect();
        let average = if verified.is_empty() {
            0.0
        } else {
            verified.iter().sum::<f64>() / verified.len() as f64
        };
        debug!(verified = verified.len(), average, "computed fallback average");

        let scores = scores.with_fallback(batch.nodes(), average);
        info!(scores = ?scores.to_values(), "round scores");
        scores
    }

    /// Oracle-backed scores for every node that can be verified.
    async fn verify(
        &self,
        batch: &Batch,
        questions: &HashMap<NodeId, Question>,
        choice: &ModelChoice,
        weight: f64,
    ) -> Vec<(NodeId, f64)> {
        let candidates: Vec<(&NodeResponse, &Question)> = batch
            .responded()
            .filter_map(|response| match questions.get(&response.node) {
                Some(question) => Some((response, question)),
                None => {
                    warn!(node = %response.node, "no question recorded for node, cannot verify");
                    None
                }
            })
            .collect();

        let references = join_all(candidates.into_iter().map(|(response, question)| {
            let request = ReferenceRequest::for_question(choice.provider, question, &choice.model, &self.sampling);
            async move {
                METRICS.inc_oracle_calls();
                let reference = self.oracle.generate_reference(&request).await;
                (response, reference)
            }
        }))
        .await;

        let scoring = references
            .into_iter()
            .filter_map(|(response, reference)| match reference {
                Ok(reference) if !reference.is_empty() => Some((response, reference)),
                Ok(_) => {
                    METRICS.inc_oracle_failures();
                    emit_oracle_failed(response.node, choice.provider, &choice.model, &"empty reference answer");
                    None
                }
                Err(e) => {
                    METRICS.inc_oracle_failures();
                    emit_oracle_failed(response.node, choice.provider, &choice.model, &e);
                    None
                }
            })
            .map(|(response, reference)| async move {
                let similarity = self.scorer.score(&reference, &response.text).await;
                (response.node, similarity)
            });

        join_all(scoring)
            .await
            .into_iter()
            .filter_map(|(node, similarity)| {
                if similarity.is_finite() {
                    Some((node, similarity.clamp(0.0, 1.0) * weight))
                } else {
                    warn!(node = %node, similarity, "scorer returned a non-finite value");
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ProviderKind, StreamOutcome};
    use crate::fakes::{FailingOracle, FixedOracle, TableScorer};
    use std::time::Duration;

    fn response(node: u16, text: &str) -> NodeResponse {
        NodeResponse {
            node: NodeId(node),
            text: text.to_string(),
            elapsed: Some(Duration::from_millis(5)),
            attempts: 1,
            outcome: StreamOutcome::Completed,
        }
    }

    fn questions(nodes: &[u16]) -> HashMap<NodeId, Question> {
        nodes
            .iter()
            .map(|n| (NodeId(*n), Question::new("What is the capital of France?", None)))
            .collect()
    }

    fn choice(provider: ProviderKind) -> ModelChoice {
        ModelChoice::new(provider, "gpt-4o", 1.0)
    }

    fn aggregator(oracle: Arc<dyn ReferenceOracle>) -> ScoreAggregator {
        let scorer = TableScorer::new()
            .with("A-answer", 0.8)
            .with("B-answer", 0.6)
            .with("C-answer", 2.5);
        ScoreAggregator::new(
            oracle,
            Arc::new(scorer),
            VerificationSampler::always(),
            SamplingParams::default(),
        )
    }

    #[tokio::test]
    async fn test_unverified_node_gets_verified_mean() {
        // Node 3 has text but the oracle does not serve its question.
        let batch: Batch = vec![response(1, "A-answer"), response(2, "B-answer"), response(3, "other")]
            .into_iter()
            .collect();
        let mut qs = questions(&[1, 2]);
        qs.insert(NodeId(3), Question::new("unknown", None));
        let oracle = crate::fakes::PromptOracle::new().answer("What is the capital of France?", "Paris");

        let scores = aggregator(Arc::new(oracle))
            .score_with_decision(&batch, &qs, &choice(ProviderKind::OpenAi), 1.0, true)
            .await;

        assert_eq!(scores.get(&NodeId(1)), Some(0.8));
        assert_eq!(scores.get(&NodeId(2)), Some(0.6));
        assert!((scores.get(&NodeId(3)).unwrap() - 0.7).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_skipped_round_scores_everyone_zero() {
        let oracle = Arc::new(FixedOracle::new("Paris"));
        let batch: Batch = vec![response(1, "A-answer"), response(2, "")].into_iter().collect();

        let scores = aggregator(oracle.clone())
            .score_with_decision(&batch, &questions(&[1, 2]), &choice(ProviderKind::OpenAi), 1.0, false)
            .await;

        assert_eq!(oracle.calls(), 0);
        assert!(!scores.verified_round);
        assert_eq!(scores.len(), 2);
        assert_eq!(scores.get(&NodeId(1)), Some(0.0));
        assert_eq!(scores.get(&NodeId(2)), Some(0.0));
    }

    #[tokio::test]
    async fn test_all_oracle_failures_fall_back_to_zero() {
        let batch: Batch = vec![response(1, "A-answer")].into_iter().collect();
        let scores = aggregator(Arc::new(FailingOracle))
            .score_with_decision(&batch, &questions(&[1]), &choice(ProviderKind::Groq), 1.0, true)
            .await;
        assert_eq!(scores.get(&NodeId(1)), Some(0.0));
        assert_eq!(scores.verified_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_responses_are_not_sent_to_oracle() {
        let oracle = Arc::new(FixedOracle::new("Paris"));
        let batch: Batch = vec![response(1, "A-answer"), response(2, "")].into_iter().collect();
        let scores = aggregator(oracle.clone())
            .score_with_decision(&batch, &questions(&[1, 2]), &choice(ProviderKind::OpenAi), 1.0, true)
            .await;
        assert_eq!(oracle.calls(), 1);
        assert_eq!(scores.get(&NodeId(2)), Some(0.8));
    }

    #[tokio::test]
    async fn test_similarity_is_clamped_then_weighted() {
        let batch: Batch = vec![response(1, "C-answer"), response(2, "A-answer")].into_iter().collect();
        let scores = aggregator(Arc::new(FixedOracle::new("Paris")))
            .score_with_decision(&batch, &questions(&[1, 2]), &choice(ProviderKind::OpenAi), 0.5, true)
            .await;
        assert_eq!(scores.get(&NodeId(1)), Some(0.5));
        assert_eq!(scores.get(&NodeId(2)), Some(0.4));
    }

    #[tokio::test]
    async fn test_unsupported_provider_falls_back() {
        let oracle = FixedOracle::new("Paris").serving([ProviderKind::OpenAi]);
        let batch: Batch = vec![response(1, "A-answer")].into_iter().collect();
        let scores = aggregator(Arc::new(oracle))
            .score_with_decision(&batch, &questions(&[1]), &choice(ProviderKind::Gemini), 1.0, true)
            .await;
        assert_eq!(scores.get(&NodeId(1)), Some(0.0));
    }
}
