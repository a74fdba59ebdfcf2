//! Per-node reward scores and the round log handed to bookkeeping.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::provider::ProviderKind;
use super::question::Question;
use super::request::NodeId;
use super::response::Batch;

/// Why a node holds the score it does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBasis {
    /// Compared directly against a reference answer.
    Verified,
    /// Assigned the round's verified average (or zero when none exist).
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeScore {
    pub value: f64,
    pub basis: ScoreBasis,
}

/// Final reward assignment for a round.
///
/// Built by value: every `with_*` call returns the updated map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreMap {
    scores: BTreeMap<NodeId, NodeScore>,
    /// Whether the round drew verification.
    pub verified_round: bool,
    /// Mean of directly verified scores, 0 when none.
    pub average: f64,
}

impl ScoreMap {
    pub fn new(verified_round: bool) -> Self {
        Self {
            scores: BTreeMap::new(),
            verified_round,
            average: 0.0,
        }
    }

    pub fn with_verified(mut self, node: NodeId, value: f64) -> Self {
        self.scores.insert(
            node,
            NodeScore {
                value,
                basis: ScoreBasis::Verified,
            },
        );
        self
    }

    /// Fill every node in `nodes` that has no verified score with `average`.
    pub fn with_fallback(mut self, nodes: impl IntoIterator<Item = NodeId>, average: f64) -> Self {
        self.average = average;
        for node in nodes {
            self.scores.entry(node).or_insert(NodeScore {
                value: average,
                basis: ScoreBasis::Fallback,
            });
        }
        self
    }

    pub fn get(&self, node: &NodeId) -> Option<f64> {
        self.scores.get(node).map(|s| s.value)
    }

    pub fn basis(&self, node: &NodeId) -> Option<ScoreBasis> {
        self.scores.get(node).map(|s| s.basis)
    }

    pub fn contains(&self, node: &NodeId) -> bool {
        self.scores.contains_key(node)
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.scores.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, f64)> + '_ {
        self.scores.iter().map(|(node, s)| (*node, s.value))
    }

    pub fn verified_count(&self) -> usize {
        self.scores
            .values()
            .filter(|s| s.basis == ScoreBasis::Verified)
            .count()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Plain node -> score view.
    pub fn to_values(&self) -> BTreeMap<NodeId, f64> {
        self.iter().collect()
    }
}

/// Structured payload describing one round, for the incentive sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundLog {
    pub round_id: Uuid,
    pub modality: String,
    /// Provider and model the round was run with.
    pub provider: Option<ProviderKind>,
    pub model: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub prompts: BTreeMap<NodeId, String>,
    pub responses: BTreeMap<NodeId, String>,
    pub scores: BTreeMap<NodeId, f64>,
    /// Seconds from request start to end of stream, per node.
    pub timestamps: BTreeMap<NodeId, f64>,
}

impl RoundLog {
    pub fn new(modality: impl Into<String>) -> Self {
        Self {
            round_id: Uuid::new_v4(),
            modality: modality.into(),
            provider: None,
            model: None,
            started_at: Utc::now(),
            finished_at: None,
            prompts: BTreeMap::new(),
            responses: BTreeMap::new(),
            scores: BTreeMap::new(),
            timestamps: BTreeMap::new(),
        }
    }

    pub fn with_model(mut self, provider: ProviderKind, model: impl Into<String>) -> Self {
        self.provider = Some(provider);
        self.model = Some(model.into());
        self
    }

    pub fn with_prompts(mut self, questions: &HashMap<NodeId, Question>) -> Self {
        self.prompts
            .extend(questions.iter().map(|(node, q)| (*node, q.prompt.clone())));
        self
    }

    pub fn with_batch(mut self, batch: &Batch) -> Self {
        for (node, response) in batch.iter() {
            self.responses.insert(*node, response.text.clone());
            if let Some(elapsed) = response.elapsed {
                self.timestamps.insert(*node, elapsed.as_secs_f64());
            }
        }
        self
    }

    pub fn with_scores(mut self, scores: &ScoreMap) -> Self {
        self.scores.extend(scores.iter());
        self
    }

    pub fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_does_not_overwrite_verified() {
        let map = ScoreMap::new(true)
            .with_verified(NodeId(1), 0.8)
            .with_verified(NodeId(2), 0.6)
            .with_fallback([NodeId(1), NodeId(2), NodeId(3)], 0.7);

        assert_eq!(map.get(&NodeId(1)), Some(0.8));
        assert_eq!(map.get(&NodeId(3)), Some(0.7));
        assert_eq!(map.basis(&NodeId(3)), Some(ScoreBasis::Fallback));
        assert_eq!(map.verified_count(), 2);
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn test_round_log_serializes_node_keys() {
        let scores = ScoreMap::new(false).with_fallback([NodeId(5)], 0.0);
        let log = RoundLog::new("text")
            .with_model(ProviderKind::Groq, "llama3-70b-8192")
            .with_scores(&scores)
            .finish();
        let json = serde_json::to_value(&log).unwrap();
        assert_eq!(json["modality"], "text");
        assert_eq!(json["provider"], "Groq");
        assert_eq!(json["model"], "llama3-70b-8192");
        assert_eq!(json["scores"]["5"], 0.0);
        assert!(log.finished_at.is_some());
    }
}
