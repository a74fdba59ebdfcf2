//! Streamed output and the per-round batch of node responses.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::request::NodeId;

/// One unit of streamed output.
///
/// `End` is emitted when an attempt stops for any reason; it tells a waiting
/// consumer that no more text is coming from that attempt. The sequence
/// itself ends when the producing task finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFragment {
    Text(String),
    End,
}

impl StreamFragment {
    pub fn is_end(&self) -> bool {
        matches!(self, StreamFragment::End)
    }
}

/// How a node's stream ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StreamOutcome {
    /// The node closed the stream normally.
    Completed,
    /// A non-timeout error cut the stream short; partial text is kept.
    Interrupted { reason: String },
    /// Every attempt timed out while reading.
    Exhausted { attempts: u32 },
    /// The connection or request could not be established.
    Unreachable { reason: String },
    /// The per-node task was lost before reporting.
    Aborted { reason: String },
}

/// Everything one node produced in a round.
///
/// Built by the accumulator and frozen once the fragment sequence ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeResponse {
    pub node: NodeId,
    pub text: String,
    /// Wall-clock time from request start to normal end of stream.
    pub elapsed: Option<Duration>,
    pub attempts: u32,
    pub outcome: StreamOutcome,
}

impl NodeResponse {
    pub fn empty(node: NodeId, outcome: StreamOutcome) -> Self {
        Self {
            node,
            text: String::new(),
            elapsed: None,
            attempts: 0,
            outcome,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// All node responses for one dispatch round, keyed by node.
///
/// Keys are exactly the nodes queried in the round, including those whose
/// response is empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    responses: BTreeMap<NodeId, NodeResponse>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, response: NodeResponse) {
        self.responses.insert(response.node, response);
    }

    pub fn get(&self, node: &NodeId) -> Option<&NodeResponse> {
        self.responses.get(node)
    }

    pub fn contains(&self, node: &NodeId) -> bool {
        self.responses.contains_key(node)
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.responses.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &NodeResponse)> {
        self.responses.iter()
    }

    /// Nodes that returned at least some text.
    pub fn responded(&self) -> impl Iterator<Item = &NodeResponse> {
        self.responses.values().filter(|r| !r.is_empty())
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }
}

impl FromIterator<NodeResponse> for Batch {
    fn from_iter<I: IntoIterator<Item = NodeResponse>>(iter: I) -> Self {
        let mut batch = Batch::new();
        for response in iter {
            batch.insert(response);
        }
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(node: u16, text: &str) -> NodeResponse {
        NodeResponse {
            node: NodeId(node),
            text: text.to_string(),
            elapsed: Some(Duration::from_millis(10)),
            attempts: 1,
            outcome: StreamOutcome::Completed,
        }
    }

    #[test]
    fn test_batch_keeps_empty_responses() {
        let batch: Batch = vec![
            response(1, "Paris"),
            NodeResponse::empty(NodeId(2), StreamOutcome::Exhausted { attempts: 2 }),
        ]
        .into_iter()
        .collect();

        assert_eq!(batch.len(), 2);
        assert!(batch.contains(&NodeId(2)));
        let responded: Vec<_> = batch.responded().map(|r| r.node).collect();
        assert_eq!(responded, vec![NodeId(1)]);
    }

    #[test]
    fn test_outcome_serializes_tagged() {
        let json = serde_json::to_value(StreamOutcome::Exhausted { attempts: 2 }).unwrap();
        assert_eq!(json, serde_json::json!({"status": "exhausted", "attempts": 2}));
    }
}
