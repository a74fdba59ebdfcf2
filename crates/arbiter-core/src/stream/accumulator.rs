//! Folding a fragment stream into one response.

use tracing::{debug, trace};

use super::{FragmentStream, StreamReport};
use crate::domain::{NodeId, NodeResponse, StreamFragment};

/// Concatenates the text fragments of one node's stream.
///
/// Owned by a single drain; `End` markers are skipped, since a retried
/// stream emits one per attempt and the sequence only ends when the
/// producer stops.
#[derive(Debug)]
pub struct ResponseAccumulator {
    node: NodeId,
    text: String,
}

impl ResponseAccumulator {
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            text: String::new(),
        }
    }

    pub fn push(&mut self, fragment: StreamFragment) {
        if let StreamFragment::Text(text) = fragment {
            trace!(node = %self.node, fragment = %text);
            self.text.push_str(&text);
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Freeze the accumulated text together with the producer's report.
    pub fn finish(self, report: StreamReport) -> NodeResponse {
        NodeResponse {
            node: self.node,
            text: self.text,
            elapsed: report.elapsed,
            attempts: report.attempts,
            outcome: report.outcome,
        }
    }

    /// Drain `stream` to the end and return the finished response.
    ///
    /// Terminates because the producer's timeout and retry cap bound its
    /// lifetime.
    pub async fn drain(mut stream: FragmentStream) -> NodeResponse {
        let mut acc = ResponseAccumulator::new(stream.node());
        while let Some(fragment) = stream.next().await {
            acc.push(fragment);
        }
        let report = stream.finish().await;
        debug!(node = %acc.node, full_response = %acc.text, "response drained");
        acc.finish(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StreamOutcome;

    fn fragments() -> Vec<StreamFragment> {
        vec![
            StreamFragment::Text("The capital ".to_string()),
            StreamFragment::End,
            StreamFragment::Text("is ".to_string()),
            StreamFragment::Text(String::new()),
            StreamFragment::Text("Paris".to_string()),
            StreamFragment::End,
        ]
    }

    #[tokio::test]
    async fn test_drain_concatenates_text_and_skips_end_markers() {
        let stream = FragmentStream::from_fragments(NodeId(3), fragments());
        let response = ResponseAccumulator::drain(stream).await;
        assert_eq!(response.node, NodeId(3));
        assert_eq!(response.text, "The capital is Paris");
        assert_eq!(response.outcome, StreamOutcome::Completed);
    }

    #[tokio::test]
    async fn test_drain_is_deterministic() {
        let first = ResponseAccumulator::drain(FragmentStream::from_fragments(NodeId(1), fragments())).await;
        let second = ResponseAccumulator::drain(FragmentStream::from_fragments(NodeId(1), fragments())).await;
        assert_eq!(first.text, second.text);
    }

    #[tokio::test]
    async fn test_sentinel_only_stream_is_empty_response() {
        let stream = FragmentStream::from_fragments(NodeId(2), vec![StreamFragment::End]);
        let response = ResponseAccumulator::drain(stream).await;
        assert!(response.is_empty());
    }
}
