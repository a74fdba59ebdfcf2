//! Streaming one request to one node and folding the fragments.
//!
//! [`StreamingClient::open_stream`] spawns a producer task that owns the HTTP
//! exchange and feeds an unbounded channel. The consumer side is a
//! [`FragmentStream`]; [`ResponseAccumulator::drain`] folds it into a
//! [`NodeResponse`](crate::domain::NodeResponse).

pub mod accumulator;
pub mod client;
pub mod decode;

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::domain::{NodeId, StreamFragment, StreamOutcome};

pub use accumulator::ResponseAccumulator;
pub use client::{StreamingClient, TimeoutBudget, MAX_STREAM_ATTEMPTS};
pub use decode::{InvalidUtf8, Utf8Decoder};

/// What the producer observed once it stopped.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamReport {
    pub node: NodeId,
    pub attempts: u32,
    pub elapsed: Option<Duration>,
    pub outcome: StreamOutcome,
}

/// Consumer half of a node stream.
///
/// Yields fragments in send order. The sequence ends once the producer has
/// stopped and every fragment it sent has been received.
pub struct FragmentStream {
    node: NodeId,
    rx: mpsc::UnboundedReceiver<StreamFragment>,
    producer: JoinHandle<StreamReport>,
}

impl FragmentStream {
    pub fn new(
        node: NodeId,
        rx: mpsc::UnboundedReceiver<StreamFragment>,
        producer: JoinHandle<StreamReport>,
    ) -> Self {
        Self { node, rx, producer }
    }

    /// Replay a fixed sequence, ending with a completed report.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn from_fragments(node: NodeId, fragments: Vec<StreamFragment>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        for fragment in fragments {
            let _ = tx.send(fragment);
        }
        drop(tx);
        let producer = tokio::spawn(async move {
            StreamReport {
                node,
                attempts: 1,
                elapsed: Some(Duration::ZERO),
                outcome: StreamOutcome::Completed,
            }
        });
        Self::new(node, rx, producer)
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub async fn next(&mut self) -> Option<StreamFragment> {
        self.rx.recv().await
    }

    /// Wait for the producer and return its report.
    pub async fn finish(self) -> StreamReport {
        let node = self.node;
        drop(self.rx);
        match self.producer.await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(node = %node, error = %e, "stream producer task failed");
                StreamReport {
                    node,
                    attempts: 0,
                    elapsed: None,
                    outcome: StreamOutcome::Aborted {
                        reason: e.to_string(),
                    },
                }
            }
        }
    }
}
