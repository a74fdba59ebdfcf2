//! Fan a round of prompts out to nodes and join the responses.
//!
//! Each node gets its own producer task (see [`StreamingClient`]) and its own
//! drain task. The coordinating task awaits every drain before touching the
//! [`Batch`], so per-node tasks never write shared state.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::mpsc;
use tracing::{error, info, instrument, warn};

use crate::capabilities::QuestionSource;
use crate::config::{ModelChoice, ValidatorConfig};
use crate::domain::{
    ArbiterError, Batch, NodeId, NodeResponse, NodeTarget, Question, RequestSpec, StreamFragment,
    StreamOutcome, Turn,
};
use crate::obs::emit_node_responded;
use crate::stream::{ResponseAccumulator, StreamingClient};

/// Result of querying one round of nodes.
#[derive(Debug, Clone, Default)]
pub struct RoundQuery {
    /// One entry per queried node, empty responses included.
    pub batch: Batch,
    /// The question each queried node was asked.
    pub questions: HashMap<NodeId, Question>,
    /// Nodes left out because no prompt could be produced for them.
    pub excluded: Vec<NodeId>,
}

/// Sends prompts to nodes concurrently.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: StreamingClient,
    config: Arc<ValidatorConfig>,
}

impl Dispatcher {
    pub fn new(config: Arc<ValidatorConfig>) -> Self {
        Self {
            client: StreamingClient::from_config(&config),
            config,
        }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Request for `node` with the configured model and sampling.
    pub fn request_spec(&self, node: NodeId, messages: Vec<Turn>) -> RequestSpec {
        self.request_spec_for(node, messages, &self.config.default_choice())
    }

    /// Request for `node` with the round's drawn provider and model.
    pub fn request_spec_for(&self, node: NodeId, messages: Vec<Turn>, choice: &ModelChoice) -> RequestSpec {
        RequestSpec {
            node,
            messages,
            model: choice.model.clone(),
            sampling: self.config.sampling.clone(),
            provider: choice.provider,
            timeout: self.config.timeout(),
        }
    }

    /// Query every node in `nodes` and collect their responses.
    ///
    /// Nodes with an entry in `conversations` are sent that conversation
    /// as-is; every other node gets a fresh prompt from `questions`. A node
    /// whose prompt cannot be produced is excluded and the rest proceed.
    /// The returned batch holds exactly the queried nodes.
    pub async fn run_round(
        &self,
        nodes: &[NodeTarget],
        conversations: &HashMap<NodeId, Vec<Turn>>,
        questions: &dyn QuestionSource,
    ) -> RoundQuery {
        let choice = self.config.default_choice();
        self.run_round_with(nodes, conversations, questions, &choice).await
    }

    /// [`run_round`](Self::run_round) with an explicit provider and model.
    #[instrument(skip_all, fields(nodes = nodes.len(), model = %choice.model))]
    pub async fn run_round_with(
        &self,
        nodes: &[NodeTarget],
        conversations: &HashMap<NodeId, Vec<Turn>>,
        questions: &dyn QuestionSource,
        choice: &ModelChoice,
    ) -> RoundQuery {
        let mut seen = HashSet::new();
        let targets: Vec<NodeTarget> = nodes
            .iter()
            .filter(|target| {
                let fresh = seen.insert(target.id);
                if !fresh {
                    warn!(node = %target.id, "node listed twice, querying once");
                }
                fresh
            })
            .copied()
            .collect();

        let vision = self.config.accepts_images(&choice.model);
        let planned = self.plan(&targets, conversations, questions, vision).await;

        let mut query = RoundQuery::default();
        let mut tasks = Vec::with_capacity(planned.len());
        for (target, plan) in targets.iter().zip(planned) {
            let (turns, question) = match plan {
                Ok(plan) => plan,
                Err(e) => {
                    error!(node = %target.id, error = %e, "no prompt for node, leaving it out of the round");
                    query.excluded.push(target.id);
                    continue;
                }
            };

            let spec = self.request_spec_for(target.id, turns, choice);
            info!(
                node = %target.id,
                model = %spec.model,
                image = ?question.image,
                "dispatching {} request",
                self.config.modality
            );
            let stream = self.client.open_stream(target.address, spec);
            tasks.push((target.id, tokio::spawn(ResponseAccumulator::drain(stream))));
            query.questions.insert(target.id, question);
        }

        for (node, task) in tasks {
            let response = match task.await {
                Ok(response) => response,
                Err(e) => {
                    error!(node = %node, error = %e, "drain task failed");
                    NodeResponse::empty(
                        node,
                        StreamOutcome::Aborted {
                            reason: e.to_string(),
                        },
                    )
                }
            };
            emit_node_responded(&response);
            query.batch.insert(response);
        }

        query
    }

    /// Decide the conversation and question for each target, in order.
    async fn plan(
        &self,
        targets: &[NodeTarget],
        conversations: &HashMap<NodeId, Vec<Turn>>,
        questions: &dyn QuestionSource,
        vision: bool,
    ) -> Vec<Result<(Vec<Turn>, Question), ArbiterError>> {
        let modality = self.config.modality.as_str();
        let desired = targets.len();

        join_all(targets.iter().map(|target| {
            plan_one(target.id, conversations, questions, modality, desired, vision)
        }))
        .await
    }

    /// Stream externally supplied conversations straight to the caller.
    ///
    /// Nodes are visited one after another in the order given; each text
    /// fragment is forwarded as `(node, text)` as soon as it arrives. Nothing
    /// is scored. The receiver closes after the last node finishes.
    pub fn organic(
        &self,
        queries: Vec<(NodeTarget, Vec<Turn>)>,
    ) -> mpsc::UnboundedReceiver<(NodeId, String)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let dispatcher = self.clone();
        tokio::spawn(async move {
            for (target, turns) in queries {
                let spec = dispatcher.request_spec(target.id, turns);
                info!(node = %target.id, prompt = %spec.prompt_preview(), "sending organic request");
                let mut stream = dispatcher.client.open_stream(target.address, spec);
                while let Some(fragment) = stream.next().await {
                    if let StreamFragment::Text(text) = fragment {
                        if tx.send((target.id, text)).is_err() {
                            return;
                        }
                    }
                }
                let report = stream.finish().await;
                if report.outcome != StreamOutcome::Completed {
                    warn!(node = %target.id, outcome = ?report.outcome, "organic stream ended early");
                }
            }
        });
        rx
    }
}

async fn plan_one(
    node: NodeId,
    conversations: &HashMap<NodeId, Vec<Turn>>,
    questions: &dyn QuestionSource,
    modality: &str,
    desired: usize,
    vision: bool,
) -> Result<(Vec<Turn>, Question), ArbiterError> {
    if let Some(turns) = conversations.get(&node) {
        let question = Question::from_turns(turns).ok_or_else(|| {
            ArbiterError::QuestionGeneration("supplied conversation is empty".to_string())
        })?;
        return Ok((turns.clone(), question));
    }
    let question = questions.next_question(modality, desired, vision).await?;
    Ok((question.to_turns(), question))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ProviderKind, Role};

    #[test]
    fn test_request_spec_uses_round_parameters() {
        let config = ValidatorConfig {
            model: "claude-3-5-sonnet-20240620".to_string(),
            provider: ProviderKind::Anthropic,
            timeout_secs: 5.0,
            ..Default::default()
        };
        let dispatcher = Dispatcher::new(Arc::new(config));
        let spec = dispatcher.request_spec(NodeId(4), vec![Turn::user("hi")]);

        assert_eq!(spec.node, NodeId(4));
        assert_eq!(spec.model, "claude-3-5-sonnet-20240620");
        assert_eq!(spec.provider, ProviderKind::Anthropic);
        assert_eq!(spec.timeout.as_secs(), 5);
        assert_eq!(spec.messages[0].role, Role::User);
    }

    #[test]
    fn test_request_spec_for_uses_drawn_model() {
        let dispatcher = Dispatcher::new(Arc::new(ValidatorConfig::default()));
        let choice = ModelChoice::new(ProviderKind::Gemini, "gemini-pro", 1.0);
        let spec = dispatcher.request_spec_for(NodeId(2), vec![Turn::user("hi")], &choice);

        assert_eq!(spec.model, "gemini-pro");
        assert_eq!(spec.provider, ProviderKind::Gemini);
        assert_eq!(spec.sampling, dispatcher.config().sampling);
    }
}
