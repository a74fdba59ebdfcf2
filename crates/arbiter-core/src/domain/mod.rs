//! Domain model for querying and scoring nodes.
//!
//! - `RequestSpec`: immutable description of one query to one node
//! - `StreamFragment` / `NodeResponse` / `Batch`: streamed output per round
//! - `Question`: prompt issued to a node
//! - `ReferenceRequest`: provider-shaped call to a reference oracle
//! - `ScoreMap` / `RoundLog`: the round's terminal artifacts

pub mod error;
pub mod provider;
pub mod question;
pub mod request;
pub mod response;
pub mod score;

pub use error::{ArbiterError, OracleError, Result};
pub use provider::{
    AnthropicParams, OpenAiParams, PromptParams, ProviderKind, ReferenceRequest, SeededChatParams,
};
pub use question::Question;
pub use request::{NodeAddress, NodeId, NodeTarget, RequestSpec, Role, SamplingParams, Turn};
pub use response::{Batch, NodeResponse, StreamFragment, StreamOutcome};
pub use score::{NodeScore, RoundLog, ScoreBasis, ScoreMap};
