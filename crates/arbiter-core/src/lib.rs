//! Arbiter Core Library
//!
//! Queries remote responder nodes over streaming HTTP, collects their
//! answers under timeout and retry limits, and turns them into per-node
//! reward scores against a trusted reference answer.
//!
//! Data flow:
//! `Dispatcher` → (per node) `StreamingClient` + `ResponseAccumulator` →
//! `Batch` → `VerificationSampler` → `ReferenceOracle` → `ScoreAggregator` →
//! `ScoreMap`.

pub mod capabilities;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod fakes;
pub mod metrics;
pub mod obs;
pub mod question;
pub mod round;
pub mod sampler;
pub mod scoring;
pub mod similarity;
pub mod stream;
pub mod telemetry;

pub use capabilities::{
    IncentiveSink, OracleResult, QuestionSource, ReferenceOracle, SimilarityScorer, TracingSink,
};
pub use config::{ModelChoice, ValidatorConfig, DEFAULT_REQUEST_NAME, DEFAULT_VERIFY_PROBABILITY};
pub use dispatch::{Dispatcher, RoundQuery};
pub use domain::{
    ArbiterError, Batch, NodeAddress, NodeId, NodeResponse, NodeScore, NodeTarget, OracleError,
    ProviderKind, Question, ReferenceRequest, RequestSpec, Result, Role, RoundLog, SamplingParams,
    ScoreBasis, ScoreMap, StreamFragment, StreamOutcome, Turn,
};
pub use metrics::METRICS;
pub use obs::{
    emit_node_responded, emit_oracle_failed, emit_round_scored, emit_round_started,
    emit_model_selected, emit_verification_decided, round_span, RoundSpan,
};
pub use question::StaticQuestionSource;
pub use round::{RoundOutcome, RoundRunner};
pub use sampler::{ModelRotation, VerificationSampler};
pub use scoring::ScoreAggregator;
pub use similarity::LexicalOverlapScorer;
pub use stream::{
    FragmentStream, ResponseAccumulator, StreamReport, StreamingClient, TimeoutBudget,
    MAX_STREAM_ATTEMPTS,
};
pub use telemetry::init_tracing;

/// Arbiter version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
