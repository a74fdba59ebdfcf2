//! Structured observability hooks for scoring rounds.
//!
//! - `RoundSpan`: RAII guard entering a round-scoped span
//! - `emit_*`: one function per lifecycle event of a round
//!
//! Events are emitted at `info!` level unless noted; filter with `RUST_LOG`.

use tracing::info;
use uuid::Uuid;

use crate::domain::{NodeId, NodeResponse, ProviderKind};

/// RAII guard that enters a round-scoped tracing span.
///
/// Only hold it across synchronous sections; async code should use
/// [`round_span`] with `Instrument` instead.
pub struct RoundSpan {
    _span: tracing::span::EnteredSpan,
}

impl RoundSpan {
    pub fn enter(round_id: &Uuid) -> Self {
        Self {
            _span: round_span(round_id).entered(),
        }
    }
}

/// Span tagged with the round id.
pub fn round_span(round_id: &Uuid) -> tracing::Span {
    tracing::info_span!("arbiter.round", round_id = %round_id)
}

pub fn emit_round_started(round_id: &Uuid, node_count: usize, model: &str) {
    info!(event = "round.started", round_id = %round_id, nodes = node_count, model = %model);
}

/// Provider and model drawn for the round, before any node is queried.
pub fn emit_model_selected(provider: ProviderKind, model: &str) {
    info!(event = "round.model_selected", provider = %provider, model = %model);
}

/// A node's stream was drained.
pub fn emit_node_responded(response: &NodeResponse) {
    info!(
        event = "node.responded",
        node = %response.node,
        chars = response.text.len(),
        attempts = response.attempts,
        elapsed_ms = response.elapsed.map(|d| d.as_millis() as u64),
        outcome = ?response.outcome,
    );
}

pub fn emit_verification_decided(draw: f64, probability: f64, verify: bool) {
    info!(
        event = "round.verification_decided",
        draw = draw,
        probability = probability,
        verify = verify,
    );
}

/// Oracle call failed for a node (warning level).
pub fn emit_oracle_failed(node: NodeId, provider: ProviderKind, model: &str, error: &dyn std::fmt::Display) {
    tracing::warn!(
        event = "oracle.failed",
        node = %node,
        provider = %provider,
        model = %model,
        error = %error,
    );
}

pub fn emit_round_scored(round_id: &Uuid, scored: usize, verified: usize, average: f64) {
    info!(
        event = "round.scored",
        round_id = %round_id,
        scored = scored,
        verified = verified,
        average = average,
    );
}
