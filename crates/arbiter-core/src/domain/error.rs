//! Error taxonomy for querying and scoring nodes.

use super::request::NodeId;

/// Errors produced by reference-oracle backends.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OracleError {
    #[error("provider {provider} call failed: {detail}")]
    Provider { provider: String, detail: String },

    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error("missing credentials for provider {provider}")]
    MissingCredentials { provider: String },

    #[error("provider {provider} returned an unusable response: {detail}")]
    InvalidResponse { provider: String, detail: String },
}

/// Errors produced while querying nodes and assembling a round.
#[derive(Debug, thiserror::Error)]
pub enum ArbiterError {
    #[error("connection to node {node} failed: {detail}")]
    Connection { node: NodeId, detail: String },

    #[error("node {node} timed out after {elapsed_ms}ms")]
    Timeout { node: NodeId, elapsed_ms: u64 },

    #[error("stream from node {node} could not be decoded: {detail}")]
    StreamDecode { node: NodeId, detail: String },

    #[error("question generation failed: {0}")]
    QuestionGeneration(String),

    #[error("oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArbiterError {
    /// Only a timeout while draining fragments earns another attempt.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ArbiterError::Timeout { .. })
    }
}

/// Result type for arbiter operations.
pub type Result<T> = std::result::Result<T, ArbiterError>;
