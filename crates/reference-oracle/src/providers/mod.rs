//! One request builder and one response parser per backend.
//!
//! Builders turn a variant's parameter struct into a [`ProviderCall`];
//! parsers pull the answer text out of the backend's JSON reply. Neither
//! touches the network.

pub mod anthropic;
pub mod bedrock;
pub mod gemini;
pub mod groq;
pub mod openai;

use arbiter_core::{OracleError, ProviderKind, Role};
use serde_json::Value;

use crate::config::Endpoint;

/// A fully prepared HTTP POST to a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderCall {
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Value,
}

pub(crate) fn role_name(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

/// The configured key for `provider`, or `MissingCredentials`.
pub(crate) fn api_key(endpoint: &Endpoint, provider: ProviderKind) -> Result<&str, OracleError> {
    endpoint
        .api_key
        .as_deref()
        .ok_or_else(|| OracleError::MissingCredentials {
            provider: provider.to_string(),
        })
}

/// Concatenate the `text` members of a JSON array of content blocks.
pub(crate) fn join_text_blocks(blocks: Option<&Value>) -> Option<String> {
    let blocks = blocks?.as_array()?;
    Some(
        blocks
            .iter()
            .filter_map(|block| block.get("text").and_then(Value::as_str))
            .collect(),
    )
}

/// Text at an OpenAI-style `choices[0].message.content`.
pub(crate) fn first_choice(json: &Value) -> Option<String> {
    json.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
}
