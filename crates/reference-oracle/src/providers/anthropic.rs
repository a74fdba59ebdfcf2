//! Anthropic messages API.

use arbiter_core::domain::AnthropicParams;
use arbiter_core::{OracleError, ProviderKind, Role, Turn};
use serde_json::{json, Map, Value};

use super::{api_key, join_text_blocks, role_name, ProviderCall};
use crate::config::Endpoint;

pub const API_VERSION: &str = "2023-06-01";

fn message(turn: &Turn) -> Value {
    let content = match &turn.image {
        Some(url) => json!([
            {"type": "image", "source": {"type": "url", "url": url}},
            {"type": "text", "text": turn.content},
        ]),
        None => json!(turn.content),
    };
    json!({"role": role_name(turn.role), "content": content})
}

/// Messages body shared with the Bedrock-hosted Anthropic models.
///
/// System turns move to the top-level `system` field; the API rejects them
/// inside `messages`.
pub(crate) fn messages_body(turns: &[Turn], max_tokens: u32, temperature: f32, top_p: f32, top_k: u32) -> Map<String, Value> {
    let system: Vec<&str> = turns
        .iter()
        .filter(|t| t.role == Role::System)
        .map(|t| t.content.as_str())
        .collect();
    let messages: Vec<Value> = turns
        .iter()
        .filter(|t| t.role != Role::System)
        .map(message)
        .collect();

    let mut body = Map::new();
    body.insert("max_tokens".into(), json!(max_tokens));
    body.insert("temperature".into(), json!(temperature));
    body.insert("top_p".into(), json!(top_p));
    body.insert("top_k".into(), json!(top_k));
    body.insert("messages".into(), Value::Array(messages));
    if !system.is_empty() {
        body.insert("system".into(), json!(system.join("\n")));
    }
    body
}

pub fn request(endpoint: &Endpoint, params: &AnthropicParams) -> Result<ProviderCall, OracleError> {
    let key = api_key(endpoint, ProviderKind::Anthropic)?;
    let mut body = messages_body(
        &params.messages,
        params.max_tokens,
        params.temperature,
        params.top_p,
        params.top_k,
    );
    body.insert("model".into(), json!(params.model));

    Ok(ProviderCall {
        url: format!("{}/v1/messages", endpoint.base()),
        headers: vec![
            ("x-api-key", key.to_string()),
            ("anthropic-version", API_VERSION.to_string()),
        ],
        body: Value::Object(body),
    })
}

/// Text blocks of `content`, concatenated.
pub fn parse(json: &Value) -> Option<String> {
    join_text_blocks(json.get("content"))
}
