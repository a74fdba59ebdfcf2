//! OpenAI chat completions.

use arbiter_core::domain::OpenAiParams;
use arbiter_core::{OracleError, ProviderKind, Turn};
use serde_json::{json, Value};

use super::{api_key, first_choice, role_name, ProviderCall};
use crate::config::Endpoint;

/// Chat message, with an `image_url` part when the turn carries an image.
pub(crate) fn message(turn: &Turn) -> Value {
    let content = match &turn.image {
        Some(url) => json!([
            {"type": "text", "text": turn.content},
            {"type": "image_url", "image_url": {"url": url}},
        ]),
        None => json!(turn.content),
    };
    json!({"role": role_name(turn.role), "content": content})
}

pub fn request(endpoint: &Endpoint, params: &OpenAiParams) -> Result<ProviderCall, OracleError> {
    let key = api_key(endpoint, ProviderKind::OpenAi)?;
    Ok(ProviderCall {
        url: format!("{}/v1/chat/completions", endpoint.base()),
        headers: vec![("authorization", format!("Bearer {key}"))],
        body: json!({
            "model": params.model,
            "messages": params.messages.iter().map(message).collect::<Vec<_>>(),
            "temperature": params.temperature,
            "seed": params.seed,
            "max_tokens": params.max_tokens,
        }),
    })
}

pub fn parse(json: &Value) -> Option<String> {
    first_choice(json)
}
