//! Groq's OpenAI-compatible chat endpoint. Text only.

use arbiter_core::domain::SeededChatParams;
use arbiter_core::{OracleError, ProviderKind};
use serde_json::{json, Value};

use super::{api_key, first_choice, role_name, ProviderCall};
use crate::config::Endpoint;

pub fn request(endpoint: &Endpoint, params: &SeededChatParams) -> Result<ProviderCall, OracleError> {
    let key = api_key(endpoint, ProviderKind::Groq)?;
    let messages: Vec<Value> = params
        .messages
        .iter()
        .map(|turn| json!({"role": role_name(turn.role), "content": turn.content}))
        .collect();

    Ok(ProviderCall {
        url: format!("{}/openai/v1/chat/completions", endpoint.base()),
        headers: vec![("authorization", format!("Bearer {key}"))],
        body: json!({
            "model": params.model,
            "messages": messages,
            "temperature": params.temperature,
            "top_p": params.top_p,
            "seed": params.seed,
            "max_tokens": params.max_tokens,
            "stream": false,
        }),
    })
}

pub fn parse(json: &Value) -> Option<String> {
    first_choice(json)
}
