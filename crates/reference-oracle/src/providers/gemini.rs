//! Gemini `generateContent`.

use arbiter_core::domain::PromptParams;
use arbiter_core::{OracleError, ProviderKind};
use serde_json::{json, Value};

use super::{api_key, join_text_blocks, ProviderCall};
use crate::config::Endpoint;

pub fn request(endpoint: &Endpoint, params: &PromptParams) -> Result<ProviderCall, OracleError> {
    let key = api_key(endpoint, ProviderKind::Gemini)?;
    Ok(ProviderCall {
        url: format!(
            "{}/v1beta/models/{}:generateContent",
            endpoint.base(),
            params.model
        ),
        headers: vec![("x-goog-api-key", key.to_string())],
        body: json!({
            "contents": [{"role": "user", "parts": [{"text": params.prompt}]}],
            "generationConfig": {
                "temperature": params.temperature,
                "topP": params.top_p,
                "topK": params.top_k,
                "maxOutputTokens": params.max_tokens,
            },
        }),
    })
}

/// Parts of the first candidate, concatenated.
pub fn parse(json: &Value) -> Option<String> {
    join_text_blocks(json.pointer("/candidates/0/content/parts"))
}
