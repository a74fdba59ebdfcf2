//! Amazon Bedrock runtime: the Converse API and Anthropic models via
//! `invoke`.
//!
//! Both authenticate with a Bedrock API key sent as a bearer token.

use arbiter_core::domain::{PromptParams, SeededChatParams};
use arbiter_core::{OracleError, ProviderKind, Role, Turn};
use serde_json::{json, Value};
use tracing::warn;

use super::anthropic::messages_body;
use super::{api_key, join_text_blocks, role_name, ProviderCall};
use crate::config::Endpoint;

pub const ANTHROPIC_BEDROCK_VERSION: &str = "bedrock-2023-05-31";

/// Converse request. Image references are dropped: Converse only accepts
/// inline image bytes.
pub fn converse_request(endpoint: &Endpoint, params: &SeededChatParams) -> Result<ProviderCall, OracleError> {
    let key = api_key(endpoint, ProviderKind::Bedrock)?;

    let system: Vec<Value> = params
        .messages
        .iter()
        .filter(|t| t.role == Role::System)
        .map(|t| json!({"text": t.content}))
        .collect();
    let messages: Vec<Value> = params
        .messages
        .iter()
        .filter(|t| t.role != Role::System)
        .map(converse_message)
        .collect();

    let mut body = json!({
        "messages": messages,
        "inferenceConfig": {
            "maxTokens": params.max_tokens,
            "temperature": params.temperature,
            "topP": params.top_p,
        },
    });
    if !system.is_empty() {
        body["system"] = Value::Array(system);
    }

    Ok(ProviderCall {
        url: format!("{}/model/{}/converse", endpoint.base(), params.model),
        headers: vec![("authorization", format!("Bearer {key}"))],
        body,
    })
}

fn converse_message(turn: &Turn) -> Value {
    if turn.image.is_some() {
        warn!(role = role_name(turn.role), "bedrock converse takes inline images only, dropping image reference");
    }
    json!({"role": role_name(turn.role), "content": [{"text": turn.content}]})
}

/// `output.message.content` text blocks, concatenated.
pub fn parse_converse(json: &Value) -> Option<String> {
    join_text_blocks(json.pointer("/output/message/content"))
}

/// Anthropic messages body posted to `invoke` for a Bedrock-hosted model.
pub fn anthropic_request(endpoint: &Endpoint, params: &PromptParams) -> Result<ProviderCall, OracleError> {
    let key = api_key(endpoint, ProviderKind::AnthropicBedrock)?;
    let mut body = messages_body(
        &[Turn::user(params.prompt.clone())],
        params.max_tokens,
        params.temperature,
        params.top_p,
        params.top_k,
    );
    body.insert("anthropic_version".into(), json!(ANTHROPIC_BEDROCK_VERSION));

    Ok(ProviderCall {
        url: format!("{}/model/{}/invoke", endpoint.base(), params.model),
        headers: vec![("authorization", format!("Bearer {key}"))],
        body: Value::Object(body),
    })
}

pub fn parse_anthropic(json: &Value) -> Option<String> {
    super::anthropic::parse(json)
}
