//! Reference-oracle backends as a closed set of variants.
//!
//! Each backend takes a different subset of the sampling parameters, so each
//! [`ReferenceRequest`] variant carries its own parameter struct. Adding a
//! backend means adding a [`ProviderKind`], a params struct, a variant, and a
//! handler in the oracle implementation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::OracleError;
use super::question::Question;
use super::request::{SamplingParams, Turn};

/// Backend capable of producing a reference answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    #[serde(rename = "OpenAI")]
    OpenAi,
    Anthropic,
    AnthropicBedrock,
    Gemini,
    Groq,
    Bedrock,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 6] = [
        ProviderKind::OpenAi,
        ProviderKind::Anthropic,
        ProviderKind::AnthropicBedrock,
        ProviderKind::Gemini,
        ProviderKind::Groq,
        ProviderKind::Bedrock,
    ];

    /// Canonical tag used in configuration and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OpenAI",
            ProviderKind::Anthropic => "Anthropic",
            ProviderKind::AnthropicBedrock => "AnthropicBedrock",
            ProviderKind::Gemini => "Gemini",
            ProviderKind::Groq => "Groq",
            ProviderKind::Bedrock => "Bedrock",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = OracleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| {
                tracing::error!(provider = %s, "provider not found");
                OracleError::UnsupportedProvider(s.to_string())
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenAiParams {
    pub messages: Vec<Turn>,
    pub temperature: f32,
    pub model: String,
    pub seed: u64,
    pub max_tokens: u32,
}

/// Shared by Anthropic direct and Anthropic-on-Bedrock.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnthropicParams {
    pub messages: Vec<Turn>,
    pub temperature: f32,
    pub model: String,
    pub max_tokens: u32,
    pub top_p: f32,
    pub top_k: u32,
}

/// Prompt-only backends that accept top-k.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptParams {
    pub prompt: String,
    pub temperature: f32,
    pub model: String,
    pub max_tokens: u32,
    pub top_p: f32,
    pub top_k: u32,
}

/// Chat backends that take a seed instead of top-k.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeededChatParams {
    pub messages: Vec<Turn>,
    pub temperature: f32,
    pub model: String,
    pub max_tokens: u32,
    pub top_p: f32,
    pub seed: u64,
}

/// One call to a reference backend, shaped for that backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "provider", content = "params")]
pub enum ReferenceRequest {
    #[serde(rename = "OpenAI")]
    OpenAi(OpenAiParams),
    Anthropic(AnthropicParams),
    AnthropicBedrock(PromptParams),
    Gemini(PromptParams),
    Groq(SeededChatParams),
    Bedrock(SeededChatParams),
}

impl ReferenceRequest {
    /// Map a node's question onto the call shape of `provider`.
    pub fn for_question(
        provider: ProviderKind,
        question: &Question,
        model: &str,
        sampling: &SamplingParams,
    ) -> Self {
        let with_image = || vec![Turn::user(question.prompt.clone()).with_image(question.image.clone())];
        let model = model.to_string();

        match provider {
            ProviderKind::OpenAi => ReferenceRequest::OpenAi(OpenAiParams {
                messages: with_image(),
                temperature: sampling.temperature,
                model,
                seed: sampling.seed,
                max_tokens: sampling.max_tokens,
            }),
            ProviderKind::Anthropic => ReferenceRequest::Anthropic(AnthropicParams {
                messages: with_image(),
                temperature: sampling.temperature,
                model,
                max_tokens: sampling.max_tokens,
                top_p: sampling.top_p,
                top_k: sampling.top_k,
            }),
            ProviderKind::AnthropicBedrock | ProviderKind::Gemini => {
                let params = PromptParams {
                    prompt: question.prompt.clone(),
                    temperature: sampling.temperature,
                    model,
                    max_tokens: sampling.max_tokens,
                    top_p: sampling.top_p,
                    top_k: sampling.top_k,
                };
                if provider == ProviderKind::Gemini {
                    ReferenceRequest::Gemini(params)
                } else {
                    ReferenceRequest::AnthropicBedrock(params)
                }
            }
            ProviderKind::Groq => ReferenceRequest::Groq(SeededChatParams {
                // Groq chat models take text only.
                messages: vec![Turn::user(question.prompt.clone())],
                temperature: sampling.temperature,
                model,
                max_tokens: sampling.max_tokens,
                top_p: sampling.top_p,
                seed: sampling.seed,
            }),
            ProviderKind::Bedrock => ReferenceRequest::Bedrock(SeededChatParams {
                messages: with_image(),
                temperature: sampling.temperature,
                model,
                max_tokens: sampling.max_tokens,
                top_p: sampling.top_p,
                seed: sampling.seed,
            }),
        }
    }

    pub fn provider(&self) -> ProviderKind {
        match self {
            ReferenceRequest::OpenAi(_) => ProviderKind::OpenAi,
            ReferenceRequest::Anthropic(_) => ProviderKind::Anthropic,
            ReferenceRequest::AnthropicBedrock(_) => ProviderKind::AnthropicBedrock,
            ReferenceRequest::Gemini(_) => ProviderKind::Gemini,
            ReferenceRequest::Groq(_) => ProviderKind::Groq,
            ReferenceRequest::Bedrock(_) => ProviderKind::Bedrock,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            ReferenceRequest::OpenAi(p) => &p.model,
            ReferenceRequest::Anthropic(p) => &p.model,
            ReferenceRequest::AnthropicBedrock(p) | ReferenceRequest::Gemini(p) => &p.model,
            ReferenceRequest::Groq(p) | ReferenceRequest::Bedrock(p) => &p.model,
        }
    }
}
