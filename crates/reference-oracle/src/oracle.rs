//! `ReferenceOracle` over the providers' HTTP APIs.

use arbiter_core::{OracleError, OracleResult, ProviderKind, ReferenceOracle, ReferenceRequest};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::OracleConfig;
use crate::providers::{anthropic, bedrock, gemini, groq, openai, ProviderCall};

/// Longest slice of an error body kept in an error message.
const ERROR_BODY_LIMIT: usize = 512;

/// HTTP reference oracle serving every [`ProviderKind`].
#[derive(Debug, Clone)]
pub struct HttpOracle {
    config: OracleConfig,
    http: reqwest::Client,
}

impl HttpOracle {
    pub fn new(config: OracleConfig) -> OracleResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("arbiter-reference-oracle/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout())
            .build()
            .map_err(|e| OracleError::Provider {
                provider: "http".to_string(),
                detail: format!("could not build client: {e}"),
            })?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    /// The call `request` maps to, without sending it.
    pub fn prepare(&self, request: &ReferenceRequest) -> OracleResult<ProviderCall> {
        let endpoint = self.config.endpoint(request.provider());
        match request {
            ReferenceRequest::OpenAi(params) => openai::request(endpoint, params),
            ReferenceRequest::Anthropic(params) => anthropic::request(endpoint, params),
            ReferenceRequest::AnthropicBedrock(params) => bedrock::anthropic_request(endpoint, params),
            ReferenceRequest::Gemini(params) => gemini::request(endpoint, params),
            ReferenceRequest::Groq(params) => groq::request(endpoint, params),
            ReferenceRequest::Bedrock(params) => bedrock::converse_request(endpoint, params),
        }
    }

    async fn send(&self, provider: ProviderKind, call: ProviderCall) -> OracleResult<Value> {
        let provider_error = |detail: String| OracleError::Provider {
            provider: provider.to_string(),
            detail,
        };

        let mut builder = self.http.post(&call.url).json(&call.body);
        for (name, value) in &call.headers {
            builder = builder.header(*name, value);
        }

        let response = builder.send().await.map_err(|e| provider_error(e.to_string()))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| provider_error(e.to_string()))?;

        if !status.is_success() {
            let mut body = text;
            if body.len() > ERROR_BODY_LIMIT {
                let mut cut = ERROR_BODY_LIMIT;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(provider_error(format!("status {status}: {body}")));
        }

        serde_json::from_str(&text).map_err(|e| OracleError::InvalidResponse {
            provider: provider.to_string(),
            detail: format!("body is not json: {e}"),
        })
    }
}

fn parse(provider: ProviderKind, json: &Value) -> Option<String> {
    match provider {
        ProviderKind::OpenAi => openai::parse(json),
        ProviderKind::Anthropic => anthropic::parse(json),
        ProviderKind::AnthropicBedrock => bedrock::parse_anthropic(json),
        ProviderKind::Gemini => gemini::parse(json),
        ProviderKind::Groq => groq::parse(json),
        ProviderKind::Bedrock => bedrock::parse_converse(json),
    }
}

#[async_trait]
impl ReferenceOracle for HttpOracle {
    async fn generate_reference(&self, request: &ReferenceRequest) -> OracleResult<String> {
        let provider = request.provider();
        let call = self.prepare(request)?;
        debug!(provider = %provider, model = %request.model(), url = %call.url, "requesting reference answer");

        let json = self.send(provider, call).await.inspect_err(|e| {
            warn!(provider = %provider, model = %request.model(), error = %e, "reference call failed");
        })?;

        parse(provider, &json).ok_or_else(|| OracleError::InvalidResponse {
            provider: provider.to_string(),
            detail: "no answer text in response".to_string(),
        })
    }
}
