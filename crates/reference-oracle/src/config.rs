//! Provider credentials and endpoints.

use std::time::Duration;

use arbiter_core::ProviderKind;
use serde::{Deserialize, Serialize};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const GROQ_BASE_URL: &str = "https://api.groq.com";
pub const DEFAULT_AWS_REGION: &str = "us-east-1";

/// Errors reading oracle configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    InvalidVar { var: &'static str, value: String },
}

/// Where a provider lives and how to authenticate with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    pub base_url: String,
    /// API key or bearer token; requests fail with `MissingCredentials`
    /// while this is unset.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Endpoint {
    fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
        }
    }

    /// Base URL without a trailing slash.
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

/// Oracle configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleConfig {
    pub openai: Endpoint,
    pub anthropic: Endpoint,
    pub gemini: Endpoint,
    pub groq: Endpoint,
    /// Bedrock runtime, shared by Converse and Anthropic-on-Bedrock.
    pub bedrock: Endpoint,
    pub aws_region: String,
    /// Ceiling on a single provider call.
    pub timeout_secs: f64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        OracleConfig {
            openai: Endpoint::new(OPENAI_BASE_URL),
            anthropic: Endpoint::new(ANTHROPIC_BASE_URL),
            gemini: Endpoint::new(GEMINI_BASE_URL),
            groq: Endpoint::new(GROQ_BASE_URL),
            bedrock: Endpoint::new(bedrock_url(DEFAULT_AWS_REGION)),
            aws_region: DEFAULT_AWS_REGION.to_string(),
            timeout_secs: 60.0,
        }
    }
}

fn bedrock_url(region: &str) -> String {
    format!("https://bedrock-runtime.{region}.amazonaws.com")
}

impl OracleConfig {
    /// Defaults overlaid with the process environment.
    ///
    /// Keys: `OPENAI_API_KEY`, `ANTHROPIC_API_KEY`, `GEMINI_API_KEY`,
    /// `GROQ_API_KEY`, `AWS_BEARER_TOKEN_BEDROCK`, `AWS_REGION`.
    /// Base URLs: `ARBITER_{OPENAI,ANTHROPIC,GEMINI,GROQ,BEDROCK}_BASE_URL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().overlay(|key| std::env::var(key).ok())
    }

    /// Apply every variable `lookup` knows about.
    pub fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let keys = [
            ("OPENAI_API_KEY", &mut self.openai),
            ("ANTHROPIC_API_KEY", &mut self.anthropic),
            ("GEMINI_API_KEY", &mut self.gemini),
            ("GROQ_API_KEY", &mut self.groq),
            ("AWS_BEARER_TOKEN_BEDROCK", &mut self.bedrock),
        ];
        for (var, endpoint) in keys {
            if let Some(key) = lookup(var).filter(|k| !k.is_empty()) {
                endpoint.api_key = Some(key);
            }
        }

        if let Some(region) = lookup("AWS_REGION").filter(|r| !r.is_empty()) {
            self.bedrock.base_url = bedrock_url(&region);
            self.aws_region = region;
        }

        let urls = [
            ("ARBITER_OPENAI_BASE_URL", &mut self.openai),
            ("ARBITER_ANTHROPIC_BASE_URL", &mut self.anthropic),
            ("ARBITER_GEMINI_BASE_URL", &mut self.gemini),
            ("ARBITER_GROQ_BASE_URL", &mut self.groq),
            ("ARBITER_BEDROCK_BASE_URL", &mut self.bedrock),
        ];
        for (var, endpoint) in urls {
            if let Some(url) = lookup(var).filter(|u| !u.is_empty()) {
                endpoint.base_url = url;
            }
        }

        if let Some(v) = lookup("ARBITER_ORACLE_TIMEOUT_SECS") {
            self.timeout_secs = match v.parse::<f64>() {
                Ok(secs) if secs > 0.0 => secs,
                _ => {
                    return Err(ConfigError::InvalidVar {
                        var: "ARBITER_ORACLE_TIMEOUT_SECS",
                        value: v,
                    })
                }
            };
        }

        Ok(self)
    }

    /// Set the API key for `provider`.
    pub fn with_key(mut self, provider: ProviderKind, key: impl Into<String>) -> Self {
        self.endpoint_mut(provider).api_key = Some(key.into());
        self
    }

    /// Point `provider` at a different host, e.g. a proxy or a test server.
    pub fn with_base_url(mut self, provider: ProviderKind, url: impl Into<String>) -> Self {
        self.endpoint_mut(provider).base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs_f64();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs)
    }

    pub fn endpoint(&self, provider: ProviderKind) -> &Endpoint {
        match provider {
            ProviderKind::OpenAi => &self.openai,
            ProviderKind::Anthropic => &self.anthropic,
            ProviderKind::Gemini => &self.gemini,
            ProviderKind::Groq => &self.groq,
            ProviderKind::Bedrock | ProviderKind::AnthropicBedrock => &self.bedrock,
        }
    }

    fn endpoint_mut(&mut self, provider: ProviderKind) -> &mut Endpoint {
        match provider {
            ProviderKind::OpenAi => &mut self.openai,
            ProviderKind::Anthropic => &mut self.anthropic,
            ProviderKind::Gemini => &mut self.gemini,
            ProviderKind::Groq => &mut self.groq,
            ProviderKind::Bedrock | ProviderKind::AnthropicBedrock => &mut self.bedrock,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_have_no_credentials() {
        let config = OracleConfig::default();
        assert!(config.openai.api_key.is_none());
        assert_eq!(config.bedrock.base(), "https://bedrock-runtime.us-east-1.amazonaws.com");
        assert_eq!(config.timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_overlay_reads_keys_and_region() {
        let config = OracleConfig::default()
            .overlay(lookup(&[
                ("OPENAI_API_KEY", "sk-test"),
                ("GROQ_API_KEY", ""),
                ("AWS_BEARER_TOKEN_BEDROCK", "bedrock-token"),
                ("AWS_REGION", "eu-west-1"),
            ]))
            .unwrap();

        assert_eq!(config.openai.api_key.as_deref(), Some("sk-test"));
        assert!(config.groq.api_key.is_none());
        assert_eq!(
            config.endpoint(ProviderKind::AnthropicBedrock).api_key.as_deref(),
            Some("bedrock-token")
        );
        assert_eq!(config.aws_region, "eu-west-1");
        assert_eq!(config.bedrock.base(), "https://bedrock-runtime.eu-west-1.amazonaws.com");
    }

    #[test]
    fn test_base_url_override_wins_over_region() {
        let config = OracleConfig::default()
            .overlay(lookup(&[
                ("AWS_REGION", "eu-west-1"),
                ("ARBITER_BEDROCK_BASE_URL", "http://127.0.0.1:9000/"),
            ]))
            .unwrap();
        assert_eq!(config.bedrock.base(), "http://127.0.0.1:9000");
    }

    #[test]
    fn test_bad_timeout_is_rejected() {
        let err = OracleConfig::default()
            .overlay(lookup(&[("ARBITER_ORACLE_TIMEOUT_SECS", "-1")]))
            .unwrap_err();
        assert!(err.to_string().contains("ARBITER_ORACLE_TIMEOUT_SECS"));
    }

    #[test]
    fn test_api_keys_are_not_serialized() {
        let config = OracleConfig::default().with_key(ProviderKind::Anthropic, "secret");
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
