//! Validator configuration.
//!
//! Defaults target a text validator. Scalar fields can be overridden from
//! `ARBITER_*` environment variables via [`ValidatorConfig::from_env`]; the
//! per-round model rotation is read from `ARBITER_MODEL_ROTATION` as a JSON
//! list of `{"provider", "model", "weight"}` objects.

use std::net::IpAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{ArbiterError, ProviderKind, Result, SamplingParams};

/// Wire name of the streaming prompt request.
pub const DEFAULT_REQUEST_NAME: &str = "StreamPrompting";

/// Verification is drawn roughly once every 11 rounds.
pub const DEFAULT_VERIFY_PROBABILITY: f64 = 1.0 / 11.0;

/// A provider and model a round can be run with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelChoice {
    pub provider: ProviderKind,
    pub model: String,
    /// Relative likelihood of being drawn for a round.
    #[serde(default = "default_choice_weight")]
    pub weight: f64,
}

impl ModelChoice {
    pub fn new(provider: ProviderKind, model: impl Into<String>, weight: f64) -> Self {
        Self {
            provider,
            model: model.into(),
            weight,
        }
    }
}

fn default_choice_weight() -> f64 {
    1.0
}

/// Configuration for one text validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Modality tag recorded in round logs.
    pub modality: String,
    pub model: String,
    pub provider: ProviderKind,
    /// Weighted provider/model pairs drawn once per round. Empty means every
    /// round uses `provider` and `model`.
    pub model_rotation: Vec<ModelChoice>,
    pub sampling: SamplingParams,
    /// Multiplier applied to every similarity score.
    pub weight: f64,
    /// Per-node connect/write/read budget in seconds.
    pub timeout_secs: f64,
    /// Ceiling on a whole request in seconds.
    pub total_timeout_secs: f64,
    /// Chance that a round spends oracle calls on verification.
    pub verify_probability: f64,
    pub request_name: String,
    /// This process's externally visible address; nodes on it are dialed via loopback.
    pub external_ip: Option<IpAddr>,
    /// Models that accept image attachments.
    pub vision_models: Vec<String>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            modality: "text".to_string(),
            model: "gpt-4o".to_string(),
            provider: ProviderKind::OpenAi,
            model_rotation: Vec::new(),
            sampling: SamplingParams::default(),
            weight: 1.0,
            timeout_secs: 12.0,
            total_timeout_secs: 300.0,
            verify_probability: DEFAULT_VERIFY_PROBABILITY,
            request_name: DEFAULT_REQUEST_NAME.to_string(),
            external_ip: None,
            vision_models: vec![
                "gpt-4o".to_string(),
                "claude-3-opus-20240229".to_string(),
                "anthropic.claude-3-sonnet-20240229-v1:0".to_string(),
                "claude-3-5-sonnet-20240620".to_string(),
            ],
        }
    }
}

impl ValidatorConfig {
    /// Defaults overlaid with `ARBITER_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::default().overlay(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a key lookup, then validate.
    pub fn overlay<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("ARBITER_MODALITY") {
            self.modality = v;
        }
        if let Some(v) = lookup("ARBITER_MODEL") {
            self.model = v;
        }
        if let Some(v) = lookup("ARBITER_PROVIDER") {
            self.provider = v.parse()?;
        }
        if let Some(v) = lookup("ARBITER_MODEL_ROTATION") {
            self.model_rotation = serde_json::from_str(&v).map_err(|e| {
                ArbiterError::InvalidConfig(format!("ARBITER_MODEL_ROTATION: {e}"))
            })?;
        }
        if let Some(v) = lookup("ARBITER_TEMPERATURE") {
            self.sampling.temperature = parse_var("ARBITER_TEMPERATURE", &v)?;
        }
        if let Some(v) = lookup("ARBITER_TOP_P") {
            self.sampling.top_p = parse_var("ARBITER_TOP_P", &v)?;
        }
        if let Some(v) = lookup("ARBITER_TOP_K") {
            self.sampling.top_k = parse_var("ARBITER_TOP_K", &v)?;
        }
        if let Some(v) = lookup("ARBITER_SEED") {
            self.sampling.seed = parse_var("ARBITER_SEED", &v)?;
        }
        if let Some(v) = lookup("ARBITER_MAX_TOKENS") {
            self.sampling.max_tokens = parse_var("ARBITER_MAX_TOKENS", &v)?;
        }
        if let Some(v) = lookup("ARBITER_WEIGHT") {
            self.weight = parse_var("ARBITER_WEIGHT", &v)?;
        }
        if let Some(v) = lookup("ARBITER_TIMEOUT_SECS") {
            self.timeout_secs = parse_var("ARBITER_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("ARBITER_TOTAL_TIMEOUT_SECS") {
            self.total_timeout_secs = parse_var("ARBITER_TOTAL_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("ARBITER_REQUEST_NAME") {
            self.request_name = v;
        }
        if let Some(v) = lookup("ARBITER_VERIFY_PROBABILITY") {
            self.verify_probability = parse_var("ARBITER_VERIFY_PROBABILITY", &v)?;
        }
        if let Some(v) = lookup("ARBITER_EXTERNAL_IP") {
            self.external_ip = Some(parse_var("ARBITER_EXTERNAL_IP", &v)?);
        }
        self.validate()?;
        Ok(self)
    }

    /// Reject values that would make a round meaningless.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.verify_probability) {
            return Err(ArbiterError::InvalidConfig(format!(
                "verify_probability must be within [0, 1], got {}",
                self.verify_probability
            )));
        }
        if !self.timeout_secs.is_finite() || self.timeout_secs <= 0.0 {
            return Err(ArbiterError::InvalidConfig(format!(
                "timeout_secs must be a positive number of seconds, got {}",
                self.timeout_secs
            )));
        }
        if !self.total_timeout_secs.is_finite() {
            return Err(ArbiterError::InvalidConfig(format!(
                "total_timeout_secs must be a finite number of seconds, got {}",
                self.total_timeout_secs
            )));
        }
        // Durations past this are rejected by `Duration::from_secs_f64`.
        if self.total_timeout_secs > u64::MAX as f64 {
            return Err(ArbiterError::InvalidConfig(
                "total_timeout_secs is too large".to_string(),
            ));
        }
        if self.total_timeout_secs < self.timeout_secs {
            return Err(ArbiterError::InvalidConfig(
                "total_timeout_secs must be at least timeout_secs".to_string(),
            ));
        }
        if !self.weight.is_finite() || self.weight < 0.0 {
            return Err(ArbiterError::InvalidConfig(
                "weight must be a non-negative number".to_string(),
            ));
        }
        for choice in &self.model_rotation {
            if choice.model.trim().is_empty() {
                return Err(ArbiterError::InvalidConfig(format!(
                    "model_rotation entry for {} has no model",
                    choice.provider
                )));
            }
            if !choice.weight.is_finite() || choice.weight < 0.0 {
                return Err(ArbiterError::InvalidConfig(format!(
                    "model_rotation weight for {} must be a non-negative number",
                    choice.model
                )));
            }
        }
        if !self.model_rotation.is_empty() && self.model_rotation.iter().all(|c| c.weight == 0.0) {
            return Err(ArbiterError::InvalidConfig(
                "model_rotation needs at least one positive weight".to_string(),
            ));
        }
        Ok(())
    }

    /// The pair used when no rotation is configured.
    pub fn default_choice(&self) -> ModelChoice {
        ModelChoice::new(self.provider, self.model.clone(), 1.0)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs)
    }

    pub fn total_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.total_timeout_secs)
    }

    pub fn is_vision_model(&self) -> bool {
        self.accepts_images(&self.model)
    }

    /// Whether `model` is listed in `vision_models`.
    pub fn accepts_images(&self, model: &str) -> bool {
        self.vision_models.iter().any(|m| m == model)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ArbiterError::InvalidConfig(format!("{key}: cannot parse {value:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = ValidatorConfig::default();
        config.validate().unwrap();
        assert_eq!(config.timeout(), Duration::from_secs(12));
        assert_eq!(config.total_timeout(), Duration::from_secs(300));
        assert!(config.is_vision_model());
    }

    #[test]
    fn test_overlay_applies_overrides() {
        let config = ValidatorConfig::default()
            .overlay(lookup(&[
                ("ARBITER_PROVIDER", "Groq"),
                ("ARBITER_MODEL", "llama3-70b-8192"),
                ("ARBITER_VERIFY_PROBABILITY", "1.0"),
                ("ARBITER_EXTERNAL_IP", "203.0.113.7"),
            ]))
            .unwrap();
        assert_eq!(config.provider, ProviderKind::Groq);
        assert_eq!(config.model, "llama3-70b-8192");
        assert_eq!(config.verify_probability, 1.0);
        assert_eq!(config.external_ip, Some("203.0.113.7".parse().unwrap()));
        assert!(!config.is_vision_model());
    }

    #[test]
    fn test_overlay_rejects_unknown_provider() {
        let err = ValidatorConfig::default()
            .overlay(lookup(&[("ARBITER_PROVIDER", "Cohere")]))
            .unwrap_err();
        assert!(err.to_string().contains("unsupported provider"));
    }

    #[test]
    fn test_validate_rejects_bad_probability() {
        let config = ValidatorConfig {
            verify_probability: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ArbiterError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_non_finite_timeouts_are_rejected() {
        for (key, value) in [
            ("ARBITER_TOTAL_TIMEOUT_SECS", "NaN"),
            ("ARBITER_TOTAL_TIMEOUT_SECS", "inf"),
            ("ARBITER_TIMEOUT_SECS", "inf"),
            ("ARBITER_TIMEOUT_SECS", "NaN"),
        ] {
            let result = ValidatorConfig::default().overlay(lookup(&[(key, value)]));
            assert!(
                matches!(result, Err(ArbiterError::InvalidConfig(_))),
                "{key}={value} was accepted"
            );
        }
    }

    #[test]
    fn test_oversized_total_timeout_is_rejected() {
        let config = ValidatorConfig {
            total_timeout_secs: 1e30,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overlay_reads_model_rotation() {
        let config = ValidatorConfig::default()
            .overlay(lookup(&[(
                "ARBITER_MODEL_ROTATION",
                r#"[
                    {"provider": "Anthropic", "model": "claude-3-5-sonnet-20240620", "weight": 3},
                    {"provider": "Bedrock", "model": "meta.llama3-70b-instruct-v1:0"}
                ]"#,
            )]))
            .unwrap();
        assert_eq!(config.model_rotation.len(), 2);
        assert_eq!(config.model_rotation[0].provider, ProviderKind::Anthropic);
        assert_eq!(config.model_rotation[0].weight, 3.0);
        assert_eq!(config.model_rotation[1].weight, 1.0);
    }

    #[test]
    fn test_model_rotation_rejects_bad_entries() {
        let bad_json = ValidatorConfig::default()
            .overlay(lookup(&[("ARBITER_MODEL_ROTATION", "[{\"provider\": \"Cohere\"}]")]));
        assert!(matches!(bad_json, Err(ArbiterError::InvalidConfig(_))));

        let all_zero = ValidatorConfig {
            model_rotation: vec![ModelChoice::new(ProviderKind::Groq, "llama3-70b-8192", 0.0)],
            ..Default::default()
        };
        assert!(all_zero.validate().is_err());

        let negative = ValidatorConfig {
            model_rotation: vec![ModelChoice::new(ProviderKind::Groq, "llama3-70b-8192", -1.0)],
            ..Default::default()
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ValidatorConfig =
            serde_json::from_str(r#"{"model": "gemini-pro", "provider": "Gemini"}"#).unwrap();
        assert_eq!(config.provider, ProviderKind::Gemini);
        assert_eq!(config.request_name, DEFAULT_REQUEST_NAME);
    }
}
