//! Per-round random draws: the oracle verification gate and the
//! provider/model rotation.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::config::{ModelChoice, ValidatorConfig, DEFAULT_VERIFY_PROBABILITY};
use crate::domain::{ArbiterError, Result};
use crate::obs::{emit_model_selected, emit_verification_decided};

/// Decides once per round whether responses are verified against the oracle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerificationSampler {
    probability: f64,
}

impl Default for VerificationSampler {
    fn default() -> Self {
        Self {
            probability: DEFAULT_VERIFY_PROBABILITY,
        }
    }
}

impl VerificationSampler {
    pub fn new(probability: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(ArbiterError::InvalidConfig(format!(
                "verification probability {probability} outside [0, 1]"
            )));
        }
        Ok(Self { probability })
    }

    pub fn always() -> Self {
        Self { probability: 1.0 }
    }

    pub fn never() -> Self {
        Self { probability: 0.0 }
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// One uniform draw in `[0, 1)` against the configured probability.
    pub fn decide_with<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        let draw: f64 = rng.gen();
        let verify = draw < self.probability;
        emit_verification_decided(draw, self.probability, verify);
        verify
    }

    pub fn decide(&self) -> bool {
        self.decide_with(&mut rand::thread_rng())
    }
}

/// Weighted draw of the provider and model a round runs with.
#[derive(Debug, Clone)]
pub struct ModelRotation {
    choices: Vec<ModelChoice>,
    index: Option<WeightedIndex<f64>>,
}

impl ModelRotation {
    /// Rotation over `choices`; weights must be finite, non-negative and not
    /// all zero.
    pub fn new(choices: Vec<ModelChoice>) -> Result<Self> {
        if choices.is_empty() {
            return Err(ArbiterError::InvalidConfig(
                "model rotation has no choices".to_string(),
            ));
        }
        let index = if choices.len() == 1 {
            None
        } else {
            let weights = choices.iter().map(|c| c.weight);
            Some(WeightedIndex::new(weights).map_err(|e| {
                ArbiterError::InvalidConfig(format!("model rotation weights: {e}"))
            })?)
        };
        Ok(Self { choices, index })
    }

    /// A rotation that always yields `choice`.
    pub fn fixed(choice: ModelChoice) -> Self {
        Self {
            choices: vec![choice],
            index: None,
        }
    }

    /// The configured rotation, or the config's single provider and model.
    pub fn from_config(config: &ValidatorConfig) -> Result<Self> {
        if config.model_rotation.is_empty() {
            Ok(Self::fixed(config.default_choice()))
        } else {
            Self::new(config.model_rotation.clone())
        }
    }

    pub fn choices(&self) -> &[ModelChoice] {
        &self.choices
    }

    pub fn pick_with<R: Rng + ?Sized>(&self, rng: &mut R) -> &ModelChoice {
        let choice = match &self.index {
            Some(index) => &self.choices[index.sample(rng)],
            None => &self.choices[0],
        };
        emit_model_selected(choice.provider, &choice.model);
        choice
    }

    pub fn pick(&self) -> &ModelChoice {
        self.pick_with(&mut rand::thread_rng())
    }
}
