//! In-memory fakes for the external capabilities (testing only)
//!
//! Provides `FixedOracle`, `FailingOracle`, `TableScorer`,
//! `FailingQuestionSource` and `MemorySink` that satisfy the trait contracts
//! without any network access.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::capabilities::{
    IncentiveSink, OracleResult, QuestionSource, ReferenceOracle, SimilarityScorer,
};
use crate::domain::{
    ArbiterError, OracleError, ProviderKind, Question, ReferenceRequest, Result, RoundLog,
    ScoreMap,
};

// ---------------------------------------------------------------------------
// Oracles
// ---------------------------------------------------------------------------

/// Answers every request with the same text, optionally only for some
/// providers.
#[derive(Debug)]
pub struct FixedOracle {
    answer: String,
    providers: Option<HashSet<ProviderKind>>,
    calls: AtomicUsize,
}

impl FixedOracle {
    pub fn new(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            providers: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Restrict the providers this oracle serves.
    pub fn serving(mut self, providers: impl IntoIterator<Item = ProviderKind>) -> Self {
        self.providers = Some(providers.into_iter().collect());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReferenceOracle for FixedOracle {
    async fn generate_reference(&self, request: &ReferenceRequest) -> OracleResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.providers {
            Some(served) if !served.contains(&request.provider()) => Err(
                OracleError::UnsupportedProvider(request.provider().to_string()),
            ),
            _ => Ok(self.answer.clone()),
        }
    }
}

/// Answers by prompt; prompts it does not know fail with a provider error.
#[derive(Debug, Default)]
pub struct PromptOracle {
    answers: HashMap<String, String>,
}

impl PromptOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(mut self, prompt: impl Into<String>, answer: impl Into<String>) -> Self {
        self.answers.insert(prompt.into(), answer.into());
        self
    }
}

fn prompt_of(request: &ReferenceRequest) -> Option<&str> {
    match request {
        ReferenceRequest::OpenAi(p) => p.messages.first().map(|t| t.content.as_str()),
        ReferenceRequest::Anthropic(p) => p.messages.first().map(|t| t.content.as_str()),
        ReferenceRequest::AnthropicBedrock(p) | ReferenceRequest::Gemini(p) => Some(&p.prompt),
        ReferenceRequest::Groq(p) | ReferenceRequest::Bedrock(p) => {
            p.messages.first().map(|t| t.content.as_str())
        }
    }
}

#[async_trait]
impl ReferenceOracle for PromptOracle {
    async fn generate_reference(&self, request: &ReferenceRequest) -> OracleResult<String> {
        prompt_of(request)
            .and_then(|prompt| self.answers.get(prompt))
            .cloned()
            .ok_or_else(|| OracleError::Provider {
                provider: request.provider().to_string(),
                detail: "no scripted answer".to_string(),
            })
    }
}

/// Fails every request.
#[derive(Debug, Default)]
pub struct FailingOracle;

#[async_trait]
impl ReferenceOracle for FailingOracle {
    async fn generate_reference(&self, request: &ReferenceRequest) -> OracleResult<String> {
        Err(OracleError::Provider {
            provider: request.provider().to_string(),
            detail: "intentional failure".to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Scorer
// ---------------------------------------------------------------------------

/// Looks up the score of each candidate text; unknown candidates score 0.
#[derive(Debug, Default)]
pub struct TableScorer {
    table: HashMap<String, f64>,
}

impl TableScorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, candidate: impl Into<String>, score: f64) -> Self {
        self.table.insert(candidate.into(), score);
        self
    }
}

#[async_trait]
impl SimilarityScorer for TableScorer {
    async fn score(&self, _reference: &str, candidate: &str) -> f64 {
        self.table.get(candidate).copied().unwrap_or(0.0)
    }
}

// ---------------------------------------------------------------------------
// Question source
// ---------------------------------------------------------------------------

/// Serves a fixed prompt but fails on the listed call indices (0-based).
#[derive(Debug)]
pub struct FailingQuestionSource {
    prompt: String,
    fail_on: HashSet<usize>,
    calls: AtomicUsize,
}

impl FailingQuestionSource {
    pub fn new(prompt: impl Into<String>, fail_on: impl IntoIterator<Item = usize>) -> Self {
        Self {
            prompt: prompt.into(),
            fail_on: fail_on.into_iter().collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl QuestionSource for FailingQuestionSource {
    async fn next_question(&self, _modality: &str, _desired_count: usize, _vision: bool) -> Result<Question> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on.contains(&call) {
            return Err(ArbiterError::QuestionGeneration(format!(
                "intentional failure on call {call}"
            )));
        }
        Ok(Question::new(self.prompt.clone(), None))
    }
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

/// Records every submitted round.
#[derive(Debug, Default)]
pub struct MemorySink {
    rounds: Mutex<Vec<(ScoreMap, RoundLog)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rounds(&self) -> Vec<(ScoreMap, RoundLog)> {
        self.rounds.lock().unwrap().clone()
    }
}

#[async_trait]
impl IncentiveSink for MemorySink {
    async fn submit(&self, scores: &ScoreMap, log: &RoundLog) -> anyhow::Result<()> {
        self.rounds
            .lock()
            .unwrap()
            .push((scores.clone(), log.clone()));
        Ok(())
    }
}
