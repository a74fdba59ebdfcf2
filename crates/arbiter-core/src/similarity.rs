//! Default lexical similarity scorer.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::capabilities::SimilarityScorer;

/// Token-level F1 overlap between reference and candidate, in `[0, 1]`.
///
/// Tokens are lowercased alphanumeric runs; repeated tokens count as many
/// times as they appear in both texts.
#[derive(Debug, Default, Clone, Copy)]
pub struct LexicalOverlapScorer;

impl LexicalOverlapScorer {
    pub fn overlap(reference: &str, candidate: &str) -> f64 {
        let reference = tokens(reference);
        let candidate = tokens(candidate);
        if reference.is_empty() || candidate.is_empty() {
            return if reference.is_empty() && candidate.is_empty() { 1.0 } else { 0.0 };
        }

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for token in &reference {
            *counts.entry(token.as_str()).or_default() += 1;
        }
        let mut common = 0usize;
        for token in &candidate {
            if let Some(n) = counts.get_mut(token.as_str()) {
                if *n > 0 {
                    *n -= 1;
                    common += 1;
                }
            }
        }
        if common == 0 {
            return 0.0;
        }

        let precision = common as f64 / candidate.len() as f64;
        let recall = common as f64 / reference.len() as f64;
        2.0 * precision * recall / (precision + recall)
    }
}

fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl SimilarityScorer for LexicalOverlapScorer {
    async fn score(&self, reference: &str, candidate: &str) -> f64 {
        Self::overlap(reference, candidate)
    }
}
