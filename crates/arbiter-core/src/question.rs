//! Question source backed by a fixed prompt list.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::Deserialize;

use crate::capabilities::QuestionSource;
use crate::domain::{ArbiterError, Question, Result};

#[derive(Deserialize)]
#[serde(untagged)]
enum Entry {
    Prompt(String),
    Question(Question),
}

/// Hands out prompts from a list, round-robin.
#[derive(Debug)]
pub struct StaticQuestionSource {
    questions: Vec<Question>,
    next: AtomicUsize,
}

impl StaticQuestionSource {
    pub fn new(questions: Vec<Question>) -> Result<Self> {
        if questions.is_empty() {
            return Err(ArbiterError::InvalidConfig(
                "question list is empty".to_string(),
            ));
        }
        Ok(Self {
            questions,
            next: AtomicUsize::new(0),
        })
    }

    /// Load a JSON array whose items are either prompt strings or
    /// `{"prompt": ..., "image": ...}` objects.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let entries: Vec<Entry> = serde_json::from_str(&raw)?;
        let questions = entries
            .into_iter()
            .map(|entry| match entry {
                Entry::Prompt(prompt) => Question::new(prompt, None),
                Entry::Question(q) => q,
            })
            .collect();
        Self::new(questions)
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

#[async_trait]
impl QuestionSource for StaticQuestionSource {
    async fn next_question(&self, _modality: &str, _desired_count: usize, vision: bool) -> Result<Question> {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.questions.len();
        let mut question = self.questions[idx].clone();
        if !vision {
            question.image = None;
        }
        Ok(question)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_round_robin_and_image_stripping() {
        let source = StaticQuestionSource::new(vec![
            Question::new("first", Some("https://img/1.png".to_string())),
            Question::new("second", None),
        ])
        .unwrap();

        let q = source.next_question("text", 2, false).await.unwrap();
        assert_eq!(q.prompt, "first");
        assert!(q.image.is_none());
        assert_eq!(source.next_question("text", 2, true).await.unwrap().prompt, "second");

        let q = source.next_question("text", 2, true).await.unwrap();
        assert_eq!(q.image.as_deref(), Some("https://img/1.png"));
    }

    #[test]
    fn test_empty_list_rejected() {
        assert!(StaticQuestionSource::new(vec![]).is_err());
    }

    fn json_file(contents: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[tokio::test]
    async fn test_from_json_file_mixes_strings_and_objects() {
        let f = json_file(
            r#"[
                "What is the capital of France?",
                {"prompt": "Describe this picture.", "image": "https://img/cat.png"},
                {"prompt": "Name a prime number."}
            ]"#,
        );
        let source = StaticQuestionSource::from_json_file(f.path()).unwrap();
        assert_eq!(source.len(), 3);

        let first = source.next_question("text", 1, true).await.unwrap();
        assert_eq!(first, Question::new("What is the capital of France?", None));
        let second = source.next_question("text", 1, true).await.unwrap();
        assert_eq!(second.image.as_deref(), Some("https://img/cat.png"));
        let third = source.next_question("text", 1, true).await.unwrap();
        assert_eq!(third.prompt, "Name a prime number.");
        assert!(third.image.is_none());
    }

    #[test]
    fn test_from_json_file_rejects_bad_input() {
        let empty = json_file("[]");
        assert!(matches!(
            StaticQuestionSource::from_json_file(empty.path()),
            Err(ArbiterError::InvalidConfig(_))
        ));

        let malformed = json_file(r#"[{"image": "https://img/only.png"}]"#);
        assert!(matches!(
            StaticQuestionSource::from_json_file(malformed.path()),
            Err(ArbiterError::Serialization(_))
        ));

        assert!(matches!(
            StaticQuestionSource::from_json_file(Path::new("/nonexistent/questions.json")),
            Err(ArbiterError::Io(_))
        ));
    }
}
