//! Prompts issued to nodes.

use serde::{Deserialize, Serialize};

use super::request::Turn;

/// Prompt text plus an optional attached image reference.
///
/// Owned by the round that issued it; never edited afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Question {
    pub fn new(prompt: impl Into<String>, image: Option<String>) -> Self {
        Self {
            prompt: prompt.into(),
            image,
        }
    }

    /// Single user turn carrying this question.
    pub fn to_turns(&self) -> Vec<Turn> {
        vec![Turn::user(self.prompt.clone()).with_image(self.image.clone())]
    }

    /// Recover the question from a caller-supplied conversation.
    ///
    /// The first user turn is taken as the prompt.
    pub fn from_turns(turns: &[Turn]) -> Option<Self> {
        turns
            .iter()
            .find(|turn| turn.role == super::request::Role::User)
            .or_else(|| turns.first())
            .map(|turn| Question::new(turn.content.clone(), turn.image.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::request::Role;

    #[test]
    fn test_to_turns_attaches_image() {
        let q = Question::new("describe", Some("https://img/a.png".to_string()));
        let turns = q.to_turns();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[0].image.as_deref(), Some("https://img/a.png"));
    }

    #[test]
    fn test_from_turns_prefers_user_turn() {
        let turns = vec![
            Turn {
                role: Role::System,
                content: "be brief".to_string(),
                image: None,
            },
            Turn::user("who are you"),
        ];
        assert_eq!(Question::from_turns(&turns).unwrap().prompt, "who are you");
        assert!(Question::from_turns(&[]).is_none());
    }
}
