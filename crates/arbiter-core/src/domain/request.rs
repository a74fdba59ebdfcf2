//! Node identity and the immutable description of one query.

use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::provider::ProviderKind;

/// Identifier of a remote responder node (its slot in the peer registry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u16);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Network address a node serves on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeAddress {
    pub ip: IpAddr,
    pub port: u16,
}

impl NodeAddress {
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self { ip, port }
    }
}

/// A node to query together with where to reach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeTarget {
    pub id: NodeId,
    pub address: NodeAddress,
}

impl NodeTarget {
    pub fn new(id: NodeId, address: NodeAddress) -> Self {
        Self { id, address }
    }
}

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One turn of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    /// Optional attached media reference (an image URL).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            image: None,
        }
    }

    pub fn with_image(mut self, image: Option<String>) -> Self {
        self.image = image;
        self
    }
}

/// Sampling parameters shared by every node in a round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub seed: u64,
    pub max_tokens: u32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            top_p: 1.0,
            top_k: 1,
            seed: 1234,
            max_tokens: 4096,
        }
    }
}

/// Immutable description of one query to one node.
///
/// Built once per node per round and handed to the streaming client by
/// value; nothing mutates it after dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    pub node: NodeId,
    pub messages: Vec<Turn>,
    pub model: String,
    pub sampling: SamplingParams,
    pub provider: ProviderKind,
    /// Per-node budget for connect, write and each read.
    pub timeout: Duration,
}

impl RequestSpec {
    /// Text of the first turn, used in log lines.
    pub fn prompt_preview(&self) -> &str {
        self.messages
            .first()
            .map(|turn| turn.content.as_str())
            .unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_serializes_as_number() {
        let json = serde_json::to_string(&NodeId(42)).unwrap();
        assert_eq!(json, "42");
        let back: NodeId = serde_json::from_str("42").unwrap();
        assert_eq!(back, NodeId(42));
    }

    #[test]
    fn test_turn_skips_missing_image() {
        let json = serde_json::to_value(Turn::user("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "user", "content": "hi"}));

        let json = serde_json::to_value(
            Turn::user("look").with_image(Some("https://img/x.png".to_string())),
        )
        .unwrap();
        assert_eq!(json["image"], "https://img/x.png");
    }

    #[test]
    fn test_prompt_preview_empty_conversation() {
        let spec = RequestSpec {
            node: NodeId(1),
            messages: vec![],
            model: "m".to_string(),
            sampling: SamplingParams::default(),
            provider: ProviderKind::OpenAi,
            timeout: Duration::from_secs(12),
        };
        assert_eq!(spec.prompt_preview(), "");
    }
}
