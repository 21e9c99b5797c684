//! Core data types used throughout chat-guardian.
//!
//! These types represent the conversation, the retrieved context, and the
//! responses that flow through the retrieval + validation pipeline. The
//! serialized field names are the wire contract of `POST /chat`.

use serde::{Deserialize, Serialize};

/// Who authored a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Request body for `POST /chat`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    /// Token budget for generation. Falls back to the configured default.
    #[serde(default)]
    pub max_tokens: Option<usize>,
}

/// A cited source attached to a chat response.
///
/// Produced fresh per request and owned by the response; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievedSource {
    pub id: String,
    /// Truncated excerpt of the document body.
    pub content: String,
}

/// Output of one retrieval pass: the concatenated context handed to the
/// generator plus the source list handed back to the caller, both in
/// relevance-rank order.
#[derive(Debug, Clone, Default)]
pub struct RetrievalResult {
    pub context: String,
    pub sources: Vec<RetrievedSource>,
}

/// Response body for `POST /chat`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub message: Message,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<RetrievedSource>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_roundtrip() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
        let role: Role = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(role, Role::User);
    }

    #[test]
    fn test_role_display_matches_wire_form() {
        assert_eq!(Role::User.to_string(), "user");
        assert_eq!(Role::Assistant.to_string(), "assistant");
    }

    #[test]
    fn test_chat_request_defaults_max_tokens() {
        let req: ChatRequest =
            serde_json::from_str(r#"{"messages":[{"role":"user","content":"hi"}]}"#).unwrap();
        assert!(req.max_tokens.is_none());
        assert_eq!(req.messages.len(), 1);
    }

    #[test]
    fn test_response_omits_empty_sources() {
        let resp = ChatResponse {
            message: Message::assistant("hello"),
            sources: None,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(!json.contains("sources"));
    }
}
