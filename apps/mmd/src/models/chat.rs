use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::profile::UserProfile;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single bubble in the conversation. Display-only; lives as long as the chat session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, "user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, "assistant", content)
    }

    /// Assistant bubble that stands in for a failed answer.
    pub fn assistant_error(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, "assistant-error", content)
    }

    fn new(role: Role, prefix: &str, content: impl Into<String>) -> Self {
        Self {
            id: format!("{prefix}-{}", Uuid::new_v4()),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Body of `POST /v1/chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub question: String,
    pub user_profile: UserProfile,
}

/// Raw body returned by `POST /v1/chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub session_id: Option<String>,
    pub answer: String,
}

/// What callers of `run_workflow` receive: the backend's `answer` exposed as `final_answer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub final_answer: String,
}

impl From<ChatResponse> for WorkflowResponse {
    fn from(raw: ChatResponse) -> Self {
        WorkflowResponse {
            session_id: raw.session_id,
            final_answer: raw.answer,
        }
    }
}

/// Body of `POST /v1/chat/reset`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetResponse {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_count: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_is_renamed_to_final_answer() {
        let raw: ChatResponse =
            serde_json::from_str(r#"{"session_id":"abc","answer":"준비하세요"}"#).unwrap();
        let mapped = WorkflowResponse::from(raw);
        assert_eq!(mapped.final_answer, "준비하세요");
        assert_eq!(mapped.session_id.as_deref(), Some("abc"));
    }

    #[test]
    fn test_message_ids_are_unique_and_prefixed() {
        let a = ChatMessage::user("hi");
        let b = ChatMessage::user("hi");
        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with("user-"));
        assert!(ChatMessage::assistant_error("x")
            .id
            .starts_with("assistant-error-"));
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }
}
