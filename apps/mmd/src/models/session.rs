use serde::{Deserialize, Serialize};

/// `GET /v1/session/info`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub created_at: String,
    pub last_activity: String,
    pub expires_at: String,
    pub message_count: u32,
    pub is_active: bool,
    /// Seconds until the backend drops the session.
    pub time_until_expiry: i64,
    #[serde(default)]
    pub is_new_session: bool,
}

/// `GET /v1/session/stats`. Every field is optional: some backend builds return only a
/// `current_session` summary, and the endpoint is also used as the renewal probe where
/// only the status code matters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    #[serde(default)]
    pub total_sessions: Option<u64>,
    #[serde(default)]
    pub active_sessions: Option<u64>,
    #[serde(default)]
    pub total_messages: Option<u64>,
    #[serde(default)]
    pub avg_session_duration: Option<f64>,
    #[serde(default)]
    pub most_recent_activity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_session: Option<CurrentSessionSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentSessionSummary {
    pub session_id: String,
    #[serde(default)]
    pub has_state: bool,
    #[serde(default)]
    pub chat_history_length: u32,
}

/// `DELETE /v1/session/clear`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearResponse {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Expired,
    Reset,
}

impl SessionStatus {
    pub fn from_info(info: &SessionInfo) -> Self {
        if !info.is_active || info.time_until_expiry <= 0 {
            SessionStatus::Expired
        } else if info.is_new_session {
            SessionStatus::Reset
        } else {
            SessionStatus::Active
        }
    }
}

/// Formats seconds-until-expiry as `MM:SS` for status lines.
pub fn format_time_left(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
