use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::profile::UserProfile;

/// Body of `POST /v1/user_stat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserStatRequest {
    pub user_profile: UserProfile,
}

/// Aggregate market statistics for a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStatResponse {
    pub user_info: UserSummary,
    pub interest: InterestStat,
    /// Tech name → number of hiring companies. Non-numeric entries (a `message` when the
    /// profile has no stack, an `error` on lookup failure) are kept as raw JSON.
    #[serde(default)]
    pub tech_stack: BTreeMap<String, Value>,
}

/// Echo of the profile, keyed the way the backend labels it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    #[serde(rename = "전공", default)]
    pub major: String,
    #[serde(rename = "경력", default)]
    pub career: String,
    #[serde(rename = "관심분야", default)]
    pub interest: String,
    #[serde(rename = "희망지역", default)]
    pub location: String,
    /// A list on some backend builds, a joined string on others.
    #[serde(rename = "기술스택", default)]
    pub tech_stack: Value,
}

/// Job count for the interest category, or the backend's explanation of why there is none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InterestStat {
    Count { interest: String, total_job: u64 },
    Message { message: String },
    Error { error: String },
}

impl UserStatResponse {
    /// Numeric tech-stack counts only, highest demand first.
    pub fn tech_demand(&self) -> Vec<(String, u64)> {
        let mut counts: Vec<(String, u64)> = self
            .tech_stack
            .iter()
            .filter_map(|(name, value)| value.as_u64().map(|count| (name.clone(), count)))
            .collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_backend_payload() {
        let body = r#"{
            "user_info": {"전공": "CS", "경력": "신입", "관심분야": "백엔드", "희망지역": "서울", "기술스택": ["Rust", "Go"]},
            "interest": {"interest": "백엔드", "total_job": 321},
            "tech_stack": {"Rust": 12, "Go": 40, "message": "ignored"}
        }"#;
        let stat: UserStatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(stat.user_info.major, "CS");
        assert_eq!(
            stat.interest,
            InterestStat::Count {
                interest: "백엔드".into(),
                total_job: 321
            }
        );
        assert_eq!(
            stat.tech_demand(),
            vec![("Go".to_string(), 40), ("Rust".to_string(), 12)]
        );
    }

    #[test]
    fn test_interest_message_variant() {
        let interest: InterestStat =
            serde_json::from_str(r#"{"message":"관심 분야 정보가 없습니다."}"#).unwrap();
        assert!(matches!(interest, InterestStat::Message { .. }));
    }
}
