use std::collections::BTreeMap;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Extension, Json,
};
use serde::Deserialize;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;

use crate::models::chat::{ChatRequest, ChatResponse, ResetResponse};
use crate::models::profile::UserProfile;
use crate::models::session::{ClearResponse, SessionInfo, SessionStats};
use crate::models::stats::{InterestStat, UserStatRequest, UserStatResponse, UserSummary};
use crate::session::cookies::short_id;
use crate::stub::errors::{FieldDetail, StubError};
use crate::stub::session_layer::ActiveSession;
use crate::stub::state::StubState;

/// GET /health
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "mmd-stub"
    }))
}

/// POST /api/v1/chat
pub async fn handle_chat(
    State(state): State<StubState>,
    Extension(session): Extension<ActiveSession>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, StubError> {
    if req.question.trim().is_empty() {
        return Err(StubError::Validation(vec![FieldDetail {
            loc: vec!["body".into(), "question".into()],
            msg: "질문을 입력해주세요".into(),
            input: Value::String(req.question),
        }]));
    }

    let answer = canned_answer(&req.user_profile, &req.question);
    let turns = state
        .with_session(&session.id, |s| {
            s.chat_history.push((req.question.clone(), answer.clone()));
            s.chat_history.len()
        })
        .ok_or_else(|| StubError::NotFound(format!("session {}", short_id(&session.id))))?;

    if session.is_new {
        info!("New session started: {}", short_id(&session.id));
    } else {
        info!(
            "Continuing session {} ({turns} turn(s))",
            short_id(&session.id)
        );
    }

    Ok(Json(ChatResponse {
        session_id: Some(session.id),
        answer,
    }))
}

/// POST /api/v1/chat/reset
pub async fn handle_chat_reset(
    State(state): State<StubState>,
    Extension(session): Extension<ActiveSession>,
) -> Result<Json<ResetResponse>, StubError> {
    let reset_count = state
        .with_session(&session.id, |s| {
            s.chat_history.clear();
            s.reset_count += 1;
            s.reset_count
        })
        .ok_or_else(|| StubError::NotFound(format!("session {}", short_id(&session.id))))?;

    Ok(Json(ResetResponse {
        message: "대화가 초기화되었습니다.".to_string(),
        session_id: Some(session.id),
        reset_count: Some(reset_count),
    }))
}

/// GET /api/v1/session/info
pub async fn handle_session_info(
    State(state): State<StubState>,
    Extension(session): Extension<ActiveSession>,
) -> Result<Json<SessionInfo>, StubError> {
    let stored = state
        .get(&session.id)
        .ok_or_else(|| StubError::NotFound(format!("session {}", short_id(&session.id))))?;
    let now = Utc::now();

    Ok(Json(SessionInfo {
        session_id: session.id,
        created_at: stored.created_at.to_rfc3339(),
        last_activity: stored.last_activity.to_rfc3339(),
        expires_at: stored.expires_at.to_rfc3339(),
        message_count: stored.chat_history.len() as u32,
        is_active: stored.expires_at > now,
        time_until_expiry: (stored.expires_at - now).num_seconds().max(0),
        is_new_session: session.is_new,
    }))
}

/// GET /api/v1/session/stats
pub async fn handle_session_stats(State(state): State<StubState>) -> Json<SessionStats> {
    state.record_probe();
    if !state.probe_delay().is_zero() {
        tokio::time::sleep(state.probe_delay()).await;
    }

    let (total, active, messages) = state.session_counts();
    Json(SessionStats {
        total_sessions: Some(total as u64),
        active_sessions: Some(active as u64),
        total_messages: Some(messages as u64),
        avg_session_duration: Some(state.average_session_secs()),
        most_recent_activity: state.most_recent_activity().map(|t| t.to_rfc3339()),
        current_session: None,
        status: Some("active".to_string()),
    })
}

/// DELETE /api/v1/session/clear
pub async fn handle_session_clear(
    State(state): State<StubState>,
    Extension(session): Extension<ActiveSession>,
    headers: HeaderMap,
) -> Json<ClearResponse> {
    let forced = headers
        .get("x-force-clear")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == "true")
        .unwrap_or(false);
    let deleted = state.remove(&session.id);
    if forced {
        info!("Force clear requested for session {}", short_id(&session.id));
    }

    Json(ClearResponse {
        message: "세션이 삭제되었습니다.".to_string(),
        deleted: Some(deleted),
    })
}

/// POST /api/v1/user_stat
pub async fn handle_user_stat(Json(req): Json<UserStatRequest>) -> Json<UserStatResponse> {
    let profile = req.user_profile;

    let interest = if profile.candidate_interest.trim().is_empty() {
        InterestStat::Message {
            message: "관심 분야 정보가 없습니다.".to_string(),
        }
    } else {
        InterestStat::Count {
            total_job: demand_score(&profile.candidate_interest) * 10,
            interest: profile.candidate_interest.clone(),
        }
    };

    let mut tech_stack = BTreeMap::new();
    if profile.candidate_tech_stack.is_empty() {
        tech_stack.insert(
            "message".to_string(),
            Value::String("기술 스택 정보가 없습니다.".to_string()),
        );
    }
    for tech in &profile.candidate_tech_stack {
        tech_stack.insert(tech.clone(), Value::from(demand_score(tech)));
    }

    Json(UserStatResponse {
        user_info: UserSummary {
            major: profile.candidate_major.clone(),
            career: profile.candidate_career.clone(),
            interest: profile.candidate_interest.clone(),
            location: profile.candidate_location.clone(),
            tech_stack: Value::from(profile.candidate_tech_stack.clone()),
        },
        interest,
        tech_stack,
    })
}

const JOB_CATALOG: &[&str] = &[
    "백엔드 개발자",
    "프론트엔드 개발자",
    "데이터 엔지니어",
    "데이터 분석가",
    "머신러닝 엔지니어",
    "DevOps 엔지니어",
    "모바일 앱 개발자",
    "보안 엔지니어",
    "QA 엔지니어",
    "프로덕트 매니저",
];

const UNIVERSITY_CATALOG: &[&str] = &[
    "서울대학교",
    "연세대학교",
    "고려대학교",
    "성균관대학교",
    "한양대학교",
    "KAIST",
    "POSTECH",
    "부산대학교",
    "경북대학교",
    "전남대학교",
];

const SEARCH_LIMIT: usize = 10;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

/// GET /api/jobs/search?q=
pub async fn handle_job_search(Query(params): Query<SearchParams>) -> Json<Value> {
    Json(search_envelope(JOB_CATALOG, &params.q))
}

/// GET /api/universities/search?q=
pub async fn handle_university_search(Query(params): Query<SearchParams>) -> Json<Value> {
    Json(search_envelope(UNIVERSITY_CATALOG, &params.q))
}

fn search_envelope(catalog: &[&str], query: &str) -> Value {
    let needle = query.trim().to_lowercase();
    let data: Vec<&str> = catalog
        .iter()
        .copied()
        .filter(|entry| needle.is_empty() || entry.to_lowercase().contains(&needle))
        .take(SEARCH_LIMIT)
        .collect();
    json!({ "success": true, "data": data })
}

fn canned_answer(profile: &UserProfile, question: &str) -> String {
    let stack = if profile.candidate_tech_stack.is_empty() {
        "기술 스택 미기재".to_string()
    } else {
        profile.candidate_tech_stack.join(", ")
    };
    format!(
        "## {interest} 직무 안내\n\n- 지역: {location}\n- 경력: {career}\n- 기술 스택: {stack}\n- 희망 연봉: {salary}\n\n질문하신 \"{question}\"에 대해, 관련 채용 공고의 요구 역량을 먼저 정리해보시길 권합니다.",
        interest = profile.candidate_interest,
        location = profile.candidate_location,
        career = profile.candidate_career,
        salary = profile.candidate_salary,
        question = question.trim(),
    )
}

/// Deterministic stand-in for a job-count lookup.
fn demand_score(keyword: &str) -> u64 {
    keyword
        .bytes()
        .fold(17u64, |acc, b| (acc * 31 + u64::from(b)) % 997)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demand_score_is_stable() {
        assert_eq!(demand_score("Rust"), demand_score("Rust"));
        assert!(demand_score("Rust") < 997);
    }

    #[test]
    fn test_search_is_case_insensitive_substring() {
        let envelope = search_envelope(UNIVERSITY_CATALOG, "kai");
        assert_eq!(envelope["data"], json!(["KAIST"]));

        let envelope = search_envelope(JOB_CATALOG, "엔지니어");
        assert_eq!(envelope["data"].as_array().unwrap().len(), 5);
    }

    #[test]
    fn test_canned_answer_mentions_profile() {
        let profile = UserProfile {
            candidate_major: "CS".into(),
            candidate_career: "신입".into(),
            candidate_interest: "백엔드".into(),
            candidate_location: "서울".into(),
            candidate_tech_stack: vec!["Rust".into(), "Go".into()],
            candidate_salary: "3000-3500만원".into(),
        };
        let answer = canned_answer(&profile, "  어떻게 준비하나요? ");
        assert!(answer.contains("백엔드 직무"));
        assert!(answer.contains("Rust, Go"));
        assert!(answer.contains("\"어떻게 준비하나요?\""));
    }
}
