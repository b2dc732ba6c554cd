//! API client: the single point of entry for every call to the MMD backend.
//!
//! Every operation goes through [`ApiClient::dispatch`], which stamps the request, classifies
//! the response and hands 401/403 to the [`SessionCoordinator`] for a single renewal retry.
//! Nothing else in the crate talks HTTP to the backend.

use std::sync::Arc;

use reqwest::cookie::Jar;
use reqwest::Url;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info, warn};

pub mod middleware;
pub mod transport;

use crate::config::Config;
use crate::errors::ApiError;
use crate::models::chat::{ChatRequest, ChatResponse, ResetResponse, WorkflowResponse};
use crate::models::profile::{UserInfo, UserProfile};
use crate::models::session::{ClearResponse, SessionInfo, SessionStats};
use crate::models::stats::{UserStatRequest, UserStatResponse};
use crate::session::cookies::{short_id, SessionCookies};
use crate::session::{RenewalOutcome, SessionCoordinator};

use middleware::{classify_response, observe_response, stamp_request, HEADER_FORCE_CLEAR};
use transport::{ApiRequest, HttpTransport, RawResponse, Transport};

pub const CHAT_PATH: &str = "/v1/chat";
pub const CHAT_RESET_PATH: &str = "/v1/chat/reset";
pub const SESSION_INFO_PATH: &str = "/v1/session/info";
/// Cheap authenticated endpoint; a 2xx means the backend accepted or re-issued the cookie.
pub const SESSION_STATS_PATH: &str = "/v1/session/stats";
pub const SESSION_CLEAR_PATH: &str = "/v1/session/clear";
pub const USER_STAT_PATH: &str = "/v1/user_stat";
pub const JOB_SEARCH_PATH: &str = "/jobs/search";
pub const UNIVERSITY_SEARCH_PATH: &str = "/universities/search";

/// Generic `{success, data, error, message}` envelope used by the legacy search endpoints.
#[derive(Debug, Deserialize, Serialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    coordinator: Arc<SessionCoordinator>,
}

impl ApiClient {
    /// Builds the reqwest-backed client with a fresh cookie jar.
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let base_url = Url::parse(&config.api_base_url)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {e}", config.api_base_url)))?;
        let jar = Arc::new(Jar::default());
        let transport = HttpTransport::new(&base_url, config.timeout, Arc::clone(&jar))?;
        let coordinator = SessionCoordinator::new(SessionCookies::new(jar, base_url));

        info!(
            "API client initialized (base: {}, timeout: {}s)",
            config.api_base_url,
            config.timeout.as_secs()
        );
        Ok(Self::with_transport(Arc::new(transport), Arc::new(coordinator)))
    }

    /// Attaches the coordinator to an arbitrary transport.
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        coordinator: Arc<SessionCoordinator>,
    ) -> Self {
        Self {
            transport,
            coordinator,
        }
    }

    pub fn coordinator(&self) -> &Arc<SessionCoordinator> {
        &self.coordinator
    }

    pub fn force_new_session(&self) {
        self.coordinator.force_new_session();
    }

    /// POST /v1/chat
    pub async fn run_workflow(&self, info: &UserInfo) -> Result<WorkflowResponse, ApiError> {
        let body = serde_json::to_value(ChatRequest {
            question: info.candidate_question.clone(),
            user_profile: info.profile.clone(),
        })?;
        debug!("Sending chat request: {body}");

        let result = self
            .call::<ChatResponse>(ApiRequest::post(CHAT_PATH, body))
            .await;
        match result {
            Ok(raw) => {
                if let Some(session_id) = &raw.session_id {
                    debug!("Chat answered in session {}", short_id(session_id));
                    self.coordinator.markers().record_session_id(session_id);
                }
                Ok(WorkflowResponse::from(raw))
            }
            Err(err) => {
                log_failure("run chat workflow", &err);
                Err(err)
            }
        }
    }

    /// POST /v1/chat/reset
    pub async fn reset_conversation(&self) -> Result<ResetResponse, ApiError> {
        self.call(ApiRequest::post(CHAT_RESET_PATH, json!({})))
            .await
            .inspect_err(|err| log_failure("reset conversation", err))
    }

    /// GET /v1/session/info
    pub async fn get_session_info(&self) -> Result<SessionInfo, ApiError> {
        self.call(ApiRequest::get(SESSION_INFO_PATH))
            .await
            .inspect_err(|err| log_failure("get session info", err))
    }

    /// GET /v1/session/stats
    pub async fn get_session_stats(&self) -> Result<SessionStats, ApiError> {
        self.call(ApiRequest::get(SESSION_STATS_PATH))
            .await
            .inspect_err(|err| log_failure("get session stats", err))
    }

    /// DELETE /v1/session/clear
    pub async fn clear_session(&self, force: bool) -> Result<ClearResponse, ApiError> {
        let mut request = ApiRequest::delete(SESSION_CLEAR_PATH);
        if force {
            request = request.with_header(HEADER_FORCE_CLEAR, "true");
        }
        self.call(request)
            .await
            .inspect_err(|err| log_failure("clear session", err))
    }

    /// Forced backend clear whose outcome is only logged.
    pub async fn clear_backend_session_quietly(&self) {
        match self.clear_session(true).await {
            Ok(_) => info!("Backend session cleared"),
            Err(err) => warn!("Backend session clear failed (ignored): {err}"),
        }
    }

    /// POST /v1/user_stat
    pub async fn get_user_stat(&self, profile: &UserProfile) -> Result<UserStatResponse, ApiError> {
        let body = serde_json::to_value(UserStatRequest {
            user_profile: profile.clone(),
        })?;
        self.call(ApiRequest::post(USER_STAT_PATH, body))
            .await
            .inspect_err(|err| log_failure("fetch user statistics", err))
    }

    /// GET /jobs/search?q=…, for autocomplete. Any failure yields no suggestions.
    pub async fn search_jobs(&self, query: &str) -> Vec<String> {
        self.search(JOB_SEARCH_PATH, query).await
    }

    /// GET /universities/search?q=…
    pub async fn search_universities(&self, query: &str) -> Vec<String> {
        self.search(UNIVERSITY_SEARCH_PATH, query).await
    }

    async fn search(&self, path: &str, query: &str) -> Vec<String> {
        let request = ApiRequest::get(path).with_query("q", query);
        match self.call::<ApiEnvelope<Vec<String>>>(request).await {
            Ok(envelope) => envelope.data.unwrap_or_default(),
            Err(err) => {
                warn!("Search {path} failed: {err}");
                Vec::new()
            }
        }
    }

    async fn call<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        self.dispatch(request).await?.json()
    }

    /// Stamp → send → classify → (401/403) renew once → resubmit.
    pub async fn dispatch(&self, mut request: ApiRequest) -> Result<RawResponse, ApiError> {
        stamp_request(&self.coordinator, &mut request);

        match self.send_once(&request).await {
            Err(err) if err.is_session_expired() && !request.retried => {
                request.retried = true;
                self.renew_and_resubmit(request, err).await
            }
            other => other,
        }
    }

    async fn renew_and_resubmit(
        &self,
        request: ApiRequest,
        original: ApiError,
    ) -> Result<RawResponse, ApiError> {
        warn!(
            "{} {} rejected with {}; renewing session",
            request.method,
            request.path,
            original.status().unwrap_or_default()
        );

        match self.coordinator.renew(|| self.probe()).await {
            RenewalOutcome::Renewed => {
                debug!("Resubmitting {} {}", request.method, request.path);
                self.send_once(&request).await
            }
            RenewalOutcome::Failed { led: true, .. } => Err(original),
            RenewalOutcome::Failed { error, led: false } => Err(error),
        }
    }

    /// The renewal probe bypasses stamping and renewal.
    async fn probe(&self) -> Result<(), ApiError> {
        let response = self
            .transport
            .send(&ApiRequest::get(SESSION_STATS_PATH))
            .await
            .and_then(classify_response)?;
        observe_response(&self.coordinator, &response);
        Ok(())
    }

    async fn send_once(&self, request: &ApiRequest) -> Result<RawResponse, ApiError> {
        let response = self
            .transport
            .send(request)
            .await
            .and_then(classify_response)?;
        observe_response(&self.coordinator, &response);
        Ok(response)
    }
}

fn log_failure(operation: &str, err: &ApiError) {
    error!("Failed to {operation}: {err}");
    let field_errors = err.validation_errors();
    if !field_errors.is_empty() {
        error!("Detailed validation errors:");
        for (index, field) in field_errors.iter().enumerate() {
            error!(
                "{}. Field: {} | Error: {} | Input: {}",
                index + 1,
                field.field_path(),
                field.msg,
                field
                    .input
                    .as_ref()
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "-".to_string())
            );
        }
    }
}
