//! Request/response hooks, applied by [`ApiClient`](super::ApiClient) in this fixed order:
//!
//! 1. [`stamp_request`]: page-load headers on the first request after a page load.
//! 2. [`classify_response`]: non-2xx statuses become [`ApiError::Http`].
//! 3. renewal: 401/403 goes to the session coordinator (see `ApiClient::dispatch`).
//!
//! [`observe_response`] runs on every successful response after classification.

use chrono::Utc;
use tracing::{debug, info};

use crate::api_client::transport::{ApiRequest, RawResponse};
use crate::errors::ApiError;
use crate::session::cookies::short_id;
use crate::session::SessionCoordinator;

pub const HEADER_PAGE_LOAD: &str = "X-Page-Load";
pub const HEADER_PAGE_LOAD_TIMESTAMP: &str = "X-Page-Load-Timestamp";
pub const HEADER_FORCE_NEW_SESSION: &str = "X-Force-New-Session";
pub const HEADER_FORCE_CLEAR: &str = "X-Force-Clear";
pub const HEADER_SESSION_RESET: &str = "x-session-reset";

pub fn stamp_request(coordinator: &SessionCoordinator, request: &mut ApiRequest) {
    debug!("API Request: {} {}", request.method, request.path);

    if coordinator.markers().take_page_load() {
        let timestamp = Utc::now().timestamp_millis().to_string();
        request
            .headers
            .push((HEADER_PAGE_LOAD.to_string(), "true".to_string()));
        request
            .headers
            .push((HEADER_PAGE_LOAD_TIMESTAMP.to_string(), timestamp));
        request
            .headers
            .push((HEADER_FORCE_NEW_SESSION.to_string(), "true".to_string()));
        info!("First request after page load; asking backend for a new session");
    }

    match coordinator.cookies().session_id() {
        Some(session_id) => debug!("Session cookie present: {}", short_id(&session_id)),
        None => debug!("No session cookie; backend will create a new session"),
    }
}

pub fn classify_response(response: RawResponse) -> Result<RawResponse, ApiError> {
    if response.is_success() {
        debug!("API Response: {}", response.status);
        Ok(response)
    } else {
        Err(ApiError::Http {
            status: response.status,
            body: response.text(),
        })
    }
}

pub fn observe_response(coordinator: &SessionCoordinator, response: &RawResponse) {
    if response.header(HEADER_SESSION_RESET) == Some("true") {
        info!("Backend confirmed session reset");
        coordinator.markers().clear_session_id();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use reqwest::cookie::Jar;
    use reqwest::header::{HeaderMap, HeaderValue};
    use reqwest::Url;
    use std::sync::Arc;

    use crate::session::cookies::SessionCookies;

    fn coordinator() -> SessionCoordinator {
        SessionCoordinator::new(SessionCookies::new(
            Arc::new(Jar::default()),
            Url::parse("http://localhost:8000/api").unwrap(),
        ))
    }

    fn response(status: u16, body: &str) -> RawResponse {
        RawResponse {
            status,
            headers: HeaderMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    #[test]
    fn test_page_load_headers_only_on_first_request() {
        let coordinator = coordinator();

        let mut first = ApiRequest::get("/v1/session/info");
        stamp_request(&coordinator, &mut first);
        assert_eq!(first.header(HEADER_PAGE_LOAD), Some("true"));
        assert_eq!(first.header(HEADER_FORCE_NEW_SESSION), Some("true"));
        assert!(first.header(HEADER_PAGE_LOAD_TIMESTAMP).is_some());

        let mut second = ApiRequest::get("/v1/session/info");
        stamp_request(&coordinator, &mut second);
        assert!(second.headers.is_empty());

        coordinator.force_new_session();
        let mut third = ApiRequest::get("/v1/session/info");
        stamp_request(&coordinator, &mut third);
        assert_eq!(third.header(HEADER_PAGE_LOAD), Some("true"));
    }

    #[test]
    fn test_classify_response() {
        assert!(classify_response(response(200, "{}")).is_ok());
        match classify_response(response(429, "slow down")) {
            Err(ApiError::Http { status, body }) => {
                assert_eq!(status, 429);
                assert_eq!(body, "slow down");
            }
            other => panic!("expected HTTP error, got {other:?}"),
        }
    }

    #[test]
    fn test_session_reset_header_clears_mirror() {
        let coordinator = coordinator();
        coordinator.markers().record_session_id("old");

        let mut reset = response(200, "{}");
        reset
            .headers
            .insert(HEADER_SESSION_RESET, HeaderValue::from_static("true"));
        observe_response(&coordinator, &reset);

        assert_eq!(coordinator.markers().last_session_id(), None);
    }
}
