use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, info};

use crate::session::cookies::{find_cookie, short_id, SESSION_COOKIE_NAME};
use crate::stub::errors::StubError;
use crate::stub::state::{RequestRecord, SessionLookup, StubState};

/// Session resolved by the middleware, available to handlers as an extension.
#[derive(Debug, Clone)]
pub struct ActiveSession {
    pub id: String,
    pub is_new: bool,
}

/// Endpoints allowed to mint a fresh session when the presented cookie is stale.
/// Everything else answers 401 so clients exercise their renewal path.
fn may_mint_on_stale(path: &str) -> bool {
    path.ends_with("/v1/session/stats") || path.ends_with("/v1/session/clear")
}

fn header_is_true(headers: &HeaderMap, name: &str) -> bool {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

pub async fn session_layer(
    State(state): State<StubState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let headers = request.headers();

    let cookie = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|raw| find_cookie(raw, SESSION_COOKIE_NAME))
        .filter(|id| !id.is_empty())
        .map(str::to_string);
    let page_load = header_is_true(headers, "x-page-load");
    let forced = page_load || header_is_true(headers, "x-force-new-session");

    state.record_request(RequestRecord {
        path: path.clone(),
        cookie: cookie.clone(),
        page_load,
    });

    let (session_id, is_new) = match cookie {
        _ if forced => {
            if let Some(old) = &cookie {
                info!("Forced session reset; dropping {}", short_id(old));
                state.remove(old);
            }
            (state.create_session(), true)
        }
        None => {
            debug!("No session cookie on {path}; creating session");
            (state.create_session(), true)
        }
        Some(id) => match state.lookup(&id) {
            SessionLookup::Active => {
                state.touch(&id);
                (id, false)
            }
            SessionLookup::Expired | SessionLookup::Unknown if may_mint_on_stale(&path) => {
                info!("Stale session {} renewed via {path}", short_id(&id));
                state.remove(&id);
                (state.create_session(), true)
            }
            SessionLookup::Expired | SessionLookup::Unknown => {
                debug!("Rejecting stale session {} on {path}", short_id(&id));
                return StubError::SessionExpired.into_response();
            }
        },
    };

    request.extensions_mut().insert(ActiveSession {
        id: session_id.clone(),
        is_new,
    });

    let mut response = next.run(request).await;

    if is_new {
        let cookie = format!(
            "{SESSION_COOKIE_NAME}={session_id}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
            state.ttl().as_secs()
        );
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        if forced {
            response
                .headers_mut()
                .insert("x-session-reset", HeaderValue::from_static("true"));
            if let Ok(value) = HeaderValue::from_str(&session_id) {
                response.headers_mut().insert("x-new-session-id", value);
            }
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_probe_and_clear_mint_on_stale() {
        assert!(may_mint_on_stale("/v1/session/stats"));
        assert!(may_mint_on_stale("/api/v1/session/clear"));
        assert!(!may_mint_on_stale("/v1/chat"));
        assert!(!may_mint_on_stale("/v1/session/info"));
    }

    #[test]
    fn test_header_is_true() {
        let mut headers = HeaderMap::new();
        headers.insert("x-page-load", HeaderValue::from_static("TRUE"));
        assert!(header_is_true(&headers, "x-page-load"));
        assert!(!header_is_true(&headers, "x-force-new-session"));
    }
}
