//! Local stand-in for the MMD backend: cookie sessions with sliding expiry, the chat and
//! session endpoints, and deterministic canned answers. Used for development and as the
//! far end of the client's end-to-end tests.

pub mod errors;
pub mod handlers;
pub mod session_layer;
pub mod state;

use std::net::SocketAddr;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use session_layer::session_layer;
pub use state::StubState;

pub fn build_router(state: StubState) -> Router {
    let sessioned = Router::new()
        .route("/v1/chat", post(handlers::handle_chat))
        .route("/v1/chat/reset", post(handlers::handle_chat_reset))
        .route("/v1/session/info", get(handlers::handle_session_info))
        .route("/v1/session/stats", get(handlers::handle_session_stats))
        .route("/v1/session/clear", delete(handlers::handle_session_clear))
        .route("/v1/user_stat", post(handlers::handle_user_stat))
        .route_layer(middleware::from_fn_with_state(state.clone(), session_layer));

    // Autocomplete does not need a session.
    let api = sessioned
        .route("/jobs/search", get(handlers::handle_job_search))
        .route(
            "/universities/search",
            get(handlers::handle_university_search),
        );

    Router::new()
        .route("/health", get(handlers::health_handler))
        .nest("/api", api)
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: StubState) -> anyhow::Result<()> {
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Stub backend listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
