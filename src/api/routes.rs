use crate::api::{handlers, AppState};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Build the main API router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health_check))
        .route("/health/live", get(handlers::liveness))
        .route("/health/ready", get(handlers::readiness))
        .route("/health/providers", get(handlers::providers_health))
        .route("/health/system", get(handlers::system_status))
        // Webhook ingestion
        .route("/webhook/:provider", post(handlers::receive_webhook))
        // Incident queries
        .route("/status/active", get(handlers::active_incidents))
        .route("/status/recent", get(handlers::recent_incidents))
        .route(
            "/status/incidents/:provider/:service_id",
            get(handlers::get_incident),
        )
        .route("/status/changes/:provider", get(handlers::status_changes))
        .route("/status/history/:service_id", get(handlers::incident_history))
        // Component registry
        .route("/components/degraded", get(handlers::degraded_components))
        .route("/components/:provider", get(handlers::list_components))
        // Polling fallback control
        .route(
            "/control/polling",
            get(handlers::polling_status).post(handlers::set_polling),
        )
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(false))
                .on_response(DefaultOnResponse::new()),
        )
        .layer(CorsLayer::permissive())
}
