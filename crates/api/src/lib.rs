pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;
pub mod ws;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use state::AppState;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Upload routes (larger body limit for resumes and audio blobs)
    let upload_routes = Router::new()
        .route("/resume", post(routes::resume::upload))
        .route("/transcribe", post(routes::transcribe::transcribe_audio))
        .layer(DefaultBodyLimit::max(25 * 1024 * 1024));

    // Interview read-side routes
    let interview_routes = Router::new()
        .route("/", get(routes::interview::list))
        .route("/stats/overview", get(routes::interview::stats_overview))
        .route(
            "/analytics/performance",
            get(routes::interview::performance),
        )
        .route("/export", get(routes::interview::export))
        .route("/{session_id}", get(routes::interview::details));

    let api = Router::new()
        .route("/topics", get(routes::topics::list))
        .route("/profile", get(routes::profile::get_profile))
        .nest("/interviews", interview_routes)
        .merge(upload_routes);

    // Health check
    let health = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api)
        .merge(health)
        .route("/ws", get(ws::handler::ws_upgrade))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
