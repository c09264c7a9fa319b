use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod clients;
pub mod config;
pub mod engine;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use services::AppState;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        .nest("/api/v1/game-sessions", game_session_routes())
        .nest("/api/v1/selection", selection_routes())
        .with_state(app_state)
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn game_session_routes() -> Router<Arc<AppState>> {
    use handlers::game_sessions as gs;

    Router::new()
        .route("/", post(gs::create_game_session))
        .route("/{id}", get(gs::get_game_session).delete(gs::abandon))
        .route("/{id}/ordering", post(gs::submit_ordering))
        .route("/{id}/answer", post(gs::submit_answer))
        .route("/{id}/mark", post(gs::mark_response))
        .route("/{id}/spin", post(gs::spin))
        .route("/{id}/spin/resolve", post(gs::resolve_spin))
        .route("/{id}/save", post(gs::save_results))
        .route("/{id}/save/retry", post(gs::retry_save))
        .route("/{id}/replay", post(gs::replay))
        .route("/{id}/reset", post(gs::reset))
}

fn selection_routes() -> Router<Arc<AppState>> {
    use handlers::selection;

    Router::new().route(
        "/{owner_id}",
        get(selection::get_selection)
            .put(selection::put_selection)
            .delete(selection::clear_selection),
    )
}
