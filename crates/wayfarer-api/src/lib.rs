pub mod handlers;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

pub use handlers::ApiState;

pub async fn serve(state: ApiState, port: u16) -> anyhow::Result<()> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/status", get(handlers::handle_status))
        .route("/sessions", get(handlers::handle_session_list))
        .route("/sessions/{device}", get(handlers::handle_session_inspect))
        .route(
            "/sessions/{device}",
            delete(handlers::handle_session_drop),
        )
        .route("/sessions/{device}/jobs", get(handlers::handle_job_list))
        .route("/sessions/{device}/jobs", post(handlers::handle_job_submit))
        .route(
            "/sessions/{device}/jobs/{job_id}",
            delete(handlers::handle_job_cancel),
        )
        .route("/proxies", get(handlers::handle_proxy_list))
        .route("/events", get(handlers::handle_events_tail))
        .with_state(state);

    let app = Router::new().nest("/api", api_routes).layer(cors);

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    tracing::info!(port, "API listening on 127.0.0.1");
    axum::serve(listener, app).await?;
    Ok(())
}
