//! Example consumer: serves every routine tagged `HTTP` in its comment.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Environment: `DATABASE_URL`, optional `ROUTINE_API_OPTIONS` (path to a JSON options file).
//! Requests carrying `x-user` are treated as authenticated, for trying out `AUTHORIZE`.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::post,
    Json, Router,
};
use routine_api::{
    common_routes_with_ready, load_options_from_path, with_routines, AppState, Identity, RoutineOptions,
    SynthesisHooks,
};
use tokio::net::TcpListener;

async fn identity_from_header(mut request: Request, next: Next) -> Response {
    let user = request
        .headers()
        .get("x-user")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    if let Some(user) = user {
        request.extensions_mut().insert(Identity::authenticated(user));
    }
    next.run(request).await
}

async fn refresh(State(state): State<AppState>) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let endpoints = state
        .refresh()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(serde_json::json!({ "endpoints": endpoints })))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("routine_api=info")),
        )
        .init();

    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/app".into());
    let options = match std::env::var("ROUTINE_API_OPTIONS") {
        Ok(path) => load_options_from_path(path).await?,
        Err(_) => RoutineOptions::default(),
    };
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    let state = AppState::build(pool, options, SynthesisHooks::default()).await?;

    let host = common_routes_with_ready(state.clone()).merge(
        Router::new()
            .route("/admin/refresh", post(refresh))
            .with_state(state.clone()),
    );
    let app = with_routines(host, state).layer(middleware::from_fn(identity_from_header));

    let listener = TcpListener::bind("127.0.0.1:3000").await?;
    let port = listener.local_addr()?.port();
    tracing::info!("Example consumer listening on http://127.0.0.1:{}", port);
    axum::serve(listener, app).await?;
    Ok(())
}
