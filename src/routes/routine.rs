//! Routine endpoint routers.

use crate::handlers::{routine_fallback, routine_middleware};
use crate::state::AppState;
use axum::{middleware, Router};

/// Standalone router serving every routine endpoint; other URLs are 404.
pub fn routine_routes(state: AppState) -> Router {
    Router::new().fallback(routine_fallback).with_state(state)
}

/// Serve routine endpoints in front of an existing router. Requests for other URLs,
/// or with a method no routine uses, reach `router` untouched.
pub fn with_routines(router: Router, state: AppState) -> Router {
    router.layer(middleware::from_fn_with_state(state, routine_middleware))
}
