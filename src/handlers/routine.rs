//! Request dispatch: overload selection, parameter binding, execution.

use crate::config::RoutineOptions;
use crate::endpoint::ParamLocation;
use crate::error::AppError;
use crate::extractors::Identity;
use crate::hooks::HookContext;
use crate::response::{no_content, routine_response};
use crate::routing::Endpoint;
use crate::service::{render, Outcome, RoutineExecutor};
use crate::sql::marshal::{from_json, from_query_values};
use crate::sql::CommandParameter;
use crate::state::AppState;
use axum::{
    extract::{FromRequestParts, Query, Request, State},
    http::{Method, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Query-string pairs in request order.
#[derive(Clone, Debug, Default)]
pub struct QueryValues {
    pairs: Vec<(String, String)>,
}

impl QueryValues {
    pub fn parse(uri: &Uri) -> Result<Self, AppError> {
        let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(uri)
            .map_err(|e| AppError::BadRequest(format!("query string: {e}")))?;
        Ok(QueryValues { pairs })
    }

    pub fn from_pairs<K: Into<String>, V: Into<String>>(pairs: impl IntoIterator<Item = (K, V)>) -> Self {
        QueryValues {
            pairs: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    fn keys(&self) -> HashSet<&str> {
        self.pairs.iter().map(|(k, _)| k.as_str()).collect()
    }

    /// Every value supplied for `name`, in order.
    pub fn values(&self, name: &str) -> Vec<String> {
        self.pairs
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
            .collect()
    }
}

/// JSON body, read at most once per request and shared by all candidates.
#[derive(Clone, Debug)]
pub enum RequestBody {
    /// No candidate reads the body.
    Absent,
    Object(Map<String, Value>),
    Invalid(String),
}

impl RequestBody {
    /// Empty body is `{}`; anything but an object is invalid.
    pub fn parse(bytes: &[u8]) -> Self {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return RequestBody::Object(Map::new());
        }
        match serde_json::from_slice::<Value>(bytes) {
            Ok(Value::Object(map)) => RequestBody::Object(map),
            Ok(_) => RequestBody::Invalid("JSON body must be an object".into()),
            Err(e) => RequestBody::Invalid(format!("invalid JSON body: {e}")),
        }
    }
}

#[derive(Debug)]
pub enum Selection<'a> {
    Matched {
        endpoint: &'a Endpoint,
        params: Vec<CommandParameter>,
    },
    Unauthorized,
    BadRequest(String),
    NotFound,
}

/// First candidate whose method matches and whose declared parameter names equal the
/// supplied key set, with every value converted. Authorization is checked once the
/// name set matches; a conversion failure skips the candidate.
pub fn select_candidate<'a>(
    candidates: &'a [Endpoint],
    method: &Method,
    query: &QueryValues,
    body: &RequestBody,
    identity: &Identity,
    options: &RoutineOptions,
) -> Selection<'a> {
    let empty = Map::new();
    let query_keys = query.keys();
    for endpoint in candidates {
        let descriptor = &endpoint.descriptor;
        if !descriptor.method.matches(method) {
            continue;
        }
        let declared: HashSet<&str> = descriptor.param_names.iter().map(String::as_str).collect();
        let object = match descriptor.param_location {
            ParamLocation::QueryString => {
                if query_keys != declared {
                    continue;
                }
                None
            }
            ParamLocation::BodyJson => {
                let object = match body {
                    RequestBody::Object(map) => map,
                    RequestBody::Absent => &empty,
                    RequestBody::Invalid(msg) => return Selection::BadRequest(msg.clone()),
                };
                let supplied: HashSet<&str> = object.keys().map(String::as_str).collect();
                if supplied != declared {
                    continue;
                }
                Some(object)
            }
        };
        if descriptor.requires_authorization && !identity.authenticated {
            return Selection::Unauthorized;
        }

        let mut params = Vec::with_capacity(descriptor.param_names.len());
        for (name, param) in descriptor.param_names.iter().zip(&endpoint.routine.params) {
            let converted = match object {
                None => from_query_values(&query.values(name), &param.descriptor, options.query_string_null_handling),
                Some(object) => from_json(object.get(name).unwrap_or(&Value::Null), &param.descriptor),
            };
            match converted {
                Ok(value) => params.push(CommandParameter {
                    name: name.clone(),
                    descriptor: param.descriptor.clone(),
                    value,
                }),
                Err(e) => tracing::warn!(
                    routine = %endpoint.routine.qualified_name(),
                    parameter = %name,
                    error = %e,
                    "parameter conversion failed"
                ),
            }
        }
        if params.len() != descriptor.param_names.len() {
            continue;
        }
        return Selection::Matched { endpoint, params };
    }
    Selection::NotFound
}

/// Database failure to response: SQLSTATE mapped through the options table, message
/// hidden unless `expose_error_messages`.
pub fn database_error(err: sqlx::Error, options: &RoutineOptions) -> AppError {
    let (status, sqlstate, message) = match err.as_database_error() {
        Some(db) => {
            let code = db.code().map(|c| c.into_owned());
            let status = code
                .as_deref()
                .and_then(|c| options.error_codes.get(c))
                .and_then(|s| StatusCode::from_u16(*s).ok())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, code, db.message().to_string())
        }
        None if matches!(err, sqlx::Error::PoolTimedOut) => (StatusCode::SERVICE_UNAVAILABLE, None, err.to_string()),
        None => (StatusCode::INTERNAL_SERVER_ERROR, None, err.to_string()),
    };
    if status.is_server_error() {
        tracing::error!(status = %status, sqlstate = ?sqlstate, error = %message, "routine call failed");
    } else {
        tracing::warn!(status = %status, sqlstate = ?sqlstate, error = %message, "routine call failed");
    }
    if options.expose_error_messages {
        AppError::Database {
            status,
            sqlstate,
            message,
        }
    } else {
        AppError::Database {
            status,
            sqlstate: None,
            message: status.canonical_reason().unwrap_or("error").to_string(),
        }
    }
}

/// Only the length limit is 413; any other read failure (client abort, broken transfer
/// encoding) is a bad request.
pub fn body_error(err: axum::Error) -> AppError {
    let inner = err.into_inner();
    if inner.is::<http_body_util::LengthLimitError>() {
        AppError::PayloadTooLarge
    } else {
        tracing::debug!(error = %inner, "request body read failed");
        AppError::BadRequest(format!("failed to read request body: {inner}"))
    }
}

enum Dispatch {
    Handled(Response),
    PassThrough(Request),
}

async fn dispatch(state: &AppState, request: Request) -> Dispatch {
    let table = state.routing_table();
    let Some(candidates) = table.lookup(request.uri().path()) else {
        return Dispatch::PassThrough(request);
    };
    if !candidates.iter().any(|e| e.descriptor.method.matches(request.method())) {
        return Dispatch::PassThrough(request);
    }
    let response = match handle(state, candidates, request).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    };
    Dispatch::Handled(response)
}

async fn handle(state: &AppState, candidates: &[Endpoint], request: Request) -> Result<Response, AppError> {
    let (mut parts, body) = request.into_parts();
    let identity = Identity::from_request_parts(&mut parts, state).await.unwrap_or_default();
    let query = QueryValues::parse(&parts.uri)?;
    let reads_body = candidates.iter().any(|e| {
        e.descriptor.method.matches(&parts.method) && e.descriptor.param_location == ParamLocation::BodyJson
    });
    let body = if reads_body {
        let bytes = axum::body::to_bytes(body, state.options.max_body_bytes)
            .await
            .map_err(body_error)?;
        RequestBody::parse(&bytes)
    } else {
        RequestBody::Absent
    };

    match select_candidate(candidates, &parts.method, &query, &body, &identity, &state.options) {
        Selection::Matched { endpoint, params } => execute(state, endpoint, &identity, params).await,
        Selection::Unauthorized => Err(AppError::Unauthorized),
        Selection::BadRequest(msg) => Err(AppError::BadRequest(msg)),
        Selection::NotFound => Err(AppError::NotFound(parts.uri.path().to_string())),
    }
}

async fn execute(
    state: &AppState,
    endpoint: &Endpoint,
    identity: &Identity,
    mut params: Vec<CommandParameter>,
) -> Result<Response, AppError> {
    let routine = &endpoint.routine;
    let descriptor = &endpoint.descriptor;
    if let Some(hook) = &state.parameter_hook {
        let ctx = HookContext {
            routine,
            endpoint: descriptor,
            identity,
        };
        hook.before_execute(ctx, &mut params).await?;
    }
    if routine.is_strict && params.iter().any(|p| p.value.is_null()) {
        tracing::debug!(routine = %routine.qualified_name(), "strict routine called with null argument, not executed");
        return Ok(no_content(&descriptor.headers));
    }

    let mut conn = state
        .connections
        .acquire()
        .await
        .map_err(|e| database_error(e, &state.options))?;
    conn.track_backend()
        .await
        .map_err(|e| database_error(e, &state.options))?;
    let call = RoutineExecutor::execute(&mut conn, routine, &params);
    let completed = match descriptor.command_timeout {
        Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| limit),
        None => Ok(call.await),
    };
    let result = match completed {
        Ok(result) => result,
        Err(limit) => {
            tracing::warn!(routine = %routine.qualified_name(), timeout = ?limit, "command timed out");
            conn.cancel().await;
            return Err(AppError::Timeout(limit));
        }
    };
    conn.finish();

    match result.map_err(|e| database_error(e, &state.options))? {
        Outcome::Executed => Ok(no_content(&descriptor.headers)),
        Outcome::Rows(rows) => {
            let rendered = render(endpoint, &rows, state.options.text_response_null_handling)?;
            Ok(routine_response(rendered, &descriptor.headers))
        }
    }
}

/// Layer over a host router: routine URLs are served here, everything else reaches `next` untouched.
pub async fn routine_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    match dispatch(&state, request).await {
        Dispatch::Handled(response) => response,
        Dispatch::PassThrough(request) => next.run(request).await,
    }
}

/// Fallback handler for a standalone router: unknown URLs are 404.
pub async fn routine_fallback(State(state): State<AppState>, request: Request) -> Response {
    let path = request.uri().path().to_string();
    match dispatch(&state, request).await {
        Dispatch::Handled(response) => response,
        Dispatch::PassThrough(_) => AppError::NotFound(path).into_response(),
    }
}
