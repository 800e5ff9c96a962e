//! Response assembly for routine calls.

use crate::service::RenderedBody;
use axum::{
    http::{header::CONTENT_TYPE, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

/// 200 with the rendered body, or 204; endpoint headers are appended either way.
pub fn routine_response(rendered: RenderedBody, headers: &HeaderMap) -> Response {
    let mut response = match rendered {
        RenderedBody::NoContent => StatusCode::NO_CONTENT.into_response(),
        RenderedBody::Content { content_type, body } => {
            let mut response = (StatusCode::OK, body).into_response();
            match HeaderValue::from_str(&content_type) {
                Ok(value) => {
                    response.headers_mut().insert(CONTENT_TYPE, value);
                }
                Err(_) => tracing::warn!(content_type = %content_type, "invalid content type, using default"),
            }
            response
        }
    };
    for (name, value) in headers {
        response.headers_mut().append(name.clone(), value.clone());
    }
    response
}

pub fn no_content(headers: &HeaderMap) -> Response {
    routine_response(RenderedBody::NoContent, headers)
}
