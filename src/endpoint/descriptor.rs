//! HTTP contract of one routine.

use axum::http::{HeaderMap, Method};
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    /// Case-insensitive; only the five methods an endpoint may use.
    pub fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_uppercase().as_str() {
            "GET" => Some(HttpMethod::Get),
            "POST" => Some(HttpMethod::Post),
            "PUT" => Some(HttpMethod::Put),
            "PATCH" => Some(HttpMethod::Patch),
            "DELETE" => Some(HttpMethod::Delete),
            _ => None,
        }
    }

    pub fn as_method(self) -> Method {
        match self {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
        }
    }

    pub fn matches(self, method: &Method) -> bool {
        self.as_method() == *method
    }

    /// Where parameters are read from when no directive says otherwise.
    pub fn default_location(self) -> ParamLocation {
        match self {
            HttpMethod::Get => ParamLocation::QueryString,
            _ => ParamLocation::BodyJson,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamLocation {
    QueryString,
    BodyJson,
}

#[derive(Clone, Debug)]
pub struct EndpointDescriptor {
    pub url: String,
    pub method: HttpMethod,
    pub param_location: ParamLocation,
    pub requires_authorization: bool,
    /// Converted parameter names, positional.
    pub param_names: Vec<String>,
    /// Converted result column names, positional.
    pub column_names: Vec<String>,
    pub command_timeout: Option<Duration>,
    pub content_type: Option<String>,
    /// Extra response headers; repeated names accumulate.
    pub headers: HeaderMap,
}
