//! Caller identity placed in request extensions by the host's authentication layer.

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use std::collections::HashMap;

/// Anonymous unless the host inserted an authenticated `Identity` into the request extensions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Identity {
    pub authenticated: bool,
    pub user: Option<String>,
    pub claims: HashMap<String, String>,
}

impl Identity {
    pub fn anonymous() -> Self {
        Identity::default()
    }

    pub fn authenticated(user: impl Into<String>) -> Self {
        Identity {
            authenticated: true,
            user: Some(user.into()),
            claims: HashMap::new(),
        }
    }

    pub fn with_claim(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.claims.insert(name.into(), value.into());
        self
    }

    pub fn claim(&self, name: &str) -> Option<&str> {
        self.claims.get(name).map(String::as_str)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Identity>().cloned().unwrap_or_default())
    }
}
