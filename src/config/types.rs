//! Options controlling discovery, endpoint synthesis and request handling.

use crate::case::NameCase;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Whether routine comments are read and which routines become endpoints.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentsMode {
    /// Every routine becomes an endpoint; comments are not read.
    Ignore,
    /// Every routine becomes an endpoint; comment directives apply.
    ParseAll,
    /// Only routines whose comment carries an `HTTP` line become endpoints.
    #[default]
    OnlyWithHttpTag,
}

/// Query-string values that are bound as NULL.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStringNullHandling {
    /// Empty values are NULL except for text parameters.
    #[default]
    Ignore,
    /// Empty values are NULL for every parameter, text included.
    EmptyString,
    /// The literal `null` is NULL.
    NullLiteral,
}

/// Response for a scalar routine returning NULL.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextResponseNullHandling {
    #[default]
    EmptyString,
    NullLiteral,
    NoContent,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutineOptions {
    /// Prepended to generated URLs. Empty or `/`-prefixed, no trailing `/`.
    pub url_prefix: String,
    pub include_schemas: Vec<String>,
    pub exclude_schemas: Vec<String>,
    pub schema_similar_to: Option<String>,
    pub schema_not_similar_to: Option<String>,
    pub include_names: Vec<String>,
    pub exclude_names: Vec<String>,
    pub name_similar_to: Option<String>,
    pub name_not_similar_to: Option<String>,
    /// Replaces the built-in catalog query; receives the same eight bind parameters.
    pub custom_routine_query: Option<String>,
    pub comments_mode: CommentsMode,
    pub name_case: NameCase,
    /// Every endpoint requires an authenticated caller unless its comment says `ALLOW_ANONYMOUS`.
    pub require_authorization: bool,
    /// Seconds. `None` leaves commands unbounded.
    pub command_timeout: Option<u64>,
    pub query_string_null_handling: QueryStringNullHandling,
    pub text_response_null_handling: TextResponseNullHandling,
    /// SQLSTATE -> HTTP status.
    pub error_codes: HashMap<String, u16>,
    /// Include database error messages in responses. Off by default.
    pub expose_error_messages: bool,
    pub max_body_bytes: usize,
}

impl Default for RoutineOptions {
    fn default() -> Self {
        RoutineOptions {
            url_prefix: "/api".into(),
            include_schemas: Vec::new(),
            exclude_schemas: Vec::new(),
            schema_similar_to: None,
            schema_not_similar_to: None,
            include_names: Vec::new(),
            exclude_names: Vec::new(),
            name_similar_to: None,
            name_not_similar_to: None,
            custom_routine_query: None,
            comments_mode: CommentsMode::default(),
            name_case: NameCase::default(),
            require_authorization: false,
            command_timeout: None,
            query_string_null_handling: QueryStringNullHandling::default(),
            text_response_null_handling: TextResponseNullHandling::default(),
            error_codes: default_error_codes(),
            expose_error_messages: false,
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

impl RoutineOptions {
    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout.map(Duration::from_secs)
    }
}

pub fn default_error_codes() -> HashMap<String, u16> {
    [("42501", 403), ("57014", 504), ("P0001", 400), ("P0004", 400)]
        .into_iter()
        .map(|(code, status)| (code.to_string(), status))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let opts: RoutineOptions = serde_json::from_str(
            r#"{"include_schemas":["app"],"comments_mode":"parse_all","command_timeout":5}"#,
        )
        .unwrap();
        assert_eq!(opts.include_schemas, vec!["app".to_string()]);
        assert_eq!(opts.comments_mode, CommentsMode::ParseAll);
        assert_eq!(opts.command_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(opts.url_prefix, "/api");
        assert_eq!(opts.name_case, NameCase::CamelCase);
        assert_eq!(opts.error_codes.get("42501"), Some(&403));
        assert!(!opts.expose_error_messages);
    }

    #[test]
    fn default_error_code_table() {
        let codes = default_error_codes();
        assert_eq!(codes.len(), 4);
        assert_eq!(codes["57014"], 504);
        assert_eq!(codes["P0001"], 400);
        assert_eq!(codes["P0004"], 400);
    }
}
