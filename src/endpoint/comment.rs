//! Routine comment directives.
//!
//! One directive per line, first token case-insensitive:
//! `HTTP [METHOD] [PATH]`, `PATH <path>`, `REQUEST_PARAM_TYPE|PARAM_TYPE <QUERY_STRING|BODY_JSON>`,
//! `AUTHORIZE|REQUIRES_AUTHORIZATION`, `ALLOW_ANONYMOUS`, `COMMAND_TIMEOUT|TIMEOUT <seconds>`,
//! and `Name: value` response headers.

use crate::endpoint::{HttpMethod, ParamLocation};
use axum::http::uri::PathAndQuery;
use axum::http::{HeaderName, HeaderValue};
use std::time::Duration;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq)]
pub enum Directive {
    Http {
        method: Option<HttpMethod>,
        path: Option<String>,
    },
    Path(String),
    ParamLocation(ParamLocation),
    Authorize,
    AllowAnonymous,
    CommandTimeout(Duration),
    ContentType(String),
    Header(HeaderName, HeaderValue),
}

#[derive(Error, Clone, Debug, PartialEq)]
pub enum DirectiveError {
    #[error("unknown HTTP method {0:?}")]
    UnknownMethod(String),
    #[error("invalid path {0:?}")]
    InvalidPath(String),
    #[error("invalid parameter location {0:?}")]
    InvalidParamLocation(String),
    #[error("invalid command timeout {0:?}")]
    InvalidTimeout(String),
    #[error("invalid header {0:?}")]
    InvalidHeader(String),
    #[error("{0} requires an argument")]
    MissingArgument(&'static str),
}

/// Result of one comment line. An `HTTP` line with a bad method still yields its
/// directive (the routine stays eligible) alongside the error.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedLine {
    pub line: String,
    pub directive: Option<Directive>,
    pub errors: Vec<DirectiveError>,
}

/// Parse every directive line of a comment. Free text without a colon is skipped.
pub fn parse_comment(comment: &str) -> Vec<ParsedLine> {
    comment
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter_map(parse_line)
        .collect()
}

pub fn parse_line(line: &str) -> Option<ParsedLine> {
    let mut tokens = line.split_whitespace();
    let first = tokens.next()?;
    let args: Vec<&str> = tokens.collect();
    let outcome = match first.to_ascii_uppercase().as_str() {
        "HTTP" => {
            let (directive, errors) = parse_http(&args);
            return Some(ParsedLine {
                line: line.to_string(),
                directive: Some(directive),
                errors,
            });
        }
        "PATH" => parse_path(&args),
        "REQUEST_PARAM_TYPE" | "PARAM_TYPE" => parse_param_location(&args),
        "AUTHORIZE" | "REQUIRES_AUTHORIZATION" => Ok(Directive::Authorize),
        "ALLOW_ANONYMOUS" => Ok(Directive::AllowAnonymous),
        "COMMAND_TIMEOUT" | "TIMEOUT" => parse_timeout(&args),
        _ if line.contains(':') => parse_header(line),
        _ => return None,
    };
    Some(match outcome {
        Ok(d) => ParsedLine {
            line: line.to_string(),
            directive: Some(d),
            errors: Vec::new(),
        },
        Err(e) => ParsedLine {
            line: line.to_string(),
            directive: None,
            errors: vec![e],
        },
    })
}

/// `HTTP`, `HTTP GET`, `HTTP GET /path`, `HTTP /path`, `HTTP users/list`.
fn parse_http(args: &[&str]) -> (Directive, Vec<DirectiveError>) {
    let mut errors = Vec::new();
    let mut method = None;
    let mut path = None;
    let mut rest = args;
    if let Some(first) = rest.first() {
        match HttpMethod::parse(first) {
            Some(m) => {
                method = Some(m);
                rest = &rest[1..];
            }
            // not a method but path-like: the path without its leading slash
            None if first.contains('/') => {}
            None => {
                errors.push(DirectiveError::UnknownMethod(first.to_string()));
                rest = &rest[1..];
            }
        }
    }
    if let Some(p) = rest.first() {
        match normalize_path(p) {
            Ok(p) => path = Some(p),
            Err(e) => errors.push(e),
        }
    }
    (Directive::Http { method, path }, errors)
}

fn parse_path(args: &[&str]) -> Result<Directive, DirectiveError> {
    let p = args.first().ok_or(DirectiveError::MissingArgument("PATH"))?;
    normalize_path(p).map(Directive::Path)
}

/// Absolute path with a leading `/`; no query or fragment.
pub fn normalize_path(raw: &str) -> Result<String, DirectiveError> {
    let path = if raw.starts_with('/') {
        raw.to_string()
    } else {
        format!("/{raw}")
    };
    if path.contains('#') {
        return Err(DirectiveError::InvalidPath(raw.to_string()));
    }
    match path.parse::<PathAndQuery>() {
        Ok(pq) if pq.query().is_none() => Ok(path),
        _ => Err(DirectiveError::InvalidPath(raw.to_string())),
    }
}

fn parse_param_location(args: &[&str]) -> Result<Directive, DirectiveError> {
    let raw = args.first().ok_or(DirectiveError::MissingArgument("PARAM_TYPE"))?;
    let location = match raw.to_ascii_lowercase().replace(['_', '-'], "").as_str() {
        "querystring" | "qs" | "query" => ParamLocation::QueryString,
        "bodyjson" | "json" | "body" => ParamLocation::BodyJson,
        _ => return Err(DirectiveError::InvalidParamLocation(raw.to_string())),
    };
    Ok(Directive::ParamLocation(location))
}

fn parse_timeout(args: &[&str]) -> Result<Directive, DirectiveError> {
    let raw = args.first().ok_or(DirectiveError::MissingArgument("COMMAND_TIMEOUT"))?;
    match raw.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Directive::CommandTimeout(Duration::from_secs(secs))),
        _ => Err(DirectiveError::InvalidTimeout(raw.to_string())),
    }
}

/// `Name: value`. `Content-Type` becomes the response content type.
fn parse_header(line: &str) -> Result<Directive, DirectiveError> {
    let invalid = || DirectiveError::InvalidHeader(line.to_string());
    let (name, value) = line.split_once(':').ok_or_else(invalid)?;
    let (name, value) = (name.trim(), value.trim());
    let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
    if name == axum::http::header::CONTENT_TYPE {
        if value.is_empty() {
            return Err(invalid());
        }
        return Ok(Directive::ContentType(value.to_string()));
    }
    let value = HeaderValue::from_str(value).map_err(|_| invalid())?;
    Ok(Directive::Header(name, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directive(line: &str) -> Option<Directive> {
        parse_line(line).and_then(|p| p.directive)
    }

    #[test]
    fn http_line_variants() {
        assert_eq!(directive("HTTP"), Some(Directive::Http { method: None, path: None }));
        assert_eq!(
            directive("http get"),
            Some(Directive::Http {
                method: Some(HttpMethod::Get),
                path: None
            })
        );
        assert_eq!(
            directive("HTTP PUT /users/update"),
            Some(Directive::Http {
                method: Some(HttpMethod::Put),
                path: Some("/users/update".into())
            })
        );
        assert_eq!(
            directive("HTTP /only-path"),
            Some(Directive::Http {
                method: None,
                path: Some("/only-path".into())
            })
        );
    }

    #[test]
    fn relative_path_without_method() {
        assert_eq!(
            directive("HTTP users/list"),
            Some(Directive::Http {
                method: None,
                path: Some("/users/list".into())
            })
        );
        let parsed = parse_line("HTTP FETCH users/list").unwrap();
        assert_eq!(
            parsed.directive,
            Some(Directive::Http {
                method: None,
                path: Some("/users/list".into())
            })
        );
        assert_eq!(parsed.errors, vec![DirectiveError::UnknownMethod("FETCH".into())]);
    }

    #[test]
    fn bad_method_keeps_http_tag() {
        let parsed = parse_line("HTTP FETCH").unwrap();
        assert_eq!(parsed.directive, Some(Directive::Http { method: None, path: None }));
        assert_eq!(parsed.errors, vec![DirectiveError::UnknownMethod("FETCH".into())]);
    }

    #[test]
    fn path_gets_leading_slash_and_rejects_queries() {
        assert_eq!(directive("PATH new-path"), Some(Directive::Path("/new-path".into())));
        assert_eq!(directive("path /a/b"), Some(Directive::Path("/a/b".into())));
        let parsed = parse_line("PATH /a?b=1").unwrap();
        assert_eq!(parsed.directive, None);
        assert!(matches!(parsed.errors[0], DirectiveError::InvalidPath(_)));
        assert!(parse_line("PATH").unwrap().errors[0] == DirectiveError::MissingArgument("PATH"));
    }

    #[test]
    fn parameter_location_spellings() {
        for raw in ["QUERY_STRING", "querystring", "qs"] {
            assert_eq!(
                directive(&format!("REQUEST_PARAM_TYPE {raw}")),
                Some(Directive::ParamLocation(ParamLocation::QueryString))
            );
        }
        for raw in ["BODY_JSON", "bodyjson", "json", "body"] {
            assert_eq!(
                directive(&format!("PARAM_TYPE {raw}")),
                Some(Directive::ParamLocation(ParamLocation::BodyJson))
            );
        }
        assert!(directive("PARAM_TYPE form").is_none());
    }

    #[test]
    fn timeouts() {
        assert_eq!(
            directive("COMMAND_TIMEOUT 30"),
            Some(Directive::CommandTimeout(Duration::from_secs(30)))
        );
        assert_eq!(directive("timeout 5"), Some(Directive::CommandTimeout(Duration::from_secs(5))));
        for bad in ["TIMEOUT abc", "TIMEOUT -1", "TIMEOUT 0", "TIMEOUT 1.5"] {
            let parsed = parse_line(bad).unwrap();
            assert!(parsed.directive.is_none(), "{bad}");
            assert!(matches!(parsed.errors[0], DirectiveError::InvalidTimeout(_)), "{bad}");
        }
    }

    #[test]
    fn headers_and_content_type() {
        assert_eq!(
            directive("Cache-Control: no-store"),
            Some(Directive::Header(
                HeaderName::from_static("cache-control"),
                HeaderValue::from_static("no-store")
            ))
        );
        assert_eq!(
            directive("Content-Type: text/csv"),
            Some(Directive::ContentType("text/csv".into()))
        );
        let parsed = parse_line("Returns all users: active only").unwrap();
        assert!(parsed.directive.is_none());
        assert!(matches!(parsed.errors[0], DirectiveError::InvalidHeader(_)));
    }

    #[test]
    fn free_text_is_skipped() {
        let parsed = parse_comment("Lists users.\n\nHTTP GET\nauthorize\n");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].directive, Some(Directive::Authorize));
    }
}
