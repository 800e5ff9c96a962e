//! Options validation before the catalog is read.

use crate::config::RoutineOptions;
use crate::error::ConfigError;
use axum::http::StatusCode;

pub fn validate(options: &RoutineOptions) -> Result<(), ConfigError> {
    let prefix = options.url_prefix.as_str();
    if !prefix.is_empty() && (!prefix.starts_with('/') || prefix.ends_with('/')) {
        return Err(ConfigError::InvalidOption {
            option: "url_prefix",
            reason: format!("{prefix:?} must start with '/' and not end with '/'"),
        });
    }
    if prefix.contains('?') || prefix.contains('#') {
        return Err(ConfigError::InvalidOption {
            option: "url_prefix",
            reason: format!("{prefix:?} must be a plain path"),
        });
    }

    for (sqlstate, status) in &options.error_codes {
        if sqlstate.len() != 5 || !sqlstate.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::InvalidOption {
                option: "error_codes",
                reason: format!("{sqlstate:?} is not a SQLSTATE code"),
            });
        }
        if StatusCode::from_u16(*status).is_err() {
            return Err(ConfigError::InvalidOption {
                option: "error_codes",
                reason: format!("{status} is not an HTTP status"),
            });
        }
    }

    if options.command_timeout == Some(0) {
        return Err(ConfigError::InvalidOption {
            option: "command_timeout",
            reason: "must be positive".into(),
        });
    }
    if options.max_body_bytes == 0 {
        return Err(ConfigError::InvalidOption {
            option: "max_body_bytes",
            reason: "must be positive".into(),
        });
    }
    if matches!(options.custom_routine_query.as_deref(), Some(q) if q.trim().is_empty()) {
        return Err(ConfigError::InvalidOption {
            option: "custom_routine_query",
            reason: "empty query".into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate(&RoutineOptions::default()).is_ok());
        let no_prefix = RoutineOptions {
            url_prefix: String::new(),
            ..Default::default()
        };
        assert!(validate(&no_prefix).is_ok());
    }

    #[test]
    fn rejects_bad_prefix() {
        for prefix in ["api", "/api/", "/api?x=1"] {
            let opts = RoutineOptions {
                url_prefix: prefix.into(),
                ..Default::default()
            };
            assert!(
                matches!(validate(&opts), Err(ConfigError::InvalidOption { option: "url_prefix", .. })),
                "{prefix}"
            );
        }
    }

    #[test]
    fn rejects_bad_error_codes() {
        let mut opts = RoutineOptions::default();
        opts.error_codes.insert("4250".into(), 403);
        assert!(validate(&opts).is_err());

        let mut opts = RoutineOptions::default();
        opts.error_codes.insert("23505".into(), 1000);
        assert!(validate(&opts).is_err());
    }

    #[test]
    fn rejects_zero_limits() {
        let opts = RoutineOptions {
            command_timeout: Some(0),
            ..Default::default()
        };
        assert!(validate(&opts).is_err());
        let opts = RoutineOptions {
            max_body_bytes: 0,
            ..Default::default()
        };
        assert!(validate(&opts).is_err());
    }
}
