//! Load options from a JSON file.

use crate::config::{validate, RoutineOptions};
use crate::error::ConfigError;
use std::path::Path;

/// Read and validate options. Missing keys take their defaults.
pub async fn load_options_from_path(path: impl AsRef<Path>) -> Result<RoutineOptions, ConfigError> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {e}", path.display())))?;
    let options = parse_options(&raw)?;
    tracing::debug!(path = %path.display(), "routine options loaded");
    Ok(options)
}

pub fn parse_options(raw: &str) -> Result<RoutineOptions, ConfigError> {
    let options: RoutineOptions = serde_json::from_str(raw).map_err(|e| ConfigError::Load(e.to_string()))?;
    validate(&options)?;
    Ok(options)
}
