//! Identifier conversion: routine/parameter names (snake_case) to API names (camelCase) and URL segments (kebab-case).

use serde::{Deserialize, Serialize};

/// How parameter and result column names are exposed to HTTP clients.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameCase {
    /// `_user_id` -> `userId`
    #[default]
    CamelCase,
    /// Names used exactly as declared in the database.
    Original,
}

impl NameCase {
    pub fn convert(self, name: &str) -> String {
        match self {
            NameCase::CamelCase => to_camel_case(name),
            NameCase::Original => name.to_string(),
        }
    }
}

/// Convert a single identifier from snake_case to camelCase. Leading underscores are dropped.
/// e.g. "user_id" -> "userId", "_created_at" -> "createdAt"
pub fn to_camel_case(s: &str) -> String {
    let trimmed = s.trim_start_matches('_');
    let mut out = String::with_capacity(trimmed.len());
    let mut capitalize_next = false;
    for c in trimmed.chars() {
        if c == '_' {
            capitalize_next = !out.is_empty();
        } else if capitalize_next {
            out.extend(c.to_uppercase());
            capitalize_next = false;
        } else if out.is_empty() {
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Convert a single identifier to kebab-case for URL segments.
/// e.g. "get_user_by_id" -> "get-user-by-id", "MySchema" -> "my-schema"
pub fn to_kebab_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    let mut prev_lower = false;
    for c in s.chars() {
        if c == '_' || c == '-' || c.is_whitespace() {
            if !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
            prev_lower = false;
        } else if c.is_uppercase() {
            if prev_lower && !out.ends_with('-') {
                out.push('-');
            }
            out.extend(c.to_lowercase());
            prev_lower = false;
        } else {
            out.push(c);
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}
