//! Mount mapping validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Prefix shape and uniqueness after normalization
//! - Source specs must resolve to a URL
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Overlapping prefixes are allowed; first registered wins at runtime

use std::collections::HashSet;

use crate::config::schema::MountTableConfig;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("prefix '{prefix}' {reason}")]
    InvalidPrefix { prefix: String, reason: &'static str },

    #[error("prefix '{0}' is mounted more than once")]
    DuplicatePrefix(String),

    #[error("source for '{prefix}' is invalid: {reason}")]
    InvalidSource { prefix: String, reason: String },
}

/// Canonical mount prefix: no trailing slash, root is the empty string.
pub fn normalize_prefix(prefix: &str) -> String {
    prefix.trim_end_matches('/').to_string()
}

pub fn validate_mounts(mounts: &MountTableConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for (prefix, spec) in mounts.iter() {
        let normalized = normalize_prefix(prefix);
        if !normalized.is_empty() && !normalized.starts_with('/') {
            errors.push(ValidationError::InvalidPrefix {
                prefix: prefix.to_string(),
                reason: "must start with '/'",
            });
        } else if normalized.contains(&['?', '#'][..]) || normalized.chars().any(char::is_whitespace) {
            errors.push(ValidationError::InvalidPrefix {
                prefix: prefix.to_string(),
                reason: "must be a plain URL path",
            });
        } else if !seen.insert(normalized.clone()) {
            errors.push(ValidationError::DuplicatePrefix(prefix.to_string()));
        }

        if let Err(e) = spec.source().to_url() {
            errors.push(ValidationError::InvalidSource {
                prefix: prefix.to_string(),
                reason: e.to_string(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
