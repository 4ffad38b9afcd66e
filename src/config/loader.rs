//! Mount mapping loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::MountTableConfig;
use crate::config::validation::{validate_mounts, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON mount mapping: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid TOML mount mapping: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid environment: {0}")]
    Env(#[source] envy::Error),

    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate a mount mapping. `.toml` files are read as TOML,
/// anything else as JSON.
pub fn load_mounts(path: &Path) -> Result<MountTableConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mounts: MountTableConfig = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(&content)?,
        _ => serde_json::from_str(&content)?,
    };

    validate_mounts(&mounts).map_err(ConfigError::Validation)?;

    tracing::info!(path = %path.display(), mounts = mounts.len(), "Mount mapping loaded");
    Ok(mounts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_json_by_default() {
        let file = write_temp(".json", r#"{"/a": "file:///a", "/b": "file:///b"}"#);
        let mounts = load_mounts(file.path()).unwrap();
        assert_eq!(mounts.len(), 2);
    }

    #[test]
    fn loads_toml_by_extension() {
        let file = write_temp(".toml", "\"/a\" = { source = \"file:///a\", cors = false }\n");
        let mounts = load_mounts(file.path()).unwrap();
        assert!(!mounts.iter().next().unwrap().1.flags().cors);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_mounts(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn validation_errors_are_collected() {
        let file = write_temp(".json", r#"{"a": "file:///a", "/b/": "file:///b", "/b": "file:///c"}"#);
        match load_mounts(file.path()).unwrap_err() {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }
}
