//! Editor settings loaded from `editor.toml`.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use workbench_core::undo::DEFAULT_MAX_UNDO;

use crate::version::ServerVersion;

/// Settings shared by all object editors.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Target server version used when the catalog carries none.
    pub default_server_version: String,
    pub max_undo: usize,
    /// Case sensitivity of identifiers when the object does not say.
    pub case_sensitive: bool,
    /// Members whose changes never trigger a refresh, in addition to the
    /// change timestamp.
    pub extra_ignored_fields: Vec<String>,
    /// `env_logger` filter directive.
    pub log_filter: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            default_server_version: "8.0.16".into(),
            max_undo: DEFAULT_MAX_UNDO,
            case_sensitive: true,
            extra_ignored_fields: Vec::new(),
            log_filter: "info".into(),
        }
    }
}

impl EditorConfig {
    /// The configured default version, falling back to 8.0.16 if the
    /// setting does not parse.
    pub fn default_version(&self) -> ServerVersion {
        self.default_server_version.parse().unwrap_or_else(|e| {
            log::warn!("{e}, using 8.0.16");
            ServerVersion::new(8, 0, 16)
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Loads editor settings from a TOML file.
pub fn load_config(path: &Path) -> Result<EditorConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_owned(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_owned(),
        source,
    })
}

/// Loads editor settings, using the defaults if the file is missing or
/// malformed.
pub fn load_or_default(path: &Path) -> EditorConfig {
    match load_config(path) {
        Ok(config) => config,
        Err(ConfigError::Read { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
            log::debug!("{} not found, using default editor settings", path.display());
            EditorConfig::default()
        }
        Err(e) => {
            log::warn!("{e}, using default editor settings");
            EditorConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(text: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let file = write_config("max_undo = 5\nextra_ignored_fields = [\"modelOnly\"]\n");
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.max_undo, 5);
        assert_eq!(config.extra_ignored_fields, vec!["modelOnly".to_owned()]);
        assert_eq!(config.default_server_version, "8.0.16");
        assert!(config.case_sensitive);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let file = write_config("max_undo = \"lots\"");
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::Parse { .. })
        ));
        assert_eq!(load_or_default(file.path()), EditorConfig::default());
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_or_default(&dir.path().join("editor.toml"));
        assert_eq!(config, EditorConfig::default());
    }

    #[test]
    fn bad_version_falls_back() {
        let config = EditorConfig {
            default_server_version: "eight".into(),
            ..EditorConfig::default()
        };
        assert_eq!(config.default_version(), ServerVersion::new(8, 0, 16));
    }
}
