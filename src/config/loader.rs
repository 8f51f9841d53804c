use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::policy::{PolicyConfig, PolicyOverrides};
use crate::error::ConfigError;

/// Builds policy snapshots from the built-in tables plus an optional override
/// document (TOML, or JSON when the file name ends in `.json`).
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    /// A loader that never reads a document
    pub fn builtin_only() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Build a snapshot, falling back to the built-in tables on any error.
    pub fn load(&self) -> PolicyConfig {
        match self.try_load() {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "invalid policy document, using built-in policy");
                PolicyConfig::builtin()
            }
        }
    }

    /// Build a snapshot, surfacing a malformed document as an error.
    ///
    /// A missing or unreadable document is not an error: the built-in policy
    /// is returned and the condition is logged.
    pub fn try_load(&self) -> Result<PolicyConfig, ConfigError> {
        let base = PolicyConfig::builtin();

        let Some(path) = &self.path else {
            debug!("no policy document configured, using built-in policy");
            return Ok(base);
        };

        let overrides = match read_document(path) {
            Ok(overrides) => overrides,
            Err(ConfigError::Read { path, source }) => {
                if source.kind() == std::io::ErrorKind::NotFound {
                    info!(path = %path.display(), "policy document not found, using built-in policy");
                } else {
                    warn!(path = %path.display(), error = %source, "policy document unreadable, using built-in policy");
                }
                return Ok(base);
            }
            Err(e) => return Err(e),
        };

        let config = base.with_overrides(overrides)?;
        info!(path = %path.display(), "loaded policy document");
        Ok(config)
    }
}

fn read_document(path: &Path) -> Result<PolicyOverrides, ConfigError> {
    let bytes = std::fs::read(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    // bad encoding is a malformed document, not an unreadable one
    let content = String::from_utf8(bytes).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    parse_document(path, &content)
}

fn parse_document(path: &Path, content: &str) -> Result<PolicyOverrides, ConfigError> {
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let parsed: Result<PolicyOverrides, String> = if is_json {
        serde_json::from_str(content).map_err(|e| e.to_string())
    } else {
        toml::from_str(content).map_err(|e| e.to_string())
    };

    parsed.map_err(|reason| ConfigError::Parse {
        path: path.to_path_buf(),
        reason,
    })
}
