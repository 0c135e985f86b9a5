//! # Configuration
//!
//! Optional `materia.toml`, overridden by command-line flags.
//!
//! ```toml
//! [storage]
//! backend = "json"        # json | redb | memory
//! path = "materia_data"   # directory for json, file for redb
//! backup = true
//!
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//! ```
//!
//! Secrets never live here: `MATERIA_API_KEY` and `MATERIA_CORS_ORIGINS` are
//! read from the environment by the API layer.

use materia_core::{BackendKind, MateriaError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "materia.toml";

/// Maximum accepted configuration file size (1 MiB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

/// `[storage]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub backend: BackendKind,
    pub path: Option<PathBuf>,
    pub backup: bool,
}

impl StorageConfig {
    /// The configured path, or the backend's default location.
    #[must_use]
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| match self.backend {
            BackendKind::Redb => PathBuf::from("materia.redb"),
            BackendKind::Json | BackendKind::Memory => PathBuf::from("materia_data"),
        })
    }
}

/// `[server]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Full application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MateriaConfig {
    pub storage: StorageConfig,
    pub server: ServerConfig,
}

impl MateriaConfig {
    /// Parse a configuration document.
    pub fn from_toml(text: &str) -> Result<Self, MateriaError> {
        toml::from_str(text).map_err(|e| MateriaError::InvalidConfig(e.to_string()))
    }

    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, `materia.toml` in the working
    /// directory is used when present, defaults otherwise.
    pub fn load(explicit: Option<&Path>) -> Result<Self, MateriaError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !fallback.is_file() {
                    return Ok(Self::default());
                }
                fallback
            }
        };

        let metadata = std::fs::metadata(&path).map_err(|e| {
            MateriaError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(MateriaError::InvalidConfig(format!(
                "{} is {} bytes, maximum is {}",
                path.display(),
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }

        let text = std::fs::read_to_string(&path).map_err(|e| {
            MateriaError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml(&text)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Apply command-line overrides.
    pub fn with_overrides(
        mut self,
        database: Option<PathBuf>,
        backend: Option<&str>,
    ) -> Result<Self, MateriaError> {
        if let Some(raw) = backend {
            self.storage.backend = BackendKind::parse(raw)?;
        }
        if database.is_some() {
            self.storage.path = database;
        }
        Ok(self)
    }
}

// =============================================================================
// TESTS
// =============================================================================
