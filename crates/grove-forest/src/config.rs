//! Forest configuration, loadable from TOML.
//!
//! ```toml
//! name = "inventory"
//!
//! [validation]
//! enabled = true
//! lock_initial_form = true
//! ```

use crate::error::ConfigError;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub name: String,
    pub validation: ValidationConfig,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            name: "forest".to_string(),
            validation: ValidationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Run the validation cascade after mutations.
    pub enabled: bool,
    /// Lock a node to its initial form when it is created without a form
    /// or type rule.
    pub lock_initial_form: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lock_initial_form: true,
        }
    }
}

impl ForestConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Self::parse(text, "<inline>")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::parse(&text, &path.display().to_string())
    }

    fn parse(text: &str, path: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::ParseToml {
            path: path.to_string(),
            source,
        })
    }
}
