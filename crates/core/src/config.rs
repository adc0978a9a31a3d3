//! Compiler configuration.
//!
//! Every setting has a default, so an empty file (or no file at all) is a
//! valid configuration.
//!
//! # Example
//!
//! ```toml
//! [eval]
//! max_generations = 50
//!
//! [transform]
//! external_field_meta = "struct.field.external"
//! helper_prefix = "transform"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CompileError;

// ── Types ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileConfig {
    pub eval: EvalSettings,
    pub transform: TransformSettings,
}

/// `[eval]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalSettings {
    /// Rounds of generated declarations executed before giving up.
    pub max_generations: usize,
    /// Metadata key pinning the view used when projecting a nested result.
    pub view_meta: String,
}

impl Default for EvalSettings {
    fn default() -> Self {
        EvalSettings {
            max_generations: 100,
            view_meta: "view".to_string(),
        }
    }
}

/// `[transform]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformSettings {
    /// Metadata key naming the external field an attribute maps to.
    pub external_field_meta: String,
    /// Prefix of generated conversion helper names.
    pub helper_prefix: String,
}

impl Default for TransformSettings {
    fn default() -> Self {
        TransformSettings {
            external_field_meta: "struct.field.external".to_string(),
            helper_prefix: "transform".to_string(),
        }
    }
}

// ── Functions ─────────────────────────────────────────────────────────────────

impl CompileConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, CompileError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a configuration file.
    pub fn from_file(path: &Path) -> Result<Self, CompileError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_config_uses_defaults() {
        let config = CompileConfig::from_toml("").unwrap();
        assert_eq!(config, CompileConfig::default());
        assert_eq!(config.eval.max_generations, 100);
        assert_eq!(config.transform.external_field_meta, "struct.field.external");
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config = CompileConfig::from_toml("[eval]\nmax_generations = 3\n").unwrap();
        assert_eq!(config.eval.max_generations, 3);
        assert_eq!(config.eval.view_meta, "view");
        assert_eq!(config.transform.helper_prefix, "transform");
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let err = CompileConfig::from_toml("[eval\n").unwrap_err();
        assert!(matches!(err, CompileError::Config(_)));
    }

    #[test]
    fn reads_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[transform]\nhelper_prefix = \"map\"").unwrap();
        let config = CompileConfig::from_file(file.path()).unwrap();
        assert_eq!(config.transform.helper_prefix, "map");
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = CompileConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, CompileError::Io(_)));
    }
}
