use std::path::PathBuf;

use serde::Deserialize;

use crate::error::EngineError;

/// Root configuration, parsed from TOML.
///
/// ```toml
/// [[transforms]]
/// name = "cast_amount"
/// plugin = "/usr/lib/recast/libtransform_cast_decimal.so"
/// config = { field = "amount", scale = 4 }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PipelineConfig {
    /// What to do with a record a transform rejects.
    #[serde(default)]
    pub on_error: ErrorPolicy,

    /// Transforms, applied in declaration order.
    #[serde(default)]
    pub transforms: Vec<TransformConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransformConfig {
    pub name: String,
    /// Path to the transform's shared library.
    pub plugin: PathBuf,
    #[serde(default)]
    pub config: Option<toml::Value>,
}

impl TransformConfig {
    /// Plugin options as a format-independent value, ready for `parse_plugin_config`.
    pub fn config_json(&self) -> Result<Option<serde_json::Value>, EngineError> {
        self.config
            .as_ref()
            .map(|v| {
                serde_json::to_value(v).map_err(|e| {
                    EngineError::Config(format!("transform '{}': {e}", self.name))
                })
            })
            .transpose()
    }
}

/// Per-record failure policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Stop at the first failing record.
    #[default]
    Fail,
    /// Log the failure and drop the record.
    Skip,
}

impl PipelineConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &std::path::Path) -> Result<Self, EngineError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, EngineError> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| EngineError::Config(e.to_string()))?;
        config.check_names()?;
        Ok(config)
    }

    fn check_names(&self) -> Result<(), EngineError> {
        let mut seen = std::collections::HashSet::new();
        for t in &self.transforms {
            if t.name.is_empty() {
                return Err(EngineError::Config("transform name must not be empty".into()));
            }
            if !seen.insert(t.name.as_str()) {
                return Err(EngineError::Config(format!(
                    "duplicate transform name '{}'",
                    t.name
                )));
            }
        }
        Ok(())
    }
}
