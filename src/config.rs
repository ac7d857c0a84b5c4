//! Run configuration
//!
//! Layered lowest to highest: built-in defaults, an optional YAML file,
//! then whatever the caller supplies (the binary passes environment and
//! command-line values through [`RunConfig::with_overrides`]).
//!
//! ```yaml
//! context: calibration
//! debug: false
//! log_filter: tsblender=info
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::engine::Engine;
use crate::error::{TsError, TsResult};

pub const DEFAULT_LOG_FILTER: &str = "tsblender=info";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Run context; when absent the SETTINGS block's CONTEXT is used
    pub context: Option<String>,
    pub debug: bool,
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            context: None,
            debug: false,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl RunConfig {
    /// Defaults, or the YAML file at `path` layered over them
    pub fn load(path: Option<&Path>) -> TsResult<Self> {
        match path {
            Some(path) => Self::from_yaml_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> TsResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| TsError::io(path, e))?;
        Self::from_yaml_str(&content, path)
    }

    /// `origin` names the source in error messages
    pub fn from_yaml_str(content: &str, origin: impl Into<PathBuf>) -> TsResult<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: RunConfig = serde_yaml::from_str(content)
            .map_err(|e| TsError::reader(origin, format!("invalid run configuration: {e}")))?;
        Ok(config.normalized())
    }

    /// A present `context` replaces the configured one; `debug` can only
    /// switch debugging on
    pub fn with_overrides(mut self, context: Option<String>, debug: bool) -> Self {
        if let Some(context) = context {
            self.context = Some(context);
        }
        self.debug |= debug;
        self.normalized()
    }

    /// Engine for control files under `base_dir`
    pub fn engine(&self, base_dir: impl Into<PathBuf>) -> Engine {
        Engine::new(base_dir)
            .with_context(self.context.clone())
            .with_debug(self.debug)
    }

    fn normalized(mut self) -> Self {
        self.context = self
            .context
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        if self.log_filter.trim().is_empty() {
            self.log_filter = DEFAULT_LOG_FILTER.to_string();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = RunConfig::load(None).unwrap();
        assert_eq!(config.context, None);
        assert!(!config.debug);
        assert_eq!(config.log_filter, "tsblender=info");
    }

    #[test]
    fn test_yaml_file_layers_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.yaml");
        std::fs::write(&path, "context: calib\n").unwrap();
        let config = RunConfig::from_yaml_file(&path).unwrap();
        assert_eq!(config.context.as_deref(), Some("calib"));
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = RunConfig::from_yaml_str("contxt: calib\n", "run.yaml");
        assert!(matches!(result, Err(TsError::Reader { .. })));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = RunConfig::from_yaml_file("/definitely/not/here.yaml");
        assert!(matches!(result, Err(TsError::Io { .. })));
    }

    #[test]
    fn test_overrides_win() {
        let config = RunConfig::from_yaml_str("context: calib\ndebug: true\nlog_filter: ''\n", "run.yaml")
            .unwrap()
            .with_overrides(Some("pred".into()), false);
        assert_eq!(config.context.as_deref(), Some("pred"));
        assert!(config.debug);
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);

        let config = RunConfig::default().with_overrides(Some("  ".into()), true);
        assert_eq!(config.context, None);
        assert!(config.debug);
    }
}
