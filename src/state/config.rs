//! Editor configuration.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{EditorError, Result};
use crate::fitting::ExecutionMode;
use crate::state::undo::DEFAULT_MAX_UNDO_LEVELS;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Depth of the undo history.
    pub max_undo_levels: usize,

    /// Where fits run.
    pub execution: ExecutionMode,

    /// Upper bound for blocking waits on a fit.
    pub fit_timeout_secs: u64,

    /// Default parent directory for new projects.
    pub project_dir: PathBuf,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_undo_levels: DEFAULT_MAX_UNDO_LEVELS,
            execution: ExecutionMode::Auto,
            fit_timeout_secs: 300,
            project_dir: PathBuf::from("."),
        }
    }
}

impl EditorConfig {
    /// Read a JSON config file; absent fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(EditorError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = fs::read_to_string(path).map_err(|e| EditorError::FileReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: EditorConfig = serde_json::from_str(&content)?;
        debug!("Loaded config from {}: {:?}", path.display(), config);
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| EditorError::FileWriteError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn fit_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.fit_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"execution": "threaded", "max_undo_levels": 20}"#).unwrap();

        let config = EditorConfig::load(&path).unwrap();
        assert_eq!(config.execution, ExecutionMode::Threaded);
        assert_eq!(config.max_undo_levels, 20);
        assert_eq!(config.fit_timeout_secs, 300);
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let config = EditorConfig {
            execution: ExecutionMode::Synchronous,
            ..EditorConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(EditorConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            EditorConfig::load(Path::new("/nonexistent/config.json")),
            Err(EditorError::FileNotFound { .. })
        ));
    }
}
