//! TOML configuration.
//!
//! ```toml
//! [optimizer]
//! crosspenalty = 100000.0
//! num_modes = 36
//!
//! [optimizer.curve]
//! resolution = 2000
//!
//! [solver]
//! ccx = "ccx"
//! timeout_secs = 600
//!
//! [batch]
//! workers = 4
//! checkpoint = "bells.json"
//! ```
//!
//! Every field is optional and falls back to its default.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::eigensolver::SolverConfig;
use crate::error::ConfigError;
use crate::optimization::{BatchConfig, OptimizerSettings};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub optimizer: OptimizerSettings,
    pub solver: SolverConfig,
    pub batch: BatchConfig,
}

impl AppConfig {
    /// Read and parse `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read `path`, or fall back to defaults.
    ///
    /// A missing file is created with every default written out as a
    /// comment. An unreadable or invalid file is left alone.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if path.exists() {
            return match Self::load(path) {
                Ok(cfg) => cfg,
                Err(err) => {
                    warn!(error = %err, "using default configuration");
                    Self::default()
                }
            };
        }

        let default_cfg = Self::default();
        match toml::to_string_pretty(&default_cfg) {
            Ok(text) => {
                if let Err(err) = fs::write(path, commented(&text)) {
                    warn!(path = %path.display(), error = %err, "failed to write default config");
                } else {
                    info!(path = %path.display(), "wrote default config");
                }
            }
            Err(err) => warn!(error = %err, "failed to serialize default config"),
        }
        default_cfg
    }
}

/// Comment out every key, keeping table headers live.
fn commented(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.lines().count() * 2);
    for line in text.lines() {
        let trimmed = line.trim();
        if !trimmed.is_empty() && !(trimmed.starts_with('[') && trimmed.ends_with(']')) {
            out.push_str("# ");
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DEFAULT_CROSSPENALTY;
    use tempfile::tempdir;

    #[test]
    fn load_or_default_writes_defaults_cleanly() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bellshape.toml");

        let cfg = AppConfig::load_or_default(&path);
        assert_eq!(cfg, AppConfig::default());
        assert!(path.exists(), "config file should be created");

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[optimizer]"));
        assert!(contents.contains("# crosspenalty = 100000.0"));

        // an all-commented file parses back to defaults
        let reloaded = AppConfig::load(&path).unwrap();
        assert_eq!(reloaded, AppConfig::default());
    }

    #[test]
    fn load_reads_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(
            &path,
            "[optimizer]\nnum_modes = 20\n\n[optimizer.curve]\nresolution = 1000\n\n[batch]\nworkers = 2\nseed = 7\n",
        )
        .unwrap();

        let cfg = AppConfig::load(&path).unwrap();
        assert_eq!(cfg.optimizer.num_modes, 20);
        assert_eq!(cfg.optimizer.curve.resolution, 1000);
        assert_eq!(cfg.optimizer.crosspenalty, DEFAULT_CROSSPENALTY);
        assert_eq!(cfg.batch.workers, 2);
        assert_eq!(cfg.batch.seed, Some(7));
        assert_eq!(cfg.solver, SolverConfig::default());
    }

    #[test]
    fn invalid_file_falls_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[optimizer\nnum_modes = ").unwrap();

        assert!(matches!(
            AppConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
        assert_eq!(AppConfig::load_or_default(&path), AppConfig::default());
        // left untouched
        assert!(fs::read_to_string(&path).unwrap().starts_with("[optimizer\n"));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempdir().unwrap();
        let err = AppConfig::load(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("nope.toml"));
    }
}
