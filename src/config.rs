//! Build configuration
//!
//! Ceilings are immutable for the duration of a build and passed in at the
//! root of every build call. A project can keep its defaults in a
//! `semgraph.toml`:
//!
//! ```toml
//! [limits]
//! max_depth = 128
//! max_captures = 64
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_DEPTH: usize = 256;
pub const DEFAULT_MAX_CAPTURES: usize = 255;
pub const DEFAULT_MAX_FANOUT: usize = 4096;

/// Safety ceilings for one build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Maximum recursion depth of any single construct
    pub max_depth: usize,
    /// Highest `&N` placeholder index and most captured symbols per closure
    pub max_captures: usize,
    /// Most direct children of one compound pattern or composite literal
    pub max_fanout: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_captures: DEFAULT_MAX_CAPTURES,
            max_fanout: DEFAULT_MAX_FANOUT,
        }
    }
}

impl BuildConfig {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_captures(mut self, max_captures: usize) -> Self {
        self.max_captures = max_captures;
        self
    }

    pub fn with_max_fanout(mut self, max_fanout: usize) -> Self {
        self.max_fanout = max_fanout;
        self
    }

    /// Reject ceilings that would make every build fail
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, value) in [
            ("max_depth", self.max_depth),
            ("max_captures", self.max_captures),
            ("max_fanout", self.max_fanout),
        ] {
            if value == 0 {
                anyhow::bail!("{} must be at least 1", name);
            }
        }
        Ok(())
    }
}

/// Contents of a `semgraph.toml` file.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SemgraphConfig {
    #[serde(default)]
    pub limits: BuildConfig,
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("semgraph.toml")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<SemgraphConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: SemgraphConfig = toml::from_str(&contents)?;
    config.limits.validate()?;
    tracing::debug!("Loaded build limits from {}", path.display());
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &SemgraphConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (pass force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_and_overrides() {
        let config = BuildConfig::default();
        assert_eq!(config.max_depth, 256);
        assert_eq!(config.max_captures, 255);

        let config = config.with_max_depth(4).with_max_fanout(2);
        assert_eq!(config.max_depth, 4);
        assert_eq!(config.max_fanout, 2);
        assert!(config.validate().is_ok());
        assert!(config.with_max_captures(0).validate().is_err());
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        let loaded = load_config(Some(&dir.path().join("semgraph.toml"))).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_partial_limits_fall_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("semgraph.toml");
        std::fs::write(&path, "[limits]\nmax_depth = 12\n").unwrap();

        let loaded = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(loaded.limits.max_depth, 12);
        assert_eq!(loaded.limits.max_captures, DEFAULT_MAX_CAPTURES);
    }

    #[test]
    fn test_write_refuses_overwrite_without_force() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("semgraph.toml");
        let config = SemgraphConfig {
            limits: BuildConfig::default().with_max_depth(32),
        };

        write_config(&path, &config, false).unwrap();
        assert!(write_config(&path, &config, false).is_err());
        write_config(&path, &config, true).unwrap();

        let loaded = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_zero_ceiling_in_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("semgraph.toml");
        std::fs::write(&path, "[limits]\nmax_fanout = 0\n").unwrap();
        assert!(load_config(Some(&path)).is_err());
    }
}
