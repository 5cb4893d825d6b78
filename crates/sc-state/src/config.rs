use crate::error::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_CACHE_SIZE: usize = 8 << 20;

/// Subdirectory of `data_dir` holding the sidechain database.
pub const STORE_DIR_NAME: &str = "sidechains";

/// Environment variables with this prefix override file settings (`SC_DATA_DIR`, ...).
pub const ENV_PREFIX: &str = "SC";

/// Settings for opening the sidechain registry store
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Node data directory; the store lives in `<data_dir>/sidechains`
    pub data_dir: PathBuf,

    /// Block cache size in bytes
    pub cache_size: usize,

    /// Destroy the existing store before opening it
    pub wipe: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            data_dir: PathBuf::from("."),
            cache_size: DEFAULT_CACHE_SIZE,
            wipe: false,
        }
    }
}

impl RegistryConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        RegistryConfig {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Load settings from an optional file (TOML, JSON, YAML by extension),
    /// then apply `SC_*` environment overrides.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path));
        }
        let settings = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()?;

        let cfg: RegistryConfig = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_size == 0 {
            return Err(ConfigError::Invalid("cache_size must be > 0".to_string()));
        }
        if self.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("data_dir must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(STORE_DIR_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = RegistryConfig::default();
        assert_eq!(cfg.cache_size, DEFAULT_CACHE_SIZE);
        assert!(!cfg.wipe);
        assert_eq!(cfg.store_path(), PathBuf::from("./sidechains"));
    }

    #[test]
    fn test_load_from_file_keeps_defaults_for_missing_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "data_dir = \"/var/lib/node\"").unwrap();
        writeln!(file, "wipe = true").unwrap();
        drop(file);

        let cfg = RegistryConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.data_dir, PathBuf::from("/var/lib/node"));
        assert!(cfg.wipe);
        assert_eq!(cfg.cache_size, DEFAULT_CACHE_SIZE);
        assert_eq!(cfg.store_path(), PathBuf::from("/var/lib/node/sidechains"));
    }

    #[test]
    fn test_zero_cache_rejected() {
        let cfg = RegistryConfig {
            cache_size: 0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }
}
