use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_STALE_AFTER_SECS: u64 = 60;

/// Migrator settings. Fields missing from a config file keep their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MigratorConfig {
    /// Root under which working directories and output archives are created
    pub uploads_path: PathBuf,
    /// Bundled target content type libraries copied into every migrated archive
    pub assets_path: PathBuf,
    /// Upload size ceiling in bytes; `None` means unbounded
    pub file_size_limit: Option<u64>,
    pub locale: String,
    /// Working directories older than this are swept
    pub stale_after_secs: u64,
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            uploads_path: PathBuf::from("uploads"),
            assets_path: PathBuf::from("assets"),
            file_size_limit: None,
            locale: "en".to_string(),
            stale_after_secs: DEFAULT_STALE_AFTER_SECS,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

impl MigratorConfig {
    /// Load a YAML or JSON config file over the defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MigratorConfig::default();
        assert_eq!(config.file_size_limit, None);
        assert_eq!(config.stale_after_secs, 60);
        assert_eq!(config.locale, "en");
    }

    #[test]
    fn test_partial_json_merges_over_defaults() {
        let config = MigratorConfig::parse(r#"{ "fileSizeLimit": 1048576 }"#).unwrap();
        assert_eq!(config.file_size_limit, Some(1_048_576));
        assert_eq!(config.uploads_path, PathBuf::from("uploads"));
        assert_eq!(config.stale_after_secs, 60);
    }

    #[test]
    fn test_yaml_config() {
        let config = MigratorConfig::parse(
            r#"
            uploadsPath: /var/tmp/vt2er
            assetsPath: /opt/vt2er/assets
            staleAfterSecs: 300
            "#,
        )
        .unwrap();

        assert_eq!(config.uploads_path, PathBuf::from("/var/tmp/vt2er"));
        assert_eq!(config.assets_path, PathBuf::from("/opt/vt2er/assets"));
        assert_eq!(config.stale_after_secs, 300);
        assert_eq!(config.file_size_limit, None);
    }

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(MigratorConfig::parse("  \n").unwrap(), MigratorConfig::default());
    }

    #[test]
    fn test_invalid_config_is_error() {
        assert!(MigratorConfig::parse("fileSizeLimit: lots").is_err());
    }
}
