//! Config Store: load and atomically persist the on-disk YAML document (spec §4.1).

use crate::config::types::ConfigDocument;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigIoError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config file {path} is not valid YAML: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Load and parse the `ConfigDocument` at `path`.
pub fn load(path: &Path) -> Result<ConfigDocument, ConfigIoError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigIoError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&raw).map_err(|source| ConfigIoError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Write `config` to `path` atomically (write to a sibling temp file, then rename),
/// first copying the existing file to a timestamped backup if one exists.
pub fn save(path: &Path, config: &ConfigDocument) -> Result<Option<PathBuf>, ConfigIoError> {
    let backup_path = backup_existing(path)?;

    let yaml = serde_yaml::to_string(config).map_err(|source| ConfigIoError::Write {
        path: path.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, source),
    })?;

    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, yaml).map_err(|source| ConfigIoError::Write {
        path: tmp_path.clone(),
        source,
    })?;
    std::fs::rename(&tmp_path, path).map_err(|source| ConfigIoError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(backup_path)
}

fn backup_existing(path: &Path) -> Result<Option<PathBuf>, ConfigIoError> {
    if !path.exists() {
        return Ok(None);
    }
    let timestamp = chrono::Utc::now().timestamp();
    let backup_path = PathBuf::from(format!("{}.backup.{}", path.display(), timestamp));
    std::fs::copy(path, &backup_path).map_err(|source| ConfigIoError::Write {
        path: backup_path.clone(),
        source,
    })?;
    Ok(Some(backup_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{Provider, RouterConfig, RouterRules};

    fn sample_config() -> ConfigDocument {
        ConfigDocument {
            providers: vec![Provider {
                name: "p1".to_string(),
                api_base_url: "https://api.example.com".to_string(),
                api_key: "key1".to_string(),
                models: vec!["m1".to_string()],
                transformer: None,
            }],
            router: RouterConfig {
                rules: RouterRules {
                    default: "p1,m1".to_string(),
                    ..Default::default()
                },
                active_group: None,
            },
            ..Default::default()
        }
    }

    #[test]
    fn round_trips_through_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let original = sample_config();

        save(&path, &original).unwrap();
        let loaded = load(&path).unwrap();

        assert_eq!(loaded.providers[0].name, "p1");
        assert_eq!(loaded.router.rules.default, "p1,m1");
    }

    #[test]
    fn save_creates_timestamped_backup_of_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let original = sample_config();

        save(&path, &original).unwrap();
        let mut updated = original.clone();
        updated.router.rules.default = "p1,m2".to_string();
        let backup = save(&path, &updated).unwrap();

        assert!(backup.is_some());
        let backup_path = backup.unwrap();
        assert!(backup_path.exists());
        let backed_up = load(&backup_path).unwrap();
        assert_eq!(backed_up.router.rules.default, "p1,m1");
    }

    #[test]
    fn save_without_prior_file_returns_no_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let backup = save(&path, &sample_config()).unwrap();
        assert!(backup.is_none());
    }

    #[test]
    fn load_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.yaml");
        let err = load(&path).unwrap_err();
        assert!(matches!(err, ConfigIoError::Read { .. }));
    }

    #[test]
    fn load_invalid_yaml_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "not: valid: yaml: [").unwrap();
        let err = load(&path).unwrap_err();
        assert!(matches!(err, ConfigIoError::Parse { .. }));
    }
}
