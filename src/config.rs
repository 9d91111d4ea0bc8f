use crate::common::{
    config_directory, DAEMON_PATH, LOG_PATH, PACKAGE_ID, PLIST_PATH, SETTLE_DELAY_MS,
};
use crate::plan::UninstallPlan;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use validator::{Validate, ValidationError};

const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unable to locate the config directory: {0:#}")]
    Directory(anyhow::Error),
    #[error("Unable to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Unable to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid config: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}

/// Where the monitor daemon was installed. Defaults match the installer package.
#[derive(Debug, Deserialize, Serialize, Validate, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct UninstallConfig {
    #[validate(custom = "validate_absolute_path")]
    pub daemon_path: String,
    #[validate(custom = "validate_absolute_path")]
    pub plist_path: String,
    #[validate(custom = "validate_absolute_path")]
    pub log_path: String,
    #[validate(length(min = 1), custom = "validate_package_id")]
    pub package_id: String,
    #[validate(range(max = 30000))]
    pub settle_delay_ms: u64,
}

impl Default for UninstallConfig {
    fn default() -> Self {
        UninstallConfig {
            daemon_path: DAEMON_PATH.to_owned(),
            plist_path: PLIST_PATH.to_owned(),
            log_path: LOG_PATH.to_owned(),
            package_id: PACKAGE_ID.to_owned(),
            settle_delay_ms: SETTLE_DELAY_MS,
        }
    }
}

fn validate_absolute_path(path: &str) -> Result<(), ValidationError> {
    if path.is_empty() || !Path::new(path).is_absolute() {
        return Err(ValidationError::new("absolute_path"));
    }
    Ok(())
}

fn validate_package_id(id: &str) -> Result<(), ValidationError> {
    if id.chars().any(char::is_whitespace) {
        return Err(ValidationError::new("package_id_whitespace"));
    }
    Ok(())
}

pub fn get_default_config_path() -> anyhow::Result<PathBuf> {
    Ok(config_directory()?.join(CONFIG_FILE_NAME))
}

impl UninstallConfig {
    /// Load from `path_override`, or from the default location.
    /// A missing default file is not an error, the built in paths are used instead.
    pub fn load(path_override: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = match path_override {
            Some(path) => path,
            None => {
                let path = get_default_config_path().map_err(ConfigError::Directory)?;
                if !path.exists() {
                    log::info!("No config at {}, using defaults", path.display());
                    return Ok(Self::default());
                }
                path
            }
        };
        Self::load_from(&path)
    }

    fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        let config: UninstallConfig =
            toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_owned(),
                source,
            })?;
        config.validate()?;
        log::info!("Successfully loaded {}", path.display());
        Ok(config)
    }

    pub fn plan(&self) -> UninstallPlan {
        UninstallPlan::new(
            &self.daemon_path,
            &self.plist_path,
            &self.log_path,
            &self.package_id,
        )
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}
