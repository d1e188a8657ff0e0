use crate::store::{Connect, DashboardStore, DirectoryStore, HttpStore, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Named connection profiles, read from a TOML file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Profile {
    Http {
        endpoint: String,
        /// Environment variable holding a bearer token.
        #[serde(default)]
        token_env: Option<String>,
        #[serde(default)]
        timeout_secs: Option<u64>,
    },
    Directory {
        path: PathBuf,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("read config failed `{path}`: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("config parse failed `{path}`: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Loads the profile configuration. A missing file means no profiles.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(source) if source.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no config file, starting without profiles");
            return Ok(Config::default());
        }
        Err(source) => {
            return Err(ConfigError::ReadFile {
                path: path.display().to_string(),
                source,
            });
        }
    };

    let config: Config = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    tracing::debug!(path = %path.display(), profiles = ?config.profiles.keys().collect::<Vec<_>>(), "loaded config");
    Ok(config)
}

impl Connect for Config {
    fn connect(&self, profile: &str) -> Result<Box<dyn DashboardStore>, StoreError> {
        match self.profiles.get(profile) {
            None => Err(StoreError::ProfileNotFound(profile.to_string())),
            Some(Profile::Directory { path }) => Ok(Box::new(DirectoryStore::new(path))),
            Some(Profile::Http {
                endpoint,
                token_env,
                timeout_secs,
            }) => {
                let invalid = |message: String| StoreError::InvalidProfile {
                    profile: profile.to_string(),
                    message,
                };
                let token = match token_env {
                    Some(var) => Some(
                        std::env::var(var)
                            .map_err(|_| invalid(format!("environment variable `{var}` is not set")))?,
                    ),
                    None => None,
                };
                let store = HttpStore::new(endpoint, token, timeout_secs.map(Duration::from_secs))
                    .map_err(invalid)?;
                Ok(Box::new(store))
            }
        }
    }
}
