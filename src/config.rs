use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_ping_targets")]
    pub ping_targets: Vec<String>,
    #[serde(default = "default_ping_timeout_secs")]
    pub ping_timeout_secs: u64,
    #[serde(default = "default_resolv_conf")]
    pub resolv_conf: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ping_targets: default_ping_targets(),
            ping_timeout_secs: default_ping_timeout_secs(),
            resolv_conf: default_resolv_conf(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse YAML in {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {0}")]
    Validation(String),
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_display = path_ref.display().to_string();
        let text = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;

        // An empty file means "all defaults".
        let cfg: Config = if text.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path_display,
                source,
            })?
        };

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ping_targets.is_empty() {
            return Err(ConfigError::Validation(
                "ping_targets must not be empty".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for target in &self.ping_targets {
            if target.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "ping_targets[*] must not be blank".to_string(),
                ));
            }
            if !seen.insert(target.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "ping target '{target}' is listed twice"
                )));
            }
        }
        if self.ping_timeout_secs < 1 {
            return Err(ConfigError::Validation(
                "ping_timeout_secs must be >= 1".to_string(),
            ));
        }
        if self.resolv_conf.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "resolv_conf must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_timeout_secs)
    }

    pub fn example_yaml() -> &'static str {
        include_str!("../config.yaml.example")
    }
}

fn default_ping_targets() -> Vec<String> {
    vec!["8.8.8.8".to_string(), "1.1.1.1".to_string()]
}

const fn default_ping_timeout_secs() -> u64 {
    5
}

fn default_resolv_conf() -> PathBuf {
    PathBuf::from("/etc/resolv.conf")
}
