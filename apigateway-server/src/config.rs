//! Application configuration
//!
//! Loaded from a TOML file. The file is located from an explicit path, or from
//! `$CONFIGPATH/$CONFIG_NAME.toml` (defaults `./env` and `app`). `${VAR}` and
//! `${VAR:-default}` references are expanded from the environment before the
//! file is parsed, which keeps database passwords out of the file.

use std::path::{Path, PathBuf};

use apigateway_db::RdbmsConfig;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_DIR: &str = "env";
pub const DEFAULT_CONFIG_NAME: &str = "app";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file (invalid TOML): {0}")]
    Parse(#[from] toml::de::Error),

    #[error("environment variable '{name}' referenced by config is not set")]
    MissingVariable { name: String },
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub database: RdbmsConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Address to bind to (default: 127.0.0.1:8080)
    pub address: String,
    /// Tag added to every access log line
    pub app_id: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:8080".to_string(),
            app_id: "apigateway".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl AppConfig {
    /// Load from `path`, or from the location named by the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = resolve_path(
            path,
            std::env::var("CONFIGPATH").ok(),
            std::env::var("CONFIG_NAME").ok(),
        );
        tracing::debug!(path = %path.display(), "loading config");

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Self::from_toml_str(&content, |name| std::env::var(name).ok())
    }

    /// Parse `content` after expanding `${VAR}` references through `lookup`.
    pub fn from_toml_str<F>(content: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let expanded = expand_vars(content, lookup)?;
        Ok(toml::from_str(&expanded)?)
    }
}

/// Pick the config file location.
pub fn resolve_path(
    explicit: Option<&Path>,
    config_dir: Option<String>,
    config_name: Option<String>,
) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    let dir = config_dir
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| DEFAULT_CONFIG_DIR.to_string());
    let name = config_name
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| DEFAULT_CONFIG_NAME.to_string());
    PathBuf::from(dir).join(format!("{}.toml", name))
}

static VAR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}").expect("valid regex")
});

fn expand_vars<F>(input: &str, lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut missing = None;
    let expanded = VAR_PATTERN.replace_all(input, |caps: &Captures<'_>| {
        let name = &caps[1];
        match (lookup(name).filter(|v| !v.is_empty()), caps.get(2)) {
            (Some(value), _) => value,
            (None, Some(default)) => default.as_str().to_string(),
            (None, None) => {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(name) => Err(ConfigError::MissingVariable { name }),
        None => Ok(expanded.into_owned()),
    }
}
