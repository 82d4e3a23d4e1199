use oauth2::url::Url;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use toml;

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub spotify: SpotifyConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SpotifyConfig {
    pub auth_url: String,
    pub token_url: String,
    pub api_base: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            auth_url: "https://accounts.spotify.com/authorize".to_string(),
            token_url: "https://accounts.spotify.com/api/token".to_string(),
            api_base: "https://api.spotify.com/v1".to_string(),
            redirect_uri: "http://127.0.0.1:8888/callback".to_string(),
            scopes: vec![
                "user-read-private".to_string(),
                "user-top-read".to_string(),
                "user-read-recently-played".to_string(),
            ],
        }
    }
}

impl SpotifyConfig {
    fn check_urls(&self, path: &Path) -> Result<(), ConfigError> {
        for (field, value) in [
            ("auth_url", &self.auth_url),
            ("token_url", &self.token_url),
            ("api_base", &self.api_base),
            ("redirect_uri", &self.redirect_uri),
        ] {
            if Url::parse(value).is_err() {
                return Err(ConfigError::InvalidUrl {
                    path: path.to_path_buf(),
                    field,
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum AuthFlow {
    /// User login through the browser, code captured by a local listener.
    #[default]
    AuthorizationCode,
    /// App-only token, no redirect and no user context.
    ClientCredentials,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    pub flow: AuthFlow,
    pub callback_timeout_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            flow: AuthFlow::AuthorizationCode,
            callback_timeout_secs: 120,
        }
    }
}

/// Loads settings from `path`. A missing file means built-in defaults.
pub fn load_config(path: &Path) -> Result<Settings, ConfigError> {
    if !path.exists() {
        log::debug!("no settings file at {}, using defaults", path.display());
        return Ok(Settings::default());
    }

    let config_str = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: Settings = toml::from_str(&config_str).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.spotify.check_urls(path)?;
    Ok(config)
}

/// Writes the default settings to `path` so they can be edited.
pub fn write_default_config(path: &Path) -> Result<(), ConfigError> {
    if path.exists() {
        return Err(ConfigError::AlreadyExists(path.to_path_buf()));
    }

    let toml_string = toml::to_string_pretty(&Settings::default())?;

    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = fs::File::create(path).map_err(io_err)?;
    file.write_all(toml_string.as_bytes()).map_err(io_err)?;
    Ok(())
}
