use std::path::PathBuf;

use thiserror::Error;

use crate::spotify::auth::AuthError;
use crate::spotify::ApiError;

/// Exit status for configuration and credential problems (sysexits `EX_CONFIG`).
pub const EXIT_CONFIG: i32 = 78;
/// Exit status for any HTTP 403 (sysexits `EX_NOPERM`).
pub const EXIT_FORBIDDEN: i32 = 77;
/// Exit status for transport failures (sysexits `EX_UNAVAILABLE`).
pub const EXIT_NETWORK: i32 = 69;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("environment file '{0}' not found; create it with CLIENT_ID and CLIENT_SECRET")]
    EnvFileMissing(PathBuf),
    #[error("environment file '{path}' is malformed: {reason}")]
    EnvFileMalformed { path: PathBuf, reason: String },
    #[error("{0} is not set in the environment file or the process environment")]
    MissingVar(&'static str),
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("'{0}' already exists, refusing to overwrite it")]
    AlreadyExists(PathBuf),
    #[error("spotify.{field} in '{path}' is not a valid URL: '{value}'")]
    InvalidUrl {
        path: PathBuf,
        field: &'static str,
        value: String,
    },
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("could not extract a Spotify track id from '{0}'")]
    InvalidTrackId(String),
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode report: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// True for an HTTP 403 from either the accounts service or the Web API.
    pub fn is_forbidden(&self) -> bool {
        match self {
            AppError::Auth(e) => e.is_forbidden(),
            AppError::Api(e) => e.is_forbidden(),
            _ => false,
        }
    }

    pub fn is_network(&self) -> bool {
        match self {
            AppError::Auth(e) => e.is_network(),
            AppError::Api(e) => e.is_network(),
            _ => false,
        }
    }

    pub fn is_config(&self) -> bool {
        match self {
            AppError::Config(_) => true,
            AppError::Auth(e) => e.is_config(),
            _ => false,
        }
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_forbidden() {
            EXIT_FORBIDDEN
        } else if self.is_network() {
            EXIT_NETWORK
        } else if self.is_config() {
            EXIT_CONFIG
        } else {
            1
        }
    }

    /// Extra guidance printed under a 403.
    pub fn hint(&self) -> Option<&'static str> {
        if self.is_forbidden() {
            Some(
                "Spotify answered 403 Forbidden. Check that the redirect URI in config.toml \
                 matches the one registered in the developer dashboard, that the requested \
                 scopes were granted, and that your app has access to this endpoint \
                 (audio features are restricted for newer apps). \
                 `--flow client-credentials` avoids the redirect entirely.",
            )
        } else {
            None
        }
    }
}
