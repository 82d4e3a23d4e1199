pub mod auth;
pub mod callback;
pub mod data;
pub mod ids;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use crate::spotify::auth::Token;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Spotify rejected the access token (401): {0}")]
    Unauthorized(String),
    #[error("Spotify refused access to {endpoint} (403): {message}")]
    Forbidden { endpoint: String, message: String },
    #[error("not found on Spotify: {0}")]
    NotFound(String),
    #[error("rate limited by Spotify, retry after {retry_after:?} seconds")]
    RateLimited { retry_after: Option<u64> },
    #[error("Spotify API returned {code} for {endpoint}: {message}")]
    Status {
        code: u16,
        endpoint: String,
        message: String,
    },
    #[error("network error talking to Spotify: {0}")]
    Network(#[source] reqwest::Error),
    #[error("unexpected response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ApiError {
    pub fn is_forbidden(&self) -> bool {
        matches!(self, ApiError::Forbidden { .. })
    }

    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::Network(_))
    }
}

/// Spotify wraps API errors as `{"error": {"status": 403, "message": "..."}}`.
#[derive(Deserialize, Debug)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize, Debug)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

fn error_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) if !envelope.error.message.is_empty() => envelope.error.message,
        _ if !body.trim().is_empty() => body.trim().to_string(),
        _ => status.canonical_reason().unwrap_or("no details").to_string(),
    }
}

/// Maps a non-success status onto the error taxonomy.
pub(crate) fn classify(
    status: StatusCode,
    retry_after: Option<u64>,
    endpoint: &str,
    body: &str,
) -> ApiError {
    let message = error_message(status, body);
    match status {
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized(message),
        StatusCode::FORBIDDEN => ApiError::Forbidden {
            endpoint: endpoint.to_string(),
            message,
        },
        StatusCode::NOT_FOUND => ApiError::NotFound(endpoint.to_string()),
        StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited { retry_after },
        _ => ApiError::Status {
            code: status.as_u16(),
            endpoint: endpoint.to_string(),
            message,
        },
    }
}

pub struct SpotifyClient {
    http: Client,
    api_base: String,
    token: String,
}

impl SpotifyClient {
    pub fn new(api_base: &str, token: &Token) -> Self {
        Self {
            http: Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.access_token.clone(),
        }
    }

    /// GETs `path` (relative to the API base) and decodes the JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.api_base, path);
        log::debug!("GET {} {:?}", url, query);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await
            .map_err(ApiError::Network)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            let body = response.text().await.unwrap_or_default();
            return Err(classify(status, retry_after, path, &body));
        }

        response.json::<T>().await.map_err(|source| ApiError::Decode {
            endpoint: path.to_string(),
            source,
        })
    }
}
