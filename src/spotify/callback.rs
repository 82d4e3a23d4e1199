use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use log::{debug, info, warn};
use oauth2::url::Url;
use serde::Deserialize;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};

#[derive(Error, Debug)]
pub enum CallbackError {
    #[error("could not listen on {addr} for the OAuth redirect: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("callback server failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("no OAuth redirect received within {0} seconds")]
    Timeout(u64),
    #[error("OAuth state mismatch, the redirect did not come from this login attempt")]
    StateMismatch,
    #[error("redirect carried no authorization code")]
    MissingCode,
    #[error("authorization was denied: {0}")]
    Denied(String),
    #[error("unusable redirect URL '{0}'")]
    BadRedirect(String),
}

/// Query parameters Spotify appends to the redirect URI.
#[derive(Debug, Default, Deserialize)]
pub struct RedirectParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

impl RedirectParams {
    fn from_url(url: &Url) -> Self {
        let mut params = Self::default();
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => params.code = Some(value.into_owned()),
                "state" => params.state = Some(value.into_owned()),
                "error" => params.error = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }

    /// A denial wins over everything else, then the CSRF state is checked.
    pub fn into_code(self, expected_state: &str) -> Result<String, CallbackError> {
        if let Some(error) = self.error {
            return Err(CallbackError::Denied(error));
        }
        if self.state.as_deref() != Some(expected_state) {
            return Err(CallbackError::StateMismatch);
        }
        self.code
            .filter(|c| !c.is_empty())
            .ok_or(CallbackError::MissingCode)
    }
}

pub fn extract_code(url: &Url, expected_state: &str) -> Result<String, CallbackError> {
    RedirectParams::from_url(url).into_code(expected_state)
}

/// Parses the redirected URL a user pasted into the terminal.
pub fn parse_pasted(input: &str, expected_state: &str) -> Result<String, CallbackError> {
    let trimmed = input.trim();
    let url = Url::parse(trimmed).map_err(|_| CallbackError::BadRedirect(trimmed.to_string()))?;
    extract_code(&url, expected_state)
}

struct CallbackState {
    expected_state: String,
    outcome: Mutex<Option<oneshot::Sender<Result<String, CallbackError>>>>,
}

fn page(message: &str) -> Html<String> {
    Html(format!(
        "<!doctype html><html><head><title>emotional-fingerprint</title></head><body><p>{}</p></body></html>",
        message
    ))
}

async fn receive_redirect(
    State(shared): State<Arc<CallbackState>>,
    Query(params): Query<RedirectParams>,
) -> (StatusCode, Html<String>) {
    let outcome = params.into_code(&shared.expected_state);
    let reply = match &outcome {
        Ok(_) => (
            StatusCode::OK,
            page("Login complete. You can close this window and return to the terminal."),
        ),
        Err(e) => (StatusCode::BAD_REQUEST, page(&format!("Login failed: {}", e))),
    };

    match shared.outcome.lock().await.take() {
        Some(tx) => {
            let _ = tx.send(outcome);
        }
        None => warn!("ignoring a repeated redirect, the first one was already taken"),
    }
    reply
}

pub struct CallbackListener {
    listener: TcpListener,
    redirect: Url,
}

impl CallbackListener {
    /// Binds the host and port named by `redirect`. Only plain `http` redirects
    /// can be served locally.
    pub async fn bind(redirect: &Url) -> Result<Self, CallbackError> {
        if redirect.scheme() != "http" {
            return Err(CallbackError::BadRedirect(redirect.to_string()));
        }
        let host = redirect
            .host_str()
            .ok_or_else(|| CallbackError::BadRedirect(redirect.to_string()))?;
        let port = redirect.port_or_known_default().unwrap_or(80);
        let addr = format!("{}:{}", host.trim_start_matches('[').trim_end_matches(']'), port);

        let listener = TcpListener::bind(addr.as_str())
            .await
            .map_err(|source| CallbackError::Bind {
                addr: addr.clone(),
                source,
            })?;
        info!("Waiting for the OAuth redirect on {}", addr);

        Ok(Self {
            listener,
            redirect: redirect.clone(),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Serves the redirect path until the first redirect arrives or `timeout`
    /// runs out. Other paths get axum's 404.
    pub async fn wait_for_code(
        self,
        expected_state: &str,
        timeout: Duration,
    ) -> Result<String, CallbackError> {
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let shared = Arc::new(CallbackState {
            expected_state: expected_state.to_string(),
            outcome: Mutex::new(Some(outcome_tx)),
        });

        let path = self.redirect.path().to_string();
        debug!("serving the OAuth redirect at {}", path);
        let app = Router::new()
            .route(&path, get(receive_redirect))
            .fallback(|| async {
                warn!("ignoring a request while waiting for the redirect");
                (StatusCode::NOT_FOUND, page("Not found."))
            })
            .with_state(shared);

        let mut server = tokio::spawn(async move {
            axum::serve(self.listener, app)
                .with_graceful_shutdown(async {
                    let _ = stop_rx.await;
                })
                .await
        });

        let outcome = tokio::select! {
            received = outcome_rx => match received {
                Ok(result) => result,
                Err(_) => Err(CallbackError::Timeout(timeout.as_secs())),
            },
            served = &mut server => {
                return match served {
                    Ok(Err(e)) => Err(CallbackError::Io(e)),
                    Ok(Ok(())) | Err(_) => Err(CallbackError::Timeout(timeout.as_secs())),
                };
            }
            _ = tokio::time::sleep(timeout) => Err(CallbackError::Timeout(timeout.as_secs())),
        };

        // Let the browser's response go out before the socket closes.
        let _ = stop_tx.send(());
        if tokio::time::timeout(Duration::from_secs(2), server).await.is_err() {
            debug!("callback server still draining connections, leaving it behind");
        }
        outcome
    }
}
