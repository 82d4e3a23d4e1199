use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::reqwest::async_http_client;
use oauth2::url::Url;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, HttpRequest, HttpResponse,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, RequestTokenError, Scope, TokenResponse,
    TokenUrl,
};
use log::{debug, info};
use std::io::{self, Write};
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncBufReadExt;

use crate::config::{AuthFlow, Settings, SpotifyConfig};
use crate::credentials::Credentials;
use crate::spotify::callback::{parse_pasted, CallbackError, CallbackListener};

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Spotify accounts service answered 403 Forbidden: {0}")]
    Forbidden(String),
    #[error("network error talking to the Spotify accounts service: {0}")]
    Network(String),
    #[error("token request rejected: {0}")]
    TokenRejected(String),
    #[error("unexpected token response: {0}")]
    Parse(String),
    #[error(transparent)]
    Callback(CallbackError),
    #[error("authorization was denied in the browser: {0}")]
    Denied(String),
    #[error("invalid {field} URL '{value}'")]
    InvalidUrl { field: &'static str, value: String },
    #[error("failed to read the redirect URL: {0}")]
    Io(#[from] io::Error),
}

impl AuthError {
    pub fn is_forbidden(&self) -> bool {
        matches!(self, AuthError::Forbidden(_))
    }

    pub fn is_network(&self) -> bool {
        matches!(self, AuthError::Network(_))
    }

    /// A malformed URL can only come from the settings or env file.
    pub fn is_config(&self) -> bool {
        matches!(self, AuthError::InvalidUrl { .. })
    }
}

impl From<CallbackError> for AuthError {
    fn from(err: CallbackError) -> Self {
        match err {
            CallbackError::Denied(reason) => AuthError::Denied(reason),
            other => AuthError::Callback(other),
        }
    }
}

/// Transport wrapper handed to oauth2 so a 403 never reaches its error-body
/// parser, where the status code would be lost.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("403 Forbidden: {0}")]
    Forbidden(String),
    #[error(transparent)]
    Http(#[from] oauth2::reqwest::Error<reqwest::Error>),
}

async fn classified_http_client(request: HttpRequest) -> Result<HttpResponse, TransportError> {
    debug!("{} {}", request.method, request.url);
    let response = async_http_client(request).await?;
    if response.status_code.as_u16() == 403 {
        let body = String::from_utf8_lossy(&response.body).trim().to_string();
        return Err(TransportError::Forbidden(if body.is_empty() {
            "no details".to_string()
        } else {
            body
        }));
    }
    Ok(response)
}

impl From<RequestTokenError<TransportError, oauth2::basic::BasicErrorResponse>> for AuthError {
    fn from(err: RequestTokenError<TransportError, oauth2::basic::BasicErrorResponse>) -> Self {
        match err {
            RequestTokenError::Request(TransportError::Forbidden(body)) => AuthError::Forbidden(body),
            RequestTokenError::Request(TransportError::Http(e)) => AuthError::Network(e.to_string()),
            RequestTokenError::ServerResponse(response) => {
                let mut message = response.error().to_string();
                if let Some(description) = response.error_description() {
                    message = format!("{} ({})", message, description);
                }
                AuthError::TokenRejected(message)
            }
            RequestTokenError::Parse(e, _) => AuthError::Parse(e.to_string()),
            RequestTokenError::Other(message) => AuthError::Parse(message),
        }
    }
}

/// How the authorization code gets back to us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectMode {
    /// Local callback listener bound at the redirect URI.
    Listener,
    /// The user pastes the redirected URL on stdin.
    Paste,
}

/// An access token held for the lifetime of one run.
#[derive(Clone)]
pub struct Token {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<Duration>,
    pub scopes: Vec<String>,
    pub flow: AuthFlow,
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &self.prefix())
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_in", &self.expires_in)
            .field("scopes", &self.scopes)
            .field("flow", &self.flow)
            .finish()
    }
}

impl Token {
    fn from_response(response: &BasicTokenResponse, flow: AuthFlow) -> Self {
        Self {
            access_token: response.access_token().secret().to_string(),
            refresh_token: response.refresh_token().map(|t| t.secret().to_string()),
            expires_in: response.expires_in(),
            scopes: response
                .scopes()
                .map(|scopes| scopes.iter().map(|s| s.as_str().to_string()).collect())
                .unwrap_or_default(),
            flow,
        }
    }

    /// First few characters of the token, safe to print.
    pub fn prefix(&self) -> String {
        let shown: String = self.access_token.chars().take(6).collect();
        format!("{}...", shown)
    }
}

fn parse_url(field: &'static str, value: &str) -> Result<Url, AuthError> {
    Url::parse(value).map_err(|_| AuthError::InvalidUrl {
        field,
        value: value.to_string(),
    })
}

/// Resolves the redirect URI: the env file wins over `config.toml`.
pub fn redirect_url(credentials: &Credentials, spotify: &SpotifyConfig) -> Result<Url, AuthError> {
    let value = credentials
        .redirect_uri
        .as_deref()
        .unwrap_or(&spotify.redirect_uri);
    parse_url("redirect", value)
}

pub fn build_client(
    credentials: &Credentials,
    spotify: &SpotifyConfig,
    redirect: Option<&Url>,
) -> Result<BasicClient, AuthError> {
    let client = BasicClient::new(
        ClientId::new(credentials.client_id.clone()),
        Some(ClientSecret::new(credentials.client_secret.clone())),
        AuthUrl::from_url(parse_url("authorize", &spotify.auth_url)?),
        Some(TokenUrl::from_url(parse_url("token", &spotify.token_url)?)),
    );

    Ok(match redirect {
        Some(url) => client.set_redirect_uri(RedirectUrl::from_url(url.clone())),
        None => client,
    })
}

/// One authorization-code attempt: the authorize URL, its CSRF state and the
/// PKCE verifier that must accompany the code exchange.
pub struct AuthorizationSession {
    authorize_url: Url,
    csrf_token: CsrfToken,
    pkce_verifier: PkceCodeVerifier,
}

impl AuthorizationSession {
    pub fn start(client: &BasicClient, scopes: &[String]) -> Self {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let (authorize_url, csrf_token) = client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(scopes.iter().cloned().map(Scope::new))
            .set_pkce_challenge(pkce_challenge)
            .url();

        Self {
            authorize_url,
            csrf_token,
            pkce_verifier,
        }
    }

    pub fn authorize_url(&self) -> &Url {
        &self.authorize_url
    }

    pub fn state(&self) -> &str {
        self.csrf_token.secret()
    }

    pub async fn finish(self, client: &BasicClient, code: String) -> Result<Token, AuthError> {
        let response = client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(self.pkce_verifier)
            .request_async(classified_http_client)
            .await?;

        Ok(Token::from_response(&response, AuthFlow::AuthorizationCode))
    }
}

async fn read_pasted_redirect(state: &str) -> Result<String, AuthError> {
    print!("Enter the URL you were redirected to: ");
    io::stdout().flush()?;
    let mut input_url = String::new();
    tokio::io::BufReader::new(tokio::io::stdin())
        .read_line(&mut input_url)
        .await?;
    Ok(parse_pasted(&input_url, state)?)
}

async fn authorization_code(
    credentials: &Credentials,
    settings: &Settings,
    mode: RedirectMode,
) -> Result<Token, AuthError> {
    let redirect = redirect_url(credentials, &settings.spotify)?;
    let client = build_client(credentials, &settings.spotify, Some(&redirect))?;
    let session = AuthorizationSession::start(&client, &settings.spotify.scopes);

    let code = match mode {
        RedirectMode::Listener => {
            // Bind before the user can possibly complete the login.
            let listener = CallbackListener::bind(&redirect).await?;
            debug!("callback listener bound to {:?}", listener.local_addr());
            println!("Open this URL in your browser:\n{}", session.authorize_url());
            listener
                .wait_for_code(
                    session.state(),
                    Duration::from_secs(settings.auth.callback_timeout_secs),
                )
                .await?
        }
        RedirectMode::Paste => {
            println!("Open this URL in your browser:\n{}", session.authorize_url());
            read_pasted_redirect(session.state()).await?
        }
    };

    session.finish(&client, code).await
}

pub async fn client_credentials(
    credentials: &Credentials,
    spotify: &SpotifyConfig,
) -> Result<Token, AuthError> {
    let client = build_client(credentials, spotify, None)?;
    let response = client
        .exchange_client_credentials()
        .request_async(classified_http_client)
        .await?;

    Ok(Token::from_response(&response, AuthFlow::ClientCredentials))
}

/// Obtains an access token using the flow selected in `settings.auth.flow`.
pub async fn authenticate(
    credentials: &Credentials,
    settings: &Settings,
    mode: RedirectMode,
) -> Result<Token, AuthError> {
    let token = match settings.auth.flow {
        AuthFlow::AuthorizationCode => authorization_code(credentials, settings, mode).await?,
        AuthFlow::ClientCredentials => client_credentials(credentials, &settings.spotify).await?,
    };

    info!(
        "Access token acquired via {:?} (expires in {:?})",
        token.flow,
        token.expires_in.map(|d| d.as_secs())
    );
    debug!("Token starts with {}", token.prefix());
    Ok(token)
}
