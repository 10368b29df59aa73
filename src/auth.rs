//! OAuth2 credential acquisition for the Google APIs.
//!
//! The installed-application flow: the client configuration comes from a
//! `credentials.json` downloaded from the Cloud Console, the user token is
//! cached in `token.json`. When no cached token can be read, the user is
//! sent to the consent page and pastes the authorization code back on
//! standard input. Expired access tokens are refreshed in memory; the
//! refreshed token is not written back to disk.

use std::fs;
use std::io::{self, BufRead, BufReader, Stdin, Stdout, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::contract::ApiError;

pub const DOCUMENTS_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/documents.readonly";
pub const DRIVE_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const AUTH_STATE: &str = "state-token";

/// Access tokens this close to expiry are treated as expired.
const EXPIRY_DELTA_SECS: i64 = 10;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("unable to read client secret file {path}: {source}")]
    ReadCredentials {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unable to parse client secret file to config: {0}")]
    ParseCredentials(String),
    #[error("unable to build authorization URL: {0}")]
    AuthUrl(String),
    #[error("unable to read token file {path}: {source}")]
    ReadToken {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unable to parse token file: {0}")]
    ParseToken(#[from] serde_json::Error),
    #[error("unable to read authorization code: {0}")]
    ReadCode(#[source] io::Error),
    #[error("no authorization code was entered")]
    MissingCode,
    #[error("unable to retrieve token from web: {0}")]
    Exchange(String),
    #[error("unable to cache OAuth token at {path}: {source}")]
    SaveToken {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("access token expired and no refresh token is available")]
    Expired,
    #[error("token request failed: {0}")]
    Http(#[from] reqwest::Error),
}

// =============================================================================
// CLIENT CONFIGURATION
// =============================================================================

#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

#[derive(Debug, Deserialize)]
struct ClientSecret {
    client_id: String,
    #[serde(default)]
    client_secret: String,
    #[serde(default)]
    auth_uri: Option<String>,
    #[serde(default)]
    token_uri: Option<String>,
    #[serde(default)]
    redirect_uris: Vec<String>,
}

/// OAuth client configuration of an installed or web application.
#[derive(Debug, Clone, PartialEq)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub auth_uri: String,
    pub token_uri: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

impl OAuthClientConfig {
    /// Parses a Cloud Console client secret file.
    pub fn from_json(json: &[u8], scopes: &[&str]) -> Result<Self, AuthError> {
        let file: ClientSecretFile =
            serde_json::from_slice(json).map_err(|e| AuthError::ParseCredentials(e.to_string()))?;
        let secret = file.installed.or(file.web).ok_or_else(|| {
            AuthError::ParseCredentials("no \"installed\" or \"web\" client found".to_string())
        })?;
        let redirect_uri = secret.redirect_uris.into_iter().next().ok_or_else(|| {
            AuthError::ParseCredentials("missing redirect URL in the client secret file".to_string())
        })?;

        Ok(Self {
            client_id: secret.client_id,
            client_secret: secret.client_secret,
            auth_uri: secret.auth_uri.unwrap_or_else(|| DEFAULT_AUTH_URI.to_string()),
            token_uri: secret.token_uri.unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
            redirect_uri,
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn from_file(path: &Path, scopes: &[&str]) -> Result<Self, AuthError> {
        let content = fs::read(path).map_err(|e| {
            error!(error = ?e, path = %path.display(), "Unable to read client secret file");
            AuthError::ReadCredentials {
                path: path.to_path_buf(),
                source: e,
            }
        })?;
        Self::from_json(&content, scopes)
    }

    /// URL of the consent page, requesting offline access so that the
    /// exchange also yields a refresh token.
    pub fn auth_code_url(&self, state: &str) -> Result<Url, AuthError> {
        Url::parse_with_params(
            &self.auth_uri,
            &[
                ("access_type", "offline"),
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", self.scopes.join(" ").as_str()),
                ("state", state),
            ],
        )
        .map_err(|e| AuthError::AuthUrl(e.to_string()))
    }
}

// =============================================================================
// TOKENS
// =============================================================================

/// A user token as cached in `token.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

impl Token {
    /// Expiry instant, if any. The zero timestamp some writers emit for
    /// "never" counts as no expiry.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expiry.filter(|e| e.timestamp() > 0)
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        if self.access_token.is_empty() {
            return false;
        }
        match self.expires_at() {
            Some(expiry) => expiry - Duration::seconds(EXPIRY_DELTA_SECS) > now,
            None => true,
        }
    }

    fn usable_refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|t| !t.is_empty())
    }
}

/// Response of the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl TokenResponse {
    fn into_token(self, now: DateTime<Utc>) -> Token {
        Token {
            access_token: self.access_token,
            token_type: self.token_type,
            refresh_token: self.refresh_token.filter(|t| !t.is_empty()),
            expiry: self
                .expires_in
                .filter(|secs| *secs > 0)
                .map(|secs| now + Duration::seconds(secs)),
        }
    }
}

/// Retrieves a token from a local file.
pub fn token_from_file(path: &Path) -> Result<Token, AuthError> {
    let content = fs::read(path).map_err(|e| AuthError::ReadToken {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(serde_json::from_slice(&content)?)
}

/// Saves a token to a file path, replacing any previous file atomically.
pub fn save_token(path: &Path, token: &Token) -> Result<(), AuthError> {
    println!("Saving credential file to: {}", path.display());
    let save_err = |source: io::Error| {
        error!(error = ?source, path = %path.display(), "Unable to cache OAuth token");
        AuthError::SaveToken {
            path: path.to_path_buf(),
            source,
        }
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    // NamedTempFile is created with owner-only permissions on Unix.
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(save_err)?;
    serde_json::to_writer(&mut tmp, token).map_err(|e| save_err(e.into()))?;
    tmp.write_all(b"\n").map_err(save_err)?;
    tmp.persist(path).map_err(|e| save_err(e.error))?;
    info!(path = %path.display(), "Saved OAuth token");
    Ok(())
}

// =============================================================================
// AUTHORIZATION CODE
// =============================================================================

/// Obtains an authorization code from the user for a consent URL.
pub trait AuthorizationCodeProvider {
    fn authorization_code(&mut self, auth_url: &str) -> Result<String, AuthError>;
}

/// Prints the consent URL and reads the first whitespace-delimited word
/// typed by the user.
pub struct PromptCodeProvider<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PromptCodeProvider<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl PromptCodeProvider<BufReader<Stdin>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(io::stdin()), io::stdout())
    }
}

impl<R: BufRead, W: Write> AuthorizationCodeProvider for PromptCodeProvider<R, W> {
    fn authorization_code(&mut self, auth_url: &str) -> Result<String, AuthError> {
        writeln!(
            self.output,
            "Go to the following link in your browser then type the authorization code: \n{}",
            auth_url
        )
        .and_then(|_| self.output.flush())
        .map_err(AuthError::ReadCode)?;

        let mut line = String::new();
        loop {
            line.clear();
            let read = self.input.read_line(&mut line).map_err(AuthError::ReadCode)?;
            if read == 0 {
                return Err(AuthError::MissingCode);
            }
            if let Some(code) = line.split_whitespace().next() {
                return Ok(code.to_string());
            }
        }
    }
}

// =============================================================================
// TOKEN ENDPOINT
// =============================================================================

/// The OAuth token service.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Exchanges an authorization code for a token.
    async fn exchange_code(&self, code: &str) -> Result<Token, AuthError>;

    /// Obtains a fresh access token with a refresh token.
    async fn refresh(&self, refresh_token: &str) -> Result<Token, AuthError>;
}

/// Token endpoint reached over HTTP with form-encoded grants.
pub struct HttpTokenEndpoint {
    client: Client,
    config: OAuthClientConfig,
}

impl HttpTokenEndpoint {
    pub fn new(client: Client, config: OAuthClientConfig) -> Self {
        Self { client, config }
    }

    async fn post_form(&self, form: &[(&str, &str)]) -> Result<Token, AuthError> {
        let response = self
            .client
            .post(&self.config.token_uri)
            .form(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await?;
            return Err(AuthError::Exchange(format!(
                "token endpoint returned {}: {}",
                status, text
            )));
        }

        let token_response: TokenResponse = response.json().await?;
        Ok(token_response.into_token(Utc::now()))
    }
}

#[async_trait]
impl TokenEndpoint for HttpTokenEndpoint {
    async fn exchange_code(&self, code: &str) -> Result<Token, AuthError> {
        debug!(token_uri = %self.config.token_uri, "Exchanging authorization code");
        self.post_form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ])
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Token, AuthError> {
        debug!(token_uri = %self.config.token_uri, "Refreshing access token");
        self.post_form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ])
        .await
    }
}

/// Requests a token from the web: the user authorizes in the browser and
/// the returned code is exchanged.
pub async fn token_from_web<P, E>(
    config: &OAuthClientConfig,
    code_provider: &mut P,
    endpoint: &E,
) -> Result<Token, AuthError>
where
    P: AuthorizationCodeProvider + ?Sized,
    E: TokenEndpoint + ?Sized,
{
    let auth_url = config.auth_code_url(AUTH_STATE)?;
    let code = code_provider.authorization_code(auth_url.as_str())?;
    endpoint.exchange_code(&code).await.map_err(|e| {
        error!(error = %e, "Unable to retrieve token from web");
        match e {
            AuthError::Exchange(_) => e,
            other => AuthError::Exchange(other.to_string()),
        }
    })
}

/// Loads the cached token, or runs the interactive flow and caches its
/// result when the cache is absent or unreadable.
pub async fn obtain_token<P, E>(
    token_path: &Path,
    config: &OAuthClientConfig,
    code_provider: &mut P,
    endpoint: &E,
) -> Result<Token, AuthError>
where
    P: AuthorizationCodeProvider + ?Sized,
    E: TokenEndpoint + ?Sized,
{
    match token_from_file(token_path) {
        Ok(token) => {
            info!(path = %token_path.display(), "Loaded cached OAuth token");
            return Ok(token);
        }
        Err(e) => {
            info!(error = %e, path = %token_path.display(), "No usable cached token, starting authorization flow");
        }
    }

    let token = token_from_web(config, code_provider, endpoint).await?;
    save_token(token_path, &token)?;
    Ok(token)
}

// =============================================================================
// AUTHORIZED CLIENT
// =============================================================================

/// Current token plus the endpoint used to refresh it.
pub struct TokenSource {
    endpoint: Arc<dyn TokenEndpoint>,
    token: RwLock<Token>,
}

impl TokenSource {
    pub fn new(token: Token, endpoint: Arc<dyn TokenEndpoint>) -> Self {
        Self {
            endpoint,
            token: RwLock::new(token),
        }
    }

    /// Gets a valid access token, refreshing if necessary.
    pub async fn access_token(&self) -> Result<String, AuthError> {
        {
            let token = self.token.read().await;
            if token.is_valid_at(Utc::now()) {
                return Ok(token.access_token.clone());
            }
        }

        let mut token = self.token.write().await;
        // Another task may have refreshed while we waited for the lock.
        if token.is_valid_at(Utc::now()) {
            return Ok(token.access_token.clone());
        }
        let refresh_token = token.usable_refresh_token().ok_or(AuthError::Expired)?.to_string();

        let mut fresh = self.endpoint.refresh(&refresh_token).await?;
        if fresh.usable_refresh_token().is_none() {
            fresh.refresh_token = Some(refresh_token);
        }
        info!(expiry = ?fresh.expiry, "Refreshed OAuth access token");
        *token = fresh;
        Ok(token.access_token.clone())
    }
}

/// HTTP client that attaches a bearer token to every request.
pub struct AuthorizedClient {
    http: Client,
    tokens: TokenSource,
}

impl AuthorizedClient {
    pub fn new(http: Client, tokens: TokenSource) -> Self {
        Self { http, tokens }
    }

    /// GET `url` with `query` and decode the JSON response.
    pub async fn get_json<T, Q>(&self, url: &str, query: &Q) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let token = self.tokens.access_token().await?;
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(format!("Google API error ({}) for {}: {}", status, url, text).into());
        }

        Ok(response.json::<T>().await?)
    }
}

/// Returns an authenticated client, running the interactive flow on first
/// use. Any failure here is fatal for the caller.
pub async fn authorize(
    credentials_path: &Path,
    token_path: &Path,
) -> Result<AuthorizedClient, AuthError> {
    let config = OAuthClientConfig::from_file(
        credentials_path,
        &[DOCUMENTS_READONLY_SCOPE, DRIVE_READONLY_SCOPE],
    )?;
    let http = Client::new();
    let endpoint = Arc::new(HttpTokenEndpoint::new(http.clone(), config.clone()));

    let mut prompt = PromptCodeProvider::stdio();
    let token = obtain_token(token_path, &config, &mut prompt, endpoint.as_ref()).await?;

    Ok(AuthorizedClient::new(http, TokenSource::new(token, endpoint)))
}
