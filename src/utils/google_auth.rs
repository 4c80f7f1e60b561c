//! OAuth2 access tokens for the Google Drive API
//!
//! Works from an authorized-user token file (the JSON written by Google's
//! installed-app flow). A missing or expired access token is refreshed with
//! the stored refresh token and the file is rewritten.
//!
//! The first token file comes from a browser consent: [`GoogleAuth::begin_consent`]
//! reserves a loopback port and builds the consent URL, and
//! [`GoogleAuth::finish_consent`] waits for Google's redirect, redeems the
//! code (PKCE) and writes the token file.

use super::storage_ops::StorageError;
use crate::config::DriveConfig;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use reqwest::blocking::{Client, Response};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::io::{self, Read, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use url::Url;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";

const CONSENT_RECEIVED: &str = concat!(
    "HTTP/1.1 200 OK\r\n",
    "Content-Type: text/plain; charset=utf-8\r\n",
    "Connection: close\r\n\r\n",
    "world-backup received the authorization. You can close this window.\n",
);
const NOT_FOUND: &str = "HTTP/1.1 404 Not Found\r\nConnection: close\r\nContent-Length: 0\r\n\r\n";

/// Full Drive scope; the backup folder may predate this client
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// Tokens are refreshed this long before their stated expiry
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Authorized-user token file contents
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AuthorizedUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    /// RFC 3339 expiry of `token`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<String>,
    /// Fields we do not interpret (scopes, account, ...) are written back untouched
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl AuthorizedUser {
    /// Whether the stored access token can be used at `now`
    ///
    /// A token without a recorded expiry is trusted; an unparsable expiry is not.
    pub fn has_valid_token(&self, now: DateTime<Utc>) -> bool {
        if self.token.as_deref().map_or(true, str::is_empty) {
            return false;
        }

        match self.expiry {
            None => true,
            Some(ref expiry) => DateTime::parse_from_rfc3339(expiry)
                .map(|at| at.with_timezone(&Utc) - Duration::seconds(EXPIRY_MARGIN_SECS) > now)
                .unwrap_or(false),
        }
    }
}

/// OAuth client registration from the Cloud console download
#[derive(Debug, Clone, Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

#[derive(Debug, Clone, Deserialize)]
struct ClientSecrets {
    client_id: String,
    client_secret: String,
    #[serde(default)]
    auth_uri: Option<String>,
    #[serde(default)]
    token_uri: Option<String>,
}

/// Token endpoint answer for both refresh and code exchange
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

/// Consent URL plus the values needed to redeem its authorization code
#[derive(Debug, Clone)]
struct ConsentRequest {
    auth_url: String,
    redirect_uri: String,
    state: String,
    code_verifier: String,
}

/// Browser consent waiting for Google to redirect back to the loopback listener
pub struct PendingConsent {
    listener: TcpListener,
    secrets: ClientSecrets,
    request: ConsentRequest,
}

impl PendingConsent {
    /// URL the user has to open in a browser
    pub fn auth_url(&self) -> &str {
        &self.request.auth_url
    }

    pub fn redirect_uri(&self) -> &str {
        &self.request.redirect_uri
    }
}

/// Access-token source backed by the token and client secrets files
pub struct GoogleAuth {
    credentials_file: PathBuf,
    token_file: PathBuf,
    http: Client,
}

impl GoogleAuth {
    pub fn new(credentials_file: &Path, token_file: &Path, http: Client) -> Self {
        Self {
            credentials_file: credentials_file.to_path_buf(),
            token_file: token_file.to_path_buf(),
            http,
        }
    }

    /// Client for the configured Drive credential files
    pub fn from_config(config: &DriveConfig) -> Result<Self, StorageError> {
        let http = Client::builder()
            .user_agent(concat!("world-backup/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::new(&config.credentials_file, &config.token_file, http))
    }

    pub fn token_file(&self) -> &Path {
        &self.token_file
    }

    /// Reserve a loopback port and build the consent URL redirecting to it
    pub fn begin_consent(&self) -> Result<PendingConsent, StorageError> {
        let secrets = self.load_client_secrets()?;

        let listener = TcpListener::bind("127.0.0.1:0").map_err(|e| {
            StorageError::Auth(format!("failed to bind loopback listener: {}", e))
        })?;
        let port = listener
            .local_addr()
            .map_err(|e| StorageError::Auth(format!("failed to read loopback port: {}", e)))?
            .port();

        let redirect_uri = format!("http://127.0.0.1:{}/", port);
        let request = build_consent_request(&secrets, &redirect_uri)?;
        debug!("Waiting for consent redirect on {}", redirect_uri);

        Ok(PendingConsent {
            listener,
            secrets,
            request,
        })
    }

    /// Wait for the consent redirect, redeem its code and write the token file
    pub fn finish_consent(&self, pending: PendingConsent) -> Result<(), StorageError> {
        let target = wait_for_callback(&pending.listener)?;
        let code = parse_callback(&target, &pending.request.state)?;

        let secrets = &pending.secrets;
        let token_uri = secrets
            .token_uri
            .clone()
            .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string());

        info!("Exchanging authorization code for Drive tokens");
        let response = self
            .http
            .post(&token_uri)
            .form(&[
                ("code", code.as_str()),
                ("client_id", secrets.client_id.as_str()),
                ("client_secret", secrets.client_secret.as_str()),
                ("redirect_uri", pending.request.redirect_uri.as_str()),
                ("code_verifier", pending.request.code_verifier.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()?;
        let token = read_token_response(response, "authorization code exchange")?;

        let user = authorized_user(token, secrets, &token_uri, Utc::now())?;
        if let Some(parent) = self.token_file.parent() {
            fs::create_dir_all(parent).map_err(|source| StorageError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        self.save_token_file(&user)?;
        info!("Wrote Drive token file {:?}", self.token_file);

        Ok(())
    }

    /// Return a usable access token, refreshing and persisting it if needed
    pub fn access_token(&self) -> Result<String, StorageError> {
        let mut user = self.load_token_file()?;
        let now = Utc::now();

        if user.has_valid_token(now) {
            debug!("Using cached Google access token");
            return user
                .token
                .ok_or_else(|| StorageError::Auth("token file has no access token".to_string()));
        }

        info!("Refreshing Google access token");
        let refreshed = self.refresh(&user)?;

        user.token = Some(refreshed.access_token.clone());
        user.expiry = refreshed
            .expires_in
            .map(|secs| (now + Duration::seconds(secs)).to_rfc3339());
        self.save_token_file(&user)?;

        Ok(refreshed.access_token)
    }

    fn refresh(&self, user: &AuthorizedUser) -> Result<TokenResponse, StorageError> {
        let refresh_token = user.refresh_token.as_deref().ok_or_else(|| {
            StorageError::Auth(format!(
                "{:?} has no refresh token; authorize the application again",
                self.token_file
            ))
        })?;

        let (client_id, client_secret, token_uri) = match (&user.client_id, &user.client_secret) {
            (Some(id), Some(secret)) => (id.clone(), secret.clone(), user.token_uri.clone()),
            _ => {
                let secrets = self.load_client_secrets()?;
                let uri = user.token_uri.clone().or(secrets.token_uri);
                (secrets.client_id, secrets.client_secret, uri)
            }
        };
        let token_uri = token_uri.unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string());

        let response = self
            .http
            .post(&token_uri)
            .form(&[
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()?;

        read_token_response(response, "token refresh")
    }

    fn load_token_file(&self) -> Result<AuthorizedUser, StorageError> {
        let content = match fs::read_to_string(&self.token_file) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StorageError::Auth(format!(
                    "token file {:?} not found; run `world-backup authorize` first",
                    self.token_file
                )))
            }
            Err(source) => {
                return Err(StorageError::Io {
                    path: self.token_file.clone(),
                    source,
                })
            }
        };
        serde_json::from_str(&content).map_err(|e| {
            StorageError::Auth(format!("invalid token file {:?}: {}", self.token_file, e))
        })
    }

    fn save_token_file(&self, user: &AuthorizedUser) -> Result<(), StorageError> {
        let content = serde_json::to_string_pretty(user)
            .map_err(|e| StorageError::Auth(format!("failed to serialize token: {}", e)))?;
        fs::write(&self.token_file, content).map_err(|source| StorageError::Io {
            path: self.token_file.clone(),
            source,
        })
    }

    fn load_client_secrets(&self) -> Result<ClientSecrets, StorageError> {
        let content =
            fs::read_to_string(&self.credentials_file).map_err(|source| StorageError::Io {
                path: self.credentials_file.clone(),
                source,
            })?;
        parse_client_secrets(&content).map_err(|e| {
            StorageError::Auth(format!(
                "invalid credentials file {:?}: {}",
                self.credentials_file, e
            ))
        })
    }
}

fn read_token_response(response: Response, operation: &str) -> Result<TokenResponse, StorageError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(StorageError::Auth(format!(
            "{} failed with status {}: {}",
            operation, status, body
        )));
    }

    Ok(response.json()?)
}

fn random_url_safe(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(&bytes)
}

fn code_challenge_s256(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

fn build_consent_request(
    secrets: &ClientSecrets,
    redirect_uri: &str,
) -> Result<ConsentRequest, StorageError> {
    let state = random_url_safe(16);
    let code_verifier = random_url_safe(64);

    let auth_uri = secrets.auth_uri.as_deref().unwrap_or(DEFAULT_AUTH_URI);
    let mut url = Url::parse(auth_uri)
        .map_err(|e| StorageError::Auth(format!("invalid auth_uri {:?}: {}", auth_uri, e)))?;
    url.query_pairs_mut()
        .append_pair("client_id", &secrets.client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("response_type", "code")
        .append_pair("scope", DRIVE_SCOPE)
        .append_pair("access_type", "offline")
        .append_pair("prompt", "consent")
        .append_pair("code_challenge", &code_challenge_s256(&code_verifier))
        .append_pair("code_challenge_method", "S256")
        .append_pair("state", &state);

    Ok(ConsentRequest {
        auth_url: url.to_string(),
        redirect_uri: redirect_uri.to_string(),
        state,
        code_verifier,
    })
}

/// Accept connections until one carries a query string; returns its request target
fn wait_for_callback(listener: &TcpListener) -> Result<String, StorageError> {
    loop {
        let (mut stream, _peer) = listener.accept().map_err(|e| {
            StorageError::Auth(format!("failed to accept consent redirect: {}", e))
        })?;

        let mut buffer = vec![0u8; 8192];
        let size = match stream.read(&mut buffer) {
            Ok(size) => size,
            Err(e) => {
                warn!("Failed to read loopback request: {}", e);
                continue;
            }
        };

        let request = String::from_utf8_lossy(&buffer[..size]);
        let mut parts = request.lines().next().unwrap_or_default().split_whitespace();
        match (parts.next(), parts.next()) {
            (Some("GET"), Some(target)) if target.contains('?') => {
                let _ = stream.write_all(CONSENT_RECEIVED.as_bytes());
                return Ok(target.to_string());
            }
            _ => {
                // favicon and other stray requests
                let _ = stream.write_all(NOT_FOUND.as_bytes());
            }
        }
    }
}

/// Extract the authorization code from a redirect target like `/?state=..&code=..`
fn parse_callback(target: &str, expected_state: &str) -> Result<String, StorageError> {
    let url = Url::parse("http://127.0.0.1/")
        .and_then(|base| base.join(target))
        .map_err(|e| {
            StorageError::Auth(format!("invalid consent redirect {:?}: {}", target, e))
        })?;
    let params: HashMap<String, String> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if let Some(error) = params.get("error") {
        return Err(StorageError::Auth(format!("consent was not granted: {}", error)));
    }

    if params.get("state").map(String::as_str) != Some(expected_state) {
        return Err(StorageError::Auth("consent redirect state did not match".to_string()));
    }

    params
        .get("code")
        .cloned()
        .ok_or_else(|| StorageError::Auth("consent redirect has no code".to_string()))
}

fn authorized_user(
    token: TokenResponse,
    secrets: &ClientSecrets,
    token_uri: &str,
    now: DateTime<Utc>,
) -> Result<AuthorizedUser, StorageError> {
    let refresh_token = token.refresh_token.ok_or_else(|| {
        StorageError::Auth(
            "Google returned no refresh token; remove the app's access and authorize again"
                .to_string(),
        )
    })?;

    let scopes: Vec<&str> = token
        .scope
        .as_deref()
        .unwrap_or(DRIVE_SCOPE)
        .split_whitespace()
        .collect();
    let mut extra = serde_json::Map::new();
    extra.insert("scopes".to_string(), serde_json::json!(scopes));

    Ok(AuthorizedUser {
        token: Some(token.access_token),
        refresh_token: Some(refresh_token),
        token_uri: Some(token_uri.to_string()),
        client_id: Some(secrets.client_id.clone()),
        client_secret: Some(secrets.client_secret.clone()),
        expiry: token
            .expires_in
            .map(|secs| (now + Duration::seconds(secs)).to_rfc3339()),
        extra,
    })
}

fn parse_client_secrets(content: &str) -> Result<ClientSecrets, String> {
    let file: ClientSecretsFile = serde_json::from_str(content).map_err(|e| e.to_string())?;
    file.installed
        .or(file.web)
        .ok_or_else(|| "expected an \"installed\" or \"web\" client".to_string())
}
