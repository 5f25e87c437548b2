//! Interactive authorization.
//!
//! [`LoopbackAuthorizer`] implements the installed-app flow: it listens on
//! an ephemeral `127.0.0.1` port, prints the consent URL, waits for the
//! browser redirect carrying the authorization code, and exchanges the code
//! at the token endpoint. Every attempt carries a fresh S256 PKCE pair.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::Url;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::credentials::ClientIdentity;
use crate::error::CredentialError;
use crate::token::{exchange_code, TokenResponse};

/// Obtains a fresh grant for the required scopes.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(
        &self,
        client: &ClientIdentity,
        scopes: &[String],
    ) -> Result<TokenResponse, CredentialError>;
}

/// How long to wait for the user to finish the consent screen.
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

/// Largest request head accepted on the callback socket.
const MAX_REQUEST_HEAD: usize = 8 * 1024;

const CALLBACK_PAGE: &str = "<html><body><h3>Authorization complete.</h3>\
<p>You can close this window and return to the terminal.</p></body></html>";

const CALLBACK_ERROR_PAGE: &str = "<html><body><h3>Authorization failed.</h3>\
<p>Check the terminal for details.</p></body></html>";

pub struct LoopbackAuthorizer {
    http: reqwest::Client,
    auth_url: String,
    token_url: String,
}

impl LoopbackAuthorizer {
    pub fn new(http: reqwest::Client, auth_url: impl Into<String>, token_url: impl Into<String>) -> Self {
        Self {
            http,
            auth_url: auth_url.into(),
            token_url: token_url.into(),
        }
    }

    /// Accept connections until one carries the OAuth callback.
    async fn wait_for_callback(
        &self,
        listener: &TcpListener,
        state: &str,
    ) -> Result<String, CredentialError> {
        loop {
            let (mut socket, peer) = listener
                .accept()
                .await
                .map_err(|e| CredentialError::Authorization(format!("callback listener: {e}")))?;
            debug!(peer = %peer, "callback connection");

            let head = match read_request_head(&mut socket).await {
                Ok(h) => h,
                Err(e) => {
                    warn!(error = %e, "unreadable callback request");
                    continue;
                }
            };

            let Some(request_line) = head.lines().next() else {
                continue;
            };

            match parse_callback(request_line, state) {
                Ok(Some(code)) => {
                    write_response(&mut socket, "200 OK", CALLBACK_PAGE).await;
                    return Ok(code);
                }
                // Not the callback (e.g. favicon); keep waiting.
                Ok(None) => write_response(&mut socket, "404 Not Found", "").await,
                Err(e) => {
                    write_response(&mut socket, "400 Bad Request", CALLBACK_ERROR_PAGE).await;
                    return Err(e);
                }
            }
        }
    }
}

#[async_trait]
impl Authorizer for LoopbackAuthorizer {
    async fn authorize(
        &self,
        client: &ClientIdentity,
        scopes: &[String],
    ) -> Result<TokenResponse, CredentialError> {
        let listener = TcpListener::bind(("127.0.0.1", 0))
            .await
            .map_err(|e| CredentialError::Authorization(format!("cannot bind callback port: {e}")))?;
        let port = listener
            .local_addr()
            .map_err(|e| CredentialError::Authorization(e.to_string()))?
            .port();
        let redirect_uri = format!("http://127.0.0.1:{port}");
        let state = random_state();
        let pkce = Pkce::generate();

        let auth_url = client.auth_uri.as_deref().unwrap_or(self.auth_url.as_str());
        let url = build_auth_url(
            auth_url,
            &client.client_id,
            &redirect_uri,
            scopes,
            &state,
            &pkce.challenge,
        )?;

        info!(redirect_uri = %redirect_uri, "waiting for authorization callback");
        eprintln!("\nOpen this URL in a browser to authorize access:\n\n  {url}\n");

        let code = tokio::time::timeout(CALLBACK_TIMEOUT, self.wait_for_callback(&listener, &state))
            .await
            .map_err(|_| {
                CredentialError::Authorization(format!(
                    "no callback received within {}s",
                    CALLBACK_TIMEOUT.as_secs()
                ))
            })??;

        let token_url = client.token_uri.as_deref().unwrap_or(self.token_url.as_str());
        let response =
            exchange_code(&self.http, token_url, client, &code, &redirect_uri, &pkce.verifier).await?;
        info!(scopes = %response.scope.as_deref().unwrap_or("?"), "authorization granted");
        Ok(response)
    }
}

// ─────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────

fn random_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

/// PKCE verifier and its S256 challenge.
#[derive(Clone, Debug)]
pub struct Pkce {
    pub verifier: String,
    pub challenge: String,
}

impl Pkce {
    /// 32 random bytes, giving a 43-character verifier.
    pub fn generate() -> Self {
        let bytes: [u8; 32] = rand::thread_rng().gen();
        Self::from_verifier(URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn from_verifier(verifier: impl Into<String>) -> Self {
        let verifier = verifier.into();
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        Self { verifier, challenge }
    }
}

/// Build the consent URL. Offline access with forced consent so the
/// response always carries a refresh token.
pub fn build_auth_url(
    auth_url: &str,
    client_id: &str,
    redirect_uri: &str,
    scopes: &[String],
    state: &str,
    code_challenge: &str,
) -> Result<Url, CredentialError> {
    let scope = scopes.join(" ");
    Url::parse_with_params(
        auth_url,
        &[
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", scope.as_str()),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("state", state),
            ("code_challenge", code_challenge),
            ("code_challenge_method", "S256"),
        ],
    )
    .map_err(|e| CredentialError::Authorization(format!("invalid auth url '{auth_url}': {e}")))
}

/// Extract the authorization code from a callback request line.
///
/// Returns `Ok(None)` for requests that are not the callback at all,
/// and an error when the provider reported a denial or the state differs.
pub fn parse_callback(request_line: &str, expected_state: &str) -> Result<Option<String>, CredentialError> {
    let mut parts = request_line.split_whitespace();
    let (Some("GET"), Some(target)) = (parts.next(), parts.next()) else {
        return Ok(None);
    };

    let url = Url::parse(&format!("http://127.0.0.1{target}"))
        .map_err(|e| CredentialError::Authorization(format!("malformed callback: {e}")))?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Err(CredentialError::Authorization(format!("provider returned '{error}'")));
    }
    let Some(code) = code else {
        return Ok(None);
    };
    if state.as_deref() != Some(expected_state) {
        return Err(CredentialError::Authorization("state mismatch in callback".to_string()));
    }
    Ok(Some(code))
}

async fn read_request_head(socket: &mut tokio::net::TcpStream) -> std::io::Result<String> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(4).any(|w| w == b"\r\n\r\n") || buf.len() >= MAX_REQUEST_HEAD {
            break;
        }
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

async fn write_response(socket: &mut tokio::net::TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    if let Err(e) = socket.write_all(response.as_bytes()).await {
        debug!(error = %e, "failed to write callback response");
    }
    let _ = socket.shutdown().await;
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
