//! Credential store — the persisted authorized-user bundle.
//!
//! Two files are involved:
//! - the application identity (`credentials.json`), supplied by the
//!   operator, holding client secrets under an `installed` or `web` key;
//! - the token file (`token.json`), written after the first interactive
//!   authorization: `{type, client_id, client_secret, refresh_token}`.
//!
//! A missing or malformed token file is an expected path: `load()` reports
//! absence and `authorize()` falls back to the interactive flow.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use awaybot_core::utils::mask_secret;

use crate::authorizer::Authorizer;
use crate::error::CredentialError;
use crate::token::{AccessToken, TokenResponse};

/// `type` value of a persisted bundle.
pub const AUTHORIZED_USER: &str = "authorized_user";

// ─────────────────────────────────────────────
// CredentialBundle
// ─────────────────────────────────────────────

/// The minimal authorization artifact needed to act on the user's behalf.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialBundle {
    #[serde(rename = "type")]
    pub kind: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl CredentialBundle {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            kind: AUTHORIZED_USER.to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            refresh_token: refresh_token.into(),
        }
    }

    /// Whether the bundle can be used to obtain access tokens.
    pub fn is_usable(&self) -> bool {
        self.kind == AUTHORIZED_USER
            && !self.client_id.is_empty()
            && !self.client_secret.is_empty()
            && !self.refresh_token.is_empty()
    }
}

impl fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialBundle")
            .field("type", &self.kind)
            .field("client_id", &self.client_id)
            .field("client_secret", &mask_secret(&self.client_secret))
            .field("refresh_token", &mask_secret(&self.refresh_token))
            .finish()
    }
}

// ─────────────────────────────────────────────
// Application identity
// ─────────────────────────────────────────────

/// OAuth client registration, as downloaded from the provider console.
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientIdentity {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub redirect_uris: Vec<String>,
}

impl fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("client_id", &self.client_id)
            .field("client_secret", &mask_secret(&self.client_secret))
            .finish()
    }
}

#[derive(Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientIdentity>,
    web: Option<ClientIdentity>,
}

impl ClientIdentity {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            auth_uri: None,
            token_uri: None,
            redirect_uris: Vec::new(),
        }
    }

    /// Parse a client secrets document. `installed` wins over `web`.
    pub fn from_json(content: &str) -> Result<Self, String> {
        let file: ClientSecretsFile =
            serde_json::from_str(content).map_err(|e| e.to_string())?;
        let identity = file
            .installed
            .or(file.web)
            .ok_or_else(|| "missing 'installed' or 'web' key".to_string())?;
        if identity.client_id.is_empty() {
            return Err("empty client_id".to_string());
        }
        Ok(identity)
    }

    /// Read the application identity file.
    pub async fn load(path: &Path) -> Result<Self, CredentialError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| CredentialError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_json(&content).map_err(|reason| CredentialError::InvalidClientSecrets {
            path: path.to_path_buf(),
            reason,
        })
    }
}

// ─────────────────────────────────────────────
// CredentialStore
// ─────────────────────────────────────────────

/// Where the bundle came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthSource {
    /// Loaded from the token file.
    Stored,
    /// Obtained from the interactive authorizer.
    Interactive,
}

/// Result of [`CredentialStore::authorize`].
#[derive(Debug)]
pub struct Authorization {
    pub bundle: CredentialBundle,
    /// Access token handed back by the interactive flow, if any.
    pub access_token: Option<AccessToken>,
    pub source: AuthSource,
    /// Whether the bundle was written to the token file.
    pub persisted: bool,
}

/// Loads and persists the credential bundle.
pub struct CredentialStore {
    token_path: PathBuf,
    credentials_path: PathBuf,
    scopes: Vec<String>,
}

impl CredentialStore {
    pub fn new(token_path: PathBuf, credentials_path: PathBuf, scopes: Vec<String>) -> Self {
        Self {
            token_path,
            credentials_path,
            scopes,
        }
    }

    pub fn token_path(&self) -> &Path {
        &self.token_path
    }

    pub fn credentials_path(&self) -> &Path {
        &self.credentials_path
    }

    /// Read the persisted bundle. Any failure is reported as absence.
    pub async fn load(&self) -> Option<CredentialBundle> {
        let content = match tokio::fs::read_to_string(&self.token_path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.token_path.display(), "no saved credentials");
                return None;
            }
            Err(e) => {
                warn!(path = %self.token_path.display(), error = %e, "failed to read saved credentials");
                return None;
            }
        };

        match serde_json::from_str::<CredentialBundle>(&content) {
            Ok(bundle) if bundle.is_usable() => {
                debug!(path = %self.token_path.display(), "loaded saved credentials");
                Some(bundle)
            }
            Ok(bundle) => {
                warn!(
                    path = %self.token_path.display(),
                    kind = %bundle.kind,
                    "saved credentials are incomplete, ignoring"
                );
                None
            }
            Err(e) => {
                warn!(path = %self.token_path.display(), error = %e, "saved credentials are malformed, ignoring");
                None
            }
        }
    }

    /// Persist a bundle.
    ///
    /// Written to a sibling temp file first and renamed into place, so a
    /// concurrent reader sees either the old file or the complete new one.
    pub async fn save(&self, bundle: &CredentialBundle) -> Result<(), CredentialError> {
        let io_err = |source: std::io::Error| CredentialError::Io {
            path: self.token_path.clone(),
            source,
        };

        if let Some(parent) = self.token_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
            }
        }

        let json = serde_json::to_string(bundle)
            .map_err(|e| io_err(std::io::Error::other(e)))?;

        let tmp_path = self.token_path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, json).await.map_err(io_err)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(io_err)?;
        }

        tokio::fs::rename(&tmp_path, &self.token_path)
            .await
            .map_err(io_err)?;

        info!(path = %self.token_path.display(), "saved credentials");
        Ok(())
    }

    /// Reject a grant that reports scopes and leaves out a required one.
    fn check_granted_scopes(&self, response: &TokenResponse) -> Result<(), CredentialError> {
        if response.scope.is_none() {
            return Ok(());
        }
        let granted = response.scopes();
        let missing: Vec<&str> = self
            .scopes
            .iter()
            .filter(|s| !granted.contains(s))
            .map(String::as_str)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(CredentialError::Authorization(format!(
                "grant is missing required scopes: {}",
                missing.join(" ")
            )))
        }
    }

    /// Load the saved bundle, or obtain and persist a new one.
    ///
    /// The new bundle is only persisted when the authorizer returned a
    /// refresh token; otherwise it is usable for this process only.
    pub async fn authorize(
        &self,
        authorizer: &dyn Authorizer,
    ) -> Result<Authorization, CredentialError> {
        if let Some(bundle) = self.load().await {
            return Ok(Authorization {
                bundle,
                access_token: None,
                source: AuthSource::Stored,
                persisted: true,
            });
        }

        let client = ClientIdentity::load(&self.credentials_path).await?;
        info!(
            client_id = %client.client_id,
            scopes = self.scopes.len(),
            "no saved credentials, starting authorization"
        );

        let response = authorizer.authorize(&client, &self.scopes).await?;
        self.check_granted_scopes(&response)?;
        let refresh_token = response.refresh_token.clone().unwrap_or_default();
        let bundle = CredentialBundle::new(
            client.client_id.clone(),
            client.client_secret.clone(),
            refresh_token,
        );

        let persisted = if bundle.refresh_token.is_empty() {
            warn!("authorization returned no refresh token, credentials not saved");
            false
        } else {
            self.save(&bundle).await?;
            true
        };

        Ok(Authorization {
            bundle,
            access_token: Some(response.into_access_token(Utc::now())),
            source: AuthSource::Interactive,
            persisted,
        })
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
