//! Error types for the Gmail layer.

use std::path::PathBuf;

use awaybot_core::types::ApiErrorEnvelope;

/// Failures obtaining, persisting, or refreshing credentials.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid client secrets file {}: {reason}", .path.display())]
    InvalidClientSecrets { path: PathBuf, reason: String },
    #[error("authorization failed: {0}")]
    Authorization(String),
    #[error("token refresh failed: {0}")]
    Refresh(String),
}

/// Failures calling the remote mailbox.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("gmail api error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("invalid response: {0}")]
    Decode(String),
    #[error(transparent)]
    Credentials(#[from] CredentialError),
    #[error("{0}")]
    Other(String),
}

impl MailError {
    /// Build an `Api` error from a non-success status and its body.
    ///
    /// Uses the Google error envelope message when the body carries one.
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<ApiErrorEnvelope>(body)
            .map(|env| env.error.message)
            .ok()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| awaybot_core::utils::truncate_string(body.trim(), 200));
        MailError::Api { status, message }
    }

    /// HTTP status of an API error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            MailError::Api { status, .. } => Some(*status),
            MailError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_response_uses_envelope_message() {
        let body = r#"{"error":{"code":403,"message":"Insufficient Permission","status":"PERMISSION_DENIED"}}"#;
        let err = MailError::from_response(403, body);
        assert_eq!(err.status(), Some(403));
        assert_eq!(err.to_string(), "gmail api error 403: Insufficient Permission");
    }

    #[test]
    fn test_from_response_plain_body() {
        let err = MailError::from_response(502, "  Bad Gateway \n");
        assert_eq!(err.to_string(), "gmail api error 502: Bad Gateway");
    }

    #[test]
    fn test_credential_error_display() {
        let err = CredentialError::InvalidClientSecrets {
            path: PathBuf::from("/tmp/credentials.json"),
            reason: "missing 'installed' or 'web' key".into(),
        };
        assert!(err.to_string().contains("/tmp/credentials.json"));
        let mail: MailError = CredentialError::Refresh("invalid_grant".into()).into();
        assert_eq!(mail.to_string(), "token refresh failed: invalid_grant");
    }
}
