//! Gmail REST v1 client.
//!
//! Implements [`MailService`] with direct `reqwest` calls. Every request
//! carries a bearer token from the shared [`TokenManager`]; a `401` drops
//! the cached token and the request is retried once with a fresh one.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::{DeserializeOwned, IgnoredAny};
use tracing::{debug, error, warn};

use awaybot_core::types::{
    CreateLabelRequest, Label, ListLabelsResponse, ListThreadsResponse, MessageMetadata,
    ModifyLabelsRequest, SendMessageRequest, SentMessage, ThreadRef,
};

use crate::error::MailError;
use crate::token::TokenManager;
use crate::traits::MailService;

/// Headers requested with `format=metadata`.
const METADATA_HEADERS: &[&str] = &["From", "To", "Subject", "Message-ID", "References"];

pub struct GmailClient {
    /// HTTP client (shared, connection-pooled).
    http: reqwest::Client,
    /// API base URL (e.g. `"https://gmail.googleapis.com/gmail/v1"`).
    api_base: String,
    /// Mailbox owner, usually `"me"`.
    user_id: String,
    tokens: Arc<TokenManager>,
}

impl std::fmt::Debug for GmailClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GmailClient")
            .field("api_base", &self.api_base)
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// Build the shared HTTP client.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, MailError> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

impl GmailClient {
    pub fn new(
        http: reqwest::Client,
        api_base: impl Into<String>,
        user_id: impl Into<String>,
        tokens: Arc<TokenManager>,
    ) -> Self {
        Self {
            http,
            api_base: api_base.into(),
            user_id: user_id.into(),
            tokens,
        }
    }

    /// Full URL for a per-user resource path.
    fn url(&self, path: &str) -> String {
        let base = self.api_base.trim_end_matches('/');
        format!("{}/users/{}/{}", base, self.user_id, path)
    }

    /// Run an authorized request and decode its JSON body.
    ///
    /// `build` is called again for the single retry after a `401`.
    async fn call<T, F>(&self, op: &str, build: F) -> Result<T, MailError>
    where
        T: DeserializeOwned,
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut retried = false;
        loop {
            let token = self.tokens.access_token().await?;
            let response = build().bearer_auth(&token).send().await.map_err(|e| {
                error!(op, error = %e, "HTTP request failed");
                MailError::Http(e)
            })?;

            let status = response.status();
            if status == StatusCode::UNAUTHORIZED && !retried {
                warn!(op, "request unauthorized, retrying with a fresh token");
                self.tokens.invalidate(&token).await;
                retried = true;
                continue;
            }

            if !status.is_success() {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Failed to read error body".to_string());
                error!(op, status = %status, body = %body, "API error");
                return Err(MailError::from_response(status.as_u16(), &body));
            }

            return response
                .json::<T>()
                .await
                .map_err(|e| MailError::Decode(format!("{op}: {e}")));
        }
    }
}

#[async_trait]
impl MailService for GmailClient {
    async fn list_threads(
        &self,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<ThreadRef>, MailError> {
        let url = self.url("threads");
        let max = max_results.to_string();
        let resp: ListThreadsResponse = self
            .call("threads.list", || {
                self.http
                    .get(&url)
                    .query(&[("q", query), ("maxResults", max.as_str())])
            })
            .await?;

        debug!(
            threads = resp.threads.len(),
            more = resp.next_page_token.is_some(),
            "threads listed"
        );
        Ok(resp.threads)
    }

    async fn get_message_metadata(&self, message_id: &str) -> Result<MessageMetadata, MailError> {
        let url = self.url(&format!("messages/{message_id}"));
        let mut params: Vec<(&str, &str)> = vec![("format", "metadata")];
        params.extend(METADATA_HEADERS.iter().map(|h| ("metadataHeaders", *h)));

        self.call("messages.get", || self.http.get(&url).query(&params))
            .await
    }

    async fn send_message(&self, request: &SendMessageRequest) -> Result<SentMessage, MailError> {
        let url = self.url("messages/send");
        self.call("messages.send", || self.http.post(&url).json(request))
            .await
    }

    async fn modify_thread_labels(
        &self,
        thread_id: &str,
        change: &ModifyLabelsRequest,
    ) -> Result<(), MailError> {
        let url = self.url(&format!("threads/{thread_id}/modify"));
        let _: IgnoredAny = self
            .call("threads.modify", || self.http.post(&url).json(change))
            .await?;
        Ok(())
    }

    async fn list_labels(&self) -> Result<Vec<Label>, MailError> {
        let url = self.url("labels");
        let resp: ListLabelsResponse = self.call("labels.list", || self.http.get(&url)).await?;
        Ok(resp.labels)
    }

    async fn create_label(&self, name: &str) -> Result<Label, MailError> {
        let url = self.url("labels");
        let body = CreateLabelRequest::visible(name);
        self.call("labels.create", || self.http.post(&url).json(&body))
            .await
    }

    fn display_name(&self) -> &str {
        "Gmail"
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
