//! Shared startup steps: credentials, mail client, reply engine.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use awaybot_agent::{AutoReplyCycle, MessageComposer, ReplyWorkflow, ThreadScanner};
use awaybot_core::config::Config;
use awaybot_gmail::client::build_http_client;
use awaybot_gmail::credentials::AuthSource;
use awaybot_gmail::labels::resolve_label_id;
use awaybot_gmail::{CredentialStore, GmailClient, LoopbackAuthorizer, MailService, TokenManager};

use crate::helpers::expand_tilde;

/// An authorized mailbox.
pub struct Connection {
    pub client: Arc<GmailClient>,
    pub source: AuthSource,
    /// Whether the credentials are on disk for the next start.
    pub persisted: bool,
}

pub fn credential_store(config: &Config) -> CredentialStore {
    CredentialStore::new(
        expand_tilde(&config.auth.token_path),
        expand_tilde(&config.auth.credentials_path),
        config.auth.scopes.clone(),
    )
}

/// Obtain credentials (saved, or interactively) and build the client.
///
/// Any failure here is fatal for the caller: nothing can run unauthorized.
pub async fn connect(config: &Config) -> Result<Connection> {
    let http = build_http_client(Duration::from_secs(config.gmail.timeout_s))
        .context("failed to build HTTP client")?;

    let store = credential_store(config);
    let authorizer = LoopbackAuthorizer::new(http.clone(), &config.auth.auth_url, &config.auth.token_url);
    let authorization = store.authorize(&authorizer).await.with_context(|| {
        format!(
            "authorization failed (identity file: {}, token file: {})",
            store.credentials_path().display(),
            store.token_path().display()
        )
    })?;

    match authorization.source {
        AuthSource::Stored => info!(path = %store.token_path().display(), "using saved credentials"),
        AuthSource::Interactive => info!(persisted = authorization.persisted, "authorized interactively"),
    }

    let mut tokens = TokenManager::new(http.clone(), &config.auth.token_url, authorization.bundle);
    if let Some(token) = authorization.access_token {
        tokens = tokens.with_token(token);
    }

    let client = GmailClient::new(
        http,
        &config.gmail.api_base,
        &config.gmail.user_id,
        Arc::new(tokens),
    );

    info!(service = client.display_name(), user = %config.gmail.user_id, "mailbox connected");

    Ok(Connection {
        client: Arc::new(client),
        source: authorization.source,
        persisted: authorization.persisted,
    })
}

/// Wire scanner, workflow, and cycle against an authorized mailbox.
///
/// Resolves the handled label by name, creating it on first use.
pub async fn build_cycle(config: &Config, service: Arc<dyn MailService>) -> Result<AutoReplyCycle> {
    let name = config.gmail.handled_label.trim();
    if name.is_empty() {
        anyhow::bail!("gmail.handledLabel must not be empty");
    }

    let handled_id = resolve_label_id(service.as_ref(), name, true)
        .await
        .with_context(|| format!("failed to resolve label '{name}'"))?;
    info!(label = %name, id = %handled_id, "handled label resolved");

    let composer = MessageComposer::new(config.reply.body.clone(), config.reply.thread_headers);
    let workflow = ReplyWorkflow::new(service.clone(), composer, handled_id, &config.gmail.unread_label)
        .with_order(config.reply.order);
    let scanner = ThreadScanner::new(service, config.gmail.effective_query(), config.gmail.max_results);
    info!(query = %scanner.query(), order = ?config.reply.order, "reply engine ready");

    Ok(AutoReplyCycle::new(scanner, Arc::new(workflow)))
}
