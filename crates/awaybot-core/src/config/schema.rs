//! Configuration schema.
//!
//! Hierarchy: `Config` → `GmailConfig`, `AuthConfig`, `ReplyConfig`,
//! `ScheduleConfig`.
//!
//! JSON on disk uses **camelCase** keys; Rust uses snake_case.
//! We use `#[serde(rename_all = "camelCase")]` to handle the conversion.

use serde::{Deserialize, Serialize};

/// OAuth scopes requested at authorization time.
///
/// Full mailbox access plus the modify, compose and send scopes; together
/// they cover reading threads, changing labels and sending replies.
pub const DEFAULT_SCOPES: &[&str] = &[
    "https://mail.google.com/",
    "https://www.googleapis.com/auth/gmail.modify",
    "https://www.googleapis.com/auth/gmail.compose",
    "https://www.googleapis.com/auth/gmail.send",
];

/// Reply text sent to every eligible conversation.
pub const DEFAULT_REPLY_BODY: &str = "Sorry, I'm busy now. So I can't reply to you.";

// ─────────────────────────────────────────────
// Root Config
// ─────────────────────────────────────────────

/// Root configuration — loaded from `~/.awaybot/config.json` + env vars.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub gmail: GmailConfig,
    pub auth: AuthConfig,
    pub reply: ReplyConfig,
    pub schedule: ScheduleConfig,
}

// ─────────────────────────────────────────────
// Gmail
// ─────────────────────────────────────────────

/// Remote mailbox settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GmailConfig {
    /// REST base URL (overridable for tests and proxies).
    pub api_base: String,
    /// Mailbox owner; `"me"` is the authorized user.
    pub user_id: String,
    /// Search filter selecting conversations that need a reply.
    pub query: String,
    /// Page size for the thread listing. Only the first page is processed.
    pub max_results: u32,
    /// Name of the label marking handled conversations.
    pub handled_label: String,
    /// System label removed once a conversation is handled.
    pub unread_label: String,
    /// HTTP timeout in seconds.
    pub timeout_s: u64,
}

impl Default for GmailConfig {
    fn default() -> Self {
        Self {
            api_base: "https://gmail.googleapis.com/gmail/v1".to_string(),
            user_id: "me".to_string(),
            query: "in:inbox is:unread label:UNREAD".to_string(),
            max_results: 100,
            handled_label: "auto-replied".to_string(),
            unread_label: "UNREAD".to_string(),
            timeout_s: 30,
        }
    }
}

impl GmailConfig {
    /// The list filter, excluding conversations already carrying the handled label.
    pub fn effective_query(&self) -> String {
        let handled = self.handled_label.trim();
        if handled.is_empty() {
            return self.query.clone();
        }
        // Gmail label search uses hyphens in place of spaces.
        let term = format!("-label:{}", handled.replace(' ', "-"));
        if self.query.split_whitespace().any(|t| t == term) {
            self.query.clone()
        } else {
            format!("{} {}", self.query, term)
        }
    }
}

// ─────────────────────────────────────────────
// Auth
// ─────────────────────────────────────────────

/// Credential file locations and OAuth endpoints.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthConfig {
    /// Application identity file (`installed` or `web` client secrets).
    pub credentials_path: String,
    /// Persisted authorized-user bundle.
    pub token_path: String,
    /// Authorization endpoint used by the interactive flow.
    pub auth_url: String,
    /// Token endpoint for code exchange and refresh.
    pub token_url: String,
    /// Scopes requested at authorization time.
    pub scopes: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            credentials_path: "~/.awaybot/credentials.json".to_string(),
            token_path: "~/.awaybot/token.json".to_string(),
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

// ─────────────────────────────────────────────
// Reply
// ─────────────────────────────────────────────

/// Order of the two remote mutations made per conversation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyOrder {
    /// Send, then relabel. A failed relabel leads to a duplicate reply later.
    #[default]
    SendThenLabel,
    /// Relabel, then send. A failed send means the reply is never sent.
    LabelThenSend,
}

impl std::str::FromStr for ReplyOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "send_then_label" => Ok(Self::SendThenLabel),
            "label_then_send" => Ok(Self::LabelThenSend),
            other => Err(format!("unknown reply order '{other}'")),
        }
    }
}

/// Reply template settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReplyConfig {
    /// Literal reply body.
    pub body: String,
    /// Mutation order.
    pub order: ReplyOrder,
    /// Add `Subject`/`In-Reply-To`/`References` taken from the original message.
    pub thread_headers: bool,
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            body: DEFAULT_REPLY_BODY.to_string(),
            order: ReplyOrder::default(),
            thread_headers: true,
        }
    }
}

// ─────────────────────────────────────────────
// Schedule
// ─────────────────────────────────────────────

/// What the scheduler does when a tick fires while a cycle is still running.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Drop the tick.
    #[default]
    Skip,
    /// Start another cycle alongside the running one.
    Allow,
    /// Start the cycle once the running one finishes.
    Queue,
}

impl std::str::FromStr for OverlapPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "allow" => Ok(Self::Allow),
            "queue" => Ok(Self::Queue),
            other => Err(format!("unknown overlap policy '{other}'")),
        }
    }
}

impl std::fmt::Display for OverlapPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Skip => "skip",
            Self::Allow => "allow",
            Self::Queue => "queue",
        };
        f.write_str(s)
    }
}

/// Polling period bounds. One value in `[minPeriodS, maxPeriodS]` is drawn
/// per process.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScheduleConfig {
    pub min_period_s: u64,
    pub max_period_s: u64,
    pub overlap: OverlapPolicy,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            min_period_s: 44,
            max_period_s: 163,
            overlap: OverlapPolicy::default(),
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
