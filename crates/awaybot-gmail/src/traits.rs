//! Mail service trait — the remote mailbox operations the engine consumes.
//!
//! `GmailClient` in `client.rs` is the production implementation. The
//! engine only ever holds an `Arc<dyn MailService>`, so tests substitute
//! in-memory fakes.

use async_trait::async_trait;
use awaybot_core::types::{
    Label, MessageMetadata, ModifyLabelsRequest, SendMessageRequest, SentMessage, ThreadRef,
};

use crate::error::MailError;

#[async_trait]
pub trait MailService: Send + Sync {
    /// List conversations matching a search filter.
    ///
    /// Returns a single page of at most `max_results` threads; an empty
    /// vector when nothing matches.
    async fn list_threads(&self, query: &str, max_results: u32)
        -> Result<Vec<ThreadRef>, MailError>;

    /// Fetch header metadata for one message.
    async fn get_message_metadata(&self, message_id: &str) -> Result<MessageMetadata, MailError>;

    /// Send a raw message, optionally bound to an existing thread.
    async fn send_message(&self, request: &SendMessageRequest) -> Result<SentMessage, MailError>;

    /// Add and remove labels on every message of a thread.
    async fn modify_thread_labels(
        &self,
        thread_id: &str,
        change: &ModifyLabelsRequest,
    ) -> Result<(), MailError>;

    /// List all labels in the mailbox.
    async fn list_labels(&self) -> Result<Vec<Label>, MailError>;

    /// Create a user label.
    async fn create_label(&self, name: &str) -> Result<Label, MailError>;

    /// Display name for logging.
    fn display_name(&self) -> &str;
}
