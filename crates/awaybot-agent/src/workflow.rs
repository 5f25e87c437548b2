//! Per-conversation reply workflow.
//!
//! For one conversation id:
//! 1. Fetch the first message's metadata (the id of a conversation is also
//!    the id of its first message)
//! 2. Build the reply envelope: `to` = original `From`, `from` = original `To`
//! 3. Send the reply into the same conversation
//! 4. Add the handled label and remove `UNREAD` on the whole conversation
//!
//! Steps 3 and 4 run in the configured [`ReplyOrder`]. Neither order is
//! atomic; a failure between them is reported as a partial completion.

use std::sync::Arc;

use tracing::{debug, info, warn};

use awaybot_core::config::ReplyOrder;
use awaybot_core::types::{MessageMetadata, ModifyLabelsRequest, SendMessageRequest};
use awaybot_gmail::{MailError, MailService};

use crate::composer::{reply_subject, Envelope, MessageComposer};

/// What happened to one conversation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplyOutcome {
    Replied {
        thread_id: String,
        to: String,
        sent_id: String,
    },
    /// Already carries the handled label; nothing was sent.
    AlreadyHandled { thread_id: String },
}

impl ReplyOutcome {
    pub fn thread_id(&self) -> &str {
        match self {
            ReplyOutcome::Replied { thread_id, .. } | ReplyOutcome::AlreadyHandled { thread_id } => {
                thread_id
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("lookup of {thread_id} failed: {source}")]
    Lookup {
        thread_id: String,
        #[source]
        source: MailError,
    },
    #[error("first message of {thread_id} has no {header} header")]
    MissingHeader {
        thread_id: String,
        header: &'static str,
    },
    #[error("sending reply to {thread_id} failed: {source}")]
    Send {
        thread_id: String,
        #[source]
        source: MailError,
    },
    #[error("relabelling {thread_id} failed: {source}")]
    Label {
        thread_id: String,
        #[source]
        source: MailError,
    },
    /// Reply went out but the conversation still looks unhandled.
    #[error("reply {sent_id} sent to {thread_id} but relabelling failed (may be replied again): {source}")]
    DuplicateRisk {
        thread_id: String,
        sent_id: String,
        #[source]
        source: MailError,
    },
    /// Conversation marked handled but no reply went out.
    #[error("{thread_id} marked handled but reply failed (will not be retried): {source}")]
    MissedReply {
        thread_id: String,
        #[source]
        source: MailError,
    },
}

impl WorkflowError {
    pub fn thread_id(&self) -> &str {
        match self {
            WorkflowError::Lookup { thread_id, .. }
            | WorkflowError::MissingHeader { thread_id, .. }
            | WorkflowError::Send { thread_id, .. }
            | WorkflowError::Label { thread_id, .. }
            | WorkflowError::DuplicateRisk { thread_id, .. }
            | WorkflowError::MissedReply { thread_id, .. } => thread_id,
        }
    }

    /// One side effect happened and the other did not.
    pub fn is_partial(&self) -> bool {
        matches!(
            self,
            WorkflowError::DuplicateRisk { .. } | WorkflowError::MissedReply { .. }
        )
    }
}

pub struct ReplyWorkflow {
    service: Arc<dyn MailService>,
    composer: MessageComposer,
    handled_label_id: String,
    unread_label_id: String,
    order: ReplyOrder,
}

impl ReplyWorkflow {
    pub fn new(
        service: Arc<dyn MailService>,
        composer: MessageComposer,
        handled_label_id: impl Into<String>,
        unread_label_id: impl Into<String>,
    ) -> Self {
        Self {
            service,
            composer,
            handled_label_id: handled_label_id.into(),
            unread_label_id: unread_label_id.into(),
            order: ReplyOrder::default(),
        }
    }

    pub fn with_order(mut self, order: ReplyOrder) -> Self {
        self.order = order;
        self
    }

    /// Reply to and relabel one conversation.
    pub async fn handle(&self, thread_id: &str) -> Result<ReplyOutcome, WorkflowError> {
        let message = self
            .service
            .get_message_metadata(thread_id)
            .await
            .map_err(|source| WorkflowError::Lookup {
                thread_id: thread_id.to_string(),
                source,
            })?;

        if message.has_label(&self.handled_label_id) {
            debug!(thread_id, "already handled, skipping");
            return Ok(ReplyOutcome::AlreadyHandled {
                thread_id: thread_id.to_string(),
            });
        }

        let envelope = reply_envelope(&message).map_err(|header| WorkflowError::MissingHeader {
            thread_id: thread_id.to_string(),
            header,
        })?;
        let payload = self.composer.reply(&envelope);
        let request = SendMessageRequest {
            raw: payload.raw,
            thread_id: Some(thread_id.to_string()),
        };
        let relabel = ModifyLabelsRequest::new(&self.handled_label_id, &self.unread_label_id);

        let sent_id = match self.order {
            ReplyOrder::SendThenLabel => {
                let sent = self.send(thread_id, &request).await.map_err(|source| {
                    WorkflowError::Send {
                        thread_id: thread_id.to_string(),
                        source,
                    }
                })?;
                if let Err(source) = self.service.modify_thread_labels(thread_id, &relabel).await {
                    warn!(thread_id, sent_id = %sent, error = %source, "reply sent but relabel failed");
                    return Err(WorkflowError::DuplicateRisk {
                        thread_id: thread_id.to_string(),
                        sent_id: sent,
                        source,
                    });
                }
                sent
            }
            ReplyOrder::LabelThenSend => {
                self.service
                    .modify_thread_labels(thread_id, &relabel)
                    .await
                    .map_err(|source| WorkflowError::Label {
                        thread_id: thread_id.to_string(),
                        source,
                    })?;
                match self.send(thread_id, &request).await {
                    Ok(sent) => sent,
                    Err(source) => {
                        warn!(thread_id, error = %source, "relabelled but reply failed");
                        return Err(WorkflowError::MissedReply {
                            thread_id: thread_id.to_string(),
                            source,
                        });
                    }
                }
            }
        };

        info!(thread_id, to = %envelope.to, sent_id = %sent_id, "auto-reply sent");
        Ok(ReplyOutcome::Replied {
            thread_id: thread_id.to_string(),
            to: envelope.to,
            sent_id,
        })
    }

    async fn send(&self, thread_id: &str, request: &SendMessageRequest) -> Result<String, MailError> {
        let sent = self.service.send_message(request).await?;
        debug!(thread_id, sent_id = %sent.id, "reply accepted");
        Ok(sent.id)
    }
}

/// Reply envelope for a first message: addressing reversed, threading
/// headers taken from whatever the message carries.
fn reply_envelope(message: &MessageMetadata) -> Result<Envelope, &'static str> {
    let to = message.header("From").ok_or("From")?;
    let from = message.header("To").ok_or("To")?;

    let message_id = message.header("Message-ID").map(str::to_string);
    let references = match (message.header("References"), message_id.as_deref()) {
        (Some(refs), Some(id)) => Some(format!("{refs} {id}")),
        (None, Some(id)) => Some(id.to_string()),
        (Some(refs), None) => Some(refs.to_string()),
        (None, None) => None,
    };

    Ok(Envelope {
        to: to.to_string(),
        from: from.to_string(),
        subject: message.header("Subject").map(reply_subject),
        in_reply_to: message_id,
        references,
    })
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composer::ReplyPayload;
    use crate::testing::{FakeMailService, HANDLED, UNREAD};
    use awaybot_core::types::MessageHeader;

    const BODY: &str = "Sorry, I'm busy now. So I can't reply to you.";

    fn workflow(fake: &Arc<FakeMailService>, order: ReplyOrder) -> ReplyWorkflow {
        ReplyWorkflow::new(fake.clone(), MessageComposer::new(BODY, true), HANDLED, UNREAD)
            .with_order(order)
    }

    fn decoded(raw: &str) -> String {
        ReplyPayload { raw: raw.to_string() }.decode().unwrap()
    }

    #[tokio::test]
    async fn test_handle_sends_and_relabels() {
        let fake = Arc::new(FakeMailService::new());
        fake.add_unread("t1", "alice@example.com", "bob@example.com");

        let outcome = workflow(&fake, ReplyOrder::SendThenLabel).handle("t1").await.unwrap();
        assert!(matches!(outcome, ReplyOutcome::Replied { ref to, .. } if to == "alice@example.com"));

        let sent = fake.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].thread_id.as_deref(), Some("t1"));
        let text = decoded(&sent[0].raw);
        assert!(text.contains("to: alice@example.com\r\n"));
        assert!(text.contains("from: bob@example.com\r\n"));
        assert!(text.contains("Subject: Re: Hello\r\n"));
        assert!(text.contains("In-Reply-To: <t1@mail.example.com>\r\n"));
        assert!(text.ends_with(BODY));

        let modified = fake.modified();
        assert_eq!(modified.len(), 1);
        assert_eq!(modified[0].0, "t1");
        assert_eq!(modified[0].1, ModifyLabelsRequest::new(HANDLED, UNREAD));

        let labels = fake.labels_of("t1");
        assert!(labels.contains(HANDLED));
        assert!(!labels.contains(UNREAD));
    }

    #[tokio::test]
    async fn test_handle_missing_from_header() {
        let fake = Arc::new(FakeMailService::new());
        fake.add_thread("t1", &[UNREAD], vec![MessageHeader::new("To", "bob@example.com")]);

        let err = workflow(&fake, ReplyOrder::SendThenLabel).handle("t1").await.unwrap_err();
        assert!(matches!(err, WorkflowError::MissingHeader { header: "From", .. }));
        assert!(!err.is_partial());
        assert!(fake.sent().is_empty());
        assert!(fake.modified().is_empty());
    }

    #[tokio::test]
    async fn test_handle_missing_to_header() {
        let fake = Arc::new(FakeMailService::new());
        fake.add_thread("t1", &[UNREAD], vec![MessageHeader::new("from", "a@x.io")]);

        let err = workflow(&fake, ReplyOrder::SendThenLabel).handle("t1").await.unwrap_err();
        assert!(matches!(err, WorkflowError::MissingHeader { header: "To", .. }));
    }

    #[tokio::test]
    async fn test_handle_lookup_failure() {
        let fake = Arc::new(FakeMailService::new());
        let err = workflow(&fake, ReplyOrder::SendThenLabel).handle("gone").await.unwrap_err();
        assert!(matches!(err, WorkflowError::Lookup { .. }));
        assert_eq!(err.thread_id(), "gone");
    }

    #[tokio::test]
    async fn test_handle_skips_already_handled() {
        let fake = Arc::new(FakeMailService::new());
        fake.add_thread(
            "t1",
            &[UNREAD, HANDLED],
            vec![MessageHeader::new("From", "a@x.io"), MessageHeader::new("To", "b@x.io")],
        );

        let outcome = workflow(&fake, ReplyOrder::SendThenLabel).handle("t1").await.unwrap();
        assert_eq!(outcome, ReplyOutcome::AlreadyHandled { thread_id: "t1".into() });
        assert!(fake.sent().is_empty());
    }

    #[tokio::test]
    async fn test_send_failure_leaves_thread_untouched() {
        let fake = Arc::new(FakeMailService::new());
        fake.add_unread("t1", "a@x.io", "b@x.io");
        fake.fail_send_for("t1");

        let err = workflow(&fake, ReplyOrder::SendThenLabel).handle("t1").await.unwrap_err();
        assert!(matches!(err, WorkflowError::Send { .. }));
        assert!(!err.is_partial());
        assert!(fake.modified().is_empty());
        assert!(fake.labels_of("t1").contains(UNREAD));
    }

    #[tokio::test]
    async fn test_relabel_failure_after_send_is_partial() {
        let fake = Arc::new(FakeMailService::new());
        fake.add_unread("t1", "a@x.io", "b@x.io");
        fake.fail_modify_for("t1");

        let err = workflow(&fake, ReplyOrder::SendThenLabel).handle("t1").await.unwrap_err();
        assert!(matches!(err, WorkflowError::DuplicateRisk { ref sent_id, .. } if sent_id == "sent-1"));
        assert!(err.is_partial());
        assert_eq!(fake.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_label_then_send_order() {
        let fake = Arc::new(FakeMailService::new());
        fake.add_unread("t1", "a@x.io", "b@x.io");
        fake.fail_send_for("t1");

        let err = workflow(&fake, ReplyOrder::LabelThenSend).handle("t1").await.unwrap_err();
        assert!(matches!(err, WorkflowError::MissedReply { .. }));
        assert!(err.is_partial());
        assert!(fake.labels_of("t1").contains(HANDLED));
    }

    #[tokio::test]
    async fn test_label_then_send_label_failure_sends_nothing() {
        let fake = Arc::new(FakeMailService::new());
        fake.add_unread("t1", "a@x.io", "b@x.io");
        fake.fail_modify_for("t1");

        let err = workflow(&fake, ReplyOrder::LabelThenSend).handle("t1").await.unwrap_err();
        assert!(matches!(err, WorkflowError::Label { .. }));
        assert!(!err.is_partial());
        assert!(fake.sent().is_empty());
    }

    #[test]
    fn test_reply_envelope_references_chain() {
        let message = MessageMetadata {
            id: "m".into(),
            thread_id: "m".into(),
            label_ids: vec![],
            payload: awaybot_core::types::MessagePayload {
                headers: vec![
                    MessageHeader::new("From", "a@x.io"),
                    MessageHeader::new("To", "b@x.io"),
                    MessageHeader::new("Message-ID", "<2@x.io>"),
                    MessageHeader::new("References", "<1@x.io>"),
                ],
            },
        };
        let envelope = reply_envelope(&message).unwrap();
        assert_eq!(envelope.references.as_deref(), Some("<1@x.io> <2@x.io>"));
        assert_eq!(envelope.in_reply_to.as_deref(), Some("<2@x.io>"));
        assert!(envelope.subject.is_none());
    }
}
