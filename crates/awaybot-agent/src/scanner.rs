//! Conversation scanner.
//!
//! Lists one page of conversations matching the configured query. The
//! query itself (unread, in inbox, not yet handled) is the dedup
//! mechanism: a conversation relabelled by a previous cycle no longer
//! matches and so is not listed again.

use std::sync::Arc;

use tracing::debug;

use awaybot_core::types::ThreadRef;
use awaybot_gmail::{MailError, MailService};

/// Result of one scan. Consumed once, in listing order.
#[derive(Debug)]
pub struct EligibleThreads {
    inner: std::vec::IntoIter<ThreadRef>,
}

impl EligibleThreads {
    fn new(threads: Vec<ThreadRef>) -> Self {
        Self {
            inner: threads.into_iter(),
        }
    }

    /// Remaining conversation ids.
    pub fn ids(self) -> impl Iterator<Item = String> {
        self.inner.map(|t| t.id)
    }
}

impl Iterator for EligibleThreads {
    type Item = ThreadRef;

    fn next(&mut self) -> Option<ThreadRef> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for EligibleThreads {}

pub struct ThreadScanner {
    service: Arc<dyn MailService>,
    query: String,
    max_results: u32,
}

impl ThreadScanner {
    pub fn new(service: Arc<dyn MailService>, query: impl Into<String>, max_results: u32) -> Self {
        Self {
            service,
            query: query.into(),
            max_results,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// List the current page of eligible conversations.
    ///
    /// An empty mailbox is an empty result, not an error. Later pages are
    /// picked up by later cycles once this page has been handled.
    pub async fn list_eligible(&self) -> Result<EligibleThreads, MailError> {
        let threads = self.service.list_threads(&self.query, self.max_results).await?;
        if threads.is_empty() {
            debug!(query = %self.query, "No threads found.");
        } else {
            debug!(count = threads.len(), "eligible threads listed");
        }
        Ok(EligibleThreads::new(threads))
    }
}
