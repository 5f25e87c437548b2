//! In-memory mailbox used by the engine tests.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use awaybot_core::types::{
    Label, MessageHeader, MessageMetadata, MessagePayload, ModifyLabelsRequest,
    SendMessageRequest, SentMessage, ThreadRef,
};
use awaybot_gmail::{MailError, MailService};

pub const HANDLED: &str = "Label_42";
pub const UNREAD: &str = "UNREAD";

#[derive(Clone, Debug)]
pub struct FakeThread {
    pub labels: HashSet<String>,
    pub headers: Vec<MessageHeader>,
}

#[derive(Default)]
struct State {
    threads: BTreeMap<String, FakeThread>,
    labels: Vec<Label>,
    sent: Vec<SendMessageRequest>,
    modified: Vec<(String, ModifyLabelsRequest)>,
    queries: Vec<String>,
    fail_list: bool,
    fail_send: HashSet<String>,
    fail_modify: HashSet<String>,
    panic_on: HashSet<String>,
}

/// Treats a conversation as matching the scan when it carries `UNREAD`
/// and not [`HANDLED`].
#[derive(Default)]
pub struct FakeMailService {
    state: Mutex<State>,
    latency: Option<Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl FakeMailService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Add an unread conversation whose first message is From `from`, To `to`.
    pub fn add_unread(&self, id: &str, from: &str, to: &str) {
        self.add_thread(
            id,
            &[UNREAD, "INBOX"],
            vec![
                MessageHeader::new("From", from),
                MessageHeader::new("To", to),
                MessageHeader::new("Subject", "Hello"),
                MessageHeader::new("Message-ID", format!("<{id}@mail.example.com>")),
            ],
        );
    }

    pub fn add_thread(&self, id: &str, labels: &[&str], headers: Vec<MessageHeader>) {
        let thread = FakeThread {
            labels: labels.iter().map(|l| l.to_string()).collect(),
            headers,
        };
        self.state.lock().unwrap().threads.insert(id.to_string(), thread);
    }

    /// Make metadata lookups for `thread_id` panic.
    pub fn panic_for(&self, thread_id: &str) {
        self.state.lock().unwrap().panic_on.insert(thread_id.to_string());
    }

    pub fn fail_list(&self) {
        self.state.lock().unwrap().fail_list = true;
    }

    pub fn fail_send_for(&self, thread_id: &str) {
        self.state.lock().unwrap().fail_send.insert(thread_id.to_string());
    }

    pub fn fail_modify_for(&self, thread_id: &str) {
        self.state.lock().unwrap().fail_modify.insert(thread_id.to_string());
    }

    pub fn sent(&self) -> Vec<SendMessageRequest> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn modified(&self) -> Vec<(String, ModifyLabelsRequest)> {
        self.state.lock().unwrap().modified.clone()
    }

    pub fn queries(&self) -> Vec<String> {
        self.state.lock().unwrap().queries.clone()
    }

    pub fn labels_of(&self, thread_id: &str) -> HashSet<String> {
        self.state
            .lock()
            .unwrap()
            .threads
            .get(thread_id)
            .map(|t| t.labels.clone())
            .unwrap_or_default()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    async fn simulate_io(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        } else {
            tokio::task::yield_now().await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

fn not_found(what: &str) -> MailError {
    MailError::Api {
        status: 404,
        message: format!("{what} not found"),
    }
}

#[async_trait]
impl MailService for FakeMailService {
    async fn list_threads(&self, query: &str, max_results: u32) -> Result<Vec<ThreadRef>, MailError> {
        let mut state = self.state.lock().unwrap();
        state.queries.push(query.to_string());
        if state.fail_list {
            return Err(MailError::Api {
                status: 503,
                message: "backend unavailable".into(),
            });
        }
        Ok(state
            .threads
            .iter()
            .filter(|(_, t)| t.labels.contains(UNREAD) && !t.labels.contains(HANDLED))
            .take(max_results as usize)
            .map(|(id, _)| ThreadRef::new(id.clone()))
            .collect())
    }

    async fn get_message_metadata(&self, message_id: &str) -> Result<MessageMetadata, MailError> {
        self.simulate_io().await;
        // Checked before locking so the panic does not poison the state.
        let crash = self.state.lock().unwrap().panic_on.contains(message_id);
        if crash {
            panic!("metadata decoder crashed on {message_id}");
        }
        let state = self.state.lock().unwrap();
        let thread = state.threads.get(message_id).ok_or_else(|| not_found(message_id))?;
        Ok(MessageMetadata {
            id: message_id.to_string(),
            thread_id: message_id.to_string(),
            label_ids: thread.labels.iter().cloned().collect(),
            payload: MessagePayload {
                headers: thread.headers.clone(),
            },
        })
    }

    async fn send_message(&self, request: &SendMessageRequest) -> Result<SentMessage, MailError> {
        self.simulate_io().await;
        let mut state = self.state.lock().unwrap();
        let thread_id = request.thread_id.clone().unwrap_or_default();
        if state.fail_send.contains(&thread_id) {
            return Err(MailError::Api {
                status: 500,
                message: "send rejected".into(),
            });
        }
        state.sent.push(request.clone());
        Ok(SentMessage {
            id: format!("sent-{}", state.sent.len()),
            thread_id: Some(thread_id),
            label_ids: vec!["SENT".into()],
        })
    }

    async fn modify_thread_labels(
        &self,
        thread_id: &str,
        request: &ModifyLabelsRequest,
    ) -> Result<(), MailError> {
        self.simulate_io().await;
        let mut state = self.state.lock().unwrap();
        if state.fail_modify.contains(thread_id) {
            return Err(MailError::Api {
                status: 500,
                message: "modify rejected".into(),
            });
        }
        state.modified.push((thread_id.to_string(), request.clone()));
        let thread = state.threads.get_mut(thread_id).ok_or_else(|| not_found(thread_id))?;
        for id in &request.remove_label_ids {
            thread.labels.remove(id);
        }
        thread.labels.extend(request.add_label_ids.iter().cloned());
        Ok(())
    }

    async fn list_labels(&self) -> Result<Vec<Label>, MailError> {
        Ok(self.state.lock().unwrap().labels.clone())
    }

    async fn create_label(&self, name: &str) -> Result<Label, MailError> {
        let mut state = self.state.lock().unwrap();
        let label = Label {
            id: format!("Label_{}", state.labels.len() + 100),
            name: name.to_string(),
            label_type: Some("user".into()),
        };
        state.labels.push(label.clone());
        Ok(label)
    }

    fn display_name(&self) -> &str {
        "Fake"
    }
}
