//! One auto-reply cycle: scan, then handle every eligible conversation
//! concurrently and wait for all of them.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::{Id, JoinSet};
use tracing::{error, info, warn};

use awaybot_gmail::MailError;

use crate::scanner::ThreadScanner;
use crate::workflow::{ReplyOutcome, ReplyWorkflow};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CycleFailure {
    pub thread_id: String,
    pub error: String,
    /// Exactly one of send/relabel took effect.
    pub partial: bool,
}

/// Summary of one cycle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub eligible: usize,
    pub replied: Vec<String>,
    pub skipped: Vec<String>,
    pub failures: Vec<CycleFailure>,
}

impl CycleReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn partial_count(&self) -> usize {
        self.failures.iter().filter(|f| f.partial).count()
    }
}

impl std::fmt::Display for CycleReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} eligible, {} replied, {} skipped, {} failed",
            self.eligible,
            self.replied.len(),
            self.skipped.len(),
            self.failures.len()
        )
    }
}

pub struct AutoReplyCycle {
    scanner: ThreadScanner,
    workflow: Arc<ReplyWorkflow>,
}

impl AutoReplyCycle {
    pub fn new(scanner: ThreadScanner, workflow: Arc<ReplyWorkflow>) -> Self {
        Self { scanner, workflow }
    }

    /// Run one cycle.
    ///
    /// Fails only when the scan itself fails; per-conversation failures are
    /// isolated and collected into the report.
    pub async fn run_once(&self) -> Result<CycleReport, MailError> {
        let eligible = self.scanner.list_eligible().await?;
        let mut report = CycleReport {
            eligible: eligible.len(),
            ..Default::default()
        };
        if report.eligible == 0 {
            return Ok(report);
        }

        let mut tasks = JoinSet::new();
        let mut owners: HashMap<Id, String> = HashMap::with_capacity(report.eligible);
        for thread_id in eligible.ids() {
            let workflow = self.workflow.clone();
            let id = thread_id.clone();
            let handle = tasks.spawn(async move { workflow.handle(&id).await });
            owners.insert(handle.id(), thread_id);
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((_, Ok(ReplyOutcome::Replied { thread_id, .. }))) => report.replied.push(thread_id),
                Ok((_, Ok(ReplyOutcome::AlreadyHandled { thread_id }))) => report.skipped.push(thread_id),
                Ok((_, Err(e))) => {
                    if !e.is_partial() {
                        warn!(thread_id = %e.thread_id(), error = %e, "thread not handled");
                    }
                    report.failures.push(CycleFailure {
                        thread_id: e.thread_id().to_string(),
                        error: e.to_string(),
                        partial: e.is_partial(),
                    });
                }
                Err(e) => {
                    let thread_id = owners.remove(&e.id()).unwrap_or_default();
                    error!(thread_id = %thread_id, error = %e, "reply task aborted");
                    report.failures.push(CycleFailure {
                        thread_id,
                        error: e.to_string(),
                        partial: false,
                    });
                }
            }
        }

        info!(
            eligible = report.eligible,
            replied = report.replied.len(),
            failed = report.failures.len(),
            "cycle complete"
        );
        Ok(report)
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
