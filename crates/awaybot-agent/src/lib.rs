//! Awaybot agent — the scan-and-reply engine.
//!
//! This crate contains:
//! - **composer**: reply payload construction and transport encoding
//! - **scanner**: one-page listing of conversations that need a reply
//! - **workflow**: per-conversation lookup → compose → send → relabel
//! - **cycle**: one scan followed by a concurrent fan-out of workflows

pub mod composer;
pub mod cycle;
pub mod scanner;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;

pub use composer::{compose, compose_with, Envelope, MessageComposer, ReplyPayload};
pub use cycle::{AutoReplyCycle, CycleFailure, CycleReport};
pub use scanner::{EligibleThreads, ThreadScanner};
pub use workflow::{ReplyOutcome, ReplyWorkflow, WorkflowError};
