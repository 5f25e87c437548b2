//! Gmail access layer for Awaybot.
//!
//! # Architecture
//!
//! - [`traits::MailService`] — the remote mailbox operations the engine consumes
//! - [`client::GmailClient`] — `reqwest` implementation against Gmail REST v1
//! - [`credentials::CredentialStore`] — persisted authorized-user bundle
//! - [`token::TokenManager`] — refresh-token → access-token exchange and caching
//! - [`authorizer`] — interactive authorization (loopback redirect)
//! - [`labels`] — label lookup by name

pub mod authorizer;
pub mod client;
pub mod credentials;
pub mod error;
pub mod labels;
pub mod token;
pub mod traits;

// Re-export main types for convenience
pub use authorizer::{Authorizer, LoopbackAuthorizer};
pub use client::GmailClient;
pub use credentials::{Authorization, ClientIdentity, CredentialBundle, CredentialStore};
pub use error::{CredentialError, MailError};
pub use token::{AccessToken, TokenManager, TokenResponse};
pub use traits::MailService;
