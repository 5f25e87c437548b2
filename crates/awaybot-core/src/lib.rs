//! Awaybot core — shared types, configuration, and path helpers.
//!
//! - [`types`]: Gmail REST v1 request and response resources
//! - [`config`]: `~/.awaybot/config.json` schema, loader, env overrides
//! - [`utils`]: data directory, string truncation, secret masking

pub mod config;
pub mod types;
pub mod utils;
