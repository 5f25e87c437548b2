//! Config loader — reads `~/.awaybot/config.json` and merges env vars.
//!
//! # Loading precedence
//! 1. Defaults (from `Config::default()`)
//! 2. JSON file at `~/.awaybot/config.json`
//! 3. Environment variables `AWAYBOT_<SECTION>__<FIELD>` (override JSON)

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::schema::{Config, OverlapPolicy, ReplyOrder};

/// Default config file path.
pub fn get_config_path() -> PathBuf {
    crate::utils::get_data_path().join("config.json")
}

/// Load configuration from the default path + env vars.
///
/// Falls back to `Config::default()` if the file doesn't exist or can't be parsed.
pub fn load_config(path: Option<&Path>) -> Config {
    let config_path = path
        .map(PathBuf::from)
        .unwrap_or_else(get_config_path);

    load_config_from_path(&config_path)
}

/// Load config from a specific file path.
fn load_config_from_path(path: &Path) -> Config {
    if !path.exists() {
        info!("No config file found at {}, using defaults", path.display());
        return apply_env_overrides(Config::default());
    }

    debug!("Loading config from {}", path.display());

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file {}: {}", path.display(), e);
            return apply_env_overrides(Config::default());
        }
    };

    let config: Config = match serde_json::from_str(&content) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to parse config JSON: {}", e);
            return apply_env_overrides(Config::default());
        }
    };

    apply_env_overrides(config)
}

/// Save configuration to disk (pretty-printed JSON with camelCase keys).
pub fn save_config(config: &Config, path: Option<&Path>) -> std::io::Result<()> {
    let config_path = path
        .map(PathBuf::from)
        .unwrap_or_else(get_config_path);

    // Ensure parent directory exists
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(config).map_err(std::io::Error::other)?;

    std::fs::write(&config_path, json)?;
    debug!("Config saved to {}", config_path.display());
    Ok(())
}

/// Apply environment variable overrides on top of a loaded config.
///
/// Env var format: `AWAYBOT_<SECTION>__<FIELD>` (double underscore as delimiter).
///
/// Supported overrides:
/// - `AWAYBOT_GMAIL__API_BASE` → `gmail.api_base`
/// - `AWAYBOT_GMAIL__USER_ID` → `gmail.user_id`
/// - `AWAYBOT_GMAIL__QUERY` → `gmail.query`
/// - `AWAYBOT_GMAIL__HANDLED_LABEL` → `gmail.handled_label`
/// - `AWAYBOT_AUTH__CREDENTIALS_PATH` → `auth.credentials_path`
/// - `AWAYBOT_AUTH__TOKEN_PATH` → `auth.token_path`
/// - `AWAYBOT_REPLY__BODY` → `reply.body`
/// - `AWAYBOT_REPLY__ORDER` → `reply.order`
/// - `AWAYBOT_SCHEDULE__MIN_PERIOD_S` / `MAX_PERIOD_S` → `schedule.*`
/// - `AWAYBOT_SCHEDULE__OVERLAP` → `schedule.overlap`
fn apply_env_overrides(config: Config) -> Config {
    apply_overrides(config, |key| std::env::var(key).ok())
}

/// Apply overrides read through `var`, which maps a variable name to its value.
fn apply_overrides(mut config: Config, var: impl Fn(&str) -> Option<String>) -> Config {
    // Gmail
    if let Some(val) = var("AWAYBOT_GMAIL__API_BASE") {
        config.gmail.api_base = val;
    }
    if let Some(val) = var("AWAYBOT_GMAIL__USER_ID") {
        config.gmail.user_id = val;
    }
    if let Some(val) = var("AWAYBOT_GMAIL__QUERY") {
        config.gmail.query = val;
    }
    if let Some(val) = var("AWAYBOT_GMAIL__HANDLED_LABEL") {
        config.gmail.handled_label = val;
    }

    // Auth
    if let Some(val) = var("AWAYBOT_AUTH__CREDENTIALS_PATH") {
        config.auth.credentials_path = val;
    }
    if let Some(val) = var("AWAYBOT_AUTH__TOKEN_PATH") {
        config.auth.token_path = val;
    }

    // Reply
    if let Some(val) = var("AWAYBOT_REPLY__BODY") {
        config.reply.body = val;
    }
    if let Some(val) = var("AWAYBOT_REPLY__ORDER") {
        match val.parse::<ReplyOrder>() {
            Ok(order) => config.reply.order = order,
            Err(e) => warn!("Ignoring AWAYBOT_REPLY__ORDER: {}", e),
        }
    }

    // Schedule
    if let Some(val) = var("AWAYBOT_SCHEDULE__MIN_PERIOD_S") {
        if let Ok(n) = val.parse::<u64>() {
            config.schedule.min_period_s = n;
        }
    }
    if let Some(val) = var("AWAYBOT_SCHEDULE__MAX_PERIOD_S") {
        if let Ok(n) = val.parse::<u64>() {
            config.schedule.max_period_s = n;
        }
    }
    if let Some(val) = var("AWAYBOT_SCHEDULE__OVERLAP") {
        match val.parse::<OverlapPolicy>() {
            Ok(policy) => config.schedule.overlap = policy,
            Err(e) => warn!("Ignoring AWAYBOT_SCHEDULE__OVERLAP: {}", e),
        }
    }

    config
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
