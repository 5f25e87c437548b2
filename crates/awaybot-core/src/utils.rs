//! Utility helpers — data directory, string truncation, secret masking.

use std::path::PathBuf;

/// Get the Awaybot data directory (e.g. `~/.awaybot/`).
pub fn get_data_path() -> PathBuf {
    let home = home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".awaybot")
}

/// Truncate a string to `max_len` characters, adding "..." if truncated.
/// Unicode-safe.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

/// Mask a secret for log output: first 4 chars, then `***`.
///
/// Secrets of 4 characters or fewer are fully masked.
pub fn mask_secret(secret: &str) -> String {
    if secret.chars().count() <= 4 {
        "***".to_string()
    } else {
        let head: String = secret.chars().take(4).collect();
        format!("{head}***")
    }
}

/// Helper to get home directory.
fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| std::env::var("USERPROFILE").ok().map(PathBuf::from))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_string() {
        assert_eq!(truncate_string("hello", 10), "hello");
    }

    #[test]
    fn test_truncate_long_string() {
        let result = truncate_string("hello world, this is a long string", 15);
        assert_eq!(result, "hello world,...");
    }

    #[test]
    fn test_truncate_unicode() {
        let result = truncate_string("こんにちは世界です", 5);
        assert_eq!(result, "こん...");
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("1//0gAbcdefgh"), "1//0***");
        assert_eq!(mask_secret("abcd"), "***");
        assert_eq!(mask_secret(""), "***");
    }

    #[test]
    fn test_data_path_ends_with_awaybot() {
        let path = get_data_path();
        assert!(path.ends_with(".awaybot"));
    }
}
