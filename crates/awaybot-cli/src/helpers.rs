//! Shared CLI helpers — path expansion, banner, status marks.

use std::path::{Path, PathBuf};

use colored::Colorize;

/// Expand `~` at the start of a path to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs_next::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs_next::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

/// Print the startup banner.
pub fn print_banner() {
    let version = env!("CARGO_PKG_VERSION");
    println!();
    println!("{}  v{}", "📭 Awaybot".cyan().bold(), version.dimmed());
}

/// `✓` when the file exists, `(not found)` otherwise.
pub fn presence(path: &Path) -> String {
    if path.exists() {
        "✓".green().to_string()
    } else {
        "(not found)".red().to_string()
    }
}

/// One aligned `label value` row.
pub fn print_row(label: &str, value: impl std::fmt::Display) {
    println!("  {:<18} {}", label.bold(), value);
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
