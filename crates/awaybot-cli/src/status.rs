//! `awaybot status` — show configuration and credential files.
//!
//! Offline: reads local files only, never contacts the mailbox.

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use awaybot_core::config::{get_config_path, load_config};
use awaybot_core::utils::truncate_string;

use crate::helpers::{expand_tilde, presence, print_row};

/// Run the status command.
pub fn run(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path);
    let config_file = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(get_config_path);

    println!();
    println!("{}", "📭 Awaybot Status".cyan().bold());
    println!();

    print_row(
        "Config:",
        format!("{} {}", config_file.display(), presence(&config_file)),
    );

    let credentials = expand_tilde(&config.auth.credentials_path);
    print_row(
        "Identity file:",
        format!("{} {}", credentials.display(), presence(&credentials)),
    );

    let token = expand_tilde(&config.auth.token_path);
    let token_note = if token.exists() {
        presence(&token)
    } else {
        format!("{} {}", presence(&token), "run `awaybot authorize`".dimmed())
    };
    print_row("Token file:", format!("{} {}", token.display(), token_note));

    println!();
    print_row("Mailbox:", &config.gmail.user_id);
    print_row("Query:", config.gmail.effective_query());
    print_row("Handled label:", &config.gmail.handled_label);
    print_row(
        "Page size:",
        format!("{} {}", config.gmail.max_results, "(first page per cycle)".dimmed()),
    );

    println!();
    print_row(
        "Period:",
        format!(
            "{}s..={}s {}",
            config.schedule.min_period_s,
            config.schedule.max_period_s,
            "(drawn once at start)".dimmed()
        ),
    );
    print_row("Overlap:", config.schedule.overlap);
    print_row("Reply order:", format!("{:?}", config.reply.order));
    print_row(
        "Reply body:",
        truncate_string(&config.reply.body.replace('\n', " "), 60).dimmed(),
    );
    print_row("Scopes:", config.auth.scopes.len());
    for scope in &config.auth.scopes {
        println!("  {:<18} {}", "", scope.dimmed());
    }
    println!();

    Ok(())
}
