//! One-shot commands: `once`, `authorize`, `labels`.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;

use awaybot_core::config::load_config;
use awaybot_gmail::credentials::AuthSource;
use awaybot_gmail::labels::find_label;
use awaybot_gmail::MailService;

use crate::helpers;
use crate::session;

/// `awaybot once` — one scan-and-reply cycle.
pub async fn once(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path);
    let connection = session::connect(&config).await?;
    let cycle = session::build_cycle(&config, connection.client.clone()).await?;

    let report = cycle.run_once().await.context("scan failed")?;

    println!();
    helpers::print_row("Eligible:", report.eligible);
    helpers::print_row("Replied:", report.replied.len().to_string().green());
    if !report.skipped.is_empty() {
        helpers::print_row("Already handled:", report.skipped.len());
    }
    if !report.failures.is_empty() {
        helpers::print_row("Failed:", report.failures.len().to_string().red());
        for failure in &report.failures {
            let tag = if failure.partial {
                "partial".yellow()
            } else {
                "failed".red()
            };
            println!("    {} {} {}", tag, failure.thread_id.bold(), failure.error.dimmed());
        }
    }
    println!();
    Ok(())
}

/// `awaybot authorize` — make sure usable credentials are on disk.
pub async fn authorize(config_path: Option<&Path>, force: bool) -> Result<()> {
    let config = load_config(config_path);

    if force {
        let store = session::credential_store(&config);
        match tokio::fs::remove_file(store.token_path()).await {
            Ok(()) => println!("  {} {}", "Removed".dimmed(), store.token_path().display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("failed to remove {}", store.token_path().display())
                })
            }
        }
    }

    let connection = session::connect(&config).await?;
    // A cheap authenticated call proves the grant works.
    let labels = connection
        .client
        .list_labels()
        .await
        .context("credentials were obtained but the mailbox rejected them")?;

    let token_path = helpers::expand_tilde(&config.auth.token_path);
    println!();
    match (connection.source, connection.persisted) {
        (AuthSource::Stored, _) => println!(
            "  {} already authorized ({})",
            "✓".green(),
            token_path.display()
        ),
        (AuthSource::Interactive, true) => println!(
            "  {} authorized, credentials saved to {}",
            "✓".green(),
            token_path.display()
        ),
        (AuthSource::Interactive, false) => println!(
            "  {} authorized for this run only: no refresh token was returned",
            "!".yellow()
        ),
    }
    println!("  {} mailbox reachable, {} labels", "✓".green(), labels.len());
    println!();
    Ok(())
}

/// `awaybot labels` — list labels, marking the handled one.
pub async fn labels(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path);
    let connection = session::connect(&config).await?;
    let mut labels = connection
        .client
        .list_labels()
        .await
        .context("failed to list labels")?;
    labels.sort_by(|a, b| (a.is_system(), &a.name).cmp(&(b.is_system(), &b.name)));

    let handled_id = find_label(&labels, &config.gmail.handled_label).map(|l| l.id.clone());

    println!();
    if labels.is_empty() {
        println!("  {}", "No labels found.".dimmed());
    }
    for label in &labels {
        let kind = if label.is_system() { "system" } else { "user" };
        let marker = if handled_id.as_deref() == Some(label.id.as_str()) {
            " ← handled".cyan().to_string()
        } else {
            String::new()
        };
        println!(
            "  {:<28} {:<22} {}{}",
            label.name.bold(),
            label.id.dimmed(),
            kind.dimmed(),
            marker
        );
    }
    if handled_id.is_none() {
        println!();
        println!(
            "  {} '{}' does not exist yet; it is created on first run",
            "·".dimmed(),
            config.gmail.handled_label
        );
    }
    println!();
    Ok(())
}
