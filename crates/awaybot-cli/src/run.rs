//! `awaybot run` — the long-running auto-reply service.
//!
//! Startup sequence:
//! 1. Load config
//! 2. Draw the polling period (once per process)
//! 3. Obtain credentials and build the mail client
//! 4. Resolve labels and build the reply engine
//! 5. Start the scheduler
//! 6. Handle Ctrl+C for graceful shutdown

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use tracing::info;

use awaybot_core::config::load_config;
use awaybot_cron::{JitterRange, OnTickFn, Scheduler};

use crate::helpers;
use crate::session;

pub async fn run(config_path: Option<&Path>, now: bool) -> Result<()> {
    helpers::print_banner();
    println!("  Mode: auto-reply");
    println!();

    // 1. Load config
    let config = load_config(config_path);

    // 2. Draw the period
    let range = JitterRange::new(config.schedule.min_period_s, config.schedule.max_period_s)
        .context("invalid schedule configuration")?;
    let period = range.pick(&mut rand::thread_rng());

    // 3. Credentials + client (fatal on failure)
    let connection = session::connect(&config).await?;

    // 4. Reply engine
    let cycle = Arc::new(session::build_cycle(&config, connection.client.clone()).await?);

    // 5. Scheduler
    let on_tick: OnTickFn = {
        let cycle = cycle.clone();
        Arc::new(move |_cycle_no| {
            let cycle = cycle.clone();
            Box::pin(async move {
                let report = cycle.run_once().await.context("scan failed")?;
                Ok(report.to_string())
            })
        })
    };
    let scheduler = Arc::new(Scheduler::new(period, config.schedule.overlap, on_tick));

    helpers::print_row("Query:", config.gmail.effective_query());
    helpers::print_row("Handled label:", &config.gmail.handled_label);
    helpers::print_row(
        "Period:",
        format!("{}s {}", period.as_secs(), format!("(drawn from {range})").dimmed()),
    );
    helpers::print_row("Overlap:", config.schedule.overlap);
    println!();
    println!("  {}", "Press Ctrl+C to stop.".dimmed());
    println!();

    let timer = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.start().await })
    };

    if now {
        scheduler.trigger_now();
    }

    // 6. Wait for shutdown
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;
    println!();
    info!("shutdown signal received");

    scheduler.stop();
    timer.await.context("scheduler task failed")??;

    let state = scheduler.state().await;
    info!(
        cycles = state.completed,
        skipped = state.skipped,
        "awaybot stopped"
    );
    Ok(())
}
