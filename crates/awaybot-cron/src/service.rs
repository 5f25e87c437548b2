//! Scheduler service — fires a callback at a fixed period.
//!
//! Architecture:
//! - The period is chosen once (see [`JitterRange::pick`](crate::JitterRange::pick))
//!   and never redrawn
//! - The first tick fires one period after `start()`, then every period
//!   measured start-to-start; cycle duration never shifts later ticks
//! - Each admitted tick runs the callback on its own task
//! - A tick arriving while a cycle is in flight is handled by the
//!   [`OverlapPolicy`]
//! - Callback errors are logged and recorded, and the loop keeps going
//! - [`trigger_now`](Scheduler::trigger_now) runs a cycle inside the loop,
//!   so shutdown waits for it like any timer cycle

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use awaybot_core::config::OverlapPolicy;

use crate::types::{ScheduleState, TickStatus};

// ─────────────────────────────────────────────
// Callback type
// ─────────────────────────────────────────────

/// Callback invoked for each cycle.
///
/// Receives the 1-based cycle number and returns a one-line summary.
pub type OnTickFn = Arc<
    dyn Fn(u64) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send>> + Send + Sync,
>;

// ─────────────────────────────────────────────
// Scheduler
// ─────────────────────────────────────────────

pub struct Scheduler {
    period: Duration,
    overlap: OverlapPolicy,
    on_tick: OnTickFn,
    state: Arc<Mutex<ScheduleState>>,
    /// Held by a running cycle unless overlap is allowed.
    gate: Arc<Mutex<()>>,
    shutdown: Arc<Notify>,
    immediate: Arc<Notify>,
}

impl Scheduler {
    pub fn new(period: Duration, overlap: OverlapPolicy, on_tick: OnTickFn) -> Self {
        let state = ScheduleState {
            period_s: period.as_secs(),
            ..Default::default()
        };
        Self {
            period,
            overlap,
            on_tick,
            state: Arc::new(Mutex::new(state)),
            gate: Arc::new(Mutex::new(())),
            shutdown: Arc::new(Notify::new()),
            immediate: Arc::new(Notify::new()),
        }
    }

    /// Snapshot of the counters.
    pub async fn state(&self) -> ScheduleState {
        self.state.lock().await.clone()
    }

    /// Run the timer loop until [`stop`](Self::stop) is called.
    ///
    /// On shutdown, waits for cycles already running to finish.
    pub async fn start(&self) -> anyhow::Result<()> {
        info!(
            period_s = self.period.as_secs(),
            overlap = %self.overlap,
            "scheduler started"
        );

        let mut interval = tokio::time::interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut runs = JoinSet::new();

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.on_timer(&mut runs).await;
                }
                _ = self.immediate.notified() => {
                    self.spawn_immediate(&mut runs).await;
                }
                Some(joined) = runs.join_next(), if !runs.is_empty() => {
                    if let Err(e) = joined {
                        self.record_abort(&e.to_string()).await;
                    }
                }
                _ = self.shutdown.notified() => {
                    if !runs.is_empty() {
                        info!(in_flight = runs.len(), "waiting for running cycles");
                    }
                    while let Some(joined) = runs.join_next().await {
                        if let Err(e) = joined {
                            self.record_abort(&e.to_string()).await;
                        }
                    }
                    info!("scheduler shutting down");
                    return Ok(());
                }
            }
        }
    }

    /// Stop the timer loop. Safe to call before `start()`.
    pub fn stop(&self) {
        info!("stopping scheduler");
        self.shutdown.notify_one();
    }

    /// Run one cycle immediately, outside the timer schedule.
    ///
    /// The cycle is picked up by the running loop (or by the next `start()`),
    /// counts as in flight for the overlap policy, and waits its turn unless
    /// overlap is allowed. Shutdown waits for it to finish.
    pub fn trigger_now(&self) {
        self.immediate.notify_one();
    }

    // ─────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────

    async fn on_timer(&self, runs: &mut JoinSet<()>) {
        {
            let mut state = self.state.lock().await;
            state.ticks += 1;
            let admit = match self.overlap {
                OverlapPolicy::Skip => state.in_flight == 0,
                OverlapPolicy::Allow => true,
                // One running plus at most one waiting.
                OverlapPolicy::Queue => state.in_flight < 2,
            };
            if !admit {
                state.skipped += 1;
                info!(
                    tick = state.ticks,
                    in_flight = state.in_flight,
                    "previous cycle still running, tick skipped"
                );
                return;
            }
            state.in_flight += 1;
            debug!(tick = state.ticks, in_flight = state.in_flight, "tick admitted");
        }

        let runner = self.runner();
        runs.spawn(async move {
            // Outcome is already logged and recorded.
            let _ = runner.execute().await;
        });
    }

    async fn spawn_immediate(&self, runs: &mut JoinSet<()>) {
        {
            let mut state = self.state.lock().await;
            state.in_flight += 1;
            debug!(in_flight = state.in_flight, "immediate cycle requested");
        }
        let runner = self.runner();
        runs.spawn(async move {
            let _ = runner.execute().await;
        });
    }

    async fn record_abort(&self, reason: &str) {
        error!(error = %reason, "cycle task aborted");
        let mut state = self.state.lock().await;
        state.in_flight = state.in_flight.saturating_sub(1);
        state.completed += 1;
        state.last_status = Some(TickStatus::Error);
        state.last_error = Some(reason.to_string());
    }

    fn runner(&self) -> Runner {
        Runner {
            on_tick: self.on_tick.clone(),
            state: self.state.clone(),
            gate: self.gate.clone(),
            exclusive: self.overlap != OverlapPolicy::Allow,
        }
    }
}

/// Everything a spawned cycle needs.
struct Runner {
    on_tick: OnTickFn,
    state: Arc<Mutex<ScheduleState>>,
    gate: Arc<Mutex<()>>,
    exclusive: bool,
}

impl Runner {
    async fn execute(self) -> anyhow::Result<String> {
        let _turn = if self.exclusive {
            Some(self.gate.lock().await)
        } else {
            None
        };

        let cycle = {
            let mut state = self.state.lock().await;
            state.started += 1;
            state.last_started_at_ms = Some(Utc::now().timestamp_millis());
            state.started
        };
        debug!(cycle, "cycle started");

        let result = (self.on_tick)(cycle).await;

        let mut state = self.state.lock().await;
        state.in_flight = state.in_flight.saturating_sub(1);
        state.completed += 1;
        match &result {
            Ok(summary) => {
                state.last_status = Some(TickStatus::Ok);
                state.last_error = None;
                info!(cycle, summary = %summary, "cycle finished");
            }
            Err(e) => {
                state.last_status = Some(TickStatus::Error);
                state.last_error = Some(e.to_string());
                error!(cycle, error = %e, "cycle failed");
            }
        }
        result
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const PERIOD: Duration = Duration::from_secs(10);

    type Starts = Arc<std::sync::Mutex<Vec<Instant>>>;

    /// Records each start instant and stays busy for `busy`.
    fn recording(starts: Starts, busy: Duration) -> OnTickFn {
        Arc::new(move |cycle| {
            let starts = starts.clone();
            Box::pin(async move {
                starts.lock().unwrap().push(Instant::now());
                if !busy.is_zero() {
                    tokio::time::sleep(busy).await;
                }
                Ok(format!("cycle {cycle}"))
            })
        })
    }

    fn spawn_scheduler(scheduler: &Arc<Scheduler>) -> tokio::task::JoinHandle<anyhow::Result<()>> {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.start().await })
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_evenly_spaced() {
        let starts: Starts = Default::default();
        let scheduler = Arc::new(Scheduler::new(
            PERIOD,
            OverlapPolicy::Skip,
            recording(starts.clone(), Duration::from_secs(3)),
        ));
        let t0 = Instant::now();
        let handle = spawn_scheduler(&scheduler);

        tokio::time::sleep(Duration::from_secs(45)).await;
        scheduler.stop();
        handle.await.unwrap().unwrap();

        let starts = starts.lock().unwrap().clone();
        assert_eq!(starts.len(), 4);
        assert_eq!(starts[0] - t0, PERIOD);
        for pair in starts.windows(2) {
            assert_eq!(pair[1] - pair[0], PERIOD);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_skip_policy_drops_overlapping_ticks() {
        let starts: Starts = Default::default();
        let scheduler = Arc::new(Scheduler::new(
            PERIOD,
            OverlapPolicy::Skip,
            recording(starts.clone(), Duration::from_secs(25)),
        ));
        let t0 = Instant::now();
        let handle = spawn_scheduler(&scheduler);

        tokio::time::sleep(Duration::from_secs(55)).await;
        let state = scheduler.state().await;
        assert_eq!(state.ticks, 5);
        assert_eq!(state.started, 2);
        assert_eq!(state.skipped, 3);
        assert_eq!(state.completed, 1);

        let starts = starts.lock().unwrap().clone();
        assert_eq!(starts[1] - t0, Duration::from_secs(40));

        scheduler.stop();
        handle.await.unwrap().unwrap();
        assert_eq!(scheduler.state().await.in_flight, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_allow_policy_overlaps() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let on_tick: OnTickFn = {
            let (active, peak) = (active.clone(), peak.clone());
            Arc::new(move |_| {
                let (active, peak) = (active.clone(), peak.clone());
                Box::pin(async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(25)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok(String::new())
                })
            })
        };
        let scheduler = Arc::new(Scheduler::new(PERIOD, OverlapPolicy::Allow, on_tick));
        let handle = spawn_scheduler(&scheduler);

        tokio::time::sleep(Duration::from_secs(52)).await;
        let state = scheduler.state().await;
        assert_eq!(state.started, 5);
        assert_eq!(state.skipped, 0);
        assert_eq!(peak.load(Ordering::SeqCst), 3);

        scheduler.stop();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_queue_policy_runs_back_to_back() {
        let starts: Starts = Default::default();
        let scheduler = Arc::new(Scheduler::new(
            PERIOD,
            OverlapPolicy::Queue,
            recording(starts.clone(), Duration::from_secs(25)),
        ));
        let t0 = Instant::now();
        let handle = spawn_scheduler(&scheduler);

        tokio::time::sleep(Duration::from_secs(55)).await;
        let state = scheduler.state().await;
        assert_eq!(state.ticks, 5);
        assert_eq!(state.skipped, 2);
        assert_eq!(state.started, 2);
        assert_eq!(state.in_flight, 2);

        let offsets: Vec<_> = starts.lock().unwrap().iter().map(|s| *s - t0).collect();
        assert_eq!(offsets, vec![Duration::from_secs(10), Duration::from_secs(35)]);

        scheduler.stop();
        handle.await.unwrap().unwrap();
        assert_eq!(scheduler.state().await.started, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_cycle_does_not_stop_schedule() {
        let on_tick: OnTickFn = Arc::new(|cycle| {
            Box::pin(async move {
                if cycle == 1 {
                    anyhow::bail!("list failed: 503");
                }
                Ok("1 eligible, 1 replied".to_string())
            })
        });
        let scheduler = Arc::new(Scheduler::new(PERIOD, OverlapPolicy::Skip, on_tick));
        let handle = spawn_scheduler(&scheduler);

        tokio::time::sleep(Duration::from_secs(15)).await;
        let state = scheduler.state().await;
        assert_eq!(state.last_status, Some(TickStatus::Error));
        assert!(state.last_error.unwrap().contains("503"));

        tokio::time::sleep(Duration::from_secs(10)).await;
        let state = scheduler.state().await;
        assert_eq!(state.started, 2);
        assert_eq!(state.last_status, Some(TickStatus::Ok));
        assert!(state.last_error.is_none());

        scheduler.stop();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_now_runs_before_first_tick() {
        let starts: Starts = Default::default();
        let scheduler = Arc::new(Scheduler::new(
            PERIOD,
            OverlapPolicy::Skip,
            recording(starts.clone(), Duration::ZERO),
        ));
        let t0 = Instant::now();
        scheduler.trigger_now();
        let handle = spawn_scheduler(&scheduler);

        tokio::time::sleep(Duration::from_secs(5)).await;
        let state = scheduler.state().await;
        assert_eq!(state.started, 1);
        assert_eq!(state.completed, 1);
        assert_eq!(state.in_flight, 0);
        assert_eq!(state.ticks, 0);
        assert_eq!(starts.lock().unwrap()[0], t0);

        scheduler.stop();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_waits_for_triggered_cycle() {
        let scheduler = Arc::new(Scheduler::new(
            PERIOD,
            OverlapPolicy::Skip,
            recording(Default::default(), Duration::from_secs(30)),
        ));
        let handle = spawn_scheduler(&scheduler);
        scheduler.trigger_now();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(scheduler.state().await.in_flight, 1);

        scheduler.stop();
        handle.await.unwrap().unwrap();

        let state = scheduler.state().await;
        assert_eq!(state.in_flight, 0);
        assert_eq!(state.started, 1);
        assert_eq!(state.completed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_triggered_cycle_holds_off_skip_ticks() {
        let scheduler = Arc::new(Scheduler::new(
            PERIOD,
            OverlapPolicy::Skip,
            recording(Default::default(), Duration::from_secs(15)),
        ));
        scheduler.trigger_now();
        let handle = spawn_scheduler(&scheduler);

        tokio::time::sleep(Duration::from_secs(12)).await;
        let state = scheduler.state().await;
        assert_eq!(state.ticks, 1);
        assert_eq!(state.skipped, 1);
        assert_eq!(state.started, 1);

        scheduler.stop();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_before_start() {
        let scheduler = Scheduler::new(PERIOD, OverlapPolicy::Skip, recording(Default::default(), Duration::ZERO));
        scheduler.stop();
        scheduler.start().await.unwrap();
        assert_eq!(scheduler.state().await.ticks, 0);
    }
}
