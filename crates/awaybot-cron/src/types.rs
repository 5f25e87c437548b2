//! Scheduler types — period range and observable run state.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────
// JitterRange
// ─────────────────────────────────────────────

/// Inclusive range of whole seconds a polling period is drawn from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JitterRange {
    pub min_s: u64,
    pub max_s: u64,
}

impl JitterRange {
    /// Validate bounds: both positive, `min_s <= max_s`.
    pub fn new(min_s: u64, max_s: u64) -> anyhow::Result<Self> {
        if min_s == 0 {
            anyhow::bail!("minimum period must be at least 1 second");
        }
        if min_s > max_s {
            anyhow::bail!("minimum period {min_s}s exceeds maximum {max_s}s");
        }
        Ok(Self { min_s, max_s })
    }

    /// Draw one period, uniformly over `[min_s, max_s]`.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        Duration::from_secs(rng.gen_range(self.min_s..=self.max_s))
    }
}

impl Default for JitterRange {
    fn default() -> Self {
        Self { min_s: 44, max_s: 163 }
    }
}

impl std::fmt::Display for JitterRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}s..={}s", self.min_s, self.max_s)
    }
}

// ─────────────────────────────────────────────
// State
// ─────────────────────────────────────────────

/// Result of the last finished cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TickStatus {
    Ok,
    Error,
}

/// Counters and last-run details, as seen by `status` logs and tests.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleState {
    /// Period chosen for this process.
    pub period_s: u64,
    /// Ticks delivered by the timer.
    pub ticks: u64,
    /// Cycles started.
    pub started: u64,
    /// Cycles finished (either status).
    pub completed: u64,
    /// Ticks dropped by the overlap policy.
    pub skipped: u64,
    /// Cycles currently running or waiting to run.
    pub in_flight: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_started_at_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_status: Option<TickStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_jitter_range_validation() {
        assert!(JitterRange::new(0, 10).is_err());
        assert!(JitterRange::new(20, 10).is_err());
        assert_eq!(JitterRange::new(44, 163).unwrap(), JitterRange::default());
    }

    #[test]
    fn test_pick_within_bounds() {
        let range = JitterRange::default();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let secs = range.pick(&mut rng).as_secs();
            assert!((44..=163).contains(&secs));
        }
    }

    #[test]
    fn test_pick_degenerate_range() {
        let range = JitterRange::new(60, 60).unwrap();
        assert_eq!(range.pick(&mut rand::thread_rng()), Duration::from_secs(60));
    }

    #[test]
    fn test_pick_reaches_both_ends() {
        let range = JitterRange::new(1, 3).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let seen: std::collections::HashSet<u64> =
            (0..200).map(|_| range.pick(&mut rng).as_secs()).collect();
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_state_serialize() {
        let state = ScheduleState {
            period_s: 90,
            last_status: Some(TickStatus::Error),
            ..Default::default()
        };
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"periodS\":90"));
        assert!(json.contains("\"lastStatus\":\"error\""));
        assert!(!json.contains("lastError"));
    }
}
