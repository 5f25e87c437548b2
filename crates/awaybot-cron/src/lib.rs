//! Awaybot scheduler — fires the auto-reply cycle at a fixed, randomly
//! chosen period.

pub mod service;
pub mod types;

pub use service::{OnTickFn, Scheduler};
pub use types::{JitterRange, ScheduleState, TickStatus};
