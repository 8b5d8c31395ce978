//! Wall-clock source for removal timestamps.
//!
//! Timers themselves run on tokio's clock, which tests pause and advance;
//! this trait only decides what `created_at`/`fire_at` say.

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
