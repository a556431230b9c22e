use std::fmt::Debug;

use chrono::Utc;

use crate::types::Timestamp;

/// Time source for created/completed stamps.
pub trait Clock: Debug + Send {
    /// Current instant.
    fn now(&self) -> Timestamp;
}

/// Wall clock, in UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// Always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}
