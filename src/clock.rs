// Wall-clock source. Minute keys, stamps and rotation deadlines all read time through this.

use chrono::{DateTime, Local};
use std::fmt;

/// Local wall-clock time source, injected so tests can drive minute rollover and rotation.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Local>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}
