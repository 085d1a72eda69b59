use chrono::{Local, NaiveDateTime};

/// Source of "now" for the future-row filter.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

/// Wall-clock time in the host's local timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock pinned to one instant, for tests and replays of saved pages.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}
