use std::time::Duration;

pub(crate) const DEFAULT_TIMEOUT_MS: u64 = 500;

pub(crate) const RELEASE: i32 = 0;
pub(crate) const PRESS: i32 = 1;
pub(crate) const EV_KEY: i32 = 1;

/// Upper bound for a worker sleep when nothing is scheduled.
pub(crate) const IDLE_WAIT: Duration = Duration::from_secs(60);
