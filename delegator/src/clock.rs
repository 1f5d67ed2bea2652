//! Time source for the authorization window

/// Supplies the current Unix time in seconds
pub trait Clock: Send + Sync {
    fn now_unix_seconds(&self) -> u64;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix_seconds(&self) -> u64 {
        // Clamp pre-epoch clocks to zero rather than wrapping
        u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
    }
}

/// A clock frozen at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn now_unix_seconds(&self) -> u64 {
        self.0
    }
}
