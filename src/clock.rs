//! Injectable clock.
//!
//! The ring timer, the `next` debounce, and the janitor sweep all read the
//! current time; tests substitute a manual clock for determinism instead of
//! sleeping in wall-clock time.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Real-time clock backed by the system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis() as u64
    }
}

pub type SharedClock = Arc<dyn Clock>;

pub fn system_clock() -> SharedClock {
    Arc::new(SystemClock)
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use parking_lot::Mutex;

    /// Manual clock for deterministic tests; advance it explicitly.
    #[derive(Default)]
    pub struct ManualClock(Mutex<u64>);

    impl ManualClock {
        pub fn new(start_ms: u64) -> Arc<Self> {
            Arc::new(Self(Mutex::new(start_ms)))
        }

        pub fn advance(&self, ms: u64) {
            *self.0.lock() += ms;
        }
    }

    impl Clock for ManualClock {
        fn now_ms(&self) -> u64 {
            *self.0.lock()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_moves_forward() {
        let clock = system_clock();
        let t1 = clock.now_ms();
        std::thread::sleep(Duration::from_millis(5));
        let t2 = clock.now_ms();
        assert!(t2 >= t1);
    }

    #[test]
    fn manual_clock_advances_on_command() {
        let clock = test_support::ManualClock::new(1000);
        assert_eq!(clock.now_ms(), 1000);
        clock.advance(500);
        assert_eq!(clock.now_ms(), 1500);
    }
}
