//! Phase timing for decisions.

use std::time::{Duration, Instant};

/// Adds the time between creation and drop to `slot`.
///
/// ```rust,ignore
/// let mut resolve = Duration::ZERO;
/// {
///     let _timer = PhaseTimer::new(&mut resolve);
///     // resolve entitlements
/// }
/// ```
pub struct PhaseTimer<'a> {
    start: Instant,
    slot: &'a mut Duration,
}

impl<'a> PhaseTimer<'a> {
    pub fn new(slot: &'a mut Duration) -> Self {
        Self {
            start: Instant::now(),
            slot,
        }
    }
}

impl Drop for PhaseTimer<'_> {
    fn drop(&mut self) {
        *self.slot += self.start.elapsed();
    }
}

pub(crate) fn as_millis_f64(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_phase_timer_accumulates_across_scopes() {
        let mut slot = Duration::ZERO;
        for _ in 0..3 {
            let _timer = PhaseTimer::new(&mut slot);
            thread::sleep(Duration::from_millis(5));
        }
        assert!(slot >= Duration::from_millis(15));
    }

    #[test]
    fn test_as_millis_f64() {
        assert_eq!(as_millis_f64(Duration::from_micros(1_500)), 1.5);
    }
}
