//! Trailing-edge debounce driven by the event loop's clock.
//!
//! Calls only record the latest argument and restart the quiet window;
//! [`Debouncer::poll`] hands the argument back once the window has elapsed
//! without another call.

use std::time::{Duration, Instant};

pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<(Instant, T)>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Replaces any pending argument and restarts the quiet window.
    pub fn call(&mut self, arg: T, now: Instant) {
        self.pending = Some((now, arg));
    }

    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((at, _)) if now.saturating_duration_since(*at) >= self.delay => {
                self.pending.take().map(|(_, arg)| arg)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rapid_calls_collapse_into_the_last_one() {
        let start = Instant::now();
        let mut d = Debouncer::new(SEARCH_DEBOUNCE);
        d.call("e", start);
        d.call("el", start + Duration::from_millis(100));
        d.call("elf", start + Duration::from_millis(300));

        assert_eq!(d.poll(start + Duration::from_millis(700)), None);
        assert_eq!(d.poll(start + Duration::from_millis(800)), Some("elf"));
        assert_eq!(d.poll(start + Duration::from_millis(2000)), None);
    }

    #[test]
    fn zero_delay_fires_on_the_next_poll() {
        let start = Instant::now();
        let mut d = Debouncer::new(Duration::ZERO);
        assert_eq!(d.poll(start), None::<u32>);
        d.call(3, start);
        assert_eq!(d.poll(start), Some(3));
    }
}
