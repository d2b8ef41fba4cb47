use std::time::Duration;
use tokio::time::Instant;

/// Minimum spacing between surface writes of one conversation
#[derive(Debug, Clone)]
pub struct Throttle {
    min_interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: None,
        }
    }

    pub fn ready(&self, now: Instant) -> bool {
        self.next_allowed().is_none_or(|at| now >= at)
    }

    pub fn record(&mut self, now: Instant) {
        self.last = Some(now);
    }

    pub fn next_allowed(&self) -> Option<Instant> {
        self.last.map(|last| last + self.min_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window() {
        let start = Instant::now();
        let mut throttle = Throttle::new(Duration::from_secs(2));
        assert!(throttle.ready(start));

        throttle.record(start);
        assert!(!throttle.ready(start + Duration::from_millis(1999)));
        assert!(throttle.ready(start + Duration::from_secs(2)));
        assert_eq!(throttle.next_allowed(), Some(start + Duration::from_secs(2)));
    }

    #[test]
    fn test_zero_interval_never_blocks() {
        let start = Instant::now();
        let mut throttle = Throttle::new(Duration::ZERO);
        throttle.record(start);
        assert!(throttle.ready(start));
    }
}
