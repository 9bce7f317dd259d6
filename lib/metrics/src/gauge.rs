use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::observer::{Kind, MetricObserver, Observation};

/// A value that can go up and down, e.g. the number of targets of the last cycle.
#[derive(Clone, Debug, Default)]
pub struct Gauge {
    state: Arc<AtomicU64>,
}

impl Gauge {
    pub fn set(&self, value: u64) {
        self.state.store(value, Ordering::Relaxed);
    }

    pub fn inc(&self, value: u64) {
        self.state.fetch_add(value, Ordering::Relaxed);
    }

    pub fn dec(&self, value: u64) {
        let _ = self
            .state
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                Some(current.saturating_sub(value))
            });
    }

    pub fn fetch(&self) -> u64 {
        self.state.load(Ordering::Relaxed)
    }
}

impl MetricObserver for Gauge {
    type Options = ();

    fn create(_options: &Self::Options) -> Self {
        Gauge::default()
    }

    fn kind() -> Kind {
        Kind::Gauge
    }

    fn observe(&self) -> Observation {
        Observation::Gauge(self.fetch())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn up_and_down() {
        let gauge = Gauge::default();

        assert_eq!(gauge.fetch(), 0);
        gauge.inc(2);
        assert_eq!(gauge.fetch(), 2);
        gauge.dec(1);
        assert_eq!(gauge.fetch(), 1);
        gauge.dec(5);
        assert_eq!(gauge.fetch(), 0);
        gauge.set(42);
        assert_eq!(gauge.fetch(), 42);
    }
}
