use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::observer::{Kind, MetricObserver, Observation};

/// Monotonic counter, cloning shares the underlying value.
#[derive(Clone, Debug, Default)]
pub struct Counter {
    state: Arc<AtomicU64>,
}

impl Counter {
    pub fn inc(&self, i: u64) {
        self.state.fetch_add(i, Ordering::Relaxed);
    }

    pub fn fetch(&self) -> u64 {
        self.state.load(Ordering::Relaxed)
    }
}

impl MetricObserver for Counter {
    type Options = ();

    fn create(_options: &Self::Options) -> Self {
        Counter::default()
    }

    fn kind() -> Kind {
        Kind::Counter
    }

    fn observe(&self) -> Observation {
        Observation::Counter(self.fetch())
    }
}
