use std::iter::once;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::observer::{Kind, MetricObserver, Observation};

/// A bucketed observation, `count` is not cumulative
#[derive(Clone, Debug, PartialEq)]
pub struct ObservationBucket {
    pub le: f64,
    pub count: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HistogramObservation {
    pub buckets: Vec<ObservationBucket>,
    pub sum: f64,
    pub count: u64,
}

#[derive(Clone, Debug)]
pub struct Histogram {
    state: Arc<Mutex<HistogramObservation>>,
}

impl Histogram {
    pub fn new(buckets: impl Iterator<Item = f64>) -> Self {
        let mut bounds = buckets.filter(|le| le.is_finite()).collect::<Vec<_>>();
        bounds.sort_by(f64::total_cmp);
        bounds.dedup();

        let buckets = bounds
            .into_iter()
            .chain(once(f64::INFINITY))
            .map(|le| ObservationBucket { le, count: 0 })
            .collect::<Vec<_>>();

        Self {
            state: Arc::new(Mutex::new(HistogramObservation {
                buckets,
                sum: 0.0,
                count: 0,
            })),
        }
    }

    pub fn record(&self, value: f64) {
        let mut state = self.state.lock();

        // NaN never matches a bucket and is dropped
        if let Some(bucket) = state.buckets.iter_mut().find(|b| value <= b.le) {
            bucket.count = bucket.count.wrapping_add(1);
            state.count = state.count.wrapping_add(1);
            state.sum += value;
        }
    }

    pub fn get(&self) -> HistogramObservation {
        self.state.lock().clone()
    }
}

impl MetricObserver for Histogram {
    type Options = Vec<f64>;

    fn create(options: &Self::Options) -> Self {
        if options.is_empty() {
            return Histogram::new(exponential_buckets(1.0, 2.0, 10));
        }

        Histogram::new(options.iter().copied())
    }

    fn kind() -> Kind {
        Kind::Histogram
    }

    fn observe(&self) -> Observation {
        Observation::Histogram(self.get())
    }
}

pub fn exponential_buckets(start: f64, factor: f64, length: usize) -> impl Iterator<Item = f64> {
    (0..length).map(move |i| start * factor.powi(i as i32))
}
