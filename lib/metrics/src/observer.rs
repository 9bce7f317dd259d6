use crate::histogram::HistogramObservation;

/// The exposition type of a metric family
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Kind {
    Counter,
    Gauge,
    Histogram,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Counter => "counter",
            Kind::Gauge => "gauge",
            Kind::Histogram => "histogram",
        }
    }
}

/// A snapshot of one series
#[derive(Clone, Debug, PartialEq)]
pub enum Observation {
    Counter(u64),
    Gauge(u64),
    Histogram(HistogramObservation),
}

/// Types that can be registered in a `Registry`.
///
/// A `Metric` keeps one observer per unique set of `Attributes`, the observer
/// itself is the recorder, so it must be cheap to clone and share its state
/// between clones.
pub trait MetricObserver: Clone + std::fmt::Debug + Send + 'static {
    type Options: Clone + std::fmt::Debug + Send;

    fn create(options: &Self::Options) -> Self;

    fn kind() -> Kind;

    fn observe(&self) -> Observation;
}
