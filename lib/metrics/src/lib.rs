//! Process scoped metrics for the discovery loop.
//!
//! Unlike a global registry, a [`Registry`] is created once by the embedding
//! program and handed to whoever records or exports metrics.

#![forbid(unsafe_code)]

mod attributes;
mod counter;
mod gauge;
mod histogram;
mod observer;
mod registry;
mod text;

pub use attributes::Attributes;
pub use counter::Counter;
pub use gauge::Gauge;
pub use histogram::{Histogram, HistogramObservation, ObservationBucket, exponential_buckets};
pub use observer::{Kind, MetricObserver, Observation};
pub use registry::{Metric, Registry, Reporter};
pub use text::TextEncoder;
