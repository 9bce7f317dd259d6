use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::attributes::{Attributes, assert_legal_key};
use crate::observer::{Kind, MetricObserver, Observation};
use crate::text::TextEncoder;
use crate::{Counter, Gauge, Histogram};

/// A named family of series, one observer per unique set of `Attributes`.
#[derive(Clone, Debug)]
pub struct Metric<T: MetricObserver> {
    name: &'static str,
    description: &'static str,
    series: Arc<Mutex<BTreeMap<Attributes, T>>>,
    options: T::Options,
}

impl<T: MetricObserver> Metric<T> {
    fn new(name: &'static str, description: &'static str, options: T::Options) -> Self {
        Metric {
            name,
            description,
            series: Arc::new(Mutex::new(BTreeMap::new())),
            options,
        }
    }

    /// Returns the observer of the series identified by `attributes`, creating
    /// it on first use.
    pub fn recorder(&self, attributes: impl Into<Attributes>) -> T {
        self.series
            .lock()
            .entry(attributes.into())
            .or_insert_with(|| T::create(&self.options))
            .clone()
    }

    fn report(&self, reporter: &mut impl Reporter) {
        reporter.start_metric(self.name, self.description, T::kind());
        self.series
            .lock()
            .iter()
            .for_each(|(attrs, observer)| reporter.report(attrs, observer.observe()));
        reporter.finish_metric();
    }
}

/// Owns every metric family of the process.
///
/// Cloning is cheap and all clones share the same families, so the discovery
/// loop can record while an exporter renders.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    counters: Arc<Mutex<BTreeMap<&'static str, Metric<Counter>>>>,
    gauges: Arc<Mutex<BTreeMap<&'static str, Metric<Gauge>>>>,
    histograms: Arc<Mutex<BTreeMap<&'static str, Metric<Histogram>>>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// Registering an existing name returns the existing family.
    pub fn register_counter(
        &self,
        name: &'static str,
        description: &'static str,
    ) -> Metric<Counter> {
        self.assert_unique(name, Kind::Counter);

        self.counters
            .lock()
            .entry(name)
            .or_insert_with(|| Metric::new(name, description, ()))
            .clone()
    }

    pub fn register_gauge(&self, name: &'static str, description: &'static str) -> Metric<Gauge> {
        self.assert_unique(name, Kind::Gauge);

        self.gauges
            .lock()
            .entry(name)
            .or_insert_with(|| Metric::new(name, description, ()))
            .clone()
    }

    pub fn register_histogram(
        &self,
        name: &'static str,
        description: &'static str,
        buckets: impl Iterator<Item = f64>,
    ) -> Metric<Histogram> {
        self.assert_unique(name, Kind::Histogram);

        let buckets = buckets.collect::<Vec<_>>();
        self.histograms
            .lock()
            .entry(name)
            .or_insert_with(|| Metric::new(name, description, buckets))
            .clone()
    }

    pub fn report(&self, reporter: &mut impl Reporter) {
        self.counters.lock().values().for_each(|m| m.report(reporter));
        self.gauges.lock().values().for_each(|m| m.report(reporter));
        self.histograms.lock().values().for_each(|m| m.report(reporter));
    }

    /// Render every family in the Prometheus text exposition format.
    pub fn encode(&self) -> String {
        let mut encoder = TextEncoder::default();
        self.report(&mut encoder);
        encoder.finish()
    }

    fn assert_unique(&self, name: &'static str, kind: Kind) {
        assert_legal_key(name);

        let registered = if self.counters.lock().contains_key(name) {
            Some(Kind::Counter)
        } else if self.gauges.lock().contains_key(name) {
            Some(Kind::Gauge)
        } else if self.histograms.lock().contains_key(name) {
            Some(Kind::Histogram)
        } else {
            None
        };

        if let Some(registered) = registered {
            assert_eq!(
                registered,
                kind,
                "metric \"{name}\" is already registered as {}",
                registered.as_str()
            );
        }
    }
}

pub trait Reporter {
    fn start_metric(&mut self, name: &'static str, description: &'static str, kind: Kind);

    fn report(&mut self, attrs: &Attributes, observation: Observation);

    /// Finish recording a given metric
    fn finish_metric(&mut self);
}
