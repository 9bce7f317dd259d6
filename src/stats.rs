use std::time::Duration;

use metrics::{Counter, Gauge, Histogram, Registry};

const REQUEST_DURATION_BUCKETS: [f64; 8] = [0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0];

/// Observability context of one discovery loop.
///
/// Created once at startup from the process registry, the exporter reads the
/// same registry. Nothing is ever reset.
#[derive(Clone, Debug)]
pub struct Stats {
    request_duration: Histogram,
    request_failures: Counter,
    targets: Gauge,
    groups: Gauge,
    retractions: Counter,
    malformed_records: Counter,
    publish_failures: Counter,
}

impl Stats {
    pub fn new(registry: &Registry) -> Self {
        Stats {
            request_duration: registry
                .register_histogram(
                    "scaleway_sd_request_duration_seconds",
                    "Histogram of latencies for requests to the Scaleway API.",
                    REQUEST_DURATION_BUCKETS.into_iter(),
                )
                .recorder(&[]),
            request_failures: registry
                .register_counter(
                    "scaleway_sd_request_failures_total",
                    "Total number of failed requests to the Scaleway API.",
                )
                .recorder(&[]),
            targets: registry
                .register_gauge(
                    "scaleway_sd_targets",
                    "Number of targets produced by the last successful cycle.",
                )
                .recorder(&[]),
            groups: registry
                .register_gauge(
                    "scaleway_sd_groups",
                    "Number of target groups produced by the last successful cycle.",
                )
                .recorder(&[]),
            retractions: registry
                .register_counter(
                    "scaleway_sd_retractions_total",
                    "Total number of retraction markers published.",
                )
                .recorder(&[]),
            malformed_records: registry
                .register_counter(
                    "scaleway_sd_malformed_records_total",
                    "Total number of instance records skipped because they cannot be mapped.",
                )
                .recorder(&[]),
            publish_failures: registry
                .register_counter(
                    "scaleway_sd_publish_failures_total",
                    "Total number of batches the sink failed to accept.",
                )
                .recorder(&[]),
        }
    }

    pub fn request(&self, elapsed: Duration, success: bool) {
        self.request_duration.record(elapsed.as_secs_f64());
        if !success {
            self.request_failures.inc(1);
        }
    }

    pub fn cycle(&self, targets: usize, groups: usize, retractions: usize) {
        self.targets.set(targets as u64);
        self.groups.set(groups as u64);
        self.retractions.inc(retractions as u64);
    }

    pub fn malformed(&self, count: usize) {
        self.malformed_records.inc(count as u64);
    }

    pub fn publish_failed(&self) {
        self.publish_failures.inc(1);
    }

    pub fn request_failures(&self) -> u64 {
        self.request_failures.fetch()
    }

    pub fn malformed_records(&self) -> u64 {
        self.malformed_records.fetch()
    }

    pub fn publish_failures(&self) -> u64 {
        self.publish_failures.fetch()
    }
}
