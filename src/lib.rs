//! Scaleway service discovery for Prometheus.
//!
//! A [`Discoverer`] polls the Scaleway instance inventory on a fixed
//! interval, maps every instance to a scrape target with
//! `__meta_scaleway_*` labels, groups the targets and publishes the groups
//! to a [`Sink`] in the file_sd format. Instances which disappeared since the
//! previous cycle are published once more as empty groups so consumers can
//! drop them.

#[macro_use]
extern crate tracing;

pub mod config;
pub mod error;
pub mod group;
pub mod http;
pub mod inventory;
pub mod labels;
pub mod reconcile;
pub mod scheduler;
pub mod sink;
pub mod stats;
pub mod trace;

pub use config::{Config, Settings};
pub use error::{ConfigError, Error, FetchError, MalformedRecord, Result, SinkError};
pub use group::{GroupBuilder, Grouping, TargetGroup};
pub use inventory::{Credentials, InstanceRecord, Inventory};
pub use labels::{AddressSource, LabelSet, MappedTarget, Mapper, Target};
pub use reconcile::{Reconciler, reconcile};
pub use scheduler::{Discoverer, MalformedRecordPolicy, State};
pub use sink::Sink;
pub use stats::Stats;
