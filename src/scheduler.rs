use std::collections::{BTreeSet, HashSet};
use std::time::Duration;

use serde::Deserialize;
use tokio::time::{Instant, MissedTickBehavior};
use tripwire::Tripwire;

use crate::config::Settings;
use crate::error::{ConfigError, MalformedRecord};
use crate::group::{GroupBuilder, TargetGroup};
use crate::inventory::{Credentials, Inventory};
use crate::labels::Mapper;
use crate::reconcile::Reconciler;
use crate::sink::Sink;
use crate::stats::Stats;

/// What to do with records which cannot be mapped. Either way the record is
/// skipped and counted, the rest of the batch is still published.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum MalformedRecordPolicy {
    /// Log at debug level only
    Drop,
    /// Log every skipped record, and the batch as partial
    #[default]
    Warn,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum State {
    Idle,
    Polling,
    Publishing,
    Waiting,
    Stopped,
}

/// Drives the poll, map, build, reconcile and publish cycle of one
/// inventory.
pub struct Discoverer<I, S> {
    inventory: I,
    sink: S,
    credentials: Credentials,
    interval: Duration,

    mapper: Mapper,
    builder: GroupBuilder,
    reconciler: Reconciler,
    malformed_records: MalformedRecordPolicy,

    stats: Stats,
    state: State,
}

impl<I: Inventory, S: Sink> Discoverer<I, S> {
    pub fn new(settings: &Settings, inventory: I, sink: S, stats: Stats) -> Result<Self, ConfigError> {
        if settings.interval.is_zero() {
            return Err(ConfigError::InvalidInterval);
        }

        Ok(Discoverer {
            inventory,
            sink,
            credentials: settings.credentials.clone(),
            interval: settings.interval,
            mapper: Mapper::new(
                settings.address_source,
                settings.port,
                settings.tag_separator.clone(),
            ),
            builder: GroupBuilder::new(
                settings.grouping,
                settings.source_prefix.clone(),
                settings.group_name.clone(),
            ),
            reconciler: Reconciler::default(),
            malformed_records: settings.malformed_records,
            stats,
            state: State::Idle,
        })
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Sources published by the last successful cycle.
    pub fn previous(&self) -> &BTreeSet<String> {
        self.reconciler.previous()
    }

    /// Run one cycle without waiting.
    pub async fn tick(&mut self) {
        if let Some(batch) = self.poll().await {
            self.publish(batch).await;
        }

        self.state = State::Waiting;
    }

    /// Poll immediately, then once per interval, until `shutdown` resolves.
    ///
    /// Cancellation is checked before every poll and ends a wait at once. An
    /// inventory call in flight is always awaited, a publish blocked on the
    /// sink is given up since the cycle is already committed.
    pub async fn run(&mut self, mut shutdown: Tripwire) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => break,
                _ = ticker.tick() => {}
            }

            if let Some(batch) = self.poll().await {
                tokio::select! {
                    biased;

                    _ = self.publish(batch) => {},
                    _ = &mut shutdown => {
                        warn!(message = "shutdown while publishing, batch dropped");
                        break;
                    }
                }
            }

            self.state = State::Waiting;
        }

        self.state = State::Stopped;
        info!(message = "discovery stopped");
    }

    /// List, map, build and reconcile. `None` when the inventory call failed,
    /// in which case the observed state is left untouched.
    async fn poll(&mut self) -> Option<Vec<TargetGroup>> {
        self.state = State::Polling;

        let start = Instant::now();
        let result = self.inventory.list_instances(&self.credentials).await;
        let elapsed = start.elapsed();
        self.stats.request(elapsed, result.is_ok());

        let records = match result {
            Ok(records) => records,
            Err(err) => {
                warn!(message = "list instances failed", %err, ?elapsed);
                return None;
            }
        };

        debug!(message = "get servers", count = records.len(), ?elapsed);

        let mut malformed = 0;
        let mut seen = HashSet::new();
        let mapped = records
            .iter()
            .filter_map(|record| {
                let result = self.mapper.map(record).and_then(|mapped| {
                    if seen.insert(mapped.identifier.clone()) {
                        Ok(mapped)
                    } else {
                        Err(MalformedRecord::DuplicateIdentifier {
                            identifier: mapped.identifier,
                        })
                    }
                });

                match result {
                    Ok(mapped) => Some(mapped),
                    Err(err) => {
                        malformed += 1;
                        match self.malformed_records {
                            MalformedRecordPolicy::Drop => {
                                debug!(message = "skip malformed instance", %err)
                            }
                            MalformedRecordPolicy::Warn => {
                                warn!(message = "skip malformed instance", %err)
                            }
                        }

                        None
                    }
                }
            })
            .collect::<Vec<_>>();

        if malformed > 0 {
            self.stats.malformed(malformed);

            if self.malformed_records == MalformedRecordPolicy::Warn {
                warn!(
                    message = "publishing partial batch",
                    skipped = malformed,
                    mapped = mapped.len()
                );
            }
        }

        let targets = mapped.len();
        let groups = self.builder.build(mapped);
        for group in &groups {
            debug!(
                message = "server added",
                source = %group.source,
                targets = group.targets.len()
            );
        }

        let group_count = groups.len();
        let batch = self.reconciler.reconcile(groups);
        self.stats
            .cycle(targets, group_count, batch.len() - group_count);

        Some(batch)
    }

    async fn publish(&mut self, batch: Vec<TargetGroup>) {
        self.state = State::Publishing;

        if let Err(err) = self.sink.publish(batch).await {
            self.stats.publish_failed();
            warn!(message = "publish target groups failed", %err);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use metrics::Registry;
    use pretty_assertions::assert_eq;
    use tokio::sync::{Notify, mpsc};

    use super::*;
    use crate::Config;
    use crate::error::FetchError;
    use crate::inventory::{InstanceRecord, PublicAddress};

    type Response = Result<Vec<InstanceRecord>, &'static str>;

    #[derive(Clone, Default)]
    struct Scripted {
        responses: Arc<Mutex<VecDeque<Response>>>,
    }

    impl Scripted {
        fn new(responses: impl IntoIterator<Item = Response>) -> Self {
            Scripted {
                responses: Arc::new(Mutex::new(responses.into_iter().collect())),
            }
        }
    }

    #[async_trait]
    impl Inventory for Scripted {
        async fn list_instances(
            &self,
            _credentials: &Credentials,
        ) -> Result<Vec<InstanceRecord>, FetchError> {
            match self.responses.lock().unwrap().pop_front() {
                Some(Ok(records)) => Ok(records),
                Some(Err(err)) => Err(FetchError::new(err)),
                None => Ok(vec![]),
            }
        }
    }

    fn record(identifier: &str, ip: &str) -> InstanceRecord {
        InstanceRecord {
            identifier: identifier.to_string(),
            public_ip: Some(PublicAddress {
                address: ip.to_string(),
                dynamic: false,
            }),
            ..Default::default()
        }
    }

    fn settings(malformed_records: MalformedRecordPolicy) -> Settings {
        Config {
            organization: "org".to_string(),
            token: Some("token".to_string()),
            port: 9100,
            address_source: crate::AddressSource::Public,
            malformed_records,
            ..Default::default()
        }
        .build()
        .unwrap()
    }

    fn discoverer(
        inventory: Scripted,
        malformed_records: MalformedRecordPolicy,
    ) -> (
        Discoverer<Scripted, mpsc::UnboundedSender<Vec<TargetGroup>>>,
        mpsc::UnboundedReceiver<Vec<TargetGroup>>,
        Stats,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let stats = Stats::new(&Registry::new());
        let discoverer =
            Discoverer::new(&settings(malformed_records), inventory, tx, stats.clone()).unwrap();

        (discoverer, rx, stats)
    }

    fn sources(batch: &[TargetGroup]) -> Vec<(&str, usize)> {
        batch
            .iter()
            .map(|group| (group.source.as_str(), group.targets.len()))
            .collect()
    }

    #[tokio::test]
    async fn failure_keeps_previous_state() {
        let inventory = Scripted::new([
            Ok(vec![record("s1", "1.2.3.4"), record("s2", "5.6.7.8")]),
            Err("rate limited"),
            Ok(vec![record("s1", "1.2.3.4")]),
        ]);
        let (mut discoverer, mut rx, stats) =
            discoverer(inventory, MalformedRecordPolicy::Warn);
        assert_eq!(discoverer.state(), State::Idle);

        discoverer.tick().await;
        assert_eq!(discoverer.state(), State::Waiting);
        let before = discoverer.previous().clone();
        assert_eq!(before.len(), 2);
        rx.recv().await.unwrap();

        discoverer.tick().await;
        assert_eq!(discoverer.previous(), &before);
        assert!(rx.try_recv().is_err());
        assert_eq!(stats.request_failures(), 1);

        discoverer.tick().await;
        let batch = rx.recv().await.unwrap();
        assert_eq!(sources(&batch), vec![("scaleway/s1", 1), ("scaleway/s2", 0)]);
    }

    #[tokio::test]
    async fn malformed_records_are_skipped() {
        for policy in [MalformedRecordPolicy::Drop, MalformedRecordPolicy::Warn] {
            let inventory = Scripted::new([Ok(vec![
                record("s1", "1.2.3.4"),
                record("s2", "not-an-ip"),
                record("", "5.6.7.8"),
                record("s3", "9.9.9.9"),
                record("s1", "4.4.4.4"),
            ])]);
            let (mut discoverer, mut rx, stats) = discoverer(inventory, policy);

            discoverer.tick().await;

            let batch = rx.recv().await.unwrap();
            assert_eq!(
                sources(&batch),
                vec![("scaleway/s1", 1), ("scaleway/s3", 1)]
            );
            assert_eq!(batch[0].targets[0].as_str(), "1.2.3.4:9100");
            assert_eq!(stats.malformed_records(), 3);
        }
    }

    #[tokio::test]
    async fn publish_failure_commits_state() {
        let inventory = Scripted::new([Ok(vec![record("s1", "1.2.3.4")])]);
        let (mut discoverer, rx, stats) = discoverer(inventory, MalformedRecordPolicy::Warn);
        drop(rx);

        discoverer.tick().await;

        assert_eq!(stats.publish_failures(), 1);
        assert_eq!(
            discoverer.previous().iter().collect::<Vec<_>>(),
            vec!["scaleway/s1"]
        );
    }

    #[tokio::test]
    async fn zero_interval() {
        let mut settings = settings(MalformedRecordPolicy::Warn);
        settings.interval = Duration::ZERO;

        let (tx, _rx) = mpsc::unbounded_channel::<Vec<TargetGroup>>();
        let result = Discoverer::new(
            &settings,
            Scripted::default(),
            tx,
            Stats::new(&Registry::new()),
        );
        assert!(matches!(result, Err(ConfigError::InvalidInterval)));
    }

    /// Answers only once `release` is notified.
    struct Gated {
        release: Arc<Notify>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Inventory for Gated {
        async fn list_instances(
            &self,
            _credentials: &Credentials,
        ) -> Result<Vec<InstanceRecord>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.release.notified().await;

            Ok(vec![record("s1", "1.2.3.4")])
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_while_listing() {
        let release = Arc::new(Notify::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let inventory = Gated {
            release: Arc::clone(&release),
            calls: Arc::clone(&calls),
        };
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut discoverer = Discoverer::new(
            &settings(MalformedRecordPolicy::Warn),
            inventory,
            tx,
            Stats::new(&Registry::new()),
        )
        .unwrap();

        let (trigger, tripwire) = Tripwire::new();
        let handle = tokio::spawn(async move {
            discoverer.run(tripwire).await;
            discoverer
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        trigger.cancel();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!handle.is_finished());

        release.notify_one();
        let discoverer = handle.await.unwrap();

        assert_eq!(discoverer.state(), State::Stopped);
        assert_eq!(
            discoverer.previous().iter().collect::<Vec<_>>(),
            vec!["scaleway/s1"]
        );
        drop(discoverer);

        let batch = rx.recv().await.unwrap();
        assert_eq!(sources(&batch), vec![("scaleway/s1", 1)]);
        assert!(rx.recv().await.is_none());

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_while_publish_blocked() {
        let inventory = Scripted::new([
            Ok(vec![record("s1", "1.2.3.4")]),
            Ok(vec![record("s2", "5.6.7.8")]),
        ]);
        let (tx, mut rx) = mpsc::channel(1);
        let mut discoverer = Discoverer::new(
            &settings(MalformedRecordPolicy::Warn),
            inventory,
            tx,
            Stats::new(&Registry::new()),
        )
        .unwrap();

        let (trigger, tripwire) = Tripwire::new();
        let handle = tokio::spawn(async move {
            discoverer.run(tripwire).await;
            discoverer
        });

        // the first batch fills the channel, the second one blocks
        tokio::time::sleep(Duration::from_secs(31)).await;
        trigger.cancel();

        let discoverer = handle.await.unwrap();
        assert_eq!(discoverer.state(), State::Stopped);
        assert_eq!(
            discoverer.previous().iter().collect::<Vec<_>>(),
            vec!["scaleway/s2"]
        );
        drop(discoverer);

        let first = rx.recv().await.unwrap();
        assert_eq!(sources(&first), vec![("scaleway/s1", 1)]);
        assert!(rx.recv().await.is_none());
    }
}
