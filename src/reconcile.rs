use std::collections::BTreeSet;

use crate::group::TargetGroup;

/// Append a retraction marker for every previous source which is missing
/// from `current`, and return the sources of this cycle.
///
/// Retractions follow the current groups, in source order.
pub fn reconcile(
    previous: &BTreeSet<String>,
    mut current: Vec<TargetGroup>,
) -> (Vec<TargetGroup>, BTreeSet<String>) {
    let sources = current
        .iter()
        .map(|group| group.source.clone())
        .collect::<BTreeSet<_>>();

    for source in previous.difference(&sources) {
        debug!(message = "server deleted", %source);

        current.push(TargetGroup::retraction(source.clone()));
    }

    (current, sources)
}

/// Remembers the sources published by the previous successful cycle, and
/// nothing older.
#[derive(Debug, Default)]
pub struct Reconciler {
    previous: BTreeSet<String>,
}

impl Reconciler {
    pub fn previous(&self) -> &BTreeSet<String> {
        &self.previous
    }

    /// Reconcile and commit. The observed state is replaced wholesale.
    pub fn reconcile(&mut self, current: Vec<TargetGroup>) -> Vec<TargetGroup> {
        let (batch, sources) = reconcile(&self.previous, current);
        self.previous = sources;

        batch
    }
}
