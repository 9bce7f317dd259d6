use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::labels::{INSTANCE_LABELS, LabelSet, MappedTarget, Target};

/// A named set of targets sharing one label set, serialized the way
/// Prometheus file_sd reads it.
///
/// A group without targets and labels is a retraction marker, it tells the
/// consumer the source no longer exists.
///
/// `source` is not part of the file_sd format, so a serialized retraction is
/// just `{"targets":[],"labels":{}}`. Sinks have to key what they keep by
/// `source` before serializing, e.g. one file or map entry per source.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct TargetGroup {
    #[serde(skip)]
    pub source: String,
    pub targets: Vec<Target>,
    pub labels: LabelSet,
}

impl TargetGroup {
    pub fn retraction(source: impl Into<String>) -> Self {
        TargetGroup {
            source: source.into(),
            targets: vec![],
            labels: LabelSet::default(),
        }
    }

    pub fn is_retraction(&self) -> bool {
        self.targets.is_empty() && self.labels.is_empty()
    }
}

/// How mapped targets are turned into groups.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Grouping {
    /// One group per instance
    #[default]
    PerInstance,
    /// Instances with the same labels share a group
    Merged,
}

#[derive(Clone, Debug)]
pub enum GroupBuilder {
    /// `source` is `<prefix>/<identifier>`
    PerInstance { prefix: String },
    /// `source` is `<name>/<ordinal>`
    Merged { name: String },
}

impl GroupBuilder {
    pub fn new(grouping: Grouping, prefix: impl Into<String>, name: impl Into<String>) -> Self {
        match grouping {
            Grouping::PerInstance => GroupBuilder::PerInstance {
                prefix: prefix.into(),
            },
            Grouping::Merged => GroupBuilder::Merged { name: name.into() },
        }
    }

    /// Build groups, the output order only depends on the input order.
    pub fn build(&self, mapped: Vec<MappedTarget>) -> Vec<TargetGroup> {
        match self {
            GroupBuilder::PerInstance { prefix } => {
                // the first target of an identifier wins, sources must be
                // unique within a batch
                let mut seen = HashSet::new();

                mapped
                    .into_iter()
                    .filter(|mapped| seen.insert(mapped.identifier.clone()))
                    .map(|mapped| TargetGroup {
                        source: format!("{prefix}/{}", mapped.identifier),
                        targets: vec![mapped.target],
                        labels: mapped.labels,
                    })
                    .collect()
            }

            GroupBuilder::Merged { name } => {
                // insertion ordered, so the first discovered instance decides
                // where its group lands
                let mut merged = IndexMap::<LabelSet, Vec<Target>>::new();
                for mapped in mapped {
                    merged
                        .entry(mapped.labels.without(&INSTANCE_LABELS))
                        .or_default()
                        .push(mapped.target);
                }

                merged
                    .into_iter()
                    .enumerate()
                    .map(|(ordinal, (labels, targets))| TargetGroup {
                        source: format!("{name}/{ordinal}"),
                        targets,
                        labels,
                    })
                    .collect()
            }
        }
    }
}
