use std::collections::BTreeMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use serde::{Deserialize, Serialize};

use crate::error::MalformedRecord;
use crate::inventory::InstanceRecord;

/// The well-known label holding the address Prometheus scrapes.
pub const ADDRESS_LABEL: &str = "__address__";

pub const ARCHITECTURE_LABEL: &str = "__meta_scaleway_architecture";
pub const COMMERCIAL_TYPE_LABEL: &str = "__meta_scaleway_commercial_type";
pub const IDENTIFIER_LABEL: &str = "__meta_scaleway_identifier";
pub const IMAGE_ID_LABEL: &str = "__meta_scaleway_image_id";
pub const IMAGE_NAME_LABEL: &str = "__meta_scaleway_image_name";
pub const NAME_LABEL: &str = "__meta_scaleway_name";
pub const ORGANIZATION_LABEL: &str = "__meta_scaleway_organization";
pub const PRIVATE_IP_LABEL: &str = "__meta_scaleway_private_ip";
pub const PUBLIC_IP_LABEL: &str = "__meta_scaleway_public_ip";
pub const STATE_LABEL: &str = "__meta_scaleway_state";
/// All tags joined with the separator, surrounded by it too, so relabeling
/// can match `.*,tag,.*`
pub const TAGS_LABEL: &str = "__meta_scaleway_tags";
pub const PLATFORM_LABEL: &str = "__meta_scaleway_platform_id";
pub const HYPERVISOR_LABEL: &str = "__meta_scaleway_hypervisor_id";
pub const NODE_LABEL: &str = "__meta_scaleway_node_id";
pub const BLADE_LABEL: &str = "__meta_scaleway_blade_id";
pub const CHASSIS_LABEL: &str = "__meta_scaleway_chassis_id";
pub const CLUSTER_LABEL: &str = "__meta_scaleway_cluster_id";
pub const ZONE_LABEL: &str = "__meta_scaleway_zone_id";

/// Labels unique to one instance, they cannot be shared by a group holding
/// several targets.
pub const INSTANCE_LABELS: [&str; 5] = [
    ADDRESS_LABEL,
    PRIVATE_IP_LABEL,
    PUBLIC_IP_LABEL,
    IDENTIFIER_LABEL,
    NAME_LABEL,
];

/// Which IP of an instance is used to build its target.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressSource {
    Public,
    #[default]
    Private,
}

impl fmt::Display for AddressSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressSource::Public => f.write_str("public"),
            AddressSource::Private => f.write_str("private"),
        }
    }
}

/// A dialable `host:port`, IPv6 hosts are bracketed.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Target(String);

impl Target {
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Target(SocketAddr::new(ip, port).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An immutable set of labels.
///
/// Keys are kept sorted, so two sets are equal (and hash the same) exactly
/// when all keys and values are, and serialization is stable.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct LabelSet(BTreeMap<String, String>);

impl LabelSet {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a copy without the given names.
    pub fn without(&self, names: &[&str]) -> LabelSet {
        self.0
            .iter()
            .filter(|(k, _)| !names.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LabelSet {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        LabelSet(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// The result of mapping one instance.
#[derive(Clone, Debug, PartialEq)]
pub struct MappedTarget {
    pub identifier: String,
    pub target: Target,
    pub labels: LabelSet,
}

/// Encode tags as `<sep>a<sep>b<sep>`, an empty list encodes as "".
pub fn encode_tags(tags: &[String], separator: &str) -> String {
    if tags.is_empty() {
        return String::new();
    }

    let mut encoded = String::with_capacity(
        separator.len() * (tags.len() + 1) + tags.iter().map(String::len).sum::<usize>(),
    );
    encoded.push_str(separator);
    for tag in tags {
        encoded.push_str(tag);
        encoded.push_str(separator);
    }

    encoded
}

/// Turns inventory records into targets and labels.
#[derive(Clone, Debug)]
pub struct Mapper {
    address_source: AddressSource,
    port: u16,
    separator: String,
}

impl Mapper {
    pub fn new(address_source: AddressSource, port: u16, separator: impl Into<String>) -> Self {
        Mapper {
            address_source,
            port,
            separator: separator.into(),
        }
    }

    /// Map one record. Optional fields which are missing map to empty
    /// values, the key is always present.
    pub fn map(&self, record: &InstanceRecord) -> Result<MappedTarget, MalformedRecord> {
        if record.identifier.is_empty() {
            return Err(MalformedRecord::MissingIdentifier);
        }

        let private_ip = record.private_ip.as_deref().unwrap_or_default();
        let public_ip = record
            .public_ip
            .as_ref()
            .map(|public| public.address.as_str())
            .unwrap_or_default();

        let selected = match self.address_source {
            AddressSource::Public => public_ip,
            AddressSource::Private => private_ip,
        };
        if selected.is_empty() {
            return Err(MalformedRecord::MissingAddress {
                identifier: record.identifier.clone(),
                address_source: self.address_source,
            });
        }

        let ip = selected
            .parse::<IpAddr>()
            .map_err(|err| MalformedRecord::InvalidAddress {
                identifier: record.identifier.clone(),
                address: selected.to_string(),
                err,
            })?;
        let target = Target::new(ip, self.port);

        let (image_id, image_name) = record
            .image
            .as_ref()
            .map(|image| (image.identifier.as_str(), image.name.as_str()))
            .unwrap_or_default();
        let location = record.location.clone().unwrap_or_default();

        let labels = LabelSet::from_iter([
            (ADDRESS_LABEL, target.as_str()),
            (ARCHITECTURE_LABEL, record.architecture.as_str()),
            (COMMERCIAL_TYPE_LABEL, record.commercial_type.as_str()),
            (IDENTIFIER_LABEL, record.identifier.as_str()),
            (IMAGE_ID_LABEL, image_id),
            (IMAGE_NAME_LABEL, image_name),
            (NAME_LABEL, record.name.as_str()),
            (ORGANIZATION_LABEL, record.organization.as_str()),
            (PRIVATE_IP_LABEL, private_ip),
            (PUBLIC_IP_LABEL, public_ip),
            (STATE_LABEL, record.state.as_str()),
            (
                TAGS_LABEL,
                encode_tags(&record.tags, &self.separator).as_str(),
            ),
            (PLATFORM_LABEL, location.platform_id.as_str()),
            (HYPERVISOR_LABEL, location.hypervisor_id.as_str()),
            (NODE_LABEL, location.node_id.as_str()),
            (BLADE_LABEL, location.blade_id.as_str()),
            (CHASSIS_LABEL, location.chassis_id.as_str()),
            (CLUSTER_LABEL, location.cluster_id.as_str()),
            (ZONE_LABEL, location.zone_id.as_str()),
        ]);

        Ok(MappedTarget {
            identifier: record.identifier.clone(),
            target,
            labels,
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::inventory::{Image, Location, PublicAddress};

    fn record() -> InstanceRecord {
        InstanceRecord {
            identifier: "1234".to_string(),
            name: "web-1".to_string(),
            organization: "org".to_string(),
            architecture: "x86_64".to_string(),
            commercial_type: "DEV1-S".to_string(),
            state: "running".to_string(),
            private_ip: Some("10.0.0.1".to_string()),
            public_ip: Some(PublicAddress {
                address: "1.2.3.4".to_string(),
                dynamic: false,
            }),
            image: Some(Image {
                identifier: "img".to_string(),
                name: "Ubuntu".to_string(),
            }),
            tags: vec!["a".to_string(), "b".to_string()],
            location: Some(Location {
                zone_id: "par1".to_string(),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn tags() {
        for (tags, separator, want) in [
            (vec![], ",", ""),
            (vec!["a"], ",", ",a,"),
            (vec!["a", "b"], ",", ",a,b,"),
            (vec!["a", "b"], "|", "|a|b|"),
        ] {
            let tags = tags.into_iter().map(String::from).collect::<Vec<_>>();
            assert_eq!(encode_tags(&tags, separator), want);
        }
    }

    #[test]
    fn map_private() {
        let mapper = Mapper::new(AddressSource::Private, 9100, ",");
        let mapped = mapper.map(&record()).unwrap();

        assert_eq!(mapped.identifier, "1234");
        assert_eq!(mapped.target.as_str(), "10.0.0.1:9100");
        assert_eq!(
            mapped.labels,
            LabelSet::from_iter([
                (ADDRESS_LABEL, "10.0.0.1:9100"),
                (ARCHITECTURE_LABEL, "x86_64"),
                (COMMERCIAL_TYPE_LABEL, "DEV1-S"),
                (IDENTIFIER_LABEL, "1234"),
                (IMAGE_ID_LABEL, "img"),
                (IMAGE_NAME_LABEL, "Ubuntu"),
                (NAME_LABEL, "web-1"),
                (ORGANIZATION_LABEL, "org"),
                (PRIVATE_IP_LABEL, "10.0.0.1"),
                (PUBLIC_IP_LABEL, "1.2.3.4"),
                (STATE_LABEL, "running"),
                (TAGS_LABEL, ",a,b,"),
                (PLATFORM_LABEL, ""),
                (HYPERVISOR_LABEL, ""),
                (NODE_LABEL, ""),
                (BLADE_LABEL, ""),
                (CHASSIS_LABEL, ""),
                (CLUSTER_LABEL, ""),
                (ZONE_LABEL, "par1"),
            ])
        );
    }

    #[test]
    fn map_public() {
        let mapper = Mapper::new(AddressSource::Public, 80, ",");
        let mapped = mapper.map(&record()).unwrap();

        assert_eq!(mapped.target.as_str(), "1.2.3.4:80");
        assert_eq!(mapped.labels.get(ADDRESS_LABEL), Some("1.2.3.4:80"));
    }

    #[test]
    fn ipv6_is_bracketed() {
        let mut record = record();
        record.private_ip = Some("fd00::1".to_string());

        let mapped = Mapper::new(AddressSource::Private, 9100, ",")
            .map(&record)
            .unwrap();
        assert_eq!(mapped.target.as_str(), "[fd00::1]:9100");
    }

    #[test]
    fn missing_optional_fields_keep_keys() {
        let record = InstanceRecord {
            identifier: "1234".to_string(),
            private_ip: Some("10.0.0.1".to_string()),
            ..Default::default()
        };

        let full = Mapper::new(AddressSource::Private, 80, ",")
            .map(&self::record())
            .unwrap();
        let sparse = Mapper::new(AddressSource::Private, 80, ",")
            .map(&record)
            .unwrap();

        assert_eq!(sparse.labels.len(), full.labels.len());
        assert_eq!(sparse.labels.get(PUBLIC_IP_LABEL), Some(""));
        assert_eq!(sparse.labels.get(TAGS_LABEL), Some(""));
        assert_eq!(sparse.labels.get(IMAGE_NAME_LABEL), Some(""));
        assert_eq!(sparse.labels.get(ZONE_LABEL), Some(""));
    }

    #[test]
    fn malformed() {
        let mapper = Mapper::new(AddressSource::Public, 80, ",");

        let mut no_id = record();
        no_id.identifier.clear();
        assert_eq!(mapper.map(&no_id), Err(MalformedRecord::MissingIdentifier));

        let mut no_public = record();
        no_public.public_ip = None;
        assert_eq!(
            mapper.map(&no_public),
            Err(MalformedRecord::MissingAddress {
                identifier: "1234".to_string(),
                address_source: AddressSource::Public,
            })
        );

        let mut invalid = record();
        invalid.public_ip = Some(PublicAddress {
            address: "not-an-ip".to_string(),
            dynamic: false,
        });
        assert!(matches!(
            mapper.map(&invalid),
            Err(MalformedRecord::InvalidAddress { address, .. }) if address == "not-an-ip"
        ));
    }

    #[test]
    fn label_set_equality_is_structural() {
        let a = LabelSet::from_iter([("b", "2"), ("a", "1")]);
        let b = LabelSet::from_iter([("a", "1"), ("b", "2")]);
        assert_eq!(a, b);

        let c = LabelSet::from_iter([("a", "1"), ("b", "3")]);
        assert_ne!(a, c);

        assert_eq!(a.without(&["b"]), LabelSet::from_iter([("a", "1")]));
    }
}
