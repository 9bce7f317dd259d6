use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::FetchError;

/// Everything an inventory client needs to authenticate against the
/// Scaleway API. The token is never printed.
#[derive(Clone, PartialEq)]
pub struct Credentials {
    pub organization: String,
    pub region: String,
    pub token: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("organization", &self.organization)
            .field("region", &self.region)
            .field("token", &"**REDACTED**")
            .finish()
    }
}

/// A compute instance as returned by the inventory API.
///
/// ```json
/// {
///   "id": "4f2ad9e1-4c1a-4d6e-8ab1-4a9f1c37a5b2",
///   "name": "web-1",
///   "arch": "x86_64",
///   "commercial_type": "DEV1-S",
///   "state": "running",
///   "private_ip": "10.1.2.3",
///   "public_ip": { "address": "51.15.1.2" },
///   "image": { "id": "b3f1...", "name": "Ubuntu 24.04" },
///   "tags": ["web", "prod"],
///   "location": { "zone_id": "par1", "node_id": "21" }
/// }
/// ```
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct InstanceRecord {
    #[serde(rename = "id")]
    pub identifier: String,
    pub name: String,
    pub organization: String,
    #[serde(rename = "arch")]
    pub architecture: String,
    pub commercial_type: String,
    pub state: String,
    pub private_ip: Option<String>,
    pub public_ip: Option<PublicAddress>,
    pub image: Option<Image>,
    pub tags: Vec<String>,
    pub location: Option<Location>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct PublicAddress {
    pub address: String,
    pub dynamic: bool,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Image {
    #[serde(rename = "id")]
    pub identifier: String,
    pub name: String,
}

/// Placement of the instance inside the datacenter
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Location {
    pub platform_id: String,
    pub hypervisor_id: String,
    pub node_id: String,
    pub blade_id: String,
    pub chassis_id: String,
    pub cluster_id: String,
    pub zone_id: String,
}

/// The capability of listing instances.
///
/// Implementations own the transport. Every error is treated as transient,
/// the discovery loop simply retries on the next tick.
#[async_trait]
pub trait Inventory: Send + Sync {
    async fn list_instances(
        &self,
        credentials: &Credentials,
    ) -> Result<Vec<InstanceRecord>, FetchError>;
}

#[async_trait]
impl<T: Inventory + ?Sized> Inventory for Arc<T> {
    async fn list_instances(
        &self,
        credentials: &Credentials,
    ) -> Result<Vec<InstanceRecord>, FetchError> {
        (**self).list_instances(credentials).await
    }
}
