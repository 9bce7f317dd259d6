use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::group::Grouping;
use crate::inventory::Credentials;
use crate::labels::AddressSource;
use crate::scheduler::MalformedRecordPolicy;

const fn default_interval() -> Duration {
    Duration::from_secs(30)
}

const fn default_port() -> u16 {
    80
}

fn default_region() -> String {
    "par1".to_string()
}

fn default_source_prefix() -> String {
    "scaleway".to_string()
}

fn default_group_name() -> String {
    "scalewaySD".to_string()
}

fn default_tag_separator() -> String {
    ",".to_string()
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 9465))
}

/// Configuration of the discovery loop, loaded from YAML.
///
/// ```yaml
/// organization: 5b4a3c2d-0000-0000-0000-000000000000
/// region: par1
/// token_file: /etc/scaleway/token
/// interval: 1m
/// port: 9100
/// address_source: public
/// grouping: per_instance
/// ```
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// The Scaleway organization (access key).
    #[serde(default)]
    pub organization: String,

    /// The Scaleway region.
    #[serde(default = "default_region")]
    pub region: String,

    /// The authentication token (secret key).
    pub token: Option<String>,

    /// File containing the authentication token, trailing whitespace is
    /// trimmed.
    pub token_file: Option<PathBuf>,

    /// The refresh interval.
    #[serde(default = "default_interval", with = "humanize::duration::serde")]
    pub interval: Duration,

    /// The port number of every target.
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub address_source: AddressSource,

    #[serde(default)]
    pub grouping: Grouping,

    /// Prefix of the source of per-instance groups.
    #[serde(default = "default_source_prefix")]
    pub source_prefix: String,

    /// Name used by the sources of merged groups.
    #[serde(default = "default_group_name")]
    pub group_name: String,

    #[serde(default = "default_tag_separator")]
    pub tag_separator: String,

    #[serde(default)]
    pub malformed_records: MalformedRecordPolicy,

    /// The address the metrics endpoint listens on, bound by
    /// [`crate::http::bind`].
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            organization: String::new(),
            region: default_region(),
            token: None,
            token_file: None,
            interval: default_interval(),
            port: default_port(),
            address_source: AddressSource::default(),
            grouping: Grouping::default(),
            source_prefix: default_source_prefix(),
            group_name: default_group_name(),
            tag_separator: default_tag_separator(),
            malformed_records: MalformedRecordPolicy::default(),
            listen: default_listen(),
        }
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_yaml::from_str(s).map_err(Into::into)
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|err| ConfigError::Read {
            path: path.to_path_buf(),
            err,
        })?;

        content.parse()
    }

    /// Validate the config and resolve the credentials.
    pub fn build(self) -> Result<Settings, ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::InvalidInterval);
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        if self.tag_separator.is_empty() {
            return Err(ConfigError::EmptySeparator);
        }
        if self.source_prefix.is_empty() {
            return Err(ConfigError::EmptyName("source_prefix"));
        }
        if self.group_name.is_empty() {
            return Err(ConfigError::EmptyName("group_name"));
        }
        if self.organization.is_empty() {
            return Err(ConfigError::MissingOrganization);
        }

        let token = match (self.token, self.token_file) {
            (Some(_), Some(_)) => return Err(ConfigError::ConflictingCredential),
            (Some(token), None) => token,
            (None, Some(path)) => std::fs::read_to_string(&path)
                .map(|content| content.trim().to_string())
                .map_err(|err| ConfigError::ReadTokenFile { path, err })?,
            (None, None) => return Err(ConfigError::MissingCredential),
        };
        if token.is_empty() {
            return Err(ConfigError::MissingCredential);
        }

        Ok(Settings {
            credentials: Credentials {
                organization: self.organization,
                region: self.region,
                token,
            },
            interval: self.interval,
            port: self.port,
            address_source: self.address_source,
            grouping: self.grouping,
            source_prefix: self.source_prefix,
            group_name: self.group_name,
            tag_separator: self.tag_separator,
            malformed_records: self.malformed_records,
            listen: self.listen,
        })
    }
}

/// Validated, immutable configuration.
#[derive(Clone, Debug)]
pub struct Settings {
    pub credentials: Credentials,
    pub interval: Duration,
    pub port: u16,
    pub address_source: AddressSource,
    pub grouping: Grouping,
    pub source_prefix: String,
    pub group_name: String,
    pub tag_separator: String,
    pub malformed_records: MalformedRecordPolicy,
    /// Bound by [`crate::http::bind`], the discovery loop never reads it.
    pub listen: SocketAddr,
}
