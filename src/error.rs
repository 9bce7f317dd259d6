use std::net::AddrParseError;
use std::path::PathBuf;

use thiserror::Error;

use crate::labels::AddressSource;

/// Basic error type, dynamically dispatched and safe to send across threads.
///
/// Used at the seams where the concrete error is owned by a collaborator,
/// e.g. an inventory client or the metrics server.
pub type Error = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Basic result type, defined in terms of [`Error`] and generic over `T`
pub type Result<T> = std::result::Result<T, Error>;

/// Listing instances failed. Every fetch error is considered transient, the
/// discovery loop retries on the next tick.
#[derive(Debug, Error)]
#[error("list instances failed, {0}")]
pub struct FetchError(#[source] Error);

impl FetchError {
    pub fn new(err: impl Into<Error>) -> Self {
        FetchError(err.into())
    }
}

/// An inventory record which cannot be turned into a target.
#[derive(Debug, Error, PartialEq)]
pub enum MalformedRecord {
    #[error("instance has no identifier")]
    MissingIdentifier,

    #[error("instance {identifier} has no {address_source} address")]
    MissingAddress {
        identifier: String,
        address_source: AddressSource,
    },

    #[error("instance {identifier} has invalid address \"{address}\", {err}")]
    InvalidAddress {
        identifier: String,
        address: String,
        err: AddrParseError,
    },

    #[error("instance {identifier} is listed more than once")]
    DuplicateIdentifier { identifier: String },
}

/// Invalid configuration, only ever returned at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path:?} failed, {err}")]
    Read { path: PathBuf, err: std::io::Error },

    #[error("parse config failed, {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("interval must be greater than zero")]
    InvalidInterval,

    #[error("port must be greater than zero")]
    InvalidPort,

    #[error("tag separator must not be empty")]
    EmptySeparator,

    #[error("{0} must not be empty")]
    EmptyName(&'static str),

    #[error("organization is required")]
    MissingOrganization,

    #[error("need to set token or token_file")]
    MissingCredential,

    #[error("cannot set token and token_file at the same time")]
    ConflictingCredential,

    #[error("read token file {path:?} failed, {err}")]
    ReadTokenFile { path: PathBuf, err: std::io::Error },
}

/// Handing a batch to the downstream consumer failed.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink is closed")]
    Closed,

    #[error("publish failed, {0}")]
    Other(#[source] Error),
}
