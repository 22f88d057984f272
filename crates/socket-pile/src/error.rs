use pile_common::{ConfigError, Transport};
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AddressError {
    #[error("missing port in address {0:?}")]
    MissingPort(String),
    #[error("invalid port in address {0:?}")]
    InvalidPort(String),
    #[error("too many colons in address {0:?}")]
    TooManyColons(String),
    #[error("no {transport} address found for {address:?}")]
    NoMatchingAddress {
        transport: Transport,
        address: String,
    },
    #[error("lookup {address:?} failed: {source}")]
    Lookup {
        address: String,
        #[source]
        source: io::Error,
    },
    #[error("unix sockets are not supported on this platform")]
    UnixUnsupported,
}

/// The listening socket could not be created. Fatal for the whole run.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("listen {transport} {address}: {source}")]
    Io {
        transport: Transport,
        address: String,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Address(#[from] AddressError),
}

/// A single worker failed to connect. Logged and counted, never fatal.
#[derive(Debug, Error)]
#[error("dial {transport} {target}: {source}")]
pub struct DialError {
    pub transport: Transport,
    pub target: String,
    #[source]
    pub source: io::Error,
}

#[derive(Debug, Error)]
pub enum PileError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error(transparent)]
    Bind(#[from] BindError),
    #[error("waiting on start gate: {0}")]
    Gate(#[source] io::Error),
}
