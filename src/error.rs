use std::{io, path::PathBuf, time::Duration};

use hyper::StatusCode;
use thiserror::Error;

/// Failure to load the top-level sources document. Fatal to the whole run.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// A subscription body that could not be turned into a node list.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("malformed document: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("document is not a mapping")]
    NotAMapping,

    #[error("`proxies` is not a list")]
    InvalidProxies,
}

/// Per-site retrieval failure. The site contributes no nodes, the run continues.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("request failed: {0}")]
    Request(#[from] hyper_util::client::legacy::Error),

    #[error("unexpected status {0}")]
    Status(StatusCode),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to read body: {0}")]
    Body(#[from] hyper::Error),

    #[error("too many redirects")]
    TooManyRedirects,

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Why a raw record was refused by the node validator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NodeRejection {
    #[error("record is not a mapping")]
    NotAMapping,

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid value for field: {0}")]
    InvalidField(&'static str),

    #[error("invalid protocol options: {0}")]
    InvalidProtocolOptions(&'static str),
}

#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("{0} has no address")]
    NotFound(String),

    #[error("lookup of {0} timed out")]
    Timeout(String),

    #[error("lookup failed: {0}")]
    Io(#[from] io::Error),

    #[error("resolver pool is closed")]
    PoolClosed,

    #[error("resolver worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("dns query failed: {0}")]
    Dns(#[from] trust_dns_resolver::error::ResolveError),
}
