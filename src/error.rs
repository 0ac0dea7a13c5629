//! WolfMesh Error Types

use std::net::IpAddr;
use std::path::PathBuf;

use ipnet::IpNet;
use thiserror::Error;

/// Result type alias for WolfMesh operations
pub type Result<T> = std::result::Result<T, Error>;

/// WolfMesh error types
///
/// Everything here is fatal: the run either completes or aborts before any
/// output file is written.
#[derive(Error, Debug)]
pub enum Error {
    // Input errors
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} parse error: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("site config is missing the '{0}' section")]
    MissingSection(&'static str),

    #[error("no '{field}' defined in '{section}' section")]
    MissingField {
        section: &'static str,
        field: &'static str,
    },

    #[error("network/subnet '{0}' is not a valid network definition")]
    InvalidSubnet(String),

    #[error("network/port '{0}' is not a valid port number")]
    InvalidPort(i64),

    #[error("'hosts' section is empty, at least one host is required")]
    NoHosts,

    #[error("host {0} does not have a publicAddress")]
    MissingPublicAddress(String),

    #[error("{path} '{value}' is not a valid ip address")]
    InvalidAddress { path: String, value: String },

    #[error("{path} '{value}' is not a valid key: {source}")]
    InvalidKey {
        path: String,
        value: String,
        #[source]
        source: crate::keys::KeyError,
    },

    // Invariant violations (logic defects, not user input)
    #[error("internal error: address {address} double assigned in network {subnet}")]
    DoubleAssigned { address: IpAddr, subnet: IpNet },

    #[error("internal error: address {address} is not a usable host of {subnet}")]
    AddressOutsideSubnet { address: IpAddr, subnet: IpNet },

    #[error("internal error: no preshared key for {a} <> {b}")]
    MissingPresharedKey { a: String, b: String },

    #[error("internal error: {0}")]
    Internal(String),

    // Resource exhaustion
    #[error("network {0} is exhausted, no usable address left")]
    SubnetExhausted(IpNet),
}

impl Error {
    /// Attach a file path to a bare I/O error
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Check if this error indicates an internal logic defect rather than
    /// bad user input
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Error::DoubleAssigned { .. }
                | Error::AddressOutsideSubnet { .. }
                | Error::MissingPresharedKey { .. }
                | Error::Internal(_)
        )
    }
}
