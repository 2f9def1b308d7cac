//! Error types for the 3N stack.

use thiserror::Error;

/// All possible errors that can occur within the 3N stack.
#[derive(Error, Debug)]
pub enum Error {
    /// The leading bytes of a packet match no known discriminator.
    #[error("Unknown header")]
    UnknownHeader,

    /// Error related to wire encoding/decoding.
    #[error("Wire format error: {0}")]
    Wire(String),

    /// No next hop is available for the given prefix.
    #[error("No faces available for {0}")]
    NoFaces(String),

    /// Indexing a 3N address beyond its length.
    #[error("Index {index} out of range for 3N address with {len} components")]
    AddressOutOfRange { index: isize, len: usize },

    /// Malformed textual 3N address.
    #[error("3N address error: {0}")]
    NnnAddress(String),

    /// Malformed ICN name.
    #[error("Name error: {0}")]
    Name(String),

    /// Invalid exclude filter operation.
    #[error("Exclude error: {0}")]
    Exclude(String),

    /// A policy name that is not present in the registry.
    #[error("Unknown replacement policy: {0}")]
    UnknownPolicy(String),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("Other error: {0}")]
    Other(String),
}
