//! Error types for the hook sidecar.

use std::path::PathBuf;

/// Result type alias for hook sidecar operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the sidecar.
///
/// Input, output and protocol errors are scoped to a single call: the server
/// reports them back to the caller and keeps serving.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // =========================================================================
    // Input Errors
    // =========================================================================
    /// The VMI payload is not a valid VirtualMachineInstance document.
    #[error("failed to decode VMI spec: {0}")]
    InvalidVmi(String),

    /// The domain payload is not a parseable domain XML document.
    #[error("failed to decode domain spec: {0}")]
    InvalidDomain(String),

    /// A SATA disk carries no alias to derive its device id from.
    #[error("SATA disk at position {index} has no alias")]
    MissingDiskAlias { index: usize },

    // =========================================================================
    // Output Errors
    // =========================================================================
    /// The updated domain could not be written back to XML.
    #[error("failed to encode domain spec: {0}")]
    Serialization(String),

    // =========================================================================
    // Protocol Errors
    // =========================================================================
    /// Hook protocol version is not served by this sidecar.
    #[error("unsupported hook version '{0}'")]
    UnsupportedVersion(String),

    /// Peer answered the call with a gRPC error status.
    #[error("hook call failed ({code:?}): {message}")]
    Remote { code: tonic::Code, message: String },

    /// Hook socket connection could not be established or was lost.
    #[error("hook transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    // =========================================================================
    // Configuration / I/O Errors
    // =========================================================================
    /// Invalid sidecar configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Failed to bind the hook socket.
    #[error("failed to bind hook socket at {path}: {source}")]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
