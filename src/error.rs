//! Crate-wide error taxonomy.
//!
//! Codec and store operations degrade gracefully (they return `Option`/`bool`
//! and log through the `log` facade instead of propagating one of these), so
//! most variants here surface from the session pool, the main client, and
//! the service coordinator's persistence and connection-gated operations.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, S7ClientError>;

#[derive(Debug, Error)]
pub enum S7ClientError {
    #[error("operation requires a live connection")]
    NotConnected,

    #[error("no variable at path `{path}`")]
    InvalidPath { path: String },

    #[error("wire value for `{path}` does not match expected shape for {s7_type}: {detail}")]
    TypeMismatch {
        path: String,
        s7_type: String,
        detail: String,
    },

    #[error("value out of range for {s7_type} encoding: {detail}")]
    OutOfRange { s7_type: String, detail: String },

    #[error("OPC UA call failed: {code:#x} ({symbol})")]
    ProtocolError { code: u32, symbol: String },

    #[error("session pool exhausted: {detail} (consider reducing pool size)")]
    PoolExhausted { detail: String },

    #[error("server certificate rejected: {detail}")]
    CertificateRejected { detail: String },

    #[error("snapshot at `{path}` could not be read: {detail}")]
    SerializationError { path: String, detail: String },

    #[error("operation invoked after disposal")]
    Disposed,

    #[error("operation was cancelled")]
    Cancelled,
}
