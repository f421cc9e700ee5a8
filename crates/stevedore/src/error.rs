//! Error taxonomy for the host crate.
//!
//! Generation-time failures (schema, ABI consistency) live in
//! `stevedore-codegen` and can only surface while building; everything here
//! is a runtime condition.

use thiserror::Error;

/// An error decoded from a native `EngineError` value: a machine-readable
/// kind plus a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct NativeCallError {
    pub kind: String,
    pub message: String,
}

/// Failures of engine client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("could not create engine client")]
    CreateClient(#[source] NativeCallError),

    #[error("ping failed")]
    Ping(#[source] NativeCallError),

    #[error("argument contains an interior NUL byte: {0:?}")]
    InvalidString(String),

    #[error("native call returned neither a result nor an error")]
    MissingResult,
}

/// Failures of the pipe streaming bridge.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("could not create stream")]
    Create(#[source] NativeCallError),

    #[error("could not dispose stream")]
    Dispose(#[source] NativeCallError),

    /// An I/O failure other than the end-of-stream conditions (zero-byte
    /// read, broken pipe), which terminate a pump without error.
    #[error("stream I/O failed with code {code}: {message}")]
    Io { code: i32, message: String },

    #[error("stream pump thread panicked")]
    PumpPanicked,

    #[error("native call returned neither a result nor an error")]
    MissingResult,
}
