//! Error taxonomy for engine calls
//!
//! Usage errors are raised while a call is being set up. Everything that goes
//! wrong afterwards (switch timeouts, transport status, credential setup)
//! surfaces as the failure side of the call's result.

use cloudlet_shared::codec::CodecError;
use cloudlet_shared::StatusCode;
use std::fmt;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Status returned by the remote side or synthesized by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcStatus {
    pub code: StatusCode,
    pub message: String,
}

impl RpcStatus {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn deadline_exceeded(deadline: Duration) -> Self {
        Self::new(
            StatusCode::DeadlineExceeded,
            format!("deadline of {}ms exceeded", deadline.as_millis()),
        )
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Unavailable, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Internal, message)
    }

    /// Build a status from the raw code carried in a frame
    pub fn from_wire(code: i32, message: impl Into<String>) -> Self {
        Self::new(StatusCode::try_from(code).unwrap_or(StatusCode::Unknown), message)
    }
}

impl fmt::Display for RpcStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for RpcStatus {}

/// Failures while building a transport channel
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Could not load key store: {0}")]
    KeyStore(String),

    #[error("Could not load trust store: {0}")]
    TrustStore(String),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("Connect to {addr} timed out")]
    ConnectTimeout { addr: String },
}

/// Errors surfaced by every engine operation
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Usage error: {operation} does not have a request object to make call")]
    MissingRequest { operation: &'static str },

    #[error("Network request timed out after {}ms with no availability", .elapsed.as_millis())]
    NetworkRequestTimeout { elapsed: Duration },

    #[error("RPC failed: {0}")]
    Status(#[from] RpcStatus),

    #[error("Exception calling {operation}: {source}")]
    Execution {
        operation: &'static str,
        #[source]
        source: TransportError,
    },

    #[error("{operation} returned no reply")]
    EmptyReply { operation: &'static str },

    #[error("Frame codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Location is unavailable")]
    LocationUnavailable,

    #[error("Call dispatcher is shut down")]
    DispatcherClosed,

    #[error("Call was cancelled before completing")]
    Cancelled,
}

impl EngineError {
    /// Classify a channel setup failure for `operation`
    ///
    /// Unreachable peers are transport status; credential and endpoint
    /// problems are execution failures.
    pub fn from_transport(operation: &'static str, err: TransportError) -> Self {
        match err {
            TransportError::Connect { addr, source } => EngineError::Status(RpcStatus::unavailable(
                format!("connect to {} failed: {}", addr, source),
            )),
            TransportError::ConnectTimeout { addr } => EngineError::Status(RpcStatus::unavailable(
                format!("connect to {} timed out", addr),
            )),
            other => EngineError::Execution {
                operation,
                source: other,
            },
        }
    }

    /// Status code when this is a transport status failure
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            EngineError::Status(status) => Some(status.code),
            _ => None,
        }
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
