//! Error taxonomy for sessions and windows
//!
//! Creation-time failures (connection, capability, allocation) abort
//! construction. Runtime failures surface once through the event stream and
//! afterwards through `ConnectionLost` results.

use std::time::Duration;

use crate::backend::Capability;

pub type PaneResult<T> = Result<T, PaneError>;

#[derive(thiserror::Error, Debug)]
pub enum PaneError {
    #[error("cannot connect to display server: {0}")]
    ConnectionFailure(String),

    #[error("required capability missing: {0}")]
    MissingCapability(Capability),

    #[error("buffer allocation failed: {0}")]
    AllocationFailure(String),

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("buffer slot {slot} is still held by the compositor")]
    BufferUnavailable { slot: usize },

    #[error("invalid window geometry {width}x{height}")]
    InvalidGeometry { width: u32, height: u32 },

    #[error("connection lost: {0}")]
    ConnectionLost(String),

    #[error("no response from the compositor within {0:?}")]
    Timeout(Duration),
}

impl PaneError {
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionFailure(msg.into())
    }

    pub fn allocation(msg: impl Into<String>) -> Self {
        Self::AllocationFailure(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::ProtocolViolation(msg.into())
    }

    pub fn lost(msg: impl Into<String>) -> Self {
        Self::ConnectionLost(msg.into())
    }

    /// True for failures that end the session rather than a single call.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ConnectionFailure(_) | Self::ConnectionLost(_))
    }
}
