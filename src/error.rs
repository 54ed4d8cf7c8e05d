//! Error types shared across the scope
//!
//! Nothing here is fatal to a running render loop. Setup failures are
//! returned to the caller; teardown failures are logged and skipped.

use thiserror::Error;

/// Errors that can occur while setting up or tearing down a scope session
#[derive(Error, Debug)]
pub enum ScopeError {
    #[error("No input device found")]
    NoInputDevice,

    #[error("Failed to get input config: {0}")]
    InputConfig(String),

    #[error("Failed to build input stream: {0}")]
    BuildStream(String),

    #[error("Failed to start input stream: {0}")]
    PlayStream(String),

    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("Sample source is not bound")]
    NotBound,

    #[error("Threshold listener is not registered")]
    ListenerNotRegistered,

    #[error("Draw surface unavailable: {0}")]
    SurfaceUnavailable(String),

    #[error("Failed to spawn thread: {0}")]
    SpawnThread(#[from] std::io::Error),
}
