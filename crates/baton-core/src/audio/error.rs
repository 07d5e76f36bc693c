//! Audio backend error types

use thiserror::Error;

/// Errors that can occur while bringing the audio subsystem up
#[derive(Error, Debug)]
pub enum AudioError {
    /// Could not reach the audio server (absent or refusing clients)
    #[error("Failed to reach the audio server: {0}")]
    ServerUnavailable(String),

    /// Port registration failed
    #[error("Failed to register port '{name}': {reason}")]
    PortRegistration { name: String, reason: String },

    /// Client activation failed
    #[error("Failed to activate audio client: {0}")]
    Activation(String),

    /// The negotiated geometry does not fit the fixed bank layout
    #[error(transparent)]
    Geometry(#[from] crate::layout::GeometryError),

    /// Built without an audio backend
    #[error("No audio backend compiled in (enable the jack-backend feature)")]
    BackendUnavailable,
}

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;
