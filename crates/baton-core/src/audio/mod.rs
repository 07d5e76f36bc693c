//! Audio subsystem glue
//!
//! One backend: native JACK, behind the default-on `jack-backend` feature.
//! The engine itself never touches the subsystem; it gets byte views of
//! whatever the backend negotiated and, where the transport has one, an
//! output-ready hook.

mod error;
#[cfg(feature = "jack-backend")]
mod jack_backend;

pub use error::{AudioError, AudioResult};
#[cfg(feature = "jack-backend")]
pub use jack_backend::{start_audio_system, AudioHandle};

#[cfg(not(feature = "jack-backend"))]
use crate::router::FailoverEngine;
#[cfg(not(feature = "jack-backend"))]
use std::time::Duration;

/// What the backend needs to bring the subsystem up.
#[derive(Debug, Clone)]
pub struct AudioSetup {
    /// Client name to register with the audio server
    pub client_name: String,
    /// Client whose output ports feed the 64 input channels (1:1 by index)
    pub capture_client: Option<String>,
    /// Client whose input ports take the 31 output channels (1:1 by index)
    pub playback_client: Option<String>,
}

impl Default for AudioSetup {
    fn default() -> Self {
        Self {
            client_name: "baton".to_string(),
            capture_client: None,
            playback_client: None,
        }
    }
}

/// Keepalive token for builds without a backend. Never constructed; setup
/// always fails with [`AudioError::BackendUnavailable`].
#[cfg(not(feature = "jack-backend"))]
pub struct AudioHandle(());

#[cfg(not(feature = "jack-backend"))]
pub fn start_audio_system(
    _setup: &AudioSetup,
    _engine: FailoverEngine,
    _server_retry: Duration,
) -> AudioResult<AudioHandle> {
    Err(AudioError::BackendUnavailable)
}
