//! Baton Core - failover routing between two redundant playback computers

pub mod audio;
pub mod detect;
pub mod layout;
pub mod router;
pub mod state;

pub use router::{BlockInputs, EngineEvent, FailoverEngine, FailoverPolicy};
pub use state::{SourceBank, SwitchState, TriggerAction};
