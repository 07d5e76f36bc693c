//! MIDI control plane for the baton failover router
//!
//! This crate provides:
//! - MIDI port discovery and input capture via midir
//! - the control watcher thread that matches inbound messages against the
//!   learned trigger and flips the manual override
//! - trigger-learn sessions with YAML persistence
//! - an optional route status indicator (one lamp on the control surface)
//!
//! # Architecture
//!
//! ```text
//! MIDI device → midir callback → flume channel → control-watch thread → SwitchState
//! ```
//!
//! The midir callback is synchronous and does nothing but a bounded
//! try_send; matching and the indicator run on the watcher thread, and
//! learn sessions on whichever non-real-time thread opens them. While a
//! session is open the watcher parks and the session reads the channel
//! instead, so the next control the operator touches is captured rather
//! than interpreted.

mod connection;
mod indicator;
mod input;
mod learn;
mod store;
mod watcher;
mod wire;

pub use connection::{list_input_ports, list_output_ports, ConnectionError};
pub use indicator::StatusIndicator;
pub use input::{ControlInput, QUEUE_CAPACITY};
pub use learn::{learn_trigger, LearnError, LearnOutcome, LEARN_TIMEOUT};
pub use store::TriggerStore;
pub use watcher::{spawn_watcher, WatcherHandle, POLL_INTERVAL};
pub use wire::{ControlMessage, MESSAGE_LEN};
