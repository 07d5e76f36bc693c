//! Control watcher thread
//!
//! A cooperative polling loop that turns inbound control messages into
//! switch transitions:
//!
//! - normally it pops the queue and compares each message against the
//!   learned trigger, applying the transition on a byte-exact match
//! - while a learn session is open it stays off the queue entirely so the
//!   session sees the live stream
//! - when halt is raised it exits and the supervisor joins it
//!
//! The status indicator is refreshed here once per poll. That also covers
//! failovers decided on the audio thread; a lamp does not need block-rate
//! latency.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use baton_core::{SwitchState, TriggerAction};
use flume::{Receiver, RecvTimeoutError};

use crate::indicator::StatusIndicator;
use crate::wire::ControlMessage;

/// Upper bound on reaction time to halt and to learn-mode changes.
pub const POLL_INTERVAL: Duration = Duration::from_millis(30);

/// Handle to the watcher thread.
pub struct WatcherHandle {
    thread: JoinHandle<()>,
}

impl WatcherHandle {
    /// Wait for the thread to exit. It exits when halt is raised or the
    /// control input is dropped.
    pub fn join(self) {
        if self.thread.join().is_err() {
            log::error!("control-watch thread panicked");
        }
    }
}

/// Spawn the watcher on its own named thread.
pub fn spawn_watcher(
    state: Arc<SwitchState>,
    messages: Receiver<ControlMessage>,
    indicator: Option<StatusIndicator>,
) -> WatcherHandle {
    let thread = thread::Builder::new()
        .name("control-watch".to_string())
        .spawn(move || run(&state, &messages, indicator))
        .expect("Failed to spawn control-watch thread");
    WatcherHandle { thread }
}

fn run(
    state: &SwitchState,
    messages: &Receiver<ControlMessage>,
    mut indicator: Option<StatusIndicator>,
) {
    log::info!("Control watcher running");
    while !state.halted() {
        if state.learn_mode() {
            // The learn session owns the queue until it closes.
            thread::sleep(POLL_INTERVAL);
        } else {
            match messages.recv_timeout(POLL_INTERVAL) {
                Ok(message) => {
                    if let Some(action) = interpret(state, message) {
                        match action {
                            TriggerAction::RevertedToPrimary => {
                                log::info!("Trigger during failover, reverting to {}", state.active_bank());
                            }
                            TriggerAction::OverrideEngaged | TriggerAction::OverrideReleased => {
                                log::info!("Manual override toggled, routing {}", state.active_bank());
                            }
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    log::info!("Control input closed");
                    break;
                }
            }
        }
        if let Some(indicator) = indicator.as_mut() {
            indicator.refresh(state.active_bank());
        }
    }
    log::info!("Control watcher stopped");
}

/// Compare one inbound message against the learned trigger and apply the
/// transition on a match. An unset trigger matches nothing.
pub fn interpret(state: &SwitchState, message: ControlMessage) -> Option<TriggerAction> {
    let trigger = ControlMessage::from(state.trigger());
    if trigger.is_unset() || message != trigger {
        log::debug!("Ignoring non-trigger message {}", message);
        return None;
    }
    Some(state.apply_trigger())
}

#[cfg(test)]
mod tests {
    use super::*;
    use baton_core::SourceBank;

    const TRIGGER: [u8; 3] = [0x90, 16, 127];

    #[test]
    fn test_trigger_match_toggles_override() {
        let state = SwitchState::new(TRIGGER);

        let action = interpret(&state, ControlMessage(TRIGGER));
        assert_eq!(action, Some(TriggerAction::OverrideEngaged));
        assert_eq!(state.active_bank(), SourceBank::Secondary);

        let action = interpret(&state, ControlMessage(TRIGGER));
        assert_eq!(action, Some(TriggerAction::OverrideReleased));
        assert_eq!(state.active_bank(), SourceBank::Primary);
    }

    #[test]
    fn test_trigger_during_failover_reverts() {
        let state = SwitchState::new(TRIGGER);
        state.set_failed_over(true);

        let action = interpret(&state, ControlMessage(TRIGGER));
        assert_eq!(action, Some(TriggerAction::RevertedToPrimary));
        assert_eq!(state.active_bank(), SourceBank::Primary);
        assert!(!state.failed_over());
    }

    #[test]
    fn test_other_messages_are_ignored() {
        let state = SwitchState::new(TRIGGER);

        assert_eq!(interpret(&state, ControlMessage([0x90, 17, 127])), None);
        assert_eq!(interpret(&state, ControlMessage([0x91, 16, 127])), None);
        assert_eq!(state.active_bank(), SourceBank::Primary);
    }

    #[test]
    fn test_unset_trigger_matches_nothing() {
        let state = SwitchState::new([0; 3]);

        assert_eq!(interpret(&state, ControlMessage([0; 3])), None);
        assert_eq!(interpret(&state, ControlMessage([0x90, 16, 127])), None);
        assert_eq!(state.active_bank(), SourceBank::Primary);
    }
}
