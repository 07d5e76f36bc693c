//! Trigger-learn sessions
//!
//! A session runs synchronously on whichever non-real-time thread asks
//! for it. Raising `learn_mode` parks the watcher, so the next control
//! the operator touches lands here instead of being interpreted as a
//! command.

use std::thread;
use std::time::{Duration, Instant};

use baton_core::SwitchState;
use flume::{Receiver, RecvTimeoutError};
use thiserror::Error;

use crate::store::TriggerStore;
use crate::watcher::POLL_INTERVAL;
use crate::wire::ControlMessage;

/// How long a session waits for the operator to touch a control.
pub const LEARN_TIMEOUT: Duration = Duration::from_secs(20);

/// Poll bound inside the session loop.
const LEARN_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum LearnError {
    /// Sessions never queue behind each other.
    #[error("A learn session is already active")]
    SessionActive,

    #[error("Control input disconnected during learn")]
    TransportClosed,

    /// Persisting the captured trigger failed. The in-memory trigger is
    /// left unchanged so state and storage cannot disagree.
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearnOutcome {
    Learned(ControlMessage),
    /// The deadline passed with no input. The old trigger stays.
    TimedOut,
}

/// Clears `learn_mode` on every exit path.
struct LearnGuard<'a>(&'a SwitchState);

impl Drop for LearnGuard<'_> {
    fn drop(&mut self) {
        self.0.end_learn();
    }
}

/// Capture the next complete control message as the new trigger.
///
/// The message is persisted before it is installed; a trigger that cannot
/// be stored is not adopted.
pub fn learn_trigger(
    state: &SwitchState,
    messages: &Receiver<ControlMessage>,
    store: &TriggerStore,
    timeout: Duration,
) -> Result<LearnOutcome, LearnError> {
    if !state.begin_learn() {
        return Err(LearnError::SessionActive);
    }
    let _guard = LearnGuard(state);

    // Let the watcher finish its current poll before draining, so it
    // cannot race this session for the first press.
    thread::sleep(POLL_INTERVAL);
    drain(messages);

    log::info!(
        "Learn session open for {}s: touch the desired control",
        timeout.as_secs()
    );

    let outcome = wait_for_message(state, messages, store, timeout);

    // Extra presses made during the session are not commands.
    drain(messages);
    outcome
}

fn wait_for_message(
    state: &SwitchState,
    messages: &Receiver<ControlMessage>,
    store: &TriggerStore,
    timeout: Duration,
) -> Result<LearnOutcome, LearnError> {
    let deadline = Instant::now() + timeout;
    loop {
        let now = Instant::now();
        if now >= deadline {
            log::info!("Learn session timed out, trigger unchanged");
            return Ok(LearnOutcome::TimedOut);
        }
        match messages.recv_timeout(LEARN_POLL.min(deadline - now)) {
            Ok(message) => {
                store.save(message)?;
                state.set_trigger(message.bytes());
                log::info!("Learned trigger {}", message);
                return Ok(LearnOutcome::Learned(message));
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return Err(LearnError::TransportClosed),
        }
    }
}

fn drain(messages: &Receiver<ControlMessage>) {
    while messages.try_recv().is_ok() {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn store_in(dir: &tempfile::TempDir) -> TriggerStore {
        TriggerStore::new(dir.path().join("trigger.yaml"))
    }

    #[test]
    fn test_capture_persists_then_installs() {
        let state = SwitchState::new([0; 3]);
        let (tx, rx) = flume::bounded(8);
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let sender = thread::spawn(move || {
            // Past the settle sleep and the stale drain.
            thread::sleep(Duration::from_millis(80));
            tx.send(ControlMessage([0x90, 16, 127])).unwrap();
        });

        let outcome = learn_trigger(&state, &rx, &store, Duration::from_secs(5)).unwrap();
        sender.join().unwrap();

        assert_eq!(outcome, LearnOutcome::Learned(ControlMessage([0x90, 16, 127])));
        assert_eq!(state.trigger(), [0x90, 16, 127]);
        assert!(!state.learn_mode());
        assert_eq!(store.load(), ControlMessage([0x90, 16, 127]));
    }

    #[test]
    fn test_timeout_keeps_old_trigger() {
        let state = SwitchState::new([0xB0, 1, 2]);
        let (_tx, rx) = flume::bounded::<ControlMessage>(8);
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let outcome = learn_trigger(&state, &rx, &store, Duration::from_millis(120)).unwrap();

        assert_eq!(outcome, LearnOutcome::TimedOut);
        assert_eq!(state.trigger(), [0xB0, 1, 2]);
        assert!(!state.learn_mode());
    }

    #[test]
    fn test_stale_messages_are_not_captured() {
        let state = SwitchState::new([0; 3]);
        let (tx, rx) = flume::bounded(8);
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        // Queued before the session opens, so it must be discarded.
        tx.send(ControlMessage([0x90, 99, 1])).unwrap();

        let outcome = learn_trigger(&state, &rx, &store, Duration::from_millis(120)).unwrap();

        assert_eq!(outcome, LearnOutcome::TimedOut);
        assert_eq!(state.trigger(), [0; 3]);
    }

    #[test]
    fn test_second_session_is_rejected() {
        let state = SwitchState::new([0; 3]);
        let (_tx, rx) = flume::bounded::<ControlMessage>(8);
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        assert!(state.begin_learn());
        let result = learn_trigger(&state, &rx, &store, Duration::from_millis(50));

        assert!(matches!(result, Err(LearnError::SessionActive)));
        // The rejected call must not tear down the active session.
        assert!(state.learn_mode());
        state.end_learn();
    }

    #[test]
    fn test_persist_failure_leaves_trigger_unchanged() {
        let state = SwitchState::new([0xB0, 1, 2]);
        let (tx, rx) = flume::bounded(8);
        let dir = tempfile::tempdir().unwrap();
        // A plain file where the store expects a directory.
        fs::write(dir.path().join("blocker"), b"x").unwrap();
        let store = TriggerStore::new(dir.path().join("blocker").join("trigger.yaml"));

        let sender = thread::spawn(move || {
            thread::sleep(Duration::from_millis(80));
            tx.send(ControlMessage([0x90, 16, 127])).unwrap();
        });

        let result = learn_trigger(&state, &rx, &store, Duration::from_secs(5));
        sender.join().unwrap();

        assert!(matches!(result, Err(LearnError::Store(_))));
        assert_eq!(state.trigger(), [0xB0, 1, 2]);
        assert!(!state.learn_mode());
    }

    #[test]
    fn test_disconnect_surfaces_as_error() {
        let state = SwitchState::new([0; 3]);
        let (tx, rx) = flume::bounded::<ControlMessage>(8);
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        drop(tx);
        let result = learn_trigger(&state, &rx, &store, Duration::from_secs(5));

        assert!(matches!(result, Err(LearnError::TransportClosed)));
        assert!(!state.learn_mode());
    }
}
