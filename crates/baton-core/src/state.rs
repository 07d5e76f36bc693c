//! Shared switch state
//!
//! One struct of atomics shared by the audio callback, the control-message
//! watcher, and the operator console. Everything is lock-free: the audio
//! thread reads flags with relaxed loads and never waits on anyone.
//!
//! No atomicity is promised *across* flags. A route decision that lands one
//! block late because two flags changed mid-block is harmless here; blocks
//! are a few milliseconds apart.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Which source bank feeds the outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceBank {
    Primary,
    Secondary,
}

impl fmt::Display for SourceBank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceBank::Primary => write!(f, "PRIMARY"),
            SourceBank::Secondary => write!(f, "SECONDARY"),
        }
    }
}

/// What a matching trigger message did to the switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerAction {
    /// Automatic failover was active; both flags were cleared.
    RevertedToPrimary,
    OverrideEngaged,
    OverrideReleased,
}

/// Lock-free state shared across all three threads.
///
/// The trigger message is packed into a single `AtomicU32` so the watcher
/// can read it and a learn session can replace it without a lock.
pub struct SwitchState {
    failed_over: AtomicBool,
    manual_override: AtomicBool,
    learn_mode: AtomicBool,
    halt: AtomicBool,
    stop: AtomicBool,
    trigger: AtomicU32,
}

impl SwitchState {
    /// Fresh per-cycle state. Only the trigger survives restarts, via the
    /// trigger store.
    pub fn new(trigger: [u8; 3]) -> Self {
        Self {
            failed_over: AtomicBool::new(false),
            manual_override: AtomicBool::new(false),
            learn_mode: AtomicBool::new(false),
            halt: AtomicBool::new(false),
            stop: AtomicBool::new(false),
            trigger: AtomicU32::new(pack(trigger)),
        }
    }

    #[inline]
    pub fn failed_over(&self) -> bool {
        self.failed_over.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_failed_over(&self, value: bool) {
        self.failed_over.store(value, Ordering::Relaxed);
    }

    #[inline]
    pub fn manual_override(&self) -> bool {
        self.manual_override.load(Ordering::Relaxed)
    }

    /// Secondary iff exactly one of the two flags is set.
    #[inline]
    pub fn active_bank(&self) -> SourceBank {
        if self.failed_over() != self.manual_override() {
            SourceBank::Secondary
        } else {
            SourceBank::Primary
        }
    }

    /// Transition for a matching trigger message.
    ///
    /// While failed over the trigger means "back to primary": both flags
    /// are cleared, whatever the override was. Otherwise it toggles the
    /// manual override and leaves `failed_over` alone.
    pub fn apply_trigger(&self) -> TriggerAction {
        if self.failed_over() {
            self.set_failed_over(false);
            self.manual_override.store(false, Ordering::Relaxed);
            TriggerAction::RevertedToPrimary
        } else if self.manual_override.fetch_xor(true, Ordering::Relaxed) {
            TriggerAction::OverrideReleased
        } else {
            TriggerAction::OverrideEngaged
        }
    }

    #[inline]
    pub fn learn_mode(&self) -> bool {
        self.learn_mode.load(Ordering::Relaxed)
    }

    /// Claim the learn session. Returns false if one is already active;
    /// sessions never queue.
    pub fn begin_learn(&self) -> bool {
        self.learn_mode
            .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
    }

    pub fn end_learn(&self) {
        self.learn_mode.store(false, Ordering::Relaxed);
    }

    #[inline]
    pub fn halted(&self) -> bool {
        self.halt.load(Ordering::Relaxed)
    }

    /// End the current run cycle. The supervisor decides whether to rebuild.
    pub fn request_halt(&self) {
        self.halt.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// End the current cycle and the supervisor loop with it.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
        self.halt.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn trigger(&self) -> [u8; 3] {
        unpack(self.trigger.load(Ordering::Relaxed))
    }

    pub fn set_trigger(&self, bytes: [u8; 3]) {
        self.trigger.store(pack(bytes), Ordering::Relaxed);
    }
}

#[inline]
fn pack(bytes: [u8; 3]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0])
}

#[inline]
fn unpack(value: u32) -> [u8; 3] {
    let b = value.to_le_bytes();
    [b[0], b[1], b[2]]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bank_selection_truth_table() {
        let cases = [
            (false, false, SourceBank::Primary),
            (true, false, SourceBank::Secondary),
            (false, true, SourceBank::Secondary),
            (true, true, SourceBank::Primary),
        ];
        for (failed_over, manual, expected) in cases {
            let state = SwitchState::new([0; 3]);
            if manual {
                // Engage the override before raising failover so the
                // trigger toggles instead of reverting.
                state.apply_trigger();
            }
            state.set_failed_over(failed_over);
            assert_eq!(state.active_bank(), expected, "failed_over={failed_over} manual={manual}");
        }
    }

    #[test]
    fn test_trigger_during_failover_reverts_both_flags() {
        let state = SwitchState::new([0x90, 60, 100]);
        state.apply_trigger(); // engage override
        state.set_failed_over(true);
        assert_eq!(state.apply_trigger(), TriggerAction::RevertedToPrimary);
        assert!(!state.failed_over());
        assert!(!state.manual_override());
        assert_eq!(state.active_bank(), SourceBank::Primary);
    }

    #[test]
    fn test_trigger_without_failover_toggles_override() {
        let state = SwitchState::new([0x90, 60, 100]);
        assert_eq!(state.apply_trigger(), TriggerAction::OverrideEngaged);
        assert!(state.manual_override());
        assert!(!state.failed_over());
        assert_eq!(state.apply_trigger(), TriggerAction::OverrideReleased);
        assert!(!state.manual_override());
    }

    #[test]
    fn test_learn_session_is_exclusive() {
        let state = SwitchState::new([0; 3]);
        assert!(state.begin_learn());
        assert!(!state.begin_learn());
        state.end_learn();
        assert!(state.begin_learn());
    }

    #[test]
    fn test_stop_implies_halt() {
        let state = SwitchState::new([0; 3]);
        state.request_stop();
        assert!(state.halted());
        assert!(state.stopped());

        let state = SwitchState::new([0; 3]);
        state.request_halt();
        assert!(state.halted());
        assert!(!state.stopped());
    }

    #[test]
    fn test_trigger_round_trips_through_packing() {
        let state = SwitchState::new([0xB0, 0x10, 0x7F]);
        assert_eq!(state.trigger(), [0xB0, 0x10, 0x7F]);
        state.set_trigger([0x91, 0x3C, 0x64]);
        assert_eq!(state.trigger(), [0x91, 0x3C, 0x64]);
    }
}
