//! Per-block failover routing
//!
//! [`FailoverEngine`] is owned exclusively by the audio callback. Each block
//! it runs three steps: pilot detection, bank selection, and a byte-for-byte
//! copy of the selected program bank into the outputs. Nothing here
//! allocates, locks, or performs I/O; the only cross-thread traffic is
//! relaxed atomics on [`SwitchState`] and a preallocated event ring.
//!
//! ```text
//! ┌────────────────┐   flags (Relaxed)   ┌─────────────────────┐
//! │ control-watch  │◄───────────────────►│   audio RT thread   │
//! │ thread         │                     │(owns FailoverEngine)│
//! └────────────────┘                     └──────────┬──────────┘
//!         ▲                                         │ push (rtrb)
//!         │ log / console                           ▼
//! ┌────────────────┐                     ┌─────────────────────┐
//! │   supervisor   │◄────pop()───────────│   EngineEvent ring  │
//! └────────────────┘                     └─────────────────────┘
//! ```

use std::sync::Arc;

use crate::detect::{PilotWindow, SignalPresence};
use crate::state::{SourceBank, SwitchState};

/// How `failed_over` behaves once detection has raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailoverPolicy {
    /// Stays raised until a trigger message reverts to primary. Detection
    /// is skipped while the flag is up.
    #[default]
    Latching,
    /// Recomputed from the pilots every block, so a recovered primary
    /// clears the flag by itself.
    Reevaluate,
}

/// Detector edges, reported off the audio thread through the event ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    /// Primary pilot went silent while the secondary stayed live.
    FailoverEngaged,
    /// Reevaluation saw the primary pilot again.
    FailoverCleared,
}

/// One block of the input frame, as raw sample bytes.
///
/// The banks hold the 31 program channels each; the pilots are the two
/// heartbeat channels. All slices cover the same block and are only valid
/// for the duration of one callback.
pub struct BlockInputs<'a> {
    pub primary: &'a [&'a [u8]],
    pub primary_pilot: &'a [u8],
    pub secondary: &'a [&'a [u8]],
    pub secondary_pilot: &'a [u8],
}

/// The per-block detect / select / copy pipeline.
pub struct FailoverEngine {
    state: Arc<SwitchState>,
    policy: FailoverPolicy,
    primary_presence: Box<dyn SignalPresence>,
    secondary_presence: Box<dyn SignalPresence>,
    on_output_ready: Option<Box<dyn FnMut() + Send>>,
    events: Option<rtrb::Producer<EngineEvent>>,
}

impl FailoverEngine {
    /// Engine with the default byte-window rule on both pilots and the
    /// latching policy.
    pub fn new(state: Arc<SwitchState>) -> Self {
        Self {
            state,
            policy: FailoverPolicy::default(),
            primary_presence: Box::new(PilotWindow),
            secondary_presence: Box::new(PilotWindow),
            on_output_ready: None,
            events: None,
        }
    }

    pub fn with_policy(mut self, policy: FailoverPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The shared switch state this engine routes by. Backends use it to
    /// raise halt when the transport dies under them.
    pub fn state(&self) -> &Arc<SwitchState> {
        &self.state
    }

    /// Replace the presence rule. One instance per pilot, so stateful rules
    /// (debounce) keep independent streaks.
    pub fn with_presence(
        mut self,
        primary: Box<dyn SignalPresence>,
        secondary: Box<dyn SignalPresence>,
    ) -> Self {
        self.primary_presence = primary;
        self.secondary_presence = secondary;
        self
    }

    /// Install the audio subsystem's output-ready notification. Called once
    /// per block, after all copies. JACK has none; ASIO-style transports do.
    pub fn with_output_ready(mut self, hook: Box<dyn FnMut() + Send>) -> Self {
        self.on_output_ready = Some(hook);
        self
    }

    /// Report detector edges into a preallocated ring. A full ring drops
    /// the event.
    pub fn with_event_sink(mut self, events: rtrb::Producer<EngineEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Run one block. Returns the bank that fed the outputs.
    ///
    /// `outputs` must yield one buffer per program channel, in channel
    /// order, each exactly as long as its source slice. Geometry is
    /// validated at setup; this path assumes it.
    pub fn process_block<'a, O>(&mut self, inputs: &BlockInputs<'_>, outputs: O) -> SourceBank
    where
        O: IntoIterator<Item = &'a mut [u8]>,
    {
        debug_assert_eq!(inputs.primary.len(), inputs.secondary.len());

        self.detect(inputs);

        let bank = self.state.active_bank();
        let source = match bank {
            SourceBank::Primary => inputs.primary,
            SourceBank::Secondary => inputs.secondary,
        };

        let mut copied = 0;
        for (dst, src) in outputs.into_iter().zip(source.iter()) {
            dst.copy_from_slice(src);
            copied += 1;
        }
        debug_assert_eq!(copied, source.len());

        if let Some(hook) = self.on_output_ready.as_mut() {
            hook();
        }

        bank
    }

    fn detect(&mut self, inputs: &BlockInputs<'_>) {
        match self.policy {
            FailoverPolicy::Latching => {
                if self.state.failed_over() {
                    return;
                }
                if self.primary_dead_secondary_live(inputs) {
                    self.state.set_failed_over(true);
                    self.emit(EngineEvent::FailoverEngaged);
                }
            }
            FailoverPolicy::Reevaluate => {
                let was = self.state.failed_over();
                let now = self.primary_dead_secondary_live(inputs);
                if now != was {
                    self.state.set_failed_over(now);
                    self.emit(if now {
                        EngineEvent::FailoverEngaged
                    } else {
                        EngineEvent::FailoverCleared
                    });
                }
            }
        }
    }

    fn primary_dead_secondary_live(&mut self, inputs: &BlockInputs<'_>) -> bool {
        self.primary_presence.is_silent(inputs.primary_pilot)
            && !self.secondary_presence.is_silent(inputs.secondary_pilot)
    }

    fn emit(&mut self, event: EngineEvent) {
        if let Some(events) = self.events.as_mut() {
            let _ = events.push(event);
        }
    }
}
