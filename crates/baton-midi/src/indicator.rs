//! Route status indicator
//!
//! Drives one lamp on the control surface so the operator can see which
//! computer is on air without looking at a screen. Sends only on changes;
//! the wire stays quiet while the route is steady.

use baton_core::SourceBank;
use midir::MidiOutputConnection;

use crate::connection::{self, ConnectionError};
use crate::wire::ControlMessage;

/// Decides when an observed route needs an outbound message. Split from
/// the port so the edge logic is testable without hardware.
#[derive(Debug, Default)]
pub struct EdgeTracker {
    last: Option<SourceBank>,
}

impl EdgeTracker {
    /// Some(bank) when this observation differs from the last one sent.
    /// The first observation always reports, so a fresh connection shows
    /// the current route immediately.
    pub fn observe(&mut self, bank: SourceBank) -> Option<SourceBank> {
        if self.last == Some(bank) {
            None
        } else {
            self.last = Some(bank);
            Some(bank)
        }
    }
}

/// A connected indicator lamp.
pub struct StatusIndicator {
    connection: MidiOutputConnection,
    on_message: ControlMessage,
    off_message: ControlMessage,
    tracker: EdgeTracker,
}

impl StatusIndicator {
    /// `on_message` lights the lamp while the secondary is on air,
    /// `off_message` darkens it for the primary.
    pub fn connect(
        port_match: &str,
        on_message: ControlMessage,
        off_message: ControlMessage,
    ) -> Result<Self, ConnectionError> {
        let (midi_out, port) = connection::find_output_port(port_match)?;
        let port_name = midi_out
            .port_name(&port)
            .map_err(|e| ConnectionError::PortInfo(e.to_string()))?;
        let connection = midi_out
            .connect(&port, "baton-status")
            .map_err(|e| ConnectionError::Connect {
                port: port_name.clone(),
                reason: e.to_string(),
            })?;

        log::info!("Status indicator connected: {}", port_name);
        Ok(Self {
            connection,
            on_message,
            off_message,
            tracker: EdgeTracker::default(),
        })
    }

    /// Called once per watcher poll; sends only when the route changed.
    pub fn refresh(&mut self, bank: SourceBank) {
        let Some(bank) = self.tracker.observe(bank) else {
            return;
        };
        let message = match bank {
            SourceBank::Primary => self.off_message,
            SourceBank::Secondary => self.on_message,
        };
        match self.connection.send(&message.bytes()) {
            Ok(()) => log::debug!("Status indicator: {}", bank),
            Err(e) => log::warn!("Failed to send status message: {}", e),
        }
    }
}

/// Leave the lamp dark when the cycle tears down.
impl Drop for StatusIndicator {
    fn drop(&mut self) {
        let _ = self.connection.send(&self.off_message.bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_observation_always_reports() {
        let mut tracker = EdgeTracker::default();
        assert_eq!(tracker.observe(SourceBank::Primary), Some(SourceBank::Primary));
    }

    #[test]
    fn test_steady_route_stays_quiet() {
        let mut tracker = EdgeTracker::default();
        tracker.observe(SourceBank::Primary);
        assert_eq!(tracker.observe(SourceBank::Primary), None);
        assert_eq!(tracker.observe(SourceBank::Primary), None);
    }

    #[test]
    fn test_each_flip_reports_once() {
        let mut tracker = EdgeTracker::default();
        tracker.observe(SourceBank::Primary);
        assert_eq!(
            tracker.observe(SourceBank::Secondary),
            Some(SourceBank::Secondary)
        );
        assert_eq!(tracker.observe(SourceBank::Secondary), None);
        assert_eq!(tracker.observe(SourceBank::Primary), Some(SourceBank::Primary));
    }
}
