//! Inbound control capture
//!
//! midir invokes the callback on its own thread. The callback does the
//! minimum (length gate, bounded try_send) and the control watcher does
//! everything else at its own pace.

use flume::{Receiver, Sender};
use midir::MidiInputConnection;

use crate::connection::{self, ConnectionError};
use crate::wire::ControlMessage;

/// Depth of the queue between the transport callback and the watcher.
/// Control surfaces emit a handful of messages per second; 64 absorbs
/// any realistic burst.
pub const QUEUE_CAPACITY: usize = 64;

/// Owns the live input connection. Dropping it closes the port, which
/// hangs up the channel and the watcher reads that as shutdown.
pub struct ControlInput {
    _connection: MidiInputConnection<Sender<ControlMessage>>,
    port_name: String,
}

impl ControlInput {
    /// Connect to the first input port matching `port_match` and start
    /// forwarding complete messages.
    pub fn connect(port_match: &str) -> Result<(Self, Receiver<ControlMessage>), ConnectionError> {
        let (midi_in, port) = connection::find_input_port(port_match)?;
        let port_name = midi_in
            .port_name(&port)
            .map_err(|e| ConnectionError::PortInfo(e.to_string()))?;

        let (tx, rx) = flume::bounded(QUEUE_CAPACITY);
        let conn = midi_in
            .connect(&port, "baton-control-in", forward_message, tx)
            .map_err(|e| ConnectionError::Connect {
                port: port_name.clone(),
                reason: e.to_string(),
            })?;

        log::info!("Control input connected: {}", port_name);
        Ok((
            Self {
                _connection: conn,
                port_name,
            },
            rx,
        ))
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

/// Runs on the transport's thread; must never block.
fn forward_message(_timestamp: u64, raw: &[u8], tx: &mut Sender<ControlMessage>) {
    let Some(message) = ControlMessage::from_wire(raw) else {
        log::debug!("Ignoring {}-byte MIDI data", raw.len());
        return;
    };
    if tx.try_send(message).is_err() {
        log::warn!("Control queue full, dropping {}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_keeps_only_complete_messages() {
        let (mut tx, rx) = flume::bounded(4);

        forward_message(0, &[0x90, 60, 100], &mut tx);
        forward_message(1, &[0xC0, 5], &mut tx);
        forward_message(2, &[0xF0, 1, 2, 3, 0xF7], &mut tx);
        forward_message(3, &[], &mut tx);

        assert_eq!(rx.len(), 1);
        assert_eq!(rx.try_recv().unwrap(), ControlMessage([0x90, 60, 100]));
    }

    #[test]
    fn test_forward_drops_on_full_queue() {
        let (mut tx, rx) = flume::bounded(1);

        forward_message(0, &[0x90, 60, 100], &mut tx);
        forward_message(1, &[0x90, 60, 101], &mut tx);

        assert_eq!(rx.len(), 1);
        assert_eq!(rx.try_recv().unwrap(), ControlMessage([0x90, 60, 100]));
    }
}
