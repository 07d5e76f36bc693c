//! Control messages on the wire
//!
//! The whole control vocabulary is one 3-byte MIDI message, compared for
//! byte equality against the learned trigger. Nothing here interprets MIDI
//! semantics for matching; midly only decodes messages for humans reading
//! logs and the console.

use std::fmt;

use midly::live::LiveEvent;
use midly::MidiMessage;

/// Control messages are exactly this long.
pub const MESSAGE_LEN: usize = 3;

/// One complete 3-byte control message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlMessage(pub [u8; 3]);

impl ControlMessage {
    /// The not-yet-learned placeholder. Matches no inbound message; MIDI
    /// never puts a zero status byte on the wire.
    pub const UNSET: ControlMessage = ControlMessage([0; 3]);

    /// Accept exactly one complete 3-byte message. Shorter messages
    /// (program change), longer ones (sysex) and fragments are not part
    /// of the control vocabulary and are dropped silently upstream.
    pub fn from_wire(raw: &[u8]) -> Option<Self> {
        match raw {
            &[a, b, c] => Some(Self([a, b, c])),
            _ => None,
        }
    }

    pub fn bytes(&self) -> [u8; 3] {
        self.0
    }

    pub fn is_unset(&self) -> bool {
        self.0 == [0; 3]
    }

    /// Human-readable decode, if the bytes are a channel voice message.
    fn decode(&self) -> Option<String> {
        match LiveEvent::parse(&self.0) {
            Ok(LiveEvent::Midi { channel, message }) => Some(match message {
                MidiMessage::NoteOn { key, vel } => format!(
                    "note-on ch{} key{} vel{}",
                    channel.as_int(),
                    key.as_int(),
                    vel.as_int()
                ),
                MidiMessage::NoteOff { key, vel } => format!(
                    "note-off ch{} key{} vel{}",
                    channel.as_int(),
                    key.as_int(),
                    vel.as_int()
                ),
                MidiMessage::Controller { controller, value } => format!(
                    "cc{} ch{} val{}",
                    controller.as_int(),
                    channel.as_int(),
                    value.as_int()
                ),
                other => format!("{:?} ch{}", other, channel.as_int()),
            }),
            _ => None,
        }
    }
}

impl From<[u8; 3]> for ControlMessage {
    fn from(bytes: [u8; 3]) -> Self {
        Self(bytes)
    }
}

impl From<ControlMessage> for [u8; 3] {
    fn from(message: ControlMessage) -> [u8; 3] {
        message.0
    }
}

impl fmt::Display for ControlMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:02X} {:02X} {:02X}]", self.0[0], self.0[1], self.0[2])?;
        if let Some(decoded) = self.decode() {
            write!(f, " {}", decoded)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_wire_takes_only_three_bytes() {
        assert_eq!(
            ControlMessage::from_wire(&[0x90, 60, 100]),
            Some(ControlMessage([0x90, 60, 100]))
        );
        // Program change is two bytes
        assert_eq!(ControlMessage::from_wire(&[0xC0, 5]), None);
        // Sysex and anything longer
        assert_eq!(ControlMessage::from_wire(&[0xF0, 1, 2, 3, 0xF7]), None);
        assert_eq!(ControlMessage::from_wire(&[]), None);
    }

    #[test]
    fn test_unset_is_all_zero() {
        assert!(ControlMessage::UNSET.is_unset());
        assert!(!ControlMessage([0x90, 0, 0]).is_unset());
    }

    #[test]
    fn test_display_decodes_note_on() {
        let text = ControlMessage([0x90, 60, 100]).to_string();
        assert!(text.contains("[90 3C 64]"), "{}", text);
        assert!(text.contains("note-on ch0 key60 vel100"), "{}", text);
    }

    #[test]
    fn test_display_decodes_control_change() {
        let text = ControlMessage([0xB3, 16, 127]).to_string();
        assert!(text.contains("cc16 ch3 val127"), "{}", text);
    }

    #[test]
    fn test_display_falls_back_to_hex_for_junk() {
        let text = ControlMessage::UNSET.to_string();
        assert_eq!(text, "[00 00 00]");
    }
}
