//! MIDI port discovery
//!
//! Ports are matched by case-insensitive substring against their system
//! name, so "nano" finds "nanoKONTROL2 MIDI 1" regardless of how the OS
//! decorates it.

use midir::{MidiInput, MidiInputPort, MidiOutput, MidiOutputPort};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Failed to initialize MIDI input: {0}")]
    InputInit(String),

    #[error("Failed to initialize MIDI output: {0}")]
    OutputInit(String),

    #[error("No MIDI input ports available")]
    NoInputPorts,

    #[error("No MIDI output ports available")]
    NoOutputPorts,

    #[error("No MIDI port found matching '{0}'")]
    PortNotFound(String),

    #[error("Failed to get MIDI port info: {0}")]
    PortInfo(String),

    #[error("Failed to connect to MIDI port '{port}': {reason}")]
    Connect { port: String, reason: String },
}

/// Find the first input port whose name contains `pattern`.
pub fn find_input_port(pattern: &str) -> Result<(MidiInput, MidiInputPort), ConnectionError> {
    let midi_in =
        MidiInput::new("baton").map_err(|e| ConnectionError::InputInit(e.to_string()))?;

    let ports = midi_in.ports();
    if ports.is_empty() {
        return Err(ConnectionError::NoInputPorts);
    }

    let wanted = pattern.to_lowercase();
    for port in ports {
        let name = midi_in
            .port_name(&port)
            .map_err(|e| ConnectionError::PortInfo(e.to_string()))?;
        if name.to_lowercase().contains(&wanted) {
            log::debug!("Matched input port: {}", name);
            return Ok((midi_in, port));
        }
    }

    Err(ConnectionError::PortNotFound(pattern.to_string()))
}

/// Find the first output port whose name contains `pattern`.
pub fn find_output_port(pattern: &str) -> Result<(MidiOutput, MidiOutputPort), ConnectionError> {
    let midi_out =
        MidiOutput::new("baton").map_err(|e| ConnectionError::OutputInit(e.to_string()))?;

    let ports = midi_out.ports();
    if ports.is_empty() {
        return Err(ConnectionError::NoOutputPorts);
    }

    let wanted = pattern.to_lowercase();
    for port in ports {
        let name = midi_out
            .port_name(&port)
            .map_err(|e| ConnectionError::PortInfo(e.to_string()))?;
        if name.to_lowercase().contains(&wanted) {
            log::debug!("Matched output port: {}", name);
            return Ok((midi_out, port));
        }
    }

    Err(ConnectionError::PortNotFound(pattern.to_string()))
}

/// Names of every input port currently visible, for diagnostics.
pub fn list_input_ports() -> Vec<String> {
    let Ok(midi_in) = MidiInput::new("baton-list") else {
        return Vec::new();
    };
    midi_in
        .ports()
        .iter()
        .filter_map(|port| midi_in.port_name(port).ok())
        .collect()
}

/// Names of every output port currently visible, for diagnostics.
pub fn list_output_ports() -> Vec<String> {
    let Ok(midi_out) = MidiOutput::new("baton-list") else {
        return Vec::new();
    };
    midi_out
        .ports()
        .iter()
        .filter_map(|port| midi_out.port_name(port).ok())
        .collect()
}
