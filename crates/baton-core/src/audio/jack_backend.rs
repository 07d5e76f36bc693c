//! Native JACK audio backend
//!
//! Registers the full unified frame as JACK ports and runs the failover
//! engine from the process callback. Dante (or any other transport) shows
//! up as a JACK client on the rig, so "device setup" here means reaching
//! the server and wiring ports.
//!
//! # Architecture
//!
//! ```text
//! primary_01..31  ──┐
//! primary_pilot   ──┤                       ┌── out_01..31
//! secondary_01..31──┼─► JackProcessor ──────┤
//! secondary_pilot ──┘   (owns the engine)   └── ASIO-style output-ready:
//!                                                not used by JACK
//! ```
//!
//! Port slices are `f32`; the engine works on raw bytes, so the callback
//! hands it zero-copy byte views of the same buffers.

use std::sync::Arc;
use std::time::Duration;

use jack::{AudioIn, AudioOut, Client, ClientOptions, Control, Port, ProcessScope};

use super::error::{AudioError, AudioResult};
use super::AudioSetup;
use crate::detect::PILOT_WINDOW;
use crate::layout::{
    ChannelLayout, BANK_CHANNELS, INPUT_CHANNELS, OUTPUT_CHANNELS, PRIMARY_PILOT, SECONDARY_FIRST,
    SECONDARY_PILOT,
};
use crate::router::{BlockInputs, FailoverEngine};
use crate::state::SwitchState;

/// Keeps the JACK client active. Drop this to stop routing.
pub struct AudioHandle {
    _async_client: jack::AsyncClient<JackNotifications, JackProcessor>,
}

/// JACK process handler
///
/// Owns the FailoverEngine exclusively; the callback shares nothing but
/// the relaxed atomics inside `SwitchState`.
struct JackProcessor {
    primary: Vec<Port<AudioIn>>,
    primary_pilot: Port<AudioIn>,
    secondary: Vec<Port<AudioIn>>,
    secondary_pilot: Port<AudioIn>,
    outputs: Vec<Port<AudioOut>>,
    engine: FailoverEngine,
}

impl jack::ProcessHandler for JackProcessor {
    fn process(&mut self, _client: &Client, ps: &ProcessScope) -> Control {
        let primary: [&[u8]; BANK_CHANNELS] =
            std::array::from_fn(|i| sample_bytes(self.primary[i].as_slice(ps)));
        let secondary: [&[u8]; BANK_CHANNELS] =
            std::array::from_fn(|i| sample_bytes(self.secondary[i].as_slice(ps)));

        let inputs = BlockInputs {
            primary: &primary,
            primary_pilot: sample_bytes(self.primary_pilot.as_slice(ps)),
            secondary: &secondary,
            secondary_pilot: sample_bytes(self.secondary_pilot.as_slice(ps)),
        };

        self.engine.process_block(
            &inputs,
            self.outputs
                .iter_mut()
                .map(|port| sample_bytes_mut(port.as_mut_slice(ps))),
        );

        Control::Continue
    }
}

/// JACK notification handler
struct JackNotifications {
    state: Arc<SwitchState>,
}

impl jack::NotificationHandler for JackNotifications {
    unsafe fn shutdown(&mut self, _status: jack::ClientStatus, reason: &str) {
        // Raising halt sends the supervisor back into the server retry loop.
        log::error!("JACK server shut down: {}", reason);
        self.state.request_halt();
    }

    fn sample_rate(&mut self, _client: &Client, srate: jack::Frames) -> Control {
        log::info!("JACK sample rate changed to: {}", srate);
        Control::Continue
    }

    fn xrun(&mut self, _client: &Client) -> Control {
        log::warn!("JACK xrun detected");
        Control::Continue
    }
}

#[inline]
fn sample_bytes(samples: &[f32]) -> &[u8] {
    bytemuck::cast_slice(samples)
}

#[inline]
fn sample_bytes_mut(samples: &mut [f32]) -> &mut [u8] {
    bytemuck::cast_slice_mut(samples)
}

/// Start the JACK audio system
///
/// Blocks until the server is reachable (fixed-delay retry, one warning per
/// attempt), then registers the frame's ports, validates the geometry and
/// activates the callback. Errors past the retry loop are real setup
/// failures and propagate.
pub fn start_audio_system(
    setup: &AudioSetup,
    engine: FailoverEngine,
    server_retry: Duration,
) -> AudioResult<AudioHandle> {
    let client = wait_for_server(&setup.client_name, server_retry);
    // JACK may rename us if another client took the name
    let actual_name = client.name().to_string();

    let layout = ChannelLayout::new(client.buffer_size() as usize, std::mem::size_of::<f32>())?;
    log::info!(
        "JACK client '{}' up: {} Hz, {} frames per block, {} inputs / {} outputs",
        actual_name,
        client.sample_rate(),
        layout.block_len,
        INPUT_CHANNELS,
        OUTPUT_CHANNELS
    );
    if layout.block_bytes() < PILOT_WINDOW {
        log::warn!(
            "Blocks are only {} bytes per channel, pilot window shrinks from {} bytes",
            layout.block_bytes(),
            PILOT_WINDOW
        );
    }

    let mut primary = Vec::with_capacity(BANK_CHANNELS);
    for index in 0..BANK_CHANNELS {
        primary.push(register_input(&client, &input_port_name(index))?);
    }
    let primary_pilot = register_input(&client, &input_port_name(PRIMARY_PILOT))?;

    let mut secondary = Vec::with_capacity(BANK_CHANNELS);
    for index in 0..BANK_CHANNELS {
        secondary.push(register_input(&client, &input_port_name(SECONDARY_FIRST + index))?);
    }
    let secondary_pilot = register_input(&client, &input_port_name(SECONDARY_PILOT))?;

    let mut outputs = Vec::with_capacity(OUTPUT_CHANNELS);
    for index in 0..OUTPUT_CHANNELS {
        outputs.push(register_output(&client, &output_port_name(index))?);
    }

    ChannelLayout::validate_channel_counts(
        primary.len() + secondary.len() + 2,
        outputs.len(),
    )?;

    let notifications = JackNotifications {
        state: Arc::clone(engine.state()),
    };
    let processor = JackProcessor {
        primary,
        primary_pilot,
        secondary,
        secondary_pilot,
        outputs,
        engine,
    };

    let async_client = client
        .activate_async(notifications, processor)
        .map_err(|e| AudioError::Activation(e.to_string()))?;

    log::info!("Routing callback active");

    if setup.capture_client.is_some() || setup.playback_client.is_some() {
        if let Err(e) = auto_connect(
            &actual_name,
            setup.capture_client.as_deref(),
            setup.playback_client.as_deref(),
        ) {
            log::warn!("Auto-connect failed: {}", e);
        }
    }

    Ok(AudioHandle {
        _async_client: async_client,
    })
}

fn wait_for_server(client_name: &str, retry: Duration) -> Client {
    loop {
        match Client::new(client_name, ClientOptions::NO_START_SERVER) {
            Ok((client, _status)) => return client,
            Err(e) => {
                log::warn!("Audio server unavailable ({}), retrying in {:?}", e, retry);
                std::thread::sleep(retry);
            }
        }
    }
}

fn register_input(client: &Client, name: &str) -> AudioResult<Port<AudioIn>> {
    client
        .register_port(name, AudioIn::default())
        .map_err(|e| AudioError::PortRegistration {
            name: name.to_string(),
            reason: e.to_string(),
        })
}

fn register_output(client: &Client, name: &str) -> AudioResult<Port<AudioOut>> {
    client
        .register_port(name, AudioOut::default())
        .map_err(|e| AudioError::PortRegistration {
            name: name.to_string(),
            reason: e.to_string(),
        })
}

/// Port names follow the unified index order.
fn input_port_name(index: usize) -> String {
    match index {
        PRIMARY_PILOT => "primary_pilot".to_string(),
        SECONDARY_PILOT => "secondary_pilot".to_string(),
        i if i < PRIMARY_PILOT => format!("primary_{:02}", i + 1),
        i => format!("secondary_{:02}", i - SECONDARY_FIRST + 1),
    }
}

fn output_port_name(index: usize) -> String {
    format!("out_{:02}", index + 1)
}

/// Wire our frame to the configured capture and playback clients, 1:1 by
/// index. Missing ports and failed connections are warnings; the engine
/// runs either way and connections can be fixed from any JACK patchbay.
fn auto_connect(
    client_name: &str,
    capture: Option<&str>,
    playback: Option<&str>,
) -> AudioResult<()> {
    // Temporary client: the active client is owned by the callback now.
    let (client, _) = Client::new(
        &format!("{}_connect", client_name),
        ClientOptions::NO_START_SERVER,
    )
    .map_err(|e| AudioError::ServerUnavailable(e.to_string()))?;

    if let Some(capture) = capture {
        let sources = sorted_ports(&client, capture, jack::PortFlags::IS_OUTPUT);
        if sources.len() < INPUT_CHANNELS {
            log::warn!(
                "Capture client '{}' exposes {} ports, frame needs {}",
                capture,
                sources.len(),
                INPUT_CHANNELS
            );
        }
        for (index, source) in sources.iter().take(INPUT_CHANNELS).enumerate() {
            let ours = format!("{}:{}", client_name, input_port_name(index));
            if let Err(e) = client.connect_ports_by_name(source, &ours) {
                log::warn!("Could not connect {} -> {}: {}", source, ours, e);
            }
        }
        log::info!(
            "Connected {} capture ports from '{}'",
            sources.len().min(INPUT_CHANNELS),
            capture
        );
    }

    if let Some(playback) = playback {
        let sinks = sorted_ports(&client, playback, jack::PortFlags::IS_INPUT);
        if sinks.len() < OUTPUT_CHANNELS {
            log::warn!(
                "Playback client '{}' exposes {} ports, frame needs {}",
                playback,
                sinks.len(),
                OUTPUT_CHANNELS
            );
        }
        for (index, sink) in sinks.iter().take(OUTPUT_CHANNELS).enumerate() {
            let ours = format!("{}:{}", client_name, output_port_name(index));
            if let Err(e) = client.connect_ports_by_name(&ours, sink) {
                log::warn!("Could not connect {} -> {}: {}", ours, sink, e);
            }
        }
        log::info!(
            "Connected {} playback ports on '{}'",
            sinks.len().min(OUTPUT_CHANNELS),
            playback
        );
    }

    Ok(())
}

/// Ports of one client, in numeric order. A plain sort puts `playback_10`
/// before `playback_2`, which would scramble the channel map.
fn sorted_ports(client: &Client, owner: &str, flags: jack::PortFlags) -> Vec<String> {
    let mut ports = client.ports(Some(&format!("^{}:", owner)), None, flags);
    ports.sort();
    ports.sort_by_key(|name| trailing_number(name).unwrap_or(u32::MAX));
    ports
}

fn trailing_number(name: &str) -> Option<u32> {
    let prefix = name.trim_end_matches(|c: char| c.is_ascii_digit());
    name[prefix.len()..].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_port_names_follow_unified_order() {
        assert_eq!(input_port_name(0), "primary_01");
        assert_eq!(input_port_name(30), "primary_31");
        assert_eq!(input_port_name(31), "primary_pilot");
        assert_eq!(input_port_name(32), "secondary_01");
        assert_eq!(input_port_name(62), "secondary_31");
        assert_eq!(input_port_name(63), "secondary_pilot");
        assert_eq!(output_port_name(0), "out_01");
        assert_eq!(output_port_name(30), "out_31");
    }

    #[test]
    fn test_trailing_number() {
        assert_eq!(trailing_number("dante:playback_12"), Some(12));
        assert_eq!(trailing_number("dante:out_FL"), None);
        assert_eq!(trailing_number("7"), Some(7));
    }
}
