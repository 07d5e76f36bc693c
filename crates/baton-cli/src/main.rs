//! baton - automatic failover between two redundant playback computers
//!
//! The main thread is the supervisor. It:
//! 1. Loads config and the learned trigger
//! 2. Connects the control surface (fixed-delay retry) and the audio
//!    server, and spawns the control watcher
//! 3. Polls on a short sleep, draining detector events into the log,
//!    until halt is raised
//! 4. Tears the cycle down and either rebuilds it or exits
//!
//! ## Command line flags
//!
//! - `--config <path>`: use a specific config file instead of
//!   ~/.config/baton/config.yaml

mod config;
mod console;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use baton_core::audio::{start_audio_system, AudioSetup};
use baton_core::{EngineEvent, FailoverEngine, SwitchState};
use baton_midi::{
    learn_trigger, list_input_ports, spawn_watcher, ControlInput, LearnOutcome, StatusIndicator,
    TriggerStore, LEARN_TIMEOUT,
};
use flume::{Receiver, RecvTimeoutError, Sender, TryRecvError};

use config::BatonConfig;
use console::Command;

/// Fixed delay between scans while the control surface is absent.
const MIDI_RETRY: Duration = Duration::from_secs(3);
/// Fixed delay between audio server probes.
const AUDIO_RETRY: Duration = Duration::from_secs(1);
/// Supervisor poll period; bounds reaction time to halt and to commands.
const SUPERVISOR_POLL: Duration = Duration::from_millis(10);
/// Pause before rebuilding a cycle after halt.
const RESTART_DELAY: Duration = Duration::from_secs(1);
/// Detector edges waiting for the supervisor log. Edges are rare by
/// construction, so this never fills in practice.
const ENGINE_EVENT_CAPACITY: usize = 64;

/// How one cycle ended, decided by the stop flag at teardown.
enum CycleEnd {
    Restart,
    Stop,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    log::info!("baton starting up");

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                            baton                             ║");
    println!("║         failover router for redundant playback rigs         ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    let args: Vec<String> = std::env::args().collect();
    let config_path = args
        .windows(2)
        .find(|pair| pair[0] == "--config")
        .map(|pair| PathBuf::from(&pair[1]))
        .unwrap_or_else(config::default_config_path);
    let config = config::load_config(&config_path);

    let (commands, replies) = console::spawn_console();

    loop {
        match run_cycle(&config, &commands, &replies) {
            Ok(CycleEnd::Stop) => break,
            Ok(CycleEnd::Restart) => {
                log::info!("Cycle ended, rebuilding in {:?}", RESTART_DELAY);
                std::thread::sleep(RESTART_DELAY);
            }
            Err(e) => {
                log::error!("Cycle failed: {:#}", e);
                std::process::exit(1);
            }
        }
    }

    println!("baton stopped.");
}

/// Bring up one full cycle, run it until halt, tear it down.
///
/// Everything the cycle owns (audio handle, watcher, MIDI input, switch
/// state) is built here and dropped here; a restart starts from nothing
/// but the config and the persisted trigger.
fn run_cycle(
    config: &BatonConfig,
    commands: &Receiver<Command>,
    replies: &Sender<String>,
) -> Result<CycleEnd> {
    let store = TriggerStore::new(config.trigger_path.clone());
    let trigger = store.load();
    let state = Arc::new(SwitchState::new(trigger.bytes()));

    // The surface may be unplugged; scan until it shows up. The operator
    // can still stop or restart from the console while we wait.
    let (input, control_rx) = loop {
        match ControlInput::connect(&config.midi.port_match) {
            Ok(pair) => break pair,
            Err(e) => {
                log::warn!("Control surface unavailable ({}), retrying in {:?}", e, MIDI_RETRY);
                let available = list_input_ports();
                if !available.is_empty() {
                    log::debug!("Available MIDI inputs: {}", available.join(", "));
                }
                match commands.recv_timeout(MIDI_RETRY) {
                    Ok(Command::Stop) => return Ok(CycleEnd::Stop),
                    Ok(Command::Restart) => return Ok(CycleEnd::Restart),
                    Ok(Command::Learn) => {
                        let _ = replies.send("No control surface connected yet".to_string());
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => return Ok(CycleEnd::Stop),
                }
            }
        }
    };
    log::info!("Watching '{}' for the trigger message", input.port_name());

    let indicator = match &config.midi.indicator {
        Some(lamp) => match StatusIndicator::connect(
            &lamp.port_match,
            lamp.on_message(),
            lamp.off_message(),
        ) {
            Ok(indicator) => Some(indicator),
            Err(e) => {
                log::warn!("Status indicator unavailable ({}), continuing without it", e);
                None
            }
        },
        None => None,
    };

    let (event_tx, mut events) = rtrb::RingBuffer::new(ENGINE_EVENT_CAPACITY);
    let (primary_rule, secondary_rule) = config.failover.presence_rules();
    let engine = FailoverEngine::new(Arc::clone(&state))
        .with_policy(config.failover.policy.into())
        .with_presence(primary_rule, secondary_rule)
        .with_event_sink(event_tx);

    let setup = AudioSetup::from(&config.audio);
    let audio = start_audio_system(&setup, engine, AUDIO_RETRY)?;

    let watcher = spawn_watcher(Arc::clone(&state), control_rx.clone(), indicator);
    log::info!("Cycle up, routing {}", state.active_bank());

    while !state.halted() {
        while let Ok(event) = events.pop() {
            match event {
                EngineEvent::FailoverEngaged => log::warn!(
                    "FAILOVER: primary pilot lost with secondary live, routing {}",
                    state.active_bank()
                ),
                EngineEvent::FailoverCleared => {
                    log::info!("Primary pilot back, routing {}", state.active_bank())
                }
            }
        }

        match commands.try_recv() {
            Ok(Command::Learn) => {
                let reply = match learn_trigger(&state, &control_rx, &store, LEARN_TIMEOUT) {
                    Ok(LearnOutcome::Learned(message)) => format!("Learned trigger {}", message),
                    Ok(LearnOutcome::TimedOut) => {
                        "Learn timed out, trigger unchanged".to_string()
                    }
                    Err(e) => format!("Learn failed: {:#}", e),
                };
                let _ = replies.send(reply);
            }
            Ok(Command::Restart) => state.request_halt(),
            Ok(Command::Stop) => state.request_stop(),
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => state.request_stop(),
        }

        std::thread::sleep(SUPERVISOR_POLL);
    }

    log::info!("Cycle halting");
    // Stop the RT callback first, then the watcher, then close the port.
    drop(audio);
    watcher.join();
    drop(input);

    Ok(if state.stopped() {
        CycleEnd::Stop
    } else {
        CycleEnd::Restart
    })
}
