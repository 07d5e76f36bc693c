//! Runtime configuration for baton
//!
//! Configuration is stored as YAML in the user's config directory.
//! Default location: ~/.config/baton/config.yaml
//!
//! ```yaml
//! midi:
//!   port_match: "NUCMidi"
//!   indicator:
//!     port_match: "NUCMidi"
//!     channel: 0
//!     note: 16
//! audio:
//!   client_name: "baton"
//!   capture_client: "dante"
//!   playback_client: "dante"
//! failover:
//!   policy: latching
//!   debounce_blocks: 1
//! ```

use std::path::{Path, PathBuf};

use baton_core::audio::AudioSetup;
use baton_core::detect::{Debounce, PilotWindow, SignalPresence};
use baton_core::FailoverPolicy;
use baton_midi::{ControlMessage, TriggerStore};
use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatonConfig {
    /// Control surface settings
    pub midi: MidiConfig,
    /// Audio server settings
    pub audio: AudioConfig,
    /// Failover detection behavior
    pub failover: FailoverConfig,
    /// Where the learned trigger is persisted
    /// Default: ~/.config/baton/trigger.yaml
    pub trigger_path: PathBuf,
}

impl Default for BatonConfig {
    fn default() -> Self {
        Self {
            midi: MidiConfig::default(),
            audio: AudioConfig::default(),
            failover: FailoverConfig::default(),
            trigger_path: TriggerStore::default_path(),
        }
    }
}

/// MIDI section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiConfig {
    /// Substring matched against input port names, case-insensitive
    pub port_match: String,
    /// Optional status lamp; omit to run without one
    pub indicator: Option<IndicatorConfig>,
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            // Name the rig's USB adapter shows up under
            port_match: "NUCMidi".to_string(),
            indicator: None,
        }
    }
}

/// Status lamp, addressed as a note-on pair. The off state is a note-on
/// with the off velocity, which most surfaces treat as lamp-dark.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorConfig {
    /// Substring matched against output port names
    pub port_match: String,
    /// MIDI channel 0-15
    #[serde(default)]
    pub channel: u8,
    /// Note number of the lamp
    pub note: u8,
    /// Velocity sent while the secondary is on air
    #[serde(default = "default_on_value")]
    pub on_value: u8,
    /// Velocity sent while the primary is on air
    #[serde(default)]
    pub off_value: u8,
}

fn default_on_value() -> u8 {
    127
}

impl IndicatorConfig {
    pub fn on_message(&self) -> ControlMessage {
        self.note_on(self.on_value)
    }

    pub fn off_message(&self) -> ControlMessage {
        self.note_on(self.off_value)
    }

    fn note_on(&self, velocity: u8) -> ControlMessage {
        ControlMessage([0x90 | (self.channel & 0x0F), self.note & 0x7F, velocity & 0x7F])
    }
}

/// Audio section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Client name registered with the JACK server
    pub client_name: String,
    /// Client whose outputs feed the 64 inputs, 1:1 by index
    pub capture_client: Option<String>,
    /// Client whose inputs take the 31 outputs, 1:1 by index
    pub playback_client: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            client_name: "baton".to_string(),
            capture_client: None,
            playback_client: None,
        }
    }
}

impl From<&AudioConfig> for AudioSetup {
    fn from(config: &AudioConfig) -> Self {
        Self {
            client_name: config.client_name.clone(),
            capture_client: config.capture_client.clone(),
            playback_client: config.playback_client.clone(),
        }
    }
}

/// Failover section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FailoverConfig {
    /// What happens once detection has switched away from the primary
    pub policy: PolicySetting,
    /// Consecutive silent blocks required before switching (1 = immediate)
    pub debounce_blocks: u32,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            policy: PolicySetting::Latching,
            // One block is already ~2.7ms at 48kHz/128
            debounce_blocks: 1,
        }
    }
}

impl FailoverConfig {
    /// Fresh detection rules, one per pilot so debounce streaks stay
    /// independent.
    pub fn presence_rules(&self) -> (Box<dyn SignalPresence>, Box<dyn SignalPresence>) {
        (self.rule(), self.rule())
    }

    fn rule(&self) -> Box<dyn SignalPresence> {
        if self.debounce_blocks > 1 {
            Box::new(Debounce::new(PilotWindow, self.debounce_blocks))
        } else {
            Box::new(PilotWindow)
        }
    }
}

/// Serialized form of the failover policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicySetting {
    Latching,
    Reevaluate,
}

impl From<PolicySetting> for FailoverPolicy {
    fn from(setting: PolicySetting) -> Self {
        match setting {
            PolicySetting::Latching => FailoverPolicy::Latching,
            PolicySetting::Reevaluate => FailoverPolicy::Reevaluate,
        }
    }
}

/// Get the default config file path
///
/// Returns: ~/.config/baton/config.yaml
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join("baton")
        .join("config.yaml")
}

/// Load configuration from a YAML file
///
/// If the file doesn't exist, returns default config.
/// If the file exists but is invalid, logs a warning and returns default config.
pub fn load_config(path: &Path) -> BatonConfig {
    log::info!("load_config: Loading from {:?}", path);

    if !path.exists() {
        log::info!("load_config: Config file doesn't exist, using defaults");
        return BatonConfig::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<BatonConfig>(&contents) {
            Ok(config) => {
                log::info!(
                    "load_config: Loaded config - port match: '{}', policy: {:?}, debounce: {} block(s)",
                    config.midi.port_match,
                    config.failover.policy,
                    config.failover.debounce_blocks
                );
                config
            }
            Err(e) => {
                log::warn!("load_config: Failed to parse config: {}, using defaults", e);
                BatonConfig::default()
            }
        },
        Err(e) => {
            log::warn!(
                "load_config: Failed to read config file: {}, using defaults",
                e
            );
            BatonConfig::default()
        }
    }
}
