//! Trigger persistence
//!
//! One small YAML document holding the learned trigger bytes. Loads
//! degrade to the unset trigger; saves go through a temp file and an
//! atomic rename so a torn write can never corrupt the stored trigger.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::wire::ControlMessage;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TriggerDoc {
    trigger: [u8; 3],
}

/// Where the learned trigger lives between runs.
pub struct TriggerStore {
    path: PathBuf,
}

impl TriggerStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Default location: `~/.config/baton/trigger.yaml`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("baton")
            .join("trigger.yaml")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing or unreadable file degrades to the unset trigger, which
    /// matches nothing until a learn session replaces it.
    pub fn load(&self) -> ControlMessage {
        if !self.path.exists() {
            log::info!("No trigger learned yet ({})", self.path.display());
            return ControlMessage::UNSET;
        }

        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) => {
                log::warn!("Failed to read {}: {}", self.path.display(), e);
                return ControlMessage::UNSET;
            }
        };

        match serde_yaml::from_str::<TriggerDoc>(&contents) {
            Ok(doc) => {
                let message = ControlMessage(doc.trigger);
                log::info!("Loaded trigger {} from {}", message, self.path.display());
                message
            }
            Err(e) => {
                log::warn!("Trigger file is malformed ({}), starting unset", e);
                ControlMessage::UNSET
            }
        }
    }

    /// Atomic replace. Failures propagate; the caller decides what to do
    /// with the in-memory trigger.
    pub fn save(&self, message: ControlMessage) -> Result<()> {
        let dir = self.path.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create trigger directory {:?}", dir))?;

        let doc = TriggerDoc {
            trigger: message.bytes(),
        };
        let yaml = serde_yaml::to_string(&doc).context("Failed to serialize trigger")?;

        let mut file = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temp file in {:?}", dir))?;
        file.write_all(yaml.as_bytes())
            .context("Failed to write trigger")?;
        file.persist(&self.path)
            .with_context(|| format!("Failed to replace {:?}", self.path))?;

        log::info!("Trigger {} saved to {}", message, self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = TriggerStore::new(dir.path().join("trigger.yaml"));

        store.save(ControlMessage([0x90, 16, 127])).unwrap();
        assert_eq!(store.load(), ControlMessage([0x90, 16, 127]));
    }

    #[test]
    fn test_missing_file_loads_unset() {
        let dir = tempfile::tempdir().unwrap();
        let store = TriggerStore::new(dir.path().join("absent.yaml"));

        assert!(store.load().is_unset());
    }

    #[test]
    fn test_malformed_file_loads_unset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trigger.yaml");
        fs::write(&path, "trigger: [not, numbers, at all\n").unwrap();

        assert!(TriggerStore::new(path).load().is_unset());
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = TriggerStore::new(dir.path().join("a").join("b").join("trigger.yaml"));

        store.save(ControlMessage([0xB0, 1, 2])).unwrap();
        assert_eq!(store.load(), ControlMessage([0xB0, 1, 2]));
    }

    #[test]
    fn test_save_replaces_existing_trigger() {
        let dir = tempfile::tempdir().unwrap();
        let store = TriggerStore::new(dir.path().join("trigger.yaml"));

        store.save(ControlMessage([0x90, 16, 127])).unwrap();
        store.save(ControlMessage([0xB0, 7, 64])).unwrap();
        assert_eq!(store.load(), ControlMessage([0xB0, 7, 64]));
    }
}
