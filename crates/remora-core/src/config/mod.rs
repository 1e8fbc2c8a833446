//! Persistent settings store under the host-provided storage root.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;

/// Relative location of the settings file under the storage root.
pub const SETTINGS_FILE: &str = "remora/settings.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Enables the in-game debug overlay.
    pub debug: bool,
    /// Bring up the network session once gameplay is active.
    pub online: bool,
    pub nickname: String,
    pub server_host: String,
    pub server_port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: false,
            online: false,
            nickname: "player".to_string(),
            server_host: "127.0.0.1".to_string(),
            server_port: 7777,
        }
    }
}

impl Settings {
    pub fn load(root: &Path) -> Result<Self> {
        let content = fs::read_to_string(root.join(SETTINGS_FILE))?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Load from the storage root, falling back to defaults on a missing
    /// or unreadable file.
    pub fn load_or_default(root: &Path) -> Self {
        match Self::load(root) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Failed to load settings: {}, using defaults", e);
                Self::default()
            }
        }
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = root.join(SETTINGS_FILE);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// True when the configuration points at an online session.
    pub fn wants_online(&self) -> bool {
        self.online && !self.server_host.is_empty()
    }
}
