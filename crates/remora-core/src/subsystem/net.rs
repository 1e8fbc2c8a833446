//! Network session and the server-connect browser window.

use strum::Display;
use tracing::debug;

use crate::config::Settings;
use crate::diag::NET_LOG;

use super::{ChatWindow, PlayerRoster, Subsystem};

/// Server-connect window. Hidden until the network stage reveals it.
#[derive(Debug, Default)]
pub struct ServerBrowser {
    visible: bool,
    ext_mode: bool,
}

impl ServerBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop any half-entered state from the menu stage.
    pub fn clear(&mut self) {
        self.ext_mode = false;
    }

    pub fn show(&mut self) {
        self.visible = true;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_ext_mode(&mut self, on: bool) {
        self.ext_mode = on;
    }

    pub fn ext_mode(&self) -> bool {
        self.ext_mode
    }
}

impl Subsystem for ServerBrowser {
    fn name(&self) -> &'static str {
        "server-browser"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum NetState {
    #[strum(serialize = "connecting")]
    Connecting,
    #[strum(serialize = "connected")]
    Connected,
}

/// Active network session. Constructed only when the configuration
/// indicates an online session.
#[derive(Debug)]
pub struct NetSession {
    endpoint: String,
    nickname: String,
    state: NetState,
    processed: u64,
}

impl NetSession {
    pub fn connect(settings: &Settings) -> Self {
        let endpoint = format!("{}:{}", settings.server_host, settings.server_port);
        NET_LOG.write(&format!("session open: {endpoint}"));
        Self {
            endpoint,
            nickname: settings.nickname.clone(),
            state: NetState::Connecting,
            processed: 0,
        }
    }

    /// Per-tick processing: drain inbound traffic, surface join events.
    pub fn process(&mut self, chat: &mut ChatWindow, roster: &mut PlayerRoster) {
        self.processed += 1;
        if self.state == NetState::Connecting {
            self.state = NetState::Connected;
            roster.upsert(0, self.nickname.clone());
            chat.add_line(format!("connected to {}", self.endpoint));
            NET_LOG.write(&format!("link established: {}", self.endpoint));
            debug!(endpoint = %self.endpoint, "net session connected");
        }
    }

    pub fn state(&self) -> NetState {
        self.state
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }
}

impl Subsystem for NetSession {
    fn name(&self) -> &'static str {
        "net-session"
    }
}
