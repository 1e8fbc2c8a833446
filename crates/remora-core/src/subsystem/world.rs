//! Wrapper around the patched game session state.

use tracing::debug;

use super::Subsystem;

/// The gameplay-facing side of the target module.
///
/// Menu and in-game bring-up are one-shot; the counters let the owner
/// verify that stage guards held (each init observed exactly once).
#[derive(Debug, Default)]
pub struct GameWorld {
    menu_inits: u32,
    game_inits: u32,
    max_stats_applied: bool,
    local_player: Option<String>,
}

impl GameWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frontend resources are available; prime menu-side state.
    pub fn init_in_menu(&mut self) {
        self.menu_inits += 1;
        debug!("world: menu init");
    }

    /// A gameplay session is live; prime in-game state.
    pub fn init_in_game(&mut self) {
        self.game_inits += 1;
        debug!("world: in-game init");
    }

    /// Max out the bootstrap player stats.
    pub fn set_max_stats(&mut self) {
        self.max_stats_applied = true;
    }

    /// Spawn the local diagnostic player used for offline testing.
    pub fn spawn_local_player(&mut self, nickname: &str) {
        if self.local_player.is_none() {
            self.local_player = Some(nickname.to_string());
            debug!(nickname, "world: local player spawned");
        }
    }

    pub fn menu_inits(&self) -> u32 {
        self.menu_inits
    }

    pub fn game_inits(&self) -> u32 {
        self.game_inits
    }

    pub fn max_stats_applied(&self) -> bool {
        self.max_stats_applied
    }

    pub fn local_player(&self) -> Option<&str> {
        self.local_player.as_deref()
    }
}

impl Subsystem for GameWorld {
    fn name(&self) -> &'static str {
        "world"
    }
}
