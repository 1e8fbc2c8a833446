//! Debug overlay, enabled through the `debug` setting.

use std::collections::VecDeque;

use super::{GameWorld, Subsystem};

const MESSAGE_CAPACITY: usize = 32;

/// On-screen diagnostic overlay.
///
/// Mirrors recent lifecycle events and, in offline debug sessions, spawns
/// the local test player.
#[derive(Debug, Default)]
pub struct DebugOverlay {
    messages: VecDeque<String>,
    ticks: u64,
}

impl DebugOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_message(&mut self, message: impl Into<String>) {
        if self.messages.len() == MESSAGE_CAPACITY {
            self.messages.pop_front();
        }
        self.messages.push_back(message.into());
    }

    /// Per-tick processing.
    pub fn process(&mut self, _world: &GameWorld) {
        self.ticks += 1;
    }

    pub fn spawn_local_player(&mut self, world: &mut GameWorld, nickname: &str) {
        world.spawn_local_player(nickname);
        self.add_message(format!("spawned local player '{nickname}'"));
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.messages.iter().map(String::as_str)
    }
}

impl Subsystem for DebugOverlay {
    fn name(&self) -> &'static str {
        "debug-overlay"
    }
}
