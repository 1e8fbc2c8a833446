//! Connected-player roster.

use super::Subsystem;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerEntry {
    pub id: u16,
    pub name: String,
}

#[derive(Debug, Default)]
pub struct PlayerRoster {
    players: Vec<PlayerEntry>,
}

impl PlayerRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or rename the entry with this id.
    pub fn upsert(&mut self, id: u16, name: impl Into<String>) {
        let name = name.into();
        match self.players.iter_mut().find(|p| p.id == id) {
            Some(entry) => entry.name = name,
            None => self.players.push(PlayerEntry { id, name }),
        }
    }

    pub fn remove(&mut self, id: u16) {
        self.players.retain(|p| p.id != id);
    }

    pub fn clear(&mut self) {
        self.players.clear();
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn players(&self) -> &[PlayerEntry] {
        &self.players
    }
}

impl Subsystem for PlayerRoster {
    fn name(&self) -> &'static str {
        "roster"
    }
}
