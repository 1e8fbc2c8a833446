//! Menu HUD and chat window.

use std::collections::VecDeque;

use super::Subsystem;

const CHAT_CAPACITY: usize = 64;

/// In-game menu overlay.
#[derive(Debug, Default)]
pub struct MenuHud {
    visible: bool,
    status: String,
}

impl MenuHud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(&mut self) {
        self.visible = true;
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    pub fn status(&self) -> &str {
        &self.status
    }
}

impl Subsystem for MenuHud {
    fn name(&self) -> &'static str {
        "menu-hud"
    }
}

/// Scrollback chat window. Keeps the newest [`CHAT_CAPACITY`] lines.
#[derive(Debug, Default)]
pub struct ChatWindow {
    lines: VecDeque<String>,
}

impl ChatWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_line(&mut self, line: impl Into<String>) {
        if self.lines.len() == CHAT_CAPACITY {
            self.lines.pop_front();
        }
        self.lines.push_back(line.into());
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

impl Subsystem for ChatWindow {
    fn name(&self) -> &'static str {
        "chat"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_drops_oldest_lines_past_capacity() {
        let mut chat = ChatWindow::new();
        for i in 0..CHAT_CAPACITY + 10 {
            chat.add_line(format!("line {i}"));
        }
        assert_eq!(chat.len(), CHAT_CAPACITY);
        assert_eq!(chat.lines().next(), Some("line 10"));
    }
}
