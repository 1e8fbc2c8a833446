//! The owned bundle of feature subsystems.

use tracing::info;

use crate::config::Settings;
use crate::subsystem::{
    ChatWindow, DebugOverlay, GameWorld, MenuHud, NetSession, PlayerRoster, ServerBrowser,
    Subsystem,
};

/// Single per-process application context.
///
/// Constructed when the menu stage is reached and owned exclusively by the
/// supervisor; subsystems that need a sibling receive a borrow during the
/// per-tick dispatch. Members of later stages stay `None` until their
/// stage constructs them.
pub struct AppContext {
    pub settings: Settings,
    pub world: GameWorld,
    pub hud: MenuHud,
    pub chat: ChatWindow,
    pub roster: PlayerRoster,
    pub browser: ServerBrowser,
    pub overlay: Option<DebugOverlay>,
    pub net: Option<NetSession>,
}

impl AppContext {
    /// Construct the menu-stage subsystem set. The debug overlay is gated
    /// on the `debug` setting; the network session waits for its stage.
    pub fn new(settings: Settings) -> Self {
        let context = Self {
            overlay: settings.debug.then(DebugOverlay::new),
            settings,
            world: GameWorld::new(),
            hud: MenuHud::new(),
            chat: ChatWindow::new(),
            roster: PlayerRoster::new(),
            browser: ServerBrowser::new(),
            net: None,
        };

        info!(
            subsystems = %context.constructed().join(","),
            "menu-stage subsystems constructed"
        );
        context
    }

    /// Names of every currently constructed subsystem.
    pub fn constructed(&self) -> Vec<&'static str> {
        let mut names = vec![
            self.world.name(),
            self.hud.name(),
            self.chat.name(),
            self.roster.name(),
            self.browser.name(),
        ];
        if let Some(overlay) = &self.overlay {
            names.push(overlay.name());
        }
        if let Some(net) = &self.net {
            names.push(net.name());
        }
        names
    }
}
