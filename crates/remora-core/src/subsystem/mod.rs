//! Feature subsystems owned by the lifecycle supervisor.
//!
//! The supervisor constructs each subsystem when its stage is reached and
//! holds exclusive ownership for the rest of the process lifetime;
//! cross-subsystem access happens through short-lived borrows during the
//! per-tick dispatch. The core only relies on the construct/process
//! contract; the feature logic itself is opaque to it.

mod hud;
mod net;
mod overlay;
mod roster;
mod world;

pub use hud::{ChatWindow, MenuHud};
pub use net::{NetSession, NetState, ServerBrowser};
pub use overlay::DebugOverlay;
pub use roster::{PlayerEntry, PlayerRoster};
pub use world::GameWorld;

/// Minimal contract the supervisor needs from a feature subsystem.
pub trait Subsystem {
    fn name(&self) -> &'static str;
}
