//! # remora-core
//!
//! Core library for the Remora runtime attachment layer.
//!
//! This crate provides:
//! - Target module resolution inside the host process
//! - Declarative code patching organized into install phases
//! - A staged lifecycle supervisor that owns the feature subsystems
//! - Crash interception with a register-level post-mortem report
//! - Append-only diagnostic log sinks with lazy file initialization
//!
//! Platform-specific pieces (module snapshot walk, page-protection flips,
//! the exception filter) live behind narrow `#[cfg(target_os = "windows")]`
//! gates; everything that decides *what* happens is host-agnostic and
//! testable against mock address spaces and scripted host signals.

pub mod config;
pub mod diag;
pub mod error;
pub mod fault;
pub mod lifecycle;
pub mod memory;
pub mod module;
pub mod patch;
pub mod subsystem;

pub use config::Settings;
pub use diag::{LOG, LogSink, NET_LOG};
pub use error::{Error, Result};
pub use fault::{FaultKind, FaultReport, RegisterSnapshot};
pub use lifecycle::{AppContext, HostState, Stage, Supervisor};
pub use memory::{AddressSpace, LiveMemory};
pub use module::{LoadedModule, ModuleHandle, ModuleTable, ProcessModules};
pub use patch::{PatchDriver, PatchInstaller, PatchKind, PatchPhase, PatchRecord};
pub use subsystem::{
    ChatWindow, DebugOverlay, GameWorld, MenuHud, NetSession, PlayerRoster, ServerBrowser,
    Subsystem,
};
