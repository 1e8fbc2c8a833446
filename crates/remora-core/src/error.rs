use thiserror::Error;

use crate::patch::PatchPhase;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    #[error("Failed to enumerate loaded modules: {0}")]
    ModuleEnumFailed(String),

    #[error("Failed to read target memory at address {address:#x}: {message}")]
    MemoryReadFailed { address: u64, message: String },

    #[error("Failed to write target memory at address {address:#x}: {message}")]
    MemoryWriteFailed { address: u64, message: String },

    #[error("Patch phase '{0}' already applied")]
    PhaseAlreadyApplied(PatchPhase),

    #[error("Failed to arm fault handler: {0}")]
    FaultHandler(String),

    #[error("Storage root not published by host")]
    StorageUnavailable,

    #[error("Subsystem init failed: {0}")]
    SubsystemInit(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
