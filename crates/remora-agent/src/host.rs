//! Host-state polling backed by the target module's own globals.

use std::path::PathBuf;

use remora_core::lifecycle::HostState;
use remora_core::memory::{AddressSpace, LiveMemory};
use remora_core::module::ModuleHandle;

/// Known data offsets inside the target module.
///
/// These are module-relative addresses of globals the host itself
/// maintains; the agent only ever reads them.
pub mod layout {
    /// Pointer to the storage-root string published by the host once its
    /// filesystem layer is up.
    pub const STORAGE_ROOT_PTR: u64 = 0x63_C4B8;

    /// Nonzero once the frontend menu has finished loading.
    pub const MENU_ACTIVE: u64 = 0xBA_67A4;

    /// Nonzero while a gameplay session is running.
    pub const SESSION_STATE: u64 = 0xB7_CB84;

    /// Longest storage-root string the host will publish.
    pub const STORAGE_ROOT_MAX: usize = 260;
}

/// Live [`HostState`] reading the resolved module's globals.
///
/// Every accessor is best-effort: an unreadable flag reads as "not yet",
/// never as a crash, since the host may still be mid-initialization when
/// the first ticks arrive.
pub struct LiveHostState {
    base: u64,
}

impl LiveHostState {
    pub fn new(module: &ModuleHandle) -> Self {
        Self {
            base: module.base(),
        }
    }

    fn read_u32(&self, offset: u64) -> Option<u32> {
        LiveMemory.read_u32(self.base.wrapping_add(offset)).ok()
    }

    fn read_root_string(&self) -> Option<String> {
        let ptr = LiveMemory
            .read_u64(self.base.wrapping_add(layout::STORAGE_ROOT_PTR))
            .ok()?;
        if ptr == 0 {
            return None;
        }
        let mut buf = vec![0u8; layout::STORAGE_ROOT_MAX];
        LiveMemory.read(ptr, &mut buf).ok()?;
        let len = buf.iter().position(|&b| b == 0)?;
        if len == 0 {
            return None;
        }
        String::from_utf8(buf[..len].to_vec()).ok()
    }
}

impl HostState for LiveHostState {
    fn menu_active(&self) -> bool {
        self.read_u32(layout::MENU_ACTIVE).is_some_and(|v| v != 0)
    }

    fn session_active(&self) -> bool {
        self.read_u32(layout::SESSION_STATE).is_some_and(|v| v != 0)
    }

    fn storage_root(&self) -> Option<PathBuf> {
        self.read_root_string().map(PathBuf::from)
    }
}
