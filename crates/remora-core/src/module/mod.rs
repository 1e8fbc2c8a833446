//! Target module resolution.
//!
//! The agent attaches to a module that is already mapped into the host
//! process. Resolution happens once at load time; the resulting
//! [`ModuleHandle`] is immutable and every module-relative address
//! computation in the repo goes through it.

use crate::error::{Error, Result};

/// One entry in the process's loaded-module table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedModule {
    pub name: String,
    pub base: u64,
    pub size: u64,
}

/// Source of the loaded-module table.
///
/// The live implementation walks a snapshot of the current process; tests
/// supply a fixed table.
pub trait ModuleTable {
    fn modules(&self) -> Result<Vec<LoadedModule>>;
}

/// Resolved handle to the target module.
///
/// A handle only ever exists in the resolved state: [`ModuleHandle::resolve`]
/// either returns a handle with the real load base or fails with
/// [`Error::ModuleNotFound`]. Absence is never reported as a zero base.
#[derive(Debug, Clone)]
pub struct ModuleHandle {
    name: String,
    base: u64,
    size: u64,
}

impl ModuleHandle {
    /// Scan `table` for a module whose name matches `name` (ASCII
    /// case-insensitive, matching Windows module-name semantics).
    pub fn resolve(table: &dyn ModuleTable, name: &str) -> Result<Self> {
        let modules = table.modules()?;
        modules
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
            .map(|m| Self {
                name: m.name.clone(),
                base: m.base,
                size: m.size,
            })
            .ok_or_else(|| Error::ModuleNotFound(name.to_string()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Absolute address of a module-relative offset.
    pub fn va(&self, offset: u64) -> u64 {
        self.base.wrapping_add(offset)
    }

    /// Module-relative offset of an absolute address.
    pub fn rva(&self, address: u64) -> u64 {
        address.wrapping_sub(self.base)
    }
}

/// Live module table of the current process.
#[derive(Debug, Default)]
pub struct ProcessModules;

#[cfg(target_os = "windows")]
impl ModuleTable for ProcessModules {
    fn modules(&self) -> Result<Vec<LoadedModule>> {
        use windows::Win32::Foundation::CloseHandle;
        use windows::Win32::System::Diagnostics::ToolHelp::{
            CreateToolhelp32Snapshot, MODULEENTRY32W, Module32FirstW, Module32NextW,
            TH32CS_SNAPMODULE, TH32CS_SNAPMODULE32,
        };

        // SAFETY: snapshot enumeration of our own process; the handle is
        // closed before returning.
        unsafe {
            let snapshot = CreateToolhelp32Snapshot(TH32CS_SNAPMODULE | TH32CS_SNAPMODULE32, 0)
                .map_err(|e| Error::ModuleEnumFailed(e.to_string()))?;

            let mut entry = MODULEENTRY32W {
                dwSize: std::mem::size_of::<MODULEENTRY32W>() as u32,
                ..Default::default()
            };

            let mut modules = Vec::new();
            if Module32FirstW(snapshot, &mut entry).is_ok() {
                loop {
                    let len = entry
                        .szModule
                        .iter()
                        .position(|&c| c == 0)
                        .unwrap_or(entry.szModule.len());
                    modules.push(LoadedModule {
                        name: String::from_utf16_lossy(&entry.szModule[..len]),
                        base: entry.modBaseAddr as u64,
                        size: entry.modBaseSize as u64,
                    });
                    if Module32NextW(snapshot, &mut entry).is_err() {
                        break;
                    }
                }
            }

            let _ = CloseHandle(snapshot);
            Ok(modules)
        }
    }
}

#[cfg(not(target_os = "windows"))]
impl ModuleTable for ProcessModules {
    fn modules(&self) -> Result<Vec<LoadedModule>> {
        Err(Error::ModuleEnumFailed(
            "module enumeration is only supported on Windows".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedTable(Vec<LoadedModule>);

    impl ModuleTable for FixedTable {
        fn modules(&self) -> Result<Vec<LoadedModule>> {
            Ok(self.0.clone())
        }
    }

    fn table() -> FixedTable {
        FixedTable(vec![
            LoadedModule {
                name: "ntdll.dll".to_string(),
                base: 0x7ff8_0000_0000,
                size: 0x1f_0000,
            },
            LoadedModule {
                name: "target.bin".to_string(),
                base: 0x4000_0000,
                size: 0x60_0000,
            },
        ])
    }

    #[test]
    fn resolve_returns_the_load_base() {
        let handle = ModuleHandle::resolve(&table(), "target.bin").unwrap();
        assert_eq!(handle.base(), 0x4000_0000);
        assert_eq!(handle.size(), 0x60_0000);
        assert_eq!(handle.name(), "target.bin");
    }

    #[test]
    fn resolve_is_case_insensitive() {
        let handle = ModuleHandle::resolve(&table(), "TARGET.BIN").unwrap();
        assert_eq!(handle.base(), 0x4000_0000);
    }

    #[test]
    fn resolve_missing_module_is_not_found() {
        let err = ModuleHandle::resolve(&table(), "absent.dll").unwrap_err();
        assert!(matches!(err, Error::ModuleNotFound(name) if name == "absent.dll"));
    }

    #[test]
    fn va_and_rva_round_module_relative_addresses() {
        let handle = ModuleHandle::resolve(&table(), "target.bin").unwrap();
        assert_eq!(handle.va(0x1234), 0x4000_1234);
        assert_eq!(handle.rva(0x4000_1234), 0x1234);
    }
}
