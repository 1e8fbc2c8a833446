//! Address-space access for patching and host-state reads.

#[cfg(test)]
pub mod mock;

#[cfg(test)]
pub use mock::MockAddressSpace;

use crate::error::Result;

/// Byte-level access to the address space the patches land in.
///
/// Patch application and host-state polling only ever go through this
/// trait, so both can be validated against [`mock::MockAddressSpace`].
pub trait AddressSpace {
    fn read(&self, address: u64, buf: &mut [u8]) -> Result<()>;

    /// Write `bytes` at `address`, making the page writable for the
    /// duration if needed.
    fn write(&mut self, address: u64, bytes: &[u8]) -> Result<()>;

    fn read_u32(&self, address: u64) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read(address, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn read_u64(&self, address: u64) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read(address, &mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }
}

/// The current process's own address space.
#[derive(Debug, Default, Clone, Copy)]
pub struct LiveMemory;

impl AddressSpace for LiveMemory {
    fn read(&self, address: u64, buf: &mut [u8]) -> Result<()> {
        // SAFETY: callers only read addresses inside the resolved target
        // module; an invalid address here is exactly the condition the
        // fault interceptor exists to report.
        unsafe {
            std::ptr::copy_nonoverlapping(address as *const u8, buf.as_mut_ptr(), buf.len());
        }
        Ok(())
    }

    #[cfg(target_os = "windows")]
    fn write(&mut self, address: u64, bytes: &[u8]) -> Result<()> {
        use crate::error::Error;
        use std::ffi::c_void;
        use windows::Win32::System::Diagnostics::Debug::FlushInstructionCache;
        use windows::Win32::System::Memory::{
            PAGE_EXECUTE_READWRITE, PAGE_PROTECTION_FLAGS, VirtualProtect,
        };
        use windows::Win32::System::Threading::GetCurrentProcess;

        // SAFETY: the page is made writable before the copy and the old
        // protection is restored afterwards; the instruction cache is
        // flushed because the write may replace executable code.
        unsafe {
            let mut old = PAGE_PROTECTION_FLAGS(0);
            VirtualProtect(
                address as *const c_void,
                bytes.len(),
                PAGE_EXECUTE_READWRITE,
                &mut old,
            )
            .map_err(|e| Error::MemoryWriteFailed {
                address,
                message: e.to_string(),
            })?;

            std::ptr::copy_nonoverlapping(bytes.as_ptr(), address as *mut u8, bytes.len());

            let mut scratch = PAGE_PROTECTION_FLAGS(0);
            let _ = VirtualProtect(address as *const c_void, bytes.len(), old, &mut scratch);
            let _ = FlushInstructionCache(
                GetCurrentProcess(),
                Some(address as *const c_void),
                bytes.len(),
            );
        }
        Ok(())
    }

    #[cfg(not(target_os = "windows"))]
    fn write(&mut self, address: u64, _bytes: &[u8]) -> Result<()> {
        Err(crate::error::Error::MemoryWriteFailed {
            address,
            message: "code patching is only supported on Windows".to_string(),
        })
    }
}
