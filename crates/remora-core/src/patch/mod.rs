//! Declarative code patches applied to the target module.
//!
//! "What to patch" is a flat list of [`PatchRecord`] values; "how to patch"
//! is one generic apply routine driven through [`AddressSpace`]. Records are
//! grouped into phases: `Boot` runs on the background worker right after
//! attach, the later phases are driven by lifecycle stages. Every phase is
//! applied at most once per process lifetime: there is no rollback, and a
//! re-application would stack a redirect on top of already-redirected code.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use strum::Display;
use tracing::debug;

use crate::error::{Error, Result};
use crate::memory::AddressSpace;

/// Installation phase for a patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[repr(u8)]
pub enum PatchPhase {
    /// Always-on patches, applied by the boot worker.
    #[strum(serialize = "boot")]
    Boot = 0,
    /// Applied when the gameplay session comes up.
    #[strum(serialize = "gameplay")]
    Gameplay = 1,
    /// Applied when the network session comes up.
    #[strum(serialize = "network")]
    Network = 2,
}

impl PatchPhase {
    pub const COUNT: usize = 3;

    fn index(self) -> usize {
        self as usize
    }
}

/// The shape of one modification to the target module.
#[derive(Debug, Clone)]
pub enum PatchKind {
    /// Overwrite the instruction stream with an absolute jump to `target`.
    Redirect { target: u64 },
    /// Raw byte overwrite.
    Bytes { bytes: Vec<u8> },
    /// Replace one pointer-sized entry in a dispatch-table slot.
    TableEntry { value: u64 },
}

/// One code/data patch. `offset` is module-relative; the installer adds
/// the resolved base.
#[derive(Debug, Clone)]
pub struct PatchRecord {
    pub name: &'static str,
    pub offset: u64,
    pub kind: PatchKind,
    pub phase: PatchPhase,
}

/// `jmp [rip+0]` followed by the 64-bit target: a 14-byte absolute
/// redirect that needs no scratch register.
pub(crate) fn encode_redirect(target: u64) -> [u8; 14] {
    let mut buf = [0u8; 14];
    buf[0] = 0xff;
    buf[1] = 0x25;
    buf[6..14].copy_from_slice(&target.to_le_bytes());
    buf
}

/// Applies patch phases to a resolved module base, each exactly once.
pub struct PatchInstaller {
    base: u64,
    records: Vec<PatchRecord>,
    applied: [bool; PatchPhase::COUNT],
}

impl PatchInstaller {
    pub fn new(base: u64, records: Vec<PatchRecord>) -> Self {
        Self {
            base,
            records,
            applied: [false; PatchPhase::COUNT],
        }
    }

    pub fn is_applied(&self, phase: PatchPhase) -> bool {
        self.applied[phase.index()]
    }

    /// Apply every record tagged with `phase`, in declaration order.
    ///
    /// The phase is marked applied before the first write, so a mid-phase
    /// failure can never be re-driven into a double patch. Returns the
    /// number of records written.
    pub fn install_phase(
        &mut self,
        phase: PatchPhase,
        memory: &mut dyn AddressSpace,
    ) -> Result<usize> {
        if self.applied[phase.index()] {
            return Err(Error::PhaseAlreadyApplied(phase));
        }
        self.applied[phase.index()] = true;

        let mut count = 0;
        for record in self.records.iter().filter(|r| r.phase == phase) {
            let address = self.base.wrapping_add(record.offset);
            let bytes = match &record.kind {
                PatchKind::Redirect { target } => encode_redirect(*target).to_vec(),
                PatchKind::Bytes { bytes } => bytes.clone(),
                PatchKind::TableEntry { value } => value.to_le_bytes().to_vec(),
            };
            memory.write(address, &bytes)?;
            debug!("applied patch '{}' at {:#x}", record.name, address);
            count += 1;
        }
        Ok(count)
    }
}

/// Shared front for the installer.
///
/// The boot worker and the tick thread both reach the installer through
/// this; boot completion is an explicit readiness flag later stages query,
/// never a wall-clock assumption.
pub struct PatchDriver {
    installer: Mutex<PatchInstaller>,
    boot_done: AtomicBool,
}

impl PatchDriver {
    pub fn new(installer: PatchInstaller) -> Self {
        Self {
            installer: Mutex::new(installer),
            boot_done: AtomicBool::new(false),
        }
    }

    pub fn install_phase(&self, phase: PatchPhase, memory: &mut dyn AddressSpace) -> Result<usize> {
        let mut installer = match self.installer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let count = installer.install_phase(phase, memory)?;
        if phase == PatchPhase::Boot {
            self.boot_done.store(true, Ordering::Release);
        }
        Ok(count)
    }

    /// True once the boot phase has been fully applied.
    pub fn boot_complete(&self) -> bool {
        self.boot_done.load(Ordering::Acquire)
    }

    pub fn is_applied(&self, phase: PatchPhase) -> bool {
        let installer = match self.installer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        installer.is_applied(phase)
    }
}
