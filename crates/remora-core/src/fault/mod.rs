//! Fault interception and post-mortem reporting.
//!
//! An invalid memory access in patched or host code is unrecoverable: the
//! target module's internal state has to be assumed corrupted. The armed
//! handler captures the processor context, writes a module-relative report
//! through the log sink, and terminates the process with a clean exit
//! status so the host's own crash dialog never fires. The report is the
//! sole recovery artifact.

use std::sync::OnceLock;

use strum::Display;

use crate::diag::LogSink;
use crate::error::Result;
use crate::module::ModuleHandle;

/// Signal kind carried by a [`FaultReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum FaultKind {
    #[strum(serialize = "ACCESS_VIOLATION")]
    AccessViolation,
}

/// Fixed-shape snapshot of the faulting thread's general-purpose registers.
///
/// `ret` is the return address sitting at the top of the faulting stack;
/// together with `rip` it forms the two-frame backtrace in the report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegisterSnapshot {
    pub rax: u64,
    pub rbx: u64,
    pub rcx: u64,
    pub rdx: u64,
    pub rsi: u64,
    pub rdi: u64,
    pub rbp: u64,
    pub rsp: u64,
    pub r8: u64,
    pub r9: u64,
    pub r10: u64,
    pub r11: u64,
    pub r12: u64,
    pub r13: u64,
    pub r14: u64,
    pub r15: u64,
    pub rip: u64,
    pub ret: u64,
}

/// Structured diagnostic snapshot of one captured fault.
#[derive(Debug, Clone)]
pub struct FaultReport {
    pub kind: FaultKind,
    pub fault_address: u64,
    pub module_base: u64,
    pub registers: RegisterSnapshot,
}

impl FaultReport {
    pub fn new(
        kind: FaultKind,
        fault_address: u64,
        module_base: u64,
        registers: RegisterSnapshot,
    ) -> Self {
        Self {
            kind,
            fault_address,
            module_base,
            registers,
        }
    }

    /// Module-relative program counter.
    pub fn pc_offset(&self) -> u64 {
        self.registers.rip.wrapping_sub(self.module_base)
    }

    /// Module-relative immediate return address.
    pub fn ret_offset(&self) -> u64 {
        self.registers.ret.wrapping_sub(self.module_base)
    }

    /// The multi-line report body.
    pub fn render(&self, module_name: &str) -> Vec<String> {
        let r = &self.registers;
        vec![
            format!("{} | fault address: {:#x}", self.kind, self.fault_address),
            format!("{module_name} base address: {:#x}", self.module_base),
            "register states:".to_string(),
            format!(
                "rax: {:#x}, rbx: {:#x}, rcx: {:#x}, rdx: {:#x}",
                r.rax, r.rbx, r.rcx, r.rdx
            ),
            format!(
                "rsi: {:#x}, rdi: {:#x}, rbp: {:#x}, rsp: {:#x}",
                r.rsi, r.rdi, r.rbp, r.rsp
            ),
            format!(
                "r8: {:#x}, r9: {:#x}, r10: {:#x}, r11: {:#x}",
                r.r8, r.r9, r.r10, r.r11
            ),
            format!(
                "r12: {:#x}, r13: {:#x}, r14: {:#x}, r15: {:#x}",
                r.r12, r.r13, r.r14, r.r15
            ),
            format!("rip: {:#x}", r.rip),
            "> backtrace:".to_string(),
            format!("1: {module_name} + {:#x}", self.pc_offset()),
            format!("2: {module_name} + {:#x}", self.ret_offset()),
        ]
    }

    /// Write the report through the sink's non-blocking path.
    pub fn emit(&self, sink: &LogSink, module_name: &str) {
        for line in self.render(module_name) {
            sink.write_nonblocking(&line);
        }
    }
}

struct ArmedModule {
    name: String,
    base: u64,
}

static ARMED: OnceLock<ArmedModule> = OnceLock::new();

/// Install the process-wide fault handler for `module`.
///
/// Must run before any patched code path can execute. Arming twice is a
/// no-op beyond re-registering the same filter.
pub fn arm(module: &ModuleHandle) -> Result<()> {
    let _ = ARMED.set(ArmedModule {
        name: module.name().to_string(),
        base: module.base(),
    });
    install_filter()
}

#[cfg(all(target_os = "windows", target_arch = "x86_64"))]
fn install_filter() -> Result<()> {
    use windows::Win32::System::Diagnostics::Debug::SetUnhandledExceptionFilter;

    // SAFETY: registering a top-level filter; the previous filter is
    // intentionally discarded, faults end here.
    unsafe {
        SetUnhandledExceptionFilter(Some(fault_filter));
    }
    Ok(())
}

#[cfg(not(all(target_os = "windows", target_arch = "x86_64")))]
fn install_filter() -> Result<()> {
    Err(crate::error::Error::FaultHandler(
        "fault interception is only supported on Windows x86-64".to_string(),
    ))
}

/// The one architecture-dependent function: flatten a processor context
/// into the fixed-shape snapshot.
#[cfg(all(target_os = "windows", target_arch = "x86_64"))]
fn capture(context: &windows::Win32::System::Diagnostics::Debug::CONTEXT) -> RegisterSnapshot {
    let ret = if context.Rsp != 0 {
        // SAFETY: the faulting thread's stack top; readable while the
        // filter runs on that thread.
        unsafe { std::ptr::read(context.Rsp as *const u64) }
    } else {
        0
    };
    RegisterSnapshot {
        rax: context.Rax,
        rbx: context.Rbx,
        rcx: context.Rcx,
        rdx: context.Rdx,
        rsi: context.Rsi,
        rdi: context.Rdi,
        rbp: context.Rbp,
        rsp: context.Rsp,
        r8: context.R8,
        r9: context.R9,
        r10: context.R10,
        r11: context.R11,
        r12: context.R12,
        r13: context.R13,
        r14: context.R14,
        r15: context.R15,
        rip: context.Rip,
        ret,
    }
}

#[cfg(all(target_os = "windows", target_arch = "x86_64"))]
unsafe extern "system" fn fault_filter(
    info: *const windows::Win32::System::Diagnostics::Debug::EXCEPTION_POINTERS,
) -> i32 {
    use windows::Win32::Foundation::EXCEPTION_ACCESS_VIOLATION;

    const CONTINUE_SEARCH: i32 = 0;

    // SAFETY: the OS hands us valid pointers for the duration of the
    // callback.
    let (record, context) = unsafe {
        let info = &*info;
        if info.ExceptionRecord.is_null() || info.ContextRecord.is_null() {
            return CONTINUE_SEARCH;
        }
        (&*info.ExceptionRecord, &*info.ContextRecord)
    };

    if record.ExceptionCode != EXCEPTION_ACCESS_VIOLATION {
        return CONTINUE_SEARCH;
    }
    let Some(armed) = ARMED.get() else {
        return CONTINUE_SEARCH;
    };

    // For an access violation the second information slot holds the
    // inaccessible data address.
    let fault_address = record.ExceptionInformation[1] as u64;
    let report = FaultReport::new(
        FaultKind::AccessViolation,
        fault_address,
        armed.base,
        capture(context),
    );
    report.emit(&crate::diag::LOG, &armed.name);

    // Terminate cleanly instead of handing the fault to the host's own
    // crash handling; the report above is the recovery artifact.
    std::process::exit(0);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(base: u64) -> RegisterSnapshot {
        RegisterSnapshot {
            rax: 0x1,
            rbx: 0x2,
            rip: base + 0x1234,
            ret: base + 0x5678,
            rsp: 0x7fff_0000,
            ..Default::default()
        }
    }

    #[test]
    fn offsets_are_module_relative() {
        let base = 0x4000_0000;
        let report = FaultReport::new(FaultKind::AccessViolation, 0xdead, base, snapshot(base));
        assert_eq!(report.pc_offset(), 0x1234);
        assert_eq!(report.ret_offset(), 0x5678);
    }

    #[test]
    fn pc_below_base_wraps_instead_of_panicking() {
        let report = FaultReport::new(
            FaultKind::AccessViolation,
            0,
            0x4000_0000,
            RegisterSnapshot {
                rip: 0x1000,
                ..Default::default()
            },
        );
        assert_eq!(report.pc_offset(), 0x1000u64.wrapping_sub(0x4000_0000));
    }

    #[test]
    fn render_includes_signal_registers_and_backtrace() {
        let base = 0x4000_0000;
        let report = FaultReport::new(FaultKind::AccessViolation, 0xdead, base, snapshot(base));
        let lines = report.render("target.bin");

        assert!(lines[0].starts_with("ACCESS_VIOLATION | fault address: 0xdead"));
        assert!(lines[1].contains("target.bin base address: 0x40000000"));
        assert!(lines.iter().any(|l| l.contains("rax: 0x1")));
        assert!(lines.iter().any(|l| l == "> backtrace:"));
        assert!(lines.iter().any(|l| l == "1: target.bin + 0x1234"));
        assert!(lines.iter().any(|l| l == "2: target.bin + 0x5678"));
    }

    #[test]
    fn emit_precedes_termination_by_construction() {
        // `emit` is a plain synchronous write; exercise it against a sink.
        let dir = tempfile::tempdir().unwrap();
        let sink = LogSink::new("fault-test", "fault.txt");
        sink.set_storage_root(dir.path());

        let base = 0x4000_0000;
        let report = FaultReport::new(FaultKind::AccessViolation, 0xdead, base, snapshot(base));
        report.emit(&sink, "target.bin");

        let content = std::fs::read_to_string(dir.path().join("fault.txt")).unwrap();
        assert!(content.contains("ACCESS_VIOLATION"));
        assert!(content.contains("1: target.bin + 0x1234"));
    }
}
