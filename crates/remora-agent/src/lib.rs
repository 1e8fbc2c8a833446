//! # remora-agent
//!
//! The library loaded into the game process. On load it resolves the
//! target module, arms the fault interceptor, and hands phase-0 patching
//! to a worker thread so the loader callback returns promptly; afterwards
//! the patched frame dispatch drives the lifecycle supervisor once per
//! frame.

mod host;
mod plan;

pub use host::{LiveHostState, layout};

use std::sync::{Arc, Mutex, OnceLock};
use std::thread;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use remora_core::diag::LOG;
use remora_core::fault;
use remora_core::lifecycle::Supervisor;
use remora_core::memory::LiveMemory;
use remora_core::module::{ModuleHandle, ProcessModules};
use remora_core::patch::{PatchDriver, PatchInstaller, PatchPhase};

/// Module the agent attaches to. Attach fails hard when it is absent.
pub const TARGET_MODULE: &str = "gta_sa.exe";

/// Token returned to the hosting runtime on a successful attach; `0` is
/// the failure sentinel.
pub const ABI_TOKEN: u32 = 0x0002_0000;

struct Agent {
    module: ModuleHandle,
    host: LiveHostState,
    supervisor: Mutex<Supervisor>,
}

static AGENT: OnceLock<Agent> = OnceLock::new();

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("remora=info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn attach_inner() -> anyhow::Result<Agent> {
    let module = ModuleHandle::resolve(&ProcessModules, TARGET_MODULE)
        .with_context(|| format!("cannot attach without {TARGET_MODULE}"))?;
    LOG.write(&format!(
        "{} image base address: {:#x}",
        module.name(),
        module.base()
    ));

    // Armed before any patched code path can run.
    fault::arm(&module)?;

    let driver = Arc::new(PatchDriver::new(PatchInstaller::new(
        module.base(),
        plan::build(),
    )));

    // Phase-0 application may block on page-protection work; it must not
    // run on the loader's callback thread.
    let worker_driver = driver.clone();
    thread::Builder::new()
        .name("remora-boot".to_string())
        .spawn(move || {
            let mut memory = LiveMemory;
            match worker_driver.install_phase(PatchPhase::Boot, &mut memory) {
                Ok(count) => LOG.write(&format!("boot patches applied: {count}")),
                Err(e) => {
                    LOG.write(&format!("boot patch failure: {e}"));
                    std::process::abort();
                }
            }
        })
        .context("failed to spawn boot worker")?;

    let host = LiveHostState::new(&module);
    let supervisor = Supervisor::new(driver, Box::new(LiveMemory));

    Ok(Agent {
        module,
        host,
        supervisor: Mutex::new(supervisor),
    })
}

/// Load entry point. Idempotent: a second call returns the token of the
/// already-attached agent.
#[unsafe(no_mangle)]
pub extern "system" fn remora_attach() -> u32 {
    init_tracing();

    if AGENT.get().is_some() {
        return ABI_TOKEN;
    }
    match attach_inner() {
        Ok(agent) => {
            info!(
                "attached to {} (base: {:#x})",
                agent.module.name(),
                agent.module.base()
            );
            let _ = AGENT.set(agent);
            ABI_TOKEN
        }
        Err(e) => {
            LOG.write(&format!("> ERROR: attach failed: {e:#}"));
            0
        }
    }
}

/// Per-frame entry point, reached through the frame-dispatch redirect.
/// Construction failures during stage bring-up are fatal by policy.
#[unsafe(no_mangle)]
pub extern "system" fn remora_frame() {
    let Some(agent) = AGENT.get() else {
        return;
    };
    let mut supervisor = match agent.supervisor.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    if let Err(e) = supervisor.advance(&agent.host) {
        LOG.write(&format!("> ERROR: fatal during stage advance: {e}"));
        std::process::abort();
    }
}

#[cfg(target_os = "windows")]
#[unsafe(no_mangle)]
extern "system" fn DllMain(
    _module: windows::Win32::Foundation::HINSTANCE,
    reason: u32,
    _reserved: *mut core::ffi::c_void,
) -> windows::Win32::Foundation::BOOL {
    use windows::Win32::Foundation::BOOL;
    use windows::Win32::System::SystemServices::DLL_PROCESS_ATTACH;

    if reason == DLL_PROCESS_ATTACH {
        // A failure sentinel tells the loader to unload us again.
        return BOOL((remora_attach() != 0) as i32);
    }
    BOOL(1)
}
