//! Staged bring-up of the attached core.
//!
//! The host drives [`Supervisor::advance`] once per frame. Each call moves
//! the stage machine forward by at most one transition, then dispatches
//! per-tick processing to whichever subsystems already exist. Stage checks
//! are owned-state guards, so re-invoking with unchanged host signals is a
//! no-op rather than a re-initialization: each bring-up step can only ever
//! happen once per process.

mod context;

pub use context::AppContext;

use std::path::PathBuf;
use std::sync::Arc;

use strum::Display;

use crate::config::Settings;
use crate::diag::{LOG, NET_LOG};
use crate::error::{Error, Result};
use crate::memory::AddressSpace;
use crate::patch::{PatchDriver, PatchPhase};
use crate::subsystem::NetSession;

/// Lifecycle stage. Strictly monotonic under the derived order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display)]
pub enum Stage {
    #[strum(serialize = "unattached")]
    Unattached,
    #[strum(serialize = "early-patched")]
    EarlyPatched,
    #[strum(serialize = "menu-ready")]
    MenuReady,
    #[strum(serialize = "gameplay-ready")]
    GameplayReady,
    #[strum(serialize = "network-ready")]
    NetworkReady,
}

/// Host-process state polled each tick. The live implementation reads the
/// target module's own globals; tests script the answers.
pub trait HostState {
    /// The frontend menu has finished loading.
    fn menu_active(&self) -> bool;
    /// A gameplay session is running.
    fn session_active(&self) -> bool;
    /// Storage root for settings and log files, once the host publishes it.
    fn storage_root(&self) -> Option<PathBuf>;
}

/// Drives the staged bring-up and the steady-state tick dispatch.
pub struct Supervisor {
    stage: Stage,
    driver: Arc<PatchDriver>,
    memory: Box<dyn AddressSpace + Send>,
    context: Option<AppContext>,
    transitions: Vec<Stage>,
}

impl Supervisor {
    pub fn new(driver: Arc<PatchDriver>, memory: Box<dyn AddressSpace + Send>) -> Self {
        Self {
            stage: Stage::Unattached,
            driver,
            memory,
            context: None,
            transitions: Vec::new(),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn context(&self) -> Option<&AppContext> {
        self.context.as_ref()
    }

    pub fn context_mut(&mut self) -> Option<&mut AppContext> {
        self.context.as_mut()
    }

    /// Every stage entered so far, in order.
    pub fn transitions(&self) -> &[Stage] {
        &self.transitions
    }

    /// Per-frame entry point. Never blocks; errors are construction
    /// failures the caller must treat as fatal.
    ///
    /// A subsystem constructed by this call's stage pass is processed by
    /// this same call's dispatch pass (the first frame after a transition
    /// already ticks the new subsystems).
    pub fn advance(&mut self, host: &dyn HostState) -> Result<()> {
        self.advance_stage(host)?;
        self.process_tick();
        Ok(())
    }

    /// One stage transition at most per call, mirroring the frame-by-frame
    /// bring-up of the host.
    fn advance_stage(&mut self, host: &dyn HostState) -> Result<()> {
        match self.stage {
            Stage::Unattached => {
                if self.driver.boot_complete() {
                    self.enter(Stage::EarlyPatched);
                }
            }
            Stage::EarlyPatched => {
                if host.menu_active() {
                    self.enter_menu(host)?;
                }
            }
            Stage::MenuReady => {
                if host.session_active() {
                    self.enter_gameplay()?;
                }
            }
            Stage::GameplayReady => {
                let online = self
                    .context
                    .as_ref()
                    .is_some_and(|c| c.settings.wants_online());
                if online {
                    self.enter_network()?;
                }
            }
            Stage::NetworkReady => {}
        }
        Ok(())
    }

    fn enter(&mut self, stage: Stage) {
        LOG.write(&format!("stage {} -> {}", self.stage, stage));
        self.stage = stage;
        self.transitions.push(stage);
        if let Some(overlay) = self.context.as_mut().and_then(|c| c.overlay.as_mut()) {
            overlay.add_message(format!("stage: {stage}"));
        }
    }

    /// Menu context is live: resolve storage, load settings, construct the
    /// menu-stage subsystem set.
    fn enter_menu(&mut self, host: &dyn HostState) -> Result<()> {
        let root = host.storage_root().ok_or(Error::StorageUnavailable)?;
        LOG.set_storage_root(&root);
        NET_LOG.set_storage_root(&root);
        LOG.write(&format!("storage root: {}", root.display()));

        let settings = Settings::load_or_default(&root);
        let mut context = AppContext::new(settings);
        context.world.init_in_menu();
        context.hud.show();
        self.context = Some(context);

        self.enter(Stage::MenuReady);
        Ok(())
    }

    /// Gameplay session is live: in-game init, bootstrap patches, optional
    /// offline diagnostic player.
    fn enter_gameplay(&mut self) -> Result<()> {
        let Some(context) = self.context.as_mut() else {
            return Err(Error::SubsystemInit(
                "gameplay stage reached without a menu context".to_string(),
            ));
        };

        context.world.init_in_game();
        context.world.set_max_stats();
        self.driver
            .install_phase(PatchPhase::Gameplay, self.memory.as_mut())?;

        if !context.settings.wants_online() {
            let nickname = context.settings.nickname.clone();
            if let Some(overlay) = context.overlay.as_mut() {
                overlay.spawn_local_player(&mut context.world, &nickname);
            }
        }
        context.hud.set_status("in game");

        self.enter(Stage::GameplayReady);
        Ok(())
    }

    /// Configuration points at an online session: reveal the connect UI,
    /// bring up the session, activate the network patches.
    fn enter_network(&mut self) -> Result<()> {
        let Some(context) = self.context.as_mut() else {
            return Err(Error::SubsystemInit(
                "network stage reached without a menu context".to_string(),
            ));
        };

        context.browser.clear();
        context.browser.show();
        context.net = Some(NetSession::connect(&context.settings));
        self.driver
            .install_phase(PatchPhase::Network, self.memory.as_mut())?;

        self.enter(Stage::NetworkReady);
        Ok(())
    }

    /// Dispatch per-tick processing to whatever exists.
    fn process_tick(&mut self) {
        let Some(context) = self.context.as_mut() else {
            return;
        };
        if let Some(overlay) = context.overlay.as_mut() {
            overlay.process(&context.world);
        }
        if let Some(net) = context.net.as_mut() {
            net.process(&mut context.chat, &mut context.roster);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MockAddressSpace;
    use crate::patch::{PatchInstaller, PatchKind, PatchRecord};
    use crate::subsystem::NetState;

    const BASE: u64 = 0x4000_0000;

    fn plan() -> Vec<PatchRecord> {
        vec![
            PatchRecord {
                name: "boot-probe",
                offset: 0x10,
                kind: PatchKind::Bytes { bytes: vec![0x90] },
                phase: PatchPhase::Boot,
            },
            PatchRecord {
                name: "stat-bootstrap",
                offset: 0x20,
                kind: PatchKind::Bytes { bytes: vec![0x01] },
                phase: PatchPhase::Gameplay,
            },
            PatchRecord {
                name: "net-dispatch",
                offset: 0x30,
                kind: PatchKind::TableEntry { value: 0x1234 },
                phase: PatchPhase::Network,
            },
        ]
    }

    struct ScriptedHost {
        menu: bool,
        session: bool,
        storage: Option<PathBuf>,
    }

    impl HostState for ScriptedHost {
        fn menu_active(&self) -> bool {
            self.menu
        }
        fn session_active(&self) -> bool {
            self.session
        }
        fn storage_root(&self) -> Option<PathBuf> {
            self.storage.clone()
        }
    }

    struct Fixture {
        supervisor: Supervisor,
        driver: Arc<PatchDriver>,
        host: ScriptedHost,
        _dir: tempfile::TempDir,
    }

    /// Supervisor over a mock address space, with the boot phase already
    /// applied (as the worker thread would have) and the given settings
    /// stored under a scratch storage root.
    fn fixture(settings: Settings) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        settings.save(dir.path()).unwrap();

        let driver = Arc::new(PatchDriver::new(PatchInstaller::new(BASE, plan())));
        let mut boot_memory = MockAddressSpace::new(BASE, 0x100);
        driver
            .install_phase(PatchPhase::Boot, &mut boot_memory)
            .unwrap();

        let supervisor = Supervisor::new(
            driver.clone(),
            Box::new(MockAddressSpace::new(BASE, 0x100)),
        );
        let host = ScriptedHost {
            menu: false,
            session: false,
            storage: Some(dir.path().to_path_buf()),
        };
        Fixture {
            supervisor,
            driver,
            host,
            _dir: dir,
        }
    }

    #[test]
    fn boot_flag_gates_the_first_transition() {
        let dir = tempfile::tempdir().unwrap();
        let driver = Arc::new(PatchDriver::new(PatchInstaller::new(BASE, plan())));
        let mut supervisor = Supervisor::new(
            driver.clone(),
            Box::new(MockAddressSpace::new(BASE, 0x100)),
        );
        let host = ScriptedHost {
            menu: true,
            session: true,
            storage: Some(dir.path().to_path_buf()),
        };

        // Worker has not finished: nothing moves, menu signal or not.
        for _ in 0..5 {
            supervisor.advance(&host).unwrap();
        }
        assert_eq!(supervisor.stage(), Stage::Unattached);

        let mut memory = MockAddressSpace::new(BASE, 0x100);
        driver.install_phase(PatchPhase::Boot, &mut memory).unwrap();
        supervisor.advance(&host).unwrap();
        assert_eq!(supervisor.stage(), Stage::EarlyPatched);
    }

    #[test]
    fn stages_advance_one_per_tick_and_construct_once() {
        let mut fx = fixture(Settings {
            online: true,
            server_host: "play.example.net".to_string(),
            ..Default::default()
        });

        fx.supervisor.advance(&fx.host).unwrap();
        assert_eq!(fx.supervisor.stage(), Stage::EarlyPatched);

        // Menu signal raised: next tick constructs the menu set.
        fx.host.menu = true;
        fx.supervisor.advance(&fx.host).unwrap();
        assert_eq!(fx.supervisor.stage(), Stage::MenuReady);
        let context = fx.supervisor.context().unwrap();
        assert_eq!(context.world.menu_inits(), 1);
        assert!(context.hud.is_visible());

        // Unchanged signals: stage holds, nothing re-constructs.
        for _ in 0..10 {
            fx.supervisor.advance(&fx.host).unwrap();
        }
        assert_eq!(fx.supervisor.stage(), Stage::MenuReady);
        assert_eq!(fx.supervisor.context().unwrap().world.menu_inits(), 1);

        // Gameplay signal raised.
        fx.host.session = true;
        fx.supervisor.advance(&fx.host).unwrap();
        assert_eq!(fx.supervisor.stage(), Stage::GameplayReady);
        let context = fx.supervisor.context().unwrap();
        assert_eq!(context.world.game_inits(), 1);
        assert!(context.world.max_stats_applied());
        assert!(fx.driver.is_applied(PatchPhase::Gameplay));

        // Online session configured: next tick brings up the network stage.
        fx.supervisor.advance(&fx.host).unwrap();
        assert_eq!(fx.supervisor.stage(), Stage::NetworkReady);
        let context = fx.supervisor.context().unwrap();
        assert!(context.browser.is_visible());
        assert!(context.net.is_some());
        assert!(fx.driver.is_applied(PatchPhase::Network));

        // 100 further ticks: everything stays exactly-once.
        for _ in 0..100 {
            fx.supervisor.advance(&fx.host).unwrap();
        }
        let context = fx.supervisor.context().unwrap();
        assert_eq!(context.world.menu_inits(), 1);
        assert_eq!(context.world.game_inits(), 1);
        let network_entries = fx
            .supervisor
            .transitions()
            .iter()
            .filter(|s| **s == Stage::NetworkReady)
            .count();
        assert_eq!(network_entries, 1);
    }

    #[test]
    fn transitions_are_monotonic_even_when_signals_flap() {
        let mut fx = fixture(Settings::default());

        fx.supervisor.advance(&fx.host).unwrap();
        fx.host.menu = true;
        fx.supervisor.advance(&fx.host).unwrap();
        assert_eq!(fx.supervisor.stage(), Stage::MenuReady);

        // Menu signal drops again: no regression.
        fx.host.menu = false;
        for _ in 0..5 {
            fx.supervisor.advance(&fx.host).unwrap();
        }
        assert_eq!(fx.supervisor.stage(), Stage::MenuReady);

        let stages = fx.supervisor.transitions();
        assert!(stages.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn session_signal_without_menu_does_not_skip_a_stage() {
        let mut fx = fixture(Settings::default());
        fx.host.session = true;

        for _ in 0..5 {
            fx.supervisor.advance(&fx.host).unwrap();
        }
        assert_eq!(fx.supervisor.stage(), Stage::EarlyPatched);
    }

    #[test]
    fn offline_debug_session_spawns_the_local_player_once() {
        let mut fx = fixture(Settings {
            debug: true,
            online: false,
            nickname: "dev".to_string(),
            ..Default::default()
        });

        fx.supervisor.advance(&fx.host).unwrap();
        fx.host.menu = true;
        fx.supervisor.advance(&fx.host).unwrap();
        fx.host.session = true;
        fx.supervisor.advance(&fx.host).unwrap();
        assert_eq!(fx.supervisor.stage(), Stage::GameplayReady);

        for _ in 0..100 {
            fx.supervisor.advance(&fx.host).unwrap();
        }
        // No online session configured: gameplay is the final stage.
        assert_eq!(fx.supervisor.stage(), Stage::GameplayReady);
        let context = fx.supervisor.context().unwrap();
        assert_eq!(context.world.local_player(), Some("dev"));
        assert!(context.net.is_none());
        assert!(!fx.driver.is_applied(PatchPhase::Network));
        // Overlay was processed every tick since its construction.
        assert_eq!(context.overlay.as_ref().unwrap().ticks(), 102);
    }

    #[test]
    fn online_session_processes_from_its_construction_tick() {
        let mut fx = fixture(Settings {
            online: true,
            nickname: "tester".to_string(),
            ..Default::default()
        });

        fx.supervisor.advance(&fx.host).unwrap();
        fx.host.menu = true;
        fx.supervisor.advance(&fx.host).unwrap();
        fx.host.session = true;
        fx.supervisor.advance(&fx.host).unwrap();
        fx.supervisor.advance(&fx.host).unwrap();
        assert_eq!(fx.supervisor.stage(), Stage::NetworkReady);

        // Constructed-this-tick subsystems process in the same tick.
        let context = fx.supervisor.context().unwrap();
        let net = context.net.as_ref().unwrap();
        assert_eq!(net.processed(), 1);
        assert_eq!(net.state(), NetState::Connected);
        assert_eq!(context.roster.len(), 1);

        for _ in 0..100 {
            fx.supervisor.advance(&fx.host).unwrap();
        }
        let context = fx.supervisor.context().unwrap();
        assert_eq!(context.net.as_ref().unwrap().processed(), 101);
        // The join line landed exactly once.
        assert_eq!(context.chat.len(), 1);
    }

    #[test]
    fn missing_storage_root_at_menu_time_is_fatal() {
        let mut fx = fixture(Settings::default());
        fx.supervisor.advance(&fx.host).unwrap();

        fx.host.menu = true;
        fx.host.storage = None;
        let err = fx.supervisor.advance(&fx.host).unwrap_err();
        assert!(matches!(err, Error::StorageUnavailable));
        assert_eq!(fx.supervisor.stage(), Stage::EarlyPatched);
    }
}
