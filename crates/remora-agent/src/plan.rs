//! Built-in patch plan for the target module.
//!
//! What to patch is data; the installer in `remora-core` is the one
//! routine that applies it. Offsets are module-relative and tied to the
//! supported build of the target binary.

use remora_core::patch::{PatchKind, PatchPhase, PatchRecord};

/// Per-frame callback the frame-dispatch redirect lands on.
extern "system" fn frame_dispatch() {
    crate::remora_frame();
}

/// Inbound packet-handler slot target. Traffic is drained on the frame
/// tick, so the slot only has to route into the same dispatch.
extern "system" fn net_intake() {
    crate::remora_frame();
}

/// The full declarative plan. Declaration order is application order
/// within each phase.
pub fn build() -> Vec<PatchRecord> {
    vec![
        // Route the host's per-frame dispatch through the agent tick.
        PatchRecord {
            name: "frame-dispatch",
            offset: 0x53_E981,
            kind: PatchKind::Redirect {
                target: frame_dispatch as usize as u64,
            },
            phase: PatchPhase::Boot,
        },
        // Neutralize the startup integrity scan over the patched ranges.
        PatchRecord {
            name: "integrity-scan-skip",
            offset: 0x59_3FB0,
            kind: PatchKind::Bytes {
                bytes: vec![0xc3], // ret
            },
            phase: PatchPhase::Boot,
        },
        // Widen the render-distance clamp the menu stage relies on.
        PatchRecord {
            name: "draw-distance-clamp",
            offset: 0x55_80F3,
            kind: PatchKind::Bytes {
                bytes: vec![0x90, 0x90, 0x90, 0x90, 0x90, 0x90],
            },
            phase: PatchPhase::Boot,
        },
        // Bootstrap stat block written when the session starts.
        PatchRecord {
            name: "stat-bootstrap",
            offset: 0xB7_9380,
            kind: PatchKind::Bytes {
                bytes: 1000.0f32.to_le_bytes().to_vec(),
            },
            phase: PatchPhase::Gameplay,
        },
        // Disable the single-player save prompt during supervised play.
        PatchRecord {
            name: "save-prompt-skip",
            offset: 0x61_9A60,
            kind: PatchKind::Bytes {
                bytes: vec![0x31, 0xc0, 0xc3], // xor eax, eax; ret
            },
            phase: PatchPhase::Gameplay,
        },
        // Swap the inbound packet-handler slot to the session dispatcher.
        PatchRecord {
            name: "net-handler-slot",
            offset: 0x85_D4A8,
            kind: PatchKind::TableEntry {
                value: net_intake as usize as u64,
            },
            phase: PatchPhase::Network,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_covers_every_phase() {
        let plan = build();
        for phase in [PatchPhase::Boot, PatchPhase::Gameplay, PatchPhase::Network] {
            assert!(
                plan.iter().any(|r| r.phase == phase),
                "no records for phase {phase}"
            );
        }
    }

    #[test]
    fn offsets_are_unique() {
        let plan = build();
        for (i, a) in plan.iter().enumerate() {
            for b in &plan[i + 1..] {
                assert_ne!(a.offset, b.offset, "{} and {} collide", a.name, b.name);
            }
        }
    }

    #[test]
    fn frame_dispatch_is_a_boot_redirect() {
        let plan = build();
        let frame = plan.iter().find(|r| r.name == "frame-dispatch").unwrap();
        assert_eq!(frame.phase, PatchPhase::Boot);
        assert!(matches!(frame.kind, PatchKind::Redirect { target } if target != 0));
    }
}
