//! ARM32 / Thumb jump-table slot analysis.

use super::{AdapterCaps, ArchAdapter, ProbeHit};
use crate::types::{Address, CodeMode};

/// ARM instruction patterns.
pub mod patterns {
    pub const NOP: u32 = 0xE1A00000; // MOV R0, R0
    pub const NOP_HINT: u32 = 0xE320F000; // NOP (hint)
    pub const BX_LR: u32 = 0xE12FFF1E; // BX LR (return)
    pub const MOV_PC_LR: u32 = 0xE1A0F00E; // MOV PC, LR (pre-v4T return)
}

/// Thumb halfword patterns.
pub mod thumb {
    pub const BX_LR: u16 = 0x4770;
    pub const NOP: u16 = 0x46C0; // MOV R8, R8
    pub const NOP_HINT: u16 = 0xBF00;
}

/// Words that are Thumb epilogues when read as a little-endian pair.
const THUMB_PAIRS: [u32; 3] = [
    ((thumb::NOP as u32) << 16) | thumb::BX_LR as u32,
    ((thumb::NOP_HINT as u32) << 16) | thumb::BX_LR as u32,
    ((thumb::BX_LR as u32) << 16) | thumb::BX_LR as u32,
];

/// Check if this is a POP (LDMFD SP!) instruction.
pub fn is_pop(instr: u32) -> bool {
    (instr & 0xFFFF0000) == 0xE8BD0000
}

/// Check if this is a POP that loads PC, i.e. a function return.
pub fn is_pop_pc(instr: u32) -> bool {
    is_pop(instr) && (instr & (1 << 15)) != 0
}

/// Adapter for ARM code with Thumb interworking.
///
/// A 4-aligned pointer is an ARM entry; an odd pointer is a Thumb entry at
/// `ptr - 1`. Anything else (2 mod 4) has no candidate.
#[derive(Debug, Clone, Copy)]
pub struct ArmThumbAdapter {
    /// Required alignment of ARM-mode entry points
    pub arm_alignment: u64,
}

impl Default for ArmThumbAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ArmThumbAdapter {
    /// Create an adapter with 4-byte ARM alignment.
    pub fn new() -> Self {
        Self { arm_alignment: 4 }
    }
}

impl ArchAdapter for ArmThumbAdapter {
    fn name(&self) -> &'static str {
        "arm-thumb"
    }

    fn capabilities(&self) -> AdapterCaps {
        AdapterCaps::all()
    }

    fn is_instruction_sentinel(&self, raw: u32) -> bool {
        matches!(
            raw,
            patterns::BX_LR | patterns::MOV_PC_LR | patterns::NOP | patterns::NOP_HINT
        ) || THUMB_PAIRS.contains(&raw)
            || is_pop_pc(raw)
    }

    fn candidates(&self, ptr: Address) -> Vec<ProbeHit> {
        let mut out = Vec::with_capacity(1);
        if ptr % self.arm_alignment == 0 {
            out.push(ProbeHit {
                mode: CodeMode::Arm,
                target: ptr,
            });
        }
        if ptr & 1 == 1 {
            out.push(ProbeHit {
                mode: CodeMode::Thumb,
                target: ptr - 1,
            });
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{FunctionInfo, MemorySession};

    fn session_with(entries: &[(Address, u64)]) -> MemorySession {
        let mut session = MemorySession::new();
        for (i, &(entry, size)) in entries.iter().enumerate() {
            session
                .add_function(
                    FunctionInfo {
                        name: format!("sub_{}", i),
                        entry_point: entry,
                        comment: None,
                    },
                    size,
                    vec![format!("{:08X}: PUSH {{R4,LR}}", entry)],
                )
                .unwrap();
        }
        session
    }

    #[test]
    fn test_sentinels() {
        let adapter = ArmThumbAdapter::new();
        assert!(adapter.is_instruction_sentinel(0xE12FFF1E));
        assert!(adapter.is_instruction_sentinel(0xE1A0F00E));
        assert!(adapter.is_instruction_sentinel(0x46C04770));
        assert!(adapter.is_instruction_sentinel(0xE8BD8010)); // POP {R4,PC}
        assert!(!adapter.is_instruction_sentinel(0xE8BD0010)); // POP {R4}
        assert!(!adapter.is_instruction_sentinel(0x0000_8001));
    }

    #[test]
    fn test_alignment_never_mixes_modes() {
        let adapter = ArmThumbAdapter::new();
        for ptr in (0x8000u64..0x8040).step_by(4) {
            assert!(adapter.candidates(ptr).iter().all(|c| c.mode == CodeMode::Arm));
        }
        for ptr in (0x8001u64..0x8040).step_by(2) {
            assert!(adapter.candidates(ptr).iter().all(|c| c.mode == CodeMode::Thumb));
        }
        assert!(adapter.candidates(0x8002).is_empty());
    }

    #[test]
    fn test_probe_arm_and_thumb() {
        let session = session_with(&[(0x8000, 0x20), (0x9000, 0x20)]);
        let adapter = ArmThumbAdapter::new();

        let hit = adapter.probe_function(&session, 0x8000).unwrap();
        assert_eq!(hit.mode, CodeMode::Arm);
        assert_eq!(hit.target, 0x8000);

        let hit = adapter.probe_function(&session, 0x9001).unwrap();
        assert_eq!(hit.mode, CodeMode::Thumb);
        assert_eq!(hit.target, 0x9000);
    }

    #[test]
    fn test_probe_rejects_mid_function() {
        let session = session_with(&[(0x8000, 0x40)]);
        let adapter = ArmThumbAdapter::new();
        assert!(adapter.probe_function(&session, 0x8010).is_none());
        assert!(adapter.probe_function(&session, 0x8011).is_none());
        assert!(adapter.probe_function(&session, 0xA000).is_none());
    }
}
