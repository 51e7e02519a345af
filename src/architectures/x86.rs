//! x86/x86-64 jump-table slot analysis.

use super::{AdapterCaps, ArchAdapter, ProbeHit};
use crate::types::{Address, CodeMode};

/// Common x86 opcodes seen where a pointer was expected.
pub mod opcodes {
    pub const NOP: u8 = 0x90;
    pub const RET: u8 = 0xC3;
    pub const INT3: u8 = 0xCC;
    pub const LEAVE: u8 = 0xC9;
    pub const POP_EBP: u8 = 0x5D;
}

/// Check if the low bytes of a little-endian word form an epilogue
/// followed only by padding.
fn is_padded_epilogue(bytes: [u8; 4]) -> bool {
    let body = match bytes {
        [opcodes::LEAVE, opcodes::RET, rest @ ..] | [opcodes::POP_EBP, opcodes::RET, rest @ ..] => {
            rest.to_vec()
        }
        [opcodes::RET, rest @ ..] => rest.to_vec(),
        _ => return false,
    };
    body.iter()
        .all(|&b| b == opcodes::INT3 || b == opcodes::NOP)
}

/// Adapter for x86 code. Entries are byte-aligned, so every in-range
/// pointer is its own single candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct X86Adapter;

impl X86Adapter {
    /// Create the adapter.
    pub fn new() -> Self {
        Self
    }
}

impl ArchAdapter for X86Adapter {
    fn name(&self) -> &'static str {
        "x86"
    }

    fn capabilities(&self) -> AdapterCaps {
        AdapterCaps::all()
    }

    fn is_instruction_sentinel(&self, raw: u32) -> bool {
        let bytes = raw.to_le_bytes();
        bytes.iter().all(|&b| b == opcodes::INT3)
            || bytes.iter().all(|&b| b == opcodes::NOP)
            || is_padded_epilogue(bytes)
    }

    fn candidates(&self, ptr: Address) -> Vec<ProbeHit> {
        vec![ProbeHit {
            mode: CodeMode::X86,
            target: ptr,
        }]
    }
}
