//! Architecture adapters for jump-table validation.
//!
//! Each supported architecture implements [`ArchAdapter`]: a stateless
//! strategy answering three questions about a candidate code pointer. Is it
//! inside the code range? Is the raw word actually an instruction encoding?
//! Which (mode, entry point) does it verifiably land on? Callers choose one
//! adapter per request with [`adapter_for`].

pub mod arm;
pub mod x86;

use crate::session::Session;
use crate::types::{Address, Architecture, CodeMode};
use bitflags::bitflags;

pub use arm::ArmThumbAdapter;
pub use x86::X86Adapter;

bitflags! {
    /// Checks an adapter can actually perform.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AdapterCaps: u8 {
        /// Half-open code range test
        const RANGE = 0b001;
        /// Instruction-sentinel recognition
        const SENTINEL = 0b010;
        /// Entry-point probing through the session
        const PROBE = 0b100;
    }
}

/// A verified probe result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeHit {
    /// Code mode of the landing
    pub mode: CodeMode,
    /// Function entry point
    pub target: Address,
}

/// Architecture-specific pointer validation.
pub trait ArchAdapter {
    /// Short adapter name for notes and logs.
    fn name(&self) -> &'static str;

    /// Which checks this adapter performs.
    fn capabilities(&self) -> AdapterCaps;

    /// Half-open range test: `code_min <= ptr < code_max`.
    fn in_code_range(&self, ptr: Address, code_min: Address, code_max: Address) -> bool {
        code_min <= ptr && ptr < code_max
    }

    /// Whether `raw` is a known instruction encoding rather than a pointer.
    fn is_instruction_sentinel(&self, raw: u32) -> bool;

    /// Candidate (mode, target) pairs for `ptr`, in preference order.
    fn candidates(&self, ptr: Address) -> Vec<ProbeHit>;

    /// Find the first candidate that lands on a verified function entry.
    fn probe_function(&self, session: &dyn Session, ptr: Address) -> Option<ProbeHit> {
        self.candidates(ptr)
            .into_iter()
            .find(|c| verify_entry(session, c.target))
    }
}

/// Disassembly at `target` must succeed and the function recorded there
/// must start exactly at `target`.
pub fn verify_entry(session: &dyn Session, target: Address) -> bool {
    if session.disassemble_function(target).is_empty() {
        tracing::trace!(target = format_args!("0x{:X}", target), "no disassembly");
        return false;
    }
    match session.get_function_by_address(target) {
        Some(info) if info.entry_point == target => true,
        Some(info) => {
            tracing::trace!(
                target = format_args!("0x{:X}", target),
                entry = format_args!("0x{:X}", info.entry_point),
                "mid-function landing"
            );
            false
        }
        None => false,
    }
}

/// Range-only adapter for architectures without dedicated support.
///
/// Never reports a sentinel and never probes, so every in-range slot ends
/// up as `NO_FUNCTION_AT_TARGET` rather than a guessed target.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackAdapter;

impl ArchAdapter for FallbackAdapter {
    fn name(&self) -> &'static str {
        "fallback"
    }

    fn capabilities(&self) -> AdapterCaps {
        AdapterCaps::RANGE
    }

    fn is_instruction_sentinel(&self, _raw: u32) -> bool {
        false
    }

    fn candidates(&self, _ptr: Address) -> Vec<ProbeHit> {
        Vec::new()
    }

    fn probe_function(&self, _session: &dyn Session, _ptr: Address) -> Option<ProbeHit> {
        None
    }
}

/// Select the adapter for an architecture.
pub fn adapter_for(arch: Architecture) -> Box<dyn ArchAdapter> {
    match arch {
        Architecture::ArmThumb => Box::new(ArmThumbAdapter::new()),
        Architecture::X86 => Box::new(X86Adapter::new()),
        Architecture::Unknown => Box::new(FallbackAdapter),
    }
}

/// Select the adapter for an architecture name such as `"arm"` or `"x86_64"`.
pub fn adapter_for_name(name: &str) -> Box<dyn ArchAdapter> {
    adapter_for(name.parse().unwrap_or(Architecture::Unknown))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{FunctionInfo, MemorySession};

    #[test]
    fn test_half_open_range() {
        let adapter = FallbackAdapter;
        assert!(adapter.in_code_range(0x1000, 0x1000, 0x2000));
        assert!(adapter.in_code_range(0x1FFF, 0x1000, 0x2000));
        assert!(!adapter.in_code_range(0x2000, 0x1000, 0x2000));
        assert!(!adapter.in_code_range(0x0FFF, 0x1000, 0x2000));
        assert!(!adapter.in_code_range(0x1000, 0x1000, 0x1000));
    }

    #[test]
    fn test_fallback_never_probes() {
        let mut session = MemorySession::new();
        session
            .add_function(
                FunctionInfo {
                    name: "f".into(),
                    entry_point: 0x1000,
                    comment: None,
                },
                8,
                vec!["00001000: BX LR".into()],
            )
            .unwrap();
        let adapter = FallbackAdapter;
        assert!(adapter.probe_function(&session, 0x1000).is_none());
        assert!(!adapter.is_instruction_sentinel(arm::patterns::BX_LR));
        assert_eq!(adapter.capabilities(), AdapterCaps::RANGE);
    }

    #[test]
    fn test_adapter_selection() {
        assert_eq!(adapter_for_name("thumb").name(), "arm-thumb");
        assert_eq!(adapter_for_name("x86_64").name(), "x86");
        assert_eq!(adapter_for_name("sparc").name(), "fallback");
        assert!(adapter_for(Architecture::ArmThumb)
            .capabilities()
            .contains(AdapterCaps::PROBE | AdapterCaps::SENTINEL));
    }
}
