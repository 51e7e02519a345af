//! Jump-table slot validation.
//!
//! [`slot_check`] runs a fixed sequence of gates over one slot and stops
//! at the first failure, so every invalid slot carries exactly one error
//! code. [`scan`] batches it over a range; [`slot_process`] resolves a slot
//! and writes the result back to the session.

pub mod pattern;
mod process;

pub use process::slot_process;

use crate::architectures::{AdapterCaps, ArchAdapter};
use crate::error::ErrorCode;
use crate::session::Session;
use crate::types::{Address, JtScanResult, JtSlotResult, JumpTable, ScanRange, ScanSummary};
use tracing::{debug, warn};

/// Validate a single jump-table slot.
///
/// Gates, in order:
///
/// 1. the word must be readable (`TOOL_BINDING_MISSING`);
/// 2. it must not be an instruction encoding (`ARM_INSTRUCTION`);
/// 3. it must point into `[code_min, code_max)` (`OUT_OF_RANGE`);
/// 4. a candidate must land on a verified entry (`NO_FUNCTION_AT_TARGET`).
///
/// The sentinel gate precedes the range gate so an instruction word is
/// always reported as such, wherever its value happens to fall.
pub fn slot_check(
    session: &dyn Session,
    adapter: &dyn ArchAdapter,
    table: &JumpTable,
    slot: u32,
) -> JtSlotResult {
    let slot_addr = table.slot_addr(slot);
    let mut result = JtSlotResult {
        slot,
        slot_addr,
        raw: None,
        mode: None,
        target: None,
        notes: Vec::new(),
        errors: Vec::new(),
    };

    let Some(raw) = session.read_dword(slot_addr) else {
        debug!(slot, slot_addr = format_args!("0x{:X}", slot_addr), "slot unreadable");
        result.errors.push(ErrorCode::ToolBindingMissing);
        return result;
    };
    result.raw = Some(raw);

    if adapter.is_instruction_sentinel(raw) {
        debug!(slot, raw = format_args!("0x{:08X}", raw), "instruction sentinel");
        result
            .notes
            .push(format!("raw word 0x{:08X} is an instruction encoding", raw));
        result.errors.push(ErrorCode::ArmInstruction);
        return result;
    }

    let ptr = Address::from(raw);
    if !adapter.in_code_range(ptr, table.code_min, table.code_max) {
        debug!(slot, ptr = format_args!("0x{:X}", ptr), "pointer out of range");
        result.notes.push(format!(
            "0x{:08X} outside code range [0x{:08X}, 0x{:08X})",
            ptr, table.code_min, table.code_max
        ));
        result.errors.push(ErrorCode::OutOfRange);
        return result;
    }

    if !adapter.capabilities().contains(AdapterCaps::PROBE) {
        result.notes.push(format!(
            "{} adapter cannot probe entry points",
            adapter.name()
        ));
    }

    match adapter.probe_function(session, ptr) {
        Some(hit) => {
            debug!(slot, mode = %hit.mode, target = format_args!("0x{:X}", hit.target), "slot resolved");
            result
                .notes
                .push(format!("verified {} entry at 0x{:08X}", hit.mode, hit.target));
            result.mode = Some(hit.mode);
            result.target = Some(hit.target);
        }
        None => {
            let tried: Vec<String> = adapter
                .candidates(ptr)
                .iter()
                .map(|c| format!("{}@0x{:08X}", c.mode, c.target))
                .collect();
            if tried.is_empty() {
                result
                    .notes
                    .push(format!("no candidate entry for pointer 0x{:08X}", ptr));
            } else {
                result
                    .notes
                    .push(format!("no verified entry among {}", tried.join(", ")));
            }
            debug!(slot, ptr = format_args!("0x{:X}", ptr), "no function at target");
            result.errors.push(ErrorCode::NoFunctionAtTarget);
        }
    }

    result
}

/// Validate `count` consecutive slots starting at `start`.
///
/// Slot indices never wrap: a range running past `u32::MAX` is clamped, and
/// the returned `range.count` is the number of slots actually examined.
pub fn scan(
    session: &dyn Session,
    adapter: &dyn ArchAdapter,
    table: &JumpTable,
    start: u32,
    count: u32,
) -> JtScanResult {
    let available = u64::from(u32::MAX - start) + 1;
    let clamped = u32::try_from(u64::from(count).min(available)).unwrap_or(count);
    if clamped < count {
        warn!(start, requested = count, clamped, "scan range clamped at last slot index");
    }
    let count = clamped;

    let items: Vec<JtSlotResult> = (0..count)
        .map(|i| slot_check(session, adapter, table, start + i))
        .collect();

    let invalid = items.iter().filter(|i| !i.errors.is_empty()).count() as u32;
    let summary = ScanSummary {
        total: items.len() as u32,
        valid: items.len() as u32 - invalid,
        invalid,
    };
    debug!(start, count, valid = summary.valid, invalid, "scan complete");

    JtScanResult {
        range: ScanRange { start, count },
        summary,
        items,
    }
}
