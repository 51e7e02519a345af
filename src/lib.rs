//! Bridge Heuristics - Jump-Table and MMIO Analysis over Disassembler Sessions
//!
//! This library provides the address-level reasoning behind a
//! reverse-engineering automation bridge. It works from what a live
//! disassembler session exposes (text disassembly, 32-bit memory words,
//! function metadata) and never decodes raw bytes itself.
//!
//! # Features
//!
//! - **Jump-Table Validation**: Classifies each table slot as an ARM or Thumb
//!   entry, an instruction word, or out-of-range garbage
//! - **Write-Back with Verification**: Renames and comments resolved targets,
//!   then reads them back instead of trusting the write call
//! - **MMIO Classification**: Finds register reads, writes, and bitwise
//!   read-modify-write steps in a function
//! - **Base-Register Tracking**: Resolves addresses reached through literal
//!   pools and base-plus-offset addressing
//!
//! # Quick Start
//!
//! ```rust
//! use bridge_heuristics::{adapter_for_name, scan, JumpTable, MemorySession};
//!
//! let mut session = MemorySession::new();
//! session.map_words(0x2000, &[0xE12FFF1E])?;
//!
//! let adapter = adapter_for_name("arm");
//! let table = JumpTable::new(0x2000, 0x8000, 0x10000);
//! let result = scan(&session, adapter.as_ref(), &table, 0, 1);
//! assert_eq!(result.summary.invalid, 1);
//! # Ok::<(), bridge_heuristics::BridgeError>(())
//! ```
//!
//! # Collaborators
//!
//! Everything the analyses need from the disassembler goes through the
//! [`Session`] trait. [`MemorySession`] is an in-memory implementation
//! loaded from a JSON fixture.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::similar_names)]
#![allow(clippy::too_many_lines)]

pub mod architectures;
pub mod error;
pub mod formatter;
pub mod jumptable;
pub mod mmio;
pub mod session;
pub mod types;

pub use architectures::{adapter_for, adapter_for_name, ArchAdapter, ArmThumbAdapter, FallbackAdapter, X86Adapter};
pub use error::{BridgeError, ErrorCode, Result};
pub use jumptable::{scan, slot_check, slot_process};
pub use mmio::{annotate, classify_lines};
pub use session::{FunctionInfo, MemorySession, Session};
pub use types::{
    Address, AnnotateOptions, Architecture, CodeMode, JtProcessResult, JtScanResult,
    JtSlotResult, JumpTable, MmioReport, MmioSample, OpKind, Operation, ProcessOptions,
};

/// Get version information for this library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Reject batches larger than the caller allows.
///
/// The analyses themselves accept any size; this is the check a caller
/// applies before dispatching a scan.
pub fn check_batch_size(count: u32, limit: u32) -> Result<()> {
    if count > limit {
        return Err(BridgeError::ConfigError {
            message: format!("batch of {} slots exceeds limit of {}", count, limit),
        });
    }
    Ok(())
}
