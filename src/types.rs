//! Core types for the bridge heuristics.
//!
//! This module defines the result shapes produced by the jump-table and
//! MMIO analyses, the option structs that configure them, and the small
//! identifiers (architectures, code modes, operation kinds) they share.

use crate::error::{BridgeError, ErrorCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A program address in the analysed session.
pub type Address = u64;

/// Parse an address written as `0x`-prefixed hex, `h`-suffixed hex, or
/// plain decimal.
pub fn parse_address(text: &str) -> crate::Result<Address> {
    let t = text.trim();
    let parsed = if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else if let Some(hex) = t.strip_suffix('h').or_else(|| t.strip_suffix('H')) {
        u64::from_str_radix(hex, 16).ok()
    } else {
        t.parse::<u64>().ok()
    };
    parsed.ok_or_else(|| BridgeError::InvalidAddress {
        value: text.to_string(),
    })
}

/// Serde helpers rendering addresses and words as `0x`-prefixed hex.
pub(crate) mod hex_serde {
    use serde::Serializer;

    pub fn addr<S: Serializer>(value: &u64, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&format_args!("0x{:08X}", value))
    }

    pub fn opt_addr<S: Serializer>(value: &Option<u64>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => addr(v, s),
            None => s.serialize_none(),
        }
    }

    pub fn opt_word<S: Serializer>(value: &Option<u32>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => s.collect_str(&format_args!("0x{:08X}", v)),
            None => s.serialize_none(),
        }
    }
}

/// Architecture families with a dedicated adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Architecture {
    /// 32-bit ARM with interworking Thumb code
    ArmThumb,
    /// x86 / x86-64
    X86,
    /// Anything without a dedicated adapter
    Unknown,
}

impl Architecture {
    /// Get the human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Architecture::ArmThumb => "ARM/Thumb",
            Architecture::X86 => "x86",
            Architecture::Unknown => "unknown",
        }
    }
}

impl FromStr for Architecture {
    type Err = std::convert::Infallible;

    /// Unrecognised names select [`Architecture::Unknown`] rather than failing.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let arch = match s.trim().to_ascii_lowercase().as_str() {
            "arm" | "thumb" | "armv7" | "arm32" | "armv4t" | "armv5" | "armv6" | "cortex-m"
            | "arm_thumb" => Architecture::ArmThumb,
            "x86" | "x86_64" | "x86-64" | "i386" | "i686" | "amd64" => Architecture::X86,
            _ => Architecture::Unknown,
        };
        Ok(arch)
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Architecture::ArmThumb => "arm",
            Architecture::X86 => "x86",
            Architecture::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Instruction-set mode a jump-table slot resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodeMode {
    /// 32-bit ARM code at a 4-aligned address
    #[serde(rename = "ARM")]
    Arm,
    /// Thumb code, pointer carried the interworking bit
    #[serde(rename = "Thumb")]
    Thumb,
    /// x86 code
    #[serde(rename = "x86")]
    X86,
}

impl fmt::Display for CodeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CodeMode::Arm => "ARM",
            CodeMode::Thumb => "Thumb",
            CodeMode::X86 => "x86",
        };
        f.pad(s)
    }
}

/// A jump table located in the session, plus the code range its slots may
/// legitimately point into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JumpTable {
    /// Address of slot 0
    pub base: Address,
    /// Inclusive lower bound of the code range
    pub code_min: Address,
    /// Exclusive upper bound of the code range
    pub code_max: Address,
}

impl JumpTable {
    /// Size of one slot in bytes.
    pub const SLOT_SIZE: u64 = 4;

    /// Create a jump table description.
    pub fn new(base: Address, code_min: Address, code_max: Address) -> Self {
        Self {
            base,
            code_min,
            code_max,
        }
    }

    /// Address of the given slot.
    pub fn slot_addr(&self, slot: u32) -> Address {
        self.base
            .wrapping_add(Self::SLOT_SIZE.wrapping_mul(u64::from(slot)))
    }
}

/// Outcome of validating one jump-table slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JtSlotResult {
    /// Slot index within the table
    pub slot: u32,
    /// Address the slot was read from
    #[serde(serialize_with = "hex_serde::addr")]
    pub slot_addr: Address,
    /// Raw word stored in the slot
    #[serde(serialize_with = "hex_serde::opt_word")]
    pub raw: Option<u32>,
    /// Resolved code mode
    pub mode: Option<CodeMode>,
    /// Verified function entry point
    #[serde(serialize_with = "hex_serde::opt_addr")]
    pub target: Option<Address>,
    /// Informational notes
    pub notes: Vec<String>,
    /// Error codes; non-empty means `target` is `None`
    pub errors: Vec<ErrorCode>,
}

impl JtSlotResult {
    /// Whether the slot resolved to a verified target.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty() && self.target.is_some()
    }
}

/// Range requested for a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanRange {
    /// First slot index
    pub start: u32,
    /// Number of slots
    pub count: u32,
}

/// Totals for a scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    /// Slots examined
    pub total: u32,
    /// Slots with a verified target
    pub valid: u32,
    /// Slots with at least one error
    pub invalid: u32,
}

/// Outcome of scanning consecutive jump-table slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JtScanResult {
    /// Requested range
    pub range: ScanRange,
    /// Totals
    pub summary: ScanSummary,
    /// Per-slot results in index order
    pub items: Vec<JtSlotResult>,
}

/// Writes performed by a slot process call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriteOutcome {
    /// Rename reported success
    pub renamed: bool,
    /// Comment write reported success
    pub comment_set: bool,
}

/// Read-back of the target function after (or instead of) writing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerifyOutcome {
    /// Function name as read back
    pub name: Option<String>,
    /// Whether a comment is present on the function
    pub comment_present: bool,
}

/// Outcome of resolving a slot and writing its name and comment back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JtProcessResult {
    /// The underlying slot resolution
    #[serde(flatten)]
    pub slot: JtSlotResult,
    /// Write calls and their reported status
    pub writes: WriteOutcome,
    /// Independent read-back
    pub verify: VerifyOutcome,
}

/// Kind of MMIO access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OpKind {
    /// Word load
    Read,
    /// Word store
    Write,
    /// Bitwise OR (set bits)
    Or,
    /// Bitwise AND / bit clear
    And,
    /// Exclusive OR (toggle bits)
    Toggle,
}

impl OpKind {
    /// Whether this kind addresses memory (as opposed to masking a value).
    pub fn is_memory_access(&self) -> bool {
        matches!(self, OpKind::Read | OpKind::Write)
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OpKind::Read => "READ",
            OpKind::Write => "WRITE",
            OpKind::Or => "OR",
            OpKind::And => "AND",
            OpKind::Toggle => "TOGGLE",
        };
        f.pad(s)
    }
}

/// A classified MMIO operation with its resolved target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Operation {
    /// Instruction address
    #[serde(serialize_with = "hex_serde::addr")]
    pub addr: Address,
    /// Operation kind
    pub op: OpKind,
    /// Accessed address (READ/WRITE) or mask value (bitwise kinds)
    #[serde(serialize_with = "hex_serde::addr")]
    pub target: Address,
}

/// One sampled operation in an MMIO report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MmioSample {
    /// Instruction address
    #[serde(serialize_with = "hex_serde::addr")]
    pub addr: Address,
    /// Operation kind
    pub op: OpKind,
    /// Resolved target
    #[serde(serialize_with = "hex_serde::addr")]
    pub target: Address,
    /// `target` when non-zero, else the instruction address
    #[serde(serialize_with = "hex_serde::addr")]
    pub address_abs: Address,
}

impl From<Operation> for MmioSample {
    fn from(op: Operation) -> Self {
        Self {
            addr: op.addr,
            op: op.op,
            target: op.target,
            address_abs: if op.target != 0 { op.target } else { op.addr },
        }
    }
}

/// MMIO classification report for one function.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MmioReport {
    /// Function address that was scanned
    #[serde(serialize_with = "hex_serde::addr")]
    pub function: Address,
    /// Function name, when metadata exists
    pub function_name: Option<String>,
    /// READ operations with a resolved target
    pub reads: usize,
    /// WRITE operations with a resolved target
    pub writes: usize,
    /// OR operations
    pub bitwise_or: usize,
    /// AND / BIC operations
    pub bitwise_and: usize,
    /// EOR / XOR operations
    pub toggles: usize,
    /// READ/WRITE operations dropped for lack of a target
    pub skipped: usize,
    /// Comments actually written
    pub annotated: usize,
    /// Sampled operations in address order
    pub samples: Vec<MmioSample>,
    /// Informational notes
    pub notes: Vec<String>,
}

/// Options for [`crate::jumptable::slot_process`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOptions {
    /// Name pattern with `{slot}` / `{target}` fields
    pub rename_pattern: String,
    /// Comment pattern with the same fields
    pub comment_pattern: String,
    /// Only read; never call a write collaborator
    pub dry_run: bool,
    /// Global write enablement
    pub writes_enabled: bool,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessOptions {
    /// Default patterns with writes disabled.
    pub fn new() -> Self {
        Self {
            rename_pattern: String::from("jt_case_{slot}_{target}"),
            comment_pattern: String::from("jump table slot {slot} -> 0x{target:08X}"),
            dry_run: false,
            writes_enabled: false,
        }
    }

    /// Read-only preview.
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            ..Self::new()
        }
    }

    /// Set the rename pattern.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.rename_pattern = pattern.into();
        self
    }

    /// Enable or disable writes.
    pub fn with_writes(mut self, enabled: bool) -> Self {
        self.writes_enabled = enabled;
        self
    }
}

/// Options for [`crate::mmio::annotate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotateOptions {
    /// Maximum number of samples kept (and annotated)
    pub max_samples: usize,
    /// Only read; never write comments
    pub dry_run: bool,
    /// Global write enablement
    pub writes_enabled: bool,
}

impl Default for AnnotateOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl AnnotateOptions {
    /// Default sample cap with writes disabled.
    pub fn new() -> Self {
        Self {
            max_samples: 32,
            dry_run: false,
            writes_enabled: false,
        }
    }

    /// Read-only preview.
    pub fn preview() -> Self {
        Self {
            dry_run: true,
            ..Self::new()
        }
    }

    /// Set the sample cap.
    pub fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples;
        self
    }

    /// Enable or disable writes.
    pub fn with_writes(mut self, enabled: bool) -> Self {
        self.writes_enabled = enabled;
        self
    }

    /// Whether comments may be written.
    pub fn may_write(&self) -> bool {
        !self.dry_run && self.writes_enabled
    }
}
