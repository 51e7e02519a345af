//! Error types for the bridge heuristics.
//!
//! Two layers live here. [`ErrorCode`] is the per-item taxonomy that jump-table
//! and MMIO results carry as data; it never escapes as a Rust error.
//! [`BridgeError`] covers the surfaces around the core: loading session
//! fixtures, parsing addresses, and caller-level configuration limits.

use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Primary error type for the surfaces around the heuristics core.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON in a session fixture.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A segment's byte payload is not valid hex.
    #[error("Invalid hex data in segment at 0x{base:X}: {message}")]
    InvalidHex { base: u64, message: String },

    /// An address string could not be parsed.
    #[error("Invalid address: {value:?}")]
    InvalidAddress { value: String },

    /// Two segments or functions overlap in a session fixture.
    #[error("Overlapping {kind} at 0x{address:X}")]
    Overlap { kind: &'static str, address: u64 },

    /// A segment or function runs past the end of the address space.
    #[error("{kind} at 0x{address:X} extends past the end of the address space")]
    AddressOverflow { kind: &'static str, address: u64 },

    /// Configuration error (e.g. a batch larger than the caller allows).
    #[error("Configuration error: {message}")]
    ConfigError { message: String },
}

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Per-item error codes reported inside jump-table results.
///
/// These are expected, recoverable conditions. They serialize as their
/// upper-case code string (`FORMAT_ERROR:<field>` for pattern failures).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The word reader could not read the slot.
    ToolBindingMissing,
    /// The slot's pointer lies outside the code range.
    OutOfRange,
    /// The slot holds an instruction encoding rather than a pointer.
    ArmInstruction,
    /// No candidate landed on a verified function entry.
    NoFunctionAtTarget,
    /// Writes are disabled for this session.
    WriteDisabledDryRun,
    /// A write failed, or its read-back did not confirm it.
    WriteVerifyFailed,
    /// The rename pattern referenced an unknown or malformed field.
    FormatError(String),
}

impl ErrorCode {
    /// The stable code string for this error.
    pub fn code(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::ToolBindingMissing => write!(f, "TOOL_BINDING_MISSING"),
            ErrorCode::OutOfRange => write!(f, "OUT_OF_RANGE"),
            ErrorCode::ArmInstruction => write!(f, "ARM_INSTRUCTION"),
            ErrorCode::NoFunctionAtTarget => write!(f, "NO_FUNCTION_AT_TARGET"),
            ErrorCode::WriteDisabledDryRun => write!(f, "WRITE_DISABLED_DRY_RUN"),
            ErrorCode::WriteVerifyFailed => write!(f, "WRITE_VERIFY_FAILED"),
            ErrorCode::FormatError(field) => write!(f, "FORMAT_ERROR:{}", field),
        }
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BridgeError::InvalidHex {
            base: 0x8000,
            message: "odd length".into(),
        };
        assert!(err.to_string().contains("8000"));
        assert!(err.to_string().contains("odd length"));
    }

    #[test]
    fn test_code_strings() {
        assert_eq!(ErrorCode::OutOfRange.to_string(), "OUT_OF_RANGE");
        assert_eq!(ErrorCode::ArmInstruction.code(), "ARM_INSTRUCTION");
        assert_eq!(
            ErrorCode::FormatError("name".into()).to_string(),
            "FORMAT_ERROR:name"
        );
    }

    #[test]
    fn test_code_serializes_as_string() {
        let json = serde_json::to_string(&vec![
            ErrorCode::NoFunctionAtTarget,
            ErrorCode::WriteVerifyFailed,
        ])
        .unwrap();
        assert_eq!(json, r#"["NO_FUNCTION_AT_TARGET","WRITE_VERIFY_FAILED"]"#);
    }
}
