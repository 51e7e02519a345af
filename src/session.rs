//! The analysis-session collaborator.
//!
//! [`Session`] is the seam between the heuristics and whatever disassembler
//! backs them. Reads take `&self`; writes take `&mut self` so a caller can
//! see from the signature which entry points mutate program state.
//!
//! [`MemorySession`] is an in-memory implementation loaded from a JSON
//! fixture. It backs the CLI and the test suites.

use crate::error::{BridgeError, Result};
use crate::types::{parse_address, Address};
use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::path::Path;

/// Function metadata as reported by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionInfo {
    /// Current function name
    pub name: String,
    /// Recorded entry point
    pub entry_point: Address,
    /// Function-level comment, if any
    pub comment: Option<String>,
}

/// Read and write access to a live analysis session.
pub trait Session {
    /// Read a 32-bit little-endian word.
    fn read_dword(&self, address: Address) -> Option<u32>;

    /// Disassemble the function containing `address`, one line per item.
    ///
    /// An empty vector means disassembly failed.
    fn disassemble_function(&self, address: Address) -> Vec<String>;

    /// Look up the function containing `address`.
    fn get_function_by_address(&self, address: Address) -> Option<FunctionInfo>;

    /// Rename the function at `address`.
    fn rename_function(&mut self, address: Address, new_name: &str) -> bool;

    /// Set the decompiler (function-level) comment at `address`.
    fn set_decompiler_comment(&mut self, address: Address, text: &str) -> bool;

    /// Set the disassembly (line-level) comment at `address`.
    fn set_disassembly_comment(&mut self, address: Address, text: &str) -> bool;
}

/// One write call observed by a [`MemorySession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteRecord {
    /// `rename_function`
    Rename { address: Address, name: String },
    /// `set_decompiler_comment`
    DecompilerComment { address: Address, text: String },
    /// `set_disassembly_comment`
    DisassemblyComment { address: Address, text: String },
}

fn de_address<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Address, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u64),
        Text(String),
    }
    match Raw::deserialize(d)? {
        Raw::Num(n) => Ok(n),
        Raw::Text(s) => parse_address(&s).map_err(serde::de::Error::custom),
    }
}

/// A contiguous run of memory in a fixture, hex-encoded.
#[derive(Debug, Clone, Deserialize)]
pub struct SegmentFixture {
    /// Load address of the first byte
    #[serde(deserialize_with = "de_address")]
    pub base: Address,
    /// Bytes as a hex string (whitespace ignored)
    pub bytes: String,
}

/// A function in a fixture.
#[derive(Debug, Clone, Deserialize)]
pub struct FunctionFixture {
    /// Function name
    pub name: String,
    /// Entry point
    #[serde(deserialize_with = "de_address")]
    pub entry_point: Address,
    /// Size in bytes; defaults to four bytes per disassembly line
    #[serde(default)]
    pub size: Option<u64>,
    /// Function-level comment
    #[serde(default)]
    pub comment: Option<String>,
    /// Disassembly lines
    #[serde(default)]
    pub disassembly: Vec<String>,
}

/// Top-level fixture document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionFixture {
    /// Memory segments
    #[serde(default)]
    pub segments: Vec<SegmentFixture>,
    /// Functions
    #[serde(default)]
    pub functions: Vec<FunctionFixture>,
}

#[derive(Debug, Clone)]
struct Segment {
    base: Address,
    end: Address,
    bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
struct FunctionRecord {
    info: FunctionInfo,
    end: Address,
    disassembly: Vec<String>,
}

impl FunctionRecord {
    fn contains(&self, address: Address) -> bool {
        address >= self.info.entry_point && address < self.end
    }
}

fn region_end(kind: &'static str, base: Address, len: u64) -> Result<Address> {
    base.checked_add(len)
        .ok_or(BridgeError::AddressOverflow { kind, address: base })
}

/// In-memory session backed by byte segments and function records.
#[derive(Debug, Clone, Default)]
pub struct MemorySession {
    segments: Vec<Segment>,
    functions: BTreeMap<Address, FunctionRecord>,
    line_comments: BTreeMap<Address, String>,
    write_log: Vec<WriteRecord>,
}

impl MemorySession {
    /// Create an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a session from a JSON fixture file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Load a session from a JSON fixture string.
    pub fn from_json(text: &str) -> Result<Self> {
        let fixture: SessionFixture = serde_json::from_str(text)?;
        Self::from_fixture(fixture)
    }

    /// Build a session from a parsed fixture.
    pub fn from_fixture(fixture: SessionFixture) -> Result<Self> {
        let mut session = Self::new();
        for seg in fixture.segments {
            let cleaned: String = seg.bytes.split_whitespace().collect();
            let bytes = hex::decode(&cleaned).map_err(|e| BridgeError::InvalidHex {
                base: seg.base,
                message: e.to_string(),
            })?;
            session.map_bytes(seg.base, bytes)?;
        }
        for func in fixture.functions {
            let size = func
                .size
                .unwrap_or_else(|| (func.disassembly.len().max(1) as u64).saturating_mul(4));
            session.add_function(
                FunctionInfo {
                    name: func.name,
                    entry_point: func.entry_point,
                    comment: func.comment,
                },
                size,
                func.disassembly,
            )?;
        }
        Ok(session)
    }

    /// Map raw bytes at `base`.
    pub fn map_bytes(&mut self, base: Address, bytes: Vec<u8>) -> Result<()> {
        let end = region_end("segment", base, bytes.len() as u64)?;
        let seg = Segment { base, end, bytes };
        if self
            .segments
            .iter()
            .any(|s| seg.base < s.end && s.base < seg.end)
        {
            return Err(BridgeError::Overlap {
                kind: "segment",
                address: base,
            });
        }
        self.segments.push(seg);
        Ok(())
    }

    /// Map little-endian words starting at `base`.
    pub fn map_words(&mut self, base: Address, words: &[u32]) -> Result<()> {
        let mut bytes = vec![0u8; words.len() * 4];
        LittleEndian::write_u32_into(words, &mut bytes);
        self.map_bytes(base, bytes)
    }

    /// Register a function.
    pub fn add_function(
        &mut self,
        info: FunctionInfo,
        size: u64,
        disassembly: Vec<String>,
    ) -> Result<()> {
        let entry = info.entry_point;
        let end = region_end("function", entry, size.max(1))?;
        let record = FunctionRecord {
            info,
            end,
            disassembly,
        };
        if self
            .functions
            .values()
            .any(|f| entry < f.end && f.info.entry_point < end)
        {
            return Err(BridgeError::Overlap {
                kind: "function",
                address: entry,
            });
        }
        self.functions.insert(entry, record);
        Ok(())
    }

    /// Every write call made so far, in order.
    pub fn write_log(&self) -> &[WriteRecord] {
        &self.write_log
    }

    /// Line comment stored at `address`.
    pub fn line_comment(&self, address: Address) -> Option<&str> {
        self.line_comments.get(&address).map(String::as_str)
    }

    fn function_containing(&self, address: Address) -> Option<&FunctionRecord> {
        self.functions
            .range(..=address)
            .next_back()
            .map(|(_, f)| f)
            .filter(|f| f.contains(address))
    }
}

impl Session for MemorySession {
    fn read_dword(&self, address: Address) -> Option<u32> {
        let seg = self
            .segments
            .iter()
            .find(|s| address >= s.base && address.checked_add(4).is_some_and(|e| e <= s.end))?;
        let offset = usize::try_from(address - seg.base).ok()?;
        Some(LittleEndian::read_u32(&seg.bytes[offset..offset + 4]))
    }

    fn disassemble_function(&self, address: Address) -> Vec<String> {
        self.function_containing(address)
            .map(|f| f.disassembly.clone())
            .unwrap_or_default()
    }

    fn get_function_by_address(&self, address: Address) -> Option<FunctionInfo> {
        self.function_containing(address).map(|f| f.info.clone())
    }

    fn rename_function(&mut self, address: Address, new_name: &str) -> bool {
        self.write_log.push(WriteRecord::Rename {
            address,
            name: new_name.to_string(),
        });
        match self.functions.get_mut(&address) {
            Some(f) if !new_name.is_empty() => {
                f.info.name = new_name.to_string();
                true
            }
            _ => false,
        }
    }

    fn set_decompiler_comment(&mut self, address: Address, text: &str) -> bool {
        self.write_log.push(WriteRecord::DecompilerComment {
            address,
            text: text.to_string(),
        });
        match self.functions.get_mut(&address) {
            Some(f) => {
                f.info.comment = Some(text.to_string());
                true
            }
            None => false,
        }
    }

    fn set_disassembly_comment(&mut self, address: Address, text: &str) -> bool {
        self.write_log.push(WriteRecord::DisassemblyComment {
            address,
            text: text.to_string(),
        });
        if self.function_containing(address).is_none() {
            return false;
        }
        self.line_comments.insert(address, text.to_string());
        true
    }
}
