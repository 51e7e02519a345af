//! Register-base tracking over a linear instruction stream.
//!
//! A deliberately small abstract interpreter: it only follows literal
//! loads, one level of pointer indirection through the literal pool, and
//! `ADD` of an immediate. Nothing is ever removed from the map; a later
//! definition simply overwrites an earlier one.

use super::classifier::Instruction;
use crate::types::{Address, OpKind};
use std::collections::HashMap;
use tracing::trace;

/// ARM reads PC as the instruction address plus eight.
pub const ARM_PC_OFFSET: u64 = 8;

/// Register name to resolved base address.
pub type RegisterBaseMap = HashMap<String, Address>;

/// Inline data address to literal word.
pub type MemoryLiteralMap = HashMap<Address, u64>;

/// The source operand of a load or store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemOperand {
    /// `=imm` pseudo-literal
    Literal(u64),
    /// `[PC, #off]`
    PcRelative(i64),
    /// `[Rb, #off]`
    BaseOffset {
        /// Upper-cased base register
        base: String,
        /// Immediate offset
        offset: i64,
    },
    /// Anything else (register offsets, labels, shifts)
    Other,
}

/// Split operands on commas outside brackets and braces.
pub fn split_operands(operands: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in operands.char_indices() {
        match c {
            '[' | '{' => depth += 1,
            ']' | '}' => depth -= 1,
            ',' if depth == 0 => {
                out.push(operands[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    let last = operands[start..].trim();
    if !last.is_empty() {
        out.push(last);
    }
    out
}

/// Normalise a register name.
pub fn register_name(text: &str) -> String {
    text.trim().trim_end_matches('!').to_ascii_uppercase()
}

/// Parse an immediate such as `#0x10`, `#-4`, `#16`, or `0x20`.
pub fn parse_immediate(text: &str) -> Option<i64> {
    let t = text.trim();
    let t = t.strip_prefix('#').unwrap_or(t).trim();
    let (negative, t) = match t.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, t),
    };
    let magnitude = if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else if let Some(hex) = t.strip_suffix('h') {
        i64::from_str_radix(hex, 16).ok()?
    } else {
        t.parse::<i64>().ok()?
    };
    Some(if negative { -magnitude } else { magnitude })
}

/// Parse the memory operand of a load or store.
pub fn parse_mem_operand(src: &str) -> MemOperand {
    let src = src.trim();
    if let Some(lit) = src.strip_prefix('=') {
        return match parse_immediate(lit) {
            Some(v) => MemOperand::Literal(v as u64),
            None => MemOperand::Other,
        };
    }

    let Some(inner) = src
        .strip_prefix('[')
        .and_then(|s| s.split_once(']'))
        .map(|(inner, _)| inner)
    else {
        return MemOperand::Other;
    };

    let parts = split_operands(inner);
    let base = match parts.first() {
        Some(b) if !b.is_empty() => register_name(b),
        _ => return MemOperand::Other,
    };
    let offset = match parts.get(1) {
        None => 0,
        Some(off) if off.trim_start().starts_with('#') => match parse_immediate(off) {
            Some(v) => v,
            None => return MemOperand::Other,
        },
        Some(_) => return MemOperand::Other,
    };

    if base == "PC" {
        MemOperand::PcRelative(offset)
    } else {
        MemOperand::BaseOffset { base, offset }
    }
}

/// Single-pass register-base tracker for one function scan.
#[derive(Debug)]
pub struct Tracker<'a> {
    bases: RegisterBaseMap,
    literals: &'a MemoryLiteralMap,
}

impl<'a> Tracker<'a> {
    /// Start a scan over the given literal pool.
    pub fn new(literals: &'a MemoryLiteralMap) -> Self {
        Self {
            bases: RegisterBaseMap::new(),
            literals,
        }
    }

    /// Resolved base for a register, if known.
    pub fn base(&self, register: &str) -> Option<Address> {
        self.bases.get(&register_name(register)).copied()
    }

    /// Literal word stored at `addr`.
    pub fn literal(&self, addr: Address) -> Option<u64> {
        self.literals.get(&addr).copied()
    }

    /// Literal fetched by `[PC, #offset]` at instruction address `addr`.
    pub fn pc_literal(&self, addr: Address, offset: i64) -> Option<u64> {
        self.literal(
            addr.wrapping_add(ARM_PC_OFFSET)
                .wrapping_add_signed(offset),
        )
    }

    /// Value a load places in its destination when it comes straight from
    /// a literal: `=imm` or a PC-relative pool entry.
    pub fn literal_load(&self, addr: Address, mem: &MemOperand) -> Option<u64> {
        match mem {
            MemOperand::Literal(v) => Some(*v),
            MemOperand::PcRelative(off) => self.pc_literal(addr, *off),
            _ => None,
        }
    }

    /// The current register map.
    pub fn bases(&self) -> &RegisterBaseMap {
        &self.bases
    }

    fn set(&mut self, register: String, value: Address) {
        trace!(register = %register, value = format_args!("0x{:X}", value), "base");
        self.bases.insert(register, value);
    }

    /// Update the map with the effects of one instruction.
    pub fn observe(&mut self, insn: &Instruction<'_>, kind: Option<OpKind>) {
        let ops = split_operands(insn.operands);

        if kind == Some(OpKind::Read) {
            let (Some(dst), Some(src)) = (ops.first(), ops.get(1)) else {
                return;
            };
            let dst = register_name(dst);
            let mem = parse_mem_operand(src);
            if let Some(v) = self.literal_load(insn.addr, &mem) {
                self.set(dst, v);
            } else if let MemOperand::BaseOffset { base, offset } = &mem {
                let pointer = self
                    .base(base)
                    .map(|b| b.wrapping_add_signed(*offset))
                    .and_then(|a| self.literal(a));
                if let Some(v) = pointer {
                    self.set(dst, v);
                }
            }
            return;
        }

        if insn.mnemonic.starts_with("ADD") {
            let (dst, src, imm) = match ops.as_slice() {
                [dst, src, imm] => (dst, src, imm),
                [dst, imm] => (dst, dst, imm),
                _ => return,
            };
            if !imm.trim_start().starts_with('#') {
                return;
            }
            let (Some(base), Some(imm)) = (self.base(src), parse_immediate(imm)) else {
                return;
            };
            self.set(register_name(dst), base.wrapping_add_signed(imm));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mmio::classifier::{classify_mnemonic, parse_line, Line};

    fn run(lines: &[&str], literals: &MemoryLiteralMap) -> RegisterBaseMap {
        let mut tracker = Tracker::new(literals);
        for line in lines {
            if let Some(Line::Instruction(insn)) = parse_line(line) {
                let kind = classify_mnemonic(&insn.mnemonic);
                tracker.observe(&insn, kind);
            }
        }
        tracker.bases().clone()
    }

    #[test]
    fn test_split_operands() {
        assert_eq!(split_operands("R0, [R1, #0x10]"), vec!["R0", "[R1, #0x10]"]);
        assert_eq!(split_operands("{R4, LR}"), vec!["{R4, LR}"]);
        assert_eq!(split_operands("R0,R0,#0x1"), vec!["R0", "R0", "#0x1"]);
        assert!(split_operands("").is_empty());
    }

    #[test]
    fn test_parse_mem_operand() {
        assert_eq!(parse_mem_operand("=0x50000000"), MemOperand::Literal(0x5000_0000));
        assert_eq!(parse_mem_operand("[PC,#0x8]"), MemOperand::PcRelative(8));
        assert_eq!(parse_mem_operand("[pc, #-4]"), MemOperand::PcRelative(-4));
        assert_eq!(
            parse_mem_operand("[r4, #0x10]"),
            MemOperand::BaseOffset {
                base: "R4".into(),
                offset: 0x10
            }
        );
        assert_eq!(
            parse_mem_operand("[R4]"),
            MemOperand::BaseOffset {
                base: "R4".into(),
                offset: 0
            }
        );
        assert_eq!(parse_mem_operand("[R4, R5]"), MemOperand::Other);
        assert_eq!(parse_mem_operand("R4"), MemOperand::Other);
    }

    #[test]
    fn test_literal_and_add() {
        let literals = MemoryLiteralMap::new();
        let bases = run(
            &[
                "00001000: LDR R4,=0x40000000",
                "00001004: ADD R5,R4,#0x100",
                "00001008: ADD R5,#0x4",
            ],
            &literals,
        );
        assert_eq!(bases.get("R4"), Some(&0x4000_0000));
        assert_eq!(bases.get("R5"), Some(&0x4000_0104));
    }

    #[test]
    fn test_pc_relative_uses_arm_offset() {
        let mut literals = MemoryLiteralMap::new();
        literals.insert(0x1010, 0x4800_0000);
        let bases = run(&["00001000: LDR R3,[PC,#0x8]"], &literals);
        assert_eq!(bases.get("R3"), Some(&0x4800_0000));
    }

    #[test]
    fn test_pointer_to_pointer() {
        let mut literals = MemoryLiteralMap::new();
        literals.insert(0x2000, 0x2100);
        literals.insert(0x2104, 0x5000_1000);
        let bases = run(
            &["00001000: LDR R0,=0x2000", "00001004: LDR R1,[R0,#0x0]", "00001008: LDR R2,[R1,#4]"],
            &literals,
        );
        assert_eq!(bases.get("R1"), Some(&0x2100));
        assert_eq!(bases.get("R2"), Some(&0x5000_1000));
    }

    #[test]
    fn test_unknown_base_leaves_map_alone() {
        let literals = MemoryLiteralMap::new();
        let bases = run(
            &["00001000: LDR R0,[R1,#0x10]", "00001004: ADD R2,R3,#4"],
            &literals,
        );
        assert!(bases.is_empty());
    }
}
