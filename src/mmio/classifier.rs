//! Disassembly line parsing and mnemonic classification.
//!
//! Lines arrive as `"<hex-address>: <text>"`, optionally with a hex-bytes
//! column between the address and the text. A line whose text is a single
//! hex literal, optionally behind a data directive, is inline data rather
//! than an instruction.
//!
//! A line holding nothing but an eight-digit hex column is also inline data.
//! Disassemblers print an undecoded ARM word that way, in value order, so
//! `00001000: 1000a0e5` is the pool word `0x1000A0E5`. Any other bare byte
//! column (a Thumb halfword, an odd run of bytes) has no word value and the
//! line is dropped.

use crate::types::{Address, OpKind};

/// Data directives that may precede an inline literal.
const DATA_DIRECTIVES: &[&str] = &[
    ".word",
    ".long",
    ".4byte",
    ".int",
    "dcd",
    "dcdu",
    "dd",
    "undefined4",
    "addr",
];

/// ARM condition-code suffixes.
const CONDITIONS: &[&str] = &[
    "EQ", "NE", "CS", "HS", "CC", "LO", "MI", "PL", "VS", "VC", "HI", "LS", "GE", "LT", "GT", "LE",
    "AL",
];

/// An instruction line split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction<'a> {
    /// Instruction address
    pub addr: Address,
    /// Upper-cased mnemonic without `.W`/`.N` width qualifiers
    pub mnemonic: String,
    /// Operand text, trimmed
    pub operands: &'a str,
}

/// A parsed disassembly line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line<'a> {
    /// An instruction
    Instruction(Instruction<'a>),
    /// An inline data word (literal pool entry)
    Data {
        /// Address of the data item
        addr: Address,
        /// Literal value
        value: u64,
    },
}

/// Parse a hex literal written `0x1F` or `1Fh`.
pub fn parse_hex_literal(token: &str) -> Option<u64> {
    let t = token.trim();
    let digits = t
        .strip_prefix("0x")
        .or_else(|| t.strip_prefix("0X"))
        .or_else(|| t.strip_suffix('h').or_else(|| t.strip_suffix('H')))?;
    if digits.is_empty() {
        return None;
    }
    u64::from_str_radix(digits, 16).ok()
}

/// A bare eight-digit hex word, as printed for raw data.
fn parse_bare_word(token: &str) -> Option<u64> {
    if token.len() == 8 && token.bytes().all(|b| b.is_ascii_hexdigit()) {
        u64::from_str_radix(token, 16).ok()
    } else {
        None
    }
}

/// Whether `token` is a hex-bytes column (`0410A0E1`, `7047`).
fn is_byte_column(token: &str) -> bool {
    token.len() >= 2
        && token.len() % 2 == 0
        && token.bytes().all(|b| b.is_ascii_hexdigit())
        && hex::decode(token).is_ok()
}

/// Split off the address: the first colon followed by whitespace (or the
/// end of the line) whose prefix parses as hex. A segment prefix such as
/// `ram:` is ignored.
fn split_address(line: &str) -> Option<(Address, &str)> {
    let bytes = line.as_bytes();
    for pos in memchr::memchr_iter(b':', bytes) {
        let next = bytes.get(pos + 1);
        if next.is_some_and(|b| !b.is_ascii_whitespace()) {
            continue;
        }
        let prefix = line[..pos].trim();
        let addr_text = prefix.rsplit(':').next().unwrap_or(prefix);
        let addr_text = addr_text
            .strip_prefix("0x")
            .or_else(|| addr_text.strip_prefix("0X"))
            .unwrap_or(addr_text);
        if let Ok(addr) = u64::from_str_radix(addr_text, 16) {
            return Some((addr, &line[pos + 1..]));
        }
    }
    None
}

/// Parse one disassembly line. Returns `None` for blank or unparseable
/// lines.
pub fn parse_line(line: &str) -> Option<Line<'_>> {
    let (addr, rest) = split_address(line)?;
    let text = match rest.find(';') {
        Some(i) => &rest[..i],
        None => rest,
    }
    .trim();

    let (mut head, mut tail) = split_first_token(text);
    if head.is_empty() {
        return None;
    }
    if is_byte_column(head) && !tail.is_empty() {
        (head, tail) = split_first_token(tail);
    }

    if tail.is_empty() {
        if let Some(value) = parse_hex_literal(head).or_else(|| parse_bare_word(head)) {
            return Some(Line::Data { addr, value });
        }
        if is_byte_column(head) {
            return None;
        }
    } else if DATA_DIRECTIVES.contains(&head.to_ascii_lowercase().as_str())
        && !tail.contains(',')
    {
        if let Some(value) = parse_hex_literal(tail) {
            return Some(Line::Data { addr, value });
        }
    }

    let upper = head.to_ascii_uppercase();
    let mnemonic = upper
        .strip_suffix(".W")
        .or_else(|| upper.strip_suffix(".N"))
        .unwrap_or(&upper)
        .to_string();

    Some(Line::Instruction(Instruction {
        addr,
        mnemonic,
        operands: tail,
    }))
}

fn split_first_token(text: &str) -> (&str, &str) {
    match text.find(char::is_whitespace) {
        Some(i) => (&text[..i], text[i..].trim()),
        None => (text, ""),
    }
}

/// `stem` alone or followed by exactly one condition code.
fn is_plain_or_conditional(mnemonic: &str, stem: &str) -> bool {
    match mnemonic.strip_prefix(stem) {
        Some("") => true,
        Some(cond) => CONDITIONS.contains(&cond),
        None => false,
    }
}

/// Classify an (upper-cased) mnemonic.
///
/// Only full-word loads and stores count as READ/WRITE; byte, halfword,
/// dual, signed, exclusive, and unprivileged variants are excluded.
pub fn classify_mnemonic(mnemonic: &str) -> Option<OpKind> {
    let m = mnemonic;
    if is_plain_or_conditional(m, "LDR") {
        Some(OpKind::Read)
    } else if is_plain_or_conditional(m, "STR") {
        Some(OpKind::Write)
    } else if m.starts_with("ORR") || m == "OR" || m.starts_with("ORI") {
        Some(OpKind::Or)
    } else if m.starts_with("AND") || m.starts_with("BIC") {
        Some(OpKind::And)
    } else if m.starts_with("EOR") || m.starts_with("XOR") {
        Some(OpKind::Toggle)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instruction(line: &str) -> Instruction<'_> {
        match parse_line(line) {
            Some(Line::Instruction(i)) => i,
            other => panic!("expected instruction, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_plain_line() {
        let i = instruction("00006000: LDR R0,[R1,#0x10]");
        assert_eq!(i.addr, 0x6000);
        assert_eq!(i.mnemonic, "LDR");
        assert_eq!(i.operands, "R0,[R1,#0x10]");
    }

    #[test]
    fn test_parse_byte_column_and_comment() {
        let i = instruction("00006004: 1000a0e5 str r0, [r1, #0x10] ; UART_CR");
        assert_eq!(i.addr, 0x6004);
        assert_eq!(i.mnemonic, "STR");
        assert_eq!(i.operands, "r0, [r1, #0x10]");
    }

    #[test]
    fn test_parse_segment_prefix_and_width() {
        let i = instruction("ram:00006008: ldr.w r2, [r3]");
        assert_eq!(i.addr, 0x6008);
        assert_eq!(i.mnemonic, "LDR");
    }

    #[test]
    fn test_parse_data_lines() {
        assert_eq!(
            parse_line("00430010: .word 0x50000000"),
            Some(Line::Data {
                addr: 0x430010,
                value: 0x5000_0000
            })
        );
        assert_eq!(
            parse_line("00430014: 0xB1006400"),
            Some(Line::Data {
                addr: 0x430014,
                value: 0xB100_6400
            })
        );
        assert_eq!(
            parse_line("00430018: 00644000 DCD 0x00406400"),
            Some(Line::Data {
                addr: 0x430018,
                value: 0x0040_6400
            })
        );
        assert_eq!(
            parse_line("0043001C: undefined4 40021000h"),
            Some(Line::Data {
                addr: 0x43001C,
                value: 0x4002_1000
            })
        );
    }

    #[test]
    fn test_bare_columns() {
        assert_eq!(
            parse_line("00001000: 1000a0e5"),
            Some(Line::Data {
                addr: 0x1000,
                value: 0x1000_A0E5
            })
        );
        assert_eq!(parse_line("00001004: 7047"), None);
        assert_eq!(parse_line("00001006: 00bf0000a0"), None);
        assert_eq!(
            parse_line("00001008: nop"),
            Some(Line::Instruction(Instruction {
                addr: 0x1008,
                mnemonic: "NOP".into(),
                operands: ""
            }))
        );
    }

    #[test]
    fn test_unparseable_lines() {
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("no address here"), None);
        assert_eq!(parse_line("00001000:"), None);
    }

    #[test]
    fn test_classify_mnemonics() {
        assert_eq!(classify_mnemonic("LDR"), Some(OpKind::Read));
        assert_eq!(classify_mnemonic("LDREQ"), Some(OpKind::Read));
        assert_eq!(classify_mnemonic("LDRB"), None);
        assert_eq!(classify_mnemonic("LDRH"), None);
        assert_eq!(classify_mnemonic("LDRSB"), None);
        assert_eq!(classify_mnemonic("LDRD"), None);
        assert_eq!(classify_mnemonic("STR"), Some(OpKind::Write));
        assert_eq!(classify_mnemonic("STRNE"), Some(OpKind::Write));
        assert_eq!(classify_mnemonic("STRB"), None);
        assert_eq!(classify_mnemonic("ORRS"), Some(OpKind::Or));
        assert_eq!(classify_mnemonic("OR"), Some(OpKind::Or));
        assert_eq!(classify_mnemonic("ORI"), Some(OpKind::Or));
        assert_eq!(classify_mnemonic("BIC"), Some(OpKind::And));
        assert_eq!(classify_mnemonic("ANDS"), Some(OpKind::And));
        assert_eq!(classify_mnemonic("EOR"), Some(OpKind::Toggle));
        assert_eq!(classify_mnemonic("XOR"), Some(OpKind::Toggle));
        assert_eq!(classify_mnemonic("MOV"), None);
        assert_eq!(classify_mnemonic("ADD"), None);
    }

    #[test]
    fn test_hex_literals() {
        assert_eq!(parse_hex_literal("0x10"), Some(0x10));
        assert_eq!(parse_hex_literal("10h"), Some(0x10));
        assert_eq!(parse_hex_literal("16"), None);
        assert_eq!(parse_hex_literal("0x"), None);
    }
}
