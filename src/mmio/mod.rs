//! MMIO access classification.
//!
//! Scans a function's disassembly for loads, stores, and bitwise
//! read-modify-write steps, and resolves the hardware address each one
//! touches. Loads and stores whose address cannot be resolved are dropped:
//! a missing sample is preferable to a wrong address. Bitwise operations
//! carry their mask instead of an address and are always kept.

pub mod classifier;
pub mod tracker;

use crate::session::Session;
use crate::types::{Address, AnnotateOptions, MmioReport, MmioSample, OpKind, Operation};
use classifier::{classify_mnemonic, parse_line, Instruction, Line};
use tracing::{debug, info};
use tracker::{parse_mem_operand, split_operands, MemOperand, MemoryLiteralMap, Tracker};

/// Immediates below this are treated as structure offsets, not absolute
/// addresses, when no base register is known.
pub const MIN_ABSOLUTE_IMMEDIATE: u64 = 0x100;

/// Operations recovered from one function.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// Resolved operations in instruction order
    pub operations: Vec<Operation>,
    /// READ/WRITE instructions dropped for lack of a target
    pub skipped: usize,
    /// Inline data lines feeding the literal pool
    pub data_lines: usize,
}

/// First `=0x..` or `#0x..` immediate in the operand text.
pub fn scan_immediate(operands: &str) -> Option<u64> {
    let lower = operands.to_ascii_lowercase();
    let bytes = lower.as_bytes();
    let mut from = 0;
    while let Some(rel) = lower[from..].find("0x") {
        let at = from + rel;
        let prefixed = at > 0 && matches!(bytes[at - 1], b'=' | b'#');
        let digits: String = lower[at + 2..]
            .chars()
            .take_while(char::is_ascii_hexdigit)
            .collect();
        if prefixed && !digits.is_empty() {
            if let Ok(v) = u64::from_str_radix(&digits, 16) {
                return Some(v);
            }
        }
        from = at + 2;
    }
    None
}

fn resolve(insn: &Instruction<'_>, kind: OpKind, tracker: &Tracker<'_>) -> Option<Address> {
    if !kind.is_memory_access() {
        return Some(scan_immediate(insn.operands).unwrap_or(0));
    }

    let ops = split_operands(insn.operands);
    let mem = ops
        .get(1)
        .map_or(MemOperand::Other, |src| parse_mem_operand(src));

    if kind == OpKind::Read {
        if let Some(v) = tracker.literal_load(insn.addr, &mem) {
            return Some(v);
        }
    }

    match &mem {
        MemOperand::BaseOffset { base, offset } => {
            if let Some(b) = tracker.base(base) {
                let addr = b.wrapping_add_signed(*offset);
                return Some(if kind == OpKind::Read {
                    tracker.literal(addr).unwrap_or(addr)
                } else {
                    addr
                });
            }
        }
        // A pool offset is never an absolute address.
        MemOperand::PcRelative(_) => return None,
        _ => {}
    }

    scan_immediate(insn.operands).filter(|&v| v >= MIN_ABSOLUTE_IMMEDIATE)
}

/// Classify every MMIO-relevant instruction in a disassembly listing.
pub fn classify_lines<S: AsRef<str>>(lines: &[S]) -> Classification {
    let parsed: Vec<Line<'_>> = lines.iter().filter_map(|l| parse_line(l.as_ref())).collect();

    let mut literals = MemoryLiteralMap::new();
    let mut result = Classification::default();
    for line in &parsed {
        if let Line::Data { addr, value } = line {
            literals.insert(*addr, *value);
            result.data_lines += 1;
        }
    }

    let mut tracker = Tracker::new(&literals);
    for line in &parsed {
        let Line::Instruction(insn) = line else {
            continue;
        };
        let kind = classify_mnemonic(&insn.mnemonic);
        if let Some(kind) = kind {
            match resolve(insn, kind, &tracker) {
                Some(target) => result.operations.push(Operation {
                    addr: insn.addr,
                    op: kind,
                    target,
                }),
                None => {
                    debug!(addr = format_args!("0x{:X}", insn.addr), op = %kind, "unresolved, skipped");
                    result.skipped += 1;
                }
            }
        }
        tracker.observe(insn, kind);
    }

    result
}

/// Classify a function's MMIO accesses and optionally comment each sample.
///
/// Comments are written only when `options.may_write()`; `annotated` counts
/// the writes the session reported as successful.
pub fn annotate(
    session: &mut dyn Session,
    function: Address,
    options: &AnnotateOptions,
) -> MmioReport {
    let mut report = MmioReport {
        function,
        function_name: session.get_function_by_address(function).map(|f| f.name),
        ..MmioReport::default()
    };

    let lines = session.disassemble_function(function);
    if lines.is_empty() {
        report
            .notes
            .push(format!("no disassembly for 0x{:08X}", function));
        return report;
    }

    let classification = classify_lines(&lines);
    for op in &classification.operations {
        match op.op {
            OpKind::Read => report.reads += 1,
            OpKind::Write => report.writes += 1,
            OpKind::Or => report.bitwise_or += 1,
            OpKind::And => report.bitwise_and += 1,
            OpKind::Toggle => report.toggles += 1,
        }
    }
    report.skipped = classification.skipped;
    if classification.skipped > 0 {
        report.notes.push(format!(
            "skipped {} load/store operations with unresolved targets",
            classification.skipped
        ));
    }

    let mut ordered = classification.operations;
    ordered.sort_by_key(|op| op.addr);
    if ordered.len() > options.max_samples {
        report.notes.push(format!(
            "samples truncated to {} of {}",
            options.max_samples,
            ordered.len()
        ));
    }
    report.samples = ordered
        .into_iter()
        .take(options.max_samples)
        .map(MmioSample::from)
        .collect();

    if options.may_write() {
        for sample in &report.samples {
            let text = format!("MMIO {} 0x{:08X}", sample.op, sample.address_abs);
            if session.set_disassembly_comment(sample.addr, &text) {
                report.annotated += 1;
            }
        }
        info!(
            function = format_args!("0x{:X}", function),
            attempted = report.samples.len(),
            annotated = report.annotated,
            "mmio comments written"
        );
    } else if !options.dry_run {
        report
            .notes
            .push(String::from("writes disabled; no comments written"));
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{FunctionInfo, MemorySession};
    use pretty_assertions::assert_eq;

    fn ops_of(c: &Classification, kind: OpKind) -> Vec<Address> {
        c.operations
            .iter()
            .filter(|o| o.op == kind)
            .map(|o| o.target)
            .collect()
    }

    #[test]
    fn test_untracked_base_is_skipped() {
        let c = classify_lines(&[
            "00006000: LDR R0,[R1,#0x10]",
            "00006004: STR R0,[R1,#0x10]",
            "00006008: ORR R0,R0,#0x1",
            "0000600C: AND R0,R0,#0xfffffffe",
            "00006010: EOR R0,R0,#0x1",
        ]);
        assert_eq!(ops_of(&c, OpKind::Read).len(), 0);
        assert_eq!(ops_of(&c, OpKind::Write).len(), 0);
        assert_eq!(ops_of(&c, OpKind::Or), vec![0x1]);
        assert_eq!(ops_of(&c, OpKind::And), vec![0xffff_fffe]);
        assert_eq!(ops_of(&c, OpKind::Toggle), vec![0x1]);
        assert_eq!(c.skipped, 2);
    }

    #[test]
    fn test_literal_read_and_immediate_write() {
        let c = classify_lines(&["00430000: LDR R0,=0x50000000", "00430004: STR R0,[R1,#0x100]"]);
        assert_eq!(ops_of(&c, OpKind::Read), vec![0x5000_0000]);
        assert_eq!(ops_of(&c, OpKind::Write), vec![0x0000_0100]);
    }

    #[test]
    fn test_base_register_indirection() {
        let c = classify_lines(&[
            "00470000: LDR R4,=0xB1006400",
            "00470004: LDR R0,[R4,#0x10]",
            "00470008: STR R1,[R4,#0x20]",
        ]);
        assert_eq!(ops_of(&c, OpKind::Read), vec![0xB100_6400, 0xB100_6410]);
        assert_eq!(ops_of(&c, OpKind::Write), vec![0xB100_6420]);
        assert_eq!(c.skipped, 0);
    }

    #[test]
    fn test_literal_pool_via_pc() {
        let c = classify_lines(&[
            "00001000: LDR R3,[PC,#0x8]",
            "00001004: STR R2,[R3,#0x4]",
            "00001008: BX LR",
            "00001010: .word 0x40021000",
        ]);
        assert_eq!(c.data_lines, 1);
        assert_eq!(ops_of(&c, OpKind::Read), vec![0x4002_1000]);
        assert_eq!(ops_of(&c, OpKind::Write), vec![0x4002_1004]);
    }

    #[test]
    fn test_missing_pool_entry_is_skipped() {
        let c = classify_lines(&["00001000: LDR R3,[PC,#0x120]"]);
        assert!(c.operations.is_empty());
        assert_eq!(c.skipped, 1);
    }

    #[test]
    fn test_read_dereferences_literal_pool() {
        let c = classify_lines(&[
            "00001000: LDR R0,=0x1100",
            "00001004: LDR R1,[R0,#0x0]",
            "00001100: 0x50002000",
        ]);
        assert_eq!(ops_of(&c, OpKind::Read), vec![0x1100, 0x5000_2000]);
    }

    #[test]
    fn test_scan_immediate() {
        assert_eq!(scan_immediate("R0,=0x50000000"), Some(0x5000_0000));
        assert_eq!(scan_immediate("R0,[R1,#0x100]"), Some(0x100));
        assert_eq!(scan_immediate("R0,R0,#0X1F"), Some(0x1F));
        assert_eq!(scan_immediate("R0,R1"), None);
        assert_eq!(scan_immediate("R0,R0,0x10"), None);
    }

    fn session_with(lines: &[&str]) -> MemorySession {
        let mut s = MemorySession::new();
        s.add_function(
            FunctionInfo {
                name: "uart_init".into(),
                entry_point: 0x0047_0000,
                comment: None,
            },
            0x100,
            lines.iter().map(|l| l.to_string()).collect(),
        )
        .unwrap();
        s
    }

    const UART: &[&str] = &[
        "00470000: LDR R4,=0xB1006400",
        "00470004: LDR R0,[R4,#0x10]",
        "00470008: ORR R0,R0,#0x1",
        "0047000C: STR R0,[R4,#0x10]",
        "00470010: STR R1,[R4,#0x20]",
    ];

    #[test]
    fn test_annotate_counts_and_samples() {
        let mut s = session_with(UART);
        let report = annotate(&mut s, 0x0047_0000, &AnnotateOptions::preview());

        assert_eq!(report.function_name.as_deref(), Some("uart_init"));
        assert_eq!(report.reads, 2);
        assert_eq!(report.writes, 2);
        assert_eq!(report.bitwise_or, 1);
        assert_eq!(report.annotated, 0);
        assert_eq!(report.samples.len(), 5);
        assert_eq!(report.samples[2].address_abs, 0x1);
        assert!(s.write_log().is_empty());
    }

    #[test]
    fn test_annotate_caps_samples_in_address_order() {
        let mut s = session_with(UART);
        let opts = AnnotateOptions::new().with_max_samples(2).with_writes(true);
        let report = annotate(&mut s, 0x0047_0000, &opts);

        let addrs: Vec<Address> = report.samples.iter().map(|s| s.addr).collect();
        assert_eq!(addrs, vec![0x0047_0000, 0x0047_0004]);
        assert_eq!(report.reads + report.writes + report.bitwise_or, 5);
        assert_eq!(report.annotated, 2);
        assert_eq!(s.write_log().len(), 2);
        assert_eq!(s.line_comment(0x0047_0004), Some("MMIO READ 0xB1006410"));
    }

    #[test]
    fn test_annotate_writes_disabled() {
        let mut s = session_with(UART);
        let report = annotate(&mut s, 0x0047_0000, &AnnotateOptions::new());
        assert_eq!(report.annotated, 0);
        assert!(s.write_log().is_empty());
        assert!(report.notes.iter().any(|n| n.contains("writes disabled")));
    }

    /// Refuses line comments at one address.
    struct RejectsLine {
        inner: MemorySession,
        rejected: Address,
    }

    impl Session for RejectsLine {
        fn read_dword(&self, address: Address) -> Option<u32> {
            self.inner.read_dword(address)
        }
        fn disassemble_function(&self, address: Address) -> Vec<String> {
            self.inner.disassemble_function(address)
        }
        fn get_function_by_address(&self, address: Address) -> Option<FunctionInfo> {
            self.inner.get_function_by_address(address)
        }
        fn rename_function(&mut self, address: Address, new_name: &str) -> bool {
            self.inner.rename_function(address, new_name)
        }
        fn set_decompiler_comment(&mut self, address: Address, text: &str) -> bool {
            self.inner.set_decompiler_comment(address, text)
        }
        fn set_disassembly_comment(&mut self, address: Address, text: &str) -> bool {
            address != self.rejected && self.inner.set_disassembly_comment(address, text)
        }
    }

    #[test]
    fn test_annotated_counts_only_successful_comments() {
        let mut s = RejectsLine {
            inner: session_with(UART),
            rejected: 0x0047_0008,
        };
        let opts = AnnotateOptions::new().with_writes(true);
        let report = annotate(&mut s, 0x0047_0000, &opts);

        assert_eq!(report.samples.len(), 5);
        assert_eq!(report.annotated, 4);
        assert_eq!(s.inner.line_comment(0x0047_0008), None);
        assert_eq!(s.inner.line_comment(0x0047_0010), Some("MMIO WRITE 0xB1006420"));
    }

    #[test]
    fn test_preview_blocks_enabled_writes() {
        let mut s = session_with(UART);
        let opts = AnnotateOptions::preview().with_writes(true);
        let report = annotate(&mut s, 0x0047_0000, &opts);

        assert_eq!(report.samples.len(), 5);
        assert_eq!(report.annotated, 0);
        assert!(s.write_log().is_empty());
        assert!(!report.notes.iter().any(|n| n.contains("writes disabled")));
    }

    #[test]
    fn test_annotate_without_disassembly() {
        let mut s = MemorySession::new();
        let report = annotate(&mut s, 0x1000, &AnnotateOptions::new().with_writes(true));
        assert_eq!(report.reads, 0);
        assert!(report.samples.is_empty());
        assert_eq!(report.notes.len(), 1);
    }
}
