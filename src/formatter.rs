//! Output formatters for jump-table and MMIO results.
//!
//! This module provides trait-based formatters for rendering results in
//! various output formats (human-readable, JSON, compact).

use crate::types::{JtProcessResult, JtScanResult, JtSlotResult, MmioReport};
use serde::Serialize;

/// Trait for formatting analysis results.
pub trait ReportFormatter {
    /// Format a single slot result.
    fn format_slot(&self, slot: &JtSlotResult) -> String;

    /// Format a scan over many slots.
    fn format_scan(&self, scan: &JtScanResult) -> String;

    /// Format a slot process result.
    fn format_process(&self, result: &JtProcessResult) -> String;

    /// Format an MMIO report.
    fn format_mmio(&self, report: &MmioReport) -> String;
}

fn opt_hex(value: Option<u64>) -> String {
    value.map_or_else(|| String::from("-"), |v| format!("0x{:08X}", v))
}

fn errors_text(slot: &JtSlotResult) -> String {
    if slot.errors.is_empty() {
        String::from("ok")
    } else {
        slot.errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Human-readable output formatter.
#[derive(Debug, Clone, Default)]
pub struct HumanFormatter {
    /// Show notes and per-item detail
    pub verbose: bool,
    /// Quiet mode (minimal output)
    pub quiet: bool,
}

impl HumanFormatter {
    /// Create a new human formatter with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a verbose formatter.
    pub fn verbose() -> Self {
        Self {
            verbose: true,
            quiet: false,
        }
    }

    /// Create a quiet formatter.
    pub fn quiet() -> Self {
        Self {
            verbose: false,
            quiet: true,
        }
    }

    fn slot_line(&self, slot: &JtSlotResult) -> String {
        let mode = slot
            .mode
            .map_or_else(|| String::from("-"), |m| m.to_string());
        let raw = slot
            .raw
            .map_or_else(|| String::from("-"), |r| format!("0x{:08X}", r));
        let mut s = format!(
            "  slot {:>4} @ 0x{:08X}  raw {}  {:<5} -> {}  [{}]\n",
            slot.slot,
            slot.slot_addr,
            raw,
            mode,
            opt_hex(slot.target),
            errors_text(slot)
        );
        if self.verbose {
            for note in &slot.notes {
                s.push_str(&format!("      [info] {}\n", note));
            }
        }
        s
    }
}

impl ReportFormatter for HumanFormatter {
    fn format_slot(&self, slot: &JtSlotResult) -> String {
        if self.quiet {
            return format!("{}: {}\n", slot.slot, opt_hex(slot.target));
        }
        self.slot_line(slot)
    }

    fn format_scan(&self, scan: &JtScanResult) -> String {
        if self.quiet {
            return format!(
                "{} valid, {} invalid\n",
                scan.summary.valid, scan.summary.invalid
            );
        }
        let mut s = format!(
            "Jump table slots {}..{}\n",
            scan.range.start,
            u64::from(scan.range.start) + u64::from(scan.range.count)
        );
        for item in &scan.items {
            s.push_str(&self.slot_line(item));
        }
        s.push_str(&format!(
            "  Total: {}  Valid: {}  Invalid: {}\n",
            scan.summary.total, scan.summary.valid, scan.summary.invalid
        ));
        s
    }

    fn format_process(&self, result: &JtProcessResult) -> String {
        let mut s = self.format_slot(&result.slot);
        if self.quiet {
            return s;
        }
        s.push_str(&format!(
            "  Writes:     renamed={} comment_set={}\n",
            result.writes.renamed, result.writes.comment_set
        ));
        s.push_str(&format!(
            "  Verify:     name={} comment_present={}\n",
            result.verify.name.as_deref().unwrap_or("-"),
            result.verify.comment_present
        ));
        s
    }

    fn format_mmio(&self, report: &MmioReport) -> String {
        let name = report.function_name.as_deref().unwrap_or("?");
        if self.quiet {
            return format!(
                "0x{:08X} {}: R{} W{} OR{} AND{} XOR{}\n",
                report.function,
                name,
                report.reads,
                report.writes,
                report.bitwise_or,
                report.bitwise_and,
                report.toggles
            );
        }

        let mut s = format!("Function:   0x{:08X} ({})\n", report.function, name);
        s.push_str(&format!(
            "  Reads:      {}\n  Writes:     {}\n  OR:         {}\n  AND:        {}\n  Toggles:    {}\n",
            report.reads, report.writes, report.bitwise_or, report.bitwise_and, report.toggles
        ));
        if report.skipped > 0 {
            s.push_str(&format!("  Skipped:    {}\n", report.skipped));
        }
        s.push_str(&format!("  Annotated:  {}\n", report.annotated));
        if !report.samples.is_empty() {
            s.push_str("  Samples:\n");
            for sample in &report.samples {
                s.push_str(&format!(
                    "    0x{:08X}  {:<6} 0x{:08X}\n",
                    sample.addr, sample.op, sample.address_abs
                ));
            }
        }
        if self.verbose {
            for note in &report.notes {
                s.push_str(&format!("  [info] {}\n", note));
            }
        }
        s
    }
}

/// JSON output formatter.
#[derive(Debug, Clone)]
pub struct JsonFormatter {
    /// Pretty-print JSON
    pub pretty: bool,
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self { pretty: true }
    }
}

impl JsonFormatter {
    /// Create a new JSON formatter with pretty printing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a compact JSON formatter.
    pub fn compact() -> Self {
        Self { pretty: false }
    }

    fn render<T: Serialize>(&self, value: &T) -> String {
        let mut s = if self.pretty {
            serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
        } else {
            serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
        };
        s.push('\n');
        s
    }
}

impl ReportFormatter for JsonFormatter {
    fn format_slot(&self, slot: &JtSlotResult) -> String {
        self.render(slot)
    }

    fn format_scan(&self, scan: &JtScanResult) -> String {
        self.render(scan)
    }

    fn format_process(&self, result: &JtProcessResult) -> String {
        self.render(result)
    }

    fn format_mmio(&self, report: &MmioReport) -> String {
        self.render(report)
    }
}

/// Compact single-line output formatter.
#[derive(Debug, Clone, Default)]
pub struct ShortFormatter;

impl ShortFormatter {
    /// Create a new short formatter.
    pub fn new() -> Self {
        Self
    }
}

impl ReportFormatter for ShortFormatter {
    fn format_slot(&self, slot: &JtSlotResult) -> String {
        format!(
            "{}\t0x{:08X}\t{}\t{}\n",
            slot.slot,
            slot.slot_addr,
            opt_hex(slot.target),
            errors_text(slot)
        )
    }

    fn format_scan(&self, scan: &JtScanResult) -> String {
        scan.items.iter().map(|i| self.format_slot(i)).collect()
    }

    fn format_process(&self, result: &JtProcessResult) -> String {
        let mut s = self.format_slot(&result.slot);
        s.pop();
        s.push_str(&format!(
            "\t{}\t{}\n",
            result.verify.name.as_deref().unwrap_or("-"),
            result.writes.renamed
        ));
        s
    }

    fn format_mmio(&self, report: &MmioReport) -> String {
        format!(
            "0x{:08X}\t{}\t{}\t{}\t{}\t{}\t{}\n",
            report.function,
            report.reads,
            report.writes,
            report.bitwise_or,
            report.bitwise_and,
            report.toggles,
            report.annotated
        )
    }
}
