//! Bridge Inspect CLI
//!
//! Command-line tool for running jump-table and MMIO heuristics against a
//! recorded analysis session.

use anyhow::{Context, Result};
use bridge_heuristics::formatter::{HumanFormatter, JsonFormatter, ReportFormatter, ShortFormatter};
use bridge_heuristics::session::WriteRecord;
use bridge_heuristics::types::parse_address;
use bridge_heuristics::{
    adapter_for_name, annotate, check_batch_size, scan, slot_check, slot_process, Address,
    AnnotateOptions, JumpTable, MemorySession, ProcessOptions,
};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;

/// Jump-table and MMIO heuristics over a disassembler session.
///
/// Loads a session fixture (memory segments plus function metadata and
/// disassembly) and runs one analysis against it.
#[derive(Parser, Debug)]
#[command(name = "bridge-inspect")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Session fixture (JSON)
    #[arg(short, long)]
    session: PathBuf,

    /// Architecture of the analysed code
    #[arg(short, long, env = "BRIDGE_ARCH", default_value = "arm", global = true)]
    arch: String,

    /// Output format
    #[arg(short, long, default_value = "human", global = true)]
    format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode (only output essential info)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
    /// Compact single-line output
    Short,
}

/// Jump table geometry shared by the slot commands.
#[derive(ClapArgs, Debug)]
struct TableArgs {
    /// Address of slot 0
    #[arg(long, value_parser = address_arg)]
    jt_base: Address,

    /// Lowest valid code address (inclusive)
    #[arg(long, value_parser = address_arg)]
    code_min: Address,

    /// End of the code range (exclusive)
    #[arg(long, value_parser = address_arg)]
    code_max: Address,
}

impl TableArgs {
    fn table(&self) -> JumpTable {
        JumpTable::new(self.jt_base, self.code_min, self.code_max)
    }
}

/// Write gating shared by the mutating commands.
#[derive(ClapArgs, Debug)]
struct WriteArgs {
    /// Report what would be written without writing
    #[arg(long)]
    dry_run: bool,

    /// Allow writes to the session
    #[arg(long, env = "BRIDGE_ENABLE_WRITES")]
    enable_writes: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate one jump table slot
    Slot {
        #[command(flatten)]
        table: TableArgs,

        /// Slot index
        #[arg(long)]
        slot: u32,
    },

    /// Validate a run of consecutive slots
    Scan {
        #[command(flatten)]
        table: TableArgs,

        /// First slot index
        #[arg(long, default_value = "0")]
        start: u32,

        /// Number of slots
        #[arg(long)]
        count: u32,

        /// Largest batch accepted
        #[arg(long, default_value = "4096")]
        max_slots: u32,
    },

    /// Validate one slot, then rename and comment its target
    Process {
        #[command(flatten)]
        table: TableArgs,

        /// Slot index
        #[arg(long)]
        slot: u32,

        /// Rename pattern ({slot}, {target})
        #[arg(long)]
        pattern: Option<String>,

        /// Comment pattern ({slot}, {target})
        #[arg(long)]
        comment: Option<String>,

        #[command(flatten)]
        writes: WriteArgs,
    },

    /// Classify and annotate MMIO accesses in a function
    Mmio {
        /// Function address
        #[arg(long, value_parser = address_arg)]
        function: Address,

        /// Maximum number of samples
        #[arg(long, env = "BRIDGE_MAX_SAMPLES", default_value = "32")]
        max_samples: usize,

        #[command(flatten)]
        writes: WriteArgs,
    },
}

fn address_arg(text: &str) -> std::result::Result<Address, String> {
    parse_address(text).map_err(|e| e.to_string())
}

fn main() -> ExitCode {
    let args = Args::parse();

    if args.verbose {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter("bridge_heuristics=debug")
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .init();
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if !args.quiet {
                eprintln!("Error: {:#}", e);
            }
            ExitCode::FAILURE
        }
    }
}

fn formatter_for(args: &Args) -> Box<dyn ReportFormatter> {
    match args.format {
        OutputFormat::Human if args.quiet => Box::new(HumanFormatter::quiet()),
        OutputFormat::Human if args.verbose => Box::new(HumanFormatter::verbose()),
        OutputFormat::Human => Box::new(HumanFormatter::new()),
        OutputFormat::Json => Box::new(JsonFormatter::new()),
        OutputFormat::Short => Box::new(ShortFormatter::new()),
    }
}

fn run(args: &Args) -> Result<()> {
    let mut session = MemorySession::from_path(&args.session)
        .with_context(|| format!("loading session {}", args.session.display()))?;
    let adapter = adapter_for_name(&args.arch);
    let formatter = formatter_for(args);

    let output = match &args.command {
        Command::Slot { table, slot } => {
            formatter.format_slot(&slot_check(&session, adapter.as_ref(), &table.table(), *slot))
        }
        Command::Scan {
            table,
            start,
            count,
            max_slots,
        } => {
            check_batch_size(*count, *max_slots)?;
            formatter.format_scan(&scan(
                &session,
                adapter.as_ref(),
                &table.table(),
                *start,
                *count,
            ))
        }
        Command::Process {
            table,
            slot,
            pattern,
            comment,
            writes,
        } => {
            let mut options = ProcessOptions::new().with_writes(writes.enable_writes);
            options.dry_run = writes.dry_run;
            if let Some(pattern) = pattern {
                options = options.with_pattern(pattern.as_str());
            }
            if let Some(comment) = comment {
                options.comment_pattern = comment.clone();
            }
            let result = slot_process(
                &mut session,
                adapter.as_ref(),
                &table.table(),
                *slot,
                &options,
            );
            if !args.quiet {
                print_write_log(session.write_log());
            }
            formatter.format_process(&result)
        }
        Command::Mmio {
            function,
            max_samples,
            writes,
        } => {
            let mut options = AnnotateOptions::new()
                .with_max_samples(*max_samples)
                .with_writes(writes.enable_writes);
            options.dry_run = writes.dry_run;
            formatter.format_mmio(&annotate(&mut session, *function, &options))
        }
    };

    print!("{}", output);
    Ok(())
}

fn print_write_log(log: &[WriteRecord]) {
    for record in log {
        match record {
            WriteRecord::Rename { address, name } => {
                eprintln!("write: rename 0x{:08X} -> {}", address, name);
            }
            WriteRecord::DecompilerComment { address, text } => {
                eprintln!("write: decompiler comment 0x{:08X}: {}", address, text);
            }
            WriteRecord::DisassemblyComment { address, text } => {
                eprintln!("write: disassembly comment 0x{:08X}: {}", address, text);
            }
        }
    }
}
