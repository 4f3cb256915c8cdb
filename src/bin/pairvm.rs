// PairVM CLI - Command Line Interface
// Usage: pairvm FILE [OPTIONS]

use clap::Parser;
use colored::*;
use std::fs;
use std::path::PathBuf;
use std::process;
use std::time::Instant;

use tracing_subscriber::EnvFilter;

use pairvm::bytecode::loader;
use pairvm::report;
use pairvm::{Chunk, VmConfig, VM};

/// PairVM - a stack-based bytecode VM with a garbage-collected heap
#[derive(Parser)]
#[command(name = "pairvm")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run PairVM bytecode programs", long_about = None)]
struct Cli {
    /// Program to run (text or binary format)
    file: PathBuf,

    /// Print collector statistics
    #[arg(short = 'g', long = "gc-stats")]
    gc_stats: bool,

    /// Print the disassembly and exit
    #[arg(short = 'd', long = "disasm")]
    disasm: bool,

    /// JSON configuration file
    #[arg(long = "config")]
    config: Option<PathBuf>,

    /// Live object count that triggers the first collection
    #[arg(long = "threshold")]
    threshold: Option<usize>,

    /// Hard cap on live objects
    #[arg(long = "max-objects")]
    max_objects: Option<usize>,

    /// Write the program in binary format instead of running it
    #[arg(short = 'c', long = "compile")]
    compile: bool,

    /// Output path for compiled file (requires -c)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match handle(cli) {
        Ok(code) => process::exit(code),
        Err(message) => {
            eprintln!("{} {}", "error:".red().bold(), message);
            process::exit(1);
        }
    }
}

fn handle(cli: Cli) -> Result<i32, String> {
    let config = build_config(&cli)?;
    let chunk = loader::load_file(&cli.file).map_err(|e| e.to_string())?;

    if cli.disasm {
        print!("{}", chunk.disassemble(&cli.file.display().to_string()));
        return Ok(0);
    }

    if cli.compile {
        return handle_compile(&cli, &chunk);
    }

    handle_run(chunk, &config, cli.gc_stats)
}

fn build_config(cli: &Cli) -> Result<VmConfig, String> {
    let mut config = match &cli.config {
        Some(path) => VmConfig::from_file(path).map_err(|e| e.to_string())?,
        None => VmConfig::default(),
    };
    if let Some(threshold) = cli.threshold {
        config.initial_threshold = threshold;
    }
    if cli.max_objects.is_some() {
        config.max_objects = cli.max_objects;
    }
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn handle_compile(cli: &Cli, chunk: &Chunk) -> Result<i32, String> {
    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| cli.file.with_extension("pvm"));

    let bytes = loader::serialize(chunk);
    fs::write(&output_path, bytes).map_err(|e| format!("Error writing file: {}", e))?;
    println!("{} Compiled to {}", "✓".green(), output_path.display());
    Ok(0)
}

/// The `--gc-stats` flag turns on per-collection `[GC]` lines as well as
/// the final statistics block
fn build_vm(chunk: Chunk, config: &VmConfig, gc_stats: bool) -> VM {
    let mut vm = VM::with_config(chunk, config);
    vm.set_gc_stats_enabled(gc_stats || config.gc_stats);
    vm
}

fn handle_run(chunk: Chunk, config: &VmConfig, gc_stats: bool) -> Result<i32, String> {
    let show_gc = gc_stats || config.gc_stats;
    let mut vm = build_vm(chunk, config, gc_stats);

    let start = Instant::now();
    let result = vm.run();
    let elapsed = start.elapsed();

    // Fatal errors end the process without a summary
    let outcome = result.map_err(|e| format!("Fatal: {}", e))?;

    print!("{}", report::format_run_summary(&outcome, elapsed));
    if show_gc {
        print!("{}", report::format_gc_stats(vm.gc_stats(), vm.heap()));
    }

    Ok(if outcome.reason.is_error() { 2 } else { 0 })
}
