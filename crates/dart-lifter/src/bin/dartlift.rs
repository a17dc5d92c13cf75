//! `dartlift`: the lifter's command-line front end.
//!
//! Two subcommands: `lift` drives the full pipeline against an ELF-backed
//! [`dart_lifter::app_model::AppModel`] (see `dart_lifter::snapshot`), `check-config`
//! validates a [`dart_lifter::config::VersionConfig`] TOML file without lifting
//! anything.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dart_lifter::config::VersionConfig;
use dart_lifter::disasm::{Disassembler, Instruction};
use dart_lifter::driver;
use dart_lifter::error::DecodeError;
use dart_lifter::snapshot::ElfSnapshot;

#[derive(Parser)]
#[command(name = "dartlift")]
#[command(about = "Lifts ARM64 AOT-compiled Dart/Flutter code to a symbolic IL")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lift every function in a snapshot's ELF symbol table
    Lift {
        /// Path to a libapp.so-style ELF shared library
        snapshot: PathBuf,
        /// Version-specific constants TOML (falls back to the built-in default)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Also print each function's recovered address range
        #[arg(long)]
        verbose: bool,
    },

    /// Validate a version-config TOML file
    CheckConfig {
        /// Path to the version-config TOML file
        path: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Lift { snapshot, config, verbose } => lift(&snapshot, config.as_deref(), verbose),
        Commands::CheckConfig { path } => check_config(&path),
    }
}

fn lift(snapshot_path: &std::path::Path, config_path: Option<&std::path::Path>, verbose: bool) -> anyhow::Result<()> {
    let config = match config_path {
        Some(p) => VersionConfig::from_file(p)?,
        None => VersionConfig::default_config(),
    };

    let snapshot = ElfSnapshot::load(snapshot_path, config)?;

    // No concrete ARM64 decoder ships with this crate (see `dart_lifter::disasm`):
    // plugging one in is a matter of implementing `Disassembler` against a real
    // backend (Capstone, or the farmdec-derived reader the original tool uses).
    // Running the pipeline with `NoDecoder` still exercises the full driver and
    // reports one diagnostic per function instead of silently doing nothing.
    let disassembler = NoDecoder;
    let (lifted, diagnostics) = driver::lift_all(&snapshot, &disassembler, |_| None);

    println!("{} functions walked (0 libraries registered: plug in a real snapshot parser to populate them)", lifted.len());
    if verbose {
        for (function, _) in &lifted {
            println!("  0x{:x} {:>6} {}", function.entry, function.size, function.name);
        }
    }
    if !diagnostics.is_empty() {
        let mut out = termcolor::StandardStream::stdout(termcolor::ColorChoice::Auto);
        dart_lifter::diagnostics::render(&diagnostics, &mut out)?;
    }
    Ok(())
}

struct NoDecoder;

impl Disassembler for NoDecoder {
    fn disassemble(&self, _code: &[u8], _start_addr: u64) -> Result<Vec<Instruction>, DecodeError> {
        Err(DecodeError::UnexpectedEnd { offset: 0 })
    }
}

fn check_config(path: &std::path::Path) -> anyhow::Result<()> {
    let config = VersionConfig::from_file(path)?;
    println!("dart_int_cid      = {}", config.dart_int_cid);
    println!("class_id_tag_pos  = {}", config.class_id_tag_pos);
    println!("class_id_tag_size = {}", config.class_id_tag_size);
    println!("smi_tag_size      = {}", config.smi_tag_size);
    println!("word_size         = {}", config.word_size);
    println!("halfword class id = {}", config.uses_halfword_class_id());
    let mut offsets: Vec<_> = config.thread_offsets.iter().collect();
    offsets.sort_by_key(|(off, _)| **off);
    for (offset, name) in offsets {
        println!("  0x{offset:<4x} {name}");
    }
    Ok(())
}
