//! Error taxonomy for the lifter.
//!
//! [`InsnException`] and [`FatalAnalysis`] are both *function-scoped*: raising
//! either one abandons the function currently being lifted, never the whole
//! run. An unrecognized instruction is not an error at all — it becomes an
//! [`crate::il::IlNode::Unknown`].

use std::panic::Location;
use thiserror::Error;

/// A pattern handler decided its template does not actually apply to the
/// instruction window it was given. Raised with `#[track_caller]` so the
/// defining source location can be attached to a [`crate::diagnostics::Diagnostic`].
#[derive(Debug, Error)]
#[error("{message} (at {file}:{line})")]
pub struct InsnException {
    pub message: String,
    pub file: &'static str,
    pub line: u32,
}

impl InsnException {
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = Location::caller();
        InsnException {
            message: message.into(),
            file: loc.file(),
            line: loc.line(),
        }
    }
}

/// The app model handed back something the lifter has no classification for
/// (an unknown pool entry class, an unexpected stub kind at a structural
/// position). Distinct from [`InsnException`]: this means the tool does not
/// yet model a construct, not that a guess about the template was wrong.
#[derive(Debug, Error)]
#[error("{message} (at {file}:{line})")]
pub struct FatalAnalysis {
    pub message: String,
    pub file: &'static str,
    pub line: u32,
}

impl FatalAnalysis {
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = Location::caller();
        FatalAnalysis {
            message: message.into(),
            file: loc.file(),
            line: loc.line(),
        }
    }
}

/// Unified per-function analysis error. The driver catches this at the
/// function boundary; it never propagates past [`crate::driver::run`].
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Insn(#[from] InsnException),
    #[error(transparent)]
    Fatal(#[from] FatalAnalysis),
}

/// Raised by the disassembler contract when a byte sequence cannot be
/// decoded as a valid A64 instruction.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid instruction encoding 0x{word:08x} at offset {offset}")]
    InvalidEncoding { word: u32, offset: usize },
    #[error("unexpected end of code buffer at offset {offset}")]
    UnexpectedEnd { offset: usize },
}

/// Startup-time configuration errors. Unlike [`AnalysisError`], a bad config
/// fails the whole run before any function is lifted.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read version config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse version config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid version config: {0}")]
    Invalid(String),
}

/// Errors loading an ELF-backed reference [`crate::app_model::AppModel`].
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read snapshot file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse ELF: {0}")]
    Elf(#[from] goblin::error::Error),
    #[error("snapshot is missing expected section: {0}")]
    MissingSection(String),
    #[error("malformed snapshot: {0}")]
    Malformed(String),
}
