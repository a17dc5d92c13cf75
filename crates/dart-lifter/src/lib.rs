//! A symbolic lifter for ARM64 AOT-compiled Dart/Flutter code: recovers a
//! typed intermediate representation from a disassembled `libapp.so`
//! function by recognizing the fixed instruction templates the Dart AOT
//! compiler emits, rather than decompiling arbitrary machine code.
//!
//! The entry point is [`driver::lift_function`] (one function at a time) or
//! [`driver::lift_all`] (a whole app model's libraries/classes/functions).
//! Everything else in this crate supports that: [`disasm`] is the contract a
//! real disassembler backend implements, [`app_model`]/[`snapshot`] is the
//! read-only catalog a lifting run is driven against, [`matcher`] is the
//! ordered pattern-handler chain, and [`il`]/[`var`]/[`params`] model the
//! recovered output.

pub mod analyzed_function;
pub mod app_model;
pub mod asm_text;
pub mod config;
pub mod diagnostics;
pub mod disasm;
pub mod driver;
pub mod error;
pub mod il;
pub mod matcher;
pub mod params;
pub mod pool;
pub mod register;
pub mod snapshot;
pub mod state;
pub mod var;
