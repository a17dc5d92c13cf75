//! The top-level driver (`SPEC_FULL.md` §4.1): walks libraries, classes, and
//! functions, disassembles each function's code range, runs it through the
//! matcher chain, and collects a [`Diagnostic`] for every function the chain
//! had to abandon.

use crate::analyzed_function::AnalyzedFunction;
use crate::app_model::{AppModel, DartFunction};
use crate::asm_text::{annotate, AsmText};
use crate::diagnostics::Diagnostic;
use crate::disasm::{Disassembler, Instruction, MemOffset, Mnemonic, Operand};
use crate::matcher::{default_chain, run_chain, Handler};

/// Lift a single function's code range into an [`AnalyzedFunction`].
///
/// `code` must be exactly the bytes of `[start_addr, start_addr + code.len())`.
/// On a handler error the function's IL is left as-built up to (and
/// including, as `Unknown`) the failing instruction, and the error is
/// returned alongside the address it was raised at so the caller can build a
/// [`Diagnostic`].
pub fn lift_function(
    chain: &[Box<dyn Handler>],
    disassembler: &dyn Disassembler,
    app: &dyn AppModel,
    code: &[u8],
    start_addr: u64,
) -> Result<AnalyzedFunction, (AnalyzedFunction, u64, crate::error::AnalysisError)> {
    let mut func = AnalyzedFunction::new();
    let instrs = match disassembler.disassemble(code, start_addr) {
        Ok(i) => i,
        Err(e) => {
            return Err((func, start_addr, crate::error::InsnException::new(e.to_string()).into()));
        }
    };

    func.asm_texts = instrs.iter().map(|i| render_asm_text(i, app)).collect();
    func.analyzing_state = Some(crate::state::AnalyzingState::new());

    match run_chain(chain, &instrs, app, &mut func) {
        Ok(()) => {
            func.finish_lifting();
            Ok(func)
        }
        Err((addr, e)) => Err((func, addr, e)),
    }
}

/// Runs every function the app model exposes, grouped by library and class,
/// through [`lift_function`]. `code_at` supplies the raw bytes for a
/// function's `[entry, entry + size)` range (e.g. a slice of the ELF text
/// section); functions for which it returns `None` are skipped.
pub fn lift_all<'a>(
    app: &dyn AppModel,
    disassembler: &dyn Disassembler,
    code_at: impl Fn(&DartFunction) -> Option<&'a [u8]>,
) -> (Vec<(DartFunction, AnalyzedFunction)>, Vec<Diagnostic>) {
    let chain = default_chain();
    let mut lifted = Vec::new();
    let mut diagnostics = Vec::new();

    for library in app.libraries() {
        for class in app.classes_in(&library.name) {
            for function in app.functions_in(class) {
                let Some(code) = code_at(function) else { continue };
                match lift_function(&chain, disassembler, app, code, function.entry) {
                    Ok(analyzed) => lifted.push((function.clone(), analyzed)),
                    Err((partial, addr, err)) => {
                        diagnostics.push(
                            Diagnostic::new(function.name.clone(), addr, err.to_string(), "matcher chain")
                                .with_context(partial.asm_texts.clone()),
                        );
                        lifted.push((function.clone(), partial));
                    }
                }
            }
        }
    }

    (lifted, diagnostics)
}

fn render_asm_text(instr: &Instruction, app: &dyn AppModel) -> AsmText {
    let mnemonic_text = mnemonic_name(instr.mnemonic);
    let operand_text = instr
        .operands
        .iter()
        .map(render_operand)
        .collect::<Vec<_>>()
        .join(", ");
    annotate(instr, mnemonic_text, &operand_text, app.version_config())
}

fn mnemonic_name(m: Mnemonic) -> &'static str {
    match m {
        Mnemonic::Stp => "stp",
        Mnemonic::Ldp => "ldp",
        Mnemonic::Mov => "mov",
        Mnemonic::MovZ => "movz",
        Mnemonic::MovK => "movk",
        Mnemonic::MovN => "movn",
        Mnemonic::Add => "add",
        Mnemonic::Sub => "sub",
        Mnemonic::Cmp => "cmp",
        Mnemonic::Tst => "tst",
        Mnemonic::And => "and",
        Mnemonic::Orr => "orr",
        Mnemonic::Eor => "eor",
        Mnemonic::Lsl => "lsl",
        Mnemonic::Asr => "asr",
        Mnemonic::Sbfx => "sbfx",
        Mnemonic::Sbfiz => "sbfiz",
        Mnemonic::Ubfx => "ubfx",
        Mnemonic::Ldr => "ldr",
        Mnemonic::Str => "str",
        Mnemonic::Ldur => "ldur",
        Mnemonic::Stur => "stur",
        Mnemonic::Ldurb => "ldurb",
        Mnemonic::Sturb => "sturb",
        Mnemonic::Ldurh => "ldurh",
        Mnemonic::Sturh => "sturh",
        Mnemonic::Tbz => "tbz",
        Mnemonic::Tbnz => "tbnz",
        Mnemonic::Bcond(_) => "b.cond",
        Mnemonic::B => "b",
        Mnemonic::Bl => "bl",
        Mnemonic::Blr => "blr",
        Mnemonic::Ret => "ret",
        Mnemonic::Fmov => "fmov",
    }
}

fn render_operand(op: &Operand) -> String {
    match op {
        Operand::Reg(r) => r.to_string(),
        Operand::Imm(v) => format!("#{v:#x}"),
        Operand::FImm(v) => format!("#{v}"),
        Operand::Mem { base, offset, writeback } => {
            let inner = match offset {
                MemOffset::Imm(0) => base.to_string(),
                MemOffset::Imm(off) => format!("{base}, #{off:#x}"),
                MemOffset::Reg { reg, shift, .. } if *shift == 0 => format!("{base}, {reg}"),
                MemOffset::Reg { reg, shift, .. } => format!("{base}, {reg}, lsl #{shift}"),
            };
            if *writeback {
                format!("[{inner}]!")
            } else {
                format!("[{inner}]")
            }
        }
        Operand::Shift { kind, amount } => {
            let name = match kind {
                crate::disasm::ShiftKind::Lsl => "lsl",
                crate::disasm::ShiftKind::Lsr => "lsr",
                crate::disasm::ShiftKind::Asr => "asr",
            };
            format!("{name} #{amount}")
        }
    }
}
