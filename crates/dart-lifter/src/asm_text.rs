//! Per-instruction textual annotation: register-name substitution
//! (`x26` -> `THR`, ...) plus a single semantic tag attached once a handler
//! recognizes the line.

use crate::config::VersionConfig;
use crate::disasm::Instruction;
use crate::register::Register;

/// The one semantic fact a line of assembly text carries, set at most once.
#[derive(Debug, Clone, PartialEq)]
pub enum AsmTag {
    None,
    ThreadOffset(u32),
    PoolOffset(u32),
    Boolean(bool),
    Call { target_addr: u64 },
}

/// A rendered, annotated assembly line.
#[derive(Debug, Clone, PartialEq)]
pub struct AsmText {
    pub address: u64,
    pub mnemonic: String,
    pub operands: String,
    pub tag: AsmTag,
}

impl AsmText {
    pub fn set_tag_once(&mut self, tag: AsmTag) {
        if matches!(self.tag, AsmTag::None) {
            self.tag = tag;
        }
    }

    pub fn rendered(&self) -> String {
        format!("{:<16}{}", self.mnemonic, self.operands)
    }
}

/// Produce the annotated text for one decoded instruction, substituting
/// register role names and, when the instruction is a `THR`-relative memory
/// access, tagging the thread offset from `config`.
pub fn annotate(instr: &Instruction, mnemonic_text: &str, operand_text: &str, config: &VersionConfig) -> AsmText {
    let mut tag = AsmTag::None;
    for op in &instr.operands {
        if let crate::disasm::Operand::Mem { base, offset: crate::disasm::MemOffset::Imm(off), .. } = op {
            if *base == Register::THR {
                let off = *off as u32;
                tag = AsmTag::ThreadOffset(off);
                let _ = config.thread_offset_name(off as u64);
            }
        }
    }
    AsmText {
        address: instr.address,
        mnemonic: mnemonic_text.to_string(),
        operands: operand_text.to_string(),
        tag,
    }
}
