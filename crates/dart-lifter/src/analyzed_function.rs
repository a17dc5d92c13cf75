//! The per-function artifact the lifter produces, consumed by downstream
//! text dumpers (out of scope here; see `SPEC_FULL.md` §1/§6).

use crate::asm_text::AsmText;
use crate::il::IlEntry;
use crate::params::FnParams;
use crate::register::Register;
use crate::state::{AnalyzingState, AnalyzingVars};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegLocal {
    pub reg: Register,
    pub local_offset: i32,
}

#[derive(Debug, Default)]
pub struct AnalyzedFunction {
    pub asm_texts: Vec<AsmText>,
    pub il: Vec<IlEntry>,
    pub stack_size: u32,
    pub use_frame_pointer: bool,
    pub first_check_stack_overflow: Option<u64>,
    pub params: FnParams,
    pub return_type: Option<String>,
    pub closure_context: Option<RegLocal>,
    pub type_arguments: Option<RegLocal>,
    /// Present only while the function is being lifted; cleared once
    /// lifting finishes (`SPEC_FULL.md` §3 lifecycle invariants).
    pub analyzing_state: Option<AnalyzingState>,
    pub analyzing_vars: Option<AnalyzingVars>,
}

impl AnalyzedFunction {
    pub fn new() -> Self {
        AnalyzedFunction {
            params: FnParams::new(0),
            ..Default::default()
        }
    }

    pub fn push_il(&mut self, entry: IlEntry) {
        self.il.push(entry);
    }

    /// Pop and discard the last `n` IL nodes, for fusion handlers like
    /// `LoadTaggedClassIdMayBeSmi` that replace a run of preceding nodes.
    pub fn pop_il(&mut self, n: usize) -> Vec<IlEntry> {
        let start = self.il.len().saturating_sub(n);
        self.il.split_off(start)
    }

    /// Release per-function lifting scratch state; called once the IL list
    /// is final.
    pub fn finish_lifting(&mut self) {
        self.analyzing_state = None;
        self.analyzing_vars = None;
    }
}
