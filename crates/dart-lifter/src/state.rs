//! Per-function scratch state, live only while that function is being
//! lifted. Never shared across functions.

use rustc_hash::FxHashMap;

use crate::il::IlEntry;
use crate::register::Register;
use crate::var::VarValue;

/// Tracks the lifter's current belief about what value each register and
/// each FP-relative local slot holds, plus the callee argument values
/// accumulated for an in-progress call.
#[derive(Debug, Clone, Default)]
pub struct AnalyzingState {
    registers: FxHashMap<Register, VarValue>,
    locals: FxHashMap<i32, VarValue>,
    pub pending_call_args: Vec<VarValue>,
}

impl AnalyzingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_register(&mut self, reg: Register, value: VarValue) {
        self.registers.insert(reg, value);
    }

    pub fn register(&self, reg: Register) -> Option<&VarValue> {
        self.registers.get(&reg)
    }

    pub fn clear_register(&mut self, reg: Register) {
        self.registers.remove(&reg);
    }

    /// Slot index for a negative FP offset: `(-offset - word_size) /
    /// word_size`.
    pub fn slot_index(offset: i32, word_size: i32) -> i32 {
        debug_assert!(offset < 0);
        (-offset - word_size) / word_size
    }

    pub fn set_local(&mut self, offset: i32, value: VarValue) {
        self.locals.insert(offset, value);
    }

    pub fn local(&self, offset: i32) -> Option<&VarValue> {
        self.locals.get(&offset)
    }
}

/// Prologue-scoped bookkeeping for parameter recovery: pseudo-values for the
/// parameter-owner register, the args-descriptor register, and the
/// "current named-param position" register, plus a holding area for IL
/// nodes pending emission once the prologue template fully matches.
#[derive(Debug, Clone, Default)]
pub struct AnalyzingVars {
    pub args_descriptor_reg: Option<Register>,
    pub current_named_position_reg: Option<Register>,
    pub pending_nodes: Vec<IlEntry>,
}

impl AnalyzingVars {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_index_matches_first_local() {
        assert_eq!(AnalyzingState::slot_index(-8, 8), 0);
        assert_eq!(AnalyzingState::slot_index(-16, 8), 1);
    }

    #[test]
    fn register_tracking_round_trips() {
        let mut state = AnalyzingState::new();
        state.set_register(Register::X(0), VarValue::Null);
        assert_eq!(state.register(Register::X(0)), Some(&VarValue::Null));
        state.clear_register(Register::X(0));
        assert_eq!(state.register(Register::X(0)), None);
    }
}
