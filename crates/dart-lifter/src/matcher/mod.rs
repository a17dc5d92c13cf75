//! The matcher chain (`SPEC_FULL.md` §4.2): an ordered list of pattern
//! handlers tried in turn against the instruction cursor. The first handler
//! that claims ≥1 instruction wins; if none do, the cursor instruction
//! becomes [`crate::il::IlNode::Unknown`].

pub mod alloc;
pub mod boxing;
pub mod call;
pub mod fields;
pub mod frame;
pub mod loadstore;
pub mod loadvalue;
pub mod optparams;
pub mod typetest;

use crate::analyzed_function::AnalyzedFunction;
use crate::app_model::AppModel;
use crate::disasm::Instruction;
use crate::error::AnalysisError;
use crate::il::{AddrRange, IlEntry, IlNode};

/// What a handler reports when its template applies.
pub struct Matched {
    pub consumed: usize,
    pub node: IlNode,
    /// Set when this match fuses one or more IL entries the handler already
    /// popped off `func.il` (see [`AnalyzedFunction::pop_il`]): the address
    /// the fused node's range should start from, instead of the current
    /// cursor instruction's address. `None` for an ordinary single-window
    /// match.
    pub extra_start: Option<u64>,
}

impl Matched {
    pub fn new(consumed: usize, node: IlNode) -> Self {
        Matched { consumed, node, extra_start: None }
    }

    pub fn fused(consumed: usize, node: IlNode, extra_start: u64) -> Self {
        Matched { consumed, node, extra_start: Some(extra_start) }
    }
}

/// A single recognized template. Implementations inspect `window` (the
/// remaining instructions of the function, cursor-first) and either:
/// - return `Ok(None)`: this template does not apply here, try the next one;
/// - return `Ok(Some(Matched{..}))`: it applies, consuming `consumed`
///   instructions starting at `window[0]`;
/// - return `Err(AnalysisError)`: it looked like this template but an
///   assumption was violated; the function is abandoned.
pub trait Handler {
    fn name(&self) -> &'static str;

    fn try_match(
        &self,
        window: &[Instruction],
        app: &dyn AppModel,
        func: &mut AnalyzedFunction,
    ) -> Result<Option<Matched>, AnalysisError>;
}

/// Builds the fixed handler order `SPEC_FULL.md` §4.2 specifies.
pub fn default_chain() -> Vec<Box<dyn Handler>> {
    vec![
        Box::new(frame::EnterFrame),
        Box::new(frame::LeaveFrame),
        Box::new(frame::AllocateStack),
        Box::new(frame::CheckStackOverflow),
        Box::new(loadvalue::LoadValue),
        Box::new(loadvalue::DecompressPointer),
        Box::new(optparams::OptionalParameters),
        Box::new(call::SaveRegister),
        Box::new(call::LoadSavedRegister),
        Box::new(call::Call),
        Box::new(call::GdtCall),
        Box::new(call::Return),
        Box::new(typetest::InstanceofNoTypeArgument),
        Box::new(typetest::BranchIfSmi),
        Box::new(typetest::LoadClassId),
        Box::new(boxing::BoxInt64),
        Box::new(boxing::LoadInt32FromBoxOrSmi),
        Box::new(typetest::LoadTaggedClassIdMayBeSmi),
        Box::new(fields::LoadFieldTable),
        Box::new(alloc::TryAllocateObject),
        Box::new(fields::WriteBarrier),
        Box::new(loadstore::LoadStore),
    ]
}

/// Drives the chain over one function's instructions, appending an IL entry
/// (or `Unknown`) for every instruction, in order. Returns the function's
/// errors are not surfaced here: per `SPEC_FULL.md` §4.1/§7, a handler
/// error abandons lifting of the *rest* of this function, converting the
/// cursor instruction into `Unknown` and returning the error to the caller
/// so it can be recorded as a diagnostic.
pub fn run_chain(
    chain: &[Box<dyn Handler>],
    instrs: &[Instruction],
    app: &dyn AppModel,
    func: &mut AnalyzedFunction,
) -> Result<(), (u64, AnalysisError)> {
    let mut cursor = 0usize;
    while cursor < instrs.len() {
        let window = &instrs[cursor..];
        let mut matched = None;
        for handler in chain {
            match handler.try_match(window, app, func) {
                Ok(Some(m)) => {
                    matched = Some(m);
                    break;
                }
                Ok(None) => continue,
                Err(e) => return Err((window[0].address, e)),
            }
        }
        match matched {
            Some(m) => {
                let consumed = m.consumed.max(1);
                let start = m.extra_start.unwrap_or(window[0].address);
                let end = window[consumed - 1].end_address();
                func.push_il(IlEntry::new(AddrRange::new(start, end), m.node));
                cursor += consumed;
            }
            None => {
                let instr = &window[0];
                let range = AddrRange::single(instr.address, instr.size as u64);
                func.push_il(IlEntry::new(range, IlNode::Unknown { text: format!("{:?}", instr.mnemonic) }));
                cursor += 1;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_model::{ClassId, DartClass, DartFunction, DartLibrary, TypeHandle};
    use crate::config::VersionConfig;
    use crate::disasm::{Mnemonic, Operand};
    use crate::register::Register;

    struct EmptyModel(VersionConfig);
    impl AppModel for EmptyModel {
        fn version_config(&self) -> &VersionConfig {
            &self.0
        }
        fn pool_entry(&self, _offset: u32) -> Option<&crate::app_model::PoolEntry> {
            None
        }
        fn class(&self, _id: ClassId) -> Option<&DartClass> {
            None
        }
        fn function_at(&self, _addr: u64) -> Option<&DartFunction> {
            None
        }
        fn libraries(&self) -> &[DartLibrary] {
            &[]
        }
        fn classes_in(&self, _library: &str) -> Vec<&DartClass> {
            Vec::new()
        }
        fn functions_in(&self, _class: &DartClass) -> Vec<&DartFunction> {
            Vec::new()
        }
        fn type_name(&self, _handle: TypeHandle) -> Option<&str> {
            None
        }
    }

    #[test]
    fn unrecognized_instruction_becomes_unknown() {
        let chain = default_chain();
        let model = EmptyModel(VersionConfig::default_config());
        let mut func = AnalyzedFunction::new();
        let instrs = vec![Instruction::literal(0x1000, Mnemonic::Eor, vec![Operand::Reg(Register::X(9))])];
        run_chain(&chain, &instrs, &model, &mut func).unwrap();
        assert_eq!(func.il.len(), 1);
        assert!(matches!(func.il[0].node, IlNode::Unknown { .. }));
    }

    #[test]
    fn enter_frame_then_return_covers_both_instructions() {
        let chain = default_chain();
        let model = EmptyModel(VersionConfig::default_config());
        let mut func = AnalyzedFunction::new();
        let instrs = vec![
            Instruction::literal(
                0x1000,
                Mnemonic::Stp,
                vec![
                    Operand::Reg(Register::Fp),
                    Operand::Reg(Register::Lr),
                    Operand::Mem { base: Register::Sp, offset: crate::disasm::MemOffset::Imm(-0x10), writeback: true },
                ],
            ),
            Instruction::literal(
                0x1004,
                Mnemonic::Mov,
                vec![Operand::Reg(Register::Fp), Operand::Reg(Register::Sp)],
            ),
            Instruction::literal(0x1008, Mnemonic::Ret, vec![]),
        ];
        run_chain(&chain, &instrs, &model, &mut func).unwrap();
        assert_eq!(func.il.len(), 2);
        assert!(matches!(func.il[0].node, IlNode::EnterFrame));
        assert!(func.use_frame_pointer);
        assert!(matches!(func.il[1].node, IlNode::Return));
    }
}
