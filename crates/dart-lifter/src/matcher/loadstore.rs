//! Plain field and array element access once pool loads, frame setup, and
//! the write barrier have already claimed their own templates: whatever
//! load/store reaches this handler addresses either a fixed-offset object
//! field (`obj.field`) or a register-indexed array element (`arr[i]`).

use crate::analyzed_function::AnalyzedFunction;
use crate::app_model::AppModel;
use crate::disasm::{Instruction, MemOffset, Mnemonic};
use crate::error::AnalysisError;
use crate::il::{ArrayIndex, ArrayOp, ArrayOpKind, IlNode};

use super::{Handler, Matched};

pub struct LoadStore;

impl Handler for LoadStore {
    fn name(&self) -> &'static str {
        "LoadStore"
    }

    fn try_match(
        &self,
        window: &[Instruction],
        _app: &dyn AppModel,
        _func: &mut AnalyzedFunction,
    ) -> Result<Option<Matched>, AnalysisError> {
        let Some(first) = window.first() else { return Ok(None) };
        let (is_load, size, kind) = match first.mnemonic {
            Mnemonic::Ldr => (true, 8, ArrayOpKind::List),
            Mnemonic::Str => (false, 8, ArrayOpKind::List),
            Mnemonic::Ldurb => (true, 1, ArrayOpKind::TypedUnsigned),
            Mnemonic::Sturb => (false, 1, ArrayOpKind::TypedUnsigned),
            Mnemonic::Ldurh => (true, 2, ArrayOpKind::TypedUnsigned),
            Mnemonic::Sturh => (false, 2, ArrayOpKind::TypedUnsigned),
            Mnemonic::Ldur => (true, 8, ArrayOpKind::Unknown),
            Mnemonic::Stur => (false, 8, ArrayOpKind::Unknown),
            _ => return Ok(None),
        };

        let Some(value_reg) = first.reg_operand(0) else { return Ok(None) };
        let Some((base, offset, _)) = first.mem_operand(1) else { return Ok(None) };

        match offset {
            MemOffset::Reg { reg, shift, .. } => {
                if shift != 0 && shift as u32 != size_log2(size) {
                    return Ok(None);
                }
                let op = ArrayOp::new(size, is_load, kind);
                let index = ArrayIndex::Reg(reg);
                let node = if is_load {
                    IlNode::LoadArrayElement { dst: value_reg, arr: base, index, op }
                } else {
                    IlNode::StoreArrayElement { src: value_reg, arr: base, index, op }
                };
                Ok(Some(Matched::new(1, node)))
            }
            MemOffset::Imm(off) => {
                if off < 0 || off > u32::MAX as i64 {
                    return Ok(None);
                }
                let node = if is_load {
                    IlNode::LoadField { dst: value_reg, obj: base, offset: off as u32 }
                } else {
                    IlNode::StoreField { src: value_reg, obj: base, offset: off as u32 }
                };
                Ok(Some(Matched::new(1, node)))
            }
        }
    }
}

fn size_log2(size: u8) -> u32 {
    size.trailing_zeros()
}
