//! Class-id and type-test templates.

use crate::analyzed_function::AnalyzedFunction;
use crate::app_model::AppModel;
use crate::disasm::{Instruction, MemOffset, Mnemonic};
use crate::error::AnalysisError;
use crate::il::IlNode;
use crate::pool::try_match_pool_load;
use crate::register::Register;
use crate::var::VarValue;

use super::{Handler, Matched};

/// The full `instanceof` prologue-to-stub-call template, recognized
/// end-to-end by this handler rather than delegating to [`BranchIfSmi`] /
/// `LoadClassId`, since it claims a contiguous window spanning both.
pub struct InstanceofNoTypeArgument;

impl Handler for InstanceofNoTypeArgument {
    fn name(&self) -> &'static str {
        "InstanceofNoTypeArgument"
    }

    fn try_match(
        &self,
        window: &[Instruction],
        app: &dyn AppModel,
        _func: &mut AnalyzedFunction,
    ) -> Result<Option<Matched>, AnalysisError> {
        if window.len() < 6 {
            return Ok(None);
        }
        let mov_inst = &window[0];
        let mov_type_args = &window[1];
        let mov_fn_type_args = &window[2];
        if mov_inst.mnemonic != Mnemonic::Mov || mov_type_args.mnemonic != Mnemonic::Mov || mov_fn_type_args.mnemonic != Mnemonic::Mov {
            return Ok(None);
        }
        if mov_type_args.reg_operand(1) != Some(Register::NULL_REG) || mov_fn_type_args.reg_operand(1) != Some(Register::NULL_REG) {
            return Ok(None);
        }
        let Some(src) = mov_inst.reg_operand(1) else { return Ok(None) };

        let mut idx = 3;
        let tbz = &window[idx];
        if tbz.mnemonic != Mnemonic::Tbz {
            return Ok(None);
        }
        let Some(obj) = tbz.reg_operand(0) else { return Ok(None) };
        if obj != src {
            return Ok(None);
        }
        idx += 1;

        let Some(pool1) = try_match_pool_load(&window[idx..], app)? else { return Ok(None) };
        let type_name = match &pool1.item.value {
            VarValue::Type { name } => name.clone(),
            _ => return Ok(None),
        };
        idx += pool1.consumed;

        let Some(pool2) = try_match_pool_load(&window[idx..], app)? else { return Ok(None) };
        if !matches!(pool2.item.value, VarValue::SubtypeTestCache | VarValue::Null) {
            return Ok(None);
        }
        idx += pool2.consumed;

        let Some(bl) = window.get(idx) else { return Ok(None) };
        if bl.mnemonic != Mnemonic::Bl {
            return Ok(None);
        }
        idx += 1;

        Ok(Some(Matched::new(idx, IlNode::TestType { src: obj, type_name })))
    }
}

pub struct BranchIfSmi;

impl Handler for BranchIfSmi {
    fn name(&self) -> &'static str {
        "BranchIfSmi"
    }

    fn try_match(
        &self,
        window: &[Instruction],
        app: &dyn AppModel,
        _func: &mut AnalyzedFunction,
    ) -> Result<Option<Matched>, AnalysisError> {
        let Some(first) = window.first() else { return Ok(None) };
        if first.mnemonic != Mnemonic::Tbz {
            return Ok(None);
        }
        let Some(obj) = first.reg_operand(0) else { return Ok(None) };
        let Some(bit) = first.imm_operand(1) else { return Ok(None) };
        if bit as u32 != app.version_config().smi_tag_size - 1 && bit != 0 {
            return Ok(None);
        }
        let Some(target) = first.imm_operand(2) else { return Ok(None) };
        Ok(Some(Matched::new(1, IlNode::BranchIfSmi { obj, branch_addr: target as u64 })))
    }
}

pub struct LoadClassId;

impl Handler for LoadClassId {
    fn name(&self) -> &'static str {
        "LoadClassId"
    }

    fn try_match(
        &self,
        window: &[Instruction],
        app: &dyn AppModel,
        _func: &mut AnalyzedFunction,
    ) -> Result<Option<Matched>, AnalysisError> {
        if app.version_config().uses_halfword_class_id() {
            let Some(first) = window.first() else { return Ok(None) };
            if first.mnemonic != Mnemonic::Ldurh {
                return Ok(None);
            }
            let Some(cid_dst) = first.reg_operand(0) else { return Ok(None) };
            let Some((obj, MemOffset::Imm(1), _)) = first.mem_operand(1) else { return Ok(None) };
            return Ok(Some(Matched::new(1, IlNode::LoadClassId { obj, cid_dst })));
        }

        if window.len() < 2 {
            return Ok(None);
        }
        let ldur = &window[0];
        let ubfx = &window[1];
        if ldur.mnemonic != Mnemonic::Ldur || ubfx.mnemonic != Mnemonic::Ubfx {
            return Ok(None);
        }
        let Some(cid_dst) = ldur.reg_operand(0) else { return Ok(None) };
        let Some((obj, MemOffset::Imm(-1), _)) = ldur.mem_operand(1) else { return Ok(None) };
        if ubfx.reg_operand(0) != Some(cid_dst) || ubfx.reg_operand(1) != Some(cid_dst) {
            return Ok(None);
        }
        Ok(Some(Matched::new(2, IlNode::LoadClassId { obj, cid_dst })))
    }
}

/// Fuses `LoadValue(cid) + BranchIfSmi(obj, done) + LoadClassId(obj, cid)`
/// into a single node when followed by `LSL cid,cid,#smi_tag_size`.
pub struct LoadTaggedClassIdMayBeSmi;

impl Handler for LoadTaggedClassIdMayBeSmi {
    fn name(&self) -> &'static str {
        "LoadTaggedClassIdMayBeSmi"
    }

    fn try_match(
        &self,
        window: &[Instruction],
        _app: &dyn AppModel,
        func: &mut AnalyzedFunction,
    ) -> Result<Option<Matched>, AnalysisError> {
        let Some(lsl) = window.first() else { return Ok(None) };
        if lsl.mnemonic != Mnemonic::Lsl {
            return Ok(None);
        }
        let Some(cid) = lsl.reg_operand(0) else { return Ok(None) };
        if lsl.reg_operand(1) != Some(cid) {
            return Ok(None);
        }
        if func.il.len() < 3 {
            return Ok(None);
        }
        let last3 = &func.il[func.il.len() - 3..];
        let (IlNode::LoadValue { dst: load_dst, .. }, IlNode::BranchIfSmi { obj, .. }, IlNode::LoadClassId { obj: cid_obj, cid_dst }) =
            (&last3[0].node, &last3[1].node, &last3[2].node)
        else {
            return Ok(None);
        };
        if *load_dst != cid || *cid_dst != cid || *cid_obj != *obj {
            return Ok(None);
        }
        let obj = *obj;
        let popped = func.pop_il(3);
        let extra_start = popped[0].range.start;
        Ok(Some(Matched::fused(1, IlNode::LoadTaggedClassIdMayBeSmi { obj, cid_dst: cid }, extra_start)))
    }
}
