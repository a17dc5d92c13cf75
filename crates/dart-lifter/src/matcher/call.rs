//! Call-site templates: register spill/reload around a call, direct and
//! dispatch-table calls, and return.

use crate::analyzed_function::AnalyzedFunction;
use crate::app_model::AppModel;
use crate::asm_text::AsmTag;
use crate::disasm::{Instruction, MemOffset, Mnemonic};
use crate::error::AnalysisError;
use crate::il::IlNode;
use crate::register::Register;

use super::{Handler, Matched};

pub struct SaveRegister;

impl Handler for SaveRegister {
    fn name(&self) -> &'static str {
        "SaveRegister"
    }

    fn try_match(
        &self,
        window: &[Instruction],
        _app: &dyn AppModel,
        _func: &mut AnalyzedFunction,
    ) -> Result<Option<Matched>, AnalysisError> {
        let Some(first) = window.first() else { return Ok(None) };
        if first.mnemonic != Mnemonic::Str {
            return Ok(None);
        }
        let Some(reg) = first.reg_operand(0) else { return Ok(None) };
        let Some((base, MemOffset::Imm(off), writeback)) = first.mem_operand(1) else { return Ok(None) };
        if base != Register::Sp || off >= 0 || !writeback {
            return Ok(None);
        }
        Ok(Some(Matched::new(1, IlNode::SaveRegister { reg })))
    }
}

pub struct LoadSavedRegister;

impl Handler for LoadSavedRegister {
    fn name(&self) -> &'static str {
        "LoadSavedRegister"
    }

    fn try_match(
        &self,
        window: &[Instruction],
        _app: &dyn AppModel,
        _func: &mut AnalyzedFunction,
    ) -> Result<Option<Matched>, AnalysisError> {
        let Some(first) = window.first() else { return Ok(None) };
        if first.mnemonic != Mnemonic::Ldr {
            return Ok(None);
        }
        let Some(reg) = first.reg_operand(0) else { return Ok(None) };
        let Some((base, MemOffset::Imm(off), writeback)) = first.mem_operand(1) else { return Ok(None) };
        if base != Register::Sp || off <= 0 || writeback {
            return Ok(None);
        }
        Ok(Some(Matched::new(1, IlNode::RestoreRegister { reg })))
    }
}

pub struct Call;

impl Handler for Call {
    fn name(&self) -> &'static str {
        "Call"
    }

    fn try_match(
        &self,
        window: &[Instruction],
        app: &dyn AppModel,
        func: &mut AnalyzedFunction,
    ) -> Result<Option<Matched>, AnalysisError> {
        let Some(first) = window.first() else { return Ok(None) };
        let is_tail_call = first.mnemonic == Mnemonic::B;
        if first.mnemonic != Mnemonic::Bl && !is_tail_call {
            return Ok(None);
        }
        let Some(target) = first.imm_operand(0) else { return Ok(None) };
        let target = target as u64;
        if is_tail_call {
            // Only a `B` leaving the function's own range is a tail call;
            // branches within the function are ordinary control flow, not
            // recognized templates (left as Unknown).
            let Some(owner) = app.function_at(first.address) else { return Ok(None) };
            if target >= owner.entry && target < owner.entry + owner.size {
                return Ok(None);
            }
        }
        let target_name = app.function_at(target).map(|f| f.name.clone());
        if let Some(line) = func.asm_texts.iter_mut().find(|t| t.address == first.address) {
            line.set_tag_once(AsmTag::Call { target_addr: target });
        }
        Ok(Some(Matched::new(1, IlNode::Call { target_name, target_addr: target })))
    }
}

pub struct GdtCall;

impl Handler for GdtCall {
    fn name(&self) -> &'static str {
        "GdtCall"
    }

    fn try_match(
        &self,
        window: &[Instruction],
        _app: &dyn AppModel,
        func: &mut AnalyzedFunction,
    ) -> Result<Option<Matched>, AnalysisError> {
        if window.len() < 3 {
            return Ok(None);
        }
        let arith = &window[0];
        let ldr = &window[1];
        let blr = &window[2];
        let selector_offset = match arith.mnemonic {
            Mnemonic::Add => arith.imm_operand(2),
            Mnemonic::Sub => arith.imm_operand(2).map(|v| -v),
            _ => None,
        };
        let selector_offset = match selector_offset {
            Some(v) => v,
            None => {
                // The selector offset was materialized into a register by a
                // preceding MOVZ/MOVK pair (`LoadValue` already fused it into
                // a `LoadValue` node) rather than folded into this ADD's
                // immediate; that register form is handled separately.
                return try_with_preceding_load_imm(window, func);
            }
        };
        if arith.reg_operand(0) != Some(Register::Lr) {
            return Ok(None);
        }
        if ldr.mnemonic != Mnemonic::Ldr {
            return Ok(None);
        }
        let Some((base, MemOffset::Reg { reg, shift, .. }, _)) = ldr.mem_operand(1) else { return Ok(None) };
        if base != Register::DISPATCH_TABLE || reg != Register::Lr || shift != 3 {
            return Ok(None);
        }
        if blr.mnemonic != Mnemonic::Blr || blr.reg_operand(0) != Some(Register::Lr) {
            return Ok(None);
        }
        Ok(Some(Matched::new(3, IlNode::GdtCall { selector_offset })))
    }
}

fn try_with_preceding_load_imm(
    window: &[Instruction],
    func: &mut AnalyzedFunction,
) -> Result<Option<Matched>, AnalysisError> {
    if window.len() < 3 {
        return Ok(None);
    }
    let add = &window[0];
    let ldr = &window[1];
    let blr = &window[2];
    if add.mnemonic != Mnemonic::Add || add.reg_operand(0) != Some(Register::Lr) {
        return Ok(None);
    }
    if ldr.mnemonic != Mnemonic::Ldr || blr.mnemonic != Mnemonic::Blr || blr.reg_operand(0) != Some(Register::Lr) {
        return Ok(None);
    }
    let Some((base, MemOffset::Reg { reg, shift, .. }, _)) = ldr.mem_operand(1) else { return Ok(None) };
    if base != Register::DISPATCH_TABLE || reg != Register::Lr || shift != 3 {
        return Ok(None);
    }
    let Some(last) = func.il.last() else { return Ok(None) };
    let IlNode::LoadValue { dst, item } = &last.node else { return Ok(None) };
    if *dst != Register::TMP2 {
        return Ok(None);
    }
    let Some(imm) = item.value.int_value(0) else { return Ok(None) };
    let popped = func.pop_il(1);
    let extra_start = popped[0].range.start;
    Ok(Some(Matched::fused(3, IlNode::GdtCall { selector_offset: imm }, extra_start)))
}

pub struct Return;

impl Handler for Return {
    fn name(&self) -> &'static str {
        "Return"
    }

    fn try_match(
        &self,
        window: &[Instruction],
        _app: &dyn AppModel,
        _func: &mut AnalyzedFunction,
    ) -> Result<Option<Matched>, AnalysisError> {
        match window.first() {
            Some(i) if i.mnemonic == Mnemonic::Ret => Ok(Some(Matched::new(1, IlNode::Return))),
            _ => Ok(None),
        }
    }
}
