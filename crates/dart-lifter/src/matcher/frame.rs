//! Frame setup/teardown templates.

use crate::analyzed_function::AnalyzedFunction;
use crate::app_model::AppModel;
use crate::disasm::{Instruction, MemOffset, Mnemonic};
use crate::error::AnalysisError;
use crate::il::IlNode;
use crate::register::Register;

use super::{Handler, Matched};

pub struct EnterFrame;

impl Handler for EnterFrame {
    fn name(&self) -> &'static str {
        "EnterFrame"
    }

    fn try_match(
        &self,
        window: &[Instruction],
        _app: &dyn AppModel,
        func: &mut AnalyzedFunction,
    ) -> Result<Option<Matched>, AnalysisError> {
        if window.len() < 2 {
            return Ok(None);
        }
        let stp = &window[0];
        let mov = &window[1];
        if stp.mnemonic != Mnemonic::Stp {
            return Ok(None);
        }
        let Some((base, MemOffset::Imm(off), writeback)) = stp.mem_operand(2) else { return Ok(None) };
        if base != Register::Sp || off != -0x10 || !writeback {
            return Ok(None);
        }
        if stp.reg_operand(0) != Some(Register::Fp) || stp.reg_operand(1) != Some(Register::Lr) {
            return Ok(None);
        }
        if mov.mnemonic != Mnemonic::Mov
            || mov.reg_operand(0) != Some(Register::Fp)
            || mov.reg_operand(1) != Some(Register::Sp)
        {
            return Ok(None);
        }
        func.use_frame_pointer = true;
        Ok(Some(Matched::new(2, IlNode::EnterFrame)))
    }
}

pub struct LeaveFrame;

impl Handler for LeaveFrame {
    fn name(&self) -> &'static str {
        "LeaveFrame"
    }

    fn try_match(
        &self,
        window: &[Instruction],
        _app: &dyn AppModel,
        _func: &mut AnalyzedFunction,
    ) -> Result<Option<Matched>, AnalysisError> {
        if window.len() < 2 {
            return Ok(None);
        }
        let mov = &window[0];
        let ldp = &window[1];
        if mov.mnemonic != Mnemonic::Mov
            || mov.reg_operand(0) != Some(Register::Sp)
            || mov.reg_operand(1) != Some(Register::Fp)
        {
            return Ok(None);
        }
        if ldp.mnemonic != Mnemonic::Ldp
            || ldp.reg_operand(0) != Some(Register::Fp)
            || ldp.reg_operand(1) != Some(Register::Lr)
        {
            return Ok(None);
        }
        let Some((base, MemOffset::Imm(off), writeback)) = ldp.mem_operand(2) else { return Ok(None) };
        if base != Register::Sp || off != 0x10 || writeback {
            return Ok(None);
        }
        Ok(Some(Matched::new(2, IlNode::LeaveFrame)))
    }
}

pub struct AllocateStack;

impl Handler for AllocateStack {
    fn name(&self) -> &'static str {
        "AllocateStack"
    }

    fn try_match(
        &self,
        window: &[Instruction],
        _app: &dyn AppModel,
        func: &mut AnalyzedFunction,
    ) -> Result<Option<Matched>, AnalysisError> {
        let Some(sub) = window.first() else { return Ok(None) };
        if sub.mnemonic != Mnemonic::Sub || sub.reg_operand(0) != Some(Register::Sp) || sub.reg_operand(1) != Some(Register::Sp) {
            return Ok(None);
        }
        let Some(size) = sub.imm_operand(2) else { return Ok(None) };
        func.stack_size = size as u32;
        Ok(Some(Matched::new(1, IlNode::AllocateStack { size: size as u32 })))
    }
}

pub struct CheckStackOverflow;

impl Handler for CheckStackOverflow {
    fn name(&self) -> &'static str {
        "CheckStackOverflow"
    }

    fn try_match(
        &self,
        window: &[Instruction],
        app: &dyn AppModel,
        func: &mut AnalyzedFunction,
    ) -> Result<Option<Matched>, AnalysisError> {
        if window.len() < 3 {
            return Ok(None);
        }
        let ldr = &window[0];
        let cmp = &window[1];
        let bcond = &window[2];
        if ldr.mnemonic != Mnemonic::Ldr {
            return Ok(None);
        }
        let Some(tmp) = ldr.reg_operand(0) else { return Ok(None) };
        let Some((base, MemOffset::Imm(off), _)) = ldr.mem_operand(1) else { return Ok(None) };
        if base != Register::THR {
            return Ok(None);
        }
        let stack_limit_off = app.version_config().thread_offsets.get(&(off as u64));
        if stack_limit_off.map(String::as_str) != Some("stack_limit") {
            return Ok(None);
        }
        if cmp.mnemonic != Mnemonic::Cmp || cmp.reg_operand(0) != Some(Register::Sp) || cmp.reg_operand(1) != Some(tmp) {
            return Ok(None);
        }
        let Mnemonic::Bcond(cond) = bcond.mnemonic else { return Ok(None) };
        if !matches!(cond, crate::disasm::Cond::Ls) {
            return Ok(None);
        }
        let Some(target) = bcond.imm_operand(0) else { return Ok(None) };
        if func.first_check_stack_overflow.is_none() {
            func.first_check_stack_overflow = Some(window[0].address);
        }
        Ok(Some(Matched::new(3, IlNode::CheckStackOverflow { slow_target: target as u64 })))
    }
}
