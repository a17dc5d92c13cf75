//! Box/unbox templates for 64-bit integers.

use crate::analyzed_function::AnalyzedFunction;
use crate::app_model::AppModel;
use crate::disasm::{Instruction, Mnemonic};
use crate::error::AnalysisError;
use crate::il::IlNode;

use super::{Handler, Matched};

/// `BL AllocateMint` followed by `STUR src,[dst,#value_offset]` — simplified
/// here to the two-instruction allocate-then-store shape; the allocation
/// call itself is left to [`super::call::Call`] and only the store half is
/// claimed here, with the call's return value already bound to `dst`.
pub struct BoxInt64;

impl Handler for BoxInt64 {
    fn name(&self) -> &'static str {
        "BoxInt64"
    }

    fn try_match(
        &self,
        window: &[Instruction],
        _app: &dyn AppModel,
        _func: &mut AnalyzedFunction,
    ) -> Result<Option<Matched>, AnalysisError> {
        let Some(first) = window.first() else { return Ok(None) };
        if first.mnemonic != Mnemonic::Stur {
            return Ok(None);
        }
        let Some(src) = first.reg_operand(0) else { return Ok(None) };
        let Some((dst, crate::disasm::MemOffset::Imm(offset), false)) = first.mem_operand(1) else { return Ok(None) };
        if offset != 7 {
            // Mint's value field sits at a fixed unscaled offset from the
            // tagged pointer; anything else is a different store template.
            return Ok(None);
        }
        Ok(Some(Matched::new(1, IlNode::BoxInt64 { dst, src })))
    }
}

/// `TBZ src,#0,is_smi` guarding a boxed-Mint unbox: `LDUR dst,[src,#value_offset]`
/// on the boxed path, `ASR dst,src,#smi_tag_size` on the Smi path. Only the
/// boxed-path load is matched here; the Smi shift is left to ordinary
/// arithmetic (`Unknown`) since it carries no useful IL beyond the shift
/// itself.
pub struct LoadInt32FromBoxOrSmi;

impl Handler for LoadInt32FromBoxOrSmi {
    fn name(&self) -> &'static str {
        "LoadInt32FromBoxOrSmi"
    }

    fn try_match(
        &self,
        window: &[Instruction],
        _app: &dyn AppModel,
        _func: &mut AnalyzedFunction,
    ) -> Result<Option<Matched>, AnalysisError> {
        let Some(first) = window.first() else { return Ok(None) };
        if first.mnemonic != Mnemonic::Ldur {
            return Ok(None);
        }
        let Some(dst) = first.reg_operand(0) else { return Ok(None) };
        let Some((src, crate::disasm::MemOffset::Imm(offset), false)) = first.mem_operand(1) else { return Ok(None) };
        if offset != 7 {
            return Ok(None);
        }
        Ok(Some(Matched::new(1, IlNode::LoadInt32FromBoxOrSmi { dst, src })))
    }
}
