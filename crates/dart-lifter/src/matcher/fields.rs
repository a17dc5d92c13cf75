//! Static-field table access and the generational write barrier.

use crate::analyzed_function::AnalyzedFunction;
use crate::app_model::AppModel;
use crate::disasm::{Cond, Instruction, MemOffset, Mnemonic};
use crate::error::AnalysisError;
use crate::il::IlNode;
use crate::pool::try_match_pool_load;
use crate::register::Register;
use crate::var::VarValue;

use super::{Handler, Matched};

/// `LDR tmp,[THR,#field_table_values]` then `LDR dst,[tmp,#offset]`: a plain
/// static-field read. When immediately followed by a load of `Sentinel`
/// from the pool, a `CMP` of the field value against it, a `B.ne` to an
/// initializer, and a `BL` into the init stub, the whole run is recognized
/// as a late field's first access instead. Any other `Bcond`+`Bl` tail
/// (an ordinary field read followed by unrelated control flow) falls
/// through to the plain read — this used to be accepted unconditionally,
/// which misclassified plain field reads whenever they happened to be
/// followed by any branch-then-call pair.
pub struct LoadFieldTable;

impl Handler for LoadFieldTable {
    fn name(&self) -> &'static str {
        "LoadFieldTable"
    }

    fn try_match(
        &self,
        window: &[Instruction],
        app: &dyn AppModel,
        _func: &mut AnalyzedFunction,
    ) -> Result<Option<Matched>, AnalysisError> {
        if window.len() < 2 {
            return Ok(None);
        }
        let ldr_table = &window[0];
        let ldr_field = &window[1];
        if ldr_table.mnemonic != Mnemonic::Ldr || ldr_field.mnemonic != Mnemonic::Ldr {
            return Ok(None);
        }
        let Some(tmp) = ldr_table.reg_operand(0) else { return Ok(None) };
        let Some((base, MemOffset::Imm(off), _)) = ldr_table.mem_operand(1) else { return Ok(None) };
        if base != Register::THR {
            return Ok(None);
        }
        if app.version_config().thread_offsets.get(&(off as u64)).map(String::as_str) != Some("field_table_values") {
            return Ok(None);
        }
        let Some(dst) = ldr_field.reg_operand(0) else { return Ok(None) };
        let Some((base2, MemOffset::Imm(field_offset), _)) = ldr_field.mem_operand(1) else { return Ok(None) };
        if base2 != tmp {
            return Ok(None);
        }

        if let Some(m) = try_match_late_static_field_init(window, app, dst, field_offset)? {
            return Ok(Some(m));
        }

        Ok(Some(Matched::new(2, IlNode::LoadStaticField { dst, offset: field_offset as u32 })))
    }
}

/// `Sentinel` pool load, `CMP dst,sentinelReg`, `B.ne initializer`, `BL
/// initStub` — the late-static-field first-access guard. Starts right after
/// the 2-instruction plain field read `LoadFieldTable::try_match` already
/// consumed.
fn try_match_late_static_field_init(
    window: &[Instruction],
    app: &dyn AppModel,
    dst: Register,
    field_offset: i64,
) -> Result<Option<Matched>, AnalysisError> {
    let mut idx = 2;
    let Some(pool) = try_match_pool_load(&window[idx..], app)? else { return Ok(None) };
    if pool.item.value != VarValue::Sentinel {
        return Ok(None);
    }
    idx += pool.consumed;

    let Some(cmp) = window.get(idx) else { return Ok(None) };
    if cmp.mnemonic != Mnemonic::Cmp || cmp.reg_operand(0) != Some(dst) || cmp.reg_operand(1) != Some(pool.dest) {
        return Ok(None);
    }
    idx += 1;

    let Some(branch) = window.get(idx) else { return Ok(None) };
    if !matches!(branch.mnemonic, Mnemonic::Bcond(Cond::Ne)) {
        return Ok(None);
    }
    idx += 1;

    let Some(call) = window.get(idx) else { return Ok(None) };
    if call.mnemonic != Mnemonic::Bl {
        return Ok(None);
    }
    idx += 1;

    let target = call.imm_operand(0).map(|v| v as u64);
    let field_name = target
        .and_then(|t| app.function_at(t))
        .map(|f| f.name.clone())
        .unwrap_or_else(|| format!("field_{field_offset}"));
    Ok(Some(Matched::new(idx, IlNode::InitLateStaticField { dst, field_name })))
}

/// `STR value,[object,#offset]` immediately followed by a call into the
/// generational or array write-barrier stub.
pub struct WriteBarrier;

impl Handler for WriteBarrier {
    fn name(&self) -> &'static str {
        "WriteBarrier"
    }

    fn try_match(
        &self,
        window: &[Instruction],
        app: &dyn AppModel,
        _func: &mut AnalyzedFunction,
    ) -> Result<Option<Matched>, AnalysisError> {
        if window.len() < 2 {
            return Ok(None);
        }
        let store = &window[0];
        let bl = &window[1];
        if !matches!(store.mnemonic, Mnemonic::Str | Mnemonic::Stur) {
            return Ok(None);
        }
        let Some(value) = store.reg_operand(0) else { return Ok(None) };
        let Some((object, _, _)) = store.mem_operand(1) else { return Ok(None) };
        if bl.mnemonic != Mnemonic::Bl {
            return Ok(None);
        }
        let Some(target) = bl.imm_operand(0) else { return Ok(None) };
        let Some(callee) = app.function_at(target as u64) else { return Ok(None) };
        if !callee.name.contains("WriteBarrier") {
            return Ok(None);
        }
        let is_array = callee.name.contains("Array");
        Ok(Some(Matched::new(2, IlNode::WriteBarrier { object, value, is_array })))
    }
}
