//! Optional/named parameter prologue recovery (`SPEC_FULL.md` §4.5).
//!
//! `Handler::try_match` sees the *whole remaining instruction window* of the
//! function (`matcher::run_chain` passes `&instrs[cursor..]`, not a
//! fixed-size slice), so the branch ladder this prologue shape needs does
//! not require any cross-call continuation state: one call walks the
//! trigger, the positional-optional branch ladder or the named-parameter
//! walk, and the default-value zip, and reports however many instructions it
//! actually recognized. Past the trigger and the count/name-offset load,
//! every step is best-effort: a shape that doesn't match what's expected
//! simply stops the walk there rather than raising an error, since there is
//! no reference binary corpus here to validate a hard assertion against.
//! Whatever got recognized before the stopping point is still reported as a
//! single `SetupParameters` node, with `func.params` populated up to there.

use crate::analyzed_function::AnalyzedFunction;
use crate::app_model::AppModel;
use crate::disasm::{Cond, Instruction, MemOffset, Mnemonic};
use crate::error::AnalysisError;
use crate::il::IlNode;
use crate::params::{FnParamInfo, FnParams, ParamType};
use crate::pool::try_match_pool_load;
use crate::register::Register;
use crate::state::AnalyzingVars;
use crate::var::{IntKind, VarValue};

use super::{Handler, Matched};

pub struct OptionalParameters;

impl Handler for OptionalParameters {
    fn name(&self) -> &'static str {
        "OptionalParameters"
    }

    fn try_match(
        &self,
        window: &[Instruction],
        app: &dyn AppModel,
        func: &mut AnalyzedFunction,
    ) -> Result<Option<Matched>, AnalysisError> {
        if func.stack_size == 0 {
            return Ok(None);
        }
        if window.len() < 2 {
            return Ok(None);
        }
        let mov = &window[0];
        if mov.mnemonic != Mnemonic::Mov || mov.reg_operand(1) != Some(Register::ARGS_DESC) {
            return Ok(None);
        }
        let Some(args_desc_reg) = mov.reg_operand(0) else { return Ok(None) };

        let first_load = &window[1];
        if !matches!(first_load.mnemonic, Mnemonic::Ldr | Mnemonic::Ldur) {
            return Ok(None);
        }
        let Some(reg0) = first_load.reg_operand(0) else { return Ok(None) };
        let Some((base, MemOffset::Imm(off), _)) = first_load.mem_operand(1) else { return Ok(None) };
        if base != args_desc_reg {
            return Ok(None);
        }

        let is_named = off == FIRST_NAMED_ENTRY_OFFSET;
        func.params.is_named_param = is_named;
        func.analyzing_vars = Some(AnalyzingVars {
            args_descriptor_reg: Some(args_desc_reg),
            current_named_position_reg: if is_named { Some(reg0) } else { None },
            pending_nodes: Vec::new(),
        });

        let consumed = if is_named {
            match_named_parameters(window, app, reg0, &mut func.params)
        } else {
            match_positional_optional(window, app, reg0, &mut func.params)
        };

        Ok(Some(Matched::new(consumed, IlNode::SetupParameters)))
    }
}

/// Byte offset of an args descriptor's first named-entry slot; distinct from
/// the plain parameter count slot used by the positional-optional case.
const FIRST_NAMED_ENTRY_OFFSET: i64 = 0x1b;

/// Unscaled offset of a boxed `Double`'s value field and of a `Mint`'s value
/// field; both sit at the same slot past the object header, the same
/// convention `boxing::BoxInt64`/`LoadInt32FromBoxOrSmi` already hardcode.
const BOXED_VALUE_OFFSET: i64 = 7;

/// `ADD tmp,FP,idxReg[,ext]` then `LDR|LDUR valReg,[tmp]`, optionally
/// followed by a spill `STUR valReg,[FP,#off]`. Shared by the fixed
/// positional-parameter loop and each loaded slot of the optional-positional
/// ladder. Shift/extend amounts on the `ADD` are not captured by the operand
/// model and are not checked here, matching the rest of this codebase's
/// convention of matching on mnemonic and register identity only.
fn try_indexed_param_load(window: &[Instruction], idx: usize, idx_reg: Register) -> Option<(FnParamInfo, usize)> {
    let add = window.get(idx)?;
    if add.mnemonic != Mnemonic::Add || add.reg_operand(1) != Some(Register::Fp) || add.reg_operand(2) != Some(idx_reg) {
        return None;
    }
    let tmp_reg = add.reg_operand(0)?;
    let mut next = idx + 1;

    let load = window.get(next)?;
    if !matches!(load.mnemonic, Mnemonic::Ldr | Mnemonic::Ldur) {
        return None;
    }
    let val_reg = load.reg_operand(0)?;
    match load.mem_operand(1) {
        Some((base, _, _)) if base == tmp_reg => {}
        _ => return None,
    }
    next += 1;

    let mut local_offset = None;
    if let Some(stur) = window.get(next) {
        if stur.mnemonic == Mnemonic::Stur && stur.reg_operand(0) == Some(val_reg) {
            if let Some((base, MemOffset::Imm(off), _)) = stur.mem_operand(1) {
                if base == Register::Fp {
                    local_offset = Some(off as i32);
                    next += 1;
                }
            }
        }
    }

    Some((
        FnParamInfo {
            value_reg: Some(val_reg),
            local_offset,
            declared_type: ParamType::Dynamic,
            name: None,
            default_value: None,
        },
        next,
    ))
}

fn not_loaded() -> FnParamInfo {
    FnParamInfo { value_reg: None, local_offset: None, declared_type: ParamType::Dynamic, name: None, default_value: None }
}

/// One recognized immediate default value: `MOV dst,NULL`, `ADD
/// dst,NULL,#±8` (boolean), `MOVZ[+MOVK]` or `MOVN`. Mirrors the shapes
/// `loadvalue::LoadValue` already recognizes for ordinary immediate loads.
fn try_immediate_default(window: &[Instruction], idx: usize) -> Option<(usize, Register, VarValue)> {
    let instr = window.get(idx)?;
    match instr.mnemonic {
        Mnemonic::Mov => {
            let dst = instr.reg_operand(0)?;
            let src = instr.reg_operand(1)?;
            (src == Register::NULL_REG).then_some((1, dst, VarValue::Null))
        }
        Mnemonic::Add => {
            let dst = instr.reg_operand(0)?;
            let base = instr.reg_operand(1)?;
            let imm = instr.imm_operand(2)?;
            if base != Register::NULL_REG {
                return None;
            }
            match imm {
                8 => Some((1, dst, VarValue::Boolean(true))),
                -8 => Some((1, dst, VarValue::Boolean(false))),
                _ => None,
            }
        }
        Mnemonic::MovZ => {
            let dst = instr.reg_operand(0)?;
            let lo = instr.imm_operand(1)?;
            if let Some(movk) = window.get(idx + 1) {
                if movk.mnemonic == Mnemonic::MovK && movk.reg_operand(0) == Some(dst) {
                    if let Some(hi) = movk.imm_operand(1) {
                        return Some((2, dst, VarValue::integer(lo | (hi << 16), IntKind::Native)));
                    }
                }
            }
            Some((1, dst, VarValue::integer(lo, IntKind::Native)))
        }
        Mnemonic::MovN => {
            let dst = instr.reg_operand(0)?;
            let imm = instr.imm_operand(1)?;
            Some((1, dst, VarValue::integer(!imm, IntKind::Native)))
        }
        _ => None,
    }
}

/// Positional-optional case: `SPEC_FULL.md` §4.5 steps 2-4, ported from the
/// original tool's `FunctionAnalyzer::processOptionalParametersInstr`.
fn match_positional_optional(window: &[Instruction], app: &dyn AppModel, param_cnt_reg: Register, params: &mut FnParams) -> usize {
    let mut idx = 2;

    // Smi "decompress": structurally required by the template even though
    // the operand is a tagged count, not a real pointer.
    let Some(decompress) = window.get(idx) else { return idx };
    if decompress.mnemonic != Mnemonic::Add
        || decompress.reg_operand(0) != Some(param_cnt_reg)
        || decompress.reg_operand(1) != Some(param_cnt_reg)
        || decompress.reg_operand(2) != Some(Register::HEAP_BITS)
    {
        return idx;
    }
    idx += 1;

    let mut pos_param_cnt: i64 = 0;
    let mut shift_idx_reg = param_cnt_reg;
    if let Some(sub) = window.get(idx) {
        if sub.mnemonic == Mnemonic::Sub && sub.reg_operand(1) == Some(param_cnt_reg) {
            if let (Some(dst), Some(imm)) = (sub.reg_operand(0), sub.imm_operand(2)) {
                pos_param_cnt = imm >> 1; // Smi-tagged count.
                shift_idx_reg = dst;
                idx += 1;
            }
        }
    }

    if pos_param_cnt > 0 {
        for _ in 0..pos_param_cnt {
            match try_indexed_param_load(window, idx, shift_idx_reg) {
                Some((param, next)) => {
                    params.push(param);
                    idx = next;
                }
                None => break,
            }
        }
        params.num_fixed_param = params.params.len() as u32;
    }

    let mut missing_targets: Vec<i64> = Vec::new();
    let mut i: i64 = 0;
    loop {
        let Some(cmp) = window.get(idx) else { break };
        if cmp.mnemonic != Mnemonic::Cmp || cmp.reg_operand(0) != Some(shift_idx_reg) || cmp.imm_operand(1) != Some((i + 1) << 1) {
            break;
        }
        let branch_idx = idx + 1;
        let Some(branch) = window.get(branch_idx) else { break };
        match branch.mnemonic {
            Mnemonic::Bcond(Cond::Ge) => {
                missing_targets.clear();
                idx = branch_idx + 1;
                break;
            }
            Mnemonic::Bcond(Cond::Lt) => {
                let Some(target) = branch.imm_operand(0) else { break };
                missing_targets.push(target);
                let after_branch = branch_idx + 1;
                match try_indexed_param_load(window, after_branch, shift_idx_reg) {
                    Some((param, next)) => {
                        params.push(param);
                        idx = next;
                    }
                    None => {
                        params.push(not_loaded());
                        idx = after_branch;
                    }
                }
                i += 1;
            }
            _ => break,
        }
    }

    if missing_targets.is_empty() {
        return idx;
    }

    // "All parameters passed": unbox int/double optional params in place.
    loop {
        let Some(instr) = window.get(idx) else { break };
        if instr.mnemonic == Mnemonic::Sbfx {
            if let (Some(dst), Some(src)) = (instr.reg_operand(0), instr.reg_operand(1)) {
                if let Some(param) = params.params.iter_mut().rev().find(|p| p.value_reg == Some(src)) {
                    param.value_reg = Some(dst);
                    param.declared_type = ParamType::Int;
                    idx += 1;
                    continue;
                }
            }
        }
        if instr.mnemonic == Mnemonic::Ldur {
            if let Some((src, MemOffset::Imm(BOXED_VALUE_OFFSET), _)) = instr.mem_operand(1) {
                if let Some(dst) = instr.reg_operand(0) {
                    if dst.is_decimal() {
                        if let Some(param) = params.params.iter_mut().rev().find(|p| p.value_reg == Some(src)) {
                            param.value_reg = Some(dst);
                            param.declared_type = ParamType::Double;
                            idx += 1;
                            continue;
                        }
                    }
                }
            }
        }
        break;
    }

    // Register renames between unboxing and the branch to the storing block.
    while let Some(mv) = window.get(idx) {
        if mv.mnemonic != Mnemonic::Mov {
            break;
        }
        let (Some(dst), Some(src)) = (mv.reg_operand(0), mv.reg_operand(1)) else { break };
        let Some(param) = params.params.iter_mut().find(|p| p.value_reg == Some(src)) else { break };
        param.value_reg = Some(dst);
        idx += 1;
    }

    let Some(branch) = window.get(idx) else { return idx };
    if !matches!(branch.mnemonic, Mnemonic::B | Mnemonic::Bcond(_)) {
        return idx;
    }
    let storing_target = branch.imm_operand(0);
    idx += 1;

    if let Some(first_missing) = missing_targets.first().copied() {
        loop {
            match window.get(idx) {
                Some(w) if w.address as i64 == first_missing => break,
                Some(_) => idx += 1,
                None => return idx,
            }
        }
    }

    // Default-value block: a run of pool/immediate loads and renames, zipped
    // in order into whichever optional params were actually loaded above.
    let mut defaults: Vec<(Register, VarValue)> = Vec::new();
    if let Some(target) = storing_target {
        loop {
            let Some(instr) = window.get(idx) else { break };
            if instr.address as i64 >= target {
                break;
            }
            if let Ok(Some(pool)) = try_match_pool_load(&window[idx..], app) {
                defaults.push((pool.dest, pool.item.value));
                idx += pool.consumed;
                continue;
            }
            if let Some((consumed, dst, value)) = try_immediate_default(window, idx) {
                defaults.push((dst, value));
                idx += consumed;
                continue;
            }
            if instr.mnemonic == Mnemonic::Mov {
                if let (Some(dst), Some(src)) = (instr.reg_operand(0), instr.reg_operand(1)) {
                    if let Some(entry) = defaults.iter_mut().find(|(r, _)| *r == src) {
                        entry.0 = dst;
                        idx += 1;
                        continue;
                    }
                }
            }
            break;
        }
    }

    let start_optional = params.num_fixed_param as usize;
    let mut j = 0;
    for param in params.params.iter_mut().skip(start_optional) {
        if param.value_reg.is_some() {
            if let Some((_, value)) = defaults.get(j) {
                param.default_value = Some(value.clone());
            }
            j += 1;
        }
    }

    // Trailing spills recording each default-bearing parameter's frame slot.
    while let Some(stur) = window.get(idx) {
        if stur.mnemonic != Mnemonic::Stur {
            break;
        }
        let Some(src) = stur.reg_operand(0) else { break };
        let Some((base, MemOffset::Imm(off), _)) = stur.mem_operand(1) else { break };
        if base != Register::Fp {
            break;
        }
        let Some(param) = params.params.iter_mut().find(|p| p.value_reg == Some(src)) else { break };
        param.local_offset = Some(off as i32);
        idx += 1;
    }

    idx
}

/// Named-parameter case: `SPEC_FULL.md` §4.5 step 5. A bounded recognizer,
/// not a line-for-line port of the original tool's equivalent loop — that
/// version tracks several layers of register aliasing across the position
/// advance between names that this walk does not reconstruct. Each
/// iteration instead reads the parameter name straight out of the pool's
/// already-classified `VarValue::String`, recognizes the required/not-
/// required branch and a direct argument-value load when the shape matches,
/// and otherwise stops recognizing further names rather than guessing at
/// the register-renaming chain.
fn match_named_parameters(window: &[Instruction], app: &dyn AppModel, first_param_idx_reg: Register, params: &mut FnParams) -> usize {
    let mut idx = 2;
    let mut param_idx_reg = first_param_idx_reg;

    loop {
        let Some(decompress) = window.get(idx) else { break };
        if decompress.mnemonic != Mnemonic::Add
            || decompress.reg_operand(0) != Some(param_idx_reg)
            || decompress.reg_operand(1) != Some(param_idx_reg)
            || decompress.reg_operand(2) != Some(Register::HEAP_BITS)
        {
            break;
        }
        idx += 1;

        let Ok(Some(name_load)) = try_match_pool_load(&window[idx..], app) else { break };
        let VarValue::String(name) = name_load.item.value.clone() else { break };
        idx += name_load.consumed;

        let Some(cmp) = window.get(idx) else { break };
        if cmp.mnemonic != Mnemonic::Cmp || cmp.reg_operand(0) != Some(param_idx_reg) || cmp.reg_operand(1) != Some(name_load.dest) {
            break;
        }
        idx += 1;

        let Some(branch) = window.get(idx) else { break };
        match branch.mnemonic {
            Mnemonic::Bcond(Cond::Eq) => {
                // The caller didn't pass this name.
                idx += 1;
                params.push(FnParamInfo { value_reg: None, local_offset: None, declared_type: ParamType::Dynamic, name: Some(name), default_value: None });
                break;
            }
            Mnemonic::Bcond(Cond::Ne) => idx += 1,
            _ => break,
        }

        // Direct argument-value load: decompress the argument index, then
        // load off it. Real prologues interleave several renaming steps
        // here; when the next instructions don't match this exact shape the
        // parameter is still recorded, just without a known value register.
        let mut value_reg = None;
        if let Some(decompress2) = window.get(idx) {
            if decompress2.mnemonic == Mnemonic::Add && decompress2.reg_operand(2) == Some(Register::HEAP_BITS) {
                let candidate = decompress2.reg_operand(0);
                if let Some(load) = window.get(idx + 1) {
                    if matches!(load.mnemonic, Mnemonic::Ldr | Mnemonic::Ldur)
                        && matches!(load.mem_operand(1), Some((base, _, _)) if Some(base) == candidate)
                    {
                        value_reg = load.reg_operand(0);
                        idx += 2;
                    }
                }
            }
        }

        params.push(FnParamInfo { value_reg, local_offset: None, declared_type: ParamType::Dynamic, name: Some(name), default_value: None });

        if let Some(spill) = window.get(idx) {
            if spill.mnemonic == Mnemonic::Stur {
                if let (Some(src), Some((base, MemOffset::Imm(off), _))) = (spill.reg_operand(0), spill.mem_operand(1)) {
                    if base == Register::Fp && Some(src) == value_reg {
                        params.params.last_mut().unwrap().local_offset = Some(off as i32);
                        idx += 1;
                    }
                }
            }
        }

        // Advance to the next name's position register; terminate the walk
        // the moment this doesn't look like the start of another iteration.
        match window.get(idx) {
            Some(advance) if advance.mnemonic == Mnemonic::Lsl => {
                if let Some(dst) = advance.reg_operand(0) {
                    param_idx_reg = dst;
                }
            }
            _ => break,
        }
        if window.get(idx + 1).map(|w| w.mnemonic) != Some(Mnemonic::Add) {
            break;
        }
        idx += 2;
    }

    idx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_model::{ClassId, DartClass, DartFunction, DartLibrary, PoolEntry, TypeHandle};
    use crate::config::VersionConfig;
    use crate::disasm::Operand;
    use rustc_hash::FxHashMap;

    struct StubModel {
        config: VersionConfig,
        pool: FxHashMap<u32, PoolEntry>,
    }
    impl AppModel for StubModel {
        fn version_config(&self) -> &VersionConfig {
            &self.config
        }
        fn pool_entry(&self, offset: u32) -> Option<&PoolEntry> {
            self.pool.get(&offset)
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

    fn empty_model() -> StubModel {
        StubModel { config: VersionConfig::default_config(), pool: FxHashMap::default() }
    }

    #[test]
    fn requires_nonzero_stack_size() {
        let handler = OptionalParameters;
        let model = empty_model();
        let mut func = AnalyzedFunction::new();
        let instrs = vec![
            Instruction::literal(0x1000, Mnemonic::Mov, vec![Operand::Reg(Register::X(0)), Operand::Reg(Register::ARGS_DESC)]),
            Instruction::literal(
                0x1004,
                Mnemonic::Ldr,
                vec![Operand::Reg(Register::X(1)), Operand::Mem { base: Register::X(0), offset: MemOffset::Imm(0x7), writeback: false }],
            ),
        ];
        assert!(handler.try_match(&instrs, &model, &mut func).unwrap().is_none());
    }

    #[test]
    fn named_entry_offset_marks_named_params() {
        let handler = OptionalParameters;
        let model = empty_model();
        let mut func = AnalyzedFunction::new();
        func.stack_size = 0x20;
        let instrs = vec![
            Instruction::literal(0x1000, Mnemonic::Mov, vec![Operand::Reg(Register::X(0)), Operand::Reg(Register::ARGS_DESC)]),
            Instruction::literal(
                0x1004,
                Mnemonic::Ldr,
                vec![Operand::Reg(Register::X(1)), Operand::Mem { base: Register::X(0), offset: MemOffset::Imm(FIRST_NAMED_ENTRY_OFFSET), writeback: false }],
            ),
        ];
        let m = handler.try_match(&instrs, &model, &mut func).unwrap().unwrap();
        assert!(matches!(m.node, IlNode::SetupParameters));
        assert!(func.params.is_named_param);
    }

    #[test]
    fn positional_optional_param_gets_default_value() {
        let handler = OptionalParameters;
        let model = empty_model();
        let mut func = AnalyzedFunction::new();
        func.stack_size = 0x20;
        let instrs = vec![
            Instruction::literal(0x1000, Mnemonic::Mov, vec![Operand::Reg(Register::X(0)), Operand::Reg(Register::ARGS_DESC)]),
            Instruction::literal(
                0x1004,
                Mnemonic::Ldr,
                vec![Operand::Reg(Register::X(1)), Operand::Mem { base: Register::X(0), offset: MemOffset::Imm(0x17), writeback: false }],
            ),
            Instruction::literal(0x1008, Mnemonic::Add, vec![Operand::Reg(Register::X(1)), Operand::Reg(Register::X(1)), Operand::Reg(Register::HEAP_BITS)]),
            Instruction::literal(0x100c, Mnemonic::Cmp, vec![Operand::Reg(Register::X(1)), Operand::Imm(2)]),
            Instruction::literal(0x1010, Mnemonic::Bcond(Cond::Lt), vec![Operand::Imm(0x2000)]),
            Instruction::literal(0x1014, Mnemonic::Add, vec![Operand::Reg(Register::X(2)), Operand::Reg(Register::Fp), Operand::Reg(Register::X(1))]),
            Instruction::literal(
                0x1018,
                Mnemonic::Ldr,
                vec![Operand::Reg(Register::X(3)), Operand::Mem { base: Register::X(2), offset: MemOffset::Imm(0), writeback: false }],
            ),
            Instruction::literal(0x101c, Mnemonic::B, vec![Operand::Imm(0x3000)]),
            Instruction::literal(0x2000, Mnemonic::Add, vec![Operand::Reg(Register::X(5)), Operand::Reg(Register::NULL_REG), Operand::Imm(8)]),
        ];
        let m = handler.try_match(&instrs, &model, &mut func).unwrap().unwrap();
        assert!(matches!(m.node, IlNode::SetupParameters));
        assert_eq!(m.consumed, 9);
        assert_eq!(func.params.params.len(), 1);
        let param = &func.params.params[0];
        assert_eq!(param.value_reg, Some(Register::X(3)));
        assert_eq!(param.default_value, Some(VarValue::Boolean(true)));
    }

    #[test]
    fn named_param_records_name_and_value_register() {
        let handler = OptionalParameters;
        let mut pool = FxHashMap::default();
        pool.insert(0x20, PoolEntry::TaggedObject { value: VarValue::String("count".into()) });
        let model = StubModel { config: VersionConfig::default_config(), pool };
        let mut func = AnalyzedFunction::new();
        func.stack_size = 0x20;
        let instrs = vec![
            Instruction::literal(0x1000, Mnemonic::Mov, vec![Operand::Reg(Register::X(0)), Operand::Reg(Register::ARGS_DESC)]),
            Instruction::literal(
                0x1004,
                Mnemonic::Ldur,
                vec![Operand::Reg(Register::X(1)), Operand::Mem { base: Register::X(0), offset: MemOffset::Imm(FIRST_NAMED_ENTRY_OFFSET), writeback: false }],
            ),
            Instruction::literal(0x1008, Mnemonic::Add, vec![Operand::Reg(Register::X(1)), Operand::Reg(Register::X(1)), Operand::Reg(Register::HEAP_BITS)]),
            Instruction::literal(
                0x100c,
                Mnemonic::Ldr,
                vec![Operand::Reg(Register::X(2)), Operand::Mem { base: Register::PP, offset: MemOffset::Imm(0x20), writeback: false }],
            ),
            Instruction::literal(0x1010, Mnemonic::Cmp, vec![Operand::Reg(Register::X(1)), Operand::Reg(Register::X(2))]),
            Instruction::literal(0x1014, Mnemonic::Bcond(Cond::Ne), vec![Operand::Imm(0x9999)]),
            Instruction::literal(0x1018, Mnemonic::Add, vec![Operand::Reg(Register::X(5)), Operand::Reg(Register::X(5)), Operand::Reg(Register::HEAP_BITS)]),
            Instruction::literal(
                0x101c,
                Mnemonic::Ldr,
                vec![Operand::Reg(Register::X(6)), Operand::Mem { base: Register::X(5), offset: MemOffset::Imm(0), writeback: false }],
            ),
        ];
        let m = handler.try_match(&instrs, &model, &mut func).unwrap().unwrap();
        assert!(matches!(m.node, IlNode::SetupParameters));
        assert_eq!(m.consumed, 8);
        assert!(func.params.is_named_param);
        assert_eq!(func.params.params.len(), 1);
        let param = &func.params.params[0];
        assert_eq!(param.name.as_deref(), Some("count"));
        assert_eq!(param.value_reg, Some(Register::X(6)));
    }
}
