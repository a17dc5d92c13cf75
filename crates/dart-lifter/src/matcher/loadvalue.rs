//! Value-materialization templates: pool loads, boolean/null/immediate
//! construction, and pointer decompression.

use crate::analyzed_function::AnalyzedFunction;
use crate::app_model::AppModel;
use crate::asm_text::AsmTag;
use crate::disasm::{Instruction, Mnemonic};
use crate::error::AnalysisError;
use crate::il::IlNode;
use crate::pool::try_match_pool_load;
use crate::register::Register;
use crate::var::{IntKind, VarItem, VarStorage, VarValue};

use super::{Handler, Matched};

const TRUE_OFFSET_FROM_NULL: i64 = 0x8;
const FALSE_OFFSET_FROM_NULL: i64 = -0x8;

pub struct LoadValue;

impl Handler for LoadValue {
    fn name(&self) -> &'static str {
        "LoadValue"
    }

    fn try_match(
        &self,
        window: &[Instruction],
        app: &dyn AppModel,
        func: &mut AnalyzedFunction,
    ) -> Result<Option<Matched>, AnalysisError> {
        if let Some(pool) = try_match_pool_load(window, app)? {
            tag_pool_offset(func, window[0].address, &pool.item.storage);
            return Ok(Some(Matched::new(pool.consumed, IlNode::LoadValue { dst: pool.dest, item: pool.item })));
        }

        let Some(first) = window.first() else { return Ok(None) };

        if first.mnemonic == Mnemonic::Add {
            if let (Some(dst), Some(base), Some(imm)) = (first.reg_operand(0), first.reg_operand(1), first.imm_operand(2)) {
                if base == Register::NULL_REG && (imm == TRUE_OFFSET_FROM_NULL || imm == FALSE_OFFSET_FROM_NULL) {
                    let value = imm == TRUE_OFFSET_FROM_NULL;
                    tag_boolean(func, first.address, value);
                    let item = VarItem::new(VarStorage::Immediate, VarValue::Boolean(value));
                    return Ok(Some(Matched::new(1, IlNode::LoadValue { dst, item })));
                }
            }
        }

        if first.mnemonic == Mnemonic::Mov {
            if let (Some(dst), Some(src)) = (first.reg_operand(0), first.reg_operand(1)) {
                if src == Register::NULL_REG {
                    let item = VarItem::new(VarStorage::Immediate, VarValue::Null);
                    return Ok(Some(Matched::new(1, IlNode::LoadValue { dst, item })));
                }
            }
        }

        if window.len() >= 2 && first.mnemonic == Mnemonic::MovZ {
            let movk = &window[1];
            if movk.mnemonic == Mnemonic::MovK {
                if let (Some(dst), Some(lo), Some(hi)) = (first.reg_operand(0), first.imm_operand(1), movk.imm_operand(1)) {
                    if movk.reg_operand(0) == Some(dst) {
                        let value = lo | (hi << 16);
                        let item = VarItem::new(VarStorage::Immediate, VarValue::integer(value, IntKind::Native));
                        return Ok(Some(Matched::new(2, IlNode::LoadValue { dst, item })));
                    }
                }
            }
        }

        if first.mnemonic == Mnemonic::Orr {
            if let (Some(dst), Some(base), Some(imm)) = (first.reg_operand(0), first.reg_operand(1), first.imm_operand(2)) {
                if base == Register::Zr {
                    let item = VarItem::new(VarStorage::Immediate, VarValue::integer(imm, IntKind::Native));
                    return Ok(Some(Matched::new(1, IlNode::LoadValue { dst, item })));
                }
            }
        }

        if first.mnemonic == Mnemonic::MovN {
            if let (Some(dst), Some(imm)) = (first.reg_operand(0), first.imm_operand(1)) {
                let item = VarItem::new(VarStorage::Immediate, VarValue::integer(!imm, IntKind::Native));
                return Ok(Some(Matched::new(1, IlNode::LoadValue { dst, item })));
            }
        }

        if first.mnemonic == Mnemonic::Eor {
            if let (Some(dst), Some(a), Some(b)) = (first.reg_operand(0), first.reg_operand(1), first.reg_operand(2)) {
                if dst.is_decimal() && a == dst && b == dst {
                    let item = VarItem::new(VarStorage::Immediate, VarValue::Double(0.0));
                    return Ok(Some(Matched::new(1, IlNode::LoadValue { dst, item })));
                }
            }
        }

        if first.mnemonic == Mnemonic::Fmov {
            if let Some(dst) = first.reg_operand(0) {
                if let Some(crate::disasm::Operand::FImm(v)) = first.operands.get(1) {
                    let item = VarItem::new(VarStorage::Immediate, VarValue::Double(*v));
                    return Ok(Some(Matched::new(1, IlNode::LoadValue { dst, item })));
                }
            }
        }

        Ok(None)
    }
}

fn tag_pool_offset(func: &mut AnalyzedFunction, addr: u64, storage: &VarStorage) {
    if let VarStorage::Pool(offset) = storage {
        if let Some(line) = func.asm_texts.iter_mut().find(|t| t.address == addr) {
            line.set_tag_once(AsmTag::PoolOffset(*offset));
        }
    }
}

fn tag_boolean(func: &mut AnalyzedFunction, addr: u64, value: bool) {
    if let Some(line) = func.asm_texts.iter_mut().find(|t| t.address == addr) {
        line.set_tag_once(AsmTag::Boolean(value));
    }
}

pub struct DecompressPointer;

impl Handler for DecompressPointer {
    fn name(&self) -> &'static str {
        "DecompressPointer"
    }

    fn try_match(
        &self,
        window: &[Instruction],
        _app: &dyn AppModel,
        _func: &mut AnalyzedFunction,
    ) -> Result<Option<Matched>, AnalysisError> {
        let Some(first) = window.first() else { return Ok(None) };
        if first.mnemonic != Mnemonic::Add {
            return Ok(None);
        }
        let (Some(dst), Some(src), Some(heap)) = (first.reg_operand(0), first.reg_operand(1), first.reg_operand(2)) else {
            return Ok(None);
        };
        if dst != src || heap != Register::HEAP_BITS {
            return Ok(None);
        }
        Ok(Some(Matched::new(1, IlNode::DecompressPointer { reg: dst })))
    }
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

    #[test]
    fn true_from_null_materializes_boolean() {
        let handler = LoadValue;
        let model = StubModel { config: VersionConfig::default_config(), pool: FxHashMap::default() };
        let mut func = AnalyzedFunction::new();
        let instrs = vec![Instruction::literal(
            0x1000,
            Mnemonic::Add,
            vec![Operand::Reg(Register::X(0)), Operand::Reg(Register::NULL_REG), Operand::Imm(TRUE_OFFSET_FROM_NULL)],
        )];
        let m = handler.try_match(&instrs, &model, &mut func).unwrap().unwrap();
        match m.node {
            IlNode::LoadValue { item, .. } => assert_eq!(item.value, VarValue::Boolean(true)),
            _ => panic!("wrong node"),
        }
    }

    #[test]
    fn orr_from_zero_register_materializes_immediate() {
        let handler = LoadValue;
        let model = StubModel { config: VersionConfig::default_config(), pool: FxHashMap::default() };
        let mut func = AnalyzedFunction::new();
        let instrs = vec![Instruction::literal(
            0x1000,
            Mnemonic::Orr,
            vec![Operand::Reg(Register::X(0)), Operand::Reg(Register::Zr), Operand::Imm(42)],
        )];
        let m = handler.try_match(&instrs, &model, &mut func).unwrap().unwrap();
        match m.node {
            IlNode::LoadValue { item, .. } => assert_eq!(item.value, VarValue::integer(42, IntKind::Native)),
            _ => panic!("wrong node"),
        }
    }

    #[test]
    fn decompress_pointer_requires_same_dst_src() {
        let handler = DecompressPointer;
        let model = StubModel { config: VersionConfig::default_config(), pool: FxHashMap::default() };
        let mut func = AnalyzedFunction::new();
        let instrs = vec![Instruction::literal(
            0x1000,
            Mnemonic::Add,
            vec![Operand::Reg(Register::X(0)), Operand::Reg(Register::X(0)), Operand::Reg(Register::HEAP_BITS)],
        )];
        assert!(handler.try_match(&instrs, &model, &mut func).unwrap().is_some());
    }
}
