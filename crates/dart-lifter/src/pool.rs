//! Object-pool load resolution (`SPEC_FULL.md` §4.4): recognizes the 1-3
//! instruction sequences the AOT compiler uses to load a pool entry into a
//! register, and classifies the resulting value via the app model.
//!
//! Per-entry classification (deciding Smi vs. Mint vs. Double vs. String vs.
//! Field vs. ... from a tagged object's class id) is the `AppModel`
//! implementation's job, not this module's: `PoolEntry::TaggedObject`
//! already carries the classified `VarValue`, because building that
//! classification requires walking the snapshot's class table, which only
//! the model has loaded. What *is* implemented here, because it spans two
//! pool slots and no single-entry trait method can express it, is the
//! unlinked-call convention: an entry classified as `VarValue::UnlinkedCall`
//! is a placeholder, and [`resolve`] reads the immediate word one slot later
//! for the real call-target address.

use crate::app_model::{AppModel, PoolEntry};
use crate::disasm::{Instruction, MemOffset, Mnemonic, Operand};
use crate::error::FatalAnalysis;
use crate::register::Register;
use crate::var::{IntKind, VarItem, VarStorage, VarValue};

/// A resolved pool load: how many instructions it consumed, the
/// destination register, and the classified value.
pub struct PoolLoad {
    pub consumed: usize,
    pub dest: Register,
    pub item: VarItem,
}

/// Try each recognized pool-load encoding against the instructions starting
/// at `instrs[0]`. Returns `None` if none apply (not a rejection — just
/// "this isn't a pool load").
pub fn try_match_pool_load(
    instrs: &[Instruction],
    app: &dyn AppModel,
) -> Result<Option<PoolLoad>, FatalAnalysis> {
    if let Some(m) = match_direct(instrs, app)? {
        return Ok(Some(m));
    }
    if let Some(m) = match_add_then_access(instrs, app)? {
        return Ok(Some(m));
    }
    if let Some(m) = match_movz_movk_then_load(instrs, app)? {
        return Ok(Some(m));
    }
    Ok(None)
}

fn match_direct(instrs: &[Instruction], app: &dyn AppModel) -> Result<Option<PoolLoad>, FatalAnalysis> {
    let Some(first) = instrs.first() else { return Ok(None) };
    if first.mnemonic != Mnemonic::Ldr {
        return Ok(None);
    }
    let Some(dest) = first.reg_operand(0) else { return Ok(None) };
    let Some((base, MemOffset::Imm(disp), _)) = first.mem_operand(1) else { return Ok(None) };
    if base != Register::PP {
        return Ok(None);
    }
    resolve(app, dest, disp as u32, 1)
}

fn match_add_then_access(instrs: &[Instruction], app: &dyn AppModel) -> Result<Option<PoolLoad>, FatalAnalysis> {
    if instrs.len() < 2 {
        return Ok(None);
    }
    let add = &instrs[0];
    if add.mnemonic != Mnemonic::Add {
        return Ok(None);
    }
    let Some(tmp) = add.reg_operand(0) else { return Ok(None) };
    let Some(base) = add.reg_operand(1) else { return Ok(None) };
    if base != Register::PP {
        return Ok(None);
    }
    let Some(hi) = add.imm_operand(2) else { return Ok(None) };

    let next = &instrs[1];
    let (dest, lo, mnemonic_ok) = match next.mnemonic {
        Mnemonic::Ldr => {
            let Some(d) = next.reg_operand(0) else { return Ok(None) };
            let Some((base2, MemOffset::Imm(lo), _)) = next.mem_operand(1) else { return Ok(None) };
            if base2 != tmp {
                return Ok(None);
            }
            (d, lo, true)
        }
        Mnemonic::Add => {
            let Some(d) = next.reg_operand(0) else { return Ok(None) };
            let Some(base2) = next.reg_operand(1) else { return Ok(None) };
            if base2 != tmp {
                return Ok(None);
            }
            let Some(lo) = next.imm_operand(2) else { return Ok(None) };
            (d, lo, true)
        }
        _ => (tmp, 0, false),
    };
    if !mnemonic_ok {
        return Ok(None);
    }
    resolve(app, dest, (hi + lo) as u32, 2)
}

fn match_movz_movk_then_load(instrs: &[Instruction], app: &dyn AppModel) -> Result<Option<PoolLoad>, FatalAnalysis> {
    if instrs.len() < 3 {
        return Ok(None);
    }
    let movz = &instrs[0];
    let movk = &instrs[1];
    let ldr = &instrs[2];
    if movz.mnemonic != Mnemonic::MovZ || movk.mnemonic != Mnemonic::MovK || ldr.mnemonic != Mnemonic::Ldr {
        return Ok(None);
    }
    let Some(off_reg) = movz.reg_operand(0) else { return Ok(None) };
    let Some(lo) = movz.imm_operand(1) else { return Ok(None) };
    let Some(hi) = movk.imm_operand(1) else { return Ok(None) };
    let Some(dest) = ldr.reg_operand(0) else { return Ok(None) };
    let Some((base, MemOffset::Reg { reg, .. }, _)) = ldr.mem_operand(1) else { return Ok(None) };
    if base != Register::PP || reg != off_reg {
        return Ok(None);
    }
    let offset = (lo | (hi << 16)) as u32;
    resolve(app, dest, offset, 3)
}

fn resolve(
    app: &dyn AppModel,
    dest: Register,
    offset: u32,
    consumed: usize,
) -> Result<Option<PoolLoad>, FatalAnalysis> {
    let Some(entry) = app.pool_entry(offset) else {
        return Ok(None);
    };
    let value = match entry {
        PoolEntry::TaggedObject { value: VarValue::UnlinkedCall { selector, .. } } => {
            let target_addr = match app.pool_entry(offset + 1) {
                Some(PoolEntry::Immediate(raw)) => *raw as u64,
                _ => {
                    return Err(FatalAnalysis::new(format!(
                        "unlinked-call entry at pool offset {offset} has no paired call-target slot"
                    )));
                }
            };
            VarValue::UnlinkedCall { selector: selector.clone(), target_addr }
        }
        PoolEntry::TaggedObject { value } => value.clone(),
        PoolEntry::Immediate(raw) => {
            if dest.is_decimal() {
                VarValue::Double(f64::from_bits(*raw as u64))
            } else {
                VarValue::integer(*raw, IntKind::Native)
            }
        }
        PoolEntry::NativeFunction { .. } => {
            return Err(FatalAnalysis::new(format!(
                "pool offset {offset} refers to a native function; Dart user code should not reference it"
            )));
        }
    };
    Ok(Some(PoolLoad {
        consumed,
        dest,
        item: VarItem::new(VarStorage::Pool(offset), value),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_model::{ClassId, DartClass, DartFunction, DartLibrary, FunctionKind, TypeHandle};
    use crate::config::VersionConfig;
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
    fn direct_load_resolves_string() {
        let mut pool = FxHashMap::default();
        pool.insert(0x20, PoolEntry::TaggedObject { value: VarValue::String("hi".into()) });
        let model = StubModel { config: VersionConfig::default_config(), pool };
        let instrs = vec![Instruction::literal(
            0x1000,
            Mnemonic::Ldr,
            vec![
                Operand::Reg(Register::X(0)),
                Operand::Mem { base: Register::PP, offset: MemOffset::Imm(0x20), writeback: false },
            ],
        )];
        let result = try_match_pool_load(&instrs, &model).unwrap().unwrap();
        assert_eq!(result.consumed, 1);
        assert_eq!(result.dest, Register::X(0));
        assert_eq!(result.item.value, VarValue::String("hi".into()));
    }

    #[test]
    fn native_function_entry_is_fatal() {
        let mut pool = FxHashMap::default();
        pool.insert(0x8, PoolEntry::NativeFunction { addr: 0x4000 });
        let model = StubModel { config: VersionConfig::default_config(), pool };
        let instrs = vec![Instruction::literal(
            0x1000,
            Mnemonic::Ldr,
            vec![
                Operand::Reg(Register::X(3)),
                Operand::Mem { base: Register::PP, offset: MemOffset::Imm(0x8), writeback: false },
            ],
        )];
        assert!(try_match_pool_load(&instrs, &model).is_err());
    }

    #[test]
    fn unlinked_call_reads_paired_target_slot() {
        let mut pool = FxHashMap::default();
        pool.insert(
            0x30,
            PoolEntry::TaggedObject { value: VarValue::UnlinkedCall { selector: "foo".into(), target_addr: 0 } },
        );
        pool.insert(0x31, PoolEntry::Immediate(0x4000));
        let model = StubModel { config: VersionConfig::default_config(), pool };
        let instrs = vec![Instruction::literal(
            0x1000,
            Mnemonic::Ldr,
            vec![
                Operand::Reg(Register::X(0)),
                Operand::Mem { base: Register::PP, offset: MemOffset::Imm(0x30), writeback: false },
            ],
        )];
        let result = try_match_pool_load(&instrs, &model).unwrap().unwrap();
        assert_eq!(result.item.value, VarValue::UnlinkedCall { selector: "foo".into(), target_addr: 0x4000 });
    }

    #[test]
    fn non_pool_load_is_not_matched() {
        let model = StubModel { config: VersionConfig::default_config(), pool: FxHashMap::default() };
        let instrs = vec![Instruction::literal(0x1000, Mnemonic::Ret, vec![])];
        assert!(try_match_pool_load(&instrs, &model).unwrap().is_none());
    }
}
