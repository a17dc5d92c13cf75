//! End-to-end lifting scenarios. Each builds a short, realistic instruction
//! sequence and asserts the IL list the matcher chain produces from it,
//! mirroring the byte-level scenarios recorded for the templates they
//! exercise.

use dart_lifter::analyzed_function::AnalyzedFunction;
use dart_lifter::app_model::{AppModel, ClassId, DartClass, DartFunction, DartLibrary, FunctionKind, PoolEntry, TypeHandle};
use dart_lifter::config::VersionConfig;
use dart_lifter::disasm::{Cond, Instruction, MemOffset, Mnemonic, Operand};
use dart_lifter::il::IlNode;
use dart_lifter::matcher::{default_chain, run_chain};
use dart_lifter::register::Register;
use dart_lifter::var::VarValue;
use rustc_hash::FxHashMap;

struct TestModel {
    config: VersionConfig,
    pool: FxHashMap<u32, PoolEntry>,
    funcs: FxHashMap<u64, DartFunction>,
}

impl TestModel {
    fn new() -> Self {
        TestModel { config: VersionConfig::default_config(), pool: FxHashMap::default(), funcs: FxHashMap::default() }
    }
}

impl AppModel for TestModel {
    fn version_config(&self) -> &VersionConfig {
        &self.config
    }
    fn pool_entry(&self, offset: u32) -> Option<&PoolEntry> {
        self.pool.get(&offset)
    }
    fn class(&self, _id: ClassId) -> Option<&DartClass> {
        None
    }
    fn function_at(&self, addr: u64) -> Option<&DartFunction> {
        self.funcs.get(&addr)
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

fn lift(instrs: Vec<Instruction>, model: &dyn AppModel) -> AnalyzedFunction {
    let chain = default_chain();
    let mut func = AnalyzedFunction::new();
    func.asm_texts = instrs
        .iter()
        .map(|i| dart_lifter::asm_text::annotate(i, "", "", model.version_config()))
        .collect();
    run_chain(&chain, &instrs, model, &mut func).unwrap();
    func
}

#[test]
fn enter_allocate_return() {
    let model = TestModel::new();
    let instrs = vec![
        Instruction::literal(
            0x1000,
            Mnemonic::Stp,
            vec![
                Operand::Reg(Register::Fp),
                Operand::Reg(Register::Lr),
                Operand::Mem { base: Register::Sp, offset: MemOffset::Imm(-0x10), writeback: true },
            ],
        ),
        Instruction::literal(0x1004, Mnemonic::Mov, vec![Operand::Reg(Register::Fp), Operand::Reg(Register::Sp)]),
        Instruction::literal(
            0x1008,
            Mnemonic::Sub,
            vec![Operand::Reg(Register::Sp), Operand::Reg(Register::Sp), Operand::Imm(0x10)],
        ),
        Instruction::literal(0x100c, Mnemonic::Ret, vec![]),
    ];
    let func = lift(instrs, &model);
    assert_eq!(func.il.len(), 3);
    assert!(matches!(func.il[0].node, IlNode::EnterFrame));
    assert_eq!(func.il[0].range.start, 0x1000);
    assert_eq!(func.il[0].range.end, 0x1008);
    assert!(matches!(func.il[1].node, IlNode::AllocateStack { size: 0x10 }));
    assert!(matches!(func.il[2].node, IlNode::Return));
    assert_eq!(func.stack_size, 0x10);
    assert!(func.use_frame_pointer);
}

#[test]
fn pool_load_short() {
    let mut model = TestModel::new();
    model.pool.insert(0x20, PoolEntry::TaggedObject { value: VarValue::String("hi".into()) });
    let instrs = vec![Instruction::literal(
        0x1000,
        Mnemonic::Ldr,
        vec![Operand::Reg(Register::X(0)), Operand::Mem { base: Register::PP, offset: MemOffset::Imm(0x20), writeback: false }],
    )];
    let func = lift(instrs, &model);
    assert_eq!(func.il.len(), 1);
    match &func.il[0].node {
        IlNode::LoadValue { dst, item } => {
            assert_eq!(*dst, Register::X(0));
            assert_eq!(item.value, VarValue::String("hi".into()));
        }
        other => panic!("unexpected node: {other:?}"),
    }
    assert_eq!(func.asm_texts[0].tag, dart_lifter::asm_text::AsmTag::PoolOffset(0x20));
}

#[test]
fn boolean_from_null() {
    let model = TestModel::new();
    let instrs = vec![Instruction::literal(
        0x1000,
        Mnemonic::Add,
        vec![Operand::Reg(Register::X(0)), Operand::Reg(Register::NULL_REG), Operand::Imm(0x8)],
    )];
    let func = lift(instrs, &model);
    assert_eq!(func.il.len(), 1);
    match &func.il[0].node {
        IlNode::LoadValue { item, .. } => assert_eq!(item.value, VarValue::Boolean(true)),
        other => panic!("unexpected node: {other:?}"),
    }
    assert_eq!(func.asm_texts[0].tag, dart_lifter::asm_text::AsmTag::Boolean(true));
}

#[test]
fn decompress_pointer() {
    let model = TestModel::new();
    let instrs = vec![Instruction::literal(
        0x1000,
        Mnemonic::Add,
        vec![Operand::Reg(Register::X(0)), Operand::Reg(Register::X(0)), Operand::Reg(Register::HEAP_BITS)],
    )];
    let func = lift(instrs, &model);
    assert_eq!(func.il.len(), 1);
    assert!(matches!(func.il[0].node, IlNode::DecompressPointer { reg: Register::X(0) }));
}

#[test]
fn gdt_call_with_extra_movz() {
    let model = TestModel::new();
    let instrs = vec![
        Instruction::literal(0x1000, Mnemonic::MovZ, vec![Operand::Reg(Register::TMP2), Operand::Imm(0x1545)]),
        Instruction::literal(0x1004, Mnemonic::MovK, vec![Operand::Reg(Register::TMP2), Operand::Imm(0)]),
        Instruction::literal(0x1008, Mnemonic::Add, vec![Operand::Reg(Register::Lr), Operand::Reg(Register::X(0)), Operand::Reg(Register::TMP2)]),
        Instruction::literal(
            0x100c,
            Mnemonic::Ldr,
            vec![
                Operand::Reg(Register::Lr),
                Operand::Mem { base: Register::DISPATCH_TABLE, offset: MemOffset::Reg { reg: Register::Lr, shift: 3, extend: false }, writeback: false },
            ],
        ),
        Instruction::literal(0x1010, Mnemonic::Blr, vec![Operand::Reg(Register::Lr)]),
    ];
    let func = lift(instrs, &model);
    // The MOVZ/MOVK pair materializes the selector offset into TMP2 (caught
    // by `LoadValue` as an ordinary `LoadValue` node) before the ADD folds it
    // into `lr`; `GdtCall` fuses that preceding node back in instead of
    // requiring the offset to appear as an immediate on the ADD itself.
    assert_eq!(func.il.len(), 1);
    match &func.il[0].node {
        IlNode::GdtCall { selector_offset } => assert_eq!(*selector_offset, 0x1545),
        other => panic!("unexpected node: {other:?}"),
    }
    assert_eq!(func.il[0].range.start, 0x1000);
    assert_eq!(func.il[0].range.end, 0x1014);
}

#[test]
fn array_store_with_write_barrier() {
    let mut model = TestModel::new();
    model.funcs.insert(0x9000, DartFunction { name: "ArrayWriteBarrierStub".into(), entry: 0x9000, size: 0x40, kind: FunctionKind::Stub });
    let instrs = vec![
        Instruction::literal(
            0x1000,
            Mnemonic::Str,
            vec![
                Operand::Reg(Register::WB_VALUE),
                Operand::Mem { base: Register::WB_OBJECT, offset: MemOffset::Imm(0xf), writeback: false },
            ],
        ),
        Instruction::literal(0x1004, Mnemonic::Bl, vec![Operand::Imm(0x9000)]),
    ];
    let func = lift(instrs, &model);
    assert_eq!(func.il.len(), 1);
    assert!(matches!(
        func.il[0].node,
        IlNode::WriteBarrier { object: Register::WB_OBJECT, value: Register::WB_VALUE, is_array: true }
    ));
}

#[test]
fn instanceof_no_type_argument() {
    let mut model = TestModel::new();
    model.pool.insert(0x10, PoolEntry::TaggedObject { value: VarValue::Type { name: "String".into() } });
    model.pool.insert(0x18, PoolEntry::TaggedObject { value: VarValue::SubtypeTestCache });
    let instrs = vec![
        Instruction::literal(0x1000, Mnemonic::Mov, vec![Operand::Reg(Register::X(0)), Operand::Reg(Register::X(1))]),
        Instruction::literal(0x1004, Mnemonic::Mov, vec![Operand::Reg(Register::X(2)), Operand::Reg(Register::NULL_REG)]),
        Instruction::literal(0x1008, Mnemonic::Mov, vec![Operand::Reg(Register::X(3)), Operand::Reg(Register::NULL_REG)]),
        Instruction::literal(0x100c, Mnemonic::Tbz, vec![Operand::Reg(Register::X(1)), Operand::Imm(0), Operand::Imm(0x2000)]),
        Instruction::literal(
            0x1010,
            Mnemonic::Ldr,
            vec![Operand::Reg(Register::X(4)), Operand::Mem { base: Register::PP, offset: MemOffset::Imm(0x10), writeback: false }],
        ),
        Instruction::literal(
            0x1014,
            Mnemonic::Ldr,
            vec![Operand::Reg(Register::X(5)), Operand::Mem { base: Register::PP, offset: MemOffset::Imm(0x18), writeback: false }],
        ),
        Instruction::literal(0x1018, Mnemonic::Bl, vec![Operand::Imm(0x9500)]),
    ];
    let func = lift(instrs, &model);
    assert_eq!(func.il.len(), 1);
    match &func.il[0].node {
        IlNode::TestType { src, type_name } => {
            assert_eq!(*src, Register::X(1));
            assert_eq!(type_name, "String");
        }
        other => panic!("unexpected node: {other:?}"),
    }
}

#[test]
fn check_stack_overflow_is_recognized() {
    let model = TestModel::new();
    let instrs = vec![
        Instruction::literal(
            0x1000,
            Mnemonic::Ldr,
            vec![Operand::Reg(Register::TMP), Operand::Mem { base: Register::THR, offset: MemOffset::Imm(0x38), writeback: false }],
        ),
        Instruction::literal(0x1004, Mnemonic::Cmp, vec![Operand::Reg(Register::Sp), Operand::Reg(Register::TMP)]),
        Instruction::literal(0x1008, Mnemonic::Bcond(Cond::Ls), vec![Operand::Imm(0x4000)]),
    ];
    let func = lift(instrs, &model);
    assert_eq!(func.il.len(), 1);
    assert!(matches!(func.il[0].node, IlNode::CheckStackOverflow { slow_target: 0x4000 }));
    assert_eq!(func.first_check_stack_overflow, Some(0x1000));
}
