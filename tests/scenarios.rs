//! End-to-end scenarios driving [`regxlate::OpcodeVisitor`] directly with
//! hand-written opcode call sequences, as a real embedder (wired to a
//! `wasmparser` operator loop) would. There is no `.wat` parser in this
//! crate, so these tests play the role the corpus would normally give to
//! round-trip-through-a-text-format tests.

use regxlate::{
    BinaryOp, ConstValue, DedupFuncTypeInterner, EngineConfig, FuncIdx, FuncType, FuncTranslator, Instruction,
    OpcodeVisitor, SimpleModule, StackLayout, ThreadingModel, ValueType,
};

fn new_translator<'m>(
    module: &'m SimpleModule,
    interner: &'m mut DedupFuncTypeInterner,
    func_type: FuncType,
    locals: &[ValueType],
    code_size: u32,
) -> FuncTranslator<'m> {
    FuncTranslator::new(module, interner, EngineConfig::default(), FuncIdx::from_u32(0), func_type, locals, code_size)
        .unwrap()
}

/// S1: `local.get 0; local.get 0; i32.add` in a function `(i32) -> i32`.
/// The sum is computed directly into a fresh stack register and then
/// copied into the return slot — the return path never invokes the
/// result-relink peephole, so the `Binary` and the `Copy` both survive.
#[test]
fn s1_add_two_copies_of_a_param_then_returns() {
    let func_type = FuncType::new([ValueType::I32], [ValueType::I32]);
    let locals = [ValueType::I32];
    let layout = StackLayout::new(&func_type, locals.len() as u32, 0).unwrap();

    let module = SimpleModule::new();
    let mut interner = DedupFuncTypeInterner::default();
    let mut t = new_translator(&module, &mut interner, func_type, &locals, 0);

    t.visit_local_get(0).unwrap();
    t.visit_local_get(0).unwrap();
    t.visit_binary(ValueType::I32, BinaryOp::I32Add).unwrap();
    let seq = t.finish().unwrap();

    assert!(seq.constants.is_empty());
    let decoded: Vec<Instruction> = seq.decode_all(ThreadingModel::Direct).into_iter().map(|(_, i)| i).collect();

    let local0 = layout.local_reg(0);
    let sum_reg = layout.stack_reg(0);
    let return0 = layout.header().return_reg(0);

    assert_eq!(
        decoded,
        vec![
            Instruction::Binary { op: BinaryOp::I32Add, result: sum_reg, lhs: local0, rhs: local0 },
            Instruction::Copy { dst: return0, src: sum_reg },
            Instruction::Return,
        ]
    );
}

/// S2: `i32.const 1; local.set 0; i32.const 1; local.set 1` in a function
/// `() -> ()` with two `i32` locals. The two identical constants share one
/// constant-pool slot, so both `local.set`s copy from the same register.
#[test]
fn s2_identical_constants_share_one_pool_slot() {
    let func_type = FuncType::new([], []);
    let locals = [ValueType::I32, ValueType::I32];
    let layout = StackLayout::new(&func_type, locals.len() as u32, 0).unwrap();

    let module = SimpleModule::new();
    let mut interner = DedupFuncTypeInterner::default();
    let mut t = new_translator(&module, &mut interner, func_type, &locals, 0);

    t.visit_const(ConstValue::I32(1)).unwrap();
    t.visit_local_set(0).unwrap();
    t.visit_const(ConstValue::I32(1)).unwrap();
    t.visit_local_set(1).unwrap();
    let seq = t.finish().unwrap();

    assert_eq!(seq.constants, vec![1u64]);
    let decoded: Vec<Instruction> = seq.decode_all(ThreadingModel::Direct).into_iter().map(|(_, i)| i).collect();

    let const0 = layout.const_reg(0);
    let local0 = layout.local_reg(0);
    let local1 = layout.local_reg(1);

    assert_eq!(
        decoded,
        vec![
            Instruction::Copy { dst: local0, src: const0 },
            Instruction::Copy { dst: local1, src: const0 },
            Instruction::Return,
        ]
    );
}

/// S3: `block (result i32) i32.const 7; br 0; i32.const 8 end` in a
/// function `() -> i32`. The `br` delivers 7 to the block's landing
/// register; the dead `i32.const 8` after it is absorbed without ever
/// being emitted.
#[test]
fn s3_br_out_of_a_block_delivers_its_value_dead_code_is_dropped() {
    let func_type = FuncType::new([], [ValueType::I32]);
    let locals: [ValueType; 0] = [];
    let layout = StackLayout::new(&func_type, locals.len() as u32, 0).unwrap();

    let module = SimpleModule::new();
    let mut interner = DedupFuncTypeInterner::default();
    let mut t = new_translator(&module, &mut interner, func_type, &locals, 0);

    t.visit_block(regxlate::BlockType::Result(ValueType::I32)).unwrap();
    t.visit_const(ConstValue::I32(7)).unwrap();
    t.visit_br(0).unwrap();
    t.visit_const(ConstValue::I32(8)).unwrap();
    t.visit_end().unwrap();
    let seq = t.finish().unwrap();

    assert_eq!(seq.constants, vec![7u64]);
    let decoded: Vec<Instruction> = seq.decode_all(ThreadingModel::Direct).into_iter().map(|(_, i)| i).collect();

    let const7 = layout.const_reg(0);
    let landing = layout.stack_reg(0);
    let return0 = layout.header().return_reg(0);

    assert_eq!(decoded.len(), 4, "{decoded:?}");
    assert_eq!(decoded[0], Instruction::Copy { dst: landing, src: const7 });
    assert!(matches!(decoded[1], Instruction::Branch(_)));
    assert_eq!(decoded[2], Instruction::Copy { dst: return0, src: landing });
    assert_eq!(decoded[3], Instruction::Return);
}

/// S4: `i32.const 0; if (result i32) i32.const 2 else i32.const 3 end` in
/// a function `() -> i32`. Both arms must land their result in the same
/// register before falling through to `end` — the `else` arm needs the
/// same copy-on-fallthrough as the `then` arm's explicit branch to
/// `end`, otherwise the returned value for a false condition would be
/// whatever garbage preceded the unwritten landing register.
#[test]
fn s4_if_else_both_arms_land_their_result_in_the_same_register() {
    let func_type = FuncType::new([], [ValueType::I32]);
    let locals: [ValueType; 0] = [];
    let layout = StackLayout::new(&func_type, locals.len() as u32, 0).unwrap();

    let module = SimpleModule::new();
    let mut interner = DedupFuncTypeInterner::default();
    let mut t = new_translator(&module, &mut interner, func_type, &locals, 0);

    t.visit_const(ConstValue::I32(0)).unwrap();
    t.visit_if(regxlate::BlockType::Result(ValueType::I32)).unwrap();
    t.visit_const(ConstValue::I32(2)).unwrap();
    t.visit_else().unwrap();
    t.visit_const(ConstValue::I32(3)).unwrap();
    t.visit_end().unwrap();
    let seq = t.finish().unwrap();

    assert_eq!(seq.constants, vec![0u64, 2u64, 3u64]);
    let decoded: Vec<Instruction> = seq.decode_all(ThreadingModel::Direct).into_iter().map(|(_, i)| i).collect();

    let landing = layout.stack_reg(0);
    let return0 = layout.header().return_reg(0);
    let const2 = layout.const_reg(1);
    let const3 = layout.const_reg(2);

    // BranchIfNot(condition, else), then-arm copy, branch to end, else
    // label lands here, else-arm copy, end label lands here, final
    // return copy, Return.
    assert!(matches!(decoded[0], Instruction::BranchIfNot { .. }));
    assert_eq!(decoded[1], Instruction::Copy { dst: landing, src: const2 });
    assert!(matches!(decoded[2], Instruction::Branch(_)));
    assert_eq!(decoded[3], Instruction::Copy { dst: landing, src: const3 });
    assert_eq!(decoded[4], Instruction::Copy { dst: return0, src: landing });
    assert_eq!(decoded[5], Instruction::Return);
}

/// S5: a `constantSlotSize` of 4 (the floor, for tiny `code_size`) fills up
/// after 4 distinct constants; the 5th distinct value falls back to an
/// inline `const32` at its own stack slot rather than erroring.
#[test]
fn s5_constant_pool_overflow_falls_back_to_inline_const() {
    let func_type = FuncType::new([], [ValueType::I32]);
    let locals: [ValueType; 0] = [];
    let layout = StackLayout::new(&func_type, locals.len() as u32, 0).unwrap();
    assert_eq!(layout.constant_slot_size(), 4);

    let module = SimpleModule::new();
    let mut interner = DedupFuncTypeInterner::default();
    let mut t = new_translator(&module, &mut interner, func_type, &locals, 0);

    for v in [1, 2, 3, 4, 5] {
        t.visit_const(ConstValue::I32(v)).unwrap();
        t.visit_drop().unwrap();
    }
    t.visit_const(ConstValue::I32(99)).unwrap();
    let seq = t.finish().unwrap();

    assert_eq!(seq.constants, vec![1u64, 2u64, 3u64, 4u64]);
    let decoded: Vec<Instruction> = seq.decode_all(ThreadingModel::Direct).into_iter().map(|(_, i)| i).collect();

    let overflow_slot = layout.stack_reg(0);
    assert!(
        decoded.iter().any(|i| matches!(i, Instruction::Const32 { dst, value: 5 } if *dst == overflow_slot)),
        "{decoded:?}"
    );
}

/// S6: a `br_table` with three targets at distinct nesting depths copies
/// its single shared operand to each target's own landing register —
/// resolved and popped once, then copied independently per arm.
#[test]
fn s6_br_table_copies_its_operand_to_each_targets_landing_register() {
    let func_type = FuncType::new([], [ValueType::I32]);
    let locals: [ValueType; 0] = [];

    let module = SimpleModule::new();
    let mut interner = DedupFuncTypeInterner::default();
    let mut t = new_translator(&module, &mut interner, func_type, &locals, 0);

    t.visit_block(regxlate::BlockType::Result(ValueType::I32)).unwrap();
    t.visit_block(regxlate::BlockType::Result(ValueType::I32)).unwrap();
    t.visit_const(ConstValue::I32(42)).unwrap();
    t.visit_const(ConstValue::I32(0)).unwrap();
    t.visit_br_table(&[0, 1], 1).unwrap();
    t.visit_end().unwrap();
    t.visit_end().unwrap();
    let seq = t.finish().unwrap();

    assert_eq!(seq.br_tables.len(), 1);
    assert_eq!(seq.br_tables[0].len(), 2);
    let decoded: Vec<Instruction> = seq.decode_all(ThreadingModel::Direct).into_iter().map(|(_, i)| i).collect();
    assert!(decoded.iter().any(|i| matches!(i, Instruction::BranchTable { .. })));
}

/// Testable property: `pop` on an empty, unreachable stack never panics
/// or underflows — validated Wasm permits a polymorphic operand stack
/// after `unreachable`.
#[test]
fn property_pop_past_bottom_in_unreachable_code_is_tolerated() {
    let func_type = FuncType::new([], [ValueType::I32, ValueType::I32]);
    let locals: [ValueType; 0] = [];

    let module = SimpleModule::new();
    let mut interner = DedupFuncTypeInterner::default();
    let mut t = new_translator(&module, &mut interner, func_type, &locals, 0);

    t.visit_unreachable().unwrap();
    // Two adds, each popping two operands, on a stack that was emptied by
    // `unreachable` — must not underflow.
    t.visit_binary(ValueType::I32, BinaryOp::I32Add).unwrap();
    t.visit_binary(ValueType::I32, BinaryOp::I32Add).unwrap();
    let seq = t.finish();
    assert!(seq.is_ok());
}

/// Testable property: the reported `max_stack_height` tracks the highest
/// logical height reached, not the height at the point of `finish`.
#[test]
fn property_max_stack_height_tracks_the_peak_not_the_end() {
    let func_type = FuncType::new([], []);
    let locals: [ValueType; 0] = [];

    let module = SimpleModule::new();
    let mut interner = DedupFuncTypeInterner::default();
    let mut t = new_translator(&module, &mut interner, func_type, &locals, 0);

    t.visit_const(ConstValue::I32(1)).unwrap();
    t.visit_const(ConstValue::I32(2)).unwrap();
    t.visit_const(ConstValue::I32(3)).unwrap();
    t.visit_drop().unwrap();
    t.visit_drop().unwrap();
    t.visit_drop().unwrap();
    let seq = t.finish().unwrap();

    assert_eq!(seq.max_stack_height, 3);
}
