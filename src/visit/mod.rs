//! The opcode visitor: one method per Wasm operator, driven by an
//! external parser/decoder (out of scope for this crate — see
//! `SPEC_FULL.md`). [`FuncTranslator`] implements this trait directly;
//! each method performs exactly the type checking, stack bookkeeping,
//! and instruction emission described for that opcode.

mod control;
mod memory;
mod numeric;
mod table;
mod variable;

pub use numeric::{binary_op_for, conversion_op_for, unary_op_for};

use crate::error::TranslationError;
use crate::instr::{LoadOp, StoreOp};
use crate::module::{DataSegmentIdx, ElementSegmentIdx, FuncIdx, FuncTypeIdx, GlobalIdx, MemoryIdx, TableIdx};
use crate::value::{BlockType, ConstValue, ValueType};

/// A decoded `load`/`store` memory immediate: a byte offset plus the
/// declared alignment (`2^align_log2` bytes), as produced by
/// `wasmparser::MemArg` decoding.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MemArg {
    pub offset: u64,
    pub align_log2: u8,
    pub memory: MemoryIdx,
}

/// One method per Wasm operator. A real embedder drives this trait from
/// a `wasmparser` operator loop; this crate ships only the translation
/// logic each method performs, not the driving loop itself.
pub trait OpcodeVisitor {
    type Output;

    // --- Control -----------------------------------------------------
    fn visit_unreachable(&mut self) -> Self::Output;
    fn visit_nop(&mut self) -> Self::Output;
    fn visit_block(&mut self, block_type: BlockType) -> Self::Output;
    fn visit_loop(&mut self, block_type: BlockType) -> Self::Output;
    fn visit_if(&mut self, block_type: BlockType) -> Self::Output;
    fn visit_else(&mut self) -> Self::Output;
    fn visit_end(&mut self) -> Self::Output;
    fn visit_br(&mut self, relative_depth: u32) -> Self::Output;
    fn visit_br_if(&mut self, relative_depth: u32) -> Self::Output;
    fn visit_br_table(&mut self, targets: &[u32], default: u32) -> Self::Output;
    fn visit_return(&mut self) -> Self::Output;
    fn visit_call(&mut self, func_idx: FuncIdx) -> Self::Output;
    fn visit_call_indirect(&mut self, type_idx: FuncTypeIdx, table_idx: TableIdx) -> Self::Output;

    // --- Parametric & Variable ----------------------------------------
    fn visit_drop(&mut self) -> Self::Output;
    fn visit_select(&mut self) -> Self::Output;
    fn visit_local_get(&mut self, local_idx: u32) -> Self::Output;
    fn visit_local_set(&mut self, local_idx: u32) -> Self::Output;
    fn visit_local_tee(&mut self, local_idx: u32) -> Self::Output;
    fn visit_global_get(&mut self, global_idx: GlobalIdx) -> Self::Output;
    fn visit_global_set(&mut self, global_idx: GlobalIdx) -> Self::Output;

    // --- Numeric -------------------------------------------------------
    fn visit_const(&mut self, value: ConstValue) -> Self::Output;
    /// Collapses the ~20 unary numeric opcodes (`i32.clz`, `f64.sqrt`,
    /// ...) into one generic entry point.
    fn visit_unary(&mut self, ty: ValueType, op: crate::instr::UnaryOp) -> Self::Output;
    /// Collapses the ~90 binary numeric opcodes into one generic entry
    /// point.
    fn visit_binary(&mut self, ty: ValueType, op: crate::instr::BinaryOp) -> Self::Output;
    /// Collapses every numeric conversion opcode (wraps, extends,
    /// truncations, reinterprets) into one generic entry point.
    fn visit_conversion(&mut self, op: crate::instr::ConversionOp) -> Self::Output;

    // --- Reference ------------------------------------------------------
    fn visit_ref_null(&mut self, ty: ValueType) -> Self::Output;
    fn visit_ref_is_null(&mut self) -> Self::Output;
    fn visit_ref_func(&mut self, func_idx: FuncIdx) -> Self::Output;

    // --- Memory ---------------------------------------------------------
    fn visit_load(&mut self, op: LoadOp, memarg: MemArg) -> Self::Output;
    fn visit_store(&mut self, op: StoreOp, memarg: MemArg) -> Self::Output;
    fn visit_memory_size(&mut self, memory: MemoryIdx) -> Self::Output;
    fn visit_memory_grow(&mut self, memory: MemoryIdx) -> Self::Output;
    fn visit_memory_init(&mut self, memory: MemoryIdx, data: DataSegmentIdx) -> Self::Output;
    fn visit_memory_copy(&mut self, dst: MemoryIdx, src: MemoryIdx) -> Self::Output;
    fn visit_memory_fill(&mut self, memory: MemoryIdx) -> Self::Output;
    fn visit_data_drop(&mut self, data: DataSegmentIdx) -> Self::Output;

    // --- Table -----------------------------------------------------------
    fn visit_table_get(&mut self, table: TableIdx) -> Self::Output;
    fn visit_table_set(&mut self, table: TableIdx) -> Self::Output;
    fn visit_table_size(&mut self, table: TableIdx) -> Self::Output;
    fn visit_table_grow(&mut self, table: TableIdx) -> Self::Output;
    fn visit_table_init(&mut self, table: TableIdx, elem: ElementSegmentIdx) -> Self::Output;
    fn visit_table_copy(&mut self, dst: TableIdx, src: TableIdx) -> Self::Output;
    fn visit_table_fill(&mut self, table: TableIdx) -> Self::Output;
    fn visit_elem_drop(&mut self, elem: ElementSegmentIdx) -> Self::Output;
}

pub(crate) type VisitResult = Result<(), TranslationError>;

impl<'m> OpcodeVisitor for crate::translator::FuncTranslator<'m> {
    type Output = VisitResult;

    fn visit_unreachable(&mut self) -> Self::Output {
        self.do_unreachable()
    }
    fn visit_nop(&mut self) -> Self::Output {
        self.do_nop()
    }
    fn visit_block(&mut self, block_type: BlockType) -> Self::Output {
        self.do_block(block_type)
    }
    fn visit_loop(&mut self, block_type: BlockType) -> Self::Output {
        self.do_loop(block_type)
    }
    fn visit_if(&mut self, block_type: BlockType) -> Self::Output {
        self.do_if(block_type)
    }
    fn visit_else(&mut self) -> Self::Output {
        self.do_else()
    }
    fn visit_end(&mut self) -> Self::Output {
        self.do_end()
    }
    fn visit_br(&mut self, relative_depth: u32) -> Self::Output {
        self.do_br(relative_depth)
    }
    fn visit_br_if(&mut self, relative_depth: u32) -> Self::Output {
        self.do_br_if(relative_depth)
    }
    fn visit_br_table(&mut self, targets: &[u32], default: u32) -> Self::Output {
        self.do_br_table(targets, default)
    }
    fn visit_return(&mut self) -> Self::Output {
        self.do_return()
    }
    fn visit_call(&mut self, func_idx: FuncIdx) -> Self::Output {
        self.do_call(func_idx)
    }
    fn visit_call_indirect(&mut self, type_idx: FuncTypeIdx, table_idx: TableIdx) -> Self::Output {
        self.do_call_indirect(type_idx, table_idx)
    }

    fn visit_drop(&mut self) -> Self::Output {
        self.do_drop()
    }
    fn visit_select(&mut self) -> Self::Output {
        self.do_select()
    }
    fn visit_local_get(&mut self, local_idx: u32) -> Self::Output {
        self.do_local_get(local_idx)
    }
    fn visit_local_set(&mut self, local_idx: u32) -> Self::Output {
        self.do_local_set(local_idx)
    }
    fn visit_local_tee(&mut self, local_idx: u32) -> Self::Output {
        self.do_local_tee(local_idx)
    }
    fn visit_global_get(&mut self, global_idx: GlobalIdx) -> Self::Output {
        self.do_global_get(global_idx)
    }
    fn visit_global_set(&mut self, global_idx: GlobalIdx) -> Self::Output {
        self.do_global_set(global_idx)
    }

    fn visit_const(&mut self, value: ConstValue) -> Self::Output {
        self.do_const(value)
    }
    fn visit_unary(&mut self, ty: ValueType, op: crate::instr::UnaryOp) -> Self::Output {
        self.do_unary(ty, op)
    }
    fn visit_binary(&mut self, ty: ValueType, op: crate::instr::BinaryOp) -> Self::Output {
        self.do_binary(ty, op)
    }
    fn visit_conversion(&mut self, op: crate::instr::ConversionOp) -> Self::Output {
        self.do_conversion(op)
    }

    fn visit_ref_null(&mut self, ty: ValueType) -> Self::Output {
        self.do_ref_null(ty)
    }
    fn visit_ref_is_null(&mut self) -> Self::Output {
        self.do_ref_is_null()
    }
    fn visit_ref_func(&mut self, func_idx: FuncIdx) -> Self::Output {
        self.do_ref_func(func_idx)
    }

    fn visit_load(&mut self, op: LoadOp, memarg: MemArg) -> Self::Output {
        self.do_load(op, memarg)
    }
    fn visit_store(&mut self, op: StoreOp, memarg: MemArg) -> Self::Output {
        self.do_store(op, memarg)
    }
    fn visit_memory_size(&mut self, memory: MemoryIdx) -> Self::Output {
        self.do_memory_size(memory)
    }
    fn visit_memory_grow(&mut self, memory: MemoryIdx) -> Self::Output {
        self.do_memory_grow(memory)
    }
    fn visit_memory_init(&mut self, memory: MemoryIdx, data: DataSegmentIdx) -> Self::Output {
        self.do_memory_init(memory, data)
    }
    fn visit_memory_copy(&mut self, dst: MemoryIdx, src: MemoryIdx) -> Self::Output {
        self.do_memory_copy(dst, src)
    }
    fn visit_memory_fill(&mut self, memory: MemoryIdx) -> Self::Output {
        self.do_memory_fill(memory)
    }
    fn visit_data_drop(&mut self, data: DataSegmentIdx) -> Self::Output {
        self.do_data_drop(data)
    }

    fn visit_table_get(&mut self, table: TableIdx) -> Self::Output {
        self.do_table_get(table)
    }
    fn visit_table_set(&mut self, table: TableIdx) -> Self::Output {
        self.do_table_set(table)
    }
    fn visit_table_size(&mut self, table: TableIdx) -> Self::Output {
        self.do_table_size(table)
    }
    fn visit_table_grow(&mut self, table: TableIdx) -> Self::Output {
        self.do_table_grow(table)
    }
    fn visit_table_init(&mut self, table: TableIdx, elem: ElementSegmentIdx) -> Self::Output {
        self.do_table_init(table, elem)
    }
    fn visit_table_copy(&mut self, dst: TableIdx, src: TableIdx) -> Self::Output {
        self.do_table_copy(dst, src)
    }
    fn visit_table_fill(&mut self, table: TableIdx) -> Self::Output {
        self.do_table_fill(table)
    }
    fn visit_elem_drop(&mut self, elem: ElementSegmentIdx) -> Self::Output {
        self.do_elem_drop(elem)
    }
}
