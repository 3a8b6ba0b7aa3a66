//! # regxlate
//!
//! A single-pass translator from validated WebAssembly function bodies to
//! a register-based instruction sequence for a threaded interpreter.
//!
//! This crate does not parse or validate Wasm itself — it expects to be
//! driven by an external decoder (e.g. `wasmparser`'s operator iterator)
//! that calls the [`visit::OpcodeVisitor`] methods [`translator::FuncTranslator`]
//! implements, one call per validated Wasm operator. What it owns is the
//! translation itself: tracking an abstract value stack with per-slot
//! register homes, emitting `Copy`s only where a value's home register
//! must actually change, resolving branch targets via forward-patched
//! labels, and packaging the result as an [`instr::InstructionSequence`]
//! ready for the interpreter loop.
//!
//! ## Module layout
//!
//! - [`value`] — Wasm value types, function types, block types, constants.
//! - [`module`] — the [`module::ModuleContext`] a translation queries for
//!   module-level facts (function/global/table/memory types, call
//!   resolution), plus [`module::SimpleModule`], an in-memory test double.
//! - [`frame`] — [`frame::VReg`] and the [`frame::StackLayout`] mapping a
//!   function's locals, value-stack slots, and call-frame header to
//!   concrete register numbers.
//! - [`stack`] — the symbolic [`stack::ValueStack`], which defers
//!   materializing a value into its home register for as long as possible.
//! - [`control`] — the control-frame stack backing `block`/`loop`/`if`.
//! - [`label`] — forward-patched branch targets.
//! - [`pool`] — the deduplicated constant pool.
//! - [`arena`] — a generic index-based arena used by the constant pool.
//! - [`instr`] — the [`instr::Instruction`] set and its word-stream codec.
//! - [`builder`] — [`builder::InstrEncoder`], which appends instructions,
//!   allocates/pins labels, and performs the result-relink peephole.
//! - [`translator`] — [`translator::FuncTranslator`], tying all of the
//!   above together.
//! - [`visit`] — the [`visit::OpcodeVisitor`] trait and its implementation
//!   for [`translator::FuncTranslator`].
//! - [`error`] — [`error::TranslationError`].

mod arena;
mod builder;
mod control;
mod error;
mod frame;
mod instr;
mod label;
mod module;
mod pool;
mod stack;
mod translator;
mod value;
mod visit;

pub use crate::error::{IndexKind, TranslationError, TranslationErrorInner};
pub use crate::frame::{FrameHeaderLayout, StackLayout, VReg};
pub use crate::instr::{
    classify_slot, dump, BinaryOp, CallLayout, ConversionOp, Instruction, InstructionSequence, LoadOp, Opcode,
    RegisterSpan, SlotRole, StoreOp, UnaryOp,
};
pub use crate::module::{
    DataSegmentIdx, DedupFuncType, DedupFuncTypeInterner, ElementSegmentIdx, EngineConfig, FuncIdx, FuncTypeIdx,
    GlobalIdx, MemoryIdx, ModuleContext, ResolvedCallee, SimpleModule, TableIdx, ThreadingModel, TypeInterner,
};
pub use crate::translator::FuncTranslator;
pub use crate::value::{BlockType, ConstValue, FuncType, ValueType};
pub use crate::visit::{MemArg, OpcodeVisitor};
