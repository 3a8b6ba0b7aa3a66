//! Wasm value types and function types.
//!
//! These mirror `wasmi_core::ValueType` / `wasmi_core::FuncType` but are
//! kept self-contained here since the module/type-system side of a real
//! engine is an external collaborator (see [`crate::module`]).

use std::sync::Arc;

/// Type of a Wasm value.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValueType {
    I32,
    I64,
    F32,
    F64,
    FuncRef,
    ExternRef,
}

impl ValueType {
    /// Returns `true` if this is a Wasm numeric type.
    pub fn is_num(&self) -> bool {
        matches!(self, Self::I32 | Self::I64 | Self::F32 | Self::F64)
    }

    /// Returns `true` if this is a Wasm reference type.
    pub fn is_ref(&self) -> bool {
        matches!(self, Self::FuncRef | Self::ExternRef)
    }
}

/// A function type representing a function's parameter and result types.
///
/// Cheaply cloneable: the parameter/result lists are shared via `Arc`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FuncType {
    inner: Arc<FuncTypeInner>,
}

#[derive(Debug, PartialEq, Eq, Hash)]
struct FuncTypeInner {
    params: Vec<ValueType>,
    results: Vec<ValueType>,
}

impl FuncType {
    /// Creates a new [`FuncType`].
    pub fn new<P, R>(params: P, results: R) -> Self
    where
        P: IntoIterator<Item = ValueType>,
        R: IntoIterator<Item = ValueType>,
    {
        Self {
            inner: Arc::new(FuncTypeInner {
                params: params.into_iter().collect(),
                results: results.into_iter().collect(),
            }),
        }
    }

    /// Returns the parameter types.
    pub fn params(&self) -> &[ValueType] {
        &self.inner.params
    }

    /// Returns the result types.
    pub fn results(&self) -> &[ValueType] {
        &self.inner.results
    }
}

/// The type of a Wasm `block`/`loop`/`if` construct.
///
/// Either an empty type, a single inline result type, or a reference to a
/// module function type (multi-value blocks).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BlockType {
    Empty,
    Result(ValueType),
    FuncType(crate::module::FuncTypeIdx),
}

impl BlockType {
    /// Resolves the number of parameters of this [`BlockType`] using the
    /// given [`crate::module::ModuleContext`].
    pub fn len_params(&self, ctx: &dyn crate::module::ModuleContext) -> Result<u16, crate::error::TranslationError> {
        match self {
            Self::Empty | Self::Result(_) => Ok(0),
            Self::FuncType(idx) => Ok(ctx.resolve_block_type(*idx)?.params().len() as u16),
        }
    }

    /// Resolves the number of results of this [`BlockType`] using the
    /// given [`crate::module::ModuleContext`].
    pub fn len_results(&self, ctx: &dyn crate::module::ModuleContext) -> Result<u16, crate::error::TranslationError> {
        match self {
            Self::Empty => Ok(0),
            Self::Result(_) => Ok(1),
            Self::FuncType(idx) => Ok(ctx.resolve_block_type(*idx)?.results().len() as u16),
        }
    }

    /// Resolves this [`BlockType`] into a full [`FuncType`].
    pub fn func_type(
        &self,
        ctx: &dyn crate::module::ModuleContext,
    ) -> Result<FuncType, crate::error::TranslationError> {
        match self {
            Self::Empty => Ok(FuncType::new([], [])),
            Self::Result(ty) => Ok(FuncType::new([], [*ty])),
            Self::FuncType(idx) => ctx.resolve_block_type(*idx),
        }
    }
}

/// A literal constant value as it appears in a `T.const` opcode.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ConstValue {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl ConstValue {
    /// The [`ValueType`] of this constant.
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::I32(_) => ValueType::I32,
            Self::I64(_) => ValueType::I64,
            Self::F32(_) => ValueType::F32,
            Self::F64(_) => ValueType::F64,
        }
    }

    /// The untyped 64-bit bit pattern of this constant, as stored in the
    /// constant pool.
    pub fn to_bits(self) -> u64 {
        match self {
            Self::I32(v) => v as u32 as u64,
            Self::I64(v) => v as u64,
            Self::F32(v) => v.to_bits() as u64,
            Self::F64(v) => v.to_bits(),
        }
    }

    /// Returns `true` if this constant fits a 32-bit inline immediate
    /// (`const32`), as opposed to requiring a full 64-bit `const64`.
    pub fn is_32_bit(&self) -> bool {
        matches!(self, Self::I32(_) | Self::F32(_))
    }
}
