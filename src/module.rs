//! External collaborators consumed by the translator: the module context,
//! the type interner, and the engine configuration.
//!
//! A real engine resolves these against its loaded module and global
//! configuration. This crate specifies the traits the translator needs
//! and ships a small in-memory reference implementation ([`SimpleModule`],
//! [`DedupFuncTypeInterner`]) so the translator can be exercised without a
//! real parser or loader.

use crate::error::{IndexKind, TranslationError, TranslationErrorInner};
use crate::value::{FuncType, ValueType};
use std::collections::HashMap;

macro_rules! index_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u32);

        impl $name {
            /// Creates a new index from its raw `u32` value.
            pub fn from_u32(value: u32) -> Self {
                Self(value)
            }

            /// Returns the raw `u32` value of this index.
            pub fn to_u32(self) -> u32 {
                self.0
            }
        }
    };
}

index_type!(
    /// Index of a function type in a module's type section.
    FuncTypeIdx
);
index_type!(
    /// Index of a function (imported or defined) in a module.
    FuncIdx
);
index_type!(
    /// Index of a global variable in a module.
    GlobalIdx
);
index_type!(
    /// Index of a linear memory in a module.
    MemoryIdx
);
index_type!(
    /// Index of a table in a module.
    TableIdx
);
index_type!(
    /// Index of a passive data segment in a module.
    DataSegmentIdx
);
index_type!(
    /// Index of a passive element segment in a module.
    ElementSegmentIdx
);

/// An interned, deduplicated identifier for a [`FuncType`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DedupFuncType(u32);

impl DedupFuncType {
    /// Creates a [`DedupFuncType`] from a raw `u32`, e.g. when decoding an
    /// [`crate::instr::Instruction::CallIndirect`] immediate.
    pub fn from_u32(value: u32) -> Self {
        Self(value)
    }

    /// Returns the raw `u32` identifier, e.g. for encoding a
    /// [`crate::instr::Instruction::CallIndirect`] immediate.
    pub fn to_u32(self) -> u32 {
        self.0
    }
}

/// Resolves [`FuncType`]s to and from [`DedupFuncType`] identifiers.
///
/// Equal function types always yield equal identifiers.
pub trait TypeInterner {
    /// Interns `ty`, returning its (possibly pre-existing) identifier.
    fn intern(&mut self, ty: FuncType) -> DedupFuncType;

    /// Resolves a previously interned identifier back to its [`FuncType`].
    ///
    /// # Panics
    ///
    /// May panic if `id` was not produced by this interner.
    fn resolve(&self, id: DedupFuncType) -> FuncType;
}

/// A [`TypeInterner`] that deduplicates by structural equality, mirroring
/// the dedup-by-map strategy of `wasmi_arena::DedupArena`.
#[derive(Debug, Default)]
pub struct DedupFuncTypeInterner {
    type2idx: HashMap<FuncType, u32>,
    types: Vec<FuncType>,
}

impl TypeInterner for DedupFuncTypeInterner {
    fn intern(&mut self, ty: FuncType) -> DedupFuncType {
        if let Some(idx) = self.type2idx.get(&ty) {
            return DedupFuncType(*idx);
        }
        let idx = self.types.len() as u32;
        self.types.push(ty.clone());
        self.type2idx.insert(ty, idx);
        DedupFuncType(idx)
    }

    fn resolve(&self, id: DedupFuncType) -> FuncType {
        self.types[id.0 as usize].clone()
    }
}

/// A resolved callee: either a function defined in the same instance
/// (enabling a `compilingCall` / lazy-compilation fast path) or an
/// imported function.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ResolvedCallee {
    /// The callee is a Wasm function of the currently translated instance.
    Internal(FuncIdx),
    /// The callee is imported from another instance.
    Imported(FuncIdx),
}

/// The external module context consulted during translation.
///
/// In validation-only mode `resolve_callee`/`resolve_global` return `None`;
/// the translator still performs stack/control bookkeeping and type
/// checks, but skips emitting instructions that would need the resolved
/// handle.
pub trait ModuleContext {
    /// Resolves a type index to a [`FuncType`].
    fn resolve_type(&self, idx: FuncTypeIdx) -> Result<FuncType, TranslationError>;

    /// Resolves a [`crate::value::BlockType::FuncType`] index to a
    /// [`FuncType`].
    fn resolve_block_type(&self, idx: FuncTypeIdx) -> Result<FuncType, TranslationError> {
        self.resolve_type(idx)
    }

    /// Resolves a function's own [`FuncType`] via the type interner.
    fn type_of_func(&self, idx: FuncIdx) -> Result<FuncType, TranslationError>;

    /// Looks up a global's value type.
    fn global_type(&self, idx: GlobalIdx) -> Result<ValueType, TranslationError>;

    /// Returns `true` if memory `idx` is a 64-bit memory.
    fn is_memory64(&self, idx: MemoryIdx) -> Result<bool, TranslationError>;

    /// Returns `true` if table `idx` is a 64-bit table.
    fn is_table64(&self, idx: TableIdx) -> Result<bool, TranslationError>;

    /// Looks up a table's element type.
    fn table_element_type(&self, idx: TableIdx) -> Result<ValueType, TranslationError>;

    /// Resolves a callee to a runtime function handle.
    ///
    /// Returns `None` in validation-only resolution mode.
    fn resolve_callee(&self, idx: FuncIdx) -> Result<Option<ResolvedCallee>, TranslationError>;

    /// Resolves a global to an opaque runtime handle (`None` in
    /// validation-only mode).
    fn resolve_global(&self, idx: GlobalIdx) -> Result<Option<()>, TranslationError>;

    /// Validates that a data segment index is in range.
    fn validate_data_segment(&self, idx: DataSegmentIdx) -> Result<(), TranslationError>;

    /// Validates that an element segment index is in range.
    fn validate_element_segment(&self, idx: ElementSegmentIdx) -> Result<(), TranslationError>;

    /// Validates that a function index is in range (used by `ref.func`).
    fn validate_func_index(&self, idx: FuncIdx) -> Result<(), TranslationError>;
}

/// A small in-memory [`ModuleContext`] reference implementation, useful
/// for tests and for embedding the translator without a full module
/// loader.
#[derive(Debug, Default, Clone)]
pub struct SimpleModule {
    types: Vec<FuncType>,
    func_types: Vec<FuncTypeIdx>,
    globals: Vec<ValueType>,
    memories_64: Vec<bool>,
    tables: Vec<(bool, ValueType)>,
    data_segments: u32,
    element_segments: u32,
    /// If `false`, `resolve_callee`/`resolve_global` behave as in
    /// validation-only mode and always return `None`.
    pub resolves_handles: bool,
    internal_funcs: std::collections::HashSet<u32>,
}

impl SimpleModule {
    /// Creates an empty [`SimpleModule`] that resolves callee/global
    /// handles (i.e. not validation-only).
    pub fn new() -> Self {
        Self {
            resolves_handles: true,
            ..Default::default()
        }
    }

    /// Registers a function type, returning its index.
    pub fn push_type(&mut self, ty: FuncType) -> FuncTypeIdx {
        let idx = FuncTypeIdx::from_u32(self.types.len() as u32);
        self.types.push(ty);
        idx
    }

    /// Registers a function with the given type, returning its index.
    /// Marked internal (same-instance) unless [`SimpleModule::push_imported_func`]
    /// is used.
    pub fn push_func(&mut self, ty: FuncTypeIdx) -> FuncIdx {
        let idx = FuncIdx::from_u32(self.func_types.len() as u32);
        self.internal_funcs.insert(idx.to_u32());
        self.func_types.push(ty);
        idx
    }

    /// Registers an imported function with the given type.
    pub fn push_imported_func(&mut self, ty: FuncTypeIdx) -> FuncIdx {
        let idx = FuncIdx::from_u32(self.func_types.len() as u32);
        self.func_types.push(ty);
        idx
    }

    /// Registers a global of the given type.
    pub fn push_global(&mut self, ty: ValueType) -> GlobalIdx {
        let idx = GlobalIdx::from_u32(self.globals.len() as u32);
        self.globals.push(ty);
        idx
    }

    /// Registers a linear memory.
    pub fn push_memory(&mut self, is_64: bool) -> MemoryIdx {
        let idx = MemoryIdx::from_u32(self.memories_64.len() as u32);
        self.memories_64.push(is_64);
        idx
    }

    /// Registers a table.
    pub fn push_table(&mut self, is_64: bool, element: ValueType) -> TableIdx {
        let idx = TableIdx::from_u32(self.tables.len() as u32);
        self.tables.push((is_64, element));
        idx
    }

    /// Registers `count` passive data segments.
    pub fn push_data_segments(&mut self, count: u32) {
        self.data_segments += count;
    }

    /// Registers `count` passive element segments.
    pub fn push_element_segments(&mut self, count: u32) {
        self.element_segments += count;
    }
}

impl ModuleContext for SimpleModule {
    fn resolve_type(&self, idx: FuncTypeIdx) -> Result<FuncType, TranslationError> {
        self.types.get(idx.to_u32() as usize).cloned().ok_or_else(|| {
            TranslationError::new(TranslationErrorInner::IndexOutOfRange {
                kind: IndexKind::Type,
                index: idx.to_u32(),
            })
        })
    }

    fn type_of_func(&self, idx: FuncIdx) -> Result<FuncType, TranslationError> {
        let ty_idx = *self.func_types.get(idx.to_u32() as usize).ok_or_else(|| {
            TranslationError::new(TranslationErrorInner::IndexOutOfRange {
                kind: IndexKind::Function,
                index: idx.to_u32(),
            })
        })?;
        self.resolve_type(ty_idx)
    }

    fn global_type(&self, idx: GlobalIdx) -> Result<ValueType, TranslationError> {
        self.globals.get(idx.to_u32() as usize).copied().ok_or_else(|| {
            TranslationError::new(TranslationErrorInner::IndexOutOfRange {
                kind: IndexKind::Global,
                index: idx.to_u32(),
            })
        })
    }

    fn is_memory64(&self, idx: MemoryIdx) -> Result<bool, TranslationError> {
        self.memories_64.get(idx.to_u32() as usize).copied().ok_or_else(|| {
            TranslationError::new(TranslationErrorInner::IndexOutOfRange {
                kind: IndexKind::Memory,
                index: idx.to_u32(),
            })
        })
    }

    fn is_table64(&self, idx: TableIdx) -> Result<bool, TranslationError> {
        self.tables
            .get(idx.to_u32() as usize)
            .map(|(is_64, _)| *is_64)
            .ok_or_else(|| {
                TranslationError::new(TranslationErrorInner::IndexOutOfRange {
                    kind: IndexKind::Table,
                    index: idx.to_u32(),
                })
            })
    }

    fn table_element_type(&self, idx: TableIdx) -> Result<ValueType, TranslationError> {
        self.tables
            .get(idx.to_u32() as usize)
            .map(|(_, ty)| *ty)
            .ok_or_else(|| {
                TranslationError::new(TranslationErrorInner::IndexOutOfRange {
                    kind: IndexKind::Table,
                    index: idx.to_u32(),
                })
            })
    }

    fn resolve_callee(&self, idx: FuncIdx) -> Result<Option<ResolvedCallee>, TranslationError> {
        if idx.to_u32() as usize >= self.func_types.len() {
            return Err(TranslationError::new(TranslationErrorInner::IndexOutOfRange {
                kind: IndexKind::Function,
                index: idx.to_u32(),
            }));
        }
        if !self.resolves_handles {
            return Ok(None);
        }
        let callee = if self.internal_funcs.contains(&idx.to_u32()) {
            ResolvedCallee::Internal(idx)
        } else {
            ResolvedCallee::Imported(idx)
        };
        Ok(Some(callee))
    }

    fn resolve_global(&self, idx: GlobalIdx) -> Result<Option<()>, TranslationError> {
        self.global_type(idx)?;
        Ok(self.resolves_handles.then_some(()))
    }

    fn validate_data_segment(&self, idx: DataSegmentIdx) -> Result<(), TranslationError> {
        if idx.to_u32() < self.data_segments {
            Ok(())
        } else {
            Err(TranslationError::new(TranslationErrorInner::IndexOutOfRange {
                kind: IndexKind::Data,
                index: idx.to_u32(),
            }))
        }
    }

    fn validate_element_segment(&self, idx: ElementSegmentIdx) -> Result<(), TranslationError> {
        if idx.to_u32() < self.element_segments {
            Ok(())
        } else {
            Err(TranslationError::new(TranslationErrorInner::IndexOutOfRange {
                kind: IndexKind::Element,
                index: idx.to_u32(),
            }))
        }
    }

    fn validate_func_index(&self, idx: FuncIdx) -> Result<(), TranslationError> {
        self.type_of_func(idx).map(|_| ())
    }
}

/// Interpreter dispatch convention: determines whether an instruction's
/// head slot encodes a numeric opcode or a direct handler address.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ThreadingModel {
    /// The head slot holds the opcode's plain discriminant.
    #[default]
    Direct,
    /// The head slot holds a direct handler address for token-threaded
    /// dispatch.
    Threaded,
}

/// Configuration consumed by the translator.
///
/// Mirrors the shape of `wasmi`'s `engine::config::Config`: a plain data
/// struct with a `Default` impl and accessor methods.
#[derive(Debug, Copy, Clone)]
pub struct EngineConfig {
    threading_model: ThreadingModel,
    interception: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threading_model: ThreadingModel::Direct,
            interception: false,
        }
    }
}

impl EngineConfig {
    /// Sets the [`ThreadingModel`] used for instruction head slots.
    pub fn with_threading_model(mut self, model: ThreadingModel) -> Self {
        self.threading_model = model;
        self
    }

    /// Enables or disables the `onEnter`/`onExit` interceptor hooks.
    pub fn with_interception(mut self, enabled: bool) -> Self {
        self.interception = enabled;
        self
    }

    /// Returns the configured [`ThreadingModel`].
    pub fn threading_model(&self) -> ThreadingModel {
        self.threading_model
    }

    /// Returns `true` if interception hooks should be emitted.
    pub fn interception_enabled(&self) -> bool {
        self.interception
    }
}
