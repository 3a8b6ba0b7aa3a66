//! The control-frame stack.
//!
//! Tracks nested `block`/`loop`/`if` constructs during translation: each
//! frame remembers the value-stack height at which it was entered (so
//! `end`/`br` know how much of the stack belongs to the frame), its
//! branch target, and whether code at the current position is reachable.

use crate::error::{TranslationError, TranslationErrorInner};
use crate::label::LabelRef;
use crate::value::BlockType;

/// Distinguishes the three structured control constructs.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ControlFrameKind {
    /// A `block`. The outermost frame (the function body itself) is also
    /// modeled as a `Block`, with [`ControlFrame::is_root`] set.
    Block,
    /// A `loop`. Its branch target is the loop header label, already
    /// pinned at the loop's entry point when the frame is pushed
    /// (branches to a loop jump backward).
    Loop { header_label: LabelRef },
    /// An `if`. `else_label` is `Some` until `else` is encountered (or
    /// the frame is popped without an `else`, which is only valid when
    /// the block type takes no parameters and produces no results beyond
    /// its inputs).
    If { else_label: Option<LabelRef> },
}

/// A single entry on the [`ControlStack`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ControlFrame {
    kind: ControlFrameKind,
    block_type: BlockType,
    /// Value-stack height at the point this frame was entered (i.e. not
    /// counting the frame's own parameters as "belonging" to its body).
    stack_height: u16,
    /// The forward label pinned at this frame's `end`. For `loop` frames
    /// this is still tracked (a `loop`'s `end` can itself be a branch
    /// target, distinct from the loop header), even though `br` to the
    /// loop itself targets the header.
    end_label: LabelRef,
    reachable: bool,
    reachable_at_entry: bool,
    is_root: bool,
    /// For the root frame only: the function's own result arity. The
    /// root frame represents the function body's implicit outer block,
    /// whose type is the function's signature rather than something
    /// resolvable through [`BlockType`]/[`crate::module::ModuleContext`].
    root_num_results: u16,
}

impl ControlFrame {
    pub fn kind(&self) -> &ControlFrameKind {
        &self.kind
    }

    pub fn block_type(&self) -> BlockType {
        self.block_type
    }

    pub fn stack_height(&self) -> u16 {
        self.stack_height
    }

    pub fn end_label(&self) -> LabelRef {
        self.end_label
    }

    pub fn is_root(&self) -> bool {
        self.is_root
    }

    pub fn is_loop(&self) -> bool {
        matches!(self.kind, ControlFrameKind::Loop { .. })
    }

    pub fn reachable(&self) -> bool {
        self.reachable
    }

    pub fn set_reachable(&mut self, reachable: bool) {
        self.reachable = reachable;
    }

    /// Restores this frame's reachability to what it was when the frame
    /// was entered. Used at `else`: whether the `then` arm fell off the
    /// end unreachably has no bearing on whether the `else` arm starts
    /// out reachable.
    pub fn reset_reachability(&mut self) {
        self.reachable = self.reachable_at_entry;
    }

    /// The branch target for a branch targeting this frame: the loop
    /// header for `loop` frames, the `end` label for everything else.
    pub fn branch_target(&self) -> LabelRef {
        match self.kind {
            ControlFrameKind::Loop { header_label } => header_label,
            _ => self.end_label,
        }
    }

    /// The number of values a branch targeting this frame must carry:
    /// the block type's parameters for a `loop` (the loop-carried
    /// values), its results for everything else.
    pub fn branch_copy_count(
        &self,
        ctx: &dyn crate::module::ModuleContext,
    ) -> Result<u16, TranslationError> {
        if self.is_root {
            return Ok(self.root_num_results);
        }
        match self.kind {
            ControlFrameKind::Loop { .. } => self.block_type.len_params(ctx),
            _ => self.block_type.len_results(ctx),
        }
    }

    /// Takes the `if`'s else label, clearing it (an `if` frame is
    /// consumed by at most one `else`).
    pub fn take_else_label(&mut self) -> Option<LabelRef> {
        match &mut self.kind {
            ControlFrameKind::If { else_label } => else_label.take(),
            _ => None,
        }
    }
}

/// The stack of open control frames for the function currently being
/// translated. Never empty while translation is in progress: the
/// function body itself occupies the bottommost, root `Block` frame.
#[derive(Debug, Default)]
pub struct ControlStack {
    frames: Vec<ControlFrame>,
}

impl ControlStack {
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    /// Pushes the root frame representing the function body. Must be
    /// called exactly once, before any other push.
    pub fn push_root(&mut self, num_results: u16, end_label: LabelRef) {
        debug_assert!(self.frames.is_empty());
        self.frames.push(ControlFrame {
            kind: ControlFrameKind::Block,
            block_type: BlockType::Empty,
            stack_height: 0,
            end_label,
            reachable: true,
            reachable_at_entry: true,
            is_root: true,
            root_num_results: num_results,
        });
    }

    pub fn push_block(&mut self, block_type: BlockType, stack_height: u16, end_label: LabelRef) {
        let reachable = self.is_reachable();
        self.frames.push(ControlFrame {
            kind: ControlFrameKind::Block,
            block_type,
            stack_height,
            end_label,
            reachable,
            reachable_at_entry: reachable,
            is_root: false,
            root_num_results: 0,
        });
    }

    pub fn push_loop(
        &mut self,
        block_type: BlockType,
        stack_height: u16,
        header_label: LabelRef,
        end_label: LabelRef,
    ) {
        let reachable = self.is_reachable();
        self.frames.push(ControlFrame {
            kind: ControlFrameKind::Loop { header_label },
            block_type,
            stack_height,
            end_label,
            reachable,
            reachable_at_entry: reachable,
            is_root: false,
            root_num_results: 0,
        });
    }

    pub fn push_if(
        &mut self,
        block_type: BlockType,
        stack_height: u16,
        else_label: LabelRef,
        end_label: LabelRef,
    ) {
        let reachable = self.is_reachable();
        self.frames.push(ControlFrame {
            kind: ControlFrameKind::If { else_label: Some(else_label) },
            block_type,
            stack_height,
            end_label,
            reachable,
            reachable_at_entry: reachable,
            is_root: false,
            root_num_results: 0,
        });
    }

    /// Pops and returns the innermost frame.
    pub fn pop(&mut self) -> Result<ControlFrame, TranslationError> {
        self.frames
            .pop()
            .ok_or_else(|| TranslationError::new(TranslationErrorInner::ControlMismatch("end with no open frame")))
    }

    /// Shared reference to the innermost frame.
    pub fn top(&self) -> Result<&ControlFrame, TranslationError> {
        self.frames
            .last()
            .ok_or_else(|| TranslationError::new(TranslationErrorInner::UnexpectedTrailingInstruction))
    }

    /// Mutable reference to the innermost frame.
    pub fn top_mut(&mut self) -> Result<&mut ControlFrame, TranslationError> {
        self.frames
            .last_mut()
            .ok_or_else(|| TranslationError::new(TranslationErrorInner::UnexpectedTrailingInstruction))
    }

    /// Looks up the frame targeted by a relative branch depth (0 = the
    /// innermost open frame).
    pub fn frame_at_depth(&self, relative_depth: u32) -> Result<&ControlFrame, TranslationError> {
        let len = self.frames.len();
        let idx = (relative_depth as usize)
            .checked_add(1)
            .and_then(|d| len.checked_sub(d))
            .ok_or_else(|| TranslationError::new(TranslationErrorInner::RelativeDepthOutOfRange { depth: relative_depth }))?;
        Ok(&self.frames[idx])
    }

    pub fn is_reachable(&self) -> bool {
        self.frames.last().map(|f| f.reachable).unwrap_or(true)
    }

    /// Marks the current position unreachable, e.g. after `unreachable`,
    /// `br`, `br_table`, or `return`.
    pub fn mark_unreachable(&mut self) -> Result<(), TranslationError> {
        self.top_mut()?.set_reachable(false);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
