//! Forward-branch label patching.
//!
//! A branch or `br_table` entry almost always targets code that hasn't
//! been emitted yet (the common case: branching out of a block to its
//! `end`). Rather than emitting relative offsets and fixing them up in a
//! second pass over the whole function, each label remembers, while
//! unpinned, the list of sites that referenced it; pinning a label
//! immediately drains that list and writes every pending patch.

use crate::arena::Arena;
use crate::error::{TranslationError, TranslationErrorInner};
use crate::instr::BrTableId;

/// An opaque handle to a label in a [`LabelRegistry`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct LabelRef(u32);

impl LabelRef {
    /// Constructs a [`LabelRef`] from a raw registry index. Exposed for
    /// tests that exercise [`crate::control`] without a full registry.
    pub fn from_u32(index: u32) -> Self {
        Self(index)
    }

    pub fn to_u32(self) -> u32 {
        self.0
    }
}

/// A pending reference to a not-yet-pinned label.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PatchSite {
    /// A branch instruction's offset immediate, at instruction-word
    /// index `word_pos`. `source_pc` is the index of the word
    /// immediately following the head word, matching the spec's
    /// "offset measured from the slot after the head" convention.
    BranchOffset { word_pos: usize, source_pc: u32 },
    /// One `br_table` entry, filled with the target's absolute PC.
    BrTableEntry { table: BrTableId, index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Label {
    Unpinned(Vec<PatchSite>),
    Pinned(u32),
}

/// Owns every label allocated while translating one function body.
#[derive(Debug, Default)]
pub struct LabelRegistry {
    labels: Vec<Label>,
}

impl LabelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a new, unpinned label.
    pub fn alloc_unpinned(&mut self) -> LabelRef {
        let idx = self.labels.len() as u32;
        self.labels.push(Label::Unpinned(Vec::new()));
        LabelRef(idx)
    }

    /// Allocates a label already pinned at `pc` (used for `loop` headers,
    /// whose target is known the moment the loop is entered).
    pub fn alloc_pinned(&mut self, pc: u32) -> LabelRef {
        let idx = self.labels.len() as u32;
        self.labels.push(Label::Pinned(pc));
        LabelRef(idx)
    }

    pub fn is_pinned(&self, label: LabelRef) -> bool {
        matches!(self.labels[label.0 as usize], Label::Pinned(_))
    }

    /// Registers a branch instruction's offset word as depending on
    /// `label`. If `label` is already pinned, the offset is computed and
    /// returned immediately so the caller can emit it directly instead of
    /// a placeholder.
    pub fn use_as_branch_target(
        &mut self,
        label: LabelRef,
        word_pos: usize,
        source_pc: u32,
    ) -> Option<i32> {
        match &mut self.labels[label.0 as usize] {
            Label::Pinned(pc) => Some(*pc as i32 - source_pc as i32),
            Label::Unpinned(users) => {
                users.push(PatchSite::BranchOffset { word_pos, source_pc });
                None
            }
        }
    }

    /// Registers a `br_table` entry as depending on `label`. If `label`
    /// is already pinned, the absolute target PC is returned immediately.
    pub fn use_as_br_table_target(
        &mut self,
        label: LabelRef,
        table: BrTableId,
        index: usize,
    ) -> Option<u32> {
        match &mut self.labels[label.0 as usize] {
            Label::Pinned(pc) => Some(*pc),
            Label::Unpinned(users) => {
                users.push(PatchSite::BrTableEntry { table, index });
                None
            }
        }
    }

    /// Pins `label` at `pc`, immediately applying every pending patch
    /// against `arena`.
    pub fn pin(&mut self, label: LabelRef, pc: u32, arena: &mut Arena) -> Result<(), TranslationError> {
        let slot = &mut self.labels[label.0 as usize];
        let users = match slot {
            Label::Pinned(_) => {
                return Err(TranslationError::new(TranslationErrorInner::InternalConsistency(
                    "label pinned twice",
                )))
            }
            Label::Unpinned(users) => std::mem::take(users),
        };
        *slot = Label::Pinned(pc);
        for user in users {
            match user {
                PatchSite::BranchOffset { word_pos, source_pc } => {
                    let offset = pc as i32 - source_pc as i32;
                    arena.patch_word(word_pos, offset as u32 as u64);
                }
                PatchSite::BrTableEntry { table, index } => {
                    arena.fill_br_table_entry(table, index, pc);
                }
            }
        }
        Ok(())
    }

    /// Called once translation of the function body is complete. Errors
    /// if any label was referenced but never pinned.
    pub fn finish(&self) -> Result<(), TranslationError> {
        for label in &self.labels {
            if let Label::Unpinned(users) = label {
                if !users.is_empty() {
                    return Err(TranslationError::new(TranslationErrorInner::DanglingLabel));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pinning_before_use_resolves_immediately() {
        let mut registry = LabelRegistry::new();
        let label = registry.alloc_pinned(10);
        let offset = registry.use_as_branch_target(label, 0, 5);
        assert_eq!(offset, Some(5));
    }

    #[test]
    fn pinning_after_use_patches_the_arena() {
        let mut arena = Arena::new();
        let word_pos = arena.push_words(&[0]);
        let mut registry = LabelRegistry::new();
        let label = registry.alloc_unpinned();
        assert_eq!(registry.use_as_branch_target(label, word_pos, 1), None);
        registry.pin(label, 20, &mut arena).unwrap();
        assert_eq!(arena.word_at(word_pos) as u32 as i32, 19);
    }

    #[test]
    fn br_table_entry_patched_with_absolute_pc() {
        let mut arena = Arena::new();
        let table = arena.alloc_br_table(2);
        let mut registry = LabelRegistry::new();
        let label = registry.alloc_unpinned();
        assert_eq!(registry.use_as_br_table_target(label, table, 0), None);
        registry.pin(label, 99, &mut arena).unwrap();
        let (_, tables) = arena.finish();
        assert_eq!(tables[table.0 as usize][0], 99);
    }

    #[test]
    fn double_pin_errors() {
        let mut arena = Arena::new();
        let mut registry = LabelRegistry::new();
        let label = registry.alloc_unpinned();
        registry.pin(label, 1, &mut arena).unwrap();
        assert!(registry.pin(label, 2, &mut arena).is_err());
    }

    #[test]
    fn unresolved_label_with_users_is_dangling() {
        let mut arena = Arena::new();
        let word_pos = arena.push_words(&[0]);
        let mut registry = LabelRegistry::new();
        let label = registry.alloc_unpinned();
        registry.use_as_branch_target(label, word_pos, 0);
        assert!(registry.finish().is_err());
    }
}
