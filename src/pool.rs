//! The per-function constant pool.
//!
//! Mirrors the dedup-by-map strategy of the `stack::consts` provider this
//! crate is modeled on: constants are interned by their raw 64-bit bit
//! pattern, so `1.0f32` and `1i32`'s low 32 bits never collide with
//! unrelated values of a different type (each slot is re-typed by the
//! instruction that reads it, not by the pool).

use std::collections::HashMap;

/// A fixed-capacity, append-only, dedup-by-bit-pattern constant pool.
///
/// Once [`ConstantPool::capacity`] is reached, further constants are not
/// rejected: callers fall back to inlining the value directly into the
/// instruction stream (`const32`/`const64`) instead of requesting a pool
/// slot. See [`ConstantPool::try_intern`].
#[derive(Debug, Default)]
pub struct ConstantPool {
    bits_to_slot: HashMap<u64, u16>,
    slots: Vec<u64>,
    capacity: u16,
}

impl ConstantPool {
    /// Creates an empty pool with the given capacity (see
    /// `StackLayout::constant_slot_size`).
    pub fn new(capacity: u16) -> Self {
        Self {
            bits_to_slot: HashMap::new(),
            slots: Vec::new(),
            capacity,
        }
    }

    /// The pool's fixed capacity.
    pub fn capacity(&self) -> u16 {
        self.capacity
    }

    /// The number of constants currently interned.
    pub fn len(&self) -> u16 {
        self.slots.len() as u16
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Interns `bits`, returning its pool slot index. Returns `None` if
    /// `bits` is not already interned and the pool is at capacity; the
    /// caller is expected to fall back to an inline constant in that case.
    pub fn try_intern(&mut self, bits: u64) -> Option<u16> {
        if let Some(&slot) = self.bits_to_slot.get(&bits) {
            return Some(slot);
        }
        if self.slots.len() >= self.capacity as usize {
            return None;
        }
        let slot = self.slots.len() as u16;
        self.slots.push(bits);
        self.bits_to_slot.insert(bits, slot);
        Some(slot)
    }

    /// Consumes the pool into its backing word buffer, in slot order, for
    /// embedding into an [`crate::instr::InstructionSequence`].
    pub fn into_words(self) -> Vec<u64> {
        self.slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedups_identical_bit_patterns() {
        let mut pool = ConstantPool::new(4);
        let a = pool.try_intern(42).unwrap();
        let b = pool.try_intern(42).unwrap();
        assert_eq!(a, b);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn distinct_bit_patterns_get_distinct_slots() {
        let mut pool = ConstantPool::new(4);
        let a = pool.try_intern(1).unwrap();
        let b = pool.try_intern(2).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn overflow_returns_none_without_evicting() {
        let mut pool = ConstantPool::new(2);
        pool.try_intern(1).unwrap();
        pool.try_intern(2).unwrap();
        assert_eq!(pool.try_intern(3), None);
        // Previously interned values remain available.
        assert_eq!(pool.try_intern(1), Some(0));
    }
}
