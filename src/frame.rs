//! Frame-header and stack-layout register arithmetic.
//!
//! These are pure calculations shared by the translator and by the
//! textual dumper: they turn Wasm-level indices (the n-th parameter, the
//! n-th local, the n-th pooled constant) into [`VReg`] offsets relative to
//! the frame's stack pointer.

use crate::error::{TranslationError, TranslationErrorInner};
use crate::value::FuncType;

/// A register index relative to the current frame's stack pointer.
///
/// Negative indices address the frame header (params/results/saved
/// state); non-negative indices address locals, pooled constants, and the
/// operand-stack region.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VReg(i16);

impl VReg {
    /// Creates a new [`VReg`] from a raw `i16` offset.
    pub fn from_i16(index: i16) -> Self {
        Self(index)
    }

    /// Returns the raw `i16` offset of this [`VReg`].
    pub fn to_i16(self) -> i16 {
        self.0
    }
}

/// The layout of a function's frame header: the negative-offset region
/// that aliases parameters and results and holds the three saved slots.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FrameHeaderLayout {
    /// `max(|params|, |results|) + 3`.
    param_result_base: u16,
}

impl FrameHeaderLayout {
    /// The three trailing saved slots: caller Instance, PC, and SP.
    const SAVED_SLOTS: u16 = 3;

    /// Computes the [`FrameHeaderLayout`] for the given [`FuncType`].
    pub fn new(func_type: &FuncType) -> Result<Self, TranslationError> {
        let len_params = func_type.params().len() as u16;
        let len_results = func_type.results().len() as u16;
        let param_result_base = len_params
            .max(len_results)
            .checked_add(Self::SAVED_SLOTS)
            .ok_or_else(|| TranslationError::new(TranslationErrorInner::TooManyRegisters))?;
        Ok(Self { param_result_base })
    }

    /// The total size, in registers, of the frame header for a callee with
    /// this layout (used by callers to compute `spAddend`).
    pub fn size(&self) -> u16 {
        self.param_result_base
    }

    /// Returns the [`VReg`] of the `i`-th parameter.
    pub fn param_reg(&self, i: u32) -> VReg {
        VReg::from_i16(i as i16 - self.param_result_base as i16)
    }

    /// Returns the [`VReg`] of the `i`-th result.
    pub fn return_reg(&self, i: u32) -> VReg {
        VReg::from_i16(i as i16 - self.param_result_base as i16)
    }
}

/// The layout of the locals/constants/operand-stack region of a frame,
/// derived from the function's type, its local count, and its Wasm code
/// size.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StackLayout {
    header: FrameHeaderLayout,
    num_params: u16,
    num_locals: u16,
    constant_slot_size: u16,
    stack_reg_base: u16,
}

impl StackLayout {
    /// The minimum constant pool capacity, regardless of code size.
    const MIN_CONST_SLOTS: u32 = 4;
    /// The divisor in the `codeSize / 20` heuristic.
    const CONST_SLOT_DIVISOR: u32 = 20;

    /// Derives a [`StackLayout`] from the function's type, its number of
    /// locals (including parameters), and the byte size of its Wasm code.
    pub fn new(
        func_type: &FuncType,
        num_locals: u32,
        code_size: u32,
    ) -> Result<Self, TranslationError> {
        let header = FrameHeaderLayout::new(func_type)?;
        let num_params = func_type.params().len() as u32;
        let constant_slot_size = (code_size / Self::CONST_SLOT_DIVISOR).max(Self::MIN_CONST_SLOTS);
        let stack_reg_base_u32 = num_locals
            .checked_add(constant_slot_size)
            .ok_or_else(|| TranslationError::new(TranslationErrorInner::ConstSlotOverflow))?;
        if stack_reg_base_u32 > i16::MAX as u32 {
            return Err(TranslationError::new(TranslationErrorInner::ConstSlotOverflow));
        }
        Ok(Self {
            header,
            num_params: num_params as u16,
            num_locals: num_locals as u16,
            constant_slot_size: constant_slot_size as u16,
            stack_reg_base: stack_reg_base_u32 as u16,
        })
    }

    /// Returns the [`FrameHeaderLayout`] of this function.
    pub fn header(&self) -> FrameHeaderLayout {
        self.header
    }

    /// The capacity of the constant pool for this function.
    pub fn constant_slot_size(&self) -> u16 {
        self.constant_slot_size
    }

    /// The first [`VReg`] of the operand-stack region.
    pub fn stack_reg_base(&self) -> u16 {
        self.stack_reg_base
    }

    /// Returns the [`VReg`] of the `i`-th local (which may alias a
    /// parameter register).
    pub fn local_reg(&self, i: u32) -> VReg {
        if i < self.num_params as u32 {
            self.header.param_reg(i)
        } else {
            VReg::from_i16((i - self.num_params as u32) as i16)
        }
    }

    /// Returns the [`VReg`] of the `i`-th pooled constant.
    pub fn const_reg(&self, i: u16) -> VReg {
        VReg::from_i16(self.num_locals as i16 + i as i16)
    }

    /// Returns the [`VReg`] for an operand-stack slot at the given
    /// zero-based `position` within the operand stack region.
    pub fn stack_reg(&self, position: u16) -> VReg {
        VReg::from_i16(self.stack_reg_base as i16 + position as i16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueType;

    fn func_type(params: &[ValueType], results: &[ValueType]) -> FuncType {
        FuncType::new(params.to_vec(), results.to_vec())
    }

    #[test]
    fn header_base_is_max_plus_three() {
        let ft = func_type(&[ValueType::I32, ValueType::I32], &[ValueType::I32]);
        let header = FrameHeaderLayout::new(&ft).unwrap();
        assert_eq!(header.size(), 2 + 3);
        assert_eq!(header.param_reg(0).to_i16(), -5);
        assert_eq!(header.param_reg(1).to_i16(), -4);
        assert_eq!(header.return_reg(0).to_i16(), -5);
    }

    #[test]
    fn stack_layout_heuristic_has_floor() {
        let ft = func_type(&[ValueType::I32], &[ValueType::I32]);
        let layout = StackLayout::new(&ft, 1, 10).unwrap();
        assert_eq!(layout.constant_slot_size(), 4);
        assert_eq!(layout.stack_reg_base(), 1 + 4);
    }

    #[test]
    fn stack_layout_uses_code_size_when_larger() {
        let ft = func_type(&[], &[]);
        let layout = StackLayout::new(&ft, 0, 400).unwrap();
        assert_eq!(layout.constant_slot_size(), 20);
    }

    #[test]
    fn local_reg_aliases_params() {
        let ft = func_type(&[ValueType::I32], &[]);
        let layout = StackLayout::new(&ft, 2, 0).unwrap();
        assert_eq!(layout.local_reg(0), layout.header().param_reg(0));
        assert_eq!(layout.local_reg(1).to_i16(), 0);
    }
}
