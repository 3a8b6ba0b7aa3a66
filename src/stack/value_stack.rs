//! A symbolic mirror of the Wasm operand stack.
//!
//! Every logical stack slot has a fixed physical home register
//! (`layout.stack_reg(position)`), but most values never actually occupy
//! it: a plain `local.get` pushes a reference to the local's own
//! register, and a `T.const` pushes a reference into the constant pool.
//! Reading an operand resolves it to a [`crate::frame::VReg`] on demand,
//! materializing into the home slot only when the provenance can't be
//! used directly (pool overflow, or an upcoming mutation the value must
//! survive).

use crate::builder::InstrEncoder;
use crate::error::{TranslationError, TranslationErrorInner};
use crate::frame::{StackLayout, VReg};
use crate::instr::Instruction;
use crate::value::{ConstValue, ValueType};

/// Where a [`MetaValue`]'s runtime content currently lives.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ValueSource {
    /// An alias of the `i`-th Wasm local (by index into the function's
    /// full local list, including parameters).
    Local(u32),
    /// A literal constant, not yet necessarily materialized anywhere.
    Const(ConstValue),
    /// Already materialized in its home stack register.
    Stack,
}

/// One entry of the symbolic value stack.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MetaValue {
    ty: ValueType,
    source: ValueSource,
}

impl MetaValue {
    pub fn value_type(&self) -> ValueType {
        self.ty
    }

    pub fn source(&self) -> ValueSource {
        self.source
    }
}

/// The symbolic operand stack for the function currently being
/// translated.
#[derive(Debug, Default)]
pub struct ValueStack {
    values: Vec<MetaValue>,
    max_height: u16,
}

impl ValueStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current logical height (number of values on the stack).
    pub fn height(&self) -> u16 {
        self.values.len() as u16
    }

    /// The highest height reached so far, used to size the operand-stack
    /// region of the frame.
    pub fn max_height(&self) -> u16 {
        self.max_height
    }

    fn track_height(&mut self) {
        self.max_height = self.max_height.max(self.values.len() as u16);
    }

    /// Pushes a value with arbitrary provenance.
    pub fn push(&mut self, ty: ValueType, source: ValueSource) {
        self.values.push(MetaValue { ty, source });
        self.track_height();
    }

    /// Pushes an alias of the `local_idx`-th local.
    pub fn push_local(&mut self, ty: ValueType, local_idx: u32) {
        self.push(ty, ValueSource::Local(local_idx));
    }

    /// Pushes a literal constant.
    pub fn push_const(&mut self, value: ConstValue) {
        self.push(value.value_type(), ValueSource::Const(value));
    }

    /// Pushes a value already known to live in its home stack register
    /// (e.g. the result of an emitted instruction).
    pub fn push_stack(&mut self, ty: ValueType) {
        self.push(ty, ValueSource::Stack);
    }

    /// Looks at the value `depth` entries from the top (0 = topmost)
    /// without removing it.
    pub fn peek(&self, depth: u16) -> Result<&MetaValue, TranslationError> {
        let len = self.values.len();
        let idx = (depth as usize)
            .checked_add(1)
            .and_then(|d| len.checked_sub(d))
            .ok_or_else(|| TranslationError::new(TranslationErrorInner::StackUnderflow))?;
        Ok(&self.values[idx])
    }

    /// Pops the topmost value.
    pub fn pop(&mut self) -> Result<MetaValue, TranslationError> {
        self.values
            .pop()
            .ok_or_else(|| TranslationError::new(TranslationErrorInner::StackUnderflow))
    }

    /// Pops the topmost value, checking it has type `expected`.
    pub fn pop_expect(&mut self, expected: ValueType) -> Result<MetaValue, TranslationError> {
        let value = self.pop()?;
        if value.ty != expected {
            return Err(TranslationError::new(TranslationErrorInner::TypeMismatch));
        }
        Ok(value)
    }

    /// Pops the topmost value, checking it is a reference type
    /// (`funcref`/`externref`).
    pub fn pop_ref(&mut self) -> Result<MetaValue, TranslationError> {
        let value = self.pop()?;
        if !value.ty.is_ref() {
            return Err(TranslationError::new(TranslationErrorInner::TypeMismatch));
        }
        Ok(value)
    }

    /// Truncates the stack to `new_height`, discarding everything above
    /// it. Used when restoring the stack to a control frame's expected
    /// height, e.g. after marking the remainder of a block unreachable.
    pub fn truncate(&mut self, new_height: u16) {
        self.values.truncate(new_height as usize);
    }

    /// The physical home register of the value at logical index `index`
    /// (0 = bottom of the stack).
    fn home_reg(layout: &StackLayout, index: usize) -> VReg {
        layout.stack_reg(index as u16)
    }

    /// Resolves the value at logical index `index` to a [`VReg`] usable
    /// directly as an instruction operand, materializing it into its
    /// home register first if necessary (constant-pool overflow).
    pub fn resolve(
        &mut self,
        index: usize,
        layout: &StackLayout,
        encoder: &mut InstrEncoder,
    ) -> VReg {
        let entry = &mut self.values[index];
        match entry.source {
            ValueSource::Stack => Self::home_reg(layout, index),
            ValueSource::Local(local_idx) => layout.local_reg(local_idx),
            ValueSource::Const(value) => {
                if let Some(slot) = encoder.pool_mut().try_intern(value.to_bits()) {
                    layout.const_reg(slot)
                } else {
                    let dst = Self::home_reg(layout, index);
                    emit_const(encoder, dst, value);
                    entry.source = ValueSource::Stack;
                    dst
                }
            }
        }
    }

    /// Materializes every entry aliasing local `local_idx` into its home
    /// stack register, e.g. before `local.set`/`local.tee` overwrites it.
    pub fn preserve_local_on_stack(
        &mut self,
        local_idx: u32,
        layout: &StackLayout,
        encoder: &mut InstrEncoder,
    ) {
        for i in 0..self.values.len() {
            if self.values[i].source == ValueSource::Local(local_idx) {
                let dst = Self::home_reg(layout, i);
                let src = layout.local_reg(local_idx);
                encoder.emit(Instruction::Copy { dst, src });
                self.values[i].source = ValueSource::Stack;
            }
        }
    }

    /// Materializes every local-aliasing entry, regardless of which
    /// local it references. Used at control-flow join points (loop
    /// headers) where back-edges make per-local tracking unsound.
    pub fn preserve_all_locals_on_stack(&mut self, layout: &StackLayout, encoder: &mut InstrEncoder) {
        for i in 0..self.values.len() {
            if let ValueSource::Local(local_idx) = self.values[i].source {
                let dst = Self::home_reg(layout, i);
                let src = layout.local_reg(local_idx);
                encoder.emit(Instruction::Copy { dst, src });
                self.values[i].source = ValueSource::Stack;
            }
        }
    }

    /// Materializes every constant-sourced entry into its home stack
    /// register, even ones already holding a pool slot. Used where a
    /// consumer reads the stack region positionally and has no notion of
    /// the constant pool (e.g. a generic frame-copy routine at a loop
    /// header).
    pub fn preserve_consts_on_stack(&mut self, layout: &StackLayout, encoder: &mut InstrEncoder) {
        for i in 0..self.values.len() {
            if let ValueSource::Const(value) = self.values[i].source {
                let dst = Self::home_reg(layout, i);
                emit_const(encoder, dst, value);
                self.values[i].source = ValueSource::Stack;
            }
        }
    }
}

fn emit_const(encoder: &mut InstrEncoder, dst: VReg, value: ConstValue) {
    if value.is_32_bit() {
        encoder.emit(Instruction::Const32 { dst, value: value.to_bits() as u32 });
    } else {
        encoder.emit(Instruction::Const64 { dst, value: value.to_bits() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ThreadingModel;
    use crate::value::FuncType;

    fn layout() -> StackLayout {
        let ft = FuncType::new([], []);
        StackLayout::new(&ft, 2, 10).unwrap()
    }

    #[test]
    fn push_pop_round_trips_type() {
        let mut stack = ValueStack::new();
        stack.push_local(ValueType::I32, 0);
        let v = stack.pop_expect(ValueType::I32).unwrap();
        assert_eq!(v.value_type(), ValueType::I32);
    }

    #[test]
    fn pop_expect_mismatch_errors() {
        let mut stack = ValueStack::new();
        stack.push_local(ValueType::I32, 0);
        assert!(stack.pop_expect(ValueType::I64).is_err());
    }

    #[test]
    fn max_height_tracks_peak_not_current() {
        let mut stack = ValueStack::new();
        stack.push_local(ValueType::I32, 0);
        stack.push_local(ValueType::I32, 1);
        stack.pop().unwrap();
        assert_eq!(stack.height(), 1);
        assert_eq!(stack.max_height(), 2);
    }

    #[test]
    fn resolve_local_needs_no_emission() {
        let layout = layout();
        let mut encoder = InstrEncoder::new(4, ThreadingModel::Direct);
        let mut stack = ValueStack::new();
        stack.push_local(ValueType::I32, 0);
        let reg = stack.resolve(0, &layout, &mut encoder);
        assert_eq!(reg, layout.local_reg(0));
        assert_eq!(encoder.position(), 0);
    }

    #[test]
    fn resolve_const_overflow_materializes_onto_home_slot() {
        let layout = layout();
        let mut encoder = InstrEncoder::new(0, ThreadingModel::Direct);
        let mut stack = ValueStack::new();
        stack.push_const(ConstValue::I32(7));
        let reg = stack.resolve(0, &layout, &mut encoder);
        assert_eq!(reg, layout.stack_reg(0));
        assert!(encoder.position() > 0);
    }

    #[test]
    fn preserve_local_on_stack_materializes_matching_entries_only() {
        let layout = layout();
        let mut encoder = InstrEncoder::new(4, ThreadingModel::Direct);
        let mut stack = ValueStack::new();
        stack.push_local(ValueType::I32, 0);
        stack.push_local(ValueType::I32, 1);
        stack.preserve_local_on_stack(0, &layout, &mut encoder);
        assert_eq!(stack.peek(1).unwrap().source(), ValueSource::Stack);
        assert_eq!(stack.peek(0).unwrap().source(), ValueSource::Local(1));
    }
}
