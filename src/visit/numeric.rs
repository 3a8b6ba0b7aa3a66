//! Maps a Wasm opcode's "shape" (its value type plus an opcode-agnostic
//! operation kind) onto the concrete [`UnaryOp`]/[`BinaryOp`]/[`ConversionOp`]
//! the generic `visitUnary`/`visitBinary`/`visitConversion` entry points
//! expect. A driving parser decodes e.g. `i32.add` into
//! `(ValueType::I32, BinaryKind::Add)` and looks up the concrete op here,
//! rather than this crate exposing one method per opcode.

use crate::instr::{BinaryOp, ConversionOp, Instruction, UnaryOp};
use crate::translator::FuncTranslator;
use crate::value::{ConstValue, ValueType};
use crate::visit::VisitResult;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UnaryKind {
    Eqz,
    Clz,
    Ctz,
    Popcnt,
    Abs,
    Neg,
    Ceil,
    Floor,
    Trunc,
    Nearest,
    Sqrt,
}

pub fn unary_op_for(ty: ValueType, kind: UnaryKind) -> Option<UnaryOp> {
    use UnaryKind::*;
    use ValueType::*;
    Some(match (ty, kind) {
        (I32, Eqz) => UnaryOp::I32Eqz,
        (I64, Eqz) => UnaryOp::I64Eqz,
        (I32, Clz) => UnaryOp::I32Clz,
        (I32, Ctz) => UnaryOp::I32Ctz,
        (I32, Popcnt) => UnaryOp::I32Popcnt,
        (I64, Clz) => UnaryOp::I64Clz,
        (I64, Ctz) => UnaryOp::I64Ctz,
        (I64, Popcnt) => UnaryOp::I64Popcnt,
        (F32, Abs) => UnaryOp::F32Abs,
        (F32, Neg) => UnaryOp::F32Neg,
        (F32, Ceil) => UnaryOp::F32Ceil,
        (F32, Floor) => UnaryOp::F32Floor,
        (F32, Trunc) => UnaryOp::F32Trunc,
        (F32, Nearest) => UnaryOp::F32Nearest,
        (F32, Sqrt) => UnaryOp::F32Sqrt,
        (F64, Abs) => UnaryOp::F64Abs,
        (F64, Neg) => UnaryOp::F64Neg,
        (F64, Ceil) => UnaryOp::F64Ceil,
        (F64, Floor) => UnaryOp::F64Floor,
        (F64, Trunc) => UnaryOp::F64Trunc,
        (F64, Nearest) => UnaryOp::F64Nearest,
        (F64, Sqrt) => UnaryOp::F64Sqrt,
        _ => return None,
    })
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BinaryKind {
    Add,
    Sub,
    Mul,
    DivS,
    DivU,
    RemS,
    RemU,
    And,
    Or,
    Xor,
    Shl,
    ShrS,
    ShrU,
    Rotl,
    Rotr,
    Eq,
    Ne,
    LtS,
    LtU,
    GtS,
    GtU,
    LeS,
    LeU,
    GeS,
    GeU,
    /// Float division; floats have no signed/unsigned split.
    Div,
    Min,
    Max,
    Copysign,
    /// Float comparisons; floats have no signed/unsigned split.
    Lt,
    Gt,
    Le,
    Ge,
}

pub fn binary_op_for(ty: ValueType, kind: BinaryKind) -> Option<BinaryOp> {
    use BinaryKind::*;
    use ValueType::*;
    Some(match (ty, kind) {
        (I32, Add) => BinaryOp::I32Add,
        (I32, Sub) => BinaryOp::I32Sub,
        (I32, Mul) => BinaryOp::I32Mul,
        (I32, DivS) => BinaryOp::I32DivS,
        (I32, DivU) => BinaryOp::I32DivU,
        (I32, RemS) => BinaryOp::I32RemS,
        (I32, RemU) => BinaryOp::I32RemU,
        (I32, And) => BinaryOp::I32And,
        (I32, Or) => BinaryOp::I32Or,
        (I32, Xor) => BinaryOp::I32Xor,
        (I32, Shl) => BinaryOp::I32Shl,
        (I32, ShrS) => BinaryOp::I32ShrS,
        (I32, ShrU) => BinaryOp::I32ShrU,
        (I32, Rotl) => BinaryOp::I32Rotl,
        (I32, Rotr) => BinaryOp::I32Rotr,
        (I32, Eq) => BinaryOp::I32Eq,
        (I32, Ne) => BinaryOp::I32Ne,
        (I32, LtS) => BinaryOp::I32LtS,
        (I32, LtU) => BinaryOp::I32LtU,
        (I32, GtS) => BinaryOp::I32GtS,
        (I32, GtU) => BinaryOp::I32GtU,
        (I32, LeS) => BinaryOp::I32LeS,
        (I32, LeU) => BinaryOp::I32LeU,
        (I32, GeS) => BinaryOp::I32GeS,
        (I32, GeU) => BinaryOp::I32GeU,
        (I64, Add) => BinaryOp::I64Add,
        (I64, Sub) => BinaryOp::I64Sub,
        (I64, Mul) => BinaryOp::I64Mul,
        (I64, DivS) => BinaryOp::I64DivS,
        (I64, DivU) => BinaryOp::I64DivU,
        (I64, RemS) => BinaryOp::I64RemS,
        (I64, RemU) => BinaryOp::I64RemU,
        (I64, And) => BinaryOp::I64And,
        (I64, Or) => BinaryOp::I64Or,
        (I64, Xor) => BinaryOp::I64Xor,
        (I64, Shl) => BinaryOp::I64Shl,
        (I64, ShrS) => BinaryOp::I64ShrS,
        (I64, ShrU) => BinaryOp::I64ShrU,
        (I64, Rotl) => BinaryOp::I64Rotl,
        (I64, Rotr) => BinaryOp::I64Rotr,
        (I64, Eq) => BinaryOp::I64Eq,
        (I64, Ne) => BinaryOp::I64Ne,
        (I64, LtS) => BinaryOp::I64LtS,
        (I64, LtU) => BinaryOp::I64LtU,
        (I64, GtS) => BinaryOp::I64GtS,
        (I64, GtU) => BinaryOp::I64GtU,
        (I64, LeS) => BinaryOp::I64LeS,
        (I64, LeU) => BinaryOp::I64LeU,
        (I64, GeS) => BinaryOp::I64GeS,
        (I64, GeU) => BinaryOp::I64GeU,
        (F32, Add) => BinaryOp::F32Add,
        (F32, Sub) => BinaryOp::F32Sub,
        (F32, Mul) => BinaryOp::F32Mul,
        (F32, Div) => BinaryOp::F32Div,
        (F32, Min) => BinaryOp::F32Min,
        (F32, Max) => BinaryOp::F32Max,
        (F32, Copysign) => BinaryOp::F32Copysign,
        (F32, Eq) => BinaryOp::F32Eq,
        (F32, Ne) => BinaryOp::F32Ne,
        (F32, Lt) => BinaryOp::F32Lt,
        (F32, Gt) => BinaryOp::F32Gt,
        (F32, Le) => BinaryOp::F32Le,
        (F32, Ge) => BinaryOp::F32Ge,
        (F64, Add) => BinaryOp::F64Add,
        (F64, Sub) => BinaryOp::F64Sub,
        (F64, Mul) => BinaryOp::F64Mul,
        (F64, Div) => BinaryOp::F64Div,
        (F64, Min) => BinaryOp::F64Min,
        (F64, Max) => BinaryOp::F64Max,
        (F64, Copysign) => BinaryOp::F64Copysign,
        (F64, Eq) => BinaryOp::F64Eq,
        (F64, Ne) => BinaryOp::F64Ne,
        (F64, Lt) => BinaryOp::F64Lt,
        (F64, Gt) => BinaryOp::F64Gt,
        (F64, Le) => BinaryOp::F64Le,
        (F64, Ge) => BinaryOp::F64Ge,
        _ => return None,
    })
}

/// `i32.eqz`/`i64.eqz` are the only unary ops whose result type differs
/// from their input type: both produce an `i32` boolean.
fn unary_result_type(ty: ValueType, op: UnaryOp) -> ValueType {
    match op {
        UnaryOp::I32Eqz | UnaryOp::I64Eqz => ValueType::I32,
        _ => ty,
    }
}

/// Comparison ops produce an `i32` boolean regardless of operand type;
/// every other binary op produces a result of the operand type.
fn binary_result_type(ty: ValueType, op: BinaryOp) -> ValueType {
    use BinaryOp::*;
    match op {
        I32Eq | I32Ne | I32LtS | I32LtU | I32GtS | I32GtU | I32LeS | I32LeU | I32GeS | I32GeU
        | I64Eq | I64Ne | I64LtS | I64LtU | I64GtS | I64GtU | I64LeS | I64LeU | I64GeS | I64GeU
        | F32Eq | F32Ne | F32Lt | F32Gt | F32Le | F32Ge
        | F64Eq | F64Ne | F64Lt | F64Gt | F64Le | F64Ge => ValueType::I32,
        _ => ty,
    }
}

/// The input and output type of a [`ConversionOp`].
pub fn conversion_op_for(op: ConversionOp) -> (ValueType, ValueType) {
    use ConversionOp::*;
    use ValueType::*;
    match op {
        I32WrapI64 => (I64, I32),
        I32TruncF32S | I32TruncF32U | I32TruncSatF32S | I32TruncSatF32U => (F32, I32),
        I32TruncF64S | I32TruncF64U | I32TruncSatF64S | I32TruncSatF64U => (F64, I32),
        I64ExtendI32S | I64ExtendI32U => (I32, I64),
        I64TruncF32S | I64TruncF32U | I64TruncSatF32S | I64TruncSatF32U => (F32, I64),
        I64TruncF64S | I64TruncF64U | I64TruncSatF64S | I64TruncSatF64U => (F64, I64),
        F32ConvertI32S | F32ConvertI32U => (I32, F32),
        F32ConvertI64S | F32ConvertI64U => (I64, F32),
        F64ConvertI32S | F64ConvertI32U => (I32, F64),
        F64ConvertI64S | F64ConvertI64U => (I64, F64),
        F32DemoteF64 => (F64, F32),
        F64PromoteF32 => (F32, F64),
        I32ReinterpretF32 => (F32, I32),
        I64ReinterpretF64 => (F64, I64),
        F32ReinterpretI32 => (I32, F32),
        F64ReinterpretI64 => (I64, F64),
        I32Extend8S | I32Extend16S => (I32, I32),
        I64Extend8S | I64Extend16S | I64Extend32S => (I64, I64),
    }
}

impl<'m> FuncTranslator<'m> {
    pub(crate) fn do_const(&mut self, value: ConstValue) -> VisitResult {
        self.values_mut().push_const(value);
        Ok(())
    }

    pub(crate) fn do_unary(&mut self, ty: ValueType, op: UnaryOp) -> VisitResult {
        let input = self.pop_value(ty)?;
        let result_ty = unary_result_type(ty, op);
        if !self.is_reachable() {
            self.push_result(result_ty);
            return Ok(());
        }
        let result = self.next_result_reg();
        self.encoder_mut().emit(Instruction::Unary { op, result, input });
        self.push_result(result_ty);
        Ok(())
    }

    pub(crate) fn do_binary(&mut self, ty: ValueType, op: BinaryOp) -> VisitResult {
        let rhs = self.pop_value(ty)?;
        let lhs = self.pop_value(ty)?;
        let result_ty = binary_result_type(ty, op);
        if !self.is_reachable() {
            self.push_result(result_ty);
            return Ok(());
        }
        let result = self.next_result_reg();
        self.encoder_mut().emit(Instruction::Binary { op, result, lhs, rhs });
        self.push_result(result_ty);
        Ok(())
    }

    pub(crate) fn do_conversion(&mut self, op: ConversionOp) -> VisitResult {
        let (input_ty, output_ty) = conversion_op_for(op);
        let input = self.pop_value(input_ty)?;
        if !self.is_reachable() {
            self.push_result(output_ty);
            return Ok(());
        }
        let result = self.next_result_reg();
        self.encoder_mut().emit(Instruction::Conversion { op, result, input });
        self.push_result(output_ty);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{EngineConfig, FuncIdx, SimpleModule};
    use crate::value::FuncType;

    fn translator(module: &SimpleModule, interner: &mut crate::module::DedupFuncTypeInterner) -> FuncTranslator<'_> {
        let func_type = FuncType::new([], []);
        FuncTranslator::new(module, interner, EngineConfig::default(), FuncIdx::from_u32(0), func_type, &[], 0).unwrap()
    }

    #[test]
    fn do_binary_comparison_pushes_i32_result() {
        let module = SimpleModule::new();
        let mut interner = crate::module::DedupFuncTypeInterner::default();
        let mut t = translator(&module, &mut interner);
        t.values_mut().push_const(ConstValue::F64(1.0));
        t.values_mut().push_const(ConstValue::F64(2.0));
        t.do_binary(ValueType::F64, BinaryOp::F64Lt).unwrap();
        assert_eq!(t.values_mut().peek(0).unwrap().value_type(), ValueType::I32);
    }

    #[test]
    fn do_unary_eqz_pushes_i32_result() {
        let module = SimpleModule::new();
        let mut interner = crate::module::DedupFuncTypeInterner::default();
        let mut t = translator(&module, &mut interner);
        t.values_mut().push_const(ConstValue::I64(0));
        t.do_unary(ValueType::I64, UnaryOp::I64Eqz).unwrap();
        assert_eq!(t.values_mut().peek(0).unwrap().value_type(), ValueType::I32);
    }

    #[test]
    fn unary_rejects_mismatched_type() {
        assert_eq!(unary_op_for(ValueType::I32, UnaryKind::Sqrt), None);
        assert_eq!(unary_op_for(ValueType::F32, UnaryKind::Sqrt), Some(UnaryOp::F32Sqrt));
    }

    #[test]
    fn binary_float_has_no_signed_variant() {
        assert_eq!(binary_op_for(ValueType::F32, BinaryKind::DivS), None);
        assert_eq!(binary_op_for(ValueType::F32, BinaryKind::Div), Some(BinaryOp::F32Div));
    }

    #[test]
    fn conversion_types_round_trip_i64_extend_i32() {
        assert_eq!(conversion_op_for(ConversionOp::I64ExtendI32S), (ValueType::I32, ValueType::I64));
    }

    #[test]
    fn comparison_binary_op_always_produces_i32() {
        assert_eq!(binary_result_type(ValueType::F64, BinaryOp::F64Lt), ValueType::I32);
        assert_eq!(binary_result_type(ValueType::I64, BinaryOp::I64Add), ValueType::I64);
    }

    #[test]
    fn eqz_unary_op_produces_i32() {
        assert_eq!(unary_result_type(ValueType::I64, UnaryOp::I64Eqz), ValueType::I32);
        assert_eq!(unary_result_type(ValueType::F32, UnaryOp::F32Sqrt), ValueType::F32);
    }
}
