//! The conversion engine: `maybe_convert_value` emits IR converting a
//! top-of-stack value from one reflected type to another.

use walrus::ir::{BinaryOp, UnaryOp, Value};
use walrus::InstrSeqBuilder;
use wasmc_common::diagnostics::diagnostic_messages;
use wasmc_common::options::PointerSize;
use wasmc_common::{Diagnostic, DiagnosticBag, Span};
use wasmc_reflect::Type;

/// Convert the value on top of the builder's instruction stream from `from`
/// to `to`. If `explicit` is false and the conversion is not implicitly
/// safe, an *Illegal implicit conversion* error is reported but the IR is
/// still emitted so compilation can continue.
pub fn maybe_convert_value(
    builder: &mut InstrSeqBuilder,
    from: Type,
    to: Type,
    explicit: bool,
    uintptr_size: PointerSize,
    span: Span,
    file: &str,
    diagnostics: &mut DiagnosticBag,
) {
    if from == to {
        return;
    }

    if !explicit && !is_implicitly_safe(from, to, uintptr_size) {
        diagnostics.push(Diagnostic::new(
            diagnostic_messages::ILLEGAL_IMPLICIT_CONVERSION,
            file,
            span,
            &[from.keyword(), to.keyword()],
        ));
    } else if !explicit && warrants_pointer_width_warning(from, to, uintptr_size) {
        diagnostics.push(Diagnostic::new(
            diagnostic_messages::POINTER_WIDTH_NARROWING,
            file,
            span,
            &[from.keyword(), to.keyword()],
        ));
    }

    emit_conversion(builder, from, to);
}

fn emit_conversion(builder: &mut InstrSeqBuilder, from: Type, to: Type) {
    if from.is_float_family() {
        emit_from_float(builder, from, to);
        return;
    }
    if to.is_float_family() {
        emit_to_float(builder, from, to);
        return;
    }
    if from.is_long() && !to.is_long() {
        builder.unop(UnaryOp::I32WrapI64);
        narrow_int(builder, to);
        return;
    }
    if !from.is_long() && to.is_long() {
        if from.is_signed() && to.is_signed() {
            builder.unop(UnaryOp::I64ExtendSI32);
        } else {
            builder.unop(UnaryOp::I64ExtendUI32);
        }
        return;
    }
    // int-family to int-family, same width class: narrow/extend within i32.
    narrow_int(builder, to);
}

fn emit_from_float(builder: &mut InstrSeqBuilder, from: Type, to: Type) {
    let is_f32 = matches!(from, Type::Float);
    if to.is_float_family() {
        if is_f32 && matches!(to, Type::Double) {
            builder.unop(UnaryOp::F64PromoteF32);
        } else if !is_f32 && matches!(to, Type::Float) {
            builder.unop(UnaryOp::F32DemoteF64);
        }
        return;
    }
    if to.is_long() {
        let op = match (is_f32, to.is_signed()) {
            (true, true) => UnaryOp::I64TruncSF32,
            (true, false) => UnaryOp::I64TruncUF32,
            (false, true) => UnaryOp::I64TruncSF64,
            (false, false) => UnaryOp::I64TruncUF64,
        };
        builder.unop(op);
        return;
    }
    let op = match (is_f32, to.is_signed()) {
        (true, true) => UnaryOp::I32TruncSF32,
        (true, false) => UnaryOp::I32TruncUF32,
        (false, true) => UnaryOp::I32TruncSF64,
        (false, false) => UnaryOp::I32TruncUF64,
    };
    builder.unop(op);
    narrow_int(builder, to);
}

fn emit_to_float(builder: &mut InstrSeqBuilder, from: Type, to: Type) {
    let to_f32 = matches!(to, Type::Float);
    if from.is_long() {
        let op = match (from.is_signed(), to_f32) {
            (true, true) => UnaryOp::F32ConvertSI64,
            (false, true) => UnaryOp::F32ConvertUI64,
            (true, false) => UnaryOp::F64ConvertSI64,
            (false, false) => UnaryOp::F64ConvertUI64,
        };
        builder.unop(op);
        return;
    }
    let op = match (from.is_signed(), to_f32) {
        (true, true) => UnaryOp::F32ConvertSI32,
        (false, true) => UnaryOp::F32ConvertUI32,
        (true, false) => UnaryOp::F64ConvertSI32,
        (false, false) => UnaryOp::F64ConvertUI32,
    };
    builder.unop(op);
}

/// Narrow (or pass through) an i32-held value to `to`'s declared width.
/// Signed targets sign-extend via `shl`/`shr_s`; unsigned targets mask.
pub fn narrow_int(builder: &mut InstrSeqBuilder, to: Type) {
    let shift = to.shift32();
    if shift == 0 {
        return;
    }
    if to.is_signed() {
        builder
            .i32_const(shift as i32)
            .binop(BinaryOp::I32Shl)
            .i32_const(shift as i32)
            .binop(BinaryOp::I32ShrS);
    } else {
        builder.i32_const(to.mask32() as i32).binop(BinaryOp::I32And);
    }
}

fn is_implicitly_safe(from: Type, to: Type, _uintptr_size: PointerSize) -> bool {
    // Widening within the same family (no precision loss) is always safe.
    if from.is_float_family() && to.is_float_family() {
        return matches!(from, Type::Float) && matches!(to, Type::Double);
    }
    if !from.is_float_family() && !to.is_float_family() {
        if from.is_long() && !to.is_long() {
            return false;
        }
        if !from.is_long() && to.is_long() {
            // Widening int -> long is always implicitly legal: signed ->
            // ulong/uintptr64 reinterprets via extend_u rather than erroring,
            // it just warrants the separate pointer-width warning below.
            return true;
        }
        if from.is_long() && to.is_long() {
            return from.is_signed() == to.is_signed();
        }
        // int-family to int-family: safe only if not narrowing.
        return from.bitwidth_le(to);
    }
    false
}

fn warrants_pointer_width_warning(from: Type, to: Type, uintptr_size: PointerSize) -> bool {
    match (from, to) {
        (Type::Uintptr(_), Type::UInt) => uintptr_size == PointerSize::Wasm64,
        (Type::ULong, Type::Uintptr(_)) => uintptr_size == PointerSize::Wasm32,
        (Type::Long, Type::Uintptr(_)) => uintptr_size == PointerSize::Wasm32,
        // Widening a signed int-family value into ulong/uintptr64 is
        // `extend_u`, not `extend_s`: a negative source value reinterprets
        // as a large unsigned one, so it is accepted implicitly but flagged.
        (from, Type::ULong) if !from.is_long() && from.is_signed() => true,
        (from, Type::Uintptr(PointerSize::Wasm64)) if !from.is_long() && from.is_signed() => true,
        _ => false,
    }
}

/// Emit a constant of type `ty` onto the builder's stack.
pub fn emit_const(builder: &mut InstrSeqBuilder, ty: Type, value: f64) {
    match ty {
        Type::Float => {
            builder.const_(Value::F32(value as f32));
        }
        Type::Double => {
            builder.const_(Value::F64(value));
        }
        Type::Long | Type::ULong => {
            builder.const_(Value::I64(value as i64));
        }
        Type::Uintptr(PointerSize::Wasm64) => {
            builder.const_(Value::I64(value as i64));
        }
        _ => {
            builder.const_(Value::I32(value as i32));
        }
    }
}

trait BitwidthOrd {
    fn bitwidth_le(self, other: Type) -> bool;
}

impl BitwidthOrd for Type {
    fn bitwidth_le(self, other: Type) -> bool {
        fn rank(t: Type) -> u32 {
            match t {
                Type::Bool => 1,
                Type::SByte | Type::Byte => 8,
                Type::Short | Type::UShort => 16,
                _ => 32,
            }
        }
        rank(self) <= rank(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use walrus::{FunctionBuilder, ModuleConfig};

    fn fresh_builder() -> (walrus::Module, walrus::FunctionId) {
        let mut module = walrus::Module::with_config(ModuleConfig::new());
        let mut fb = FunctionBuilder::new(&mut module.types, &[], &[]);
        {
            let mut seq = fb.func_body();
            maybe_convert_value(
                &mut seq,
                Type::Byte,
                Type::Int,
                false,
                PointerSize::Wasm32,
                Span::at(0),
                "f",
                &mut DiagnosticBag::new(),
            );
        }
        let id = fb.finish(vec![], &mut module.funcs);
        (module, id)
    }

    #[test]
    fn widening_narrow_unsigned_to_int_is_implicitly_safe() {
        let mut diagnostics = DiagnosticBag::new();
        assert!(is_implicitly_safe(Type::Byte, Type::Int, PointerSize::Wasm32));
        let _ = fresh_builder();
        let _ = &mut diagnostics;
    }

    #[test]
    fn float_to_int_requires_explicit_cast() {
        assert!(!is_implicitly_safe(Type::Float, Type::Int, PointerSize::Wasm32));
    }

    #[test]
    fn uintptr_to_uint_warns_only_under_wasm64() {
        assert!(warrants_pointer_width_warning(
            Type::Uintptr(PointerSize::Wasm64),
            Type::UInt,
            PointerSize::Wasm64
        ));
        assert!(!warrants_pointer_width_warning(
            Type::Uintptr(PointerSize::Wasm32),
            Type::UInt,
            PointerSize::Wasm32
        ));
    }

    #[test]
    fn signed_int_to_long_is_safe_without_warning() {
        assert!(is_implicitly_safe(Type::Int, Type::Long, PointerSize::Wasm32));
        assert!(!warrants_pointer_width_warning(Type::Int, Type::Long, PointerSize::Wasm32));
    }

    #[test]
    fn signed_int_to_ulong_is_safe_but_warns() {
        assert!(is_implicitly_safe(Type::Int, Type::ULong, PointerSize::Wasm32));
        assert!(warrants_pointer_width_warning(Type::Int, Type::ULong, PointerSize::Wasm32));
    }

    #[test]
    fn signed_int_to_uintptr64_is_safe_but_warns() {
        assert!(is_implicitly_safe(Type::Int, Type::Uintptr(PointerSize::Wasm64), PointerSize::Wasm64));
        assert!(warrants_pointer_width_warning(Type::Int, Type::Uintptr(PointerSize::Wasm64), PointerSize::Wasm64));
    }

    #[test]
    fn emit_conversion_chooses_extend_u_for_signed_to_ulong() {
        use walrus::ir::{Instr, UnaryOp as WUnaryOp};
        let mut module = walrus::Module::with_config(ModuleConfig::new());
        let mut fb = FunctionBuilder::new(&mut module.types, &[], &[]);
        {
            let mut seq = fb.func_body();
            emit_conversion(&mut seq, Type::Int, Type::ULong);
        }
        let id = fb.finish(vec![], &mut module.funcs);
        let local = match &module.funcs.get(id).kind {
            walrus::FunctionKind::Local(local) => local,
            _ => unreachable!(),
        };
        let entry = local.entry_block();
        let matched = local.block(entry).instrs.iter().any(|(instr, _)| {
            matches!(instr, Instr::Unop(u) if u.op == WUnaryOp::I64ExtendUI32)
        });
        assert!(matched, "expected i64.extend_i32_u for signed int -> ulong");
    }

    #[test]
    fn narrow_int_masks_for_unsigned_targets() {
        use walrus::ir::{BinaryOp as WBinaryOp, Instr};
        let mut module = walrus::Module::with_config(ModuleConfig::new());
        let mut fb = FunctionBuilder::new(&mut module.types, &[], &[]);
        {
            let mut seq = fb.func_body();
            narrow_int(&mut seq, Type::Byte);
        }
        let id = fb.finish(vec![], &mut module.funcs);
        let local = match &module.funcs.get(id).kind {
            walrus::FunctionKind::Local(local) => local,
            _ => unreachable!(),
        };
        let entry = local.entry_block();
        let instrs = &local.block(entry).instrs;
        let has_and = instrs.iter().any(|(instr, _)| matches!(instr, Instr::Binop(b) if b.op == WBinaryOp::I32And));
        let has_shift = instrs.iter().any(|(instr, _)| matches!(instr, Instr::Binop(b) if b.op == WBinaryOp::I32ShrS));
        assert!(has_and, "expected i32.and mask for unsigned narrowing");
        assert!(!has_shift, "unsigned narrowing must not sign-extend");
    }

    #[test]
    fn narrow_int_sign_extends_for_signed_targets() {
        use walrus::ir::{BinaryOp as WBinaryOp, Instr};
        let mut module = walrus::Module::with_config(ModuleConfig::new());
        let mut fb = FunctionBuilder::new(&mut module.types, &[], &[]);
        {
            let mut seq = fb.func_body();
            narrow_int(&mut seq, Type::SByte);
        }
        let id = fb.finish(vec![], &mut module.funcs);
        let local = match &module.funcs.get(id).kind {
            walrus::FunctionKind::Local(local) => local,
            _ => unreachable!(),
        };
        let entry = local.entry_block();
        let instrs = &local.block(entry).instrs;
        let has_shl = instrs.iter().any(|(instr, _)| matches!(instr, Instr::Binop(b) if b.op == WBinaryOp::I32Shl));
        let has_shr_s = instrs.iter().any(|(instr, _)| matches!(instr, Instr::Binop(b) if b.op == WBinaryOp::I32ShrS));
        assert!(has_shl && has_shr_s, "expected shl/shr_s sign-extension pair for signed narrowing");
    }

    #[test]
    fn emit_conversion_chooses_extend_s_for_signed_to_long() {
        use walrus::ir::{Instr, UnaryOp as WUnaryOp};
        let mut module = walrus::Module::with_config(ModuleConfig::new());
        let mut fb = FunctionBuilder::new(&mut module.types, &[], &[]);
        {
            let mut seq = fb.func_body();
            emit_conversion(&mut seq, Type::Int, Type::Long);
        }
        let id = fb.finish(vec![], &mut module.funcs);
        let local = match &module.funcs.get(id).kind {
            walrus::FunctionKind::Local(local) => local,
            _ => unreachable!(),
        };
        let entry = local.entry_block();
        let matched = local.block(entry).instrs.iter().any(|(instr, _)| {
            matches!(instr, Instr::Unop(u) if u.op == WUnaryOp::I64ExtendSI32)
        });
        assert!(matched, "expected i64.extend_i32_s for signed int -> long");
    }
}
