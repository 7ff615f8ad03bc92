//! Expression lowering: translates `wasmc_ast::Expr` into `walrus` IR,
//! returning the reflected [`Type`] of the expression so callers can chain
//! conversions.

use rustc_hash::FxHashMap;
use walrus::ir::{BinaryOp as WBinaryOp, InstrSeqType, Value};
use walrus::{FunctionId, InstrSeqBuilder, LocalId, ModuleLocals};
use wasmc_ast::{BinaryOp, Expr, Literal, TypeNode, UnaryOp};
use wasmc_common::diagnostics::diagnostic_messages;
use wasmc_common::options::PointerSize;
use wasmc_common::{parse_numeric_literal_value, Diagnostic, DiagnosticBag};
use wasmc_reflect::{resolve_type_node, ConstValue, Module as ReflectModule, Type};

use crate::context::FunctionContext;
use crate::conversion::{emit_const, maybe_convert_value, narrow_int};
use crate::module_builder::val_type_of;

/// Shared, mutable references every expression lowerer needs. Bundled to
/// keep `lower_expr`'s signature from growing with every new feature.
pub struct ExprLowerCtx<'a> {
    pub reflect: &'a ReflectModule,
    pub function_ids: &'a FxHashMap<String, FunctionId>,
    pub global_ids: &'a FxHashMap<String, walrus::GlobalId>,
    pub malloc_fn: Option<FunctionId>,
    pub memory: walrus::MemoryId,
    pub uintptr_size: PointerSize,
    pub file: &'a str,
    pub diagnostics: &'a mut DiagnosticBag,
    pub locals: &'a mut ModuleLocals,
}

pub fn lower_expr(builder: &mut InstrSeqBuilder, expr: &Expr, fctx: &mut FunctionContext, lctx: &mut ExprLowerCtx) -> Type {
    match expr {
        Expr::Literal(lit, span) => lower_literal(builder, lit, *span, lctx),
        Expr::Identifier(name, span) => lower_identifier(builder, name, *span, fctx, lctx),
        Expr::Paren(inner, _) => lower_expr(builder, inner, fctx, lctx),
        Expr::Cast { expr: inner, ty, span } => {
            let target = resolve_type_node(ty, false, lctx.uintptr_size, lctx.reflect, lctx.file, lctx.diagnostics);
            let from = lower_expr(builder, inner, fctx, lctx);
            maybe_convert_value(builder, from, target, true, lctx.uintptr_size, *span, lctx.file, lctx.diagnostics);
            target
        }
        Expr::Unary { op, operand, span } => lower_unary(builder, *op, operand, *span, fctx, lctx),
        Expr::Binary { op, left, right, span } => lower_binary(builder, *op, left, right, *span, fctx, lctx),
        Expr::Assign { target, value, span } => lower_assign(builder, target, value, *span, fctx, lctx),
        Expr::Conditional { cond, then_expr, else_expr, span } => {
            lower_conditional(builder, cond, then_expr, else_expr, *span, fctx, lctx)
        }
        Expr::Call { callee, args, type_args, span } => lower_call(builder, callee, args, type_args, *span, fctx, lctx),
        Expr::New { class_name, args, type_args, span } => lower_new(builder, class_name, args, type_args, *span, fctx, lctx),
        Expr::Property { base, name, span } => lower_property(builder, base, name, *span, fctx, lctx),
        Expr::Element { base, index, span } => lower_element(builder, base, index, *span, fctx, lctx),
    }
}

fn lower_literal(builder: &mut InstrSeqBuilder, lit: &Literal, span: wasmc_common::Span, lctx: &mut ExprLowerCtx) -> Type {
    match lit {
        Literal::Bool(b) => {
            builder.const_(Value::I32(if *b { 1 } else { 0 }));
            Type::Bool
        }
        Literal::Null => {
            emit_const(builder, Type::Uintptr(lctx.uintptr_size), 0.0);
            Type::Uintptr(lctx.uintptr_size)
        }
        Literal::Number(text) => {
            let value = parse_numeric_literal_value(text).unwrap_or_else(|| {
                lctx.diagnostics.push(Diagnostic::new(
                    diagnostic_messages::UNSUPPORTED_EXPRESSION,
                    lctx.file,
                    span,
                    &["malformed numeric literal"],
                ));
                0.0
            });
            let ty = if text.contains('.') { Type::Double } else { Type::Int };
            emit_const(builder, ty, value);
            ty
        }
    }
}

fn lower_identifier(
    builder: &mut InstrSeqBuilder,
    name: &str,
    span: wasmc_common::Span,
    fctx: &mut FunctionContext,
    lctx: &mut ExprLowerCtx,
) -> Type {
    if let Some((variable, local_id)) = fctx.lookup(name) {
        let ty = variable.ty;
        builder.local_get(*local_id);
        return ty;
    }
    if let Some(global) = lctx.reflect.globals.get(name) {
        let ty = global.ty;
        if let Some(&global_id) = lctx.global_ids.get(name) {
            builder.global_get(global_id);
        } else {
            builder.unreachable();
        }
        return ty;
    }
    lctx.diagnostics.push(Diagnostic::new(
        diagnostic_messages::UNDEFINED_LOCAL_VARIABLE,
        lctx.file,
        span,
        &[name],
    ));
    builder.unreachable();
    Type::Void
}

fn lower_unary(
    builder: &mut InstrSeqBuilder,
    op: UnaryOp,
    operand: &Expr,
    span: wasmc_common::Span,
    fctx: &mut FunctionContext,
    lctx: &mut ExprLowerCtx,
) -> Type {
    match op {
        UnaryOp::Plus => lower_expr(builder, operand, fctx, lctx),
        UnaryOp::Not => {
            let ty = lower_expr(builder, operand, fctx, lctx);
            emit_zero_test(builder, ty);
            Type::Bool
        }
        UnaryOp::Neg => {
            if let Expr::Literal(Literal::Number(text), _) = operand {
                // Fold literal negation instead of sub(const 0, const v).
                let value = parse_numeric_literal_value(text).unwrap_or(0.0);
                let ty = if text.contains('.') { Type::Double } else { Type::Int };
                emit_const(builder, ty, -value);
                return ty;
            }
            let ty = lower_expr(builder, operand, fctx, lctx);
            emit_negate(builder, ty);
            ty
        }
        UnaryOp::BitNot => {
            let ty = lower_expr(builder, operand, fctx, lctx);
            let context_ty = if ty.is_long() { ty } else { Type::Int };
            if context_ty != ty {
                maybe_convert_value(builder, ty, context_ty, true, lctx.uintptr_size, span, lctx.file, lctx.diagnostics);
            }
            if context_ty.is_long() {
                builder.const_(Value::I64(-1)).binop(WBinaryOp::I64Xor);
            } else {
                builder.i32_const(-1).binop(WBinaryOp::I32Xor);
            }
            context_ty
        }
        UnaryOp::PreIncrement | UnaryOp::PreDecrement | UnaryOp::PostIncrement | UnaryOp::PostDecrement => {
            lower_increment(builder, op, operand, span, fctx, lctx)
        }
    }
}

fn emit_zero_test(builder: &mut InstrSeqBuilder, ty: Type) {
    use walrus::ir::UnaryOp as U;
    if ty.is_long() {
        builder.unop(U::I64Eqz);
    } else if matches!(ty, Type::Float) {
        builder.const_(Value::F32(0.0)).binop(WBinaryOp::F32Eq);
    } else if matches!(ty, Type::Double) {
        builder.const_(Value::F64(0.0)).binop(WBinaryOp::F64Eq);
    } else {
        builder.unop(U::I32Eqz);
    }
}

fn emit_negate(builder: &mut InstrSeqBuilder, ty: Type) {
    match ty {
        Type::Float => {
            builder.unop(walrus::ir::UnaryOp::F32Neg);
        }
        Type::Double => {
            builder.unop(walrus::ir::UnaryOp::F64Neg);
        }
        Type::Long | Type::ULong => {
            builder.const_(Value::I64(0)).binop(WBinaryOp::I64Sub);
        }
        _ => {
            builder.i32_const(0).binop(WBinaryOp::I32Sub);
        }
    }
}

fn lower_increment(
    builder: &mut InstrSeqBuilder,
    op: UnaryOp,
    operand: &Expr,
    span: wasmc_common::Span,
    fctx: &mut FunctionContext,
    lctx: &mut ExprLowerCtx,
) -> Type {
    let Expr::Identifier(name, _) = operand else {
        lctx.diagnostics.push(Diagnostic::new(
            diagnostic_messages::UNSUPPORTED_UNARY_OPERATOR,
            lctx.file,
            span,
            &["++/-- operand must be a local variable"],
        ));
        return lower_expr(builder, operand, fctx, lctx);
    };
    let Some((variable, local_id)) = fctx.lookup(name).cloned() else {
        lctx.diagnostics.push(Diagnostic::new(
            diagnostic_messages::UNDEFINED_LOCAL_VARIABLE,
            lctx.file,
            span,
            &[name.as_str()],
        ));
        builder.unreachable();
        return Type::Void;
    };
    let ty = variable.ty;
    let is_increment = matches!(op, UnaryOp::PreIncrement | UnaryOp::PostIncrement);
    let is_post = matches!(op, UnaryOp::PostIncrement | UnaryOp::PostDecrement);

    if is_post {
        builder.local_get(local_id);
    }
    builder.local_get(local_id);
    emit_const(builder, ty, 1.0);
    if ty.is_float_family() {
        builder.binop(if is_increment {
            if matches!(ty, Type::Float) { WBinaryOp::F32Add } else { WBinaryOp::F64Add }
        } else if matches!(ty, Type::Float) {
            WBinaryOp::F32Sub
        } else {
            WBinaryOp::F64Sub
        });
    } else if ty.is_long() {
        builder.binop(if is_increment { WBinaryOp::I64Add } else { WBinaryOp::I64Sub });
    } else {
        builder.binop(if is_increment { WBinaryOp::I32Add } else { WBinaryOp::I32Sub });
        narrow_int(builder, ty);
    }
    if is_post {
        builder.local_set(local_id);
    } else {
        builder.local_tee(local_id);
    }
    ty
}

fn numeric_rank(ty: Type) -> u8 {
    match ty {
        Type::Double => 4,
        Type::Float => 3,
        Type::Long | Type::ULong => 2,
        Type::Uintptr(PointerSize::Wasm64) => 2,
        _ => 1,
    }
}

fn wider_type(a: Type, b: Type) -> Type {
    if numeric_rank(b) > numeric_rank(a) {
        b
    } else {
        a
    }
}

fn lower_binary(
    builder: &mut InstrSeqBuilder,
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    span: wasmc_common::Span,
    fctx: &mut FunctionContext,
    lctx: &mut ExprLowerCtx,
) -> Type {
    if matches!(op, BinaryOp::LogicalAnd | BinaryOp::LogicalOr) {
        return lower_logical(builder, op, left, right, fctx, lctx);
    }

    // Evaluate left first to know its type before lowering right, matching
    // source evaluation order.
    let left_ty_probe = peek_type(left, fctx, lctx);
    let right_ty_probe = peek_type(right, fctx, lctx);
    let common = wider_type(left_ty_probe, right_ty_probe);

    let left_ty = lower_expr(builder, left, fctx, lctx);
    maybe_convert_value(builder, left_ty, common, true, lctx.uintptr_size, span, lctx.file, lctx.diagnostics);
    let right_ty = lower_expr(builder, right, fctx, lctx);
    maybe_convert_value(builder, right_ty, common, true, lctx.uintptr_size, span, lctx.file, lctx.diagnostics);

    emit_binary_op(builder, op, common);

    match op {
        BinaryOp::Lt | BinaryOp::Gt | BinaryOp::LtEq | BinaryOp::GtEq | BinaryOp::Eq | BinaryOp::NotEq => Type::Bool,
        _ => common,
    }
}

/// Determine an expression's natural type without emitting IR, used only to
/// pick the common width for a binary operation ahead of time. Falls back
/// to `Int` for anything not cheaply inferable without side effects.
fn peek_type(expr: &Expr, fctx: &FunctionContext, lctx: &ExprLowerCtx) -> Type {
    match expr {
        Expr::Literal(Literal::Number(text), _) => {
            if text.contains('.') {
                Type::Double
            } else {
                Type::Int
            }
        }
        Expr::Literal(Literal::Bool(_), _) => Type::Bool,
        Expr::Literal(Literal::Null, _) => Type::Uintptr(lctx.uintptr_size),
        Expr::Identifier(name, _) => fctx
            .lookup(name)
            .map(|(v, _)| v.ty)
            .or_else(|| lctx.reflect.globals.get(name).map(|g| g.ty))
            .unwrap_or(Type::Int),
        Expr::Paren(inner, _) => peek_type(inner, fctx, lctx),
        _ => Type::Int,
    }
}

fn emit_binary_op(builder: &mut InstrSeqBuilder, op: BinaryOp, ty: Type) {
    if ty.is_float_family() {
        let is_f32 = matches!(ty, Type::Float);
        let w = |f32_op: WBinaryOp, f64_op: WBinaryOp| if is_f32 { f32_op } else { f64_op };
        let wop = match op {
            BinaryOp::Add => w(WBinaryOp::F32Add, WBinaryOp::F64Add),
            BinaryOp::Sub => w(WBinaryOp::F32Sub, WBinaryOp::F64Sub),
            BinaryOp::Mul => w(WBinaryOp::F32Mul, WBinaryOp::F64Mul),
            BinaryOp::Div => w(WBinaryOp::F32Div, WBinaryOp::F64Div),
            BinaryOp::Lt => w(WBinaryOp::F32Lt, WBinaryOp::F64Lt),
            BinaryOp::Gt => w(WBinaryOp::F32Gt, WBinaryOp::F64Gt),
            BinaryOp::LtEq => w(WBinaryOp::F32Le, WBinaryOp::F64Le),
            BinaryOp::GtEq => w(WBinaryOp::F32Ge, WBinaryOp::F64Ge),
            BinaryOp::Eq => w(WBinaryOp::F32Eq, WBinaryOp::F64Eq),
            BinaryOp::NotEq => w(WBinaryOp::F32Ne, WBinaryOp::F64Ne),
            _ => w(WBinaryOp::F32Add, WBinaryOp::F64Add),
        };
        builder.binop(wop);
        return;
    }

    let is_i64 = ty.is_long();
    let signed = ty.is_signed();
    let wop = match (op, is_i64, signed) {
        (BinaryOp::Add, false, _) => WBinaryOp::I32Add,
        (BinaryOp::Add, true, _) => WBinaryOp::I64Add,
        (BinaryOp::Sub, false, _) => WBinaryOp::I32Sub,
        (BinaryOp::Sub, true, _) => WBinaryOp::I64Sub,
        (BinaryOp::Mul, false, _) => WBinaryOp::I32Mul,
        (BinaryOp::Mul, true, _) => WBinaryOp::I64Mul,
        (BinaryOp::Div, false, true) => WBinaryOp::I32DivS,
        (BinaryOp::Div, false, false) => WBinaryOp::I32DivU,
        (BinaryOp::Div, true, true) => WBinaryOp::I64DivS,
        (BinaryOp::Div, true, false) => WBinaryOp::I64DivU,
        (BinaryOp::Rem, false, true) => WBinaryOp::I32RemS,
        (BinaryOp::Rem, false, false) => WBinaryOp::I32RemU,
        (BinaryOp::Rem, true, true) => WBinaryOp::I64RemS,
        (BinaryOp::Rem, true, false) => WBinaryOp::I64RemU,
        (BinaryOp::BitAnd, false, _) => WBinaryOp::I32And,
        (BinaryOp::BitAnd, true, _) => WBinaryOp::I64And,
        (BinaryOp::BitOr, false, _) => WBinaryOp::I32Or,
        (BinaryOp::BitOr, true, _) => WBinaryOp::I64Or,
        (BinaryOp::BitXor, false, _) => WBinaryOp::I32Xor,
        (BinaryOp::BitXor, true, _) => WBinaryOp::I64Xor,
        (BinaryOp::Shl, false, _) => WBinaryOp::I32Shl,
        (BinaryOp::Shl, true, _) => WBinaryOp::I64Shl,
        (BinaryOp::ShrSigned, false, _) => WBinaryOp::I32ShrS,
        (BinaryOp::ShrSigned, true, _) => WBinaryOp::I64ShrS,
        (BinaryOp::ShrUnsigned, false, _) => WBinaryOp::I32ShrU,
        (BinaryOp::ShrUnsigned, true, _) => WBinaryOp::I64ShrU,
        (BinaryOp::Lt, false, true) => WBinaryOp::I32LtS,
        (BinaryOp::Lt, false, false) => WBinaryOp::I32LtU,
        (BinaryOp::Lt, true, true) => WBinaryOp::I64LtS,
        (BinaryOp::Lt, true, false) => WBinaryOp::I64LtU,
        (BinaryOp::Gt, false, true) => WBinaryOp::I32GtS,
        (BinaryOp::Gt, false, false) => WBinaryOp::I32GtU,
        (BinaryOp::Gt, true, true) => WBinaryOp::I64GtS,
        (BinaryOp::Gt, true, false) => WBinaryOp::I64GtU,
        (BinaryOp::LtEq, false, true) => WBinaryOp::I32LeS,
        (BinaryOp::LtEq, false, false) => WBinaryOp::I32LeU,
        (BinaryOp::LtEq, true, true) => WBinaryOp::I64LeS,
        (BinaryOp::LtEq, true, false) => WBinaryOp::I64LeU,
        (BinaryOp::GtEq, false, true) => WBinaryOp::I32GeS,
        (BinaryOp::GtEq, false, false) => WBinaryOp::I32GeU,
        (BinaryOp::GtEq, true, true) => WBinaryOp::I64GeS,
        (BinaryOp::GtEq, true, false) => WBinaryOp::I64GeU,
        (BinaryOp::Eq, false, _) => WBinaryOp::I32Eq,
        (BinaryOp::Eq, true, _) => WBinaryOp::I64Eq,
        (BinaryOp::NotEq, false, _) => WBinaryOp::I32Ne,
        (BinaryOp::NotEq, true, _) => WBinaryOp::I64Ne,
        (BinaryOp::LogicalAnd | BinaryOp::LogicalOr, _, _) => unreachable!("handled by lower_logical"),
    };
    builder.binop(wop);
}

fn lower_logical(
    builder: &mut InstrSeqBuilder,
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    fctx: &mut FunctionContext,
    lctx: &mut ExprLowerCtx,
) -> Type {
    let left_ty = lower_expr(builder, left, fctx, lctx);
    emit_zero_test(builder, left_ty);
    builder.unop(walrus::ir::UnaryOp::I32Eqz); // left truthiness as i32 (1 = truthy)

    let is_and = matches!(op, BinaryOp::LogicalAnd);
    builder.if_else(
        InstrSeqType::Simple(Some(walrus::ValType::I32)),
        |consequent| {
            if is_and {
                lower_truthy(consequent, right, fctx, lctx);
            } else {
                consequent.const_(Value::I32(1));
            }
        },
        |alternative| {
            if is_and {
                alternative.const_(Value::I32(0));
            } else {
                lower_truthy(alternative, right, fctx, lctx);
            }
        },
    );
    Type::Bool
}

fn lower_truthy(builder: &mut InstrSeqBuilder, expr: &Expr, fctx: &mut FunctionContext, lctx: &mut ExprLowerCtx) {
    let ty = lower_expr(builder, expr, fctx, lctx);
    emit_zero_test(builder, ty);
    builder.unop(walrus::ir::UnaryOp::I32Eqz);
}

fn lower_assign(
    builder: &mut InstrSeqBuilder,
    target: &Expr,
    value: &Expr,
    span: wasmc_common::Span,
    fctx: &mut FunctionContext,
    lctx: &mut ExprLowerCtx,
) -> Type {
    match target {
        Expr::Identifier(name, _) => lower_assign_local(builder, name, value, span, fctx, lctx),
        Expr::Property { base, name, span: prop_span } => lower_assign_property(builder, base, name, value, *prop_span, fctx, lctx),
        Expr::Element { base, index, span: elem_span } => lower_assign_element(builder, base, index, value, *elem_span, fctx, lctx),
        _ => {
            lctx.diagnostics.push(Diagnostic::new(
                diagnostic_messages::UNSUPPORTED_EXPRESSION,
                lctx.file,
                span,
                &["assignment target must be a local variable, property, or element"],
            ));
            lower_expr(builder, value, fctx, lctx)
        }
    }
}

fn lower_assign_local(
    builder: &mut InstrSeqBuilder,
    name: &str,
    value: &Expr,
    span: wasmc_common::Span,
    fctx: &mut FunctionContext,
    lctx: &mut ExprLowerCtx,
) -> Type {
    let Some((variable, local_id)) = fctx.lookup(name).cloned() else {
        lctx.diagnostics.push(Diagnostic::new(
            diagnostic_messages::UNDEFINED_LOCAL_VARIABLE,
            lctx.file,
            span,
            &[name],
        ));
        builder.unreachable();
        return Type::Void;
    };
    let value_ty = lower_expr(builder, value, fctx, lctx);
    maybe_convert_value(builder, value_ty, variable.ty, false, lctx.uintptr_size, span, lctx.file, lctx.diagnostics);
    builder.local_tee(local_id);
    variable.ty
}

/// Assign into a class instance's field: `base` is lowered to the instance
/// pointer, the field's byte offset is resolved from reflection, and the
/// value is stored through a scratch local so the assignment expression can
/// still yield its value (wasm's `store` leaves nothing on the stack).
fn lower_assign_property(
    builder: &mut InstrSeqBuilder,
    base: &Expr,
    name: &str,
    value: &Expr,
    span: wasmc_common::Span,
    fctx: &mut FunctionContext,
    lctx: &mut ExprLowerCtx,
) -> Type {
    let base_ty = lower_expr(builder, base, fctx, lctx);
    let Type::ClassInstance(class_id) = base_ty else {
        lctx.diagnostics.push(Diagnostic::new(
            diagnostic_messages::UNSUPPORTED_EXPRESSION,
            lctx.file,
            span,
            &["property access base is not a class instance"],
        ));
        builder.unreachable();
        return lower_expr(builder, value, fctx, lctx);
    };
    let class_name = lctx.reflect.class_name(class_id).to_string();
    let Some(class) = lctx.reflect.classes.get(&class_name) else {
        builder.unreachable();
        return lower_expr(builder, value, fctx, lctx);
    };
    let Some(property) = class.properties.iter().find(|p| lctx.reflect.resolve(p.name) == name) else {
        lctx.diagnostics.push(Diagnostic::new(
            diagnostic_messages::UNRESOLVABLE_TYPE,
            lctx.file,
            span,
            &[name],
        ));
        builder.unreachable();
        return lower_expr(builder, value, fctx, lctx);
    };
    let offset = property.offset;
    let ty = property.ty;

    let value_ty = lower_expr(builder, value, fctx, lctx);
    maybe_convert_value(builder, value_ty, ty, false, lctx.uintptr_size, span, lctx.file, lctx.diagnostics);
    let scratch = lctx.locals.add(val_type_of(ty, lctx.uintptr_size));
    builder.local_tee(scratch);
    store_at_offset(builder, lctx.memory, offset, ty);
    builder.local_get(scratch);
    ty
}

fn lower_assign_element(
    builder: &mut InstrSeqBuilder,
    base: &Expr,
    index: &Expr,
    value: &Expr,
    span: wasmc_common::Span,
    fctx: &mut FunctionContext,
    lctx: &mut ExprLowerCtx,
) -> Type {
    let base_ty = lower_expr(builder, base, fctx, lctx);
    if !base_ty.is_pointer_like() {
        lctx.diagnostics.push(Diagnostic::new(
            diagnostic_messages::UNSUPPORTED_EXPRESSION,
            lctx.file,
            span,
            &["element access base is not pointer-like"],
        ));
        builder.unreachable();
        return lower_expr(builder, value, fctx, lctx);
    }
    let index_ty = lower_expr(builder, index, fctx, lctx);
    maybe_convert_value(builder, index_ty, Type::Uintptr(lctx.uintptr_size), false, lctx.uintptr_size, span, lctx.file, lctx.diagnostics);
    builder.binop(if lctx.uintptr_size == PointerSize::Wasm64 { WBinaryOp::I64Add } else { WBinaryOp::I32Add });

    let value_ty = lower_expr(builder, value, fctx, lctx);
    maybe_convert_value(builder, value_ty, Type::Byte, false, lctx.uintptr_size, span, lctx.file, lctx.diagnostics);
    let scratch = lctx.locals.add(val_type_of(Type::Byte, lctx.uintptr_size));
    builder.local_tee(scratch);
    store_at_offset(builder, lctx.memory, 0, Type::Byte);
    builder.local_get(scratch);
    Type::Byte
}

fn lower_conditional(
    builder: &mut InstrSeqBuilder,
    cond: &Expr,
    then_expr: &Expr,
    else_expr: &Expr,
    _span: wasmc_common::Span,
    fctx: &mut FunctionContext,
    lctx: &mut ExprLowerCtx,
) -> Type {
    let cond_ty = lower_expr(builder, cond, fctx, lctx);
    emit_zero_test(builder, cond_ty);
    builder.unop(walrus::ir::UnaryOp::I32Eqz);

    let then_ty = peek_type(then_expr, fctx, lctx);
    let else_ty = peek_type(else_expr, fctx, lctx);
    let common = wider_type(then_ty, else_ty);
    let val_type = val_type_of(common, lctx.uintptr_size);

    builder.if_else(
        InstrSeqType::Simple(Some(val_type)),
        |consequent| {
            let ty = lower_expr(consequent, then_expr, fctx, lctx);
            maybe_convert_value(consequent, ty, common, true, lctx.uintptr_size, then_expr.span(), lctx.file, lctx.diagnostics);
        },
        |alternative| {
            let ty = lower_expr(alternative, else_expr, fctx, lctx);
            maybe_convert_value(alternative, ty, common, true, lctx.uintptr_size, else_expr.span(), lctx.file, lctx.diagnostics);
        },
    );
    common
}

fn lower_call(
    builder: &mut InstrSeqBuilder,
    callee: &Expr,
    args: &[Expr],
    type_args: &[TypeNode],
    span: wasmc_common::Span,
    fctx: &mut FunctionContext,
    lctx: &mut ExprLowerCtx,
) -> Type {
    match callee {
        Expr::Identifier(name, _) => lower_free_call(builder, name, args, type_args, span, fctx, lctx),
        Expr::Property { base, name, span: prop_span } => lower_method_call(builder, base, name, args, *prop_span, fctx, lctx),
        _ => {
            lctx.diagnostics.push(Diagnostic::new(
                diagnostic_messages::UNSUPPORTED_EXPRESSION,
                lctx.file,
                span,
                &["call target must be a named function or a method"],
            ));
            for arg in args {
                lower_expr(builder, arg, fctx, lctx);
            }
            builder.unreachable();
            Type::Void
        }
    }
}

/// Resolve a `callee<Arg, ...>`/`new Class<Arg, ...>` reference to the
/// lookup key `init.rs`'s monomorphization pass registered it under: the
/// bare name when there are no type arguments, or the canonical
/// `Name<arg, ...>` instance name otherwise. The instantiation itself
/// already happened during initialization, so this only needs to rebuild
/// the same key to find it.
fn resolve_call_key(name: &str, type_args: &[TypeNode], lctx: &mut ExprLowerCtx) -> String {
    if type_args.is_empty() {
        return name.to_string();
    }
    let resolved: Vec<Type> = type_args
        .iter()
        .map(|arg| resolve_type_node(arg, false, lctx.uintptr_size, lctx.reflect, lctx.file, lctx.diagnostics))
        .collect();
    lctx.reflect.instance_name(name, &resolved)
}

fn lower_free_call(
    builder: &mut InstrSeqBuilder,
    name: &str,
    args: &[Expr],
    type_args: &[TypeNode],
    span: wasmc_common::Span,
    fctx: &mut FunctionContext,
    lctx: &mut ExprLowerCtx,
) -> Type {
    let key = resolve_call_key(name, type_args, lctx);
    let Some(function) = lctx.reflect.functions.get(&key).cloned() else {
        lctx.diagnostics.push(Diagnostic::new(
            diagnostic_messages::UNRESOLVABLE_TYPE,
            lctx.file,
            span,
            &[name],
        ));
        for arg in args {
            lower_expr(builder, arg, fctx, lctx);
        }
        builder.unreachable();
        return Type::Void;
    };
    for (arg, param) in args.iter().zip(function.params.iter()) {
        let arg_ty = lower_expr(builder, arg, fctx, lctx);
        maybe_convert_value(builder, arg_ty, param.ty, false, lctx.uintptr_size, span, lctx.file, lctx.diagnostics);
    }
    if let Some(&function_id) = lctx.function_ids.get(&key) {
        builder.call(function_id);
    } else {
        builder.unreachable();
    }
    function.return_type
}

/// Lower `base.name(args)` as an instance method call: `base` lowers to the
/// receiver pointer, which is passed as the implicit first argument ahead
/// of `args`, matching the `this`-at-param-0 convention `init.rs` gives
/// every instance method.
fn lower_method_call(
    builder: &mut InstrSeqBuilder,
    base: &Expr,
    name: &str,
    args: &[Expr],
    span: wasmc_common::Span,
    fctx: &mut FunctionContext,
    lctx: &mut ExprLowerCtx,
) -> Type {
    let base_ty = lower_expr(builder, base, fctx, lctx);
    let Type::ClassInstance(class_id) = base_ty else {
        lctx.diagnostics.push(Diagnostic::new(
            diagnostic_messages::UNSUPPORTED_EXPRESSION,
            lctx.file,
            span,
            &["method call base is not a class instance"],
        ));
        for arg in args {
            lower_expr(builder, arg, fctx, lctx);
        }
        builder.unreachable();
        return Type::Void;
    };
    let class_name = lctx.reflect.class_name(class_id).to_string();
    let qualified = format!("{class_name}#{name}");
    let Some(function) = lctx.reflect.functions.get(&qualified).cloned() else {
        lctx.diagnostics.push(Diagnostic::new(
            diagnostic_messages::UNRESOLVABLE_TYPE,
            lctx.file,
            span,
            &[name],
        ));
        for arg in args {
            lower_expr(builder, arg, fctx, lctx);
        }
        builder.unreachable();
        return Type::Void;
    };
    for (arg, param) in args.iter().zip(function.params.iter().skip(1)) {
        let arg_ty = lower_expr(builder, arg, fctx, lctx);
        maybe_convert_value(builder, arg_ty, param.ty, false, lctx.uintptr_size, span, lctx.file, lctx.diagnostics);
    }
    if let Some(&function_id) = lctx.function_ids.get(&qualified) {
        builder.call(function_id);
    } else {
        builder.unreachable();
    }
    function.return_type
}

fn lower_new(
    builder: &mut InstrSeqBuilder,
    class_name: &str,
    args: &[Expr],
    type_args: &[TypeNode],
    span: wasmc_common::Span,
    fctx: &mut FunctionContext,
    lctx: &mut ExprLowerCtx,
) -> Type {
    let key = resolve_call_key(class_name, type_args, lctx);
    let Some(class) = lctx.reflect.classes.get(&key).cloned() else {
        lctx.diagnostics.push(Diagnostic::new(
            diagnostic_messages::UNRESOLVABLE_TYPE,
            lctx.file,
            span,
            &[class_name],
        ));
        builder.unreachable();
        return Type::Void;
    };
    let ptr_val_type = val_type_of(Type::Uintptr(lctx.uintptr_size), lctx.uintptr_size);
    let ptr_local: LocalId = lctx.locals.add(ptr_val_type);

    emit_const(builder, Type::Uintptr(lctx.uintptr_size), class.size as f64);
    if let Some(malloc_fn) = lctx.malloc_fn {
        builder.call(malloc_fn);
    } else {
        builder.unreachable();
    }
    builder.local_tee(ptr_local);

    if let Some(ctor_name) = class.constructor.as_ref() {
        let ctor_name = lctx.reflect.resolve(*ctor_name).to_string();
        if let Some(ctor) = lctx.reflect.functions.get(&ctor_name).cloned() {
            builder.local_get(ptr_local);
            for (arg, param) in args.iter().zip(ctor.params.iter().skip(1)) {
                let arg_ty = lower_expr(builder, arg, fctx, lctx);
                maybe_convert_value(builder, arg_ty, param.ty, false, lctx.uintptr_size, span, lctx.file, lctx.diagnostics);
            }
            if let Some(&ctor_id) = lctx.function_ids.get(&ctor_name) {
                builder.call(ctor_id);
            }
        }
    }
    builder.local_get(ptr_local);
    Type::ClassInstance(class.id)
}

/// The constant value of `enum_name.member_name`, if `enum_name` names a
/// known enum and not a shadowing local/global of the same name.
fn enum_member_value(enum_name: &str, member_name: &str, fctx: &FunctionContext, lctx: &ExprLowerCtx) -> Option<i64> {
    if fctx.lookup(enum_name).is_some() || lctx.reflect.globals.contains_key(enum_name) {
        return None;
    }
    let en = lctx.reflect.enums.get(enum_name)?;
    let member = en.members.iter().find(|m| lctx.reflect.resolve(m.name) == member_name)?;
    match member.constant_value {
        Some(ConstValue::Int(v)) => Some(v),
        _ => None,
    }
}

fn lower_property(
    builder: &mut InstrSeqBuilder,
    base: &Expr,
    name: &str,
    span: wasmc_common::Span,
    fctx: &mut FunctionContext,
    lctx: &mut ExprLowerCtx,
) -> Type {
    if let Expr::Identifier(base_name, _) = base {
        if let Some(value) = enum_member_value(base_name, name, fctx, lctx) {
            emit_const(builder, Type::Int, value as f64);
            return Type::Int;
        }
    }
    let base_ty = lower_expr(builder, base, fctx, lctx);
    let Type::ClassInstance(class_id) = base_ty else {
        lctx.diagnostics.push(Diagnostic::new(
            diagnostic_messages::UNSUPPORTED_EXPRESSION,
            lctx.file,
            span,
            &["property access base is not a class instance"],
        ));
        builder.unreachable();
        return Type::Void;
    };
    let class_name = lctx.reflect.class_name(class_id).to_string();
    let Some(class) = lctx.reflect.classes.get(&class_name) else {
        builder.unreachable();
        return Type::Void;
    };
    let Some(property) = class.properties.iter().find(|p| lctx.reflect.resolve(p.name) == name) else {
        lctx.diagnostics.push(Diagnostic::new(
            diagnostic_messages::UNRESOLVABLE_TYPE,
            lctx.file,
            span,
            &[name],
        ));
        builder.unreachable();
        return Type::Void;
    };
    let offset = property.offset;
    let ty = property.ty;
    load_at_offset(builder, lctx.memory, offset, ty);
    ty
}

fn lower_element(
    builder: &mut InstrSeqBuilder,
    base: &Expr,
    index: &Expr,
    span: wasmc_common::Span,
    fctx: &mut FunctionContext,
    lctx: &mut ExprLowerCtx,
) -> Type {
    // Element access is only meaningful on pointer-like bases (a raw
    // linear-memory view); indexing non-pointer types is a hard error.
    let base_ty = lower_expr(builder, base, fctx, lctx);
    if !base_ty.is_pointer_like() {
        lctx.diagnostics.push(Diagnostic::new(
            diagnostic_messages::UNSUPPORTED_EXPRESSION,
            lctx.file,
            span,
            &["element access base is not pointer-like"],
        ));
        builder.unreachable();
        return Type::Void;
    }
    let index_ty = lower_expr(builder, index, fctx, lctx);
    maybe_convert_value(builder, index_ty, Type::Uintptr(lctx.uintptr_size), false, lctx.uintptr_size, span, lctx.file, lctx.diagnostics);
    builder.binop(if lctx.uintptr_size == PointerSize::Wasm64 { WBinaryOp::I64Add } else { WBinaryOp::I32Add });
    load_at_offset(builder, lctx.memory, 0, Type::Byte);
    Type::Byte
}

fn load_at_offset(builder: &mut InstrSeqBuilder, memory: walrus::MemoryId, offset: u32, ty: Type) {
    use walrus::ir::{ExtendedLoad, LoadKind, MemArg};
    let kind = match ty {
        Type::Double => LoadKind::F64,
        Type::Float => LoadKind::F32,
        Type::Long | Type::ULong => LoadKind::I64 { atomic: false },
        Type::Uintptr(PointerSize::Wasm64) => LoadKind::I64 { atomic: false },
        Type::Byte | Type::Bool => LoadKind::I32_8 { kind: ExtendedLoad::ZeroExtend },
        Type::SByte => LoadKind::I32_8 { kind: ExtendedLoad::SignExtend },
        Type::UShort => LoadKind::I32_16 { kind: ExtendedLoad::ZeroExtend },
        Type::Short => LoadKind::I32_16 { kind: ExtendedLoad::SignExtend },
        _ => LoadKind::I32 { atomic: false },
    };
    builder.load(memory, kind, MemArg { align: 1, offset });
}

fn store_at_offset(builder: &mut InstrSeqBuilder, memory: walrus::MemoryId, offset: u32, ty: Type) {
    use walrus::ir::{MemArg, StoreKind};
    let kind = match ty {
        Type::Double => StoreKind::F64,
        Type::Float => StoreKind::F32,
        Type::Long | Type::ULong => StoreKind::I64 { atomic: false },
        Type::Uintptr(PointerSize::Wasm64) => StoreKind::I64 { atomic: false },
        Type::Byte | Type::Bool | Type::SByte => StoreKind::I32_8 { atomic: false },
        Type::UShort | Type::Short => StoreKind::I32_16 { atomic: false },
        _ => StoreKind::I32 { atomic: false },
    };
    builder.store(memory, kind, MemArg { align: 1, offset });
}
