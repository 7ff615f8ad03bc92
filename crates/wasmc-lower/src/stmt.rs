//! Statement lowering: translates `wasmc_ast::Stmt` into `walrus` IR.
//!
//! Loops lower to nested `block`/`loop` instruction sequences rather than
//! the distilled spec's textual `break$N.D`/`continue$N.D` labels — see the
//! `BreakContext` redesign note in the design notes. A `while` becomes
//! `block { loop { if (cond) { body; br loop } } }`; `break` branches to
//! the outer block, `continue` branches to the inner loop.

use walrus::ir::{BinaryOp as WBinaryOp, InstrSeqType, Value};
use walrus::{InstrSeqBuilder, LocalId};
use wasmc_ast::{DeclKind, Stmt, SwitchCase, VariableDecl};
use wasmc_common::diagnostics::diagnostic_messages;
use wasmc_common::{Diagnostic, Span};
use wasmc_reflect::{resolve_type_node, Type, Variable, VariableFlags};

use crate::context::{BreakContext, FunctionContext};
use crate::conversion::maybe_convert_value;
use crate::expr::{lower_expr, ExprLowerCtx};
use crate::module_builder::val_type_of;

/// Lower a full statement list (a function body or a block) in sequence.
pub fn lower_stmts(builder: &mut InstrSeqBuilder, stmts: &[Stmt], fctx: &mut FunctionContext, lctx: &mut ExprLowerCtx) {
    for stmt in stmts {
        lower_stmt(builder, stmt, fctx, lctx);
    }
}

pub fn lower_stmt(builder: &mut InstrSeqBuilder, stmt: &Stmt, fctx: &mut FunctionContext, lctx: &mut ExprLowerCtx) {
    match stmt {
        Stmt::Block(body, _) => lower_stmts(builder, body, fctx, lctx),
        Stmt::If { cond, then_branch, else_branch, span } => {
            lower_if(builder, cond, then_branch, else_branch.as_deref(), *span, fctx, lctx);
        }
        Stmt::While { cond, body, span } => lower_while(builder, cond, body, *span, fctx, lctx),
        Stmt::DoWhile { body, cond, span } => lower_do_while(builder, body, cond, *span, fctx, lctx),
        Stmt::For { init, cond, update, body, span } => {
            lower_for(builder, init.as_deref(), cond.as_ref(), update.as_ref(), body, *span, fctx, lctx);
        }
        Stmt::Switch { discriminant, cases, span } => lower_switch(builder, discriminant, cases, *span, fctx, lctx),
        Stmt::Break(span) => lower_break(builder, *span, fctx, lctx),
        Stmt::Continue(span) => lower_continue(builder, *span, fctx, lctx),
        Stmt::Return(value, span) => lower_return(builder, value.as_ref(), *span, fctx, lctx),
        Stmt::Variable(decl) => lower_variable_decl(builder, decl, fctx, lctx),
        Stmt::Expr(expr, _) => {
            lower_expr(builder, expr, fctx, lctx);
            builder.drop();
        }
    }
}

fn lower_condition(builder: &mut InstrSeqBuilder, cond: &wasmc_ast::Expr, fctx: &mut FunctionContext, lctx: &mut ExprLowerCtx) {
    let ty = lower_expr(builder, cond, fctx, lctx);
    if ty != Type::Bool {
        maybe_convert_value(builder, ty, Type::Bool, true, lctx.uintptr_size, cond.span(), lctx.file, lctx.diagnostics);
        // `Bool` and every int-family type share the i32 representation, so
        // the only conversion that matters here is widening/narrowing; a
        // zero test is handled at the `if`/`br_if` site by treating any
        // nonzero i32 as true.
    }
}

fn lower_if(
    builder: &mut InstrSeqBuilder,
    cond: &wasmc_ast::Expr,
    then_branch: &Stmt,
    else_branch: Option<&Stmt>,
    _span: Span,
    fctx: &mut FunctionContext,
    lctx: &mut ExprLowerCtx,
) {
    lower_condition(builder, cond, fctx, lctx);
    builder.if_else(
        InstrSeqType::Simple(None),
        |consequent| lower_stmt(consequent, then_branch, fctx, lctx),
        |alternative| {
            if let Some(else_branch) = else_branch {
                lower_stmt(alternative, else_branch, fctx, lctx);
            }
        },
    );
}

/// `while (cond) body` → `block { loop { cond; br_if_false exit; body; br loop } }`
fn lower_while(
    builder: &mut InstrSeqBuilder,
    cond: &wasmc_ast::Expr,
    body: &Stmt,
    _span: Span,
    fctx: &mut FunctionContext,
    lctx: &mut ExprLowerCtx,
) {
    builder.block(InstrSeqType::Simple(None), |outer| {
        let break_target = outer.id();
        outer.loop_(InstrSeqType::Simple(None), |inner| {
            let continue_target = inner.id();
            fctx.enter_break_context(BreakContext { break_target, continue_target });

            lower_condition(inner, cond, fctx, lctx);
            inner.if_else(
                InstrSeqType::Simple(None),
                |consequent| {
                    lower_stmt(consequent, body, fctx, lctx);
                    consequent.br(continue_target);
                },
                |_alternative| {},
            );

            fctx.leave_break_context();
        });
    });
}

/// `do body while (cond)` → `block { loop { body; cond; br_if loop } }`
fn lower_do_while(
    builder: &mut InstrSeqBuilder,
    body: &Stmt,
    cond: &wasmc_ast::Expr,
    _span: Span,
    fctx: &mut FunctionContext,
    lctx: &mut ExprLowerCtx,
) {
    builder.block(InstrSeqType::Simple(None), |outer| {
        let break_target = outer.id();
        outer.loop_(InstrSeqType::Simple(None), |inner| {
            let continue_target = inner.id();
            fctx.enter_break_context(BreakContext { break_target, continue_target });

            lower_stmt(inner, body, fctx, lctx);
            lower_condition(inner, cond, fctx, lctx);
            inner.br_if(continue_target);

            fctx.leave_break_context();
        });
    });
}

/// `for (init; cond; update) body` desugars to a `while` whose body runs
/// `update` after `body`, with `init` hoisted before the loop and `continue`
/// still routed through `update` (so a `continue` inside `body` doesn't skip
/// it).
fn lower_for(
    builder: &mut InstrSeqBuilder,
    init: Option<&Stmt>,
    cond: Option<&wasmc_ast::Expr>,
    update: Option<&wasmc_ast::Expr>,
    body: &Stmt,
    _span: Span,
    fctx: &mut FunctionContext,
    lctx: &mut ExprLowerCtx,
) {
    if let Some(init) = init {
        lower_stmt(builder, init, fctx, lctx);
    }
    builder.block(InstrSeqType::Simple(None), |outer| {
        let break_target = outer.id();
        outer.loop_(InstrSeqType::Simple(None), |loop_builder| {
            let loop_target = loop_builder.id();

            if let Some(cond) = cond {
                lower_condition(loop_builder, cond, fctx, lctx);
            } else {
                loop_builder.const_(Value::I32(1));
            }

            loop_builder.if_else(
                InstrSeqType::Simple(None),
                |consequent| {
                    // `continue` must still run `update` before retesting
                    // `cond`, so it branches to this inner block rather
                    // than straight back to the loop.
                    consequent.block(InstrSeqType::Simple(None), |body_block| {
                        let continue_target = body_block.id();
                        fctx.enter_break_context(BreakContext { break_target, continue_target });
                        lower_stmt(body_block, body, fctx, lctx);
                        fctx.leave_break_context();
                    });
                    if let Some(update) = update {
                        lower_expr(consequent, update, fctx, lctx);
                        consequent.drop();
                    }
                    consequent.br(loop_target);
                },
                |_alternative| {},
            );
        });
    });
}

/// A `switch` lowers to a chain of equality tests against the discriminant,
/// each guarding its case body, terminated by the `default` case (if any).
/// Fallthrough between cases is not modeled: each case's body runs in its
/// own `block` so a `break` exits the whole switch via the shared outer
/// block.
fn lower_switch(
    builder: &mut InstrSeqBuilder,
    discriminant: &wasmc_ast::Expr,
    cases: &[SwitchCase],
    _span: Span,
    fctx: &mut FunctionContext,
    lctx: &mut ExprLowerCtx,
) {
    let disc_ty = lower_expr(builder, discriminant, fctx, lctx);
    let disc_val_type = val_type_of(disc_ty, lctx.uintptr_size);
    let disc_local: LocalId = lctx.locals.add(disc_val_type);
    builder.local_set(disc_local);

    builder.block(InstrSeqType::Simple(None), |outer| {
        let break_target = outer.id();
        fctx.enter_break_context(BreakContext { break_target, continue_target: break_target });
        lower_switch_cases(outer, disc_local, disc_ty, cases, fctx, lctx);
        fctx.leave_break_context();
    });
}

fn lower_switch_cases(
    builder: &mut InstrSeqBuilder,
    disc_local: LocalId,
    disc_ty: Type,
    cases: &[SwitchCase],
    fctx: &mut FunctionContext,
    lctx: &mut ExprLowerCtx,
) {
    let Some((case, rest)) = cases.split_first() else {
        return;
    };
    let Some(test) = &case.test else {
        // `default`: always runs; any remaining cases after it are
        // unreachable in this non-fallthrough model, matching how the
        // spec's switch lowering treats `default` as the final branch.
        lower_stmts(builder, &case.body, fctx, lctx);
        return;
    };

    builder.local_get(disc_local);
    let test_ty = lower_expr(builder, test, fctx, lctx);
    maybe_convert_value(builder, test_ty, disc_ty, true, lctx.uintptr_size, test.span(), lctx.file, lctx.diagnostics);
    let eq_op = if disc_ty.is_long() { WBinaryOp::I64Eq } else { WBinaryOp::I32Eq };
    builder.binop(eq_op);

    builder.if_else(
        InstrSeqType::Simple(None),
        |consequent| lower_stmts(consequent, &case.body, fctx, lctx),
        |alternative| lower_switch_cases(alternative, disc_local, disc_ty, rest, fctx, lctx),
    );
}

fn lower_break(builder: &mut InstrSeqBuilder, span: Span, fctx: &mut FunctionContext, lctx: &mut ExprLowerCtx) {
    match fctx.innermost_break_context() {
        Some(ctx) => {
            builder.br(ctx.break_target);
        }
        None => {
            lctx.diagnostics.push(Diagnostic::new(
                diagnostic_messages::UNSUPPORTED_STATEMENT,
                lctx.file,
                span,
                &["'break' outside a loop or switch"],
            ));
        }
    }
}

fn lower_continue(builder: &mut InstrSeqBuilder, span: Span, fctx: &mut FunctionContext, lctx: &mut ExprLowerCtx) {
    match fctx.innermost_break_context() {
        Some(ctx) => {
            builder.br(ctx.continue_target);
        }
        None => {
            lctx.diagnostics.push(Diagnostic::new(
                diagnostic_messages::UNSUPPORTED_STATEMENT,
                lctx.file,
                span,
                &["'continue' outside a loop"],
            ));
        }
    }
}

fn lower_return(
    builder: &mut InstrSeqBuilder,
    value: Option<&wasmc_ast::Expr>,
    span: Span,
    fctx: &mut FunctionContext,
    lctx: &mut ExprLowerCtx,
) {
    match value {
        Some(expr) => {
            let ty = lower_expr(builder, expr, fctx, lctx);
            maybe_convert_value(builder, ty, fctx.return_type, false, lctx.uintptr_size, span, lctx.file, lctx.diagnostics);
        }
        None => {
            if fctx.return_type != Type::Void {
                lctx.diagnostics.push(Diagnostic::new(
                    diagnostic_messages::UNSUPPORTED_STATEMENT,
                    lctx.file,
                    span,
                    &["missing return value for non-void function"],
                ));
            }
        }
    }
    builder.return_();
}

fn lower_variable_decl(builder: &mut InstrSeqBuilder, decl: &VariableDecl, fctx: &mut FunctionContext, lctx: &mut ExprLowerCtx) {
    let declared_ty = decl.ty.as_ref().map(|node| resolve_type_node(node, false, lctx.uintptr_size, lctx.reflect, lctx.file, lctx.diagnostics));

    let (ty, init_ty) = match &decl.initializer {
        Some(init) => {
            let init_ty = lower_expr(builder, init, fctx, lctx);
            (declared_ty.unwrap_or(init_ty), Some(init_ty))
        }
        None => (declared_ty.unwrap_or(Type::Int), None),
    };

    let val_type = val_type_of(ty, lctx.uintptr_size);
    let local_id = lctx.locals.add(val_type);

    if let Some(init_ty) = init_ty {
        maybe_convert_value(builder, init_ty, ty, false, lctx.uintptr_size, decl.span, lctx.file, lctx.diagnostics);
        builder.local_set(local_id);
    } else {
        // No initializer: leave the local at its `walrus`-assigned zero
        // value, matching the engine's implicit-zero-init semantics.
    }

    let flags = if decl.kind == DeclKind::Const {
        VariableFlags::CONSTANT
    } else {
        VariableFlags::empty()
    };
    // A local's `Variable::name` atom is never looked up during lowering:
    // `FunctionContext` resolves locals by source-text name, not by atom.
    // Reflecting the module is read-only here (the interner is owned and
    // populated by the initialization pass), so locals carry the default
    // atom rather than a meaningful interned one.
    let variable = Variable { name: wasmc_common::Atom::default(), ty, flags, index: 0 };
    fctx.declare_local(&decl.name, variable, local_id);
}
