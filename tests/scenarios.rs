//! End-to-end scenarios exercising the full `compile_string` pipeline,
//! asserting emitted IR shapes rather than just success/failure.

use walrus::ir::{BinaryOp, Instr, UnaryOp, Value};
use walrus::{ExportItem, FunctionKind, GlobalKind, InitExpr, InstrSeqId, LocalFunction};
use wasmc::compile_string;
use wasmc_common::options::CompileOptions;

fn local_fn<'m>(module: &'m walrus::Module, export_name: &str) -> &'m LocalFunction {
    let export = module.exports.iter().find(|e| e.name == export_name).unwrap_or_else(|| panic!("export '{export_name}' present"));
    let id = match export.item {
        ExportItem::Function(id) => id,
        _ => panic!("export '{export_name}' is not a function"),
    };
    match &module.funcs.get(id).kind {
        FunctionKind::Local(local) => local,
        _ => panic!("export '{export_name}' is not a local function"),
    }
}

/// Search `seq` and everything nested under its `block`/`loop`/`if` children
/// for an instruction matching `pred`.
fn contains_nested(local: &LocalFunction, seq: InstrSeqId, pred: &dyn Fn(&Instr) -> bool) -> bool {
    local.block(seq).instrs.iter().any(|(instr, _)| {
        if pred(instr) {
            return true;
        }
        match instr {
            Instr::Block(b) => contains_nested(local, b.seq, pred),
            Instr::Loop(l) => contains_nested(local, l.seq, pred),
            Instr::IfElse(ie) => contains_nested(local, ie.consequent, pred) || contains_nested(local, ie.alternative, pred),
            _ => false,
        }
    })
}

fn freestanding() -> CompileOptions {
    CompileOptions::builder().no_lib(true).build().expect("valid options")
}

#[test]
fn s1_binary_add_lowers_to_i32_add_of_its_two_params() {
    let module = compile_string("export function add(a: int, b: int): int { return a + b; }", freestanding()).expect("compiles");

    assert!(module.exports.iter().any(|e| e.name == "add"), "add must be exported");

    let local = local_fn(&module, "add");
    let entry = local.entry_block();
    let get_local_count = local.block(entry).instrs.iter().filter(|(instr, _)| matches!(instr, Instr::LocalGet(_))).count();
    assert_eq!(get_local_count, 2, "add's body should read both of its two params");
    let has_add = contains_nested(local, entry, &|instr| matches!(instr, Instr::Binop(b) if b.op == BinaryOp::I32Add));
    assert!(has_add, "expected i32.add in add's body");
}

#[test]
fn s2_const_global_folds_to_immutable_inline_init_and_skips_start() {
    let module = compile_string("const N: int = 7; export function n(): int { return N; }", freestanding()).expect("compiles");
    assert!(module.start.is_none(), "freestanding build with only a folded const needs no start function");

    let local = local_fn(&module, "n");
    let entry = local.entry_block();
    let global_id = local
        .block(entry)
        .instrs
        .iter()
        .find_map(|(instr, _)| match instr {
            Instr::GlobalGet(g) => Some(g.global),
            _ => None,
        })
        .expect("n reads a global");

    let global = module.globals.get(global_id);
    assert!(!global.mutable, "a const global must be immutable");
    match global.kind {
        GlobalKind::Local(InitExpr::Value(Value::I32(7))) => {}
        _ => panic!("expected N's init expr to be i32.const 7"),
    }
}

#[test]
fn s3_explicit_narrowing_cast_truncates_without_error() {
    let module = compile_string("export function f(x: float): int { return x as int; }", freestanding()).expect("compiles");
    let local = local_fn(&module, "f");
    let entry = local.entry_block();
    let has_trunc = contains_nested(local, entry, &|instr| matches!(instr, Instr::Unop(u) if u.op == UnaryOp::I32TruncSF32));
    assert!(has_trunc, "expected i32.trunc_s.f32 in f's body");
}

#[test]
fn s4_implicit_narrowing_is_rejected() {
    let result = compile_string("export function g(x: float): int { return x; }", freestanding());
    assert!(result.is_err(), "implicit float -> int narrowing must be a hard error");
}

#[test]
fn s5_while_loop_lowers_to_nested_block_loop_if() {
    let module = compile_string(
        "export function loop_(): int { let i: int = 0; while (i < 10) { i = i + 1; } return i; }",
        freestanding(),
    )
    .expect("compiles");
    let local = local_fn(&module, "loop_");
    let entry = local.entry_block();

    let has_block_with_loop = local.block(entry).instrs.iter().any(|(instr, _)| match instr {
        Instr::Block(b) => local.block(b.seq).instrs.iter().any(|(inner, _)| matches!(inner, Instr::Loop(_))),
        _ => false,
    });
    assert!(has_block_with_loop, "expected an outer block containing the loop");

    let has_lt = contains_nested(local, entry, &|instr| matches!(instr, Instr::Binop(b) if b.op == BinaryOp::I32LtS));
    let has_add = contains_nested(local, entry, &|instr| matches!(instr, Instr::Binop(b) if b.op == BinaryOp::I32Add));
    let has_branch = contains_nested(local, entry, &|instr| matches!(instr, Instr::Br(_)));
    assert!(has_lt, "expected i32.lt_s condition test");
    assert!(has_add, "expected i32.add increment");
    assert!(has_branch, "expected a br back to the loop");
}

#[test]
fn s6_default_mode_wires_allocator_and_inits_mspace_before_anything_else() {
    let module = compile_string("", CompileOptions::default()).expect("an empty program still compiles");

    assert!(module.exports.iter().any(|e| e.name == "malloc"));
    assert!(module.exports.iter().any(|e| e.name == "free"));
    assert!(!module.exports.iter().any(|e| e.name.starts_with("mspace_")), "mspace_* must stay unexported");

    let start_id = module.start.expect("non-freestanding mode always synthesizes a start function");
    let local = match &module.funcs.get(start_id).kind {
        FunctionKind::Local(local) => local,
        _ => panic!("start is a local function"),
    };
    let entry = local.entry_block();
    let instrs = &local.block(entry).instrs;

    let heap_base_const = matches!(instrs.first().map(|(i, _)| i), Some(Instr::Const(c)) if c.value == Value::I32(1 << 16));
    assert!(heap_base_const, "start must push the heap base before calling mspace_init");

    let calls_before_any_global_set = instrs
        .iter()
        .take_while(|(instr, _)| !matches!(instr, Instr::GlobalSet(_)))
        .any(|(instr, _)| matches!(instr, Instr::Call(_)));
    assert!(calls_before_any_global_set, "mspace_init must be called before .msp is stored");
}

#[test]
fn property_7_no_start_no_globals_means_no_start_function() {
    let module = compile_string("export function add(a: int, b: int): int { return a + b; }", freestanding()).expect("compiles");
    assert!(module.start.is_none());
}

#[test]
fn property_7_globals_only_synthesizes_an_initializer() {
    let module = compile_string("function seed(): int { return 5; } let g: int = seed();", freestanding()).expect("compiles");
    assert!(module.start.is_some(), "a deferred global initializer needs a synthesized start");
}

#[test]
fn property_7_user_start_runs_last_after_global_initializers() {
    let module = compile_string(
        "function seed(): int { return 5; } let g: int = seed(); function start(): void { g = 1; }",
        freestanding(),
    )
    .expect("compiles");
    let start_id = module.start.expect("user start plus a deferred global synthesizes a wrapper");
    let local = match &module.funcs.get(start_id).kind {
        FunctionKind::Local(local) => local,
        _ => panic!("start is a local function"),
    };
    let entry = local.entry_block();
    let instrs = &local.block(entry).instrs;
    let last_is_call = matches!(instrs.last().map(|(i, _)| i), Some(Instr::Call(_)));
    assert!(last_is_call, "the user's start must be called last in the synthesized wrapper");
}

#[test]
fn property_1_every_scenario_here_emits_well_typed_wasm() {
    let programs: [(&str, CompileOptions); 3] = [
        ("export function add(a: int, b: int): int { return a + b; }", freestanding()),
        ("const N: int = 7; export function n(): int { return N; }", freestanding()),
        ("", CompileOptions::default()),
    ];
    for (source, options) in programs {
        let mut module = compile_string(source, options).expect("compiles");
        assert!(module.emit_wasm().len() > 0, "emit_wasm should succeed and produce a non-empty binary");
    }
}
