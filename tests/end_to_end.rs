//! Hand-constructed translation units exercising the scenarios of spec §8's testable
//! properties, since no parser and no MIPS simulator are in scope: these assert on the
//! shape of the emitted IR/assembly text rather than on program behavior.

use lscc::ast::*;
use lscc::codegen::{emit_instr, EmitContext};
use lscc::context::CompilationContext;
use lscc::ir::{EqualityOp, Instr};
use lscc::lower::lower_program;
use lscc::types::symbol::FunctionStack;
use lscc::types::{BuiltinType, Type};
use lscc::{compile_ir, compile_mips};
use hashbrown::HashMap;

fn int_ty() -> TypeName { TypeName { builtin: "int".into(), pointer_depth: 0, signed: true, tag: None } }
fn double_ty() -> TypeName { TypeName { builtin: "double".into(), pointer_depth: 0, signed: true, tag: None } }
fn ptr_ty(mut base: TypeName, depth: u32) -> TypeName { base.pointer_depth += depth; base }

fn program(decls: Vec<ExternalDecl>) -> Program { Program { decls, line: 1 } }

/// `int add(int a, int b) { return a + b; }`
#[test]
fn simple_arithmetic_function_lowers_and_emits() {
    let prog = program(vec![ExternalDecl::Function(FunctionDecl {
        name: "add".into(),
        ret: int_ty(),
        params: vec![
            Param { name: "a".into(), ty: int_ty(), line: 1 },
            Param { name: "b".into(), ty: int_ty(), line: 1 },
        ],
        body: Some(Stmt::Block {
            stmts: vec![Stmt::Return {
                value: Some(Expr::Binary {
                    op: BinaryOp::Add,
                    lhs: Box::new(Expr::Ident { name: "a".into(), line: 1 }),
                    rhs: Box::new(Expr::Ident { name: "b".into(), line: 1 }),
                    line: 1,
                }),
                line: 1,
            }],
            line: 1,
        }),
        line: 1,
    })]);

    let mut ctx = CompilationContext::new();
    let ir = compile_ir(&prog, &mut ctx).unwrap();
    assert!(ir.contains("    add "));

    let mut ctx2 = CompilationContext::new();
    let asm = compile_mips(&prog, &mut ctx2).unwrap();
    assert!(asm.contains(".globl add"));
    assert!(asm.contains("jr $31"));
}

/// `int* advance(int* p) { return p + 1; }` exercises pointer-scaled addition.
#[test]
fn pointer_arithmetic_scales_by_pointee_size() {
    let prog = program(vec![ExternalDecl::Function(FunctionDecl {
        name: "advance".into(),
        ret: ptr_ty(int_ty(), 1),
        params: vec![Param { name: "p".into(), ty: ptr_ty(int_ty(), 1), line: 1 }],
        body: Some(Stmt::Block {
            stmts: vec![Stmt::Return {
                value: Some(Expr::Binary {
                    op: BinaryOp::Add,
                    lhs: Box::new(Expr::Ident { name: "p".into(), line: 1 }),
                    rhs: Box::new(Expr::IntLit { value: 1, line: 1 }),
                    line: 1,
                }),
                line: 1,
            }],
            line: 1,
        }),
        line: 1,
    })]);

    let mut ctx = CompilationContext::new();
    let ir = compile_ir(&prog, &mut ctx).unwrap();
    // Scaling by 4 (sizeof(int)) inserts a multiply before the add.
    assert!(ir.contains("mul"));
    assert!(ir.contains("add"));
}

/// `struct Point { int x; int y; }` with a member write and a member read.
#[test]
fn struct_member_access_reads_and_writes_through_offsets() {
    let point_ty = TypeName { builtin: "struct".into(), pointer_depth: 0, signed: true, tag: Some("Point".into()) };
    let prog = program(vec![
        ExternalDecl::Struct(StructDecl {
            tag: "Point".into(),
            members: vec![
                StructMember { name: "x".into(), ty: int_ty(), array_len: None },
                StructMember { name: "y".into(), ty: int_ty(), array_len: None },
            ],
            line: 1,
        }),
        ExternalDecl::Function(FunctionDecl {
            name: "move_point".into(),
            ret: int_ty(),
            params: vec![],
            body: Some(Stmt::Block {
                stmts: vec![
                    Stmt::DeclStmt { decl: VarDecl { name: "p".into(), ty: point_ty, array_len: None, init: None, line: 1 }, line: 1 },
                    Stmt::ExprStmt {
                        expr: Expr::Assign {
                            lhs: Box::new(Expr::Member { base: Box::new(Expr::Ident { name: "p".into(), line: 2 }), field: "x".into(), arrow: false, line: 2 }),
                            rhs: Box::new(Expr::IntLit { value: 5, line: 2 }),
                            line: 2,
                        },
                        line: 2,
                    },
                    Stmt::Return {
                        value: Some(Expr::Member { base: Box::new(Expr::Ident { name: "p".into(), line: 3 }), field: "x".into(), arrow: false, line: 3 }),
                        line: 3,
                    },
                ],
                line: 1,
            }),
            line: 1,
        }),
    ]);

    let mut ctx = CompilationContext::new();
    let ir = compile_ir(&prog, &mut ctx).unwrap();
    assert!(ir.contains("member"));
}

/// Compiling the same program twice yields byte-identical IR and assembly (spec §8's
/// determinism invariant).
#[test]
fn compilation_is_deterministic_across_repeated_runs() {
    let prog = program(vec![ExternalDecl::Function(FunctionDecl {
        name: "f".into(),
        ret: int_ty(),
        params: vec![],
        body: Some(Stmt::Block {
            stmts: vec![
                Stmt::DeclStmt {
                    decl: VarDecl { name: "i".into(), ty: int_ty(), array_len: None, init: Some(Expr::IntLit { value: 0, line: 1 }), line: 1 },
                    line: 1,
                },
                Stmt::While {
                    cond: Expr::Binary {
                        op: BinaryOp::Lt,
                        lhs: Box::new(Expr::Ident { name: "i".into(), line: 2 }),
                        rhs: Box::new(Expr::IntLit { value: 10, line: 2 }),
                        line: 2,
                    },
                    body: Box::new(Stmt::ExprStmt {
                        expr: Expr::Unary { op: UnaryOp::PostInc, operand: Box::new(Expr::Ident { name: "i".into(), line: 3 }), line: 3 },
                        line: 3,
                    }),
                    line: 2,
                },
                Stmt::Return { value: Some(Expr::Ident { name: "i".into(), line: 4 }), line: 4 },
            ],
            line: 1,
        }),
        line: 1,
    })]);

    let mut ctx_a = CompilationContext::new();
    let asm_a = compile_mips(&prog, &mut ctx_a).unwrap();
    let mut ctx_b = CompilationContext::new();
    let asm_b = compile_mips(&prog, &mut ctx_b).unwrap();
    assert_eq!(asm_a, asm_b);
}

/// `int call_site() { return helper(1, 2); }` with `helper` declared but not defined in
/// this translation unit (an extern reference), exercising the call-argument path.
#[test]
fn function_call_lowers_its_argument_list() {
    let prog = program(vec![
        ExternalDecl::Function(FunctionDecl { name: "helper".into(), ret: int_ty(), params: vec![
            Param { name: "x".into(), ty: int_ty(), line: 1 },
            Param { name: "y".into(), ty: int_ty(), line: 1 },
        ], body: None, line: 1 }),
        ExternalDecl::Function(FunctionDecl {
            name: "call_site".into(),
            ret: int_ty(),
            params: vec![],
            body: Some(Stmt::Block {
                stmts: vec![Stmt::Return {
                    value: Some(Expr::Call {
                        callee: "helper".into(),
                        args: vec![Expr::IntLit { value: 1, line: 1 }, Expr::IntLit { value: 2, line: 1 }],
                        line: 1,
                    }),
                    line: 1,
                }],
                line: 1,
            }),
            line: 1,
        }),
    ]);

    let mut ctx = CompilationContext::new();
    let ir = compile_ir(&prog, &mut ctx).unwrap();
    assert!(ir.contains("call helper"));
}

/// Redeclaring a variable with an incompatible type in the same scope is rejected.
#[test]
fn redeclaration_with_incompatible_type_is_rejected() {
    let prog = program(vec![ExternalDecl::Function(FunctionDecl {
        name: "f".into(),
        ret: int_ty(),
        params: vec![],
        body: Some(Stmt::Block {
            stmts: vec![
                Stmt::DeclStmt { decl: VarDecl { name: "x".into(), ty: int_ty(), array_len: None, init: None, line: 1 }, line: 1 },
                Stmt::DeclStmt { decl: VarDecl { name: "x".into(), ty: double_ty(), array_len: None, init: None, line: 2 }, line: 2 },
            ],
            line: 1,
        }),
        line: 1,
    })]);

    let mut ctx = CompilationContext::new();
    assert!(compile_ir(&prog, &mut ctx).is_err());
}

/// A global variable and a sibling function must both be visible from every function
/// body, not just the one that happens to be lowered first.
#[test]
fn global_variable_and_sibling_function_are_visible_from_every_function_body() {
    let prog = program(vec![
        ExternalDecl::Var(VarDecl { name: "counter".into(), ty: int_ty(), array_len: None, init: None, line: 1 }),
        ExternalDecl::Function(FunctionDecl { name: "bump".into(), ret: int_ty(), params: vec![], body: None, line: 1 }),
        ExternalDecl::Function(FunctionDecl {
            name: "read_counter".into(),
            ret: int_ty(),
            params: vec![],
            body: Some(Stmt::Block {
                stmts: vec![
                    Stmt::ExprStmt { expr: Expr::Call { callee: "bump".into(), args: vec![], line: 2 }, line: 2 },
                    Stmt::Return { value: Some(Expr::Ident { name: "counter".into(), line: 3 }), line: 3 },
                ],
                line: 1,
            }),
            line: 1,
        }),
    ]);

    let mut ctx = CompilationContext::new();
    let ir = compile_ir(&prog, &mut ctx).unwrap();
    assert!(ir.contains("call bump"));
}

/// `5 || 0` must reduce each operand to its truthiness before branching, not compare the
/// raw left value against the literal `1`.
#[test]
fn logical_or_reduces_each_operand_to_truthiness_before_branching() {
    let prog = program(vec![ExternalDecl::Function(FunctionDecl {
        name: "f".into(),
        ret: int_ty(),
        params: vec![],
        body: Some(Stmt::Block {
            stmts: vec![Stmt::Return {
                value: Some(Expr::Binary {
                    op: BinaryOp::Or,
                    lhs: Box::new(Expr::IntLit { value: 5, line: 1 }),
                    rhs: Box::new(Expr::IntLit { value: 0, line: 1 }),
                    line: 1,
                }),
                line: 1,
            }],
            line: 1,
        }),
        line: 1,
    })]);

    let mut ctx = CompilationContext::new();
    let ir = compile_ir(&prog, &mut ctx).unwrap();
    assert_eq!(ir.matches("notEquals").count(), 2);
}

/// `a > b` on floats must swap the compare operands rather than reusing `a < b`'s
/// unswapped operand order under `c.lt`.
#[test]
fn float_greater_than_swaps_compare_operands_instead_of_reusing_less_than() {
    let ctx = CompilationContext::new();
    let mut stack = FunctionStack::new();
    stack.add_local("a", Type::double());
    stack.add_local("b", Type::double());
    stack.add_local("dst", Type::int());
    let globals = HashMap::new();
    let mut ec = EmitContext::new(&ctx, &stack, &globals);
    let mut out = String::new();
    let instr = Instr::Equality { dst: "dst".into(), s1: "a".into(), s2: "b".into(), op: EqualityOp::Gt };
    emit_instr(&mut out, &mut ec, &instr, 1).unwrap();
    assert!(out.contains("c.lt.d $f2, $f0"));
}

/// Comparing two unsigned operands must use `sltu`, never the signed `slt`.
#[test]
fn unsigned_operand_comparison_uses_unsigned_set_less_than() {
    let ctx = CompilationContext::new();
    let mut stack = FunctionStack::new();
    stack.add_local("a", Type::uint());
    stack.add_local("b", Type::uint());
    stack.add_local("dst", Type::int());
    let globals = HashMap::new();
    let mut ec = EmitContext::new(&ctx, &stack, &globals);
    let mut out = String::new();
    let instr = Instr::Equality { dst: "dst".into(), s1: "a".into(), s2: "b".into(), op: EqualityOp::Lt };
    emit_instr(&mut out, &mut ec, &instr, 1).unwrap();
    assert!(out.contains("sltu $8, $8, $9"));
    assert!(!out.contains("    slt $8"));
}

/// An 8-byte integer constant (`long long`) must store both its low and high words, not
/// just one.
#[test]
fn eight_byte_integer_constant_stores_both_low_and_high_words() {
    let ctx = CompilationContext::new();
    let mut stack = FunctionStack::new();
    stack.add_local("x", Type::new(BuiltinType::LongLong, 0, true));
    let globals = HashMap::new();
    let mut ec = EmitContext::new(&ctx, &stack, &globals);
    let mut out = String::new();
    let instr = Instr::Constant { dst: "x".into(), ty: Type::new(BuiltinType::LongLong, 0, true), lo: 1, hi: 2 };
    emit_instr(&mut out, &mut ec, &instr, 1).unwrap();
    let off = ec.frame.offset_of("x");
    assert!(out.contains(&format!("sw $8, {off}($fp)")));
    assert!(out.contains(&format!("sw $9, {}($fp)", off + 4)));
}

/// Assigning an 8-byte value through a pointer must write both words at the pointee's
/// address, not drop the high word.
#[test]
fn assign_through_pointer_to_an_eight_byte_value_writes_both_words() {
    let ctx = CompilationContext::new();
    let mut stack = FunctionStack::new();
    stack.add_local("p", Type::new(BuiltinType::LongLong, 0, true).pointer_to());
    stack.add_local("v", Type::new(BuiltinType::LongLong, 0, true));
    let globals = HashMap::new();
    let mut ec = EmitContext::new(&ctx, &stack, &globals);
    let mut out = String::new();
    let instr = Instr::Assign { dst: "p".into(), src: "v".into() };
    emit_instr(&mut out, &mut ec, &instr, 1).unwrap();
    assert!(out.contains("sw $8, 0($10)"));
    assert!(out.contains("sw $9, 4($10)"));
}

/// A local declared with a typedef name must resolve through the typedef table to its
/// aliased builtin, not fall back to a plain `int`.
#[test]
fn typedef_to_a_non_int_builtin_resolves_through_the_typedef_table() {
    let alias_ty = TypeName { builtin: "counter_t".into(), pointer_depth: 0, signed: true, tag: None };
    let prog = program(vec![
        ExternalDecl::Typedef(TypedefDecl {
            alias: "counter_t".into(),
            ty: TypeName { builtin: "long".into(), pointer_depth: 0, signed: true, tag: None },
            line: 1,
        }),
        ExternalDecl::Function(FunctionDecl {
            name: "f".into(),
            ret: int_ty(),
            params: vec![],
            body: Some(Stmt::Block {
                stmts: vec![Stmt::DeclStmt {
                    decl: VarDecl { name: "x".into(), ty: alias_ty, array_len: None, init: None, line: 1 },
                    line: 1,
                }],
                line: 1,
            }),
            line: 1,
        }),
    ]);

    let mut ctx = CompilationContext::new();
    let lowered = lower_program(&prog, &mut ctx).unwrap();
    let ty = lowered.functions[0].stack.get_type("x").unwrap();
    assert_eq!(ty.builtin, BuiltinType::Long);
}

/// `sizeof(x++)` must not lower the increment's side effect, only infer `x`'s type.
#[test]
fn sizeof_on_an_expression_does_not_lower_its_side_effects() {
    let prog = program(vec![ExternalDecl::Function(FunctionDecl {
        name: "f".into(),
        ret: int_ty(),
        params: vec![Param { name: "x".into(), ty: int_ty(), line: 1 }],
        body: Some(Stmt::Block {
            stmts: vec![Stmt::Return {
                value: Some(Expr::SizeofExpr {
                    operand: Box::new(Expr::Unary {
                        op: UnaryOp::PostInc,
                        operand: Box::new(Expr::Ident { name: "x".into(), line: 1 }),
                        line: 1,
                    }),
                    line: 1,
                }),
                line: 1,
            }],
            line: 1,
        }),
        line: 1,
    })]);

    let mut ctx = CompilationContext::new();
    let ir = compile_ir(&prog, &mut ctx).unwrap();
    assert!(!ir.contains("increment"));
    assert!(ir.contains("constant"));
}

/// `s.x++` must resolve through the member's computed address (the same storage
/// resolution `s.x = v` already uses), not reject the member as "not an lvalue".
#[test]
fn increment_on_a_struct_member_resolves_through_its_address() {
    let point_ty = TypeName { builtin: "struct".into(), pointer_depth: 0, signed: true, tag: Some("Point".into()) };
    let prog = program(vec![
        ExternalDecl::Struct(StructDecl {
            tag: "Point".into(),
            members: vec![StructMember { name: "x".into(), ty: int_ty(), array_len: None }],
            line: 1,
        }),
        ExternalDecl::Function(FunctionDecl {
            name: "f".into(),
            ret: int_ty(),
            params: vec![],
            body: Some(Stmt::Block {
                stmts: vec![
                    Stmt::DeclStmt { decl: VarDecl { name: "p".into(), ty: point_ty, array_len: None, init: None, line: 1 }, line: 1 },
                    Stmt::Return {
                        value: Some(Expr::Unary {
                            op: UnaryOp::PostInc,
                            operand: Box::new(Expr::Member {
                                base: Box::new(Expr::Ident { name: "p".into(), line: 2 }),
                                field: "x".into(),
                                arrow: false,
                                line: 2,
                            }),
                            line: 2,
                        }),
                        line: 2,
                    },
                ],
                line: 1,
            }),
            line: 1,
        }),
    ]);

    let mut ctx = CompilationContext::new();
    let ir = compile_ir(&prog, &mut ctx).unwrap();
    assert!(ir.contains("member"));
    assert!(ir.contains("dereference"));
    assert!(ir.contains("increment"));
    assert!(ir.contains("assign"));
}

/// `p - q` on two `int*`s must divide the raw byte difference by `sizeof(int)` to yield
/// an element count, not the byte difference itself.
#[test]
fn pointer_difference_divides_by_the_pointee_size() {
    let prog = program(vec![ExternalDecl::Function(FunctionDecl {
        name: "diff".into(),
        ret: TypeName { builtin: "long".into(), pointer_depth: 0, signed: true, tag: None },
        params: vec![
            Param { name: "p".into(), ty: ptr_ty(int_ty(), 1), line: 1 },
            Param { name: "q".into(), ty: ptr_ty(int_ty(), 1), line: 1 },
        ],
        body: Some(Stmt::Block {
            stmts: vec![Stmt::Return {
                value: Some(Expr::Binary {
                    op: BinaryOp::Sub,
                    lhs: Box::new(Expr::Ident { name: "p".into(), line: 1 }),
                    rhs: Box::new(Expr::Ident { name: "q".into(), line: 1 }),
                    line: 1,
                }),
                line: 1,
            }],
            line: 1,
        }),
        line: 1,
    })]);

    let mut ctx = CompilationContext::new();
    let ir = compile_ir(&prog, &mut ctx).unwrap();
    assert!(ir.contains("sub"));
    assert!(ir.contains("div"));
}

/// A call with more arguments than the callee declares is a variadic tail, not an arity
/// error; a trailing `float` argument promotes to `double` on the way in.
#[test]
fn call_with_more_arguments_than_declared_is_accepted_and_promotes_float_to_double() {
    let prog = program(vec![
        ExternalDecl::Function(FunctionDecl {
            name: "log_value".into(),
            ret: int_ty(),
            params: vec![Param { name: "tag".into(), ty: int_ty(), line: 1 }],
            body: None,
            line: 1,
        }),
        ExternalDecl::Function(FunctionDecl {
            name: "call_site".into(),
            ret: int_ty(),
            params: vec![],
            body: Some(Stmt::Block {
                stmts: vec![Stmt::Return {
                    value: Some(Expr::Call {
                        callee: "log_value".into(),
                        args: vec![
                            Expr::IntLit { value: 1, line: 1 },
                            Expr::Cast {
                                ty: TypeName { builtin: "float".into(), pointer_depth: 0, signed: true, tag: None },
                                operand: Box::new(Expr::FloatLit { value: 2.5, line: 1 }),
                                line: 1,
                            },
                        ],
                        line: 1,
                    }),
                    line: 1,
                }],
                line: 1,
            }),
            line: 1,
        }),
    ]);

    let mut ctx = CompilationContext::new();
    let ir = compile_ir(&prog, &mut ctx).unwrap();
    assert!(ir.matches("cast").count() >= 2);
    assert!(ir.contains("call log_value"));
}

/// A call with fewer arguments than the callee declares is still rejected.
#[test]
fn call_with_fewer_arguments_than_declared_still_errors() {
    let prog = program(vec![
        ExternalDecl::Function(FunctionDecl {
            name: "needs_two".into(),
            ret: int_ty(),
            params: vec![Param { name: "a".into(), ty: int_ty(), line: 1 }, Param { name: "b".into(), ty: int_ty(), line: 1 }],
            body: None,
            line: 1,
        }),
        ExternalDecl::Function(FunctionDecl {
            name: "call_site".into(),
            ret: int_ty(),
            params: vec![],
            body: Some(Stmt::Block {
                stmts: vec![Stmt::Return {
                    value: Some(Expr::Call { callee: "needs_two".into(), args: vec![Expr::IntLit { value: 1, line: 1 }], line: 1 }),
                    line: 1,
                }],
                line: 1,
            }),
            line: 1,
        }),
    ]);

    let mut ctx = CompilationContext::new();
    assert!(compile_ir(&prog, &mut ctx).is_err());
}

/// Struct-to-struct assignment must copy a trailing byte remainder after its 4-byte
/// words, not stop (or overrun) when the size isn't a multiple of 4.
#[test]
fn struct_copy_handles_sizes_that_are_not_a_multiple_of_four_bytes() {
    let mut ctx = CompilationContext::new();
    let mut def = lscc::types::symbol::StructureType::new();
    def.add_member("x", Type::int());
    def.add_member("y", Type::char_ty());
    ctx.structures.insert("Point5".to_string(), def);

    let mut stack = FunctionStack::new();
    stack.add_local("dst", Type::struct_named("Point5"));
    stack.add_local("src", Type::struct_named("Point5"));
    let globals = HashMap::new();
    let mut ec = EmitContext::new(&ctx, &stack, &globals);
    let mut out = String::new();
    let instr = Instr::Assign { dst: "dst".into(), src: "src".into() };
    emit_instr(&mut out, &mut ec, &instr, 1).unwrap();
    assert!(out.contains("lw $10, 0($9)"));
    assert!(out.contains("sw $10, 0($8)"));
    assert!(out.contains("lb $10, 4($9)"));
    assert!(out.contains("sb $10, 4($8)"));
}
