//! AST → IR lowering (spec §4.4). One `FunctionLowering` per function body, threading a
//! [`VariableMap`] for lexical scoping and a [`FunctionStack`] for every local/temporary
//! it allocates, emitting into a flat `Vec<Instr>` — mirrors the shape of
//! `mmcc::build_mir`'s per-function `BasicBlock` builder, minus the block graph (spec
//! §3: "a flat instruction stream, not a basic-block graph").

use crate::ast::{BinaryOp, EnumDecl, Expr, ExternalDecl, FunctionDecl, Program, Stmt, StructDecl, TypedefDecl, TypeName, UnaryOp, VarDecl};
use crate::context::CompilationContext;
use crate::error::{CompileError, Result};
use crate::ir::{BitwiseOp, EqualityOp, Instr, LogicalOp};
use crate::types::symbol::{Binding, FunctionStack, StructureType, VariableMap};
use crate::types::{common_type, pointer_arith_result, BuiltinType, Type};
use hashbrown::HashMap;
use if_chain::if_chain;
use itertools::{EitherOrBoth, Itertools};

/// One lowered function: its emitted name, its local-stack layout, and its flat
/// instruction stream.
pub struct LoweredFunction {
    pub name: String,
    pub stack: FunctionStack,
    pub instrs: Vec<Instr>,
    /// Parameter aliases in declaration order, so the emitter can spill incoming
    /// argument registers to their stack slots in the prologue (spec §4.5).
    pub params: Vec<String>,
}

/// Everything lowering a whole translation unit produces: the lowered functions in
/// declaration order, and the table of global variable types the emitter needs to tell
/// "this alias is a global" from "this alias is a stack local" (spec §4.5).
pub struct LoweredProgram {
    pub functions: Vec<LoweredFunction>,
    pub globals: HashMap<String, Type>,
}

pub fn type_from_name(tn: &TypeName) -> Type {
    let known = matches!(
        tn.builtin.as_str(),
        "void" | "char" | "short" | "int" | "long" | "long long" | "float" | "double" | "long double" | "struct" | "union" | "enum"
    );
    let builtin = match tn.builtin.as_str() {
        "void" => BuiltinType::Void,
        "char" => BuiltinType::Char,
        "short" => BuiltinType::Short,
        "int" => BuiltinType::Int,
        "long" => BuiltinType::Long,
        "long long" => BuiltinType::LongLong,
        "float" => BuiltinType::Float,
        "double" => BuiltinType::Double,
        "long double" => BuiltinType::LongDouble,
        "struct" | "union" => BuiltinType::Struct,
        "enum" => BuiltinType::Enum,
        _ => BuiltinType::Int,
    };
    // An unrecognized builtin string is a typedef alias; stash it in `tag` (otherwise
    // unused for a plain `Int`) so `resolve_typedef` has a name to look up.
    let tag = if known { tn.tag.clone() } else { Some(tn.builtin.clone()) };
    Type { builtin, pointer_depth: tn.pointer_depth, signed: tn.signed, tag }
}

/// Lowers a whole translation unit: installs struct/enum/typedef declarations into the
/// shared [`CompilationContext`], registers global bindings, then lowers each function
/// body in turn.
pub fn lower_program(program: &Program, ctx: &mut CompilationContext) -> Result<LoweredProgram> {
    let mut globals: HashMap<String, Type> = HashMap::new();
    let mut global_vars = VariableMap::new();
    let mut functions = Vec::new();

    for decl in &program.decls {
        match decl {
            ExternalDecl::Struct(s) | ExternalDecl::Union(s) => install_struct(ctx, s)?,
            ExternalDecl::Enum(e) => install_enum(ctx, e),
            ExternalDecl::Typedef(t) => install_typedef(ctx, t)?,
            ExternalDecl::Var(v) => {
                let ty = resolve_typedef(ctx, type_from_name(&v.ty));
                globals.insert(v.name.clone(), ty.clone());
                global_vars.declare(&v.name, Binding::variable(v.name.clone(), ty, true), v.line)?;
            }
            ExternalDecl::Function(f) => {
                let ret = resolve_typedef(ctx, type_from_name(&f.ret));
                let params = f.params.iter().map(|p| resolve_typedef(ctx, type_from_name(&p.ty))).collect();
                global_vars.declare(&f.name, Binding::function(f.name.clone(), ret, params), f.line)?;
            }
        }
    }

    for decl in &program.decls {
        if let ExternalDecl::Function(f) = decl {
            if f.body.is_some() {
                functions.push(lower_function(f, ctx, &global_vars)?);
            }
        }
    }

    Ok(LoweredProgram { functions, globals })
}

fn install_struct(ctx: &mut CompilationContext, s: &StructDecl) -> Result<()> {
    let mut def = StructureType::new();
    for m in &s.members {
        let ty = resolve_typedef(ctx, type_from_name(&m.ty));
        match m.array_len {
            Some(n) => def.add_array_member(m.name.clone(), ty, n),
            None => def.add_member(m.name.clone(), ty),
        }
    }
    ctx.declare_struct(&s.tag, def, s.line)
}

fn install_enum(ctx: &mut CompilationContext, e: &EnumDecl) {
    for m in &e.members {
        ctx.declare_enum_member(&e.tag, &m.name, m.value);
    }
}

fn install_typedef(ctx: &mut CompilationContext, t: &TypedefDecl) -> Result<()> {
    let ty = resolve_typedef(ctx, type_from_name(&t.ty));
    ctx.declare_typedef(&t.alias, ty, t.line)
}

/// Expands one level of typedef aliasing. Typedefs never chain through another typedef
/// at declaration time in this lowering (each is resolved to its underlying builtin as
/// soon as it is declared), so a single lookup suffices here.
fn resolve_typedef(ctx: &CompilationContext, ty: Type) -> Type {
    if ty.builtin != BuiltinType::Int {
        return ty;
    }
    let Some(alias) = ty.tag.as_deref() else { return ty };
    match ctx.typedef_get(alias) {
        Some(resolved) => {
            let mut resolved = resolved.clone();
            resolved.pointer_depth += ty.pointer_depth;
            resolved
        }
        None => ty,
    }
}

/// Where an lvalue's storage lives: a named alias with its own stack slot, or a
/// computed address already sitting in a temporary.
enum Lvalue {
    Alias(String, Type),
    Address(String, Type),
}

struct FunctionLowering<'a> {
    ctx: &'a mut CompilationContext,
    vars: VariableMap,
    stack: FunctionStack,
    instrs: Vec<Instr>,
}

fn lower_function(f: &FunctionDecl, ctx: &mut CompilationContext, globals: &VariableMap) -> Result<LoweredFunction> {
    let mut fl = FunctionLowering { ctx, vars: clone_global_scope(globals), stack: FunctionStack::new(), instrs: Vec::new() };

    fl.vars.enter_scope();
    let mut params = Vec::new();
    for p in &f.params {
        let ty = resolve_typedef(fl.ctx, type_from_name(&p.ty));
        fl.stack.add_local(&p.name, ty.clone());
        fl.vars.declare(&p.name, Binding::variable(p.name.clone(), ty, false), p.line)?;
        params.push(p.name.clone());
    }
    if let Some(body) = &f.body {
        fl.lower_stmt(body)?;
    }
    fl.instrs.push(Instr::Return(None));
    fl.vars.leave_scope();

    Ok(LoweredFunction { name: f.name.clone(), stack: fl.stack, instrs: fl.instrs, params })
}

/// Seeds a function's lexical scope with every global/function binding visible at file
/// scope. Scope storage is never shared between two `VariableMap`s, so this forks a
/// fresh map rather than nesting the function's scope inside the original.
fn clone_global_scope(globals: &VariableMap) -> VariableMap {
    globals.fork()
}

impl<'a> FunctionLowering<'a> {
    fn lower_stmt(&mut self, s: &Stmt) -> Result<()> {
        match s {
            Stmt::Block { stmts, .. } => {
                self.vars.enter_scope();
                for st in stmts {
                    self.lower_stmt(st)?;
                }
                self.vars.leave_scope();
                Ok(())
            }
            Stmt::DeclStmt { decl, .. } => self.lower_decl(decl),
            Stmt::ExprStmt { expr, .. } => {
                self.lower_expr(expr)?;
                Ok(())
            }
            Stmt::If { cond, then_branch, else_branch, line } => {
                let (c, _) = self.lower_expr(cond)?;
                let else_label = self.ctx.fresh_label();
                let end_label = self.ctx.fresh_label();
                self.instrs.push(Instr::GotoIfEqual { label: else_label.clone(), var: c, value: 0 });
                self.lower_stmt(then_branch)?;
                self.instrs.push(Instr::Goto(end_label.clone()));
                self.instrs.push(Instr::Label(else_label));
                if let Some(eb) = else_branch {
                    self.lower_stmt(eb)?;
                }
                self.instrs.push(Instr::Label(end_label));
                let _ = line;
                Ok(())
            }
            Stmt::While { cond, body, .. } => {
                let top = self.ctx.fresh_label();
                let end = self.ctx.fresh_label();
                self.instrs.push(Instr::Label(top.clone()));
                let (c, _) = self.lower_expr(cond)?;
                self.instrs.push(Instr::GotoIfEqual { label: end.clone(), var: c, value: 0 });
                let old_break = std::mem::replace(&mut self.vars.break_destination, end.clone());
                let old_cont = std::mem::replace(&mut self.vars.continue_destination, top.clone());
                self.lower_stmt(body)?;
                self.vars.break_destination = old_break;
                self.vars.continue_destination = old_cont;
                self.instrs.push(Instr::Goto(top));
                self.instrs.push(Instr::Label(end));
                Ok(())
            }
            Stmt::DoWhile { body, cond, .. } => {
                let top = self.ctx.fresh_label();
                let cont = self.ctx.fresh_label();
                let end = self.ctx.fresh_label();
                self.instrs.push(Instr::Label(top.clone()));
                let old_break = std::mem::replace(&mut self.vars.break_destination, end.clone());
                let old_cont = std::mem::replace(&mut self.vars.continue_destination, cont.clone());
                self.lower_stmt(body)?;
                self.vars.break_destination = old_break;
                self.vars.continue_destination = old_cont;
                self.instrs.push(Instr::Label(cont));
                let (c, _) = self.lower_expr(cond)?;
                self.instrs.push(Instr::GotoIfEqual { label: end.clone(), var: c, value: 0 });
                self.instrs.push(Instr::Goto(top));
                self.instrs.push(Instr::Label(end));
                Ok(())
            }
            Stmt::For { init, cond, step, body, .. } => {
                self.vars.enter_scope();
                if let Some(i) = init {
                    self.lower_stmt(i)?;
                }
                let top = self.ctx.fresh_label();
                let cont = self.ctx.fresh_label();
                let end = self.ctx.fresh_label();
                self.instrs.push(Instr::Label(top.clone()));
                if let Some(c) = cond {
                    let (cv, _) = self.lower_expr(c)?;
                    self.instrs.push(Instr::GotoIfEqual { label: end.clone(), var: cv, value: 0 });
                }
                let old_break = std::mem::replace(&mut self.vars.break_destination, end.clone());
                let old_cont = std::mem::replace(&mut self.vars.continue_destination, cont.clone());
                self.lower_stmt(body)?;
                self.vars.break_destination = old_break;
                self.vars.continue_destination = old_cont;
                self.instrs.push(Instr::Label(cont));
                if let Some(st) = step {
                    self.lower_expr(st)?;
                }
                self.instrs.push(Instr::Goto(top));
                self.instrs.push(Instr::Label(end));
                self.vars.leave_scope();
                Ok(())
            }
            Stmt::Switch { scrutinee, body, .. } => {
                let (sv, _) = self.lower_expr(scrutinee)?;
                let end = self.ctx.fresh_label();
                let old_break = std::mem::replace(&mut self.vars.break_destination, end.clone());
                // A linear chain of GotoIfEqual per `case`, matching the no-fallthrough
                // simplification noted as an implementation choice for this subset.
                if let Stmt::Block { stmts, .. } = body.as_ref() {
                    let mut case_labels = Vec::new();
                    let mut default_label = None;
                    for st in stmts {
                        match st {
                            Stmt::Case { value, .. } => {
                                let l = self.ctx.fresh_label();
                                self.instrs.push(Instr::GotoIfEqual { label: l.clone(), var: sv.clone(), value: *value });
                                case_labels.push(l);
                            }
                            Stmt::Default { .. } => {
                                default_label = Some(self.ctx.fresh_label());
                            }
                            _ => {}
                        }
                    }
                    if let Some(dl) = &default_label {
                        self.instrs.push(Instr::Goto(dl.clone()));
                    } else {
                        self.instrs.push(Instr::Goto(end.clone()));
                    }
                    let mut case_idx = 0;
                    for st in stmts {
                        match st {
                            Stmt::Case { .. } => {
                                self.instrs.push(Instr::Label(case_labels[case_idx].clone()));
                                case_idx += 1;
                            }
                            Stmt::Default { .. } => {
                                self.instrs.push(Instr::Label(default_label.clone().unwrap()));
                            }
                            other => self.lower_stmt(other)?,
                        }
                    }
                }
                self.vars.break_destination = old_break;
                self.instrs.push(Instr::Label(end));
                Ok(())
            }
            Stmt::Case { .. } | Stmt::Default { .. } => Ok(()),
            Stmt::Return { value, line } => {
                match value {
                    Some(e) => {
                        let (v, _) = self.lower_expr(e)?;
                        self.instrs.push(Instr::Return(Some(v)));
                    }
                    None => self.instrs.push(Instr::Return(None)),
                }
                let _ = line;
                Ok(())
            }
            Stmt::Break { line } => {
                if self.vars.break_destination.is_empty() {
                    return Err(CompileError::InvalidOperand { message: "break outside a loop/switch".to_string(), line: *line });
                }
                self.instrs.push(Instr::Goto(self.vars.break_destination.clone()));
                Ok(())
            }
            Stmt::Continue { line } => {
                if self.vars.continue_destination.is_empty() {
                    return Err(CompileError::InvalidOperand { message: "continue outside a loop".to_string(), line: *line });
                }
                self.instrs.push(Instr::Goto(self.vars.continue_destination.clone()));
                Ok(())
            }
        }
    }

    fn lower_decl(&mut self, decl: &VarDecl) -> Result<()> {
        let ty = resolve_typedef(self.ctx, type_from_name(&decl.ty));
        match decl.array_len {
            Some(n) => self.stack.add_array(&decl.name, ty.clone(), n),
            None => self.stack.add_local(&decl.name, ty.clone()),
        }
        self.vars.declare(&decl.name, Binding::variable(decl.name.clone(), ty.clone(), false), decl.line)?;
        if let Some(init) = &decl.init {
            let (v, _) = self.lower_expr(init)?;
            self.instrs.push(Instr::Move { dst: decl.name.clone(), src: v });
        }
        Ok(())
    }

    /// Lowers an rvalue expression, returning the temporary (or existing alias) holding
    /// its value and the value's static type.
    fn lower_expr(&mut self, e: &Expr) -> Result<(String, Type)> {
        match e {
            Expr::Ident { name, line } => {
                let b = self.vars.lookup(name, *line)?;
                Ok((b.alias.clone(), b.ty.clone()))
            }
            Expr::IntLit { value, .. } => {
                let dst = self.ctx.fresh_temp();
                let ty = Type::int();
                self.stack.add_local(&dst, ty.clone());
                self.instrs.push(Instr::Constant { dst: dst.clone(), ty: ty.clone(), lo: *value as u32, hi: (*value >> 32) as u32 });
                Ok((dst, ty))
            }
            Expr::FloatLit { value, .. } => {
                let dst = self.ctx.fresh_temp();
                let ty = Type::double();
                self.stack.add_local(&dst, ty.clone());
                let bits = value.to_bits();
                self.instrs.push(Instr::Constant { dst: dst.clone(), ty: ty.clone(), lo: bits as u32, hi: (bits >> 32) as u32 });
                Ok((dst, ty))
            }
            Expr::CharLit { value, .. } => {
                let dst = self.ctx.fresh_temp();
                let ty = Type::char_ty();
                self.stack.add_local(&dst, ty.clone());
                self.instrs.push(Instr::Constant { dst: dst.clone(), ty: ty.clone(), lo: *value as u32, hi: 0 });
                Ok((dst, ty))
            }
            Expr::StringLit { value, .. } => {
                let dst = self.ctx.fresh_temp();
                let ty = Type::char_ty().pointer_to();
                self.stack.add_local(&dst, ty.clone());
                let mut bytes = value.as_bytes().to_vec();
                bytes.push(0);
                self.instrs.push(Instr::StringLit { dst: dst.clone(), bytes });
                Ok((dst, ty))
            }
            Expr::Unary { op, operand, line } => self.lower_unary(*op, operand, *line),
            Expr::Binary { op, lhs, rhs, line } => self.lower_binary(*op, lhs, rhs, *line),
            Expr::Assign { lhs, rhs, line } => self.lower_assign(lhs, rhs, *line),
            Expr::CompoundAssign { op, lhs, rhs, line } => {
                let synthetic = Expr::Binary { op: *op, lhs: lhs.clone(), rhs: rhs.clone(), line: *line };
                self.lower_assign(lhs, &synthetic, *line)
            }
            Expr::Ternary { cond, then_expr, else_expr, line } => {
                let (c, _) = self.lower_expr(cond)?;
                let else_label = self.ctx.fresh_label();
                let end_label = self.ctx.fresh_label();
                let dst = self.ctx.fresh_temp();
                self.instrs.push(Instr::GotoIfEqual { label: else_label.clone(), var: c, value: 0 });
                let (tv, tty) = self.lower_expr(then_expr)?;
                self.stack.add_local(&dst, tty.clone());
                self.instrs.push(Instr::Move { dst: dst.clone(), src: tv });
                self.instrs.push(Instr::Goto(end_label.clone()));
                self.instrs.push(Instr::Label(else_label));
                let (ev, _) = self.lower_expr(else_expr)?;
                self.instrs.push(Instr::Move { dst: dst.clone(), src: ev });
                self.instrs.push(Instr::Label(end_label));
                let _ = line;
                Ok((dst, tty))
            }
            Expr::Call { callee, args, line } => {
                let binding = self.vars.lookup(callee, *line)?.clone();
                // `zip_longest` pairs supplied args against declared params one-for-one: a
                // `Right` remainder (more params than args) is a missing argument, but a
                // `Left` remainder (more args than params) is an accepted variadic tail.
                let mut arg_vals = Vec::new();
                for pair in args.iter().zip_longest(binding.params.iter()) {
                    match pair {
                        EitherOrBoth::Right(_) => {
                            return Err(CompileError::ArityMismatch {
                                name: callee.clone(),
                                expected: binding.params.len(),
                                found: args.len(),
                                line: *line,
                            });
                        }
                        EitherOrBoth::Both(a, _) => {
                            let (v, _) = self.lower_expr(a)?;
                            arg_vals.push(v);
                        }
                        EitherOrBoth::Left(a) => {
                            let (v, vty) = self.lower_expr(a)?;
                            arg_vals.push(self.promote_variadic_arg(v, &vty));
                        }
                    }
                }
                let ret_ty = binding.ty.clone();
                let dst = if ret_ty.is_void() {
                    None
                } else {
                    let d = self.ctx.fresh_temp();
                    self.stack.add_local(&d, ret_ty.clone());
                    Some(d)
                };
                self.instrs.push(Instr::FunctionCall { dst: dst.clone(), function: callee.clone(), args: arg_vals });
                Ok((dst.unwrap_or_default(), ret_ty))
            }
            Expr::Member { base, field, arrow, line } => {
                let (addr, struct_ty) = self.lower_member_address(base, *arrow, *line)?;
                let tag = struct_ty.tag.clone().unwrap_or_default();
                let mut found = None;
                if_chain! {
                    if let Some(def) = self.ctx.structures.get(&tag);
                    if let Some(member_ty) = def.get_member_type(field);
                    then {
                        found = Some((def.get_member_offset(field, self.ctx), member_ty.clone()));
                    }
                }
                let (offset, member_ty) = found.ok_or_else(|| CompileError::TypeMismatch {
                    message: format!("no member named '{field}' in struct '{tag}'"),
                    line: *line,
                })?;
                let dst = self.ctx.fresh_temp();
                self.stack.add_local(&dst, member_ty.clone());
                self.instrs.push(Instr::MemberAccess { dst: dst.clone(), base: addr, offset });
                Ok((dst, member_ty))
            }
            Expr::Subscript { base, index, line } => {
                let (addr, elem_ty) = self.lower_subscript_address(base, index, *line)?;
                let dst = self.ctx.fresh_temp();
                self.stack.add_local(&dst, elem_ty.clone());
                self.instrs.push(Instr::Dereference { dst: dst.clone(), src: addr });
                Ok((dst, elem_ty))
            }
            Expr::Cast { ty, operand, line } => {
                let (v, _) = self.lower_expr(operand)?;
                let target = resolve_typedef(self.ctx, type_from_name(ty));
                let dst = self.ctx.fresh_temp();
                self.stack.add_local(&dst, target.clone());
                self.instrs.push(Instr::Cast { dst: dst.clone(), src: v, ty: target.clone() });
                let _ = line;
                Ok((dst, target))
            }
            Expr::SizeofExpr { operand, line } => {
                let ty = self.static_type(operand)?;
                self.make_size_constant(ty.bytes(self.ctx), *line)
            }
            Expr::SizeofType { ty, line } => {
                let resolved = resolve_typedef(self.ctx, type_from_name(ty));
                self.make_size_constant(resolved.bytes(self.ctx), *line)
            }
        }
    }

    /// Default argument promotion for a variadic call's trailing (undeclared) arguments:
    /// a bare `float` widens to `double`, matching C's variadic-call promotion rule.
    /// Every other type passes through unchanged.
    fn promote_variadic_arg(&mut self, v: String, ty: &Type) -> String {
        if ty.is_float() && ty.bytes(self.ctx) == 4 {
            let dst = self.ctx.fresh_temp();
            let double_ty = Type::double();
            self.stack.add_local(&dst, double_ty.clone());
            self.instrs.push(Instr::Cast { dst: dst.clone(), src: v, ty: double_ty });
            dst
        } else {
            v
        }
    }

    fn make_size_constant(&mut self, size: u32, _line: u32) -> Result<(String, Type)> {
        let dst = self.ctx.fresh_temp();
        let ty = Type::new(BuiltinType::Long, 0, false);
        self.stack.add_local(&dst, ty.clone());
        self.instrs.push(Instr::Constant { dst: dst.clone(), ty: ty.clone(), lo: size, hi: 0 });
        Ok((dst, ty))
    }

    fn lower_unary(&mut self, op: UnaryOp, operand: &Expr, line: u32) -> Result<(String, Type)> {
        match op {
            UnaryOp::Plus => self.lower_expr(operand),
            UnaryOp::Minus => {
                let (v, ty) = self.lower_expr(operand)?;
                let dst = self.ctx.fresh_temp();
                self.stack.add_local(&dst, ty.clone());
                self.instrs.push(Instr::Negative { dst: dst.clone(), src: v });
                Ok((dst, ty))
            }
            UnaryOp::Not => {
                let (v, _) = self.lower_expr(operand)?;
                let dst = self.ctx.fresh_temp();
                let ty = Type::int();
                self.stack.add_local(&dst, ty.clone());
                self.instrs.push(Instr::Logical { dst: dst.clone(), s1: v, s2: None, op: LogicalOp::Not });
                Ok((dst, ty))
            }
            UnaryOp::BitNot => {
                let (v, ty) = self.lower_expr(operand)?;
                if !ty.is_integer() {
                    return Err(CompileError::InvalidOperand { message: "'~' requires an integer operand".to_string(), line });
                }
                let dst = self.ctx.fresh_temp();
                self.stack.add_local(&dst, ty.clone());
                self.instrs.push(Instr::Bitwise { dst: dst.clone(), s1: v, s2: None, op: BitwiseOp::Not });
                Ok((dst, ty))
            }
            UnaryOp::PreInc | UnaryOp::PreDec | UnaryOp::PostInc | UnaryOp::PostDec => {
                let decrement = matches!(op, UnaryOp::PreDec | UnaryOp::PostDec);
                let post = matches!(op, UnaryOp::PostInc | UnaryOp::PostDec);
                match self.lower_lvalue(operand, line)? {
                    Lvalue::Alias(alias, ty) => {
                        if post {
                            let saved = self.ctx.fresh_temp();
                            self.stack.add_local(&saved, ty.clone());
                            self.instrs.push(Instr::Move { dst: saved.clone(), src: alias.clone() });
                            self.instrs.push(Instr::Increment { dst: alias, src: saved.clone(), decrement });
                            Ok((saved, ty))
                        } else {
                            let dst = self.ctx.fresh_temp();
                            self.stack.add_local(&dst, ty.clone());
                            self.instrs.push(Instr::Increment { dst: dst.clone(), src: alias, decrement });
                            Ok((dst, ty))
                        }
                    }
                    Lvalue::Address(addr, ty) => {
                        let old = self.ctx.fresh_temp();
                        self.stack.add_local(&old, ty.clone());
                        self.instrs.push(Instr::Dereference { dst: old.clone(), src: addr.clone() });
                        let new = self.ctx.fresh_temp();
                        self.stack.add_local(&new, ty.clone());
                        self.instrs.push(Instr::Increment { dst: new.clone(), src: old.clone(), decrement });
                        self.instrs.push(Instr::Assign { dst: addr, src: new.clone() });
                        Ok((if post { old } else { new }, ty))
                    }
                }
            }
            UnaryOp::Deref => {
                let (v, ty) = self.lower_expr(operand)?;
                if !ty.is_pointer() {
                    return Err(CompileError::InvalidOperand { message: "cannot dereference a non-pointer".to_string(), line });
                }
                let dst = self.ctx.fresh_temp();
                let pointee = ty.dereference();
                self.stack.add_local(&dst, pointee.clone());
                self.instrs.push(Instr::Dereference { dst: dst.clone(), src: v });
                Ok((dst, pointee))
            }
            UnaryOp::AddressOf => match self.lower_lvalue(operand, line)? {
                Lvalue::Alias(alias, ty) => {
                    let dst = self.ctx.fresh_temp();
                    let ptr_ty = ty.pointer_to();
                    self.stack.add_local(&dst, ptr_ty.clone());
                    self.instrs.push(Instr::AddressOf { dst: dst.clone(), src: alias });
                    Ok((dst, ptr_ty))
                }
                Lvalue::Address(addr, ty) => Ok((addr, ty.pointer_to())),
            },
            UnaryOp::Sizeof => {
                let ty = self.static_type(operand)?;
                self.make_size_constant(ty.bytes(self.ctx), line)
            }
        }
    }

    /// Infers an expression's static type without lowering it, so `sizeof` never
    /// evaluates the operand's side effects (spec §4.1). Mirrors `lower_expr`'s
    /// type-inference logic one-for-one but never pushes to `self.instrs` or mints a
    /// temporary.
    fn static_type(&self, e: &Expr) -> Result<Type> {
        match e {
            Expr::Ident { name, line } => Ok(self.vars.lookup(name, *line)?.ty.clone()),
            Expr::IntLit { .. } => Ok(Type::int()),
            Expr::FloatLit { .. } => Ok(Type::double()),
            Expr::CharLit { .. } => Ok(Type::char_ty()),
            Expr::StringLit { .. } => Ok(Type::char_ty().pointer_to()),
            Expr::Unary { op, operand, line } => self.static_unary_type(*op, operand, *line),
            Expr::Binary { op, lhs, rhs, line } => self.static_binary_type(*op, lhs, rhs, *line),
            Expr::Assign { lhs, .. } => self.static_type(lhs),
            Expr::CompoundAssign { lhs, .. } => self.static_type(lhs),
            Expr::Ternary { then_expr, .. } => self.static_type(then_expr),
            Expr::Call { callee, line, .. } => Ok(self.vars.lookup(callee, *line)?.ty.clone()),
            Expr::Member { base, field, arrow, line } => self.static_member_type(base, field, *arrow, *line),
            Expr::Subscript { base, index, line } => self.static_subscript_type(base, index, *line),
            Expr::Cast { ty, .. } => Ok(resolve_typedef(self.ctx, type_from_name(ty))),
            Expr::SizeofExpr { .. } | Expr::SizeofType { .. } => Ok(Type::new(BuiltinType::Long, 0, false)),
        }
    }

    fn static_unary_type(&self, op: UnaryOp, operand: &Expr, line: u32) -> Result<Type> {
        match op {
            UnaryOp::Plus | UnaryOp::Minus | UnaryOp::BitNot | UnaryOp::PreInc | UnaryOp::PreDec | UnaryOp::PostInc | UnaryOp::PostDec => {
                self.static_type(operand)
            }
            UnaryOp::Not => Ok(Type::int()),
            UnaryOp::Deref => {
                let ty = self.static_type(operand)?;
                if !ty.is_pointer() {
                    return Err(CompileError::InvalidOperand { message: "cannot dereference a non-pointer".to_string(), line });
                }
                Ok(ty.dereference())
            }
            UnaryOp::AddressOf => Ok(self.static_type(operand)?.pointer_to()),
            UnaryOp::Sizeof => Ok(Type::new(BuiltinType::Long, 0, false)),
        }
    }

    fn static_binary_type(&self, op: BinaryOp, lhs: &Expr, rhs: &Expr, line: u32) -> Result<Type> {
        if matches!(op, BinaryOp::And | BinaryOp::Or) {
            return Ok(Type::int());
        }
        let lty = self.static_type(lhs)?;
        let rty = self.static_type(rhs)?;
        match op {
            BinaryOp::Add | BinaryOp::Sub => {
                let op_ch = if op == BinaryOp::Add { '+' } else { '-' };
                pointer_arith_result(&lty, &rty, op_ch, line)
            }
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod | BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor => {
                Ok(common_type(&lty, &rty))
            }
            BinaryOp::Shl | BinaryOp::Shr => Ok(lty),
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => Ok(Type::int()),
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        }
    }

    fn static_member_type(&self, base: &Expr, field: &str, arrow: bool, line: u32) -> Result<Type> {
        let struct_ty = if arrow { self.static_type(base)?.dereference() } else { self.static_type(base)? };
        let tag = struct_ty.tag.clone().unwrap_or_default();
        self.ctx
            .structures
            .get(&tag)
            .and_then(|def| def.get_member_type(field).cloned())
            .ok_or_else(|| CompileError::TypeMismatch { message: format!("no member named '{field}' in struct '{tag}'"), line })
    }

    fn static_subscript_type(&self, base: &Expr, _index: &Expr, line: u32) -> Result<Type> {
        match base {
            Expr::Ident { name, .. } => {
                let b = self.vars.lookup(name, line)?;
                match self.stack.get_array(&b.alias) {
                    Some(arr) => Ok(arr.element.clone()),
                    None => Ok(b.ty.dereference()),
                }
            }
            _ => Ok(self.static_type(base)?.dereference()),
        }
    }

    /// Resolves an expression that designates storage: either a named alias (a bare
    /// identifier's stack slot) or a computed address already held in a temporary (a
    /// member, subscript, or deref expression). Every lvalue operation — assignment,
    /// increment/decrement, `&` — goes through this so `arr[i]++`, `&s.field`, and
    /// `s.field = v` all resolve storage the same way instead of each reimplementing it.
    fn lower_lvalue(&mut self, e: &Expr, line: u32) -> Result<Lvalue> {
        match e {
            Expr::Ident { name, .. } => {
                let b = self.vars.lookup(name, line)?;
                Ok(Lvalue::Alias(b.alias.clone(), b.ty.clone()))
            }
            Expr::Member { base, field, arrow, .. } => {
                let (addr, struct_ty) = self.lower_member_address(base, *arrow, line)?;
                let tag = struct_ty.tag.as_deref().unwrap_or("");
                let def = self.ctx.structures.get(tag).cloned().ok_or_else(|| CompileError::TypeMismatch {
                    message: format!("'{tag}' is not a known struct"),
                    line,
                })?;
                let offset = def.get_member_offset(field, self.ctx);
                let member_ty = def.get_member_type(field).cloned().unwrap_or_else(Type::int);
                let field_addr = self.ctx.fresh_temp();
                self.stack.add_local(&field_addr, member_ty.clone().pointer_to());
                self.instrs.push(Instr::MemberAccess { dst: field_addr.clone(), base: addr, offset });
                Ok(Lvalue::Address(field_addr, member_ty))
            }
            Expr::Subscript { base, index, .. } => {
                let (addr, elem_ty) = self.lower_subscript_address(base, index, line)?;
                Ok(Lvalue::Address(addr, elem_ty))
            }
            Expr::Unary { op: UnaryOp::Deref, operand, .. } => {
                let (addr, ty) = self.lower_expr(operand)?;
                Ok(Lvalue::Address(addr, ty.dereference()))
            }
            _ => Err(CompileError::NotAnLvalue { line }),
        }
    }

    fn lower_member_address(&mut self, base: &Expr, arrow: bool, line: u32) -> Result<(String, Type)> {
        if arrow {
            let (v, ty) = self.lower_expr(base)?;
            Ok((v, ty.dereference()))
        } else {
            match self.lower_lvalue(base, line)? {
                Lvalue::Alias(alias, ty) => {
                    let dst = self.ctx.fresh_temp();
                    self.stack.add_local(&dst, ty.clone().pointer_to());
                    self.instrs.push(Instr::AddressOf { dst: dst.clone(), src: alias });
                    Ok((dst, ty))
                }
                Lvalue::Address(addr, ty) => Ok((addr, ty)),
            }
        }
    }

    fn lower_subscript_address(&mut self, base: &Expr, index: &Expr, line: u32) -> Result<(String, Type)> {
        let (base_addr, base_ty) = match base {
            Expr::Ident { name, .. } => {
                let b = self.vars.lookup(name, line)?.clone();
                if let Some(arr) = self.stack.get_array(&b.alias).cloned() {
                    let a = self.ctx.fresh_temp();
                    self.stack.add_local(&a, arr.element.clone().pointer_to());
                    self.instrs.push(Instr::AddressOf { dst: a.clone(), src: b.alias.clone() });
                    (a, arr.element)
                } else {
                    (b.alias.clone(), b.ty.dereference())
                }
            }
            _ => {
                let (v, ty) = self.lower_expr(base)?;
                (v, ty.dereference())
            }
        };
        let (iv, _) = self.lower_expr(index)?;
        let elem_size = base_ty.bytes(self.ctx);
        let scale = self.ctx.fresh_temp();
        self.stack.add_local(&scale, Type::int());
        let size_const = self.ctx.fresh_temp();
        self.stack.add_local(&size_const, Type::int());
        self.instrs.push(Instr::Constant { dst: size_const.clone(), ty: Type::int(), lo: elem_size, hi: 0 });
        self.instrs.push(Instr::Mul { dst: scale.clone(), s1: iv, s2: size_const });
        let addr = self.ctx.fresh_temp();
        self.stack.add_local(&addr, base_ty.clone().pointer_to());
        self.instrs.push(Instr::Add { dst: addr.clone(), s1: base_addr, s2: scale });
        Ok((addr, base_ty))
    }

    fn lower_assign(&mut self, lhs: &Expr, rhs: &Expr, line: u32) -> Result<(String, Type)> {
        match self.lower_lvalue(lhs, line)? {
            Lvalue::Alias(alias, ty) => {
                let (v, _) = self.lower_expr(rhs)?;
                self.instrs.push(Instr::Move { dst: alias, src: v.clone() });
                Ok((v, ty))
            }
            Lvalue::Address(addr, ty) => {
                let (v, _) = self.lower_expr(rhs)?;
                self.instrs.push(Instr::Assign { dst: addr, src: v.clone() });
                Ok((v, ty))
            }
        }
    }

    fn lower_binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr, line: u32) -> Result<(String, Type)> {
        if matches!(op, BinaryOp::And | BinaryOp::Or) {
            return self.lower_short_circuit(op, lhs, rhs, line);
        }
        let (l, lty) = self.lower_expr(lhs)?;
        let (r, rty) = self.lower_expr(rhs)?;
        match op {
            BinaryOp::Add | BinaryOp::Sub => {
                let op_ch = if op == BinaryOp::Add { '+' } else { '-' };
                let result_ty = pointer_arith_result(&lty, &rty, op_ch, line)?;
                // `ptr - ptr` yields an element count: the raw byte difference divided by
                // the pointee size, not the byte difference itself.
                if op == BinaryOp::Sub && lty.is_pointer() && rty.is_pointer() {
                    let raw = self.ctx.fresh_temp();
                    self.stack.add_local(&raw, result_ty.clone());
                    self.instrs.push(Instr::Sub { dst: raw.clone(), s1: l, s2: r });
                    let elem_size = lty.dereference().bytes(self.ctx).max(1);
                    let dst = self.ctx.fresh_temp();
                    self.stack.add_local(&dst, result_ty.clone());
                    if elem_size == 1 {
                        self.instrs.push(Instr::Move { dst: dst.clone(), src: raw });
                    } else {
                        let size_const = self.ctx.fresh_temp();
                        self.stack.add_local(&size_const, Type::int());
                        self.instrs.push(Instr::Constant { dst: size_const.clone(), ty: Type::int(), lo: elem_size, hi: 0 });
                        self.instrs.push(Instr::Div { dst: dst.clone(), s1: raw, s2: size_const });
                    }
                    return Ok((dst, result_ty));
                }
                let dst = self.ctx.fresh_temp();
                self.stack.add_local(&dst, result_ty.clone());
                let (l, r) = self.scale_pointer_operand(&lty, &rty, l, r, result_ty.is_pointer())?;
                self.instrs.push(if op == BinaryOp::Add {
                    Instr::Add { dst: dst.clone(), s1: l, s2: r }
                } else {
                    Instr::Sub { dst: dst.clone(), s1: l, s2: r }
                });
                Ok((dst, result_ty))
            }
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                let result_ty = common_type(&lty, &rty);
                let dst = self.ctx.fresh_temp();
                self.stack.add_local(&dst, result_ty.clone());
                self.instrs.push(match op {
                    BinaryOp::Mul => Instr::Mul { dst: dst.clone(), s1: l, s2: r },
                    BinaryOp::Div => Instr::Div { dst: dst.clone(), s1: l, s2: r },
                    _ => Instr::Mod { dst: dst.clone(), s1: l, s2: r },
                });
                Ok((dst, result_ty))
            }
            BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor => {
                if !lty.is_integer() || !rty.is_integer() {
                    return Err(CompileError::InvalidOperand { message: "bitwise operators require integer operands".to_string(), line });
                }
                let result_ty = common_type(&lty, &rty);
                let dst = self.ctx.fresh_temp();
                self.stack.add_local(&dst, result_ty.clone());
                let bop = match op {
                    BinaryOp::BitAnd => BitwiseOp::And,
                    BinaryOp::BitOr => BitwiseOp::Or,
                    _ => BitwiseOp::Xor,
                };
                self.instrs.push(Instr::Bitwise { dst: dst.clone(), s1: l, s2: Some(r), op: bop });
                Ok((dst, result_ty))
            }
            BinaryOp::Shl | BinaryOp::Shr => {
                let dst = self.ctx.fresh_temp();
                self.stack.add_local(&dst, lty.clone());
                self.instrs.push(Instr::Shift { dst: dst.clone(), s1: l, s2: r, right: op == BinaryOp::Shr });
                Ok((dst, lty))
            }
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => {
                let dst = self.ctx.fresh_temp();
                let result_ty = Type::int();
                self.stack.add_local(&dst, result_ty.clone());
                let eop = match op {
                    BinaryOp::Eq => EqualityOp::Eq,
                    BinaryOp::Ne => EqualityOp::Ne,
                    BinaryOp::Lt => EqualityOp::Lt,
                    BinaryOp::Gt => EqualityOp::Gt,
                    BinaryOp::Le => EqualityOp::Le,
                    _ => EqualityOp::Ge,
                };
                self.instrs.push(Instr::Equality { dst: dst.clone(), s1: l, s2: r, op: eop });
                Ok((dst, result_ty))
            }
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        }
    }

    /// When one operand of `+`/`-` is a pointer and the other an integer, scales the
    /// integer operand by the pointee size (spec §4.1's pointer-arithmetic rule); leaves
    /// both operands untouched for `ptr - ptr` (the subtraction itself divides by the
    /// element size at the type level, not here — see spec §9a open question 1) and for
    /// plain integer arithmetic.
    fn scale_pointer_operand(&mut self, lty: &Type, rty: &Type, l: String, r: String, result_is_pointer: bool) -> Result<(String, String)> {
        if !result_is_pointer {
            return Ok((l, r));
        }
        let (ptr_ty, int_side_is_right) = if lty.is_pointer() { (lty, true) } else { (rty, false) };
        let elem_size = ptr_ty.dereference().bytes(self.ctx).max(1);
        if elem_size == 1 {
            return Ok((l, r));
        }
        let size_const = self.ctx.fresh_temp();
        self.stack.add_local(&size_const, Type::int());
        self.instrs.push(Instr::Constant { dst: size_const.clone(), ty: Type::int(), lo: elem_size, hi: 0 });
        if int_side_is_right {
            let scaled = self.ctx.fresh_temp();
            self.stack.add_local(&scaled, Type::int());
            self.instrs.push(Instr::Mul { dst: scaled.clone(), s1: r, s2: size_const });
            Ok((l, scaled))
        } else {
            let scaled = self.ctx.fresh_temp();
            self.stack.add_local(&scaled, Type::int());
            self.instrs.push(Instr::Mul { dst: scaled.clone(), s1: l, s2: size_const });
            Ok((scaled, r))
        }
    }

    /// `&&`/`||` short-circuit through branches at the source level (spec §4.1); the IR
    /// `Logical` instruction itself is non-short-circuiting and used only when neither
    /// operand can have side effects worth skipping (never emitted from here).
    fn lower_short_circuit(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr, line: u32) -> Result<(String, Type)> {
        let dst = self.ctx.fresh_temp();
        let ty = Type::int();
        self.stack.add_local(&dst, ty.clone());
        let (l, _) = self.lower_expr(lhs)?;
        let l_truthy = self.truthy(l);
        let short_circuit_label = self.ctx.fresh_label();
        let end_label = self.ctx.fresh_label();
        // `&&` short-circuits on a falsy left operand; `||` short-circuits on a truthy one.
        let short_circuit_on = if op == BinaryOp::And { 0 } else { 1 };
        self.instrs.push(Instr::GotoIfEqual { label: short_circuit_label.clone(), var: l_truthy, value: short_circuit_on });
        let (r, _) = self.lower_expr(rhs)?;
        let r_truthy = self.truthy(r);
        self.instrs.push(Instr::Move { dst: dst.clone(), src: r_truthy });
        self.instrs.push(Instr::Goto(end_label.clone()));
        self.instrs.push(Instr::Label(short_circuit_label));
        self.instrs.push(Instr::Constant { dst: dst.clone(), ty: ty.clone(), lo: short_circuit_on, hi: 0 });
        self.instrs.push(Instr::Label(end_label));
        let _ = line;
        Ok((dst, ty))
    }

    /// Reduces a value to its C truthiness (`v != 0`) as a fresh `0`/`1` temporary.
    fn truthy(&mut self, v: String) -> String {
        let ty = Type::int();
        let zero = self.ctx.fresh_temp();
        self.stack.add_local(&zero, ty.clone());
        self.instrs.push(Instr::Constant { dst: zero.clone(), ty: ty.clone(), lo: 0, hi: 0 });
        let nz = self.ctx.fresh_temp();
        self.stack.add_local(&nz, ty.clone());
        self.instrs.push(Instr::Equality { dst: nz.clone(), s1: v, s2: zero, op: EqualityOp::Ne });
        nz
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ExternalDecl, FunctionDecl, Param, Program, VarDecl};

    fn int_ty() -> TypeName { TypeName { builtin: "int".into(), pointer_depth: 0, signed: true, tag: None } }

    #[test]
    fn trivial_function_returns_a_literal() {
        let program = Program {
            decls: vec![ExternalDecl::Function(FunctionDecl {
                name: "answer".into(),
                ret: int_ty(),
                params: vec![],
                body: Some(Stmt::Block {
                    stmts: vec![Stmt::Return { value: Some(Expr::IntLit { value: 42, line: 1 }), line: 1 }],
                    line: 1,
                }),
                line: 1,
            })],
            line: 1,
        };
        let mut ctx = CompilationContext::new();
        let lowered = lower_program(&program, &mut ctx).unwrap();
        assert_eq!(lowered.functions.len(), 1);
        assert!(lowered.functions[0].instrs.iter().any(|i| matches!(i, Instr::Return(Some(_)))));
    }

    #[test]
    fn declared_local_is_visible_to_later_statements() {
        let program = Program {
            decls: vec![ExternalDecl::Function(FunctionDecl {
                name: "f".into(),
                ret: int_ty(),
                params: vec![Param { name: "n".into(), ty: int_ty(), line: 1 }],
                body: Some(Stmt::Block {
                    stmts: vec![
                        Stmt::DeclStmt {
                            decl: VarDecl { name: "x".into(), ty: int_ty(), array_len: None, init: Some(Expr::Ident { name: "n".into(), line: 2 }), line: 2 },
                            line: 2,
                        },
                        Stmt::Return { value: Some(Expr::Ident { name: "x".into(), line: 3 }), line: 3 },
                    ],
                    line: 1,
                }),
                line: 1,
            })],
            line: 1,
        };
        let mut ctx = CompilationContext::new();
        let lowered = lower_program(&program, &mut ctx).unwrap();
        assert!(lowered.functions[0].stack.get_type("x").is_some());
    }
}
