//! MIPS-I/O32 emission (spec §4.5). Grounded line-for-line on the `PrintMIPS` methods of
//! `original_source/src/intrep/Instruction.cpp`: fixed scratch registers, no register
//! allocator, one `Instr` in, a handful of text lines out. `regalloc2`/`bumpalo` (the
//! teacher's own allocator stack) have no role here — DESIGN.md records why they were
//! dropped.

use crate::context::CompilationContext;
use crate::error::{CompileError, Result};
use crate::ir::{BitwiseOp, EqualityOp, Instr, LogicalOp};
use crate::types::symbol::FunctionStack;
use crate::types::Type;
use hashbrown::HashMap;

/// Fixed scratch registers used by every instruction that needs one or two working
/// values; never reused across instruction boundaries, matching the "no register
/// allocator, fixed scratch discipline" rule of spec §4.5.
pub const SCRATCH_1: &str = "$8";
pub const SCRATCH_2: &str = "$9";
pub const SCRATCH_3: &str = "$10";
pub const FP_SCRATCH_1: &str = "$f0";
pub const FP_SCRATCH_2: &str = "$f2";

/// Maps every local alias (including temporaries) in a function to a byte offset below
/// `$fp`, assigned by walking [`FunctionStack`] in declaration order — never hash order,
/// per the determinism invariant (spec §8).
pub struct FrameLayout {
    offsets: HashMap<String, i32>,
    pub frame_size: u32,
}

impl FrameLayout {
    pub fn build(stack: &FunctionStack, ctx: &CompilationContext) -> Self {
        let mut offsets = HashMap::new();
        let mut cursor: i32 = 0;
        for (alias, ty) in stack.locals.iter() {
            let size = match stack.get_array(alias) {
                Some(arr) => arr.total_size(ctx),
                None => ty.bytes(ctx),
            };
            cursor += size as i32;
            offsets.insert(alias.to_string(), -cursor);
        }
        let frame_size = crate::types::symbol::align_up(cursor as u32, 8);
        FrameLayout { offsets, frame_size }
    }

    pub fn offset_of(&self, alias: &str) -> i32 { *self.offsets.get(alias).unwrap_or(&0) }
}

/// One compiled string literal awaiting emission in the `.data` section.
pub struct DataEntry {
    pub label: String,
    pub bytes: Vec<u8>,
}

/// Per-function emission state: the frame layout, a handle to the enclosing
/// [`CompilationContext`] for type/struct lookups, the global variable table (for
/// distinguishing a global reference from a stack reference), and the growing list of
/// string-literal data entries contributed by this function's `StringLit` instructions.
pub struct EmitContext<'a> {
    pub ctx: &'a CompilationContext,
    pub stack: &'a FunctionStack,
    pub frame: FrameLayout,
    pub globals: &'a HashMap<String, Type>,
    pub data: Vec<DataEntry>,
    next_string_id: u64,
}

impl<'a> EmitContext<'a> {
    pub fn new(ctx: &'a CompilationContext, stack: &'a FunctionStack, globals: &'a HashMap<String, Type>) -> Self {
        EmitContext { ctx, stack, frame: FrameLayout::build(stack, ctx), globals, data: Vec::new(), next_string_id: 0 }
    }

    fn type_of(&self, alias: &str) -> Type {
        self.stack.get_type(alias).or_else(|| self.globals.get(alias)).cloned().unwrap_or_else(Type::int)
    }

    fn is_global(&self, alias: &str) -> bool { self.stack.get_type(alias).is_none() && self.globals.contains_key(alias) }

    /// Emits `lw`/`lb`/`lh`/`l.s`/`l.d` (as appropriate to `ty`'s size) from `alias`'s
    /// storage into `reg`, choosing `$fp`-relative or `la`-then-load addressing depending
    /// on whether `alias` is a stack local or a process global.
    fn load_variable(&self, out: &mut String, alias: &str, reg: &str, ty: &Type) {
        let bytes = ty.bytes(self.ctx);
        let op = if ty.is_float() && bytes == 8 {
            "l.d"
        } else if ty.is_float() {
            "l.s"
        } else {
            match bytes {
                1 => if ty.signed { "lb" } else { "lbu" },
                2 => if ty.signed { "lh" } else { "lhu" },
                _ => "lw",
            }
        };
        if self.is_global(alias) {
            out.push_str(&format!("    {op} {reg}, {alias}\n"));
        } else {
            out.push_str(&format!("    {op} {reg}, {}($fp)\n", self.frame.offset_of(alias)));
        }
    }

    fn store_variable(&self, out: &mut String, alias: &str, reg: &str, ty: &Type) {
        let bytes = ty.bytes(self.ctx);
        let op = if ty.is_float() && bytes == 8 {
            "s.d"
        } else if ty.is_float() {
            "s.s"
        } else {
            match bytes {
                1 => "sb",
                2 => "sh",
                _ => "sw",
            }
        };
        if self.is_global(alias) {
            out.push_str(&format!("    {op} {reg}, {alias}\n"));
        } else {
            out.push_str(&format!("    {op} {reg}, {}($fp)\n", self.frame.offset_of(alias)));
        }
    }

    /// Two-word store for 8-byte non-float values (`long long`/`unsigned long long`):
    /// low word at `+0`, high word at `+4`, matching the layout `load_variable_64` reads
    /// back. `reg_lo`/`reg_hi` hold the two halves on entry.
    fn store_variable_64(&self, out: &mut String, alias: &str, reg_lo: &str, reg_hi: &str) {
        if self.is_global(alias) {
            out.push_str(&format!("    sw {reg_lo}, {alias}\n"));
            out.push_str(&format!("    sw {reg_hi}, {alias}+4\n"));
        } else {
            let off = self.frame.offset_of(alias);
            out.push_str(&format!("    sw {reg_lo}, {off}($fp)\n"));
            out.push_str(&format!("    sw {reg_hi}, {}($fp)\n", off + 4));
        }
    }

    /// Two-word load counterpart to [`Self::store_variable_64`].
    fn load_variable_64(&self, out: &mut String, alias: &str, reg_lo: &str, reg_hi: &str) {
        if self.is_global(alias) {
            out.push_str(&format!("    lw {reg_lo}, {alias}\n"));
            out.push_str(&format!("    lw {reg_hi}, {alias}+4\n"));
        } else {
            let off = self.frame.offset_of(alias);
            out.push_str(&format!("    lw {reg_lo}, {off}($fp)\n"));
            out.push_str(&format!("    lw {reg_hi}, {}($fp)\n", off + 4));
        }
    }

    /// Byte-copy loop for struct-to-struct assignment (spec §4.5's "struct assignment is
    /// a member-wise/byte-wise copy, never a single `sw`"), grounded on
    /// `FunctionCallInstruction::PrintMIPS`'s argument-area struct copy in
    /// `original_source/src/intrep/Instruction.cpp`.
    fn copy_struct(&self, out: &mut String, dst: &str, src: &str, size: u32) {
        out.push_str(&format!("    la {SCRATCH_1}, {}\n", Self::addr_expr(self, dst)));
        out.push_str(&format!("    la {SCRATCH_2}, {}\n", Self::addr_expr(self, src)));
        let mut off = 0;
        while off + 4 <= size {
            out.push_str(&format!("    lw {SCRATCH_3}, {off}({SCRATCH_2})\n"));
            out.push_str(&format!("    sw {SCRATCH_3}, {off}({SCRATCH_1})\n"));
            off += 4;
        }
        while off < size {
            out.push_str(&format!("    lb {SCRATCH_3}, {off}({SCRATCH_2})\n"));
            out.push_str(&format!("    sb {SCRATCH_3}, {off}({SCRATCH_1})\n"));
            off += 1;
        }
    }

    fn addr_expr(&self, alias: &str) -> String {
        if self.is_global(alias) { alias.to_string() } else { format!("{}($fp)", self.frame.offset_of(alias)) }
    }
}

/// Emits every MIPS line for one `Instr`, appending to `out` (the function's running
/// text-section buffer). Errors surface the handful of cases that are only detectable
/// at emission time (e.g. bitwise-on-float reaching this stage means lowering has a bug,
/// reported as `InternalInvariant` rather than panicking).
pub fn emit_instr(out: &mut String, ec: &mut EmitContext, instr: &Instr, line: u32) -> Result<()> {
    match instr {
        Instr::Label(name) => out.push_str(&format!("{name}:\n")),
        Instr::Goto(name) => out.push_str(&format!("    j {name}\n    nop\n")),
        Instr::GotoIfEqual { label, var, value } => {
            let ty = ec.type_of(var);
            ec.load_variable(out, var, SCRATCH_1, &ty);
            out.push_str(&format!("    li {SCRATCH_2}, {value}\n"));
            out.push_str(&format!("    beq {SCRATCH_1}, {SCRATCH_2}, {label}\n    nop\n"));
        }
        Instr::Return(val) => {
            if let Some(v) = val {
                let ty = ec.type_of(v);
                if ty.is_float() {
                    ec.load_variable(out, v, FP_SCRATCH_1, &ty);
                } else {
                    ec.load_variable(out, v, "$2", &ty);
                }
            }
            out.push_str("    move $sp, $fp\n");
            out.push_str("    lw $fp, 0($sp)\n");
            out.push_str("    lw $31, 4($sp)\n");
            out.push_str("    jr $31\n    nop\n");
        }
        Instr::Constant { dst, ty, lo, hi } => {
            let bytes = ty.bytes(ec.ctx);
            if bytes == 8 && !ty.is_float() {
                out.push_str(&format!("    li {SCRATCH_1}, {lo:#x}\n"));
                out.push_str(&format!("    li {SCRATCH_2}, {hi:#x}\n"));
                ec.store_variable_64(out, dst, SCRATCH_1, SCRATCH_2);
            } else if bytes == 8 {
                out.push_str(&format!("    li {SCRATCH_1}, {hi:#x}\n"));
                out.push_str(&format!("    li {SCRATCH_2}, {lo:#x}\n"));
                ec.store_variable(out, dst, SCRATCH_1, ty);
            } else if *hi == 0 && *lo == 0 {
                ec.store_variable(out, dst, "$0", ty);
            } else {
                out.push_str(&format!("    li {SCRATCH_1}, {lo:#x}\n"));
                ec.store_variable(out, dst, SCRATCH_1, ty);
            }
        }
        Instr::StringLit { dst, bytes } => {
            let label = format!(".str{}", ec.next_string_id);
            ec.next_string_id += 1;
            ec.data.push(DataEntry { label: label.clone(), bytes: bytes.clone() });
            out.push_str(&format!("    la {SCRATCH_1}, {label}\n"));
            let ty = ec.type_of(dst);
            ec.store_variable(out, dst, SCRATCH_1, &ty);
        }
        Instr::Move { dst, src } => {
            let ty = ec.type_of(src);
            ec.load_variable(out, src, SCRATCH_1, &ty);
            ec.store_variable(out, dst, SCRATCH_1, &ty);
        }
        Instr::Assign { dst, src } => {
            let src_ty = ec.type_of(src);
            if src_ty.is_struct() {
                let size = src_ty.bytes(ec.ctx);
                ec.load_variable(out, dst, SCRATCH_1, &Type::int().pointer_to());
                ec.copy_struct(out, dst, src, size);
            } else if !src_ty.is_float() && src_ty.bytes(ec.ctx) == 8 {
                ec.load_variable(out, dst, SCRATCH_3, &Type::int().pointer_to());
                ec.load_variable_64(out, src, SCRATCH_1, SCRATCH_2);
                out.push_str(&format!("    sw {SCRATCH_1}, 0({SCRATCH_3})\n"));
                out.push_str(&format!("    sw {SCRATCH_2}, 4({SCRATCH_3})\n"));
            } else {
                ec.load_variable(out, dst, SCRATCH_1, &Type::int().pointer_to());
                ec.load_variable(out, src, SCRATCH_2, &src_ty);
                out.push_str(&format!("    sw {SCRATCH_2}, 0({SCRATCH_1})\n"));
            }
        }
        Instr::AddressOf { dst, src } => {
            out.push_str(&format!("    la {SCRATCH_1}, {}\n", ec.addr_expr(src)));
            let ty = ec.type_of(dst);
            ec.store_variable(out, dst, SCRATCH_1, &ty);
        }
        Instr::Dereference { dst, src } => {
            let ptr_ty = ec.type_of(src);
            let pointee = ptr_ty.dereference();
            ec.load_variable(out, src, SCRATCH_1, &ptr_ty);
            let bytes = pointee.bytes(ec.ctx);
            let lop = if pointee.is_float() && bytes == 8 {
                "l.d"
            } else if pointee.is_float() {
                "l.s"
            } else {
                match bytes {
                    1 => if pointee.signed { "lb" } else { "lbu" },
                    2 => if pointee.signed { "lh" } else { "lhu" },
                    _ => "lw",
                }
            };
            let reg = if pointee.is_float() { FP_SCRATCH_1 } else { SCRATCH_2 };
            out.push_str(&format!("    {lop} {reg}, 0({SCRATCH_1})\n"));
            ec.store_variable(out, dst, reg, &pointee);
        }
        Instr::Logical { dst, s1, s2, op } => {
            let t1 = ec.type_of(s1);
            ec.load_variable(out, s1, SCRATCH_1, &t1);
            match (op, s2) {
                (LogicalOp::Not, _) => {
                    out.push_str(&format!("    sltiu {SCRATCH_1}, {SCRATCH_1}, 1\n"));
                }
                (LogicalOp::And, Some(s2)) => {
                    let t2 = ec.type_of(s2);
                    ec.load_variable(out, s2, SCRATCH_2, &t2);
                    out.push_str(&format!("    sltu {SCRATCH_1}, $0, {SCRATCH_1}\n"));
                    out.push_str(&format!("    sltu {SCRATCH_2}, $0, {SCRATCH_2}\n"));
                    out.push_str(&format!("    and {SCRATCH_1}, {SCRATCH_1}, {SCRATCH_2}\n"));
                }
                (LogicalOp::Or, Some(s2)) => {
                    let t2 = ec.type_of(s2);
                    ec.load_variable(out, s2, SCRATCH_2, &t2);
                    out.push_str(&format!("    or {SCRATCH_1}, {SCRATCH_1}, {SCRATCH_2}\n"));
                    out.push_str(&format!("    sltu {SCRATCH_1}, $0, {SCRATCH_1}\n"));
                }
                _ => return Err(CompileError::InternalInvariant {
                    message: "logical And/Or instruction missing its second operand".to_string(),
                }),
            }
            let ty = ec.type_of(dst);
            ec.store_variable(out, dst, SCRATCH_1, &ty);
        }
        Instr::Bitwise { dst, s1, s2, op } => {
            let t1 = ec.type_of(s1);
            if t1.is_float() {
                return Err(CompileError::InternalInvariant {
                    message: format!("bitwise operation reached emission on a float operand at line {line}"),
                });
            }
            ec.load_variable(out, s1, SCRATCH_1, &t1);
            match (op, s2) {
                (BitwiseOp::Not, _) => out.push_str(&format!("    nor {SCRATCH_1}, {SCRATCH_1}, $0\n")),
                (BitwiseOp::And, Some(s2)) => {
                    ec.load_variable(out, s2, SCRATCH_2, &ec.type_of(s2));
                    out.push_str(&format!("    and {SCRATCH_1}, {SCRATCH_1}, {SCRATCH_2}\n"));
                }
                (BitwiseOp::Or, Some(s2)) => {
                    ec.load_variable(out, s2, SCRATCH_2, &ec.type_of(s2));
                    out.push_str(&format!("    or {SCRATCH_1}, {SCRATCH_1}, {SCRATCH_2}\n"));
                }
                (BitwiseOp::Xor, Some(s2)) => {
                    ec.load_variable(out, s2, SCRATCH_2, &ec.type_of(s2));
                    out.push_str(&format!("    xor {SCRATCH_1}, {SCRATCH_1}, {SCRATCH_2}\n"));
                }
                _ => return Err(CompileError::InternalInvariant {
                    message: "bitwise And/Or/Xor instruction missing its second operand".to_string(),
                }),
            }
            let ty = ec.type_of(dst);
            ec.store_variable(out, dst, SCRATCH_1, &ty);
        }
        Instr::Equality { dst, s1, s2, op } => {
            let t1 = ec.type_of(s1);
            if t1.is_float() {
                ec.load_variable(out, s1, FP_SCRATCH_1, &t1);
                ec.load_variable(out, s2, FP_SCRATCH_2, &t1);
                // Gt/Ge reuse Lt/Le's condition codes with operands swapped: a > b is b < a.
                let (cc, negate, swap) = match op {
                    EqualityOp::Eq => ("c.eq.s", false, false),
                    EqualityOp::Ne => ("c.eq.s", true, false),
                    EqualityOp::Lt => ("c.lt.s", false, false),
                    EqualityOp::Gt => ("c.lt.s", false, true),
                    EqualityOp::Le => ("c.le.s", false, false),
                    EqualityOp::Ge => ("c.le.s", false, true),
                };
                let cc = if t1.bytes(ec.ctx) == 8 { cc.replace(".s", ".d") } else { cc.to_string() };
                let (a, b) = if swap { (FP_SCRATCH_2, FP_SCRATCH_1) } else { (FP_SCRATCH_1, FP_SCRATCH_2) };
                out.push_str(&format!("    {cc} {a}, {b}\n"));
                out.push_str("    li $8, 1\n    movf $8, $0\n");
                if negate {
                    out.push_str("    xori $8, $8, 1\n");
                }
            } else {
                let t2 = ec.type_of(s2);
                ec.load_variable(out, s1, SCRATCH_1, &t1);
                ec.load_variable(out, s2, SCRATCH_2, &t2);
                let slt_op = if t1.signed && t2.signed { "slt" } else { "sltu" };
                match op {
                    EqualityOp::Eq => out.push_str(&format!("    xor {SCRATCH_1}, {SCRATCH_1}, {SCRATCH_2}\n    sltiu {SCRATCH_1}, {SCRATCH_1}, 1\n")),
                    EqualityOp::Ne => out.push_str(&format!("    xor {SCRATCH_1}, {SCRATCH_1}, {SCRATCH_2}\n    sltu {SCRATCH_1}, $0, {SCRATCH_1}\n")),
                    EqualityOp::Lt => out.push_str(&format!("    {slt_op} {SCRATCH_1}, {SCRATCH_1}, {SCRATCH_2}\n")),
                    EqualityOp::Gt => out.push_str(&format!("    {slt_op} {SCRATCH_1}, {SCRATCH_2}, {SCRATCH_1}\n")),
                    EqualityOp::Le => out.push_str(&format!("    {slt_op} {SCRATCH_1}, {SCRATCH_2}, {SCRATCH_1}\n    xori {SCRATCH_1}, {SCRATCH_1}, 1\n")),
                    EqualityOp::Ge => out.push_str(&format!("    {slt_op} {SCRATCH_1}, {SCRATCH_1}, {SCRATCH_2}\n    xori {SCRATCH_1}, {SCRATCH_1}, 1\n")),
                }
            }
            let ty = ec.type_of(dst);
            ec.store_variable(out, dst, SCRATCH_1, &ty);
        }
        Instr::Shift { dst, s1, s2, right } => {
            let t1 = ec.type_of(s1);
            ec.load_variable(out, s1, SCRATCH_1, &t1);
            ec.load_variable(out, s2, SCRATCH_2, &ec.type_of(s2));
            let op = if *right { if t1.signed { "srav" } else { "srlv" } } else { "sllv" };
            out.push_str(&format!("    {op} {SCRATCH_1}, {SCRATCH_1}, {SCRATCH_2}\n"));
            ec.store_variable(out, dst, SCRATCH_1, &t1);
        }
        Instr::Negative { dst, src } => {
            let ty = ec.type_of(src);
            if ty.is_float() {
                let op = if ty.bytes(ec.ctx) == 8 { "neg.d" } else { "neg.s" };
                ec.load_variable(out, src, FP_SCRATCH_1, &ty);
                out.push_str(&format!("    {op} {FP_SCRATCH_1}, {FP_SCRATCH_1}\n"));
                ec.store_variable(out, dst, FP_SCRATCH_1, &ty);
            } else {
                ec.load_variable(out, src, SCRATCH_1, &ty);
                out.push_str(&format!("    sub {SCRATCH_1}, $0, {SCRATCH_1}\n"));
                ec.store_variable(out, dst, SCRATCH_1, &ty);
            }
        }
        Instr::Increment { dst, src, decrement } => {
            let ty = ec.type_of(src);
            ec.load_variable(out, src, SCRATCH_1, &ty);
            let delta = if *decrement { -1 } else { 1 };
            out.push_str(&format!("    addi {SCRATCH_1}, {SCRATCH_1}, {delta}\n"));
            ec.store_variable(out, src, SCRATCH_1, &ty);
            ec.store_variable(out, dst, SCRATCH_1, &ty);
        }
        Instr::Add { dst, s1, s2 } => emit_arith(out, ec, dst, s1, s2, "add", "add.s", "add.d"),
        Instr::Sub { dst, s1, s2 } => emit_arith(out, ec, dst, s1, s2, "sub", "sub.s", "sub.d"),
        Instr::Mul { dst, s1, s2 } => emit_mul_div(out, ec, dst, s1, s2, MulDiv::Mul),
        Instr::Div { dst, s1, s2 } => emit_mul_div(out, ec, dst, s1, s2, MulDiv::Div),
        Instr::Mod { dst, s1, s2 } => emit_mul_div(out, ec, dst, s1, s2, MulDiv::Mod),
        Instr::Cast { dst, src, ty } => {
            let src_ty = ec.type_of(src);
            emit_cast(out, ec, dst, src, &src_ty, ty);
        }
        Instr::FunctionCall { dst, function, args } => emit_call(out, ec, dst, function, args)?,
        Instr::MemberAccess { dst, base, offset } => {
            out.push_str(&format!("    la {SCRATCH_1}, {}\n", ec.addr_expr(base)));
            out.push_str(&format!("    addiu {SCRATCH_1}, {SCRATCH_1}, {offset}\n"));
            let ty = ec.type_of(dst);
            ec.store_variable(out, dst, SCRATCH_1, &ty);
        }
    }
    Ok(())
}

fn emit_arith(out: &mut String, ec: &mut EmitContext, dst: &str, s1: &str, s2: &str, int_op: &str, f32_op: &str, f64_op: &str) {
    let t1 = ec.type_of(s1);
    if t1.is_float() {
        let is_double = t1.bytes(ec.ctx) == 8;
        let op = if is_double { f64_op } else { f32_op };
        ec.load_variable(out, s1, FP_SCRATCH_1, &t1);
        ec.load_variable(out, s2, FP_SCRATCH_2, &t1);
        out.push_str(&format!("    {op} {FP_SCRATCH_1}, {FP_SCRATCH_1}, {FP_SCRATCH_2}\n"));
        ec.store_variable(out, dst, FP_SCRATCH_1, &t1);
    } else {
        ec.load_variable(out, s1, SCRATCH_1, &t1);
        ec.load_variable(out, s2, SCRATCH_2, &ec.type_of(s2));
        out.push_str(&format!("    {int_op} {SCRATCH_1}, {SCRATCH_1}, {SCRATCH_2}\n"));
        ec.store_variable(out, dst, SCRATCH_1, &t1);
    }
}

enum MulDiv { Mul, Div, Mod }

fn emit_mul_div(out: &mut String, ec: &mut EmitContext, dst: &str, s1: &str, s2: &str, kind: MulDiv) {
    let t1 = ec.type_of(s1);
    if t1.is_float() {
        let is_double = t1.bytes(ec.ctx) == 8;
        let op = match (kind, is_double) {
            (MulDiv::Mul, false) => "mul.s",
            (MulDiv::Mul, true) => "mul.d",
            (_, false) => "div.s",
            (_, true) => "div.d",
        };
        ec.load_variable(out, s1, FP_SCRATCH_1, &t1);
        ec.load_variable(out, s2, FP_SCRATCH_2, &t1);
        out.push_str(&format!("    {op} {FP_SCRATCH_1}, {FP_SCRATCH_1}, {FP_SCRATCH_2}\n"));
        ec.store_variable(out, dst, FP_SCRATCH_1, &t1);
        return;
    }
    ec.load_variable(out, s1, SCRATCH_1, &t1);
    ec.load_variable(out, s2, SCRATCH_2, &ec.type_of(s2));
    let div_op = if t1.signed { "div" } else { "divu" };
    out.push_str(&format!("    {div_op} {SCRATCH_1}, {SCRATCH_2}\n"));
    match kind {
        MulDiv::Mul => {
            let op = if t1.signed { "mult" } else { "multu" };
            out.push_str(&format!("    {op} {SCRATCH_1}, {SCRATCH_2}\n    mflo {SCRATCH_1}\n"));
        }
        MulDiv::Div => out.push_str(&format!("    mflo {SCRATCH_1}\n")),
        MulDiv::Mod => out.push_str(&format!("    mfhi {SCRATCH_1}\n")),
    }
    ec.store_variable(out, dst, SCRATCH_1, &t1);
}

fn emit_cast(out: &mut String, ec: &mut EmitContext, dst: &str, src: &str, from: &Type, to: &Type) {
    match (from.is_float(), to.is_float()) {
        (false, false) => {
            ec.load_variable(out, src, SCRATCH_1, from);
            let from_bytes = from.bytes(ec.ctx);
            let to_bytes = to.bytes(ec.ctx);
            if to_bytes < from_bytes {
                let shift = (4 - to_bytes) * 8;
                out.push_str(&format!("    sll {SCRATCH_1}, {SCRATCH_1}, {shift}\n"));
                let shift_op = if to.signed { "sra" } else { "srl" };
                out.push_str(&format!("    {shift_op} {SCRATCH_1}, {SCRATCH_1}, {shift}\n"));
            }
            ec.store_variable(out, dst, SCRATCH_1, to);
        }
        (false, true) => {
            ec.load_variable(out, src, SCRATCH_1, from);
            let op = if from.signed { "mtc1" } else { "mtc1" };
            out.push_str(&format!("    {op} {SCRATCH_1}, {FP_SCRATCH_1}\n"));
            out.push_str(&format!("    cvt.w.s {FP_SCRATCH_1}, {FP_SCRATCH_1}\n"));
            let cvt = if to.bytes(ec.ctx) == 8 { "cvt.d.w" } else { "cvt.s.w" };
            out.push_str(&format!("    {cvt} {FP_SCRATCH_1}, {FP_SCRATCH_1}\n"));
            ec.store_variable(out, dst, FP_SCRATCH_1, to);
        }
        (true, false) => {
            ec.load_variable(out, src, FP_SCRATCH_1, from);
            let cvt = if from.bytes(ec.ctx) == 8 { "cvt.w.d" } else { "cvt.w.s" };
            out.push_str(&format!("    {cvt} {FP_SCRATCH_1}, {FP_SCRATCH_1}\n"));
            out.push_str(&format!("    mfc1 {SCRATCH_1}, {FP_SCRATCH_1}\n"));
            ec.store_variable(out, dst, SCRATCH_1, to);
        }
        (true, true) => {
            ec.load_variable(out, src, FP_SCRATCH_1, from);
            let cvt = match to.bytes(ec.ctx) {
                8 => "cvt.d.s",
                _ => "cvt.s.d",
            };
            out.push_str(&format!("    {cvt} {FP_SCRATCH_1}, {FP_SCRATCH_1}\n"));
            ec.store_variable(out, dst, FP_SCRATCH_1, to);
        }
    }
}

/// Full O32 call emission (spec §4.5's 9-step subset), grounded directly on
/// `FunctionCallInstruction::PrintMIPS`: the first four non-struct word args go in
/// `$4`-`$7` (the first two floats additionally/alternatively in `$f12`/`$f14`), the
/// remainder on the stack with 8-byte padding; a struct return value is passed by hidden
/// pointer in `$4`, shifting the visible argument registers over by one.
fn emit_call(out: &mut String, ec: &mut EmitContext, dst: &Option<String>, function: &str, args: &[String]) -> Result<()> {
    let ret_ty = dst.as_ref().map(|d| ec.type_of(d));
    let struct_return = ret_ty.as_ref().is_some_and(|t| t.is_struct());

    out.push_str("    .option pic0\n");

    let mut int_reg = 4;
    let mut float_reg_pair = [("$f12", "$f14")].into_iter();
    let mut stack_off = 0i32;
    if struct_return {
        out.push_str(&format!("    la ${int_reg}, {}\n", ec.addr_expr(dst.as_ref().unwrap())));
        int_reg += 1;
    }
    for a in args {
        let ty = ec.type_of(a);
        if ty.is_float() && int_reg <= 6 {
            if let Some((f1, _f2)) = float_reg_pair.next() {
                ec.load_variable(out, a, f1, &ty);
                continue;
            }
        }
        if int_reg <= 7 {
            let reg = format!("${int_reg}");
            if ty.is_struct() {
                out.push_str(&format!("    la {reg}, {}\n", ec.addr_expr(a)));
            } else {
                ec.load_variable(out, a, &reg, &ty);
            }
            int_reg += 1;
        } else {
            ec.load_variable(out, a, SCRATCH_1, &ty);
            out.push_str(&format!("    sw {SCRATCH_1}, {stack_off}($sp)\n"));
            stack_off += crate::types::symbol::align_up(ty.bytes(ec.ctx), 8) as i32;
        }
    }

    out.push_str(&format!("    jal {function}\n    nop\n"));
    out.push_str("    .option pic2\n");

    if let (Some(d), Some(ty)) = (dst, &ret_ty) {
        if !struct_return {
            if ty.is_float() {
                ec.store_variable(out, d, FP_SCRATCH_1, ty);
            } else {
                ec.store_variable(out, d, "$2", ty);
            }
        }
    }
    Ok(())
}

/// Spills the first four incoming integer/pointer argument registers (`$4`-`$7`) to
/// their stack slots; the fifth parameter onward already lives on the caller's stack at
/// a positive `$fp` offset and needs no spill. Floats passed in `$f12`/`$f14` are spilled
/// the same way when the corresponding parameter's type is a float.
pub fn emit_prologue_spill(out: &mut String, ec: &EmitContext, params: &[String]) {
    let mut int_reg = 4;
    let mut float_regs = ["$f12", "$f14"].into_iter();
    for p in params {
        let ty = ec.type_of(p);
        if ty.is_float() {
            if let Some(f) = float_regs.next() {
                ec.store_variable(out, p, f, &ty);
                continue;
            }
        }
        if int_reg <= 7 {
            ec.store_variable(out, p, &format!("${int_reg}"), &ty);
            int_reg += 1;
        }
    }
}

/// Renders the `.data` section for a finished function's string literals (`.asciiz`
/// directives, escaped the same way as the `--ir` dump per spec §6).
pub fn render_data_section(entries: &[DataEntry]) -> String {
    let mut out = String::new();
    for e in entries {
        out.push_str(&format!("{}:\n    .ascii \"{}\\000\"\n", e.label, crate::ir::escape_for_debug(&e.bytes)));
    }
    out
}
