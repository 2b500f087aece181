//! The IR instruction set (spec §4.3). A single closed `Instr` enum, matched
//! exhaustively by [`Instr::debug`] and [`crate::codegen::emit_instr`], rather than the
//! open `virtual PrintMIPS`/`Debug` hierarchy of `original_source/src/intrep/Instruction.cpp`
//! — Design Notes §9 calls this out directly ("Map to a tagged variant per category...
//! rather than open inheritance").

use crate::types::Type;

/// `&`/`|`/`!` at the IR level (spec: "non-short-circuit at IR level"; `&&`/`||` at
/// source level lower to branches instead, see `src/lower.rs`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitwiseOp {
    And,
    Or,
    Xor,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EqualityOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

/// A single three-address IR instruction. Every field that names a temporary/variable
/// is a plain `String`: the IR carries no types of its own (those live in the enclosing
/// [`crate::types::symbol::FunctionStack`]), matching spec §3's "temporaries have types
/// registered in the FunctionStack before use."
#[derive(Debug, Clone)]
pub enum Instr {
    Label(String),
    Goto(String),
    GotoIfEqual { label: String, var: String, value: i32 },
    Return(Option<String>),
    Constant { dst: String, ty: Type, lo: u32, hi: u32 },
    StringLit { dst: String, bytes: Vec<u8> },
    Move { dst: String, src: String },
    Assign { dst: String, src: String },
    AddressOf { dst: String, src: String },
    Dereference { dst: String, src: String },
    Logical { dst: String, s1: String, s2: Option<String>, op: LogicalOp },
    Bitwise { dst: String, s1: String, s2: Option<String>, op: BitwiseOp },
    Equality { dst: String, s1: String, s2: String, op: EqualityOp },
    Shift { dst: String, s1: String, s2: String, right: bool },
    Negative { dst: String, src: String },
    Increment { dst: String, src: String, decrement: bool },
    Add { dst: String, s1: String, s2: String },
    Sub { dst: String, s1: String, s2: String },
    Mul { dst: String, s1: String, s2: String },
    Div { dst: String, s1: String, s2: String },
    Mod { dst: String, s1: String, s2: String },
    Cast { dst: String, src: String, ty: Type },
    FunctionCall { dst: Option<String>, function: String, args: Vec<String> },
    MemberAccess { dst: String, base: String, offset: u32 },
}

impl Instr {
    /// Appends this instruction's `--ir` dump line(s) to `out`: four-space indent, one
    /// mnemonic per line (spec §6's "Output: IR dump" contract). Deterministic by
    /// construction — every field formatted here is either a plain string already fixed
    /// by lowering, or a hex-rendered integer, never iteration over a hash map.
    pub fn debug(&self, out: &mut String) {
        match self {
            Instr::Label(name) => out.push_str(&format!("{name}:\n")),
            Instr::Goto(name) => out.push_str(&format!("    goto {name}\n")),
            Instr::GotoIfEqual { label, var, value } => {
                out.push_str(&format!("    gotoIfEqual {label}, {var}, {value}\n"))
            }
            Instr::Return(None) => out.push_str("    return\n"),
            Instr::Return(Some(v)) => out.push_str(&format!("    return {v}\n")),
            Instr::Constant { dst, hi, lo, .. } => {
                out.push_str(&format!("    constant {dst} {hi:08x} {lo:08x}\n"))
            }
            Instr::StringLit { dst, bytes } => {
                out.push_str(&format!("    string {dst} {}\n", escape_for_debug(bytes)))
            }
            Instr::Move { dst, src } => out.push_str(&format!("    move {dst}, {src}\n")),
            Instr::Assign { dst, src } => out.push_str(&format!("    assign *{dst}, {src}\n")),
            Instr::AddressOf { dst, src } => out.push_str(&format!("    addressOf {dst}, &{src}\n")),
            Instr::Dereference { dst, src } => out.push_str(&format!("    dereference {dst}, *{src}\n")),
            Instr::Logical { dst, s1, s2, op } => match (op, s2) {
                (LogicalOp::And, Some(s2)) => out.push_str(&format!("    logicalAnd {dst}, {s1}, {s2}\n")),
                (LogicalOp::Or, Some(s2)) => out.push_str(&format!("    logicalOr {dst}, {s1}, {s2}\n")),
                (LogicalOp::Not, _) => out.push_str(&format!("    logicalNot {dst}, {s1}\n")),
                _ => unreachable!("And/Or always carry a second operand"),
            },
            Instr::Bitwise { dst, s1, s2, op } => match (op, s2) {
                (BitwiseOp::And, Some(s2)) => out.push_str(&format!("    bitwiseAnd {dst}, {s1}, {s2}\n")),
                (BitwiseOp::Or, Some(s2)) => out.push_str(&format!("    bitwiseOr {dst}, {s1}, {s2}\n")),
                (BitwiseOp::Xor, Some(s2)) => out.push_str(&format!("    bitwiseXor {dst}, {s1}, {s2}\n")),
                (BitwiseOp::Not, _) => out.push_str(&format!("    bitwiseNot {dst}, {s1}\n")),
                _ => unreachable!("And/Or/Xor always carry a second operand"),
            },
            Instr::Equality { dst, s1, s2, op } => {
                let name = match op {
                    EqualityOp::Eq => "equals",
                    EqualityOp::Ne => "notEquals",
                    EqualityOp::Lt => "lessThan",
                    EqualityOp::Gt => "greaterThan",
                    EqualityOp::Le => "lessOrEq",
                    EqualityOp::Ge => "greaterOrEq",
                };
                out.push_str(&format!("    {name} {dst}, {s1}, {s2}\n"));
            }
            Instr::Shift { dst, s1, s2, right } => {
                let name = if *right { "rightshift" } else { "leftshift" };
                out.push_str(&format!("    {name} {dst}, {s1}, {s2}\n"));
            }
            Instr::Negative { dst, src } => out.push_str(&format!("    negative {dst}, {src}\n")),
            Instr::Increment { dst, src, decrement } => {
                let name = if *decrement { "decrement" } else { "increment" };
                out.push_str(&format!("    {name} {dst}, {src}\n"));
            }
            Instr::Add { dst, s1, s2 } => out.push_str(&format!("    add {dst}, {s1}, {s2}\n")),
            Instr::Sub { dst, s1, s2 } => out.push_str(&format!("    sub {dst}, {s1}, {s2}\n")),
            Instr::Mul { dst, s1, s2 } => out.push_str(&format!("    mul {dst}, {s1}, {s2}\n")),
            Instr::Div { dst, s1, s2 } => out.push_str(&format!("    div {dst}, {s1}, {s2}\n")),
            Instr::Mod { dst, s1, s2 } => out.push_str(&format!("    mod {dst}, {s1}, {s2}\n")),
            Instr::Cast { dst, src, ty } => out.push_str(&format!("    cast {dst}, {src}, {}\n", ty.name())),
            Instr::FunctionCall { dst, function, args } => {
                let dst = dst.as_deref().unwrap_or("");
                out.push_str(&format!("    call {function}, returns {dst}\n"));
                for a in args {
                    out.push_str(&format!("      arg {a}\n"));
                }
            }
            Instr::MemberAccess { dst, base, offset } => {
                out.push_str(&format!("    member {dst}, {base} + {offset}\n"))
            }
        }
    }
}

/// Mirrors `original_source`'s `very_conservative_escape`: alphanumerics and spaces pass
/// through unescaped, everything else is rendered as a three-digit octal escape. Used
/// both for the `--ir` dump (so string contents are visible without breaking line
/// structure) and for the `.ascii` directive in the emitted data section.
pub fn escape_for_debug(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len());
    for &b in bytes {
        if b.is_ascii_alphanumeric() || b == b' ' {
            s.push(b as char);
        } else {
            s.push_str(&format!("\\{:03o}", b));
        }
    }
    s
}

/// Dumps a whole instruction sequence in order (used by `--ir` mode).
pub fn debug_program(instrs: &[Instr]) -> String {
    let mut out = String::new();
    for i in instrs {
        i.debug(&mut out);
    }
    out
}
