//! The closed error taxonomy raised by every stage of the pipeline.
//!
//! There is no recovery once one of these is raised: the current translation unit is
//! abandoned and the first fatal error is reported. This mirrors the propagation rule
//! of the compiler this crate replaces, which never attempted partial recovery either.

use std::fmt;

/// A single fatal compilation error, tagged with the kind of problem encountered.
///
/// None of these carry a `thiserror`-style derive; the taxonomy is small and closed,
/// and a hand-written `Display` keeps the wording under direct control (the CLI
/// contract requires the exact trailing line `"compilation terminated."`, appended by
/// the caller, not by this type).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// An identifier was referenced but never declared in any visible scope.
    Undeclared { name: String, line: u32 },
    /// An identifier was declared a second time with an incompatible type in the same
    /// scope, or a struct/union/enum/typedef tag was redefined with a different body.
    Redeclaration { name: String, line: u32 },
    /// Two types were required to agree (assignment, return, relational operator) and
    /// did not.
    TypeMismatch { message: String, line: u32 },
    /// An expression was used in a context that requires an lvalue (assignment target,
    /// operand of `&`) but does not designate storage.
    NotAnLvalue { line: u32 },
    /// An operator was applied to operand types it is not defined over (bitwise op on a
    /// struct/float, `%` on a float, unary `-` on a struct, cast to/from a struct, `ptr + ptr`).
    InvalidOperand { message: String, line: u32 },
    /// A call supplied fewer arguments than the callee declares parameters.
    ArityMismatch { name: String, expected: usize, found: usize, line: u32 },
    /// The emitter reached a branch it believes is unreachable given prior validation.
    /// Reaching this at runtime means an earlier stage failed to enforce an invariant.
    InternalInvariant { message: String },
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Undeclared { name, line } => {
                write!(f, "line {line}: '{name}' was not declared in this scope")
            }
            CompileError::Redeclaration { name, line } => {
                write!(f, "line {line}: redeclaration of '{name}'")
            }
            CompileError::TypeMismatch { message, line } => {
                write!(f, "line {line}: type mismatch: {message}")
            }
            CompileError::NotAnLvalue { line } => {
                write!(f, "line {line}: expression is not an lvalue")
            }
            CompileError::InvalidOperand { message, line } => {
                write!(f, "line {line}: {message}")
            }
            CompileError::ArityMismatch { name, expected, found, line } => {
                write!(
                    f,
                    "line {line}: cannot call function '{name}': expected {expected} argument(s), found {found}"
                )
            }
            CompileError::InternalInvariant { message } => {
                write!(f, "internal compiler error: {message}")
            }
        }
    }
}

impl std::error::Error for CompileError {}

pub type Result<T> = std::result::Result<T, CompileError>;
