//! The C type model (spec §3, §4.1) shared by symbol tables, lowering, and the emitter.

pub mod symbol;

use crate::context::CompilationContext;
use crate::error::{CompileError, Result};
use std::fmt;

/// The builtin tag of a [`Type`]. Struct and enum carry their further identity (the tag
/// name) alongside this in [`Type::tag`], rather than as payload here, so that `Type`
/// stays a small `Copy`-friendly value modulo the tag string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinType {
    Void,
    Char,
    Short,
    Int,
    Long,
    LongLong,
    Float,
    Double,
    LongDouble,
    Struct,
    /// Used for both `struct` and `union` tags; layout differs only in how members are
    /// assigned offsets in [`symbol::StructureType`], not in anything `Type` itself needs
    /// to distinguish.
    Enum,
}

/// A C type: a builtin tag, a pointer-depth count, a signedness flag, and (for
/// struct/enum) the tag name. Immutable value type — types are never mutated in place,
/// only constructed or derived (e.g. via [`Type::dereference`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Type {
    pub builtin: BuiltinType,
    /// 0 = not a pointer. `pointer_depth` counts `*` to the left of the base type.
    pub pointer_depth: u32,
    pub signed: bool,
    /// The struct/enum tag name; populated only when `builtin` is `Struct`/`Enum`.
    pub tag: Option<String>,
}

impl Type {
    pub fn new(builtin: BuiltinType, pointer_depth: u32, signed: bool) -> Self {
        Type { builtin, pointer_depth, signed, tag: None }
    }

    pub fn void() -> Self { Type::new(BuiltinType::Void, 0, true) }
    pub fn int() -> Self { Type::new(BuiltinType::Int, 0, true) }
    pub fn uint() -> Self { Type::new(BuiltinType::Int, 0, false) }
    pub fn char_ty() -> Self { Type::new(BuiltinType::Char, 0, true) }
    pub fn double() -> Self { Type::new(BuiltinType::Double, 0, true) }

    pub fn pointer_to(mut self) -> Self {
        self.pointer_depth += 1;
        self
    }

    pub fn struct_named(tag: impl Into<String>) -> Self {
        Type { builtin: BuiltinType::Struct, pointer_depth: 0, signed: true, tag: Some(tag.into()) }
    }

    pub fn enum_named(tag: impl Into<String>) -> Self {
        Type { builtin: BuiltinType::Enum, pointer_depth: 0, signed: true, tag: Some(tag.into()) }
    }

    /// Size in bytes. Struct sizes require the structure table, since (unlike every other
    /// builtin) a struct's size is a function of its member list, not its tag alone; every
    /// other case is a constant computable with no context at all.
    pub fn bytes(&self, ctx: &CompilationContext) -> u32 {
        if self.pointer_depth > 0 {
            return 4;
        }
        match self.builtin {
            BuiltinType::Void => 0,
            BuiltinType::Char => 1,
            BuiltinType::Short => 2,
            BuiltinType::Int | BuiltinType::Long | BuiltinType::Float | BuiltinType::Enum => 4,
            BuiltinType::LongLong | BuiltinType::Double | BuiltinType::LongDouble => 8,
            BuiltinType::Struct => {
                let tag = self.tag.as_deref().unwrap_or("<anonymous>");
                ctx.structures.get(tag).map_or(0, |s| s.total_size(ctx))
            }
        }
    }

    pub fn is_integer(&self) -> bool {
        self.pointer_depth == 0
            && matches!(
                self.builtin,
                BuiltinType::Char
                    | BuiltinType::Short
                    | BuiltinType::Int
                    | BuiltinType::Long
                    | BuiltinType::LongLong
                    | BuiltinType::Enum
            )
    }

    pub fn is_float(&self) -> bool {
        self.pointer_depth == 0
            && matches!(self.builtin, BuiltinType::Float | BuiltinType::Double | BuiltinType::LongDouble)
    }

    pub fn is_pointer(&self) -> bool { self.pointer_depth > 0 }

    pub fn is_struct(&self) -> bool { self.pointer_depth == 0 && self.builtin == BuiltinType::Struct }

    pub fn is_void(&self) -> bool { self.pointer_depth == 0 && self.builtin == BuiltinType::Void }

    /// Pointers are always unsigned addresses; every other type uses its own flag.
    pub fn is_signed(&self) -> bool {
        if self.is_pointer() { false } else { self.signed }
    }

    /// Strips one level of pointer indirection. Calling this on a non-pointer type is a
    /// caller bug (lowering never calls it without first checking `is_pointer`); it
    /// returns the type unchanged rather than panicking, since the only caller able to
    /// observe this is already inside a dead branch.
    pub fn dereference(&self) -> Type {
        let mut t = self.clone();
        t.pointer_depth = t.pointer_depth.saturating_sub(1);
        t
    }

    /// Structural equality by tag identity for struct/enum (spec §9a open question 2):
    /// two structs compare equal only if they share a tag name, never by layout alone.
    pub fn equals(&self, other: &Type) -> bool {
        self.builtin == other.builtin && self.pointer_depth == other.pointer_depth && self.tag == other.tag
    }

    pub fn name(&self) -> String {
        let base = match self.builtin {
            BuiltinType::Void => "void".to_string(),
            BuiltinType::Char => if self.signed { "char".to_string() } else { "unsigned char".to_string() },
            BuiltinType::Short => if self.signed { "short".to_string() } else { "unsigned short".to_string() },
            BuiltinType::Int => if self.signed { "int".to_string() } else { "unsigned int".to_string() },
            BuiltinType::Long => if self.signed { "long".to_string() } else { "unsigned long".to_string() },
            BuiltinType::LongLong => {
                if self.signed { "long long".to_string() } else { "unsigned long long".to_string() }
            }
            BuiltinType::Float => "float".to_string(),
            BuiltinType::Double => "double".to_string(),
            BuiltinType::LongDouble => "long double".to_string(),
            BuiltinType::Struct => format!("struct {}", self.tag.as_deref().unwrap_or("<anonymous>")),
            BuiltinType::Enum => format!("enum {}", self.tag.as_deref().unwrap_or("<anonymous>")),
        };
        format!("{base}{}", "*".repeat(self.pointer_depth as usize))
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.name()) }
}

/// The usual arithmetic conversions, `C(a, b)` of spec §4.1. Pure: does not consult any
/// context, since every rule below depends only on the two builtin tags and signedness,
/// never on struct layout.
pub fn common_type(a: &Type, b: &Type) -> Type {
    use BuiltinType::*;
    if a.builtin == LongDouble || b.builtin == LongDouble {
        return Type::new(LongDouble, 0, true);
    }
    if a.builtin == Double || b.builtin == Double {
        return Type::new(Double, 0, true);
    }
    if a.builtin == Float || b.builtin == Float {
        return Type::new(Float, 0, true);
    }
    // Both are integral (or enum, treated as int): apply integer promotion, then rank.
    let pa = promote(a);
    let pb = promote(b);
    if pa.builtin == LongLong && !pa.signed { return pa; }
    if pb.builtin == LongLong && !pb.signed { return pb; }
    if pa.builtin == LongLong || pb.builtin == LongLong {
        return Type::new(LongLong, 0, true);
    }
    if pa.builtin == Long && !pa.signed { return pa; }
    if pb.builtin == Long && !pb.signed { return pb; }
    if pa.builtin == Long || pb.builtin == Long {
        return Type::new(Long, 0, true);
    }
    if !pa.signed || !pb.signed {
        return Type::new(Int, 0, false);
    }
    Type::new(Int, 0, true)
}

/// Integer promotion: anything narrower than `int` (and `char`/`short` whether signed
/// or not) becomes a signed `int`; everything `int`-or-wider passes through unchanged.
fn promote(t: &Type) -> Type {
    match t.builtin {
        BuiltinType::Char | BuiltinType::Short | BuiltinType::Enum => Type::new(BuiltinType::Int, 0, true),
        _ => t.clone(),
    }
}

/// `sizeof` evaluated statically against a type, never against a value (spec §4.1: "must
/// not evaluate side effects").
pub fn size_of(ty: &Type, ctx: &CompilationContext) -> u32 { ty.bytes(ctx) }

/// Resolves `a + b` / `a - b`'s pointer-arithmetic special cases at the type level
/// (spec §9a open question 1). Returns the result type, or an error if both operands
/// are pointers on a `+` (meaningless) or the pointee types disagree on `ptr - ptr`.
pub fn pointer_arith_result(a: &Type, b: &Type, op: char, line: u32) -> Result<Type> {
    match (a.is_pointer(), b.is_pointer()) {
        (true, true) => {
            if op != '-' {
                return Err(CompileError::InvalidOperand {
                    message: "cannot add two pointers".to_string(),
                    line,
                });
            }
            if !a.dereference().equals(&b.dereference()) {
                return Err(CompileError::InvalidOperand {
                    message: format!(
                        "cannot subtract pointers to incompatible types '{}' and '{}'",
                        a.name(),
                        b.name()
                    ),
                    line,
                });
            }
            Ok(Type::new(BuiltinType::Long, 0, true))
        }
        (true, false) => Ok(a.clone()),
        (false, true) => Ok(b.clone()),
        (false, false) => Ok(common_type(a, b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_plus_char_is_int() {
        let c = Type::char_ty();
        let t = common_type(&c, &c);
        assert_eq!(t.builtin, BuiltinType::Int);
    }

    #[test]
    fn unsigned_wins_over_signed_at_same_rank() {
        let u = Type::uint();
        let i = Type::int();
        let t = common_type(&i, &u);
        assert!(!t.signed);
        assert_eq!(t.builtin, BuiltinType::Int);
    }

    #[test]
    fn pointer_has_size_four_regardless_of_pointee() {
        let ctx = CompilationContext::new();
        let p = Type::double().pointer_to();
        assert_eq!(p.bytes(&ctx), 4);
    }

    #[test]
    fn struct_equality_is_name_based() {
        let a = Type::struct_named("Point");
        let b = Type::struct_named("Point");
        let c = Type::struct_named("Other");
        assert!(a.equals(&b));
        assert!(!a.equals(&c));
    }

    #[test]
    fn ptr_minus_ptr_is_long() {
        let p = Type::int().pointer_to();
        let r = pointer_arith_result(&p, &p, '-', 1).unwrap();
        assert_eq!(r.builtin, BuiltinType::Long);
    }

    #[test]
    fn ptr_plus_ptr_is_rejected() {
        let p = Type::int().pointer_to();
        assert!(pointer_arith_result(&p, &p, '+', 1).is_err());
    }
}
