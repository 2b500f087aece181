//! `CompilationContext`: the process-wide state of the original design (spec §3's
//! "process-wide tables", §9's unique-name counter and structure/enum/typedef
//! registries) reified as an explicit, instantiate-once-per-translation-unit value
//! instead of hidden globals, per Design Notes §9 ("thread them as a
//! `CompilationContext` value through the lowering and emission pipelines... This
//! removes hidden coupling and makes the compiler reentrant.").

use crate::error::{CompileError, Result};
use crate::types::symbol::{EnumType, StructureType};
use crate::types::Type;
use hashbrown::HashMap;

#[derive(Debug, Default)]
pub struct CompilationContext {
    pub structures: HashMap<String, StructureType>,
    pub enums: HashMap<String, EnumType>,
    pub typedefs: HashMap<String, Type>,
    next_temp: u64,
    next_label: u64,
}

impl CompilationContext {
    pub fn new() -> Self { CompilationContext::default() }

    /// A fresh, collision-free temporary name, prefixed `$T` (spec §4.3).
    pub fn fresh_temp(&mut self) -> String {
        let n = self.next_temp;
        self.next_temp += 1;
        format!("$T{n}")
    }

    /// A fresh, collision-free label name, prefixed `$L` (spec §4.3).
    pub fn fresh_label(&mut self) -> String {
        let n = self.next_label;
        self.next_label += 1;
        format!("$L{n}")
    }

    /// Declares a struct/union tag; redeclaration with a differing member list is an
    /// error (spec §4.2: "Typedef, struct, and enum tables are flat and process-wide;
    /// redeclaration with differing definition is `Redeclaration`").
    pub fn declare_struct(&mut self, name: &str, def: StructureType, line: u32) -> Result<()> {
        if let Some(existing) = self.structures.get(name) {
            if *existing != def {
                return Err(CompileError::Redeclaration { name: name.to_string(), line });
            }
            return Ok(());
        }
        self.structures.insert(name.to_string(), def);
        Ok(())
    }

    /// Declares an enum tag wholesale (used when an `EnumDecl`'s full member list is
    /// already known). See [`Self::declare_enum_member`] for the parser-time
    /// incremental variant required by spec §6's "the parser must install enum members
    /// into the enum table during parsing" rule.
    pub fn declare_enum(&mut self, name: &str, def: EnumType, line: u32) -> Result<()> {
        if let Some(existing) = self.enums.get(name) {
            if *existing != def {
                return Err(CompileError::Redeclaration { name: name.to_string(), line });
            }
            return Ok(());
        }
        self.enums.insert(name.to_string(), def);
        Ok(())
    }

    /// Installs one enum member into `name`'s table as it is encountered, so that later
    /// constant expressions in the same translation unit (including other members of
    /// the same enum) can already see it — the incremental counterpart of
    /// [`Self::declare_enum`], used by the `--ast-json` ingestion path (SPEC_FULL.md §4.4).
    pub fn declare_enum_member(&mut self, enum_name: &str, member: &str, value: Option<i32>) {
        let e = self.enums.entry(enum_name.to_string()).or_insert_with(EnumType::new);
        match value {
            Some(v) => e.add_value(member, v),
            None => e.add(member),
        }
    }

    pub fn declare_typedef(&mut self, alias: &str, ty: Type, line: u32) -> Result<()> {
        if let Some(existing) = self.typedefs.get(alias) {
            if !existing.equals(&ty) {
                return Err(CompileError::Redeclaration { name: alias.to_string(), line });
            }
            return Ok(());
        }
        self.typedefs.insert(alias.to_string(), ty);
        Ok(())
    }

    pub fn typedef_exists(&self, alias: &str) -> bool { self.typedefs.contains_key(alias) }

    pub fn typedef_get(&self, alias: &str) -> Option<&Type> { self.typedefs.get(alias) }

    /// Looks up a struct/union member's value-semantic global; convenience over
    /// `self.structures.get(name).map(...)` used throughout the emitter.
    pub fn struct_total_size(&self, name: &str) -> u32 {
        self.structures.get(name).map_or(0, |s| s.total_size(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_and_label_counters_are_monotonic_and_distinct() {
        let mut ctx = CompilationContext::new();
        assert_eq!(ctx.fresh_temp(), "$T0");
        assert_eq!(ctx.fresh_temp(), "$T1");
        assert_eq!(ctx.fresh_label(), "$L0");
        assert_eq!(ctx.fresh_temp(), "$T2");
    }

    #[test]
    fn redeclared_struct_with_same_shape_is_fine() {
        let mut ctx = CompilationContext::new();
        let mut s = StructureType::new();
        s.add_member("x", Type::int());
        ctx.declare_struct("Point", s.clone(), 1).unwrap();
        ctx.declare_struct("Point", s, 2).unwrap();
    }

    #[test]
    fn redeclared_struct_with_different_shape_errors() {
        let mut ctx = CompilationContext::new();
        let mut s1 = StructureType::new();
        s1.add_member("x", Type::int());
        let mut s2 = StructureType::new();
        s2.add_member("x", Type::double());
        ctx.declare_struct("Point", s1, 1).unwrap();
        let err = ctx.declare_struct("Point", s2, 2);
        assert!(matches!(err, Err(CompileError::Redeclaration { .. })));
    }

    #[test]
    fn incremental_enum_members_accumulate() {
        let mut ctx = CompilationContext::new();
        ctx.declare_enum_member("Color", "RED", None);
        ctx.declare_enum_member("Color", "GREEN", None);
        ctx.declare_enum_member("Color", "BLUE", Some(10));
        let e = &ctx.enums["Color"];
        assert_eq!(e.get_member_value("RED"), Some(0));
        assert_eq!(e.get_member_value("GREEN"), Some(1));
        assert_eq!(e.get_member_value("BLUE"), Some(10));
    }
}
