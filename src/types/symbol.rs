//! Symbol tables (spec §3, §4.2): bindings, lexical scoping, per-function stack layout,
//! and the structure/enum/array layout helpers. Grounded directly on
//! `original_source/src/intrep/VariableMap.hpp`.

use crate::context::CompilationContext;
use crate::error::{CompileError, Result};
use crate::order::OrderedMap;
use crate::types::Type;
use hashbrown::HashMap;
use std::mem;

/// `(alias, type, is_global, is_function, params)` of spec §3.
#[derive(Debug, Clone)]
pub struct Binding {
    /// The emitted symbol name; differs from the source identifier once an inner scope
    /// shadows an outer one (the renaming scheme lives in the lowering pass, not here).
    pub alias: String,
    pub ty: Type,
    pub is_global: bool,
    pub is_function: bool,
    pub params: Vec<Type>,
}

impl Binding {
    pub fn variable(alias: impl Into<String>, ty: Type, is_global: bool) -> Self {
        Binding { alias: alias.into(), ty, is_global, is_function: false, params: Vec::new() }
    }

    pub fn function(alias: impl Into<String>, ty: Type, params: Vec<Type>) -> Self {
        Binding { alias: alias.into(), ty, is_global: true, is_function: true, params }
    }
}

/// `(elementType, elementCount)` plus the stride rule of spec §3: stride equals element
/// size for elements of 1/2/4 bytes, else the element size rounded up to a multiple of 4.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayType {
    pub element: Type,
    pub elements: u32,
}

impl ArrayType {
    pub fn stride(&self, ctx: &CompilationContext) -> u32 {
        let sz = self.element.bytes(ctx);
        match sz {
            1 | 2 | 4 => sz,
            _ => align_up(sz, 4),
        }
    }

    pub fn total_size(&self, ctx: &CompilationContext) -> u32 { self.stride(ctx) * self.elements }
}

/// Rounds `value` up to the next multiple of `align` (`align` a power of two).
pub fn align_up(value: u32, align: u32) -> u32 { (value + align - 1) & !(align - 1) }

/// `(members: ordered map name->Type, arrays: name->ArrayType, order)` of spec §3. The
/// ordering is carried by `members` itself (an [`OrderedMap`]) rather than a parallel
/// `order: Vec<String>` field, since the two would otherwise have to be kept in sync by
/// hand.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructureType {
    pub members: OrderedMap<Type>,
    pub arrays: HashMap<String, ArrayType>,
}

impl StructureType {
    pub fn new() -> Self { StructureType::default() }

    pub fn member_exists(&self, name: &str) -> bool { self.members.contains_key(name) }

    pub fn get_member_type(&self, name: &str) -> Option<&Type> { self.members.get(name) }

    /// Sequential packing: each member starts immediately after the previous one's
    /// (stride-adjusted, for arrays) size. No alignment padding beyond the array stride
    /// rule is specified, so none is added.
    pub fn get_member_offset(&self, name: &str, ctx: &CompilationContext) -> u32 {
        let mut offset = 0u32;
        for (k, ty) in self.members.iter() {
            if k == name {
                return offset;
            }
            offset += self.member_size(k, ty, ctx);
        }
        offset
    }

    fn member_size(&self, name: &str, ty: &Type, ctx: &CompilationContext) -> u32 {
        match self.arrays.get(name) {
            Some(arr) => arr.total_size(ctx),
            None => ty.bytes(ctx),
        }
    }

    pub fn total_size(&self, ctx: &CompilationContext) -> u32 {
        match self.members.last() {
            Some((name, ty)) => self.get_member_offset(name, ctx) + self.member_size(name, ty, ctx),
            None => 0,
        }
    }

    pub fn add_member(&mut self, name: impl Into<String>, ty: Type) {
        self.members.insert(name, ty);
    }

    pub fn add_array_member(&mut self, name: impl Into<String>, element: Type, elements: u32) {
        let name = name.into();
        self.arrays.insert(name.clone(), ArrayType { element: element.clone(), elements });
        self.members.insert(name, element);
    }
}

/// `(members: name->int, next_member: int)` of spec §3, with the auto-increment rule:
/// an undecorated `add(name)` takes the running counter and bumps it by one; an
/// explicit `add(name, value)` resets the counter to `value + 1`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnumType {
    pub members: HashMap<String, i32>,
    pub next_member: i32,
}

impl EnumType {
    pub fn new() -> Self { EnumType::default() }

    pub fn member_exists(&self, name: &str) -> bool { self.members.contains_key(name) }

    pub fn get_member_value(&self, name: &str) -> Option<i32> { self.members.get(name).copied() }

    pub fn add(&mut self, name: impl Into<String>) {
        let v = self.next_member;
        self.members.insert(name.into(), v);
        self.next_member = v + 1;
    }

    pub fn add_value(&mut self, name: impl Into<String>, value: i32) {
        self.members.insert(name.into(), value);
        self.next_member = value + 1;
    }
}

/// Ordered mapping from source identifier to [`Binding`], chained by lexical scope with
/// innermost-wins lookup (spec §3, §4.2). `break_destination`/`continue_destination` are
/// saved and restored around loop/switch bodies via [`VariableMap::with_loop_destinations`],
/// the Rust analogue of the "scoped acquisition with guaranteed release on all exit
/// paths" requirement: no exceptions to unwind through, so a plain "run, then restore"
/// wrapper gives the same guarantee as long as the callback never forgets to use `?`
/// instead of panicking.
#[derive(Debug, Default)]
pub struct VariableMap {
    scopes: Vec<HashMap<String, Binding>>,
    pub break_destination: String,
    pub continue_destination: String,
}

impl VariableMap {
    pub fn new() -> Self {
        VariableMap { scopes: vec![HashMap::new()], break_destination: String::new(), continue_destination: String::new() }
    }

    pub fn enter_scope(&mut self) { self.scopes.push(HashMap::new()); }

    pub fn leave_scope(&mut self) {
        self.scopes.pop();
        debug_assert!(!self.scopes.is_empty(), "popped the file (outermost) scope");
    }

    /// Runs `f` with a fresh innermost scope, popping it whether `f` succeeds or fails.
    pub fn with_scope<T>(&mut self, f: impl FnOnce(&mut VariableMap) -> Result<T>) -> Result<T> {
        self.enter_scope();
        let result = f(self);
        self.leave_scope();
        result
    }

    /// Runs `f` with `break`/`continue` destinations set to `brk`/`cont`, restoring the
    /// enclosing loop's destinations afterward regardless of outcome.
    pub fn with_loop_destinations<T>(
        &mut self,
        brk: impl Into<String>,
        cont: impl Into<String>,
        f: impl FnOnce(&mut VariableMap) -> Result<T>,
    ) -> Result<T> {
        let old_break = mem::replace(&mut self.break_destination, brk.into());
        let old_continue = mem::replace(&mut self.continue_destination, cont.into());
        let result = f(self);
        self.break_destination = old_break;
        self.continue_destination = old_continue;
        result
    }

    pub fn declare(&mut self, name: &str, binding: Binding, line: u32) -> Result<()> {
        let innermost = self.scopes.last_mut().expect("at least one scope");
        if let Some(existing) = innermost.get(name) {
            if !existing.ty.equals(&binding.ty) || existing.is_function != binding.is_function {
                return Err(CompileError::Redeclaration { name: name.to_string(), line });
            }
        }
        innermost.insert(name.to_string(), binding);
        Ok(())
    }

    pub fn lookup(&self, name: &str, line: u32) -> Result<&Binding> {
        for scope in self.scopes.iter().rev() {
            if let Some(b) = scope.get(name) {
                return Ok(b);
            }
        }
        Err(CompileError::Undeclared { name: name.to_string(), line })
    }

    /// Copies every binding visible in `self` into a fresh single-scope map, outer scopes
    /// first so an inner one's shadowing is preserved. Used to seed a function's lexical
    /// scope with the bindings of the file-scope `VariableMap` it was lowered from, since
    /// scope storage itself is never shared between two `VariableMap`s.
    pub fn fork(&self) -> VariableMap {
        let mut merged = HashMap::new();
        for scope in &self.scopes {
            for (name, binding) in scope {
                merged.insert(name.clone(), binding.clone());
            }
        }
        VariableMap { scopes: vec![merged], break_destination: String::new(), continue_destination: String::new() }
    }
}

/// Mapping from alias to [`Type`] for every local (including compiler-generated
/// temporaries) in the current function, plus the associated array metadata (spec §3).
/// Backed by an [`OrderedMap`] — not a hash map — because the emitter assigns stack
/// offsets by walking this table in declaration order (spec §8's determinism invariant).
#[derive(Debug, Clone, Default)]
pub struct FunctionStack {
    pub locals: OrderedMap<Type>,
    pub arrays: HashMap<String, ArrayType>,
}

impl FunctionStack {
    pub fn new() -> Self { FunctionStack::default() }

    pub fn add_local(&mut self, alias: impl Into<String>, ty: Type) {
        self.locals.insert(alias, ty);
    }

    pub fn add_array(&mut self, alias: impl Into<String>, element: Type, elements: u32) {
        let alias = alias.into();
        self.arrays.insert(alias.clone(), ArrayType { element: element.clone(), elements });
        self.locals.insert(alias, element);
    }

    pub fn get_type(&self, alias: &str) -> Option<&Type> { self.locals.get(alias) }

    pub fn get_array(&self, alias: &str) -> Option<&ArrayType> { self.arrays.get(alias) }

    fn slot_size(&self, alias: &str, ty: &Type, ctx: &CompilationContext) -> u32 {
        match self.arrays.get(alias) {
            Some(arr) => arr.total_size(ctx),
            None => ty.bytes(ctx),
        }
    }

    /// The total bytes of stack space needed for every local, in declaration order.
    /// Consumed by the emitter to size the frame; per-variable offsets are computed the
    /// same way by [`crate::codegen::FrameLayout`], walking this same order.
    pub fn total_locals_size(&self, ctx: &CompilationContext) -> u32 {
        let mut total = 0;
        for (alias, ty) in self.locals.iter() {
            total += self.slot_size(alias, ty, ctx);
        }
        total
    }
}
