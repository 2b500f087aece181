//! The AST node set (SPEC_FULL.md §4.4). Hand-rolled C parsing is out of scope
//! (SPEC_FULL.md §6a): a translation unit is produced externally and handed to this
//! crate as JSON, so these types carry `serde` derives — the one place in this crate
//! `serde` is used, confined to the process boundary; `src/lower.rs` and everything
//! below it never sees JSON again.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeName {
    pub builtin: String,
    pub pointer_depth: u32,
    #[serde(default)]
    pub signed: bool,
    #[serde(default)]
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub decls: Vec<ExternalDecl>,
    pub line: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ExternalDecl {
    Var(VarDecl),
    Function(FunctionDecl),
    Struct(StructDecl),
    Union(StructDecl),
    Enum(EnumDecl),
    Typedef(TypedefDecl),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarDecl {
    pub name: String,
    pub ty: TypeName,
    #[serde(default)]
    pub array_len: Option<u32>,
    #[serde(default)]
    pub init: Option<Expr>,
    pub line: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: TypeName,
    pub line: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    pub ret: TypeName,
    pub params: Vec<Param>,
    #[serde(default)]
    pub body: Option<Stmt>,
    pub line: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructMember {
    pub name: String,
    pub ty: TypeName,
    #[serde(default)]
    pub array_len: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructDecl {
    pub tag: String,
    pub members: Vec<StructMember>,
    pub line: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumMember {
    pub name: String,
    #[serde(default)]
    pub value: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumDecl {
    pub tag: String,
    pub members: Vec<EnumMember>,
    pub line: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypedefDecl {
    pub alias: String,
    pub ty: TypeName,
    pub line: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Stmt {
    Block { stmts: Vec<Stmt>, line: u32 },
    If { cond: Expr, then_branch: Box<Stmt>, else_branch: Option<Box<Stmt>>, line: u32 },
    While { cond: Expr, body: Box<Stmt>, line: u32 },
    DoWhile { body: Box<Stmt>, cond: Expr, line: u32 },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        step: Option<Expr>,
        body: Box<Stmt>,
        line: u32,
    },
    Switch { scrutinee: Expr, body: Box<Stmt>, line: u32 },
    Case { value: i32, line: u32 },
    Default { line: u32 },
    Return { value: Option<Expr>, line: u32 },
    Break { line: u32 },
    Continue { line: u32 },
    ExprStmt { expr: Expr, line: u32 },
    DeclStmt { decl: VarDecl, line: u32 },
}

impl Stmt {
    pub fn line(&self) -> u32 {
        match self {
            Stmt::Block { line, .. }
            | Stmt::If { line, .. }
            | Stmt::While { line, .. }
            | Stmt::DoWhile { line, .. }
            | Stmt::For { line, .. }
            | Stmt::Switch { line, .. }
            | Stmt::Case { line, .. }
            | Stmt::Default { line, .. }
            | Stmt::Return { line, .. }
            | Stmt::Break { line, .. }
            | Stmt::Continue { line, .. }
            | Stmt::ExprStmt { line, .. }
            | Stmt::DeclStmt { line, .. } => *line,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    Not,
    BitNot,
    PreInc,
    PreDec,
    PostInc,
    PostDec,
    Deref,
    AddressOf,
    Sizeof,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Expr {
    Ident { name: String, line: u32 },
    IntLit { value: i64, line: u32 },
    FloatLit { value: f64, line: u32 },
    CharLit { value: u8, line: u32 },
    StringLit { value: String, line: u32 },
    Unary { op: UnaryOp, operand: Box<Expr>, line: u32 },
    Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr>, line: u32 },
    Assign { lhs: Box<Expr>, rhs: Box<Expr>, line: u32 },
    CompoundAssign { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr>, line: u32 },
    Ternary { cond: Box<Expr>, then_expr: Box<Expr>, else_expr: Box<Expr>, line: u32 },
    Call { callee: String, args: Vec<Expr>, line: u32 },
    Member { base: Box<Expr>, field: String, arrow: bool, line: u32 },
    Subscript { base: Box<Expr>, index: Box<Expr>, line: u32 },
    Cast { ty: TypeName, operand: Box<Expr>, line: u32 },
    SizeofExpr { operand: Box<Expr>, line: u32 },
    SizeofType { ty: TypeName, line: u32 },
}

impl Expr {
    pub fn line(&self) -> u32 {
        match self {
            Expr::Ident { line, .. }
            | Expr::IntLit { line, .. }
            | Expr::FloatLit { line, .. }
            | Expr::CharLit { line, .. }
            | Expr::StringLit { line, .. }
            | Expr::Unary { line, .. }
            | Expr::Binary { line, .. }
            | Expr::Assign { line, .. }
            | Expr::CompoundAssign { line, .. }
            | Expr::Ternary { line, .. }
            | Expr::Call { line, .. }
            | Expr::Member { line, .. }
            | Expr::Subscript { line, .. }
            | Expr::Cast { line, .. }
            | Expr::SizeofExpr { line, .. }
            | Expr::SizeofType { line, .. } => *line,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn program_round_trips_through_json() {
        let prog = Program {
            decls: vec![ExternalDecl::Var(VarDecl {
                name: "x".into(),
                ty: TypeName { builtin: "int".into(), pointer_depth: 0, signed: true, tag: None },
                array_len: None,
                init: Some(Expr::IntLit { value: 42, line: 1 }),
                line: 1,
            })],
            line: 1,
        };
        let json = serde_json::to_string(&prog).unwrap();
        let back: Program = serde_json::from_str(&json).unwrap();
        assert_eq!(back.decls.len(), 1);
    }
}
