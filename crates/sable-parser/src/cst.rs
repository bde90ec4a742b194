//! Concrete syntax tree.
//!
//! The CST mirrors the source faithfully: no name resolution, no types, no
//! desugaring beyond what the grammar itself implies. Every node carries a
//! [`SourceLocation`]. Nodes are plain owned data; template instantiation
//! clones declaration subtrees, so everything derives `Clone`.

use num_bigint::BigInt;
use sable_common::{Atom, SourceLocation};
use std::fmt;

/// A parsed translation unit.
#[derive(Clone, Debug)]
pub struct Module {
    pub namespace: Option<Namespace>,
    pub imports: Vec<Import>,
    pub decls: Vec<Decl>,
}

/// `namespace a::b::c;`
#[derive(Clone, Debug)]
pub struct Namespace {
    pub location: SourceLocation,
    pub identifiers: Vec<Identifier>,
}

/// `import "path";`
#[derive(Clone, Debug)]
pub struct Import {
    pub location: SourceLocation,
    pub path: String,
}

#[derive(Clone, Copy, Debug)]
pub struct Identifier {
    pub location: SourceLocation,
    pub name: Atom,
}

/// A top-level or member declaration.
#[derive(Clone, Debug)]
pub struct Decl {
    pub location: SourceLocation,
    /// The declared name (also available through the kind payload; kept
    /// here so declaration ordering and export insertion need not match on
    /// the kind).
    pub name: Atom,
    pub kind: DeclKind,
}

#[derive(Clone, Debug)]
pub enum DeclKind {
    Variable {
        identifier: Identifier,
        typespec: Option<TypeSpec>,
        expr: Expr,
    },
    Constant {
        identifier: Identifier,
        typespec: Option<TypeSpec>,
        expr: Expr,
    },
    Function(FunctionDecl),
    Struct(StructDecl),
    Extend {
        typespec: TypeSpec,
        decl: Box<Decl>,
    },
    Alias {
        identifier: Identifier,
        typespec: TypeSpec,
    },
    ExternVariable {
        identifier: Identifier,
        typespec: TypeSpec,
    },
    ExternFunction {
        identifier: Identifier,
        parameters: Vec<FunctionParameter>,
        return_typespec: TypeSpec,
    },
}

#[derive(Clone, Debug)]
pub struct FunctionDecl {
    pub identifier: Identifier,
    /// Non-empty for template functions.
    pub template_parameters: Vec<Identifier>,
    pub parameters: Vec<FunctionParameter>,
    pub return_typespec: TypeSpec,
    pub body: Block,
}

#[derive(Clone, Debug)]
pub struct StructDecl {
    pub identifier: Identifier,
    /// Non-empty for template structs.
    pub template_parameters: Vec<Identifier>,
    pub members: Vec<Member>,
}

#[derive(Clone, Debug)]
pub struct FunctionParameter {
    pub location: SourceLocation,
    pub identifier: Identifier,
    pub typespec: TypeSpec,
}

/// A member of a struct declaration.
#[derive(Clone, Debug)]
pub struct Member {
    pub location: SourceLocation,
    pub name: Atom,
    pub kind: MemberKind,
}

#[derive(Clone, Debug)]
pub enum MemberKind {
    /// `var name: T;`
    Variable { typespec: TypeSpec },
    /// Member constant; the payload is a `DeclKind::Constant` declaration.
    Constant(Box<Decl>),
    /// Member function; the payload is a `DeclKind::Function` declaration.
    Function(Box<Decl>),
}

#[derive(Clone, Debug)]
pub struct Block {
    pub location: SourceLocation,
    pub stmts: Vec<Stmt>,
}

#[derive(Clone, Debug)]
pub struct Stmt {
    pub location: SourceLocation,
    pub kind: StmtKind,
}

#[derive(Clone, Debug)]
pub enum StmtKind {
    Decl(Decl),
    Defer(Block),
    /// `if`/`elif`/`else` chain; a final `else` has no condition.
    If(Vec<Conditional>),
    ForRange {
        identifier: Identifier,
        /// Defaults to `0` when omitted.
        begin: Option<Expr>,
        end: Expr,
        body: Block,
    },
    ForExpr {
        expr: Expr,
        body: Block,
    },
    Break,
    Continue,
    Dump(Expr),
    Return(Option<Expr>),
    Assign {
        lhs: Expr,
        rhs: Expr,
    },
    Expr(Expr),
}

#[derive(Clone, Debug)]
pub struct Conditional {
    pub location: SourceLocation,
    pub condition: Option<Expr>,
    pub body: Block,
}

/// `.field = expr` inside a struct literal.
#[derive(Clone, Debug)]
pub struct MemberInitializer {
    pub location: SourceLocation,
    pub identifier: Identifier,
    pub expr: Expr,
}

#[derive(Clone, Debug)]
pub struct Expr {
    pub location: SourceLocation,
    pub kind: ExprKind,
}

#[derive(Clone, Debug)]
pub enum ExprKind {
    Symbol(SymbolPath),
    Boolean(bool),
    Integer {
        value: BigInt,
        /// Interned literal suffix; the empty atom when none was written.
        suffix: Atom,
    },
    Character(char),
    Bytes(String),
    Uninit,
    /// `(:[N]T)[e0, e1, ...]`, optionally with a trailing `expr...` fill.
    ArrayList {
        typespec: TypeSpec,
        elements: Vec<Expr>,
        ellipsis: Option<Box<Expr>>,
    },
    /// `(:[]T)[e0, e1, ...]` - slice list with synthesized backing storage.
    SliceList {
        typespec: TypeSpec,
        elements: Vec<Expr>,
    },
    /// `(:[]T){pointer, count}`
    Slice {
        typespec: TypeSpec,
        pointer: Box<Expr>,
        count: Box<Expr>,
    },
    /// `(:T){.field = expr, ...}`
    Struct {
        typespec: TypeSpec,
        initializers: Vec<MemberInitializer>,
    },
    /// `(:T)expr`
    Cast {
        typespec: TypeSpec,
        expr: Box<Expr>,
    },
    Grouped(Box<Expr>),
    Syscall(Vec<Expr>),
    Call {
        func: Box<Expr>,
        arguments: Vec<Expr>,
    },
    /// `lhs[idx]`
    AccessIndex {
        lhs: Box<Expr>,
        idx: Box<Expr>,
    },
    /// `lhs[begin:end]`
    AccessSlice {
        lhs: Box<Expr>,
        begin: Box<Expr>,
        end: Box<Expr>,
    },
    /// `lhs.member` or `lhs.member[[T]]`
    AccessMember {
        lhs: Box<Expr>,
        member: SymbolElement,
    },
    /// `lhs.*`
    AccessDereference {
        lhs: Box<Expr>,
    },
    Sizeof(TypeSpec),
    Alignof(TypeSpec),
    Unary {
        op: UnaryOp,
        op_location: SourceLocation,
        rhs: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        op_location: SourceLocation,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Pos,
    Neg,
    Bitnot,
    Dereference,
    Addressof,
    Countof,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnaryOp::Not => "not",
            UnaryOp::Pos => "+",
            UnaryOp::Neg => "-",
            UnaryOp::Bitnot => "~",
            UnaryOp::Dereference => "*",
            UnaryOp::Addressof => "&",
            UnaryOp::Countof => "countof",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Le,
    Lt,
    Ge,
    Gt,
    Add,
    Sub,
    Mul,
    Div,
    Bitor,
    Bitxor,
    Bitand,
    Shl,
    Shr,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BinaryOp::Or => "or",
            BinaryOp::And => "and",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Le => "<=",
            BinaryOp::Lt => "<",
            BinaryOp::Ge => ">=",
            BinaryOp::Gt => ">",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Bitor => "|",
            BinaryOp::Bitxor => "^",
            BinaryOp::Bitand => "&",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
        })
    }
}

/// A possibly-qualified symbol reference: `foo`, `foo::bar[[u16]]::baz`,
/// optionally anchored at module scope with a leading `::`.
#[derive(Clone, Debug)]
pub struct SymbolPath {
    pub location: SourceLocation,
    pub is_from_root: bool,
    pub elements: Vec<SymbolElement>,
}

/// One element of a qualified symbol: an identifier with an optional
/// template argument list.
#[derive(Clone, Debug)]
pub struct SymbolElement {
    pub location: SourceLocation,
    pub identifier: Identifier,
    pub template_arguments: Vec<TypeSpec>,
}

#[derive(Clone, Debug)]
pub struct TypeSpec {
    pub location: SourceLocation,
    pub kind: TypeSpecKind,
}

#[derive(Clone, Debug)]
pub enum TypeSpecKind {
    Symbol(SymbolPath),
    Function {
        parameter_typespecs: Vec<TypeSpec>,
        return_typespec: Box<TypeSpec>,
    },
    Pointer(Box<TypeSpec>),
    Array {
        count: Box<Expr>,
        base: Box<TypeSpec>,
    },
    Slice(Box<TypeSpec>),
    Typeof(Box<Expr>),
}
