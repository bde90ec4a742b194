//! Typed IR.
//!
//! The resolver lowers the CST into these nodes. Every expression carries
//! its resolved type; every statement and block is reachable from some
//! function body. Nodes reference each other through arena ids so defer
//! chains and backing-storage symbols can be shared rather than cloned.

use crate::address::Address;
use crate::context::ScopeId;
use crate::symbols::SymbolId;
use crate::types::TypeId;
use num_bigint::BigInt;
use sable_common::{Atom, SourceLocation};
use sable_parser::cst::{BinaryOp, UnaryOp};

macro_rules! tir_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub struct $name(pub(crate) u32);

        impl $name {
            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

tir_id!(
    /// Handle to a TIR expression.
    ExprId
);
tir_id!(
    /// Handle to a TIR statement.
    StmtId
);
tir_id!(
    /// Handle to a TIR block.
    BlockId
);
tir_id!(
    /// Handle to a function.
    FunctionId
);

#[derive(Clone, Debug)]
pub struct Expr {
    pub location: SourceLocation,
    pub type_: TypeId,
    pub kind: ExprKind,
}

#[derive(Clone, Debug)]
pub enum ExprKind {
    /// Reference to a variable, constant, or function symbol.
    Symbol(SymbolId),
    Boolean(bool),
    Integer(BigInt),
    /// A bytes literal: the hidden static backing array and the byte count
    /// (excluding the trailing NUL).
    Bytes { address: Address, count: u64 },
    /// Array literal, optionally with an ellipsis element filling the
    /// remainder of the array.
    ArrayList {
        elements: Vec<ExprId>,
        ellipsis: Option<ExprId>,
    },
    /// Slice literal backed by synthesized storage.
    SliceList {
        backing: SymbolId,
        elements: Vec<ExprId>,
    },
    /// Slice constructed from a pointer and a count.
    Slice { pointer: ExprId, count: ExprId },
    /// Struct literal; fields in member declaration order.
    Struct { fields: Vec<ExprId> },
    Cast { expr: ExprId },
    Syscall { arguments: Vec<ExprId> },
    Call {
        function: ExprId,
        arguments: Vec<ExprId>,
    },
    Index { lhs: ExprId, idx: ExprId },
    AccessSlice {
        lhs: ExprId,
        begin: ExprId,
        end: ExprId,
    },
    /// Struct member variable access; `member` indexes the struct type's
    /// member list.
    MemberVariable { lhs: ExprId, member: usize },
    Sizeof { operand: TypeId },
    Alignof { operand: TypeId },
    Unary { op: UnaryOp, rhs: ExprId },
    Binary {
        op: BinaryOp,
        lhs: ExprId,
        rhs: ExprId,
    },
}

#[derive(Clone, Debug)]
pub struct Stmt {
    pub location: SourceLocation,
    pub kind: StmtKind,
}

#[derive(Clone, Debug)]
pub enum StmtKind {
    If { conditionals: Vec<Conditional> },
    ForRange {
        loop_variable: SymbolId,
        begin: ExprId,
        end: ExprId,
        body: BlockId,
    },
    ForExpr { condition: ExprId, body: BlockId },
    /// A defer node. `prev` links to the defer in effect before this one;
    /// the statement itself is a no-op at its textual position.
    Defer { prev: Option<StmtId>, body: BlockId },
    /// `defer` is the chain head at the break; `loop_defer` the head at
    /// loop entry. Unwinding runs the segment between them.
    Break {
        defer: Option<StmtId>,
        loop_defer: Option<StmtId>,
    },
    Continue {
        defer: Option<StmtId>,
        loop_defer: Option<StmtId>,
    },
    Dump { expr: ExprId },
    /// `defer` is the chain head at the return point.
    Return {
        expr: Option<ExprId>,
        defer: Option<StmtId>,
    },
    Assign { lhs: ExprId, rhs: ExprId },
    Expr(ExprId),
}

#[derive(Clone, Debug)]
pub struct Conditional {
    pub location: SourceLocation,
    /// `None` for a final `else` arm.
    pub condition: Option<ExprId>,
    pub body: BlockId,
}

#[derive(Clone, Debug)]
pub struct Block {
    pub location: SourceLocation,
    pub scope: ScopeId,
    pub stmts: Vec<StmtId>,
    /// Defer-chain head when control leaves the block normally.
    pub defer_begin: Option<StmtId>,
    /// Defer-chain head that was in effect when the block was entered.
    pub defer_end: Option<StmtId>,
}

#[derive(Clone, Debug)]
pub struct Function {
    /// Unqualified declared name.
    pub name: Atom,
    /// Always a function type.
    pub type_: TypeId,
    pub address: Address,
    /// Parameter symbols, left to right.
    pub parameters: Vec<SymbolId>,
    /// Synthetic symbol for the return slot above the parameters.
    pub return_symbol: Option<SymbolId>,
    /// Outermost symbol table of the body.
    pub scope: Option<ScopeId>,
    /// `None` only for extern functions and while completion is pending.
    pub body: Option<BlockId>,
    /// Lowest rbp-relative offset reserved by any local; the frame size the
    /// back-end must allocate.
    pub local_stack_offset: i64,
    pub is_extern: bool,
}
