//! Abstract syntax tree for Rerechan02
//!
//! Produced by the parser, annotated (via side tables) by the resolver,
//! consumed by the C code generator. Nodes are a closed set of variants;
//! every node owns its children and carries its source span.

use crate::error::Span;
use std::fmt;

/// Id for expression nodes, assigned by the parser in creation order.
///
/// Resolution results (binding, type) live in side tables keyed by this
/// id so the tree itself stays immutable between passes.
pub type NodeId = u32;

/// A complete source file: module header, imports, functions
#[derive(Debug, Clone)]
pub struct Program {
    pub module: ModuleDecl,
    pub imports: Vec<Import>,
    pub functions: Vec<Function>,
    pub span: Span,
}

/// `module name;`
#[derive(Debug, Clone)]
pub struct ModuleDecl {
    pub name: Ident,
    pub span: Span,
}

/// `import std.io;`
#[derive(Debug, Clone)]
pub struct Import {
    pub segments: Vec<Ident>,
    pub span: Span,
}

impl Import {
    /// Dotted path as written in source
    pub fn path(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// An identifier with its span
#[derive(Debug, Clone)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

/// `func name(params) -> type { body }`
#[derive(Debug, Clone)]
pub struct Function {
    pub name: Ident,
    pub params: Vec<Param>,
    /// Declared return type; `void` when no `->` clause was written
    pub ret_type: Type,
    pub ret_type_span: Option<Span>,
    pub body: Block,
    pub span: Span,
}

/// `name: type`
#[derive(Debug, Clone)]
pub struct Param {
    pub name: Ident,
    pub ty: Type,
    pub span: Span,
}

/// The Rerechan02 type system: monomorphic, no implicit conversions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Int,
    Float,
    Bool,
    Str,
    Void,
}

impl Type {
    pub fn from_name(name: &str) -> Option<Type> {
        match name {
            "int" => Some(Type::Int),
            "float" => Some(Type::Float),
            "bool" => Some(Type::Bool),
            "string" => Some(Type::Str),
            "void" => Some(Type::Void),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Type::Int => "int",
            Type::Float => "float",
            Type::Bool => "bool",
            Type::Str => "string",
            Type::Void => "void",
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{ stmts }`
#[derive(Debug, Clone)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    /// `let name: ty = init;` (annotation optional)
    Let {
        name: Ident,
        ty: Option<Type>,
        ty_span: Option<Span>,
        init: Expr,
    },
    /// `name = value;`
    Assign { name: Ident, value: Expr },
    /// `return;` or `return expr;`
    Return(Option<Expr>),
    /// `if cond { .. } else { .. }`; an `else if` is parsed as an else
    /// block containing a single nested if
    If {
        cond: Expr,
        then_block: Block,
        else_block: Option<Block>,
    },
    /// `while cond { .. }`
    While { cond: Expr, body: Block },
    /// Expression statement, e.g. a call: `println("hi");`
    Expr(Expr),
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    /// Variable or parameter reference
    Var(String),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Call {
        callee: Ident,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `-x`
    Neg,
    /// `!x`
    Not,
}

impl UnaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Program {
    /// Number of expression nodes, counted in pre-order.
    ///
    /// Used by tests to check the AST shape is independent of formatting.
    pub fn expr_count(&self) -> usize {
        fn count_expr(e: &Expr) -> usize {
            1 + match &e.kind {
                ExprKind::Binary { lhs, rhs, .. } => count_expr(lhs) + count_expr(rhs),
                ExprKind::Unary { operand, .. } => count_expr(operand),
                ExprKind::Call { args, .. } => args.iter().map(count_expr).sum(),
                _ => 0,
            }
        }
        fn count_block(b: &Block) -> usize {
            b.stmts.iter().map(count_stmt).sum()
        }
        fn count_stmt(s: &Stmt) -> usize {
            match &s.kind {
                StmtKind::Let { init, .. } => count_expr(init),
                StmtKind::Assign { value, .. } => count_expr(value),
                StmtKind::Return(e) => e.as_ref().map(count_expr).unwrap_or(0),
                StmtKind::If {
                    cond,
                    then_block,
                    else_block,
                } => {
                    count_expr(cond)
                        + count_block(then_block)
                        + else_block.as_ref().map(count_block).unwrap_or(0)
                }
                StmtKind::While { cond, body } => count_expr(cond) + count_block(body),
                StmtKind::Expr(e) => count_expr(e),
            }
        }
        self.functions.iter().map(|f| count_block(&f.body)).sum()
    }
}
