// Abstract Syntax Tree for the Math Formula language

use crate::error::Span;
use crate::types::DataType;

/// A parsed source file
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub items: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// `sin(x);`
    Expr(Expr),
    /// `a = e;` or `a, _, c = e;`
    Assign { targets: Vec<Target>, value: Expr },
    /// `v.x = e;`
    FieldAssign {
        target: String,
        field: String,
        value: Expr,
    },
    /// `loop i = 0 -> 3 { ... }` (inclusive bounds)
    Loop {
        var: Option<String>,
        start: i64,
        end: i64,
        body: Vec<Stmt>,
    },
    /// `repeat n { ... }`
    Repeat { iterations: Expr, body: Vec<Stmt> },
    Function(FunctionDef),
}

/// Left-hand side of an assignment
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Name(String, Span),
    /// `_`
    Ignore(Span),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    /// `fn`: inlined at every call site
    Function,
    /// `ng`: becomes a node group
    NodeGroup,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub kind: FunctionKind,
    pub name: String,
    pub inputs: Vec<Param>,
    pub outputs: Vec<Param>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// `name: type [= default]`
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub dtype: DataType,
    pub default: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Expr { kind, span }
    }

    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        let span = lhs.span.to(rhs.span);
        Expr::new(ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)), span)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    /// `{x, y, z}` or `{r, g, b, a}`
    Vector(Vec<Expr>),
    Name(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Call { name: String, args: Vec<Expr> },
    /// `value.name`: struct output or vector component
    Attribute { value: Box<Expr>, name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

impl BinOp {
    /// Built-in function an operator lowers to
    pub fn builtin_name(self) -> &'static str {
        match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::Div => "div",
            BinOp::Mod => "mod",
            BinOp::Pow => "pow",
            BinOp::Lt => "less_than",
            BinOp::Le => "less_equal",
            BinOp::Gt => "greater_than",
            BinOp::Ge => "greater_equal",
            BinOp::Eq => "equal",
            BinOp::Ne => "not_equal",
            BinOp::And => "and",
            BinOp::Or => "or",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Pow => "**",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::And => "and",
            BinOp::Or => "or",
        }
    }
}
