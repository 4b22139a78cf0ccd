// Intermediate representations between the parser and the interpreter

use crate::backends::NodeInstance;
use crate::error::Span;
use crate::interfaces::Field;
use crate::parser::FunctionKind;
use crate::types::{DataType, Value};
use std::fmt;
use std::rc::Rc;

// =============================================================================
// Typed AST (type checker output)
// =============================================================================

/// Shape of an expression on the interpreter stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackType {
    /// One socket or constant
    Value,
    /// Several named outputs of one node
    Struct,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TyExpr {
    pub kind: TyExprKind,
    /// One entry per output (a single entry for values)
    pub dtype: Vec<DataType>,
    /// Output names, parallel to `dtype`
    pub names: Vec<String>,
    pub stype: StackType,
    pub span: Span,
}

impl TyExpr {
    pub fn constant(value: Value, span: Span) -> Self {
        TyExpr {
            dtype: vec![value.dtype()],
            kind: TyExprKind::Const(value),
            names: vec![String::new()],
            stype: StackType::Value,
            span,
        }
    }

    /// Type of the value the expression stands for when used as an argument
    pub fn first_type(&self) -> DataType {
        self.dtype[0]
    }

    pub fn as_const(&self) -> Option<&Value> {
        match &self.kind {
            TyExprKind::Const(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TyExprKind {
    Const(Value),
    Var {
        id: String,
        /// Free variable seen for the first time, becomes a reroute node
        needs_instantiation: bool,
    },
    NodeCall {
        node: NodeInstance,
        args: Vec<TyExpr>,
    },
    FunctionCall {
        function: Rc<TyFunction>,
        args: Vec<TyExpr>,
    },
    GetOutput {
        value: Box<TyExpr>,
        index: usize,
    },
    FieldAccess {
        object: Box<TyExpr>,
        field: Field,
    },
}

/// Function or node group parameter, defaults already folded
#[derive(Debug, Clone, PartialEq)]
pub struct TyParam {
    pub name: String,
    pub dtype: DataType,
    pub default: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TyFunction {
    pub name: String,
    pub kind: FunctionKind,
    pub inputs: Vec<TyParam>,
    pub outputs: Vec<TyParam>,
    pub body: Vec<TyStmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssignTarget {
    Var(String),
    /// Output of the function being defined
    Output(usize),
    Ignore,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TyStmt {
    Expr(TyExpr),
    Assign {
        targets: Vec<AssignTarget>,
        value: TyExpr,
    },
    /// `target.field = value`, `object` reads the current value of `target`
    FieldAssign {
        target: String,
        object: TyExpr,
        field: Field,
        value: TyExpr,
    },
    Repeat {
        iterations: TyExpr,
        body: Vec<TyStmt>,
    },
}

// =============================================================================
// Stack operations (compiler output)
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFunction {
    pub name: String,
    pub inputs: Vec<String>,
    pub body: Vec<Op>,
    pub num_outputs: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledNodeGroup {
    pub name: String,
    pub inputs: Vec<TyParam>,
    pub outputs: Vec<TyParam>,
    pub body: Vec<Op>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Push a constant, or nothing to keep a socket at its node default
    PushValue(Option<Value>),
    /// Create a reroute node for a free variable and bind the name to it
    CreateVar(String),
    GetVar(String),
    /// Pop and bind to a name
    BindVar(String),
    DestroyVar(String),
    /// Pop a struct and push one of its outputs
    GetOutput(usize),
    /// Set an output default of the most recently added node
    SetOutput(usize, Value),
    /// Pop into an output of the enclosing function
    SetFunctionOut(usize),
    /// Pop a struct and push all of its outputs in order
    SplitStruct,
    Pop,
    CallBuiltin {
        node: NodeInstance,
        outputs: Vec<DataType>,
    },
    CallFunction(CompiledFunction),
    CallNodeGroup(CompiledNodeGroup),
    /// Label the most recently added node
    RenameNode(String),
    /// Pop the iteration count and run the body inside a repeat zone
    Repeat(Vec<Op>),
    /// Clear the stack
    EndOfStatement,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::PushValue(Some(value)) => write!(f, "push_value {value}"),
            Op::PushValue(None) => write!(f, "push_value none"),
            Op::CreateVar(name) => write!(f, "create_var {name}"),
            Op::GetVar(name) => write!(f, "get_var {name}"),
            Op::BindVar(name) => write!(f, "bind_var {name}"),
            Op::DestroyVar(name) => write!(f, "destroy_var {name}"),
            Op::GetOutput(i) => write!(f, "get_output {i}"),
            Op::SetOutput(i, value) => write!(f, "set_output {i} {value}"),
            Op::SetFunctionOut(i) => write!(f, "set_function_out {i}"),
            Op::SplitStruct => write!(f, "split_struct"),
            Op::Pop => write!(f, "pop"),
            Op::CallBuiltin { node, .. } => {
                write!(f, "call_builtin {}", node.key)?;
                for (name, value) in &node.props {
                    write!(f, " {name}={value}")?;
                }
                Ok(())
            }
            Op::CallFunction(function) => write!(f, "call_function {}", function.name),
            Op::CallNodeGroup(group) => write!(f, "call_node_group {}", group.name),
            Op::RenameNode(name) => write!(f, "rename_node {name}"),
            Op::Repeat(_) => write!(f, "repeat"),
            Op::EndOfStatement => write!(f, "end_of_statement"),
        }
    }
}

impl Op {
    /// Nested op list carried by this op, if any
    pub fn body(&self) -> Option<&[Op]> {
        match self {
            Op::CallFunction(function) => Some(function.body.as_slice()),
            Op::CallNodeGroup(group) => Some(group.body.as_slice()),
            Op::Repeat(body) => Some(body.as_slice()),
            _ => None,
        }
    }
}
