// Type checking, overload resolution and constant folding

use crate::backends::{BackEnd, Overload};
use crate::error::{Error, Span};
use crate::interfaces::Field;
use crate::ir::{AssignTarget, StackType, TyExpr, TyExprKind, TyFunction, TyParam, TyStmt};
use crate::parser::{BinOp, Expr, ExprKind, FunctionDef, Program, Stmt, StmtKind, Target, UnaryOp};
use crate::types::{DataType, Value};
use log::{debug, trace};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Upper bound on the number of iterations a `loop` may unroll to
pub const MAX_UNROLL: i128 = 1024;

#[derive(Debug, Clone)]
struct VarInfo {
    dtype: Vec<DataType>,
    names: Vec<String>,
    stype: StackType,
    /// Loop counters are known at compile time
    constant: Option<Value>,
}

impl VarInfo {
    fn of(expr: &TyExpr) -> Self {
        VarInfo {
            dtype: expr.dtype.clone(),
            names: expr.names.clone(),
            stype: expr.stype,
            constant: None,
        }
    }

    fn value(dtype: DataType) -> Self {
        VarInfo {
            dtype: vec![dtype],
            names: vec![String::new()],
            stype: StackType::Value,
            constant: None,
        }
    }
}

/// The function or node group whose body is being checked
struct Definition {
    name: String,
    outputs: Vec<TyParam>,
    assigned: Vec<bool>,
}

/// Variables that were visible when a repeat zone was entered
struct Zone {
    outer: HashMap<String, VarInfo>,
}

pub struct TypeChecker<'b> {
    backend: &'b dyn BackEnd,
    functions: HashMap<String, Rc<TyFunction>>,
    scope: HashMap<String, VarInfo>,
    definition: Option<Definition>,
    zones: Vec<Zone>,
    /// Names first bound inside a repeat zone, invisible after it
    zone_locals: HashSet<String>,
    /// Depth of loop and repeat bodies
    nested: usize,
    errors: Vec<Error>,
}

fn type_list(types: &[DataType]) -> String {
    types
        .iter()
        .map(|t| t.name())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Cheapest overload accepting `types`, the first declared one on ties
fn select<'o>(overloads: &'o [Overload], types: &[DataType]) -> Option<&'o Overload> {
    overloads
        .iter()
        .filter_map(|o| o.cost(types).map(|cost| (cost, o)))
        .min_by_key(|(cost, _)| *cost)
        .map(|(_, o)| o)
}

/// Replace constant arguments by their converted values
fn convert_args(args: Vec<TyExpr>, params: &[DataType]) -> Vec<TyExpr> {
    args.into_iter()
        .zip(params)
        .map(|(arg, param)| match arg.as_const().and_then(|v| v.convert(*param)) {
            Some(value) => TyExpr::constant(value, arg.span),
            None => arg,
        })
        .collect()
}

fn node_call(overload: &Overload, args: Vec<TyExpr>, span: Span) -> TyExpr {
    let args = convert_args(args, &overload.inputs);
    TyExpr {
        kind: TyExprKind::NodeCall {
            node: overload.node.clone(),
            args,
        },
        dtype: overload.output_types(),
        names: overload.output_names(),
        stype: if overload.outputs.len() > 1 {
            StackType::Struct
        } else {
            StackType::Value
        },
        span,
    }
}

fn finite(x: f64) -> Option<Value> {
    x.is_finite().then_some(Value::Float(x))
}

fn fold_int(op: BinOp, a: i64, b: i64) -> Option<Value> {
    match op {
        BinOp::Add => a.checked_add(b).map(Value::Int),
        BinOp::Sub => a.checked_sub(b).map(Value::Int),
        BinOp::Mul => a.checked_mul(b).map(Value::Int),
        BinOp::Div if b != 0 => finite(a as f64 / b as f64),
        BinOp::Mod if b != 0 => a.checked_rem(b).map(Value::Int),
        BinOp::Pow if b >= 0 => u32::try_from(b)
            .ok()
            .and_then(|e| a.checked_pow(e))
            .map(Value::Int),
        BinOp::Pow => finite((a as f64).powf(b as f64)),
        _ => fold_float(op, a as f64, b as f64),
    }
}

fn fold_float(op: BinOp, a: f64, b: f64) -> Option<Value> {
    match op {
        BinOp::Add => finite(a + b),
        BinOp::Sub => finite(a - b),
        BinOp::Mul => finite(a * b),
        BinOp::Div if b != 0.0 => finite(a / b),
        BinOp::Mod if b != 0.0 => finite(a % b),
        BinOp::Pow => finite(a.powf(b)),
        BinOp::Lt => Some(Value::Bool(a < b)),
        BinOp::Le => Some(Value::Bool(a <= b)),
        BinOp::Gt => Some(Value::Bool(a > b)),
        BinOp::Ge => Some(Value::Bool(a >= b)),
        BinOp::Eq => Some(Value::Bool(a == b)),
        BinOp::Ne => Some(Value::Bool(a != b)),
        _ => None,
    }
}

/// Evaluate an operator on two constants. `None` leaves it to a node.
pub fn fold_binary(op: BinOp, lhs: &Value, rhs: &Value) -> Option<Value> {
    match (op, lhs, rhs) {
        (BinOp::And, Value::Bool(a), Value::Bool(b)) => Some(Value::Bool(*a && *b)),
        (BinOp::Or, Value::Bool(a), Value::Bool(b)) => Some(Value::Bool(*a || *b)),
        (_, Value::Int(a), Value::Int(b)) => fold_int(op, *a, *b),
        (_, Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            fold_float(op, lhs.as_f64()?, rhs.as_f64()?)
        }
        _ => None,
    }
}

impl<'b> TypeChecker<'b> {
    pub fn new(backend: &'b dyn BackEnd) -> Self {
        TypeChecker {
            backend,
            functions: HashMap::new(),
            scope: HashMap::new(),
            definition: None,
            zones: Vec::new(),
            zone_locals: HashSet::new(),
            nested: 0,
            errors: Vec::new(),
        }
    }

    /// Register the definitions of a library source
    pub fn add_library(&mut self, program: &Program) -> Result<(), Vec<Error>> {
        for stmt in &program.items {
            match &stmt.kind {
                StmtKind::Function(def) => {
                    if let Err(e) = self.define(def) {
                        self.errors.push(e);
                    }
                }
                _ => self.errors.push(Error::new(
                    "libraries may only contain function and node group definitions",
                    stmt.span,
                )),
            }
        }
        self.finish(())
    }

    /// Check a formula. Every diagnostic is returned if any statement fails.
    pub fn check(&mut self, program: &Program) -> Result<Vec<TyStmt>, Vec<Error>> {
        debug!(
            "type checking {} statements for a {} tree",
            program.items.len(),
            self.backend.tree_type()
        );
        self.scope.clear();
        self.zone_locals.clear();
        let body = self.block(&program.items);
        self.finish(body)
    }

    fn finish<T>(&mut self, result: T) -> Result<T, Vec<Error>> {
        if self.errors.is_empty() {
            Ok(result)
        } else {
            debug!("type checking failed with {} errors", self.errors.len());
            Err(std::mem::take(&mut self.errors))
        }
    }

    /// Check statements, keeping going after a failing one
    fn block(&mut self, body: &[Stmt]) -> Vec<TyStmt> {
        let mut out = Vec::new();
        for stmt in body {
            match self.statement(stmt) {
                Ok(stmts) => out.extend(stmts),
                Err(e) => self.errors.push(e),
            }
        }
        out
    }

    fn statement(&mut self, stmt: &Stmt) -> Result<Vec<TyStmt>, Error> {
        match &stmt.kind {
            StmtKind::Expr(expr) => Ok(vec![TyStmt::Expr(self.expr(expr)?)]),
            StmtKind::Assign { targets, value } => self.assign(targets, value),
            StmtKind::FieldAssign {
                target,
                field,
                value,
            } => self.field_assign(target, field, value, stmt.span),
            StmtKind::Loop {
                var,
                start,
                end,
                body,
            } => self.unroll(var.as_deref(), *start, *end, body, stmt.span),
            StmtKind::Repeat { iterations, body } => self.repeat(iterations, body),
            StmtKind::Function(def) => {
                self.define(def)?;
                Ok(Vec::new())
            }
        }
    }

    // =========================================================================
    // Definitions
    // =========================================================================

    fn define(&mut self, def: &FunctionDef) -> Result<(), Error> {
        if self.definition.is_some() || self.nested > 0 {
            return Err(Error::new(
                "definitions are only allowed at the top level",
                def.span,
            ));
        }
        if self.functions.contains_key(&def.name) {
            return Err(Error::new(
                format!("`{}` is already defined", def.name),
                def.span,
            ));
        }

        let mut inputs = Vec::new();
        for param in &def.inputs {
            let default = match &param.default {
                Some(expr) => Some(self.default_value(&param.name, param.dtype, expr)?),
                None => None,
            };
            inputs.push(TyParam {
                name: param.name.clone(),
                dtype: param.dtype,
                default,
            });
        }
        let outputs: Vec<TyParam> = def
            .outputs
            .iter()
            .map(|param| TyParam {
                name: param.name.clone(),
                dtype: param.dtype,
                default: None,
            })
            .collect();

        let outer_scope = std::mem::replace(
            &mut self.scope,
            inputs
                .iter()
                .map(|p| (p.name.clone(), VarInfo::value(p.dtype)))
                .collect(),
        );
        self.definition = Some(Definition {
            name: def.name.clone(),
            assigned: vec![false; outputs.len()],
            outputs: outputs.clone(),
        });
        let body = self.block(&def.body);
        let definition = self.definition.take();
        self.scope = outer_scope;

        if let Some(definition) = definition {
            for (output, assigned) in definition.outputs.iter().zip(&definition.assigned) {
                if !assigned {
                    self.errors.push(Error::new(
                        format!("output `{}` of `{}` is never assigned", output.name, def.name),
                        def.span,
                    ));
                }
            }
        }

        debug!("defined `{}` ({} inputs, {} outputs)", def.name, inputs.len(), outputs.len());
        self.functions.insert(
            def.name.clone(),
            Rc::new(TyFunction {
                name: def.name.clone(),
                kind: def.kind,
                inputs,
                outputs,
                body,
            }),
        );
        Ok(())
    }

    fn default_value(&mut self, name: &str, dtype: DataType, expr: &Expr) -> Result<Value, Error> {
        let typed = self.expr(expr)?;
        let value = typed.as_const().ok_or_else(|| {
            Error::new(format!("default value of `{name}` must be a constant"), expr.span)
        })?;
        value.convert(dtype).ok_or_else(|| {
            Error::new(
                format!(
                    "default value of `{name}` has type {}, expected {dtype}",
                    value.dtype()
                ),
                expr.span,
            )
        })
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn assign(&mut self, targets: &[Target], value: &Expr) -> Result<Vec<TyStmt>, Error> {
        let mut value = self.expr(value)?;
        let dtype = self.value_type(&value)?;

        if let [target] = targets {
            let target = self.bind_target(target, VarInfo::of(&value))?;
            if let (AssignTarget::Output(i), Some(constant)) = (&target, value.as_const()) {
                if let Some(definition) = &self.definition {
                    if let Some(converted) = constant.convert(definition.outputs[*i].dtype) {
                        value = TyExpr::constant(converted, value.span);
                    }
                }
            }
            self.check_constant(&target, &value)?;
            return Ok(vec![TyStmt::Assign {
                targets: vec![target],
                value,
            }]);
        }

        let parts: Vec<DataType> = match value.stype {
            StackType::Struct => value.dtype.clone(),
            StackType::Value => self
                .backend
                .separate(dtype)
                .map(|separate| separate.output_types())
                .ok_or_else(|| {
                    Error::new(
                        format!(
                            "cannot unpack a value of type {dtype} into {} targets",
                            targets.len()
                        ),
                        value.span,
                    )
                })?,
        };
        if targets.len() > parts.len() {
            return Err(Error::new(
                format!(
                    "cannot unpack {} values into {} targets",
                    parts.len(),
                    targets.len()
                ),
                value.span,
            ));
        }

        // Constant vectors split into one constant assignment per component
        if let Some(constant) = value.as_const() {
            let mut stmts = Vec::new();
            for (index, target) in targets.iter().enumerate() {
                let field = Field {
                    object: dtype,
                    index,
                };
                let component = field.fold(constant).ok_or_else(|| {
                    Error::new(format!("cannot unpack constant `{constant}`"), value.span)
                })?;
                let part = TyExpr::constant(component, value.span);
                let target = self.bind_target(target, VarInfo::of(&part))?;
                self.check_constant(&target, &part)?;
                stmts.push(TyStmt::Assign {
                    targets: vec![target],
                    value: part,
                });
            }
            return Ok(stmts);
        }

        let mut bound = Vec::new();
        for (target, part) in targets.iter().zip(parts) {
            bound.push(self.bind_target(target, VarInfo::value(part))?);
        }
        Ok(vec![TyStmt::Assign {
            targets: bound,
            value,
        }])
    }

    /// Resolve an assignment target and record the new binding
    fn bind_target(&mut self, target: &Target, info: VarInfo) -> Result<AssignTarget, Error> {
        let (name, span) = match target {
            Target::Ignore(_) => return Ok(AssignTarget::Ignore),
            Target::Name(name, span) => (name, *span),
        };

        if let Some(definition) = &mut self.definition {
            if let Some(index) = definition.outputs.iter().position(|o| &o.name == name) {
                if !self.zones.is_empty() {
                    return Err(Error::new(
                        format!("output `{name}` cannot be assigned inside a repeat zone"),
                        span,
                    ));
                }
                let expected = definition.outputs[index].dtype;
                let dtype = info.dtype[0];
                if dtype.conversion_cost(expected).is_none() {
                    return Err(Error::new(
                        format!(
                            "output `{name}` of `{}` has type {expected}, found {dtype}",
                            definition.name
                        ),
                        span,
                    ));
                }
                definition.assigned[index] = true;
                return Ok(AssignTarget::Output(index));
            }
        }

        for zone in &self.zones {
            if let Some(outer) = zone.outer.get(name) {
                if outer.constant.is_some() {
                    return Err(Error::new(
                        format!("loop counter `{name}` cannot be reassigned inside a repeat zone"),
                        span,
                    ));
                }
                if outer.stype == StackType::Struct {
                    return Err(Error::new(
                        format!(
                            "`{name}` holds several outputs and cannot be carried through a repeat zone"
                        ),
                        span,
                    ));
                }
                if outer.dtype != info.dtype || outer.stype != info.stype {
                    return Err(Error::new(
                        format!(
                            "`{name}` changes type from {} to {} inside a repeat zone",
                            type_list(&outer.dtype),
                            type_list(&info.dtype)
                        ),
                        span,
                    ));
                }
            }
        }
        self.scope.insert(name.clone(), info);
        Ok(AssignTarget::Var(name.clone()))
    }

    /// Constants assigned to a name become input nodes
    fn check_constant(&self, target: &AssignTarget, value: &TyExpr) -> Result<(), Error> {
        if matches!(target, AssignTarget::Ignore) {
            return Ok(());
        }
        match value.as_const() {
            Some(constant) if !self.backend.supports_constant(constant.dtype()) => Err(Error::new(
                format!(
                    "constants of type {} are not supported in {} trees",
                    constant.dtype(),
                    self.backend.tree_type()
                ),
                value.span,
            )),
            _ => Ok(()),
        }
    }

    fn field_assign(
        &mut self,
        target: &str,
        field: &str,
        value: &Expr,
        span: Span,
    ) -> Result<Vec<TyStmt>, Error> {
        if !self.scope.contains_key(target) {
            // Reports outputs and zone locals, never creates a free variable
            return Err(self.unknown_name(target, span));
        }
        let object = self.name(target, span)?;
        let dtype = self.value_type(&object)?;
        let field = (object.stype == StackType::Value)
            .then(|| Field::lookup(self.backend, dtype, field))
            .flatten()
            .ok_or_else(|| Error::new(format!("type {dtype} has no field `{field}`"), span))?;

        let mut value = self.expr(value)?;
        let value_type = self.value_type(&value)?;
        if value_type.conversion_cost(field.dtype()).is_none() {
            return Err(Error::new(
                format!("cannot assign a value of type {value_type} to a {} field", field.dtype()),
                value.span,
            ));
        }
        if let Some(converted) = value.as_const().and_then(|v| v.convert(field.dtype())) {
            value = TyExpr::constant(converted, value.span);
        }

        Ok(vec![TyStmt::FieldAssign {
            target: target.to_string(),
            object,
            field,
            value,
        }])
    }

    fn unroll(
        &mut self,
        var: Option<&str>,
        start: i64,
        end: i64,
        body: &[Stmt],
        span: Span,
    ) -> Result<Vec<TyStmt>, Error> {
        let count = (end as i128 - start as i128 + 1).max(0);
        if count > MAX_UNROLL {
            return Err(Error::new(
                format!("loop would unroll to {count} iterations, the limit is {MAX_UNROLL}"),
                span,
            ));
        }
        trace!("unrolling loop over {start}..={end}");

        self.nested += 1;
        let mut out = Vec::new();
        for i in start..=end {
            if let Some(var) = var {
                self.scope.insert(
                    var.to_string(),
                    VarInfo {
                        constant: Some(Value::Int(i)),
                        ..VarInfo::value(DataType::Int)
                    },
                );
            }
            let before = self.errors.len();
            out.extend(self.block(body));
            // The same error would repeat in every iteration
            if self.errors.len() > before {
                break;
            }
        }
        self.nested -= 1;
        Ok(out)
    }

    fn repeat(&mut self, iterations: &Expr, body: &[Stmt]) -> Result<Vec<TyStmt>, Error> {
        if !self.backend.supports_repeat() {
            return Err(Error::new(
                format!(
                    "repeat zones are not available in {} trees",
                    self.backend.tree_type()
                ),
                iterations.span,
            ));
        }
        let mut iterations = self.expr(iterations)?;
        let count_type = self.value_type(&iterations)?;
        if count_type.conversion_cost(DataType::Int).is_none() {
            return Err(Error::new(
                format!("repeat count must be an int, found {count_type}"),
                iterations.span,
            ));
        }
        if let Some(converted) = iterations.as_const().and_then(|v| v.convert(DataType::Int)) {
            iterations = TyExpr::constant(converted, iterations.span);
        }

        self.zones.push(Zone {
            outer: self.scope.clone(),
        });
        self.nested += 1;
        let body = self.block(body);
        self.nested -= 1;
        // Carried variables keep their type, names first bound inside do not escape
        if let Some(zone) = self.zones.pop() {
            let inner = std::mem::replace(&mut self.scope, zone.outer);
            for name in inner.into_keys() {
                if !self.scope.contains_key(&name) {
                    self.zone_locals.insert(name);
                }
            }
        }

        Ok(vec![TyStmt::Repeat { iterations, body }])
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    /// Type of an expression used as a single value
    fn value_type(&self, expr: &TyExpr) -> Result<DataType, Error> {
        expr.dtype
            .first()
            .copied()
            .ok_or_else(|| Error::new("this call has no outputs", expr.span))
    }

    fn expr(&mut self, expr: &Expr) -> Result<TyExpr, Error> {
        let span = expr.span;
        match &expr.kind {
            ExprKind::Int(i) => Ok(TyExpr::constant(Value::Int(*i), span)),
            ExprKind::Float(f) => Ok(TyExpr::constant(Value::Float(*f), span)),
            ExprKind::Bool(b) => Ok(TyExpr::constant(Value::Bool(*b), span)),
            ExprKind::Str(s) => Ok(TyExpr::constant(Value::Str(s.clone()), span)),
            ExprKind::Vector(items) => self.vector(items, span),
            ExprKind::Name(name) => self.name(name, span),
            ExprKind::Unary(op, operand) => {
                let operand = self.expr(operand)?;
                self.unary(*op, operand, span)
            }
            ExprKind::Binary(op, lhs, rhs) => {
                let lhs = self.expr(lhs)?;
                let rhs = self.expr(rhs)?;
                if let (Some(a), Some(b)) = (lhs.as_const(), rhs.as_const()) {
                    if let Some(folded) = fold_binary(*op, a, b) {
                        return Ok(TyExpr::constant(folded, span));
                    }
                }
                self.operator(op.builtin_name(), op.symbol(), vec![lhs, rhs], span)
            }
            ExprKind::Call { name, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.expr(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                self.call(name, args, span)
            }
            ExprKind::Attribute { value, name } => {
                let value = self.expr(value)?;
                self.attribute(value, name, span)
            }
        }
    }

    fn unary(&mut self, op: UnaryOp, operand: TyExpr, span: Span) -> Result<TyExpr, Error> {
        match (op, operand.as_const()) {
            (UnaryOp::Neg, Some(Value::Int(i))) if *i != i64::MIN => {
                Ok(TyExpr::constant(Value::Int(-i), span))
            }
            (UnaryOp::Neg, Some(Value::Float(f))) => Ok(TyExpr::constant(Value::Float(-f), span)),
            (UnaryOp::Neg, Some(Value::Vec3(v))) => Ok(TyExpr::constant(
                Value::Vec3(v.map(|c| -c)),
                span,
            )),
            (UnaryOp::Not, Some(Value::Bool(b))) => Ok(TyExpr::constant(Value::Bool(!b), span)),
            (UnaryOp::Neg, _) => {
                let minus_one = TyExpr::constant(Value::Int(-1), span);
                self.operator("mul", "-", vec![operand, minus_one], span)
            }
            (UnaryOp::Not, _) => self.operator("not", "not", vec![operand], span),
        }
    }

    /// Operators only resolve against built-in nodes
    fn operator(
        &mut self,
        name: &str,
        symbol: &str,
        args: Vec<TyExpr>,
        span: Span,
    ) -> Result<TyExpr, Error> {
        let types = args
            .iter()
            .map(|arg| self.value_type(arg))
            .collect::<Result<Vec<_>, _>>()?;
        let overload = select(self.backend.overloads(name), &types).ok_or_else(|| {
            Error::new(
                format!("operator `{symbol}` is not defined for ({})", type_list(&types)),
                span,
            )
        })?;
        trace!("`{symbol}` on ({}) resolved to {}", type_list(&types), overload.node.key);
        Ok(node_call(overload, args, span))
    }

    fn call(&mut self, name: &str, args: Vec<TyExpr>, span: Span) -> Result<TyExpr, Error> {
        if let Some(function) = self.functions.get(name).cloned() {
            return self.call_function(function, args, span);
        }
        let overloads = self.backend.overloads(name);
        if overloads.is_empty() {
            return Err(Error::new(format!("unknown function `{name}`"), span));
        }
        let types = args
            .iter()
            .map(|arg| self.value_type(arg))
            .collect::<Result<Vec<_>, _>>()?;
        let overload = select(overloads, &types).ok_or_else(|| {
            Error::new(
                format!("no overload of `{name}` accepts ({})", type_list(&types)),
                span,
            )
        })?;
        trace!("`{name}` on ({}) resolved to {}", type_list(&types), overload.node.key);
        Ok(node_call(overload, args, span))
    }

    fn call_function(
        &mut self,
        function: Rc<TyFunction>,
        args: Vec<TyExpr>,
        span: Span,
    ) -> Result<TyExpr, Error> {
        if args.len() > function.inputs.len() {
            return Err(Error::new(
                format!(
                    "`{}` takes {} arguments but {} were given",
                    function.name,
                    function.inputs.len(),
                    args.len()
                ),
                span,
            ));
        }
        if let Some(missing) = function.inputs[args.len()..]
            .iter()
            .find(|p| p.default.is_none())
        {
            return Err(Error::new(
                format!("missing argument `{}` of `{}`", missing.name, function.name),
                span,
            ));
        }
        for (arg, param) in args.iter().zip(&function.inputs) {
            let dtype = self.value_type(arg)?;
            if dtype.conversion_cost(param.dtype).is_none() {
                return Err(Error::new(
                    format!(
                        "argument `{}` of `{}` expects {}, found {dtype}",
                        param.name, function.name, param.dtype
                    ),
                    arg.span,
                ));
            }
        }

        let params: Vec<DataType> = function.inputs.iter().map(|p| p.dtype).collect();
        let args = convert_args(args, &params);
        Ok(TyExpr {
            dtype: function.outputs.iter().map(|o| o.dtype).collect(),
            names: function.outputs.iter().map(|o| o.name.clone()).collect(),
            stype: if function.outputs.len() > 1 {
                StackType::Struct
            } else {
                StackType::Value
            },
            kind: TyExprKind::FunctionCall { function, args },
            span,
        })
    }

    fn name(&mut self, name: &str, span: Span) -> Result<TyExpr, Error> {
        if let Some(info) = self.scope.get(name) {
            if let Some(constant) = &info.constant {
                return Ok(TyExpr::constant(constant.clone(), span));
            }
            return Ok(TyExpr {
                kind: TyExprKind::Var {
                    id: name.to_string(),
                    needs_instantiation: false,
                },
                dtype: info.dtype.clone(),
                names: info.names.clone(),
                stype: info.stype,
                span,
            });
        }

        if self.definition.is_some() || !self.zones.is_empty() || self.zone_locals.contains(name) {
            return Err(self.unknown_name(name, span));
        }

        debug!("free variable `{name}`");
        self.scope.insert(name.to_string(), VarInfo::value(DataType::Float));
        Ok(TyExpr {
            kind: TyExprKind::Var {
                id: name.to_string(),
                needs_instantiation: true,
            },
            dtype: vec![DataType::Float],
            names: vec![String::new()],
            stype: StackType::Value,
            span,
        })
    }

    fn unknown_name(&self, name: &str, span: Span) -> Error {
        if let Some(definition) = &self.definition {
            if definition.outputs.iter().any(|o| o.name == name) {
                return Error::new(
                    format!("output `{name}` of `{}` can only be assigned", definition.name),
                    span,
                );
            }
        }
        if self.zone_locals.contains(name) {
            return Error::new(format!("`{name}` is only defined inside a repeat zone"), span);
        }
        if !self.zones.is_empty() && self.definition.is_none() {
            return Error::new(
                format!("unknown variable `{name}`, inputs must be introduced outside repeat zones"),
                span,
            );
        }
        Error::new(format!("unknown variable `{name}`"), span)
    }

    fn vector(&mut self, items: &[Expr], span: Span) -> Result<TyExpr, Error> {
        let dtype = match items.len() {
            3 => DataType::Vec3,
            4 => DataType::Rgba,
            n => {
                return Err(Error::new(
                    format!("vector literals need 3 or 4 components, found {n}"),
                    span,
                ))
            }
        };
        let items = items
            .iter()
            .map(|item| self.expr(item))
            .collect::<Result<Vec<_>, _>>()?;

        let constants: Option<Vec<f64>> = items
            .iter()
            .map(|item| item.as_const().and_then(Value::as_f64))
            .collect();
        let constant = constants.and_then(|c| match c.as_slice() {
            &[x, y, z] => Some(Value::Vec3([x, y, z])),
            &[r, g, b, a] => Some(Value::Rgba([r, g, b, a])),
            _ => None,
        });
        if let Some(value) = constant {
            return Ok(TyExpr::constant(value, span));
        }

        for item in &items {
            let item_type = self.value_type(item)?;
            if item_type.conversion_cost(DataType::Float).is_none() {
                return Err(Error::new(
                    format!("vector components must be numbers, found {item_type}"),
                    item.span,
                ));
            }
        }
        let combine = self.backend.combine(dtype).ok_or_else(|| {
            Error::new(format!("cannot build {dtype} values in this tree"), span)
        })?;
        if combine.inputs.len() != items.len() {
            return Err(Error::new(
                format!(
                    "non-constant {dtype} literals need {} components in {} trees",
                    combine.inputs.len(),
                    self.backend.tree_type()
                ),
                span,
            ));
        }
        Ok(node_call(combine, items, span))
    }

    fn attribute(&mut self, value: TyExpr, name: &str, span: Span) -> Result<TyExpr, Error> {
        if value.stype == StackType::Struct {
            let index = value.names.iter().position(|n| n == name).ok_or_else(|| {
                Error::new(
                    format!(
                        "no output named `{name}`, available outputs are {}",
                        value.names.join(", ")
                    ),
                    span,
                )
            })?;
            return Ok(TyExpr {
                dtype: vec![value.dtype[index]],
                names: vec![name.to_string()],
                stype: StackType::Value,
                kind: TyExprKind::GetOutput {
                    value: Box::new(value),
                    index,
                },
                span,
            });
        }

        let dtype = self.value_type(&value)?;
        let field = Field::lookup(self.backend, dtype, name)
            .ok_or_else(|| Error::new(format!("type {dtype} has no field `{name}`"), span))?;
        if let Some(component) = value.as_const().and_then(|v| field.fold(v)) {
            return Ok(TyExpr::constant(component, span));
        }
        Ok(TyExpr {
            dtype: vec![field.dtype()],
            names: vec![name.to_string()],
            stype: StackType::Value,
            kind: TyExprKind::FieldAccess {
                object: Box::new(value),
                field,
            },
            span,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{GeometryBackEnd, ShaderBackEnd};
    use crate::parser::parse_program;

    fn check_with(backend: &dyn BackEnd, src: &str) -> Result<Vec<TyStmt>, Vec<Error>> {
        let program = parse_program(src).expect("source should parse");
        TypeChecker::new(backend).check(&program)
    }

    fn check_shader(src: &str) -> Result<Vec<TyStmt>, Vec<Error>> {
        check_with(&ShaderBackEnd::new(), src)
    }

    fn check_geometry(src: &str) -> Result<Vec<TyStmt>, Vec<Error>> {
        check_with(&GeometryBackEnd::new(), src)
    }

    fn messages(result: Result<Vec<TyStmt>, Vec<Error>>) -> Vec<String> {
        result
            .expect_err("expected type errors")
            .into_iter()
            .map(|e| e.message)
            .collect()
    }

    fn assigned_value(stmt: &TyStmt) -> &TyExpr {
        match stmt {
            TyStmt::Assign { value, .. } => value,
            other => panic!("expected an assignment, got {other:?}"),
        }
    }

    #[test]
    fn test_constant_folding() {
        let stmts = check_shader("a = 1 + 2 * 3; b = 7 / 2; c = 2 ** -1; d = 5 % 3; e = -(2.5);").unwrap();
        assert_eq!(assigned_value(&stmts[0]).as_const(), Some(&Value::Int(7)));
        assert_eq!(assigned_value(&stmts[1]).as_const(), Some(&Value::Float(3.5)));
        assert_eq!(assigned_value(&stmts[2]).as_const(), Some(&Value::Float(0.5)));
        assert_eq!(assigned_value(&stmts[3]).as_const(), Some(&Value::Int(2)));
        assert_eq!(assigned_value(&stmts[4]).as_const(), Some(&Value::Float(-2.5)));
    }

    #[test]
    fn test_division_by_zero_is_not_folded() {
        let stmts = check_shader("a = 1 / 0;").unwrap();
        assert!(matches!(
            assigned_value(&stmts[0]).kind,
            TyExprKind::NodeCall { .. }
        ));
    }

    #[test]
    fn test_fold_binary() {
        assert_eq!(fold_binary(BinOp::Lt, &Value::Int(1), &Value::Float(2.0)), Some(Value::Bool(true)));
        assert_eq!(fold_binary(BinOp::And, &Value::Bool(true), &Value::Bool(false)), Some(Value::Bool(false)));
        assert_eq!(fold_binary(BinOp::Add, &Value::Int(i64::MAX), &Value::Int(1)), None);
        assert_eq!(fold_binary(BinOp::Mod, &Value::Float(1.0), &Value::Float(0.0)), None);
        assert_eq!(fold_binary(BinOp::Add, &Value::Str("a".into()), &Value::Int(1)), None);
    }

    #[test]
    fn test_free_variable() {
        let stmts = check_shader("x = sin(t) * 2; y = t;").unwrap();
        let x = assigned_value(&stmts[0]);
        match &x.kind {
            TyExprKind::NodeCall { node, args } => {
                assert_eq!(node.props[0].1, Value::Str("MULTIPLY".into()));
                // The constant was converted to the float input
                assert_eq!(args[1].as_const(), Some(&Value::Float(2.0)));
                match &args[0].kind {
                    TyExprKind::NodeCall { args, .. } => assert!(matches!(
                        &args[0].kind,
                        TyExprKind::Var { id, needs_instantiation: true } if id == "t"
                    )),
                    other => panic!("unexpected {other:?}"),
                }
            }
            other => panic!("unexpected {other:?}"),
        }
        // Second use refers to the same reroute
        assert!(matches!(
            &assigned_value(&stmts[1]).kind,
            TyExprKind::Var { needs_instantiation: false, .. }
        ));
    }

    #[test]
    fn test_overload_resolution_prefers_float() {
        let stmts = check_shader("a = x + 1;").unwrap();
        match &assigned_value(&stmts[0]).kind {
            TyExprKind::NodeCall { node, .. } => assert_eq!(node.key, "ShaderNodeMath"),
            other => panic!("unexpected {other:?}"),
        }
        let stmts = check_shader("a = {x, 0, 0} + 1;").unwrap();
        let value = assigned_value(&stmts[0]);
        assert_eq!(value.dtype, vec![DataType::Vec3]);
        match &value.kind {
            TyExprKind::NodeCall { node, args } => {
                assert_eq!(node.key, "ShaderNodeVectorMath");
                assert_eq!(args[1].as_const(), Some(&Value::Vec3([1.0, 1.0, 1.0])));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_operator_error() {
        let msgs = messages(check_geometry("g = grid(); a = g.mesh + 1;"));
        assert_eq!(msgs, vec!["operator `+` is not defined for (geometry, int)"]);
    }

    #[test]
    fn test_unknown_function() {
        let msgs = messages(check_shader("a = frobnicate(1);"));
        assert_eq!(msgs, vec!["unknown function `frobnicate`"]);
    }

    #[test]
    fn test_errors_are_collected() {
        let msgs = messages(check_shader("a = nope(1);\nb = 1;\nc = also_nope();"));
        assert_eq!(msgs.len(), 2);
    }

    #[test]
    fn test_struct_output_access() {
        let stmts = check_shader("f = noise(p).fac;").unwrap();
        let value = assigned_value(&stmts[0]);
        assert_eq!(value.dtype, vec![DataType::Float]);
        assert!(matches!(value.kind, TyExprKind::GetOutput { index: 0, .. }));

        let msgs = messages(check_shader("f = noise(p).nope;"));
        assert_eq!(msgs, vec!["no output named `nope`, available outputs are fac, color"]);
    }

    #[test]
    fn test_vector_fields() {
        let stmts = check_shader("v = {1, 2, 3}; a = v.y; b = {4, 5, 6}.z;").unwrap();
        assert!(matches!(
            assigned_value(&stmts[1]).kind,
            TyExprKind::FieldAccess { .. }
        ));
        assert_eq!(assigned_value(&stmts[2]).as_const(), Some(&Value::Float(6.0)));
        let msgs = messages(check_shader("v = {1, 2, 3}; a = v.w;"));
        assert_eq!(msgs, vec!["type vec3 has no field `w`"]);
    }

    #[test]
    fn test_field_assignment() {
        let stmts = check_shader("v = {x, 0, 0}; v.z = 2;").unwrap();
        match &stmts[1] {
            TyStmt::FieldAssign { target, field, value, .. } => {
                assert_eq!(target, "v");
                assert_eq!(field.index, 2);
                assert_eq!(value.as_const(), Some(&Value::Float(2.0)));
            }
            other => panic!("unexpected {other:?}"),
        }
        let msgs = messages(check_shader("a = 1; a.x = 2;"));
        assert_eq!(msgs, vec!["type int has no field `x`"]);
    }

    #[test]
    fn test_destructuring() {
        let stmts = check_shader("a, b, c = {1, 2, 3};").unwrap();
        assert_eq!(stmts.len(), 3);
        assert_eq!(assigned_value(&stmts[2]).as_const(), Some(&Value::Float(3.0)));

        let stmts = check_shader("x, _, z = tex_coord().generated;").unwrap();
        assert_eq!(stmts.len(), 1);
        match &stmts[0] {
            TyStmt::Assign { targets, .. } => {
                assert_eq!(targets[1], AssignTarget::Ignore);
                assert_eq!(targets[2], AssignTarget::Var("z".into()));
            }
            other => panic!("unexpected {other:?}"),
        }

        let msgs = messages(check_shader("a, b = 3;"));
        assert_eq!(msgs, vec!["cannot unpack a value of type int into 2 targets"]);
        let msgs = messages(check_shader("a, b, c, d = {x, 0, 0};"));
        assert_eq!(msgs, vec!["cannot unpack 3 values into 4 targets"]);
    }

    #[test]
    fn test_function_definition_and_call() {
        let src = "fn scaled(v: float, k: float = 2) -> r: float { r = v * k; }\nout = scaled(1);";
        let stmts = check_shader(src).unwrap();
        match &assigned_value(&stmts[0]).kind {
            TyExprKind::FunctionCall { function, args } => {
                assert_eq!(function.name, "scaled");
                assert_eq!(function.inputs[1].default, Some(Value::Float(2.0)));
                assert_eq!(args[0].as_const(), Some(&Value::Float(1.0)));
                assert_eq!(function.body.len(), 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_function_errors() {
        let msgs = messages(check_shader("fn f(a: float) -> r: float, s: float { r = a; }"));
        assert_eq!(msgs, vec!["output `s` of `f` is never assigned"]);

        let msgs = messages(check_shader("fn f(a: float) -> r: float { r = b; }"));
        assert_eq!(msgs[0], "unknown variable `b`");

        let msgs = messages(check_shader("fn f(a: float) { }\nfn f(b: float) { }"));
        assert_eq!(msgs, vec!["`f` is already defined"]);

        let msgs = messages(check_shader("fn f(a: float) -> r: float { r = a; }\nx = f();"));
        assert_eq!(msgs, vec!["missing argument `a` of `f`"]);

        let msgs = messages(check_shader("fn f(a: float = x) { }"));
        assert_eq!(msgs, vec!["default value of `a` must be a constant"]);

        let msgs = messages(check_shader("loop 0 -> 1 { fn f() { } }"));
        assert_eq!(msgs, vec!["definitions are only allowed at the top level"]);

        let msgs = messages(check_shader("fn f(a: float) -> r: float { s = r; r = a; }"));
        assert_eq!(msgs, vec!["output `r` of `f` can only be assigned"]);
    }

    #[test]
    fn test_use_before_definition() {
        let msgs = messages(check_shader("x = g(1);\nfn g(a: float) -> r: float { r = a; }"));
        assert_eq!(msgs, vec!["unknown function `g`"]);
    }

    #[test]
    fn test_loop_unrolling() {
        let stmts = check_shader("s = 0; loop i = 1 -> 3 { s = s + i; }").unwrap();
        assert_eq!(stmts.len(), 4);
        match &assigned_value(&stmts[3]).kind {
            TyExprKind::NodeCall { args, .. } => {
                assert_eq!(args[1].as_const(), Some(&Value::Float(3.0)));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(check_shader("loop 3 -> 1 { a = 1; }").unwrap().is_empty());
        let msgs = messages(check_shader("loop 0 -> 5000 { a = 1; }"));
        assert_eq!(msgs, vec!["loop would unroll to 5001 iterations, the limit is 1024"]);
    }

    #[test]
    fn test_loop_error_reported_once() {
        let msgs = messages(check_shader("loop i = 0 -> 9 { a = nope(i); }"));
        assert_eq!(msgs.len(), 1);
    }

    #[test]
    fn test_repeat_zone() {
        let src = "g = grid().mesh; repeat 3 { g = set_position(g, true, position() * 2); }";
        let stmts = check_geometry(src).unwrap();
        match &stmts[1] {
            TyStmt::Repeat { iterations, body } => {
                assert_eq!(iterations.as_const(), Some(&Value::Int(3)));
                assert_eq!(body.len(), 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_repeat_errors() {
        let msgs = messages(check_shader("repeat 3 { a = 1; }"));
        assert_eq!(msgs, vec!["repeat zones are not available in shader trees"]);

        let msgs = messages(check_geometry("repeat 1.5 { a = 1; }"));
        assert_eq!(msgs, vec!["repeat count must be an int, found float"]);

        let msgs = messages(check_geometry("a = 1.0; repeat 2 { a = {1, 2, 3}; }"));
        assert_eq!(msgs, vec!["`a` changes type from float to vec3 inside a repeat zone"]);

        let msgs = messages(check_geometry("repeat 2 { b = 1; } c = b;"));
        assert_eq!(msgs, vec!["`b` is only defined inside a repeat zone"]);

        let msgs = messages(check_geometry("repeat 2 { b = t; }"));
        assert_eq!(
            msgs,
            vec!["unknown variable `t`, inputs must be introduced outside repeat zones"]
        );
    }

    #[test]
    fn test_color_destructuring_per_tree() {
        let src = "c = noise({t, 0, 0}).color; r, g, b, a = c;";
        assert!(check_geometry(src).is_ok());
        let msgs = messages(check_shader(src));
        assert_eq!(msgs, vec!["cannot unpack 3 values into 4 targets"]);
    }

    #[test]
    fn test_repeat_rejects_struct_variables() {
        let src = "n = voronoi(position()); repeat 2 { n = voronoi(n.position); } p = n.position;";
        let msgs = messages(check_geometry(src));
        assert_eq!(
            msgs,
            vec!["`n` holds several outputs and cannot be carried through a repeat zone"]
        );

        // Reading a struct inside the zone stays allowed
        let src = "n = voronoi(position()); g = grid().mesh; repeat 2 { g = set_position(g, true, n.position); }";
        assert!(check_geometry(src).is_ok());
    }

    #[test]
    fn test_string_constants() {
        let msgs = messages(check_shader("s = \"uv\";"));
        assert_eq!(msgs, vec!["constants of type string are not supported in shader trees"]);
        assert!(check_geometry("s = \"uv\";").is_ok());
    }

    #[test]
    fn test_library_only_definitions() {
        let backend = ShaderBackEnd::new();
        let mut checker = TypeChecker::new(&backend);
        let lib = parse_program("fn double(a: float) -> r: float { r = a * 2; }\nx = 1;").unwrap();
        let errors = checker.add_library(&lib).unwrap_err();
        assert_eq!(errors.len(), 1);

        let lib = parse_program("fn triple(a: float) -> r: float { r = a * 3; }").unwrap();
        checker.add_library(&lib).unwrap();
        let program = parse_program("y = triple(t);").unwrap();
        assert!(checker.check(&program).is_ok());
    }
}
