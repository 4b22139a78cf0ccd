use crate::backends::BackEnd;
use crate::ir::{
    AssignTarget, CompiledFunction, CompiledNodeGroup, Op, StackType, TyExpr, TyExprKind, TyFunction, TyStmt,
};
use crate::parser::FunctionKind;
use anyhow::{anyhow, Result};
use log::debug;

/// Compile type-checked statements into stack operations
pub fn compile(backend: &dyn BackEnd, stmts: &[TyStmt]) -> Result<Vec<Op>> {
    let mut compiler = Compiler::new(backend);
    for stmt in stmts {
        compiler.statement(stmt)?;
    }
    debug!("compiled {} statements into {} ops", stmts.len(), compiler.ops.len());
    Ok(compiler.ops)
}

struct Compiler<'b> {
    backend: &'b dyn BackEnd,
    ops: Vec<Op>,
    temp_counter: usize,
    /// Output names of the function being compiled
    output_names: Vec<String>,
}

impl<'b> Compiler<'b> {
    fn new(backend: &'b dyn BackEnd) -> Self {
        Compiler {
            backend,
            ops: Vec::new(),
            temp_counter: 0,
            output_names: Vec::new(),
        }
    }

    /// A variable name no formula can spell
    fn temp_name(&mut self, prefix: &str) -> String {
        let name = format!("{prefix}#{}", self.temp_counter);
        self.temp_counter += 1;
        name
    }

    /// Compile into a fresh op list and return it
    fn nested(&mut self, f: impl FnOnce(&mut Self) -> Result<()>) -> Result<Vec<Op>> {
        let outer = std::mem::take(&mut self.ops);
        let result = f(self);
        let body = std::mem::replace(&mut self.ops, outer);
        result.map(|()| body)
    }

    fn statement(&mut self, stmt: &TyStmt) -> Result<()> {
        match stmt {
            TyStmt::Expr(expr) => self.expr(expr)?,
            TyStmt::Assign { targets, value } => self.assign(targets, value)?,
            TyStmt::FieldAssign {
                target,
                object,
                field,
                value,
            } => {
                self.arg(value)?;
                let value_name = self.temp_name("value");
                self.ops.push(Op::BindVar(value_name.clone()));
                self.expr(object)?;
                let object_name = self.temp_name(target);
                self.ops.push(Op::BindVar(object_name.clone()));
                field.write(self.backend, &mut self.ops, target, &object_name, &value_name)?;
                self.ops.push(Op::DestroyVar(value_name));
                self.ops.push(Op::DestroyVar(object_name));
            }
            TyStmt::Repeat { iterations, body } => {
                let body = self.nested(|c| {
                    for stmt in body {
                        c.statement(stmt)?;
                    }
                    Ok(())
                })?;
                self.arg(iterations)?;
                self.ops.push(Op::Repeat(body));
            }
        }
        self.ops.push(Op::EndOfStatement);
        Ok(())
    }

    fn output_name(&self, index: usize) -> Result<String> {
        self.output_names
            .get(index)
            .cloned()
            .ok_or_else(|| anyhow!("function output {index} is out of range"))
    }

    fn assign(&mut self, targets: &[AssignTarget], value: &TyExpr) -> Result<()> {
        // A constant becomes an input node named after its target
        if let Some(constant) = value.as_const() {
            match targets {
                [AssignTarget::Var(name)] => {
                    self.backend.create_input(&mut self.ops, name, constant)?;
                    self.ops.push(Op::BindVar(name.clone()));
                }
                [AssignTarget::Output(index)] => {
                    let name = self.output_name(*index)?;
                    self.backend.create_input(&mut self.ops, &name, constant)?;
                    self.ops.push(Op::SetFunctionOut(*index));
                }
                [AssignTarget::Ignore] => {}
                _ => return Err(anyhow!("a constant cannot be split into {} targets", targets.len())),
            }
            return Ok(());
        }

        self.expr(value)?;
        if targets.len() > 1 {
            if value.stype == StackType::Value {
                let separate = self
                    .backend
                    .separate(value.first_type())
                    .ok_or_else(|| anyhow!("cannot split a {} value", value.first_type()))?;
                self.ops.push(Op::CallBuiltin {
                    node: separate.node.clone(),
                    outputs: separate.output_types(),
                });
            }
            let parts = match value.stype {
                StackType::Struct => value.dtype.len(),
                StackType::Value => self
                    .backend
                    .separate(value.first_type())
                    .map_or(0, |s| s.outputs.len()),
            };
            self.ops.push(Op::SplitStruct);
            // Parts are popped last to first
            for _ in targets.len()..parts {
                self.ops.push(Op::Pop);
            }
            for target in targets.iter().rev() {
                self.bind(target);
            }
            return Ok(());
        }

        if let [target @ AssignTarget::Output(_)] = targets {
            if value.stype == StackType::Struct {
                self.ops.push(Op::GetOutput(0));
            }
            self.bind(target);
        } else if let [target] = targets {
            self.bind(target);
        }
        Ok(())
    }

    fn bind(&mut self, target: &AssignTarget) {
        let op = match target {
            AssignTarget::Var(name) => Op::BindVar(name.clone()),
            AssignTarget::Output(index) => Op::SetFunctionOut(*index),
            AssignTarget::Ignore => Op::Pop,
        };
        self.ops.push(op);
    }

    /// Push an argument, reducing structs to their first output
    fn arg(&mut self, arg: &TyExpr) -> Result<()> {
        self.expr(arg)?;
        if arg.stype == StackType::Struct {
            self.ops.push(Op::GetOutput(0));
        }
        Ok(())
    }

    fn expr(&mut self, expr: &TyExpr) -> Result<()> {
        match &expr.kind {
            TyExprKind::Const(value) => self.ops.push(Op::PushValue(Some(value.clone()))),
            TyExprKind::Var {
                id,
                needs_instantiation,
            } => {
                if *needs_instantiation {
                    self.ops.push(Op::CreateVar(id.clone()));
                }
                self.ops.push(Op::GetVar(id.clone()));
            }
            TyExprKind::NodeCall { node, args } => {
                for arg in args {
                    self.arg(arg)?;
                }
                // Missing arguments keep the node defaults
                for _ in args.len()..node.inputs.len() {
                    self.ops.push(Op::PushValue(None));
                }
                self.ops.push(Op::CallBuiltin {
                    node: node.clone(),
                    outputs: expr.dtype.clone(),
                });
            }
            TyExprKind::FunctionCall { function, args } => {
                for arg in args {
                    self.arg(arg)?;
                }
                for param in &function.inputs[args.len()..] {
                    self.ops.push(Op::PushValue(param.default.clone()));
                }
                let op = match function.kind {
                    FunctionKind::Function => Op::CallFunction(self.function(function)?),
                    FunctionKind::NodeGroup => Op::CallNodeGroup(self.node_group(function)?),
                };
                self.ops.push(op);
            }
            TyExprKind::GetOutput { value, index } => {
                self.expr(value)?;
                self.ops.push(Op::GetOutput(*index));
            }
            TyExprKind::FieldAccess { object, field } => {
                self.arg(object)?;
                let name = self.temp_name("field");
                self.ops.push(Op::BindVar(name.clone()));
                field.read(self.backend, &mut self.ops, &name)?;
                self.ops.push(Op::DestroyVar(name));
            }
        }
        Ok(())
    }

    fn body(&mut self, function: &TyFunction) -> Result<Vec<Op>> {
        let names = function.outputs.iter().map(|o| o.name.clone()).collect();
        let outer_names = std::mem::replace(&mut self.output_names, names);
        let body = self.nested(|c| {
            for stmt in &function.body {
                c.statement(stmt)?;
            }
            Ok(())
        });
        self.output_names = outer_names;
        body
    }

    fn function(&mut self, function: &TyFunction) -> Result<CompiledFunction> {
        Ok(CompiledFunction {
            name: function.name.clone(),
            inputs: function.inputs.iter().map(|p| p.name.clone()).collect(),
            body: self.body(function)?,
            num_outputs: function.outputs.len(),
        })
    }

    fn node_group(&mut self, function: &TyFunction) -> Result<CompiledNodeGroup> {
        Ok(CompiledNodeGroup {
            name: function.name.clone(),
            inputs: function.inputs.clone(),
            outputs: function.outputs.clone(),
            body: self.body(function)?,
        })
    }
}
