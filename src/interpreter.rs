// Executes stack operations against an in-memory node tree

use crate::backends::TreeType;
use crate::ir::{CompiledFunction, CompiledNodeGroup, Op};
use crate::tree::{InterfaceSocket, NodeGraph, NodeId, NodeTree, RepeatItem};
use crate::types::{DataType, Value};
use anyhow::{anyhow, bail, Result};
use log::{debug, trace};
use std::collections::{HashMap, HashSet};

/// An output socket of a node in the current tree
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SocketRef {
    pub node: NodeId,
    pub index: usize,
    pub dtype: DataType,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StackItem {
    /// Leaves the receiving socket at its default
    Empty,
    Value(Value),
    Socket(SocketRef),
    /// Outputs of one node, in output order
    Struct(Vec<StackItem>),
}

impl StackItem {
    fn dtype(&self) -> Option<DataType> {
        match self {
            StackItem::Value(value) => Some(value.dtype()),
            StackItem::Socket(socket) => Some(socket.dtype),
            StackItem::Empty | StackItem::Struct(_) => None,
        }
    }
}

/// Run a compiled program and return the trees it builds
pub fn run(tree_type: TreeType, name: &str, ops: &[Op]) -> Result<NodeGraph> {
    debug!("interpreting {} ops into {tree_type} tree `{name}`", ops.len());
    let mut interpreter = Interpreter::new(NodeTree::new(name, tree_type));
    for op in ops {
        interpreter.operation(op)?;
    }
    debug!(
        "built {} nodes, {} links and {} groups",
        interpreter.tree.nodes.len(),
        interpreter.tree.links.len(),
        interpreter.groups.len()
    );
    Ok(NodeGraph {
        tree: interpreter.tree,
        groups: interpreter.groups,
    })
}

/// Names bound by a repeat body, first binding first. Function bodies have
/// their own scope and temporaries are never carried.
fn bound_names(ops: &[Op]) -> Vec<String> {
    fn walk(ops: &[Op], seen: &mut HashSet<String>, names: &mut Vec<String>) {
        for op in ops {
            match op {
                Op::BindVar(name) if !name.contains('#') => {
                    if seen.insert(name.clone()) {
                        names.push(name.clone());
                    }
                }
                Op::Repeat(body) => walk(body, seen, names),
                _ => {}
            }
        }
    }
    let mut seen = HashSet::new();
    let mut names = Vec::new();
    walk(ops, &mut seen, &mut names);
    names
}

struct Interpreter {
    tree: NodeTree,
    groups: Vec<NodeTree>,
    stack: Vec<StackItem>,
    variables: HashMap<String, StackItem>,
    function_outputs: Vec<StackItem>,
    last_node: Option<NodeId>,
}

impl Interpreter {
    fn new(tree: NodeTree) -> Self {
        Interpreter {
            tree,
            groups: Vec::new(),
            stack: Vec::new(),
            variables: HashMap::new(),
            function_outputs: Vec::new(),
            last_node: None,
        }
    }

    fn pop(&mut self) -> Result<StackItem> {
        self.stack.pop().ok_or_else(|| anyhow!("stack underflow"))
    }

    fn pop_args(&mut self, count: usize) -> Result<Vec<StackItem>> {
        if self.stack.len() < count {
            bail!(
                "stack underflow: needed {count} arguments, found {}",
                self.stack.len()
            );
        }
        Ok(self.stack.split_off(self.stack.len() - count))
    }

    fn last_node(&self) -> Result<NodeId> {
        self.last_node.ok_or_else(|| anyhow!("no node has been added yet"))
    }

    /// Feed an input socket with a stack item
    fn connect(&mut self, node: NodeId, input: usize, item: &StackItem) -> Result<()> {
        match item {
            StackItem::Empty => {}
            StackItem::Value(value) => {
                self.tree.node_mut(node).inputs.insert(input, value.clone());
            }
            StackItem::Socket(socket) => self.tree.link(socket.node, socket.index, node, input),
            StackItem::Struct(_) => bail!("a struct cannot be connected to a single socket"),
        }
        Ok(())
    }

    fn push_outputs(&mut self, items: Vec<StackItem>) {
        match items.len() {
            0 => {}
            1 => self.stack.extend(items),
            _ => self.stack.push(StackItem::Struct(items)),
        }
    }

    fn operation(&mut self, op: &Op) -> Result<()> {
        trace!("{op}");
        match op {
            Op::PushValue(value) => self.stack.push(match value {
                Some(value) => StackItem::Value(value.clone()),
                None => StackItem::Empty,
            }),
            Op::CreateVar(name) => {
                let id = self.tree.add_node("NodeReroute");
                self.tree.node_mut(id).label = Some(name.clone());
                self.last_node = Some(id);
                self.variables.insert(
                    name.clone(),
                    StackItem::Socket(SocketRef {
                        node: id,
                        index: 0,
                        dtype: DataType::Float,
                    }),
                );
            }
            Op::GetVar(name) => {
                let item = self
                    .variables
                    .get(name)
                    .cloned()
                    .ok_or_else(|| anyhow!("unknown variable `{name}`"))?;
                self.stack.push(item);
            }
            Op::BindVar(name) => {
                let item = self.pop()?;
                self.variables.insert(name.clone(), item);
            }
            Op::DestroyVar(name) => {
                self.variables.remove(name);
            }
            Op::GetOutput(index) => match self.pop()? {
                StackItem::Struct(mut items) if *index < items.len() => {
                    self.stack.push(items.swap_remove(*index));
                }
                StackItem::Struct(items) => {
                    bail!("output {index} is out of range for a struct of {}", items.len())
                }
                other => bail!("expected a struct, found {other:?}"),
            },
            Op::SetOutput(index, value) => {
                let id = self.last_node()?;
                self.tree.node_mut(id).outputs.insert(*index, value.clone());
            }
            Op::SetFunctionOut(index) => {
                let item = self.pop()?;
                let slot = self
                    .function_outputs
                    .get_mut(*index)
                    .ok_or_else(|| anyhow!("function output {index} is out of range"))?;
                *slot = item;
            }
            Op::SplitStruct => match self.pop()? {
                StackItem::Struct(items) => self.stack.extend(items),
                other => bail!("expected a struct to split, found {other:?}"),
            },
            Op::Pop => {
                self.pop()?;
            }
            Op::CallBuiltin { node, outputs } => {
                let args = self.pop_args(node.inputs.len())?;
                let id = self.tree.add_node(&node.key);
                self.tree
                    .node_mut(id)
                    .props
                    .extend(node.props.iter().cloned());
                for (arg, input) in args.iter().zip(&node.inputs) {
                    self.connect(id, *input, arg)?;
                }
                if outputs.len() != node.outputs.len() {
                    bail!("`{}` exposes {} outputs but {} were typed", node.key, node.outputs.len(), outputs.len());
                }
                let items = node
                    .outputs
                    .iter()
                    .zip(outputs)
                    .map(|(index, dtype)| {
                        StackItem::Socket(SocketRef {
                            node: id,
                            index: *index,
                            dtype: *dtype,
                        })
                    })
                    .collect();
                self.push_outputs(items);
                self.last_node = Some(id);
            }
            Op::CallFunction(function) => self.call_function(function)?,
            Op::CallNodeGroup(group) => self.call_node_group(group)?,
            Op::RenameNode(name) => {
                let id = self.last_node()?;
                self.tree.node_mut(id).label = Some(name.clone());
            }
            Op::Repeat(body) => self.repeat(body)?,
            Op::EndOfStatement => self.stack.clear(),
        }
        Ok(())
    }

    fn call_function(&mut self, function: &CompiledFunction) -> Result<()> {
        let args = self.pop_args(function.inputs.len())?;
        let variables = function.inputs.iter().cloned().zip(args).collect();
        let outer_variables = std::mem::replace(&mut self.variables, variables);
        let outer_outputs = std::mem::replace(
            &mut self.function_outputs,
            vec![StackItem::Empty; function.num_outputs],
        );
        let outer_stack = std::mem::take(&mut self.stack);

        let result = function.body.iter().try_for_each(|op| self.operation(op));

        self.stack = outer_stack;
        self.variables = outer_variables;
        let outputs = std::mem::replace(&mut self.function_outputs, outer_outputs);
        result?;
        self.push_outputs(outputs);
        Ok(())
    }

    fn call_node_group(&mut self, group: &CompiledNodeGroup) -> Result<()> {
        let args = self.pop_args(group.inputs.len())?;
        if !self.groups.iter().any(|g| g.name == group.name) {
            self.build_group(group)?;
        }

        let id = self.tree.add_node(self.tree.tree_type.group_node_key());
        self.tree.node_mut(id).group = Some(group.name.clone());
        for (i, arg) in args.iter().enumerate() {
            self.connect(id, i, arg)?;
        }
        let items = group
            .outputs
            .iter()
            .enumerate()
            .map(|(index, output)| {
                StackItem::Socket(SocketRef {
                    node: id,
                    index,
                    dtype: output.dtype,
                })
            })
            .collect();
        self.push_outputs(items);
        self.last_node = Some(id);
        Ok(())
    }

    /// Create the group tree once, with its interface and inner nodes
    fn build_group(&mut self, group: &CompiledNodeGroup) -> Result<()> {
        debug!("building node group `{}`", group.name);
        let mut tree = NodeTree::new(&group.name, self.tree.tree_type);
        tree.inputs = group
            .inputs
            .iter()
            .map(|p| InterfaceSocket::new(&p.name, p.dtype, p.default.clone()))
            .collect();
        tree.outputs = group
            .outputs
            .iter()
            .map(|p| InterfaceSocket::new(&p.name, p.dtype, None))
            .collect();
        let group_input = tree.add_node("NodeGroupInput");
        let group_output = tree.add_node("NodeGroupOutput");

        let variables = group
            .inputs
            .iter()
            .enumerate()
            .map(|(index, p)| {
                let socket = SocketRef {
                    node: group_input,
                    index,
                    dtype: p.dtype,
                };
                (p.name.clone(), StackItem::Socket(socket))
            })
            .collect();
        let outer_tree = std::mem::replace(&mut self.tree, tree);
        let outer_variables = std::mem::replace(&mut self.variables, variables);
        let outer_outputs = std::mem::replace(
            &mut self.function_outputs,
            vec![StackItem::Empty; group.outputs.len()],
        );
        let outer_stack = std::mem::take(&mut self.stack);
        let outer_last = self.last_node.take();

        let result = group.body.iter().try_for_each(|op| self.operation(op));
        let outputs = std::mem::take(&mut self.function_outputs);
        let result = result.and_then(|()| {
            outputs
                .iter()
                .enumerate()
                .try_for_each(|(index, item)| self.connect(group_output, index, item))
        });

        let tree = std::mem::replace(&mut self.tree, outer_tree);
        self.variables = outer_variables;
        self.function_outputs = outer_outputs;
        self.stack = outer_stack;
        self.last_node = outer_last;
        result?;
        self.groups.push(tree);
        Ok(())
    }

    /// Variables the body rebinds are threaded through repeat items
    fn repeat(&mut self, body: &[Op]) -> Result<()> {
        let iterations = self.pop()?;
        let input = self.tree.add_node("GeometryNodeRepeatInput");
        let output = self.tree.add_node("GeometryNodeRepeatOutput");
        self.tree.node_mut(input).paired_with = Some(output);
        self.connect(input, 0, &iterations)?;

        let captured: Vec<(String, DataType)> = bound_names(body)
            .into_iter()
            .filter_map(|name| {
                let dtype = self.variables.get(&name)?.dtype()?;
                Some((name, dtype))
            })
            .collect();
        debug!("repeat zone carries {} variables", captured.len());

        for (i, (name, dtype)) in captured.iter().enumerate() {
            let item = RepeatItem::new(name, *dtype);
            self.tree.node_mut(input).repeat_items.push(item.clone());
            self.tree.node_mut(output).repeat_items.push(item);
            let outer = self
                .variables
                .get(name)
                .cloned()
                .ok_or_else(|| anyhow!("unknown variable `{name}`"))?;
            // Socket 0 is the iteration count on the input side
            self.connect(input, i + 1, &outer)?;
            self.variables.insert(
                name.clone(),
                StackItem::Socket(SocketRef {
                    node: input,
                    index: i + 1,
                    dtype: *dtype,
                }),
            );
        }

        let outer_stack = std::mem::take(&mut self.stack);
        let result = body.iter().try_for_each(|op| self.operation(op));
        self.stack = outer_stack;
        result?;

        for (i, (name, dtype)) in captured.iter().enumerate() {
            let inner = self
                .variables
                .get(name)
                .cloned()
                .ok_or_else(|| anyhow!("unknown variable `{name}`"))?;
            self.connect(output, i, &inner)?;
            self.variables.insert(
                name.clone(),
                StackItem::Socket(SocketRef {
                    node: output,
                    index: i,
                    dtype: *dtype,
                }),
            );
        }
        self.last_node = Some(output);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{backend_for, NodeInstance};
    use crate::parser::parse_program;
    use crate::typecheck::TypeChecker;

    fn build(tree_type: TreeType, src: &str) -> NodeGraph {
        let backend = backend_for(tree_type);
        let program = parse_program(src).unwrap();
        let stmts = TypeChecker::new(backend.as_ref()).check(&program).unwrap();
        let ops = crate::compiler::compile(backend.as_ref(), &stmts).unwrap();
        run(tree_type, "test", &ops).unwrap()
    }

    fn find<'t>(tree: &'t NodeTree, key: &str) -> &'t crate::tree::Node {
        tree.nodes
            .iter()
            .find(|n| n.key == key)
            .unwrap_or_else(|| panic!("no {key} node"))
    }

    #[test]
    fn test_simple_expression() {
        let graph = build(TreeType::Shader, "x = sin(t) * 2;");
        let tree = &graph.tree;
        assert_eq!(tree.nodes.len(), 3);
        assert_eq!(tree.links.len(), 2);
        assert_eq!(tree.nodes[0].key, "NodeReroute");
        assert_eq!(tree.nodes[0].label.as_deref(), Some("t"));
        let multiply = &tree.nodes[2];
        assert_eq!(multiply.props["operation"], Value::Str("MULTIPLY".into()));
        assert_eq!(multiply.inputs.get(&1), Some(&Value::Float(2.0)));
        assert!(graph.groups.is_empty());
    }

    #[test]
    fn test_constant_input_node() {
        let graph = build(TreeType::Shader, "a = 0.5; b = a + t;");
        let value = find(&graph.tree, "ShaderNodeValue");
        assert_eq!(value.label.as_deref(), Some("a"));
        assert_eq!(value.outputs.get(&0), Some(&Value::Float(0.5)));
        let add = find(&graph.tree, "ShaderNodeMath");
        assert!(add.inputs.is_empty());
        let sources: Vec<NodeId> = graph.tree.incoming(add.id).map(|l| l.from_node).collect();
        assert_eq!(sources, vec![value.id, NodeId(1)]);
    }

    #[test]
    fn test_destructuring_links_each_output() {
        let graph = build(TreeType::Shader, "x, y, z = tex_coord().generated; w = x + z;");
        let separate = find(&graph.tree, "ShaderNodeSeparateXYZ");
        let add = find(&graph.tree, "ShaderNodeMath");
        let sockets: Vec<usize> = graph
            .tree
            .incoming(add.id)
            .map(|l| {
                assert_eq!(l.from_node, separate.id);
                l.from_socket
            })
            .collect();
        assert_eq!(sockets, vec![0, 2]);
    }

    #[test]
    fn test_field_write() {
        let graph = build(TreeType::Shader, "v = {x, 1, 2}; v.y = 5; o = length(v);");
        let combines: Vec<_> = graph
            .tree
            .nodes
            .iter()
            .filter(|n| n.key == "ShaderNodeCombineXYZ")
            .collect();
        assert_eq!(combines.len(), 2);
        let rebuilt = combines[1];
        assert_eq!(rebuilt.inputs.get(&1), Some(&Value::Float(5.0)));
        let length = find(&graph.tree, "ShaderNodeVectorMath");
        let link = graph.tree.incoming(length.id).next().unwrap();
        assert_eq!(link.from_node, rebuilt.id);
    }

    #[test]
    fn test_field_write_from_multi_output_call() {
        let graph = build(TreeType::Shader, "v = {x, 1, 2}; v.x = noise(v); o = length(v);");
        let noise = find(&graph.tree, "ShaderNodeTexNoise");
        let rebuilt = graph
            .tree
            .nodes
            .iter()
            .filter(|n| n.key == "ShaderNodeCombineXYZ")
            .last()
            .unwrap();
        let link = graph
            .tree
            .incoming(rebuilt.id)
            .find(|l| l.to_socket == 0)
            .unwrap();
        // The first output of the noise texture feeds the component
        assert_eq!((link.from_node, link.from_socket), (noise.id, 0));
    }

    #[test]
    fn test_inlined_function() {
        let src = "fn double(a: float) -> r: float { r = a * 2; }\ny = double(t) + double(1);";
        let graph = build(TreeType::Shader, src);
        let math = graph
            .tree
            .nodes
            .iter()
            .filter(|n| n.key == "ShaderNodeMath")
            .count();
        assert_eq!(math, 3);
        assert!(graph.groups.is_empty());
    }

    #[test]
    fn test_node_group_built_once() {
        let src = "ng wave(p: float, k: float = 2) -> out: float { out = sin(p * k); }\na = wave(t); b = wave(a, 3);";
        let graph = build(TreeType::Shader, src);
        assert_eq!(graph.groups.len(), 1);
        let group = &graph.groups[0];
        assert_eq!(group.name, "wave");
        assert_eq!(group.inputs.len(), 2);
        assert_eq!(group.inputs[1].default, Some(Value::Float(2.0)));
        assert_eq!(group.outputs[0].socket_type, "NodeSocketFloat");
        assert_eq!(group.nodes[0].key, "NodeGroupInput");
        assert_eq!(group.nodes[1].key, "NodeGroupOutput");
        // The sine is the last inner node and feeds the group output
        let sine = group.nodes.last().unwrap();
        assert_eq!(sine.props["operation"], Value::Str("SINE".into()));
        let link = group.incoming(NodeId(1)).next().unwrap();
        assert_eq!((link.from_node, link.to_socket), (sine.id, 0));

        let calls: Vec<_> = graph
            .tree
            .nodes
            .iter()
            .filter(|n| n.key == "ShaderNodeGroup")
            .collect();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].group.as_deref(), Some("wave"));
        assert_eq!(calls[1].inputs.get(&1), Some(&Value::Float(3.0)));
    }

    #[test]
    fn test_repeat_zone_threads_variables() {
        let src = "g = grid().mesh; repeat 3 { g = set_position(g, true, position() * 2); } h = transform(g);";
        let graph = build(TreeType::Geometry, src);
        let tree = &graph.tree;
        let input = find(tree, "GeometryNodeRepeatInput");
        let output = find(tree, "GeometryNodeRepeatOutput");
        assert_eq!(input.paired_with, Some(output.id));
        assert_eq!(input.inputs.get(&0), Some(&Value::Int(3)));
        assert_eq!(input.repeat_items.len(), 1);
        assert_eq!(input.repeat_items[0].name, "g");
        assert_eq!(input.repeat_items[0].dtype, DataType::Geometry);
        assert_eq!(input.repeat_items[0].socket_type, "GEOMETRY");

        let grid = find(tree, "GeometryNodeMeshGrid");
        let set_position = find(tree, "GeometryNodeSetPosition");
        let transform = find(tree, "GeometryNodeTransform");
        let has = |from: NodeId, from_socket: usize, to: NodeId, to_socket: usize| {
            tree.links.iter().any(|l| {
                l.from_node == from && l.from_socket == from_socket && l.to_node == to && l.to_socket == to_socket
            })
        };
        assert!(has(grid.id, 0, input.id, 1));
        assert!(has(input.id, 1, set_position.id, 0));
        assert!(has(set_position.id, 0, output.id, 0));
        assert!(has(output.id, 0, transform.id, 0));
    }

    fn has_link(tree: &NodeTree, from: (NodeId, usize), to: (NodeId, usize)) -> bool {
        tree.links.iter().any(|l| {
            (l.from_node, l.from_socket) == from && (l.to_node, l.to_socket) == to
        })
    }

    #[test]
    fn test_repeat_count_from_multi_output_call() {
        let src = "fn f() -> a: int, b: int { a = 2; b = 3; }\ng = grid().mesh; repeat f() { g = set_position(g); }";
        let graph = build(TreeType::Geometry, src);
        let tree = &graph.tree;
        let count = find(tree, "FunctionNodeInputInt");
        assert_eq!(count.label.as_deref(), Some("a"));
        let input = find(tree, "GeometryNodeRepeatInput");
        assert!(has_link(tree, (count.id, 0), (input.id, 0)));
    }

    #[test]
    fn test_nested_repeat_zones() {
        let src = "g = grid().mesh; repeat 2 { repeat 3 { g = set_position(g); } }";
        let graph = build(TreeType::Geometry, src);
        let tree = &graph.tree;
        let inputs: Vec<_> = tree
            .nodes
            .iter()
            .filter(|n| n.key == "GeometryNodeRepeatInput")
            .collect();
        let outputs: Vec<_> = tree
            .nodes
            .iter()
            .filter(|n| n.key == "GeometryNodeRepeatOutput")
            .collect();
        assert_eq!((inputs.len(), outputs.len()), (2, 2));
        let (outer_in, inner_in) = (inputs[0], inputs[1]);
        let (outer_out, inner_out) = (outputs[0], outputs[1]);
        assert_eq!(outer_in.paired_with, Some(outer_out.id));
        assert_eq!(inner_in.paired_with, Some(inner_out.id));
        // The inner assignment makes the outer zone carry `g` too
        assert_eq!(outer_in.repeat_items.len(), 1);
        assert_eq!(outer_in.repeat_items[0].name, "g");
        assert_eq!(outer_in.inputs.get(&0), Some(&Value::Int(2)));
        assert_eq!(inner_in.inputs.get(&0), Some(&Value::Int(3)));

        let set_position = find(tree, "GeometryNodeSetPosition");
        assert!(has_link(tree, (outer_in.id, 1), (inner_in.id, 1)));
        assert!(has_link(tree, (inner_in.id, 1), (set_position.id, 0)));
        assert!(has_link(tree, (set_position.id, 0), (inner_out.id, 0)));
        assert!(has_link(tree, (inner_out.id, 0), (outer_out.id, 0)));
    }

    #[test]
    fn test_repeat_carries_field_write() {
        let src = "v = position(); repeat 2 { v.z = 1; } g = set_position(grid().mesh, true, v);";
        let graph = build(TreeType::Geometry, src);
        let tree = &graph.tree;
        let input = find(tree, "GeometryNodeRepeatInput");
        let output = find(tree, "GeometryNodeRepeatOutput");
        assert_eq!(input.repeat_items.len(), 1);
        assert_eq!(input.repeat_items[0].name, "v");
        assert_eq!(input.repeat_items[0].socket_type, "VECTOR");

        let position = find(tree, "GeometryNodeInputPosition");
        let separate = find(tree, "ShaderNodeSeparateXYZ");
        let combine = find(tree, "ShaderNodeCombineXYZ");
        let set_position = find(tree, "GeometryNodeSetPosition");
        assert_eq!(combine.inputs.get(&2), Some(&Value::Float(1.0)));
        assert!(has_link(tree, (position.id, 0), (input.id, 1)));
        assert!(has_link(tree, (input.id, 1), (separate.id, 0)));
        assert!(has_link(tree, (combine.id, 0), (output.id, 0)));
        assert!(has_link(tree, (output.id, 0), (set_position.id, 2)));
    }

    #[test]
    fn test_repeat_constant_becomes_item_default() {
        let src = "fn f(g: geometry, k: float) -> out: geometry {\n\
                   repeat 2 { k = k * 2; g = set_position(g, true, position() * k); }\n\
                   out = g;\n}\nh = f(grid().mesh, 3);";
        let graph = build(TreeType::Geometry, src);
        let tree = &graph.tree;
        let input = find(tree, "GeometryNodeRepeatInput");
        let names: Vec<&str> = input.repeat_items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["k", "g"]);
        assert_eq!(input.repeat_items[0].socket_type, "FLOAT");
        // `k` holds a constant outside the zone, so it sets the item default
        assert_eq!(input.inputs.get(&1), Some(&Value::Float(3.0)));
        assert!(tree.incoming(input.id).all(|l| l.to_socket != 1));
        let grid = find(tree, "GeometryNodeMeshGrid");
        assert!(has_link(tree, (grid.id, 0), (input.id, 2)));
    }

    #[test]
    fn test_stack_underflow_is_an_error() {
        let ops = vec![Op::CallBuiltin {
            node: NodeInstance::new("ShaderNodeMath", vec![0, 1], vec![0]),
            outputs: vec![DataType::Float],
        }];
        let err = run(TreeType::Shader, "t", &ops).unwrap_err();
        assert!(err.to_string().contains("stack underflow"));
    }

    #[test]
    fn test_unknown_variable_is_an_error() {
        let err = run(TreeType::Shader, "t", &[Op::GetVar("nope".into())]).unwrap_err();
        assert_eq!(err.to_string(), "unknown variable `nope`");
    }

    #[test]
    fn test_bound_names_skip_temporaries() {
        let ops = vec![
            Op::BindVar("a".into()),
            Op::BindVar("field#0".into()),
            Op::Repeat(vec![Op::BindVar("b".into()), Op::BindVar("a".into())]),
        ];
        assert_eq!(bound_names(&ops), vec!["a", "b"]);
    }
}
