// Node catalogs for the supported tree types

mod common;
pub mod geometry;
pub mod shader;

pub use geometry::GeometryBackEnd;
pub use shader::ShaderBackEnd;

use crate::ir::Op;
use crate::types::{DataType, Value};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Kind of node tree a formula is compiled into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TreeType {
    #[serde(rename = "ShaderNodeTree")]
    Shader,
    #[serde(rename = "GeometryNodeTree")]
    Geometry,
}

impl TreeType {
    /// Node key of a group node placed in a tree of this type
    pub fn group_node_key(self) -> &'static str {
        match self {
            TreeType::Shader => "ShaderNodeGroup",
            TreeType::Geometry => "GeometryNodeGroup",
        }
    }
}

impl FromStr for TreeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "shader" | "shadernodetree" => Ok(TreeType::Shader),
            "geometry" | "geo" | "geometrynodetree" => Ok(TreeType::Geometry),
            _ => Err(format!(
                "unknown tree type `{s}`, expected `shader` or `geometry`"
            )),
        }
    }
}

impl fmt::Display for TreeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeType::Shader => f.write_str("shader"),
            TreeType::Geometry => f.write_str("geometry"),
        }
    }
}

/// A concrete node: which input sockets the arguments feed, which output
/// sockets the call exposes, and the properties to set on creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeInstance {
    pub key: String,
    pub inputs: Vec<usize>,
    pub outputs: Vec<usize>,
    pub props: Vec<(String, Value)>,
}

impl NodeInstance {
    pub fn new(key: &str, inputs: Vec<usize>, outputs: Vec<usize>) -> Self {
        NodeInstance {
            key: key.to_string(),
            inputs,
            outputs,
            props: Vec::new(),
        }
    }

    pub fn prop(mut self, name: &str, value: &str) -> Self {
        self.props.push((name.to_string(), Value::Str(value.to_string())));
        self
    }
}

/// One typed signature of a built-in function
#[derive(Debug, Clone)]
pub struct Overload {
    pub inputs: Vec<DataType>,
    pub outputs: Vec<(&'static str, DataType)>,
    pub node: NodeInstance,
}

impl Overload {
    /// Total conversion cost of calling this overload with `args`.
    /// Missing trailing arguments keep the node defaults.
    pub fn cost(&self, args: &[DataType]) -> Option<u32> {
        if args.len() > self.inputs.len() {
            return None;
        }
        args.iter()
            .zip(&self.inputs)
            .map(|(arg, param)| arg.conversion_cost(*param))
            .sum()
    }

    pub fn output_types(&self) -> Vec<DataType> {
        self.outputs.iter().map(|(_, dtype)| *dtype).collect()
    }

    pub fn output_names(&self) -> Vec<String> {
        self.outputs.iter().map(|(name, _)| name.to_string()).collect()
    }
}

/// Built-in functions by name, overloads kept in declaration order
#[derive(Debug, Default)]
pub struct Catalog {
    functions: HashMap<&'static str, Vec<Overload>>,
}

impl Catalog {
    pub fn add(
        &mut self,
        name: &'static str,
        inputs: Vec<DataType>,
        outputs: Vec<(&'static str, DataType)>,
        node: NodeInstance,
    ) {
        debug_assert_eq!(inputs.len(), node.inputs.len());
        debug_assert_eq!(outputs.len(), node.outputs.len());
        self.functions.entry(name).or_default().push(Overload {
            inputs,
            outputs,
            node,
        });
    }

    pub fn get(&self, name: &str) -> &[Overload] {
        self.functions.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    #[cfg(test)]
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }
}

/// Everything the type checker and compiler need to know about a tree type
pub trait BackEnd {
    fn tree_type(&self) -> TreeType;

    fn catalog(&self) -> &Catalog;

    fn overloads(&self, name: &str) -> &[Overload] {
        self.catalog().get(name)
    }

    /// Whether a constant of this type can be turned into an input node
    fn supports_constant(&self, dtype: DataType) -> bool;

    /// Emit ops that leave a socket holding `value` on the stack, produced
    /// by a node labelled `name`.
    fn create_input(&self, ops: &mut Vec<Op>, name: &str, value: &Value) -> anyhow::Result<()>;

    fn supports_repeat(&self) -> bool {
        false
    }

    /// Node splitting a vec3 or color into its float components
    fn separate(&self, dtype: DataType) -> Option<&Overload> {
        match dtype {
            DataType::Vec3 => self.overloads("separate_xyz").first(),
            DataType::Rgba => self.overloads("separate_color").first(),
            _ => None,
        }
    }

    /// Inverse of [`BackEnd::separate`]
    fn combine(&self, dtype: DataType) -> Option<&Overload> {
        match dtype {
            DataType::Vec3 => self.overloads("combine_xyz").first(),
            DataType::Rgba => self.overloads("combine_color").first(),
            _ => None,
        }
    }
}

pub fn backend_for(tree_type: TreeType) -> Box<dyn BackEnd> {
    match tree_type {
        TreeType::Shader => Box::new(ShaderBackEnd::new()),
        TreeType::Geometry => Box::new(GeometryBackEnd::new()),
    }
}
