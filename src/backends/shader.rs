// Shader node tree catalog

use super::{common, BackEnd, Catalog, NodeInstance, TreeType};
use crate::ir::Op;
use crate::types::DataType::{self, Float, Rgba, Shader, Vec3};
use crate::types::Value;

pub struct ShaderBackEnd {
    catalog: Catalog,
}

impl ShaderBackEnd {
    pub fn new() -> Self {
        let mut catalog = Catalog::default();
        common::register(&mut catalog);
        register(&mut catalog);
        ShaderBackEnd { catalog }
    }
}

impl Default for ShaderBackEnd {
    fn default() -> Self {
        Self::new()
    }
}

fn register(catalog: &mut Catalog) {
    // Comparisons are float math in shader trees
    for (name, operation) in [("less_than", "LESS_THAN"), ("greater_than", "GREATER_THAN")] {
        catalog.add(
            name,
            vec![Float, Float],
            vec![("value", Float)],
            NodeInstance::new("ShaderNodeMath", vec![0, 1], vec![0]).prop("operation", operation),
        );
    }
    catalog.add(
        "compare",
        vec![Float, Float, Float],
        vec![("value", Float)],
        NodeInstance::new("ShaderNodeMath", vec![0, 1, 2], vec![0]).prop("operation", "COMPARE"),
    );

    catalog.add(
        "separate_color",
        vec![Rgba],
        vec![("r", Float), ("g", Float), ("b", Float)],
        NodeInstance::new("ShaderNodeSeparateColor", vec![0], vec![0, 1, 2]).prop("mode", "RGB"),
    );
    catalog.add(
        "combine_color",
        vec![Float, Float, Float],
        vec![("color", Rgba)],
        NodeInstance::new("ShaderNodeCombineColor", vec![0, 1, 2], vec![0]).prop("mode", "RGB"),
    );

    catalog.add(
        "tex_coord",
        vec![],
        vec![
            ("generated", Vec3),
            ("normal", Vec3),
            ("uv", Vec3),
            ("object", Vec3),
            ("camera", Vec3),
            ("window", Vec3),
            ("reflection", Vec3),
        ],
        NodeInstance::new("ShaderNodeTexCoord", vec![], (0..7).collect()),
    );
    catalog.add(
        "principled",
        vec![Rgba, Float, Float],
        vec![("bsdf", Shader)],
        NodeInstance::new("ShaderNodeBsdfPrincipled", vec![0, 1, 2], vec![0]),
    );
    catalog.add(
        "emission",
        vec![Rgba, Float],
        vec![("emission", Shader)],
        NodeInstance::new("ShaderNodeEmission", vec![0, 1], vec![0]),
    );
}

fn value_node(ops: &mut Vec<Op>, name: &str, value: f64) {
    ops.push(Op::CallBuiltin {
        node: NodeInstance::new("ShaderNodeValue", vec![], vec![0]),
        outputs: vec![Float],
    });
    ops.push(Op::SetOutput(0, Value::Float(value)));
    ops.push(Op::RenameNode(name.to_string()));
}

impl BackEnd for ShaderBackEnd {
    fn tree_type(&self) -> TreeType {
        TreeType::Shader
    }

    fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn supports_constant(&self, dtype: DataType) -> bool {
        matches!(
            dtype,
            DataType::Bool | DataType::Int | DataType::Float | DataType::Vec3 | DataType::Rgba
        )
    }

    fn create_input(&self, ops: &mut Vec<Op>, name: &str, value: &Value) -> anyhow::Result<()> {
        match value {
            Value::Bool(_) | Value::Int(_) | Value::Float(_) => {
                // Shader trees have no int or bool value node
                let scalar = value
                    .as_f64()
                    .ok_or_else(|| anyhow::anyhow!("`{value}` is not a scalar"))?;
                value_node(ops, name, scalar);
            }
            Value::Vec3(v) => {
                ops.extend(v.iter().map(|c| Op::PushValue(Some(Value::Float(*c)))));
                ops.push(Op::CallBuiltin {
                    node: NodeInstance::new("ShaderNodeCombineXYZ", vec![0, 1, 2], vec![0]),
                    outputs: vec![Vec3],
                });
                ops.push(Op::RenameNode(name.to_string()));
            }
            Value::Rgba(_) => {
                ops.push(Op::CallBuiltin {
                    node: NodeInstance::new("ShaderNodeRGB", vec![], vec![0]),
                    outputs: vec![Rgba],
                });
                ops.push(Op::SetOutput(0, value.clone()));
                ops.push(Op::RenameNode(name.to_string()));
            }
            Value::Str(_) => anyhow::bail!("shader trees have no string input node"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_input() {
        let backend = ShaderBackEnd::new();
        let mut ops = Vec::new();
        backend.create_input(&mut ops, "a", &Value::Int(3)).unwrap();
        assert_eq!(ops.len(), 3);
        assert!(matches!(&ops[0], Op::CallBuiltin { node, .. } if node.key == "ShaderNodeValue"));
        assert!(matches!(&ops[1], Op::SetOutput(0, Value::Float(v)) if *v == 3.0));
        assert!(matches!(&ops[2], Op::RenameNode(n) if n == "a"));
    }

    #[test]
    fn test_vector_input_uses_combine() {
        let backend = ShaderBackEnd::new();
        let mut ops = Vec::new();
        backend
            .create_input(&mut ops, "v", &Value::Vec3([1.0, 2.0, 3.0]))
            .unwrap();
        assert_eq!(ops.len(), 5);
        assert!(matches!(&ops[3], Op::CallBuiltin { node, .. } if node.key == "ShaderNodeCombineXYZ"));
    }

    #[test]
    fn test_string_constants_rejected() {
        let backend = ShaderBackEnd::new();
        assert!(!backend.supports_constant(DataType::String));
        assert!(backend
            .create_input(&mut Vec::new(), "s", &Value::Str("x".into()))
            .is_err());
        assert!(!backend.supports_repeat());
    }

    #[test]
    fn test_shader_only_functions() {
        let backend = ShaderBackEnd::new();
        assert!(backend.catalog().contains("tex_coord"));
        assert!(backend.catalog().contains("principled"));
        assert!(!backend.catalog().contains("set_position"));
    }
}
