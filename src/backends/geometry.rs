// Geometry node tree catalog

use super::{common, BackEnd, Catalog, NodeInstance, TreeType};
use crate::ir::Op;
use crate::types::DataType::{self, Bool, Float, Geometry, Int, Rgba, Vec3};
use crate::types::Value;

pub struct GeometryBackEnd {
    catalog: Catalog,
}

impl GeometryBackEnd {
    pub fn new() -> Self {
        let mut catalog = Catalog::default();
        common::register(&mut catalog);
        register(&mut catalog);
        GeometryBackEnd { catalog }
    }
}

impl Default for GeometryBackEnd {
    fn default() -> Self {
        Self::new()
    }
}

const COMPARE: &[(&str, &str)] = &[
    ("less_than", "LESS_THAN"),
    ("less_equal", "LESS_EQUAL"),
    ("greater_than", "GREATER_THAN"),
    ("greater_equal", "GREATER_EQUAL"),
    ("equal", "EQUAL"),
    ("not_equal", "NOT_EQUAL"),
];

fn register(catalog: &mut Catalog) {
    for &(name, operation) in COMPARE {
        catalog.add(
            name,
            vec![Float, Float],
            vec![("result", Bool)],
            NodeInstance::new("FunctionNodeCompare", vec![0, 1], vec![0])
                .prop("data_type", "FLOAT")
                .prop("operation", operation),
        );
        catalog.add(
            name,
            vec![Int, Int],
            vec![("result", Bool)],
            NodeInstance::new("FunctionNodeCompare", vec![2, 3], vec![0])
                .prop("data_type", "INT")
                .prop("operation", operation),
        );
    }
    for &(name, operation) in &COMPARE[4..] {
        catalog.add(
            name,
            vec![Vec3, Vec3],
            vec![("result", Bool)],
            NodeInstance::new("FunctionNodeCompare", vec![4, 5], vec![0])
                .prop("data_type", "VECTOR")
                .prop("mode", "ELEMENT")
                .prop("operation", operation),
        );
    }

    for (name, operation) in [("and", "AND"), ("or", "OR")] {
        catalog.add(
            name,
            vec![Bool, Bool],
            vec![("boolean", Bool)],
            NodeInstance::new("FunctionNodeBooleanMath", vec![0, 1], vec![0]).prop("operation", operation),
        );
    }
    catalog.add(
        "not",
        vec![Bool],
        vec![("boolean", Bool)],
        NodeInstance::new("FunctionNodeBooleanMath", vec![0], vec![0]).prop("operation", "NOT"),
    );

    catalog.add(
        "separate_color",
        vec![Rgba],
        vec![("r", Float), ("g", Float), ("b", Float), ("a", Float)],
        NodeInstance::new("FunctionNodeSeparateColor", vec![0], vec![0, 1, 2, 3]).prop("mode", "RGB"),
    );
    catalog.add(
        "combine_color",
        vec![Float, Float, Float, Float],
        vec![("color", Rgba)],
        NodeInstance::new("FunctionNodeCombineColor", vec![0, 1, 2, 3], vec![0]).prop("mode", "RGB"),
    );

    catalog.add(
        "position",
        vec![],
        vec![("position", Vec3)],
        NodeInstance::new("GeometryNodeInputPosition", vec![], vec![0]),
    );
    catalog.add(
        "normal",
        vec![],
        vec![("normal", Vec3)],
        NodeInstance::new("GeometryNodeInputNormal", vec![], vec![0]),
    );
    catalog.add(
        "index",
        vec![],
        vec![("index", Int)],
        NodeInstance::new("GeometryNodeInputIndex", vec![], vec![0]),
    );

    catalog.add(
        "set_position",
        vec![Geometry, Bool, Vec3, Vec3],
        vec![("geometry", Geometry)],
        NodeInstance::new("GeometryNodeSetPosition", vec![0, 1, 2, 3], vec![0]),
    );
    catalog.add(
        "transform",
        vec![Geometry, Vec3, Vec3, Vec3],
        vec![("geometry", Geometry)],
        NodeInstance::new("GeometryNodeTransform", vec![0, 1, 2, 3], vec![0]),
    );
    catalog.add(
        "grid",
        vec![Float, Float, Int, Int],
        vec![("mesh", Geometry), ("uv_map", Vec3)],
        NodeInstance::new("GeometryNodeMeshGrid", vec![0, 1, 2, 3], vec![0, 1]),
    );
    catalog.add(
        "cube",
        vec![Vec3, Int, Int, Int],
        vec![("mesh", Geometry), ("uv_map", Vec3)],
        NodeInstance::new("GeometryNodeMeshCube", vec![0, 1, 2, 3], vec![0, 1]),
    );
}

/// Input node with its value stored in a property
fn prop_input(ops: &mut Vec<Op>, key: &str, prop: &str, value: &Value, name: &str) {
    let mut node = NodeInstance::new(key, vec![], vec![0]);
    node.props.push((prop.to_string(), value.clone()));
    ops.push(Op::CallBuiltin {
        node,
        outputs: vec![value.dtype()],
    });
    ops.push(Op::RenameNode(name.to_string()));
}

impl BackEnd for GeometryBackEnd {
    fn tree_type(&self) -> TreeType {
        TreeType::Geometry
    }

    fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn supports_constant(&self, dtype: DataType) -> bool {
        matches!(
            dtype,
            DataType::Bool
                | DataType::Int
                | DataType::Float
                | DataType::Vec3
                | DataType::Rgba
                | DataType::String
        )
    }

    fn create_input(&self, ops: &mut Vec<Op>, name: &str, value: &Value) -> anyhow::Result<()> {
        match value {
            Value::Float(_) => {
                ops.push(Op::CallBuiltin {
                    node: NodeInstance::new("ShaderNodeValue", vec![], vec![0]),
                    outputs: vec![Float],
                });
                ops.push(Op::SetOutput(0, value.clone()));
                ops.push(Op::RenameNode(name.to_string()));
            }
            Value::Int(_) => prop_input(ops, "FunctionNodeInputInt", "integer", value, name),
            Value::Bool(_) => prop_input(ops, "FunctionNodeInputBool", "boolean", value, name),
            Value::Vec3(_) => prop_input(ops, "FunctionNodeInputVector", "vector", value, name),
            Value::Rgba(_) => prop_input(ops, "FunctionNodeInputColor", "value", value, name),
            Value::Str(_) => prop_input(ops, "FunctionNodeInputString", "string", value, name),
        }
        Ok(())
    }

    fn supports_repeat(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_input_is_property() {
        let backend = GeometryBackEnd::new();
        let mut ops = Vec::new();
        backend.create_input(&mut ops, "count", &Value::Int(4)).unwrap();
        match &ops[0] {
            Op::CallBuiltin { node, outputs } => {
                assert_eq!(node.key, "FunctionNodeInputInt");
                assert_eq!(node.props, vec![("integer".to_string(), Value::Int(4))]);
                assert_eq!(outputs, &vec![Int]);
            }
            other => panic!("unexpected op {other:?}"),
        }
        assert!(matches!(&ops[1], Op::RenameNode(n) if n == "count"));
    }

    #[test]
    fn test_vector_input_is_property() {
        let backend = GeometryBackEnd::new();
        let mut ops = Vec::new();
        let value = Value::Vec3([1.0, 2.0, 3.0]);
        backend.create_input(&mut ops, "offset", &value).unwrap();
        assert_eq!(ops.len(), 2);
        match &ops[0] {
            Op::CallBuiltin { node, .. } => {
                assert_eq!(node.key, "FunctionNodeInputVector");
                assert_eq!(node.props, vec![("vector".to_string(), value)]);
            }
            other => panic!("unexpected op {other:?}"),
        }
    }

    #[test]
    fn test_compare_prefers_int_for_ints() {
        let backend = GeometryBackEnd::new();
        let args = [Int, Int];
        let best = backend
            .overloads("less_than")
            .iter()
            .min_by_key(|o| o.cost(&args).unwrap_or(u32::MAX))
            .unwrap();
        assert_eq!(best.node.inputs, vec![2, 3]);
    }

    #[test]
    fn test_color_has_alpha() {
        let backend = GeometryBackEnd::new();
        let sep = backend.separate(Rgba).unwrap();
        assert_eq!(sep.output_names(), vec!["r", "g", "b", "a"]);
        assert!(backend.supports_repeat());
    }
}
