// Component access on vectors and colors: `v.x` and `c.r = 0.5;`

use crate::backends::BackEnd;
use crate::ir::Op;
use crate::types::{DataType, Value};
use anyhow::anyhow;

/// A float component of a vec3 or color, indexed like the outputs of the
/// backend's separate node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub object: DataType,
    pub index: usize,
}

impl Field {
    pub fn lookup(backend: &dyn BackEnd, object: DataType, name: &str) -> Option<Field> {
        let separate = backend.separate(object)?;
        let index = separate.outputs.iter().position(|(n, _)| *n == name)?;
        Some(Field { object, index })
    }

    pub fn dtype(self) -> DataType {
        DataType::Float
    }

    /// Read the component of a constant
    pub fn fold(self, value: &Value) -> Option<Value> {
        let component = match value {
            Value::Vec3(v) => v.get(self.index)?,
            Value::Rgba(c) => c.get(self.index)?,
            _ => return None,
        };
        Some(Value::Float(*component))
    }

    /// Push the component of the variable `source`
    pub fn read(self, backend: &dyn BackEnd, ops: &mut Vec<Op>, source: &str) -> anyhow::Result<()> {
        let separate = backend
            .separate(self.object)
            .ok_or_else(|| anyhow!("{} values have no components", self.object))?;
        ops.push(Op::GetVar(source.to_string()));
        ops.push(Op::CallBuiltin {
            node: separate.node.clone(),
            outputs: separate.output_types(),
        });
        ops.push(Op::GetOutput(self.index));
        Ok(())
    }

    /// Rebind `target` to the value of `object` with this component replaced
    /// by `value`. `object` and `value` are temporaries holding sockets;
    /// `object` is rebound to the separated parts.
    pub fn write(
        self,
        backend: &dyn BackEnd,
        ops: &mut Vec<Op>,
        target: &str,
        object: &str,
        value: &str,
    ) -> anyhow::Result<()> {
        let separate = backend
            .separate(self.object)
            .ok_or_else(|| anyhow!("{} values have no components", self.object))?;
        let combine = backend
            .combine(self.object)
            .ok_or_else(|| anyhow!("{} values cannot be combined", self.object))?;

        ops.push(Op::GetVar(object.to_string()));
        ops.push(Op::CallBuiltin {
            node: separate.node.clone(),
            outputs: separate.output_types(),
        });
        ops.push(Op::BindVar(object.to_string()));
        for i in 0..combine.inputs.len() {
            if i == self.index {
                ops.push(Op::GetVar(value.to_string()));
            } else {
                ops.push(Op::GetVar(object.to_string()));
                ops.push(Op::GetOutput(i));
            }
        }
        ops.push(Op::CallBuiltin {
            node: combine.node.clone(),
            outputs: combine.output_types(),
        });
        ops.push(Op::BindVar(target.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{GeometryBackEnd, ShaderBackEnd};

    #[test]
    fn test_lookup() {
        let shader = ShaderBackEnd::new();
        assert_eq!(
            Field::lookup(&shader, DataType::Vec3, "y"),
            Some(Field {
                object: DataType::Vec3,
                index: 1
            })
        );
        assert_eq!(Field::lookup(&shader, DataType::Vec3, "w"), None);
        assert_eq!(Field::lookup(&shader, DataType::Rgba, "a"), None);
        assert_eq!(Field::lookup(&shader, DataType::Float, "x"), None);

        let geometry = GeometryBackEnd::new();
        assert!(Field::lookup(&geometry, DataType::Rgba, "a").is_some());
    }

    #[test]
    fn test_fold() {
        let field = Field {
            object: DataType::Vec3,
            index: 2,
        };
        assert_eq!(field.fold(&Value::Vec3([1.0, 2.0, 3.0])), Some(Value::Float(3.0)));
        assert_eq!(field.fold(&Value::Float(1.0)), None);
    }

    #[test]
    fn test_read_ops() {
        let backend = ShaderBackEnd::new();
        let field = Field::lookup(&backend, DataType::Vec3, "z").unwrap();
        let mut ops = Vec::new();
        field.read(&backend, &mut ops, "tmp#0").unwrap();
        assert_eq!(ops.len(), 3);
        assert_eq!(ops[0], Op::GetVar("tmp#0".into()));
        assert_eq!(ops[2], Op::GetOutput(2));
    }

    #[test]
    fn test_write_ops() {
        let backend = ShaderBackEnd::new();
        let field = Field::lookup(&backend, DataType::Vec3, "x").unwrap();
        let mut ops = Vec::new();
        field.write(&backend, &mut ops, "v", "v#0", "value#1").unwrap();
        let rendered: Vec<String> = ops.iter().map(|op| op.to_string()).collect();
        assert_eq!(
            rendered,
            vec![
                "get_var v#0",
                "call_builtin ShaderNodeSeparateXYZ",
                "bind_var v#0",
                "get_var value#1",
                "get_var v#0",
                "get_output 1",
                "get_var v#0",
                "get_output 2",
                "call_builtin ShaderNodeCombineXYZ",
                "bind_var v",
            ]
        );
    }
}
