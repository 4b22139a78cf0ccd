// Socket data types and compile-time constant values

use serde::Serialize;
use std::fmt;

/// Data carried by a node socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Bool,
    Int,
    Float,
    Rgba,
    Vec3,
    Rotation,
    Geometry,
    String,
    Shader,
    Object,
    Image,
    Collection,
    Texture,
    Material,
}

impl DataType {
    /// Resolve a type annotation as written in formula source (`a: float`)
    pub fn from_annotation(name: &str) -> Option<DataType> {
        let dtype = match name {
            "bool" => DataType::Bool,
            "int" => DataType::Int,
            "float" => DataType::Float,
            "color" | "rgba" => DataType::Rgba,
            "vec3" => DataType::Vec3,
            "rot" | "rotation" => DataType::Rotation,
            "geo" | "geometry" => DataType::Geometry,
            "str" | "string" => DataType::String,
            "shader" => DataType::Shader,
            "object" => DataType::Object,
            "image" => DataType::Image,
            "collection" => DataType::Collection,
            "texture" => DataType::Texture,
            "material" => DataType::Material,
            _ => return None,
        };
        Some(dtype)
    }

    pub fn name(self) -> &'static str {
        match self {
            DataType::Bool => "bool",
            DataType::Int => "int",
            DataType::Float => "float",
            DataType::Rgba => "color",
            DataType::Vec3 => "vec3",
            DataType::Rotation => "rotation",
            DataType::Geometry => "geometry",
            DataType::String => "string",
            DataType::Shader => "shader",
            DataType::Object => "object",
            DataType::Image => "image",
            DataType::Collection => "collection",
            DataType::Texture => "texture",
            DataType::Material => "material",
        }
    }

    /// Socket class used for node group interface sockets
    pub fn socket_type(self) -> &'static str {
        match self {
            DataType::Bool => "NodeSocketBool",
            DataType::Int => "NodeSocketInt",
            DataType::Float => "NodeSocketFloat",
            DataType::Rgba => "NodeSocketColor",
            DataType::Vec3 => "NodeSocketVector",
            DataType::Rotation => "NodeSocketRotation",
            DataType::Geometry => "NodeSocketGeometry",
            DataType::String => "NodeSocketString",
            DataType::Shader => "NodeSocketShader",
            DataType::Object => "NodeSocketObject",
            DataType::Image => "NodeSocketImage",
            DataType::Collection => "NodeSocketCollection",
            DataType::Texture => "NodeSocketTexture",
            DataType::Material => "NodeSocketMaterial",
        }
    }

    /// Socket type enum used for repeat zone items
    pub fn repeat_item_type(self) -> &'static str {
        match self {
            DataType::Bool => "BOOLEAN",
            DataType::Int => "INT",
            DataType::Float => "FLOAT",
            DataType::Rgba => "RGBA",
            DataType::Vec3 => "VECTOR",
            DataType::Rotation => "ROTATION",
            DataType::Geometry => "GEOMETRY",
            DataType::String => "STRING",
            DataType::Shader => "SHADER",
            DataType::Object => "OBJECT",
            DataType::Image => "IMAGE",
            DataType::Collection => "COLLECTION",
            DataType::Texture => "TEXTURE",
            DataType::Material => "MATERIAL",
        }
    }

    /// Cost of implicitly converting a value of this type into `to`.
    /// `None` means the conversion is not allowed.
    pub fn conversion_cost(self, to: DataType) -> Option<u32> {
        use DataType::*;
        if self == to {
            return Some(0);
        }
        match (self, to) {
            (Bool, Int) | (Int, Float) | (Float, Vec3) | (Float, Rgba) | (Vec3, Rgba) | (Rgba, Vec3) => Some(1),
            (Bool, Float) | (Int, Vec3) | (Int, Rgba) => Some(2),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A constant known at compile time
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Vec3([f64; 3]),
    Rgba([f64; 4]),
    Str(String),
}

impl Value {
    pub fn dtype(&self) -> DataType {
        match self {
            Value::Bool(_) => DataType::Bool,
            Value::Int(_) => DataType::Int,
            Value::Float(_) => DataType::Float,
            Value::Vec3(_) => DataType::Vec3,
            Value::Rgba(_) => DataType::Rgba,
            Value::Str(_) => DataType::String,
        }
    }

    /// Scalar view of bool/int/float constants
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Apply an implicit conversion at compile time
    pub fn convert(&self, to: DataType) -> Option<Value> {
        if self.dtype() == to {
            return Some(self.clone());
        }
        self.dtype().conversion_cost(to)?;
        let converted = match (self, to) {
            (Value::Bool(b), DataType::Int) => Value::Int(*b as i64),
            (Value::Vec3(v), DataType::Rgba) => Value::Rgba([v[0], v[1], v[2], 1.0]),
            (Value::Rgba(c), DataType::Vec3) => Value::Vec3([c[0], c[1], c[2]]),
            (_, DataType::Float) => Value::Float(self.as_f64()?),
            (_, DataType::Vec3) => Value::Vec3([self.as_f64()?; 3]),
            (_, DataType::Rgba) => {
                let s = self.as_f64()?;
                Value::Rgba([s, s, s, 1.0])
            }
            _ => return None,
        };
        Some(converted)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Vec3([x, y, z]) => write!(f, "{{{x:?}, {y:?}, {z:?}}}"),
            Value::Rgba([r, g, b, a]) => write!(f, "{{{r:?}, {g:?}, {b:?}, {a:?}}}"),
            Value::Str(s) => write!(f, "{s:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotations() {
        assert_eq!(DataType::from_annotation("float"), Some(DataType::Float));
        assert_eq!(DataType::from_annotation("color"), Some(DataType::Rgba));
        assert_eq!(DataType::from_annotation("geo"), Some(DataType::Geometry));
        assert_eq!(DataType::from_annotation("vector"), None);
    }

    #[test]
    fn test_conversion_costs() {
        assert_eq!(DataType::Int.conversion_cost(DataType::Int), Some(0));
        assert_eq!(DataType::Int.conversion_cost(DataType::Float), Some(1));
        assert_eq!(DataType::Int.conversion_cost(DataType::Vec3), Some(2));
        assert_eq!(DataType::Float.conversion_cost(DataType::Int), None);
        assert_eq!(DataType::Vec3.conversion_cost(DataType::Float), None);
        assert_eq!(DataType::Geometry.conversion_cost(DataType::Float), None);
    }

    #[test]
    fn test_convert_constants() {
        assert_eq!(Value::Int(2).convert(DataType::Float), Some(Value::Float(2.0)));
        assert_eq!(Value::Int(2).convert(DataType::Vec3), Some(Value::Vec3([2.0, 2.0, 2.0])));
        assert_eq!(Value::Bool(true).convert(DataType::Int), Some(Value::Int(1)));
        assert_eq!(
            Value::Vec3([1.0, 0.5, 0.0]).convert(DataType::Rgba),
            Some(Value::Rgba([1.0, 0.5, 0.0, 1.0]))
        );
        assert_eq!(Value::Float(1.5).convert(DataType::Int), None);
        assert_eq!(Value::Str("a".into()).convert(DataType::Float), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(Value::Vec3([1.0, 2.0, 3.0]).to_string(), "{1.0, 2.0, 3.0}");
        assert_eq!(Value::Str("uv".into()).to_string(), "\"uv\"");
    }
}
