// Catalog entries shared by shader and geometry trees

use super::{Catalog, NodeInstance};
use crate::types::DataType::{self, Float, Rgba, Vec3};

/// (function, operation, number of float inputs)
const MATH: &[(&str, &str, usize)] = &[
    ("add", "ADD", 2),
    ("sub", "SUBTRACT", 2),
    ("mul", "MULTIPLY", 2),
    ("div", "DIVIDE", 2),
    ("mult_add", "MULTIPLY_ADD", 3),
    ("pow", "POWER", 2),
    ("log", "LOGARITHM", 2),
    ("sqrt", "SQRT", 1),
    ("inv_sqrt", "INVERSE_SQRT", 1),
    ("abs", "ABSOLUTE", 1),
    ("exp", "EXPONENT", 1),
    ("min", "MINIMUM", 2),
    ("max", "MAXIMUM", 2),
    ("sign", "SIGN", 1),
    ("smooth_min", "SMOOTH_MIN", 3),
    ("smooth_max", "SMOOTH_MAX", 3),
    ("round", "ROUND", 1),
    ("floor", "FLOOR", 1),
    ("ceil", "CEIL", 1),
    ("trunc", "TRUNC", 1),
    ("fract", "FRACT", 1),
    ("mod", "MODULO", 2),
    ("floored_mod", "FLOORED_MODULO", 2),
    ("wrap", "WRAP", 3),
    ("snap", "SNAP", 2),
    ("pingpong", "PINGPONG", 2),
    ("sin", "SINE", 1),
    ("cos", "COSINE", 1),
    ("tan", "TANGENT", 1),
    ("asin", "ARCSINE", 1),
    ("acos", "ARCCOSINE", 1),
    ("atan", "ARCTANGENT", 1),
    ("atan2", "ARCTAN2", 2),
    ("sinh", "SINH", 1),
    ("cosh", "COSH", 1),
    ("tanh", "TANH", 1),
    ("to_rad", "RADIANS", 1),
    ("to_deg", "DEGREES", 1),
];

#[derive(Clone, Copy)]
enum VecIn {
    Vector(usize),
    Scale,
}

#[derive(Clone, Copy)]
enum VecOut {
    Vector,
    Value,
}

use VecIn::{Scale, Vector};

const VECTOR_MATH: &[(&str, &str, &[VecIn], VecOut)] = &[
    ("add", "ADD", &[Vector(0), Vector(1)], VecOut::Vector),
    ("sub", "SUBTRACT", &[Vector(0), Vector(1)], VecOut::Vector),
    ("mul", "MULTIPLY", &[Vector(0), Vector(1)], VecOut::Vector),
    ("div", "DIVIDE", &[Vector(0), Vector(1)], VecOut::Vector),
    ("mult_add", "MULTIPLY_ADD", &[Vector(0), Vector(1), Vector(2)], VecOut::Vector),
    ("cross", "CROSS_PRODUCT", &[Vector(0), Vector(1)], VecOut::Vector),
    ("project", "PROJECT", &[Vector(0), Vector(1)], VecOut::Vector),
    ("reflect", "REFLECT", &[Vector(0), Vector(1)], VecOut::Vector),
    ("refract", "REFRACT", &[Vector(0), Vector(1), Scale], VecOut::Vector),
    ("faceforward", "FACEFORWARD", &[Vector(0), Vector(1), Vector(2)], VecOut::Vector),
    ("dot", "DOT_PRODUCT", &[Vector(0), Vector(1)], VecOut::Value),
    ("distance", "DISTANCE", &[Vector(0), Vector(1)], VecOut::Value),
    ("length", "LENGTH", &[Vector(0)], VecOut::Value),
    ("scale", "SCALE", &[Vector(0), Scale], VecOut::Vector),
    ("normalize", "NORMALIZE", &[Vector(0)], VecOut::Vector),
    ("abs", "ABSOLUTE", &[Vector(0)], VecOut::Vector),
    ("min", "MINIMUM", &[Vector(0), Vector(1)], VecOut::Vector),
    ("max", "MAXIMUM", &[Vector(0), Vector(1)], VecOut::Vector),
    ("floor", "FLOOR", &[Vector(0)], VecOut::Vector),
    ("ceil", "CEIL", &[Vector(0)], VecOut::Vector),
    ("fract", "FRACTION", &[Vector(0)], VecOut::Vector),
    ("mod", "MODULO", &[Vector(0), Vector(1)], VecOut::Vector),
    ("wrap", "WRAP", &[Vector(0), Vector(1), Vector(2)], VecOut::Vector),
    ("snap", "SNAP", &[Vector(0), Vector(1)], VecOut::Vector),
    ("sin", "SINE", &[Vector(0)], VecOut::Vector),
    ("cos", "COSINE", &[Vector(0)], VecOut::Vector),
    ("tan", "TANGENT", &[Vector(0)], VecOut::Vector),
];

/// Register everything both tree types share. Float overloads come first
/// so they win ties against the vector versions.
pub fn register(catalog: &mut Catalog) {
    math(catalog);
    vector_math(catalog);
    map_range(catalog);
    clamp(catalog);
    mix(catalog);
    textures(catalog);
    xyz(catalog);
}

fn math(catalog: &mut Catalog) {
    for &(name, operation, arity) in MATH {
        catalog.add(
            name,
            vec![Float; arity],
            vec![("value", Float)],
            NodeInstance::new("ShaderNodeMath", (0..arity).collect(), vec![0])
                .prop("operation", operation),
        );
    }
}

fn vector_math(catalog: &mut Catalog) {
    for &(name, operation, inputs, output) in VECTOR_MATH {
        let (types, sockets): (Vec<DataType>, Vec<usize>) = inputs
            .iter()
            .map(|input| match input {
                VecIn::Vector(i) => (Vec3, *i),
                VecIn::Scale => (Float, 3),
            })
            .unzip();
        let (outputs, out_socket) = match output {
            VecOut::Vector => (vec![("vector", Vec3)], 0),
            VecOut::Value => (vec![("value", Float)], 1),
        };
        catalog.add(
            name,
            types,
            outputs,
            NodeInstance::new("ShaderNodeVectorMath", sockets, vec![out_socket])
                .prop("operation", operation),
        );
    }
}

fn map_range(catalog: &mut Catalog) {
    for (name, interpolation) in [("map_range", "LINEAR"), ("map_range_smooth", "SMOOTHSTEP")] {
        catalog.add(
            name,
            vec![Float; 5],
            vec![("result", Float)],
            NodeInstance::new("ShaderNodeMapRange", vec![0, 1, 2, 3, 4], vec![0])
                .prop("data_type", "FLOAT")
                .prop("interpolation_type", interpolation),
        );
        catalog.add(
            name,
            vec![Vec3; 5],
            vec![("vector", Vec3)],
            NodeInstance::new("ShaderNodeMapRange", vec![6, 7, 8, 9, 10], vec![1])
                .prop("data_type", "FLOAT_VECTOR")
                .prop("interpolation_type", interpolation),
        );
    }
    catalog.add(
        "map_range_stepped",
        vec![Float; 6],
        vec![("result", Float)],
        NodeInstance::new("ShaderNodeMapRange", vec![0, 1, 2, 3, 4, 5], vec![0])
            .prop("data_type", "FLOAT")
            .prop("interpolation_type", "STEPPED"),
    );
}

fn clamp(catalog: &mut Catalog) {
    for (name, clamp_type) in [("clamp", "MINMAX"), ("clamp_range", "RANGE")] {
        catalog.add(
            name,
            vec![Float; 3],
            vec![("result", Float)],
            NodeInstance::new("ShaderNodeClamp", vec![0, 1, 2], vec![0]).prop("clamp_type", clamp_type),
        );
    }
}

fn mix(catalog: &mut Catalog) {
    catalog.add(
        "mix",
        vec![Float, Float, Float],
        vec![("result", Float)],
        NodeInstance::new("ShaderNodeMix", vec![0, 2, 3], vec![0]).prop("data_type", "FLOAT"),
    );
    catalog.add(
        "mix",
        vec![Float, Vec3, Vec3],
        vec![("result", Vec3)],
        NodeInstance::new("ShaderNodeMix", vec![0, 4, 5], vec![1]).prop("data_type", "VECTOR"),
    );
    catalog.add(
        "mix",
        vec![Float, Rgba, Rgba],
        vec![("result", Rgba)],
        NodeInstance::new("ShaderNodeMix", vec![0, 6, 7], vec![2])
            .prop("data_type", "RGBA")
            .prop("blend_type", "MIX"),
    );
}

fn textures(catalog: &mut Catalog) {
    catalog.add(
        "noise",
        vec![Vec3, Float, Float, Float],
        vec![("fac", Float), ("color", Rgba)],
        NodeInstance::new("ShaderNodeTexNoise", vec![0, 2, 3, 4], vec![0, 1])
            .prop("noise_dimensions", "3D"),
    );
    catalog.add(
        "voronoi",
        vec![Vec3, Float],
        vec![("distance", Float), ("color", Rgba), ("position", Vec3)],
        NodeInstance::new("ShaderNodeTexVoronoi", vec![0, 2], vec![0, 1, 2])
            .prop("voronoi_dimensions", "3D")
            .prop("feature", "F1")
            .prop("distance", "EUCLIDEAN"),
    );
}

fn xyz(catalog: &mut Catalog) {
    catalog.add(
        "separate_xyz",
        vec![Vec3],
        vec![("x", Float), ("y", Float), ("z", Float)],
        NodeInstance::new("ShaderNodeSeparateXYZ", vec![0], vec![0, 1, 2]),
    );
    catalog.add(
        "combine_xyz",
        vec![Float, Float, Float],
        vec![("vector", Vec3)],
        NodeInstance::new("ShaderNodeCombineXYZ", vec![0, 1, 2], vec![0]),
    );
}
