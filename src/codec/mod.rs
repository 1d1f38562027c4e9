//! Value codec: the wire representation shared by every native call.
//!
//! - [`wire`]: the call buffer, argument encoding and result decoding.
//! - [`value`]: the closed value type carried by event and state-bag payloads.
//! - [`msgpack`]: MessagePack serialization of those payloads.

pub mod msgpack;
pub mod value;
pub mod wire;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use value::Value;
pub use wire::{
    Argument, CallFrame, FromReturn, NativeContext, PayloadRef, ReturnValue, ScalarValue,
    WireValue, MAX_ARGS, MAX_RESULTS,
};

/// Three consecutive float slots on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl From<[f32; 3]> for Vector3 {
    fn from([x, y, z]: [f32; 3]) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for Vector3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vector3({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Element type of a fixed-size tuple result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scalar {
    Int,
    Float,
    Bool,
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Scalar::Int => "int",
            Scalar::Float => "float",
            Scalar::Bool => "bool",
        })
    }
}

/// Declared result shape of a native.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    /// Invoked for effect; nothing is decoded.
    Void,
    Int,
    Float,
    Bool,
    String,
    Vector3,
    Tuple(&'static [Scalar]),
}

impl Shape {
    /// Number of result slots the engine fills for this shape.
    pub fn slot_count(self) -> usize {
        match self {
            Shape::Void => 0,
            Shape::Int | Shape::Float | Shape::Bool | Shape::String => 1,
            Shape::Vector3 => 3,
            Shape::Tuple(items) => items.len(),
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Void => f.write_str("void"),
            Shape::Int => f.write_str("int"),
            Shape::Float => f.write_str("float"),
            Shape::Bool => f.write_str("bool"),
            Shape::String => f.write_str("string"),
            Shape::Vector3 => f.write_str("vector3"),
            Shape::Tuple(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Declared kind of a native argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgKind {
    Int,
    Float,
    Bool,
    /// UTF-8 text, one slot.
    Str,
    /// Binary payload followed by a length companion slot.
    Bytes,
    Vector3,
    Handle,
}

impl ArgKind {
    /// Call buffer slots one argument of this kind occupies.
    pub fn slot_count(self) -> usize {
        match self {
            ArgKind::Vector3 => 3,
            ArgKind::Bytes => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArgKind::Int => "int",
            ArgKind::Float => "float",
            ArgKind::Bool => "bool",
            ArgKind::Str => "string",
            ArgKind::Bytes => "buffer",
            ArgKind::Vector3 => "vector3",
            ArgKind::Handle => "handle",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_counts() {
        assert_eq!(Shape::Void.slot_count(), 0);
        assert_eq!(Shape::Vector3.slot_count(), 3);
        assert_eq!(Shape::Tuple(&[Scalar::Bool, Scalar::Bool, Scalar::Bool]).slot_count(), 3);
        assert_eq!(ArgKind::Bytes.slot_count(), 2);
        assert_eq!(ArgKind::Handle.slot_count(), 1);
    }

    #[test]
    fn test_shape_display() {
        assert_eq!(Shape::Tuple(&[Scalar::Int, Scalar::Int]).to_string(), "(int, int)");
        assert_eq!(Shape::String.to_string(), "string");
    }
}
