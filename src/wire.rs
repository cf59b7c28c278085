//! Static mapping from scalar kind to its wire representation.
//!
//! Mirrors the small lookup tables `prost`'s own code generator builds for
//! the same purpose (wire type, packability), plus the two constants that
//! define the synthetic map-entry message shape (`{ key = 1; value = 2; }`).

pub use prost::encoding::WireType;

/// A scalar field kind, independent of any particular field's cardinality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Double,
    Float,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Bool,
    String,
    Bytes,
}

/// Tag number of the synthetic `key` field inside a map-entry message.
pub const MAP_KEY_NUMBER: u32 = 1;
/// Tag number of the synthetic `value` field inside a map-entry message.
pub const MAP_VALUE_NUMBER: u32 = 2;

impl ScalarType {
    /// Parses the scalar kind names accepted by the JSON schema format.
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "double" => ScalarType::Double,
            "float" => ScalarType::Float,
            "int32" => ScalarType::Int32,
            "int64" => ScalarType::Int64,
            "uint32" => ScalarType::Uint32,
            "uint64" => ScalarType::Uint64,
            "sint32" => ScalarType::Sint32,
            "sint64" => ScalarType::Sint64,
            "fixed32" => ScalarType::Fixed32,
            "fixed64" => ScalarType::Fixed64,
            "sfixed32" => ScalarType::Sfixed32,
            "sfixed64" => ScalarType::Sfixed64,
            "bool" => ScalarType::Bool,
            "string" => ScalarType::String,
            "bytes" => ScalarType::Bytes,
            _ => return None,
        })
    }

    /// The name this scalar kind is written as in the JSON schema format.
    pub fn name(self) -> &'static str {
        match self {
            ScalarType::Double => "double",
            ScalarType::Float => "float",
            ScalarType::Int32 => "int32",
            ScalarType::Int64 => "int64",
            ScalarType::Uint32 => "uint32",
            ScalarType::Uint64 => "uint64",
            ScalarType::Sint32 => "sint32",
            ScalarType::Sint64 => "sint64",
            ScalarType::Fixed32 => "fixed32",
            ScalarType::Fixed64 => "fixed64",
            ScalarType::Sfixed32 => "sfixed32",
            ScalarType::Sfixed64 => "sfixed64",
            ScalarType::Bool => "bool",
            ScalarType::String => "string",
            ScalarType::Bytes => "bytes",
        }
    }

    /// The wire type used when this scalar is encoded unpacked.
    pub fn wire_type(self) -> WireType {
        match self {
            ScalarType::Double | ScalarType::Fixed64 | ScalarType::Sfixed64 => {
                WireType::SixtyFourBit
            }
            ScalarType::Float | ScalarType::Fixed32 | ScalarType::Sfixed32 => {
                WireType::ThirtyTwoBit
            }
            ScalarType::Int32
            | ScalarType::Int64
            | ScalarType::Uint32
            | ScalarType::Uint64
            | ScalarType::Sint32
            | ScalarType::Sint64
            | ScalarType::Bool => WireType::Varint,
            ScalarType::String | ScalarType::Bytes => WireType::LengthDelimited,
        }
    }

    /// Whether a repeated field of this kind may use packed encoding.
    pub fn is_packable(self) -> bool {
        !matches!(self, ScalarType::String | ScalarType::Bytes)
    }

    /// Whether this kind may be used as a map key (integral, bool or string).
    pub fn is_valid_map_key(self) -> bool {
        match self {
            ScalarType::String
            | ScalarType::Bool
            | ScalarType::Int32
            | ScalarType::Int64
            | ScalarType::Uint32
            | ScalarType::Uint64
            | ScalarType::Sint32
            | ScalarType::Sint64
            | ScalarType::Fixed32
            | ScalarType::Fixed64
            | ScalarType::Sfixed32
            | ScalarType::Sfixed64 => true,
            ScalarType::Double | ScalarType::Float | ScalarType::Bytes => false,
        }
    }

    /// True iff the kind is one of the 64-bit integer kinds (`Field.long` in
    /// the schema's data model).
    pub fn is_long(self) -> bool {
        matches!(
            self,
            ScalarType::Int64 | ScalarType::Uint64 | ScalarType::Sint64 | ScalarType::Fixed64 | ScalarType::Sfixed64
        )
    }
}
