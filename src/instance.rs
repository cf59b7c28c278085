//! Message instances: per-type records whose field accessors enforce
//! oneof exclusivity and default-value elision, per §4.2/§4.2a.
//!
//! `Instance` is deliberately a thin `HashMap<String, Value>` rather than
//! a per-`MessageType` Rust struct — the schema is loaded at runtime, so no
//! concrete struct can exist at compile time. "Store the default value" is
//! implemented as *removing* the map entry: [`Instance::get`] recomputes the
//! default from the field descriptor on a miss, which is observationally
//! identical under the getter contract and avoids allocating collections or
//! zero-messages nobody reads.

use std::collections::HashMap;

use prost::bytes::Bytes;

use crate::error::Error;
use crate::schema::{FieldDescriptor, MessageType, ResolvedKind, Rule};
use crate::wire::ScalarType;

/// A value held by a field of an [`Instance`].
///
/// Mirrors the teacher crate's own `DynamicValue`, with one change: a
/// singular message-typed field's presence is tracked by `Option`, not by
/// always holding a message. `None` means "never explicitly assigned"
/// (the strict default, elided on encode); `Some(_)` means "assigned",
/// encoded unconditionally even when every field of the submessage is
/// itself default (proto3 explicit presence).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Bytes),
    EnumNumber(i32),
    Message(Option<Box<Instance>>),
    List(Vec<Value>),
    /// Map entries in insertion order — the order the reflective encoder's
    /// map branch emits them in (§4.3, "map keys in their declared/iteration
    /// order").
    Map(Vec<(MapKey, Value)>),
}

/// A map field's key, restricted to the integral/bool/string kinds §6
/// allows.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapKey {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    String(String),
}

impl Value {
    fn variant_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::U32(_) => "u32",
            Value::U64(_) => "u64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::EnumNumber(_) => "enum",
            Value::Message(_) => "message",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    fn matches_scalar(&self, scalar: ScalarType) -> bool {
        matches!(
            (self, scalar),
            (Value::Bool(_), ScalarType::Bool)
                | (
                    Value::I32(_),
                    ScalarType::Int32 | ScalarType::Sint32 | ScalarType::Sfixed32
                )
                | (
                    Value::I64(_),
                    ScalarType::Int64 | ScalarType::Sint64 | ScalarType::Sfixed64
                )
                | (Value::U32(_), ScalarType::Uint32 | ScalarType::Fixed32)
                | (Value::U64(_), ScalarType::Uint64 | ScalarType::Fixed64)
                | (Value::F32(_), ScalarType::Float)
                | (Value::F64(_), ScalarType::Double)
                | (Value::String(_), ScalarType::String)
                | (Value::Bytes(_), ScalarType::Bytes)
        )
    }
}

impl MapKey {
    fn matches_scalar(&self, scalar: ScalarType) -> bool {
        matches!(
            (self, scalar),
            (MapKey::Bool(_), ScalarType::Bool)
                | (
                    MapKey::I32(_),
                    ScalarType::Int32 | ScalarType::Sint32 | ScalarType::Sfixed32
                )
                | (
                    MapKey::I64(_),
                    ScalarType::Int64 | ScalarType::Sint64 | ScalarType::Sfixed64
                )
                | (MapKey::U32(_), ScalarType::Uint32 | ScalarType::Fixed32)
                | (MapKey::U64(_), ScalarType::Uint64 | ScalarType::Fixed64)
                | (MapKey::String(_), ScalarType::String)
        )
    }
}

/// A mutable message instance over a sealed [`MessageType`].
///
/// Owns (1) a value table keyed by field name, (2) a oneof table mapping
/// oneof name to the name of the currently-set field, (3) a reference to
/// its type — exactly the three parts the data model assigns an Instance.
#[derive(Debug, Clone)]
pub struct Instance {
    ty: MessageType,
    values: HashMap<String, Value>,
    oneof_state: HashMap<String, String>,
}

impl Instance {
    /// Creates a fresh instance of `ty` with every field at its default.
    pub fn new(ty: MessageType) -> Self {
        Instance {
            ty,
            values: HashMap::new(),
            oneof_state: HashMap::new(),
        }
    }

    pub fn ty(&self) -> &MessageType {
        &self.ty
    }

    /// Returns the stored value for `name`, or its field's default if unset.
    ///
    /// Returns `None` if `name` does not name a field of this instance's
    /// type.
    pub fn get(&self, name: &str) -> Option<Value> {
        let field = self.ty.get_field(name)?;
        Some(match self.values.get(name) {
            Some(v) => v.clone(),
            None => default_value(&field),
        })
    }

    /// Returns the raw stored value, without materializing the default on a
    /// miss. The encoder uses this to tell "never assigned" apart from
    /// "assigned, but equal to default" for message-typed fields.
    pub(crate) fn raw(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// The name of the field currently set in oneof `name`, if any.
    pub fn get_oneof(&self, name: &str) -> Option<&str> {
        self.oneof_state.get(name).map(String::as_str)
    }

    /// Sets or clears field `name`, per the decision table of §4.2.
    ///
    /// `value = None` is the spec's "`u`" (unset): the field reverts to its
    /// default and, if it belongs to a currently-set oneof, clears that
    /// oneof's state too. `value = Some(v)` assigns `v`, clearing any
    /// sibling field previously set in the same oneof.
    pub fn set(&mut self, name: &str, value: Option<Value>) -> Result<(), Error> {
        let field = self
            .ty
            .get_field(name)
            .ok_or_else(|| Error::not_found(self.ty.name(), name))?;
        if let Some(v) = &value {
            check_shape(&field, v)?;
        }

        match field.part_of() {
            None => match value {
                None => {
                    self.values.remove(name);
                }
                Some(v) => {
                    self.values.insert(name.to_string(), v);
                }
            },
            Some(oneof) => match value {
                None => {
                    if self.oneof_state.get(oneof.name()).map(String::as_str) == Some(name) {
                        self.oneof_state.remove(oneof.name());
                    }
                    self.values.remove(name);
                }
                Some(v) => {
                    if let Some(current) = self.oneof_state.get(oneof.name()).cloned() {
                        if current != name {
                            self.values.remove(&current);
                        }
                    }
                    self.values.insert(name.to_string(), v);
                    self.oneof_state.insert(oneof.name().to_string(), name.to_string());
                }
            },
        }
        tracing::trace!(message = self.ty.name(), field = name, "field set");
        Ok(())
    }
}

/// The field's default, per §3: zero for numeric kinds, empty string/bytes,
/// the enum's first declared value, an empty list/map for repeated/map
/// fields, and `Message(None)` (never assigned) for singular message kinds.
pub(crate) fn default_value(field: &FieldDescriptor) -> Value {
    if field.is_map() {
        return Value::Map(Vec::new());
    }
    if matches!(field.rule(), Rule::Repeated) {
        return Value::List(Vec::new());
    }
    match field.resolved() {
        ResolvedKind::Scalar(scalar) => default_scalar(scalar),
        ResolvedKind::Enum(_) => Value::EnumNumber(field.resolved_enum().expect("enum resolved").default_value()),
        ResolvedKind::Message(_) => Value::Message(None),
    }
}

pub(crate) fn default_scalar(scalar: ScalarType) -> Value {
    match scalar {
        ScalarType::Double => Value::F64(0.0),
        ScalarType::Float => Value::F32(0.0),
        ScalarType::Int32 | ScalarType::Sint32 | ScalarType::Sfixed32 => Value::I32(0),
        ScalarType::Int64 | ScalarType::Sint64 | ScalarType::Sfixed64 => Value::I64(0),
        ScalarType::Uint32 | ScalarType::Fixed32 => Value::U32(0),
        ScalarType::Uint64 | ScalarType::Fixed64 => Value::U64(0),
        ScalarType::Bool => Value::Bool(false),
        ScalarType::String => Value::String(String::new()),
        ScalarType::Bytes => Value::Bytes(Bytes::new()),
    }
}

/// Rejects a value whose shape (variant, and for repeated/map fields its
/// element shape) does not match the field's resolved kind/cardinality.
fn check_shape(field: &FieldDescriptor, value: &Value) -> Result<(), Error> {
    if field.is_map() {
        let Value::Map(entries) = value else {
            return Err(shape_error(field, value));
        };
        // `Schema::seal` rejects any map field with no key type (see
        // `schema::build::resolve_field`), so a `FieldDescriptor` reached
        // through a sealed schema always has one here.
        let key_type = field.key_type().expect("map field carries a key type");
        for (key, v) in entries {
            if !key.matches_scalar(key_type) {
                return Err(shape_error(field, value));
            }
            check_scalar_or_resolved(field, v)?;
        }
        return Ok(());
    }
    if matches!(field.rule(), Rule::Repeated) {
        let Value::List(items) = value else {
            return Err(shape_error(field, value));
        };
        for item in items {
            check_scalar_or_resolved(field, item)?;
        }
        return Ok(());
    }
    check_scalar_or_resolved(field, value)
}

fn check_scalar_or_resolved(field: &FieldDescriptor, value: &Value) -> Result<(), Error> {
    let ok = match field.resolved() {
        ResolvedKind::Scalar(scalar) => value.matches_scalar(scalar),
        ResolvedKind::Enum(_) => matches!(value, Value::EnumNumber(_)),
        // `Message(None)` is the *default*, never a legal argument to `set`:
        // a caller wanting to clear the field passes the outer `None`
        // instead, so `raw(name).is_some()` alone is enough for the
        // encoder to tell "assigned" apart from "default" (§4.2a).
        ResolvedKind::Message(_) => matches!(value, Value::Message(Some(_))),
    };
    if ok {
        Ok(())
    } else {
        Err(shape_error(field, value))
    }
}

fn shape_error(field: &FieldDescriptor, value: &Value) -> Error {
    Error::type_error(format!(
        "field '{}' cannot hold a {} value",
        field.name(),
        value.variant_name()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldKindDecl, FieldSpec, ParentId, Rule as SchemaRule, Schema};
    use crate::wire::ScalarType;

    fn oneof_schema() -> (crate::schema::SealedSchema, MessageType) {
        let mut schema = Schema::new();
        let m = schema.add_message(ParentId::Root, "M").unwrap();
        let p = schema.new_field(FieldSpec::new("p", 1, FieldKindDecl::Scalar(ScalarType::Int32), SchemaRule::Optional));
        let q = schema.new_field(FieldSpec::new(
            "q",
            2,
            FieldKindDecl::Scalar(ScalarType::String),
            SchemaRule::Optional,
        ));
        let oneof = schema.new_oneof("x");
        schema.oneof_add_field(oneof, p).unwrap();
        schema.oneof_add_field(oneof, q).unwrap();
        schema.message_add_oneof(m, oneof).unwrap();
        let sealed = schema.seal().unwrap();
        let ty = sealed.get("M").unwrap();
        let ty = match ty {
            crate::schema::RootMember::Message(m) => m,
            _ => unreachable!(),
        };
        (sealed, ty)
    }

    #[test]
    fn oneof_exclusivity_s2() {
        let (_schema, ty) = oneof_schema();
        let mut inst = Instance::new(ty);
        inst.set("p", Some(Value::I32(5))).unwrap();
        inst.set("q", Some(Value::String("hi".to_string()))).unwrap();
        assert_eq!(inst.get("p"), Some(Value::I32(0)));
        assert_eq!(inst.get_oneof("x"), Some("q"));
    }

    #[test]
    fn unsetting_clears_oneof_state() {
        let (_schema, ty) = oneof_schema();
        let mut inst = Instance::new(ty);
        inst.set("p", Some(Value::I32(5))).unwrap();
        inst.set("p", None).unwrap();
        assert_eq!(inst.get_oneof("x"), None);
        assert_eq!(inst.get("p"), Some(Value::I32(0)));
    }

    #[test]
    fn wrong_shape_rejected() {
        let (_schema, ty) = oneof_schema();
        let mut inst = Instance::new(ty);
        let err = inst.set("p", Some(Value::String("nope".to_string()))).unwrap_err();
        assert!(err.to_string().contains("cannot hold"));
    }
}
