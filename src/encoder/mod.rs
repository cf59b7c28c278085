//! Wire-format encoding: the reflective path (always correct, recomputes
//! per-field dispatch from the schema on every call) and the specialized
//! path (reuses a [`FieldPlan`] cache built once per [`MessageType`]).
//!
//! Both paths share one `write_field`/`write_value` implementation — the
//! only difference is where the `Vec<FieldPlan>` they walk comes from —
//! which is what makes property 7 ("reflective ≡ specialized") true by
//! construction rather than by two hand-written encoders that happen to
//! agree (§4.4a).

use prost::bytes::Bytes;
use prost::encoding::WireType;

use crate::error::EncodeError;
use crate::instance::{default_scalar, Instance, MapKey, Value};
use crate::schema::{self, EnumType, FieldPlan, MessageType, ResolvedKind, Rule, SealedSchema};
use crate::wire::{ScalarType, MAP_KEY_NUMBER, MAP_VALUE_NUMBER};
use crate::writer::Writer;

/// A recursion point: `encode_into` for the reflective path, or
/// `encode_specialized_into` for the specialized path. Passing the
/// entry-point function itself back down is what keeps a message's nested
/// submessages on the same path their parent was encoded with.
type Recurse = fn(&Instance, &mut Writer) -> Result<(), EncodeError>;

/// Encodes `instance` to a fresh buffer via the reflective path: walks
/// `fieldsArray`, recomputing each field's dispatch plan from the schema.
/// This is the semantic reference the specialized path must match exactly.
pub fn encode(instance: &Instance) -> Result<Bytes, EncodeError> {
    let mut writer = Writer::new();
    encode_into(instance, &mut writer)?;
    Ok(writer.finish())
}

/// Reflective encode into a caller-owned [`Writer`].
pub fn encode_into(instance: &Instance, writer: &mut Writer) -> Result<(), EncodeError> {
    let result = (|| {
        for field in instance.ty().fields() {
            let plan = schema::field_plan(instance.ty().schema(), field.index());
            write_field(&plan, instance, writer, encode_into)?;
        }
        Ok(())
    })();
    if let Err(err) = &result {
        tracing::warn!(message = %instance.ty().full_name(), error = %err, "reflective encode failed");
    }
    result
}

/// Encodes `instance` to a fresh buffer via the specialized path: walks the
/// precomputed [`FieldPlan`] cache (`MessageType::specialized`) instead of
/// recomputing dispatch information per field.
pub fn encode_specialized(instance: &Instance) -> Result<Bytes, EncodeError> {
    let mut writer = Writer::new();
    encode_specialized_into(instance, &mut writer)?;
    Ok(writer.finish())
}

/// Specialized encode into a caller-owned [`Writer`].
pub fn encode_specialized_into(instance: &Instance, writer: &mut Writer) -> Result<(), EncodeError> {
    let result = (|| {
        for plan in instance.ty().specialized() {
            write_field(plan, instance, writer, encode_specialized_into)?;
        }
        Ok(())
    })();
    if let Err(err) = &result {
        tracing::warn!(message = %instance.ty().full_name(), error = %err, "specialized encode failed");
    }
    result
}

fn write_field(plan: &FieldPlan, instance: &Instance, writer: &mut Writer, recurse: Recurse) -> Result<(), EncodeError> {
    if plan.map {
        write_map(plan, instance, writer, recurse)
    } else if matches!(plan.rule, Rule::Repeated) {
        write_repeated(plan, instance, writer, recurse)
    } else {
        write_scalar(plan, instance, writer, recurse)
    }
}

fn write_scalar(plan: &FieldPlan, instance: &Instance, writer: &mut Writer, recurse: Recurse) -> Result<(), EncodeError> {
    let schema = instance.ty().schema();
    let required = matches!(plan.rule, Rule::Required);
    match instance.raw(&plan.name) {
        Some(value) => {
            let emit = if required {
                true
            } else if let ResolvedKind::Message(_) = plan.resolved {
                // Strict identity: a field holding `Message(Some(_))` has
                // been explicitly assigned and encodes unconditionally,
                // even if every field of the submessage is itself default.
                matches!(value, Value::Message(Some(_)))
            } else {
                !is_default(plan, schema, value)
            };
            if emit {
                write_value(plan.id, &plan.name, plan.resolved, value, writer, recurse)?;
            }
        }
        None if required => {
            let default = materialize_default(plan, schema);
            write_value(plan.id, &plan.name, plan.resolved, &default, writer, recurse)?;
        }
        None => {}
    }
    Ok(())
}

fn write_repeated(plan: &FieldPlan, instance: &Instance, writer: &mut Writer, recurse: Recurse) -> Result<(), EncodeError> {
    let items = match instance.raw(&plan.name) {
        Some(Value::List(items)) if !items.is_empty() => items,
        _ => return Ok(()),
    };
    let packable = match plan.resolved {
        ResolvedKind::Scalar(s) => s.is_packable(),
        ResolvedKind::Enum(_) => true,
        ResolvedKind::Message(_) => false,
    };
    if plan.packed && packable {
        writer.tag(plan.id, WireType::LengthDelimited);
        writer.fork();
        for item in items {
            write_packed_element(&plan.name, plan.resolved, item, writer)?;
        }
        writer.ldelim();
    } else {
        for item in items {
            write_value(plan.id, &plan.name, plan.resolved, item, writer, recurse)?;
        }
    }
    Ok(())
}

fn write_map(plan: &FieldPlan, instance: &Instance, writer: &mut Writer, recurse: Recurse) -> Result<(), EncodeError> {
    let entries = match instance.raw(&plan.name) {
        Some(Value::Map(entries)) if !entries.is_empty() => entries,
        _ => return Ok(()),
    };
    let key_type = plan.key_type.ok_or_else(|| {
        EncodeError::not_representable(&plan.name, "map field has no key type recorded on its plan")
    })?;
    for (key, value) in entries {
        writer.tag(plan.id, WireType::LengthDelimited);
        writer.fork();
        writer.tag(MAP_KEY_NUMBER, key_type.wire_type());
        write_map_key(&plan.name, key_type, key, writer)?;
        write_value(MAP_VALUE_NUMBER, &plan.name, plan.resolved, value, writer, recurse)?;
        writer.ldelim();
    }
    Ok(())
}

fn write_value(
    id: u32,
    name: &str,
    resolved: ResolvedKind,
    value: &Value,
    writer: &mut Writer,
    recurse: Recurse,
) -> Result<(), EncodeError> {
    match resolved {
        ResolvedKind::Scalar(scalar) => {
            writer.tag(id, scalar.wire_type());
            write_scalar_wire(name, scalar, value, writer)
        }
        ResolvedKind::Enum(_) => {
            let n = as_enum_number(name, value)?;
            writer.tag(id, WireType::Varint);
            writer.int32(n);
            Ok(())
        }
        ResolvedKind::Message(_) => {
            let inner = match value {
                Value::Message(Some(inner)) => inner,
                _ => return Err(EncodeError::not_representable(name, "message field has no assigned value")),
            };
            writer.tag(id, WireType::LengthDelimited);
            writer.fork();
            recurse(inner, writer)?;
            writer.ldelim();
            Ok(())
        }
    }
}

fn write_packed_element(name: &str, resolved: ResolvedKind, value: &Value, writer: &mut Writer) -> Result<(), EncodeError> {
    match resolved {
        ResolvedKind::Scalar(scalar) => write_scalar_wire(name, scalar, value, writer),
        ResolvedKind::Enum(_) => {
            writer.int32(as_enum_number(name, value)?);
            Ok(())
        }
        ResolvedKind::Message(_) => unreachable!("message-typed fields are never packable"),
    }
}

fn as_enum_number(name: &str, value: &Value) -> Result<i32, EncodeError> {
    match value {
        Value::EnumNumber(n) => Ok(*n),
        _ => Err(EncodeError::not_representable(name, "enum field does not hold an enum number")),
    }
}

fn write_scalar_wire(name: &str, scalar: ScalarType, value: &Value, writer: &mut Writer) -> Result<(), EncodeError> {
    match (scalar, value) {
        (ScalarType::Double, Value::F64(v)) => {
            writer.double(*v);
        }
        (ScalarType::Float, Value::F32(v)) => {
            writer.float(*v);
        }
        (ScalarType::Int32, Value::I32(v)) => {
            writer.int32(*v);
        }
        (ScalarType::Sint32, Value::I32(v)) => {
            writer.sint32(*v);
        }
        (ScalarType::Sfixed32, Value::I32(v)) => {
            writer.sfixed32(*v);
        }
        (ScalarType::Int64, Value::I64(v)) => {
            writer.int64(*v);
        }
        (ScalarType::Sint64, Value::I64(v)) => {
            writer.sint64(*v);
        }
        (ScalarType::Sfixed64, Value::I64(v)) => {
            writer.sfixed64(*v);
        }
        (ScalarType::Uint32, Value::U32(v)) => {
            writer.uint32(*v);
        }
        (ScalarType::Fixed32, Value::U32(v)) => {
            writer.fixed32(*v);
        }
        (ScalarType::Uint64, Value::U64(v)) => {
            writer.uint64(*v);
        }
        (ScalarType::Fixed64, Value::U64(v)) => {
            writer.fixed64(*v);
        }
        (ScalarType::Bool, Value::Bool(v)) => {
            writer.bool(*v);
        }
        (ScalarType::String, Value::String(v)) => {
            writer.string(v);
        }
        (ScalarType::Bytes, Value::Bytes(v)) => {
            writer.bytes(v);
        }
        _ => return Err(EncodeError::not_representable(name, "stored value does not match its scalar kind")),
    }
    Ok(())
}

fn write_map_key(name: &str, key_type: ScalarType, key: &MapKey, writer: &mut Writer) -> Result<(), EncodeError> {
    match (key_type, key) {
        (ScalarType::Bool, MapKey::Bool(v)) => {
            writer.bool(*v);
        }
        (ScalarType::Int32, MapKey::I32(v)) => {
            writer.int32(*v);
        }
        (ScalarType::Sint32, MapKey::I32(v)) => {
            writer.sint32(*v);
        }
        (ScalarType::Sfixed32, MapKey::I32(v)) => {
            writer.sfixed32(*v);
        }
        (ScalarType::Int64, MapKey::I64(v)) => {
            writer.int64(*v);
        }
        (ScalarType::Sint64, MapKey::I64(v)) => {
            writer.sint64(*v);
        }
        (ScalarType::Sfixed64, MapKey::I64(v)) => {
            writer.sfixed64(*v);
        }
        (ScalarType::Uint32, MapKey::U32(v)) => {
            writer.uint32(*v);
        }
        (ScalarType::Fixed32, MapKey::U32(v)) => {
            writer.fixed32(*v);
        }
        (ScalarType::Uint64, MapKey::U64(v)) => {
            writer.uint64(*v);
        }
        (ScalarType::Fixed64, MapKey::U64(v)) => {
            writer.fixed64(*v);
        }
        (ScalarType::String, MapKey::String(v)) => {
            writer.string(v);
        }
        _ => return Err(EncodeError::not_representable(name, "map key does not match its declared key type")),
    }
    Ok(())
}

fn is_default(plan: &FieldPlan, schema: &SealedSchema, value: &Value) -> bool {
    match plan.resolved {
        ResolvedKind::Scalar(scalar) => scalar_equals_default(scalar, value),
        ResolvedKind::Enum(idx) => matches!(
            value,
            Value::EnumNumber(n) if *n == EnumType(schema.clone(), idx).default_value()
        ),
        ResolvedKind::Message(_) => false,
    }
}

fn scalar_equals_default(scalar: ScalarType, value: &Value) -> bool {
    match (scalar, value) {
        (ScalarType::Double, Value::F64(v)) => *v == 0.0,
        (ScalarType::Float, Value::F32(v)) => *v == 0.0,
        (ScalarType::Int32 | ScalarType::Sint32 | ScalarType::Sfixed32, Value::I32(v)) => *v == 0,
        (ScalarType::Int64 | ScalarType::Sint64 | ScalarType::Sfixed64, Value::I64(v)) => *v == 0,
        (ScalarType::Uint32 | ScalarType::Fixed32, Value::U32(v)) => *v == 0,
        (ScalarType::Uint64 | ScalarType::Fixed64, Value::U64(v)) => *v == 0,
        (ScalarType::Bool, Value::Bool(v)) => !*v,
        (ScalarType::String, Value::String(v)) => v.is_empty(),
        (ScalarType::Bytes, Value::Bytes(v)) => v.is_empty(),
        _ => false,
    }
}

fn materialize_default(plan: &FieldPlan, schema: &SealedSchema) -> Value {
    match plan.resolved {
        ResolvedKind::Scalar(scalar) => default_scalar(scalar),
        ResolvedKind::Enum(idx) => Value::EnumNumber(EnumType(schema.clone(), idx).default_value()),
        ResolvedKind::Message(idx) => Value::Message(Some(Box::new(Instance::new(MessageType(schema.clone(), idx))))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldKindDecl, FieldSpec, ParentId, RootMember, Rule as SchemaRule, Schema};

    fn message(schema: &mut Schema, name: &str) -> crate::schema::MessageIndex {
        schema.add_message(ParentId::Root, name).unwrap()
    }

    fn sealed_message(schema: Schema, name: &str) -> MessageType {
        let sealed = schema.seal().unwrap();
        match sealed.get(name).unwrap() {
            RootMember::Message(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn s1_simple_scalar() {
        let mut schema = Schema::new();
        let m = message(&mut schema, "M");
        let a = schema.new_field(FieldSpec::new("a", 1, FieldKindDecl::Scalar(ScalarType::Int32), SchemaRule::Required));
        schema.message_add_field(m, a).unwrap();
        let b = schema.new_field(FieldSpec::new("b", 2, FieldKindDecl::Scalar(ScalarType::String), SchemaRule::Optional));
        schema.message_add_field(m, b).unwrap();
        let ty = sealed_message(schema, "M");

        let mut inst = Instance::new(ty);
        inst.set("a", Some(Value::I32(150))).unwrap();
        inst.set("b", Some(Value::String(String::new()))).unwrap();

        assert_eq!(&encode(&inst).unwrap()[..], b"\x08\x96\x01");
        assert_eq!(&encode_specialized(&inst).unwrap()[..], b"\x08\x96\x01");
    }

    #[test]
    fn s2_oneof_exclusivity_bytes() {
        let mut schema = Schema::new();
        let m = message(&mut schema, "M");
        let p = schema.new_field(FieldSpec::new("p", 1, FieldKindDecl::Scalar(ScalarType::Int32), SchemaRule::Optional));
        let q = schema.new_field(FieldSpec::new("q", 2, FieldKindDecl::Scalar(ScalarType::String), SchemaRule::Optional));
        let oneof = schema.new_oneof("x");
        schema.oneof_add_field(oneof, p).unwrap();
        schema.oneof_add_field(oneof, q).unwrap();
        schema.message_add_oneof(m, oneof).unwrap();
        let ty = sealed_message(schema, "M");

        let mut inst = Instance::new(ty);
        inst.set("p", Some(Value::I32(5))).unwrap();
        inst.set("q", Some(Value::String("hi".to_string()))).unwrap();

        assert_eq!(&encode(&inst).unwrap()[..], b"\x12\x02\x68\x69");
        assert_eq!(&encode_specialized(&inst).unwrap()[..], b"\x12\x02\x68\x69");
    }

    #[test]
    fn s3_packed_repeated() {
        let mut schema = Schema::new();
        let m = message(&mut schema, "M");
        let mut spec = FieldSpec::new("xs", 3, FieldKindDecl::Scalar(ScalarType::Int32), SchemaRule::Repeated);
        spec.packed = true;
        let xs = schema.new_field(spec);
        schema.message_add_field(m, xs).unwrap();
        let ty = sealed_message(schema, "M");

        let mut inst = Instance::new(ty);
        inst.set("xs", Some(Value::List(vec![Value::I32(1), Value::I32(2), Value::I32(150)])))
            .unwrap();

        assert_eq!(&encode(&inst).unwrap()[..], b"\x1a\x04\x01\x02\x96\x01");
        assert_eq!(&encode_specialized(&inst).unwrap()[..], b"\x1a\x04\x01\x02\x96\x01");
    }

    #[test]
    fn s4_map() {
        let mut schema = Schema::new();
        let m = message(&mut schema, "M");
        let mut spec = FieldSpec::new("m", 7, FieldKindDecl::Scalar(ScalarType::Int32), SchemaRule::Optional);
        spec.map = true;
        spec.key_type = Some(ScalarType::String);
        let field = schema.new_field(spec);
        schema.message_add_field(m, field).unwrap();
        let ty = sealed_message(schema, "M");

        let mut inst = Instance::new(ty);
        inst.set(
            "m",
            Some(Value::Map(vec![(MapKey::String("a".to_string()), Value::I32(1))])),
        )
        .unwrap();

        assert_eq!(&encode(&inst).unwrap()[..], b"\x3a\x05\x0a\x01\x61\x10\x01");
        assert_eq!(&encode_specialized(&inst).unwrap()[..], b"\x3a\x05\x0a\x01\x61\x10\x01");
    }

    #[test]
    fn required_message_field_emits_empty_submessage_when_unset() {
        let mut schema = Schema::new();
        let inner = message(&mut schema, "Inner");
        let outer = message(&mut schema, "Outer");
        let f = schema.new_field(FieldSpec::new(
            "inner",
            1,
            FieldKindDecl::Named("Inner".to_string()),
            SchemaRule::Required,
        ));
        schema.message_add_field(outer, f).unwrap();
        let _ = inner;
        let ty = sealed_message(schema, "Outer");

        let inst = Instance::new(ty);
        assert_eq!(&encode(&inst).unwrap()[..], b"\x0a\x00");
    }

    #[test]
    fn explicit_default_submessage_still_encodes() {
        let mut schema = Schema::new();
        let inner = message(&mut schema, "Inner");
        let outer = message(&mut schema, "Outer");
        let f = schema.new_field(FieldSpec::new(
            "inner",
            1,
            FieldKindDecl::Named("Inner".to_string()),
            SchemaRule::Optional,
        ));
        schema.message_add_field(outer, f).unwrap();
        let sealed = schema.seal().unwrap();
        let inner_ty = match sealed.get("Inner").unwrap() {
            RootMember::Message(m) => m,
            _ => unreachable!(),
        };
        let outer_ty = match sealed.get("Outer").unwrap() {
            RootMember::Message(m) => m,
            _ => unreachable!(),
        };
        let _ = inner;

        let mut inst = Instance::new(outer_ty);
        inst.set("inner", Some(Value::Message(Some(Box::new(Instance::new(inner_ty))))))
            .unwrap();
        assert_eq!(&encode(&inst).unwrap()[..], b"\x0a\x00");

        let mut unset = Instance::new(inst.ty().clone());
        unset.set("inner", None).unwrap();
        assert_eq!(&encode(&unset).unwrap()[..], b"");
    }
}
