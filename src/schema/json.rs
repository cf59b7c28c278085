//! Schema input and introspection in the JSON description format named in
//! the external interfaces: each message carries its fields (by name →
//! `{id, type, rule, options}`), oneofs (by name → list of field names),
//! nested types and enums.
//!
//! Declaration order matters (`fieldsArray` emission order is part of the
//! wire contract), so this module reads and writes through
//! `serde_json::Map`, relying on the crate's `preserve_order` feature
//! rather than an alphabetized `BTreeMap`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use super::{
    ChildRef, EnumIndex, EnumType, FieldKindDecl, FieldSpec, MessageIndex, MessageType, OptionValue, ParentId, Rule,
    Schema,
};
use crate::error::Error;
use crate::wire::ScalarType;

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
enum JsonOptionValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

#[derive(Debug, Deserialize)]
struct JsonField {
    id: u32,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    rule: Option<String>,
    #[serde(default)]
    packed: bool,
    #[serde(default)]
    map: bool,
    #[serde(default, rename = "keyType")]
    key_type: Option<String>,
    #[serde(default)]
    options: HashMap<String, JsonOptionValue>,
}

#[derive(Debug, Deserialize)]
struct JsonOneof {
    oneof: Vec<String>,
    #[serde(default)]
    options: HashMap<String, JsonOptionValue>,
}

#[derive(Debug, Deserialize)]
struct JsonEnum {
    values: Map<String, Json>,
    #[serde(default)]
    options: HashMap<String, JsonOptionValue>,
}

#[derive(Debug, Deserialize)]
struct JsonMessage {
    #[serde(default)]
    fields: Map<String, Json>,
    #[serde(default)]
    oneofs: Map<String, Json>,
    #[serde(default)]
    nested: Map<String, Json>,
    #[serde(default)]
    options: HashMap<String, JsonOptionValue>,
}

fn convert_options(options: &HashMap<String, JsonOptionValue>) -> HashMap<String, OptionValue> {
    options
        .iter()
        .map(|(k, v)| {
            let converted = match v {
                JsonOptionValue::Bool(b) => OptionValue::Bool(*b),
                JsonOptionValue::Int(i) => OptionValue::Int(*i),
                JsonOptionValue::Float(f) => OptionValue::Float(*f),
                JsonOptionValue::String(s) => OptionValue::String(s.clone()),
            };
            (k.clone(), converted)
        })
        .collect()
}

fn parse_error(what: &str, name: &str, source: serde_json::Error) -> Error {
    Error::type_error(format!("invalid {} '{}': {}", what, name, source))
}

/// Loads one message (and, recursively, its nested types/enums) from its
/// JSON description and attaches it under `parent`.
pub fn load_message(schema: &mut Schema, parent: ParentId, name: &str, json: &Json) -> Result<MessageIndex, Error> {
    let obj: JsonMessage = serde_json::from_value(json.clone()).map_err(|e| parse_error("message", name, e))?;
    let idx = schema.add_message(parent, name)?;

    let mut field_indices = HashMap::new();
    for (field_name, field_json) in obj.fields.iter() {
        let jf: JsonField =
            serde_json::from_value(field_json.clone()).map_err(|e| parse_error("field", field_name, e))?;
        let rule = match jf.rule.as_deref() {
            Some("required") => Rule::Required,
            Some("repeated") => Rule::Repeated,
            None | Some("optional") => Rule::Optional,
            Some(other) => return Err(Error::type_error(format!("field '{}': unknown rule '{}'", field_name, other))),
        };
        let kind = match ScalarType::parse(&jf.kind) {
            Some(scalar) => FieldKindDecl::Scalar(scalar),
            None => FieldKindDecl::Named(jf.kind.clone()),
        };
        let mut spec = FieldSpec::new(field_name.clone(), jf.id, kind, rule);
        spec.packed = jf.packed;
        spec.map = jf.map;
        spec.key_type = jf.key_type.as_deref().and_then(ScalarType::parse);
        spec.options = convert_options(&jf.options);
        let field_idx = schema.new_field(spec);
        schema.message_add_field(idx, field_idx)?;
        field_indices.insert(field_name.clone(), field_idx);
    }

    for (oneof_name, oneof_json) in obj.oneofs.iter() {
        let jo: JsonOneof =
            serde_json::from_value(oneof_json.clone()).map_err(|e| parse_error("oneof", oneof_name, e))?;
        let oneof_idx = schema.new_oneof(oneof_name.clone());
        for member in &jo.oneof {
            let field_idx = field_indices
                .get(member)
                .copied()
                .ok_or_else(|| Error::not_found(oneof_name.clone(), member))?;
            schema.oneof_add_field(oneof_idx, field_idx)?;
        }
        schema.message_add_oneof(idx, oneof_idx)?;
        schema.set_options(ChildRef::Oneof(oneof_idx), convert_options(&jo.options));
    }

    for (child_name, child_json) in obj.nested.iter() {
        if child_json.get("values").is_some() {
            load_enum(schema, ParentId::Message(idx), child_name, child_json)?;
        } else {
            load_message(schema, ParentId::Message(idx), child_name, child_json)?;
        }
    }

    schema.set_options(ChildRef::Message(idx), convert_options(&obj.options));
    Ok(idx)
}

/// Loads one enum from its JSON description and attaches it under `parent`.
pub fn load_enum(schema: &mut Schema, parent: ParentId, name: &str, json: &Json) -> Result<EnumIndex, Error> {
    let obj: JsonEnum = serde_json::from_value(json.clone()).map_err(|e| parse_error("enum", name, e))?;
    let mut values = Vec::with_capacity(obj.values.len());
    for (value_name, value_json) in obj.values.iter() {
        let n = value_json
            .as_i64()
            .ok_or_else(|| Error::type_error(format!("enum '{}' value '{}' must be an integer", name, value_name)))?;
        values.push((value_name.clone(), n as i32));
    }
    let idx = schema.add_enum(parent, name, values)?;
    schema.set_options(ChildRef::Enum(idx), convert_options(&obj.options));
    Ok(idx)
}

/// Loads a top-level schema document: an object whose own keys are
/// top-level message/enum names, same shape as a message's `nested` map.
pub fn load_schema(json: &Json) -> Result<Schema, Error> {
    let mut schema = Schema::new();
    let root = json
        .as_object()
        .ok_or_else(|| Error::type_error("schema document must be a JSON object"))?;
    for (name, child) in root.iter() {
        if child.get("values").is_some() {
            load_enum(&mut schema, ParentId::Root, name, child)?;
        } else {
            load_message(&mut schema, ParentId::Root, name, child)?;
        }
    }
    Ok(schema)
}

fn option_value_to_json(value: &OptionValue) -> Json {
    match value {
        OptionValue::Bool(b) => Json::Bool(*b),
        OptionValue::Int(i) => Json::Number((*i).into()),
        OptionValue::Float(f) => serde_json::Number::from_f64(*f).map(Json::Number).unwrap_or(Json::Null),
        OptionValue::String(s) => Json::String(s.clone()),
    }
}

fn options_to_json(options: &HashMap<String, OptionValue>) -> Json {
    let mut map = Map::new();
    for (k, v) in options {
        map.insert(k.clone(), option_value_to_json(v));
    }
    Json::Object(map)
}

/// Renders one message type back to the JSON description format.
pub fn message_to_json(message: &MessageType) -> Json {
    let mut fields = Map::new();
    for field in message.fields() {
        let mut f = Map::new();
        f.insert(
            "id".to_string(),
            Json::Number(serde_json::Number::from(field.id())),
        );
        let kind_name = match field.kind() {
            FieldKindDecl::Scalar(scalar) => scalar.name().to_string(),
            FieldKindDecl::Named(name) => name.clone(),
        };
        f.insert("type".to_string(), Json::String(kind_name));
        match field.rule() {
            Rule::Required => {
                f.insert("rule".to_string(), Json::String("required".to_string()));
            }
            Rule::Repeated => {
                f.insert("rule".to_string(), Json::String("repeated".to_string()));
            }
            Rule::Optional => {}
        }
        if field.packed() {
            f.insert("packed".to_string(), Json::Bool(true));
        }
        if field.is_map() {
            f.insert("map".to_string(), Json::Bool(true));
            if let Some(key) = field.key_type() {
                f.insert("keyType".to_string(), Json::String(key.name().to_string()));
            }
        }
        if !field.options().is_empty() {
            f.insert("options".to_string(), options_to_json(field.options()));
        }
        fields.insert(field.name().to_string(), Json::Object(f));
    }

    let mut oneofs = Map::new();
    for oneof in message.oneofs() {
        let mut o = Map::new();
        o.insert(
            "oneof".to_string(),
            Json::Array(oneof.declared_names().iter().cloned().map(Json::String).collect()),
        );
        if !oneof.options().is_empty() {
            o.insert("options".to_string(), options_to_json(oneof.options()));
        }
        oneofs.insert(oneof.name().to_string(), Json::Object(o));
    }

    let mut nested = Map::new();
    for nested_message in message.nested_messages() {
        nested.insert(nested_message.name().to_string(), message_to_json(&nested_message));
    }
    for nested_enum in message.nested_enums() {
        nested.insert(nested_enum.name().to_string(), enum_to_json(&nested_enum));
    }

    let mut top = Map::new();
    if !fields.is_empty() {
        top.insert("fields".to_string(), Json::Object(fields));
    }
    if !oneofs.is_empty() {
        top.insert("oneofs".to_string(), Json::Object(oneofs));
    }
    if !nested.is_empty() {
        top.insert("nested".to_string(), Json::Object(nested));
    }
    if !message.options().is_empty() {
        top.insert("options".to_string(), options_to_json(message.options()));
    }
    Json::Object(top)
}

/// Renders one enum type back to the JSON description format.
pub fn enum_to_json(e: &EnumType) -> Json {
    let mut values = Map::new();
    for (name, value) in e.values() {
        values.insert(name.clone(), Json::Number(serde_json::Number::from(*value)));
    }
    let mut top = Map::new();
    top.insert("values".to_string(), Json::Object(values));
    if !e.options().is_empty() {
        top.insert("options".to_string(), options_to_json(e.options()));
    }
    Json::Object(top)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::RootMember;

    fn doc() -> Json {
        serde_json::json!({
            "Color": {
                "values": { "RED": 0, "GREEN": 1 }
            },
            "Shape": {
                "fields": {
                    "id": { "id": 1, "type": "int32", "rule": "required" },
                    "color": { "id": 2, "type": "Color" },
                    "tags": { "id": 3, "type": "string", "rule": "repeated" },
                    "label": { "id": 4, "type": "string" },
                    "count": { "id": 5, "type": "int32" }
                },
                "oneofs": {
                    "extra": { "oneof": ["label", "count"] }
                }
            }
        })
    }

    #[test]
    fn load_schema_builds_messages_and_enums() {
        let schema = load_schema(&doc()).unwrap();
        let sealed = schema.seal().unwrap();
        let shape = match sealed.get("Shape").unwrap() {
            RootMember::Message(m) => m,
            _ => panic!("expected message"),
        };
        assert_eq!(shape.get_field("id").unwrap().rule(), Rule::Required);
        assert_eq!(shape.get_field("tags").unwrap().rule(), Rule::Repeated);
        let color_field = shape.get_field("color").unwrap();
        assert!(color_field.resolved_enum().is_some());
    }

    #[test]
    fn unknown_oneof_member_is_rejected() {
        let doc = serde_json::json!({
            "Shape": {
                "fields": {
                    "id": { "id": 1, "type": "int32" }
                },
                "oneofs": {
                    "extra": { "oneof": ["id", "typo"] }
                }
            }
        });
        let err = load_schema(&doc).unwrap_err();
        assert!(err.to_string().contains("typo"));
    }

    #[test]
    fn message_to_json_round_trips_field_shape() {
        let schema = load_schema(&doc()).unwrap();
        let sealed = schema.seal().unwrap();
        let shape = match sealed.get("Shape").unwrap() {
            RootMember::Message(m) => m,
            _ => panic!("expected message"),
        };
        let rendered = message_to_json(&shape);
        let fields = rendered.get("fields").unwrap().as_object().unwrap();
        assert_eq!(fields["id"]["rule"], Json::String("required".to_string()));
        assert_eq!(fields["tags"]["rule"], Json::String("repeated".to_string()));
        assert!(fields["color"].get("rule").is_none());
    }
}
