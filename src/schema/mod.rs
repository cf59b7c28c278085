//! The mutable schema graph: messages, fields, oneofs and enums linked by
//! arena indices rather than pointers, plus the namespace operations
//! (`add`/`remove`/`get`/`lookup`) that mirror how a reflection-based schema
//! builder grows and reshapes a type graph before it is sealed.
//!
//! Nothing here is `Rc<RefCell<_>>`: every parent/child edge is a `u32`
//! index into one of the four arenas owned by [`Schema`], so the
//! field→oneof→message→field cycle the data model describes at the
//! conceptual level never exists as an actual reference cycle.

mod build;
pub mod json;
mod plan;
mod sealed;

pub use plan::FieldPlan;
pub use sealed::{EnumType, FieldDescriptor, Member, MessageType, OneofDescriptor, RootMember, SealedSchema};

use std::collections::HashMap;

use crate::error::Error;
use crate::wire::ScalarType;

macro_rules! arena_index {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) u32);

        impl $name {
            pub(crate) fn get(self) -> usize {
                self.0 as usize
            }
        }
    };
}

arena_index!(MessageIndex);
arena_index!(EnumIndex);
arena_index!(OneofIndex);
arena_index!(FieldIndex);

/// A parent scope: either the schema root (top-level messages/enums) or a
/// message acting as a nested namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParentId {
    Root,
    Message(MessageIndex),
}

/// What a name inside a namespace refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChildRef {
    Message(MessageIndex),
    Enum(EnumIndex),
    Field(FieldIndex),
    Oneof(OneofIndex),
}

/// An option value attached to a schema node, parsed verbatim from the JSON
/// schema's `options` object. The core never interprets these.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Optional,
    Required,
    Repeated,
}

/// A field's declared type, before resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKindDecl {
    Scalar(ScalarType),
    Named(String),
}

/// A field's type, after resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedKind {
    Scalar(ScalarType),
    Enum(EnumIndex),
    Message(MessageIndex),
}

impl ResolvedKind {
    pub fn as_message(self) -> Option<MessageIndex> {
        match self {
            ResolvedKind::Message(idx) => Some(idx),
            _ => None,
        }
    }

    pub fn as_enum(self) -> Option<EnumIndex> {
        match self {
            ResolvedKind::Enum(idx) => Some(idx),
            _ => None,
        }
    }
}

/// Everything needed to construct a detached field with [`Schema::new_field`].
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub id: u32,
    pub kind: FieldKindDecl,
    pub rule: Rule,
    pub packed: bool,
    pub map: bool,
    pub key_type: Option<ScalarType>,
    pub options: HashMap<String, OptionValue>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, id: u32, kind: FieldKindDecl, rule: Rule) -> Self {
        FieldSpec {
            name: name.into(),
            id,
            kind,
            rule,
            packed: false,
            map: false,
            key_type: None,
            options: HashMap::new(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct FieldData {
    pub name: String,
    pub id: u32,
    pub kind: FieldKindDecl,
    pub rule: Rule,
    pub packed: bool,
    pub map: bool,
    pub key_type: Option<ScalarType>,
    pub options: HashMap<String, OptionValue>,
    pub resolved: Option<ResolvedKind>,
    pub long: bool,
    pub part_of: Option<OneofIndex>,
    pub parent: Option<MessageIndex>,
}

#[derive(Debug)]
pub(crate) struct OneofData {
    pub name: String,
    pub parent: Option<MessageIndex>,
    /// Ordered names the oneof claims, including names not yet materialized
    /// as owned fields.
    pub declared_names: Vec<String>,
    /// Fields added to this oneof directly via [`Schema::oneof_add_field`].
    pub owned: Vec<FieldIndex>,
    pub options: HashMap<String, OptionValue>,
}

#[derive(Debug)]
pub(crate) struct EnumData {
    pub name: String,
    pub parent: ParentId,
    pub values: Vec<(String, i32)>,
    pub options: HashMap<String, OptionValue>,
}

impl EnumData {
    pub(crate) fn default_value(&self) -> i32 {
        self.values.first().map(|(_, v)| *v).unwrap_or(0)
    }
}

#[derive(Debug)]
pub(crate) struct MessageTypeData {
    pub name: String,
    pub parent: ParentId,
    pub children: HashMap<String, ChildRef>,
    /// Declaration order of this message's own fields, including fields
    /// promoted out of an attached oneof. This is `fieldsArray` once the
    /// schema is sealed.
    pub fields: Vec<FieldIndex>,
    pub oneofs: Vec<OneofIndex>,
    pub nested_messages: Vec<MessageIndex>,
    pub nested_enums: Vec<EnumIndex>,
    pub options: HashMap<String, OptionValue>,
}

/// The mutable schema graph builder.
///
/// Every mutation goes through a namespace operation (`add_message`,
/// `message_add_field`, `oneof_add_field`, ...) that enforces name
/// uniqueness and keeps parent/child indices consistent. Call [`Schema::seal`]
/// once construction is finished to obtain a [`SealedSchema`].
#[derive(Debug, Default)]
pub struct Schema {
    pub(crate) messages: Vec<MessageTypeData>,
    pub(crate) enums: Vec<EnumData>,
    pub(crate) oneofs: Vec<OneofData>,
    pub(crate) fields: Vec<FieldData>,
    pub(crate) root: HashMap<String, ChildRef>,
}

impl Schema {
    pub fn new() -> Self {
        Schema::default()
    }

    fn namespace(&self, parent: ParentId) -> &HashMap<String, ChildRef> {
        match parent {
            ParentId::Root => &self.root,
            ParentId::Message(idx) => &self.messages[idx.get()].children,
        }
    }

    fn namespace_mut(&mut self, parent: ParentId) -> &mut HashMap<String, ChildRef> {
        match parent {
            ParentId::Root => &mut self.root,
            ParentId::Message(idx) => &mut self.messages[idx.get()].children,
        }
    }

    fn parent_label(&self, parent: ParentId) -> String {
        match parent {
            ParentId::Root => "<root>".to_string(),
            ParentId::Message(idx) => self.messages[idx.get()].name.clone(),
        }
    }

    /// Creates a message type and attaches it under `parent` immediately.
    pub fn add_message(&mut self, parent: ParentId, name: impl Into<String>) -> Result<MessageIndex, Error> {
        let name = name.into();
        validate_name(&name)?;
        if self.namespace(parent).contains_key(&name) {
            return Err(Error::duplicate_name(self.parent_label(parent), &name));
        }
        let idx = MessageIndex(self.messages.len() as u32);
        self.messages.push(MessageTypeData {
            name: name.clone(),
            parent,
            children: HashMap::new(),
            fields: Vec::new(),
            oneofs: Vec::new(),
            nested_messages: Vec::new(),
            nested_enums: Vec::new(),
            options: HashMap::new(),
        });
        self.namespace_mut(parent).insert(name.clone(), ChildRef::Message(idx));
        if let ParentId::Message(parent_idx) = parent {
            self.messages[parent_idx.get()].nested_messages.push(idx);
        }
        tracing::trace!(name = %name, parent = %self.parent_label(parent), "message added");
        Ok(idx)
    }

    /// Creates an enum type and attaches it under `parent` immediately.
    pub fn add_enum(
        &mut self,
        parent: ParentId,
        name: impl Into<String>,
        values: Vec<(String, i32)>,
    ) -> Result<EnumIndex, Error> {
        let name = name.into();
        validate_name(&name)?;
        if self.namespace(parent).contains_key(&name) {
            return Err(Error::duplicate_name(self.parent_label(parent), &name));
        }
        let mut seen = std::collections::HashSet::new();
        for (value_name, _) in &values {
            if !seen.insert(value_name.as_str()) {
                return Err(Error::duplicate_name(&name, value_name));
            }
        }
        let idx = EnumIndex(self.enums.len() as u32);
        self.enums.push(EnumData {
            name: name.clone(),
            parent,
            values,
            options: HashMap::new(),
        });
        self.namespace_mut(parent).insert(name, ChildRef::Enum(idx));
        if let ParentId::Message(parent_idx) = parent {
            self.messages[parent_idx.get()].nested_enums.push(idx);
        }
        Ok(idx)
    }

    /// Creates a detached field: not yet a child of any message or oneof.
    pub fn new_field(&mut self, spec: FieldSpec) -> FieldIndex {
        let idx = FieldIndex(self.fields.len() as u32);
        self.fields.push(FieldData {
            name: spec.name,
            id: spec.id,
            kind: spec.kind,
            rule: spec.rule,
            packed: spec.packed,
            map: spec.map,
            key_type: spec.key_type,
            options: spec.options,
            resolved: None,
            long: false,
            part_of: None,
            parent: None,
        });
        idx
    }

    /// Creates a detached oneof: not yet attached to any message.
    pub fn new_oneof(&mut self, name: impl Into<String>) -> OneofIndex {
        let idx = OneofIndex(self.oneofs.len() as u32);
        self.oneofs.push(OneofData {
            name: name.into(),
            parent: None,
            declared_names: Vec::new(),
            owned: Vec::new(),
            options: HashMap::new(),
        });
        idx
    }

    /// Namespace `add(child)` for a field being attached directly to a
    /// message (not via a oneof). Detaches the field from any previous
    /// parent first.
    pub fn message_add_field(&mut self, message: MessageIndex, field: FieldIndex) -> Result<(), Error> {
        if let Some(old) = self.fields[field.get()].parent {
            self.detach_field_from_message(old, field);
        }
        self.attach_field_to_message(message, field)
    }

    /// Namespace `remove(child)` for a field owned directly by a message.
    pub fn message_remove_field(&mut self, message: MessageIndex, field: FieldIndex) -> Result<(), Error> {
        if self.fields[field.get()].parent != Some(message) {
            return Err(Error::not_found(self.messages[message.get()].name.clone(), &self.fields[field.get()].name));
        }
        self.detach_field_from_message(message, field);
        Ok(())
    }

    /// `OneOf.add(field)`: claims `field` for this oneof, promoting it into
    /// the oneof's parent message immediately if the oneof is already
    /// attached.
    pub fn oneof_add_field(&mut self, oneof: OneofIndex, field: FieldIndex) -> Result<(), Error> {
        if let Some(old) = self.fields[field.get()].parent {
            self.detach_field_from_message(old, field);
        }
        let name = self.fields[field.get()].name.clone();
        {
            let data = &mut self.oneofs[oneof.get()];
            data.owned.push(field);
            if !data.declared_names.contains(&name) {
                data.declared_names.push(name);
            }
        }
        self.fields[field.get()].part_of = Some(oneof);
        if let Some(message) = self.oneofs[oneof.get()].parent {
            self.attach_field_to_message(message, field)?;
        }
        Ok(())
    }

    /// `OneOf.remove(field)`: releases `field` from this oneof, detaching it
    /// from its message parent if it had been promoted there.
    pub fn oneof_remove_field(&mut self, oneof: OneofIndex, field: FieldIndex) -> Result<(), Error> {
        let data = &mut self.oneofs[oneof.get()];
        let pos = data
            .owned
            .iter()
            .position(|f| *f == field)
            .ok_or_else(|| Error::not_found(&data.name, "<field not owned>"))?;
        data.owned.remove(pos);
        let name = self.fields[field.get()].name.clone();
        data.declared_names.retain(|n| n != &name);
        if let Some(message) = self.fields[field.get()].parent {
            self.detach_field_from_message(message, field);
        }
        self.fields[field.get()].part_of = None;
        Ok(())
    }

    /// Namespace `add(child)` for a oneof being attached to a message, plus
    /// `OneOf.onAdd`: promotes every currently-owned field lacking a parent.
    pub fn message_add_oneof(&mut self, message: MessageIndex, oneof: OneofIndex) -> Result<(), Error> {
        let name = self.oneofs[oneof.get()].name.clone();
        if self.messages[message.get()].children.contains_key(&name) {
            return Err(Error::duplicate_name(&self.messages[message.get()].name, &name));
        }
        self.oneofs[oneof.get()].parent = Some(message);
        self.messages[message.get()].oneofs.push(oneof);
        self.messages[message.get()]
            .children
            .insert(name, ChildRef::Oneof(oneof));
        let owned = self.oneofs[oneof.get()].owned.clone();
        for field in owned {
            if self.fields[field.get()].parent.is_none() {
                self.attach_field_to_message(message, field)?;
            }
        }
        Ok(())
    }

    /// `OneOf.onRemove`: detaches every owned field from `message` first,
    /// then removes the oneof itself from the message's namespace.
    pub fn message_remove_oneof(&mut self, message: MessageIndex, oneof: OneofIndex) -> Result<(), Error> {
        if self.oneofs[oneof.get()].parent != Some(message) {
            return Err(Error::not_found(&self.messages[message.get()].name, &self.oneofs[oneof.get()].name));
        }
        let owned = self.oneofs[oneof.get()].owned.clone();
        for field in owned {
            if self.fields[field.get()].parent == Some(message) {
                self.detach_field_from_message(message, field);
            }
        }
        let name = self.oneofs[oneof.get()].name.clone();
        self.messages[message.get()].oneofs.retain(|o| *o != oneof);
        self.messages[message.get()].children.remove(&name);
        self.oneofs[oneof.get()].parent = None;
        Ok(())
    }

    fn attach_field_to_message(&mut self, message: MessageIndex, field: FieldIndex) -> Result<(), Error> {
        let name = self.fields[field.get()].name.clone();
        let id = self.fields[field.get()].id;
        if self.messages[message.get()].children.contains_key(&name) {
            return Err(Error::duplicate_name(&self.messages[message.get()].name, &name));
        }
        for existing in &self.messages[message.get()].fields {
            if self.fields[existing.get()].id == id {
                return Err(Error::duplicate_name(
                    format!("{}'s field ids", self.messages[message.get()].name),
                    id.to_string(),
                ));
            }
        }
        self.messages[message.get()].fields.push(field);
        self.messages[message.get()]
            .children
            .insert(name.clone(), ChildRef::Field(field));
        self.fields[field.get()].parent = Some(message);
        tracing::trace!(field = %name, message = %self.messages[message.get()].name, "field attached");
        Ok(())
    }

    fn detach_field_from_message(&mut self, message: MessageIndex, field: FieldIndex) {
        let name = self.fields[field.get()].name.clone();
        self.messages[message.get()].fields.retain(|f| *f != field);
        self.messages[message.get()].children.remove(&name);
        self.fields[field.get()].parent = None;
        tracing::trace!(field = %name, message = %self.messages[message.get()].name, "field detached");
    }

    /// Direct child lookup in `parent`'s namespace.
    pub fn get(&self, parent: ParentId, name: &str) -> Option<ChildRef> {
        self.namespace(parent).get(name).copied()
    }

    /// Dotted-path lookup: the first segment walks upward from `from` toward
    /// the root; remaining segments walk downward as direct child lookups.
    pub fn lookup(&self, from: ParentId, path: &str) -> Option<ChildRef> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut found = self.lookup_upward(from, first)?;
        for seg in segments {
            found = self.get_child(found, seg)?;
        }
        Some(found)
    }

    fn lookup_upward(&self, from: ParentId, name: &str) -> Option<ChildRef> {
        let mut current = from;
        loop {
            if let Some(r) = self.namespace(current).get(name) {
                return Some(*r);
            }
            match current {
                ParentId::Root => return None,
                ParentId::Message(idx) => current = self.messages[idx.get()].parent,
            }
        }
    }

    fn get_child(&self, parent: ChildRef, name: &str) -> Option<ChildRef> {
        match parent {
            ChildRef::Message(idx) => self.messages[idx.get()].children.get(name).copied(),
            _ => None,
        }
    }

    /// Sets the option map of an already-attached schema node, replacing
    /// whatever was there before.
    pub fn set_options(&mut self, target: ChildRef, options: HashMap<String, OptionValue>) {
        match target {
            ChildRef::Message(idx) => self.messages[idx.get()].options = options,
            ChildRef::Enum(idx) => self.enums[idx.get()].options = options,
            ChildRef::Field(idx) => self.fields[idx.get()].options = options,
            ChildRef::Oneof(idx) => self.oneofs[idx.get()].options = options,
        }
    }

    /// Resolves every field in the graph, collecting every error rather
    /// than stopping at the first, then memoizes `fieldsArray` and wraps the
    /// graph in an `Arc` to produce a [`SealedSchema`].
    pub fn seal(self) -> Result<SealedSchema, Vec<Error>> {
        sealed::seal(self)
    }
}

/// Builds one field's dispatch plan without caching — what the reflective
/// encoder recomputes from the schema on every call, per §4.3.
pub(crate) fn field_plan(sealed: &SealedSchema, field: FieldIndex) -> FieldPlan {
    plan::for_field(sealed, field)
}

fn validate_name(name: &str) -> Result<(), Error> {
    if name.is_empty() {
        return Err(Error::invalid_name(name, "name must not be empty"));
    }
    if name.contains('.') {
        return Err(Error::invalid_name(name, "name must not contain '.'"));
    }
    if matches!(name, "self" | "super" | "crate" | "Self") {
        return Err(Error::invalid_name(name, "name collides with a reserved identifier"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int32_field(name: &str, id: u32) -> FieldSpec {
        FieldSpec::new(name, id, FieldKindDecl::Scalar(ScalarType::Int32), Rule::Optional)
    }

    #[test]
    fn duplicate_message_name_rejected() {
        let mut schema = Schema::new();
        schema.add_message(ParentId::Root, "M").unwrap();
        let err = schema.add_message(ParentId::Root, "M").unwrap_err();
        assert!(err.to_string().contains("already has a child named"));
    }

    #[test]
    fn duplicate_field_id_within_message_rejected() {
        let mut schema = Schema::new();
        let m = schema.add_message(ParentId::Root, "M").unwrap();
        let a = schema.new_field(int32_field("a", 1));
        let b = schema.new_field(int32_field("b", 1));
        schema.message_add_field(m, a).unwrap();
        let err = schema.message_add_field(m, b).unwrap_err();
        assert!(err.to_string().contains("field ids"));
    }

    #[test]
    fn invalid_names_rejected() {
        let mut schema = Schema::new();
        assert!(schema.add_message(ParentId::Root, "").is_err());
        assert!(schema.add_message(ParentId::Root, "a.b").is_err());
        assert!(schema.add_message(ParentId::Root, "self").is_err());
    }

    #[test]
    fn lookup_walks_upward_then_downward() {
        let mut schema = Schema::new();
        let outer = schema.add_message(ParentId::Root, "Outer").unwrap();
        let inner = schema.add_message(ParentId::Message(outer), "Inner").unwrap();
        let sibling = schema.add_message(ParentId::Message(outer), "Sibling").unwrap();

        // From inside `Inner`, "Sibling" is found by walking up to `Outer`.
        let found = schema.lookup(ParentId::Message(inner), "Sibling").unwrap();
        assert_eq!(found, ChildRef::Message(sibling));

        // A dotted path resolves the first segment upward, the rest downward.
        let a = schema.new_field(int32_field("a", 1));
        schema.message_add_field(sibling, a).unwrap();
        let found = schema.lookup(ParentId::Message(inner), "Sibling.a").unwrap();
        assert_eq!(found, ChildRef::Field(a));
    }

    /// S5: a field added to a oneof before the oneof has a message parent is
    /// promoted into the message, retaining `part_of`, once the oneof is
    /// attached; removing the oneof clears `parent` but not `part_of`.
    #[test]
    fn oneof_lifecycle_promotes_and_retracts_fields() {
        let mut schema = Schema::new();
        let m = schema.add_message(ParentId::Root, "M").unwrap();
        let oneof = schema.new_oneof("choice");
        let a = schema.new_field(int32_field("a", 1));
        let b = schema.new_field(int32_field("b", 2));

        schema.oneof_add_field(oneof, a).unwrap();
        schema.oneof_add_field(oneof, b).unwrap();
        assert!(schema.fields[a.get()].parent.is_none());
        assert!(schema.fields[b.get()].parent.is_none());
        assert_eq!(schema.fields[a.get()].part_of, Some(oneof));

        schema.message_add_oneof(m, oneof).unwrap();
        assert_eq!(schema.fields[a.get()].parent, Some(m));
        assert_eq!(schema.fields[b.get()].parent, Some(m));
        assert_eq!(schema.fields[a.get()].part_of, Some(oneof));
        assert_eq!(schema.messages[m.get()].fields, vec![a, b]);

        schema.message_remove_oneof(m, oneof).unwrap();
        assert!(schema.fields[a.get()].parent.is_none());
        assert_eq!(schema.fields[a.get()].part_of, Some(oneof));
        assert!(schema.messages[m.get()].oneofs.is_empty());
    }

    #[test]
    fn oneof_add_field_after_attachment_promotes_immediately() {
        let mut schema = Schema::new();
        let m = schema.add_message(ParentId::Root, "M").unwrap();
        let oneof = schema.new_oneof("choice");
        schema.message_add_oneof(m, oneof).unwrap();

        let a = schema.new_field(int32_field("a", 1));
        schema.oneof_add_field(oneof, a).unwrap();
        assert_eq!(schema.fields[a.get()].parent, Some(m));
    }

    /// S6: one field with an unresolvable named type fails to seal while an
    /// unrelated, well-formed field in the same message still resolves.
    #[test]
    fn seal_collects_all_resolve_errors() {
        let mut schema = Schema::new();
        let m = schema.add_message(ParentId::Root, "M").unwrap();
        let ok = schema.new_field(int32_field("ok", 1));
        let bad = schema.new_field(FieldSpec::new(
            "bad",
            2,
            FieldKindDecl::Named("DoesNotExist".to_string()),
            Rule::Optional,
        ));
        schema.message_add_field(m, ok).unwrap();
        schema.message_add_field(m, bad).unwrap();

        let errors = schema.seal().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("DoesNotExist"));
    }

    #[test]
    fn seal_rejects_map_field_without_key_type() {
        let mut schema = Schema::new();
        let m = schema.add_message(ParentId::Root, "M").unwrap();
        let mut spec = int32_field("m", 1);
        spec.map = true;
        let field = schema.new_field(spec);
        schema.message_add_field(m, field).unwrap();

        let errors = schema.seal().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("no key type"));
    }

    #[test]
    fn seal_resolves_named_message_and_enum_fields() {
        let mut schema = Schema::new();
        let target = schema.add_message(ParentId::Root, "Target").unwrap();
        let color = schema.add_enum(ParentId::Root, "Color", vec![("RED".to_string(), 0)]).unwrap();
        let m = schema.add_message(ParentId::Root, "M").unwrap();
        let msg_field = schema.new_field(FieldSpec::new(
            "t",
            1,
            FieldKindDecl::Named("Target".to_string()),
            Rule::Optional,
        ));
        let enum_field = schema.new_field(FieldSpec::new(
            "c",
            2,
            FieldKindDecl::Named("Color".to_string()),
            Rule::Optional,
        ));
        schema.message_add_field(m, msg_field).unwrap();
        schema.message_add_field(m, enum_field).unwrap();

        let sealed = schema.seal().unwrap();
        let ty = match sealed.get("M").unwrap() {
            RootMember::Message(ty) => ty,
            _ => panic!("expected message"),
        };
        let t = ty.get_field("t").unwrap();
        let c = ty.get_field("c").unwrap();
        assert_eq!(t.resolved_message().unwrap(), MessageType(sealed.clone(), target));
        assert_eq!(c.resolved_enum().unwrap(), EnumType(sealed.clone(), color));
    }
}
