//! The read-only, reference-counted view of a schema graph produced by
//! [`Schema::seal`](super::Schema::seal), and the descriptor handle types
//! (`MessageType`, `FieldDescriptor`, `OneofDescriptor`, `EnumType`) that
//! borrow from it — mirroring how the teacher crate builds descriptor
//! handles as `(FileDescriptor, index)` pairs over an `Arc`-shared inner.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use super::build::resolve_field;
use super::plan::{self, FieldPlan};
use super::{
    ChildRef, EnumData, EnumIndex, FieldData, FieldIndex, FieldKindDecl, MessageIndex,
    MessageTypeData, OneofData, OneofIndex, OptionValue, ParentId, ResolvedKind, Rule, Schema,
};
use crate::error::Error;
use crate::wire::ScalarType;

#[derive(Debug)]
pub(crate) struct SealedMessage {
    pub(crate) data: MessageTypeData,
    pub(crate) specialized: OnceCell<Vec<FieldPlan>>,
}

#[derive(Debug)]
pub(crate) struct SealedInner {
    pub(crate) messages: Vec<SealedMessage>,
    pub(crate) enums: Vec<EnumData>,
    pub(crate) oneofs: Vec<OneofData>,
    pub(crate) fields: Vec<FieldData>,
    pub(crate) root: HashMap<String, ChildRef>,
}

/// An immutable, `Arc`-shared schema graph with every field resolved.
///
/// Cloning is a reference-count bump. There is deliberately no API to
/// mutate a `SealedSchema` — the type itself is the "seal" guarantee the
/// distilled spec describes as an optional defensive flag.
#[derive(Debug, Clone)]
pub struct SealedSchema(Arc<SealedInner>);

pub(crate) fn seal(mut schema: Schema) -> Result<SealedSchema, Vec<Error>> {
    let mut errors = Vec::new();
    let resolutions: Vec<Option<(ResolvedKind, bool)>> = (0..schema.fields.len())
        .map(|i| match resolve_field(&schema, FieldIndex(i as u32)) {
            Ok(r) => Some(r),
            Err(e) => {
                errors.push(e);
                None
            }
        })
        .collect();
    if !errors.is_empty() {
        tracing::debug!(count = errors.len(), "schema seal failed: unresolved field types");
        return Err(errors);
    }
    for (i, resolution) in resolutions.into_iter().enumerate() {
        let (resolved, long) = resolution.expect("all resolutions succeeded");
        schema.fields[i].resolved = Some(resolved);
        schema.fields[i].long = long;
    }
    let messages = schema
        .messages
        .into_iter()
        .map(|data| SealedMessage {
            data,
            specialized: OnceCell::new(),
        })
        .collect();
    tracing::debug!(messages = messages.len(), "schema sealed");
    Ok(SealedSchema(Arc::new(SealedInner {
        messages,
        enums: schema.enums,
        oneofs: schema.oneofs,
        fields: schema.fields,
        root: schema.root,
    })))
}

impl SealedSchema {
    pub(crate) fn inner(&self) -> &SealedInner {
        &self.0
    }

    /// Direct lookup of a top-level message or enum by name.
    pub fn get(&self, name: &str) -> Option<RootMember> {
        match self.0.root.get(name)? {
            ChildRef::Message(idx) => Some(RootMember::Message(MessageType(self.clone(), *idx))),
            ChildRef::Enum(idx) => Some(RootMember::Enum(EnumType(self.clone(), *idx))),
            _ => None,
        }
    }

    /// All top-level message types, in declaration order.
    pub fn messages(&self) -> impl Iterator<Item = MessageType> + '_ {
        (0..self.0.messages.len())
            .map(MessageIndex::from_usize)
            .filter(move |idx| self.0.messages[idx.get()].data.parent == ParentId::Root)
            .map(move |idx| MessageType(self.clone(), idx))
    }
}

impl MessageIndex {
    fn from_usize(i: usize) -> Self {
        MessageIndex(i as u32)
    }
}

/// Either a message or an enum found at the schema root.
#[derive(Debug, Clone)]
pub enum RootMember {
    Message(MessageType),
    Enum(EnumType),
}

/// A schema member reached through [`MessageType::get`].
#[derive(Debug, Clone)]
pub enum Member {
    Field(FieldDescriptor),
    Oneof(OneofDescriptor),
    Message(MessageType),
    Enum(EnumType),
}

macro_rules! descriptor_handle {
    ($name:ident, $index:ty) => {
        #[derive(Debug, Clone)]
        pub struct $name(pub(crate) SealedSchema, pub(crate) $index);

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                Arc::ptr_eq(&self.0 .0, &other.0 .0) && self.1 == other.1
            }
        }
        impl Eq for $name {}

        impl $name {
            pub fn schema(&self) -> &SealedSchema {
                &self.0
            }
        }
    };
}

descriptor_handle!(MessageType, MessageIndex);
descriptor_handle!(FieldDescriptor, FieldIndex);
descriptor_handle!(OneofDescriptor, OneofIndex);
descriptor_handle!(EnumType, EnumIndex);

fn full_name_of(schema: &SealedSchema, name: &str, parent: ParentId) -> String {
    match parent {
        ParentId::Root => name.to_string(),
        ParentId::Message(idx) => {
            let parent_type = MessageType(schema.clone(), idx);
            format!("{}.{}", parent_type.full_name(), name)
        }
    }
}

impl MessageType {
    fn data(&self) -> &MessageTypeData {
        &self.0.inner().messages[self.1.get()].data
    }

    pub fn name(&self) -> &str {
        &self.data().name
    }

    pub fn full_name(&self) -> String {
        full_name_of(&self.0, &self.data().name, self.data().parent)
    }

    pub fn options(&self) -> &HashMap<String, OptionValue> {
        &self.data().options
    }

    /// Fields in declaration order (`fieldsArray`), including fields
    /// promoted out of an attached oneof.
    pub fn fields(&self) -> impl Iterator<Item = FieldDescriptor> + '_ {
        self.data()
            .fields
            .iter()
            .map(move |&idx| FieldDescriptor(self.0.clone(), idx))
    }

    pub fn oneofs(&self) -> impl Iterator<Item = OneofDescriptor> + '_ {
        self.data()
            .oneofs
            .iter()
            .map(move |&idx| OneofDescriptor(self.0.clone(), idx))
    }

    pub fn nested_messages(&self) -> impl Iterator<Item = MessageType> + '_ {
        self.data()
            .nested_messages
            .iter()
            .map(move |&idx| MessageType(self.0.clone(), idx))
    }

    pub fn nested_enums(&self) -> impl Iterator<Item = EnumType> + '_ {
        self.data()
            .nested_enums
            .iter()
            .map(move |&idx| EnumType(self.0.clone(), idx))
    }

    pub fn get_field(&self, name: &str) -> Option<FieldDescriptor> {
        match self.data().children.get(name)? {
            ChildRef::Field(idx) => Some(FieldDescriptor(self.0.clone(), *idx)),
            _ => None,
        }
    }

    pub fn get_oneof(&self, name: &str) -> Option<OneofDescriptor> {
        match self.data().children.get(name)? {
            ChildRef::Oneof(idx) => Some(OneofDescriptor(self.0.clone(), *idx)),
            _ => None,
        }
    }

    /// Direct namespace lookup, spanning fields, oneofs, nested messages and
    /// nested enums together (one namespace per message, per §4.1a).
    pub fn get(&self, name: &str) -> Option<Member> {
        Some(match self.data().children.get(name)? {
            ChildRef::Field(idx) => Member::Field(FieldDescriptor(self.0.clone(), *idx)),
            ChildRef::Oneof(idx) => Member::Oneof(OneofDescriptor(self.0.clone(), *idx)),
            ChildRef::Message(idx) => Member::Message(MessageType(self.0.clone(), *idx)),
            ChildRef::Enum(idx) => Member::Enum(EnumType(self.0.clone(), *idx)),
        })
    }

    /// The precomputed field-plan cache backing the specialized encoder
    /// path (§4.4a), built lazily on first use and reused thereafter.
    pub(crate) fn specialized(&self) -> &[FieldPlan] {
        self.0.inner().messages[self.1.get()]
            .specialized
            .get_or_init(|| plan::build(&self.0, self.1))
    }
}

impl FieldDescriptor {
    fn data(&self) -> &FieldData {
        &self.0.inner().fields[self.1.get()]
    }

    /// This field's arena index, for building a one-off [`FieldPlan`]
    /// (`schema::field_plan`) without going through `MessageType::specialized`.
    pub(crate) fn index(&self) -> FieldIndex {
        self.1
    }

    pub fn name(&self) -> &str {
        &self.data().name
    }

    pub fn id(&self) -> u32 {
        self.data().id
    }

    pub fn rule(&self) -> Rule {
        self.data().rule
    }

    pub fn packed(&self) -> bool {
        self.data().packed
    }

    pub fn is_map(&self) -> bool {
        self.data().map
    }

    pub fn key_type(&self) -> Option<ScalarType> {
        self.data().key_type
    }

    pub fn kind(&self) -> &FieldKindDecl {
        &self.data().kind
    }

    /// The field's resolved kind. Panics if the schema was not sealed
    /// successfully — unreachable through the public API, since
    /// `FieldDescriptor` only exists over a `SealedSchema`.
    pub fn resolved(&self) -> ResolvedKind {
        self.data().resolved.expect("field resolved during seal")
    }

    pub fn is_long(&self) -> bool {
        self.data().long
    }

    pub fn is_required(&self) -> bool {
        matches!(self.data().rule, Rule::Required)
    }

    pub fn part_of(&self) -> Option<OneofDescriptor> {
        self.data().part_of.map(|idx| OneofDescriptor(self.0.clone(), idx))
    }

    pub fn parent(&self) -> Option<MessageType> {
        self.data().parent.map(|idx| MessageType(self.0.clone(), idx))
    }

    pub fn options(&self) -> &HashMap<String, OptionValue> {
        &self.data().options
    }

    pub fn resolved_message(&self) -> Option<MessageType> {
        self.resolved().as_message().map(|idx| MessageType(self.0.clone(), idx))
    }

    pub fn resolved_enum(&self) -> Option<EnumType> {
        self.resolved().as_enum().map(|idx| EnumType(self.0.clone(), idx))
    }
}

impl OneofDescriptor {
    fn data(&self) -> &OneofData {
        &self.0.inner().oneofs[self.1.get()]
    }

    pub fn name(&self) -> &str {
        &self.data().name
    }

    pub fn parent(&self) -> Option<MessageType> {
        self.data().parent.map(|idx| MessageType(self.0.clone(), idx))
    }

    pub fn declared_names(&self) -> &[String] {
        &self.data().declared_names
    }

    pub fn fields(&self) -> impl Iterator<Item = FieldDescriptor> + '_ {
        self.data()
            .owned
            .iter()
            .map(move |&idx| FieldDescriptor(self.0.clone(), idx))
    }

    pub fn options(&self) -> &HashMap<String, OptionValue> {
        &self.data().options
    }
}

impl EnumType {
    fn data(&self) -> &EnumData {
        &self.0.inner().enums[self.1.get()]
    }

    pub fn name(&self) -> &str {
        &self.data().name
    }

    pub fn full_name(&self) -> String {
        full_name_of(&self.0, &self.data().name, self.data().parent)
    }

    pub fn values(&self) -> &[(String, i32)] {
        &self.data().values
    }

    pub fn default_value(&self) -> i32 {
        self.data().default_value()
    }

    pub fn value_by_name(&self, name: &str) -> Option<i32> {
        self.data().values.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    pub fn options(&self) -> &HashMap<String, OptionValue> {
        &self.data().options
    }
}
