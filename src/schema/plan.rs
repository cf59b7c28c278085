//! The specialized encoder's field plan: this crate's substitute for the
//! runtime code generation the distilled spec describes, per §4.4a.
//!
//! A [`FieldPlan`] captures everything the reflective encoder recomputes
//! from the schema on every call — wire type, packed/strict flags, resolved
//! nested type — so the specialized path can walk a flat `Vec<FieldPlan>`
//! instead of re-deriving dispatch information per field per encode.

use super::{FieldData, FieldIndex, MessageIndex, ResolvedKind, Rule, SealedSchema};
use crate::wire::ScalarType;

#[derive(Debug, Clone)]
pub struct FieldPlan {
    pub field: FieldIndex,
    pub name: String,
    pub id: u32,
    pub rule: Rule,
    pub packed: bool,
    pub map: bool,
    pub key_type: Option<ScalarType>,
    pub resolved: ResolvedKind,
    /// True when default-elision for this (non-repeated, non-map) field
    /// must compare by identity rather than by value: message-typed fields,
    /// and 64-bit integer ("long") kinds per §4.3.
    pub strict: bool,
}

fn plan_for(data: &FieldData, field: FieldIndex) -> FieldPlan {
    let resolved = data.resolved.expect("field plan built from an unresolved schema");
    FieldPlan {
        field,
        name: data.name.clone(),
        id: data.id,
        rule: data.rule,
        packed: data.packed,
        map: data.map,
        key_type: data.key_type,
        resolved,
        strict: data.long || matches!(resolved, ResolvedKind::Message(_)),
    }
}

/// Builds the full, cached field plan for every field of `message`, in
/// `fieldsArray` order — the specialized path's one-time setup cost.
pub(crate) fn build(sealed: &SealedSchema, message: MessageIndex) -> Vec<FieldPlan> {
    let inner = sealed.inner();
    inner.messages[message.get()]
        .data
        .fields
        .iter()
        .map(|&field| plan_for(&inner.fields[field.get()], field))
        .collect()
}

/// Builds a single field's plan on demand, uncached — what the reflective
/// path recomputes on every call per §4.3.
pub(crate) fn for_field(sealed: &SealedSchema, field: FieldIndex) -> FieldPlan {
    plan_for(&sealed.inner().fields[field.get()], field)
}
