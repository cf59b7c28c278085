//! Field resolution: binding a field's named type reference to the actual
//! message or enum node the name points to, and deriving the flags
//! (`long`) that fall out of the resolved kind.

use super::{FieldIndex, FieldKindDecl, ParentId, ResolvedKind, Schema};
use crate::error::Error;

/// Resolves `field` against its enclosing message's scope.
///
/// Idempotent: a field whose kind is already a [`FieldKindDecl::Scalar`]
/// resolves to that scalar unconditionally; a named field is looked up each
/// call, so calling this twice on the same schema produces the same result.
pub(crate) fn resolve_field(schema: &Schema, field: FieldIndex) -> Result<(ResolvedKind, bool), Error> {
    let data = &schema.fields[field.get()];
    if data.map && data.key_type.is_none() {
        return Err(Error::type_error(format!(
            "field '{}' is declared map but carries no key type",
            data.name
        )));
    }
    let resolved = match &data.kind {
        FieldKindDecl::Scalar(scalar) => ResolvedKind::Scalar(*scalar),
        FieldKindDecl::Named(name) => {
            let parent = data
                .parent
                .map(ParentId::Message)
                .ok_or_else(|| Error::resolve(&data.name, name))?;
            match schema.lookup(parent, name) {
                Some(super::ChildRef::Message(idx)) => ResolvedKind::Message(idx),
                Some(super::ChildRef::Enum(idx)) => ResolvedKind::Enum(idx),
                _ => return Err(Error::resolve(&data.name, name)),
            }
        }
    };
    let long = matches!(resolved, ResolvedKind::Scalar(s) if s.is_long());
    Ok((resolved, long))
}
