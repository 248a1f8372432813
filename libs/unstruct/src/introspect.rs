use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use crate::cache::{TypeCache, TypeEntry};
use crate::shape::{DeclaredField, Kind, TypeIdentity, TypeShape};
use crate::tag::FieldTag;

/// One promoted field of a record.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldEntry {
    name: String,
    path: Vec<usize>,
    omit_empty: bool,
    field_type: TypeIdentity,
}

impl FieldEntry {
    pub fn new(
        name: impl Into<String>,
        path: Vec<usize>,
        omit_empty: bool,
        field_type: TypeIdentity,
    ) -> Self {
        Self {
            name: name.into(),
            path,
            omit_empty,
            field_type,
        }
    }

    /// Output name in the unstructured mapping.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declaration positions from the record root to the field. Longer than
    /// one element when the field was promoted through inlined records.
    pub fn path(&self) -> &[usize] {
        &self.path
    }

    pub fn is_omit_empty(&self) -> bool {
        self.omit_empty
    }

    pub fn field_type(&self) -> TypeIdentity {
        self.field_type
    }

    /// Metadata of the field's own type, looked up on demand so that
    /// self-referential records never recurse while their entry is built.
    pub fn nested_entry(&self, cache: &TypeCache) -> Arc<TypeEntry> {
        cache.entry_for(self.field_type)
    }
}

/// Promoted field list of a record, in both lookup forms.
#[derive(Debug, Default)]
pub(crate) struct Introspected {
    pub ordered: Vec<Arc<FieldEntry>>,
    pub by_name: HashMap<String, Arc<FieldEntry>>,
}

/// Compute the ordered, promoted field list of a record type.
///
/// On a name collision the later declaration wins: it replaces the earlier
/// entry in the map and the earlier entry is dropped from the ordered list,
/// so both forms always hold the same fields.
pub(crate) fn introspect(identity: TypeIdentity, shape: &TypeShape) -> Introspected {
    let mut collected = Vec::new();
    let mut chain = vec![identity.id()];
    collect(identity, &shape.fields, &[], &mut chain, &mut collected);

    let mut result = Introspected::default();
    for field in collected {
        let field = Arc::new(field);
        if let Some(previous) = result
            .by_name
            .insert(field.name.clone(), Arc::clone(&field))
        {
            tracing::warn!(
                type_name = identity.name(),
                field = %field.name,
                "field name collision, later declaration wins"
            );
            result.ordered.retain(|f| !Arc::ptr_eq(f, &previous));
        }
        result.ordered.push(field);
    }
    result
}

fn collect(
    owner: TypeIdentity,
    fields: &[DeclaredField],
    prefix: &[usize],
    chain: &mut Vec<TypeId>,
    out: &mut Vec<FieldEntry>,
) {
    for (position, declared) in fields.iter().enumerate() {
        if declared.is_ignored() {
            continue;
        }
        let tag = FieldTag::parse_opt(declared.tag);

        let mut path = prefix.to_vec();
        path.push(position);

        if tag.inline {
            // Non-record inline targets contribute nothing.
            let Some((target, shape)) = inline_target(declared.ty) else {
                continue;
            };
            if chain.contains(&target.id()) {
                tracing::warn!(
                    type_name = owner.name(),
                    field = declared.name,
                    inlined = target.name(),
                    "inline cycle, field not promoted"
                );
                continue;
            }
            chain.push(target.id());
            collect(target, &shape.fields, &path, chain, out);
            chain.pop();
            continue;
        }

        out.push(FieldEntry {
            name: tag.output_name(declared.name).to_string(),
            path,
            omit_empty: tag.omit_empty,
            field_type: declared.ty,
        });
    }
}

/// Follow pointer-like wrappers down to a record.
fn inline_target(ty: TypeIdentity) -> Option<(TypeIdentity, TypeShape)> {
    let mut current = ty;
    loop {
        let shape = current.shape();
        match shape.kind {
            Kind::Record => return Some((current, shape)),
            Kind::Pointer => current = shape.elem?,
            _ => return None,
        }
    }
}
