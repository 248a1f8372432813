use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use crate::hook::{self, HookSet};
use crate::introspect::{self, FieldEntry};
use crate::reflect::Reflect;
use crate::shape::{Kind, TypeIdentity};

/// Cached metadata of one type. Immutable once published.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeEntry {
    identity: TypeIdentity,
    kind: Kind,
    hooks: HookSet,
    struct_fields: HashMap<String, Arc<FieldEntry>>,
    ordered_fields: Vec<Arc<FieldEntry>>,
}

impl TypeEntry {
    /// Build the entry of `identity` from its static shape.
    fn build(identity: TypeIdentity) -> Self {
        let shape = identity.shape();
        let hooks = hook::detect(&shape.capabilities);
        let fields = if shape.kind == Kind::Record {
            introspect::introspect(identity, &shape)
        } else {
            Default::default()
        };

        Self {
            identity,
            kind: shape.kind,
            hooks,
            struct_fields: fields.by_name,
            ordered_fields: fields.ordered,
        }
    }

    pub fn identity(&self) -> TypeIdentity {
        self.identity
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn hooks(&self) -> HookSet {
        self.hooks
    }

    /// True when a hook takes over conversion from structural introspection.
    pub fn has_custom_conversion(&self) -> bool {
        !self.hooks.is_empty()
    }

    /// Promoted fields in declaration order. Empty for non-record types.
    pub fn fields(&self) -> &[Arc<FieldEntry>] {
        &self.ordered_fields
    }

    /// Promoted field by output name.
    pub fn field(&self, name: &str) -> Option<&FieldEntry> {
        self.struct_fields.get(name).map(|f| &**f)
    }

    pub fn struct_fields(&self) -> &HashMap<String, Arc<FieldEntry>> {
        &self.struct_fields
    }
}

/// Store of type metadata keyed by type identity.
///
/// Entries are computed outside the lock and inserted whole, so a reader
/// sees either no entry or a complete one. Racing misses on the same type
/// compute equal entries; the last insert wins.
#[derive(Debug, Default)]
pub struct TypeCache {
    entries: RwLock<HashMap<TypeId, Arc<TypeEntry>>>,
}

static GLOBAL: OnceLock<TypeCache> = OnceLock::new();

impl TypeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide cache.
    pub fn global() -> &'static TypeCache {
        GLOBAL.get_or_init(TypeCache::new)
    }

    /// Metadata of `identity`, built and published on first use.
    pub fn entry_for(&self, identity: TypeIdentity) -> Arc<TypeEntry> {
        if let Some(entry) = self.lookup(identity.id()) {
            return entry;
        }

        let entry = Arc::new(TypeEntry::build(identity));
        tracing::debug!(
            type_name = identity.name(),
            kind = ?entry.kind,
            fields = entry.ordered_fields.len(),
            hooks = ?entry.hooks,
            "type entry published"
        );

        // Entries hold no state that a panicking writer could have left half
        // updated, so a poisoned lock is still usable.
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(identity.id(), Arc::clone(&entry));
        entry
    }

    pub fn entry_of<T: Reflect>(&self) -> Arc<TypeEntry> {
        self.entry_for(TypeIdentity::of::<T>())
    }

    /// Number of published entries.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, id: TypeId) -> Option<Arc<TypeEntry>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }
}

/// Metadata of `T` from the process-wide cache.
pub fn entry_of<T: Reflect>() -> Arc<TypeEntry> {
    TypeCache::global().entry_of::<T>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::{Slot, View};
    use crate::shape::{DeclaredField, TypeShape};

    struct Node {
        label: String,
        children: Vec<Node>,
        parent: Option<Box<Node>>,
    }

    impl Reflect for Node {
        fn shape() -> TypeShape {
            TypeShape::record(vec![
                DeclaredField::new::<String>("label", None, true),
                DeclaredField::new::<Vec<Node>>("children", Some("children,omitempty"), true),
                DeclaredField::new::<Option<Box<Node>>>("parent", None, true),
            ])
        }

        fn view(&self) -> View<'_> {
            View::Record(vec![
                Slot::Shared(&self.label),
                Slot::Shared(&self.children),
                Slot::Shared(&self.parent),
            ])
        }
    }

    #[test]
    fn minimal_entry_for_scalars() {
        let cache = TypeCache::new();
        let entry = cache.entry_of::<i32>();
        assert_eq!(entry.kind(), Kind::Int);
        assert!(entry.fields().is_empty());
        assert!(entry.struct_fields().is_empty());
        assert!(!entry.has_custom_conversion());
    }

    #[test]
    fn self_referential_record_resolves_lazily() {
        let cache = TypeCache::new();
        let entry = cache.entry_of::<Node>();
        // Only the record itself is published; field types wait for use.
        assert_eq!(cache.len(), 1);

        let parent = entry.field("parent").unwrap();
        let nested = parent.nested_entry(&cache);
        assert_eq!(nested.kind(), Kind::Pointer);
        assert_eq!(nested.identity(), TypeIdentity::of::<Option<Box<Node>>>());
        assert_eq!(cache.len(), 2);

        let children = entry.field("children").unwrap();
        assert!(children.is_omit_empty());
        assert_eq!(children.nested_entry(&cache).kind(), Kind::Sequence);
    }

    #[test]
    fn repeated_requests_hit_the_same_entry() {
        let cache = TypeCache::new();
        let first = cache.entry_of::<Node>();
        let second = cache.entry_of::<Node>();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn concurrent_requests_agree() {
        let cache = TypeCache::new();
        let entries: Vec<Arc<TypeEntry>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| cache.entry_of::<Node>()))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .collect()
        });

        for entry in &entries {
            assert_eq!(**entry, *entries[0]);
        }
        assert_eq!(cache.len(), 1);
        assert_eq!(*cache.entry_of::<Node>(), *entries[0]);
    }
}
