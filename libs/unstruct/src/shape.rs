use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::reflect::{Opaque, Reflect};

/// Runtime category of a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Bool,
    /// Signed integer of any width.
    Int,
    /// Unsigned integer of any width.
    Uint,
    Float,
    String,
    /// Opaque byte buffer (encoded as base64 text).
    Bytes,
    /// Pointer-like: `Option<T>`, `Box<T>`, `Rc<T>`, `Arc<T>`.
    Pointer,
    /// Type-erased value (`Box<dyn Reflect>`).
    Dynamic,
    Sequence,
    Mapping,
    /// Struct with named fields.
    Record,
    /// Function pointers. No conversion rule.
    Callable,
    /// Channel endpoints. No conversion rule.
    Channel,
}

/// Conversion hook a type declares conformance to.
///
/// `*Mut` variants are only callable through exclusive access (the
/// reference-receiver form); the others through any borrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    ToUnstructured,
    ToUnstructuredMut,
    MarshalJson,
    MarshalJsonMut,
}

/// Stable identifier of a concrete type; the metadata cache key.
///
/// Equality and hashing only look at the `TypeId`. The name and the shape
/// function ride along so that the cache can build an entry from the
/// identity alone.
#[derive(Clone, Copy)]
pub struct TypeIdentity {
    id: TypeId,
    name: &'static str,
    shape: fn() -> TypeShape,
}

impl TypeIdentity {
    pub fn of<T: Reflect>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            shape: T::shape,
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Compute the static shape of the type.
    pub fn shape(&self) -> TypeShape {
        (self.shape)()
    }
}

impl PartialEq for TypeIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeIdentity {}

impl Hash for TypeIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// One field of a record as written in the type declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct DeclaredField {
    /// Declared field name.
    pub name: &'static str,
    /// Raw serialization tag, e.g. `"f1,omitempty"`, `",inline"`, `"-"`.
    pub tag: Option<&'static str>,
    /// Whether the field is externally visible (`pub` in any form).
    pub visible: bool,
    pub ty: TypeIdentity,
}

impl DeclaredField {
    pub fn new<T: Reflect>(name: &'static str, tag: Option<&'static str>, visible: bool) -> Self {
        Self {
            name,
            tag,
            visible,
            ty: TypeIdentity::of::<T>(),
        }
    }

    /// Field the converter never reads (private or skipped). Its type does
    /// not need to implement `Reflect`; the declaration position is kept.
    pub fn opaque(name: &'static str, tag: Option<&'static str>, visible: bool) -> Self {
        Self {
            name,
            tag,
            visible,
            ty: TypeIdentity::of::<Opaque>(),
        }
    }

    /// True when the field can never be promoted into the output.
    pub fn is_ignored(&self) -> bool {
        !self.visible || self.tag == Some("-")
    }
}

/// Static description of a type, produced ahead of time (derive or
/// hand-written `Reflect` impl) in place of runtime reflection.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeShape {
    pub kind: Kind,
    /// Pointee / element / map value type.
    pub elem: Option<TypeIdentity>,
    /// Declared fields in declaration order. Empty unless `kind` is `Record`.
    pub fields: Vec<DeclaredField>,
    pub capabilities: Vec<Capability>,
}

impl TypeShape {
    pub fn scalar(kind: Kind) -> Self {
        Self {
            kind,
            elem: None,
            fields: Vec::new(),
            capabilities: Vec::new(),
        }
    }

    pub fn pointer<T: Reflect>() -> Self {
        Self::wrapping::<T>(Kind::Pointer)
    }

    pub fn sequence<T: Reflect>() -> Self {
        Self::wrapping::<T>(Kind::Sequence)
    }

    pub fn mapping<V: Reflect>() -> Self {
        Self::wrapping::<V>(Kind::Mapping)
    }

    pub fn record(fields: Vec<DeclaredField>) -> Self {
        Self {
            kind: Kind::Record,
            elem: None,
            fields,
            capabilities: Vec::new(),
        }
    }

    fn wrapping<T: Reflect>(kind: Kind) -> Self {
        Self {
            kind,
            elem: Some(TypeIdentity::of::<T>()),
            fields: Vec::new(),
            capabilities: Vec::new(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: &[Capability]) -> Self {
        self.capabilities.extend_from_slice(capabilities);
        self
    }
}
