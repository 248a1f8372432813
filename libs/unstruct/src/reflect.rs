use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::rc::Rc;
use std::sync::mpsc::{Receiver, Sender, SyncSender};
use std::sync::Arc;

use crate::error::HookError;
use crate::hook::{Hook, HookOutput, ToUnstructured};
use crate::shape::{Capability, Kind, TypeIdentity, TypeShape};
use crate::value::Value;

/// Dynamic identity of a value. Implemented for every `Reflect` type.
///
/// Kept separate from `Reflect` so that `dyn Reflect` reports the identity
/// of the concrete type behind it.
pub trait Identify {
    fn identity(&self) -> TypeIdentity;
}

impl<T: Reflect> Identify for T {
    fn identity(&self) -> TypeIdentity {
        TypeIdentity::of::<T>()
    }
}

/// A type the converter can walk.
///
/// Usually derived (`#[derive(Reflect)]`) for records; implemented here for
/// the standard library types.
pub trait Reflect: Identify + 'static {
    /// Static description of the type. Only consulted on a cache miss.
    fn shape() -> TypeShape
    where
        Self: Sized;

    /// Structural view through a shared borrow (non-addressable).
    fn view(&self) -> View<'_>;

    /// Structural view through exclusive access (addressable). Children are
    /// handed out as exclusive slots where the container allows it.
    fn view_mut(&mut self) -> View<'_> {
        self.view()
    }

    /// Zero value test used by `omitempty`. Types whose zero value has no
    /// structural view (the dynamic value trees) override this.
    fn is_zero(&self) -> bool {
        self.view().is_zero()
    }

    /// Invoke a hook declared with a shared receiver.
    fn invoke(&self, _hook: Hook) -> Option<Result<HookOutput, HookError>> {
        None
    }

    /// Invoke a hook declared with an exclusive receiver.
    fn invoke_mut(&mut self, _hook: Hook) -> Option<Result<HookOutput, HookError>> {
        None
    }

    /// Owned copy the converter can call exclusive-receiver hooks on when it
    /// only holds a shared borrow.
    fn addressable_copy(&self) -> Option<Box<dyn Reflect>> {
        None
    }
}

/// Borrowed access to a value, remembering whether it is addressable.
pub enum Slot<'a> {
    Shared(&'a dyn Reflect),
    Exclusive(&'a mut (dyn Reflect + 'static)),
}

impl<'a> Slot<'a> {
    pub fn as_dyn(&self) -> &dyn Reflect {
        match self {
            Slot::Shared(v) => *v,
            Slot::Exclusive(v) => &**v,
        }
    }

    /// Placeholder for a field the converter never reads.
    pub fn opaque() -> Slot<'static> {
        Slot::Shared(&Opaque)
    }

    pub fn identity(&self) -> TypeIdentity {
        self.as_dyn().identity()
    }

    pub fn is_addressable(&self) -> bool {
        matches!(self, Slot::Exclusive(_))
    }

    /// Shorter-lived slot with the same access mode.
    pub fn reborrow(&mut self) -> Slot<'_> {
        match self {
            Slot::Shared(v) => Slot::Shared(*v),
            Slot::Exclusive(v) => Slot::Exclusive(&mut **v),
        }
    }

    pub fn into_view(self) -> View<'a> {
        match self {
            Slot::Shared(v) => v.view(),
            Slot::Exclusive(v) => v.view_mut(),
        }
    }
}

/// One level of a value's structure.
pub enum View<'a> {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(&'a str),
    Bytes(&'a [u8]),
    /// Pointer-like value; `None` when absent.
    Pointer(Option<Slot<'a>>),
    Sequence(Vec<Slot<'a>>),
    Mapping(Vec<(&'a str, Slot<'a>)>),
    /// All declared fields, by declaration position.
    Record(Vec<Slot<'a>>),
    Unsupported(Kind),
}

impl View<'_> {
    /// Zero value test used by `omitempty`. Records are never zero.
    pub fn is_zero(&self) -> bool {
        match self {
            View::Bool(v) => !v,
            View::Int(v) => *v == 0,
            View::Uint(v) => *v == 0,
            View::Float(v) => *v == 0.0,
            View::Str(v) => v.is_empty(),
            View::Bytes(v) => v.is_empty(),
            View::Pointer(v) => v.is_none(),
            View::Sequence(v) => v.is_empty(),
            View::Mapping(v) => v.is_empty(),
            View::Record(_) | View::Unsupported(_) => false,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Scalars
// ═══════════════════════════════════════════════════════════════

impl Reflect for bool {
    fn shape() -> TypeShape {
        TypeShape::scalar(Kind::Bool)
    }

    fn view(&self) -> View<'_> {
        View::Bool(*self)
    }
}

macro_rules! reflect_int {
    ($variant:ident, $kind:ident, $wide:ty: $($ty:ty),*) => {
        $(
            impl Reflect for $ty {
                fn shape() -> TypeShape {
                    TypeShape::scalar(Kind::$kind)
                }

                fn view(&self) -> View<'_> {
                    View::$variant(*self as $wide)
                }
            }
        )*
    };
}

reflect_int!(Int, Int, i64: i8, i16, i32, i64, isize);
reflect_int!(Uint, Uint, u64: u8, u16, u32, u64, usize);

impl Reflect for f32 {
    fn shape() -> TypeShape {
        TypeShape::scalar(Kind::Float)
    }

    fn view(&self) -> View<'_> {
        View::Float(f64::from(*self))
    }
}

impl Reflect for f64 {
    fn shape() -> TypeShape {
        TypeShape::scalar(Kind::Float)
    }

    fn view(&self) -> View<'_> {
        View::Float(*self)
    }
}

impl Reflect for String {
    fn shape() -> TypeShape {
        TypeShape::scalar(Kind::String)
    }

    fn view(&self) -> View<'_> {
        View::Str(self)
    }
}

impl Reflect for &'static str {
    fn shape() -> TypeShape {
        TypeShape::scalar(Kind::String)
    }

    fn view(&self) -> View<'_> {
        View::Str(self)
    }
}

impl Reflect for Box<str> {
    fn shape() -> TypeShape {
        TypeShape::scalar(Kind::String)
    }

    fn view(&self) -> View<'_> {
        View::Str(self)
    }
}

impl Reflect for Cow<'static, str> {
    fn shape() -> TypeShape {
        TypeShape::scalar(Kind::String)
    }

    fn view(&self) -> View<'_> {
        View::Str(self)
    }
}

/// Byte buffer that converts to a standard base64 string.
///
/// `Vec<u8>` stays a sequence of integers; wrap it in `Bytes` to get the
/// compact text form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Bytes(pub Vec<u8>);

impl From<Vec<u8>> for Bytes {
    fn from(v: Vec<u8>) -> Self {
        Self(v)
    }
}

impl Reflect for Bytes {
    fn shape() -> TypeShape {
        TypeShape::scalar(Kind::Bytes)
    }

    fn view(&self) -> View<'_> {
        View::Bytes(&self.0)
    }
}

/// Stand-in type of private and skipped record fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opaque;

impl Reflect for Opaque {
    fn shape() -> TypeShape {
        TypeShape::record(Vec::new())
    }

    fn view(&self) -> View<'_> {
        View::Record(Vec::new())
    }
}

// ═══════════════════════════════════════════════════════════════
//  Pointer-like
// ═══════════════════════════════════════════════════════════════

impl<T: Reflect> Reflect for Option<T> {
    fn shape() -> TypeShape {
        TypeShape::pointer::<T>()
    }

    fn view(&self) -> View<'_> {
        View::Pointer(self.as_ref().map(|v| Slot::Shared(v)))
    }

    fn view_mut(&mut self) -> View<'_> {
        View::Pointer(self.as_mut().map(|v| Slot::Exclusive(v)))
    }
}

impl<T: Reflect> Reflect for Box<T> {
    fn shape() -> TypeShape {
        TypeShape::pointer::<T>()
    }

    fn view(&self) -> View<'_> {
        View::Pointer(Some(Slot::Shared(&**self)))
    }

    fn view_mut(&mut self) -> View<'_> {
        View::Pointer(Some(Slot::Exclusive(&mut **self)))
    }
}

/// Shared ownership never hands out an addressable pointee.
impl<T: Reflect> Reflect for Rc<T> {
    fn shape() -> TypeShape {
        TypeShape::pointer::<T>()
    }

    fn view(&self) -> View<'_> {
        View::Pointer(Some(Slot::Shared(&**self)))
    }
}

impl<T: Reflect> Reflect for Arc<T> {
    fn shape() -> TypeShape {
        TypeShape::pointer::<T>()
    }

    fn view(&self) -> View<'_> {
        View::Pointer(Some(Slot::Shared(&**self)))
    }
}

impl Reflect for Box<dyn Reflect> {
    fn shape() -> TypeShape {
        TypeShape::scalar(Kind::Dynamic)
    }

    fn view(&self) -> View<'_> {
        View::Pointer(Some(Slot::Shared(&**self)))
    }

    fn view_mut(&mut self) -> View<'_> {
        View::Pointer(Some(Slot::Exclusive(&mut **self)))
    }
}

// ═══════════════════════════════════════════════════════════════
//  Sequences
// ═══════════════════════════════════════════════════════════════

impl<T: Reflect> Reflect for Vec<T> {
    fn shape() -> TypeShape {
        TypeShape::sequence::<T>()
    }

    fn view(&self) -> View<'_> {
        View::Sequence(self.iter().map(|v| Slot::Shared(v)).collect())
    }

    fn view_mut(&mut self) -> View<'_> {
        View::Sequence(self.iter_mut().map(|v| Slot::Exclusive(v)).collect())
    }
}

impl<T: Reflect> Reflect for VecDeque<T> {
    fn shape() -> TypeShape {
        TypeShape::sequence::<T>()
    }

    fn view(&self) -> View<'_> {
        View::Sequence(self.iter().map(|v| Slot::Shared(v)).collect())
    }

    fn view_mut(&mut self) -> View<'_> {
        View::Sequence(self.iter_mut().map(|v| Slot::Exclusive(v)).collect())
    }
}

impl<T: Reflect> Reflect for Box<[T]> {
    fn shape() -> TypeShape {
        TypeShape::sequence::<T>()
    }

    fn view(&self) -> View<'_> {
        View::Sequence(self.iter().map(|v| Slot::Shared(v)).collect())
    }

    fn view_mut(&mut self) -> View<'_> {
        View::Sequence(self.iter_mut().map(|v| Slot::Exclusive(v)).collect())
    }
}

impl<T: Reflect, const N: usize> Reflect for [T; N] {
    fn shape() -> TypeShape {
        TypeShape::sequence::<T>()
    }

    fn view(&self) -> View<'_> {
        View::Sequence(self.iter().map(|v| Slot::Shared(v)).collect())
    }

    fn view_mut(&mut self) -> View<'_> {
        View::Sequence(self.iter_mut().map(|v| Slot::Exclusive(v)).collect())
    }
}

/// Set elements are never addressable.
impl<T: Reflect> Reflect for BTreeSet<T> {
    fn shape() -> TypeShape {
        TypeShape::sequence::<T>()
    }

    fn view(&self) -> View<'_> {
        View::Sequence(self.iter().map(|v| Slot::Shared(v)).collect())
    }
}

// ═══════════════════════════════════════════════════════════════
//  Mappings
// ═══════════════════════════════════════════════════════════════

/// Map key types that have a string form.
pub trait MapKey {
    fn as_key(&self) -> &str;
}

impl MapKey for String {
    fn as_key(&self) -> &str {
        self
    }
}

impl MapKey for &'static str {
    fn as_key(&self) -> &str {
        self
    }
}

impl MapKey for Box<str> {
    fn as_key(&self) -> &str {
        self
    }
}

impl MapKey for Cow<'static, str> {
    fn as_key(&self) -> &str {
        self
    }
}

impl<K, V, S> Reflect for HashMap<K, V, S>
where
    K: MapKey + 'static,
    V: Reflect,
    S: 'static,
{
    fn shape() -> TypeShape {
        TypeShape::mapping::<V>()
    }

    fn view(&self) -> View<'_> {
        View::Mapping(
            self.iter()
                .map(|(k, v)| (k.as_key(), Slot::Shared(v)))
                .collect(),
        )
    }

    fn view_mut(&mut self) -> View<'_> {
        View::Mapping(
            self.iter_mut()
                .map(|(k, v)| (k.as_key(), Slot::Exclusive(v)))
                .collect(),
        )
    }
}

impl<K, V> Reflect for BTreeMap<K, V>
where
    K: MapKey + 'static,
    V: Reflect,
{
    fn shape() -> TypeShape {
        TypeShape::mapping::<V>()
    }

    fn view(&self) -> View<'_> {
        View::Mapping(
            self.iter()
                .map(|(k, v)| (k.as_key(), Slot::Shared(v)))
                .collect(),
        )
    }

    fn view_mut(&mut self) -> View<'_> {
        View::Mapping(
            self.iter_mut()
                .map(|(k, v)| (k.as_key(), Slot::Exclusive(v)))
                .collect(),
        )
    }
}

// ═══════════════════════════════════════════════════════════════
//  Categories without a conversion rule
// ═══════════════════════════════════════════════════════════════

impl<R: 'static> Reflect for fn() -> R {
    fn shape() -> TypeShape {
        TypeShape::scalar(Kind::Callable)
    }

    fn view(&self) -> View<'_> {
        View::Unsupported(Kind::Callable)
    }
}

impl<A: 'static, R: 'static> Reflect for fn(A) -> R {
    fn shape() -> TypeShape {
        TypeShape::scalar(Kind::Callable)
    }

    fn view(&self) -> View<'_> {
        View::Unsupported(Kind::Callable)
    }
}

macro_rules! reflect_channel {
    ($($ty:ident),*) => {
        $(
            impl<T: 'static> Reflect for $ty<T> {
                fn shape() -> TypeShape {
                    TypeShape::scalar(Kind::Channel)
                }

                fn view(&self) -> View<'_> {
                    View::Unsupported(Kind::Channel)
                }
            }
        )*
    };
}

reflect_channel!(Sender, SyncSender, Receiver);

// ═══════════════════════════════════════════════════════════════
//  Already-unstructured values
// ═══════════════════════════════════════════════════════════════

impl ToUnstructured for Value {
    fn to_unstructured(&self) -> Result<Value, HookError> {
        Ok(self.clone())
    }
}

impl Reflect for Value {
    fn shape() -> TypeShape {
        TypeShape::scalar(Kind::Dynamic).with_capabilities(&[Capability::ToUnstructured])
    }

    fn view(&self) -> View<'_> {
        View::Unsupported(Kind::Dynamic)
    }

    fn is_zero(&self) -> bool {
        self.is_null()
    }

    fn invoke(&self, hook: Hook) -> Option<Result<HookOutput, HookError>> {
        match hook {
            Hook::Native => Some(self.to_unstructured().map(HookOutput::Value)),
            Hook::TextMarshal => None,
        }
    }
}

impl ToUnstructured for serde_json::Value {
    fn to_unstructured(&self) -> Result<Value, HookError> {
        Ok(Value::from(self.clone()))
    }
}

impl Reflect for serde_json::Value {
    fn shape() -> TypeShape {
        TypeShape::scalar(Kind::Dynamic).with_capabilities(&[Capability::ToUnstructured])
    }

    fn view(&self) -> View<'_> {
        View::Unsupported(Kind::Dynamic)
    }

    fn is_zero(&self) -> bool {
        self.is_null()
    }

    fn invoke(&self, hook: Hook) -> Option<Result<HookOutput, HookError>> {
        match hook {
            Hook::Native => Some(self.to_unstructured().map(HookOutput::Value)),
            Hook::TextMarshal => None,
        }
    }
}
