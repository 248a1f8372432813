//! Conversion of typed values into an unstructured, JSON-like tree.
//!
//! Types describe themselves through [`Reflect`] (usually derived). The
//! converter walks a value using per-type metadata cached in a
//! [`TypeCache`], honoring field tags and conversion hooks:
//!
//! ```ignore
//! #[derive(Reflect)]
//! pub struct Deployment {
//!     #[unstructured(rename = "replicas", omitempty)]
//!     pub replicas: Option<i64>,
//! }
//!
//! let value = unstruct::to_unstructured(&deployment)?;
//! ```

// Lets the derive output refer to `::unstruct` inside this crate as well.
extern crate self as unstruct;

pub mod cache;
pub mod config;
pub mod convert;
pub mod error;
pub mod hook;
pub mod introspect;
pub mod reflect;
pub mod shape;
pub mod tag;
pub mod time;
pub mod value;

pub use unstruct_derive::Reflect;

pub use cache::{entry_of, TypeCache, TypeEntry};
pub use config::{ConvertConfig, OverflowPolicy};
pub use convert::{to_unstructured, to_unstructured_mut, Converter};
pub use error::{ConvertError, ErrorKind, HookError};
pub use hook::{
    Hook, HookOutput, HookSet, MarshalJson, MarshalJsonMut, Receiver, ToUnstructured,
    ToUnstructuredMut,
};
pub use introspect::FieldEntry;
pub use reflect::{Bytes, Identify, MapKey, Opaque, Reflect, Slot, View};
pub use shape::{Capability, DeclaredField, Kind, TypeIdentity, TypeShape};
pub use tag::FieldTag;
pub use time::Time;
pub use value::{Map, Value};
