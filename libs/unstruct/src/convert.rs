use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::cache::{TypeCache, TypeEntry};
use crate::config::{ConvertConfig, OverflowPolicy};
use crate::error::{ConvertError, HookError};
use crate::hook::{Hook, HookOutput, Receiver};
use crate::introspect::FieldEntry;
use crate::reflect::{Reflect, Slot, View};
use crate::value::{self, Map, Value};

/// Recursive typed → unstructured converter.
///
/// Every value is dispatched on the cached entry of its type: a hook wins
/// over structural conversion, records walk their promoted field list.
pub struct Converter<'c> {
    cache: &'c TypeCache,
    config: ConvertConfig,
}

impl Default for Converter<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl Converter<'static> {
    /// Converter backed by the process-wide cache.
    pub fn new() -> Self {
        Self::with_cache(TypeCache::global())
    }
}

impl<'c> Converter<'c> {
    pub fn with_cache(cache: &'c TypeCache) -> Self {
        Self {
            cache,
            config: ConvertConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ConvertConfig) -> Self {
        self.config = config;
        self
    }

    /// Convert a value reached through a shared borrow. Exclusive-receiver
    /// hooks run on an addressable copy.
    pub fn to_unstructured(&self, value: &dyn Reflect) -> Result<Value, ConvertError> {
        self.convert(Slot::Shared(value), 0)
    }

    /// Convert an addressable value. Exclusive-receiver hooks run in place.
    pub fn to_unstructured_mut(
        &self,
        value: &mut (dyn Reflect + 'static),
    ) -> Result<Value, ConvertError> {
        self.convert(Slot::Exclusive(value), 0)
    }

    fn convert(&self, slot: Slot<'_>, depth: usize) -> Result<Value, ConvertError> {
        let entry = self.cache.entry_for(slot.identity());
        self.convert_with_entry(slot, &entry, depth)
    }

    fn convert_with_entry(
        &self,
        slot: Slot<'_>,
        entry: &TypeEntry,
        depth: usize,
    ) -> Result<Value, ConvertError> {
        if depth > self.config.max_depth {
            return Err(ConvertError::DepthExceeded {
                limit: self.config.max_depth,
            });
        }

        if let Some((hook, receiver)) = entry.hooks().preferred() {
            return self.run_hook(slot, entry, hook, receiver);
        }

        let type_name = entry.identity().name();
        match slot.into_view() {
            View::Bool(v) => Ok(Value::Bool(v)),
            View::Int(v) => Ok(Value::Int(v)),
            View::Uint(v) => match i64::try_from(v) {
                Ok(v) => Ok(Value::Int(v)),
                Err(_) => match self.config.overflow {
                    OverflowPolicy::Error => {
                        Err(ConvertError::IntegerOverflow { type_name, value: v })
                    }
                    OverflowPolicy::Float => Ok(Value::Float(v as f64)),
                },
            },
            View::Float(v) => Ok(Value::Float(v)),
            View::Str(v) => Ok(Value::String(v.to_string())),
            View::Bytes(v) => Ok(Value::String(STANDARD.encode(v))),
            View::Pointer(None) => Ok(Value::Null),
            // The pointee may be a different (dynamic) type: look it up again.
            // Pointers add no nesting level of their own.
            View::Pointer(Some(inner)) => self.convert(inner, depth),
            View::Sequence(items) => items
                .into_iter()
                .map(|item| self.convert(item, depth + 1))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            View::Mapping(items) => items
                .into_iter()
                .map(|(key, item)| {
                    self.convert(item, depth + 1)
                        .map(|v| (key.to_string(), v))
                        .map_err(|e| e.in_field(key))
                })
                .collect::<Result<Map, _>>()
                .map(Value::Map),
            View::Record(slots) => self.convert_record(slots, entry, depth),
            View::Unsupported(kind) => Err(ConvertError::UnsupportedType { type_name, kind }),
        }
    }

    fn convert_record(
        &self,
        mut slots: Vec<Slot<'_>>,
        entry: &TypeEntry,
        depth: usize,
    ) -> Result<Value, ConvertError> {
        let mut map = Map::new();
        for field in entry.fields() {
            // An absent inlined pointer hides everything promoted through it.
            let Some(slot) = resolve(&mut slots, field.path()) else {
                continue;
            };
            if field.is_omit_empty() && slot.as_dyn().is_zero() {
                continue;
            }
            let value = self
                .convert_field(slot, field, depth)
                .map_err(|e| e.in_field(field.name()))?;
            map.insert(field.name().to_string(), value);
        }
        Ok(Value::Map(map))
    }

    fn convert_field(
        &self,
        slot: Slot<'_>,
        field: &FieldEntry,
        depth: usize,
    ) -> Result<Value, ConvertError> {
        let nested = field.nested_entry(self.cache);
        self.convert_with_entry(slot, &nested, depth + 1)
    }

    fn run_hook(
        &self,
        slot: Slot<'_>,
        entry: &TypeEntry,
        hook: Hook,
        receiver: Receiver,
    ) -> Result<Value, ConvertError> {
        let type_name = entry.identity().name();
        tracing::trace!(type_name, ?hook, ?receiver, "invoking hook");

        let output = match (receiver, slot) {
            (Receiver::Shared, slot) => slot.as_dyn().invoke(hook),
            (Receiver::Exclusive, Slot::Exclusive(value)) => value.invoke_mut(hook),
            (Receiver::Exclusive, Slot::Shared(value)) => match value.addressable_copy() {
                Some(mut copy) => {
                    tracing::trace!(type_name, "hook needs exclusive access, using a copy");
                    let target: &mut dyn Reflect = &mut *copy;
                    target.invoke_mut(hook)
                }
                None => Some(Err(HookError::new(
                    "hook needs exclusive access and the type provides no addressable copy",
                ))),
            },
        };

        let output = output
            .unwrap_or_else(|| Err(HookError::new(format!("{hook:?} hook declared but not wired"))))
            .map_err(|source| ConvertError::Hook { type_name, source })?;

        match output {
            HookOutput::Value(v) => Ok(v),
            HookOutput::Json(bytes) => value::parse_json_literal(&bytes)
                .map_err(|reason| ConvertError::Decode { type_name, reason }),
        }
    }
}

/// Walk a field path from the record's own slots down to the field.
fn resolve<'s>(slots: &'s mut [Slot<'_>], path: &[usize]) -> Option<Slot<'s>> {
    let (first, rest) = path.split_first()?;
    let mut slot = slots.get_mut(*first)?.reborrow();
    for &position in rest {
        slot = record_fields(slot)?.into_iter().nth(position)?;
    }
    Some(slot)
}

/// Dereference pointer-like wrappers until a record is reached.
fn record_fields(mut slot: Slot<'_>) -> Option<Vec<Slot<'_>>> {
    loop {
        match slot.into_view() {
            View::Record(fields) => return Some(fields),
            View::Pointer(Some(inner)) => slot = inner,
            _ => return None,
        }
    }
}

/// Convert with the process-wide cache and default settings.
pub fn to_unstructured(value: &dyn Reflect) -> Result<Value, ConvertError> {
    Converter::new().to_unstructured(value)
}

/// Convert an addressable value with the process-wide cache and default
/// settings.
pub fn to_unstructured_mut(value: &mut (dyn Reflect + 'static)) -> Result<Value, ConvertError> {
    Converter::new().to_unstructured_mut(value)
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};
    use std::rc::Rc;
    use std::sync::mpsc;

    use super::*;
    use crate::error::ErrorKind;
    use crate::reflect::Bytes;
    use crate::shape::Kind;

    fn convert(value: &dyn Reflect) -> Result<Value, ConvertError> {
        Converter::with_cache(&TypeCache::new()).to_unstructured(value)
    }

    #[test]
    fn scalars_widen() {
        assert_eq!(convert(&true).unwrap(), Value::Bool(true));
        assert_eq!(convert(&-7i8).unwrap(), Value::Int(-7));
        assert_eq!(convert(&42u32).unwrap(), Value::Int(42));
        assert_eq!(convert(&1.5f32).unwrap(), Value::Float(1.5));
        assert_eq!(convert(&"x").unwrap(), Value::String("x".to_string()));
        assert_eq!(
            convert(&String::from("y")).unwrap(),
            Value::String("y".to_string())
        );
    }

    #[test]
    fn unsigned_overflow() {
        let err = convert(&u64::MAX).unwrap_err();
        assert!(matches!(
            err,
            ConvertError::IntegerOverflow { value: u64::MAX, .. }
        ));
        assert_eq!(err.kind(), ErrorKind::Limit);

        let cache = TypeCache::new();
        let lossy = Converter::with_cache(&cache).with_config(ConvertConfig {
            overflow: OverflowPolicy::Float,
            ..ConvertConfig::default()
        });
        assert_eq!(
            lossy.to_unstructured(&u64::MAX).unwrap(),
            Value::Float(u64::MAX as f64)
        );
        assert_eq!(lossy.to_unstructured(&7u64).unwrap(), Value::Int(7));
    }

    #[test]
    fn pointers() {
        assert_eq!(convert(&None::<i64>).unwrap(), Value::Null);
        assert_eq!(convert(&Some(Box::new(3i64))).unwrap(), Value::Int(3));
        assert_eq!(convert(&Rc::new("rc")).unwrap(), Value::String("rc".into()));

        let dynamic: Box<dyn Reflect> = Box::new(vec![1u8, 2]);
        assert_eq!(
            convert(&dynamic).unwrap(),
            Value::List(vec![Value::Int(1), Value::Int(2)])
        );
    }

    #[test]
    fn empty_sequence_is_not_null() {
        assert_eq!(convert(&Vec::<i64>::new()).unwrap(), Value::List(vec![]));
        assert_eq!(convert(&[0u8; 0]).unwrap(), Value::List(vec![]));
        assert_eq!(
            convert(&[1i16, 2]).unwrap(),
            Value::List(vec![Value::Int(1), Value::Int(2)])
        );
    }

    #[test]
    fn mappings() {
        let mut map = HashMap::new();
        map.insert("a".to_string(), 1i64);
        map.insert("b".to_string(), 2i64);
        let value = convert(&map).unwrap();
        assert_eq!(value.get("a"), Some(&Value::Int(1)));
        assert_eq!(value.get("b"), Some(&Value::Int(2)));

        let empty: BTreeMap<&'static str, bool> = BTreeMap::new();
        assert_eq!(convert(&empty).unwrap(), Value::Map(Map::new()));
    }

    #[test]
    fn mapping_failure_names_the_key() {
        let mut map = BTreeMap::new();
        map.insert("big".to_string(), u64::MAX);
        let err = convert(&map).unwrap_err();
        assert_eq!(err.field_path(), vec!["big"]);
    }

    #[test]
    fn bytes_are_base64() {
        let bytes = Bytes(b"hello".to_vec());
        assert_eq!(convert(&bytes).unwrap(), Value::String("aGVsbG8=".into()));
    }

    #[test]
    fn callables_and_channels_are_unsupported() {
        let f: fn() -> i64 = || 1;
        let err = convert(&f).unwrap_err();
        assert!(matches!(
            err,
            ConvertError::UnsupportedType {
                kind: Kind::Callable,
                ..
            }
        ));

        let (tx, _rx) = mpsc::channel::<i64>();
        let err = convert(&vec![tx]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }

    #[test]
    fn depth_limit() {
        let cache = TypeCache::new();
        let shallow = Converter::with_cache(&cache).with_config(ConvertConfig {
            max_depth: 2,
            ..ConvertConfig::default()
        });
        let nested = vec![vec![vec![1i64]]];
        assert!(matches!(
            shallow.to_unstructured(&nested).unwrap_err(),
            ConvertError::DepthExceeded { limit: 2 }
        ));
        assert!(shallow.to_unstructured(&vec![vec![1i64]]).is_ok());
    }

    #[test]
    fn values_pass_through() {
        let json = serde_json::json!({"a": [1, 2.5, null]});
        let expected = Value::from(json.clone());
        assert_eq!(convert(&json).unwrap(), expected);
        assert_eq!(convert(&expected).unwrap(), expected);
    }
}
