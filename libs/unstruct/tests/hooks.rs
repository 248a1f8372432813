use std::sync::Once;

use unstruct::{
    to_unstructured, to_unstructured_mut, ConvertError, Converter, ErrorKind, HookError, Map,
    MarshalJson, MarshalJsonMut, Reflect, Time, ToUnstructured, ToUnstructuredMut, TypeCache,
    Value,
};

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Text hook with a shared receiver.
#[derive(Reflect)]
#[unstructured(marshal_json)]
struct CustomValue {
    data: Vec<u8>,
}

impl MarshalJson for CustomValue {
    fn marshal_json(&self) -> Result<Vec<u8>, HookError> {
        Ok(self.data.clone())
    }
}

/// Text hook that needs exclusive access.
#[derive(Reflect, Clone)]
#[unstructured(marshal_json_mut)]
struct CustomPointer {
    data: Vec<u8>,
}

impl MarshalJsonMut for CustomPointer {
    fn marshal_json_mut(&mut self) -> Result<Vec<u8>, HookError> {
        Ok(self.data.clone())
    }
}

fn literal_cases() -> Vec<(&'static str, Value)> {
    let mut one = Map::new();
    one.insert("a".to_string(), Value::Int(1));
    vec![
        ("null", Value::Null),
        ("true", Value::Bool(true)),
        ("false", Value::Bool(false)),
        ("[]", Value::List(vec![])),
        ("[1]", Value::List(vec![Value::Int(1)])),
        ("{}", Value::Map(Map::new())),
        (r#"{"a":1}"#, Value::Map(one)),
        ("0", Value::Int(0)),
        ("0.0", Value::Float(0.0)),
    ]
}

#[test]
fn text_hook_literals() {
    init_tracing();
    for (data, expected) in literal_cases() {
        let bytes = data.as_bytes().to_vec();

        let direct = CustomValue { data: bytes.clone() };
        assert_eq!(to_unstructured(&direct).unwrap(), expected, "value {data}");

        let boxed = Box::new(CustomValue { data: bytes.clone() });
        assert_eq!(to_unstructured(&boxed).unwrap(), expected, "boxed {data}");

        let mut pointer = Box::new(CustomPointer { data: bytes });
        assert_eq!(
            to_unstructured_mut(&mut pointer).unwrap(),
            expected,
            "addressable {data}"
        );
        assert_eq!(to_unstructured(&pointer).unwrap(), expected, "copied {data}");
    }
}

#[derive(Reflect)]
#[unstructured(to_unstructured)]
struct Celsius {
    degrees: f64,
}

impl ToUnstructured for Celsius {
    fn to_unstructured(&self) -> Result<Value, HookError> {
        Ok(Value::String(format!("{}C", self.degrees)))
    }
}

#[test]
fn shared_native_hook_on_value_and_reference() {
    let mut reading = Celsius { degrees: 21.5 };
    let expected = Value::String("21.5C".to_string());
    assert_eq!(to_unstructured(&reading).unwrap(), expected);
    assert_eq!(to_unstructured_mut(&mut reading).unwrap(), expected);

    let shared = std::rc::Rc::new(Celsius { degrees: 21.5 });
    assert_eq!(to_unstructured(&shared).unwrap(), expected);
    let mut boxed = Some(Box::new(reading));
    assert_eq!(to_unstructured_mut(&mut boxed).unwrap(), expected);
}

/// Native hook that records each call on the receiver.
#[derive(Reflect, Clone)]
#[unstructured(to_unstructured_mut)]
struct Counter {
    pub calls: i64,
}

impl ToUnstructuredMut for Counter {
    fn to_unstructured_mut(&mut self) -> Result<Value, HookError> {
        self.calls += 1;
        Ok(Value::Int(self.calls))
    }
}

#[test]
fn exclusive_native_hook_runs_in_place_or_on_a_copy() {
    let mut counter = Counter { calls: 0 };

    assert_eq!(to_unstructured_mut(&mut counter).unwrap(), Value::Int(1));
    assert_eq!(counter.calls, 1);

    // Shared borrow: the hook runs on a copy, the original is untouched.
    assert_eq!(to_unstructured(&counter).unwrap(), Value::Int(2));
    assert_eq!(counter.calls, 1);

    let mut list = vec![Counter { calls: 10 }];
    assert_eq!(
        to_unstructured_mut(&mut list).unwrap(),
        Value::List(vec![Value::Int(11)])
    );
    assert_eq!(list[0].calls, 11);
}

#[test]
fn native_hook_wins_over_fields() {
    let entry = unstruct::entry_of::<Counter>();
    assert!(entry.has_custom_conversion());
    assert!(entry.hooks().text_marshal.is_none());
    // Field metadata is still computed, just not used.
    assert_eq!(entry.fields().len(), 1);
}

#[derive(Reflect)]
#[unstructured(to_unstructured)]
struct Broken {}

impl ToUnstructured for Broken {
    fn to_unstructured(&self) -> Result<Value, HookError> {
        Err(HookError::new("sensor offline"))
    }
}

#[derive(Reflect)]
struct Station {
    pub name: String,
    pub probe: Broken,
}

#[test]
fn hook_failure_aborts_with_field_context() {
    let station = Station {
        name: "north".to_string(),
        probe: Broken {},
    };
    let err = to_unstructured(&station).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Hook);
    assert_eq!(err.field_path(), vec!["probe"]);
    match err.root_cause() {
        ConvertError::Hook { source, .. } => assert_eq!(source.message, "sensor offline"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn bad_text_hook_output_is_a_decode_error() {
    let cache = TypeCache::new();
    let converter = Converter::with_cache(&cache);

    let empty = CustomValue { data: Vec::new() };
    let err = converter.to_unstructured(&empty).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decode);
    assert!(err.to_string().contains("empty value"));

    let invalid = CustomValue {
        data: b"{not json".to_vec(),
    };
    assert_eq!(
        converter.to_unstructured(&invalid).unwrap_err().kind(),
        ErrorKind::Decode
    );
}

#[derive(Reflect)]
struct Event {
    #[unstructured(rename = "at")]
    pub at: Time,
    #[unstructured(rename = "until", omitempty)]
    pub until: Option<Time>,
}

#[test]
fn time_fields() {
    let start = Time::from(Time::zero().inner() + chrono::TimeDelta::seconds(1));
    let event = Event {
        at: start,
        until: None,
    };
    let value = to_unstructured(&event).unwrap();
    assert_eq!(
        value.get("at"),
        Some(&Value::String("0001-01-01T00:00:01Z".to_string()))
    );
    assert_eq!(value.get("until"), None);

    let event = Event {
        at: Time::default(),
        until: Some(Time::default()),
    };
    let value = to_unstructured(&event).unwrap();
    assert_eq!(value.get("at"), Some(&Value::Null));
    assert_eq!(value.get("until"), Some(&Value::Null));
}
