use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::HookError;
use crate::hook::{Hook, HookOutput, ToUnstructured};
use crate::reflect::{Reflect, View};
use crate::shape::{Capability, TypeShape};
use crate::value::Value;

/// Seconds from the Unix epoch back to 0001-01-01T00:00:00Z.
const ZERO_UNIX_SECONDS: i64 = -62_135_596_800;

/// UTC timestamp with an explicit zero instant.
///
/// Converts to an RFC 3339 string at second precision, or to null when zero.
/// The default value is the zero instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Time(DateTime<Utc>);

impl Time {
    pub fn zero() -> Self {
        Self(
            DateTime::<Utc>::from_timestamp(ZERO_UNIX_SECONDS, 0)
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
        )
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::zero()
    }

    pub fn inner(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for Time {
    fn default() -> Self {
        Self::zero()
    }
}

impl From<DateTime<Utc>> for Time {
    fn from(t: DateTime<Utc>) -> Self {
        Self(t)
    }
}

impl ToUnstructured for Time {
    fn to_unstructured(&self) -> Result<Value, HookError> {
        if self.is_zero() {
            return Ok(Value::Null);
        }
        Ok(Value::String(self.0.to_rfc3339_opts(SecondsFormat::Secs, true)))
    }
}

impl Reflect for Time {
    fn shape() -> TypeShape {
        TypeShape::record(Vec::new()).with_capabilities(&[Capability::ToUnstructured])
    }

    // No exported fields; records never count as empty.
    fn view(&self) -> View<'_> {
        View::Record(Vec::new())
    }

    fn invoke(&self, hook: Hook) -> Option<Result<HookOutput, HookError>> {
        match hook {
            Hook::Native => Some(self.to_unstructured().map(HookOutput::Value)),
            Hook::TextMarshal => None,
        }
    }
}
