use std::fmt;

use crate::shape::Kind;

/// Coarse classification of a conversion failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A native or text-marshal hook reported failure.
    Hook,
    /// Text-marshal output is not a valid literal.
    Decode,
    /// No conversion rule for the runtime category.
    Unsupported,
    /// A configured limit was hit (integer range, nesting depth).
    Limit,
}

/// Error reported by a conversion hook implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookError {
    pub message: String,
}

impl HookError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { message: msg.into() }
    }

    /// Add context to the error.
    ///
    /// Produces: `"context: original message"`.
    pub fn with_context(self, ctx: impl fmt::Display) -> Self {
        Self {
            message: format!("{ctx}: {}", self.message),
        }
    }
}

impl fmt::Display for HookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HookError {}

impl From<serde_json::Error> for HookError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(e.to_string())
    }
}

impl From<std::fmt::Error> for HookError {
    fn from(e: std::fmt::Error) -> Self {
        Self::new(e.to_string())
    }
}

/// Conversion failure. Any variant aborts the whole conversion.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("{type_name}: hook failed: {source}")]
    Hook {
        type_name: &'static str,
        #[source]
        source: HookError,
    },

    #[error("{type_name}: error decoding from json: {reason}")]
    Decode {
        type_name: &'static str,
        reason: String,
    },

    #[error("unsupported type {type_name} (kind {kind:?})")]
    UnsupportedType { type_name: &'static str, kind: Kind },

    #[error("{type_name}: unsigned value {value} does not fit into int64")]
    IntegerOverflow { type_name: &'static str, value: u64 },

    #[error("nesting depth exceeds limit of {limit}")]
    DepthExceeded { limit: usize },

    #[error("field '{field}': {source}")]
    Field {
        field: String,
        #[source]
        source: Box<ConvertError>,
    },
}

impl ConvertError {
    pub fn kind(&self) -> ErrorKind {
        match self.root_cause() {
            ConvertError::Hook { .. } => ErrorKind::Hook,
            ConvertError::Decode { .. } => ErrorKind::Decode,
            ConvertError::UnsupportedType { .. } => ErrorKind::Unsupported,
            ConvertError::IntegerOverflow { .. } | ConvertError::DepthExceeded { .. } => {
                ErrorKind::Limit
            }
            ConvertError::Field { source, .. } => source.kind(),
        }
    }

    /// Innermost error, with all field context stripped.
    pub fn root_cause(&self) -> &ConvertError {
        let mut current = self;
        while let ConvertError::Field { source, .. } = current {
            current = source;
        }
        current
    }

    /// Dotted field path of the failure, outermost field first.
    pub fn field_path(&self) -> Vec<&str> {
        let mut path = Vec::new();
        let mut current = self;
        while let ConvertError::Field { field, source } = current {
            path.push(field.as_str());
            current = source;
        }
        path
    }

    /// Wrap the error with the name of the record field being converted.
    pub fn in_field(self, field: impl Into<String>) -> Self {
        ConvertError::Field {
            field: field.into(),
            source: Box::new(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_context_keeps_kind() {
        let err = ConvertError::Decode {
            type_name: "T",
            reason: "empty value".to_string(),
        }
        .in_field("inner")
        .in_field("outer");

        assert_eq!(err.kind(), ErrorKind::Decode);
        assert_eq!(err.field_path(), vec!["outer", "inner"]);
        assert!(matches!(err.root_cause(), ConvertError::Decode { .. }));
        assert_eq!(
            err.to_string(),
            "field 'outer': field 'inner': T: error decoding from json: empty value"
        );
    }

    #[test]
    fn hook_error_context() {
        let err = HookError::new("boom").with_context("Time");
        assert_eq!(err.to_string(), "Time: boom");
    }
}
