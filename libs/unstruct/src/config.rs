use serde::Deserialize;

/// What to do with an unsigned integer that does not fit into i64.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Abort the conversion with `ConvertError::IntegerOverflow`.
    #[default]
    Error,
    /// Widen the value to a float (lossy above 2^53).
    Float,
}

/// Converter settings.
///
/// Deserializable so that hosts can embed it in their own configuration;
/// every field has a default.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConvertConfig {
    /// Maximum container nesting before the conversion is aborted.
    ///
    /// Each record, sequence and mapping level counts once. Pointer-like
    /// wrappers (`Option`, `Box`, `Rc`, `Arc`, `dyn Reflect`) add no level,
    /// so `n` records chained through `Option<Box<Node>>` fields need a
    /// limit of at least `n`.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Handling of unsigned values above `i64::MAX`.
    #[serde(default)]
    pub overflow: OverflowPolicy,
}

fn default_max_depth() -> usize {
    512
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            overflow: OverflowPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config: ConvertConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ConvertConfig::default());
        assert_eq!(config.max_depth, 512);
        assert_eq!(config.overflow, OverflowPolicy::Error);
    }

    #[test]
    fn overflow_policy_is_snake_case() {
        let config: ConvertConfig =
            serde_json::from_str(r#"{"max_depth": 8, "overflow": "float"}"#).unwrap();
        assert_eq!(config.max_depth, 8);
        assert_eq!(config.overflow, OverflowPolicy::Float);
    }
}
