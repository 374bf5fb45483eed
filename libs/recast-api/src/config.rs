/// Parameter type for transform configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Bool,
    I64,
    U64,
    F64,
    Str,
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamType::Bool => f.write_str("bool"),
            ParamType::I64 => f.write_str("integer"),
            ParamType::U64 => f.write_str("non-negative integer"),
            ParamType::F64 => f.write_str("float"),
            ParamType::Str => f.write_str("string"),
        }
    }
}

/// How much a parameter matters to the operator. Informational only,
/// surfaced in generated docs and `--help`-style listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Importance {
    High,
    Medium,
    Low,
}

/// Declaration of a single config parameter.
///
/// Plugins export these via `recast_config_params()`.
/// The host uses them to validate config values BEFORE creating the transform.
#[derive(Debug, Clone)]
pub struct ConfigParam {
    pub name: String,
    pub param_type: ParamType,
    pub importance: Importance,
    pub required: bool,
    /// Reject empty strings even when the key is present.
    pub non_empty: bool,
    pub default: Option<ParamValue>,
    pub description: String,
}

/// Typed config value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    Str(String),
}

/// Validated config values, passed to a transform at configure time.
///
/// The host builds this from the config source (TOML, property map, ...)
/// after validating against the transform's `ConfigParam` declarations.
/// Transforms read values via typed getters.
#[derive(Debug, Clone, Default)]
pub struct ConfigValues {
    entries: Vec<(String, ParamValue)>,
}

impl ConfigValues {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Build from string properties, the shape most connector frameworks hand over.
    pub fn from_properties<K, V>(props: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut values = Self::new();
        for (k, v) in props {
            values.set(k, ParamValue::Str(v.into()));
        }
        values
    }

    pub fn set(&mut self, name: impl Into<String>, value: ParamValue) {
        let name = name.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| k == &name) {
            entry.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    /// Builder-style `set`.
    pub fn with(mut self, name: impl Into<String>, value: ParamValue) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.get(name) {
            Some(ParamValue::Bool(v)) => Some(*v),
            Some(ParamValue::Str(s)) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        match self.get(name) {
            Some(ParamValue::I64(v)) => Some(*v),
            Some(ParamValue::U64(v)) => i64::try_from(*v).ok(),
            // Property maps carry numbers as strings; "" is treated as absent.
            Some(ParamValue::Str(s)) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn get_u64(&self, name: &str) -> Option<u64> {
        match self.get(name) {
            Some(ParamValue::U64(v)) => Some(*v),
            // Most config formats lack unsigned integers; accept non-negative i64.
            Some(ParamValue::I64(v)) if *v >= 0 => Some(*v as u64),
            Some(ParamValue::Str(s)) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        match self.get(name) {
            Some(ParamValue::F64(v)) => Some(*v),
            Some(ParamValue::Str(s)) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(ParamValue::Str(v)) => Some(v),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_overwrites_existing_entry() {
        let mut values = ConfigValues::new();
        values.set("field", ParamValue::Str("a".into()));
        values.set("field", ParamValue::Str("b".into()));
        assert_eq!(values.len(), 1);
        assert_eq!(values.get_str("field"), Some("b"));
    }

    #[test]
    fn test_numbers_from_string_properties() {
        let values = ConfigValues::from_properties([("scale", "4"), ("empty", ""), ("neg", "-2")]);
        assert_eq!(values.get_i64("scale"), Some(4));
        assert_eq!(values.get_u64("scale"), Some(4));
        assert_eq!(values.get_i64("empty"), None);
        assert_eq!(values.get_u64("neg"), None);
        assert_eq!(values.get_i64("neg"), Some(-2));
    }

    #[test]
    fn test_u64_accepts_non_negative_i64() {
        let values = ConfigValues::new()
            .with("a", ParamValue::I64(3))
            .with("b", ParamValue::I64(-3));
        assert_eq!(values.get_u64("a"), Some(3));
        assert_eq!(values.get_u64("b"), None);
    }

    #[test]
    fn test_str_getter_ignores_other_types() {
        let values = ConfigValues::new().with("field", ParamValue::I64(1));
        assert_eq!(values.get_str("field"), None);
        assert!(values.contains("field"));
    }
}
