//! Generic "recast one top-level field" transform.
//!
//! [`FieldRecast`] owns the orchestration shared by every field cast: the
//! lifecycle, schema derivation through a [`SchemaCache`], and rebuilding the
//! value struct. What actually happens to the target field is delegated to a
//! [`RecastStrategy`].

use std::fmt;
use std::sync::Arc;

use recast_api::config::{ConfigParam, ConfigValues};
use recast_api::converter::FieldConverter;
use recast_api::transform::Transformation;
use recast_api::{ConfigParams, PluginError, Record, Schema, SchemaBuilder, Struct, Value};
use tracing::{debug, info, trace};

use crate::cache::{CachePolicy, SchemaCache, DEFAULT_SCHEMA_CACHE_CAPACITY};

/// Configure-time constant: which field to recast and how.
#[derive(Debug, Clone, PartialEq)]
pub struct RecastRule<S> {
    pub field: String,
    pub strategy: S,
}

impl<S> RecastRule<S> {
    pub fn new(field: impl Into<String>, strategy: S) -> Self {
        Self {
            field: field.into(),
            strategy,
        }
    }
}

/// A concrete field conversion pluggable into [`FieldRecast`].
pub trait RecastStrategy: FieldConverter + Sized + 'static {
    /// Transform name reported in logs and errors.
    const NAME: &'static str;

    /// Parameters the strategy reads in [`RecastStrategy::from_config`].
    fn config_params() -> Vec<ConfigParam>;

    /// Build the rule from host-supplied options. Fails with `ErrorKind::Config`.
    fn from_config(config: &ConfigValues) -> Result<RecastRule<Self>, PluginError>;
}

/// Options shared by every recast transform.
#[derive(ConfigParams)]
struct CacheConfig {
    #[param(
        importance = "low",
        description = "How derived schemas are keyed: 'identity' (same schema instance) or 'structural' (equal schema)"
    )]
    cache_policy: String,

    #[param(importance = "low", description = "Maximum number of derived schemas kept per transform")]
    cache_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_policy: CachePolicy::default().to_string(),
            cache_size: DEFAULT_SCHEMA_CACHE_CAPACITY,
        }
    }
}

/// Output schema for `source`: a copy of its metadata and fields in order,
/// with the rule's target field retyped. A source without the target field
/// yields a plain copy.
pub fn derive_schema<S: FieldConverter>(
    source: &Schema,
    rule: &RecastRule<S>,
) -> Result<Schema, PluginError> {
    let mut builder = SchemaBuilder::copy_basics(source);
    for field in &source.fields {
        builder = if field.name == rule.field {
            builder.field(&field.name, rule.strategy.target_schema(&field.schema))
        } else {
            builder.field(&field.name, Arc::clone(&field.schema))
        };
    }
    builder.build()
}

struct Configured<S> {
    rule: RecastRule<S>,
    cache: SchemaCache,
}

enum State<S> {
    Unconfigured,
    Configured(Configured<S>),
    Closed,
}

/// Transform recasting one top-level struct field via strategy `S`.
pub struct FieldRecast<S> {
    state: State<S>,
}

impl<S: RecastStrategy> FieldRecast<S> {
    pub fn new() -> Self {
        Self {
            state: State::Unconfigured,
        }
    }

    /// Every option accepted by `configure`: the strategy's own plus the cache options.
    pub fn declared_params() -> Vec<ConfigParam> {
        let mut params = S::config_params();
        params.extend(CacheConfig::config_params());
        params
    }

    pub fn rule(&self) -> Option<&RecastRule<S>> {
        match &self.state {
            State::Configured(c) => Some(&c.rule),
            _ => None,
        }
    }

    pub fn cache(&self) -> Option<&SchemaCache> {
        match &self.state {
            State::Configured(c) => Some(&c.cache),
            _ => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, State::Closed)
    }

    fn configured(&self) -> Result<&Configured<S>, PluginError> {
        match &self.state {
            State::Configured(c) => Ok(c),
            State::Unconfigured => Err(PluginError::logic(format!(
                "{} has not been configured",
                S::NAME
            ))),
            State::Closed => Err(PluginError::logic(format!("{} is closed", S::NAME))),
        }
    }
}

impl<S: RecastStrategy> Default for FieldRecast<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: RecastStrategy> fmt::Debug for FieldRecast<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            State::Unconfigured => "unconfigured",
            State::Configured(_) => "configured",
            State::Closed => "closed",
        };
        f.debug_struct("FieldRecast")
            .field("name", &S::NAME)
            .field("state", &state)
            .field("field", &self.rule().map(|r| r.field.as_str()))
            .finish()
    }
}

impl<S: RecastStrategy> Transformation for FieldRecast<S> {
    fn name(&self) -> &'static str {
        S::NAME
    }

    fn config_params(&self) -> Vec<ConfigParam> {
        Self::declared_params()
    }

    fn configure(&mut self, config: &ConfigValues) -> Result<(), PluginError> {
        match self.state {
            State::Unconfigured => {}
            State::Configured(_) => {
                return Err(PluginError::logic(format!("{} is already configured", S::NAME)));
            }
            State::Closed => {
                return Err(PluginError::logic(format!("{} is closed", S::NAME)));
            }
        }

        let rule = S::from_config(config)?;
        let cache_config = CacheConfig::from_config(config)?;
        let policy: CachePolicy = cache_config.cache_policy.parse()?;
        let cache = SchemaCache::new(policy, cache_config.cache_size);

        info!(
            transform = S::NAME,
            field = %rule.field,
            %policy,
            capacity = cache.capacity(),
            "transform configured"
        );
        self.state = State::Configured(Configured { rule, cache });
        Ok(())
    }

    fn apply(&self, record: Record) -> Result<Record, PluginError> {
        let configured = self.configured()?;

        let source_schema = match &record.value_schema {
            Some(schema) if schema.is_struct() => Arc::clone(schema),
            _ => {
                trace!(transform = S::NAME, topic = %record.topic, "value schema is not a struct, passing through");
                return Ok(record);
            }
        };

        let rule = &configured.rule;
        let target_schema = configured
            .cache
            .get_or_derive(&source_schema, |schema| derive_schema(schema, rule))?;

        let source = match &record.value {
            Some(Value::Struct(source)) => source,
            other => {
                return Err(PluginError::type_mismatch(format!(
                    "{} only supports struct values, found {}",
                    S::NAME,
                    other.as_ref().map_or("null", Value::type_name)
                )));
            }
        };

        let mut value = Struct::new(Arc::clone(&target_schema))?;
        for (field, raw) in source.iter() {
            let converted = if field.name == rule.field {
                trace!(transform = S::NAME, field = %field.name, "converting field");
                rule.strategy
                    .convert(field, raw)
                    .map_err(|e| e.with_context(format!("field '{}'", field.name)))?
            } else {
                raw.clone()
            };
            value.put(&field.name, converted)?;
        }

        Ok(record.new_record(Some(target_schema), Some(Value::Struct(value))))
    }

    fn close(&mut self) {
        if let State::Configured(c) = &self.state {
            debug!(
                transform = S::NAME,
                cached = c.cache.len(),
                hits = c.cache.hits(),
                misses = c.cache.misses(),
                "closing transform"
            );
        }
        self.state = State::Closed;
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use recast_api::config::{Importance, ParamType, ParamValue};
    use recast_api::{ErrorKind, Field, SchemaType};

    use super::*;

    /// Test strategy: string field → int32 length.
    #[derive(Debug, Clone, PartialEq)]
    struct Length;

    impl FieldConverter for Length {
        fn target_schema(&self, source: &Schema) -> Schema {
            Schema::int32().with_optional(source.optional)
        }

        fn convert(&self, field: &Field, value: &Value) -> Result<Value, PluginError> {
            if field.schema.schema_type != SchemaType::String {
                return Err(PluginError::type_mismatch(format!(
                    "expected string field, found {}",
                    field.schema
                )));
            }
            match value {
                Value::Null => Ok(Value::Null),
                Value::String(s) => Ok(Value::Int32(s.len() as i32)),
                other => Err(PluginError::type_mismatch(format!(
                    "expected string, found {}",
                    other.type_name()
                ))),
            }
        }
    }

    impl RecastStrategy for Length {
        const NAME: &'static str = "Length";

        fn config_params() -> Vec<ConfigParam> {
            vec![ConfigParam {
                name: "field".into(),
                param_type: ParamType::Str,
                importance: Importance::High,
                required: true,
                non_empty: true,
                default: None,
                description: "Field to measure".into(),
            }]
        }

        fn from_config(config: &ConfigValues) -> Result<RecastRule<Self>, PluginError> {
            match config.get_str("field") {
                Some(field) if !field.is_empty() => Ok(RecastRule::new(field, Length)),
                _ => Err(PluginError::config("missing required parameter 'field'")),
            }
        }
    }

    fn configured(field: &str) -> FieldRecast<Length> {
        let mut transform = FieldRecast::<Length>::new();
        transform
            .configure(&ConfigValues::from_properties([("field", field)]))
            .unwrap();
        transform
    }

    fn row_schema() -> Arc<Schema> {
        Arc::new(
            SchemaBuilder::structure()
                .name("row")
                .version(2)
                .doc("a row")
                .parameter("origin", "test")
                .field("id", Schema::int64())
                .field("name", Schema::string().optional())
                .field("tag", Schema::string())
                .build()
                .unwrap(),
        )
    }

    fn row(schema: &Arc<Schema>, name: Option<&str>) -> Record {
        let value = Struct::new(Arc::clone(schema))
            .unwrap()
            .with("id", Value::Int64(42))
            .unwrap()
            .with("name", name.map_or(Value::Null, |n| Value::String(n.into())))
            .unwrap()
            .with("tag", Value::String("t".into()))
            .unwrap();
        Record::new("rows", Some(3), Some(Arc::clone(schema)), Some(Value::Struct(value)))
            .with_key(Some(Arc::new(Schema::string())), Some(Value::String("k".into())))
            .with_offset(17)
            .with_timestamp(1_700_000_000_000)
    }

    #[test]
    fn test_derive_schema_retypes_only_target() {
        let source = row_schema();
        let derived = derive_schema(&source, &RecastRule::new("name", Length)).unwrap();

        let names: Vec<&str> = derived.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["id", "name", "tag"]);
        assert_eq!(*derived.field("name").unwrap().schema, Schema::int32().optional());
        assert_eq!(derived.field("id").unwrap().schema, source.field("id").unwrap().schema);
        assert_eq!(derived.name.as_deref(), Some("row"));
        assert_eq!(derived.version, Some(2));
        assert_eq!(derived.doc.as_deref(), Some("a row"));
        assert_eq!(derived.parameters, source.parameters);
    }

    #[test]
    fn test_derive_schema_without_target_is_copy() {
        let source = row_schema();
        let derived = derive_schema(&source, &RecastRule::new("missing", Length)).unwrap();
        assert_eq!(derived, *source);
    }

    #[test]
    fn test_apply_converts_target_and_keeps_the_rest() {
        let transform = configured("name");
        let schema = row_schema();
        let input = row(&schema, Some("alice"));

        let output = transform.apply(input.clone()).unwrap();

        let value = output.value.as_ref().and_then(Value::as_struct).unwrap();
        assert_eq!(value.get("name"), Some(&Value::Int32(5)));
        assert_eq!(value.get("id"), Some(&Value::Int64(42)));
        assert_eq!(value.get("tag"), Some(&Value::String("t".into())));
        assert!(Arc::ptr_eq(value.schema(), output.value_schema.as_ref().unwrap()));

        assert_eq!(output.topic, input.topic);
        assert_eq!(output.partition, input.partition);
        assert_eq!(output.key, input.key);
        assert_eq!(output.key_schema, input.key_schema);
        assert_eq!(output.offset, input.offset);
        assert_eq!(output.timestamp_ms, input.timestamp_ms);
    }

    #[test]
    fn test_apply_null_optional_target() {
        let transform = configured("name");
        let output = transform.apply(row(&row_schema(), None)).unwrap();
        let value = output.value.as_ref().and_then(Value::as_struct).unwrap();
        assert_eq!(value.get("name"), Some(&Value::Null));
    }

    #[test]
    fn test_apply_passes_through_non_struct_schema() {
        let transform = configured("name");
        let primitive = Record::new(
            "rows",
            None,
            Some(Arc::new(Schema::string())),
            Some(Value::String("x".into())),
        );
        assert_eq!(transform.apply(primitive.clone()).unwrap(), primitive);

        let schemaless = Record::new("rows", None, None, Some(Value::String("x".into())));
        assert_eq!(transform.apply(schemaless.clone()).unwrap(), schemaless);
        assert_eq!(transform.cache().unwrap().len(), 0);
    }

    #[test]
    fn test_apply_missing_target_copies_record() {
        let transform = configured("missing");
        let schema = row_schema();
        let input = row(&schema, Some("alice"));
        let output = transform.apply(input.clone()).unwrap();
        assert_eq!(output.value_schema.as_deref(), Some(&*schema));
        assert_eq!(output.value, input.value);
    }

    #[test]
    fn test_apply_rejects_non_struct_value() {
        let transform = configured("name");
        let record = Record::new("rows", None, Some(row_schema()), Some(Value::String("x".into())));
        assert_eq!(transform.apply(record).unwrap_err().kind(), ErrorKind::TypeMismatch);

        let null = Record::new("rows", None, Some(row_schema()), None);
        let err = transform.apply(null).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert!(err.message().contains("null"));
    }

    #[test]
    fn test_conversion_error_names_field() {
        let transform = configured("id");
        let err = transform.apply(row(&row_schema(), Some("a"))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert!(err.message().starts_with("field 'id': "));
    }

    #[test]
    fn test_derived_schema_is_reused() {
        let transform = configured("name");
        let schema = row_schema();
        let a = transform.apply(row(&schema, Some("a"))).unwrap();
        let b = transform.apply(row(&schema, Some("bb"))).unwrap();
        assert!(Arc::ptr_eq(
            a.value_schema.as_ref().unwrap(),
            b.value_schema.as_ref().unwrap()
        ));
        let cache = transform.cache().unwrap();
        assert_eq!((cache.hits(), cache.misses()), (1, 1));
    }

    #[test]
    fn test_structural_cache_policy_from_config() {
        let mut transform = FieldRecast::<Length>::new();
        transform
            .configure(&ConfigValues::from_properties([
                ("field", "name"),
                ("cache_policy", "structural"),
                ("cache_size", "4"),
            ]))
            .unwrap();
        let cache = transform.cache().unwrap();
        assert_eq!(cache.policy(), CachePolicy::Structural);
        assert_eq!(cache.capacity(), 4);

        transform.apply(row(&row_schema(), Some("a"))).unwrap();
        transform.apply(row(&row_schema(), Some("b"))).unwrap();
        assert_eq!(transform.cache().unwrap().len(), 1);
    }

    #[test]
    fn test_bad_cache_options_fail_configure() {
        let mut transform = FieldRecast::<Length>::new();
        let err = transform
            .configure(&ConfigValues::from_properties([("field", "name"), ("cache_policy", "lru")]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);

        let err = transform
            .configure(
                &ConfigValues::new()
                    .with("field", ParamValue::Str("name".into()))
                    .with("cache_size", ParamValue::I64(-1)),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(transform.rule().is_none());
    }

    #[test]
    fn test_lifecycle() {
        let mut transform = FieldRecast::<Length>::new();
        let record = row(&row_schema(), Some("a"));
        assert_eq!(transform.apply(record.clone()).unwrap_err().kind(), ErrorKind::Logic);

        let err = transform.configure(&ConfigValues::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(transform.rule().is_none());

        let config = ConfigValues::from_properties([("field", "name")]);
        transform.configure(&config).unwrap();
        assert_eq!(transform.configure(&config).unwrap_err().kind(), ErrorKind::Logic);
        transform.apply(record.clone()).unwrap();

        transform.close();
        assert!(transform.is_closed());
        assert_eq!(transform.apply(record).unwrap_err().kind(), ErrorKind::Logic);
        assert_eq!(transform.configure(&config).unwrap_err().kind(), ErrorKind::Logic);
    }

    #[test]
    fn test_declared_params_include_cache_options() {
        let names: Vec<String> = FieldRecast::<Length>::declared_params()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, ["field", "cache_policy", "cache_size"]);
    }

    #[test]
    fn test_concurrent_apply_shares_one_schema() {
        let transform = configured("name");
        let schema = row_schema();

        let outputs: Vec<Record> = thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let record = row(&schema, Some(&"x".repeat(i + 1)));
                    let transform = &transform;
                    scope.spawn(move || transform.apply(record).unwrap())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let first = outputs[0].value_schema.as_ref().unwrap();
        assert!(outputs
            .iter()
            .all(|r| Arc::ptr_eq(r.value_schema.as_ref().unwrap(), first)));
        assert_eq!(transform.cache().unwrap().misses(), 1);
    }
}
