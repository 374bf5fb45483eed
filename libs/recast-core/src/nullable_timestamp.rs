//! `NullableTimestamp` transform: unix milliseconds (`int64`) → optional timestamp.

use chrono::DateTime;
use recast_api::config::{ConfigParam, ConfigValues};
use recast_api::converter::FieldConverter;
use recast_api::{ConfigParams, Field, PluginError, Schema, SchemaType, Value};

use crate::recast::{FieldRecast, RecastRule, RecastStrategy};

#[derive(ConfigParams, Default)]
pub struct NullableTimestampConfig {
    #[param(
        importance = "high",
        required,
        non_empty,
        description = "The field containing the unix ts"
    )]
    pub field: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimestampStrategy;

impl FieldConverter for TimestampStrategy {
    /// Always optional, whatever the source field declares.
    fn target_schema(&self, _source: &Schema) -> Schema {
        Schema::timestamp().optional()
    }

    fn convert(&self, field: &Field, value: &Value) -> Result<Value, PluginError> {
        if field.schema.schema_type != SchemaType::Int64 {
            return Err(PluginError::type_mismatch(format!(
                "expected int64 field, found {}",
                field.schema
            )));
        }
        match value {
            Value::Null => Ok(Value::Null),
            Value::Int64(millis) => DateTime::from_timestamp_millis(*millis)
                .map(Value::Timestamp)
                .ok_or_else(|| {
                    PluginError::type_mismatch(format!(
                        "{millis} ms since epoch is outside the representable timestamp range"
                    ))
                }),
            other => Err(PluginError::type_mismatch(format!(
                "expected int64, found {}",
                other.type_name()
            ))),
        }
    }
}

impl RecastStrategy for TimestampStrategy {
    const NAME: &'static str = "NullableTimestamp";

    fn config_params() -> Vec<ConfigParam> {
        NullableTimestampConfig::config_params()
    }

    fn from_config(config: &ConfigValues) -> Result<RecastRule<Self>, PluginError> {
        let config = NullableTimestampConfig::from_config(config)?;
        Ok(RecastRule::new(config.field, TimestampStrategy))
    }
}

pub type NullableTimestamp = FieldRecast<TimestampStrategy>;
