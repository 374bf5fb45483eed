//! `CastDecimal` transform.
//!
//! Recasts a bytes field holding a big-endian two's-complement unscaled
//! integer into a `decimal(scale)` field. The scale is fixed per transform
//! instance; the bytes carry no scale of their own.

use recast_api::config::{ConfigParam, ConfigValues};
use recast_api::converter::FieldConverter;
use recast_api::{ConfigParams, Field, PluginError, Schema, SchemaType, Value};
use tracing::trace;

use crate::codec;
use crate::recast::{FieldRecast, RecastRule, RecastStrategy};

#[derive(ConfigParams, Default)]
pub struct CastDecimalConfig {
    #[param(
        importance = "high",
        required,
        non_empty,
        description = "The field containing the decimal logicalType"
    )]
    pub field: String,

    #[param(importance = "high", required, description = "The desired scale for the decimal")]
    pub scale: u32,
}

/// Bytes → `decimal(scale)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecimalStrategy {
    pub scale: u32,
}

impl FieldConverter for DecimalStrategy {
    fn target_schema(&self, source: &Schema) -> Schema {
        Schema::decimal(self.scale).with_optional(source.optional)
    }

    fn convert(&self, field: &Field, value: &Value) -> Result<Value, PluginError> {
        if field.schema.schema_type != SchemaType::Bytes {
            return Err(PluginError::type_mismatch(format!(
                "expected bytes field, found {}",
                field.schema
            )));
        }
        match value {
            Value::Null => Ok(Value::Null),
            Value::Bytes(bytes) => {
                let decimal = codec::decode(bytes, self.scale)?;
                trace!(field = %field.name, len = bytes.len(), %decimal, "decoded decimal");
                Ok(Value::Decimal(decimal))
            }
            other => Err(PluginError::type_mismatch(format!(
                "expected bytes, found {}",
                other.type_name()
            ))),
        }
    }
}

impl RecastStrategy for DecimalStrategy {
    const NAME: &'static str = "CastDecimal";

    fn config_params() -> Vec<ConfigParam> {
        CastDecimalConfig::config_params()
    }

    fn from_config(config: &ConfigValues) -> Result<RecastRule<Self>, PluginError> {
        let config = CastDecimalConfig::from_config(config)?;
        Ok(RecastRule::new(config.field, DecimalStrategy { scale: config.scale }))
    }
}

pub type CastDecimal = FieldRecast<DecimalStrategy>;
