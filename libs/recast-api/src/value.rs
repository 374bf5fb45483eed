use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::PluginError;
use crate::schema::{Field, LogicalType, Schema, SchemaType};

/// Canonical value representation.
///
/// Logical types get their own variants so that a converted field carries
/// the semantic value (`Decimal`, `Timestamp`, `Date`), not the raw encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
    /// Opaque binary data.
    Bytes(Vec<u8>),
    /// Arbitrary-precision decimal; its scale must match the schema's.
    Decimal(BigDecimal),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Array(Vec<Value>),
    Struct(Struct),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Int8(_) => "int8",
            Value::Int16(_) => "int16",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::Float32(_) => "float32",
            Value::Float64(_) => "float64",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Decimal(_) => "decimal",
            Value::Timestamp(_) => "timestamp",
            Value::Date(_) => "date",
            Value::Array(_) => "array",
            Value::Struct(_) => "struct",
        }
    }

    pub fn as_struct(&self) -> Option<&Struct> {
        match self {
            Value::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// Whether this value may be stored under `schema`.
    pub fn conforms_to(&self, schema: &Schema) -> bool {
        match (self, schema.logical) {
            (Value::Null, _) => schema.optional,
            (Value::Decimal(d), Some(LogicalType::Decimal { scale })) => {
                d.as_bigint_and_exponent().1 == i64::from(scale)
            }
            (Value::Timestamp(_), Some(LogicalType::Timestamp)) => true,
            (Value::Date(_), Some(LogicalType::Date)) => true,
            (_, Some(_)) => false,
            (Value::Boolean(_), None) => schema.schema_type == SchemaType::Boolean,
            (Value::Int8(_), None) => schema.schema_type == SchemaType::Int8,
            (Value::Int16(_), None) => schema.schema_type == SchemaType::Int16,
            (Value::Int32(_), None) => schema.schema_type == SchemaType::Int32,
            (Value::Int64(_), None) => schema.schema_type == SchemaType::Int64,
            (Value::Float32(_), None) => schema.schema_type == SchemaType::Float32,
            (Value::Float64(_), None) => schema.schema_type == SchemaType::Float64,
            (Value::String(_), None) => schema.schema_type == SchemaType::String,
            (Value::Bytes(_), None) => schema.schema_type == SchemaType::Bytes,
            (Value::Array(items), None) => match (&schema.schema_type, &schema.items) {
                (SchemaType::Array, Some(item_schema)) => {
                    items.iter().all(|v| v.conforms_to(item_schema))
                }
                _ => false,
            },
            (Value::Struct(s), None) => {
                schema.is_struct() && (std::ptr::eq(s.schema().as_ref(), schema) || **s.schema() == *schema)
            }
            (Value::Decimal(_) | Value::Timestamp(_) | Value::Date(_), None) => false,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Struct
// ═══════════════════════════════════════════════════════════════

/// Structured value bound to exactly one struct schema.
///
/// Values are stored positionally, in `schema.fields` order. Every `put`
/// is validated against the field's schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Struct {
    schema: Arc<Schema>,
    values: Vec<Value>,
}

impl Struct {
    /// Create a struct with every field set to `Null`.
    pub fn new(schema: Arc<Schema>) -> Result<Self, PluginError> {
        if !schema.is_struct() {
            return Err(PluginError::type_mismatch(format!(
                "cannot create struct from {} schema",
                schema.schema_type
            )));
        }
        let values = vec![Value::Null; schema.fields.len()];
        Ok(Self { schema, values })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.schema.field_index(name).map(|i| &self.values[i])
    }

    /// Set `name` to `value`, checking it against the field's schema.
    pub fn put(&mut self, name: &str, value: Value) -> Result<(), PluginError> {
        let index = self.schema.field_index(name).ok_or_else(|| {
            PluginError::type_mismatch(format!("'{name}' is not a valid field name"))
        })?;
        let field = &self.schema.fields[index];
        if !value.conforms_to(&field.schema) {
            return Err(PluginError::type_mismatch(format!(
                "invalid value for field '{name}': expected {}, found {}",
                field.schema,
                value.type_name()
            )));
        }
        self.values[index] = value;
        Ok(())
    }

    /// Builder-style `put`.
    pub fn with(mut self, name: &str, value: Value) -> Result<Self, PluginError> {
        self.put(name, value)?;
        Ok(self)
    }

    /// Check that every field holds a value its schema accepts, which in
    /// particular rejects nulls in required fields.
    pub fn validate(&self) -> Result<(), PluginError> {
        for (field, value) in self.iter() {
            if !value.conforms_to(&field.schema) {
                return Err(PluginError::type_mismatch(format!(
                    "invalid value for field '{}': expected {}, found {}",
                    field.name,
                    field.schema,
                    value.type_name()
                )));
            }
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Field, &Value)> {
        self.schema.fields.iter().zip(self.values.iter())
    }
}
