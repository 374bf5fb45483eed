use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::PluginError;

/// Name of the schema parameter that carries a decimal's scale.
pub const DECIMAL_SCALE_PARAM: &str = "scale";

// ═══════════════════════════════════════════════════════════════
//  Schema Type
// ═══════════════════════════════════════════════════════════════

/// Physical type of a schema. Logical types are layered on top of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaType {
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Boolean,
    String,
    Bytes,
    Array,
    Struct,
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SchemaType::Int8 => "int8",
            SchemaType::Int16 => "int16",
            SchemaType::Int32 => "int32",
            SchemaType::Int64 => "int64",
            SchemaType::Float32 => "float32",
            SchemaType::Float64 => "float64",
            SchemaType::Boolean => "boolean",
            SchemaType::String => "string",
            SchemaType::Bytes => "bytes",
            SchemaType::Array => "array",
            SchemaType::Struct => "struct",
        };
        f.write_str(name)
    }
}

/// Semantic type layered over a physical encoding.
///
/// - `Decimal { scale }`: `Bytes`, big-endian two's-complement unscaled value.
/// - `Timestamp`: `Int64`, milliseconds since the Unix epoch.
/// - `Date`: `Int32`, days since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "name")]
pub enum LogicalType {
    Decimal { scale: u32 },
    Timestamp,
    Date,
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalType::Decimal { scale } => write!(f, "decimal(scale={scale})"),
            LogicalType::Timestamp => f.write_str("timestamp"),
            LogicalType::Date => f.write_str("date"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Field & Schema
// ═══════════════════════════════════════════════════════════════

/// A single named field of a struct schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub schema: Arc<Schema>,
}

impl Field {
    pub fn new(name: impl Into<String>, schema: impl Into<Arc<Schema>>) -> Self {
        Self {
            name: name.into(),
            schema: schema.into(),
        }
    }
}

/// Schema of a record key or value.
///
/// Immutable once built; shared as `Arc<Schema>`. Equality and hashing are
/// structural, which is what the structural cache policy keys on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Schema {
    #[serde(rename = "type")]
    pub schema_type: SchemaType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical: Option<LogicalType>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, String>,
    /// Struct only. Order is significant.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,
    /// Array only: element schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Arc<Schema>>,
}

impl Schema {
    pub fn new(schema_type: SchemaType) -> Self {
        Self {
            schema_type,
            logical: None,
            optional: false,
            name: None,
            version: None,
            doc: None,
            parameters: BTreeMap::new(),
            fields: Vec::new(),
            items: None,
        }
    }

    pub fn int8() -> Self {
        Self::new(SchemaType::Int8)
    }

    pub fn int16() -> Self {
        Self::new(SchemaType::Int16)
    }

    pub fn int32() -> Self {
        Self::new(SchemaType::Int32)
    }

    pub fn int64() -> Self {
        Self::new(SchemaType::Int64)
    }

    pub fn float32() -> Self {
        Self::new(SchemaType::Float32)
    }

    pub fn float64() -> Self {
        Self::new(SchemaType::Float64)
    }

    pub fn boolean() -> Self {
        Self::new(SchemaType::Boolean)
    }

    pub fn string() -> Self {
        Self::new(SchemaType::String)
    }

    pub fn bytes() -> Self {
        Self::new(SchemaType::Bytes)
    }

    pub fn array(items: impl Into<Arc<Schema>>) -> Self {
        Self {
            items: Some(items.into()),
            ..Self::new(SchemaType::Array)
        }
    }

    /// Decimal logical schema: bytes carrying an unscaled value, scale in parameters.
    pub fn decimal(scale: u32) -> Self {
        let mut schema = Self::new(SchemaType::Bytes);
        schema.logical = Some(LogicalType::Decimal { scale });
        schema.name = Some("decimal".to_string());
        schema
            .parameters
            .insert(DECIMAL_SCALE_PARAM.to_string(), scale.to_string());
        schema
    }

    /// Timestamp logical schema: int64 milliseconds since the Unix epoch.
    pub fn timestamp() -> Self {
        let mut schema = Self::new(SchemaType::Int64);
        schema.logical = Some(LogicalType::Timestamp);
        schema.name = Some("timestamp".to_string());
        schema
    }

    /// Date logical schema: int32 days since the Unix epoch.
    pub fn date() -> Self {
        let mut schema = Self::new(SchemaType::Int32);
        schema.logical = Some(LogicalType::Date);
        schema.name = Some("date".to_string());
        schema
    }

    pub fn optional(self) -> Self {
        self.with_optional(true)
    }

    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn is_struct(&self) -> bool {
        self.schema_type == SchemaType::Struct
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.optional {
            f.write_str("optional ")?;
        }
        match (&self.logical, &self.items) {
            (Some(logical), _) => write!(f, "{logical}"),
            (None, Some(items)) => write!(f, "array<{items}>"),
            (None, None) => write!(f, "{}", self.schema_type),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  SchemaBuilder
// ═══════════════════════════════════════════════════════════════

/// Incremental builder for struct schemas.
///
/// Duplicate field names are reported by `build()`.
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    schema: Schema,
    duplicate: Option<String>,
}

impl SchemaBuilder {
    pub fn structure() -> Self {
        Self {
            schema: Schema::new(SchemaType::Struct),
            duplicate: None,
        }
    }

    /// Struct builder carrying over `source`'s name, version, doc, parameters
    /// and optional flag. Fields are not copied.
    pub fn copy_basics(source: &Schema) -> Self {
        let mut builder = Self::structure();
        builder.schema.name = source.name.clone();
        builder.schema.version = source.version;
        builder.schema.doc = source.doc.clone();
        builder.schema.parameters = source.parameters.clone();
        builder.schema.optional = source.optional;
        builder
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.schema.name = Some(name.into());
        self
    }

    pub fn version(mut self, version: i32) -> Self {
        self.schema.version = Some(version);
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.schema.doc = Some(doc.into());
        self
    }

    pub fn parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.schema.parameters.insert(key.into(), value.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.schema.optional = true;
        self
    }

    pub fn field(mut self, name: impl Into<String>, schema: impl Into<Arc<Schema>>) -> Self {
        let name = name.into();
        if self.schema.field(&name).is_some() {
            self.duplicate.get_or_insert(name);
        } else {
            self.schema.fields.push(Field::new(name, schema));
        }
        self
    }

    pub fn build(self) -> Result<Schema, PluginError> {
        if let Some(name) = self.duplicate {
            return Err(PluginError::logic(format!(
                "cannot create field because of field name duplication '{name}'"
            )));
        }
        Ok(self.schema)
    }
}
