//! JSON-lines record codec used by the command-line host.
//!
//! One record per line:
//!
//! ```json
//! {"topic":"payments","partition":0,"offset":7,"timestamp":1700000000000,
//!  "schema":{"type":"struct","fields":[{"name":"amount","schema":{"type":"bytes"}}]},
//!  "value":{"amount":"cEiGDzqy"}}
//! ```
//!
//! Values are read against their schema: bytes are base64, decimals are
//! decimal strings, timestamps are epoch milliseconds and dates are epoch days.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number};

use recast_api::{LogicalType, PluginError, Record, Schema, SchemaType, Struct, Value};

/// Upper bound on the digits of a decimal read from JSON, after rescaling.
pub const MAX_DECIMAL_DIGITS: u64 = 4096;

/// Upper bound on distinct schemas a reader keeps shared handles for.
const MAX_INTERNED_SCHEMAS: usize = 256;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Envelope {
    #[serde(default)]
    topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    partition: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key_schema: Option<Schema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    schema: Option<Schema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<serde_json::Value>,
}

/// Decodes JSON records, handing out one shared `Arc<Schema>` per distinct
/// schema so downstream identity-keyed caches see a stable instance.
#[derive(Debug, Default)]
pub struct RecordReader {
    schemas: HashMap<Schema, Arc<Schema>>,
}

impl RecordReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode_line(&mut self, line: &str) -> Result<Record, PluginError> {
        let envelope: Envelope = serde_json::from_str(line)?;
        self.decode_envelope(envelope)
    }

    pub fn decode(&mut self, json: serde_json::Value) -> Result<Record, PluginError> {
        let envelope: Envelope = serde_json::from_value(json)?;
        self.decode_envelope(envelope)
    }

    fn decode_envelope(&mut self, envelope: Envelope) -> Result<Record, PluginError> {
        let key_schema = envelope.key_schema.map(|s| self.intern(s));
        let key = decode_part(envelope.key.as_ref(), key_schema.as_ref())
            .map_err(|e| e.with_context("key"))?;
        let value_schema = envelope.schema.map(|s| self.intern(s));
        let value = decode_part(envelope.value.as_ref(), value_schema.as_ref())
            .map_err(|e| e.with_context("value"))?;

        let mut record = Record::new(envelope.topic, envelope.partition, value_schema, value)
            .with_key(key_schema, key);
        record.offset = envelope.offset;
        record.timestamp_ms = envelope.timestamp;
        Ok(record)
    }

    fn intern(&mut self, schema: Schema) -> Arc<Schema> {
        if let Some(shared) = self.schemas.get(&schema) {
            return Arc::clone(shared);
        }
        if self.schemas.len() >= MAX_INTERNED_SCHEMAS {
            self.schemas.clear();
        }
        let shared = Arc::new(schema.clone());
        self.schemas.insert(schema, Arc::clone(&shared));
        shared
    }
}

fn decode_part(
    json: Option<&serde_json::Value>,
    schema: Option<&Arc<Schema>>,
) -> Result<Option<Value>, PluginError> {
    match (json, schema) {
        (None, _) => Ok(None),
        (Some(json), Some(schema)) => value_from_json(json, schema).map(Some),
        (Some(json), None) => schemaless_from_json(json).map(Some),
    }
}

/// Encode a record as one JSON object (see module docs for the layout).
pub fn encode_record(record: &Record) -> Result<serde_json::Value, PluginError> {
    let envelope = Envelope {
        topic: record.topic.clone(),
        partition: record.partition,
        offset: record.offset,
        timestamp: record.timestamp_ms,
        key_schema: record.key_schema.as_deref().cloned(),
        key: record.key.as_ref().map(value_to_json),
        schema: record.value_schema.as_deref().cloned(),
        value: record.value.as_ref().map(value_to_json),
    };
    Ok(serde_json::to_value(envelope)?)
}

/// Read `json` as a value of `schema`.
pub fn value_from_json(json: &serde_json::Value, schema: &Arc<Schema>) -> Result<Value, PluginError> {
    if json.is_null() {
        return if schema.optional {
            Ok(Value::Null)
        } else {
            Err(PluginError::type_mismatch(format!("null for required {schema}")))
        };
    }
    let mismatch = || {
        PluginError::type_mismatch(format!("expected {schema}, found JSON {json}"))
    };

    match schema.logical {
        Some(LogicalType::Decimal { scale }) => {
            let text = match json {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                _ => return Err(mismatch()),
            };
            return decimal_from_text(&text, scale).map(Value::Decimal);
        }
        Some(LogicalType::Timestamp) => {
            let millis = json.as_i64().ok_or_else(mismatch)?;
            return DateTime::from_timestamp_millis(millis)
                .map(Value::Timestamp)
                .ok_or_else(|| PluginError::encoding(format!("timestamp {millis} out of range")));
        }
        Some(LogicalType::Date) => {
            let days = json.as_i64().ok_or_else(mismatch)?;
            return TimeDelta::try_days(days)
                .and_then(|d| epoch_date().checked_add_signed(d))
                .map(Value::Date)
                .ok_or_else(|| PluginError::encoding(format!("date {days} out of range")));
        }
        None => {}
    }

    let int = || json.as_i64().ok_or_else(mismatch);
    let out_of_range = |_| PluginError::type_mismatch(format!("{json} out of range for {schema}"));

    let value = match schema.schema_type {
        SchemaType::Int8 => Value::Int8(i8::try_from(int()?).map_err(out_of_range)?),
        SchemaType::Int16 => Value::Int16(i16::try_from(int()?).map_err(out_of_range)?),
        SchemaType::Int32 => Value::Int32(i32::try_from(int()?).map_err(out_of_range)?),
        SchemaType::Int64 => Value::Int64(int()?),
        SchemaType::Float32 => Value::Float32(json.as_f64().ok_or_else(mismatch)? as f32),
        SchemaType::Float64 => Value::Float64(json.as_f64().ok_or_else(mismatch)?),
        SchemaType::Boolean => Value::Boolean(json.as_bool().ok_or_else(mismatch)?),
        SchemaType::String => Value::String(json.as_str().ok_or_else(mismatch)?.to_string()),
        SchemaType::Bytes => {
            let text = json.as_str().ok_or_else(mismatch)?;
            let bytes = BASE64
                .decode(text)
                .map_err(|e| PluginError::encoding(format!("invalid base64: {e}")))?;
            Value::Bytes(bytes)
        }
        SchemaType::Array => {
            let items_schema = schema
                .items
                .as_ref()
                .ok_or_else(|| PluginError::type_mismatch("array schema without items"))?;
            let items = json.as_array().ok_or_else(mismatch)?;
            Value::Array(
                items
                    .iter()
                    .map(|item| value_from_json(item, items_schema))
                    .collect::<Result<_, _>>()?,
            )
        }
        SchemaType::Struct => {
            let obj = json.as_object().ok_or_else(mismatch)?;
            if let Some(unknown) = obj.keys().find(|k| schema.field(k).is_none()) {
                return Err(PluginError::type_mismatch(format!(
                    "'{unknown}' is not a valid field name"
                )));
            }
            let mut value = Struct::new(Arc::clone(schema))?;
            for field in &schema.fields {
                let field_value = match obj.get(&field.name) {
                    Some(v) => value_from_json(v, &field.schema)
                        .map_err(|e| e.with_context(format!("field '{}'", field.name)))?,
                    None => Value::Null,
                };
                value.put(&field.name, field_value)?;
            }
            Value::Struct(value)
        }
    };
    Ok(value)
}

fn schemaless_from_json(json: &serde_json::Value) -> Result<Value, PluginError> {
    Ok(match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int64(i),
            None => Value::Float64(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(items) => Value::Array(
            items
                .iter()
                .map(schemaless_from_json)
                .collect::<Result<_, _>>()?,
        ),
        serde_json::Value::Object(_) => {
            return Err(PluginError::encoding(
                "object values need a struct schema",
            ));
        }
    })
}

/// Parse `text` as a decimal of exactly `scale`.
///
/// The exponent is checked before rescaling: `"1e20000000"` is a short
/// string but an enormous integer.
fn decimal_from_text(text: &str, scale: u32) -> Result<BigDecimal, PluginError> {
    let parsed = BigDecimal::from_str(text.trim())?;
    let (unscaled, exponent) = parsed.as_bigint_and_exponent();
    let digits = parsed.digits();
    let shift = i128::from(scale) - i128::from(exponent);
    let does_not_fit =
        || PluginError::encoding(format!("decimal {text} does not fit scale {scale}"));

    if shift > 0 && i128::from(digits) + shift > i128::from(MAX_DECIMAL_DIGITS) {
        return Err(PluginError::encoding(format!(
            "decimal {text} has more than {MAX_DECIMAL_DIGITS} digits at scale {scale}"
        )));
    }
    // Dropping more digits than the value has leaves only zero.
    if shift < 0 && -shift > i128::from(digits) {
        return if unscaled.bits() == 0 {
            Ok(BigDecimal::default().with_scale(i64::from(scale)))
        } else {
            Err(does_not_fit())
        };
    }

    let scaled = parsed.with_scale(i64::from(scale));
    if scaled != parsed {
        return Err(does_not_fit());
    }
    Ok(scaled)
}

/// Write `value` in the layout `value_from_json` reads.
pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Boolean(b) => serde_json::Value::Bool(*b),
        Value::Int8(v) => (*v).into(),
        Value::Int16(v) => (*v).into(),
        Value::Int32(v) => (*v).into(),
        Value::Int64(v) => (*v).into(),
        Value::Float32(v) => float(f64::from(*v)),
        Value::Float64(v) => float(*v),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Bytes(b) => serde_json::Value::String(BASE64.encode(b)),
        Value::Decimal(d) => serde_json::Value::String(d.to_plain_string()),
        Value::Timestamp(ts) => ts.timestamp_millis().into(),
        Value::Date(date) => date.signed_duration_since(epoch_date()).num_days().into(),
        Value::Array(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
        Value::Struct(s) => {
            let mut obj = Map::new();
            for (field, v) in s.iter() {
                obj.insert(field.name.clone(), value_to_json(v));
            }
            serde_json::Value::Object(obj)
        }
    }
}

// Non-finite floats have no JSON form.
fn float(v: f64) -> serde_json::Value {
    Number::from_f64(v).map_or(serde_json::Value::Null, serde_json::Value::Number)
}

fn epoch_date() -> NaiveDate {
    DateTime::UNIX_EPOCH.date_naive()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use recast_api::{ErrorKind, SchemaBuilder};

    use super::*;

    fn payment_line() -> serde_json::Value {
        json!({
            "topic": "payments",
            "partition": 1,
            "offset": 7,
            "timestamp": 1_700_000_000_000_i64,
            "key": "p-1",
            "key_schema": {"type": "string"},
            "schema": {
                "type": "struct",
                "name": "payment",
                "fields": [
                    {"name": "amount", "schema": {"type": "bytes"}},
                    {"name": "created", "schema": {"type": "int64", "optional": true}},
                    {"name": "note", "schema": {"type": "string", "optional": true}}
                ]
            },
            "value": {"amount": "cEiGDzqy", "created": 86401234}
        })
    }

    #[test]
    fn test_decode_struct_record() {
        let record = RecordReader::new().decode(payment_line()).unwrap();
        assert_eq!(record.topic, "payments");
        assert_eq!(record.partition, Some(1));
        assert_eq!(record.offset, Some(7));
        assert_eq!(record.timestamp_ms, Some(1_700_000_000_000));
        assert_eq!(record.key, Some(Value::String("p-1".into())));

        let value = record.value.as_ref().and_then(Value::as_struct).unwrap();
        assert_eq!(
            value.get("amount"),
            Some(&Value::Bytes(vec![0x70, 0x48, 0x86, 0x0F, 0x3A, 0xB2]))
        );
        assert_eq!(value.get("created"), Some(&Value::Int64(86_401_234)));
        assert_eq!(value.get("note"), Some(&Value::Null));
    }

    #[test]
    fn test_reader_shares_equal_schemas() {
        let mut reader = RecordReader::new();
        let a = reader.decode(payment_line()).unwrap();
        let b = reader.decode_line(&payment_line().to_string()).unwrap();
        assert!(Arc::ptr_eq(
            a.value_schema.as_ref().unwrap(),
            b.value_schema.as_ref().unwrap()
        ));
    }

    #[test]
    fn test_encode_logical_values() {
        let schema = Arc::new(
            SchemaBuilder::structure()
                .field("amount", Schema::decimal(4))
                .field("at", Schema::timestamp().optional())
                .field("day", Schema::date())
                .build()
                .unwrap(),
        );
        let value = Struct::new(Arc::clone(&schema))
            .unwrap()
            .with("amount", Value::Decimal(BigDecimal::from_str("-12345678910.1234").unwrap()))
            .unwrap()
            .with("at", Value::Timestamp(DateTime::from_timestamp_millis(86_401_234).unwrap()))
            .unwrap()
            .with("day", Value::Date(NaiveDate::from_ymd_opt(1970, 1, 11).unwrap()))
            .unwrap();
        let record = Record::new("t", None, Some(Arc::clone(&schema)), Some(Value::Struct(value)));

        let json = encode_record(&record).unwrap();
        assert_eq!(json["value"]["amount"], "-12345678910.1234");
        assert_eq!(json["value"]["at"], 86_401_234);
        assert_eq!(json["value"]["day"], 10);
        assert_eq!(json["schema"]["fields"][0]["schema"]["logical"]["scale"], 4);

        let back = RecordReader::new().decode(json).unwrap();
        assert_eq!(back.value, record.value);
    }

    #[test]
    fn test_decimal_must_fit_scale() {
        let schema = Arc::new(Schema::decimal(2));
        assert_eq!(
            value_from_json(&json!("1.5"), &schema).unwrap(),
            Value::Decimal(BigDecimal::from_str("1.50").unwrap())
        );
        let err = value_from_json(&json!("1.505"), &schema).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Encoding);
    }

    #[test]
    fn test_decimal_exponent_is_bounded() {
        let schema = Arc::new(Schema::decimal(2));
        let err = value_from_json(&json!("1e20000000"), &schema).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Encoding);
        let err = value_from_json(&json!("1e-20000000"), &schema).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Encoding);

        assert_eq!(
            value_from_json(&json!("0e-20000000"), &schema).unwrap(),
            Value::Decimal(BigDecimal::from_str("0.00").unwrap())
        );
        assert_eq!(
            value_from_json(&json!("1.5e3"), &schema).unwrap(),
            Value::Decimal(BigDecimal::from_str("1500.00").unwrap())
        );
        assert_eq!(
            value_from_json(&json!(1.5e3), &schema).unwrap(),
            Value::Decimal(BigDecimal::from_str("1500.00").unwrap())
        );
    }

    #[test]
    fn test_small_decimal_is_written_plain() {
        let value = Value::Decimal(BigDecimal::new(1.into(), 12));
        assert_eq!(value_to_json(&value), json!("0.000000000001"));
    }

    #[test]
    fn test_type_errors() {
        let int8 = Arc::new(Schema::int8());
        assert_eq!(value_from_json(&json!(300), &int8).unwrap_err().kind(), ErrorKind::TypeMismatch);
        assert_eq!(value_from_json(&json!("x"), &int8).unwrap_err().kind(), ErrorKind::TypeMismatch);
        assert_eq!(value_from_json(&json!(null), &int8).unwrap_err().kind(), ErrorKind::TypeMismatch);

        let bytes = Arc::new(Schema::bytes());
        assert_eq!(value_from_json(&json!("%%"), &bytes).unwrap_err().kind(), ErrorKind::Encoding);
    }

    #[test]
    fn test_unknown_struct_field_rejected() {
        let mut line = payment_line();
        line["value"]["bogus"] = json!(1);
        let err = RecordReader::new().decode(line).unwrap_err();
        assert!(err.message().contains("'bogus' is not a valid field name"));
    }

    #[test]
    fn test_schemaless_values() {
        let record = RecordReader::new()
            .decode(json!({"topic": "t", "value": [1, 2.5, "x", true]}))
            .unwrap();
        assert_eq!(
            record.value,
            Some(Value::Array(vec![
                Value::Int64(1),
                Value::Float64(2.5),
                Value::String("x".into()),
                Value::Boolean(true),
            ]))
        );
        assert!(RecordReader::new().decode(json!({"value": {"a": 1}})).is_err());
    }
}
