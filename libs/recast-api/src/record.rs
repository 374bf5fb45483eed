use std::sync::Arc;

use crate::schema::Schema;
use crate::value::Value;

/// A record flowing through the pipeline.
///
/// Transforms only look at `value_schema` and `value`. Topic, partition, key,
/// offset and timestamp are carried through untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub topic: String,
    pub partition: Option<i32>,
    pub key_schema: Option<Arc<Schema>>,
    pub key: Option<Value>,
    pub value_schema: Option<Arc<Schema>>,
    pub value: Option<Value>,
    pub offset: Option<i64>,
    /// Timestamp in milliseconds (Unix epoch).
    pub timestamp_ms: Option<i64>,
}

impl Record {
    pub fn new(
        topic: impl Into<String>,
        partition: Option<i32>,
        value_schema: Option<Arc<Schema>>,
        value: Option<Value>,
    ) -> Self {
        Self {
            topic: topic.into(),
            partition,
            key_schema: None,
            key: None,
            value_schema,
            value,
            offset: None,
            timestamp_ms: None,
        }
    }

    pub fn with_key(mut self, key_schema: Option<Arc<Schema>>, key: Option<Value>) -> Self {
        self.key_schema = key_schema;
        self.key = key;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_timestamp(mut self, timestamp_ms: i64) -> Self {
        self.timestamp_ms = Some(timestamp_ms);
        self
    }

    /// A new record identical to this one except for the value and its schema.
    pub fn new_record(&self, value_schema: Option<Arc<Schema>>, value: Option<Value>) -> Self {
        Self {
            topic: self.topic.clone(),
            partition: self.partition,
            key_schema: self.key_schema.clone(),
            key: self.key.clone(),
            value_schema,
            value,
            offset: self.offset,
            timestamp_ms: self.timestamp_ms,
        }
    }
}
