use crate::error::PluginError;
use crate::schema::{Field, Schema};
use crate::value::Value;

/// Field-level value converter.
///
/// Solves one task: recast the value of a single field into another type.
/// The transform that owns the converter takes care of everything around
/// it (finding the field, rebuilding the struct, caching the schema).
pub trait FieldConverter: Send + Sync {
    /// Schema the converted field is declared with, given the source field's schema.
    fn target_schema(&self, source: &Schema) -> Schema;

    /// Convert the raw value of `field` (described by the *source* schema).
    ///
    /// Must map `Null` to `Null` for optional fields and must fail with
    /// `ErrorKind::TypeMismatch` when `field` or `value` is not of the raw
    /// type this converter understands.
    fn convert(&self, field: &Field, value: &Value) -> Result<Value, PluginError>;
}
