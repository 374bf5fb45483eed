use crate::config::{ConfigParam, ConfigValues};
use crate::error::PluginError;
use crate::record::Record;

/// Single-record transformation, the unit a host chains together.
///
/// Lifecycle: construct → `configure` (once) → `apply` per record → `close`.
///
/// `apply` takes `&self` and may be called concurrently from several worker
/// threads on the same configured instance.
pub trait Transformation: Send + Sync {
    /// Short, stable name used in logs and error context.
    fn name(&self) -> &'static str;

    /// Parameters accepted by `configure`.
    fn config_params(&self) -> Vec<ConfigParam>;

    /// Configure the transform. Fails with `ErrorKind::Config` on missing or
    /// invalid options; the instance stays unusable until configured.
    fn configure(&mut self, config: &ConfigValues) -> Result<(), PluginError>;

    /// Transform one record. Records the transform does not apply to are
    /// returned unchanged.
    fn apply(&self, record: Record) -> Result<Record, PluginError>;

    /// Release resources. Terminal: the instance cannot be used afterwards.
    fn close(&mut self);
}
