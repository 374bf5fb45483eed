use tracing::{debug, info};

use recast_api::transform::Transformation;
use recast_api::Record;

use crate::config::PipelineConfig;
use crate::error::EngineError;
use crate::plugin_host::load_transform;

/// Named transform in a chain.
struct ChainEntry {
    name: String,
    transform: Box<dyn Transformation>,
}

/// Ordered sequence of configured transforms applied to every record.
///
/// ```ignore
/// let chain = TransformChain::new()
///     .add("cast_amount", cast_decimal)
///     .add("created", nullable_timestamp);
/// let out = chain.apply(record)?;
/// ```
#[derive(Default)]
pub struct TransformChain {
    entries: Vec<ChainEntry>,
}

impl TransformChain {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Load every transform declared in `config`, in order.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, EngineError> {
        let mut chain = Self::new();
        for t in &config.transforms {
            let options = t.config_json()?;
            let transform = load_transform(&t.plugin, options.as_ref())
                .map_err(|e| e.with_context(format!("transform '{}'", t.name)))?;
            chain = chain.add_boxed(t.name.clone(), Box::new(transform));
        }
        info!(transforms = chain.len(), "transform chain ready");
        Ok(chain)
    }

    /// Add a configured transform to the chain (builder pattern).
    #[allow(clippy::should_implement_trait)]
    pub fn add<T: Transformation + 'static>(self, name: impl Into<String>, transform: T) -> Self {
        self.add_boxed(name, Box::new(transform))
    }

    /// Add a boxed transform to the chain.
    pub fn add_boxed(mut self, name: impl Into<String>, transform: Box<dyn Transformation>) -> Self {
        self.entries.push(ChainEntry {
            name: name.into(),
            transform,
        });
        self
    }

    /// Apply all transforms in sequence. A failure is prefixed with the
    /// name of the transform that raised it.
    pub fn apply(&self, mut record: Record) -> Result<Record, EngineError> {
        for entry in &self.entries {
            record = entry
                .transform
                .apply(record)
                .map_err(|e| EngineError::Plugin(e.with_context(&entry.name)))?;
        }
        Ok(record)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    /// Close every transform, in reverse order.
    pub fn close(&mut self) {
        for entry in self.entries.iter_mut().rev() {
            debug!(transform = %entry.name, "closing");
            entry.transform.close();
        }
    }
}
