use recast_api::error::PluginError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("config error: {0}")]
    Config(String),

    #[error("plugin error: {0}")]
    Plugin(#[from] PluginError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("record {index}: {source}")]
    Record {
        index: usize,
        #[source]
        source: PluginError,
    },
}

impl EngineError {
    /// Add context to the error.
    ///
    /// For `Plugin` and `Record` variants, context is added to the inner `PluginError`.
    /// For `Config`, context is prepended to the message.
    pub fn with_context(self, ctx: impl std::fmt::Display) -> Self {
        match self {
            EngineError::Plugin(e) => EngineError::Plugin(e.with_context(ctx)),
            EngineError::Config(msg) => EngineError::Config(format!("{ctx}: {msg}")),
            EngineError::Record { index, source } => EngineError::Record {
                index,
                source: source.with_context(ctx),
            },
            other => other,
        }
    }

    /// The record-level error, if this failure concerns a single record.
    pub fn plugin_error(&self) -> Option<&PluginError> {
        match self {
            EngineError::Plugin(e) | EngineError::Record { source: e, .. } => Some(e),
            _ => None,
        }
    }
}
