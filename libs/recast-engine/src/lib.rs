//! Host side of the recast pipeline: loads transform plugins, validates
//! their options and runs records through the configured chain.

pub mod chain;
pub mod config;
pub mod error;
pub mod json;
pub mod plugin_host;

pub use chain::TransformChain;
pub use config::{ErrorPolicy, PipelineConfig, TransformConfig};
pub use error::EngineError;
pub use json::RecordReader;
