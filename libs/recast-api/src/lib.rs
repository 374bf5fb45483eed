//! Types shared by the recast host and its transform plugins.
//!
//! Schemas, values and records describe the data; [`transform::Transformation`]
//! and [`converter::FieldConverter`] are the seams plugins implement;
//! [`ffi`] is the dynamic-library contract between host and plugin.

pub mod config;
pub mod converter;
pub mod error;
pub mod ffi;
pub mod record;
pub mod schema;
pub mod transform;
pub mod value;

pub use error::{ErrorKind, PluginError};
pub use record::Record;
pub use recast_api_derive::ConfigParams;
pub use schema::{Field, LogicalType, Schema, SchemaBuilder, SchemaType};
pub use value::{Struct, Value};
