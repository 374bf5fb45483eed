//! Typed field recast engine.
//!
//! - [`codec`]: signed big-integer ⇄ minimal two's-complement bytes, the
//!   decimal wire layout used across the data-interchange ecosystem.
//! - [`cache`]: bounded, concurrency-safe memo of derived schemas.
//! - [`recast`]: generic "recast one top-level field" transform,
//!   parameterised over a [`recast::RecastStrategy`].
//! - [`cast_decimal`], [`nullable_timestamp`]: the two strategies shipped
//!   as plugins.

pub mod cache;
pub mod cast_decimal;
pub mod codec;
pub mod nullable_timestamp;
pub mod recast;

pub use cache::{CachePolicy, SchemaCache, DEFAULT_SCHEMA_CACHE_CAPACITY};
pub use cast_decimal::CastDecimal;
pub use codec::Decimal96;
pub use nullable_timestamp::NullableTimestamp;
pub use recast::{derive_schema, FieldRecast, RecastRule, RecastStrategy};
