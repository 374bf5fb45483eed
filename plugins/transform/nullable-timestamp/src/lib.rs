//! `NullableTimestamp` plugin library.

use recast_core::NullableTimestamp;

recast_api::recast_abi_version_fn!();
recast_api::recast_config_params_fn!(NullableTimestamp);
recast_api::recast_create_transform_fn!(NullableTimestamp);
