//! `CastDecimal` plugin library.
//!
//! Exports [`recast_core::cast_decimal::CastDecimal`] over the recast C ABI.

use recast_core::CastDecimal;

recast_api::recast_abi_version_fn!();
recast_api::recast_config_params_fn!(CastDecimal);
recast_api::recast_create_transform_fn!(CastDecimal);

#[cfg(test)]
mod tests {
    use recast_api::config::{ConfigParam, ConfigValues};
    use recast_api::ffi::{take_error, RECAST_ABI_VERSION};
    use recast_api::transform::Transformation;

    use super::*;

    fn props(pairs: &[(&str, &str)]) -> ConfigValues {
        ConfigValues::from_properties(pairs.iter().copied())
    }

    #[test]
    fn test_abi_version() {
        assert_eq!(recast_abi_version(), RECAST_ABI_VERSION);
    }

    #[test]
    fn test_config_params() {
        let params = unsafe { Box::from_raw(recast_config_params() as *mut Vec<ConfigParam>) };
        let names: Vec<&str> = params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["field", "scale", "cache_policy", "cache_size"]);
        assert!(params[0].required && params[0].non_empty);
    }

    #[test]
    fn test_create_transform() {
        let config = props(&[("field", "fld1"), ("scale", "4")]);
        let result = unsafe { recast_create_transform(&config as *const ConfigValues as *const ()) };
        assert!(unsafe { take_error(&result) }.is_none());
        let transform =
            unsafe { Box::from_raw(result.plugin_ptr as *mut Box<dyn Transformation>) };
        assert_eq!(transform.name(), "CastDecimal");
    }

    #[test]
    fn test_create_reports_config_error() {
        let bad = props(&[("field", "")]);
        let result = unsafe { recast_create_transform(&bad as *const ConfigValues as *const ()) };
        assert!(result.plugin_ptr.is_null());
        let message = unsafe { take_error(&result) }.unwrap();
        assert!(message.contains("'field' must not be empty"));
    }
}
