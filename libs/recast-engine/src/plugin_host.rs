use std::collections::{HashMap, HashSet};
use std::path::Path;

use libloading::{Library, Symbol};
use tracing::info;

use recast_api::config::{ConfigParam, ConfigValues, ParamType, ParamValue};
use recast_api::ffi::{
    take_error, AbiVersionFn, ConfigParamsFn, CreatePluginFn, PluginCreateResult,
    ABI_VERSION_SYMBOL, CONFIG_PARAMS_SYMBOL, CREATE_TRANSFORM_SYMBOL, RECAST_ABI_VERSION,
};
use recast_api::transform::Transformation;
use recast_api::{PluginError, Record};

use crate::error::EngineError;

/// A loaded transform plugin library with ABI version already verified.
pub struct PluginLib {
    lib: Library,
    config_params_fn: ConfigParamsFn,
    create_fn: CreatePluginFn,
}

impl PluginLib {
    /// Load a plugin shared library from `path`, verify ABI version, resolve symbols.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let lib = unsafe { Library::new(path) }.map_err(|e| {
            EngineError::Config(format!("failed to load plugin '{}': {e}", path.display()))
        })?;

        let abi_fn: Symbol<AbiVersionFn> =
            unsafe { lib.get(ABI_VERSION_SYMBOL) }.map_err(|e| {
                EngineError::Config(format!(
                    "plugin '{}' missing recast_abi_version symbol: {e}",
                    path.display()
                ))
            })?;

        let plugin_abi = unsafe { abi_fn() };
        if plugin_abi != RECAST_ABI_VERSION {
            return Err(EngineError::Config(format!(
                "plugin '{}' ABI version mismatch: plugin={plugin_abi}, host={RECAST_ABI_VERSION}",
                path.display()
            )));
        }

        let config_params_fn: ConfigParamsFn =
            *unsafe { lib.get::<ConfigParamsFn>(CONFIG_PARAMS_SYMBOL) }.map_err(|e| {
                EngineError::Config(format!(
                    "plugin '{}' missing recast_config_params symbol: {e}",
                    path.display()
                ))
            })?;

        let create_fn: CreatePluginFn =
            *unsafe { lib.get::<CreatePluginFn>(CREATE_TRANSFORM_SYMBOL) }.map_err(|e| {
                EngineError::Config(format!(
                    "plugin '{}' missing recast_create_transform symbol: {e}",
                    path.display()
                ))
            })?;

        Ok(Self {
            lib,
            config_params_fn,
            create_fn,
        })
    }

    /// Get plugin's declared config parameters.
    pub fn config_params(&self) -> Vec<ConfigParam> {
        let ptr = unsafe { (self.config_params_fn)() };
        if ptr.is_null() {
            return Vec::new();
        }
        unsafe { *Box::from_raw(ptr as *mut Vec<ConfigParam>) }
    }

    /// Create and configure a transform from validated ConfigValues.
    ///
    /// The returned transform borrows code from this library, so it is
    /// bundled with it and unloads it when dropped.
    pub fn create(self, config: &ConfigValues) -> Result<LoadedTransform, EngineError> {
        let result: PluginCreateResult =
            unsafe { (self.create_fn)(config as *const ConfigValues as *const ()) };

        if result.plugin_ptr.is_null() {
            let msg = unsafe { take_error(&result) }.unwrap_or_else(|| "unknown error".into());
            return Err(EngineError::Config(format!("plugin create failed: {msg}")));
        }

        // Safety: the plugin returned a Box<Box<dyn Transformation>>, we reconstruct it.
        let transform = unsafe { *Box::from_raw(result.plugin_ptr as *mut Box<dyn Transformation>) };
        Ok(LoadedTransform {
            transform,
            _lib: self.lib,
        })
    }
}

/// A transform created by a plugin, kept together with the library it lives in.
pub struct LoadedTransform {
    // Field order matters: the transform must drop before its library unloads.
    transform: Box<dyn Transformation>,
    _lib: Library,
}

impl Transformation for LoadedTransform {
    fn name(&self) -> &'static str {
        self.transform.name()
    }

    fn config_params(&self) -> Vec<ConfigParam> {
        self.transform.config_params()
    }

    fn configure(&mut self, config: &ConfigValues) -> Result<(), PluginError> {
        self.transform.configure(config)
    }

    fn apply(&self, record: Record) -> Result<Record, PluginError> {
        self.transform.apply(record)
    }

    fn close(&mut self) {
        self.transform.close()
    }
}

// ---------------------------------------------------------------------------
// Config parsing & validation (format-independent)
// ---------------------------------------------------------------------------

/// Parse plugin config into format-independent key-value pairs.
///
/// `config` is a format-independent `serde_json::Value` (already converted
/// from TOML by the config loader).
///
/// - Rejects unknown keys (not declared in `params`).
/// - Converts `serde_json::Value` → `ParamValue` based on declared `ParamType`;
///   numbers and booleans are also accepted as strings.
///
/// Returns only the keys that are present in the config source.
/// Defaults and required-checks are handled by `validate_and_build`.
pub fn parse_plugin_config(
    config: Option<&serde_json::Value>,
    params: &[ConfigParam],
) -> Result<HashMap<String, ParamValue>, EngineError> {
    let obj = match config {
        Some(serde_json::Value::Object(map)) => map,
        Some(_) => {
            return Err(EngineError::Config(
                "plugin config must be a table/object".into(),
            ));
        }
        None => return Ok(HashMap::new()),
    };

    let known: HashSet<&str> = params.iter().map(|p| p.name.as_str()).collect();
    for key in obj.keys() {
        if !known.contains(key.as_str()) {
            return Err(EngineError::Config(format!("unknown parameter '{key}'")));
        }
    }

    let mut result = HashMap::new();
    for param in params {
        if let Some(v) = obj.get(&param.name) {
            let pv = value_to_param_value(v, param)?;
            result.insert(param.name.clone(), pv);
        }
    }

    Ok(result)
}

/// Build `ConfigValues` from parsed key-value pairs (format-independent).
///
/// For each declared param:
/// - If present in `parsed`: use the value (empty strings rejected for `non_empty`).
/// - If absent with default: use default value.
/// - If absent and required: return error.
pub fn validate_and_build(
    parsed: &HashMap<String, ParamValue>,
    params: &[ConfigParam],
) -> Result<ConfigValues, EngineError> {
    let mut values = ConfigValues::new();

    for param in params {
        match parsed.get(&param.name) {
            Some(ParamValue::Str(s)) if param.non_empty && s.trim().is_empty() => {
                return Err(EngineError::Config(format!(
                    "parameter '{}' must not be empty",
                    param.name
                )));
            }
            Some(v) => values.set(&param.name, v.clone()),
            None => {
                if let Some(ref default) = param.default {
                    values.set(&param.name, default.clone());
                } else if param.required {
                    return Err(EngineError::Config(format!(
                        "missing required parameter '{}'",
                        param.name
                    )));
                }
            }
        }
    }

    Ok(values)
}

/// `parse_plugin_config` followed by `validate_and_build`.
pub fn build_config_values(
    config: Option<&serde_json::Value>,
    params: &[ConfigParam],
) -> Result<ConfigValues, EngineError> {
    let raw = parse_plugin_config(config, params)?;
    validate_and_build(&raw, params)
}

/// Convert a single value to a ParamValue according to the declared type.
fn value_to_param_value(
    val: &serde_json::Value,
    param: &ConfigParam,
) -> Result<ParamValue, EngineError> {
    let expected = || {
        EngineError::Config(format!(
            "parameter '{}': expected {}",
            param.name, param.param_type
        ))
    };
    let text = val.as_str().map(str::trim);

    match param.param_type {
        ParamType::Bool => val
            .as_bool()
            .or_else(|| text.and_then(|s| s.parse().ok()))
            .map(ParamValue::Bool)
            .ok_or_else(expected),
        ParamType::I64 => val
            .as_i64()
            .or_else(|| text.and_then(|s| s.parse().ok()))
            .map(ParamValue::I64)
            .ok_or_else(expected),
        ParamType::U64 => {
            // Covers positive integers from any source; negative ones fail here.
            val.as_u64()
                .or_else(|| text.and_then(|s| s.parse().ok()))
                .map(ParamValue::U64)
                .ok_or_else(expected)
        }
        ParamType::F64 => val
            .as_f64()
            .or_else(|| text.and_then(|s| s.parse().ok()))
            .map(ParamValue::F64)
            .ok_or_else(expected),
        ParamType::Str => Ok(ParamValue::Str(flatten_value(val))),
    }
}

/// Flatten a value into a string for flat config transport.
///
/// Scalars are converted directly (no quoting).
/// Arrays and objects are serialized as JSON strings.
fn flatten_value(val: &serde_json::Value) -> String {
    match val {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Null => String::new(),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => val.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load a transform plugin from a shared library.
///
/// 1. Load the library, verify ABI version.
/// 2. Call `recast_config_params()` to get declared params.
/// 3. Parse config → raw values, validate, build ConfigValues.
/// 4. Call `recast_create_transform(&config_values)`; the transform comes back configured.
pub fn load_transform(
    path: &Path,
    config: Option<&serde_json::Value>,
) -> Result<LoadedTransform, EngineError> {
    let lib = PluginLib::load(path)?;
    let params = lib.config_params();
    let config_values = build_config_values(config, &params)?;
    let transform = lib.create(&config_values)?;
    info!(
        plugin = %path.display(),
        transform = transform.name(),
        params = config_values.len(),
        "transform plugin loaded"
    );
    Ok(transform)
}

/// Validate `config` against `transform`'s declared params and configure it.
///
/// In-process counterpart of `load_transform`, for transforms linked into the host.
pub fn configure_transform(
    transform: &mut dyn Transformation,
    config: Option<&serde_json::Value>,
) -> Result<(), EngineError> {
    let params = transform.config_params();
    let values = build_config_values(config, &params)?;
    transform
        .configure(&values)
        .map_err(|e| EngineError::from(e).with_context(transform.name()))
}

#[cfg(test)]
mod tests {
    use recast_api::config::Importance;
    use serde_json::json;

    use super::*;

    fn param(name: &str, param_type: ParamType, required: bool) -> ConfigParam {
        ConfigParam {
            name: name.into(),
            param_type,
            importance: Importance::High,
            required,
            non_empty: param_type == ParamType::Str && required,
            default: None,
            description: String::new(),
        }
    }

    fn decimal_params() -> Vec<ConfigParam> {
        let mut size = param("cache_size", ParamType::U64, false);
        size.default = Some(ParamValue::U64(16));
        vec![
            param("field", ParamType::Str, true),
            param("scale", ParamType::U64, true),
            size,
        ]
    }

    #[test]
    fn test_build_fills_defaults() {
        let values =
            build_config_values(Some(&json!({"field": "amount", "scale": 4})), &decimal_params())
                .unwrap();
        assert_eq!(values.get_str("field"), Some("amount"));
        assert_eq!(values.get_u64("scale"), Some(4));
        assert_eq!(values.get_u64("cache_size"), Some(16));
    }

    #[test]
    fn test_numeric_strings_accepted() {
        let values =
            build_config_values(Some(&json!({"field": "amount", "scale": " 4 "})), &decimal_params())
                .unwrap();
        assert_eq!(values.get("scale"), Some(&ParamValue::U64(4)));
    }

    #[test]
    fn test_rejections() {
        let params = decimal_params();
        let cases = [
            (json!({"field": "a", "scale": 4, "extra": 1}), "unknown parameter 'extra'"),
            (json!({"field": "a"}), "missing required parameter 'scale'"),
            (json!({"field": "", "scale": 4}), "parameter 'field' must not be empty"),
            (json!({"field": "a", "scale": -1}), "parameter 'scale': expected non-negative integer"),
            (json!({"field": "a", "scale": ""}), "parameter 'scale': expected non-negative integer"),
            (json!(["field"]), "plugin config must be a table/object"),
        ];
        for (config, expected) in cases {
            let err = build_config_values(Some(&config), &params).unwrap_err();
            assert!(err.to_string().contains(expected), "{config}: {err}");
        }
    }

    #[test]
    fn test_absent_config_needs_no_required_params() {
        let params = vec![param("verbose", ParamType::Bool, false)];
        assert!(build_config_values(None, &params).unwrap().is_empty());
        assert!(build_config_values(None, &decimal_params()).is_err());
    }

    #[test]
    fn test_flatten_non_string_into_str_param() {
        let params = vec![param("field", ParamType::Str, true)];
        let values = build_config_values(Some(&json!({"field": 12})), &params).unwrap();
        assert_eq!(values.get_str("field"), Some("12"));
    }

    #[test]
    fn test_load_missing_library_is_config_error() {
        let Err(err) = PluginLib::load(Path::new("/nonexistent/libtransform_missing.so")) else {
            panic!("loading a missing library succeeded");
        };
        assert!(matches!(err, EngineError::Config(_)));
        assert!(err.to_string().contains("libtransform_missing.so"));
    }
}
