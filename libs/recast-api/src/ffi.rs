use crate::config::{ConfigParam, ConfigValues};

/// Current ABI version. Host checks this against plugin's `recast_abi_version()`.
///
/// Bump whenever `Transformation`, `Record`, `Schema`, `Value`,
/// `ConfigValues` or `PluginCreateResult` change layout or signature.
pub const RECAST_ABI_VERSION: u32 = 1;

/// Symbol names a transform plugin exports.
pub const ABI_VERSION_SYMBOL: &[u8] = b"recast_abi_version";
pub const CONFIG_PARAMS_SYMBOL: &[u8] = b"recast_config_params";
pub const CREATE_TRANSFORM_SYMBOL: &[u8] = b"recast_create_transform";

/// FFI return struct from `recast_create_transform`.
#[repr(C)]
pub struct PluginCreateResult {
    /// Pointer to the created transform (Box<Box<dyn Transformation>>).
    /// Null if creation failed.
    pub plugin_ptr: *mut (),
    /// Pointer to a heap-allocated error string.
    /// Null if creation succeeded.
    pub error_ptr: *mut u8,
    /// Length of the error string.
    pub error_len: usize,
}

/// Type signature for `recast_abi_version` symbol.
pub type AbiVersionFn = unsafe extern "C" fn() -> u32;

/// Type signature for `recast_config_params` symbol.
/// Returns a pointer to a boxed `Vec<ConfigParam>`. Caller takes ownership.
pub type ConfigParamsFn = unsafe extern "C" fn() -> *mut ();

/// Type signature for `recast_create_transform`.
/// Takes a pointer to host-owned `ConfigValues` (plugin borrows, does not own).
/// The returned transform is already configured.
pub type CreatePluginFn = unsafe extern "C" fn(*const ()) -> PluginCreateResult;

/// Helper: create a successful `PluginCreateResult` from a trait object.
pub fn plugin_ok<T: ?Sized>(plugin: Box<Box<T>>) -> PluginCreateResult {
    PluginCreateResult {
        plugin_ptr: Box::into_raw(plugin) as *mut (),
        error_ptr: std::ptr::null_mut(),
        error_len: 0,
    }
}

/// Helper: create a failed `PluginCreateResult` from an error message.
pub fn plugin_err(msg: &str) -> PluginCreateResult {
    let bytes = msg.as_bytes().to_vec();
    let len = bytes.len();
    let ptr = Box::into_raw(bytes.into_boxed_slice()) as *mut u8;
    PluginCreateResult {
        plugin_ptr: std::ptr::null_mut(),
        error_ptr: ptr,
        error_len: len,
    }
}

/// Helper: return config params from plugin to host.
/// Host will reconstruct as `Box<Vec<ConfigParam>>` and take ownership.
pub fn config_params_ok(params: Vec<ConfigParam>) -> *mut () {
    Box::into_raw(Box::new(params)) as *mut ()
}

/// Cast an FFI config pointer to a `&ConfigValues` reference.
///
/// # Safety
///
/// `ptr` must be a valid pointer to a `ConfigValues` value owned by the host.
pub unsafe fn config_from_ptr<'a>(ptr: *const ()) -> &'a ConfigValues {
    unsafe { &*(ptr as *const ConfigValues) }
}

/// Take back the message of a failed `PluginCreateResult`, freeing it.
///
/// # Safety
///
/// `result` must come from `plugin_err` (or be a success result, in which
/// case `None` is returned) and must not be read again afterwards.
pub unsafe fn take_error(result: &PluginCreateResult) -> Option<String> {
    if result.error_ptr.is_null() || result.error_len == 0 {
        return None;
    }
    let boxed = unsafe {
        Box::from_raw(core::ptr::slice_from_raw_parts_mut(
            result.error_ptr,
            result.error_len,
        ))
    };
    Some(String::from_utf8_lossy(&boxed).into_owned())
}

/// Macro: export `recast_abi_version` function.
#[macro_export]
macro_rules! recast_abi_version_fn {
    () => {
        #[unsafe(no_mangle)]
        pub extern "C" fn recast_abi_version() -> u32 {
            $crate::ffi::RECAST_ABI_VERSION
        }
    };
}

/// Macro: export `recast_config_params` function.
///
/// `recast_config_params_fn!(MyTransform)` reports the parameters of a
/// default-constructed `MyTransform`, so the host can validate options
/// before creating the transform.
#[macro_export]
macro_rules! recast_config_params_fn {
    ($transform_ty:ty) => {
        #[unsafe(no_mangle)]
        pub extern "C" fn recast_config_params() -> *mut () {
            let transform = <$transform_ty>::default();
            $crate::ffi::config_params_ok($crate::transform::Transformation::config_params(
                &transform,
            ))
        }
    };
}

/// Macro: export `recast_create_transform` for a `Default + Transformation` type.
///
/// The transform is constructed and configured in one call; a configuration
/// failure is returned as the error string.
#[macro_export]
macro_rules! recast_create_transform_fn {
    ($transform_ty:ty) => {
        /// # Safety
        /// `config_ptr` must point to a live `ConfigValues` owned by the host.
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn recast_create_transform(
            config_ptr: *const (),
        ) -> $crate::ffi::PluginCreateResult {
            if config_ptr.is_null() {
                return $crate::ffi::plugin_err("null config pointer");
            }
            let config = unsafe { $crate::ffi::config_from_ptr(config_ptr) };
            let mut transform = <$transform_ty>::default();
            match $crate::transform::Transformation::configure(&mut transform, config) {
                Ok(()) => $crate::ffi::plugin_ok(Box::new(
                    Box::new(transform) as Box<dyn $crate::transform::Transformation>
                )),
                Err(e) => $crate::ffi::plugin_err(&e.to_string()),
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_err_round_trip() {
        let result = plugin_err("missing required parameter 'field'");
        assert!(result.plugin_ptr.is_null());
        let msg = unsafe { take_error(&result) };
        assert_eq!(msg.as_deref(), Some("missing required parameter 'field'"));
    }

    #[test]
    fn test_take_error_on_success_is_none() {
        let result = plugin_ok(Box::new(Box::new(5u8)));
        assert!(unsafe { take_error(&result) }.is_none());
        let _ = unsafe { Box::from_raw(result.plugin_ptr as *mut Box<u8>) };
    }
}
