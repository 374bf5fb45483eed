use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, Ident, LitStr, Type};

/// Derive macro for transform config parameter declarations.
///
/// Generates two methods on the annotated struct:
///
/// - `config_params() -> Vec<ConfigParam>`: parameter declarations for FFI export.
/// - `from_config(&ConfigValues) -> Result<Self, PluginError>`: reads typed values,
///   rejecting missing required parameters, values of the wrong type and, for
///   `non_empty` strings, empty values. All failures are `ErrorKind::Config`.
///
/// The struct must implement `Default` (defaults are used for non-required params).
///
/// # Example
///
/// ```ignore
/// #[derive(ConfigParams, Default)]
/// pub struct MyConfig {
///     #[param(importance = "high", required, non_empty, description = "Field to cast")]
///     pub field: String,
///
///     #[param(importance = "low", description = "Cache size")]
///     pub cache_size: usize,
/// }
/// ```
///
/// Supported field types: `bool`, `i64`, `u64`, `u32`, `usize`, `f64`, `String`.
#[proc_macro_derive(ConfigParams, attributes(param))]
pub fn derive_config_params(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match derive_impl(&input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

/// Parsed `#[param(...)]` attribute.
struct ParamAttr {
    importance: TokenStream2,
    description: String,
    required: bool,
    non_empty: bool,
}

/// How one supported Rust type maps onto the config model.
struct TypeMapping {
    param_type: TokenStream2,
    getter: Ident,
    /// Converts `__v` (the getter's output) into the field type; may use `?`.
    convert: TokenStream2,
    default_value: TokenStream2,
}

fn derive_impl(input: &DeriveInput) -> Result<TokenStream2, syn::Error> {
    let name = &input.ident;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "ConfigParams only supports structs with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "ConfigParams only supports structs",
            ))
        }
    };

    let mut config_param_tokens = Vec::new();
    let mut from_config_tokens = Vec::new();

    for field in fields {
        let field_name = field.ident.as_ref().ok_or_else(|| {
            syn::Error::new_spanned(field, "expected named field")
        })?;
        let field_name_str = field_name.to_string();
        let attr = parse_param_attr(field, field_name)?;

        let ty_name = type_ident_name(&field.ty).ok_or_else(|| {
            syn::Error::new_spanned(&field.ty, "unsupported type for ConfigParams")
        })?;
        if attr.non_empty && ty_name != "String" {
            return Err(syn::Error::new_spanned(
                field_name,
                "`non_empty` only applies to String parameters",
            ));
        }
        let mapping = type_mapping(&ty_name, field_name, &field_name_str, &field.ty)?;

        let TypeMapping {
            param_type,
            getter,
            convert,
            default_value,
        } = mapping;
        let ParamAttr {
            importance,
            description,
            required,
            non_empty,
        } = attr;

        let default_value = if required {
            quote! { None }
        } else {
            quote! { Some(#default_value) }
        };

        config_param_tokens.push(quote! {
            recast_api::config::ConfigParam {
                name: #field_name_str.to_string(),
                param_type: #param_type,
                importance: #importance,
                required: #required,
                non_empty: #non_empty,
                default: #default_value,
                description: #description.to_string(),
            }
        });

        let empty_check = if non_empty {
            quote! {
                if __v.trim().is_empty() {
                    return Err(recast_api::error::PluginError::config(
                        format!("parameter '{}' must not be empty", #field_name_str)
                    ));
                }
            }
        } else {
            quote! {}
        };

        let absent = if required {
            quote! {
                return Err(recast_api::error::PluginError::config(
                    format!("missing required parameter '{}'", #field_name_str)
                ));
            }
        } else {
            quote! {}
        };

        from_config_tokens.push(quote! {
            match __config.#getter(#field_name_str) {
                Some(__v) => {
                    #empty_check
                    result.#field_name = #convert;
                }
                None if __config.contains(#field_name_str) => {
                    return Err(recast_api::error::PluginError::config(format!(
                        "parameter '{}': expected {}",
                        #field_name_str, #param_type
                    )));
                }
                None => {
                    #absent
                }
            }
        });
    }

    Ok(quote! {
        impl #name {
            pub fn config_params() -> Vec<recast_api::config::ConfigParam> {
                let __defaults = Self::default();
                vec![
                    #(#config_param_tokens),*
                ]
            }

            pub fn from_config(
                __config: &recast_api::config::ConfigValues,
            ) -> Result<Self, recast_api::error::PluginError> {
                let mut result = Self::default();
                #(#from_config_tokens)*
                Ok(result)
            }
        }
    })
}

fn parse_param_attr(field: &syn::Field, field_name: &Ident) -> Result<ParamAttr, syn::Error> {
    let mut importance_str: Option<String> = None;
    let mut description: Option<String> = None;
    let mut required = false;
    let mut non_empty = false;

    for attr in &field.attrs {
        if !attr.path().is_ident("param") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("importance") {
                let value: LitStr = meta.value()?.parse()?;
                importance_str = Some(value.value());
            } else if meta.path.is_ident("description") {
                let value: LitStr = meta.value()?.parse()?;
                description = Some(value.value());
            } else if meta.path.is_ident("required") {
                required = true;
            } else if meta.path.is_ident("non_empty") {
                non_empty = true;
            } else {
                return Err(meta.error("unknown #[param] key"));
            }
            Ok(())
        })?;
    }

    let description = description.ok_or_else(|| {
        syn::Error::new_spanned(field_name, "missing #[param(description = \"...\")]")
    })?;

    let importance = match importance_str.as_deref().unwrap_or("medium") {
        "high" => quote! { recast_api::config::Importance::High },
        "medium" => quote! { recast_api::config::Importance::Medium },
        "low" => quote! { recast_api::config::Importance::Low },
        other => {
            return Err(syn::Error::new_spanned(
                field_name,
                format!("unknown importance '{other}' (expected 'high', 'medium' or 'low')"),
            ))
        }
    };

    Ok(ParamAttr {
        importance,
        description,
        required,
        non_empty,
    })
}

fn type_mapping(
    ty_name: &str,
    field_name: &Ident,
    field_name_str: &str,
    field_ty: &Type,
) -> Result<TypeMapping, syn::Error> {
    let ident = |s: &str| Ident::new(s, proc_macro2::Span::call_site());
    let out_of_range = |target: TokenStream2| {
        quote! {
            #target::try_from(__v).map_err(|_| recast_api::error::PluginError::config(
                format!("parameter '{}': value {} out of range", #field_name_str, __v)
            ))?
        }
    };

    let mapping = match ty_name {
        "bool" => TypeMapping {
            param_type: quote! { recast_api::config::ParamType::Bool },
            getter: ident("get_bool"),
            convert: quote! { __v },
            default_value: quote! { recast_api::config::ParamValue::Bool(__defaults.#field_name) },
        },
        "i64" => TypeMapping {
            param_type: quote! { recast_api::config::ParamType::I64 },
            getter: ident("get_i64"),
            convert: quote! { __v },
            default_value: quote! { recast_api::config::ParamValue::I64(__defaults.#field_name) },
        },
        "u64" => TypeMapping {
            param_type: quote! { recast_api::config::ParamType::U64 },
            getter: ident("get_u64"),
            convert: quote! { __v },
            default_value: quote! { recast_api::config::ParamValue::U64(__defaults.#field_name) },
        },
        "u32" => TypeMapping {
            param_type: quote! { recast_api::config::ParamType::U64 },
            getter: ident("get_u64"),
            convert: out_of_range(quote! { u32 }),
            default_value: quote! {
                recast_api::config::ParamValue::U64(u64::from(__defaults.#field_name))
            },
        },
        "usize" => TypeMapping {
            param_type: quote! { recast_api::config::ParamType::U64 },
            getter: ident("get_u64"),
            convert: out_of_range(quote! { usize }),
            default_value: quote! {
                recast_api::config::ParamValue::U64(__defaults.#field_name as u64)
            },
        },
        "f64" => TypeMapping {
            param_type: quote! { recast_api::config::ParamType::F64 },
            getter: ident("get_f64"),
            convert: quote! { __v },
            default_value: quote! { recast_api::config::ParamValue::F64(__defaults.#field_name) },
        },
        "String" => TypeMapping {
            param_type: quote! { recast_api::config::ParamType::Str },
            getter: ident("get_str"),
            convert: quote! { __v.to_string() },
            default_value: quote! {
                recast_api::config::ParamValue::Str(__defaults.#field_name.clone())
            },
        },
        _ => {
            return Err(syn::Error::new_spanned(
                field_ty,
                format!(
                    "unsupported type '{ty_name}' (expected bool, i64, u64, u32, usize, f64, String)"
                ),
            ))
        }
    };
    Ok(mapping)
}

/// Extract the last path segment ident name from a type (e.g. `u64`, `String`).
fn type_ident_name(ty: &Type) -> Option<String> {
    if let Type::Path(type_path) = ty {
        type_path
            .path
            .segments
            .last()
            .map(|seg| seg.ident.to_string())
    } else {
        None
    }
}
