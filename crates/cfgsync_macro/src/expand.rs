//! Code generation for the `ConfigType` derive macro.
//!
//! The generated impl only names the schema and forwards the codec to
//! `::cfgsync::codec`, so all payload handling stays in the runtime crate.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, Error as SynError, Result as SynResult};

use crate::parse::{ConfigAttr, DEFAULT_NAMESPACE, to_snake_case};

/// Expands `#[derive(ConfigType)]` for one type.
pub fn expand(input: &DeriveInput) -> SynResult<TokenStream> {
    if !input.generics.params.is_empty() {
        return Err(SynError::new_spanned(
            &input.generics,
            "ConfigType cannot be derived for generic types",
        ));
    }

    let attr = ConfigAttr::parse_from(input)?;
    let ident = &input.ident;

    let def_name = attr
        .name
        .map_or_else(|| to_snake_case(&ident.to_string()), |lit| lit.value());

    let def_namespace = attr
        .namespace
        .map_or_else(|| DEFAULT_NAMESPACE.to_string(), |lit| lit.value());

    Ok(quote! {
        impl ::cfgsync::ConfigType for #ident {
            const DEF_NAME: &'static str = #def_name;
            const DEF_NAMESPACE: &'static str = #def_namespace;

            fn decode(
                value: &::cfgsync::ConfigValue,
            ) -> ::core::result::Result<Self, ::cfgsync::Error> {
                ::cfgsync::codec::decode_json(Self::DEF_NAME, value)
            }

            fn encode(&self) -> ::core::result::Result<::cfgsync::ConfigValue, ::cfgsync::Error> {
                ::cfgsync::codec::encode_json(Self::DEF_NAME, self)
            }
        }
    })
}
