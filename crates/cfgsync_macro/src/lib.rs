//! # cfgsync_macro
//!
//! Procedural macro implementation for the `cfgsync` crate.
//!
//! This crate provides the `#[derive(ConfigType)]` procedural macro that
//! binds a Rust type to a config schema identity (definition name and
//! namespace) and wires its payload codec. It is a proc-macro crate and can
//! only export procedural macros.
//!
//! **Note:** Users should depend on the `cfgsync` crate, not this one directly.
//! The `cfgsync` crate re-exports this macro along with runtime types.
//!
//! # Module Structure
//!
//! - `parse` - Attribute parsing for `#[config(...)]`
//! - `expand` - Code generation for the `ConfigType` impl

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod expand;
mod parse;

/// Derive macro implementing `cfgsync::ConfigType`.
///
/// The type must also implement `serde::Serialize` and
/// `serde::Deserialize`; payloads are decoded from and encoded to JSON.
///
/// # Struct Attributes
///
/// Optional `#[config(...)]` attribute on the type:
///
/// | Attribute | Description |
/// |-----------|-------------|
/// | `name = "foo"` | Definition name (default: snake_case type name) |
/// | `namespace = "bar"` | Definition namespace (default: `config`) |
///
/// # Example
///
/// ```ignore
/// use cfgsync::ConfigType;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(ConfigType, Serialize, Deserialize)]
/// #[config(name = "search", namespace = "vespa.search")]
/// struct SearchConfig {
///     threads: u32,
///     index_dir: String,
/// }
///
/// assert_eq!(SearchConfig::DEF_NAME, "search");
/// ```
#[proc_macro_derive(ConfigType, attributes(config))]
pub fn derive_config_type(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    // On error, convert to a compile_error!() invocation for better error messages
    expand::expand(&input)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}
