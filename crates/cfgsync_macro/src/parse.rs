//! Attribute parsing for `#[config(name = "...", namespace = "...")]`.
//!
//! Uses syn's `ParseNestedMeta` so commas, trailing commas and error spans
//! are handled by syn. Options are accumulated first and validated in a
//! second step, so every invalid option in one attribute is reported.
//!
//! # Supported Syntax
//!
//! ```ignore
//! #[config(name = "foo")]                        // Explicit definition name
//! #[config(namespace = "my.app")]                // Explicit namespace
//! #[config(name = "foo", namespace = "my.app")]  // Both
//! ```

use syn::{DeriveInput, Error as SynError, LitStr, Result as SynResult};

/// Namespace used when `#[config(namespace = ...)]` is absent.
pub const DEFAULT_NAMESPACE: &str = "config";

/// Parsed struct-level `#[config(...)]` attribute.
#[derive(Default)]
pub struct ConfigAttr {
    /// Explicit definition name.
    pub name: Option<LitStr>,

    /// Explicit definition namespace.
    pub namespace: Option<LitStr>,
}

impl ConfigAttr {
    /// Parses every `#[config(...)]` attribute on the input.
    pub fn parse_from(input: &DeriveInput) -> SynResult<Self> {
        let mut attr = Self::default();
        let mut errors: Option<SynError> = None;

        for a in &input.attrs {
            if !a.path().is_ident("config") {
                continue;
            }

            let result = a.parse_nested_meta(|meta| {
                let slot = if meta.path.is_ident("name") {
                    &mut attr.name
                } else if meta.path.is_ident("namespace") {
                    &mut attr.namespace
                } else {
                    return Err(meta.error("unknown config option; expected `name` or `namespace`"));
                };

                if slot.is_some() {
                    return Err(meta.error("duplicate config option"));
                }

                let value: LitStr = meta.value()?.parse()?;
                *slot = Some(value);
                Ok(())
            });

            if let Err(err) = result {
                combine(&mut errors, err);
            }
        }

        for lit in [&attr.name, &attr.namespace].into_iter().flatten() {
            if let Err(err) = validate_identifier(lit) {
                combine(&mut errors, err);
            }
        }

        match errors {
            Some(err) => Err(err),
            None => Ok(attr),
        }
    }
}

/// Definition names and namespaces end up in key displays and file names.
fn validate_identifier(lit: &LitStr) -> SynResult<()> {
    let value = lit.value();

    if value.is_empty() {
        return Err(SynError::new(lit.span(), "config name must not be empty"));
    }

    if let Some(bad) = value.chars().find(|c| c.is_whitespace() || *c == ',') {
        return Err(SynError::new(
            lit.span(),
            format!("config name must not contain {bad:?}"),
        ));
    }

    Ok(())
}

fn combine(errors: &mut Option<SynError>, err: SynError) {
    match errors {
        Some(existing) => existing.combine(err),
        None => *errors = Some(err),
    }
}

/// Converts a type name to snake_case: `SearchConfig` -> `search_config`.
pub fn to_snake_case(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len() + 4);
    let mut prev_lower = false;

    for ch in ident.chars() {
        if ch.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
            prev_lower = false;
        } else {
            out.push(ch);
            prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        }
    }

    out
}
