//! Payload formats understood by the local sources.
//!
//! Every format is parsed into a JSON document and stored as a compact JSON
//! [`ConfigValue`], so a config reads the same whether it came from a
//! `.json`, `.toml` or `.yaml` file.
//!
//! | Format | Feature | Extensions |
//! |--------|---------|------------|
//! | JSON | always | `.json` |
//! | TOML | `toml` | `.toml` |
//! | YAML | `yaml` | `.yaml`, `.yml` |

use std::path::Path;

use miette::{Diagnostic, NamedSource, SourceSpan};

use crate::ConfigValue;

/// A payload format.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PayloadFormat {
    /// JSON (`.json`).
    Json,

    /// TOML (`.toml`).
    #[cfg(feature = "toml")]
    Toml,

    /// YAML (`.yaml` or `.yml`).
    #[cfg(feature = "yaml")]
    Yaml,
}

impl PayloadFormat {
    /// Detects the format from a file extension.
    ///
    /// Returns `None` for unknown extensions or formats whose feature is off.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        Self::from_extension(ext)
    }

    /// Detects the format from a bare extension such as `"yml"`.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "json" => Some(PayloadFormat::Json),

            #[cfg(feature = "toml")]
            "toml" => Some(PayloadFormat::Toml),

            #[cfg(feature = "yaml")]
            "yaml" | "yml" => Some(PayloadFormat::Yaml),

            _ => None,
        }
    }

    /// File extensions tried by [`DirSource`](crate::source::DirSource), in order.
    #[must_use]
    pub fn extensions() -> &'static [&'static str] {
        &[
            "json",
            #[cfg(feature = "toml")]
            "toml",
            #[cfg(feature = "yaml")]
            "yaml",
            #[cfg(feature = "yaml")]
            "yml",
        ]
    }

    /// Format name for error messages.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            PayloadFormat::Json => "JSON",

            #[cfg(feature = "toml")]
            PayloadFormat::Toml => "TOML",

            #[cfg(feature = "yaml")]
            PayloadFormat::Yaml => "YAML",
        }
    }

    /// Parses `content` into a canonical JSON payload.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError`] pointing at the offending location when the
    /// parser reports one.
    pub fn parse(&self, content: &str) -> Result<ConfigValue, PayloadError> {
        self.parse_named("<string>", content)
    }

    /// Like [`parse`](Self::parse), naming the source in diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError`] if `content` is not valid in this format.
    pub fn parse_named(&self, name: &str, content: &str) -> Result<ConfigValue, PayloadError> {
        let json = self.to_json(name, content)?;
        Ok(ConfigValue::from_json(&json))
    }

    fn to_json(&self, name: &str, content: &str) -> Result<serde_json::Value, PayloadError> {
        match self {
            PayloadFormat::Json => serde_json::from_str(content).map_err(|e| {
                let offset = line_col_to_offset(content, e.line(), e.column());
                PayloadError::at(*self, name, content, offset_to_span(offset, content), e.to_string())
            }),

            #[cfg(feature = "toml")]
            PayloadFormat::Toml => {
                let value: toml::Value = toml::from_str(content).map_err(|e| match e.span() {
                    Some(span) => PayloadError::at(
                        *self,
                        name,
                        content,
                        SourceSpan::new(span.start.into(), span.end - span.start),
                        e.message().to_string(),
                    ),
                    None => PayloadError::without_span(*self, e.to_string()),
                })?;
                Ok(toml_to_json(value))
            }

            #[cfg(feature = "yaml")]
            PayloadFormat::Yaml => serde_saphyr::from_str(content).map_err(|e| {
                let message = e.to_string();
                match extract_location(&message) {
                    Some((line, col)) => {
                        let offset = line_col_to_offset(content, line, col);
                        PayloadError::at(*self, name, content, offset_to_span(offset, content), message)
                    }
                    None => PayloadError::without_span(*self, message),
                }
            }),
        }
    }
}

/// A payload that could not be parsed.
#[derive(Debug, Diagnostic, thiserror::Error)]
pub enum PayloadError {
    /// Parse error with a location in the source text.
    #[error("{format} parse error in {name}")]
    #[diagnostic(code(cfgsync::payload::parse_error))]
    Parse {
        /// Format name.
        format: &'static str,

        /// Name of the parsed text (usually a file path).
        name: String,

        /// The text, for display.
        #[source_code]
        src: NamedSource<String>,

        /// Where parsing failed.
        #[label("{message}")]
        span: SourceSpan,

        /// What went wrong.
        message: String,

        /// How to fix it.
        #[help]
        help: String,
    },

    /// Parse error without a usable location.
    #[error("{format} parse error: {message}")]
    #[diagnostic(code(cfgsync::payload::parse_error))]
    ParseNoSpan {
        /// Format name.
        format: &'static str,

        /// What went wrong.
        message: String,

        /// How to fix it.
        #[help]
        help: String,
    },
}

impl PayloadError {
    fn at(
        format: PayloadFormat,
        name: &str,
        content: &str,
        span: SourceSpan,
        message: String,
    ) -> Self {
        PayloadError::Parse {
            format: format.name(),
            name: name.to_string(),
            src: NamedSource::new(name, content.to_string()),
            span,
            message,
            help: help_for(format).to_string(),
        }
    }

    fn without_span(format: PayloadFormat, message: String) -> Self {
        PayloadError::ParseNoSpan {
            format: format.name(),
            message,
            help: help_for(format).to_string(),
        }
    }

    /// The parser's description of the problem.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            PayloadError::Parse { message, .. } | PayloadError::ParseNoSpan { message, .. } => {
                message
            }
        }
    }
}

const fn help_for(format: PayloadFormat) -> &'static str {
    match format {
        PayloadFormat::Json => "check for missing commas, quotes, or brackets",

        #[cfg(feature = "toml")]
        PayloadFormat::Toml => "check for missing quotes, invalid values, or syntax errors",

        #[cfg(feature = "yaml")]
        PayloadFormat::Yaml => "check indentation and ensure proper YAML syntax",
    }
}

// ============================================================================
// Location helpers
// ============================================================================

pub(crate) fn offset_to_span(offset: usize, content: &str) -> SourceSpan {
    let offset = floor_char_boundary(content, offset.min(content.len()));
    let remaining = &content[offset..];
    let len = remaining
        .find(|c: char| c.is_whitespace() || c == ',' || c == '}' || c == ']')
        .unwrap_or(remaining.len().min(20))
        .max(1);

    SourceSpan::new(offset.into(), len)
}

/// Converts a 1-indexed line/column into a byte offset.
pub(crate) fn line_col_to_offset(content: &str, line: usize, col: usize) -> usize {
    let mut offset = 0;

    for (i, l) in content.lines().enumerate() {
        if i + 1 == line {
            return offset + col.saturating_sub(1);
        }

        offset += l.len() + 1;
    }

    offset
}

fn floor_char_boundary(content: &str, mut index: usize) -> usize {
    while index > 0 && !content.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Pulls `line N column M` out of a YAML error message.
#[cfg(feature = "yaml")]
fn extract_location(msg: &str) -> Option<(usize, usize)> {
    let line_idx = msg.find("line ")?;
    let after_line = &msg[line_idx + 5..];
    let line_end = after_line.find(|c: char| !c.is_ascii_digit())?;
    let line = after_line[..line_end].parse::<usize>().ok()?;

    let col_idx = after_line.find("column ")?;
    let after_col = &after_line[col_idx + 7..];
    let col_end = after_col
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(after_col.len());
    let col = after_col[..col_end].parse::<usize>().ok()?;

    Some((line, col))
}

#[cfg(feature = "toml")]
fn toml_to_json(value: toml::Value) -> serde_json::Value {
    use serde_json::Value as Json;

    match value {
        toml::Value::String(s) => Json::String(s),
        toml::Value::Integer(i) => Json::Number(i.into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(f).map_or(Json::Null, Json::Number),
        toml::Value::Boolean(b) => Json::Bool(b),
        toml::Value::Datetime(dt) => Json::String(dt.to_string()),
        toml::Value::Array(arr) => Json::Array(arr.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Json::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path() {
        assert_eq!(
            PayloadFormat::from_path(Path::new("search.json")),
            Some(PayloadFormat::Json)
        );
        assert_eq!(
            PayloadFormat::from_path(Path::new("SEARCH.JSON")),
            Some(PayloadFormat::Json)
        );
        assert_eq!(PayloadFormat::from_path(Path::new("search.txt")), None);
        assert_eq!(PayloadFormat::from_path(Path::new("search")), None);
    }

    #[test]
    fn test_json_is_canonicalized() {
        let value = PayloadFormat::Json
            .parse("{ \"threads\" :  4 }")
            .unwrap();
        assert_eq!(value.payload(), r#"{"threads":4}"#);
    }

    #[test]
    fn test_json_error_has_span() {
        let err = PayloadFormat::Json.parse("{\"threads\": }").unwrap_err();
        assert!(matches!(err, PayloadError::Parse { format: "JSON", .. }));
    }

    #[cfg(feature = "toml")]
    #[test]
    fn test_toml_matches_json() {
        let from_toml = PayloadFormat::Toml
            .parse("threads = 4\n[index]\nname = \"music\"\n")
            .unwrap();
        let from_json = PayloadFormat::Json
            .parse(r#"{"index":{"name":"music"},"threads":4}"#)
            .unwrap();

        assert_eq!(from_toml, from_json);
    }

    #[cfg(feature = "yaml")]
    #[test]
    fn test_yaml_parses() {
        let value = PayloadFormat::Yaml.parse("threads: 4\n").unwrap();
        assert_eq!(value.payload(), r#"{"threads":4}"#);
    }

    #[cfg(feature = "yaml")]
    #[test]
    fn test_extract_location() {
        assert_eq!(
            extract_location("invalid type at line 3 column 7"),
            Some((3, 7))
        );
        assert_eq!(extract_location("no location"), None);
    }
}
