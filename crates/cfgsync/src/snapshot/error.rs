//! Snapshot serialization errors.

use miette::{Diagnostic, NamedSource, SourceSpan};

use crate::ConfigKey;

/// Error reading or writing a serialized [`ConfigSnapshot`](super::ConfigSnapshot).
///
/// Parse errors carry the document and a span, so a corrupt snapshot file
/// renders like this through [`miette`]:
///
/// ```text
/// Error: cfgsync::snapshot::parse_error
///   × malformed snapshot in configs.json
///    ╭─[configs.json:4:14]
///  4 │   "count": two,
///    ·            ─┬─
///    ·             ╰── expected value
///    ╰────
/// ```
#[derive(Debug, Diagnostic, thiserror::Error)]
pub enum SnapshotError {
    /// Reading or writing the underlying stream or file failed.
    #[error("snapshot I/O failed on {target}")]
    #[diagnostic(
        code(cfgsync::snapshot::io_error),
        help("check that the location exists and is readable/writable")
    )]
    Io {
        /// The file path, or `stream`.
        target: String,

        /// The I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid snapshot JSON.
    #[error("malformed snapshot in {target}")]
    #[diagnostic(code(cfgsync::snapshot::parse_error))]
    Parse {
        /// The file path, or `stream`.
        target: String,

        /// The document, for display.
        #[source_code]
        src: NamedSource<String>,

        /// Where parsing failed.
        #[label("{message}")]
        span: SourceSpan,

        /// What went wrong.
        message: String,
    },

    /// The document was written by an unknown format version.
    #[error("unsupported snapshot version {version}")]
    #[diagnostic(
        code(cfgsync::snapshot::unsupported_version),
        help("this build reads snapshot version {supported}")
    )]
    UnsupportedVersion {
        /// Version found in the document.
        version: u32,

        /// Version this build reads.
        supported: u32,
    },

    /// `count` disagrees with the number of entries.
    #[error("snapshot declares {declared} configs but holds {actual}")]
    #[diagnostic(code(cfgsync::snapshot::count_mismatch))]
    CountMismatch {
        /// The declared count.
        declared: usize,

        /// The number of entries present.
        actual: usize,
    },

    /// A stored checksum does not match its payload.
    #[error("checksum mismatch for {key}")]
    #[diagnostic(
        code(cfgsync::snapshot::checksum_mismatch),
        help("the snapshot was modified or truncated after it was written")
    )]
    ChecksumMismatch {
        /// The affected key.
        key: ConfigKey,
    },

    /// The same key appears twice.
    #[error("duplicate entry for {key}")]
    #[diagnostic(code(cfgsync::snapshot::duplicate_key))]
    DuplicateKey {
        /// The repeated key.
        key: ConfigKey,
    },

    /// The snapshot could not be encoded.
    #[error("failed to encode snapshot: {message}")]
    #[diagnostic(code(cfgsync::snapshot::encode_error))]
    Encode {
        /// What went wrong.
        message: String,
    },
}

impl SnapshotError {
    pub(crate) fn io(target: impl Into<String>, source: std::io::Error) -> Self {
        SnapshotError::Io {
            target: target.into(),
            source,
        }
    }
}
