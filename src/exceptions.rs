//! Error types for quill-tar

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Main error type for quill-tar operations
///
/// Every asynchronous pipeline failure carries the stage that produced it;
/// [`MissingSourceDir`](QuillTarError::MissingSourceDir) is the only error
/// raised before any I/O happens.
#[derive(Debug)]
pub enum QuillTarError {
    /// `PackOptions.dir` was left empty
    MissingSourceDir,

    /// Walking or reading the source tree failed
    ReadSource {
        /// Source directory being packed
        path: PathBuf,
        /// Underlying failure
        source: io::Error,
    },

    /// Encoding entries into the tar stream failed
    ArchiveCreation(io::Error),

    /// Gzip encoding, or writing compressed bytes to the sink, failed
    Compression(io::Error),

    /// Opening or reading the input tarball failed
    ReadTarball {
        /// Tarball being unpacked
        path: PathBuf,
        /// Underlying failure
        source: io::Error,
    },

    /// Gzip decoding failed (corrupt or truncated stream)
    Decompression {
        /// Tarball being unpacked
        path: PathBuf,
        /// Underlying failure
        source: io::Error,
    },

    /// Tar decoding or filesystem materialization failed
    Extraction {
        /// Tarball being unpacked
        path: PathBuf,
        /// Underlying failure
        source: io::Error,
    },
}

impl fmt::Display for QuillTarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuillTarError::MissingSourceDir => {
                write!(f, "options.dir is required to package a quill system tarball")
            }
            QuillTarError::ReadSource { path, source } => {
                write!(f, "error reading {}: {source}", path.display())
            }
            QuillTarError::ArchiveCreation(source) => write!(f, "tar creation error: {source}"),
            QuillTarError::Compression(source) => write!(f, "gzip error: {source}"),
            QuillTarError::ReadTarball { path, source } => {
                write!(f, "error reading: {}: {source}", path.display())
            }
            QuillTarError::Decompression { path, source } => {
                write!(f, "unzip error: {}: {source}", path.display())
            }
            QuillTarError::Extraction { path, source } => {
                write!(f, "failed unpacking: {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for QuillTarError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            QuillTarError::MissingSourceDir => None,
            QuillTarError::ReadSource { source, .. }
            | QuillTarError::ArchiveCreation(source)
            | QuillTarError::Compression(source)
            | QuillTarError::ReadTarball { source, .. }
            | QuillTarError::Decompression { source, .. }
            | QuillTarError::Extraction { source, .. } => Some(source),
        }
    }
}

/// Result type for quill-tar operations
pub type Result<T> = std::result::Result<T, QuillTarError>;
