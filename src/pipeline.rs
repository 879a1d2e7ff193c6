//! Stage composition and error attribution for the pack/unpack pipelines
//!
//! Each pipeline is a chain of byte streams. The first stage to fail wraps
//! its tagged [`QuillTarError`] inside the `io::Error` that travels through
//! the remaining stages; outer boundaries pass an already-tagged error
//! through untouched, so attribution is at-most-once and first-failure-wins
//! without per-call-site listeners.

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use crate::exceptions::QuillTarError;

/// Identifies which pipeline stage produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Walking/reading the source tree (pack)
    ReadSource,
    /// Tar encoding (pack)
    ArchiveCreation,
    /// Gzip encoding and downstream sink writes (pack)
    Compression,
    /// Opening/reading the tarball (unpack)
    ReadTarball,
    /// Gzip decoding (unpack)
    Decompression,
    /// Tar decoding and filesystem materialization (unpack)
    Extraction,
}

impl Stage {
    /// Convert an `io::Error` crossing this stage boundary into the pipeline
    /// error, honoring a tag claimed by an inner stage.
    pub fn resolve(self, err: io::Error, path: &Path) -> QuillTarError {
        if is_tagged(&err) {
            match err.into_inner().map(|inner| inner.downcast::<QuillTarError>()) {
                Some(Ok(claimed)) => *claimed,
                // is_tagged inspected the same payload, so these arms cannot
                // be reached; attribute to this stage rather than panic
                Some(Err(other)) => self.attribute(io::Error::other(other), path),
                None => self.attribute(io::Error::other("lost stage tag"), path),
            }
        } else {
            self.attribute(err, path)
        }
    }

    fn attribute(self, err: io::Error, path: &Path) -> QuillTarError {
        match self {
            Stage::ReadSource => QuillTarError::ReadSource {
                path: path.to_path_buf(),
                source: err,
            },
            Stage::ArchiveCreation => QuillTarError::ArchiveCreation(err),
            Stage::Compression => QuillTarError::Compression(err),
            Stage::ReadTarball => QuillTarError::ReadTarball {
                path: path.to_path_buf(),
                source: err,
            },
            Stage::Decompression => QuillTarError::Decompression {
                path: path.to_path_buf(),
                source: err,
            },
            Stage::Extraction => QuillTarError::Extraction {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }
}

fn is_tagged(err: &io::Error) -> bool {
    err.get_ref().is_some_and(|inner| inner.is::<QuillTarError>())
}

/// Tag an error at a stage boundary, leaving already-claimed errors alone.
fn claim(stage: Stage, err: io::Error, path: &Path) -> io::Error {
    if is_tagged(&err) {
        err
    } else {
        io::Error::other(stage.resolve(err, path))
    }
}

/// Reader adapter marking one stage boundary of an unpack pipeline.
#[derive(Debug)]
pub struct StageReader<R> {
    inner: R,
    stage: Stage,
    path: PathBuf,
}

impl<R: Read> StageReader<R> {
    /// Wrap `inner` so its errors are attributed to `stage`.
    pub fn new(inner: R, stage: Stage, path: &Path) -> Self {
        StageReader {
            inner,
            stage,
            path: path.to_path_buf(),
        }
    }
}

impl<R: Read> Read for StageReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner
            .read(buf)
            .map_err(|err| claim(self.stage, err, &self.path))
    }
}

/// Writer adapter marking one stage boundary of a pack pipeline.
#[derive(Debug)]
pub struct StageWriter<W> {
    inner: W,
    stage: Stage,
    path: PathBuf,
}

impl<W: Write> StageWriter<W> {
    /// Wrap `inner` so its errors are attributed to `stage`.
    pub fn new(inner: W, stage: Stage, path: &Path) -> Self {
        StageWriter {
            inner,
            stage,
            path: path.to_path_buf(),
        }
    }
}

impl<W: Write> Write for StageWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner
            .write(buf)
            .map_err(|err| claim(self.stage, err, &self.path))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner
            .flush()
            .map_err(|err| claim(self.stage, err, &self.path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::InvalidData, "bad header"))
        }
    }

    #[test]
    fn test_first_stage_tag_wins() {
        let inner = StageReader::new(FailingReader, Stage::Decompression, Path::new("a.tgz"));
        let mut outer = StageReader::new(inner, Stage::Extraction, Path::new("a.tgz"));

        let mut buf = [0u8; 8];
        let err = outer.read(&mut buf).unwrap_err();
        let resolved = Stage::Extraction.resolve(err, Path::new("a.tgz"));
        assert!(matches!(resolved, QuillTarError::Decompression { .. }));
    }

    #[test]
    fn test_untagged_error_is_attributed_at_the_mouth() {
        let err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let resolved = Stage::ReadTarball.resolve(err, Path::new("a.tgz"));
        assert!(matches!(resolved, QuillTarError::ReadTarball { .. }));
    }
}
