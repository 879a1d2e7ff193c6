//! Unpack pipeline: decompress, decode, policy rewrite, materialize
//!
//! Composes file-read -> gzip decode -> tar decode, rewriting every entry's
//! mode (and optionally its owner) before it lands under the target
//! directory. The resolved output directory is taken from the first entry
//! observed and never revised, even if later entries have a different
//! leading segment.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};
use tar::{Archive, EntryType};

use crate::exceptions::{QuillTarError, Result};
use crate::pipeline::{Stage, StageReader};
use crate::policy::{self, Modes, Owner};

/// Options for unpacking a quill system tarball
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UnpackOptions {
    /// Permission baselines and umask applied to every entry
    pub modes: Modes,
    /// Owner uid override; only honored together with `gid`
    pub uid: Option<u32>,
    /// Owner gid override; only honored together with `uid`
    pub gid: Option<u32>,
}

/// Unpack `tarball` into `target`, returning the resolved output directory
/// (`target` joined with the first path segment of the first entry).
///
/// Each entry's mode is normalized through [`Modes::apply`] before the
/// entry materializes; on platforms with POSIX ownership, a supplied
/// uid/gid pair is stamped onto every entry. A failed unpack may leave a
/// partially extracted tree behind; no rollback is performed.
///
/// # Errors
///
/// Returns a stage-tagged error if:
/// - The tarball cannot be opened or read
/// - The gzip stream is corrupt or truncated
/// - Tar decoding or filesystem materialization fails
/// - The archive contains no entries
pub fn unpack(tarball: &Path, target: &Path, options: &UnpackOptions) -> Result<PathBuf> {
    let owner = if policy::supports_posix_ownership() {
        Owner::from_options(options.uid, options.gid)
    } else {
        None
    };

    let file = File::open(tarball).map_err(|err| QuillTarError::ReadTarball {
        path: tarball.to_path_buf(),
        source: err,
    })?;
    let raw = StageReader::new(BufReader::new(file), Stage::ReadTarball, tarball);
    let decompressor = StageReader::new(GzDecoder::new(raw), Stage::Decompression, tarball);
    let mut archive = Archive::new(decompressor);
    archive.set_preserve_permissions(false);
    archive.set_preserve_mtime(true);

    std::fs::create_dir_all(target).map_err(|err| QuillTarError::Extraction {
        path: target.to_path_buf(),
        source: err,
    })?;
    if let Some(owner) = owner {
        stamp_owner(target, owner).map_err(|err| QuillTarError::Extraction {
            path: target.to_path_buf(),
            source: err,
        })?;
    }

    debug!("📦 unpacking {} into {}", tarball.display(), target.display());

    let mut output_dir: Option<PathBuf> = None;

    let entries = archive
        .entries()
        .map_err(|err| Stage::Extraction.resolve(err, tarball))?;
    for next in entries {
        let mut entry = next.map_err(|err| Stage::Extraction.resolve(err, tarball))?;
        let rel: PathBuf = entry
            .path()
            .map_err(|err| Stage::Extraction.resolve(err, tarball))?
            .into_owned();

        if output_dir.is_none() {
            output_dir = first_segment(&rel);
        }

        let entry_type = entry.header().entry_type();
        let raw_mode = entry.header().mode().unwrap_or(0);
        let mode = options.modes.apply(raw_mode, entry_type.is_dir());
        trace!(
            "entry {} mode {:04o} -> {:04o}",
            rel.display(),
            raw_mode,
            mode
        );

        let unpacked = entry
            .unpack_in(target)
            .map_err(|err| Stage::Extraction.resolve(err, tarball))?;
        if !unpacked {
            warn!("skipped entry with unsafe path: {}", rel.display());
            continue;
        }

        let dest = target.join(&rel);
        apply_policy(&dest, mode, entry_type, owner).map_err(|err| QuillTarError::Extraction {
            path: tarball.to_path_buf(),
            source: err,
        })?;
    }

    match output_dir {
        Some(first) => {
            let resolved = target.join(first);
            debug!("✅ unpacked into {}", resolved.display());
            Ok(resolved)
        }
        None => Err(QuillTarError::Extraction {
            path: tarball.to_path_buf(),
            source: io::Error::new(io::ErrorKind::UnexpectedEof, "archive contained no entries"),
        }),
    }
}

/// First normal path segment; `.`/`..`/root components never name the
/// output directory.
fn first_segment(path: &Path) -> Option<PathBuf> {
    path.components().find_map(|component| match component {
        Component::Normal(name) => Some(PathBuf::from(name)),
        _ => None,
    })
}

#[cfg(unix)]
fn stamp_owner(dest: &Path, owner: Owner) -> io::Result<()> {
    std::os::unix::fs::lchown(dest, Some(owner.uid), Some(owner.gid))
}

#[cfg(not(unix))]
fn stamp_owner(_dest: &Path, _owner: Owner) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn apply_policy(
    dest: &Path,
    mode: u32,
    entry_type: EntryType,
    owner: Option<Owner>,
) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    // no lchmod on Linux; symlink modes are ignored by the kernel anyway
    if !entry_type.is_symlink() {
        std::fs::set_permissions(dest, std::fs::Permissions::from_mode(mode))?;
    }
    if let Some(owner) = owner {
        stamp_owner(dest, owner)?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn apply_policy(
    _dest: &Path,
    _mode: u32,
    _entry_type: EntryType,
    _owner: Option<Owner>,
) -> io::Result<()> {
    // mode bits and uid/gid are POSIX concepts
    Ok(())
}
