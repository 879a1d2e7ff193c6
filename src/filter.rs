//! Ignore-chain construction for the pack filter stage
//!
//! Rule sources are additive: caller-supplied ignore filenames come first,
//! then the two quill defaults. Inline rules form one extra named source.
//! An entry excluded by any source stays excluded; pattern syntax and
//! per-directory precedence belong to the matcher, not to this crate.

use std::io;
use std::path::Path;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use ignore::{Walk, WalkBuilder};
use log::{debug, trace};

use crate::exceptions::{QuillTarError, Result};

/// Default ignore filenames, always consulted in this order after any
/// caller-supplied files. Neither is required to exist.
pub const DEFAULT_IGNORE_FILES: [&str; 2] = [".quillignore", ".gitignore"];

/// Build the directory walker for `dir` with the full ignore-file chain.
pub fn walker(dir: &Path, ignore_files: &[String]) -> Walk {
    let mut builder = WalkBuilder::new(dir);
    builder
        .standard_filters(false)
        .hidden(false)
        .follow_links(false)
        .sort_by_file_name(|a, b| a.cmp(b));

    for name in ignore_files {
        trace!("adding ignore file source: {name}");
        builder.add_custom_ignore_filename(name);
    }
    for name in DEFAULT_IGNORE_FILES {
        builder.add_custom_ignore_filename(name);
    }

    builder.build()
}

/// Compile the flattened inline rules as one additional rule source rooted
/// at `dir`. An empty rule list compiles to a matcher that matches nothing.
pub fn inline_matcher(dir: &Path, rules: &[String]) -> Result<Gitignore> {
    let mut builder = GitignoreBuilder::new(dir);
    for rule in rules {
        builder.add_line(None, rule).map_err(|err| QuillTarError::ReadSource {
            path: dir.to_path_buf(),
            source: io::Error::other(err),
        })?;
    }
    let matcher = builder.build().map_err(|err| QuillTarError::ReadSource {
        path: dir.to_path_buf(),
        source: io::Error::other(err),
    })?;
    debug!("compiled {} inline ignore rules", rules.len());
    Ok(matcher)
}

/// Whether `path` is excluded by the inline rule source. A rule matching a
/// parent directory excludes the whole subtree.
pub fn excluded(matcher: &Gitignore, path: &Path, is_dir: bool) -> bool {
    matcher.matched_path_or_any_parents(path, is_dir).is_ignore()
}
