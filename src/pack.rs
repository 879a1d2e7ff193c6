//! Pack pipeline: filter, tar encode, gzip compress
//!
//! Entries stream through filter -> `tar::Builder` -> `GzEncoder` -> sink,
//! so compressed output starts before the whole tree has been read. The
//! sink is the caller's; this crate never writes the final destination.

use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;

use flate2::Compression;
use flate2::write::GzEncoder;
use log::{debug, trace};
use serde::de::{MapAccess, SeqAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tar::{Builder, HeaderMode};

use crate::exceptions::{QuillTarError, Result};
use crate::filter;
use crate::pipeline::{Stage, StageWriter};

/// Additional ignore rules, either a flat list or named groups.
///
/// Both shapes are normalized by [`flatten`](IgnoreRules::flatten) at the
/// pipeline boundary; nothing downstream sees the original shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreRules {
    /// One ordered list of rule strings
    List(Vec<String>),
    /// Named rule groups, flattened in group order
    Groups(Vec<(String, Vec<String>)>),
}

impl Default for IgnoreRules {
    fn default() -> Self {
        IgnoreRules::List(Vec::new())
    }
}

impl IgnoreRules {
    /// Flatten into one canonical ordered rule sequence.
    #[must_use]
    pub fn flatten(&self) -> Vec<String> {
        match self {
            IgnoreRules::List(rules) => rules.clone(),
            IgnoreRules::Groups(groups) => groups
                .iter()
                .flat_map(|(_, rules)| rules.iter().cloned())
                .collect(),
        }
    }
}

impl Serialize for IgnoreRules {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            IgnoreRules::List(rules) => rules.serialize(serializer),
            IgnoreRules::Groups(groups) => {
                let mut map = serializer.serialize_map(Some(groups.len()))?;
                for (name, rules) in groups {
                    map.serialize_entry(name, rules)?;
                }
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for IgnoreRules {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        struct RulesVisitor;

        impl<'de> Visitor<'de> for RulesVisitor {
            type Value = IgnoreRules;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a list of rule strings or a map of named rule groups")
            }

            fn visit_seq<A: SeqAccess<'de>>(
                self,
                mut seq: A,
            ) -> std::result::Result<IgnoreRules, A::Error> {
                let mut rules = Vec::new();
                while let Some(rule) = seq.next_element::<String>()? {
                    rules.push(rule);
                }
                Ok(IgnoreRules::List(rules))
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<IgnoreRules, A::Error> {
                let mut groups = Vec::new();
                while let Some((name, rules)) = map.next_entry::<String, Vec<String>>()? {
                    groups.push((name, rules));
                }
                Ok(IgnoreRules::Groups(groups))
            }
        }

        deserializer.deserialize_any(RulesVisitor)
    }
}

/// Options for packing a directory into a quill system tarball
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PackOptions {
    /// Directory to create the tarball from. Required.
    pub dir: PathBuf,
    /// Additional per-directory ignore filenames, consulted before the
    /// `.quillignore`/`.gitignore` defaults
    pub ignore_files: Vec<String>,
    /// Additional inline ignore rules
    pub ignore_rules: IgnoreRules,
}

/// Pack `options.dir` into a gzip-compressed tar stream written to `sink`.
///
/// The source directory is validated before any I/O; every later failure
/// surfaces as a stage-tagged [`QuillTarError`]. Archive entry paths are
/// rooted at the directory's base name, headers are written in
/// deterministic mode (no ownership or timestamps) for maximal decoder
/// compatibility, and symlinks are stored as links.
///
/// # Errors
///
/// Returns an error if:
/// - `options.dir` is empty or does not exist
/// - The source tree cannot be walked or read
/// - Tar encoding or gzip compression fails, or the sink rejects a write
pub fn pack_to<W: Write>(options: &PackOptions, sink: W) -> Result<()> {
    if options.dir.as_os_str().is_empty() {
        return Err(QuillTarError::MissingSourceDir);
    }

    let dir = options
        .dir
        .canonicalize()
        .map_err(|err| QuillTarError::ReadSource {
            path: options.dir.clone(),
            source: err,
        })?;
    let base = match dir.file_name() {
        Some(name) => PathBuf::from(name),
        None => {
            return Err(QuillTarError::ReadSource {
                path: dir,
                source: io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "source directory has no base name",
                ),
            });
        }
    };

    let rules = options.ignore_rules.flatten();
    let inline = filter::inline_matcher(&dir, &rules)?;

    debug!("📦 packing {} as {}", dir.display(), base.display());

    let compressor = GzEncoder::new(
        StageWriter::new(sink, Stage::Compression, &dir),
        Compression::default(),
    );
    let mut builder = Builder::new(compressor);
    builder.mode(HeaderMode::Deterministic);
    builder.follow_symlinks(false);

    for next in filter::walker(&dir, &options.ignore_files) {
        let entry = next.map_err(|err| QuillTarError::ReadSource {
            path: dir.clone(),
            source: io::Error::other(err),
        })?;
        let path = entry.path();
        let is_dir = entry.file_type().is_some_and(|kind| kind.is_dir());

        if entry.depth() == 0 {
            builder
                .append_dir(&base, path)
                .map_err(|err| Stage::ArchiveCreation.resolve(err, path))?;
            continue;
        }

        if filter::excluded(&inline, path, is_dir) {
            trace!("filtered out {}", path.display());
            continue;
        }

        let rel = path.strip_prefix(&dir).unwrap_or(path);
        let name = base.join(rel);
        trace!("adding {}", name.display());

        if is_dir {
            builder
                .append_dir(&name, path)
                .map_err(|err| Stage::ArchiveCreation.resolve(err, path))?;
        } else {
            builder
                .append_path_with_name(path, &name)
                .map_err(|err| Stage::ArchiveCreation.resolve(err, path))?;
        }
    }

    let compressor = builder
        .into_inner()
        .map_err(|err| Stage::ArchiveCreation.resolve(err, &dir))?;
    compressor
        .finish()
        .map_err(|err| Stage::Compression.resolve(err, &dir))?;

    debug!("✅ packed {}", dir.display());
    Ok(())
}

/// Buffered convenience wrapper over [`pack_to`].
///
/// # Errors
///
/// Same conditions as [`pack_to`].
pub fn pack(options: &PackOptions) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    pack_to(options, &mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::fs;
    use std::path::Path;
    use tar::Archive;

    fn entry_names(tarball: &[u8]) -> Vec<String> {
        let mut archive = Archive::new(GzDecoder::new(tarball));
        archive
            .entries()
            .unwrap()
            .map(|entry| {
                entry
                    .unwrap()
                    .path()
                    .unwrap()
                    .to_string_lossy()
                    .trim_end_matches('/')
                    .to_string()
            })
            .collect()
    }

    fn base_name(dir: &Path) -> String {
        dir.canonicalize()
            .unwrap()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .into_owned()
    }

    #[test]
    fn test_missing_dir_fails_before_io() {
        let err = pack(&PackOptions::default()).unwrap_err();
        assert!(matches!(err, QuillTarError::MissingSourceDir));
    }

    #[test]
    fn test_nonexistent_dir_is_a_read_source_error() {
        let options = PackOptions {
            dir: PathBuf::from("/no/such/directory"),
            ..PackOptions::default()
        };
        let err = pack(&options).unwrap_err();
        assert!(matches!(err, QuillTarError::ReadSource { .. }));
    }

    #[test]
    fn test_pack_emits_a_gzip_stream() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("file.txt"), "hello").unwrap();

        let tarball = pack(&PackOptions {
            dir: tmp.path().to_path_buf(),
            ..PackOptions::default()
        })
        .unwrap();
        assert_eq!(&tarball[..2], &[0x1f, 0x8b]);
    }

    #[test]
    fn test_entries_are_rooted_at_the_base_name() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();
        fs::write(tmp.path().join("sub/inner.txt"), "inner").unwrap();
        fs::write(tmp.path().join("top.txt"), "top").unwrap();

        let tarball = pack(&PackOptions {
            dir: tmp.path().to_path_buf(),
            ..PackOptions::default()
        })
        .unwrap();

        let base = base_name(tmp.path());
        let names = entry_names(&tarball);
        assert_eq!(names[0], base);
        assert!(names.contains(&format!("{base}/top.txt")));
        assert!(names.contains(&format!("{base}/sub")));
        assert!(names.contains(&format!("{base}/sub/inner.txt")));
    }

    #[test]
    fn test_default_ignore_files_filter_the_archive() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("keep.txt"), "keep").unwrap();
        fs::write(tmp.path().join("drop.log"), "drop").unwrap();
        fs::write(tmp.path().join(".quillignore"), "*.log\n").unwrap();

        let tarball = pack(&PackOptions {
            dir: tmp.path().to_path_buf(),
            ..PackOptions::default()
        })
        .unwrap();

        let base = base_name(tmp.path());
        let names = entry_names(&tarball);
        assert!(names.contains(&format!("{base}/keep.txt")));
        assert!(!names.contains(&format!("{base}/drop.log")));
    }

    #[test]
    fn test_flatten_groups_preserves_group_order() {
        let grouped = IgnoreRules::Groups(vec![
            ("groupA".to_string(), vec!["r1".to_string(), "r2".to_string()]),
            ("groupB".to_string(), vec!["r3".to_string()]),
        ]);
        assert_eq!(grouped.flatten(), vec!["r1", "r2", "r3"]);
    }

    #[test]
    fn test_grouped_rules_filter_identically_to_a_flat_list() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.log"), "a").unwrap();
        fs::write(tmp.path().join("b.tmp"), "b").unwrap();
        fs::write(tmp.path().join("c.txt"), "c").unwrap();

        let flat = pack(&PackOptions {
            dir: tmp.path().to_path_buf(),
            ignore_rules: IgnoreRules::List(vec!["*.log".to_string(), "*.tmp".to_string()]),
            ..PackOptions::default()
        })
        .unwrap();
        let grouped = pack(&PackOptions {
            dir: tmp.path().to_path_buf(),
            ignore_rules: IgnoreRules::Groups(vec![
                ("logs".to_string(), vec!["*.log".to_string()]),
                ("temps".to_string(), vec!["*.tmp".to_string()]),
            ]),
            ..PackOptions::default()
        })
        .unwrap();

        assert_eq!(entry_names(&flat), entry_names(&grouped));
        let base = base_name(tmp.path());
        let names = entry_names(&flat);
        assert!(names.contains(&format!("{base}/c.txt")));
        assert!(!names.contains(&format!("{base}/a.log")));
        assert!(!names.contains(&format!("{base}/b.tmp")));
    }

    #[test]
    fn test_ignore_rules_accept_list_or_map_shape() {
        let from_list: IgnoreRules = serde_json::from_str(r#"["r1", "r2"]"#).unwrap();
        assert_eq!(
            from_list,
            IgnoreRules::List(vec!["r1".to_string(), "r2".to_string()])
        );

        let from_map: IgnoreRules =
            serde_json::from_str(r#"{"groupA": ["r1", "r2"], "groupB": ["r3"]}"#).unwrap();
        assert_eq!(from_map.flatten(), vec!["r1", "r2", "r3"]);
    }

    #[test]
    fn test_pack_options_deserialize_from_camel_case() {
        let options: PackOptions = serde_json::from_str(
            r#"{"dir": "/some/dir", "ignoreFiles": [".npmignore"], "ignoreRules": ["*.bak"]}"#,
        )
        .unwrap();
        assert_eq!(options.dir, PathBuf::from("/some/dir"));
        assert_eq!(options.ignore_files, vec![".npmignore"]);
        assert_eq!(options.ignore_rules.flatten(), vec!["*.bak"]);
    }
}
