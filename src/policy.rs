//! Extraction policy: permission normalization and ownership override
//!
//! Never create things that are user-unreadable, or dirs that are
//! user-un-listable. Each entry's mode is OR'd with a baseline for its kind
//! and then stripped of umask bits, producing one authoritative mode value.

use serde::{Deserialize, Serialize};

/// Default baseline mode for file entries
pub const DEFAULT_FILE_MODE: u32 = 0o644;
/// Default baseline mode for directory entries
pub const DEFAULT_EXEC_MODE: u32 = 0o755;
/// Default umask stripped from every normalized mode
pub const DEFAULT_UMASK: u32 = 0o022;

/// Permission baselines applied to every extracted entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Modes {
    /// Baseline OR'd into file entry modes
    pub file: u32,
    /// Baseline OR'd into directory entry modes
    pub exec: u32,
    /// Bits cleared from every resulting mode
    pub umask: u32,
}

impl Default for Modes {
    fn default() -> Self {
        Modes {
            file: DEFAULT_FILE_MODE,
            exec: DEFAULT_EXEC_MODE,
            umask: DEFAULT_UMASK,
        }
    }
}

impl Modes {
    /// Normalize a raw archive mode for an entry of the given kind.
    #[must_use]
    pub fn apply(&self, raw_mode: u32, is_dir: bool) -> u32 {
        let baseline = if is_dir { self.exec } else { self.file };
        (raw_mode | baseline) & !self.umask
    }
}

/// Owner/group override stamped onto extracted entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    /// User id
    pub uid: u32,
    /// Group id
    pub gid: u32,
}

impl Owner {
    /// Build the override from options. Both ids must be supplied; a lone
    /// uid or gid leaves ownership untouched.
    #[must_use]
    pub fn from_options(uid: Option<u32>, gid: Option<u32>) -> Option<Self> {
        match (uid, gid) {
            (Some(uid), Some(gid)) => Some(Owner { uid, gid }),
            _ => None,
        }
    }
}

/// Whether this platform supports POSIX uid/gid ownership. Evaluated once
/// per unpack; elsewhere the override is skipped, not an error.
#[cfg(unix)]
#[must_use]
pub fn supports_posix_ownership() -> bool {
    true
}

/// Whether this platform supports POSIX uid/gid ownership.
#[cfg(not(unix))]
#[must_use]
pub fn supports_posix_ownership() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_normalization_or_then_mask() {
        let modes = Modes {
            file: 0o666,
            exec: 0o777,
            umask: 0o022,
        };
        // (0777 | 0666) & !0022 = 0755
        assert_eq!(modes.apply(0o777, false), 0o755);
    }

    #[test]
    fn test_directory_gets_exec_baseline() {
        let modes = Modes::default();
        // even a fully restrictive recorded mode comes out traversable
        assert_eq!(modes.apply(0o000, true), 0o755);
        // group/other write never survives the umask
        assert_eq!(modes.apply(0o777, true), 0o755);
    }

    #[test]
    fn test_file_gets_read_write_baseline() {
        let modes = Modes::default();
        assert_eq!(modes.apply(0o000, false), 0o644);
        assert_eq!(modes.apply(0o400, false), 0o644);
        // executable bit recorded in the archive is preserved
        assert_eq!(modes.apply(0o755, false), 0o755);
    }

    #[test]
    fn test_owner_requires_both_ids() {
        assert_eq!(
            Owner::from_options(Some(500), Some(500)),
            Some(Owner { uid: 500, gid: 500 })
        );
        assert_eq!(Owner::from_options(Some(500), None), None);
        assert_eq!(Owner::from_options(None, Some(500)), None);
        assert_eq!(Owner::from_options(None, None), None);
    }
}
