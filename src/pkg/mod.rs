//! Package container core.
//!
//! A package file is a name table plus a flat table of entries: imports
//! (references to objects defined elsewhere) and exports (objects with
//! data in this package). This module owns the entry graph, the name
//! table, and the container-level parse/serialize.

pub mod entry;
pub mod graph;
pub mod names;
pub mod reader;
pub mod refs;
pub mod writer;

pub use entry::{ExportEntry, ImportEntry, ObjectFlags, PackageFlags, Reference};
pub use graph::PackageGraph;
pub use names::{NameRef, NameTable};

use crate::util::{Error, Result};

/// Magic tag at the start of every package file.
pub const PACKAGE_MAGIC: u32 = 0x9E2A_83C1;

/// Name the property list terminates on.
pub const NONE_NAME: &str = "None";

/// Game/format revision. Selects the conditional wire layouts: bool
/// width, ByteProperty enum headers, string encoding, stack record
/// size, and version-dependent binary payload fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Game {
    Me1,
    Me2,
    Me3,
}

impl Game {
    /// Recognize a game from the header (version, licensee) pair.
    pub fn from_version(version: u16, licensee: u16) -> Result<Self> {
        match (version, licensee) {
            (491, 1008) => Ok(Game::Me1),
            (512, 130) => Ok(Game::Me2),
            (684, 194) => Ok(Game::Me3),
            _ => Err(Error::UnsupportedVersion { version, licensee }),
        }
    }

    /// Header (version, licensee) pair for this game.
    pub fn version(self) -> (u16, u16) {
        match self {
            Game::Me1 => (491, 1008),
            Game::Me2 => (512, 130),
            Game::Me3 => (684, 194),
        }
    }

    /// Size of the execution-state record preceding the property list
    /// when an export has `ObjectFlags::HAS_STACK`.
    pub fn stack_record_size(self) -> usize {
        match self {
            Game::Me1 | Game::Me2 => 32,
            Game::Me3 => 30,
        }
    }

    /// Name table rows carry an opaque flags word on older revisions.
    pub fn has_name_flags(self) -> bool {
        !matches!(self, Game::Me3)
    }
}

impl std::fmt::Display for Game {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Game::Me1 => "ME1",
            Game::Me2 => "ME2",
            Game::Me3 => "ME3",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_version_roundtrip() {
        for game in [Game::Me1, Game::Me2, Game::Me3] {
            let (v, l) = game.version();
            assert_eq!(Game::from_version(v, l).unwrap(), game);
        }
    }

    #[test]
    fn test_unknown_version_rejected() {
        let err = Game::from_version(868, 0).unwrap_err();
        assert!(matches!(err, Error::UnsupportedVersion { .. }));
    }
}
