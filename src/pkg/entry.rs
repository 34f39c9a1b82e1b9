//! Entries: the nodes of the package graph.
//!
//! On the wire an entry reference is a signed integer ("UIndex"):
//! positive selects export `n-1`, negative selects import `-n-1`, zero
//! is the null reference. In memory that sign-coding is confined to
//! [`Reference::from_wire`] / [`Reference::to_wire`]; everything else
//! works with the tagged form.

use bitflags::bitflags;

use super::names::NameRef;

/// Tagged entry reference. The payload is the 0-based slot in the
/// owning graph's export or import list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Reference {
    #[default]
    Null,
    Export(u32),
    Import(u32),
}

impl Reference {
    /// Decode a signed wire UIndex.
    pub fn from_wire(uindex: i32) -> Self {
        match uindex {
            0 => Reference::Null,
            n if n > 0 => Reference::Export((n - 1) as u32),
            n => Reference::Import((-n - 1) as u32),
        }
    }

    /// Encode back to the signed wire UIndex.
    pub fn to_wire(self) -> i32 {
        match self {
            Reference::Null => 0,
            Reference::Export(i) => i as i32 + 1,
            Reference::Import(i) => -(i as i32) - 1,
        }
    }

    pub fn is_null(self) -> bool {
        matches!(self, Reference::Null)
    }

    pub fn is_export(self) -> bool {
        matches!(self, Reference::Export(_))
    }

    pub fn is_import(self) -> bool {
        matches!(self, Reference::Import(_))
    }
}

impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_wire())
    }
}

bitflags! {
    /// Per-object flag bits from the export header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ObjectFlags: u64 {
        const TRANSACTIONAL = 0x0000_0001;
        const PUBLIC        = 0x0000_0004;
        const TRANSIENT     = 0x0000_4000;
        const LOAD_FOR_CLIENT = 0x0001_0000;
        const LOAD_FOR_SERVER = 0x0002_0000;
        const LOAD_FOR_EDIT   = 0x0004_0000;
        const STANDALONE      = 0x0008_0000;
        /// Export payload begins with an execution-state record.
        const HAS_STACK     = 0x0200_0000;

        const _ = !0;
    }
}

bitflags! {
    /// Package-level flag bits carried in each export header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PackageFlags: u32 {
        const ALLOW_DOWNLOAD = 0x0000_0001;
        const CLIENT_OPTIONAL = 0x0000_0002;
        const SERVER_SIDE_ONLY = 0x0000_0004;
        const COOKED = 0x0000_0008;
        const COMPRESSED = 0x0200_0000;

        const _ = !0;
    }
}

/// A reference to an object defined in another package. Carries names
/// only; nothing here is resolved to bytes.
#[derive(Debug, Clone)]
pub struct ImportEntry {
    /// Name of the package file the object comes from.
    pub package_file: NameRef,
    pub class_name: NameRef,
    /// Parent entry, or null for a top-level import.
    pub link: Reference,
    pub object_name: NameRef,
}

/// An object defined in this package, with its serialized payload.
#[derive(Debug, Clone)]
pub struct ExportEntry {
    pub class: Reference,
    pub super_class: Reference,
    /// Parent entry, or null for a top-level export.
    pub link: Reference,
    pub object_name: NameRef,
    /// Template entry whose defaults this object inherits.
    pub archetype: Reference,
    pub object_flags: ObjectFlags,
    pub export_flags: u32,
    pub guid: [u8; 16],
    pub package_flags: PackageFlags,
    /// Full serialized payload: pre-property region, tagged property
    /// list, then the class-specific binary tail.
    pub data: Vec<u8>,
}

impl ExportEntry {
    /// Minimal export with empty payload; callers fill in the rest.
    pub fn new(object_name: NameRef) -> Self {
        Self {
            class: Reference::Null,
            super_class: Reference::Null,
            link: Reference::Null,
            object_name,
            archetype: Reference::Null,
            object_flags: ObjectFlags::empty(),
            export_flags: 0,
            guid: [0; 16],
            package_flags: PackageFlags::empty(),
            data: Vec::new(),
        }
    }

    pub fn has_stack(&self) -> bool {
        self.object_flags.contains(ObjectFlags::HAS_STACK)
    }
}
