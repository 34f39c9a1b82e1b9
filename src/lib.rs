//! # upkg
//!
//! Rust implementation of the Unreal Engine 3 package container format
//! (.pcc/.upk) as shipped by the Mass Effect trilogy.
//!
//! A package is an object graph serialized into one file: an interned
//! name table, import entries (objects defined elsewhere), and export
//! entries (objects with data here). Export payloads carry a tagged
//! property list followed by class-specific binary data. This crate
//! parses, edits, and re-serializes packages with byte-for-byte
//! round-trip fidelity, and ports entries between packages.
//!
//! ## Modules
//!
//! - [`util`] - Error types
//! - [`wire`] - Little-endian byte cursor and writer
//! - [`pkg`] - Name table, entry graph, container parse/serialize
//! - [`props`] - Tagged property lists and their codec
//! - [`binary`] - Class-specific binary payload codecs
//! - [`porting`] - Cross-package entry import
//!
//! ## Example
//!
//! ```ignore
//! use upkg::prelude::*;
//!
//! let graph = upkg::pkg::reader::parse(&bytes)?;
//! for (reference, _) in graph.exports() {
//!     println!("{}", graph.entry_string(reference));
//! }
//! ```

pub mod util;
pub mod wire;
pub mod pkg;
pub mod props;
pub mod binary;
pub mod porting;

// Re-export commonly used types
pub use pkg::{Game, PackageGraph, Reference};
pub use util::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::binary::{BinaryPayload, CodecRegistry};
    pub use crate::pkg::{
        ExportEntry, Game, ImportEntry, NameRef, ObjectFlags, PackageGraph, Reference,
    };
    pub use crate::porting::{port_entry, PortWarning, Ported};
    pub use crate::props::{
        ArrayValue, Property, PropertyCollection, PropertyValue, TypeRegistry,
    };
    pub use crate::util::{Error, Result};
}
