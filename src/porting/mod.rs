//! Cross-package import.
//!
//! Copies an entry from one package's index space into another's,
//! recursively satisfying everything its class/superclass/archetype
//! chain and payload reference. One porting operation memoizes by full
//! path, so shared dependencies are copied once and self-referential
//! archetypes terminate.
//!
//! Recoverable degradations (a property missing from the destination
//! format, a reference that cannot be resolved) do not abort the
//! operation; they null the spot and surface in [`Ported::warnings`].

use std::collections::HashMap;

use tracing::warn;

use crate::binary::CodecRegistry;
use crate::pkg::graph::Entry;
use crate::pkg::{
    ExportEntry, Game, ImportEntry, NameRef, ObjectFlags, PackageGraph, Reference,
};
use crate::props::{ArrayValue, PropertyCollection, PropertyValue, TypeRegistry};
use crate::util::{Error, Result};

/// Stack record written for ported exports that carry execution state.
/// The engine re-derives the real contents on load.
const STACK_TEMPLATE_OLD: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0xff, 0x00, 0x00,
    0x00, 0x00,
];
const STACK_TEMPLATE_ME3: [u8; 30] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00,
];

/// A non-fatal degradation recorded during a port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortWarning {
    /// Property has no equivalent in the destination format revision.
    DroppedProperty { entry: String, property: String },
    /// Reference could not be resolved; a null was substituted.
    UnresolvedReference { entry: String, detail: String },
}

impl std::fmt::Display for PortWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortWarning::DroppedProperty { entry, property } => {
                write!(f, "dropped property {} of {}", property, entry)
            }
            PortWarning::UnresolvedReference { entry, detail } => {
                write!(f, "unresolved reference in {}: {}", entry, detail)
            }
        }
    }
}

/// Outcome of a port: the destination entry plus recorded warnings.
#[derive(Debug)]
pub struct Ported {
    pub entry: Reference,
    pub warnings: Vec<PortWarning>,
}

/// Port `src_ref` from `src` into `dst` with the standard registries.
pub fn port_entry(
    src: &PackageGraph,
    src_ref: Reference,
    dst: &mut PackageGraph,
) -> Result<Ported> {
    port_entry_with(
        src,
        src_ref,
        dst,
        TypeRegistry::standard(),
        CodecRegistry::standard(),
    )
}

pub fn port_entry_with(
    src: &PackageGraph,
    src_ref: Reference,
    dst: &mut PackageGraph,
    types: &TypeRegistry,
    codecs: &CodecRegistry,
) -> Result<Ported> {
    let mut porter = Porter {
        src,
        dst,
        types,
        codecs,
        memo: HashMap::new(),
        warnings: Vec::new(),
    };
    let entry = porter.port(src_ref)?;
    Ok(Ported {
        entry,
        warnings: porter.warnings,
    })
}

struct Porter<'a> {
    src: &'a PackageGraph,
    dst: &'a mut PackageGraph,
    types: &'a TypeRegistry,
    codecs: &'a CodecRegistry,
    /// Source full path -> destination reference, per operation.
    memo: HashMap<String, Reference>,
    warnings: Vec<PortWarning>,
}

impl Porter<'_> {
    /// Produce an entry in the destination equivalent to `src_ref`.
    fn port(&mut self, src_ref: Reference) -> Result<Reference> {
        if src_ref.is_null() {
            return Err(Error::UnresolvableReference("null reference".into()));
        }
        let path = self.src.full_path(src_ref)?;

        if let Some(&done) = self.memo.get(&path) {
            return Ok(done);
        }
        if let Some(existing) = self.dst.find_entry_by_path(&path) {
            self.memo.insert(path, existing);
            return Ok(existing);
        }

        match self.src.get_entry(src_ref)? {
            Some(Entry::Import(_)) => self.port_import(src_ref, path),
            Some(Entry::Export(_)) => {
                if self.src.class_name(src_ref)? == "Package" {
                    self.port_package_export(src_ref, path)
                } else {
                    self.port_data_export(src_ref, path)
                }
            }
            None => Err(Error::UnresolvableReference(path)),
        }
    }

    /// Copy a name into the destination table, keeping its number.
    fn copy_name(&mut self, name: NameRef) -> Result<NameRef> {
        let text = self.src.name_str(name)?.to_string();
        Ok(NameRef::with_number(
            self.dst.find_name_or_add(&text),
            name.number,
        ))
    }

    fn port_parent(&mut self, src_ref: Reference) -> Result<Reference> {
        match self.src.link(src_ref)? {
            Reference::Null => Ok(Reference::Null),
            link => self.port(link),
        }
    }

    fn port_import(&mut self, src_ref: Reference, path: String) -> Result<Reference> {
        let parent = self.port_parent(src_ref)?;
        let src_import = self.src.import(src_ref)?.clone();
        let entry = ImportEntry {
            package_file: self.copy_name(src_import.package_file)?,
            class_name: self.copy_name(src_import.class_name)?,
            link: parent,
            object_name: self.copy_name(src_import.object_name)?,
        };
        let ported = self.dst.add_import(entry);
        self.memo.insert(path, ported);
        Ok(ported)
    }

    /// Packages are namespace containers: synthesize an empty export,
    /// never copy payload.
    fn port_package_export(&mut self, src_ref: Reference, path: String) -> Result<Reference> {
        let parent = self.port_parent(src_ref)?;
        let src_export = self.src.export(src_ref)?.clone();
        let class = self.resolve_or_null(src_export.class, &path);

        let mut entry = ExportEntry::new(self.copy_name(src_export.object_name)?);
        entry.class = class;
        entry.link = parent;
        entry.object_flags = src_export.object_flags & !ObjectFlags::HAS_STACK;
        entry.guid = src_export.guid;
        entry.package_flags = src_export.package_flags;

        let ported = self.dst.add_export(entry);
        self.memo.insert(path, ported);
        Ok(ported)
    }

    fn port_data_export(&mut self, src_ref: Reference, path: String) -> Result<Reference> {
        let parent = self.port_parent(src_ref)?;
        let src_export = self.src.export(src_ref)?.clone();
        let class_name = self.src.class_name(src_ref)?;

        // Insert the shell and memoize it before resolving anything it
        // references: cycles that run back to this entry, through its
        // headers, properties or binary data, must land on the shell
        // instead of recursing into it again.
        let mut entry = ExportEntry::new(self.copy_name(src_export.object_name)?);
        entry.link = parent;
        entry.object_flags = src_export.object_flags;
        entry.export_flags = src_export.export_flags;
        entry.guid = src_export.guid;
        entry.package_flags = src_export.package_flags;
        let ported = self.dst.add_export(entry);
        self.memo.insert(path.clone(), ported);

        let class = self.resolve_or_null(src_export.class, &path);
        let super_class = self.resolve_or_null(src_export.super_class, &path);
        let archetype = self.resolve_or_null(src_export.archetype, &path);
        {
            let export = self.dst.export_mut(ported)?;
            export.class = class;
            export.super_class = super_class;
            export.archetype = archetype;
        }

        let mut props = self
            .src
            .properties_with(src_ref, self.types)?;
        if self.src.game() != self.dst.game() {
            self.prune_incompatible(&mut props, &class_name, &path, self.dst.game());
        }
        self.relink_collection(&mut props, &path);

        let mut payload = self.src.binary_with(src_ref, self.types, self.codecs)?;
        payload.relink(&mut |reference| {
            if reference.is_null() {
                Reference::Null
            } else {
                self.resolve_or_null(reference, &path)
            }
        });

        let mut data = Vec::with_capacity(src_export.data.len());
        if src_export.has_stack() {
            match self.dst.game() {
                Game::Me3 => data.extend_from_slice(&STACK_TEMPLATE_ME3),
                _ => data.extend_from_slice(&STACK_TEMPLATE_OLD),
            }
        }
        data.extend(self.dst.encode_properties(&props)?);
        data.extend(payload.encode(self.dst.game())?);
        self.dst.export_mut(ported)?.data = data;

        Ok(ported)
    }

    /// Resolve a reference through the full algorithm; on failure null
    /// it out and record the omission.
    fn resolve_or_null(&mut self, reference: Reference, owner_path: &str) -> Reference {
        if reference.is_null() {
            return Reference::Null;
        }
        match self.port(reference) {
            Ok(resolved) => resolved,
            Err(err) => {
                warn!(entry = owner_path, %err, "nulling unresolvable reference");
                self.warnings.push(PortWarning::UnresolvedReference {
                    entry: owner_path.to_string(),
                    detail: err.to_string(),
                });
                Reference::Null
            }
        }
    }

    /// Drop properties that do not exist in the destination format.
    fn prune_incompatible(
        &mut self,
        props: &mut PropertyCollection,
        class_name: &str,
        owner_path: &str,
        dst_game: Game,
    ) {
        let types = self.types;
        let dropped =
            props.drain_unsupported(|p| types.supported(dst_game, class_name, &p.name.name));
        for prop in dropped {
            warn!(
                entry = owner_path,
                property = %prop.name,
                game = %dst_game,
                "dropping property not present in destination format"
            );
            self.warnings.push(PortWarning::DroppedProperty {
                entry: owner_path.to_string(),
                property: prop.name.to_string(),
            });
        }
    }

    fn relink_collection(&mut self, props: &mut PropertyCollection, owner_path: &str) {
        for prop in props.iter_mut() {
            match &mut prop.value {
                PropertyValue::Object(reference) => {
                    if !reference.is_null() {
                        *reference = self.resolve_or_null(*reference, owner_path);
                    }
                }
                PropertyValue::Delegate { object, .. } => {
                    if !object.is_null() {
                        *object = self.resolve_or_null(*object, owner_path);
                    }
                }
                PropertyValue::Struct { properties, .. } => {
                    self.relink_collection(properties, owner_path);
                }
                PropertyValue::Array(ArrayValue::Objects(values)) => {
                    for reference in values {
                        if !reference.is_null() {
                            *reference = self.resolve_or_null(*reference, owner_path);
                        }
                    }
                }
                PropertyValue::Array(ArrayValue::Structs { elements, .. }) => {
                    for element in elements {
                        self.relink_collection(element, owner_path);
                    }
                }
                _ => {}
            }
        }
    }
}
