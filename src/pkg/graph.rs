//! The package entry graph.
//!
//! Entries live in two growable arenas (imports and exports) owned by
//! the graph; every cross-entry relationship is a [`Reference`] handle
//! into those arenas, never an owning pointer. The graph also owns the
//! name table.

use std::collections::HashSet;

use crate::binary::{BinaryPayload, CodecRegistry};
use crate::props::{codec, PropertyCollection, TypeRegistry};
use crate::util::{Error, Result};

use super::entry::{ExportEntry, ImportEntry, Reference};
use super::names::{NameRef, NameTable};
use super::{Game, NONE_NAME};

/// Borrowed view of an entry of either kind.
#[derive(Debug, Clone, Copy)]
pub enum Entry<'a> {
    Import(&'a ImportEntry),
    Export(&'a ExportEntry),
}

impl<'a> Entry<'a> {
    pub fn object_name(&self) -> NameRef {
        match self {
            Entry::Import(imp) => imp.object_name,
            Entry::Export(exp) => exp.object_name,
        }
    }

    pub fn link(&self) -> Reference {
        match self {
            Entry::Import(imp) => imp.link,
            Entry::Export(exp) => exp.link,
        }
    }
}

/// A package's full set of entries plus its name table.
#[derive(Debug, Clone)]
pub struct PackageGraph {
    game: Game,
    names: NameTable,
    imports: Vec<ImportEntry>,
    exports: Vec<ExportEntry>,
}

impl PackageGraph {
    /// Create an empty package. The name table starts with "None" so
    /// the property sentinel always resolves.
    pub fn new(game: Game) -> Self {
        let mut names = NameTable::new();
        names.find_or_add(NONE_NAME);
        Self {
            game,
            names,
            imports: Vec::new(),
            exports: Vec::new(),
        }
    }

    /// Used by the container reader, which restores the name table
    /// exactly as stored.
    pub(crate) fn from_parts(
        game: Game,
        names: NameTable,
        imports: Vec<ImportEntry>,
        exports: Vec<ExportEntry>,
    ) -> Self {
        Self {
            game,
            names,
            imports,
            exports,
        }
    }

    /// Parse a package file image. See [`reader::parse`](super::reader::parse).
    pub fn parse(data: &[u8]) -> Result<Self> {
        super::reader::parse(data)
    }

    /// Serialize to a self-contained file image. See
    /// [`writer::serialize`](super::writer::serialize).
    pub fn serialize(&self) -> Result<Vec<u8>> {
        super::writer::serialize(self)
    }

    pub fn game(&self) -> Game {
        self.game
    }

    pub fn names(&self) -> &NameTable {
        &self.names
    }

    pub fn import_count(&self) -> usize {
        self.imports.len()
    }

    pub fn export_count(&self) -> usize {
        self.exports.len()
    }

    pub fn imports(&self) -> impl Iterator<Item = (Reference, &ImportEntry)> {
        self.imports
            .iter()
            .enumerate()
            .map(|(i, imp)| (Reference::Import(i as u32), imp))
    }

    pub fn exports(&self) -> impl Iterator<Item = (Reference, &ExportEntry)> {
        self.exports
            .iter()
            .enumerate()
            .map(|(i, exp)| (Reference::Export(i as u32), exp))
    }

    // ------------------------------------------------------------------
    // Entry lookup
    // ------------------------------------------------------------------

    fn out_of_range(&self, reference: Reference) -> Error {
        Error::IndexOutOfRange {
            index: reference.to_wire(),
            exports: self.exports.len(),
            imports: self.imports.len(),
        }
    }

    /// Resolve a reference. `Null` is `Ok(None)`; a slot outside the
    /// arenas is a contract violation and errors.
    pub fn get_entry(&self, reference: Reference) -> Result<Option<Entry<'_>>> {
        match reference {
            Reference::Null => Ok(None),
            Reference::Import(i) => self
                .imports
                .get(i as usize)
                .map(|imp| Some(Entry::Import(imp)))
                .ok_or_else(|| self.out_of_range(reference)),
            Reference::Export(i) => self
                .exports
                .get(i as usize)
                .map(|exp| Some(Entry::Export(exp)))
                .ok_or_else(|| self.out_of_range(reference)),
        }
    }

    pub fn import(&self, reference: Reference) -> Result<&ImportEntry> {
        match reference {
            Reference::Import(i) => self
                .imports
                .get(i as usize)
                .ok_or_else(|| self.out_of_range(reference)),
            _ => Err(Error::WrongEntryKind(format!(
                "{} is not an import",
                reference
            ))),
        }
    }

    pub fn export(&self, reference: Reference) -> Result<&ExportEntry> {
        match reference {
            Reference::Export(i) => self
                .exports
                .get(i as usize)
                .ok_or_else(|| self.out_of_range(reference)),
            _ => Err(Error::WrongEntryKind(format!(
                "{} is not an export",
                reference
            ))),
        }
    }

    pub fn export_mut(&mut self, reference: Reference) -> Result<&mut ExportEntry> {
        match reference {
            Reference::Export(i) => {
                if i as usize >= self.exports.len() {
                    return Err(self.out_of_range(reference));
                }
                Ok(&mut self.exports[i as usize])
            }
            _ => Err(Error::WrongEntryKind(format!(
                "{} is not an export",
                reference
            ))),
        }
    }

    // ------------------------------------------------------------------
    // Entry and name creation
    // ------------------------------------------------------------------

    /// Append an import; its reference is returned and stays valid for
    /// the graph's lifetime.
    pub fn add_import(&mut self, entry: ImportEntry) -> Reference {
        self.imports.push(entry);
        Reference::Import((self.imports.len() - 1) as u32)
    }

    /// Append an export; its reference is returned and stays valid for
    /// the graph's lifetime.
    pub fn add_export(&mut self, entry: ExportEntry) -> Reference {
        self.exports.push(entry);
        Reference::Export((self.exports.len() - 1) as u32)
    }

    pub fn find_name_or_add(&mut self, name: &str) -> u32 {
        self.names.find_or_add(name)
    }

    pub fn name_ref(&mut self, name: &str) -> NameRef {
        NameRef::new(self.names.find_or_add(name))
    }

    /// Text of a name-table reference (without the instance number).
    pub fn name_str(&self, name: NameRef) -> Result<&str> {
        self.names.get(name.index)
    }

    /// Display form of a name: `Foo` or `Foo_3` for instance number 4.
    pub fn display_name(&self, name: NameRef) -> Result<String> {
        let text = self.names.get(name.index)?;
        if name.number > 0 {
            Ok(format!("{}_{}", text, name.number - 1))
        } else {
            Ok(text.to_string())
        }
    }

    // ------------------------------------------------------------------
    // Names of entry attributes
    // ------------------------------------------------------------------

    pub fn object_name(&self, reference: Reference) -> Result<String> {
        match self.get_entry(reference)? {
            Some(entry) => Ok(self.name_str(entry.object_name())?.to_string()),
            None => Err(Error::WrongEntryKind("null reference has no name".into())),
        }
    }

    /// Class name of an entry. For an export this is the object name of
    /// the class target; a null class means the entry is itself a class.
    pub fn class_name(&self, reference: Reference) -> Result<String> {
        match self.get_entry(reference)? {
            Some(Entry::Import(imp)) => Ok(self.name_str(imp.class_name)?.to_string()),
            Some(Entry::Export(exp)) => {
                if exp.class.is_null() {
                    Ok("Class".to_string())
                } else {
                    self.object_name(exp.class)
                }
            }
            None => Err(Error::WrongEntryKind("null reference has no class".into())),
        }
    }

    pub fn link(&self, reference: Reference) -> Result<Reference> {
        match self.get_entry(reference)? {
            Some(entry) => Ok(entry.link()),
            None => Err(Error::WrongEntryKind("null reference has no link".into())),
        }
    }

    // ------------------------------------------------------------------
    // Paths
    // ------------------------------------------------------------------

    /// Dotted path from the top-level ancestor down to this entry,
    /// e.g. "Pkg.SubPkg.Object". Guards against cyclic links.
    pub fn full_path(&self, reference: Reference) -> Result<String> {
        self.path_with(reference, |name| {
            self.name_str(name).map(|s| s.to_string())
        })
    }

    /// Like [`full_path`](Self::full_path) but with instance-number
    /// suffixes, which disambiguate same-named siblings.
    pub fn indexed_full_path(&self, reference: Reference) -> Result<String> {
        self.path_with(reference, |name| self.display_name(name))
    }

    fn path_with<F>(&self, reference: Reference, render: F) -> Result<String>
    where
        F: Fn(NameRef) -> Result<String>,
    {
        let mut segments = Vec::new();
        let mut seen = HashSet::new();
        let mut current = reference;
        while !current.is_null() {
            if !seen.insert(current) {
                return Err(Error::GraphCycle(segments.join(".")));
            }
            let entry = self
                .get_entry(current)?
                .ok_or_else(|| self.out_of_range(current))?;
            segments.push(render(entry.object_name())?);
            current = entry.link();
        }
        segments.reverse();
        Ok(segments.join("."))
    }

    /// Display string for a reference: "Null", "[I] path" or "[E] path".
    pub fn entry_string(&self, reference: Reference) -> String {
        if reference.is_null() {
            return "Null".to_string();
        }
        let tag = if reference.is_import() { "[I]" } else { "[E]" };
        match self.indexed_full_path(reference) {
            Ok(path) => format!("{} {}", tag, path),
            Err(_) => "Entry not found".to_string(),
        }
    }

    /// Find an entry of either kind by its (non-indexed) full path.
    pub fn find_entry_by_path(&self, path: &str) -> Option<Reference> {
        if path.is_empty() {
            return None;
        }
        self.imports()
            .map(|(r, _)| r)
            .chain(self.exports().map(|(r, _)| r))
            .find(|&r| matches!(self.full_path(r).as_deref(), Ok(p) if p == path))
    }

    // ------------------------------------------------------------------
    // Hierarchy queries
    // ------------------------------------------------------------------

    /// Entries whose link is `parent`. `Null` yields top-level entries.
    pub fn children(&self, parent: Reference) -> Vec<Reference> {
        self.exports()
            .map(|(r, _)| r)
            .chain(self.imports().map(|(r, _)| r))
            .filter(|&r| {
                self.get_entry(r)
                    .ok()
                    .flatten()
                    .map(|e| e.link() == parent)
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Transitive closure of [`children`](Self::children).
    pub fn descendants(&self, parent: Reference) -> Vec<Reference> {
        self.exports()
            .map(|(r, _)| r)
            .chain(self.imports().map(|(r, _)| r))
            .filter(|&r| self.is_descendant_of(r, parent).unwrap_or(false))
            .collect()
    }

    pub fn is_descendant_of(&self, entry: Reference, ancestor: Reference) -> Result<bool> {
        let mut seen = HashSet::new();
        let mut current = self.link(entry)?;
        while !current.is_null() {
            if current == ancestor {
                return Ok(true);
            }
            if !seen.insert(current) {
                return Err(Error::GraphCycle(self.entry_string(entry)));
            }
            current = self.link(current)?;
        }
        Ok(false)
    }

    /// Locate an entry by dotted path, synthesizing Package-class
    /// imports for any missing path segments. Only suitable when the
    /// missing parents really are packages. Empty path yields `None`.
    pub fn entry_or_add_import(
        &mut self,
        full_path: &str,
        class_name: &str,
        package_file: &str,
    ) -> Result<Option<Reference>> {
        if full_path.is_empty() {
            return Ok(None);
        }
        if let Some(existing) = self.find_entry_by_path(full_path) {
            return Ok(Some(existing));
        }

        let (parent_path, leaf) = match full_path.rfind('.') {
            Some(dot) => (&full_path[..dot], &full_path[dot + 1..]),
            None => ("", full_path),
        };
        let parent = self.entry_or_add_import(parent_path, "Package", package_file)?;

        let import = ImportEntry {
            package_file: self.name_ref(package_file),
            class_name: self.name_ref(class_name),
            link: parent.unwrap_or_default(),
            object_name: self.name_ref(leaf),
        };
        Ok(Some(self.add_import(import)))
    }

    // ------------------------------------------------------------------
    // Export payload access
    // ------------------------------------------------------------------

    /// Offset of the tagged property list within an export's payload.
    pub fn property_start(&self, reference: Reference) -> Result<usize> {
        let export = self.export(reference)?;
        Ok(if export.has_stack() {
            self.game.stack_record_size()
        } else {
            0
        })
    }

    /// Decode an export's tagged property list with the standard type
    /// registry.
    pub fn properties(&self, reference: Reference) -> Result<PropertyCollection> {
        self.properties_with(reference, TypeRegistry::standard())
    }

    /// Decode an export's tagged property list.
    pub fn properties_with(
        &self,
        reference: Reference,
        registry: &TypeRegistry,
    ) -> Result<PropertyCollection> {
        let start = self.property_start(reference)?;
        let export = self.export(reference)?;
        let class_name = self.class_name(reference)?;
        codec::decode(
            &export.data,
            start,
            &self.names,
            self.game,
            &class_name,
            registry,
        )
    }

    /// Re-encode a property collection into an export's payload,
    /// keeping the pre-property region and the binary tail.
    pub fn write_properties(
        &mut self,
        reference: Reference,
        props: &PropertyCollection,
    ) -> Result<()> {
        let start = self.property_start(reference)?;
        // Decode the current list to find where the binary tail begins.
        let current = self.properties(reference)?;
        let encoded = codec::encode(props, &mut self.names, self.game)?;

        let export = self.export_mut(reference)?;
        let mut data = Vec::with_capacity(export.data.len());
        data.extend_from_slice(&export.data[..start]);
        data.extend_from_slice(&encoded);
        data.extend_from_slice(&export.data[current.end_offset()..]);
        export.data = data;
        Ok(())
    }

    /// Name-keyed upsert of a single property.
    pub fn write_property(
        &mut self,
        reference: Reference,
        prop: crate::props::Property,
    ) -> Result<()> {
        let mut props = self.properties(reference)?;
        props.add_or_replace(prop);
        self.write_properties(reference, &props)
    }

    /// Remove a property by name. Returns whether one was removed.
    pub fn remove_property(&mut self, reference: Reference, name: &str) -> Result<bool> {
        let mut props = self.properties(reference)?;
        if props.remove(name) {
            self.write_properties(reference, &props)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Encode a property collection against this graph's name table
    /// without touching any entry. Missing names are interned.
    pub fn encode_properties(&mut self, props: &PropertyCollection) -> Result<Vec<u8>> {
        codec::encode(props, &mut self.names, self.game)
    }

    /// Decode the binary tail following an export's property list.
    pub fn binary(
        &self,
        reference: Reference,
        codecs: &CodecRegistry,
    ) -> Result<Box<dyn BinaryPayload>> {
        self.binary_with(reference, TypeRegistry::standard(), codecs)
    }

    pub fn binary_with(
        &self,
        reference: Reference,
        types: &TypeRegistry,
        codecs: &CodecRegistry,
    ) -> Result<Box<dyn BinaryPayload>> {
        let props = self.properties_with(reference, types)?;
        let export = self.export(reference)?;
        let class_name = self.class_name(reference)?;
        codecs.decode(&class_name, &export.data[props.end_offset()..], self.game)
    }

    /// Replace an export's binary tail.
    pub fn write_binary(&mut self, reference: Reference, payload: &dyn BinaryPayload) -> Result<()> {
        let props = self.properties(reference)?;
        let encoded = payload.encode(self.game)?;
        let export = self.export_mut(reference)?;
        export.data.truncate(props.end_offset());
        export.data.extend_from_slice(&encoded);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with_pair() -> (PackageGraph, Reference, Reference) {
        let mut graph = PackageGraph::new(Game::Me3);
        let pkg_name = graph.name_ref("Pkg");
        let obj_name = graph.name_ref("Obj");
        let a = graph.add_export(ExportEntry::new(pkg_name));
        let mut b = ExportEntry::new(obj_name);
        b.link = a;
        let b = graph.add_export(b);
        (graph, a, b)
    }

    #[test]
    fn test_uindex_resolution() {
        let (graph, a, b) = graph_with_pair();
        assert_eq!(a.to_wire(), 1);
        assert_eq!(b.to_wire(), 2);
        assert!(graph.get_entry(Reference::Null).unwrap().is_none());
        assert!(graph.get_entry(a).unwrap().is_some());
        assert!(matches!(
            graph.get_entry(Reference::Export(9)),
            Err(Error::IndexOutOfRange { index: 10, .. })
        ));
    }

    #[test]
    fn test_full_path() {
        let (graph, _, b) = graph_with_pair();
        assert_eq!(graph.full_path(b).unwrap(), "Pkg.Obj");
    }

    #[test]
    fn test_link_cycle_detected() {
        let (mut graph, a, b) = graph_with_pair();
        graph.export_mut(a).unwrap().link = b;
        let err = graph.full_path(b).unwrap_err();
        assert!(matches!(err, Error::GraphCycle(_)));
    }

    #[test]
    fn test_children_and_descendants() {
        let (mut graph, a, b) = graph_with_pair();
        let leaf_name = graph.name_ref("Leaf");
        let mut c = ExportEntry::new(leaf_name);
        c.link = b;
        let c = graph.add_export(c);

        assert_eq!(graph.children(a), vec![b]);
        let mut descendants = graph.descendants(a);
        descendants.sort_by_key(|r| r.to_wire());
        assert_eq!(descendants, vec![b, c]);
        assert!(graph.is_descendant_of(c, a).unwrap());
        assert!(!graph.is_descendant_of(b, c).unwrap());
    }

    #[test]
    fn test_entry_or_add_import_fills_parents() {
        let mut graph = PackageGraph::new(Game::Me3);
        let actor = graph
            .entry_or_add_import("Engine.Actor", "Class", "Core")
            .unwrap()
            .unwrap();
        assert_eq!(graph.import_count(), 2);
        assert_eq!(graph.full_path(actor).unwrap(), "Engine.Actor");
        let engine = graph.link(actor).unwrap();
        assert_eq!(graph.class_name(engine).unwrap(), "Package");

        // Second call returns the same entry, adds nothing.
        let again = graph
            .entry_or_add_import("Engine.Actor", "Class", "Core")
            .unwrap()
            .unwrap();
        assert_eq!(again, actor);
        assert_eq!(graph.import_count(), 2);
    }

    #[test]
    fn test_entry_string() {
        let (graph, a, _) = graph_with_pair();
        assert_eq!(graph.entry_string(Reference::Null), "Null");
        assert_eq!(graph.entry_string(a), "[E] Pkg");
    }
}
