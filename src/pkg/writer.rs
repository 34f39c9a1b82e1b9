//! Container serialization: [`PackageGraph`] in, raw bytes out.
//!
//! Layout: fixed header, name table, import table, export table, then
//! each export's payload in table order. Parsing the output and
//! serializing again reproduces it byte for byte.

use crate::util::Result;
use crate::wire::Writer;

use super::names::NameRef;
use super::reader::{EXPORT_ROW_SIZE, HEADER_SIZE, IMPORT_ROW_SIZE};
use super::{PackageGraph, PACKAGE_MAGIC};

fn name_table_size(graph: &PackageGraph) -> usize {
    let per_name_extra = if graph.game().has_name_flags() { 8 } else { 0 };
    graph
        .names()
        .iter()
        // Length prefix + text + NUL.
        .map(|e| 4 + e.text.len() + 1 + per_name_extra)
        .sum()
}

fn write_name_ref(w: &mut Writer, name: NameRef) {
    w.write_u32(name.index);
    w.write_u32(name.number);
}

/// Serialize a package graph into a self-contained file image.
pub fn serialize(graph: &PackageGraph) -> Result<Vec<u8>> {
    let name_offset = HEADER_SIZE;
    let import_offset = name_offset + name_table_size(graph);
    let export_offset = import_offset + graph.import_count() * IMPORT_ROW_SIZE;
    let data_offset = export_offset + graph.export_count() * EXPORT_ROW_SIZE;

    let mut w = Writer::new();
    let (version, licensee) = graph.game().version();
    w.write_u32(PACKAGE_MAGIC);
    w.write_u16(version);
    w.write_u16(licensee);
    w.write_u32(graph.names().len() as u32);
    w.write_u32(name_offset as u32);
    w.write_u32(graph.import_count() as u32);
    w.write_u32(import_offset as u32);
    w.write_u32(graph.export_count() as u32);
    w.write_u32(export_offset as u32);

    for entry in graph.names().iter() {
        w.write_u32(entry.text.len() as u32 + 1);
        w.write_bytes(entry.text.as_bytes());
        w.write_u8(0);
        if graph.game().has_name_flags() {
            w.write_u64(entry.flags);
        }
    }

    for (_, imp) in graph.imports() {
        write_name_ref(&mut w, imp.package_file);
        write_name_ref(&mut w, imp.class_name);
        w.write_i32(imp.link.to_wire());
        write_name_ref(&mut w, imp.object_name);
    }

    let mut next_data_offset = data_offset;
    for (_, exp) in graph.exports() {
        w.write_i32(exp.class.to_wire());
        w.write_i32(exp.super_class.to_wire());
        w.write_i32(exp.link.to_wire());
        write_name_ref(&mut w, exp.object_name);
        w.write_i32(exp.archetype.to_wire());
        w.write_u64(exp.object_flags.bits());
        w.write_u32(exp.data.len() as u32);
        w.write_u32(next_data_offset as u32);
        w.write_u32(exp.export_flags);
        w.write_bytes(&exp.guid);
        w.write_u32(exp.package_flags.bits());
        next_data_offset += exp.data.len();
    }

    for (_, exp) in graph.exports() {
        w.write_bytes(&exp.data);
    }

    Ok(w.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::super::entry::{ExportEntry, ImportEntry, Reference};
    use super::super::{Game, PackageGraph};
    use super::*;

    #[test]
    fn test_serialize_parse_roundtrip() {
        let mut graph = PackageGraph::new(Game::Me3);
        let core = graph.name_ref("Core");
        let class = graph.name_ref("Class");
        let actor = graph.name_ref("Actor");
        let class_import = graph.add_import(ImportEntry {
            package_file: core,
            class_name: class,
            link: Reference::Null,
            object_name: actor,
        });

        let obj_name = graph.name_ref("MyActor");
        let mut export = ExportEntry::new(obj_name);
        export.class = class_import;
        export.data = vec![0u8; 8]; // placeholder sentinel-free payload
        graph.add_export(export);

        let bytes = serialize(&graph).unwrap();
        let parsed = super::super::reader::parse(&bytes).unwrap();
        assert_eq!(parsed.game(), Game::Me3);
        assert_eq!(parsed.import_count(), 1);
        assert_eq!(parsed.export_count(), 1);
        let bytes2 = serialize(&parsed).unwrap();
        assert_eq!(bytes, bytes2);
    }

    #[test]
    fn test_me1_name_flags_roundtrip() {
        let graph = PackageGraph::new(Game::Me1);
        let bytes = serialize(&graph).unwrap();
        let parsed = super::super::reader::parse(&bytes).unwrap();
        assert_eq!(serialize(&parsed).unwrap(), bytes);
    }
}
