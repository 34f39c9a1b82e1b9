//! Container parsing: raw bytes in, [`PackageGraph`] out.

use tracing::debug;

use crate::util::{Error, Result};
use crate::wire::Cursor;

use super::entry::{ExportEntry, ImportEntry, ObjectFlags, PackageFlags, Reference};
use super::names::{NameRef, NameTable};
use super::{Game, PackageGraph, PACKAGE_MAGIC};

/// Byte size of one import table row.
pub(crate) const IMPORT_ROW_SIZE: usize = 28;
/// Byte size of one export table row.
pub(crate) const EXPORT_ROW_SIZE: usize = 64;
/// Byte size of the fixed header.
pub(crate) const HEADER_SIZE: usize = 32;

struct Header {
    game: Game,
    name_count: usize,
    name_offset: usize,
    import_count: usize,
    import_offset: usize,
    export_count: usize,
    export_offset: usize,
}

fn read_header(cursor: &mut Cursor) -> Result<Header> {
    let magic = cursor.read_u32()?;
    if magic != PACKAGE_MAGIC {
        return Err(Error::InvalidMagic(magic));
    }
    let version = cursor.read_u16()?;
    let licensee = cursor.read_u16()?;
    let game = Game::from_version(version, licensee)?;

    Ok(Header {
        game,
        name_count: cursor.read_u32()? as usize,
        name_offset: cursor.read_u32()? as usize,
        import_count: cursor.read_u32()? as usize,
        import_offset: cursor.read_u32()? as usize,
        export_count: cursor.read_u32()? as usize,
        export_offset: cursor.read_u32()? as usize,
    })
}

fn read_name_table(cursor: &mut Cursor, header: &Header) -> Result<NameTable> {
    cursor.seek(header.name_offset)?;
    let mut names = NameTable::new();
    for _ in 0..header.name_count {
        let len = cursor.read_u32()? as usize;
        if len == 0 {
            return Err(Error::format("empty name table entry"));
        }
        let bytes = cursor.read_bytes(len)?;
        // NUL-terminated on the wire.
        let text = String::from_utf8(bytes[..len - 1].to_vec())?;
        let flags = if header.game.has_name_flags() {
            cursor.read_u64()?
        } else {
            0
        };
        names.push_raw(text, flags);
    }
    Ok(names)
}

fn read_name_ref(cursor: &mut Cursor, names: &NameTable) -> Result<NameRef> {
    let index = cursor.read_u32()?;
    names.get(index)?;
    Ok(NameRef {
        index,
        number: cursor.read_u32()?,
    })
}

/// Parse a package file held in memory.
pub fn parse(data: &[u8]) -> Result<PackageGraph> {
    let mut cursor = Cursor::new(data);
    let header = read_header(&mut cursor)?;
    let names = read_name_table(&mut cursor, &header)?;

    cursor.seek(header.import_offset)?;
    let mut imports = Vec::with_capacity(header.import_count);
    for _ in 0..header.import_count {
        imports.push(ImportEntry {
            package_file: read_name_ref(&mut cursor, &names)?,
            class_name: read_name_ref(&mut cursor, &names)?,
            link: Reference::from_wire(cursor.read_i32()?),
            object_name: read_name_ref(&mut cursor, &names)?,
        });
    }

    cursor.seek(header.export_offset)?;
    let mut exports = Vec::with_capacity(header.export_count);
    for _ in 0..header.export_count {
        let class = Reference::from_wire(cursor.read_i32()?);
        let super_class = Reference::from_wire(cursor.read_i32()?);
        let link = Reference::from_wire(cursor.read_i32()?);
        let object_name = read_name_ref(&mut cursor, &names)?;
        let archetype = Reference::from_wire(cursor.read_i32()?);
        let object_flags = ObjectFlags::from_bits_retain(cursor.read_u64()?);
        let data_size = cursor.read_u32()? as usize;
        let data_offset = cursor.read_u32()? as usize;
        let export_flags = cursor.read_u32()?;
        let mut guid = [0u8; 16];
        guid.copy_from_slice(cursor.read_bytes(16)?);
        let package_flags = PackageFlags::from_bits_retain(cursor.read_u32()?);

        if data_offset.checked_add(data_size).map_or(true, |end| end > data.len()) {
            return Err(Error::format(format!(
                "export payload [{}, +{}) outside {}-byte file",
                data_offset,
                data_size,
                data.len()
            )));
        }

        exports.push(ExportEntry {
            class,
            super_class,
            link,
            object_name,
            archetype,
            object_flags,
            export_flags,
            guid,
            package_flags,
            data: data[data_offset..data_offset + data_size].to_vec(),
        });
    }

    validate_references(&imports, &exports)?;

    debug!(
        game = %header.game,
        names = names.len(),
        imports = imports.len(),
        exports = exports.len(),
        "parsed package"
    );
    Ok(PackageGraph::from_parts(header.game, names, imports, exports))
}

/// Every header-level reference must resolve within the tables just
/// read; a row pointing outside them means the file is corrupt, not
/// that the caller misused the API.
fn validate_references(imports: &[ImportEntry], exports: &[ExportEntry]) -> Result<()> {
    let in_range = |reference: Reference| match reference {
        Reference::Null => true,
        Reference::Import(i) => (i as usize) < imports.len(),
        Reference::Export(i) => (i as usize) < exports.len(),
    };
    for (i, imp) in imports.iter().enumerate() {
        if !in_range(imp.link) {
            return Err(Error::format(format!(
                "import {} link {} out of range",
                i, imp.link
            )));
        }
    }
    for (i, exp) in exports.iter().enumerate() {
        for (field, reference) in [
            ("link", exp.link),
            ("class", exp.class),
            ("super", exp.super_class),
            ("archetype", exp.archetype),
        ] {
            if !in_range(reference) {
                return Err(Error::format(format!(
                    "export {} {} {} out of range",
                    i, field, reference
                )));
            }
        }
    }
    Ok(())
}
