//! Wire codec for tagged property lists.
//!
//! Record layout: name NameRef; "None" ends the list. Otherwise a type
//! NameRef, a size field, a static array index, then the kind-specific
//! payload. ByteProperty and StructProperty carry an extra NameRef
//! (enum type / struct type) that is not counted in `size`. Every size
//! field is recomputed on encode from the actual payload, so nested
//! edits propagate outward.

use crate::pkg::names::NameTable;
use crate::pkg::{Game, Reference, NONE_NAME};
use crate::util::{Error, Result};
use crate::wire::{Cursor, Writer};

use super::types::{ArrayKind, TypeRegistry};
use super::{
    ArrayValue, ByteValue, PropName, Property, PropertyCollection, PropertyValue, UString,
};

/// Decode the tagged property list of an export payload, starting at
/// `start` (just past any stack record).
pub fn decode(
    data: &[u8],
    start: usize,
    names: &NameTable,
    game: Game,
    class_name: &str,
    registry: &TypeRegistry,
) -> Result<PropertyCollection> {
    // A payload with no property region at all (fresh export) is an
    // empty list; a list that starts and then runs out is malformed.
    if start == data.len() {
        return Ok(PropertyCollection::with_end_offset(Vec::new(), start));
    }
    let mut cursor = Cursor::new(data);
    cursor.seek(start)?;
    decode_list(&mut cursor, names, game, class_name, registry)
}

fn read_name(cursor: &mut Cursor, names: &NameTable) -> Result<PropName> {
    let index = cursor.read_u32()?;
    let number = cursor.read_u32()?;
    Ok(PropName {
        name: names.get(index)?.to_string(),
        number,
    })
}

fn decode_list(
    cursor: &mut Cursor,
    names: &NameTable,
    game: Game,
    class_name: &str,
    registry: &TypeRegistry,
) -> Result<PropertyCollection> {
    let mut props = Vec::new();
    loop {
        if cursor.is_empty() {
            return Err(Error::format(
                "property list ended without the None sentinel",
            ));
        }
        let name = read_name(cursor, names)?;
        if name.name == NONE_NAME {
            return Ok(PropertyCollection::with_end_offset(props, cursor.pos()));
        }
        let type_name = read_name(cursor, names)?;
        let size = cursor.read_u32()? as usize;
        let static_array_index = cursor.read_u32()?;

        let (value_offset, value) = match type_name.name.as_str() {
            "IntProperty" => (cursor.pos(), PropertyValue::Int(cursor.read_i32()?)),
            "FloatProperty" => (cursor.pos(), PropertyValue::Float(cursor.read_f32()?)),
            "ObjectProperty" => (
                cursor.pos(),
                PropertyValue::Object(Reference::from_wire(cursor.read_i32()?)),
            ),
            "NameProperty" => (cursor.pos(), PropertyValue::Name(read_name(cursor, names)?)),
            "BoolProperty" => {
                let offset = cursor.pos();
                let value = match game {
                    Game::Me3 => cursor.read_u8()? != 0,
                    _ => cursor.read_u32()? != 0,
                };
                (offset, PropertyValue::Bool(value))
            }
            "ByteProperty" => decode_byte(cursor, names, game)?,
            "StrProperty" => {
                let offset = cursor.pos();
                (offset, PropertyValue::Str(read_string(cursor)?))
            }
            "DelegateProperty" => {
                let offset = cursor.pos();
                let object = Reference::from_wire(cursor.read_i32()?);
                let function = read_name(cursor, names)?;
                (offset, PropertyValue::Delegate { object, function })
            }
            "StructProperty" => {
                let struct_type = read_name(cursor, names)?;
                let offset = cursor.pos();
                let properties = decode_list(cursor, names, game, class_name, registry)?;
                (
                    offset,
                    PropertyValue::Struct {
                        struct_type,
                        properties,
                    },
                )
            }
            "ArrayProperty" => {
                let offset = cursor.pos();
                let value = decode_array(
                    cursor,
                    names,
                    game,
                    class_name,
                    &name.name,
                    size,
                    registry,
                )?;
                (offset, PropertyValue::Array(value))
            }
            other => return Err(Error::UnsupportedPropertyType(other.to_string())),
        };

        props.push(Property {
            name,
            static_array_index,
            value_offset,
            value,
        });
    }
}

fn decode_byte(
    cursor: &mut Cursor,
    names: &NameTable,
    game: Game,
) -> Result<(usize, PropertyValue)> {
    if game == Game::Me1 {
        let offset = cursor.pos();
        return Ok((offset, PropertyValue::Byte(ByteValue::Plain(cursor.read_u8()?))));
    }
    let enum_type = read_name(cursor, names)?;
    let offset = cursor.pos();
    let value = if enum_type.name == NONE_NAME {
        ByteValue::Plain(cursor.read_u8()?)
    } else {
        ByteValue::Enum {
            enum_type,
            value: read_name(cursor, names)?,
        }
    };
    Ok((offset, PropertyValue::Byte(value)))
}

fn read_string(cursor: &mut Cursor) -> Result<UString> {
    let count = cursor.read_i32()?;
    if count == 0 {
        return Ok(UString::new("", false));
    }
    if count < 0 {
        // UTF-16LE, NUL-terminated; count is in code units.
        let units = count.unsigned_abs() as usize;
        let byte_len = units
            .checked_mul(2)
            .ok_or_else(|| Error::format("string property length overflow"))?;
        let bytes = cursor.read_bytes(byte_len)?;
        let mut wide = Vec::with_capacity(units.saturating_sub(1));
        for chunk in bytes.chunks_exact(2).take(units - 1) {
            wide.push(u16::from_le_bytes([chunk[0], chunk[1]]));
        }
        let value = String::from_utf16(&wide)
            .map_err(|_| Error::format("invalid UTF-16 in string property"))?;
        Ok(UString::new(value, true))
    } else {
        let bytes = cursor.read_bytes(count as usize)?;
        let value = String::from_utf8(bytes[..bytes.len() - 1].to_vec())?;
        Ok(UString::new(value, false))
    }
}

fn decode_array(
    cursor: &mut Cursor,
    names: &NameTable,
    game: Game,
    class_name: &str,
    prop_name: &str,
    size: usize,
    registry: &TypeRegistry,
) -> Result<ArrayValue> {
    let Some(kind) = registry.array_kind(class_name, prop_name) else {
        // Unknown interior: preserve the whole payload (count included)
        // so the record round-trips verbatim.
        return Ok(ArrayValue::Raw(cursor.read_bytes(size)?.to_vec()));
    };

    let count = cursor.read_i32()? as usize;
    // A hostile count must fail on a bounds-checked read, never on
    // allocation; cap the reserve by what the data could hold.
    let cap = count.min(cursor.remaining() / 4);
    Ok(match kind {
        ArrayKind::Int => {
            let mut v = Vec::with_capacity(cap);
            for _ in 0..count {
                v.push(cursor.read_i32()?);
            }
            ArrayValue::Ints(v)
        }
        ArrayKind::Float => {
            let mut v = Vec::with_capacity(cap);
            for _ in 0..count {
                v.push(cursor.read_f32()?);
            }
            ArrayValue::Floats(v)
        }
        ArrayKind::Object => {
            let mut v = Vec::with_capacity(cap);
            for _ in 0..count {
                v.push(Reference::from_wire(cursor.read_i32()?));
            }
            ArrayValue::Objects(v)
        }
        ArrayKind::Name => {
            let mut v = Vec::with_capacity(cap);
            for _ in 0..count {
                v.push(read_name(cursor, names)?);
            }
            ArrayValue::Names(v)
        }
        ArrayKind::Bool => {
            let mut v = Vec::with_capacity(cap);
            for _ in 0..count {
                v.push(cursor.read_u8()? != 0);
            }
            ArrayValue::Bools(v)
        }
        ArrayKind::Byte => ArrayValue::Bytes(cursor.read_bytes(count)?.to_vec()),
        ArrayKind::Str => {
            let mut v = Vec::with_capacity(cap);
            for _ in 0..count {
                v.push(read_string(cursor)?);
            }
            ArrayValue::Strings(v)
        }
        ArrayKind::Struct(struct_type) => {
            let mut elements = Vec::with_capacity(cap);
            for _ in 0..count {
                elements.push(decode_list(cursor, names, game, class_name, registry)?);
            }
            ArrayValue::Structs {
                struct_type: PropName::new(struct_type.clone()),
                elements,
            }
        }
    })
}

// ----------------------------------------------------------------------
// Encode
// ----------------------------------------------------------------------

/// Encode a property list (sentinel included) against a graph's name
/// table. Referenced names that are missing from the table are added.
pub fn encode(props: &PropertyCollection, names: &mut NameTable, game: Game) -> Result<Vec<u8>> {
    let mut w = Writer::new();
    encode_list(props, &mut w, names, game)?;
    Ok(w.into_bytes())
}

fn write_name(w: &mut Writer, names: &mut NameTable, name: &PropName) {
    let index = names.find_or_add(&name.name);
    w.write_u32(index);
    w.write_u32(name.number);
}

fn encode_list(
    props: &PropertyCollection,
    w: &mut Writer,
    names: &mut NameTable,
    game: Game,
) -> Result<()> {
    for prop in props {
        encode_prop(prop, w, names, game)?;
    }
    write_name(w, names, &PropName::new(NONE_NAME));
    Ok(())
}

fn encode_prop(prop: &Property, w: &mut Writer, names: &mut NameTable, game: Game) -> Result<()> {
    write_name(w, names, &prop.name);
    write_name(w, names, &PropName::new(prop.value.type_name()));

    // The size field is patched once the payload length is known.
    let size_pos = w.pos();
    w.write_u32(0);
    w.write_u32(prop.static_array_index);

    // ByteProperty enum type and StructProperty struct type sit between
    // the header and the counted payload.
    match &prop.value {
        PropertyValue::Byte(value) if game != Game::Me1 => {
            let enum_type = match value {
                ByteValue::Plain(_) => PropName::new(NONE_NAME),
                ByteValue::Enum { enum_type, .. } => enum_type.clone(),
            };
            write_name(w, names, &enum_type);
        }
        PropertyValue::Struct { struct_type, .. } => {
            write_name(w, names, struct_type);
        }
        _ => {}
    }

    let payload_start = w.pos();
    match &prop.value {
        PropertyValue::Int(v) => w.write_i32(*v),
        PropertyValue::Float(v) => w.write_f32(*v),
        PropertyValue::Object(r) => w.write_i32(r.to_wire()),
        PropertyValue::Name(n) => write_name(w, names, n),
        PropertyValue::Bool(v) => {
            // Not counted in the size field.
            match game {
                Game::Me3 => w.write_u8(*v as u8),
                _ => w.write_u32(*v as u32),
            }
            w.patch_u32(size_pos, 0);
            return Ok(());
        }
        PropertyValue::Byte(value) => match value {
            ByteValue::Plain(b) => w.write_u8(*b),
            ByteValue::Enum { value, .. } => write_name(w, names, value),
        },
        PropertyValue::Str(s) => write_string(w, s),
        PropertyValue::Delegate { object, function } => {
            w.write_i32(object.to_wire());
            write_name(w, names, function);
        }
        PropertyValue::Struct { properties, .. } => {
            encode_list(properties, w, names, game)?;
        }
        PropertyValue::Array(value) => encode_array(value, w, names, game)?,
    }

    w.patch_u32(size_pos, (w.pos() - payload_start) as u32);
    Ok(())
}

fn write_string(w: &mut Writer, s: &UString) {
    if s.value.is_empty() {
        w.write_i32(0);
    } else if s.unicode {
        let units: Vec<u16> = s.value.encode_utf16().collect();
        w.write_i32(-((units.len() + 1) as i32));
        for unit in units {
            w.write_u16(unit);
        }
        w.write_u16(0);
    } else {
        w.write_i32(s.value.len() as i32 + 1);
        w.write_bytes(s.value.as_bytes());
        w.write_u8(0);
    }
}

fn encode_array(
    value: &ArrayValue,
    w: &mut Writer,
    names: &mut NameTable,
    game: Game,
) -> Result<()> {
    match value {
        ArrayValue::Raw(bytes) => {
            w.write_bytes(bytes);
            return Ok(());
        }
        _ => w.write_i32(value.len() as i32),
    }
    match value {
        ArrayValue::Ints(v) => {
            for x in v {
                w.write_i32(*x);
            }
        }
        ArrayValue::Floats(v) => {
            for x in v {
                w.write_f32(*x);
            }
        }
        ArrayValue::Objects(v) => {
            for r in v {
                w.write_i32(r.to_wire());
            }
        }
        ArrayValue::Names(v) => {
            for n in v {
                write_name(w, names, n);
            }
        }
        ArrayValue::Bools(v) => {
            for b in v {
                w.write_u8(*b as u8);
            }
        }
        ArrayValue::Bytes(v) => w.write_bytes(v),
        ArrayValue::Strings(v) => {
            for s in v {
                write_string(w, s);
            }
        }
        ArrayValue::Structs { elements, .. } => {
            for element in elements {
                encode_list(element, w, names, game)?;
            }
        }
        ArrayValue::Raw(_) => unreachable!(),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn me3_table() -> NameTable {
        let mut names = NameTable::new();
        names.find_or_add(NONE_NAME);
        names
    }

    fn roundtrip(props: &PropertyCollection, class_name: &str) -> PropertyCollection {
        let mut names = me3_table();
        let bytes = encode(props, &mut names, Game::Me3).unwrap();
        let decoded = decode(
            &bytes,
            0,
            &names,
            Game::Me3,
            class_name,
            TypeRegistry::standard(),
        )
        .unwrap();
        // Re-encode must reproduce the same bytes.
        let mut names2 = names.clone();
        let bytes2 = encode(&decoded, &mut names2, Game::Me3).unwrap();
        assert_eq!(bytes, bytes2);
        decoded
    }

    #[test]
    fn test_scalar_roundtrip() {
        let mut props = PropertyCollection::new();
        props.push(Property::int("Health", 100));
        props.push(Property::float("DrawScale", 1.5));
        props.push(Property::bool("bStatic", true));
        props.push(Property::string("Tag", "PlayerStart", true));
        props.push(Property::name_prop("Group", "Deathmatch"));
        props.push(Property::object("Base", Reference::from_wire(-2)));

        let decoded = roundtrip(&props, "Actor");
        assert_eq!(decoded.get_int("Health"), Some(100));
        assert_eq!(decoded.get_float("DrawScale"), Some(1.5));
        assert_eq!(decoded.get_bool("bStatic"), Some(true));
        assert_eq!(decoded.get_str("Tag"), Some("PlayerStart"));
        assert_eq!(decoded.get_name("Group").unwrap().name, "Deathmatch");
        assert_eq!(decoded.get_object("Base"), Some(Reference::Import(1)));
    }

    #[test]
    fn test_nested_struct_roundtrip() {
        let mut inner = PropertyCollection::new();
        inner.push(Property::float("X", 1.0));
        inner.push(Property::float("Y", 2.0));
        inner.push(Property::float("Z", 3.0));
        let mut props = PropertyCollection::new();
        props.push(Property::new(
            "Location",
            PropertyValue::Struct {
                struct_type: PropName::new("Vector"),
                properties: inner,
            },
        ));

        let decoded = roundtrip(&props, "Actor");
        let location = decoded.get_struct("Location").unwrap();
        assert_eq!(location.get_float("Z"), Some(3.0));
    }

    #[test]
    fn test_object_array_roundtrip() {
        let mut props = PropertyCollection::new();
        props.push(Property::new(
            "PathList",
            PropertyValue::Array(ArrayValue::Objects(vec![
                Reference::from_wire(3),
                Reference::from_wire(-1),
            ])),
        ));

        let decoded = roundtrip(&props, "PathNode");
        match decoded.get_array("PathList").unwrap() {
            ArrayValue::Objects(v) => {
                assert_eq!(v.len(), 2);
                assert_eq!(v[1], Reference::Import(0));
            }
            other => panic!("wrong array kind: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_array_is_preserved_raw() {
        let mut props = PropertyCollection::new();
        props.push(Property::new(
            "Mystery",
            PropertyValue::Array(ArrayValue::Raw(vec![2, 0, 0, 0, 7, 7])),
        ));
        // "Actor"."Mystery" is not registered, so it decodes as Raw.
        let decoded = roundtrip(&props, "Actor");
        match decoded.get_array("Mystery").unwrap() {
            ArrayValue::Raw(bytes) => assert_eq!(bytes, &[2, 0, 0, 0, 7, 7]),
            other => panic!("wrong array kind: {:?}", other),
        }
    }

    #[test]
    fn test_byte_enum_roundtrip() {
        let mut props = PropertyCollection::new();
        props.push(Property::new(
            "PhysicsType",
            PropertyValue::Byte(ByteValue::Enum {
                enum_type: PropName::new("EPhysics"),
                value: PropName::new("PHYS_Walking"),
            }),
        ));
        props.push(Property::new(
            "RawByte",
            PropertyValue::Byte(ByteValue::Plain(0x7f)),
        ));
        let decoded = roundtrip(&props, "Actor");
        match &decoded.get("PhysicsType").unwrap().value {
            PropertyValue::Byte(ByteValue::Enum { value, .. }) => {
                assert_eq!(value.name, "PHYS_Walking");
            }
            other => panic!("wrong value: {:?}", other),
        }
    }

    #[test]
    fn test_missing_sentinel_is_format_error() {
        let mut names = me3_table();
        let mut props = PropertyCollection::new();
        props.push(Property::int("Health", 1));
        let mut bytes = encode(&props, &mut names, Game::Me3).unwrap();
        bytes.truncate(bytes.len() - 8); // chop the sentinel
        let err = decode(
            &bytes,
            0,
            &names,
            Game::Me3,
            "Actor",
            TypeRegistry::standard(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }

    #[test]
    fn test_unknown_type_name_is_rejected() {
        let mut names = me3_table();
        let mut w = Writer::new();
        let prop = names.find_or_add("Weird");
        let ty = names.find_or_add("QuaternionProperty");
        w.write_u32(prop);
        w.write_u32(0);
        w.write_u32(ty);
        w.write_u32(0);
        w.write_u32(4);
        w.write_u32(0);
        w.write_i32(0);
        let err = decode(
            &w.into_bytes(),
            0,
            &names,
            Game::Me3,
            "Actor",
            TypeRegistry::standard(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::UnsupportedPropertyType(_)));
    }

    #[test]
    fn test_pathological_string_count_is_error() {
        let mut names = me3_table();
        let mut w = Writer::new();
        let prop = names.find_or_add("Caption");
        let ty = names.find_or_add("StrProperty");
        w.write_u32(prop);
        w.write_u32(0);
        w.write_u32(ty);
        w.write_u32(0);
        w.write_u32(4);
        w.write_u32(0);
        w.write_i32(i32::MIN); // unnegatable char count
        let err = decode(
            &w.into_bytes(),
            0,
            &names,
            Game::Me3,
            "Actor",
            TypeRegistry::standard(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }

    #[test]
    fn test_oversized_array_count_is_error() {
        let mut names = me3_table();
        let mut w = Writer::new();
        let prop = names.find_or_add("PathList");
        let ty = names.find_or_add("ArrayProperty");
        w.write_u32(prop);
        w.write_u32(0);
        w.write_u32(ty);
        w.write_u32(0);
        w.write_u32(4);
        w.write_u32(0);
        w.write_i32(i32::MAX); // element count with no elements behind it
        let err = decode(
            &w.into_bytes(),
            0,
            &names,
            Game::Me3,
            "PathNode",
            TypeRegistry::standard(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }

    #[test]
    fn test_me1_bool_width() {
        let mut names = me3_table();
        let mut props = PropertyCollection::new();
        props.push(Property::bool("bOn", true));
        let me3 = encode(&props, &mut names.clone(), Game::Me3).unwrap();
        let me1 = encode(&props, &mut names, Game::Me1).unwrap();
        assert_eq!(me1.len(), me3.len() + 3);
    }
}
