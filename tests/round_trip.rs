//! Integration tests for package serialization round-trips.

use upkg::pkg::{reader, writer};
use upkg::prelude::*;
use upkg::props::{ByteValue, PropName, UString};

use tempfile::NamedTempFile;

/// Package with an import chain, a stacked export, and a property list
/// exercising every conditional layout.
fn build_package(game: Game) -> PackageGraph {
    let mut graph = PackageGraph::new(game);
    let actor_class = graph
        .entry_or_add_import("Engine.Actor", "Class", "Core")
        .unwrap()
        .unwrap();

    let name = graph.name_ref("MyActor");
    let mut export = ExportEntry::new(name);
    export.class = actor_class;
    export.guid = *b"0123456789abcdef";
    let actor = graph.add_export(export);

    let mut props = graph.properties(actor).unwrap();
    props.push(Property::int("Health", 100));
    props.push(Property::float("DrawScale", 1.5));
    props.push(Property::bool("bHidden", true));
    props.push(Property::object("Base", actor_class));
    props.push(Property::string("Tag", "Pistol", false));
    props.push(Property::string("DisplayName", "Pistolet", true));
    props.push(Property::name_prop("Group", "Deathmatch"));
    props.push(Property::new(
        "Offset",
        PropertyValue::Struct {
            struct_type: PropName::new("Vector"),
            properties: {
                let mut inner = PropertyCollection::new();
                inner.push(Property::float("X", 1.0));
                inner.push(Property::float("Y", 2.0));
                inner.push(Property::float("Z", 3.0));
                inner
            },
        },
    ));
    props.push(Property::new(
        "Ammo",
        PropertyValue::Byte(ByteValue::Enum {
            enum_type: PropName::new("EAmmoType"),
            value: PropName::new("AMMO_Pistol"),
        }),
    ));
    graph.write_properties(actor, &props).unwrap();
    graph
}

#[test]
fn test_roundtrip_through_file() {
    let temp = NamedTempFile::new().expect("Failed to create temp file");
    let graph = build_package(Game::Me3);

    let bytes = writer::serialize(&graph).expect("Failed to serialize");
    std::fs::write(temp.path(), &bytes).expect("Failed to write temp file");

    let read_back = std::fs::read(temp.path()).expect("Failed to read temp file");
    let parsed = reader::parse(&read_back).expect("Failed to parse");

    assert_eq!(parsed.game(), Game::Me3);
    assert_eq!(parsed.import_count(), graph.import_count());
    assert_eq!(parsed.export_count(), graph.export_count());
    assert_eq!(writer::serialize(&parsed).unwrap(), bytes);
}

#[test]
fn test_roundtrip_is_byte_identical_per_game() {
    for game in [Game::Me1, Game::Me2, Game::Me3] {
        let graph = build_package(game);
        let bytes = writer::serialize(&graph).unwrap();
        let parsed = reader::parse(&bytes).unwrap();
        let bytes2 = writer::serialize(&parsed).unwrap();
        assert_eq!(bytes, bytes2, "round-trip differs for {}", game);
    }
}

#[test]
fn test_properties_survive_roundtrip() {
    let graph = build_package(Game::Me3);
    let bytes = writer::serialize(&graph).unwrap();
    let parsed = reader::parse(&bytes).unwrap();

    let actor = parsed.find_entry_by_path("MyActor").unwrap();
    let props = parsed.properties(actor).unwrap();
    assert_eq!(props.get_int("Health"), Some(100));
    assert_eq!(props.get_float("DrawScale"), Some(1.5));
    assert_eq!(props.get_bool("bHidden"), Some(true));
    assert_eq!(props.get_str("Tag"), Some("Pistol"));
    assert_eq!(props.get_str("DisplayName"), Some("Pistolet"));
    assert_eq!(props.get_name("Group"), Some(&PropName::new("Deathmatch")));

    let offset = props.get_struct("Offset").unwrap();
    assert_eq!(offset.get_float("Z"), Some(3.0));

    // Unicode flag survives; the string re-encodes as UTF-16.
    match &props.get("DisplayName").unwrap().value {
        PropertyValue::Str(UString { unicode, .. }) => assert!(*unicode),
        other => panic!("unexpected value: {:?}", other),
    }
}

#[test]
fn test_property_edit_then_reserialize() {
    let graph = build_package(Game::Me3);
    let bytes = writer::serialize(&graph).unwrap();
    let mut parsed = reader::parse(&bytes).unwrap();

    let actor = parsed.find_entry_by_path("MyActor").unwrap();
    parsed
        .write_property(actor, Property::int("Health", 50))
        .unwrap();
    assert!(parsed.remove_property(actor, "bHidden").unwrap());

    let bytes2 = writer::serialize(&parsed).unwrap();
    let parsed2 = reader::parse(&bytes2).unwrap();
    let actor2 = parsed2.find_entry_by_path("MyActor").unwrap();
    let props = parsed2.properties(actor2).unwrap();
    assert_eq!(props.get_int("Health"), Some(50));
    assert!(props.get_bool("bHidden").is_none());
    // Untouched properties keep their values.
    assert_eq!(props.get_str("Tag"), Some("Pistol"));
}

#[test]
fn test_truncated_file_rejected() {
    let graph = build_package(Game::Me3);
    let bytes = writer::serialize(&graph).unwrap();
    let err = reader::parse(&bytes[..bytes.len() / 2]).unwrap_err();
    assert!(matches!(err, Error::Format(_) | Error::IndexOutOfRange { .. }));
}
