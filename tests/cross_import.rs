//! Integration tests for porting entries between packages.

use upkg::pkg::{reader, writer};
use upkg::prelude::*;

/// Weapon package: Engine.Actor imported, a SFXWeapon_Pistol export
/// whose mesh property points at a sibling export.
fn weapon_package() -> (PackageGraph, Reference) {
    let mut src = PackageGraph::new(Game::Me3);
    let actor_class = src
        .entry_or_add_import("Engine.Actor", "Class", "Core")
        .unwrap()
        .unwrap();

    let mesh_name = src.name_ref("PistolMesh");
    let mut mesh = ExportEntry::new(mesh_name);
    mesh.class = actor_class;
    let mesh = src.add_export(mesh);

    let weapon_name = src.name_ref("SFXWeapon_Pistol");
    let mut weapon = ExportEntry::new(weapon_name);
    weapon.class = actor_class;
    let weapon = src.add_export(weapon);

    let mut props = src.properties(weapon).unwrap();
    props.push(Property::object("Mesh", mesh));
    props.push(Property::int("MagSize", 12));
    src.write_properties(weapon, &props).unwrap();

    (src, weapon)
}

#[test]
fn test_ported_package_survives_serialization() {
    let (src, weapon) = weapon_package();
    let mut dst = PackageGraph::new(Game::Me3);

    let ported = port_entry(&src, weapon, &mut dst).unwrap();
    assert!(ported.warnings.is_empty());

    // The whole dependency closure came along.
    assert_eq!(dst.import_count(), 2);
    assert_eq!(dst.export_count(), 2);

    let bytes = writer::serialize(&dst).unwrap();
    let parsed = reader::parse(&bytes).unwrap();

    let weapon_dst = parsed.find_entry_by_path("SFXWeapon_Pistol").unwrap();
    let mesh_dst = parsed.find_entry_by_path("PistolMesh").unwrap();
    let props = parsed.properties(weapon_dst).unwrap();
    assert_eq!(props.get_object("Mesh"), Some(mesh_dst));
    assert_eq!(props.get_int("MagSize"), Some(12));
}

#[test]
fn test_port_into_populated_package_reuses_entries() {
    let (src, weapon) = weapon_package();

    // Destination already has the Engine.Actor import chain.
    let mut dst = PackageGraph::new(Game::Me3);
    dst.entry_or_add_import("Engine.Actor", "Class", "Core")
        .unwrap()
        .unwrap();
    let imports_before = dst.import_count();

    let ported = port_entry(&src, weapon, &mut dst).unwrap();
    assert!(ported.warnings.is_empty());
    assert_eq!(dst.import_count(), imports_before);
    assert_eq!(dst.export_count(), 2);
}

#[test]
fn test_cross_game_port_reencodes_for_destination() {
    let (src, weapon) = weapon_package();
    let mut dst = PackageGraph::new(Game::Me1);

    let ported = port_entry(&src, weapon, &mut dst).unwrap();
    assert!(ported.warnings.is_empty());

    let bytes = writer::serialize(&dst).unwrap();
    let parsed = reader::parse(&bytes).unwrap();
    assert_eq!(parsed.game(), Game::Me1);

    let weapon_dst = parsed.find_entry_by_path("SFXWeapon_Pistol").unwrap();
    let props = parsed.properties(weapon_dst).unwrap();
    assert_eq!(props.get_int("MagSize"), Some(12));
}
