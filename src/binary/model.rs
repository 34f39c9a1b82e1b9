//! Model (BSP) binary payload.
//!
//! Exercises the two interesting payload shapes: bulk arrays with a
//! leading (stride, count) pair, and fields whose presence or stride
//! depends on the format revision (Vert loses its backface coordinate
//! on ME3, the lighting guid exists only there).

use std::any::Any;

use glam::{Vec2, Vec3};

use crate::pkg::{Game, Reference};
use crate::util::{Error, Result};
use crate::wire::{Cursor, Writer};

use super::BinaryPayload;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoxSphereBounds {
    pub origin: Vec3,
    pub box_extent: Vec3,
    pub sphere_radius: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BspSurf {
    pub material: Reference,
    pub poly_flags: i32,
    pub base: i32,
    pub normal: i32,
    pub texture_u: i32,
    pub texture_v: i32,
    pub brush_poly: i32,
    pub actor: Reference,
    pub plane: [f32; 4],
    pub shadow_map_scale: f32,
    pub lighting_channels: i32,
    /// ME3 only; defaults to 1 when loading older revisions.
    pub lightmass_index: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vert {
    pub vertex: i32,
    pub side: i32,
    pub shadow_tex_coord: Vec2,
    /// Absent on ME3.
    pub backface_shadow_tex_coord: Vec2,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ZoneProperties {
    pub zone_actor: Reference,
    pub last_render_time: f32,
    pub connectivity_mask: u64,
    pub visibility_mask: u64,
}

#[derive(Debug, Clone, Default)]
pub struct Model {
    pub bounds: BoxSphereBounds,
    pub vectors: Vec<Vec3>,
    pub points: Vec<Vec3>,
    pub self_ref: Reference,
    pub surfs: Vec<BspSurf>,
    pub verts: Vec<Vert>,
    pub num_shared_sides: i32,
    pub zones: Vec<ZoneProperties>,
    pub polys: Reference,
    pub root_outside: bool,
    pub linked: bool,
    /// ME3 only.
    pub lighting_guid: [u8; 16],
}

fn vert_stride(game: Game) -> usize {
    match game {
        Game::Me3 => 16,
        _ => 24,
    }
}

fn read_vec3(c: &mut Cursor) -> Result<Vec3> {
    Ok(Vec3::new(c.read_f32()?, c.read_f32()?, c.read_f32()?))
}

fn write_vec3(w: &mut Writer, v: Vec3) {
    w.write_f32(v.x);
    w.write_f32(v.y);
    w.write_f32(v.z);
}

fn read_vec2(c: &mut Cursor) -> Result<Vec2> {
    Ok(Vec2::new(c.read_f32()?, c.read_f32()?))
}

fn write_vec2(w: &mut Writer, v: Vec2) {
    w.write_f32(v.x);
    w.write_f32(v.y);
}

/// Read a bulk array header and check the stride matches.
fn read_bulk_header(c: &mut Cursor, expected_stride: usize) -> Result<usize> {
    let stride = c.read_u32()? as usize;
    let count = c.read_u32()? as usize;
    if stride != expected_stride {
        return Err(Error::format(format!(
            "bulk array stride {} (expected {})",
            stride, expected_stride
        )));
    }
    Ok(count)
}

fn write_bulk_header(w: &mut Writer, stride: usize, count: usize) {
    w.write_u32(stride as u32);
    w.write_u32(count as u32);
}

pub(super) fn decode(data: &[u8], game: Game) -> Result<Box<dyn BinaryPayload>> {
    let mut c = Cursor::new(data);

    let bounds = BoxSphereBounds {
        origin: read_vec3(&mut c)?,
        box_extent: read_vec3(&mut c)?,
        sphere_radius: c.read_f32()?,
    };

    let mut vectors = Vec::new();
    for _ in 0..read_bulk_header(&mut c, 12)? {
        vectors.push(read_vec3(&mut c)?);
    }
    let mut points = Vec::new();
    for _ in 0..read_bulk_header(&mut c, 12)? {
        points.push(read_vec3(&mut c)?);
    }

    let self_ref = Reference::from_wire(c.read_i32()?);

    // Counts are untrusted: never pre-allocate from them.
    let surf_count = c.read_u32()? as usize;
    let mut surfs = Vec::new();
    for _ in 0..surf_count {
        let mut surf = BspSurf {
            material: Reference::from_wire(c.read_i32()?),
            poly_flags: c.read_i32()?,
            base: c.read_i32()?,
            normal: c.read_i32()?,
            texture_u: c.read_i32()?,
            texture_v: c.read_i32()?,
            brush_poly: c.read_i32()?,
            actor: Reference::from_wire(c.read_i32()?),
            plane: [
                c.read_f32()?,
                c.read_f32()?,
                c.read_f32()?,
                c.read_f32()?,
            ],
            shadow_map_scale: c.read_f32()?,
            lighting_channels: c.read_i32()?,
            lightmass_index: 1,
        };
        if game == Game::Me3 {
            surf.lightmass_index = c.read_i32()?;
        }
        surfs.push(surf);
    }

    let mut verts = Vec::new();
    for _ in 0..read_bulk_header(&mut c, vert_stride(game))? {
        let mut vert = Vert {
            vertex: c.read_i32()?,
            side: c.read_i32()?,
            shadow_tex_coord: read_vec2(&mut c)?,
            ..Vert::default()
        };
        if game != Game::Me3 {
            vert.backface_shadow_tex_coord = read_vec2(&mut c)?;
        }
        verts.push(vert);
    }

    let num_shared_sides = c.read_i32()?;

    let zone_count = c.read_u32()? as usize;
    let mut zones = Vec::new();
    for _ in 0..zone_count {
        zones.push(ZoneProperties {
            zone_actor: Reference::from_wire(c.read_i32()?),
            last_render_time: c.read_f32()?,
            connectivity_mask: c.read_u64()?,
            visibility_mask: c.read_u64()?,
        });
    }

    let polys = Reference::from_wire(c.read_i32()?);
    let root_outside = c.read_u32()? != 0;
    let linked = c.read_u32()? != 0;

    let mut lighting_guid = [0u8; 16];
    if game == Game::Me3 {
        lighting_guid.copy_from_slice(c.read_bytes(16)?);
    }

    Ok(Box::new(Model {
        bounds,
        vectors,
        points,
        self_ref,
        surfs,
        verts,
        num_shared_sides,
        zones,
        polys,
        root_outside,
        linked,
        lighting_guid,
    }))
}

impl BinaryPayload for Model {
    fn class_name(&self) -> &str {
        "Model"
    }

    fn encode(&self, game: Game) -> Result<Vec<u8>> {
        let mut w = Writer::new();

        write_vec3(&mut w, self.bounds.origin);
        write_vec3(&mut w, self.bounds.box_extent);
        w.write_f32(self.bounds.sphere_radius);

        write_bulk_header(&mut w, 12, self.vectors.len());
        for v in &self.vectors {
            write_vec3(&mut w, *v);
        }
        write_bulk_header(&mut w, 12, self.points.len());
        for p in &self.points {
            write_vec3(&mut w, *p);
        }

        w.write_i32(self.self_ref.to_wire());

        w.write_u32(self.surfs.len() as u32);
        for surf in &self.surfs {
            w.write_i32(surf.material.to_wire());
            w.write_i32(surf.poly_flags);
            w.write_i32(surf.base);
            w.write_i32(surf.normal);
            w.write_i32(surf.texture_u);
            w.write_i32(surf.texture_v);
            w.write_i32(surf.brush_poly);
            w.write_i32(surf.actor.to_wire());
            for value in surf.plane {
                w.write_f32(value);
            }
            w.write_f32(surf.shadow_map_scale);
            w.write_i32(surf.lighting_channels);
            if game == Game::Me3 {
                w.write_i32(surf.lightmass_index);
            }
        }

        write_bulk_header(&mut w, vert_stride(game), self.verts.len());
        for vert in &self.verts {
            w.write_i32(vert.vertex);
            w.write_i32(vert.side);
            write_vec2(&mut w, vert.shadow_tex_coord);
            if game != Game::Me3 {
                write_vec2(&mut w, vert.backface_shadow_tex_coord);
            }
        }

        w.write_i32(self.num_shared_sides);

        w.write_u32(self.zones.len() as u32);
        for zone in &self.zones {
            w.write_i32(zone.zone_actor.to_wire());
            w.write_f32(zone.last_render_time);
            w.write_u64(zone.connectivity_mask);
            w.write_u64(zone.visibility_mask);
        }

        w.write_i32(self.polys.to_wire());
        w.write_u32(self.root_outside as u32);
        w.write_u32(self.linked as u32);

        if game == Game::Me3 {
            w.write_bytes(&self.lighting_guid);
        }

        Ok(w.into_bytes())
    }

    fn references(&self) -> Vec<(Reference, String)> {
        let mut refs = vec![(self.self_ref, "Self".to_string())];
        for (i, surf) in self.surfs.iter().enumerate() {
            refs.push((surf.material, format!("Surfs[{}].Material", i)));
            refs.push((surf.actor, format!("Surfs[{}].Actor", i)));
        }
        for (i, zone) in self.zones.iter().enumerate() {
            refs.push((zone.zone_actor, format!("Zones[{}].ZoneActor", i)));
        }
        refs.push((self.polys, "Polys".to_string()));
        refs
    }

    fn relink(&mut self, map: &mut dyn FnMut(Reference) -> Reference) {
        self.self_ref = map(self.self_ref);
        for surf in &mut self.surfs {
            surf.material = map(surf.material);
            surf.actor = map(surf.actor);
        }
        for zone in &mut self.zones {
            zone.zone_actor = map(zone.zone_actor);
        }
        self.polys = map(self.polys);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_model() -> Model {
        Model {
            bounds: BoxSphereBounds {
                origin: Vec3::new(0.0, 0.0, 64.0),
                box_extent: Vec3::new(128.0, 128.0, 64.0),
                sphere_radius: 197.0,
            },
            vectors: vec![Vec3::X, Vec3::Y],
            points: vec![Vec3::ZERO],
            self_ref: Reference::Export(0),
            surfs: vec![BspSurf {
                material: Reference::Import(2),
                actor: Reference::Export(4),
                plane: [0.0, 0.0, 1.0, 64.0],
                ..BspSurf::default()
            }],
            verts: vec![Vert {
                vertex: 0,
                side: 1,
                shadow_tex_coord: Vec2::new(0.5, 0.5),
                backface_shadow_tex_coord: Vec2::new(0.25, 0.75),
            }],
            num_shared_sides: 4,
            zones: vec![ZoneProperties {
                zone_actor: Reference::Export(7),
                ..ZoneProperties::default()
            }],
            polys: Reference::Export(1),
            root_outside: true,
            linked: false,
            lighting_guid: [0xab; 16],
        }
    }

    #[test]
    fn test_roundtrip_me3() {
        let model = sample_model();
        let bytes = model.encode(Game::Me3).unwrap();
        let decoded = decode(&bytes, Game::Me3).unwrap();
        assert_eq!(decoded.encode(Game::Me3).unwrap(), bytes);
        let decoded = decoded.as_any().downcast_ref::<Model>().unwrap();
        assert_eq!(decoded.surfs[0].material, Reference::Import(2));
        assert_eq!(decoded.lighting_guid, [0xab; 16]);
    }

    #[test]
    fn test_roundtrip_me1_has_backface_coords() {
        let model = sample_model();
        let bytes = model.encode(Game::Me1).unwrap();
        let decoded = decode(&bytes, Game::Me1).unwrap();
        assert_eq!(decoded.encode(Game::Me1).unwrap(), bytes);
        let decoded = decoded.as_any().downcast_ref::<Model>().unwrap();
        assert_eq!(decoded.verts[0].backface_shadow_tex_coord, Vec2::new(0.25, 0.75));
        // ME1 has no lightmass index on the wire; loader default applies.
        assert_eq!(decoded.surfs[0].lightmass_index, 1);
    }

    #[test]
    fn test_huge_surf_count_is_error() {
        let mut w = Writer::new();
        write_vec3(&mut w, Vec3::ZERO);
        write_vec3(&mut w, Vec3::ZERO);
        w.write_f32(0.0);
        write_bulk_header(&mut w, 12, 0);
        write_bulk_header(&mut w, 12, 0);
        w.write_i32(0);
        w.write_u32(u32::MAX); // surf count with no data behind it
        let err = decode(&w.into_bytes(), Game::Me3).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }

    #[test]
    fn test_references_labeled() {
        let model = sample_model();
        let refs = model.references();
        assert!(refs.contains(&(Reference::Import(2), "Surfs[0].Material".to_string())));
        assert!(refs.contains(&(Reference::Export(1), "Polys".to_string())));
    }
}
