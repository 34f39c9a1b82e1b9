//! Reference discovery: "who references this entry".
//!
//! A full-graph scan over export headers, stack records, property
//! trees and binary payloads. Run on demand for analysis; nothing is
//! maintained incrementally.

use tracing::warn;

use crate::binary::CodecRegistry;
use crate::props::{ArrayValue, PropertyCollection, PropertyValue, TypeRegistry};
use crate::util::Result;

use super::entry::Reference;
use super::PackageGraph;

impl PackageGraph {
    /// All (referencing export, location label) pairs that point at
    /// `target`, using the standard registries.
    pub fn referencers(&self, target: Reference) -> Result<Vec<(Reference, String)>> {
        self.referencers_with(target, TypeRegistry::standard(), CodecRegistry::standard())
    }

    pub fn referencers_with(
        &self,
        target: Reference,
        types: &TypeRegistry,
        codecs: &CodecRegistry,
    ) -> Result<Vec<(Reference, String)>> {
        let mut found = Vec::new();

        for (reference, export) in self.exports() {
            if reference == target {
                continue;
            }

            for (label, value) in [
                ("Header: Class", export.class),
                ("Header: SuperClass", export.super_class),
                ("Header: Archetype", export.archetype),
                ("Header: Link", export.link),
            ] {
                if value == target {
                    found.push((reference, label.to_string()));
                }
            }

            // The first two fields of a stack record are object refs.
            if export.has_stack() && export.data.len() >= 8 {
                let wire = target.to_wire();
                let node = i32::from_le_bytes(export.data[0..4].try_into().unwrap_or_default());
                let state = i32::from_le_bytes(export.data[4..8].try_into().unwrap_or_default());
                if wire == node || wire == state {
                    found.push((reference, "Stack".to_string()));
                }
            }

            match self.properties_with(reference, types) {
                Ok(props) => {
                    scan_properties(&props, target, reference, "Property:", &mut found);
                }
                Err(err) => {
                    // Tolerated: the entry stays an opaque blob.
                    warn!(entry = %self.entry_string(reference), %err, "skipping properties in reference scan");
                    continue;
                }
            }

            match self.binary(reference, codecs) {
                Ok(payload) => {
                    for (value, label) in payload.references() {
                        if value == target {
                            found.push((reference, format!("(Binary prop: {})", label)));
                        }
                    }
                }
                Err(err) => {
                    warn!(entry = %self.entry_string(reference), %err, "skipping binary in reference scan");
                }
            }
        }

        Ok(found)
    }
}

fn scan_properties(
    props: &PropertyCollection,
    target: Reference,
    owner: Reference,
    prefix: &str,
    found: &mut Vec<(Reference, String)>,
) {
    for prop in props {
        match &prop.value {
            PropertyValue::Object(value) => {
                if *value == target {
                    found.push((owner, format!("{} {}", prefix, prop.name)));
                }
            }
            PropertyValue::Delegate { object, .. } => {
                if *object == target {
                    found.push((owner, format!("{} {}", prefix, prop.name)));
                }
            }
            PropertyValue::Struct { properties, .. } => {
                scan_properties(
                    properties,
                    target,
                    owner,
                    &format!("{} {}:", prefix, prop.name),
                    found,
                );
            }
            PropertyValue::Array(ArrayValue::Objects(values)) => {
                for (i, value) in values.iter().enumerate() {
                    if *value == target {
                        found.push((owner, format!("{} {}[{}]", prefix, prop.name, i)));
                    }
                }
            }
            PropertyValue::Array(ArrayValue::Structs { elements, .. }) => {
                for (i, element) in elements.iter().enumerate() {
                    scan_properties(
                        element,
                        target,
                        owner,
                        &format!("{} {}[{}]:", prefix, prop.name, i),
                        found,
                    );
                }
            }
            _ => {}
        }
    }
}
