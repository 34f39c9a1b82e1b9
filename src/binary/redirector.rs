//! ObjectRedirector binary payload: a single forwarding reference.

use std::any::Any;

use crate::pkg::{Game, Reference};
use crate::util::Result;
use crate::wire::{Cursor, Writer};

use super::BinaryPayload;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRedirector {
    pub destination: Reference,
}

pub(super) fn decode(data: &[u8], _game: Game) -> Result<Box<dyn BinaryPayload>> {
    let mut cursor = Cursor::new(data);
    let destination = Reference::from_wire(cursor.read_i32()?);
    Ok(Box::new(ObjectRedirector { destination }))
}

impl BinaryPayload for ObjectRedirector {
    fn class_name(&self) -> &str {
        "ObjectRedirector"
    }

    fn encode(&self, _game: Game) -> Result<Vec<u8>> {
        let mut w = Writer::new();
        w.write_i32(self.destination.to_wire());
        Ok(w.into_bytes())
    }

    fn references(&self) -> Vec<(Reference, String)> {
        vec![(self.destination, "DestinationObject".to_string())]
    }

    fn relink(&mut self, map: &mut dyn FnMut(Reference) -> Reference) {
        self.destination = map(self.destination);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_and_relink() {
        let bytes = 3i32.to_le_bytes();
        let payload = decode(&bytes, Game::Me2).unwrap();
        assert_eq!(payload.encode(Game::Me2).unwrap(), bytes);

        let mut redirector = ObjectRedirector {
            destination: Reference::Export(2),
        };
        redirector.relink(&mut |_| Reference::Import(0));
        assert_eq!(redirector.destination, Reference::Import(0));
    }
}
