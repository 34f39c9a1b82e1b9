//! Class-specific binary payloads.
//!
//! After the tagged property list, an export carries class-specific
//! binary data. Codecs for it are looked up by class name in a
//! [`CodecRegistry`]; classes without a registered codec fall back to
//! [`OpaquePayload`], which preserves the bytes verbatim and declares
//! no references.

pub mod model;
pub mod redirector;

pub use model::Model;
pub use redirector::ObjectRedirector;

use std::any::Any;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::pkg::{Game, Reference};
use crate::util::Result;

/// A decoded binary payload.
///
/// The capability set is deliberately small: re-encode, declare every
/// object reference with a field-path label, and relink those
/// references in place. Import-awareness stays with the caller.
pub trait BinaryPayload: std::fmt::Debug {
    fn class_name(&self) -> &str;

    /// Serialize back to bytes for the given format revision.
    fn encode(&self, game: Game) -> Result<Vec<u8>>;

    /// Every object reference in the payload, labeled by field path.
    fn references(&self) -> Vec<(Reference, String)>;

    /// Rewrite every object reference through `map`.
    fn relink(&mut self, map: &mut dyn FnMut(Reference) -> Reference);

    fn as_any(&self) -> &dyn Any;
}

type DecodeFn = fn(&[u8], Game) -> Result<Box<dyn BinaryPayload>>;

/// Registry mapping class name to binary codec.
#[derive(Default)]
pub struct CodecRegistry {
    codecs: HashMap<String, DecodeFn>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in registry with all supported classes.
    pub fn standard() -> &'static CodecRegistry {
        static STANDARD: OnceLock<CodecRegistry> = OnceLock::new();
        STANDARD.get_or_init(|| {
            let mut reg = CodecRegistry::new();
            reg.register("Model", model::decode);
            reg.register("ObjectRedirector", redirector::decode);
            reg
        })
    }

    /// Register a codec for a class name. New classes plug in here;
    /// nothing else needs to change.
    pub fn register(&mut self, class_name: &str, decode: DecodeFn) {
        self.codecs.insert(class_name.to_string(), decode);
    }

    /// Decode the binary tail of an export of the given class.
    pub fn decode(
        &self,
        class_name: &str,
        data: &[u8],
        game: Game,
    ) -> Result<Box<dyn BinaryPayload>> {
        match self.codecs.get(class_name) {
            Some(decode) => decode(data, game),
            None => Ok(Box::new(OpaquePayload {
                class_name: class_name.to_string(),
                bytes: data.to_vec(),
            })),
        }
    }
}

/// Fallback payload: byte range stored verbatim, uninspectable.
#[derive(Debug, Clone)]
pub struct OpaquePayload {
    class_name: String,
    bytes: Vec<u8>,
}

impl OpaquePayload {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl BinaryPayload for OpaquePayload {
    fn class_name(&self) -> &str {
        &self.class_name
    }

    fn encode(&self, _game: Game) -> Result<Vec<u8>> {
        Ok(self.bytes.clone())
    }

    fn references(&self) -> Vec<(Reference, String)> {
        Vec::new()
    }

    fn relink(&mut self, _map: &mut dyn FnMut(Reference) -> Reference) {}

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opaque_fallback_preserves_bytes() {
        let reg = CodecRegistry::standard();
        let payload = reg.decode("SomeShader", &[1, 2, 3], Game::Me3).unwrap();
        assert_eq!(payload.class_name(), "SomeShader");
        assert!(payload.references().is_empty());
        assert_eq!(payload.encode(Game::Me3).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_registered_codec_is_used() {
        let reg = CodecRegistry::standard();
        let bytes = 5i32.to_le_bytes();
        let payload = reg.decode("ObjectRedirector", &bytes, Game::Me3).unwrap();
        assert_eq!(payload.references().len(), 1);
    }
}
