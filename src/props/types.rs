//! Property type metadata.
//!
//! The wire format does not self-describe array interiors, and some
//! properties only exist in particular format revisions. Both facts
//! live in a [`TypeRegistry`] consulted by the codec and the
//! cross-package importer.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::pkg::Game;

/// Element kind of an array property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArrayKind {
    Int,
    Float,
    Object,
    Name,
    Bool,
    Byte,
    Str,
    /// Array of structs of the given struct type; each element is a
    /// tagged property list.
    Struct(String),
}

/// Set of games a property exists in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameMask(u8);

impl GameMask {
    pub const ALL: GameMask = GameMask(0b111);

    fn bit(game: Game) -> u8 {
        match game {
            Game::Me1 => 0b001,
            Game::Me2 => 0b010,
            Game::Me3 => 0b100,
        }
    }

    pub fn only(games: &[Game]) -> Self {
        GameMask(games.iter().fold(0, |acc, &g| acc | Self::bit(g)))
    }

    pub fn contains(self, game: Game) -> bool {
        self.0 & Self::bit(game) != 0
    }
}

/// Registry of (class name, property name) metadata.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    arrays: HashMap<(String, String), ArrayKind>,
    availability: HashMap<(String, String), GameMask>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in registry covering common engine classes.
    pub fn standard() -> &'static TypeRegistry {
        static STANDARD: OnceLock<TypeRegistry> = OnceLock::new();
        STANDARD.get_or_init(|| {
            let mut reg = TypeRegistry::new();
            reg.register_array("Level", "Actors", ArrayKind::Object);
            reg.register_array("PathNode", "PathList", ArrayKind::Object);
            reg.register_array("CoverLink", "Slots", ArrayKind::Struct("CoverSlot".into()));
            reg.register_array("Actor", "Volumes", ArrayKind::Struct("ActorReference".into()));
            reg.register_array("Brush", "Materials", ArrayKind::Object);
            reg
        })
    }

    /// Declare the element kind for an array property.
    pub fn register_array(&mut self, class: &str, prop: &str, kind: ArrayKind) {
        self.arrays
            .insert((class.to_string(), prop.to_string()), kind);
    }

    /// Restrict a property to a subset of format revisions.
    pub fn register_availability(&mut self, class: &str, prop: &str, mask: GameMask) {
        self.availability
            .insert((class.to_string(), prop.to_string()), mask);
    }

    pub fn array_kind(&self, class: &str, prop: &str) -> Option<&ArrayKind> {
        self.arrays.get(&(class.to_string(), prop.to_string()))
    }

    /// Whether a property exists in the given game's layout. Unknown
    /// properties are assumed universal.
    pub fn supported(&self, game: Game, class: &str, prop: &str) -> bool {
        self.availability
            .get(&(class.to_string(), prop.to_string()))
            .map(|mask| mask.contains(game))
            .unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_mask() {
        let mask = GameMask::only(&[Game::Me3]);
        assert!(mask.contains(Game::Me3));
        assert!(!mask.contains(Game::Me1));
        assert!(GameMask::ALL.contains(Game::Me2));
    }

    #[test]
    fn test_registry_lookup() {
        let reg = TypeRegistry::standard();
        assert_eq!(reg.array_kind("Level", "Actors"), Some(&ArrayKind::Object));
        assert_eq!(reg.array_kind("Level", "Unknown"), None);
        assert!(reg.supported(Game::Me1, "Level", "Actors"));
    }

    #[test]
    fn test_availability() {
        let mut reg = TypeRegistry::new();
        reg.register_availability("Actor", "NewField", GameMask::only(&[Game::Me3]));
        assert!(reg.supported(Game::Me3, "Actor", "NewField"));
        assert!(!reg.supported(Game::Me2, "Actor", "NewField"));
    }
}
