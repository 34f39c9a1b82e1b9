//! Tagged property lists.
//!
//! Every export's payload starts (after an optional stack record) with
//! a self-describing list of name-tagged properties, terminated by the
//! sentinel name "None". Struct properties nest a whole list; array
//! properties repeat one element kind.
//!
//! In memory, property names are resolved strings so collections can
//! move between packages; the codec interns them back into the owning
//! graph's name table on encode.

pub mod codec;
pub mod types;

pub use types::{ArrayKind, GameMask, TypeRegistry};

use crate::pkg::Reference;

/// A resolved name plus instance number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropName {
    pub name: String,
    pub number: u32,
}

impl PropName {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            number: 0,
        }
    }
}

impl std::fmt::Display for PropName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.number > 0 {
            write!(f, "{}_{}", self.name, self.number - 1)
        } else {
            f.write_str(&self.name)
        }
    }
}

/// A string value that remembers its wire encoding, so an unmodified
/// collection re-encodes byte-identically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UString {
    pub value: String,
    pub unicode: bool,
}

impl UString {
    pub fn new(value: impl Into<String>, unicode: bool) -> Self {
        Self {
            value: value.into(),
            unicode,
        }
    }
}

/// Payload of a ByteProperty: either a raw byte or an enum value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ByteValue {
    Plain(u8),
    Enum { enum_type: PropName, value: PropName },
}

/// Elements of an array property.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayValue {
    Ints(Vec<i32>),
    Floats(Vec<f32>),
    Objects(Vec<Reference>),
    Names(Vec<PropName>),
    Bools(Vec<bool>),
    Bytes(Vec<u8>),
    Strings(Vec<UString>),
    Structs {
        struct_type: PropName,
        elements: Vec<PropertyCollection>,
    },
    /// Interior kind unknown to the registry; bytes kept verbatim.
    Raw(Vec<u8>),
}

impl ArrayValue {
    pub fn len(&self) -> usize {
        match self {
            ArrayValue::Ints(v) => v.len(),
            ArrayValue::Floats(v) => v.len(),
            ArrayValue::Objects(v) => v.len(),
            ArrayValue::Names(v) => v.len(),
            ArrayValue::Bools(v) => v.len(),
            ArrayValue::Bytes(v) => v.len(),
            ArrayValue::Strings(v) => v.len(),
            ArrayValue::Structs { elements, .. } => elements.len(),
            ArrayValue::Raw(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Kind-specific payload of a property.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Int(i32),
    Float(f32),
    Object(Reference),
    Bool(bool),
    Byte(ByteValue),
    Name(PropName),
    Str(UString),
    Delegate { object: Reference, function: PropName },
    Struct {
        struct_type: PropName,
        properties: PropertyCollection,
    },
    Array(ArrayValue),
}

impl PropertyValue {
    /// Wire type name for this value.
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::Int(_) => "IntProperty",
            PropertyValue::Float(_) => "FloatProperty",
            PropertyValue::Object(_) => "ObjectProperty",
            PropertyValue::Bool(_) => "BoolProperty",
            PropertyValue::Byte(_) => "ByteProperty",
            PropertyValue::Name(_) => "NameProperty",
            PropertyValue::Str(_) => "StrProperty",
            PropertyValue::Delegate { .. } => "DelegateProperty",
            PropertyValue::Struct { .. } => "StructProperty",
            PropertyValue::Array(_) => "ArrayProperty",
        }
    }
}

/// One named, typed value in a property list.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: PropName,
    pub static_array_index: u32,
    /// Byte offset of the value within the export payload this was
    /// decoded from, for in-place patching. Zero for built properties;
    /// refreshed on every decode.
    pub value_offset: usize,
    pub value: PropertyValue,
}

impl Property {
    pub fn new(name: impl Into<String>, value: PropertyValue) -> Self {
        Self {
            name: PropName::new(name),
            static_array_index: 0,
            value_offset: 0,
            value,
        }
    }

    pub fn int(name: impl Into<String>, value: i32) -> Self {
        Self::new(name, PropertyValue::Int(value))
    }

    pub fn float(name: impl Into<String>, value: f32) -> Self {
        Self::new(name, PropertyValue::Float(value))
    }

    pub fn bool(name: impl Into<String>, value: bool) -> Self {
        Self::new(name, PropertyValue::Bool(value))
    }

    pub fn object(name: impl Into<String>, value: Reference) -> Self {
        Self::new(name, PropertyValue::Object(value))
    }

    pub fn string(name: impl Into<String>, value: impl Into<String>, unicode: bool) -> Self {
        Self::new(name, PropertyValue::Str(UString::new(value, unicode)))
    }

    pub fn name_prop(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, PropertyValue::Name(PropName::new(value)))
    }
}

/// Ordered list of properties with name-keyed access.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PropertyCollection {
    props: Vec<Property>,
    end_offset: usize,
}

impl PropertyCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_end_offset(props: Vec<Property>, end_offset: usize) -> Self {
        Self { props, end_offset }
    }

    /// Offset just past the "None" sentinel in the payload this was
    /// decoded from; the binary tail starts here.
    pub fn end_offset(&self) -> usize {
        self.end_offset
    }

    pub fn len(&self) -> usize {
        self.props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Property> {
        self.props.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Property> {
        self.props.iter_mut()
    }

    pub fn get(&self, name: &str) -> Option<&Property> {
        self.props.iter().find(|p| p.name.name == name)
    }

    pub fn get_int(&self, name: &str) -> Option<i32> {
        match self.get(name)?.value {
            PropertyValue::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn get_float(&self, name: &str) -> Option<f32> {
        match self.get(name)?.value {
            PropertyValue::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.get(name)?.value {
            PropertyValue::Bool(v) => Some(v),
            _ => None,
        }
    }

    pub fn get_object(&self, name: &str) -> Option<Reference> {
        match self.get(name)?.value {
            PropertyValue::Object(v) => Some(v),
            _ => None,
        }
    }

    pub fn get_name(&self, name: &str) -> Option<&PropName> {
        match &self.get(name)?.value {
            PropertyValue::Name(v) => Some(v),
            _ => None,
        }
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        match &self.get(name)?.value {
            PropertyValue::Str(s) => Some(s.value.as_str()),
            _ => None,
        }
    }

    pub fn get_struct(&self, name: &str) -> Option<&PropertyCollection> {
        match &self.get(name)?.value {
            PropertyValue::Struct { properties, .. } => Some(properties),
            _ => None,
        }
    }

    pub fn get_array(&self, name: &str) -> Option<&ArrayValue> {
        match &self.get(name)?.value {
            PropertyValue::Array(v) => Some(v),
            _ => None,
        }
    }

    /// Name-keyed upsert: replace in place (keeping list position) or
    /// append.
    pub fn add_or_replace(&mut self, prop: Property) {
        match self.props.iter().position(|p| p.name.name == prop.name.name) {
            Some(i) => self.props[i] = prop,
            None => self.props.push(prop),
        }
    }

    pub fn push(&mut self, prop: Property) {
        self.props.push(prop);
    }

    pub fn remove(&mut self, name: &str) -> bool {
        match self.props.iter().position(|p| p.name.name == name) {
            Some(i) => {
                self.props.remove(i);
                true
            }
            None => false,
        }
    }

    /// Keep only properties the predicate accepts; returns the removed
    /// ones in original order.
    pub fn drain_unsupported<F>(&mut self, mut keep: F) -> Vec<Property>
    where
        F: FnMut(&Property) -> bool,
    {
        let mut dropped = Vec::new();
        let mut kept = Vec::with_capacity(self.props.len());
        for prop in self.props.drain(..) {
            if keep(&prop) {
                kept.push(prop);
            } else {
                dropped.push(prop);
            }
        }
        self.props = kept;
        dropped
    }
}

impl<'a> IntoIterator for &'a PropertyCollection {
    type Item = &'a Property;
    type IntoIter = std::slice::Iter<'a, Property>;

    fn into_iter(self) -> Self::IntoIter {
        self.props.iter()
    }
}
