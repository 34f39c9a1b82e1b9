//! Interned name table.
//!
//! Every string in a package is stored once in an ordered table and
//! referenced by index everywhere else. Indices are stable for the
//! lifetime of the owning graph.

use crate::util::{Error, Result};

/// A name-table reference: table index plus an instance number.
///
/// Number 0 means the bare name; a non-zero number `n` displays as
/// `Name_{n-1}` in indexed paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NameRef {
    pub index: u32,
    pub number: u32,
}

impl NameRef {
    pub fn new(index: u32) -> Self {
        Self { index, number: 0 }
    }

    pub fn with_number(index: u32, number: u32) -> Self {
        Self { index, number }
    }
}

/// One row of the name table. Older format revisions carry an opaque
/// flags word per name; it is preserved verbatim, never interpreted.
#[derive(Debug, Clone)]
pub struct NameEntry {
    pub text: String,
    pub flags: u64,
}

/// Ordered, duplicate-free string pool.
#[derive(Debug, Clone, Default)]
pub struct NameTable {
    entries: Vec<NameEntry>,
}

/// Default flags word for names added at runtime (matches what the
/// engine writes for ordinary names).
const DEFAULT_NAME_FLAGS: u64 = 0x0007_1000_0000_0000;

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up the text of a name by index.
    pub fn get(&self, index: u32) -> Result<&str> {
        self.entries
            .get(index as usize)
            .map(|e| e.text.as_str())
            .ok_or_else(|| Error::format(format!("name index {} out of range", index)))
    }

    /// Exact, case-sensitive lookup.
    pub fn find(&self, name: &str) -> Option<u32> {
        self.entries
            .iter()
            .position(|e| e.text == name)
            .map(|i| i as u32)
    }

    /// Return the existing index for `name`, or append it and return
    /// the new index. Name tables are small; the linear scan is fine.
    pub fn find_or_add(&mut self, name: &str) -> u32 {
        if let Some(idx) = self.find(name) {
            return idx;
        }
        self.entries.push(NameEntry {
            text: name.to_string(),
            flags: DEFAULT_NAME_FLAGS,
        });
        (self.entries.len() - 1) as u32
    }

    /// Append a row read from a file, keeping its flags word.
    pub(crate) fn push_raw(&mut self, text: String, flags: u64) {
        self.entries.push(NameEntry { text, flags });
    }

    pub fn iter(&self) -> impl Iterator<Item = &NameEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_or_add_dedup() {
        let mut table = NameTable::new();
        table.find_or_add("None");
        assert_eq!(table.find_or_add("Foo"), 1);
        assert_eq!(table.find_or_add("Foo"), 1);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_case_sensitive() {
        let mut table = NameTable::new();
        let a = table.find_or_add("Actor");
        let b = table.find_or_add("actor");
        assert_ne!(a, b);
    }

    #[test]
    fn test_get_out_of_range() {
        let table = NameTable::new();
        assert!(table.get(0).is_err());
    }
}
