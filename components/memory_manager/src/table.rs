//! Open-addressed hash table keyed by interned strings.
//!
//! Keys are [`ObjRef`] handles to interned strings, compared by handle
//! identity; the key's FNV-1a hash is supplied by the caller and cached in
//! the entry for rehashing. Probing is linear, capacity is always a power
//! of two, and the maximum load factor is 3/4. Deleted entries leave a
//! tombstone (`key: None`, `value: Bool(true)`) so probe chains stay
//! intact.

use core_types::{ObjRef, Value};

/// Growth floor for a table's first allocation.
const MIN_CAPACITY: usize = 8;

#[derive(Debug, Clone, Copy)]
struct Entry {
    key: Option<ObjRef>,
    hash: u32,
    value: Value,
}

impl Entry {
    const EMPTY: Entry = Entry { key: None, hash: 0, value: Value::Nil };

    fn is_tombstone(&self) -> bool {
        self.key.is_none() && matches!(self.value, Value::Bool(true))
    }
}

/// A string-keyed hash table.
///
/// Used for the VM globals, the string intern table, class method tables,
/// and instance field tables.
#[derive(Debug, Default)]
pub struct Table {
    entries: Vec<Entry>,
    /// Live entries plus tombstones
    count: usize,
}

impl Table {
    /// Create an empty table. No storage is allocated until the first
    /// insertion.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current bucket count (always zero or a power of two).
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Number of live key/value pairs.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.key.is_some()).count()
    }

    /// Whether the table holds no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Approximate memory footprint in bytes, for GC accounting.
    pub fn footprint(&self) -> usize {
        self.entries.len() * std::mem::size_of::<Entry>()
    }

    fn find_index(entries: &[Entry], key: ObjRef, hash: u32) -> usize {
        let mask = entries.len() - 1;
        let mut index = hash as usize & mask;
        let mut tombstone = None;
        loop {
            let entry = &entries[index];
            match entry.key {
                None => {
                    if entry.is_tombstone() {
                        tombstone.get_or_insert(index);
                    } else {
                        return tombstone.unwrap_or(index);
                    }
                }
                Some(existing) if existing == key => return index,
                Some(_) => {}
            }
            index = (index + 1) & mask;
        }
    }

    fn grow(&mut self) {
        let new_capacity = if self.entries.is_empty() {
            MIN_CAPACITY
        } else {
            self.entries.len() * 2
        };
        let old = std::mem::replace(&mut self.entries, vec![Entry::EMPTY; new_capacity]);
        self.count = 0;
        for entry in old {
            if let Some(key) = entry.key {
                let index = Self::find_index(&self.entries, key, entry.hash);
                self.entries[index] = entry;
                self.count += 1;
            }
        }
    }

    /// Look up `key`. `hash` must be the key's cached content hash.
    pub fn get(&self, key: ObjRef, hash: u32) -> Option<Value> {
        if self.entries.is_empty() {
            return None;
        }
        let index = Self::find_index(&self.entries, key, hash);
        let entry = &self.entries[index];
        entry.key.map(|_| entry.value)
    }

    /// Insert or update `key`. Returns `true` when the key was not
    /// previously present.
    pub fn set(&mut self, key: ObjRef, hash: u32, value: Value) -> bool {
        if (self.count + 1) * 4 > self.entries.len() * 3 {
            self.grow();
        }
        let index = Self::find_index(&self.entries, key, hash);
        let entry = &mut self.entries[index];
        let is_new = entry.key.is_none();
        if is_new && !entry.is_tombstone() {
            self.count += 1;
        }
        *entry = Entry { key: Some(key), hash, value };
        is_new
    }

    /// Remove `key`, leaving a tombstone. Returns `true` if it was present.
    pub fn delete(&mut self, key: ObjRef, hash: u32) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        let index = Self::find_index(&self.entries, key, hash);
        let entry = &mut self.entries[index];
        if entry.key.is_none() {
            return false;
        }
        *entry = Entry { key: None, hash: 0, value: Value::Bool(true) };
        true
    }

    /// Iterate over the live `(key, hash, value)` entries.
    pub fn iter(&self) -> impl Iterator<Item = (ObjRef, u32, Value)> + '_ {
        self.entries
            .iter()
            .filter_map(|e| e.key.map(|k| (k, e.hash, e.value)))
    }

    /// Probe for a key with the given content hash that satisfies `matches`.
    ///
    /// This is the interning lookup: the caller compares actual string
    /// contents, so a hit is found even though no handle exists yet.
    pub fn find_key<F>(&self, hash: u32, matches: F) -> Option<ObjRef>
    where
        F: Fn(ObjRef) -> bool,
    {
        if self.entries.is_empty() {
            return None;
        }
        let mask = self.entries.len() - 1;
        let mut index = hash as usize & mask;
        loop {
            let entry = &self.entries[index];
            match entry.key {
                None => {
                    if !entry.is_tombstone() {
                        return None;
                    }
                }
                Some(key) => {
                    if entry.hash == hash && matches(key) {
                        return Some(key);
                    }
                }
            }
            index = (index + 1) & mask;
        }
    }
}

/// FNV-1a-32 hash over a byte sequence.
pub fn hash_bytes(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 2166136261;
    for &byte in bytes {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(16777619);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(i: usize) -> ObjRef {
        ObjRef::new(i)
    }

    #[test]
    fn test_fnv1a_known_vectors() {
        assert_eq!(hash_bytes(b""), 2166136261);
        assert_eq!(hash_bytes(b"a"), 0xe40c292c);
        assert_eq!(hash_bytes(b"foobar"), 0xbf9cf968);
    }

    #[test]
    fn test_set_and_get() {
        let mut table = Table::new();
        assert!(table.set(key(0), 7, Value::Number(1.0)));
        assert_eq!(table.get(key(0), 7), Some(Value::Number(1.0)));
        assert_eq!(table.get(key(1), 7), None);
    }

    #[test]
    fn test_set_existing_returns_false() {
        let mut table = Table::new();
        assert!(table.set(key(0), 7, Value::Number(1.0)));
        assert!(!table.set(key(0), 7, Value::Number(2.0)));
        assert_eq!(table.get(key(0), 7), Some(Value::Number(2.0)));
    }

    #[test]
    fn test_delete_leaves_probe_chain_intact() {
        let mut table = Table::new();
        // Three keys with the same hash collide into one probe chain.
        table.set(key(1), 5, Value::Number(1.0));
        table.set(key(2), 5, Value::Number(2.0));
        table.set(key(3), 5, Value::Number(3.0));
        assert!(table.delete(key(2), 5));
        assert_eq!(table.get(key(1), 5), Some(Value::Number(1.0)));
        assert_eq!(table.get(key(3), 5), Some(Value::Number(3.0)));
        assert_eq!(table.get(key(2), 5), None);
    }

    #[test]
    fn test_delete_missing() {
        let mut table = Table::new();
        assert!(!table.delete(key(0), 1));
        table.set(key(0), 1, Value::Nil);
        assert!(!table.delete(key(9), 1));
    }

    #[test]
    fn test_tombstone_slot_is_reused() {
        let mut table = Table::new();
        table.set(key(1), 5, Value::Number(1.0));
        table.delete(key(1), 5);
        table.set(key(2), 5, Value::Number(2.0));
        assert_eq!(table.get(key(2), 5), Some(Value::Number(2.0)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_capacity_is_power_of_two() {
        let mut table = Table::new();
        for i in 0..100 {
            table.set(key(i), i as u32, Value::Number(i as f64));
        }
        assert!(table.capacity().is_power_of_two());
        assert_eq!(table.len(), 100);
    }

    #[test]
    fn test_growth_preserves_entries() {
        let mut table = Table::new();
        for i in 0..64 {
            table.set(key(i), hash_bytes(i.to_string().as_bytes()), Value::Number(i as f64));
        }
        for i in 0..64 {
            assert_eq!(
                table.get(key(i), hash_bytes(i.to_string().as_bytes())),
                Some(Value::Number(i as f64))
            );
        }
    }

    #[test]
    fn test_find_key_by_content() {
        let mut table = Table::new();
        table.set(key(4), 99, Value::Nil);
        assert_eq!(table.find_key(99, |k| k == key(4)), Some(key(4)));
        assert_eq!(table.find_key(99, |_| false), None);
        assert_eq!(table.find_key(100, |_| true), None);
    }
}
