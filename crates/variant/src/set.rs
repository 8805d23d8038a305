//! Uniqueness sets.
//!
//! A set is keyed either by a space-separated list of sub-field names
//! (records are objects and the key is their projection onto those
//! fields) or by whole-value equality, optionally caseless for strings.
//! Records are kept in insertion order; a hash index over xxh3 of the
//! canonical key form keeps membership checks off the linear path.

use hashbrown::HashMap;
use purc_core::error::{CoreError, CoreResult};
use xxhash_rust::xxh3::Xxh3;

use crate::variant::{Variant, VariantData, VariantType};

/// The payload of a set variant.
pub struct SetData {
    unique_by: Vec<String>,
    caseless: bool,
    records: Vec<Variant>,
    index: HashMap<u64, Vec<usize>>,
}

impl SetData {
    /// Creates an empty set. `unique_by` is a space-separated list of key
    /// field names; `None` or an empty spec means whole-value equality.
    pub fn new(unique_by: Option<&str>, caseless: bool) -> Self {
        let unique_by = unique_by
            .map(|spec| {
                spec.split_whitespace()
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        Self {
            unique_by,
            caseless,
            records: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if the set has no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The records, in insertion order.
    pub fn records(&self) -> &[Variant] {
        &self.records
    }

    /// The record at `index`.
    pub fn get(&self, index: usize) -> Option<Variant> {
        self.records.get(index).cloned()
    }

    /// Adds a record. An equal record already present is left alone unless
    /// `overwrite` is set, in which case it is replaced. Returns true if
    /// the set changed.
    pub fn add(&mut self, value: Variant, overwrite: bool) -> CoreResult<bool> {
        let key = self.key_of(&value);
        let hash = self.key_hash(&key);

        if let Some(candidates) = self.index.get(&hash) {
            for &idx in candidates {
                let existing_key = self.key_of(&self.records[idx]);
                if existing_key.equal_with(&key, self.caseless) {
                    if overwrite {
                        self.records[idx] = value;
                        return Ok(true);
                    }
                    return Ok(false);
                }
            }
        }

        let idx = self.records.len();
        self.records.push(value);
        self.index.entry(hash).or_default().push(idx);
        Ok(true)
    }

    /// Removes the record equal to `value` under the uniqueness rule.
    /// Returns the removed record.
    pub fn remove(&mut self, value: &Variant) -> Option<Variant> {
        let key = self.key_of(value);
        let hash = self.key_hash(&key);

        let candidates = self.index.get(&hash)?.clone();
        for idx in candidates {
            let existing_key = self.key_of(&self.records[idx]);
            if existing_key.equal_with(&key, self.caseless) {
                let removed = self.records.remove(idx);
                self.rebuild_index();
                return Some(removed);
            }
        }
        None
    }

    /// Empties the set, returning how many records were dropped.
    pub fn clear(&mut self) -> usize {
        let count = self.records.len();
        self.records.clear();
        self.index.clear();
        count
    }

    pub(crate) fn drain_records(&mut self) -> Vec<Variant> {
        self.index.clear();
        std::mem::take(&mut self.records)
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        let hashes: Vec<u64> = self
            .records
            .iter()
            .map(|record| {
                let key = self.key_of(record);
                self.key_hash(&key)
            })
            .collect();
        for (idx, hash) in hashes.into_iter().enumerate() {
            self.index.entry(hash).or_default().push(idx);
        }
    }

    /// Projects a record onto the key fields. Non-object records and
    /// whole-value sets key on the record itself.
    fn key_of(&self, value: &Variant) -> Variant {
        if self.unique_by.is_empty() || !value.is_object() {
            return value.clone();
        }

        let key = Variant::object();
        for field in &self.unique_by {
            let member = value.object_get(field).unwrap_or_else(Variant::undefined);
            let _ = key.object_set(field, member);
        }
        key
    }

    fn key_hash(&self, key: &Variant) -> u64 {
        let mut hasher = Xxh3::new();
        let mut visited = Vec::new();
        write_canonical(key, self.caseless, &mut hasher, &mut visited);
        hasher.digest()
    }
}

/// Feeds a canonical form of `value` to the hasher: one tag byte followed
/// by the payload. Equal values (under `caseless`) produce equal streams;
/// collisions are resolved by the equality check at the call sites.
fn write_canonical(
    value: &Variant,
    caseless: bool,
    hasher: &mut Xxh3,
    visited: &mut Vec<*const ()>,
) {
    let ptr = std::rc::Rc::as_ptr(&value.cell) as *const ();
    if visited.contains(&ptr) {
        hasher.update(&[0xFE]);
        return;
    }

    match value.variant_type() {
        VariantType::Undefined => hasher.update(&[0x01]),
        VariantType::Null => hasher.update(&[0x02]),
        VariantType::Boolean => {
            hasher.update(&[0x03, value.booleanize() as u8]);
        }
        VariantType::Number
        | VariantType::LongInt
        | VariantType::ULongInt
        | VariantType::LongDouble => {
            hasher.update(&[0x04]);
            hasher.update(&value.numberize().to_bits().to_le_bytes());
        }
        VariantType::String | VariantType::AtomString | VariantType::Exception => {
            hasher.update(&[0x05]);
            if let Some(s) = value.get_string() {
                if caseless {
                    hasher.update(s.to_ascii_lowercase().as_bytes());
                } else {
                    hasher.update(s.as_bytes());
                }
            }
        }
        VariantType::ByteSeq => {
            hasher.update(&[0x06]);
            if let Some(bytes) = value.get_bytes() {
                hasher.update(bytes);
            }
        }
        VariantType::Dynamic | VariantType::Native => {
            hasher.update(&[0x07]);
            hasher.update(&(ptr as usize).to_le_bytes());
        }
        VariantType::Array | VariantType::Tuple => {
            visited.push(ptr);
            hasher.update(&[0x08]);
            if let Ok(members) = value.members() {
                for member in &members {
                    write_canonical(member, caseless, hasher, visited);
                }
            }
            visited.pop();
        }
        VariantType::Object => {
            visited.push(ptr);
            hasher.update(&[0x09]);
            if let Ok(mut entries) = value.object_entries() {
                entries.sort_by(|a, b| a.0.cmp(&b.0));
                for (key, member) in &entries {
                    hasher.update(key.as_bytes());
                    write_canonical(member, caseless, hasher, visited);
                }
            }
            visited.pop();
        }
        VariantType::Set => {
            visited.push(ptr);
            // order-insensitive: combine member digests commutatively
            let mut combined: u64 = 0;
            if let Ok(members) = value.members() {
                for member in &members {
                    let mut sub = Xxh3::new();
                    write_canonical(member, caseless, &mut sub, visited);
                    combined ^= sub.digest();
                }
            }
            hasher.update(&[0x0A]);
            hasher.update(&combined.to_le_bytes());
            visited.pop();
        }
    }
}

impl Variant {
    /// Adds a record to a set. See [`SetData::add`].
    pub fn set_add(&self, value: Variant, overwrite: bool) -> CoreResult<bool> {
        match &self.cell.data {
            VariantData::Set(set) => set.borrow_mut().add(value, overwrite),
            _ => Err(CoreError::wrong_data_type(
                "set",
                self.variant_type().as_str(),
            )),
        }
    }

    /// Removes the record equal to `value` from a set.
    pub fn set_remove(&self, value: &Variant) -> CoreResult<bool> {
        match &self.cell.data {
            VariantData::Set(set) => Ok(set.borrow_mut().remove(value).is_some()),
            _ => Err(CoreError::wrong_data_type(
                "set",
                self.variant_type().as_str(),
            )),
        }
    }

    /// Number of records of a set.
    pub fn set_size(&self) -> CoreResult<usize> {
        match &self.cell.data {
            VariantData::Set(set) => Ok(set.borrow().len()),
            _ => Err(CoreError::wrong_data_type(
                "set",
                self.variant_type().as_str(),
            )),
        }
    }

    /// The record at `index` of a set, in insertion order.
    pub fn set_get(&self, index: usize) -> Option<Variant> {
        match &self.cell.data {
            VariantData::Set(set) => set.borrow().get(index),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_value_uniqueness() {
        let set = Variant::set(None, false);
        assert!(set.set_add(Variant::longint(1), false).unwrap());
        assert!(set.set_add(Variant::longint(2), false).unwrap());
        assert!(set.set_add(Variant::longint(3), false).unwrap());
        assert_eq!(set.set_size().unwrap(), 3);

        // an equal record is rejected
        assert!(!set.set_add(Variant::longint(2), false).unwrap());
        assert_eq!(set.set_size().unwrap(), 3);
    }

    #[test]
    fn test_build_from_array() {
        let source = Variant::array(vec![
            Variant::longint(1),
            Variant::longint(2),
            Variant::longint(3),
            Variant::longint(2),
        ]);
        let set = Variant::set_from_container(&source, Some(""), false).unwrap();
        assert_eq!(set.set_size().unwrap(), 3);
    }

    #[test]
    fn test_keyed_uniqueness() {
        let set = Variant::set(Some("id"), false);
        let rec = |id: i64, name: &str| {
            Variant::object_from([
                ("id".to_string(), Variant::longint(id)),
                ("name".to_string(), Variant::string(name)),
            ])
        };

        assert!(set.set_add(rec(1, "one"), false).unwrap());
        assert!(set.set_add(rec(2, "two"), false).unwrap());
        // same id, different payload: duplicate under the key spec
        assert!(!set.set_add(rec(1, "uno"), false).unwrap());
        assert_eq!(set.set_size().unwrap(), 2);

        // overwrite replaces the record with the matching key
        assert!(set.set_add(rec(1, "uno"), true).unwrap());
        assert_eq!(set.set_size().unwrap(), 2);
        let first = set.set_get(0).unwrap();
        assert_eq!(
            first.object_get("name").unwrap().get_string(),
            Some("uno")
        );
    }

    #[test]
    fn test_caseless_uniqueness() {
        let set = Variant::set(None, true);
        assert!(set.set_add(Variant::string("HVML"), false).unwrap());
        assert!(!set.set_add(Variant::string("hvml"), false).unwrap());
        assert_eq!(set.set_size().unwrap(), 1);
    }

    #[test]
    fn test_remove_rebuilds_index() {
        let set = Variant::set(None, false);
        for i in 0..5 {
            set.set_add(Variant::longint(i), false).unwrap();
        }
        assert!(set.set_remove(&Variant::longint(2)).unwrap());
        assert!(!set.set_remove(&Variant::longint(2)).unwrap());
        assert_eq!(set.set_size().unwrap(), 4);

        // remaining records still deduplicate correctly
        assert!(!set.set_add(Variant::longint(4), false).unwrap());
        assert!(set.set_add(Variant::longint(2), false).unwrap());
    }

    #[test]
    fn test_object_key_hash_is_order_insensitive() {
        let set = Variant::set(None, false);
        let a = Variant::object_from([
            ("x".to_string(), Variant::longint(1)),
            ("y".to_string(), Variant::longint(2)),
        ]);
        let b = Variant::object_from([
            ("y".to_string(), Variant::longint(2)),
            ("x".to_string(), Variant::longint(1)),
        ]);
        assert!(set.set_add(a, false).unwrap());
        assert!(!set.set_add(b, false).unwrap());
    }
}
