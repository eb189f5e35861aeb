//! A hashmap whose keys may be any item, not just strings.
//!
//! Keys are addressed by a full width structural digest (blake3) of their
//! value. The bucket map is keyed by that digest and keeps the original key
//! next to the value so it can be iterated and rendered.

use core::hash::BuildHasherDefault;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

use seahash::SeaHasher;

use crate::datatype::Type;
use crate::error::{Result, SiphonError};
use crate::item::Item;

// digests are already uniformly distributed, so a fast non-keyed hasher is enough
pub type OtherHasher = BuildHasherDefault<SeaHasher>;

pub type Digest = blake3::Hash;

#[derive(Clone, Debug)]
pub struct Hashmap {
    key_type: Type,
    val_type: Type,
    entries: HashMap<Digest, (Item, Item), OtherHasher>,
}

impl Hashmap {
    pub fn new(key_type: Type, val_type: Type) -> Self {
        Self {
            key_type,
            val_type,
            entries: HashMap::default(),
        }
    }
    pub fn key_type(&self) -> &Type {
        &self.key_type
    }
    pub fn val_type(&self) -> &Type {
        &self.val_type
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    /// Iterates over `(key, value)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&Item, &Item)> {
        self.entries.values().map(|(k, v)| (k, v))
    }
    pub fn digests(&self) -> impl Iterator<Item = &Digest> {
        self.entries.keys()
    }

    pub fn get(&self, key: &Item) -> Result<&Item> {
        let digest = self.digest_of(key)?;
        self.entries
            .get(&digest)
            .map(|(_, v)| v)
            .ok_or_else(|| missing(key))
    }
    pub fn get_mut(&mut self, key: &Item) -> Result<&mut Item> {
        let digest = self.digest_of(key)?;
        self.entries
            .get_mut(&digest)
            .map(|(_, v)| v)
            .ok_or_else(|| missing(key))
    }
    pub fn get_by_digest(&self, digest: &Digest) -> Option<&Item> {
        self.entries.get(digest).map(|(_, v)| v)
    }
    pub fn get_by_digest_mut(&mut self, digest: &Digest) -> Option<&mut Item> {
        self.entries.get_mut(digest).map(|(_, v)| v)
    }

    /// Inserts or overwrites the value stored under `key`.
    pub fn insert(&mut self, key: Item, value: Item) -> Result<()> {
        let digest = self.digest_of(&key)?;
        if !value.type_of().equals(&self.val_type) {
            return Err(SiphonError::TypeMismatch(format!(
                "expected a value of type {}, got {}",
                self.val_type,
                value.type_of()
            )));
        }
        match self.entries.entry(digest) {
            Entry::Occupied(mut e) => {
                e.get_mut().1 = value;
            }
            Entry::Vacant(e) => {
                e.insert((key, value));
            }
        }
        Ok(())
    }

    /// Removes `key`, returning the value it held.
    pub fn remove(&mut self, key: &Item) -> Result<Item> {
        let digest = self.digest_of(key)?;
        self.entries
            .remove(&digest)
            .map(|(_, v)| v)
            .ok_or_else(|| missing(key))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// A copy of this map holding only the entries whose value satisfies `keep`.
    pub fn retained<F>(&self, mut keep: F) -> Result<Hashmap>
    where
        F: FnMut(&Item) -> Result<bool>,
    {
        let mut kept = Hashmap::new(self.key_type.clone(), self.val_type.clone());
        for (digest, (k, v)) in &self.entries {
            if keep(v)? {
                kept.entries.insert(*digest, (k.clone(), v.clone()));
            }
        }
        Ok(kept)
    }

    /// Digest of a key, after checking it against the declared key type.
    pub fn digest_of(&self, key: &Item) -> Result<Digest> {
        if !key.type_of().equals(&self.key_type) {
            return Err(SiphonError::TypeMismatch(format!(
                "expected a key of type {}, got {}",
                self.key_type,
                key.type_of()
            )));
        }
        Ok(digest(key))
    }
}

fn missing(key: &Item) -> SiphonError {
    SiphonError::Index(format!("no such key: {}", key))
}

// ------------- Digests -------------

/// Structural digest of an item's value. Equal values produce equal digests
/// within a process; the encoding is tagged per variant so that values of
/// different kinds never share an encoding.
pub fn digest(item: &Item) -> Digest {
    let mut hasher = blake3::Hasher::new();
    feed(item, &mut hasher);
    hasher.finalize()
}

fn feed(item: &Item, hasher: &mut blake3::Hasher) {
    match item {
        Item::Bool(b) => {
            hasher.update(&[0, *b as u8]);
        }
        Item::Int(v) => {
            hasher.update(&[1]).update(&v.to_le_bytes());
        }
        Item::Int32(v) => {
            hasher.update(&[2]).update(&v.to_le_bytes());
        }
        Item::Int16(v) => {
            hasher.update(&[3]).update(&v.to_le_bytes());
        }
        Item::Int8(v) => {
            hasher.update(&[4]).update(&v.to_le_bytes());
        }
        Item::Uint(v) => {
            hasher.update(&[5]).update(&v.to_le_bytes());
        }
        Item::Uint32(v) => {
            hasher.update(&[6]).update(&v.to_le_bytes());
        }
        Item::Uint16(v) => {
            hasher.update(&[7]).update(&v.to_le_bytes());
        }
        Item::Uint8(v) => {
            hasher.update(&[8]).update(&v.to_le_bytes());
        }
        Item::Float(v) => {
            hasher.update(&[9]).update(&canonical_bits(*v).to_le_bytes());
        }
        Item::Float32(v) => {
            hasher.update(&[10]).update(&canonical_bits(f64::from(*v)).to_le_bytes());
        }
        Item::String(s) => {
            feed_bytes(11, s.as_bytes(), hasher);
        }
        Item::Regexp(re) => {
            feed_bytes(12, re.as_str().as_bytes(), hasher);
        }
        Item::List(list) => {
            hasher.update(&[13]).update(&(list.len() as u64).to_le_bytes());
            for elem in list.iter() {
                feed(elem, hasher);
            }
        }
        Item::Map(map) => {
            // entry order is unspecified, so hash the sorted entry digests
            let mut entries: Vec<[u8; 32]> = map
                .iter()
                .map(|(k, v)| {
                    let mut entry = blake3::Hasher::new();
                    feed(k, &mut entry);
                    feed(v, &mut entry);
                    *entry.finalize().as_bytes()
                })
                .collect();
            entries.sort_unstable();
            hasher.update(&[14]).update(&(entries.len() as u64).to_le_bytes());
            for entry in &entries {
                hasher.update(entry);
            }
        }
        Item::Struct(s) => {
            // fields by name; the declared struct name and field order do not count
            let mut fields: Vec<_> = s.iter().collect();
            fields.sort_unstable_by(|a, b| a.0.cmp(b.0));
            hasher.update(&[15]).update(&(fields.len() as u64).to_le_bytes());
            for (name, value) in fields {
                feed_bytes(16, name.as_bytes(), hasher);
                feed(value, hasher);
            }
        }
    }
}

fn feed_bytes(tag: u8, bytes: &[u8], hasher: &mut blake3::Hasher) {
    hasher
        .update(&[tag])
        .update(&(bytes.len() as u64).to_le_bytes())
        .update(bytes);
}

// -0.0 and 0.0 compare equal, as do all NaNs when used as keys
fn canonical_bits(v: f64) -> u64 {
    if v == 0.0 {
        0
    } else if v.is_nan() {
        f64::NAN.to_bits()
    } else {
        v.to_bits()
    }
}
