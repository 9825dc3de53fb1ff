//! Hash-table writer.
//!
//! Produces the same layout the reader consumes: one bucket per item, items
//! numbered in bucket order, keys stored relative to their parent, values
//! 8-aligned and child lists 4-aligned. Output is deterministic for a given
//! set of keys, values and parent links.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::error::{GvdbError, GvdbResult};
use crate::format::{
    BLOOM_SHIFT_BITS, HASH_ITEM_SIZE, HEADER_SIZE, HashItem, ItemKind, NO_PARENT, Pointer,
    SIGNATURE, TABLE_ALIGN, VALUE_ALIGN, djb_hash,
};

/// Bloom shift recorded in the header; no bloom words are emitted.
const BLOOM_SHIFT: u32 = 5;

#[derive(Debug, Default)]
struct Entry {
    parent: Option<String>,
    value: Option<Vec<u8>>,
    /// Full keys of the children, kept sorted.
    children: Vec<String>,
}

/// In-memory table that is serialized with [`TableBuilder::write`].
///
/// Items without a value are written as child lists, so a directory with no
/// children still round-trips as an empty list.
#[derive(Debug, Default)]
pub struct TableBuilder {
    items: BTreeMap<String, Entry>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `key` if it is not present yet.
    pub fn insert(&mut self, key: &str) -> GvdbResult<()> {
        if key.len() > u16::MAX as usize {
            return Err(GvdbError::invalid_key(format!(
                "key of {} bytes does not fit the index",
                key.len()
            )));
        }
        self.items.entry(key.to_string()).or_default();
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.items.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Attach a serialized value to an existing leaf item.
    pub fn set_value(&mut self, key: &str, value: Vec<u8>) -> GvdbResult<()> {
        let entry = self
            .items
            .get_mut(key)
            .ok_or_else(|| GvdbError::invalid_key(format!("{key} was never inserted")))?;
        if !entry.children.is_empty() {
            return Err(GvdbError::invalid_key(format!("{key} already has children")));
        }
        entry.value = Some(value);
        Ok(())
    }

    /// Make `parent` the parent of `key`.
    ///
    /// `parent` must be a proper prefix of `key`, must not carry a value, and
    /// `key` must not have a parent yet.
    pub fn set_parent(&mut self, key: &str, parent: &str) -> GvdbResult<()> {
        if key.len() <= parent.len() || !key.starts_with(parent) {
            return Err(GvdbError::invalid_key(format!(
                "{parent} is not a prefix of {key}"
            )));
        }

        let child = self
            .items
            .get_mut(key)
            .ok_or_else(|| GvdbError::invalid_key(format!("{key} was never inserted")))?;
        if child.parent.is_some() {
            return Err(GvdbError::invalid_key(format!("{key} already has a parent")));
        }

        let parent_entry = self
            .items
            .get_mut(parent)
            .ok_or_else(|| GvdbError::invalid_key(format!("{parent} was never inserted")))?;
        if parent_entry.value.is_some() {
            return Err(GvdbError::invalid_key(format!("{parent} holds a value")));
        }
        let at = parent_entry
            .children
            .binary_search_by(|existing| existing.as_str().cmp(key))
            .unwrap_or_else(|at| at);
        parent_entry.children.insert(at, key.to_string());

        if let Some(child) = self.items.get_mut(key) {
            child.parent = Some(parent.to_string());
        }
        Ok(())
    }

    /// Serialize the table into a little-endian image.
    pub fn write(&self) -> Vec<u8> {
        let n_items = self.items.len();
        let n_buckets = n_items;

        let mut chains: Vec<Vec<&str>> = vec![Vec::new(); n_buckets];
        for key in self.items.keys() {
            let bucket = djb_hash(key.as_bytes()) as usize % n_buckets;
            // newest first within a chain
            chains[bucket].insert(0, key.as_str());
        }

        let order: Vec<&str> = chains.iter().flatten().copied().collect();
        let index: HashMap<&str, u32> = order
            .iter()
            .enumerate()
            .map(|(i, key)| (*key, i as u32))
            .collect();

        let mut out = FileWriter::new();
        let table_len = 8 + n_buckets * 4 + n_items * HASH_ITEM_SIZE;
        let root = out.allocate(TABLE_ALIGN, table_len);
        let base = root.start as usize;

        out.put_u32(base, BLOOM_SHIFT << BLOOM_SHIFT_BITS);
        out.put_u32(base + 4, n_buckets as u32);
        let mut first = 0u32;
        for (bucket, chain) in chains.iter().enumerate() {
            out.put_u32(base + 8 + bucket * 4, first);
            first += chain.len() as u32;
        }

        let items_at = base + 8 + n_buckets * 4;
        for (i, key) in order.iter().enumerate() {
            let entry = &self.items[*key];
            let fragment = match &entry.parent {
                Some(parent) => &key[parent.len()..],
                None => key,
            };
            let key_start = out.append(fragment.as_bytes());

            let (kind, value) = match &entry.value {
                Some(bytes) => (ItemKind::Value, out.allocate_with(VALUE_ALIGN, bytes)),
                None => {
                    let list: Vec<u8> = entry
                        .children
                        .iter()
                        .flat_map(|child| index[child.as_str()].to_le_bytes())
                        .collect();
                    (ItemKind::List, out.allocate_with(TABLE_ALIGN, &list))
                }
            };

            let item = HashItem {
                hash_value: djb_hash(key.as_bytes()),
                parent: entry
                    .parent
                    .as_deref()
                    .map_or(NO_PARENT, |parent| index[parent]),
                key_start: key_start as u32,
                key_size: fragment.len() as u16,
                kind,
                value,
            };
            let at = items_at + i * HASH_ITEM_SIZE;
            item.write(&mut out.bytes[at..at + HASH_ITEM_SIZE]);
        }

        out.finish(root)
    }

    /// Serialize and write the table to `path`.
    pub fn write_to(&self, path: impl AsRef<Path>) -> GvdbResult<()> {
        let path = path.as_ref();
        std::fs::write(path, self.write()).map_err(|e| GvdbError::io(path, e))
    }
}

/// Append-only image buffer; chunks are placed at increasing offsets.
struct FileWriter {
    bytes: Vec<u8>,
}

impl FileWriter {
    fn new() -> Self {
        Self {
            bytes: vec![0; HEADER_SIZE],
        }
    }

    fn pad_to(&mut self, align: usize) {
        let padded = self.bytes.len().next_multiple_of(align);
        self.bytes.resize(padded, 0);
    }

    /// Reserve `size` zeroed bytes at the next `align` boundary.
    fn allocate(&mut self, align: usize, size: usize) -> Pointer {
        self.pad_to(align);
        let start = self.bytes.len();
        self.bytes.resize(start + size, 0);
        Pointer::new(start, start + size)
    }

    /// Copy `data` to the next `align` boundary; empty data gets a null pointer.
    fn allocate_with(&mut self, align: usize, data: &[u8]) -> Pointer {
        if data.is_empty() {
            return Pointer::default();
        }
        self.pad_to(align);
        let start = self.bytes.len();
        self.bytes.extend_from_slice(data);
        Pointer::new(start, self.bytes.len())
    }

    /// Copy `data` without alignment; returns its offset.
    fn append(&mut self, data: &[u8]) -> usize {
        let start = self.bytes.len();
        self.bytes.extend_from_slice(data);
        start
    }

    fn put_u32(&mut self, at: usize, value: u32) {
        self.bytes[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn finish(mut self, root: Pointer) -> Vec<u8> {
        self.bytes[0..8].copy_from_slice(&SIGNATURE);
        self.put_u32(8, 0);
        self.put_u32(12, 0);
        root.write(&mut self.bytes[16..24]);
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::le_u32;

    #[test]
    fn test_header_layout() {
        let mut builder = TableBuilder::new();
        builder.insert("/").unwrap();
        let raw = builder.write();

        assert_eq!(&raw[0..8], b"GVariant");
        assert_eq!(le_u32(&raw, 8), Some(0));
        let root = Pointer::read(&raw, 16).unwrap();
        assert_eq!(root.start, HEADER_SIZE as u32);
        // bloom header, one bucket, one item
        assert_eq!(root.end - root.start, 8 + 4 + HASH_ITEM_SIZE as u32);
        assert_eq!(le_u32(&raw, 24), Some(5 << 27));
    }

    #[test]
    fn test_values_are_aligned() {
        let mut builder = TableBuilder::new();
        for key in ["/x", "/yy", "/zzz"] {
            builder.insert(key).unwrap();
            builder.set_value(key, vec![1, 2, 3]).unwrap();
        }
        let raw = builder.write();
        let root = Pointer::read(&raw, 16).unwrap();
        let items_at = root.start as usize + 8 + 3 * 4;
        for i in 0..3 {
            let item = HashItem::read(&raw, items_at + i * HASH_ITEM_SIZE).unwrap();
            assert_eq!(item.kind, ItemKind::Value);
            assert_eq!(item.value.start % 8, 0);
        }
    }

    #[test]
    fn test_parent_rules() {
        let mut builder = TableBuilder::new();
        builder.insert("/").unwrap();
        builder.insert("/a").unwrap();
        builder.set_value("/a", vec![0]).unwrap();

        assert!(builder.set_parent("/", "/a").is_err());
        assert!(builder.set_parent("/a", "/missing").is_err());
        builder.set_parent("/a", "/").unwrap();
        assert!(builder.set_parent("/a", "/").is_err());

        builder.insert("/a/b").unwrap();
        assert!(builder.set_parent("/a/b", "/a").is_err());
        assert!(builder.set_value("/", vec![1]).is_err());
    }

    #[test]
    fn test_deterministic_output() {
        let build = || {
            let mut builder = TableBuilder::new();
            for key in ["/q", "/w", "/e", "/r"] {
                builder.insert(key).unwrap();
                builder.set_value(key, key.as_bytes().to_vec()).unwrap();
            }
            builder.write()
        };
        assert_eq!(build(), build());
    }
}
