//! Hash-table reader.
//!
//! [`Table::new`] validates the whole index up front: header, root pointer,
//! table framing, and for every item its key range, parent index, payload
//! pointer and list members. Lookups afterwards only slice memory that is
//! known to be in bounds.

use std::ops::Range;

use crate::error::{GvdbError, GvdbResult};
use crate::format::{
    BLOOM_SHIFT_BITS, BLOOM_WORDS_MASK, HASH_ITEM_SIZE, HEADER_SIZE, HashItem, ItemKind,
    NO_PARENT, Pointer, SIGNATURE, SIGNATURE_SWAPPED, TABLE_ALIGN, VALUE_ALIGN, djb_hash, le_u32,
};
use crate::image::Image;

/// A parsed, read-only GVDB table over an [`Image`].
#[derive(Debug)]
pub struct Table {
    image: Image,
    byteswapped: bool,
    bloom_words: Vec<u32>,
    bloom_shift: u32,
    buckets: Vec<u32>,
    items: Vec<HashItem>,
}

impl Table {
    /// Parse and validate `image`.
    pub fn new(image: Image) -> GvdbResult<Self> {
        let data = image.as_slice();
        if data.len() < HEADER_SIZE {
            return Err(GvdbError::corrupt(format!(
                "image is {} bytes, shorter than its header",
                data.len()
            )));
        }

        let byteswapped = match &data[0..8] {
            sig if sig == SIGNATURE => false,
            sig if sig == SIGNATURE_SWAPPED => true,
            _ => return Err(GvdbError::corrupt("bad signature")),
        };

        let version = le_u32(data, 8).unwrap_or(u32::MAX);
        if version != 0 {
            return Err(GvdbError::corrupt(format!("unsupported version {version}")));
        }

        let root = Pointer::read(data, 16)
            .and_then(|p| p.resolve(data.len(), TABLE_ALIGN))
            .ok_or_else(|| GvdbError::corrupt("root table pointer out of bounds"))?;

        let (bloom_words, bloom_shift, buckets, items) = parse_hash(data, root)?;

        let table = Self {
            image,
            byteswapped,
            bloom_words,
            bloom_shift,
            buckets,
            items,
        };
        table.validate_items()?;
        Ok(table)
    }

    fn validate_items(&self) -> GvdbResult<()> {
        let data = self.image.as_slice();
        let n_items = self.items.len();

        for (index, item) in self.items.iter().enumerate() {
            if data.get(item.key_range()).is_none() {
                return Err(GvdbError::corrupt(format!("item {index}: key out of bounds")));
            }
            if item.parent != NO_PARENT && item.parent as usize >= n_items {
                return Err(GvdbError::corrupt(format!("item {index}: bad parent index")));
            }
            match item.kind {
                ItemKind::Value => {
                    item.value.resolve(data.len(), VALUE_ALIGN).ok_or_else(|| {
                        GvdbError::corrupt(format!("item {index}: value out of bounds"))
                    })?;
                }
                ItemKind::List => {
                    let range = item.value.resolve(data.len(), TABLE_ALIGN).ok_or_else(|| {
                        GvdbError::corrupt(format!("item {index}: list out of bounds"))
                    })?;
                    if range.len() % 4 != 0 {
                        return Err(GvdbError::corrupt(format!("item {index}: ragged list")));
                    }
                    let out_of_range = data[range]
                        .chunks_exact(4)
                        .any(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]) as usize >= n_items);
                    if out_of_range {
                        return Err(GvdbError::corrupt(format!(
                            "item {index}: list member out of range"
                        )));
                    }
                }
                // Nested tables are not served by this reader; other tags carry no payload.
                ItemKind::Table | ItemKind::Other(_) => {}
            }
        }
        Ok(())
    }

    pub fn image(&self) -> &Image {
        &self.image
    }

    /// Whether the producer byteswapped its values (big-endian build host).
    pub fn is_byteswapped(&self) -> bool {
        self.byteswapped
    }

    /// Number of items in the table.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Byte range of the serialized value stored under `key`.
    pub fn value_range(&self, key: &str) -> Option<Range<usize>> {
        let item = self.lookup(key, ItemKind::Value)?;
        item.value.resolve(self.image.len(), VALUE_ALIGN)
    }

    /// The serialized value stored under `key`.
    pub fn value(&self, key: &str) -> Option<&[u8]> {
        let range = self.value_range(key)?;
        self.image.as_slice().get(range)
    }

    /// Names of the children listed under `key`, in stored order.
    ///
    /// Child names are the children's own key fragments, so sub-directories
    /// keep their trailing `/`.
    pub fn list(&self, key: &str) -> Option<Vec<String>> {
        let item = self.lookup(key, ItemKind::List)?;
        let data = self.image.as_slice();
        let range = item.value.resolve(data.len(), TABLE_ALIGN)?;

        let names = data[range]
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]) as usize)
            .map(|index| {
                self.items
                    .get(index)
                    .map(|child| String::from_utf8_lossy(self.key_bytes(child)).into_owned())
                    .unwrap_or_default()
            })
            .collect();
        Some(names)
    }

    fn key_bytes(&self, item: &HashItem) -> &[u8] {
        self.image.as_slice().get(item.key_range()).unwrap_or_default()
    }

    fn bloom_filter(&self, hash: u32) -> bool {
        if self.bloom_words.is_empty() {
            return true;
        }
        let word = (hash / 32) as usize % self.bloom_words.len();
        let mut mask = 1u32 << (hash & 31);
        mask |= 1u32 << ((hash >> self.bloom_shift) & 31);
        self.bloom_words[word] & mask == mask
    }

    /// Walk the parent chain of `item`, matching key fragments from the end of `key`.
    fn check_name(&self, item: &HashItem, key: &[u8]) -> bool {
        let mut item = item;
        let mut remaining = key.len();

        // Bounded by the item count so a corrupt parent cycle terminates.
        for _ in 0..=self.items.len() {
            let fragment = self.key_bytes(item);
            if fragment.len() > remaining {
                return false;
            }
            remaining -= fragment.len();
            if key[remaining..remaining + fragment.len()] != *fragment {
                return false;
            }

            if item.parent == NO_PARENT {
                return remaining == 0;
            }
            if fragment.is_empty() {
                return false;
            }
            match self.items.get(item.parent as usize) {
                Some(parent) => item = parent,
                None => return false,
            }
        }
        false
    }

    fn lookup(&self, key: &str, kind: ItemKind) -> Option<&HashItem> {
        if self.buckets.is_empty() || self.items.is_empty() {
            return None;
        }

        let key = key.as_bytes();
        let hash = djb_hash(key);
        if !self.bloom_filter(hash) {
            return None;
        }

        let n_items = self.items.len();
        let bucket = hash as usize % self.buckets.len();
        let first = self.buckets[bucket] as usize;
        let last = match self.buckets.get(bucket + 1) {
            Some(&next) => (next as usize).min(n_items),
            None => n_items,
        };

        self.items.get(first..last)?.iter().find(|item| {
            item.hash_value == hash && item.kind == kind && self.check_name(item, key)
        })
    }
}

type ParsedHash = (Vec<u32>, u32, Vec<u32>, Vec<HashItem>);

fn parse_hash(data: &[u8], range: Range<usize>) -> GvdbResult<ParsedHash> {
    let table = &data[range];
    let truncated = || GvdbError::corrupt("hash table header truncated");

    let bloom_hdr = le_u32(table, 0).ok_or_else(truncated)?;
    let n_buckets = le_u32(table, 4).ok_or_else(truncated)? as usize;
    let n_bloom = (bloom_hdr & BLOOM_WORDS_MASK) as usize;
    let bloom_shift = bloom_hdr >> BLOOM_SHIFT_BITS;

    let words = |from: usize, count: usize| -> GvdbResult<Vec<u32>> {
        let end = count
            .checked_mul(4)
            .and_then(|n| n.checked_add(from))
            .filter(|&end| end <= table.len())
            .ok_or_else(|| GvdbError::corrupt("hash table runs past its pointer"))?;
        Ok(table[from..end]
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    };

    let bloom_words = words(8, n_bloom)?;
    let buckets_at = 8 + n_bloom * 4;
    let buckets = words(buckets_at, n_buckets)?;

    let items_at = buckets_at + n_buckets * 4;
    let items_len = table.len() - items_at;
    if items_len % HASH_ITEM_SIZE != 0 {
        return Err(GvdbError::corrupt("hash item area is not a whole number of items"));
    }

    let items = (0..items_len / HASH_ITEM_SIZE)
        .map(|i| HashItem::read(table, items_at + i * HASH_ITEM_SIZE))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| GvdbError::corrupt("hash item truncated"))?;

    Ok((bloom_words, bloom_shift, buckets, items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TableBuilder;

    fn sample() -> Table {
        let mut builder = TableBuilder::new();
        builder.insert("/").unwrap();
        builder.insert("/a").unwrap();
        builder.set_value("/a", b"value-a".to_vec()).unwrap();
        builder.set_parent("/a", "/").unwrap();
        builder.insert("/dir/").unwrap();
        builder.set_parent("/dir/", "/").unwrap();
        builder.insert("/dir/b").unwrap();
        builder.set_value("/dir/b", b"value-b".to_vec()).unwrap();
        builder.set_parent("/dir/b", "/dir/").unwrap();
        Table::new(Image::copy_from(&builder.write())).unwrap()
    }

    #[test]
    fn test_lookup_values() {
        let table = sample();
        assert_eq!(table.value("/a"), Some(&b"value-a"[..]));
        assert_eq!(table.value("/dir/b"), Some(&b"value-b"[..]));
        assert_eq!(table.value("/b"), None);
        assert_eq!(table.value("/dir/"), None);
        assert_eq!(table.value(""), None);
        assert!(!table.is_byteswapped());
    }

    #[test]
    fn test_list_children() {
        let table = sample();
        assert_eq!(table.list("/"), Some(vec!["a".to_string(), "dir/".to_string()]));
        assert_eq!(table.list("/dir/"), Some(vec!["b".to_string()]));
        assert_eq!(table.list("/dir"), None);
        assert_eq!(table.list("/a"), None);
    }

    #[test]
    fn test_rejects_short_and_unsigned() {
        assert!(matches!(
            Table::new(Image::copy_from(&[])),
            Err(GvdbError::Corrupt(_))
        ));
        assert!(matches!(
            Table::new(Image::copy_from(&[0u8; 24])),
            Err(GvdbError::Corrupt(_))
        ));
    }

    #[test]
    fn test_rejects_root_past_end() {
        let mut raw = TableBuilder::new().write();
        let len = raw.len() as u32;
        raw[20..24].copy_from_slice(&(len + 64).to_le_bytes());
        let err = Table::new(Image::copy_from(&raw)).unwrap_err();
        assert!(matches!(err, GvdbError::Corrupt(_)));
    }

    #[test]
    fn test_rejects_bad_version() {
        let mut raw = TableBuilder::new().write();
        raw[8] = 1;
        assert!(Table::new(Image::copy_from(&raw)).is_err());
    }

    #[test]
    fn test_empty_table() {
        let table = Table::new(Image::copy_from(&TableBuilder::new().write())).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.value("/"), None);
        assert_eq!(table.list("/"), None);
    }

    #[test]
    fn test_swapped_signature_accepted() {
        let mut raw = TableBuilder::new().write();
        raw[0..8].copy_from_slice(&SIGNATURE_SWAPPED);
        let table = Table::new(Image::copy_from(&raw)).unwrap();
        assert!(table.is_byteswapped());
    }
}
