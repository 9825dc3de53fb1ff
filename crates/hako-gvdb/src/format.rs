//! On-disk layout of a GVDB image.
//!
//! Every multi-byte field is little-endian. The image starts with a fixed
//! 24-byte header whose root pointer names the top-level hash table:
//!
//! ```text
//! header      signature[8] version:u32 options:u32 root:{start:u32 end:u32}
//! hash table  bloom_hdr:u32 n_buckets:u32 bloom[n] buckets[n_buckets] items[..]
//! hash item   hash:u32 parent:u32 key_start:u32 key_size:u16 type:u8 unused:u8
//!             value:{start:u32 end:u32}
//! ```

use std::ops::Range;

pub const HEADER_SIZE: usize = 24;
pub const HASH_ITEM_SIZE: usize = 24;

/// `"GVar" "iant"` as two little-endian words.
pub const SIGNATURE: [u8; 8] = *b"GVariant";
/// The signature as written by a big-endian producer that byteswapped its values.
pub const SIGNATURE_SWAPPED: [u8; 8] = *b"raVGtnai";

/// Parent index of an item that hangs off the table itself.
pub const NO_PARENT: u32 = u32::MAX;

/// The bloom header keeps the word count in its low 27 bits.
pub const BLOOM_WORDS_MASK: u32 = (1 << 27) - 1;
pub const BLOOM_SHIFT_BITS: u32 = 27;

/// Alignment of hash tables and child lists.
pub const TABLE_ALIGN: usize = 4;
/// Alignment of serialized values.
pub const VALUE_ALIGN: usize = 8;

/// Item type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    /// `'v'`: a serialized value.
    Value,
    /// `'L'`: a list of child item indices.
    List,
    /// `'H'`: a nested hash table.
    Table,
    /// Anything else, including the zeroed tag of an item with no payload.
    Other(u8),
}

impl ItemKind {
    pub fn from_tag(tag: u8) -> Self {
        match tag {
            b'v' => Self::Value,
            b'L' => Self::List,
            b'H' => Self::Table,
            other => Self::Other(other),
        }
    }

    pub fn tag(self) -> u8 {
        match self {
            Self::Value => b'v',
            Self::List => b'L',
            Self::Table => b'H',
            Self::Other(tag) => tag,
        }
    }
}

/// A `{start, end}` byte range inside the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pointer {
    pub start: u32,
    pub end: u32,
}

impl Pointer {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start: start as u32,
            end: end as u32,
        }
    }

    /// Resolve against an image of `len` bytes.
    ///
    /// Fails when the range is inverted, runs past the image or `start` is not
    /// a multiple of `align`.
    pub fn resolve(&self, len: usize, align: usize) -> Option<Range<usize>> {
        let start = self.start as usize;
        let end = self.end as usize;
        if start > end || end > len || start & (align - 1) != 0 {
            return None;
        }
        Some(start..end)
    }

    pub fn read(bytes: &[u8], at: usize) -> Option<Self> {
        Some(Self {
            start: le_u32(bytes, at)?,
            end: le_u32(bytes, at + 4)?,
        })
    }

    pub fn write(&self, out: &mut [u8]) {
        out[0..4].copy_from_slice(&self.start.to_le_bytes());
        out[4..8].copy_from_slice(&self.end.to_le_bytes());
    }
}

/// A decoded 24-byte hash item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashItem {
    pub hash_value: u32,
    pub parent: u32,
    pub key_start: u32,
    pub key_size: u16,
    pub kind: ItemKind,
    pub value: Pointer,
}

impl HashItem {
    pub fn read(bytes: &[u8], at: usize) -> Option<Self> {
        let raw = bytes.get(at..at + HASH_ITEM_SIZE)?;
        Some(Self {
            hash_value: le_u32(raw, 0)?,
            parent: le_u32(raw, 4)?,
            key_start: le_u32(raw, 8)?,
            key_size: u16::from_le_bytes([raw[12], raw[13]]),
            kind: ItemKind::from_tag(raw[14]),
            value: Pointer::read(raw, 16)?,
        })
    }

    pub fn write(&self, out: &mut [u8]) {
        out[0..4].copy_from_slice(&self.hash_value.to_le_bytes());
        out[4..8].copy_from_slice(&self.parent.to_le_bytes());
        out[8..12].copy_from_slice(&self.key_start.to_le_bytes());
        out[12..14].copy_from_slice(&self.key_size.to_le_bytes());
        out[14] = self.kind.tag();
        out[15] = 0;
        self.value.write(&mut out[16..24]);
    }

    pub fn key_range(&self) -> Range<usize> {
        let start = self.key_start as usize;
        start..start + self.key_size as usize
    }
}

/// djb2 over the key bytes, each byte sign-extended before the add.
pub fn djb_hash(key: &[u8]) -> u32 {
    key.iter().fold(5381u32, |hash, &byte| {
        hash.wrapping_mul(33).wrapping_add(byte as i8 as u32)
    })
}

pub fn le_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let raw = bytes.get(at..at.checked_add(4)?)?;
    Some(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_djb_hash_known_values() {
        assert_eq!(djb_hash(b""), 5381);
        assert_eq!(djb_hash(b"/"), 5381 * 33 + b'/' as u32);
        // high bytes are sign extended
        let expected = 5381u32.wrapping_mul(33).wrapping_add(0xffff_ffc3);
        assert_eq!(djb_hash(&[0xc3]), expected);
    }

    #[test]
    fn test_pointer_resolve() {
        let p = Pointer { start: 8, end: 16 };
        assert_eq!(p.resolve(16, 8), Some(8..16));
        assert_eq!(p.resolve(15, 8), None);

        let misaligned = Pointer { start: 6, end: 10 };
        assert_eq!(misaligned.resolve(32, 4), None);
        assert_eq!(misaligned.resolve(32, 1), Some(6..10));

        let inverted = Pointer { start: 12, end: 8 };
        assert_eq!(inverted.resolve(32, 4), None);
    }

    #[test]
    fn test_hash_item_layout() {
        let item = HashItem {
            hash_value: 0x0102_0304,
            parent: NO_PARENT,
            key_start: 40,
            key_size: 3,
            kind: ItemKind::List,
            value: Pointer { start: 44, end: 52 },
        };
        let mut raw = [0u8; HASH_ITEM_SIZE];
        item.write(&mut raw);
        assert_eq!(&raw[0..4], &[4, 3, 2, 1]);
        assert_eq!(raw[14], b'L');
        assert_eq!(HashItem::read(&raw, 0), Some(item));
        assert_eq!(item.key_range(), 40..43);
    }
}
