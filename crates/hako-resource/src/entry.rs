//! Leaf payload encoding.
//!
//! Each leaf value is a `(uuay)` tuple wrapped as a variant: uncompressed
//! size, flags, then the stored bytes. Uncompressed data carries one extra
//! NUL that is not part of the logical size.

use std::ops::Range;

use hako_gvdb::variant::{self, Variant};

use crate::types::ResourceFlags;

pub(crate) const ENTRY_TYPE: &str = "(uuay)";

/// A decoded leaf, with `data` as absolute offsets into the bundle image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Entry {
    pub size: u32,
    pub flags: ResourceFlags,
    pub data: Range<usize>,
}

impl Entry {
    /// Decode the serialized value found at `offset` in the image.
    pub fn decode(value: &[u8], offset: usize) -> Option<Self> {
        let variant = Variant::parse(value)?;
        if variant.type_string != ENTRY_TYPE || variant.body.len() < 8 {
            return None;
        }
        let body = variant.body;
        let size = u32::from_le_bytes([body[0], body[1], body[2], body[3]]);
        let flags = u32::from_le_bytes([body[4], body[5], body[6], body[7]]);
        Some(Self {
            size,
            flags: ResourceFlags::from_bits_retain(flags),
            data: offset + 8..offset + body.len(),
        })
    }

    pub fn is_compressed(&self) -> bool {
        self.flags.is_compressed()
    }
}

/// Serialize a leaf. `data` must already include the NUL for uncompressed entries.
pub(crate) fn encode(size: u32, flags: ResourceFlags, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(8 + data.len());
    body.extend_from_slice(&size.to_le_bytes());
    body.extend_from_slice(&flags.bits().to_le_bytes());
    body.extend_from_slice(data);
    variant::wrap(ENTRY_TYPE, &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let raw = encode(5, ResourceFlags::NONE, b"hello\0");
        assert_eq!(&raw[0..4], &5u32.to_le_bytes());
        assert_eq!(&raw[4..8], &0u32.to_le_bytes());
        assert_eq!(&raw[8..14], b"hello\0");
        assert_eq!(&raw[14..], b"\0(uuay)");

        let entry = Entry::decode(&raw, 64).unwrap();
        assert_eq!(entry.size, 5);
        assert_eq!(entry.data, 72..78);
        assert!(!entry.is_compressed());
    }

    #[test]
    fn test_decode_rejects_other_types() {
        let raw = variant::wrap("(uu)", &[0u8; 8]);
        assert_eq!(Entry::decode(&raw, 0), None);

        let short = variant::wrap(ENTRY_TYPE, &[0u8; 7]);
        assert_eq!(Entry::decode(&short, 0), None);
    }
}
