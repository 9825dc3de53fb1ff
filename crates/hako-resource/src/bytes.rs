//! Byte buffers handed out by lookups.
//!
//! [`Bytes`] has one shape whatever the storage: a slice pinned into a
//! bundle (keeping the [`Resource`] alive), a freshly inflated buffer, or
//! a static constant. The logical contents are always followed by a NUL
//! that is not counted in [`Bytes::len`].

use std::fmt;
use std::ops::{Deref, Range};
use std::sync::Arc;

use crate::resource::Resource;

/// A byte range inside a bundle image that keeps the bundle alive.
#[derive(Clone)]
pub(crate) struct Pinned {
    resource: Resource,
    range: Range<usize>,
}

impl Pinned {
    pub fn new(resource: Resource, range: Range<usize>) -> Self {
        Self { resource, range }
    }

    /// The range extended by one byte, which the caller knows to be in bounds.
    fn with_trailer(&self) -> &[u8] {
        &self.resource.image_bytes()[self.range.start..self.range.end + 1]
    }
}

impl AsRef<[u8]> for Pinned {
    fn as_ref(&self) -> &[u8] {
        &self.resource.image_bytes()[self.range.clone()]
    }
}

#[derive(Clone)]
enum Repr {
    /// Includes the trailing NUL.
    Static(&'static [u8]),
    /// The byte after the range is a NUL inside the image.
    Pinned(Pinned),
    /// Includes the trailing NUL.
    Owned(Arc<[u8]>),
}

/// Immutable, cheaply clonable, NUL-terminated bytes.
#[derive(Clone)]
pub struct Bytes {
    repr: Repr,
}

impl Bytes {
    /// Zero-length bytes.
    pub fn empty() -> Self {
        Self {
            repr: Repr::Static(b"\0"),
        }
    }

    /// Take ownership of `data`, appending the terminating NUL.
    pub fn from_vec(mut data: Vec<u8>) -> Self {
        data.push(0);
        Self {
            repr: Repr::Owned(data.into()),
        }
    }

    /// Adopt a buffer whose last byte is already the terminating NUL.
    pub(crate) fn from_terminated(data: Vec<u8>) -> Self {
        debug_assert_eq!(data.last(), Some(&0));
        Self {
            repr: Repr::Owned(data.into()),
        }
    }

    /// Alias `range` of the resource image. The byte after `range` must be NUL.
    pub(crate) fn pinned(pinned: Pinned) -> Self {
        Self {
            repr: Repr::Pinned(pinned),
        }
    }

    /// Logical contents, without the trailing NUL.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        let full = self.as_slice_with_nul();
        &full[..full.len() - 1]
    }

    /// Contents including the trailing NUL, suitable as a C string buffer.
    #[inline]
    pub fn as_slice_with_nul(&self) -> &[u8] {
        match &self.repr {
            Repr::Static(data) => data,
            Repr::Pinned(pinned) => pinned.with_trailer(),
            Repr::Owned(data) => data,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether these bytes alias bundle memory rather than owning a copy.
    pub fn is_pinned(&self) -> bool {
        matches!(self.repr, Repr::Pinned(_))
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.as_slice().to_vec()
    }
}

impl Deref for Bytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl AsRef<[u8]> for Bytes {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl PartialEq for Bytes {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for Bytes {}

impl PartialEq<[u8]> for Bytes {
    fn eq(&self, other: &[u8]) -> bool {
        self.as_slice() == other
    }
}

impl PartialEq<&[u8]> for Bytes {
    fn eq(&self, other: &&[u8]) -> bool {
        self.as_slice() == *other
    }
}

impl<const N: usize> PartialEq<&[u8; N]> for Bytes {
    fn eq(&self, other: &&[u8; N]) -> bool {
        self.as_slice() == &other[..]
    }
}

impl PartialEq<Vec<u8>> for Bytes {
    fn eq(&self, other: &Vec<u8>) -> bool {
        self.as_slice() == &other[..]
    }
}

impl fmt::Debug for Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bytes")
            .field("len", &self.len())
            .field("pinned", &self.is_pinned())
            .finish()
    }
}
