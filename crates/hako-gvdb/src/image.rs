//! Backing storage for a GVDB image.
//!
//! The reader requires the image to start at a pointer-aligned address.
//! Static and caller-owned buffers that are not aligned are copied once into
//! an 8-aligned allocation; mapped files are page-aligned already.

use memmap2::Mmap;
use std::fmt;
use std::fs::File;
use std::path::Path;

use crate::error::{GvdbError, GvdbResult};

/// Alignment every image is guaranteed to have.
pub const IMAGE_ALIGN: usize = align_of::<u64>();

/// An immutable byte image, owned or borrowed for `'static`.
pub struct Image {
    repr: Repr,
}

enum Repr {
    Static(&'static [u8]),
    Mapped(Mmap),
    Shared(Box<dyn AsRef<[u8]> + Send + Sync>),
    Aligned(AlignedBuf),
}

impl Image {
    /// Wrap program data. Misaligned data is copied.
    pub fn from_static(data: &'static [u8]) -> Self {
        let repr = if is_aligned(data) {
            Repr::Static(data)
        } else {
            Repr::Aligned(AlignedBuf::copy_from(data))
        };
        Self { repr }
    }

    /// Take ownership of caller bytes; `owner` is dropped together with the image.
    ///
    /// When the bytes are misaligned they are copied and `owner` is released
    /// immediately.
    pub fn from_owner<T>(owner: T) -> Self
    where
        T: AsRef<[u8]> + Send + Sync + 'static,
    {
        // Inline owners move into the box, so alignment is checked afterwards.
        let boxed: Box<dyn AsRef<[u8]> + Send + Sync> = Box::new(owner);
        let repr = if is_aligned((*boxed).as_ref()) {
            Repr::Shared(boxed)
        } else {
            Repr::Aligned(AlignedBuf::copy_from((*boxed).as_ref()))
        };
        Self { repr }
    }

    /// Copy `data` into a fresh aligned allocation.
    pub fn copy_from(data: &[u8]) -> Self {
        Self {
            repr: Repr::Aligned(AlignedBuf::copy_from(data)),
        }
    }

    /// Memory-map the file at `path` read-only.
    pub fn map(path: impl AsRef<Path>) -> GvdbResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| GvdbError::io(path, e))?;
        let len = file.metadata().map_err(|e| GvdbError::io(path, e))?.len();

        // Zero-length maps are rejected by some kernels; an empty image is
        // reported as corrupt by the reader instead.
        if len == 0 {
            return Ok(Self::copy_from(&[]));
        }

        // SAFETY: the map is read-only and private to this image. Bundles are
        // immutable build artifacts; truncating one underneath a running
        // process is outside what the reader can defend against.
        let map = unsafe { Mmap::map(&file) }.map_err(|e| GvdbError::io(path, e))?;
        tracing::debug!(path = %path.display(), len, "mapped gvdb image");
        Ok(Self {
            repr: Repr::Mapped(map),
        })
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        match &self.repr {
            Repr::Static(data) => data,
            Repr::Mapped(map) => map,
            Repr::Shared(owner) => (**owner).as_ref(),
            Repr::Aligned(buf) => buf.as_slice(),
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

    /// Whether the image aliases memory it did not allocate itself.
    pub fn is_borrowed(&self) -> bool {
        matches!(self.repr, Repr::Static(_) | Repr::Shared(_))
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self.repr, Repr::Mapped(_))
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.repr {
            Repr::Static(_) => "static",
            Repr::Mapped(_) => "mapped",
            Repr::Shared(_) => "shared",
            Repr::Aligned(_) => "aligned-copy",
        };
        f.debug_struct("Image")
            .field("kind", &kind)
            .field("len", &self.len())
            .finish()
    }
}

fn is_aligned(data: &[u8]) -> bool {
    (data.as_ptr() as usize) % IMAGE_ALIGN == 0
}

/// Bytes stored in `u64` words so the start is always 8-aligned.
struct AlignedBuf {
    words: Vec<u64>,
    len: usize,
}

impl AlignedBuf {
    fn copy_from(data: &[u8]) -> Self {
        let mut words = vec![0u64; data.len().div_ceil(8)];
        for (word, chunk) in words.iter_mut().zip(data.chunks(8)) {
            let mut raw = [0u8; 8];
            raw[..chunk.len()].copy_from_slice(chunk);
            *word = u64::from_ne_bytes(raw);
        }
        Self {
            words,
            len: data.len(),
        }
    }

    fn as_slice(&self) -> &[u8] {
        // SAFETY: `words` owns at least `len` initialized bytes and u8 has no
        // alignment requirement; the borrow is tied to `self`.
        unsafe { std::slice::from_raw_parts(self.words.as_ptr().cast::<u8>(), self.len) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Shifted(Vec<u8>);

    impl AsRef<[u8]> for Shifted {
        fn as_ref(&self) -> &[u8] {
            &self.0[1..]
        }
    }

    #[test]
    fn test_misaligned_owner_is_copied() {
        let backing: Vec<u8> = (0u8..64).collect();
        let expected = backing[1..].to_vec();
        assert_eq!(backing.as_ptr() as usize % IMAGE_ALIGN, 0);

        let image = Image::from_owner(Shifted(backing));
        assert_eq!(image.as_slice(), &expected[..]);
        assert_eq!(image.as_slice().as_ptr() as usize % IMAGE_ALIGN, 0);
        assert!(!image.is_borrowed());
    }

    #[test]
    fn test_aligned_owner_is_borrowed() {
        let backing: Vec<u8> = vec![1, 2, 3, 4, 5, 6, 7, 8, 9];
        let ptr = backing.as_ptr();
        let image = Image::from_owner(backing);
        assert!(image.is_borrowed());
        assert_eq!(image.as_slice().as_ptr(), ptr);
    }

    #[test]
    fn test_inline_owner_checked_after_move() {
        #[repr(C, align(8))]
        struct Inline {
            pad: u8,
            bytes: [u8; 16],
        }

        impl AsRef<[u8]> for Inline {
            fn as_ref(&self) -> &[u8] {
                &self.bytes[..]
            }
        }

        let inline = Inline {
            pad: 0,
            bytes: [3u8; 16],
        };
        assert_eq!(inline.pad, 0);
        let image = Image::from_owner(inline);
        assert_eq!(image.as_slice(), &[3u8; 16]);
        assert_eq!(image.as_slice().as_ptr() as usize % IMAGE_ALIGN, 0);
        assert!(!image.is_borrowed());

        let image = Image::from_owner([5u8; 24]);
        assert_eq!(image.as_slice(), &[5u8; 24]);
        assert_eq!(image.as_slice().as_ptr() as usize % IMAGE_ALIGN, 0);
    }

    #[test]
    fn test_static_alignment() {
        #[repr(C, align(8))]
        struct Aligned([u8; 16]);
        static DATA: Aligned = Aligned([7u8; 16]);

        let aligned = Image::from_static(&DATA.0);
        assert!(aligned.is_borrowed());
        assert_eq!(aligned.len(), 16);

        let misaligned = Image::from_static(&DATA.0[1..]);
        assert!(!misaligned.is_borrowed());
        assert_eq!(misaligned.as_slice(), &DATA.0[1..]);
    }

    #[test]
    fn test_map_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"GVariant").unwrap();
        let image = Image::map(file.path()).unwrap();
        assert!(image.is_mapped());
        assert_eq!(image.as_slice(), b"GVariant");
    }

    #[test]
    fn test_map_empty_and_missing() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let image = Image::map(file.path()).unwrap();
        assert!(image.is_empty());

        let err = Image::map("/nonexistent/hako/bundle").unwrap_err();
        assert!(matches!(err, GvdbError::Io { .. }));
    }
}
