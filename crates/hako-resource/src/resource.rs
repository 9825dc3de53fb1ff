//! Reference-counted bundle handles.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use hako_gvdb::{Image, Table};

use crate::bytes::{Bytes, Pinned};
use crate::decompress::inflate;
use crate::entry::Entry;
use crate::error::{ResourceError, ResourceResult};
use crate::stream::ResourceStream;
use crate::types::{EntryInfo, LookupFlags};

pub(crate) struct ResourceInner {
    table: Table,
}

/// A parsed bundle.
///
/// Cloning is cheap and shares the bundle; the backing memory stays valid
/// while any clone, [`Bytes`] or [`ResourceStream`] obtained from it lives.
#[derive(Clone)]
pub struct Resource {
    inner: Arc<ResourceInner>,
}

impl Resource {
    fn from_image(image: Image) -> ResourceResult<Self> {
        let table = Table::new(image)?;
        Ok(Self {
            inner: Arc::new(ResourceInner { table }),
        })
    }

    /// Parse caller-owned bytes; `data` is dropped with the last reference.
    ///
    /// Misaligned buffers are copied once.
    pub fn from_data<T>(data: T) -> ResourceResult<Self>
    where
        T: AsRef<[u8]> + Send + Sync + 'static,
    {
        Self::from_image(Image::from_owner(data))
    }

    /// Parse program data without copying it (unless it is misaligned).
    pub fn from_static(data: &'static [u8]) -> ResourceResult<Self> {
        Self::from_image(Image::from_static(data))
    }

    /// Memory-map and parse the bundle file at `path`.
    pub fn load(path: impl AsRef<Path>) -> ResourceResult<Self> {
        Self::from_image(Image::map(path)?)
    }

    pub(crate) fn from_inner(inner: Arc<ResourceInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn into_inner(self) -> Arc<ResourceInner> {
        self.inner
    }

    pub(crate) fn image_bytes(&self) -> &[u8] {
        self.inner.table.image().as_slice()
    }

    /// Whether both handles refer to the same parsed bundle.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of live handles, including those pinned by bytes and streams.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    fn lookup_entry(&self, path: &str) -> ResourceResult<Entry> {
        let key = path.strip_suffix('/').unwrap_or(path);
        let table = &self.inner.table;
        let range = table
            .value_range(key)
            .ok_or_else(|| ResourceError::not_found(path))?;
        let value = &self.image_bytes()[range.clone()];
        Entry::decode(value, range.start)
            .ok_or_else(|| ResourceError::internal(format!("corrupt entry at '{path}'")))
    }

    /// Uncompressed payload range, excluding the stored NUL.
    fn plain_range(&self, path: &str, entry: &Entry) -> ResourceResult<std::ops::Range<usize>> {
        match self.image_bytes()[entry.data.clone()].last() {
            Some(0) => Ok(entry.data.start..entry.data.end - 1),
            _ => Err(ResourceError::internal(format!(
                "entry at '{path}' lacks its terminator"
            ))),
        }
    }

    /// Size and flags of the leaf at `path`.
    pub fn get_info(&self, path: &str, _flags: LookupFlags) -> ResourceResult<EntryInfo> {
        let entry = self.lookup_entry(path)?;
        Ok(EntryInfo::new(entry.size as u64, entry.flags))
    }

    /// Contents of the leaf at `path`.
    ///
    /// Uncompressed data aliases the bundle and pins this handle; compressed
    /// data is inflated into a new buffer.
    pub fn lookup_data(&self, path: &str, _flags: LookupFlags) -> ResourceResult<Bytes> {
        let entry = self.lookup_entry(path)?;
        if entry.size == 0 {
            return Ok(Bytes::empty());
        }

        if entry.is_compressed() {
            let raw = &self.image_bytes()[entry.data.clone()];
            let data = inflate(raw, entry.size as usize)?;
            return Ok(Bytes::from_terminated(data));
        }

        let range = self.plain_range(path, &entry)?;
        Ok(Bytes::pinned(Pinned::new(self.clone(), range)))
    }

    /// A reader over the leaf at `path`; the reader pins this handle.
    pub fn open_stream(&self, path: &str, _flags: LookupFlags) -> ResourceResult<ResourceStream> {
        let entry = self.lookup_entry(path)?;
        if entry.is_compressed() {
            let pinned = Pinned::new(self.clone(), entry.data.clone());
            return Ok(ResourceStream::inflate(pinned, entry.size as u64));
        }

        let range = self.plain_range(path, &entry)?;
        Ok(ResourceStream::slice(Pinned::new(self.clone(), range)))
    }

    /// Names directly under the directory `path`; sub-directories end in `/`.
    pub fn enumerate_children(&self, path: &str, _flags: LookupFlags) -> ResourceResult<Vec<String>> {
        if path.is_empty() {
            return Err(ResourceError::not_found(path));
        }

        let list = if path.ends_with('/') {
            self.inner.table.list(path)
        } else {
            self.inner.table.list(&format!("{path}/"))
        };
        list.ok_or_else(|| ResourceError::not_found(path))
    }

    /// Whether a leaf exists at `path`.
    pub fn contains(&self, path: &str) -> bool {
        self.lookup_entry(path).is_ok()
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("items", &self.inner.table.len())
            .field("image", self.inner.table.image())
            .finish()
    }
}
