//! Bundle construction.

use flate2::Compression;
use flate2::write::ZlibEncoder;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use hako_gvdb::TableBuilder;

use crate::entry;
use crate::error::{ResourceError, ResourceResult};
use crate::file::path::canonicalize;
use crate::resource::Resource;
use crate::types::ResourceFlags;

struct PendingFile {
    size: u32,
    flags: ResourceFlags,
    stored: Vec<u8>,
}

/// Collects files and writes a bundle image.
///
/// Every ancestor directory of an added path is created, and `/` is always
/// present, so even an empty bundle has a root listing.
#[derive(Default)]
pub struct BundleBuilder {
    files: BTreeMap<String, PendingFile>,
}

impl BundleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `data` uncompressed under `path`.
    pub fn add(&mut self, path: &str, data: &[u8]) -> ResourceResult<&mut Self> {
        let mut stored = Vec::with_capacity(data.len() + 1);
        stored.extend_from_slice(data);
        stored.push(0);
        self.insert(path, data.len(), ResourceFlags::NONE, stored)
    }

    /// Store `data` zlib-compressed under `path`.
    pub fn add_compressed(&mut self, path: &str, data: &[u8]) -> ResourceResult<&mut Self> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
        encoder
            .write_all(data)
            .and_then(|_| encoder.flush())
            .map_err(|e| ResourceError::internal(format!("compressing {path}: {e}")))?;
        let stored = encoder
            .finish()
            .map_err(|e| ResourceError::internal(format!("compressing {path}: {e}")))?;
        self.insert(path, data.len(), ResourceFlags::COMPRESSED, stored)
    }

    fn insert(
        &mut self,
        path: &str,
        size: usize,
        flags: ResourceFlags,
        stored: Vec<u8>,
    ) -> ResourceResult<&mut Self> {
        validate_path(path)?;
        if self.files.contains_key(path) {
            return Err(ResourceError::invalid_argument(format!(
                "{path} appears multiple times in the bundle"
            )));
        }
        let size = u32::try_from(size)
            .map_err(|_| ResourceError::invalid_argument(format!("{path} is too large")))?;
        self.files.insert(
            path.to_string(),
            PendingFile {
                size,
                flags,
                stored,
            },
        );
        Ok(self)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Serialize the bundle image.
    pub fn to_bytes(&self) -> ResourceResult<Vec<u8>> {
        let mut table = TableBuilder::new();
        table.insert("/")?;

        for (path, file) in &self.files {
            if table.contains(&format!("{path}/")) {
                return Err(ResourceError::invalid_argument(format!(
                    "{path} is used both as a file and a directory"
                )));
            }
            table.insert(path)?;
            table.set_value(path, entry::encode(file.size, file.flags, &file.stored))?;
            link_parents(&mut table, path)?;
        }

        Ok(table.write())
    }

    /// Serialize and parse into a [`Resource`].
    pub fn build(&self) -> ResourceResult<Resource> {
        Resource::from_data(self.to_bytes()?)
    }

    /// Serialize and write the bundle to `path`.
    pub fn write_to(&self, path: impl AsRef<Path>) -> ResourceResult<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_bytes()?)
            .map_err(|e| ResourceError::filesystem(path.display().to_string(), e))
    }
}

fn validate_path(path: &str) -> ResourceResult<()> {
    if !path.starts_with('/') {
        return Err(ResourceError::invalid_argument(format!(
            "resource path '{path}' must start with '/'"
        )));
    }
    if path.ends_with('/') {
        return Err(ResourceError::invalid_argument(format!(
            "resource path '{path}' names a directory"
        )));
    }
    if path.contains('\0') {
        return Err(ResourceError::invalid_argument("resource path contains NUL"));
    }
    if canonicalize(path) != path {
        return Err(ResourceError::invalid_argument(format!(
            "resource path '{path}' has empty, '.' or '..' components"
        )));
    }
    Ok(())
}

/// Create and link every directory between `path` and the root.
fn link_parents(table: &mut TableBuilder, path: &str) -> ResourceResult<()> {
    let mut child = path.to_string();
    loop {
        let trimmed = child.trim_end_matches('/');
        let Some(cut) = trimmed.rfind('/') else {
            return Ok(());
        };
        let parent = child[..=cut].to_string();
        if table.contains(&parent[..parent.len().saturating_sub(1)]) && parent != "/" {
            return Err(ResourceError::invalid_argument(format!(
                "{} is used both as a file and a directory",
                &parent[..parent.len() - 1]
            )));
        }

        let existed = table.contains(&parent);
        table.insert(&parent)?;
        table.set_parent(&child, &parent)?;
        if existed || parent == "/" {
            return Ok(());
        }
        child = parent;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LookupFlags;

    #[test]
    fn test_empty_bundle_has_root() {
        let resource = BundleBuilder::new().build().unwrap();
        assert!(resource.enumerate_children("/", LookupFlags::NONE).unwrap().is_empty());
    }

    #[test]
    fn test_rejects_bad_paths() {
        let mut builder = BundleBuilder::new();
        assert!(builder.add("relative", b"x").is_err());
        assert!(builder.add("/dir/", b"x").is_err());
        builder.add("/a", b"x").unwrap();
        let err = builder.add("/a", b"y").err().unwrap();
        assert!(err.to_string().contains("appears multiple times"));
    }

    #[test]
    fn test_rejects_non_canonical_paths() {
        let mut builder = BundleBuilder::new();
        for path in ["/a//b", "/a/./b", "/a/../b", "//b", "/.", "/"] {
            assert!(
                matches!(builder.add(path, b"x"), Err(ResourceError::InvalidArgument(_))),
                "{path} accepted"
            );
            assert!(builder.add_compressed(path, b"x").is_err(), "{path} accepted");
        }
        assert!(builder.is_empty());

        builder.add("/a/.../b", b"x").unwrap();
        let resource = builder.build().unwrap();
        assert_eq!(
            resource.enumerate_children("/", LookupFlags::NONE).unwrap(),
            vec!["a/"]
        );
        assert_eq!(
            resource.enumerate_children("/a/", LookupFlags::NONE).unwrap(),
            vec![".../"]
        );
    }

    #[test]
    fn test_file_directory_conflict() {
        let mut builder = BundleBuilder::new();
        builder.add("/a", b"file").unwrap();
        builder.add("/a/b", b"child").unwrap();
        assert!(matches!(
            builder.to_bytes(),
            Err(ResourceError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_deep_tree() {
        let mut builder = BundleBuilder::new();
        builder.add("/org/example/app/ui/window.ui", b"<ui/>").unwrap();
        builder.add("/org/example/app/icons/app.png", b"png").unwrap();
        builder.add("/org/other", b"o").unwrap();
        let resource = builder.build().unwrap();

        let mut org = resource.enumerate_children("/org/", LookupFlags::NONE).unwrap();
        org.sort();
        assert_eq!(org, vec!["example/", "other"]);
        let mut app = resource
            .enumerate_children("/org/example/app/", LookupFlags::NONE)
            .unwrap();
        app.sort();
        assert_eq!(app, vec!["icons/", "ui/"]);
    }
}
