//! `resource:` files.
//!
//! A [`ResourceFile`] names a canonical path in a [`Registry`] (the global
//! one by default) and answers the [`VirtualFile`] operations by asking that
//! registry. Files are cheap to create; nothing is looked up until an
//! operation runs.

mod enumerator;
mod info;
mod input;
mod monitor;
pub mod path;

pub use enumerator::ResourceFileEnumerator;
pub use info::{
    ACCESS_ATTRIBUTES, AttributeInfo, AttributeMatcher, FILESYSTEM_READONLY, FILESYSTEM_TYPE,
    FileInfo, FileType, FilesystemInfo, STANDARD_CONTENT_TYPE, STANDARD_DISPLAY_NAME,
    STANDARD_NAME, STANDARD_SIZE, STANDARD_TYPE,
};
pub use input::ResourceInputStream;
pub use monitor::FileMonitor;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::io::Read;
use std::sync::Arc;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::content_type::{ContentTypeGuesser, DIRECTORY_TYPE, DefaultGuesser, SNIFF_LEN};
use crate::error::{ResourceError, ResourceResult, check_cancelled};
use crate::ops::VirtualFile;
use crate::registry::Registry;
use crate::types::{EntryInfo, LookupFlags};

pub const URI_SCHEME: &str = "resource";

/// Characters left unescaped in the path part of a URI.
const PATH_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'!')
    .remove(b'$')
    .remove(b'&')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'+')
    .remove(b',')
    .remove(b';')
    .remove(b'=')
    .remove(b':')
    .remove(b'@')
    .remove(b'/');

/// A file in the `resource:` namespace.
///
/// Equality and hashing consider only the canonical path.
#[derive(Clone)]
pub struct ResourceFile {
    path: String,
    registry: Registry,
    guesser: Arc<dyn ContentTypeGuesser>,
}

impl ResourceFile {
    fn with_path(path: String, registry: Registry, guesser: Arc<dyn ContentTypeGuesser>) -> Self {
        Self {
            path,
            registry,
            guesser,
        }
    }

    /// A file for `path` in the global registry.
    pub fn from_path(path: &str) -> ResourceResult<Self> {
        if path.is_empty() {
            return Err(ResourceError::invalid_argument("empty resource path"));
        }
        Ok(Self::with_path(
            path::canonicalize(path),
            Registry::global().clone(),
            Arc::new(DefaultGuesser),
        ))
    }

    /// Parse `resource:<path>` or `resource://<escaped-path>`.
    pub fn from_uri(uri: &str) -> ResourceResult<Self> {
        let prefix = URI_SCHEME.len() + 1;
        let rest = match uri.get(..prefix) {
            Some(scheme) if scheme.eq_ignore_ascii_case("resource:") => &uri[prefix..],
            _ => {
                return Err(ResourceError::invalid_argument(format!(
                    "not a resource URI: {uri}"
                )));
            }
        };
        let unescaped = percent_decode_str(rest)
            .decode_utf8()
            .map_err(|_| ResourceError::invalid_argument(format!("invalid escape in {uri}")))?;
        if unescaped.contains('\0') {
            return Err(ResourceError::invalid_argument(format!(
                "resource URI contains NUL: {uri}"
            )));
        }
        Self::from_path(&format!("/{unescaped}"))
    }

    /// Answer operations from `registry` instead of the global one.
    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    /// Use `guesser` for `standard::content-type`.
    pub fn with_guesser(mut self, guesser: Arc<dyn ContentTypeGuesser>) -> Self {
        self.guesser = guesser;
        self
    }

    /// The canonical path.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn sibling(&self, path: String) -> Self {
        Self::with_path(path, self.registry.clone(), self.guesser.clone())
    }

    /// [`VirtualFile::query_info`] with a pre-parsed matcher.
    pub fn query_info_with(
        &self,
        matcher: &AttributeMatcher,
        cancel: Option<&CancellationToken>,
    ) -> ResourceResult<FileInfo> {
        check_cancelled(cancel)?;
        let entry = if self.is_directory(cancel)? {
            None
        } else {
            Some(
                self.registry
                    .get_info(&self.path, LookupFlags::NONE, cancel)?,
            )
        };

        let name = path::basename(&self.path);
        let mut info = FileInfo::default();
        if matcher.matches(STANDARD_NAME) {
            info.name = Some(name.to_string());
        }
        if matcher.matches(STANDARD_DISPLAY_NAME) {
            info.display_name = Some(name.to_string());
        }
        if matcher.matches(STANDARD_TYPE) {
            info.file_type = Some(match entry {
                Some(_) => FileType::Regular,
                None => FileType::Directory,
            });
        }
        if let Some(entry) = entry {
            if matcher.matches(STANDARD_SIZE) {
                info.size = Some(entry.size);
            }
        }
        if matcher.matches(STANDARD_CONTENT_TYPE) {
            info.content_type = Some(match entry {
                None => DIRECTORY_TYPE.to_string(),
                Some(entry) => {
                    let sniffed = self.sniff(&entry, cancel)?;
                    self.guesser.guess(name, sniffed.as_deref())
                }
            });
        }
        for attribute in ACCESS_ATTRIBUTES {
            if matcher.matches(attribute) {
                info.set_access(attribute, attribute == "access::can-read");
            }
        }
        Ok(info)
    }

    fn is_directory(&self, cancel: Option<&CancellationToken>) -> ResourceResult<bool> {
        if self.path == "/" {
            return Ok(true);
        }
        match self
            .registry
            .enumerate_children(&self.path, LookupFlags::NONE, cancel)
        {
            Ok(_) => Ok(true),
            Err(ResourceError::Cancelled) => Err(ResourceError::Cancelled),
            Err(_) => Ok(false),
        }
    }

    /// Leading bytes for content sniffing; compressed entries are not inflated.
    fn sniff(
        &self,
        entry: &EntryInfo,
        cancel: Option<&CancellationToken>,
    ) -> ResourceResult<Option<Vec<u8>>> {
        if entry.is_compressed() {
            return Ok(None);
        }
        let stream = match self.registry.open_stream(&self.path, LookupFlags::NONE, cancel) {
            Ok(stream) => stream,
            Err(ResourceError::Cancelled) => return Err(ResourceError::Cancelled),
            Err(e) => {
                trace!(path = %self.path, error = %e, "content sniffing skipped");
                return Ok(None);
            }
        };
        let mut head = Vec::with_capacity(SNIFF_LEN);
        match stream.take(SNIFF_LEN as u64).read_to_end(&mut head) {
            Ok(_) => Ok(Some(head)),
            Err(e) => {
                trace!(path = %self.path, error = %e, "content sniffing failed");
                Ok(None)
            }
        }
    }
}

impl VirtualFile for ResourceFile {
    type Input = ResourceInputStream;
    type Enumerator = ResourceFileEnumerator;

    fn uri(&self) -> String {
        format!(
            "{URI_SCHEME}://{}",
            utf8_percent_encode(&self.path, PATH_ESCAPE)
        )
    }

    fn uri_scheme(&self) -> &'static str {
        URI_SCHEME
    }

    fn is_native(&self) -> bool {
        false
    }

    fn basename(&self) -> String {
        path::basename(&self.path).to_string()
    }

    fn parent(&self) -> Option<Self> {
        path::parent(&self.path).map(|parent| self.sibling(parent.to_string()))
    }

    fn child(&self, name: &str) -> Self {
        self.sibling(path::canonicalize(&format!("{}/{name}", self.path)))
    }

    fn prefix_matches(&self, descendant: &Self) -> bool {
        path::strip_ancestor(&self.path, &descendant.path).is_some()
    }

    fn relative_path(&self, descendant: &Self) -> Option<String> {
        path::strip_ancestor(&self.path, &descendant.path).map(str::to_string)
    }

    fn resolve_relative_path(&self, relative: &str) -> Self {
        let joined = if relative.starts_with('/') {
            path::canonicalize(relative)
        } else {
            path::canonicalize(&format!("{}/{relative}", self.path))
        };
        self.sibling(joined)
    }

    fn read(&self, cancel: Option<&CancellationToken>) -> ResourceResult<ResourceInputStream> {
        let stream = self
            .registry
            .open_stream(&self.path, LookupFlags::NONE, cancel)?;
        Ok(ResourceInputStream::new(self.path.clone(), stream))
    }

    fn query_info(
        &self,
        attributes: &str,
        cancel: Option<&CancellationToken>,
    ) -> ResourceResult<FileInfo> {
        self.query_info_with(&AttributeMatcher::new(attributes), cancel)
    }

    fn query_filesystem_info(
        &self,
        attributes: &str,
        cancel: Option<&CancellationToken>,
    ) -> ResourceResult<FilesystemInfo> {
        check_cancelled(cancel)?;
        let matcher = AttributeMatcher::new(attributes);
        Ok(FilesystemInfo {
            fs_type: matcher
                .matches(FILESYSTEM_TYPE)
                .then(|| URI_SCHEME.to_string()),
            read_only: matcher.matches(FILESYSTEM_READONLY).then_some(true),
        })
    }

    fn query_settable_attributes(&self) -> Vec<AttributeInfo> {
        Vec::new()
    }

    fn query_writable_namespaces(&self) -> Vec<AttributeInfo> {
        Vec::new()
    }

    fn monitor_file(&self, cancel: Option<&CancellationToken>) -> ResourceResult<FileMonitor> {
        check_cancelled(cancel)?;
        Ok(FileMonitor::new())
    }

    fn enumerate_children(
        &self,
        attributes: &str,
        cancel: Option<&CancellationToken>,
    ) -> ResourceResult<ResourceFileEnumerator> {
        let names = match self
            .registry
            .enumerate_children(&self.path, LookupFlags::NONE, cancel)
        {
            Ok(names) => names,
            Err(ResourceError::NotFound(_)) => {
                return match self.registry.get_info(&self.path, LookupFlags::NONE, cancel) {
                    Ok(_) => Err(ResourceError::not_directory(&self.path)),
                    Err(e) => Err(e),
                };
            }
            Err(e) => return Err(e),
        };
        Ok(ResourceFileEnumerator::new(
            self.clone(),
            names,
            AttributeMatcher::new(attributes),
            cancel.cloned(),
        ))
    }
}

impl PartialEq for ResourceFile {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for ResourceFile {}

impl Hash for ResourceFile {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

impl fmt::Debug for ResourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceFile")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for ResourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri())
    }
}
