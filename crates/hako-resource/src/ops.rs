//! Generic file operations trait.
//!
//! Code written against [`VirtualFile`] can consume `resource:` files the
//! same way it consumes any other backend. All operations are synchronous
//! and path-based; long-running ones take an optional cancellation token.

use tokio_util::sync::CancellationToken;

use crate::error::ResourceResult;
use crate::file::{AttributeInfo, FileInfo, FileMonitor, FilesystemInfo};

/// Read-only file abstraction.
pub trait VirtualFile: Sized {
    /// Reader returned by [`read`](Self::read).
    type Input: std::io::Read;
    /// Iterator returned by [`enumerate_children`](Self::enumerate_children).
    type Enumerator: Iterator<Item = ResourceResult<FileInfo>>;

    // ========================================================================
    // Naming
    // ========================================================================

    /// Canonical URI of this file.
    fn uri(&self) -> String;

    fn uri_scheme(&self) -> &'static str;

    /// Case-insensitive scheme comparison.
    fn has_uri_scheme(&self, scheme: &str) -> bool {
        self.uri_scheme().eq_ignore_ascii_case(scheme)
    }

    /// Whether the file lives on a local filesystem.
    fn is_native(&self) -> bool;

    /// Last path component, unescaped.
    fn basename(&self) -> String;

    // ========================================================================
    // Path arithmetic
    // ========================================================================

    /// `None` at the root.
    fn parent(&self) -> Option<Self>;

    fn child(&self, name: &str) -> Self;

    /// Whether `descendant` lies strictly below this file.
    fn prefix_matches(&self, descendant: &Self) -> bool {
        self.relative_path(descendant).is_some()
    }

    /// Path of `descendant` relative to this file.
    fn relative_path(&self, descendant: &Self) -> Option<String>;

    /// Resolve `relative` against this file; absolute paths replace it.
    fn resolve_relative_path(&self, relative: &str) -> Self;

    // ========================================================================
    // Reading
    // ========================================================================

    fn read(&self, cancel: Option<&CancellationToken>) -> ResourceResult<Self::Input>;

    /// Metadata selected by `attributes` (see [`AttributeMatcher`](crate::AttributeMatcher)).
    fn query_info(
        &self,
        attributes: &str,
        cancel: Option<&CancellationToken>,
    ) -> ResourceResult<FileInfo>;

    fn query_filesystem_info(
        &self,
        attributes: &str,
        cancel: Option<&CancellationToken>,
    ) -> ResourceResult<FilesystemInfo>;

    fn query_settable_attributes(&self) -> Vec<AttributeInfo>;

    fn query_writable_namespaces(&self) -> Vec<AttributeInfo>;

    fn monitor_file(&self, cancel: Option<&CancellationToken>) -> ResourceResult<FileMonitor>;

    /// Info for each child of this directory.
    fn enumerate_children(
        &self,
        attributes: &str,
        cancel: Option<&CancellationToken>,
    ) -> ResourceResult<Self::Enumerator>;
}
