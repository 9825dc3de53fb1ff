//! Filesystem overlays for resource prefixes.
//!
//! `RESOURCE_OVERLAYS=/org/app/ui=/home/dev/app/ui:/org/app/css=/tmp/css`
//! makes lookups under `/org/app/ui` try `/home/dev/app/ui` first, so files
//! can be edited without rebuilding the bundle. The variable is read once
//! per registry and ignored when the process runs with elevated privileges.
//!
//! Prefix matching follows mount-table rules: a prefix matches itself and
//! anything below it, never a sibling that merely shares leading characters.

mod probe;

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::bytes::Bytes;
use crate::error::ResourceResult;
use crate::stream::ResourceStream;
use crate::types::EntryInfo;

/// Environment variable holding the overlay list.
pub const OVERLAY_ENV: &str = "RESOURCE_OVERLAYS";

#[cfg(windows)]
const SEPARATOR: char = ';';
#[cfg(not(windows))]
const SEPARATOR: char = ':';

/// One `<resource-prefix>=<filesystem-dir>` mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overlay {
    prefix: String,
    dir: PathBuf,
}

impl Overlay {
    /// Validate a mapping; returns the reason it was rejected otherwise.
    pub fn new(prefix: &str, dir: impl Into<PathBuf>) -> Result<Self, String> {
        let dir = dir.into();
        if prefix.is_empty() {
            return Err("empty resource path".into());
        }
        if dir.as_os_str().is_empty() {
            return Err("empty filesystem path".into());
        }
        if !prefix.starts_with('/') {
            return Err("resource path must be absolute".into());
        }
        if prefix.ends_with('/') {
            return Err("resource path must not end with '/'".into());
        }
        if !dir.is_absolute() {
            return Err("filesystem path must be absolute".into());
        }
        Ok(Self {
            prefix: prefix.to_string(),
            dir,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Filesystem path standing in for `path`, if this overlay covers it.
    ///
    /// Paths with a `..` component below the prefix are never mapped.
    pub fn candidate(&self, path: &str) -> Option<PathBuf> {
        let rest = path.strip_prefix(&self.prefix)?;
        if !rest.is_empty() && !rest.starts_with('/') {
            return None;
        }
        if rest.split('/').any(|component| component == "..") {
            return None;
        }
        let mut candidate = OsString::from(self.dir.as_os_str());
        candidate.push(rest);
        Some(PathBuf::from(candidate))
    }
}

/// Ordered overlay mappings; the first match wins for point lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverlayTable {
    overlays: Vec<Overlay>,
}

impl OverlayTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Read [`OVERLAY_ENV`] from the process environment.
    pub fn from_env() -> Self {
        let value = std::env::var_os(OVERLAY_ENV);
        let value = match value.as_deref().map(|v| v.to_str()) {
            Some(Some(value)) => Some(value),
            Some(None) => {
                warn!("{OVERLAY_ENV} is not valid UTF-8; ignoring it");
                None
            }
            None => None,
        };
        Self::from_env_value(value, is_privileged())
    }

    /// Build from a raw variable value, honoring the privilege check.
    pub fn from_env_value(value: Option<&str>, privileged: bool) -> Self {
        match value {
            Some(_) if privileged => {
                warn!("{OVERLAY_ENV} ignored: process runs with elevated privileges");
                Self::empty()
            }
            Some(value) => Self::parse(value),
            None => Self::empty(),
        }
    }

    /// Parse a separator-delimited list; invalid segments are logged and dropped.
    pub fn parse(value: &str) -> Self {
        let mut overlays = Vec::new();
        for segment in value.split(SEPARATOR) {
            let Some((prefix, dir)) = segment.split_once('=') else {
                warn!(segment, "{OVERLAY_ENV} segment lacks '='; ignoring");
                continue;
            };
            match Overlay::new(prefix, dir) {
                Ok(overlay) => {
                    info!(prefix, dir, "adding resource overlay");
                    overlays.push(overlay);
                }
                Err(reason) => warn!(segment, "{OVERLAY_ENV} segment ignored: {reason}"),
            }
        }
        Self { overlays }
    }

    pub fn push(&mut self, overlay: Overlay) {
        self.overlays.push(overlay);
    }

    pub fn is_empty(&self) -> bool {
        self.overlays.is_empty()
    }

    pub fn len(&self) -> usize {
        self.overlays.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Overlay> {
        self.overlays.iter()
    }

    fn candidates<'a>(&'a self, path: &'a str) -> impl Iterator<Item = PathBuf> + 'a {
        self.overlays.iter().filter_map(move |overlay| overlay.candidate(path))
    }

    /// Open the first overlay file for `path`.
    pub(crate) fn open_stream(
        &self,
        path: &str,
        cancel: Option<&CancellationToken>,
    ) -> ResourceResult<Option<ResourceStream>> {
        for candidate in self.candidates(path) {
            if let Some(file) = probe::open(&candidate, cancel)? {
                return Ok(Some(ResourceStream::file(file)));
            }
        }
        Ok(None)
    }

    /// Read the first overlay file for `path`.
    pub(crate) fn lookup_data(
        &self,
        path: &str,
        cancel: Option<&CancellationToken>,
    ) -> ResourceResult<Option<Bytes>> {
        for candidate in self.candidates(path) {
            if let Some(data) = probe::read(&candidate, cancel)? {
                return Ok(Some(Bytes::from_vec(data)));
            }
        }
        Ok(None)
    }

    /// `stat` the first overlay file for `path`.
    pub(crate) fn get_info(
        &self,
        path: &str,
        cancel: Option<&CancellationToken>,
    ) -> ResourceResult<Option<EntryInfo>> {
        for candidate in self.candidates(path) {
            if let Some(info) = probe::stat(&candidate, cancel)? {
                return Ok(Some(info));
            }
        }
        Ok(None)
    }

    /// Add names from every overlay directory for `path` to `names`.
    ///
    /// Returns whether any overlay directory could be listed.
    pub(crate) fn enumerate_children(
        &self,
        path: &str,
        names: &mut HashSet<String>,
        cancel: Option<&CancellationToken>,
    ) -> ResourceResult<bool> {
        let mut found = false;
        for candidate in self.candidates(path) {
            found |= probe::list(&candidate, names, cancel)?;
        }
        Ok(found)
    }
}

/// Whether the process runs with a real id different from its effective id.
#[cfg(unix)]
pub fn is_privileged() -> bool {
    use rustix::process::{getegid, geteuid, getgid, getuid};
    getuid() != geteuid() || getgid() != getegid()
}

#[cfg(not(unix))]
pub fn is_privileged() -> bool {
    false
}
