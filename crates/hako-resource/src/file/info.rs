//! Metadata records returned by the file adapter.

use std::fmt;

pub const STANDARD_NAME: &str = "standard::name";
pub const STANDARD_DISPLAY_NAME: &str = "standard::display-name";
pub const STANDARD_TYPE: &str = "standard::type";
pub const STANDARD_SIZE: &str = "standard::size";
pub const STANDARD_CONTENT_TYPE: &str = "standard::content-type";
pub const FILESYSTEM_TYPE: &str = "filesystem::type";
pub const FILESYSTEM_READONLY: &str = "filesystem::readonly";

/// `access::*` attributes in the order they are reported.
pub const ACCESS_ATTRIBUTES: [&str; 6] = [
    "access::can-read",
    "access::can-write",
    "access::can-execute",
    "access::can-delete",
    "access::can-trash",
    "access::can-rename",
];

/// Kind of node behind a resource path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// A leaf entry.
    Regular,
    /// A node with children.
    Directory,
}

impl FileType {
    pub fn is_file(&self) -> bool {
        matches!(self, FileType::Regular)
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }
}

/// Metadata for one resource file. Fields not requested by the caller's
/// [`AttributeMatcher`] are left unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileInfo {
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub file_type: Option<FileType>,
    /// Uncompressed size; only set for regular files.
    pub size: Option<u64>,
    pub content_type: Option<String>,
    access: Vec<(&'static str, bool)>,
}

impl FileInfo {
    /// Record an `access::*` attribute.
    pub fn set_access(&mut self, attribute: &'static str, value: bool) {
        match self.access.iter_mut().find(|(name, _)| *name == attribute) {
            Some(slot) => slot.1 = value,
            None => self.access.push((attribute, value)),
        }
    }

    /// Value of an `access::*` attribute, if it was requested.
    pub fn access(&self, attribute: &str) -> Option<bool> {
        self.access
            .iter()
            .find(|(name, _)| *name == attribute)
            .map(|(_, value)| *value)
    }

    pub fn can_read(&self) -> bool {
        self.access("access::can-read").unwrap_or(false)
    }

    pub fn can_write(&self) -> bool {
        self.access("access::can-write").unwrap_or(false)
    }

    pub fn is_dir(&self) -> bool {
        self.file_type.is_some_and(|t| t.is_dir())
    }
}

/// Attributes of the filesystem that holds a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilesystemInfo {
    pub fs_type: Option<String>,
    pub read_only: Option<bool>,
}

/// Describes a settable attribute. Resource files have none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeInfo {
    pub name: String,
}

/// Selects attributes by a comma-separated list of `ns::name`, `ns::*` or `*`.
#[derive(Clone, PartialEq, Eq)]
pub struct AttributeMatcher {
    all: bool,
    namespaces: Vec<String>,
    names: Vec<String>,
}

impl AttributeMatcher {
    pub fn new(attributes: &str) -> Self {
        let mut matcher = Self {
            all: false,
            namespaces: Vec::new(),
            names: Vec::new(),
        };
        for item in attributes.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            if item == "*" {
                matcher.all = true;
            } else if let Some(ns) = item.strip_suffix("::*") {
                matcher.namespaces.push(ns.to_string());
            } else {
                matcher.names.push(item.to_string());
            }
        }
        matcher
    }

    /// A matcher selecting every attribute.
    pub fn all() -> Self {
        Self::new("*")
    }

    pub fn matches(&self, attribute: &str) -> bool {
        if self.all || self.names.iter().any(|n| n == attribute) {
            return true;
        }
        match attribute.split_once("::") {
            Some((ns, _)) => self.namespaces.iter().any(|n| n == ns),
            None => false,
        }
    }

    /// Whether any attribute in namespace `ns` could match.
    pub fn enumerates_namespace(&self, ns: &str) -> bool {
        self.all
            || self.namespaces.iter().any(|n| n == ns)
            || self
                .names
                .iter()
                .any(|n| n.split_once("::").is_some_and(|(prefix, _)| prefix == ns))
    }
}

impl fmt::Debug for AttributeMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.all {
            return f.write_str("AttributeMatcher(*)");
        }
        let items: Vec<String> = self
            .namespaces
            .iter()
            .map(|ns| format!("{ns}::*"))
            .chain(self.names.iter().cloned())
            .collect();
        write!(f, "AttributeMatcher({})", items.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matcher_forms() {
        let matcher = AttributeMatcher::new("standard::*, access::can-read");
        assert!(matcher.matches(STANDARD_SIZE));
        assert!(matcher.matches("access::can-read"));
        assert!(!matcher.matches("access::can-write"));
        assert!(matcher.enumerates_namespace("access"));
        assert!(!matcher.enumerates_namespace("filesystem"));

        let all = AttributeMatcher::all();
        assert!(all.matches(FILESYSTEM_TYPE));

        let none = AttributeMatcher::new("");
        assert!(!none.matches(STANDARD_NAME));
    }

    #[test]
    fn test_access_slots() {
        let mut info = FileInfo::default();
        assert!(!info.can_read());
        assert_eq!(info.access("access::can-read"), None);
        info.set_access("access::can-read", true);
        info.set_access("access::can-write", false);
        assert!(info.can_read());
        assert_eq!(info.access("access::can-write"), Some(false));
    }
}
