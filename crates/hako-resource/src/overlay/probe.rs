//! Filesystem probes behind overlay lookups.
//!
//! Each probe answers `Ok(None)` when the candidate does not serve the
//! request, so the caller moves on to the next overlay. Missing files are
//! silent; other failures are logged.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io;
use std::path::Path;

use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use crate::error::{ResourceResult, check_cancelled};
use crate::types::{EntryInfo, ResourceFlags};

fn report(candidate: &Path, op: &str, err: &io::Error) {
    if err.kind() == io::ErrorKind::NotFound {
        trace!(path = %candidate.display(), op, "no overlay file");
    } else {
        warn!(path = %candidate.display(), op, error = %err, "overlay probe failed");
    }
}

pub(super) fn open(candidate: &Path, cancel: Option<&CancellationToken>) -> ResourceResult<Option<File>> {
    check_cancelled(cancel)?;
    let file = match File::open(candidate) {
        Ok(file) => file,
        Err(e) => {
            report(candidate, "open", &e);
            return Ok(None);
        }
    };
    match file.metadata() {
        Ok(meta) if meta.is_dir() => {
            warn!(path = %candidate.display(), "overlay candidate is a directory");
            Ok(None)
        }
        Ok(_) => {
            trace!(path = %candidate.display(), "serving stream from overlay");
            Ok(Some(file))
        }
        Err(e) => {
            report(candidate, "open", &e);
            Ok(None)
        }
    }
}

pub(super) fn read(candidate: &Path, cancel: Option<&CancellationToken>) -> ResourceResult<Option<Vec<u8>>> {
    check_cancelled(cancel)?;
    match fs::read(candidate) {
        Ok(data) => {
            trace!(path = %candidate.display(), len = data.len(), "serving data from overlay");
            Ok(Some(data))
        }
        Err(e) => {
            report(candidate, "read", &e);
            Ok(None)
        }
    }
}

pub(super) fn stat(candidate: &Path, cancel: Option<&CancellationToken>) -> ResourceResult<Option<EntryInfo>> {
    check_cancelled(cancel)?;
    match fs::metadata(candidate) {
        Ok(meta) => Ok(Some(EntryInfo::new(meta.len(), ResourceFlags::NONE))),
        Err(e) => {
            report(candidate, "stat", &e);
            Ok(None)
        }
    }
}

/// List `candidate` into `names`, marking sub-directories with a trailing `/`.
pub(super) fn list(
    candidate: &Path,
    names: &mut HashSet<String>,
    cancel: Option<&CancellationToken>,
) -> ResourceResult<bool> {
    check_cancelled(cancel)?;
    let entries = match fs::read_dir(candidate) {
        Ok(entries) => entries,
        Err(_) => return Ok(false),
    };

    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        // follows symlinks, like stat
        let is_dir = fs::metadata(entry.path()).map(|m| m.is_dir()).unwrap_or(false);
        names.insert(if is_dir { format!("{name}/") } else { name });
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("window.xml"), b"<overlaid/>").unwrap();
        fs::create_dir(dir.path().join("icons")).unwrap();
        dir
    }

    #[test]
    fn test_read_and_stat() {
        let dir = setup();
        let file = dir.path().join("window.xml");
        assert_eq!(read(&file, None).unwrap(), Some(b"<overlaid/>".to_vec()));
        assert_eq!(stat(&file, None).unwrap().map(|i| i.size), Some(11));
        assert_eq!(read(&dir.path().join("missing"), None).unwrap(), None);
    }

    #[test]
    fn test_open_skips_directories() {
        let dir = setup();
        assert!(open(&dir.path().join("icons"), None).unwrap().is_none());
        assert!(open(&dir.path().join("window.xml"), None).unwrap().is_some());
    }

    #[test]
    fn test_list_marks_directories() {
        let dir = setup();
        let mut names = HashSet::new();
        assert!(list(dir.path(), &mut names, None).unwrap());
        assert!(names.contains("window.xml"));
        assert!(names.contains("icons/"));
        assert!(!list(&dir.path().join("missing"), &mut names, None).unwrap());
    }

    #[test]
    fn test_cancelled_before_io() {
        let dir = setup();
        let token = CancellationToken::new();
        token.cancel();
        assert!(read(&dir.path().join("window.xml"), Some(&token)).is_err());
    }
}
