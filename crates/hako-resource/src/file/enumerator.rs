use std::collections::VecDeque;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::ResourceFile;
use super::info::{AttributeMatcher, FileInfo};
use crate::error::{ResourceError, ResourceResult, check_cancelled};
use crate::ops::VirtualFile;

/// Walks the children of a resource directory, querying each one's info.
#[derive(Debug)]
pub struct ResourceFileEnumerator {
    parent: ResourceFile,
    names: VecDeque<String>,
    matcher: AttributeMatcher,
    cancel: Option<CancellationToken>,
    closed: bool,
}

impl ResourceFileEnumerator {
    pub(crate) fn new(
        parent: ResourceFile,
        mut names: Vec<String>,
        matcher: AttributeMatcher,
        cancel: Option<CancellationToken>,
    ) -> Self {
        names.sort();
        Self {
            parent,
            names: names.into(),
            matcher,
            cancel,
            closed: false,
        }
    }

    /// Info for the next child, or `None` when done or closed.
    ///
    /// Children that vanish between listing and query are skipped. Any other
    /// error closes the enumerator.
    pub fn next_file(&mut self) -> ResourceResult<Option<FileInfo>> {
        while !self.closed {
            if let Err(e) = check_cancelled(self.cancel.as_ref()) {
                self.close();
                return Err(e);
            }
            let Some(name) = self.names.pop_front() else {
                return Ok(None);
            };
            let child = self.parent.child(name.trim_end_matches('/'));
            match child.query_info_with(&self.matcher, self.cancel.as_ref()) {
                Ok(info) => return Ok(Some(info)),
                Err(ResourceError::NotFound(path)) => {
                    debug!(path = %path, "child disappeared during enumeration");
                }
                Err(e) => {
                    self.close();
                    return Err(e);
                }
            }
        }
        Ok(None)
    }

    /// Drop any remaining children.
    pub fn close(&mut self) {
        self.closed = true;
        self.names.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Iterator for ResourceFileEnumerator {
    type Item = ResourceResult<FileInfo>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_file().transpose()
    }
}
