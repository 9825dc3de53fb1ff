use std::io::{self, Read, Seek, SeekFrom};

use crate::error::ResourceError;
use crate::stream::ResourceStream;

/// Input stream returned by [`ResourceFile::read`](super::ResourceFile::read).
///
/// Owns the registry's reader, so the bundle stays alive until this is
/// dropped or closed.
#[derive(Debug)]
pub struct ResourceInputStream {
    path: String,
    stream: ResourceStream,
}

impl ResourceInputStream {
    pub(crate) fn new(path: String, stream: ResourceStream) -> Self {
        Self { path, stream }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn skip(&mut self, count: u64) -> io::Result<u64> {
        self.stream.skip(count)
    }

    pub fn close(&mut self) -> io::Result<()> {
        self.stream.close()
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_closed()
    }

    pub fn tell(&mut self) -> io::Result<u64> {
        self.stream.tell()
    }

    pub fn can_seek(&self) -> bool {
        self.stream.can_seek()
    }

    pub fn into_inner(self) -> ResourceStream {
        self.stream
    }
}

impl Read for ResourceInputStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Seek for ResourceInputStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        if !self.stream.is_closed() && !self.stream.can_seek() {
            return Err(ResourceError::invalid_argument(format!(
                "seek not supported on {}",
                self.path
            ))
            .into());
        }
        self.stream.seek(pos)
    }
}
