//! Pull-mode readers returned by `open_stream`.

use std::fmt;
use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};

use crate::bytes::Pinned;
use crate::decompress::InflateReader;

enum Source {
    /// Uncompressed payload, aliasing the bundle.
    Slice(Cursor<Pinned>),
    /// Compressed payload decoded on the fly.
    Inflate(InflateReader<Cursor<Pinned>>),
    /// A file served by an overlay directory.
    File(File),
}

/// A readable resource; holds its bundle (or file) alive until dropped or closed.
///
/// Slice and file streams can seek; inflating streams cannot.
pub struct ResourceStream {
    source: Option<Source>,
}

impl ResourceStream {
    pub(crate) fn slice(pinned: Pinned) -> Self {
        Self {
            source: Some(Source::Slice(Cursor::new(pinned))),
        }
    }

    pub(crate) fn inflate(pinned: Pinned, size: u64) -> Self {
        Self {
            source: Some(Source::Inflate(InflateReader::new(Cursor::new(pinned), size))),
        }
    }

    pub(crate) fn file(file: File) -> Self {
        Self {
            source: Some(Source::File(file)),
        }
    }

    fn source(&mut self) -> io::Result<&mut Source> {
        self.source
            .as_mut()
            .ok_or_else(|| io::Error::other("stream is closed"))
    }

    pub fn can_seek(&self) -> bool {
        matches!(self.source, Some(Source::Slice(_) | Source::File(_)))
    }

    /// Current read position; inflating streams report decoded bytes consumed.
    pub fn tell(&mut self) -> io::Result<u64> {
        match self.source()? {
            Source::Slice(cursor) => Ok(cursor.position()),
            Source::Inflate(reader) => Ok(reader.position()),
            Source::File(file) => file.stream_position(),
        }
    }

    /// Discard up to `count` bytes, returning how many were skipped.
    pub fn skip(&mut self, count: u64) -> io::Result<u64> {
        match self.source()? {
            Source::Slice(cursor) => {
                let len = cursor.get_ref().as_ref().len() as u64;
                let start = cursor.position().min(len);
                let end = start.saturating_add(count).min(len);
                cursor.set_position(end);
                Ok(end - start)
            }
            Source::Inflate(reader) => io::copy(&mut reader.take(count), &mut io::sink()),
            Source::File(file) => io::copy(&mut file.take(count), &mut io::sink()),
        }
    }

    /// Release the underlying bundle or file. Further reads fail.
    pub fn close(&mut self) -> io::Result<()> {
        self.source = None;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.source.is_none()
    }
}

impl Read for ResourceStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.source()? {
            Source::Slice(cursor) => cursor.read(buf),
            Source::Inflate(reader) => reader.read(buf),
            Source::File(file) => file.read(buf),
        }
    }
}

impl Seek for ResourceStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self.source()? {
            Source::Slice(cursor) => cursor.seek(pos),
            Source::File(file) => file.seek(pos),
            Source::Inflate(_) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "compressed resource streams cannot seek",
            )),
        }
    }
}

impl fmt::Debug for ResourceStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.source {
            Some(Source::Slice(_)) => "slice",
            Some(Source::Inflate(_)) => "inflate",
            Some(Source::File(_)) => "file",
            None => "closed",
        };
        f.debug_struct("ResourceStream").field("kind", &kind).finish()
    }
}
