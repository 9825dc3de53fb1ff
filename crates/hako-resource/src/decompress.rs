//! zlib payload decoding.

use flate2::read::ZlibDecoder;
use flate2::{Decompress, FlushDecompress, Status};
use std::io::{self, Read};

use crate::error::{ResourceError, ResourceResult};

/// Inflate a zlib stream that must decode to exactly `size` bytes.
///
/// The returned buffer has `size + 1` bytes, the last one a NUL.
pub(crate) fn inflate(raw: &[u8], size: usize) -> ResourceResult<Vec<u8>> {
    let failed = || ResourceError::internal("failed to decompress");

    // One spare byte so overlong output is detected instead of truncated.
    let mut out = Vec::with_capacity(size + 1);
    let mut inflater = Decompress::new(true);

    loop {
        let consumed = inflater.total_in() as usize;
        let produced = out.len();
        let input = raw.get(consumed..).ok_or_else(failed)?;

        let status = inflater
            .decompress_vec(input, &mut out, FlushDecompress::Finish)
            .map_err(|_| failed())?;

        match status {
            Status::StreamEnd => break,
            Status::Ok | Status::BufError => {
                let stalled =
                    inflater.total_in() as usize == consumed && out.len() == produced;
                if stalled || out.len() == out.capacity() {
                    return Err(failed());
                }
            }
        }
    }

    if out.len() != size {
        return Err(failed());
    }
    out.push(0);
    Ok(out)
}

/// Streaming decoder that yields exactly `size` bytes, then end-of-stream.
pub(crate) struct InflateReader<R: Read> {
    decoder: ZlibDecoder<R>,
    remaining: u64,
    position: u64,
}

impl<R: Read> InflateReader<R> {
    pub fn new(raw: R, size: u64) -> Self {
        Self {
            decoder: ZlibDecoder::new(raw),
            remaining: size,
            position: 0,
        }
    }

    pub fn position(&self) -> u64 {
        self.position
    }
}

impl<R: Read> Read for InflateReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let want = buf.len().min(self.remaining.min(usize::MAX as u64) as usize);
        let n = self.decoder.read(&mut buf[..want])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "compressed resource ended early",
            ));
        }
        self.remaining -= n as u64;
        self.position += n as u64;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use std::io::Write;

    fn compress(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_inflate_exact() {
        let data = vec![0xAA; 16384];
        let out = inflate(&compress(&data), data.len()).unwrap();
        assert_eq!(out.len(), data.len() + 1);
        assert_eq!(&out[..data.len()], &data[..]);
        assert_eq!(out[data.len()], 0);
    }

    #[test]
    fn test_inflate_size_mismatch() {
        let raw = compress(b"hello world");
        assert!(inflate(&raw, 5).is_err());
        assert!(inflate(&raw, 20).is_err());
    }

    #[test]
    fn test_inflate_garbage() {
        let err = inflate(b"definitely not zlib", 10).unwrap_err();
        assert!(matches!(err, ResourceError::Internal(m) if m == "failed to decompress"));

        let raw = compress(b"hello world");
        assert!(inflate(&raw[..raw.len() / 2], 11).is_err());
    }

    #[test]
    fn test_inflate_empty() {
        let out = inflate(&compress(b""), 0).unwrap();
        assert_eq!(out, vec![0]);
    }

    #[test]
    fn test_reader_stops_at_size() {
        let data = b"streamed payload".to_vec();
        let compressed = compress(&data);
        let mut reader = InflateReader::new(&compressed[..], data.len() as u64);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
        assert_eq!(reader.position(), data.len() as u64);
    }

    #[test]
    fn test_reader_short_stream() {
        let data = b"short".to_vec();
        let compressed = compress(&data);
        let mut reader = InflateReader::new(&compressed[..], 100);
        let mut out = Vec::new();
        let err = reader.read_to_end(&mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
