//! Content-type guessing for `query_info`.

/// Bytes of content offered to a guesser, when the entry is stored uncompressed.
pub const SNIFF_LEN: usize = 512;

pub const DIRECTORY_TYPE: &str = "inode/directory";
const FALLBACK_TYPE: &str = "application/octet-stream";

/// Maps a filename and an optional content prefix to a MIME type.
pub trait ContentTypeGuesser: Send + Sync {
    fn guess(&self, filename: &str, data: Option<&[u8]>) -> String;
}

/// Extension table first, then magic bytes, then a text/binary check.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultGuesser;

const EXTENSIONS: &[(&str, &str)] = &[
    ("css", "text/css"),
    ("csv", "text/csv"),
    ("gif", "image/gif"),
    ("html", "text/html"),
    ("htm", "text/html"),
    ("ico", "image/vnd.microsoft.icon"),
    ("jpeg", "image/jpeg"),
    ("jpg", "image/jpeg"),
    ("js", "text/javascript"),
    ("json", "application/json"),
    ("md", "text/markdown"),
    ("pdf", "application/pdf"),
    ("png", "image/png"),
    ("svg", "image/svg+xml"),
    ("toml", "application/toml"),
    ("ttf", "font/ttf"),
    ("txt", "text/plain"),
    ("ui", "application/x-gtk-builder"),
    ("wasm", "application/wasm"),
    ("webp", "image/webp"),
    ("woff", "font/woff"),
    ("woff2", "font/woff2"),
    ("xml", "application/xml"),
];

const MAGIC: &[(&[u8], &str)] = &[
    (b"\x89PNG\r\n\x1a\n", "image/png"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"\xff\xd8\xff", "image/jpeg"),
    (b"%PDF-", "application/pdf"),
    (b"\0asm", "application/wasm"),
    (b"\x1f\x8b", "application/gzip"),
    (b"PK\x03\x04", "application/zip"),
    (b"<?xml", "application/xml"),
    (b"<svg", "image/svg+xml"),
];

impl DefaultGuesser {
    fn by_extension(filename: &str) -> Option<&'static str> {
        let (_, ext) = filename.rsplit_once('.')?;
        EXTENSIONS
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(ext))
            .map(|(_, mime)| *mime)
    }

    fn by_content(data: &[u8]) -> &'static str {
        if let Some((_, mime)) = MAGIC.iter().find(|(magic, _)| data.starts_with(magic)) {
            return *mime;
        }
        if data.is_empty() {
            return "text/plain";
        }
        match std::str::from_utf8(data) {
            Ok(text) if !text.contains('\0') => "text/plain",
            // a multi-byte character cut off by the sniff window
            Err(e) if e.error_len().is_none() && !data[..e.valid_up_to()].contains(&0) => {
                "text/plain"
            }
            _ => FALLBACK_TYPE,
        }
    }
}

impl ContentTypeGuesser for DefaultGuesser {
    fn guess(&self, filename: &str, data: Option<&[u8]>) -> String {
        let mime = match (Self::by_extension(filename), data) {
            (Some(mime), _) => mime,
            (None, Some(data)) => Self::by_content(data),
            (None, None) => FALLBACK_TYPE,
        };
        mime.to_string()
    }
}
