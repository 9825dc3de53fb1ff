//! Variant framing for stored values.
//!
//! Values in a table are serialized variants of type `v`: the body of the
//! wrapped value, a zero byte, then the ASCII type string of the body. The
//! body itself is opaque at this layer.

/// A borrowed, unwrapped variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Variant<'a> {
    pub type_string: &'a str,
    pub body: &'a [u8],
}

impl<'a> Variant<'a> {
    /// Split a serialized `v` value into body and type.
    ///
    /// The type string follows the last zero byte, which also handles bodies
    /// that contain zero bytes themselves.
    pub fn parse(bytes: &'a [u8]) -> Option<Self> {
        let sep = bytes.iter().rposition(|&b| b == 0)?;
        let type_string = std::str::from_utf8(&bytes[sep + 1..]).ok()?;
        if type_string.is_empty() {
            return None;
        }
        Some(Self {
            type_string,
            body: &bytes[..sep],
        })
    }
}

/// Serialize `body` of type `type_string` as a `v` value.
pub fn wrap(type_string: &str, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 1 + type_string.len());
    out.extend_from_slice(body);
    out.push(0);
    out.extend_from_slice(type_string.as_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_with_zero_bytes() {
        let body = [0u8, 1, 0, 2, 0];
        let framed = wrap("(uuay)", &body);
        let variant = Variant::parse(&framed).unwrap();
        assert_eq!(variant.type_string, "(uuay)");
        assert_eq!(variant.body, &body);
    }

    #[test]
    fn test_rejects_unframed() {
        assert_eq!(Variant::parse(b"no separator"), None);
        assert_eq!(Variant::parse(b"trailing\0"), None);
        assert_eq!(Variant::parse(&[]), None);
    }
}
