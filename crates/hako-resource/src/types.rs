//! Flag words and entry metadata.

use std::fmt;

/// Per-entry flags stored in the bundle.
///
/// Only bit 0 is defined; other bits are preserved verbatim and otherwise
/// ignored.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ResourceFlags(u32);

impl ResourceFlags {
    pub const NONE: Self = Self(0);
    /// Payload is a zlib-wrapped deflate stream.
    pub const COMPRESSED: Self = Self(1);

    pub const fn from_bits_retain(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_compressed(self) -> bool {
        self.contains(Self::COMPRESSED)
    }
}

impl fmt::Debug for ResourceFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceFlags({:#x}", self.0)?;
        if self.is_compressed() {
            write!(f, " | COMPRESSED")?;
        }
        write!(f, ")")
    }
}

/// Per-call lookup policy. No bits are defined yet; unknown bits are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LookupFlags(u32);

impl LookupFlags {
    pub const NONE: Self = Self(0);

    pub const fn from_bits_retain(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }
}

/// Size and flags of an entry, as answered by `get_info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryInfo {
    /// Uncompressed logical length in bytes.
    pub size: u64,
    pub flags: ResourceFlags,
}

impl EntryInfo {
    pub fn new(size: u64, flags: ResourceFlags) -> Self {
        Self { size, flags }
    }

    pub fn is_compressed(&self) -> bool {
        self.flags.is_compressed()
    }
}
