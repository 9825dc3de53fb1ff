//! GVDB hash-table images.
//!
//! A GVDB image is a read-only dictionary from string keys to serialized
//! values or child lists, designed to be memory-mapped and queried in place.
//!
//! - [`Image`] - Owns or borrows the bytes and guarantees their alignment
//! - [`Table`] - Validates an image and answers key lookups without copying
//! - [`TableBuilder`] - Writes images in the layout [`Table`] reads
//! - [`variant`] - Framing of `v`-typed values stored in the table
//!
//! Keys form a tree through parent links: every key is stored as the
//! fragment that remains after its parent's key, and list items enumerate
//! their children.

mod builder;
mod error;
pub mod format;
mod image;
mod reader;
pub mod variant;

pub use builder::TableBuilder;
pub use error::{GvdbError, GvdbResult};
pub use image::{IMAGE_ALIGN, Image};
pub use reader::Table;
