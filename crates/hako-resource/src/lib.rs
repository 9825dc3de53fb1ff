//! # hako-resource
//!
//! Read-only resource bundles embedded in, or shipped beside, a program.
//!
//! A bundle packs a tree of named blobs into one GVDB image. Applications
//! register bundles with the process-wide [`Registry`] and read them back
//! by absolute path, or through `resource:` URIs with [`ResourceFile`]:
//!
//! - [`Resource`] - A parsed bundle; lookups alias its memory
//! - [`Registry`] - Registered bundles, newest first, plus filesystem overlays
//! - [`StaticResource`] - Bundles compiled into the binary, parsed on first use
//! - [`ResourceFile`] - The registry seen through the [`VirtualFile`] trait
//! - [`BundleBuilder`] - Writes bundle images
//!
//! Uncompressed data returned by [`lookup_data`] points into the bundle
//! and keeps it alive; every returned buffer is followed by a NUL byte
//! that is not counted in its length.

mod builder;
mod bytes;
mod content_type;
mod decompress;
mod entry;
mod error;
pub mod file;
mod ops;
mod overlay;
mod registry;
mod resource;
mod static_resource;
mod stream;
mod types;

pub use builder::BundleBuilder;
pub use bytes::Bytes;
pub use content_type::{ContentTypeGuesser, DefaultGuesser, SNIFF_LEN};
pub use error::{ResourceError, ResourceResult, check_cancelled};
pub use file::{
    AttributeMatcher, FileInfo, FileMonitor, FileType, FilesystemInfo, ResourceFile,
    ResourceFileEnumerator, ResourceInputStream,
};
pub use ops::VirtualFile;
pub use overlay::{OVERLAY_ENV, Overlay, OverlayTable, is_privileged};
pub use registry::{
    Registry, enumerate_children, get_info, lookup_data, open_stream, register,
    register_bundle_bytes, unregister,
};
pub use resource::Resource;
pub use static_resource::StaticResource;
pub use stream::ResourceStream;
pub use types::{EntryInfo, LookupFlags, ResourceFlags};

pub use tokio_util::sync::CancellationToken;
