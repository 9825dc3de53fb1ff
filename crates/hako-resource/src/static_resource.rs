//! Bundles embedded in the program image.
//!
//! A [`StaticResource`] is a `static` descriptor around embedded bytes. Calling
//! [`StaticResource::init`] only pushes it onto the registry's lock-free
//! intake stack; parsing happens the next time the registry is consulted.

use std::ptr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};

use crate::registry::Registry;
use crate::resource::{Resource, ResourceInner};

/// Descriptor for a bundle compiled into the binary.
///
/// A descriptor is meant to be registered with a single registry.
pub struct StaticResource {
    data: &'static [u8],
    /// `Arc::into_raw` of the parsed handle, null until drained.
    resource: AtomicPtr<ResourceInner>,
    /// Intake stack link.
    pub(crate) next: AtomicPtr<StaticResource>,
    pub(crate) queued: AtomicBool,
}

impl StaticResource {
    pub const fn new(data: &'static [u8]) -> Self {
        Self {
            data,
            resource: AtomicPtr::new(ptr::null_mut()),
            next: AtomicPtr::new(ptr::null_mut()),
            queued: AtomicBool::new(false),
        }
    }

    pub fn data(&self) -> &'static [u8] {
        self.data
    }

    /// Queue this bundle on the global registry. Allocation-free.
    pub fn init(&'static self) {
        Registry::global().static_init(self);
    }

    /// Unregister from the global registry and drop the parsed handle.
    pub fn fini(&'static self) {
        Registry::global().static_fini(self);
    }

    /// The parsed handle, draining the global intake first.
    ///
    /// `None` if the descriptor was never initialized or failed to parse.
    pub fn resource(&'static self) -> Option<Resource> {
        Registry::global().static_resource(self)
    }

    /// Store a parsed handle. Callers hold the registry writer lock.
    pub(crate) fn install(&self, resource: &Resource) {
        let raw = Arc::into_raw(resource.clone().into_inner()).cast_mut();
        let old = self.resource.swap(raw, Ordering::AcqRel);
        release(old);
    }

    /// Take the parsed handle out. Callers hold the registry writer lock.
    pub(crate) fn take(&self) -> Option<Resource> {
        let raw = self.resource.swap(ptr::null_mut(), Ordering::AcqRel);
        if raw.is_null() {
            return None;
        }
        // SAFETY: non-null values in the slot come from `Arc::into_raw` in
        // `install`, and the swap transferred that strong count to us.
        Some(Resource::from_inner(unsafe { Arc::from_raw(raw) }))
    }

    /// Clone the parsed handle. Callers hold at least the registry reader lock,
    /// which excludes `install` and `take`.
    pub(crate) fn load(&self) -> Option<Resource> {
        let raw = self.resource.load(Ordering::Acquire);
        if raw.is_null() {
            return None;
        }
        // SAFETY: the slot owns one strong count that cannot be released while
        // the caller holds the registry lock; we add our own before adopting it.
        unsafe {
            Arc::increment_strong_count(raw);
            Some(Resource::from_inner(Arc::from_raw(raw)))
        }
    }
}

impl Drop for StaticResource {
    fn drop(&mut self) {
        release(*self.resource.get_mut());
    }
}

fn release(raw: *mut ResourceInner) {
    if !raw.is_null() {
        // SAFETY: see `take`.
        drop(unsafe { Arc::from_raw(raw) });
    }
}

/// Declare a `static` [`StaticResource`] embedding the file at `$path`.
///
/// The bytes are placed in an 8-aligned static so they are parsed in place.
///
/// ```ignore
/// hako_resource::static_resource!(pub APP_RESOURCES = "../app.hako");
///
/// fn main() {
///     APP_RESOURCES.init();
/// }
/// ```
#[macro_export]
macro_rules! static_resource {
    ($vis:vis $name:ident = $path:expr) => {
        $vis static $name: $crate::StaticResource = {
            #[repr(C, align(8))]
            struct Aligned<B: ?Sized>(B);
            const ALIGNED: &Aligned<[u8]> = &Aligned(*include_bytes!($path));
            $crate::StaticResource::new(&ALIGNED.0)
        };
    };
}
