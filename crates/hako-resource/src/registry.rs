//! Process-wide bundle registry.
//!
//! Registered bundles live in a list behind a reader/writer lock and are
//! consulted newest-first. Static descriptors queue themselves on a
//! lock-free intake stack and are parsed into the list by the first
//! operation that reads it. Overlays from [`OVERLAY_ENV`](crate::OVERLAY_ENV)
//! are checked before any bundle.

use parking_lot::RwLock;
use std::collections::HashSet;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::{Arc, LazyLock, OnceLock};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::bytes::Bytes;
use crate::error::{ResourceError, ResourceResult, check_cancelled};
use crate::overlay::OverlayTable;
use crate::resource::Resource;
use crate::static_resource::StaticResource;
use crate::stream::ResourceStream;
use crate::types::{EntryInfo, LookupFlags};

struct RegistryInner {
    /// Oldest first; lookups walk it in reverse.
    resources: RwLock<Vec<Resource>>,
    intake: AtomicPtr<StaticResource>,
    overlays: OnceLock<OverlayTable>,
}

/// A set of registered bundles. Clones share the same set.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

static GLOBAL: LazyLock<Registry> = LazyLock::new(Registry::new);

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("resources", &self.inner.resources.read().len())
            .field("overlays", &self.inner.overlays.get())
            .finish()
    }
}

impl Registry {
    /// An empty registry that reads overlays from the environment on first use.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                resources: RwLock::new(Vec::new()),
                intake: AtomicPtr::new(ptr::null_mut()),
                overlays: OnceLock::new(),
            }),
        }
    }

    /// An empty registry with a fixed overlay table.
    pub fn with_overlays(overlays: OverlayTable) -> Self {
        let registry = Self::new();
        let _ = registry.inner.overlays.set(overlays);
        registry
    }

    /// The registry behind the crate-level functions and `resource:` URIs.
    pub fn global() -> &'static Registry {
        &GLOBAL
    }

    pub fn overlays(&self) -> &OverlayTable {
        self.inner.overlays.get_or_init(OverlayTable::from_env)
    }

    /// Whether both values refer to the same registry.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Make `resource` the first bundle consulted.
    pub fn register(&self, resource: &Resource) {
        let mut resources = self.inner.resources.write();
        resources.push(resource.clone());
        debug!(count = resources.len(), "registered resource bundle");
    }

    /// Remove `resource`; unknown handles are logged and ignored.
    pub fn unregister(&self, resource: &Resource) {
        let mut resources = self.inner.resources.write();
        remove_locked(&mut resources, resource);
    }

    /// Parse `data` and register it.
    pub fn register_bundle_bytes(&self, data: &'static [u8]) -> ResourceResult<Resource> {
        let resource = Resource::from_static(data)?;
        self.register(&resource);
        Ok(resource)
    }

    /// Number of registered bundles, including queued static ones.
    pub fn len(&self) -> usize {
        self.drain_intake();
        self.inner.resources.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queue a static descriptor. Lock-free and allocation-free; repeated calls
    /// for a queued descriptor are ignored.
    pub fn static_init(&self, descriptor: &'static StaticResource) {
        if descriptor.queued.swap(true, Ordering::AcqRel) {
            return;
        }
        let node = ptr::from_ref(descriptor).cast_mut();
        let mut head = self.inner.intake.load(Ordering::Acquire);
        loop {
            descriptor.next.store(head, Ordering::Relaxed);
            match self.inner.intake.compare_exchange_weak(
                head,
                node,
                Ordering::Release,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(current) => head = current,
            }
        }
    }

    /// Unregister a static descriptor's bundle and drop its parsed handle.
    pub fn static_fini(&self, descriptor: &'static StaticResource) {
        let mut resources = self.inner.resources.write();
        self.drain_locked(&mut resources);
        if let Some(resource) = descriptor.take() {
            remove_locked(&mut resources, &resource);
        }
        descriptor.queued.store(false, Ordering::Release);
    }

    /// The parsed handle installed in `descriptor`, if any.
    pub fn static_resource(&self, descriptor: &'static StaticResource) -> Option<Resource> {
        self.drain_intake();
        let _resources = self.inner.resources.read();
        descriptor.load()
    }

    fn drain_intake(&self) {
        if self.inner.intake.load(Ordering::Acquire).is_null() {
            return;
        }
        let mut resources = self.inner.resources.write();
        self.drain_locked(&mut resources);
    }

    fn drain_locked(&self, resources: &mut Vec<Resource>) {
        let mut node = self.inner.intake.swap(ptr::null_mut(), Ordering::AcqRel);
        while !node.is_null() {
            // SAFETY: only `&'static StaticResource` values are pushed in `static_init`.
            let descriptor: &'static StaticResource = unsafe { &*node };
            node = descriptor.next.swap(ptr::null_mut(), Ordering::Relaxed);

            match Resource::from_static(descriptor.data()) {
                Ok(resource) => {
                    descriptor.install(&resource);
                    resources.push(resource);
                }
                Err(e) => {
                    warn!(error = %e, "failed to load static resource bundle");
                }
            }
        }
    }

    /// Ask each bundle in turn, newest first, skipping those that answer NotFound.
    fn first_match<T>(
        &self,
        path: &str,
        cancel: Option<&CancellationToken>,
        op: impl Fn(&Resource) -> ResourceResult<T>,
    ) -> ResourceResult<T> {
        check_cancelled(cancel)?;
        self.drain_intake();
        let resources = self.inner.resources.read();
        for resource in resources.iter().rev() {
            match op(resource) {
                Err(ResourceError::NotFound(_)) => continue,
                other => return other,
            }
        }
        Err(ResourceError::not_found(path))
    }

    /// The newest bundle holding a leaf at `path`.
    fn owner_of(&self, path: &str, cancel: Option<&CancellationToken>) -> ResourceResult<Resource> {
        self.first_match(path, cancel, |resource| {
            resource
                .get_info(path, LookupFlags::NONE)
                .map(|_| resource.clone())
        })
    }

    /// Contents of `path` from the first overlay or bundle that has it.
    pub fn lookup_data(
        &self,
        path: &str,
        flags: LookupFlags,
        cancel: Option<&CancellationToken>,
    ) -> ResourceResult<Bytes> {
        if let Some(data) = self.overlays().lookup_data(path, cancel)? {
            return Ok(data);
        }
        let resource = self.owner_of(path, cancel)?;
        check_cancelled(cancel)?;
        resource.lookup_data(path, flags)
    }

    /// A reader for `path` from the first overlay or bundle that has it.
    pub fn open_stream(
        &self,
        path: &str,
        flags: LookupFlags,
        cancel: Option<&CancellationToken>,
    ) -> ResourceResult<ResourceStream> {
        if let Some(stream) = self.overlays().open_stream(path, cancel)? {
            return Ok(stream);
        }
        let resource = self.owner_of(path, cancel)?;
        resource.open_stream(path, flags)
    }

    /// Size and flags of `path` from the first overlay or bundle that has it.
    pub fn get_info(
        &self,
        path: &str,
        flags: LookupFlags,
        cancel: Option<&CancellationToken>,
    ) -> ResourceResult<EntryInfo> {
        if let Some(info) = self.overlays().get_info(path, cancel)? {
            return Ok(info);
        }
        self.first_match(path, cancel, |resource| resource.get_info(path, flags))
    }

    /// Union of the children of `path` across overlays and all bundles.
    ///
    /// Order is unspecified. NotFound only when no source knows the directory.
    pub fn enumerate_children(
        &self,
        path: &str,
        flags: LookupFlags,
        cancel: Option<&CancellationToken>,
    ) -> ResourceResult<Vec<String>> {
        let mut names = HashSet::new();
        let mut found = self.overlays().enumerate_children(path, &mut names, cancel)?;

        check_cancelled(cancel)?;
        self.drain_intake();
        {
            let resources = self.inner.resources.read();
            for resource in resources.iter().rev() {
                match resource.enumerate_children(path, flags) {
                    Ok(children) => {
                        found = true;
                        names.extend(children);
                    }
                    Err(ResourceError::NotFound(_)) => {}
                    Err(e) => return Err(e),
                }
            }
        }

        if !found {
            return Err(ResourceError::not_found(path));
        }
        Ok(names.into_iter().collect())
    }
}

fn remove_locked(resources: &mut Vec<Resource>, resource: &Resource) {
    match resources.iter().position(|r| r.ptr_eq(resource)) {
        Some(at) => {
            resources.remove(at);
            debug!(count = resources.len(), "unregistered resource bundle");
        }
        None => warn!("tried to remove a resource bundle that is not registered"),
    }
}

/// Register `resource` with the global registry.
pub fn register(resource: &Resource) {
    Registry::global().register(resource);
}

/// Unregister `resource` from the global registry.
pub fn unregister(resource: &Resource) {
    Registry::global().unregister(resource);
}

/// Parse program data and register it with the global registry.
pub fn register_bundle_bytes(data: &'static [u8]) -> ResourceResult<Resource> {
    Registry::global().register_bundle_bytes(data)
}

/// [`Registry::lookup_data`] on the global registry.
pub fn lookup_data(path: &str, flags: LookupFlags) -> ResourceResult<Bytes> {
    Registry::global().lookup_data(path, flags, None)
}

/// [`Registry::open_stream`] on the global registry.
pub fn open_stream(path: &str, flags: LookupFlags) -> ResourceResult<ResourceStream> {
    Registry::global().open_stream(path, flags, None)
}

/// [`Registry::get_info`] on the global registry.
pub fn get_info(path: &str, flags: LookupFlags) -> ResourceResult<EntryInfo> {
    Registry::global().get_info(path, flags, None)
}

/// [`Registry::enumerate_children`] on the global registry.
pub fn enumerate_children(path: &str, flags: LookupFlags) -> ResourceResult<Vec<String>> {
    Registry::global().enumerate_children(path, flags, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::BundleBuilder;

    fn bundle(files: &[(&str, &[u8])]) -> Resource {
        let mut builder = BundleBuilder::new();
        for (path, data) in files {
            builder.add(path, data).unwrap();
        }
        builder.build().unwrap()
    }

    fn registry() -> Registry {
        Registry::with_overlays(OverlayTable::empty())
    }

    #[test]
    fn test_lifo_point_lookup() {
        let registry = registry();
        let a = bundle(&[("/p", b"from a"), ("/only-a", b"a")]);
        let b = bundle(&[("/p", b"from b")]);
        registry.register(&a);
        registry.register(&b);

        let none = LookupFlags::NONE;
        assert_eq!(registry.lookup_data("/p", none, None).unwrap(), b"from b");
        assert_eq!(registry.lookup_data("/only-a", none, None).unwrap(), b"a");

        registry.unregister(&b);
        assert_eq!(registry.lookup_data("/p", none, None).unwrap(), b"from a");
    }

    #[test]
    fn test_register_takes_reference() {
        let registry = registry();
        let a = bundle(&[("/x", b"x")]);
        registry.register(&a);
        assert_eq!(a.ref_count(), 2);
        registry.unregister(&a);
        assert_eq!(a.ref_count(), 1);
        // second removal only warns
        registry.unregister(&a);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_enumerate_union() {
        let registry = registry();
        registry.register(&bundle(&[("/d/x", b"1"), ("/d/y", b"2")]));
        registry.register(&bundle(&[("/d/y", b"3"), ("/d/z/w", b"4")]));

        let mut names = registry
            .enumerate_children("/d/", LookupFlags::NONE, None)
            .unwrap();
        names.sort();
        assert_eq!(names, vec!["x", "y", "z/"]);

        let err = registry
            .enumerate_children("/nope/", LookupFlags::NONE, None)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_empty_registry() {
        let registry = registry();
        assert!(registry.lookup_data("/a", LookupFlags::NONE, None).unwrap_err().is_not_found());
        assert!(registry.get_info("/a", LookupFlags::NONE, None).unwrap_err().is_not_found());
    }

    #[test]
    fn test_cancelled_lookup() {
        let registry = registry();
        registry.register(&bundle(&[("/a", b"a")]));
        let token = CancellationToken::new();
        token.cancel();
        let err = registry
            .lookup_data("/a", LookupFlags::NONE, Some(&token))
            .unwrap_err();
        assert!(matches!(err, ResourceError::Cancelled));
        let err = registry
            .enumerate_children("/", LookupFlags::NONE, Some(&token))
            .unwrap_err();
        assert!(matches!(err, ResourceError::Cancelled));
    }

    #[test]
    fn test_static_descriptors() {
        let registry = registry();
        let good: &'static [u8] = Box::leak(
            BundleBuilder::new()
                .add("/static", b"embedded")
                .unwrap()
                .to_bytes()
                .unwrap()
                .into_boxed_slice(),
        );
        let good: &'static StaticResource = Box::leak(Box::new(StaticResource::new(good)));
        let broken: &'static StaticResource =
            Box::leak(Box::new(StaticResource::new(b"not a bundle")));

        registry.static_init(good);
        registry.static_init(broken);
        registry.static_init(good);

        assert_eq!(
            registry.lookup_data("/static", LookupFlags::NONE, None).unwrap(),
            b"embedded"
        );
        assert_eq!(registry.len(), 1);
        assert!(registry.static_resource(good).is_some());
        assert!(registry.static_resource(broken).is_none());

        registry.static_fini(good);
        assert!(registry.static_resource(good).is_none());
        assert!(registry.is_empty());
        assert!(
            registry
                .lookup_data("/static", LookupFlags::NONE, None)
                .unwrap_err()
                .is_not_found()
        );
    }
}
