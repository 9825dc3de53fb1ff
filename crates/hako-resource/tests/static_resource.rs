//! Bundles embedded with `static_resource!`.
//!
//! `data/embedded.hako` holds a single file, `/embedded/hello.txt`.

use hako_resource::{BundleBuilder, LookupFlags};

hako_resource::static_resource!(EMBEDDED = "data/embedded.hako");

const NONE: LookupFlags = LookupFlags::NONE;

#[test]
fn test_fixture_matches_builder_output() {
    let mut builder = BundleBuilder::new();
    builder.add("/embedded/hello.txt", b"embedded!\n").unwrap();
    assert_eq!(EMBEDDED.data(), &builder.to_bytes().unwrap()[..]);
}

#[test]
fn test_embedded_bundle_lifecycle() {
    assert_eq!(EMBEDDED.data().as_ptr() as usize % 8, 0);
    assert!(EMBEDDED.resource().is_none());

    EMBEDDED.init();
    let data = hako_resource::lookup_data("/embedded/hello.txt", NONE).unwrap();
    assert_eq!(data, b"embedded!\n");
    assert_eq!(
        hako_resource::enumerate_children("/embedded", NONE).unwrap(),
        vec!["hello.txt"]
    );

    let resource = EMBEDDED.resource().unwrap();
    assert!(resource.contains("/embedded/hello.txt"));

    EMBEDDED.fini();
    assert!(EMBEDDED.resource().is_none());
    assert!(
        hako_resource::lookup_data("/embedded/hello.txt", NONE)
            .unwrap_err()
            .is_not_found()
    );
}
