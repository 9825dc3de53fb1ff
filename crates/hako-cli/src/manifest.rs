//! Bundle manifests (TOML).
//!
//! ```toml
//! [[bundle]]
//! prefix = "/org/example/app"
//!
//! [[bundle.file]]
//! path = "ui/window.xml"
//! alias = "window.xml"
//! compressed = true
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracing::debug;

use hako_resource::BundleBuilder;
use hako_resource::file::path::canonicalize;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Manifest {
    #[serde(default, rename = "bundle")]
    pub bundles: Vec<BundleSpec>,
}

/// Files sharing one resource prefix.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct BundleSpec {
    /// Resource directory the files land in; `/` when omitted.
    #[serde(default)]
    pub prefix: String,

    #[serde(default, rename = "file")]
    pub files: Vec<FileSpec>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct FileSpec {
    /// Source path, relative to the source directories.
    pub path: String,

    /// Resource name to use instead of `path`.
    #[serde(default)]
    pub alias: Option<String>,

    #[serde(default)]
    pub compressed: bool,
}

impl FileSpec {
    pub fn resource_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.path)
    }
}

impl Manifest {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).context("failed to parse resource manifest")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Read every listed file and collect it into a builder.
    ///
    /// Files are searched in `sourcedirs` in order.
    pub fn compile(&self, sourcedirs: &[PathBuf]) -> Result<BundleBuilder> {
        let mut builder = BundleBuilder::new();
        for bundle in &self.bundles {
            for file in &bundle.files {
                let key = resource_key(&bundle.prefix, file.resource_name());
                if canonicalize(&key) != key || key == "/" {
                    bail!(
                        "'{}' does not name a resource file (resolves to {key})",
                        file.resource_name()
                    );
                }
                if builder.contains(&key) {
                    bail!("{key} appears multiple times in the resource manifest");
                }

                let source = locate(&file.path, sourcedirs)
                    .with_context(|| format!("failed to locate '{}'", file.path))?;
                let data = fs::read(&source)
                    .with_context(|| format!("failed to read {}", source.display()))?;
                debug!(key = %key, source = %source.display(), compressed = file.compressed, "adding file");

                if file.compressed {
                    builder.add_compressed(&key, &data)?;
                } else {
                    builder.add(&key, &data)?;
                }
            }
        }
        Ok(builder)
    }
}

/// `prefix` joined with `name` as an absolute resource path.
pub fn resource_key(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_matches('/');
    let name = name.trim_start_matches('/');
    if prefix.is_empty() {
        format!("/{name}")
    } else {
        format!("/{prefix}/{name}")
    }
}

fn locate(path: &str, sourcedirs: &[PathBuf]) -> Option<PathBuf> {
    let relative = Path::new(path);
    if sourcedirs.is_empty() {
        return relative.is_file().then(|| relative.to_path_buf());
    }
    sourcedirs
        .iter()
        .map(|dir| dir.join(relative))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hako_resource::LookupFlags;
    use tempfile::TempDir;

    const MANIFEST: &str = r#"
[[bundle]]
prefix = "/org/example/app/"

[[bundle.file]]
path = "ui/window.xml"
alias = "window.xml"
compressed = true

[[bundle.file]]
path = "style.css"

[[bundle]]

[[bundle.file]]
path = "style.css"
alias = "top.css"
"#;

    fn setup() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("ui")).unwrap();
        fs::write(dir.path().join("ui/window.xml"), b"<window/>").unwrap();
        fs::write(dir.path().join("style.css"), b"* {}").unwrap();
        dir
    }

    #[test]
    fn test_parse() {
        let manifest = Manifest::parse(MANIFEST).unwrap();
        assert_eq!(manifest.bundles.len(), 2);
        let first = &manifest.bundles[0];
        assert_eq!(first.files[0].resource_name(), "window.xml");
        assert!(first.files[0].compressed);
        assert!(!first.files[1].compressed);
        assert_eq!(manifest.bundles[1].prefix, "");
    }

    #[test]
    fn test_resource_key() {
        assert_eq!(resource_key("/org/app/", "a.png"), "/org/app/a.png");
        assert_eq!(resource_key("org/app", "/a.png"), "/org/app/a.png");
        assert_eq!(resource_key("", "a.png"), "/a.png");
        assert_eq!(resource_key("/", "x/y"), "/x/y");
    }

    #[test]
    fn test_compile() {
        let dir = setup();
        let manifest = Manifest::parse(MANIFEST).unwrap();
        let resource = manifest
            .compile(&[dir.path().to_path_buf()])
            .unwrap()
            .build()
            .unwrap();

        let window = resource
            .get_info("/org/example/app/window.xml", LookupFlags::NONE)
            .unwrap();
        assert!(window.is_compressed());
        assert_eq!(
            resource
                .lookup_data("/org/example/app/window.xml", LookupFlags::NONE)
                .unwrap(),
            b"<window/>"
        );
        assert_eq!(
            resource.lookup_data("/top.css", LookupFlags::NONE).unwrap(),
            b"* {}"
        );
    }

    #[test]
    fn test_sourcedirs_searched_in_order() {
        let first = TempDir::new().unwrap();
        let second = setup();
        fs::write(first.path().join("style.css"), b"first").unwrap();

        let manifest =
            Manifest::parse("[[bundle]]\n[[bundle.file]]\npath = \"style.css\"\n").unwrap();
        let dirs = [first.path().to_path_buf(), second.path().to_path_buf()];
        let resource = manifest.compile(&dirs).unwrap().build().unwrap();
        assert_eq!(
            resource.lookup_data("/style.css", LookupFlags::NONE).unwrap(),
            b"first"
        );
    }

    #[test]
    fn test_duplicate_and_missing() {
        let dir = setup();
        let dirs = [dir.path().to_path_buf()];

        let duplicate = Manifest::parse(
            "[[bundle]]\n[[bundle.file]]\npath = \"style.css\"\n[[bundle.file]]\npath = \"style.css\"\n",
        )
        .unwrap();
        let err = duplicate.compile(&dirs).err().unwrap();
        assert!(err.to_string().contains("appears multiple times"));

        let missing =
            Manifest::parse("[[bundle]]\n[[bundle.file]]\npath = \"nope.txt\"\n").unwrap();
        assert!(missing.compile(&dirs).is_err());
    }

    #[test]
    fn test_non_canonical_names_rejected() {
        let dir = setup();
        let dirs = [dir.path().to_path_buf()];

        for entry in [
            "path = \"style.css\"\nalias = \"../style.css\"",
            "path = \"style.css\"\nalias = \"css//style.css\"",
            "path = \"ui/./window.xml\"",
            "path = \"style.css\"\nalias = \"css/\"",
        ] {
            let text = format!("[[bundle]]\nprefix = \"/app\"\n[[bundle.file]]\n{entry}\n");
            let manifest = Manifest::parse(&text).unwrap();
            let err = manifest.compile(&dirs).err().unwrap();
            assert!(err.to_string().contains("does not name a resource file"), "{err}");
        }
    }
}
