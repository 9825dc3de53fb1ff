//! hako - compile and inspect resource bundles.
//!
//! ## Usage
//!
//! ```bash
//! hako compile app.toml --target app.hako --sourcedir data/
//! hako list app.hako /org/example/app
//! hako details app.hako
//! hako extract app.hako /org/example/app/window.xml > window.xml
//! ```

mod manifest;

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt};

use hako_resource::{LookupFlags, Resource};

use crate::manifest::Manifest;

/// Compile and inspect hako resource bundles.
#[derive(Parser, Debug)]
#[command(name = "hako")]
#[command(about = "Compile and inspect resource bundles")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a bundle from a TOML manifest
    Compile {
        /// Manifest describing the bundle contents
        manifest: PathBuf,

        /// Output bundle file
        #[arg(long)]
        target: PathBuf,

        /// Directories to search for listed files, in order
        #[arg(long)]
        sourcedir: Vec<PathBuf>,
    },

    /// List every file in a bundle, or under PATH
    List {
        bundle: PathBuf,
        path: Option<String>,
    },

    /// List files with their size and compression
    Details {
        bundle: PathBuf,
        path: Option<String>,
    },

    /// Write one file's contents to stdout
    Extract { bundle: PathBuf, path: String },
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(io::stderr).init();

    let args = Args::parse();
    let mut stdout = io::stdout().lock();

    match args.command {
        Command::Compile {
            manifest,
            target,
            mut sourcedir,
        } => {
            if sourcedir.is_empty() {
                if let Some(dir) = manifest.parent() {
                    sourcedir.push(dir.to_path_buf());
                }
            }
            let builder = Manifest::load(&manifest)?.compile(&sourcedir)?;
            builder
                .write_to(&target)
                .with_context(|| format!("failed to write {}", target.display()))?;
            tracing::info!(bundle = %target.display(), files = builder.len(), "bundle written");
        }
        Command::List { bundle, path } => {
            let resource = load(&bundle)?;
            for leaf in leaves(&resource, path.as_deref())? {
                writeln!(stdout, "{leaf}")?;
            }
        }
        Command::Details { bundle, path } => {
            let resource = load(&bundle)?;
            for leaf in leaves(&resource, path.as_deref())? {
                writeln!(stdout, "{}", details_line(&resource, &leaf)?)?;
            }
        }
        Command::Extract { bundle, path } => {
            let resource = load(&bundle)?;
            let data = resource
                .lookup_data(&path, LookupFlags::NONE)
                .with_context(|| format!("failed to extract {path}"))?;
            stdout.write_all(&data)?;
        }
    }

    stdout.flush()?;
    Ok(())
}

fn load(bundle: &Path) -> Result<Resource> {
    Resource::load(bundle).with_context(|| format!("failed to load {}", bundle.display()))
}

/// Sorted leaf paths under `path` (the whole bundle when `None`).
fn leaves(resource: &Resource, path: Option<&str>) -> Result<Vec<String>> {
    let path = path.unwrap_or("/");
    if path != "/" && resource.contains(path) {
        return Ok(vec![path.trim_end_matches('/').to_string()]);
    }

    let mut dir = path.to_string();
    if !dir.ends_with('/') {
        dir.push('/');
    }
    if resource.enumerate_children(&dir, LookupFlags::NONE).is_err() {
        bail!("{path} does not exist in the bundle");
    }

    let mut out = Vec::new();
    let mut pending = vec![dir];
    while let Some(dir) = pending.pop() {
        for name in resource.enumerate_children(&dir, LookupFlags::NONE)? {
            let child = format!("{dir}{name}");
            if name.ends_with('/') {
                pending.push(child);
            } else {
                out.push(child);
            }
        }
    }
    out.sort();
    Ok(out)
}

fn details_line(resource: &Resource, path: &str) -> Result<String> {
    let info = resource.get_info(path, LookupFlags::NONE)?;
    let mode = if info.is_compressed() { 'c' } else { 'u' };
    Ok(format!("{:>6} {mode} {path}", info.size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hako_resource::BundleBuilder;

    fn sample() -> Resource {
        let mut builder = BundleBuilder::new();
        builder.add("/org/app/a.txt", b"alpha").unwrap();
        builder.add_compressed("/org/app/icons/b.png", &[7u8; 300]).unwrap();
        builder.add("/readme", b"").unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn test_leaves_whole_bundle() {
        let resource = sample();
        assert_eq!(
            leaves(&resource, None).unwrap(),
            vec!["/org/app/a.txt", "/org/app/icons/b.png", "/readme"]
        );
    }

    #[test]
    fn test_leaves_under_path() {
        let resource = sample();
        assert_eq!(
            leaves(&resource, Some("/org/app/icons")).unwrap(),
            vec!["/org/app/icons/b.png"]
        );
        assert_eq!(leaves(&resource, Some("/readme")).unwrap(), vec!["/readme"]);
        assert!(leaves(&resource, Some("/missing")).is_err());
    }

    #[test]
    fn test_details_line() {
        let resource = sample();
        assert_eq!(
            details_line(&resource, "/org/app/a.txt").unwrap(),
            "     5 u /org/app/a.txt"
        );
        assert_eq!(
            details_line(&resource, "/org/app/icons/b.png").unwrap(),
            "   300 c /org/app/icons/b.png"
        );
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "hako",
            "compile",
            "app.toml",
            "--target",
            "app.hako",
            "--sourcedir",
            "a",
            "--sourcedir",
            "b",
        ])
        .unwrap();
        match args.command {
            Command::Compile { sourcedir, .. } => assert_eq!(sourcedir.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }
}
