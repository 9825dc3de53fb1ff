//! Canonical path arithmetic for `resource:` files.
//!
//! A canonical path starts with `/`, has no `.`, `..` or empty components,
//! and has no trailing `/` unless it is exactly `/`.

/// Normalize `path`, treating it as absolute. `..` above the root stays at the root.
pub fn canonicalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            name => parts.push(name),
        }
    }

    let mut out = String::with_capacity(path.len() + 1);
    for part in &parts {
        out.push('/');
        out.push_str(part);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Last component of a canonical path; `/` for the root.
pub fn basename(path: &str) -> &str {
    match path.rfind('/') {
        Some(cut) if path.len() > 1 => &path[cut + 1..],
        _ => path,
    }
}

/// Parent of a canonical path; `None` for the root.
pub fn parent(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) | None => Some("/"),
        Some(cut) => Some(&path[..cut]),
    }
}

/// What follows `ancestor` in `descendant`, when `descendant` lies strictly below it.
pub fn strip_ancestor<'a>(ancestor: &str, descendant: &'a str) -> Option<&'a str> {
    let rest = if ancestor == "/" {
        descendant.strip_prefix('/')?
    } else {
        descendant.strip_prefix(ancestor)?.strip_prefix('/')?
    };
    (!rest.is_empty()).then_some(rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize() {
        assert_eq!(canonicalize("/"), "/");
        assert_eq!(canonicalize(""), "/");
        assert_eq!(canonicalize("//a///b/"), "/a/b");
        assert_eq!(canonicalize("/a/./b/../c"), "/a/c");
        assert_eq!(canonicalize("/../../etc"), "/etc");
        assert_eq!(canonicalize("a/b"), "/a/b");
        assert_eq!(canonicalize("/a/.../b"), "/a/.../b");
    }

    #[test]
    fn test_basename_and_parent() {
        assert_eq!(basename("/"), "/");
        assert_eq!(basename("/a"), "a");
        assert_eq!(basename("/a/b c"), "b c");
        assert_eq!(parent("/"), None);
        assert_eq!(parent("/a"), Some("/"));
        assert_eq!(parent("/a/b"), Some("/a"));
    }

    #[test]
    fn test_strip_ancestor() {
        assert_eq!(strip_ancestor("/a", "/a/b/c"), Some("b/c"));
        assert_eq!(strip_ancestor("/", "/a"), Some("a"));
        assert_eq!(strip_ancestor("/a", "/a"), None);
        assert_eq!(strip_ancestor("/a", "/ab"), None);
        assert_eq!(strip_ancestor("/", "/"), None);
    }
}
