//! Structural path model.
//!
//! A [`VfsPath`] is an optional prefix plus an ordered list of components.
//! Relative paths have an empty prefix, absolute paths carry `/` (or a drive
//! prefix such as `C:` for native Windows paths). Parsing resolves `.` and
//! `..` eagerly, so two paths naming the same location compare equal.

use std::fmt;
use std::ops::Add;

use crate::error::{VfsError, VfsResult};
use crate::glob;

/// Prefix of absolute Unix-form paths.
const ROOT_PREFIX: &str = "/";

/// Structural path: prefix plus non-empty components.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VfsPath {
    prefix: String,
    components: Vec<String>,
}

impl VfsPath {
    /// Create an empty relative path.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the absolute root path `/`.
    pub fn root() -> Self {
        Self {
            prefix: ROOT_PREFIX.to_string(),
            components: Vec::new(),
        }
    }

    /// Parse a Unix-form path (`/` separators).
    ///
    /// A leading `/` makes the path absolute. Empty components and `.` are
    /// dropped, `..` removes the previous component and fails with
    /// [`VfsError::InvalidPath`] when there is none.
    pub fn parse_unix(s: &str) -> VfsResult<Self> {
        let (prefix, rest) = match s.strip_prefix('/') {
            Some(rest) => (ROOT_PREFIX.to_string(), rest),
            None => (String::new(), s),
        };
        let mut path = Self {
            prefix,
            components: Vec::new(),
        };
        for part in rest.split('/') {
            path.push_parsed(part, s)?;
        }
        Ok(path)
    }

    /// Parse a path in the host's native form.
    #[cfg(not(windows))]
    pub fn parse_native(s: &str) -> VfsResult<Self> {
        Self::parse_unix(s)
    }

    /// Parse a path in the host's native form.
    ///
    /// Accepts both `\` and `/` as separators and recognizes drive prefixes.
    #[cfg(windows)]
    pub fn parse_native(s: &str) -> VfsResult<Self> {
        let bytes = s.as_bytes();
        let (prefix, rest) = if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
            (s[..2].to_ascii_uppercase(), &s[2..])
        } else if s.starts_with(['\\', '/']) {
            (ROOT_PREFIX.to_string(), &s[1..])
        } else {
            (String::new(), s)
        };
        let mut path = Self {
            prefix,
            components: Vec::new(),
        };
        for part in rest.split(['\\', '/']) {
            path.push_parsed(part, s)?;
        }
        Ok(path)
    }

    fn push_parsed(&mut self, part: &str, source: &str) -> VfsResult<()> {
        match part {
            "" | "." => Ok(()),
            ".." => self
                .components
                .pop()
                .map(|_| ())
                .ok_or_else(|| VfsError::invalid_path(format!("{source}: '..' above root"))),
            name => {
                self.components.push(name.to_string());
                Ok(())
            }
        }
    }

    /// Render in Unix form.
    pub fn to_unix(&self) -> String {
        let body = self.components.join("/");
        match self.prefix.as_str() {
            "" => body,
            ROOT_PREFIX => format!("/{body}"),
            drive => format!("{drive}/{body}"),
        }
    }

    /// Render in the host's native form.
    #[cfg(not(windows))]
    pub fn to_native(&self) -> String {
        self.to_unix()
    }

    /// Render in the host's native form.
    #[cfg(windows)]
    pub fn to_native(&self) -> String {
        let body = self.components.join("\\");
        match self.prefix.as_str() {
            "" => body,
            ROOT_PREFIX => format!("\\{body}"),
            drive => format!("{drive}\\{body}"),
        }
    }

    /// The prefix (`""` for relative paths).
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// All components in order.
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Number of components.
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Returns true if the path has a prefix.
    pub fn is_absolute(&self) -> bool {
        !self.prefix.is_empty()
    }

    /// Returns true if the path has no components.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Returns true for `/`.
    pub fn is_root(&self) -> bool {
        self.prefix == ROOT_PREFIX && self.components.is_empty()
    }

    /// Append one component.
    ///
    /// `.` is ignored and `..` removes the last component. Components may not
    /// be empty or contain `/`.
    pub fn add_component(&mut self, component: &str) -> VfsResult<()> {
        if component.is_empty() || component.contains('/') {
            return Err(VfsError::invalid_path(format!(
                "invalid component '{component}'"
            )));
        }
        self.push_parsed(component, component)
    }

    /// Copy of this path with one more component.
    pub fn join_component(&self, component: &str) -> VfsResult<Self> {
        let mut path = self.clone();
        path.add_component(component)?;
        Ok(path)
    }

    /// Concatenate: keeps this path's prefix and appends `other`'s components.
    ///
    /// `other` is treated as relative; its prefix is ignored.
    pub fn join(&self, other: &VfsPath) -> Self {
        let mut path = self.clone();
        path.components.extend(other.components.iter().cloned());
        path
    }

    /// Remove and return the last component.
    pub fn remove_last(&mut self) -> VfsResult<String> {
        self.components.pop().ok_or(VfsError::EmptyPath)
    }

    /// The last component.
    pub fn last_component(&self) -> VfsResult<&str> {
        self.components
            .last()
            .map(String::as_str)
            .ok_or(VfsError::EmptyPath)
    }

    /// The parent path, or `None` if there are no components.
    pub fn parent(&self) -> Option<Self> {
        if self.components.is_empty() {
            return None;
        }
        let mut parent = self.clone();
        parent.components.pop();
        Some(parent)
    }

    /// Returns true if `other` equals this path or lies below it.
    pub fn is_equal_or_parent_of(&self, other: &VfsPath) -> bool {
        self.prefix == other.prefix
            && self.components.len() <= other.components.len()
            && other.components.starts_with(&self.components)
    }

    /// Returns true if `other` is an immediate child of this path.
    pub fn is_direct_parent_of(&self, other: &VfsPath) -> bool {
        other.components.len() == self.components.len() + 1 && self.is_equal_or_parent_of(other)
    }

    /// The remainder of this path below `base`, re-rooted to `/`.
    ///
    /// Returns `None` if `base` is not equal to or a parent of this path.
    pub fn relative_to(&self, base: &VfsPath) -> Option<Self> {
        if !base.is_equal_or_parent_of(self) {
            return None;
        }
        Some(Self {
            prefix: ROOT_PREFIX.to_string(),
            components: self.components[base.components.len()..].to_vec(),
        })
    }

    /// Match this path against a glob pattern path, component by component.
    ///
    /// An absolute pattern needs the same prefix and the same component
    /// count. A relative pattern is anchored to the tail of this path.
    pub fn matches_pattern(&self, pattern: &VfsPath) -> bool {
        let count = pattern.components.len();
        let tail = if pattern.is_absolute() {
            if pattern.prefix != self.prefix || count != self.components.len() {
                return false;
            }
            &self.components[..]
        } else {
            if count > self.components.len() {
                return false;
            }
            &self.components[self.components.len() - count..]
        };

        pattern
            .components
            .iter()
            .zip(tail)
            .all(|(pat, name)| glob::matches(pat, name))
    }
}

impl fmt::Display for VfsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_unix())
    }
}

impl Add<&VfsPath> for &VfsPath {
    type Output = VfsPath;

    fn add(self, rhs: &VfsPath) -> VfsPath {
        self.join(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> VfsPath {
        VfsPath::parse_unix(s).unwrap()
    }

    #[test]
    fn test_parse_absolute() {
        let path = p("/data/textures/stone.png");
        assert!(path.is_absolute());
        assert_eq!(path.components(), ["data", "textures", "stone.png"]);
        assert_eq!(path.to_unix(), "/data/textures/stone.png");
    }

    #[test]
    fn test_parse_relative() {
        let path = p("a/b");
        assert!(!path.is_absolute());
        assert_eq!(path.to_unix(), "a/b");
    }

    #[test]
    fn test_parse_normalizes() {
        assert_eq!(p("/a//b/./c/"), p("/a/b/c"));
        assert_eq!(p("/a/b/../c"), p("/a/c"));
        assert!(p("/").is_root());
        assert!(p("").is_empty());
    }

    #[test]
    fn test_parent_above_root_fails() {
        assert!(matches!(
            VfsPath::parse_unix("/a/../.."),
            Err(VfsError::InvalidPath(_))
        ));
        assert!(VfsPath::parse_unix("../x").is_err());
    }

    #[test]
    fn test_round_trip() {
        for s in ["/", "", "/a", "a/b/c", "/deep/er/path.txt"] {
            let path = p(s);
            assert_eq!(VfsPath::parse_unix(&path.to_unix()).unwrap(), path);
            assert_eq!(VfsPath::parse_native(&path.to_native()).unwrap(), path);
        }
    }

    #[test]
    fn test_concat() {
        let joined = &p("/mods") + &p("shaders/a.glsl");
        assert_eq!(joined, p("/mods/shaders/a.glsl"));
        // prefix of the right-hand side is ignored
        assert_eq!(p("/x").join(&p("/y")), p("/x/y"));
        assert_eq!(p("rel").join(&p("more")).prefix(), "");
    }

    #[test]
    fn test_components_access() {
        let mut path = p("/a/b");
        assert_eq!(path.last_component().unwrap(), "b");
        assert_eq!(path.remove_last().unwrap(), "b");
        assert_eq!(path.remove_last().unwrap(), "a");
        assert!(matches!(path.remove_last(), Err(VfsError::EmptyPath)));
        assert!(matches!(path.last_component(), Err(VfsError::EmptyPath)));
    }

    #[test]
    fn test_add_component() {
        let mut path = VfsPath::root();
        path.add_component("a").unwrap();
        path.add_component(".").unwrap();
        path.add_component("b").unwrap();
        path.add_component("..").unwrap();
        assert_eq!(path, p("/a"));
        assert!(path.add_component("").is_err());
        assert!(path.add_component("x/y").is_err());
    }

    #[test]
    fn test_parentage() {
        assert!(p("/a").is_equal_or_parent_of(&p("/a")));
        assert!(p("/a").is_equal_or_parent_of(&p("/a/b/c")));
        assert!(!p("/a/b").is_equal_or_parent_of(&p("/a")));
        assert!(!p("/ab").is_equal_or_parent_of(&p("/a/b")));
        assert!(!p("a").is_equal_or_parent_of(&p("/a/b")));
        assert!(p("/").is_direct_parent_of(&p("/a")));
        assert!(!p("/").is_direct_parent_of(&p("/a/b")));
    }

    #[test]
    fn test_relative_to() {
        assert_eq!(p("/data/x/y").relative_to(&p("/data")), Some(p("/x/y")));
        assert_eq!(p("/data").relative_to(&p("/data")), Some(VfsPath::root()));
        assert_eq!(p("/other").relative_to(&p("/data")), None);
    }

    #[test]
    fn test_matches_pattern_absolute() {
        assert!(p("/data/a.txt").matches_pattern(&p("/data/*.txt")));
        assert!(!p("/data/sub/a.txt").matches_pattern(&p("/data/*.txt")));
        assert!(!p("data/a.txt").matches_pattern(&p("/data/*.txt")));
    }

    #[test]
    fn test_matches_pattern_relative_tail() {
        assert!(p("/games/x/title.degame").matches_pattern(&p("*.degame")));
        assert!(p("/games/x/title.degame").matches_pattern(&p("x/*.degame")));
        assert!(!p("/games/y/title.degame").matches_pattern(&p("x/*.degame")));
        assert!(!p("/a").matches_pattern(&p("b/a")));
    }

    #[test]
    fn test_display() {
        assert_eq!(p("/a/b").to_string(), "/a/b");
    }
}
