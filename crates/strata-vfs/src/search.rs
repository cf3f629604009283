//! Directory enumeration protocol.
//!
//! Containers report the raw children of one directory into a
//! [`ContainerFileSearch`]. The [`VirtualFileSystem`] merges the reports of
//! every matching container and dispatches typed callbacks to a
//! [`SearchVisitor`]: files first, then special entries, then directories.

use crate::glob;
use crate::path::VfsPath;
use crate::types::FileType;
use crate::vfs::VirtualFileSystem;

/// Receives the entries of a VFS directory search.
///
/// Every callback gets the absolute VFS path of the entry. Returning `false`
/// stops the whole search.
pub trait SearchVisitor {
    /// A regular file was found.
    fn visit_file(&mut self, _vfs: &VirtualFileSystem, _path: &VfsPath) -> bool {
        true
    }

    /// A directory was found. Visitors recurse by searching `path` themselves.
    fn visit_directory(&mut self, _vfs: &VirtualFileSystem, _path: &VfsPath) -> bool {
        true
    }

    /// A special entry was found.
    fn visit_special(&mut self, _vfs: &VirtualFileSystem, _path: &VfsPath) -> bool {
        true
    }
}

/// Collector a container reports the children of one directory into.
#[derive(Debug, Clone)]
pub struct ContainerFileSearch {
    directory: VfsPath,
    entries: Vec<(String, FileType)>,
}

impl ContainerFileSearch {
    /// Start collecting children of `directory` (container-relative).
    pub fn new(directory: VfsPath) -> Self {
        Self {
            directory,
            entries: Vec::new(),
        }
    }

    /// The directory being searched.
    pub fn directory(&self) -> &VfsPath {
        &self.directory
    }

    /// Report one immediate child.
    pub fn add(&mut self, name: impl Into<String>, kind: FileType) {
        self.entries.push((name.into(), kind));
    }

    /// Entries reported so far.
    pub fn entries(&self) -> &[(String, FileType)] {
        &self.entries
    }

    /// Consume the collector.
    pub fn into_entries(self) -> Vec<(String, FileType)> {
        self.entries
    }
}

/// Feeds the results of a VFS search back into a container collector.
pub(crate) struct ForwardingVisitor<'a> {
    pub(crate) target: &'a mut ContainerFileSearch,
}

impl ForwardingVisitor<'_> {
    fn forward(&mut self, path: &VfsPath, kind: FileType) -> bool {
        if let Ok(name) = path.last_component() {
            self.target.add(name, kind);
        }
        true
    }
}

impl SearchVisitor for ForwardingVisitor<'_> {
    fn visit_file(&mut self, _vfs: &VirtualFileSystem, path: &VfsPath) -> bool {
        self.forward(path, FileType::RegularFile)
    }

    fn visit_directory(&mut self, _vfs: &VirtualFileSystem, path: &VfsPath) -> bool {
        self.forward(path, FileType::Directory)
    }

    fn visit_special(&mut self, _vfs: &VirtualFileSystem, path: &VfsPath) -> bool {
        self.forward(path, FileType::Special)
    }
}

/// Collects regular files whose name matches a glob pattern.
///
/// With `recursive` set, directories are searched as they are visited.
#[derive(Debug, Clone)]
pub struct CollectFileSearchVisitor {
    pattern: String,
    recursive: bool,
    files: Vec<VfsPath>,
}

impl CollectFileSearchVisitor {
    /// Collect files matching `pattern`, optionally descending into subdirectories.
    pub fn new(pattern: impl Into<String>, recursive: bool) -> Self {
        Self {
            pattern: pattern.into(),
            recursive,
            files: Vec::new(),
        }
    }

    /// Collected file paths.
    pub fn files(&self) -> &[VfsPath] {
        &self.files
    }

    /// Consume the visitor, returning the collected paths.
    pub fn into_files(self) -> Vec<VfsPath> {
        self.files
    }
}

impl SearchVisitor for CollectFileSearchVisitor {
    fn visit_file(&mut self, _vfs: &VirtualFileSystem, path: &VfsPath) -> bool {
        if let Ok(name) = path.last_component() {
            if glob::matches(&self.pattern, name) {
                self.files.push(path.clone());
            }
        }
        true
    }

    fn visit_directory(&mut self, vfs: &VirtualFileSystem, path: &VfsPath) -> bool {
        if self.recursive {
            if let Err(e) = vfs.search(path, self) {
                tracing::warn!(path = %path, error = %e, "skipping unreadable directory");
            }
        }
        true
    }
}

/// Collects the immediate subdirectories of a directory.
#[derive(Debug, Clone, Default)]
pub struct CollectDirectorySearchVisitor {
    directories: Vec<VfsPath>,
}

impl CollectDirectorySearchVisitor {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Collected directory paths.
    pub fn directories(&self) -> &[VfsPath] {
        &self.directories
    }
}

impl SearchVisitor for CollectDirectorySearchVisitor {
    fn visit_directory(&mut self, _vfs: &VirtualFileSystem, path: &VfsPath) -> bool {
        self.directories.push(path.clone());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_file_search_collects() {
        let mut search = ContainerFileSearch::new(VfsPath::root());
        search.add("a.txt", FileType::RegularFile);
        search.add("sub", FileType::Directory);
        assert!(search.directory().is_root());
        assert_eq!(search.entries().len(), 2);
        assert_eq!(search.into_entries()[1], ("sub".to_string(), FileType::Directory));
    }

    #[test]
    fn test_collect_files_filters_by_pattern() {
        let vfs = VirtualFileSystem::new();
        let mut collect = CollectFileSearchVisitor::new("*.degame", false);
        collect.visit_file(&vfs, &VfsPath::parse_unix("/g/one.degame").unwrap());
        collect.visit_file(&vfs, &VfsPath::parse_unix("/g/readme.txt").unwrap());
        assert_eq!(collect.files().len(), 1);
        assert_eq!(collect.files()[0].to_unix(), "/g/one.degame");
    }
}
