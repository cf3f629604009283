//! Containers: the pluggable backends a [`VirtualFileSystem`] layers.
//!
//! Every container is grafted into the VFS namespace at its root path and
//! answers the same capability set. Paths handed to a container are always
//! relative to that root, re-rooted to `/`.
//!
//! - [`DiskDirectory`] - native directory
//! - [`CacheDiskDirectory`] - native directory with a size budget
//! - [`MemoryFiles`] - read-only set of in-memory files
//! - [`Redirect`] - alias of another container or VFS subtree
//! - [`ArchiveContainer`] - view into an opened archive
//!
//! [`VirtualFileSystem`]: crate::VirtualFileSystem

mod archive;
mod cache_disk;
mod disk;
mod memory;
mod redirect;

pub use archive::{ArchiveContainer, ArchivePeer};
pub use cache_disk::CacheDiskDirectory;
pub use disk::DiskDirectory;
pub use memory::{MemoryFile, MemoryFiles};
pub use redirect::{Redirect, RedirectTarget};

use std::time::SystemTime;

use crate::error::VfsResult;
use crate::file::{FileReader, FileWriter};
use crate::path::VfsPath;
use crate::search::ContainerFileSearch;
use crate::types::FileType;

fn anchored(path: VfsPath) -> VfsPath {
    if path.is_absolute() {
        path
    } else {
        VfsPath::root().join(&path)
    }
}

/// Mount attributes shared by every container kind.
#[derive(Debug, Clone)]
pub struct ContainerMeta {
    root_path: VfsPath,
    hidden: bool,
    hidden_paths: Vec<VfsPath>,
}

impl ContainerMeta {
    /// Create attributes for a container grafted at `root_path`.
    ///
    /// Relative roots are anchored at `/`.
    pub fn new(root_path: VfsPath) -> Self {
        Self {
            root_path: anchored(root_path),
            hidden: false,
            hidden_paths: Vec::new(),
        }
    }

    /// Where the container is grafted into the VFS.
    pub fn root_path(&self) -> &VfsPath {
        &self.root_path
    }

    /// Returns true if the mount point is left out of parent listings.
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Set whether the mount point is left out of parent listings.
    pub fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    /// Container-relative sub-trees hidden from listings and lower containers.
    pub fn hidden_paths(&self) -> &[VfsPath] {
        &self.hidden_paths
    }

    /// Hide a container-relative sub-tree. Adding the same path twice is a no-op.
    ///
    /// Relative paths are anchored at `/`.
    pub fn add_hidden_path(&mut self, path: VfsPath) {
        let path = anchored(path);
        if !self.hidden_paths.contains(&path) {
            self.hidden_paths.push(path);
        }
    }

    /// Un-hide a sub-tree. Returns `true` if it was hidden.
    pub fn remove_hidden_path(&mut self, path: &VfsPath) -> bool {
        let path = anchored(path.clone());
        let before = self.hidden_paths.len();
        self.hidden_paths.retain(|p| *p != path);
        before != self.hidden_paths.len()
    }

    /// Remove every hidden path.
    pub fn clear_hidden_paths(&mut self) {
        self.hidden_paths.clear();
    }

    /// Returns true if `path` is a hidden path or lies below one.
    pub fn is_path_hidden_below(&self, path: &VfsPath) -> bool {
        self.hidden_paths.iter().any(|h| h.is_equal_or_parent_of(path))
    }

    /// Names of hidden paths that are immediate children of `directory`.
    pub fn hidden_children_of<'a>(
        &'a self,
        directory: &'a VfsPath,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.hidden_paths
            .iter()
            .filter(move |h| directory.is_direct_parent_of(h))
            .filter_map(|h| h.last_component().ok())
    }
}

/// File capability interface every container implements.
///
/// Capability probes (`exists`, `can_*`) never fail. Everything else fails
/// with [`VfsError::FileNotFound`](crate::VfsError::FileNotFound) when the
/// path is absent and with
/// [`VfsError::InvalidAction`](crate::VfsError::InvalidAction) when the
/// container does not support the operation.
pub trait Container: Send + Sync {
    /// Mount attributes.
    fn meta(&self) -> &ContainerMeta;

    /// Returns true if the path exists in this container.
    fn exists(&self, path: &VfsPath) -> bool;

    /// Returns true if the path can be opened for reading.
    fn can_read(&self, path: &VfsPath) -> bool;

    /// Returns true if the path can be opened for writing.
    fn can_write(&self, path: &VfsPath) -> bool;

    /// Returns true if the path can be deleted.
    fn can_delete(&self, path: &VfsPath) -> bool;

    /// Open a file for reading.
    fn open_read(&self, path: &VfsPath) -> VfsResult<Box<dyn FileReader>>;

    /// Open a file for writing, truncating it and creating missing parents.
    fn open_write(&self, path: &VfsPath) -> VfsResult<FileWriter>;

    /// Delete a file.
    fn delete(&self, path: &VfsPath) -> VfsResult<()>;

    /// Set the modification time of a file to now.
    fn touch(&self, path: &VfsPath) -> VfsResult<()>;

    /// Report every immediate child of `directory` into `search`.
    ///
    /// Does not recurse. A directory the container does not have reports nothing.
    fn search(&self, directory: &VfsPath, search: &mut ContainerFileSearch) -> VfsResult<()>;

    /// Kind of entry at the path.
    fn file_type(&self, path: &VfsPath) -> VfsResult<FileType>;

    /// Size in bytes of the file at the path.
    fn file_size(&self, path: &VfsPath) -> VfsResult<u64>;

    /// Last modification time of the file at the path.
    fn modification_time(&self, path: &VfsPath) -> VfsResult<SystemTime>;

    /// Where the container is grafted into the VFS.
    fn root_path(&self) -> &VfsPath {
        self.meta().root_path()
    }
}
