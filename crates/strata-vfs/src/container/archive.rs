//! Container view into an opened archive.
//!
//! Archive codecs live outside this crate. They plug in by implementing
//! [`ArchivePeer`]; an [`ArchiveContainer`] mounts a sub-tree of the archive.

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use crate::container::{Container, ContainerMeta};
use crate::error::{VfsError, VfsResult};
use crate::file::{FileReader, FileWriter};
use crate::path::VfsPath;
use crate::search::ContainerFileSearch;
use crate::types::FileType;

/// Format-specific access to an opened archive.
///
/// Paths are absolute within the archive. Archives are read-only unless the
/// codec overrides the write-side methods.
pub trait ArchivePeer: Send + Sync {
    fn exists(&self, path: &VfsPath) -> bool;

    fn can_read(&self, path: &VfsPath) -> bool;

    fn can_write(&self, _path: &VfsPath) -> bool {
        false
    }

    fn can_delete(&self, _path: &VfsPath) -> bool {
        false
    }

    fn open_read(&self, path: &VfsPath) -> VfsResult<Box<dyn FileReader>>;

    fn open_write(&self, path: &VfsPath) -> VfsResult<FileWriter> {
        Err(VfsError::invalid_action(format!("cannot write {path}: archive is read-only")))
    }

    fn delete(&self, path: &VfsPath) -> VfsResult<()> {
        Err(VfsError::invalid_action(format!("cannot delete {path}: archive is read-only")))
    }

    fn touch(&self, path: &VfsPath) -> VfsResult<()> {
        Err(VfsError::invalid_action(format!("cannot touch {path}: archive is read-only")))
    }

    fn search(&self, directory: &VfsPath, search: &mut ContainerFileSearch) -> VfsResult<()>;

    fn file_type(&self, path: &VfsPath) -> VfsResult<FileType>;

    fn file_size(&self, path: &VfsPath) -> VfsResult<u64>;

    fn modification_time(&self, path: &VfsPath) -> VfsResult<SystemTime>;
}

/// Mounts `archive_path` of an archive at a container root.
pub struct ArchiveContainer {
    meta: ContainerMeta,
    archive: Arc<dyn ArchivePeer>,
    archive_path: VfsPath,
}

impl ArchiveContainer {
    /// Mount the whole archive at `root_path`.
    pub fn new(root_path: VfsPath, archive: Arc<dyn ArchivePeer>) -> Self {
        Self::with_archive_path(root_path, archive, VfsPath::root())
    }

    /// Mount the archive sub-tree `archive_path` at `root_path`.
    pub fn with_archive_path(
        root_path: VfsPath,
        archive: Arc<dyn ArchivePeer>,
        archive_path: VfsPath,
    ) -> Self {
        Self {
            meta: ContainerMeta::new(root_path),
            archive,
            archive_path: VfsPath::root().join(&archive_path),
        }
    }

    /// The archive peer.
    pub fn archive(&self) -> &Arc<dyn ArchivePeer> {
        &self.archive
    }

    /// Offset inside the archive.
    pub fn archive_path(&self) -> &VfsPath {
        &self.archive_path
    }

    /// Mutable mount attributes (hidden flag, hidden paths).
    pub fn meta_mut(&mut self) -> &mut ContainerMeta {
        &mut self.meta
    }

    fn in_archive(&self, path: &VfsPath) -> VfsPath {
        if self.archive_path.is_root() {
            path.clone()
        } else {
            self.archive_path.join(path)
        }
    }
}

impl fmt::Debug for ArchiveContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveContainer")
            .field("meta", &self.meta)
            .field("archive_path", &self.archive_path)
            .finish_non_exhaustive()
    }
}

impl Container for ArchiveContainer {
    fn meta(&self) -> &ContainerMeta {
        &self.meta
    }

    fn exists(&self, path: &VfsPath) -> bool {
        self.archive.exists(&self.in_archive(path))
    }

    fn can_read(&self, path: &VfsPath) -> bool {
        self.archive.can_read(&self.in_archive(path))
    }

    fn can_write(&self, path: &VfsPath) -> bool {
        self.archive.can_write(&self.in_archive(path))
    }

    fn can_delete(&self, path: &VfsPath) -> bool {
        self.archive.can_delete(&self.in_archive(path))
    }

    fn open_read(&self, path: &VfsPath) -> VfsResult<Box<dyn FileReader>> {
        self.archive.open_read(&self.in_archive(path))
    }

    fn open_write(&self, path: &VfsPath) -> VfsResult<FileWriter> {
        self.archive.open_write(&self.in_archive(path))
    }

    fn delete(&self, path: &VfsPath) -> VfsResult<()> {
        self.archive.delete(&self.in_archive(path))
    }

    fn touch(&self, path: &VfsPath) -> VfsResult<()> {
        self.archive.touch(&self.in_archive(path))
    }

    fn search(&self, directory: &VfsPath, search: &mut ContainerFileSearch) -> VfsResult<()> {
        self.archive.search(&self.in_archive(directory), search)
    }

    fn file_type(&self, path: &VfsPath) -> VfsResult<FileType> {
        self.archive.file_type(&self.in_archive(path))
    }

    fn file_size(&self, path: &VfsPath) -> VfsResult<u64> {
        self.archive.file_size(&self.in_archive(path))
    }

    fn modification_time(&self, path: &VfsPath) -> VfsResult<SystemTime> {
        self.archive.modification_time(&self.in_archive(path))
    }
}
