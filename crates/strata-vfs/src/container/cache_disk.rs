//! Size-bounded native directory.
//!
//! Before every write the occupied size is recomputed and the least recently
//! accessed files are evicted until the directory fits its budget.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use parking_lot::Mutex;

use crate::container::{Container, ContainerMeta, DiskDirectory};
use crate::error::VfsResult;
use crate::file::{FileReader, FileWriter};
use crate::path::VfsPath;
use crate::search::ContainerFileSearch;
use crate::types::FileType;

/// Disk directory that keeps its total size at or below `max_size` bytes.
#[derive(Debug)]
pub struct CacheDiskDirectory {
    disk: DiskDirectory,
    usage: Mutex<Usage>,
}

/// Tracked size and budget, updated together.
#[derive(Debug)]
struct Usage {
    size: u64,
    max_size: u64,
}

impl CacheDiskDirectory {
    /// Mount `native` at `root_path` with a budget of `max_size` bytes.
    ///
    /// The current size is computed immediately; nothing is evicted until
    /// the first write.
    pub fn new(root_path: VfsPath, native: impl Into<PathBuf>, max_size: u64) -> Self {
        let disk = DiskDirectory::new(root_path, native);
        let size = directory_size(disk.native_root());
        Self {
            disk,
            usage: Mutex::new(Usage { size, max_size }),
        }
    }

    /// Size budget in bytes.
    pub fn max_size(&self) -> u64 {
        self.usage.lock().max_size
    }

    /// Change the size budget. Takes effect on the next write.
    pub fn set_max_size(&self, max_size: u64) {
        self.usage.lock().max_size = max_size;
    }

    /// Tracked size in bytes, as of the last recomputation or deletion.
    pub fn current_size(&self) -> u64 {
        self.usage.lock().size
    }

    /// Recompute the occupied size from disk.
    pub fn update_size(&self) -> u64 {
        let size = directory_size(self.disk.native_root());
        self.usage.lock().size = size;
        size
    }

    /// The wrapped disk directory.
    pub fn disk(&self) -> &DiskDirectory {
        &self.disk
    }

    /// Mutable mount attributes (hidden flag, hidden paths).
    pub fn meta_mut(&mut self) -> &mut ContainerMeta {
        self.disk.meta_mut()
    }

    /// Recompute the size and evict oldest-accessed files until within budget.
    ///
    /// Stops early when no regular files remain or a file cannot be removed.
    pub fn enforce_budget(&self) {
        let root = self.disk.native_root();
        let mut usage = self.usage.lock();
        usage.size = directory_size(root);

        while usage.size > usage.max_size {
            let Some(oldest) = oldest_file(root) else {
                break;
            };
            if let Err(e) = fs::remove_file(&oldest.path) {
                tracing::warn!(path = %oldest.path.display(), error = %e, "cache eviction failed");
                break;
            }
            usage.size = usage.size.saturating_sub(oldest.size);
            tracing::debug!(
                path = %oldest.path.display(),
                freed = oldest.size,
                size = usage.size,
                max_size = usage.max_size,
                "evicted cache file"
            );
        }
    }
}

/// Running minimum of the eviction scan.
#[derive(Debug)]
struct OldestFile {
    path: PathBuf,
    accessed: SystemTime,
    size: u64,
}

impl OldestFile {
    fn merge(current: Option<Self>, candidate: Self) -> Option<Self> {
        match current {
            Some(best) if best.accessed <= candidate.accessed => Some(best),
            _ => Some(candidate),
        }
    }
}

/// Visit every regular file below `root`, iteratively.
fn walk_files(root: &Path, mut visit: impl FnMut(PathBuf, &fs::Metadata)) {
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::trace!(dir = %dir.display(), error = %e, "skipping unreadable directory");
                continue;
            }
        };
        for entry in entries.flatten() {
            let Ok(meta) = entry.metadata() else {
                continue;
            };
            if meta.is_dir() {
                pending.push(entry.path());
            } else if meta.is_file() {
                visit(entry.path(), &meta);
            }
        }
    }
}

/// Total size of all regular files below `root`.
fn directory_size(root: &Path) -> u64 {
    let mut total = 0u64;
    walk_files(root, |_, meta| total = total.saturating_add(meta.len()));
    total
}

/// The least recently accessed regular file below `root`.
fn oldest_file(root: &Path) -> Option<OldestFile> {
    let mut oldest = None;
    walk_files(root, |path, meta| {
        let accessed = meta
            .accessed()
            .or_else(|_| meta.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        oldest = OldestFile::merge(
            oldest.take(),
            OldestFile {
                path,
                accessed,
                size: meta.len(),
            },
        );
    });
    oldest
}

impl Container for CacheDiskDirectory {
    fn meta(&self) -> &ContainerMeta {
        self.disk.meta()
    }

    fn exists(&self, path: &VfsPath) -> bool {
        self.disk.exists(path)
    }

    fn can_read(&self, path: &VfsPath) -> bool {
        self.disk.can_read(path)
    }

    fn can_write(&self, path: &VfsPath) -> bool {
        self.disk.can_write(path)
    }

    fn can_delete(&self, path: &VfsPath) -> bool {
        self.disk.can_delete(path)
    }

    fn open_read(&self, path: &VfsPath) -> VfsResult<Box<dyn FileReader>> {
        self.disk.open_read(path)
    }

    fn open_write(&self, path: &VfsPath) -> VfsResult<FileWriter> {
        self.enforce_budget();
        self.disk.open_write(path)
    }

    fn delete(&self, path: &VfsPath) -> VfsResult<()> {
        // only regular files count towards the tracked size
        let freed = match self.disk.file_type(path) {
            Ok(FileType::RegularFile) => self.disk.file_size(path).unwrap_or(0),
            _ => 0,
        };
        self.disk.delete(path)?;
        let mut usage = self.usage.lock();
        usage.size = usage.size.saturating_sub(freed);
        Ok(())
    }

    fn touch(&self, path: &VfsPath) -> VfsResult<()> {
        self.disk.touch(path)
    }

    fn search(&self, directory: &VfsPath, search: &mut ContainerFileSearch) -> VfsResult<()> {
        self.disk.search(directory, search)
    }

    fn file_type(&self, path: &VfsPath) -> VfsResult<FileType> {
        self.disk.file_type(path)
    }

    fn file_size(&self, path: &VfsPath) -> VfsResult<u64> {
        self.disk.file_size(path)
    }

    fn modification_time(&self, path: &VfsPath) -> VfsResult<SystemTime> {
        self.disk.modification_time(path)
    }
}
