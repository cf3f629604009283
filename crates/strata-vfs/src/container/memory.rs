//! Read-only container over in-memory blobs.

use std::collections::BTreeSet;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::{Mutex, RwLock};

use crate::container::{Container, ContainerMeta};
use crate::error::{VfsError, VfsResult};
use crate::file::{resolve_seek, FileReader, FileWriter};
use crate::path::VfsPath;
use crate::search::ContainerFileSearch;
use crate::types::FileType;

/// A named blob held in memory.
#[derive(Debug)]
pub struct MemoryFile {
    path: VfsPath,
    filename: String,
    data: RwLock<Vec<u8>>,
    modification_time: RwLock<SystemTime>,
}

impl MemoryFile {
    /// Create an empty file. `filename` is a Unix-form path; relative names
    /// are anchored at `/`.
    pub fn new(filename: &str) -> VfsResult<Self> {
        Self::with_data(filename, Vec::new())
    }

    /// Create a file holding `data`.
    pub fn with_data(filename: &str, data: impl Into<Vec<u8>>) -> VfsResult<Self> {
        let parsed = VfsPath::parse_unix(filename)?;
        if parsed.is_empty() {
            return Err(VfsError::invalid_argument("memory file needs a filename"));
        }
        let path = VfsPath::root().join(&parsed);
        Ok(Self {
            filename: path.to_unix(),
            path,
            data: RwLock::new(data.into()),
            modification_time: RwLock::new(SystemTime::now()),
        })
    }

    /// Filename in Unix form.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Filename as a path.
    pub fn path(&self) -> &VfsPath {
        &self.path
    }

    /// Copy of the current content.
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }

    /// Replace the content and bump the modification time.
    pub fn set_data(&self, data: impl Into<Vec<u8>>) {
        *self.data.write() = data.into();
        self.touch();
    }

    /// Content length in bytes.
    pub fn len(&self) -> u64 {
        self.data.read().len() as u64
    }

    /// Returns true if the file holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Last modification time.
    pub fn modification_time(&self) -> SystemTime {
        *self.modification_time.read()
    }

    /// Set the modification time to now.
    pub fn touch(&self) {
        *self.modification_time.write() = SystemTime::now();
    }
}

/// Read-only container serving a list of [`MemoryFile`]s.
///
/// Directories are implied by file names. The directory index is built on
/// first use and dropped whenever the file list changes.
#[derive(Debug)]
pub struct MemoryFiles {
    meta: ContainerMeta,
    files: RwLock<Vec<Arc<MemoryFile>>>,
    directories: Mutex<Option<Arc<BTreeSet<VfsPath>>>>,
}

impl MemoryFiles {
    /// Create an empty container grafted at `root_path`.
    pub fn new(root_path: VfsPath) -> Self {
        Self {
            meta: ContainerMeta::new(root_path),
            files: RwLock::new(Vec::new()),
            directories: Mutex::new(None),
        }
    }

    /// Mutable mount attributes (hidden flag, hidden paths).
    pub fn meta_mut(&mut self) -> &mut ContainerMeta {
        &mut self.meta
    }

    /// Add a file. Fails with `InvalidArgument` if the name is taken.
    pub fn add_file(&self, file: Arc<MemoryFile>) -> VfsResult<()> {
        let mut files = self.files.write();
        if files.iter().any(|f| f.path == file.path) {
            return Err(VfsError::invalid_argument(format!(
                "memory file {} already exists",
                file.filename
            )));
        }
        files.push(file);
        *self.directories.lock() = None;
        Ok(())
    }

    /// Remove the file at `path`, returning it if present.
    pub fn remove_file(&self, path: &VfsPath) -> Option<Arc<MemoryFile>> {
        let mut files = self.files.write();
        let index = files.iter().position(|f| &f.path == path)?;
        *self.directories.lock() = None;
        Some(files.remove(index))
    }

    /// Remove every file.
    pub fn remove_all_files(&self) {
        let mut files = self.files.write();
        files.clear();
        *self.directories.lock() = None;
    }

    /// The file at `path`.
    pub fn file_named(&self, path: &VfsPath) -> Option<Arc<MemoryFile>> {
        self.files.read().iter().find(|f| &f.path == path).cloned()
    }

    /// Number of files.
    pub fn file_count(&self) -> usize {
        self.files.read().len()
    }

    /// Every directory implied by the current file names, rebuilt if stale.
    fn directories(&self) -> Arc<BTreeSet<VfsPath>> {
        // lock order: files, then directories
        let files = self.files.read();
        let mut cached = self.directories.lock();
        if let Some(index) = cached.as_ref() {
            return Arc::clone(index);
        }

        let mut index = BTreeSet::new();
        for file in files.iter() {
            let mut dir = file.path.parent();
            while let Some(d) = dir {
                dir = d.parent();
                if !index.insert(d) {
                    break;
                }
            }
        }
        tracing::trace!(directories = index.len(), "rebuilt memory directory index");

        let index = Arc::new(index);
        *cached = Some(Arc::clone(&index));
        index
    }

    fn is_directory(&self, path: &VfsPath) -> bool {
        self.directories().contains(path)
    }
}

impl Container for MemoryFiles {
    fn meta(&self) -> &ContainerMeta {
        &self.meta
    }

    fn exists(&self, path: &VfsPath) -> bool {
        self.file_named(path).is_some() || self.is_directory(path)
    }

    fn can_read(&self, path: &VfsPath) -> bool {
        self.file_named(path).is_some()
    }

    fn can_write(&self, _path: &VfsPath) -> bool {
        false
    }

    fn can_delete(&self, _path: &VfsPath) -> bool {
        false
    }

    fn open_read(&self, path: &VfsPath) -> VfsResult<Box<dyn FileReader>> {
        let file = self
            .file_named(path)
            .ok_or_else(|| VfsError::not_found(path.to_unix()))?;
        Ok(Box::new(MemoryFileReader { file, position: 0 }))
    }

    fn open_write(&self, path: &VfsPath) -> VfsResult<FileWriter> {
        Err(VfsError::invalid_action(format!(
            "cannot write {path}: memory files are read-only"
        )))
    }

    fn delete(&self, path: &VfsPath) -> VfsResult<()> {
        if !self.exists(path) {
            return Err(VfsError::not_found(path.to_unix()));
        }
        Err(VfsError::invalid_action(format!(
            "cannot delete {path}: memory files are read-only"
        )))
    }

    fn touch(&self, path: &VfsPath) -> VfsResult<()> {
        if !self.exists(path) {
            return Err(VfsError::not_found(path.to_unix()));
        }
        Err(VfsError::invalid_action(format!(
            "cannot touch {path}: memory files are read-only"
        )))
    }

    fn search(&self, directory: &VfsPath, search: &mut ContainerFileSearch) -> VfsResult<()> {
        let directories = self.directories();
        if !directories.contains(directory) {
            return Ok(());
        }

        let mut seen = BTreeSet::new();
        for file in self.files.read().iter() {
            if directory.is_direct_parent_of(&file.path) {
                if let Ok(name) = file.path.last_component() {
                    seen.insert(name.to_string());
                    search.add(name, FileType::RegularFile);
                }
            }
        }
        for dir in directories.iter().filter(|d| directory.is_direct_parent_of(d)) {
            if let Ok(name) = dir.last_component() {
                if !seen.contains(name) {
                    search.add(name, FileType::Directory);
                }
            }
        }
        Ok(())
    }

    fn file_type(&self, path: &VfsPath) -> VfsResult<FileType> {
        if self.file_named(path).is_some() {
            Ok(FileType::RegularFile)
        } else if self.is_directory(path) {
            Ok(FileType::Directory)
        } else {
            Err(VfsError::not_found(path.to_unix()))
        }
    }

    fn file_size(&self, path: &VfsPath) -> VfsResult<u64> {
        match self.file_named(path) {
            Some(file) => Ok(file.len()),
            None if self.is_directory(path) => Ok(0),
            None => Err(VfsError::not_found(path.to_unix())),
        }
    }

    fn modification_time(&self, path: &VfsPath) -> VfsResult<SystemTime> {
        if let Some(file) = self.file_named(path) {
            return Ok(file.modification_time());
        }
        if !self.is_directory(path) {
            return Err(VfsError::not_found(path.to_unix()));
        }
        // a directory is as new as the newest file below it
        Ok(self
            .files
            .read()
            .iter()
            .filter(|f| path.is_equal_or_parent_of(&f.path))
            .map(|f| f.modification_time())
            .max()
            .unwrap_or(SystemTime::UNIX_EPOCH))
    }
}

/// Reader over a shared memory file.
struct MemoryFileReader {
    file: Arc<MemoryFile>,
    position: u64,
}

impl Read for MemoryFileReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let data = self.file.data.read();
        let start = usize::try_from(self.position).unwrap_or(usize::MAX).min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        self.position += n as u64;
        Ok(n)
    }
}

impl Seek for MemoryFileReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.position = resolve_seek(pos, self.position, self.file.len())?;
        Ok(self.position)
    }
}

impl FileReader for MemoryFileReader {
    fn filename(&self) -> &str {
        &self.file.filename
    }

    fn length(&self) -> u64 {
        self.file.len()
    }
}
