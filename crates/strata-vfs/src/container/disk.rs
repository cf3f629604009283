//! Native directory container.
//!
//! Maps the container root 1:1 onto a directory of the host filesystem.

use std::fs::{self, File, Metadata};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use filetime::FileTime;

use crate::container::{Container, ContainerMeta};
use crate::error::{VfsError, VfsResult};
use crate::file::{resolve_seek, FileReader, FileWriter};
use crate::path::VfsPath;
use crate::search::ContainerFileSearch;
use crate::types::FileType;

/// Container backed by a native directory.
///
/// A container path `/a/b` maps to `<native>/a/b`. Since [`VfsPath`]
/// resolves `..` at parse time, container paths cannot leave the native root.
#[derive(Debug, Clone)]
pub struct DiskDirectory {
    meta: ContainerMeta,
    native: PathBuf,
    read_only: bool,
}

impl DiskDirectory {
    /// Mount the native directory `native` at `root_path`.
    pub fn new(root_path: VfsPath, native: impl Into<PathBuf>) -> Self {
        Self {
            meta: ContainerMeta::new(root_path),
            native: native.into(),
            read_only: false,
        }
    }

    /// Mount `native` at `root_path` without write access.
    pub fn read_only(root_path: VfsPath, native: impl Into<PathBuf>) -> Self {
        Self {
            read_only: true,
            ..Self::new(root_path, native)
        }
    }

    /// Set whether this directory is read-only.
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Returns true if write-side operations are refused.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// The native directory this container maps onto.
    pub fn native_root(&self) -> &Path {
        &self.native
    }

    /// Mutable mount attributes (hidden flag, hidden paths).
    pub fn meta_mut(&mut self) -> &mut ContainerMeta {
        &mut self.meta
    }

    /// Native location of a container path.
    pub fn native_path(&self, path: &VfsPath) -> PathBuf {
        let mut full = self.native.clone();
        full.extend(path.components());
        full
    }

    fn stat(&self, path: &VfsPath) -> VfsResult<Metadata> {
        fs::metadata(self.native_path(path)).map_err(|e| map_io(path, e, VfsError::read_failure))
    }

    fn check_writable(&self, path: &VfsPath) -> VfsResult<()> {
        if self.read_only {
            Err(VfsError::invalid_action(format!(
                "{} is on a read-only disk directory",
                path
            )))
        } else {
            Ok(())
        }
    }
}

/// FileNotFound for missing entries, `fallback` for everything else.
fn map_io(path: &VfsPath, e: io::Error, fallback: fn(String, io::Error) -> VfsError) -> VfsError {
    if e.kind() == io::ErrorKind::NotFound {
        VfsError::not_found(path.to_unix())
    } else {
        fallback(path.to_unix(), e)
    }
}

/// Nearest existing native ancestor of `native`, if it is a writable directory.
fn writable_ancestor(native: &Path) -> bool {
    native
        .ancestors()
        .skip(1)
        .find_map(|dir| fs::metadata(dir).ok())
        .is_some_and(|meta| meta.is_dir() && !meta.permissions().readonly())
}

impl Container for DiskDirectory {
    fn meta(&self) -> &ContainerMeta {
        &self.meta
    }

    fn exists(&self, path: &VfsPath) -> bool {
        self.native_path(path).exists()
    }

    fn can_read(&self, path: &VfsPath) -> bool {
        let native = self.native_path(path);
        fs::metadata(&native).is_ok_and(|m| m.is_file()) && File::open(&native).is_ok()
    }

    fn can_write(&self, path: &VfsPath) -> bool {
        if self.read_only {
            return false;
        }
        let native = self.native_path(path);
        match fs::metadata(&native) {
            Ok(meta) => meta.is_file() && !meta.permissions().readonly(),
            Err(_) => writable_ancestor(&native),
        }
    }

    fn can_delete(&self, path: &VfsPath) -> bool {
        if self.read_only || path.is_empty() {
            return false;
        }
        let native = self.native_path(path);
        native.exists() && writable_ancestor(&native)
    }

    fn open_read(&self, path: &VfsPath) -> VfsResult<Box<dyn FileReader>> {
        let native = self.native_path(path);
        let file = File::open(&native).map_err(|e| map_io(path, e, VfsError::read_failure))?;
        let meta = file
            .metadata()
            .map_err(|e| VfsError::read_failure(path.to_unix(), e))?;
        if !meta.is_file() {
            return Err(VfsError::not_found(path.to_unix()));
        }
        Ok(Box::new(DiskFileReader {
            file,
            filename: path.to_unix(),
            length: meta.len(),
        }))
    }

    fn open_write(&self, path: &VfsPath) -> VfsResult<FileWriter> {
        self.check_writable(path)?;
        let native = self.native_path(path);
        if let Some(parent) = native.parent() {
            fs::create_dir_all(parent).map_err(|e| VfsError::write_failure(path.to_unix(), e))?;
        }
        let file = File::create(&native).map_err(|e| VfsError::write_failure(path.to_unix(), e))?;
        Ok(Box::new(file))
    }

    fn delete(&self, path: &VfsPath) -> VfsResult<()> {
        self.check_writable(path)?;
        let native = self.native_path(path);
        let meta = self.stat(path)?;
        let result = if meta.is_dir() {
            fs::remove_dir(&native)
        } else {
            fs::remove_file(&native)
        };
        result.map_err(|e| map_io(path, e, VfsError::write_failure))
    }

    fn touch(&self, path: &VfsPath) -> VfsResult<()> {
        self.check_writable(path)?;
        let native = self.native_path(path);
        if native.exists() {
            filetime::set_file_mtime(&native, FileTime::now())
                .map_err(|e| VfsError::write_failure(path.to_unix(), e))
        } else {
            // missing files are created empty
            self.open_write(path).map(drop)
        }
    }

    fn search(&self, directory: &VfsPath, search: &mut ContainerFileSearch) -> VfsResult<()> {
        let native = self.native_path(directory);
        let entries = match fs::read_dir(&native) {
            Ok(entries) => entries,
            Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory) => {
                return Ok(());
            }
            Err(e) => return Err(VfsError::directory_read_failure(directory.to_unix(), e)),
        };

        for entry in entries {
            let entry = entry.map_err(|e| VfsError::directory_read_failure(directory.to_unix(), e))?;
            let Ok(name) = entry.file_name().into_string() else {
                tracing::warn!(
                    directory = %directory,
                    name = ?entry.file_name(),
                    "skipping entry with non UTF-8 name"
                );
                continue;
            };
            // follow links; dangling ones end up special
            let kind = fs::metadata(entry.path())
                .map(|m| FileType::from_std(m.file_type()))
                .unwrap_or(FileType::Special);
            search.add(name, kind);
        }
        Ok(())
    }

    fn file_type(&self, path: &VfsPath) -> VfsResult<FileType> {
        Ok(FileType::from_std(self.stat(path)?.file_type()))
    }

    fn file_size(&self, path: &VfsPath) -> VfsResult<u64> {
        Ok(self.stat(path)?.len())
    }

    fn modification_time(&self, path: &VfsPath) -> VfsResult<SystemTime> {
        self.stat(path)?
            .modified()
            .map_err(|e| VfsError::read_failure(path.to_unix(), e))
    }
}

/// Reader over a native file.
struct DiskFileReader {
    file: File,
    filename: String,
    length: u64,
}

impl Read for DiskFileReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Seek for DiskFileReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let current = self.file.stream_position()?;
        let target = resolve_seek(pos, current, self.length)?;
        self.file.seek(SeekFrom::Start(target))
    }
}

impl FileReader for DiskFileReader {
    fn filename(&self) -> &str {
        &self.filename
    }

    fn length(&self) -> u64 {
        self.length
    }
}
