//! The layered file system.
//!
//! Containers are kept in insertion order, which is ascending precedence.
//! Every lookup walks them from the most recently added to the oldest:
//!
//! 1. A container matches if its root path equals or is a parent of the
//!    requested path. The remainder, re-rooted to `/`, is what the container
//!    sees.
//! 2. The first matching container for which the operation's predicate
//!    holds (the file exists, the container can write it, ...) wins.
//! 3. A container that hides the remainder (or one of its ancestors) ends the
//!    walk; older containers are never consulted below a hidden path.
//!
//! Directory searches merge instead of picking a winner, see
//! [`VirtualFileSystem::search`].

use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::SystemTime;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::container::Container;
use crate::error::{VfsError, VfsResult};
use crate::file::{FileReader, FileWriter};
use crate::path::VfsPath;
use crate::search::{ContainerFileSearch, SearchVisitor};
use crate::types::FileType;

/// Ordered stack of containers composed into one namespace.
///
/// The container list sits behind a read-write lock. Operations clone a
/// snapshot of the list and resolve without holding the lock, so visitors
/// may re-enter the file system and containers may be added or removed
/// while other threads resolve paths.
pub struct VirtualFileSystem {
    containers: RwLock<Vec<Arc<dyn Container>>>,
}

impl fmt::Debug for VirtualFileSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let roots: Vec<String> = self
            .containers
            .read()
            .iter()
            .map(|c| c.root_path().to_unix())
            .collect();
        f.debug_struct("VirtualFileSystem")
            .field("containers", &roots)
            .finish()
    }
}

impl Default for VirtualFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

fn same_container(a: &Arc<dyn Container>, b: &Arc<dyn Container>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Relative paths are looked up from `/`.
fn anchored(path: &VfsPath) -> Cow<'_, VfsPath> {
    if path.is_absolute() {
        Cow::Borrowed(path)
    } else {
        Cow::Owned(VfsPath::root().join(path))
    }
}

/// Absolute path of a reported child, skipping names that are not plain components.
fn child_path(directory: &VfsPath, name: &str) -> Option<VfsPath> {
    if matches!(name, "" | "." | "..") {
        return None;
    }
    directory.join_component(name).ok()
}

impl VirtualFileSystem {
    /// Create a file system without containers.
    pub fn new() -> Self {
        Self {
            containers: RwLock::new(Vec::new()),
        }
    }

    /// Add a container on top of every container added before it.
    ///
    /// Adding a container that is already present does nothing.
    pub fn add_container(&self, container: Arc<dyn Container>) {
        let mut containers = self.containers.write();
        if containers.iter().any(|c| same_container(c, &container)) {
            tracing::warn!(root = %container.root_path(), "container already added");
            return;
        }
        tracing::debug!(
            root = %container.root_path(),
            precedence = containers.len(),
            "container added"
        );
        containers.push(container);
    }

    /// Remove a container. Returns `true` if it was present.
    pub fn remove_container(&self, container: &Arc<dyn Container>) -> bool {
        let mut containers = self.containers.write();
        let Some(index) = containers.iter().position(|c| same_container(c, container)) else {
            return false;
        };
        containers.remove(index);
        tracing::debug!(root = %container.root_path(), "container removed");
        true
    }

    /// Remove every container.
    pub fn remove_all_containers(&self) {
        let mut containers = self.containers.write();
        tracing::debug!(count = containers.len(), "removing all containers");
        containers.clear();
    }

    /// Returns true if the container has been added.
    pub fn has_container(&self, container: &Arc<dyn Container>) -> bool {
        self.containers
            .read()
            .iter()
            .any(|c| same_container(c, container))
    }

    /// Number of containers.
    pub fn container_count(&self) -> usize {
        self.containers.read().len()
    }

    /// Snapshot of the containers in ascending precedence.
    pub fn containers(&self) -> Vec<Arc<dyn Container>> {
        self.containers.read().clone()
    }

    /// Walk matching containers from highest precedence down, returning the
    /// first result `probe` produces.
    fn resolve<T>(
        &self,
        path: &VfsPath,
        mut probe: impl FnMut(&dyn Container, &VfsPath) -> Option<T>,
    ) -> Option<T> {
        let path = anchored(path);
        for container in self.containers().iter().rev() {
            let Some(relative) = path.relative_to(container.root_path()) else {
                continue;
            };
            if let Some(found) = probe(container.as_ref(), &relative) {
                return Some(found);
            }
            if container.meta().is_path_hidden_below(&relative) {
                break;
            }
        }
        None
    }

    /// Run `op` on the first container holding `path`.
    fn with_existing<T>(
        &self,
        path: &VfsPath,
        op: impl FnOnce(&dyn Container, &VfsPath) -> VfsResult<T>,
    ) -> VfsResult<T> {
        let mut op = Some(op);
        self.resolve(path, |container, relative| {
            if !container.exists(relative) {
                return None;
            }
            op.take().map(|op| op(container, relative))
        })
        .unwrap_or_else(|| Err(VfsError::not_found(path.to_unix())))
    }

    /// Returns true if any visible container holds `path`.
    pub fn exists(&self, path: &VfsPath) -> bool {
        self.resolve(path, |c, r| c.exists(r).then_some(())).is_some()
    }

    /// Returns true if the container holding `path` allows reading it.
    pub fn can_read(&self, path: &VfsPath) -> bool {
        self.resolve(path, |c, r| c.exists(r).then(|| c.can_read(r)))
            .unwrap_or(false)
    }

    /// Returns true if some visible container can write `path`.
    pub fn can_write(&self, path: &VfsPath) -> bool {
        self.resolve(path, |c, r| c.can_write(r).then_some(())).is_some()
    }

    /// Returns true if some visible container can delete `path`.
    pub fn can_delete(&self, path: &VfsPath) -> bool {
        self.resolve(path, |c, r| c.can_delete(r).then_some(())).is_some()
    }

    /// Open `path` from the highest-precedence container holding it.
    pub fn open_read(&self, path: &VfsPath) -> VfsResult<Box<dyn FileReader>> {
        self.with_existing(path, |c, r| c.open_read(r))
    }

    /// Open `path` for writing in the highest-precedence container that can write it.
    ///
    /// Fails with `InvalidAction` if no visible container accepts the write.
    pub fn open_write(&self, path: &VfsPath) -> VfsResult<FileWriter> {
        self.resolve(path, |c, r| c.can_write(r).then(|| c.open_write(r)))
            .unwrap_or_else(|| {
                Err(VfsError::invalid_action(format!(
                    "no writable container for {path}"
                )))
            })
    }

    /// Delete `path` in the highest-precedence container that can delete it.
    ///
    /// Does nothing if no container can.
    pub fn delete(&self, path: &VfsPath) -> VfsResult<()> {
        self.resolve(path, |c, r| c.can_delete(r).then(|| c.delete(r)))
            .unwrap_or(Ok(()))
    }

    /// Touch `path` in the highest-precedence container that can write it.
    ///
    /// Does nothing if no container can.
    pub fn touch(&self, path: &VfsPath) -> VfsResult<()> {
        self.resolve(path, |c, r| c.can_write(r).then(|| c.touch(r)))
            .unwrap_or(Ok(()))
    }

    /// Kind of entry at `path`.
    pub fn file_type(&self, path: &VfsPath) -> VfsResult<FileType> {
        self.with_existing(path, |c, r| c.file_type(r))
    }

    /// Size in bytes of the file at `path`.
    pub fn file_size(&self, path: &VfsPath) -> VfsResult<u64> {
        self.with_existing(path, |c, r| c.file_size(r))
    }

    /// Last modification time of the file at `path`.
    pub fn modification_time(&self, path: &VfsPath) -> VfsResult<SystemTime> {
        self.with_existing(path, |c, r| c.modification_time(r))
    }

    /// Read a whole file.
    pub fn read_all(&self, path: &VfsPath) -> VfsResult<Vec<u8>> {
        let mut reader = self.open_read(path)?;
        let mut data = Vec::new();
        reader
            .read_to_end(&mut data)
            .map_err(|e| VfsError::read_failure(path.to_unix(), e))?;
        Ok(data)
    }

    /// Replace a whole file.
    pub fn write_all(&self, path: &VfsPath, data: &[u8]) -> VfsResult<()> {
        let mut writer = self.open_write(path)?;
        writer
            .write_all(data)
            .and_then(|()| writer.flush())
            .map_err(|e| VfsError::write_failure(path.to_unix(), e))
    }

    /// Enumerate the immediate children of `directory`.
    ///
    /// Every matching container contributes its entries, walked from highest
    /// precedence down. The first container to report a name decides its
    /// kind. Containers whose root is a direct child of `directory` show up
    /// as directories unless they are hidden. Names under a hidden path of a
    /// container are dropped from the result, including entries of the same
    /// name from older containers, and the walk stops at a container that
    /// hides `directory` itself.
    ///
    /// Files are dispatched first, then special entries, then directories.
    /// A visitor returning `false` ends the search.
    #[tracing::instrument(level = "trace", skip_all, name = "vfs.search", fields(directory = %directory))]
    pub fn search(&self, directory: &VfsPath, visitor: &mut dyn SearchVisitor) -> VfsResult<()> {
        let directory = anchored(directory);
        let mut found: IndexMap<String, FileType> = IndexMap::new();
        let mut suppressed: HashSet<String> = HashSet::new();

        for container in self.containers().iter().rev() {
            let meta = container.meta();
            let root = meta.root_path();

            if !meta.is_hidden() && directory.is_direct_parent_of(root) {
                if let Ok(name) = root.last_component() {
                    if !suppressed.contains(name) {
                        found.entry(name.to_string()).or_insert(FileType::Directory);
                    }
                }
            }

            let Some(relative) = directory.relative_to(root) else {
                continue;
            };
            suppressed.extend(meta.hidden_children_of(&relative).map(str::to_string));

            let mut search = ContainerFileSearch::new(relative.clone());
            container.search(&relative, &mut search)?;
            for (name, kind) in search.into_entries() {
                if !suppressed.contains(&name) {
                    found.entry(name).or_insert(kind);
                }
            }

            if meta.is_path_hidden_below(&relative) {
                break;
            }
        }

        tracing::trace!(entries = found.len(), "search aggregated");

        for wanted in [FileType::RegularFile, FileType::Special, FileType::Directory] {
            for (name, _) in found.iter().filter(|(_, kind)| **kind == wanted) {
                let Some(path) = child_path(&directory, name) else {
                    continue;
                };
                let keep_going = match wanted {
                    FileType::RegularFile => visitor.visit_file(self, &path),
                    FileType::Special => visitor.visit_special(self, &path),
                    FileType::Directory => visitor.visit_directory(self, &path),
                };
                if !keep_going {
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{DiskDirectory, MemoryFile, MemoryFiles};
    use tempfile::TempDir;

    fn p(s: &str) -> VfsPath {
        VfsPath::parse_unix(s).unwrap()
    }

    fn memory(root: &str, files: &[(&str, &str)]) -> MemoryFiles {
        let memory = MemoryFiles::new(p(root));
        for (name, data) in files {
            memory
                .add_file(Arc::new(MemoryFile::with_data(name, *data).unwrap()))
                .unwrap();
        }
        memory
    }

    /// Records every callback in order.
    #[derive(Default)]
    struct Recorder {
        seen: Vec<(FileType, String)>,
        stop_after: Option<usize>,
    }

    impl Recorder {
        fn record(&mut self, kind: FileType, path: &VfsPath) -> bool {
            self.seen.push((kind, path.to_unix()));
            self.stop_after.is_none_or(|n| self.seen.len() < n)
        }
    }

    impl SearchVisitor for Recorder {
        fn visit_file(&mut self, _vfs: &VirtualFileSystem, path: &VfsPath) -> bool {
            self.record(FileType::RegularFile, path)
        }

        fn visit_directory(&mut self, _vfs: &VirtualFileSystem, path: &VfsPath) -> bool {
            self.record(FileType::Directory, path)
        }

        fn visit_special(&mut self, _vfs: &VirtualFileSystem, path: &VfsPath) -> bool {
            self.record(FileType::Special, path)
        }
    }

    fn names(vfs: &VirtualFileSystem, dir: &str) -> Vec<String> {
        let mut recorder = Recorder::default();
        vfs.search(&p(dir), &mut recorder).unwrap();
        let mut names: Vec<_> = recorder.seen.into_iter().map(|(_, path)| path).collect();
        names.sort();
        names
    }

    #[test]
    fn test_container_registry() {
        let vfs = VirtualFileSystem::new();
        let a: Arc<dyn Container> = Arc::new(memory("/", &[]));
        let b: Arc<dyn Container> = Arc::new(memory("/", &[]));

        vfs.add_container(a.clone());
        vfs.add_container(b.clone());
        vfs.add_container(a.clone());
        assert_eq!(vfs.container_count(), 2);
        assert!(vfs.has_container(&b));

        assert!(vfs.remove_container(&a));
        assert!(!vfs.remove_container(&a));
        assert!(!vfs.has_container(&a));
        assert!(same_container(&vfs.containers()[0], &b));

        vfs.remove_all_containers();
        assert_eq!(vfs.container_count(), 0);
    }

    #[test]
    fn test_later_container_shadows_earlier() {
        let vfs = VirtualFileSystem::new();
        vfs.add_container(Arc::new(memory("/", &[("/x", "old"), ("/only-old", "o")])));
        vfs.add_container(Arc::new(memory("/", &[("/x", "new")])));

        assert_eq!(vfs.read_all(&p("/x")).unwrap(), b"new");
        assert_eq!(vfs.read_all(&p("/only-old")).unwrap(), b"o");
        assert!(vfs.read_all(&p("/missing")).unwrap_err().is_not_found());
    }

    #[test]
    fn test_container_sees_path_relative_to_root() {
        let vfs = VirtualFileSystem::new();
        vfs.add_container(Arc::new(memory("/mods/extra", &[("/tex.png", "t")])));

        assert!(vfs.exists(&p("/mods/extra/tex.png")));
        assert!(!vfs.exists(&p("/tex.png")));
        assert_eq!(vfs.file_size(&p("/mods/extra/tex.png")).unwrap(), 1);
        // relative lookups start at the root
        assert!(vfs.exists(&p("mods/extra/tex.png")));
    }

    #[test]
    fn test_hidden_path_stops_resolution() {
        let vfs = VirtualFileSystem::new();
        vfs.add_container(Arc::new(memory("/", &[("/secret/file", "low")])));
        let mut top = memory("/", &[("/public", "p")]);
        top.meta_mut().add_hidden_path(p("/secret"));
        vfs.add_container(Arc::new(top));

        assert!(!vfs.exists(&p("/secret/file")));
        assert!(vfs.exists(&p("/public")));
        assert_eq!(names(&vfs, "/"), ["/public"]);
    }

    #[test]
    fn test_relative_hidden_path_masks_lower_container() {
        let vfs = VirtualFileSystem::new();
        vfs.add_container(Arc::new(memory("/", &[("/secret/file", "low")])));
        let mut top = memory("/", &[("/public", "p")]);
        top.meta_mut().add_hidden_path(p("secret"));
        vfs.add_container(Arc::new(top));

        assert!(!vfs.exists(&p("/secret/file")));
        assert_eq!(names(&vfs, "/"), ["/public"]);
    }

    #[test]
    fn test_hidden_path_owned_by_higher_container_still_resolves() {
        let vfs = VirtualFileSystem::new();
        let mut low = memory("/", &[("/secret/file", "low")]);
        low.meta_mut().add_hidden_path(p("/secret"));
        vfs.add_container(Arc::new(low));
        vfs.add_container(Arc::new(memory("/", &[("/secret/file", "high")])));

        assert_eq!(vfs.read_all(&p("/secret/file")).unwrap(), b"high");
        // hiding only masks the hiding container and older ones
        assert_eq!(names(&vfs, "/"), ["/secret"]);
    }

    #[test]
    fn test_search_merges_and_synthesizes_mount_points() {
        let vfs = VirtualFileSystem::new();
        vfs.add_container(Arc::new(memory("/", &[("/a.txt", "1"), ("/dir/x", "2")])));
        vfs.add_container(Arc::new(memory("/", &[("/b.txt", "3"), ("/a.txt", "4")])));
        vfs.add_container(Arc::new(memory("/mnt", &[("/inner", "5")])));
        let mut hidden = memory("/ghost", &[("/boo", "6")]);
        hidden.meta_mut().set_hidden(true);
        vfs.add_container(Arc::new(hidden));

        assert_eq!(names(&vfs, "/"), ["/a.txt", "/b.txt", "/dir", "/mnt"]);
        assert_eq!(names(&vfs, "/mnt"), ["/mnt/inner"]);
        // hidden containers still list when traversed into
        assert_eq!(names(&vfs, "/ghost"), ["/ghost/boo"]);
    }

    #[test]
    fn test_search_dispatch_order_and_early_stop() {
        let vfs = VirtualFileSystem::new();
        vfs.add_container(Arc::new(memory(
            "/",
            &[("/d1/f", "x"), ("/f1", "x"), ("/d2/f", "x"), ("/f2", "x")],
        )));

        let mut recorder = Recorder::default();
        vfs.search(&VfsPath::root(), &mut recorder).unwrap();
        let kinds: Vec<_> = recorder.seen.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            kinds,
            [
                FileType::RegularFile,
                FileType::RegularFile,
                FileType::Directory,
                FileType::Directory
            ]
        );

        let mut recorder = Recorder {
            stop_after: Some(1),
            ..Recorder::default()
        };
        vfs.search(&VfsPath::root(), &mut recorder).unwrap();
        assert_eq!(recorder.seen.len(), 1);
    }

    #[test]
    fn test_write_goes_to_writable_container() {
        let dir = TempDir::new().unwrap();
        let vfs = VirtualFileSystem::new();
        vfs.add_container(Arc::new(DiskDirectory::new(VfsPath::root(), dir.path())));
        vfs.add_container(Arc::new(memory("/", &[("/ro.txt", "r")])));

        assert!(vfs.can_write(&p("/new.txt")));
        vfs.write_all(&p("/new.txt"), b"written").unwrap();
        assert_eq!(std::fs::read(dir.path().join("new.txt")).unwrap(), b"written");

        assert!(vfs.can_read(&p("/ro.txt")));
        assert!(!vfs.can_delete(&p("/ro.txt")));
        // nothing can delete it, so this is a no-op
        vfs.delete(&p("/ro.txt")).unwrap();
        assert!(vfs.exists(&p("/ro.txt")));
    }

    #[test]
    fn test_write_without_writable_container() {
        let vfs = VirtualFileSystem::new();
        vfs.add_container(Arc::new(memory("/", &[])));
        assert!(matches!(
            vfs.write_all(&p("/x"), b"data"),
            Err(VfsError::InvalidAction(_))
        ));
        vfs.touch(&p("/x")).unwrap();
    }
}
