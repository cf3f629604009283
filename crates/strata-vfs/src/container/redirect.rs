//! Aliasing container.

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use crate::container::{Container, ContainerMeta};
use crate::error::VfsResult;
use crate::file::{FileReader, FileWriter};
use crate::path::VfsPath;
use crate::search::{ContainerFileSearch, ForwardingVisitor};
use crate::types::FileType;
use crate::vfs::VirtualFileSystem;

/// What a [`Redirect`] forwards to.
#[derive(Clone)]
pub enum RedirectTarget {
    /// A single container; the redirect path is relative to its root.
    Container(Arc<dyn Container>),
    /// A whole file system; the redirect path is an absolute VFS path.
    Vfs(Arc<VirtualFileSystem>),
}

impl fmt::Debug for RedirectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Container(c) => f.debug_tuple("Container").field(c.root_path()).finish(),
            Self::Vfs(vfs) => f.debug_tuple("Vfs").field(vfs).finish(),
        }
    }
}

/// Container that forwards every operation to `target` at `redirect_path + p`.
///
/// A redirect must not point back into the file system it is mounted in,
/// directly or through other redirects; resolution would never terminate.
#[derive(Debug)]
pub struct Redirect {
    meta: ContainerMeta,
    target: RedirectTarget,
    redirect_path: VfsPath,
}

impl Redirect {
    /// Mount `redirect_path` of `target` at `root_path`.
    pub fn new(root_path: VfsPath, redirect_path: VfsPath, target: RedirectTarget) -> Self {
        Self {
            meta: ContainerMeta::new(root_path),
            target,
            redirect_path: VfsPath::root().join(&redirect_path),
        }
    }

    /// Redirect into a container.
    pub fn to_container(
        root_path: VfsPath,
        redirect_path: VfsPath,
        container: Arc<dyn Container>,
    ) -> Self {
        Self::new(root_path, redirect_path, RedirectTarget::Container(container))
    }

    /// Redirect into another file system.
    pub fn to_vfs(root_path: VfsPath, redirect_path: VfsPath, vfs: Arc<VirtualFileSystem>) -> Self {
        Self::new(root_path, redirect_path, RedirectTarget::Vfs(vfs))
    }

    /// The forwarding target.
    pub fn target(&self) -> &RedirectTarget {
        &self.target
    }

    /// Path prepended to every forwarded path.
    pub fn redirect_path(&self) -> &VfsPath {
        &self.redirect_path
    }

    /// Mutable mount attributes (hidden flag, hidden paths).
    pub fn meta_mut(&mut self) -> &mut ContainerMeta {
        &mut self.meta
    }

    fn forward<T>(
        &self,
        path: &VfsPath,
        container: impl FnOnce(&dyn Container, &VfsPath) -> T,
        vfs: impl FnOnce(&VirtualFileSystem, &VfsPath) -> T,
    ) -> T {
        let target = self.redirect_path.join(path);
        match &self.target {
            RedirectTarget::Container(c) => container(c.as_ref(), &target),
            RedirectTarget::Vfs(v) => vfs(v.as_ref(), &target),
        }
    }
}

impl Container for Redirect {
    fn meta(&self) -> &ContainerMeta {
        &self.meta
    }

    fn exists(&self, path: &VfsPath) -> bool {
        self.forward(path, |c, p| c.exists(p), |v, p| v.exists(p))
    }

    fn can_read(&self, path: &VfsPath) -> bool {
        self.forward(path, |c, p| c.can_read(p), |v, p| v.can_read(p))
    }

    fn can_write(&self, path: &VfsPath) -> bool {
        self.forward(path, |c, p| c.can_write(p), |v, p| v.can_write(p))
    }

    fn can_delete(&self, path: &VfsPath) -> bool {
        self.forward(path, |c, p| c.can_delete(p), |v, p| v.can_delete(p))
    }

    fn open_read(&self, path: &VfsPath) -> VfsResult<Box<dyn FileReader>> {
        self.forward(path, |c, p| c.open_read(p), |v, p| v.open_read(p))
    }

    fn open_write(&self, path: &VfsPath) -> VfsResult<FileWriter> {
        self.forward(path, |c, p| c.open_write(p), |v, p| v.open_write(p))
    }

    fn delete(&self, path: &VfsPath) -> VfsResult<()> {
        self.forward(path, |c, p| c.delete(p), |v, p| v.delete(p))
    }

    fn touch(&self, path: &VfsPath) -> VfsResult<()> {
        self.forward(path, |c, p| c.touch(p), |v, p| v.touch(p))
    }

    fn search(&self, directory: &VfsPath, search: &mut ContainerFileSearch) -> VfsResult<()> {
        let target = self.redirect_path.join(directory);
        match &self.target {
            RedirectTarget::Container(c) => c.search(&target, search),
            RedirectTarget::Vfs(v) => v.search(&target, &mut ForwardingVisitor { target: search }),
        }
    }

    fn file_type(&self, path: &VfsPath) -> VfsResult<FileType> {
        self.forward(path, |c, p| c.file_type(p), |v, p| v.file_type(p))
    }

    fn file_size(&self, path: &VfsPath) -> VfsResult<u64> {
        self.forward(path, |c, p| c.file_size(p), |v, p| v.file_size(p))
    }

    fn modification_time(&self, path: &VfsPath) -> VfsResult<SystemTime> {
        self.forward(path, |c, p| c.modification_time(p), |v, p| v.modification_time(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{MemoryFile, MemoryFiles};
    use std::io::Read;

    fn p(s: &str) -> VfsPath {
        VfsPath::parse_unix(s).unwrap()
    }

    fn memory() -> Arc<MemoryFiles> {
        let memory = MemoryFiles::new(VfsPath::root());
        for name in ["/assets/ui/button.png", "/assets/ui/font.ttf", "/other.txt"] {
            memory
                .add_file(Arc::new(MemoryFile::with_data(name, name).unwrap()))
                .unwrap();
        }
        Arc::new(memory)
    }

    #[test]
    fn test_redirect_to_container() {
        let redirect = Redirect::to_container(p("/ui"), p("/assets/ui"), memory());

        assert!(redirect.exists(&p("/button.png")));
        assert!(!redirect.exists(&p("/other.txt")));

        let mut content = String::new();
        redirect
            .open_read(&p("/font.ttf"))
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "/assets/ui/font.ttf");

        let mut search = ContainerFileSearch::new(VfsPath::root());
        redirect.search(&VfsPath::root(), &mut search).unwrap();
        assert_eq!(search.entries().len(), 2);
    }

    #[test]
    fn test_redirect_to_vfs() {
        let inner = Arc::new(VirtualFileSystem::new());
        inner.add_container(memory());

        let redirect = Redirect::to_vfs(p("/alias"), p("/assets"), inner);
        assert_eq!(redirect.file_type(&p("/ui")).unwrap(), FileType::Directory);
        assert_eq!(redirect.file_size(&p("/ui/button.png")).unwrap(), 21);

        let mut search = ContainerFileSearch::new(VfsPath::root());
        redirect.search(&VfsPath::root(), &mut search).unwrap();
        assert_eq!(search.into_entries(), vec![("ui".to_string(), FileType::Directory)]);
    }

    #[test]
    fn test_redirect_relative_path_is_anchored() {
        let redirect = Redirect::to_container(p("/x"), p("assets"), memory());
        assert_eq!(redirect.redirect_path(), &p("/assets"));
    }
}
