//! Declarative mount configuration.
//!
//! A RON document lists mounts in precedence order (later entries win) and
//! optionally a slot cache:
//!
//! ```ron
//! (
//!     mounts: [
//!         (root: "/", kind: Disk(native: "game/data", read_only: true)),
//!         (root: "/cache", kind: CacheDisk(native: "cache", max_size: 1048576), hidden: true),
//!         (root: "/", kind: Disk(native: "overlay"), hidden_paths: ["/secret"]),
//!     ],
//!     cache: Some((directory: "/cache/shaders", compression: Deflate)),
//! )
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use crate::cache_helper::{CacheHelper, CompressionMethod};
use crate::container::{CacheDiskDirectory, Container, ContainerMeta, DiskDirectory, MemoryFiles};
use crate::error::{VfsError, VfsResult};
use crate::path::VfsPath;
use crate::vfs::VirtualFileSystem;

/// Top-level configuration document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VfsConfig {
    /// Mounts in ascending precedence.
    #[serde(default)]
    pub mounts: Vec<MountConfig>,
    /// Slot cache stored inside the file system.
    #[serde(default)]
    pub cache: Option<CacheConfig>,
    /// Directory relative native paths are resolved against.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

/// One container to mount.
#[derive(Debug, Clone, Deserialize)]
pub struct MountConfig {
    /// VFS path the container is grafted at.
    pub root: String,
    pub kind: MountKind,
    /// Leave the mount point out of parent listings.
    #[serde(default)]
    pub hidden: bool,
    /// Container-relative sub-trees to hide.
    #[serde(default)]
    pub hidden_paths: Vec<String>,
}

/// Container variant to create for a mount.
#[derive(Debug, Clone, Deserialize)]
pub enum MountKind {
    /// Native directory.
    Disk {
        native: PathBuf,
        #[serde(default)]
        read_only: bool,
    },
    /// Native directory with a size budget in bytes.
    CacheDisk { native: PathBuf, max_size: u64 },
    /// Empty in-memory file set, filled in by the application.
    Memory,
}

/// Slot cache location and payload compression.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// VFS directory holding the slot files.
    pub directory: String,
    #[serde(default)]
    pub compression: CompressionMethod,
}

impl CacheConfig {
    /// Open the cache in `vfs`, rebuilding its slot table.
    pub fn open(&self, vfs: Arc<VirtualFileSystem>) -> VfsResult<CacheHelper> {
        let directory = VfsPath::parse_unix(&self.directory)?;
        let mut helper = CacheHelper::new(vfs, VfsPath::root().join(&directory))?;
        helper.set_compression(self.compression);
        Ok(helper)
    }
}

fn apply_visibility(meta: &mut ContainerMeta, mount: &MountConfig) -> VfsResult<()> {
    meta.set_hidden(mount.hidden);
    for hidden in &mount.hidden_paths {
        meta.add_hidden_path(VfsPath::parse_unix(hidden)?);
    }
    Ok(())
}

impl VfsConfig {
    /// Parse a RON document.
    pub fn from_ron(text: &str) -> VfsResult<Self> {
        Ok(ron::from_str(text)?)
    }

    /// Read and parse a RON file. Relative native paths in it are resolved
    /// against the file's directory.
    pub fn load(path: impl AsRef<Path>) -> VfsResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| VfsError::read_failure(path.display().to_string(), e))?;
        let mut config = Self::from_ron(&text)?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        tracing::debug!(
            config = %path.display(),
            mounts = config.mounts.len(),
            "loaded vfs config"
        );
        Ok(config)
    }

    fn native(&self, native: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if native.is_relative() => base.join(native),
            _ => native.to_path_buf(),
        }
    }

    /// Create a file system holding every configured mount.
    pub fn build(&self) -> VfsResult<VirtualFileSystem> {
        let vfs = VirtualFileSystem::new();
        self.mount_into(&vfs)?;
        Ok(vfs)
    }

    /// Add every configured mount on top of `vfs`.
    ///
    /// Returns the created memory containers in declaration order so the
    /// application can fill them.
    pub fn mount_into(&self, vfs: &VirtualFileSystem) -> VfsResult<Vec<Arc<MemoryFiles>>> {
        let mut memory = Vec::new();
        for mount in &self.mounts {
            let root = VfsPath::root().join(&VfsPath::parse_unix(&mount.root)?);
            let container: Arc<dyn Container> = match &mount.kind {
                MountKind::Disk { native, read_only } => {
                    let native = self.native(native);
                    let mut disk = if *read_only {
                        DiskDirectory::read_only(root, native)
                    } else {
                        DiskDirectory::new(root, native)
                    };
                    apply_visibility(disk.meta_mut(), mount)?;
                    Arc::new(disk)
                }
                MountKind::CacheDisk { native, max_size } => {
                    let mut cache = CacheDiskDirectory::new(root, self.native(native), *max_size);
                    apply_visibility(cache.meta_mut(), mount)?;
                    Arc::new(cache)
                }
                MountKind::Memory => {
                    let mut files = MemoryFiles::new(root);
                    apply_visibility(files.meta_mut(), mount)?;
                    let files = Arc::new(files);
                    memory.push(Arc::clone(&files));
                    files
                }
            };
            vfs.add_container(container);
        }
        Ok(memory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        (
            mounts: [
                (root: "/", kind: Disk(native: "game/data", read_only: true)),
                (root: "/cache", kind: CacheDisk(native: "cache", max_size: 1048576), hidden: true),
                (root: "/", kind: Disk(native: "overlay"), hidden_paths: ["/secret"]),
                (root: "/generated", kind: Memory),
            ],
            cache: Some((directory: "/cache/shaders", compression: Deflate)),
        )
    "#;

    #[test]
    fn test_parse_sample() {
        let config = VfsConfig::from_ron(SAMPLE).unwrap();
        assert_eq!(config.mounts.len(), 4);
        assert!(matches!(
            config.mounts[0].kind,
            MountKind::Disk { read_only: true, .. }
        ));
        assert!(config.mounts[1].hidden);
        assert_eq!(config.mounts[2].hidden_paths, ["/secret"]);
        assert!(matches!(config.mounts[3].kind, MountKind::Memory));

        let cache = config.cache.unwrap();
        assert_eq!(cache.directory, "/cache/shaders");
        assert_eq!(cache.compression, CompressionMethod::Deflate);
    }

    #[test]
    fn test_defaults() {
        let config = VfsConfig::from_ron("(mounts: [(root: \"/\", kind: Memory)])").unwrap();
        assert!(!config.mounts[0].hidden);
        assert!(config.mounts[0].hidden_paths.is_empty());
        assert!(config.cache.is_none());
    }

    #[test]
    fn test_bad_document() {
        assert!(matches!(
            VfsConfig::from_ron("(mounts: [(root: 3)])"),
            Err(VfsError::Config(_))
        ));
    }

    #[test]
    fn test_build_applies_visibility() {
        let config = VfsConfig::from_ron(SAMPLE).unwrap();
        let vfs = VirtualFileSystem::new();
        let memory = config.mount_into(&vfs).unwrap();

        assert_eq!(vfs.container_count(), 4);
        assert_eq!(memory.len(), 1);
        assert_eq!(memory[0].root_path().to_unix(), "/generated");

        let containers = vfs.containers();
        assert!(containers[1].meta().is_hidden());
        assert_eq!(containers[2].meta().hidden_paths()[0].to_unix(), "/secret");
    }

    #[test]
    fn test_invalid_root() {
        let config = VfsConfig::from_ron("(mounts: [(root: \"/..\", kind: Memory)])").unwrap();
        assert!(matches!(config.build(), Err(VfsError::InvalidPath(_))));
    }
}
