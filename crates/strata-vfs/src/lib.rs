//! # strata-vfs
//!
//! Layered virtual file system for game engines and other asset-heavy hosts.
//!
//! A [`VirtualFileSystem`] stacks containers into one namespace:
//! - Native directories, optionally read-only or size-bounded
//! - In-memory file sets
//! - Redirects into other containers or other file systems
//! - Archives, through a codec-supplied [`ArchivePeer`]
//!
//! Later containers shadow earlier ones, hidden paths mask older layers, and
//! directory searches merge every layer. [`CacheHelper`] builds a slot-based
//! blob cache on top, and [`VfsConfig`] mounts everything from a RON file.

pub mod cache_helper;
pub mod config;
pub mod container;
mod error;
mod file;
pub mod glob;
mod path;
pub mod search;
mod types;
mod vfs;

pub use cache_helper::{CacheHelper, CacheWriter, CompressionMethod};
pub use config::{CacheConfig, MountConfig, MountKind, VfsConfig};
pub use container::{
    ArchiveContainer, ArchivePeer, CacheDiskDirectory, Container, ContainerMeta, DiskDirectory,
    MemoryFile, MemoryFiles, Redirect, RedirectTarget,
};
pub use error::{VfsError, VfsResult};
pub use file::{FileReader, FileWriter};
pub use path::VfsPath;
pub use search::{
    CollectDirectorySearchVisitor, CollectFileSearchVisitor, ContainerFileSearch, SearchVisitor,
};
pub use types::FileType;
pub use vfs::VirtualFileSystem;
