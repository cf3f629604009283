//! Slot-based blob cache stored in a VFS directory.
//!
//! Every cached blob lives in its own file `f<N>`, where `N` is the slot
//! index. The file starts with a header naming the identifier it holds:
//!
//! ```text
//! u16 (little endian)   identifier length
//! [u8; length]          identifier bytes
//! u8                    'z' deflate payload follows, '-' raw payload follows
//! [u8]                  payload
//! ```
//!
//! The slot table is rebuilt from these headers, so a cache directory
//! survives restarts without a separate index file.

use std::io::{self, Read, Write};
use std::sync::Arc;

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use serde::Deserialize;

use crate::error::{VfsError, VfsResult};
use crate::file::{FileReader, FileWriter};
use crate::path::VfsPath;
use crate::search::CollectFileSearchVisitor;
use crate::vfs::VirtualFileSystem;

/// Highest slot index accepted while rebuilding the slot table.
const MAX_SLOT_INDEX: usize = 1 << 20;

const MARKER_DEFLATE: u8 = b'z';
const MARKER_RAW: u8 = b'-';

/// How payloads are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum CompressionMethod {
    /// Raw bytes.
    #[default]
    None,
    /// Deflate stream.
    Deflate,
}

impl CompressionMethod {
    fn marker(self) -> u8 {
        match self {
            CompressionMethod::None => MARKER_RAW,
            CompressionMethod::Deflate => MARKER_DEFLATE,
        }
    }

    fn from_marker(marker: u8) -> Option<Self> {
        match marker {
            MARKER_RAW => Some(CompressionMethod::None),
            MARKER_DEFLATE => Some(CompressionMethod::Deflate),
            _ => None,
        }
    }
}

/// Writer for one cache entry, positioned after the header.
///
/// Dropping the writer completes the entry but swallows I/O errors; call
/// [`CacheWriter::finish`] to observe them.
pub struct CacheWriter {
    inner: CacheWriterInner,
}

enum CacheWriterInner {
    Raw(FileWriter),
    Deflate(DeflateEncoder<FileWriter>),
}

impl CacheWriter {
    /// Flush the payload and close the entry.
    pub fn finish(self) -> io::Result<()> {
        match self.inner {
            CacheWriterInner::Raw(mut w) => w.flush(),
            CacheWriterInner::Deflate(encoder) => encoder.finish()?.flush(),
        }
    }
}

impl Write for CacheWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.inner {
            CacheWriterInner::Raw(w) => w.write(buf),
            CacheWriterInner::Deflate(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.inner {
            CacheWriterInner::Raw(w) => w.flush(),
            CacheWriterInner::Deflate(w) => w.flush(),
        }
    }
}

/// Outcome of opening a slot file for a given identifier.
enum SlotEntry {
    Valid(Box<dyn FileReader>, CompressionMethod),
    /// Missing file, unreadable header or a different identifier.
    Stale,
}

/// Maps cache identifiers to numbered slot files in a VFS directory.
///
/// Not synchronized; share it behind a mutex.
pub struct CacheHelper {
    vfs: Arc<VirtualFileSystem>,
    cache_path: VfsPath,
    mapping: Vec<Option<String>>,
    compression: CompressionMethod,
}

impl std::fmt::Debug for CacheHelper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheHelper")
            .field("cache_path", &self.cache_path)
            .field("mapping", &self.mapping)
            .field("compression", &self.compression)
            .finish_non_exhaustive()
    }
}

fn read_identifier(reader: &mut impl Read) -> io::Result<String> {
    let mut len = [0u8; 2];
    reader.read_exact(&mut len)?;
    let mut id = vec![0u8; usize::from(u16::from_le_bytes(len))];
    reader.read_exact(&mut id)?;
    String::from_utf8(id).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn write_header(writer: &mut impl Write, id: &str, compression: CompressionMethod) -> io::Result<()> {
    let len = u16::try_from(id.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "identifier too long"))?;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(id.as_bytes())?;
    writer.write_all(&[compression.marker()])
}

/// Slot number of a canonical `f<N>` file name (no sign, no leading zeros).
fn slot_index(name: &str) -> Option<usize> {
    let slot: usize = name.strip_prefix('f')?.parse().ok()?;
    (format!("f{slot}") == name).then_some(slot)
}

fn check_id(id: &str) -> VfsResult<()> {
    if id.is_empty() {
        return Err(VfsError::invalid_argument("cache identifier is empty"));
    }
    if id.len() > usize::from(u16::MAX) {
        return Err(VfsError::invalid_argument(format!(
            "cache identifier is {} bytes, at most {} allowed",
            id.len(),
            u16::MAX
        )));
    }
    Ok(())
}

impl CacheHelper {
    /// Open the cache stored in `cache_path` and rebuild its slot table.
    pub fn new(vfs: Arc<VirtualFileSystem>, cache_path: VfsPath) -> VfsResult<Self> {
        let mut helper = Self {
            vfs,
            cache_path,
            mapping: Vec::new(),
            compression: CompressionMethod::None,
        };
        helper.build_mapping()?;
        Ok(helper)
    }

    /// Directory holding the slot files.
    pub fn cache_path(&self) -> &VfsPath {
        &self.cache_path
    }

    /// Compression used for new entries.
    pub fn compression(&self) -> CompressionMethod {
        self.compression
    }

    /// Set the compression used for new entries. Existing entries keep theirs.
    pub fn set_compression(&mut self, compression: CompressionMethod) {
        self.compression = compression;
    }

    /// The slot table: index is the slot number, `None` marks a free slot.
    pub fn slots(&self) -> &[Option<String>] {
        &self.mapping
    }

    /// Slot currently holding `id`.
    pub fn slot_of(&self, id: &str) -> Option<usize> {
        self.mapping.iter().position(|s| s.as_deref() == Some(id))
    }

    fn slot_path(&self, slot: usize) -> VfsResult<VfsPath> {
        self.cache_path.join_component(&format!("f{slot}"))
    }

    /// Rebuild the slot table from the headers of the `f<N>` files on disk.
    pub fn build_mapping(&mut self) -> VfsResult<()> {
        let mut collect = CollectFileSearchVisitor::new("f*", false);
        self.vfs.search(&self.cache_path, &mut collect)?;

        let mut mapping: Vec<Option<String>> = Vec::new();
        for path in collect.into_files() {
            let Some(slot) = slot_index(path.last_component()?) else {
                tracing::trace!(file = %path, "ignoring non-slot file in cache");
                continue;
            };
            if slot > MAX_SLOT_INDEX {
                tracing::warn!(file = %path, "ignoring cache slot beyond limit");
                continue;
            }

            let id = match self.vfs.open_read(&path) {
                Ok(mut reader) => read_identifier(&mut reader),
                Err(e) => Err(io::Error::from(e)),
            };
            let id = match id {
                Ok(id) => id,
                Err(e) => {
                    tracing::warn!(file = %path, error = %e, "skipping unreadable cache slot");
                    continue;
                }
            };

            if mapping.len() <= slot {
                mapping.resize(slot + 1, None);
            }
            mapping[slot] = Some(id);
        }

        tracing::debug!(
            cache = %self.cache_path,
            used = mapping.iter().flatten().count(),
            slots = mapping.len(),
            "rebuilt cache mapping"
        );
        self.mapping = mapping;
        Ok(())
    }

    fn open_slot(&self, slot: usize, id: &str) -> VfsResult<SlotEntry> {
        let path = self.slot_path(slot)?;
        if !self.vfs.exists(&path) {
            return Ok(SlotEntry::Stale);
        }
        // modification time doubles as access time for eviction
        self.vfs.touch(&path)?;

        let mut reader = self.vfs.open_read(&path)?;
        let stored = match read_identifier(&mut reader) {
            Ok(stored) => stored,
            Err(_) => return Ok(SlotEntry::Stale),
        };
        if stored != id {
            return Ok(SlotEntry::Stale);
        }

        let mut marker = [0u8; 1];
        if reader.read_exact(&mut marker).is_err() {
            return Ok(SlotEntry::Stale);
        }
        Ok(match CompressionMethod::from_marker(marker[0]) {
            Some(method) => SlotEntry::Valid(reader, method),
            None => SlotEntry::Stale,
        })
    }

    /// Open the cached entry for `id`, positioned at its payload.
    ///
    /// Returns `Ok(None)` if there is no entry. A slot whose file no longer
    /// matches `id` is freed and reported as no entry.
    pub fn read(&mut self, id: &str) -> VfsResult<Option<Box<dyn Read + Send>>> {
        check_id(id)?;
        let Some(slot) = self.slot_of(id) else {
            return Ok(None);
        };

        match self.open_slot(slot, id)? {
            SlotEntry::Valid(reader, CompressionMethod::None) => Ok(Some(Box::new(reader))),
            SlotEntry::Valid(reader, CompressionMethod::Deflate) => {
                Ok(Some(Box::new(DeflateDecoder::new(reader))))
            }
            SlotEntry::Stale => {
                tracing::debug!(slot, id, "dropping stale cache entry");
                self.mapping[slot] = None;
                Ok(None)
            }
        }
    }

    /// Create or replace the entry for `id`, returning a writer for its payload.
    ///
    /// Reuses the slot already holding `id`, else the first free slot, else
    /// appends a new one.
    pub fn write(&mut self, id: &str) -> VfsResult<CacheWriter> {
        check_id(id)?;
        let slot = self
            .slot_of(id)
            .or_else(|| self.mapping.iter().position(Option::is_none))
            .unwrap_or(self.mapping.len());
        let path = self.slot_path(slot)?;

        let mut writer = self.vfs.open_write(&path)?;
        write_header(&mut writer, id, self.compression)
            .map_err(|e| VfsError::write_failure(path.to_unix(), e))?;

        if slot == self.mapping.len() {
            self.mapping.push(None);
        }
        if self.mapping[slot].is_none() {
            tracing::debug!(slot, id, "allocated cache slot");
        }
        self.mapping[slot] = Some(id.to_string());

        let inner = match self.compression {
            CompressionMethod::None => CacheWriterInner::Raw(writer),
            CompressionMethod::Deflate => {
                CacheWriterInner::Deflate(DeflateEncoder::new(writer, Compression::default()))
            }
        };
        Ok(CacheWriter { inner })
    }

    /// Remove the entry for `id`. Unknown identifiers are ignored.
    pub fn delete(&mut self, id: &str) -> VfsResult<()> {
        check_id(id)?;
        let Some(slot) = self.slot_of(id) else {
            return Ok(());
        };
        self.vfs.delete(&self.slot_path(slot)?)?;
        self.mapping[slot] = None;
        Ok(())
    }

    /// Remove every entry.
    pub fn delete_all(&mut self) -> VfsResult<()> {
        for slot in 0..self.mapping.len() {
            if self.mapping[slot].is_some() {
                self.vfs.delete(&self.slot_path(slot)?)?;
                self.mapping[slot] = None;
            }
        }
        self.mapping.clear();
        tracing::debug!(cache = %self.cache_path, "cleared cache");
        Ok(())
    }
}
