//! Open file handles returned by containers.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::{VfsError, VfsResult};

/// A readable, seekable file opened from a container.
///
/// Seeking outside `[0, length]` fails with an `InvalidInput` I/O error
/// converted from [`VfsError::OutOfBoundary`].
pub trait FileReader: Read + Seek + Send {
    /// Name of the file as it was opened (Unix form, container-relative).
    fn filename(&self) -> &str;

    /// Total length in bytes.
    fn length(&self) -> u64;
}

/// A writable file opened from a container. Dropping it closes the file.
pub type FileWriter = Box<dyn Write + Send>;

/// Resolve a seek request against a file of `length` bytes.
pub(crate) fn resolve_seek(pos: SeekFrom, current: u64, length: u64) -> VfsResult<u64> {
    let as_i64 = |v: u64| i64::try_from(v).unwrap_or(i64::MAX);
    let target = match pos {
        SeekFrom::Start(offset) => as_i64(offset),
        SeekFrom::Current(delta) => as_i64(current).saturating_add(delta),
        SeekFrom::End(delta) => as_i64(length).saturating_add(delta),
    };
    if target < 0 || target as u64 > length {
        return Err(VfsError::OutOfBoundary {
            position: target,
            length,
        });
    }
    Ok(target as u64)
}
