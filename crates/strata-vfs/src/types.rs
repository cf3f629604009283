//! Core VFS types.

/// Kind of entry a container reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FileType {
    /// Regular file.
    RegularFile,
    /// Directory.
    Directory,
    /// Anything else (device, socket, dangling link, ...).
    Special,
}

impl FileType {
    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, FileType::RegularFile)
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }

    /// Returns true if this is a special entry.
    pub fn is_special(&self) -> bool {
        matches!(self, FileType::Special)
    }

    /// Classify a `std::fs::FileType`.
    pub fn from_std(kind: std::fs::FileType) -> Self {
        if kind.is_file() {
            FileType::RegularFile
        } else if kind.is_dir() {
            FileType::Directory
        } else {
            FileType::Special
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type() {
        assert!(FileType::RegularFile.is_file());
        assert!(!FileType::RegularFile.is_dir());
        assert!(FileType::Directory.is_dir());
        assert!(FileType::Special.is_special());
    }

    #[test]
    fn test_from_std() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("f");
        std::fs::write(&file, b"x").unwrap();

        let meta = std::fs::metadata(&file).unwrap();
        assert_eq!(FileType::from_std(meta.file_type()), FileType::RegularFile);
        let meta = std::fs::metadata(dir.path()).unwrap();
        assert_eq!(FileType::from_std(meta.file_type()), FileType::Directory);
    }
}
