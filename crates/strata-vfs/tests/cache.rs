//! Integration tests for the slot cache and config-driven mounting.

use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

use strata_vfs::{
    CacheDiskDirectory, CacheHelper, CompressionMethod, MemoryFile, VfsConfig, VfsPath,
    VirtualFileSystem,
};
use tempfile::TempDir;

// ============================================================================
// Shared test setup
// ============================================================================

fn p(s: &str) -> VfsPath {
    VfsPath::parse_unix(s).unwrap()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn store(helper: &mut CacheHelper, id: &str, payload: &[u8]) {
    let mut writer = helper.write(id).unwrap();
    writer.write_all(payload).unwrap();
    writer.finish().unwrap();
}

fn load(helper: &mut CacheHelper, id: &str) -> Option<Vec<u8>> {
    let mut reader = helper.read(id).unwrap()?;
    let mut data = Vec::new();
    reader.read_to_end(&mut data).unwrap();
    Some(data)
}

fn write_config(dir: &Path, text: &str) -> std::path::PathBuf {
    let path = dir.join("vfs.ron");
    std::fs::write(&path, text).unwrap();
    path
}

// ============================================================================
// Slot cache
// ============================================================================

#[test]
fn test_slots_survive_restart() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let vfs = Arc::new(VirtualFileSystem::new());
    vfs.add_container(Arc::new(CacheDiskDirectory::new(
        p("/cache"),
        dir.path(),
        1 << 20,
    )));

    let mut helper = CacheHelper::new(vfs.clone(), p("/cache/shaders")).unwrap();
    helper.set_compression(CompressionMethod::Deflate);
    store(&mut helper, "a", b"first");
    helper.delete("a").unwrap();
    store(&mut helper, "b", b"second");
    store(&mut helper, "c", b"third");
    assert_eq!(helper.slot_of("b"), Some(0));
    assert_eq!(helper.slot_of("c"), Some(1));
    drop(helper);

    let mut restarted = CacheHelper::new(vfs, p("/cache/shaders")).unwrap();
    assert_eq!(
        restarted.slots(),
        [Some("b".to_string()), Some("c".to_string())]
    );
    assert_eq!(load(&mut restarted, "c").unwrap(), b"third");
    assert!(load(&mut restarted, "a").is_none());
}

#[test]
fn test_cache_directory_budget_evicts_old_slots() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let cache_dir = Arc::new(CacheDiskDirectory::new(VfsPath::root(), dir.path(), 2_500));
    let vfs = Arc::new(VirtualFileSystem::new());
    vfs.add_container(cache_dir.clone());

    let mut helper = CacheHelper::new(vfs, VfsPath::root()).unwrap();
    for id in ["one", "two", "three", "four"] {
        store(&mut helper, id, &[7u8; 1_000]);
        let slot = helper.slot_of(id).unwrap();
        let file = dir.path().join(format!("f{slot}"));
        let age = filetime::FileTime::from_unix_time(1_000 + slot as i64, 0);
        filetime::set_file_times(&file, age, age).unwrap();
    }

    // every write checks the budget first, so at most two old entries fit
    // next to the one being written
    assert!(cache_dir.update_size() <= 2_500 + 1_010);
    assert!(!dir.path().join("f0").exists());
    assert!(load(&mut helper, "one").is_none());
    assert_eq!(load(&mut helper, "four").unwrap().len(), 1_000);
}

// ============================================================================
// Config
// ============================================================================

#[test]
fn test_config_file_mounts_and_opens_cache() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("data")).unwrap();
    std::fs::create_dir_all(dir.path().join("overlay/secret")).unwrap();
    std::fs::write(dir.path().join("data/base.txt"), "base").unwrap();
    std::fs::write(dir.path().join("overlay/secret/key"), "k").unwrap();

    let path = write_config(
        dir.path(),
        r#"(
            mounts: [
                (root: "/", kind: Disk(native: "data", read_only: true)),
                (root: "/", kind: Disk(native: "overlay"), hidden_paths: ["/secret"]),
                (root: "/cache", kind: CacheDisk(native: "cache", max_size: 65536), hidden: true),
                (root: "/generated", kind: Memory),
            ],
            cache: Some((directory: "/cache/blobs", compression: Deflate)),
        )"#,
    );

    let config = VfsConfig::load(&path).unwrap();
    let vfs = Arc::new(VirtualFileSystem::new());
    let memory = config.mount_into(&vfs).unwrap();
    assert_eq!(vfs.container_count(), 4);

    memory[0]
        .add_file(Arc::new(MemoryFile::with_data("/made.txt", "m").unwrap()))
        .unwrap();
    assert_eq!(vfs.read_all(&p("/generated/made.txt")).unwrap(), b"m");
    assert_eq!(vfs.read_all(&p("/base.txt")).unwrap(), b"base");
    assert_eq!(vfs.read_all(&p("/secret/key")).unwrap(), b"k");
    vfs.write_all(&p("/saved.txt"), b"s").unwrap();
    assert!(dir.path().join("overlay/saved.txt").is_file());

    let mut helper = config.cache.as_ref().unwrap().open(vfs.clone()).unwrap();
    assert_eq!(helper.compression(), CompressionMethod::Deflate);
    store(&mut helper, "blob", b"payload");
    assert!(dir.path().join("cache/blobs/f0").is_file());
    assert_eq!(load(&mut helper, "blob").unwrap(), b"payload");
}
