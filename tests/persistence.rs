use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};

use pagetree::{
    BufferPoolManager, DbError, FilePageStore, PageError, PageStore, PagedBPlusTree, TreeConfig,
    PAGE_SIZE,
};

fn open_tree(path: &std::path::Path) -> PagedBPlusTree<FilePageStore> {
    let _ = env_logger::builder().is_test(true).try_init();
    let store = FilePageStore::open(path).unwrap();
    PagedBPlusTree::new(BufferPoolManager::new(store), TreeConfig::default()).unwrap()
}

#[test]
fn flushed_pages_reload_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tree.db");
    let mut tree = open_tree(&path);
    for key in 1..=30 {
        tree.insert(key, key).unwrap();
    }
    tree.flush_all().unwrap();

    let root = tree.root_page_id();
    let mut pool = tree.into_pool();
    let pages = pool.stats().resident_pages as u32;
    assert_eq!(pool.store().page_count(), pages + 1);

    for page_id in 1..=pages {
        pool.reload(page_id).unwrap();
    }
    assert!(!pool.get(root).unwrap().is_leaf());
}

#[test]
fn corrupted_file_page_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tree.db");
    let mut tree = open_tree(&path);
    for key in 1..=10 {
        tree.insert(key, key).unwrap();
    }
    let leaf = tree.first_leaf_page_id();
    let mut pool = tree.into_pool();

    {
        let mut file = OpenOptions::new().read(true).write(true).open(&path).unwrap();
        let offset = leaf as u64 * PAGE_SIZE as u64 + 2_000;
        let mut byte = [0u8; 1];
        file.seek(SeekFrom::Start(offset)).unwrap();
        file.read_exact(&mut byte).unwrap();
        byte[0] ^= 0xFF;
        file.seek(SeekFrom::Start(offset)).unwrap();
        file.write_all(&byte).unwrap();
    }

    let err = pool.reload(leaf).unwrap_err();
    assert!(matches!(err, DbError::Page(PageError::ChecksumMismatch { .. })));
}

#[test]
fn reopened_store_does_not_reuse_page_ids() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tree.db");
    let highest = {
        let mut tree = open_tree(&path);
        for key in 1..=20 {
            tree.insert(key, key).unwrap();
        }
        tree.flush_all().unwrap();
        tree.pool().stats().next_page_id
    };

    let mut pool = BufferPoolManager::new(FilePageStore::open(&path).unwrap());
    assert!(u64::from(pool.allocate().unwrap()) >= highest);
}
