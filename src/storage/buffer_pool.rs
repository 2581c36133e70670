use std::collections::HashMap;

use log::{debug, warn};

use crate::error::{DbError, DbResult};
use crate::storage::header::PageType;
use crate::storage::page::SlottedPage;
use crate::storage::pager::{MemoryPageStore, PageStore};
use crate::storage::{PageId, INVALID_PAGE_ID};

/// Snapshot of what the pool currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub resident_pages: usize,
    pub dirty_pages: usize,
    /// One past the highest id handed out or seen; `PageId::MAX + 1` once exhausted.
    pub next_page_id: u64,
}

/// Sole owner of every in-memory page, keyed by page id.
///
/// Callers hold page ids, never page references: each access goes through
/// `fetch`/`get` again, so nothing outlives an operation that may add or drop
/// pages.
pub struct BufferPoolManager<S: PageStore = MemoryPageStore> {
    pages: HashMap<PageId, SlottedPage>,
    next_page_id: u64,
    store: S,
}

impl BufferPoolManager<MemoryPageStore> {
    pub fn in_memory() -> Self {
        BufferPoolManager::new(MemoryPageStore::new())
    }
}

impl<S: PageStore> BufferPoolManager<S> {
    /// Page ids continue after whatever the store already covers, so ids are
    /// never reused across reopen.
    pub fn new(store: S) -> Self {
        let next_page_id = u64::from(store.page_count().max(INVALID_PAGE_ID + 1));
        debug!("BufferPoolManager::new: next page id {}.", next_page_id);
        BufferPoolManager {
            pages: HashMap::new(),
            next_page_id,
            store,
        }
    }

    /// Hand out a fresh id. Ids strictly increase and are never reused.
    pub fn allocate(&mut self) -> DbResult<PageId> {
        let page_id = PageId::try_from(self.next_page_id).map_err(|_| DbError::PageIdsExhausted)?;
        self.next_page_id += 1;
        Ok(page_id)
    }

    /// Allocate an id and initialise an empty page of `page_type` under it.
    pub fn new_page(&mut self, page_type: PageType) -> DbResult<PageId> {
        let page_id = self.allocate()?;
        self.pages.insert(page_id, SlottedPage::new(page_id, page_type));
        debug!("new_page: allocated {:?} page {}.", page_type, page_id);
        Ok(page_id)
    }

    /// Keep `allocate` above an id that entered the pool by other means.
    fn reserve(&mut self, page_id: PageId) {
        self.next_page_id = self.next_page_id.max(u64::from(page_id) + 1);
    }

    /// The resident page for `page_id`; an unknown id gets a fresh empty leaf page.
    pub fn fetch(&mut self, page_id: PageId) -> &mut SlottedPage {
        self.reserve(page_id);
        self.pages.entry(page_id).or_insert_with(|| {
            debug!("fetch: page {} not resident, creating empty page.", page_id);
            SlottedPage::new(page_id, PageType::Leaf)
        })
    }

    /// Read-only access that never creates a page.
    pub fn get(&self, page_id: PageId) -> Option<&SlottedPage> {
        self.pages.get(&page_id)
    }

    pub fn is_resident(&self, page_id: PageId) -> bool {
        self.pages.contains_key(&page_id)
    }

    /// Seal the page image and hand it to the store.
    pub fn flush(&mut self, page_id: PageId) -> DbResult<()> {
        let page = self
            .pages
            .get_mut(&page_id)
            .ok_or(DbError::PageNotResident(page_id))?;
        let image = page.store();
        self.store.write_page(page_id, &image)?;
        debug!("flush: wrote page {} to store.", page_id);
        Ok(())
    }

    /// Flush every dirty page, in id order, then sync the store.
    pub fn flush_all(&mut self) -> DbResult<()> {
        let mut dirty: Vec<PageId> = self
            .pages
            .iter()
            .filter(|(_, page)| page.is_dirty())
            .map(|(&id, _)| id)
            .collect();
        dirty.sort_unstable();
        for page_id in &dirty {
            self.flush(*page_id)?;
        }
        self.store.sync()?;
        debug!("flush_all: flushed {} dirty pages.", dirty.len());
        Ok(())
    }

    /// Replace the resident copy of `page_id` with the image in the store.
    ///
    /// The image must pass checksum and magic verification; a corrupt page is
    /// a hard error and the resident copy is left untouched.
    pub fn reload(&mut self, page_id: PageId) -> DbResult<()> {
        let image = self
            .store
            .read_page(page_id)?
            .ok_or(DbError::PageNotFound(page_id))?;

        let mut page = SlottedPage::load(&image).map_err(|e| {
            warn!("reload: page {} is unreadable: {}", page_id, e);
            e
        })?;

        if page.page_id() != page_id {
            return Err(DbError::CorruptTree(format!(
                "store slot {} holds page {}",
                page_id,
                page.page_id()
            )));
        }

        if let Some(old) = self.pages.get(&page_id) {
            let links = old.links();
            page.set_parent(links.parent);
            page.set_prev(links.prev);
            page.set_next(links.next);
        }
        self.pages.insert(page_id, page);
        self.reserve(page_id);
        debug!("reload: page {} materialized from store.", page_id);
        Ok(())
    }

    /// Drop the resident page. Returns whether it was resident.
    pub fn delete(&mut self, page_id: PageId) -> bool {
        let removed = self.pages.remove(&page_id).is_some();
        debug!("delete: page {} (resident: {}).", page_id, removed);
        removed
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            resident_pages: self.pages.len(),
            dirty_pages: self.pages.values().filter(|p| p.is_dirty()).count(),
            next_page_id: self.next_page_id,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }
}
