use log::{debug, info};

use crate::config::TreeConfig;
use crate::error::{DbError, DbResult, PageError};
use crate::storage::buffer_pool::BufferPoolManager;
use crate::storage::header::PageType;
use crate::storage::page::{InternalEntry, LeafEntry, SlottedPage};
use crate::storage::pager::{MemoryPageStore, PageStore};
use crate::storage::{PageId, INVALID_PAGE_ID};

/// Key carried by slot 0 of every internal page: the open lower bound of its
/// leftmost child.
pub const LOWER_BOUND_KEY: i32 = i32::MIN;

/// A B+Tree of `i32 -> i32` laid out on slotted pages.
///
/// Page roles:
///   LEAF page:     sorted `LeafEntry { key, value }` records, linked to its
///                  neighbours through `prev` / `next` page ids.
///   INTERNAL page: sorted `InternalEntry { key, child }` records, one child
///                  per slot. Slot 0 holds `LOWER_BOUND_KEY`; slot i > 0 holds
///                  the smallest key routed to its child. A page with N slots
///                  therefore has N children and N - 1 real separators.
///
///—————————————————————————————————————————————————————————————————————————————————————————————
/// On insert:
///   1. Descend from root to the owning leaf (last slot whose key <= target).
///   2. Existing key: overwrite the value in place.
///   3. Leaf below `order - 1` keys: insert at the sorted position.
///   4. Otherwise split the leaf:
///        • Merge the new entry into the sorted entries, cut at (order + 1) / 2,
///        • Left half stays in the old page, right half goes to a new leaf,
///        • Splice the new leaf into the sibling chain,
///        • Push (first key of right half, new leaf) into the parent.
///   5. A parent already holding `order - 1` separators splits too; its median
///      separator moves up and the right page starts with the median's child
///      under `LOWER_BOUND_KEY`.
///   6. Splitting the root allocates a new internal root with two children.
///—————————————————————————————————————————————————————————————————————————————————————————————
///
/// The tree only ever holds page ids; every access goes back through the
/// buffer pool.
pub struct PagedBPlusTree<S: PageStore = MemoryPageStore> {
    pool: BufferPoolManager<S>,
    root_page_id: PageId,
    first_leaf_page_id: PageId,
    order: usize,
}

impl PagedBPlusTree<MemoryPageStore> {
    pub fn in_memory(config: TreeConfig) -> DbResult<Self> {
        PagedBPlusTree::new(BufferPoolManager::in_memory(), config)
    }
}

impl<S: PageStore> PagedBPlusTree<S> {
    /// Create an empty tree whose root is a fresh leaf page.
    pub fn new(mut pool: BufferPoolManager<S>, config: TreeConfig) -> DbResult<Self> {
        config.validate()?;

        let root = pool.new_page(PageType::Leaf)?;
        pool.flush(root)?;
        info!("PagedBPlusTree::new: order {}, root leaf page {}.", config.order, root);

        Ok(PagedBPlusTree {
            pool,
            root_page_id: root,
            first_leaf_page_id: root,
            order: config.order,
        })
    }

    pub fn root_page_id(&self) -> PageId {
        self.root_page_id
    }

    pub fn first_leaf_page_id(&self) -> PageId {
        self.first_leaf_page_id
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn pool(&self) -> &BufferPoolManager<S> {
        &self.pool
    }

    pub fn into_pool(self) -> BufferPoolManager<S> {
        self.pool
    }

    /// Flush every dirty page and sync the store.
    pub fn flush_all(&mut self) -> DbResult<()> {
        self.pool.flush_all()
    }

    /// Resident page for a tree-reachable id. A missing page means a dangling
    /// pointer, not an empty node.
    fn page(&self, page_id: PageId) -> DbResult<&SlottedPage> {
        self.pool.get(page_id).ok_or(DbError::PageNotResident(page_id))
    }

    /// Child of an internal page that owns `key`.
    fn route(page: &SlottedPage, key: i32) -> DbResult<PageId> {
        let slot = match page.find_exact(key) {
            Some(slot) => slot,
            None => page.find_insertion_point(key).checked_sub(1).ok_or_else(|| {
                DbError::CorruptTree(format!(
                    "internal page {} has no lower bound for key {}",
                    page.page_id(),
                    key
                ))
            })?,
        };
        Ok(page.get_internal_entry(slot)?.child)
    }

    /// Descend from the root to the leaf page that owns `key`.
    pub fn find_leaf(&self, key: i32) -> DbResult<PageId> {
        let mut page_id = self.root_page_id;
        loop {
            let page = self.page(page_id)?;
            if page.is_leaf() {
                debug!("find_leaf: key={} lives in leaf {}.", key, page_id);
                return Ok(page_id);
            }
            let child = Self::route(page, key)?;
            debug!("  → internal {}: descending to child {} for key={}", page_id, child, key);
            page_id = child;
        }
    }

    /// Value stored under `key`, if any.
    pub fn search(&self, key: i32) -> DbResult<Option<i32>> {
        let leaf_id = self.find_leaf(key)?;
        let leaf = self.page(leaf_id)?;
        match leaf.find_exact(key) {
            Some(slot) => {
                debug!("search: key={} found in leaf {} slot {}.", key, leaf_id, slot);
                Ok(Some(leaf.get_leaf_entry(slot)?.value))
            }
            None => {
                debug!("search: key={} not in leaf {}.", key, leaf_id);
                Ok(None)
            }
        }
    }

    /// Insert or overwrite `key`. Page overflow is handled by splitting and
    /// never surfaces to the caller.
    pub fn insert(&mut self, key: i32, value: i32) -> DbResult<()> {
        debug!(
            "============================================\n\
             insert() → starting at root {} for key={}",
            self.root_page_id, key
        );

        let leaf_id = self.find_leaf(key)?;
        let leaf = self.pool.fetch(leaf_id);

        if let Some(slot) = leaf.find_exact(key) {
            leaf.update_leaf_value(slot, value)?;
            debug!("  → key={} already in leaf {}, value overwritten.", key, leaf_id);
            return self.pool.flush(leaf_id);
        }

        if (leaf.key_count() as usize) < self.order - 1 {
            match leaf.insert_leaf_entry(key, value) {
                Ok(slot) => {
                    debug!("  → inserted key={} into leaf {} at slot {}.", key, leaf_id, slot);
                    return self.pool.flush(leaf_id);
                }
                Err(PageError::OutOfSpace { required, available }) => {
                    debug!(
                        "  → leaf {} out of space ({} needed, {} free), splitting.",
                        leaf_id, required, available
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.split_leaf(leaf_id, LeafEntry { key, value })
    }

    /// Remove `key` and return its value. The leaf is compacted; nodes are not
    /// merged, so separators above stay valid lower bounds.
    pub fn remove(&mut self, key: i32) -> DbResult<Option<i32>> {
        let leaf_id = self.find_leaf(key)?;
        let leaf = self.pool.fetch(leaf_id);
        let Some(slot) = leaf.find_exact(key) else {
            debug!("remove: key={} not in leaf {}.", key, leaf_id);
            return Ok(None);
        };

        let value = leaf.get_leaf_entry(slot)?.value;
        leaf.delete(slot)?;
        leaf.compact();
        debug!("remove: key={} dropped from leaf {}.", key, leaf_id);
        self.pool.flush(leaf_id)?;
        Ok(Some(value))
    }

    /// Cut point for an overfull node of `len` entries.
    fn split_point(&self, len: usize) -> usize {
        ((self.order + 1) / 2).min(len - 1).max(1)
    }

    fn fill_leaf(page: &mut SlottedPage, entries: &[LeafEntry]) -> DbResult<()> {
        page.reset(PageType::Leaf);
        for entry in entries {
            page.insert_leaf_entry(entry.key, entry.value)?;
        }
        Ok(())
    }

    fn fill_internal(page: &mut SlottedPage, entries: &[InternalEntry]) -> DbResult<()> {
        page.reset(PageType::Internal);
        for entry in entries {
            page.insert_internal_entry(entry.key, entry.child)?;
        }
        Ok(())
    }

    /// Split a full leaf while inserting `incoming`.
    fn split_leaf(&mut self, leaf_id: PageId, incoming: LeafEntry) -> DbResult<()> {
        let (mut entries, links) = {
            let leaf = self.page(leaf_id)?;
            (leaf.leaf_entries()?, leaf.links())
        };
        let pos = entries.partition_point(|e| e.key < incoming.key);
        entries.insert(pos, incoming);

        let mid = self.split_point(entries.len());
        let (left, right) = entries.split_at(mid);
        let new_leaf_id = self.pool.new_page(PageType::Leaf)?;

        debug!(
            "split_leaf: leaf {} -> {}, left {} keys, right {} keys.",
            leaf_id,
            new_leaf_id,
            left.len(),
            right.len()
        );

        {
            let leaf = self.pool.fetch(leaf_id);
            Self::fill_leaf(leaf, left)?;
            leaf.set_next(new_leaf_id);
        }
        {
            let new_leaf = self.pool.fetch(new_leaf_id);
            Self::fill_leaf(new_leaf, right)?;
            new_leaf.set_prev(leaf_id);
            new_leaf.set_next(links.next);
            new_leaf.set_parent(links.parent);
        }
        if links.next != INVALID_PAGE_ID {
            self.pool.fetch(links.next).set_prev(new_leaf_id);
        }

        let separator = right[0].key;
        debug!("  → separator key for parent: {}.", separator);

        self.insert_in_parent(leaf_id, separator, new_leaf_id)?;
        self.pool.flush(leaf_id)?;
        self.pool.flush(new_leaf_id)
    }

    /// Hook `new_page` into the tree next to `old_page`, with `separator` as
    /// its lower bound. Grows a new root when `old_page` was the root.
    fn insert_in_parent(&mut self, old_page: PageId, separator: i32, new_page: PageId) -> DbResult<()> {
        if old_page == self.root_page_id {
            let new_root = self.pool.new_page(PageType::Internal)?;
            {
                let root = self.pool.fetch(new_root);
                root.insert_internal_entry(LOWER_BOUND_KEY, old_page)?;
                root.insert_internal_entry(separator, new_page)?;
            }
            self.pool.fetch(old_page).set_parent(new_root);
            self.pool.fetch(new_page).set_parent(new_root);
            self.root_page_id = new_root;
            self.pool.flush(new_root)?;

            info!(
                "insert_in_parent: root {} split, new root is page {} (separator {}).",
                old_page, new_root, separator
            );
            return Ok(());
        }

        let parent = self.page(old_page)?.links().parent;
        if parent == INVALID_PAGE_ID {
            return Err(DbError::CorruptTree(format!(
                "non-root page {} has no parent",
                old_page
            )));
        }
        debug!(
            "insert_in_parent: inserting separator {} -> {} into parent {}.",
            separator, new_page, parent
        );
        self.insert_internal(parent, separator, new_page)
    }

    /// Add `(key, child)` to internal page `page_id`, splitting it if it is full.
    fn insert_internal(&mut self, page_id: PageId, key: i32, child: PageId) -> DbResult<()> {
        let page = self.pool.fetch(page_id);
        let separators = (page.key_count() as usize).saturating_sub(1);

        if separators < self.order - 1 {
            match page.insert_internal_entry(key, child) {
                Ok(slot) => {
                    debug!("  → separator {} stored in internal {} at slot {}.", key, page_id, slot);
                    self.pool.fetch(child).set_parent(page_id);
                    return self.pool.flush(page_id);
                }
                Err(PageError::OutOfSpace { .. }) => {
                    debug!("  → internal {} out of space, splitting.", page_id);
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.split_internal(page_id, InternalEntry { key, child })
    }

    /// Split a full internal page while inserting `incoming`. The median
    /// separator moves up and is not kept in either half.
    fn split_internal(&mut self, page_id: PageId, incoming: InternalEntry) -> DbResult<()> {
        let (mut entries, links) = {
            let page = self.page(page_id)?;
            (page.internal_entries()?, page.links())
        };
        let pos = entries.partition_point(|e| e.key < incoming.key);
        entries.insert(pos, incoming);

        // Slot 0 is the lower bound, the separators are entries[1..].
        let mid = self.split_point(entries.len() - 1);
        let median_idx = mid + 1;
        let median = entries[median_idx].key;

        let left = &entries[..median_idx];
        let mut right = entries[median_idx..].to_vec();
        right[0].key = LOWER_BOUND_KEY;

        let new_page_id = self.pool.new_page(PageType::Internal)?;
        debug!(
            "split_internal: internal {} -> {}, median {}, left {} children, right {} children.",
            page_id,
            new_page_id,
            median,
            left.len(),
            right.len()
        );

        Self::fill_internal(self.pool.fetch(page_id), left)?;
        {
            let new_page = self.pool.fetch(new_page_id);
            Self::fill_internal(new_page, &right)?;
            new_page.set_parent(links.parent);
        }

        for entry in left {
            self.pool.fetch(entry.child).set_parent(page_id);
        }
        for entry in &right {
            self.pool.fetch(entry.child).set_parent(new_page_id);
        }

        self.insert_in_parent(page_id, median, new_page_id)?;
        self.pool.flush(page_id)?;
        self.pool.flush(new_page_id)
    }

    /// Entries with keys in `[start, end]`, ascending.
    pub fn range(&self, start: i32, end: i32) -> DbResult<Vec<(i32, i32)>> {
        debug!("range: [{}, {}]", start, end);
        self.range_iter(start, end)?
            .map(|entry| entry.map(|e| (e.key, e.value)))
            .collect()
    }

    /// Lazy form of `range`: walks the leaf chain starting at the leaf that
    /// owns `start`.
    pub fn range_iter(&self, start: i32, end: i32) -> DbResult<Cursor<'_, S>> {
        if start > end {
            return Ok(Cursor::exhausted(self));
        }
        let leaf_id = self.find_leaf(start)?;
        let slot = self.page(leaf_id)?.find_insertion_point(start);
        Ok(Cursor {
            tree: self,
            page_id: leaf_id,
            slot,
            end: Some(end),
            done: false,
        })
    }

    /// Every entry in key order, following the leaf chain from the first leaf.
    pub fn iter(&self) -> Cursor<'_, S> {
        Cursor {
            tree: self,
            page_id: self.first_leaf_page_id,
            slot: 0,
            end: None,
            done: false,
        }
    }

    pub fn scan_all(&self) -> DbResult<Vec<(i32, i32)>> {
        self.iter().map(|entry| entry.map(|e| (e.key, e.value))).collect()
    }

    pub fn len(&self) -> DbResult<usize> {
        self.iter().try_fold(0, |count, entry| entry.map(|_| count + 1))
    }

    pub fn is_empty(&self) -> DbResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Number of levels, a lone leaf root being 1.
    pub fn height(&self) -> DbResult<usize> {
        let mut height = 1;
        let mut page_id = self.root_page_id;
        loop {
            let page = self.page(page_id)?;
            if page.is_leaf() {
                return Ok(height);
            }
            page_id = page.get_internal_entry(0)?.child;
            height += 1;
        }
    }

    /// Walk the whole tree and check its structure: sorted pages, lower-bound
    /// slots, parent links, key bounds, uniform leaf depth and a leaf chain that
    /// visits leaves in tree order.
    pub fn check_structure(&self) -> DbResult<()> {
        let mut leaves = Vec::new();
        let mut leaf_depth = None;
        self.check_node(
            self.root_page_id,
            INVALID_PAGE_ID,
            None,
            None,
            1,
            &mut leaf_depth,
            &mut leaves,
        )?;

        if leaves.first() != Some(&self.first_leaf_page_id) {
            return Err(DbError::CorruptTree(format!(
                "first leaf is {:?}, expected {}",
                leaves.first(),
                self.first_leaf_page_id
            )));
        }

        let mut chain = Vec::new();
        let mut prev = INVALID_PAGE_ID;
        let mut page_id = self.first_leaf_page_id;
        while page_id != INVALID_PAGE_ID {
            let links = self.page(page_id)?.links();
            if links.prev != prev {
                return Err(DbError::CorruptTree(format!(
                    "leaf {} has prev {}, expected {}",
                    page_id, links.prev, prev
                )));
            }
            chain.push(page_id);
            prev = page_id;
            page_id = links.next;
        }
        if chain != leaves {
            return Err(DbError::CorruptTree(format!(
                "leaf chain {:?} differs from tree order {:?}",
                chain, leaves
            )));
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn check_node(
        &self,
        page_id: PageId,
        parent: PageId,
        low: Option<i32>,
        high: Option<i32>,
        depth: usize,
        leaf_depth: &mut Option<usize>,
        leaves: &mut Vec<PageId>,
    ) -> DbResult<()> {
        let page = self.page(page_id)?;
        if page.links().parent != parent {
            return Err(DbError::CorruptTree(format!(
                "page {} has parent {}, expected {}",
                page_id,
                page.links().parent,
                parent
            )));
        }
        page.header().check_layout()?;

        let keys: Vec<i32> = if page.is_leaf() {
            page.leaf_entries()?.iter().map(|e| e.key).collect()
        } else {
            page.internal_entries()?.iter().map(|e| e.key).collect()
        };
        if keys.windows(2).any(|w| w[0] >= w[1]) {
            return Err(DbError::CorruptTree(format!("page {} keys out of order: {:?}", page_id, keys)));
        }
        let bounded = |k: &i32| low.is_none_or(|lo| *k >= lo) && high.is_none_or(|hi| *k < hi);

        if page.is_leaf() {
            if !keys.iter().all(bounded) {
                return Err(DbError::CorruptTree(format!(
                    "leaf {} keys {:?} escape bounds [{:?}, {:?})",
                    page_id, keys, low, high
                )));
            }
            match *leaf_depth {
                Some(d) if d != depth => {
                    return Err(DbError::CorruptTree(format!(
                        "leaf {} at depth {}, others at {}",
                        page_id, depth, d
                    )));
                }
                _ => *leaf_depth = Some(depth),
            }
            leaves.push(page_id);
            return Ok(());
        }

        let entries = page.internal_entries()?;
        if entries.first().map(|e| e.key) != Some(LOWER_BOUND_KEY) {
            return Err(DbError::CorruptTree(format!(
                "internal {} does not start with the lower bound",
                page_id
            )));
        }
        if !entries[1..].iter().map(|e| e.key).all(|k| bounded(&k)) {
            return Err(DbError::CorruptTree(format!(
                "internal {} separators escape bounds",
                page_id
            )));
        }
        for (idx, entry) in entries.iter().enumerate() {
            let child_low = if idx == 0 { low } else { Some(entry.key) };
            let child_high = entries.get(idx + 1).map(|e| e.key).or(high);
            self.check_node(entry.child, page_id, child_low, child_high, depth + 1, leaf_depth, leaves)?;
        }
        Ok(())
    }
}

/// Forward cursor over the leaf chain. Yields entries in key order and stops
/// after the first key past `end`.
pub struct Cursor<'a, S: PageStore> {
    tree: &'a PagedBPlusTree<S>,
    page_id: PageId,
    slot: u16,
    end: Option<i32>,
    done: bool,
}

impl<'a, S: PageStore> Cursor<'a, S> {
    fn exhausted(tree: &'a PagedBPlusTree<S>) -> Self {
        Cursor {
            tree,
            page_id: INVALID_PAGE_ID,
            slot: 0,
            end: None,
            done: true,
        }
    }
}

impl<S: PageStore> Iterator for Cursor<'_, S> {
    type Item = DbResult<LeafEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done || self.page_id == INVALID_PAGE_ID {
                return None;
            }
            let page = match self.tree.page(self.page_id) {
                Ok(page) => page,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };

            if self.slot >= page.key_count() {
                // Move on to the next leaf in the chain.
                self.page_id = page.links().next;
                self.slot = 0;
                continue;
            }

            let slot = self.slot;
            self.slot += 1;
            let entry = match page.get_leaf_entry(slot) {
                Ok(entry) => entry,
                Err(PageError::SlotDeleted(_)) => continue,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            };

            if self.end.is_some_and(|end| entry.key > end) {
                self.done = true;
                return None;
            }
            return Some(Ok(entry));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(order: usize) -> PagedBPlusTree {
        PagedBPlusTree::in_memory(TreeConfig::new(order).unwrap()).unwrap()
    }

    fn leaf_keys(tree: &PagedBPlusTree, page_id: PageId) -> Vec<i32> {
        tree.page(page_id)
            .unwrap()
            .leaf_entries()
            .unwrap()
            .iter()
            .map(|e| e.key)
            .collect()
    }

    fn root_entries(tree: &PagedBPlusTree) -> Vec<InternalEntry> {
        tree.page(tree.root_page_id()).unwrap().internal_entries().unwrap()
    }

    #[test]
    fn new_tree_is_a_single_empty_leaf() {
        let t = tree(4);
        assert_eq!(t.root_page_id(), t.first_leaf_page_id());
        assert_eq!(t.height().unwrap(), 1);
        assert!(t.is_empty().unwrap());
        assert_eq!(t.search(1).unwrap(), None);
        t.check_structure().unwrap();
    }

    #[test]
    fn rejects_invalid_order() {
        let err = PagedBPlusTree::in_memory(TreeConfig { order: 1 }).err().unwrap();
        assert!(matches!(err, DbError::InvalidOrder(1)));
    }

    #[test]
    fn first_leaf_split_creates_internal_root() {
        let mut t = tree(4);
        for key in [10, 20, 5, 15] {
            t.insert(key, key * 100).unwrap();
        }
        assert_eq!(t.height().unwrap(), 2);

        let root = root_entries(&t);
        assert_eq!(root.len(), 2);
        assert_eq!(root[0].key, LOWER_BOUND_KEY);
        assert_eq!(root[1].key, 15);
        assert_eq!(leaf_keys(&t, root[0].child), vec![5, 10]);
        assert_eq!(leaf_keys(&t, root[1].child), vec![15, 20]);
        t.check_structure().unwrap();
    }

    #[test]
    fn eight_keys_at_order_four_split_the_root_once() {
        let mut t = tree(4);
        let first_root = t.root_page_id();
        let mut roots = vec![first_root];
        for key in [10, 20, 5, 15, 25, 30, 35, 40] {
            t.insert(key, key + 1).unwrap();
            if *roots.last().unwrap() != t.root_page_id() {
                roots.push(t.root_page_id());
            }
        }
        assert_eq!(roots.len(), 2, "root changed more than once: {:?}", roots);
        assert_eq!(t.height().unwrap(), 2);

        let separators: Vec<i32> = root_entries(&t)[1..].iter().map(|e| e.key).collect();
        assert_eq!(separators, vec![15, 25, 35]);

        let range = t.range(10, 30).unwrap();
        assert_eq!(range, vec![(10, 11), (15, 16), (20, 21), (25, 26), (30, 31)]);
        assert_eq!(t.search(15).unwrap(), Some(16));
        assert_eq!(t.search(100).unwrap(), None);
        t.check_structure().unwrap();
    }

    #[test]
    fn internal_split_promotes_median_without_copying_it() {
        let mut t = tree(4);
        for key in (1..=9).map(|k| k * 10) {
            t.insert(key, key).unwrap();
        }
        // Leaves [10,20] [30,40] [50,60] [70,80,90]; the fourth separator
        // overflows the root.
        t.insert(100, 100).unwrap();
        assert_eq!(t.height().unwrap(), 3);

        let root = root_entries(&t);
        assert_eq!(root.len(), 2);
        let median = root[1].key;

        let left = t.page(root[0].child).unwrap().internal_entries().unwrap();
        let right = t.page(root[1].child).unwrap().internal_entries().unwrap();
        assert!(left[1..].iter().all(|e| e.key < median));
        assert!(right[1..].iter().all(|e| e.key > median));
        assert_eq!(right[0].key, LOWER_BOUND_KEY);
        assert_eq!(leaf_keys(&t, right[0].child)[0], median);
        t.check_structure().unwrap();
    }

    #[test]
    fn leaf_chain_is_globally_sorted() {
        let mut t = tree(5);
        let mut keys: Vec<i32> = (0..300).map(|i| (i * 7919) % 1009 - 500).collect();
        for &key in &keys {
            t.insert(key, -key).unwrap();
        }
        keys.sort();
        keys.dedup();

        let scanned: Vec<i32> = t.scan_all().unwrap().iter().map(|(k, _)| *k).collect();
        assert_eq!(scanned, keys);
        assert_eq!(t.len().unwrap(), keys.len());
        for &key in &keys {
            assert_eq!(t.search(key).unwrap(), Some(-key));
        }
        t.check_structure().unwrap();
    }

    #[test]
    fn sibling_links_are_spliced_on_split() {
        let mut t = tree(3);
        for key in [1, 2, 3, 4, 5, 6] {
            t.insert(key, key).unwrap();
        }
        let mut forward = Vec::new();
        let mut page_id = t.first_leaf_page_id();
        let mut last = INVALID_PAGE_ID;
        while page_id != INVALID_PAGE_ID {
            let links = t.page(page_id).unwrap().links();
            assert_eq!(links.prev, last);
            forward.extend(leaf_keys(&t, page_id));
            last = page_id;
            page_id = links.next;
        }
        assert_eq!(forward, vec![1, 2, 3, 4, 5, 6]);
        t.check_structure().unwrap();
    }

    #[test]
    fn overwrite_keeps_key_count() {
        let mut t = tree(4);
        for key in [1, 2, 3] {
            t.insert(key, 0).unwrap();
        }
        t.insert(2, 42).unwrap();
        assert_eq!(t.search(2).unwrap(), Some(42));
        assert_eq!(t.len().unwrap(), 3);
        assert_eq!(t.height().unwrap(), 1);
    }

    #[test]
    fn range_edges() {
        let mut t = tree(4);
        for key in 1..=20 {
            t.insert(key, key).unwrap();
        }
        assert!(t.range(30, 10).unwrap().is_empty());
        assert!(t.range(21, 40).unwrap().is_empty());
        assert_eq!(t.range(-5, 2).unwrap(), vec![(1, 1), (2, 2)]);
        assert_eq!(t.range(7, 7).unwrap(), vec![(7, 7)]);
        assert_eq!(t.range(i32::MIN, i32::MAX).unwrap().len(), 20);
    }

    #[test]
    fn remove_then_reinsert() {
        let mut t = tree(4);
        for key in 1..=12 {
            t.insert(key, key * 2).unwrap();
        }
        assert_eq!(t.remove(5).unwrap(), Some(10));
        assert_eq!(t.remove(5).unwrap(), None);
        assert_eq!(t.search(5).unwrap(), None);
        assert_eq!(t.range(4, 6).unwrap(), vec![(4, 8), (6, 12)]);
        t.check_structure().unwrap();

        t.insert(5, 1).unwrap();
        assert_eq!(t.search(5).unwrap(), Some(1));
        t.check_structure().unwrap();
    }

    #[test]
    fn descending_and_extreme_keys() {
        let mut t = tree(3);
        for key in (0..50).rev() {
            t.insert(key, key).unwrap();
        }
        t.insert(i32::MIN, 1).unwrap();
        t.insert(i32::MAX, 2).unwrap();
        assert_eq!(t.search(i32::MIN).unwrap(), Some(1));
        assert_eq!(t.search(i32::MAX).unwrap(), Some(2));
        assert_eq!(t.len().unwrap(), 52);
        t.check_structure().unwrap();
    }

    #[test]
    fn writes_go_through_to_the_store() {
        let mut t = tree(4);
        for key in 1..=10 {
            t.insert(key, key).unwrap();
        }
        let stats = t.pool().stats();
        assert_eq!(stats.dirty_pages, 0);
        assert_eq!(t.pool().store().len(), stats.resident_pages);
    }
}
