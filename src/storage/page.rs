// ┌───────────────────────────────────────────────────────────────────────┐
// │ Offset                       │ Description                            │
// │──────────────────────────────┼────────────────────────────────────────│
// │ 0 .. HEADER_SIZE             │ PageHeader (see header.rs)             │
// │ HEADER_SIZE .. lower_ptr     │ Slot directory, 8 bytes per slot:      │
// │                              │   [4B offset (u32)][4B length (u32)]   │
// │                              │   grows toward the end of the page     │
// │ lower_ptr .. upper_ptr       │ Free space                             │
// │ upper_ptr .. PAGE_SIZE       │ Data area, records packed downward     │
// └───────────────────────────────────────────────────────────────────────┘
//
// LEAF record:     [4B key (i32)][4B value (i32)]
// INTERNAL record: [4B key (i32)][4B child page (u32)]

use log::debug;

use crate::error::PageError;
use crate::storage::header::{
    finalize_checksum, read_i32, read_u32, write_i32, write_u32, PageHeader, PageType,
    HEADER_SIZE, PAGE_SIZE,
};
use crate::storage::PageId;

pub const SLOT_SIZE: usize = 8;
pub const RECORD_SIZE: usize = 8;

/// How many fixed-size records an empty page can take before it is full.
pub const MAX_RECORDS_PER_PAGE: usize = (PAGE_SIZE - HEADER_SIZE) / (SLOT_SIZE + RECORD_SIZE);

/// Locator of one record inside the data area. `length == 0` is a tombstone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotEntry {
    pub offset: u32,
    pub length: u32,
}

impl SlotEntry {
    pub fn is_tombstone(&self) -> bool {
        self.length == 0
    }

    pub fn to_bytes(&self) -> [u8; SLOT_SIZE] {
        let mut buf = [0u8; SLOT_SIZE];
        write_u32(&mut buf, 0, self.offset);
        write_u32(&mut buf, 4, self.length);
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Self {
        SlotEntry {
            offset: read_u32(buf, 0),
            length: read_u32(buf, 4),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafEntry {
    pub key: i32,
    pub value: i32,
}

impl LeafEntry {
    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut buf = [0u8; RECORD_SIZE];
        write_i32(&mut buf, 0, self.key);
        write_i32(&mut buf, 4, self.value);
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Self {
        LeafEntry {
            key: read_i32(buf, 0),
            value: read_i32(buf, 4),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InternalEntry {
    pub key: i32,
    pub child: PageId,
}

impl InternalEntry {
    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut buf = [0u8; RECORD_SIZE];
        write_i32(&mut buf, 0, self.key);
        write_u32(&mut buf, 4, self.child);
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Self {
        InternalEntry {
            key: read_i32(buf, 0),
            child: read_u32(buf, 4),
        }
    }
}

/// Tree links kept beside the page image. `INVALID_PAGE_ID` means "none".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeLinks {
    pub parent: PageId,
    pub prev: PageId,
    pub next: PageId,
}

/// One 4 KiB slotted page plus its decoded header.
///
/// Every mutation re-serializes the header and refreshes the checksum, so the
/// byte image is always a valid page. Operations that can fail check first and
/// only then write.
pub struct SlottedPage {
    data: Box<[u8; PAGE_SIZE]>,
    header: PageHeader,
    dirty: bool,
    pinned: bool,
    links: NodeLinks,
}

impl SlottedPage {
    pub fn new(page_id: PageId, page_type: PageType) -> Self {
        let mut page = SlottedPage {
            data: Box::new([0u8; PAGE_SIZE]),
            header: PageHeader::new(page_id, page_type),
            dirty: false,
            pinned: false,
            links: NodeLinks::default(),
        };
        page.init(page_id, page_type);
        page
    }

    /// Zero the buffer and write a fresh, empty header.
    pub fn init(&mut self, page_id: PageId, page_type: PageType) {
        self.data.fill(0);
        self.header = PageHeader::new(page_id, page_type);
        self.links = NodeLinks::default();
        self.seal();
    }

    /// Drop every record but keep the page id, LSN and tree links.
    pub fn reset(&mut self, page_type: PageType) {
        let lsn = self.header.lsn;
        self.data.fill(0);
        self.header = PageHeader::new(self.header.page_id, page_type);
        self.header.lsn = lsn;
        self.seal();
    }

    /// Rebuild a page from a stored image. Checksum and magic are verified
    /// before anything else is read, then every slot must point into the data area.
    pub fn load(bytes: &[u8; PAGE_SIZE]) -> Result<Self, PageError> {
        let header = PageHeader::load(bytes)?;
        let page = SlottedPage {
            data: Box::new(*bytes),
            header,
            dirty: false,
            pinned: false,
            links: NodeLinks::default(),
        };
        page.check_slots()?;
        Ok(page)
    }

    /// Each slot, tombstones included, must address a whole record between
    /// `upper_ptr` and the end of the page.
    fn check_slots(&self) -> Result<(), PageError> {
        for slot_idx in 0..self.header.key_count {
            let off = Self::slot_offset(slot_idx);
            let slot = SlotEntry::from_bytes(&self.data[off..off + SLOT_SIZE]);
            let start = slot.offset as usize;
            let in_data_area =
                start >= self.header.upper_ptr as usize && start + RECORD_SIZE <= PAGE_SIZE;
            let known_length = slot.length == 0 || slot.length as usize == RECORD_SIZE;
            if !in_data_area || !known_length {
                return Err(PageError::CorruptSlot {
                    slot: slot_idx,
                    offset: slot.offset,
                    length: slot.length,
                });
            }
        }
        Ok(())
    }

    /// The durable image of this page. Clears the dirty flag.
    pub fn store(&mut self) -> [u8; PAGE_SIZE] {
        self.header.serialize(&mut self.data[..]);
        finalize_checksum(&mut self.data);
        self.dirty = false;
        *self.data
    }

    pub fn image(&self) -> &[u8; PAGE_SIZE] {
        &self.data
    }

    fn seal(&mut self) {
        self.header.serialize(&mut self.data[..]);
        finalize_checksum(&mut self.data);
        self.dirty = true;
    }

    pub fn header(&self) -> &PageHeader {
        &self.header
    }

    pub fn page_id(&self) -> PageId {
        self.header.page_id
    }

    pub fn set_page_id(&mut self, page_id: PageId) {
        self.header.page_id = page_id;
        self.seal();
    }

    pub fn page_type(&self) -> PageType {
        self.header.page_type
    }

    pub fn set_page_type(&mut self, page_type: PageType) {
        self.header.page_type = page_type;
        self.seal();
    }

    pub fn is_leaf(&self) -> bool {
        self.header.page_type == PageType::Leaf
    }

    pub fn key_count(&self) -> u16 {
        self.header.key_count
    }

    pub fn free_space(&self) -> usize {
        (self.header.upper_ptr - self.header.lower_ptr) as usize
    }

    pub fn lsn(&self) -> u64 {
        self.header.lsn
    }

    pub fn set_lsn(&mut self, lsn: u64) {
        self.header.lsn = lsn;
        self.seal();
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    pub fn pin(&mut self) {
        self.pinned = true;
    }

    pub fn unpin(&mut self) {
        self.pinned = false;
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    pub fn links(&self) -> NodeLinks {
        self.links
    }

    pub fn set_parent(&mut self, parent: PageId) {
        self.links.parent = parent;
    }

    pub fn set_prev(&mut self, prev: PageId) {
        self.links.prev = prev;
    }

    pub fn set_next(&mut self, next: PageId) {
        self.links.next = next;
    }

    fn slot_offset(slot_idx: u16) -> usize {
        HEADER_SIZE + slot_idx as usize * SLOT_SIZE
    }

    /// Directory entry at `slot_idx`, tombstones included.
    pub fn slot(&self, slot_idx: u16) -> Option<SlotEntry> {
        if slot_idx >= self.header.key_count {
            return None;
        }
        let off = Self::slot_offset(slot_idx);
        Some(SlotEntry::from_bytes(&self.data[off..off + SLOT_SIZE]))
    }

    fn write_slot(&mut self, slot_idx: u16, slot: SlotEntry) {
        let off = Self::slot_offset(slot_idx);
        self.data[off..off + SLOT_SIZE].copy_from_slice(&slot.to_bytes());
    }

    /// Both record shapes start with the key, so this works for either page type.
    /// Tombstones keep their bytes, so their key still orders correctly.
    fn key_at(&self, slot_idx: u16) -> i32 {
        let off = Self::slot_offset(slot_idx);
        let record_offset = read_u32(&self.data[..], off) as usize;
        read_i32(&self.data[..], record_offset)
    }

    /// First slot whose key is `>= key`, or `key_count` when every key is smaller.
    pub fn find_insertion_point(&self, key: i32) -> u16 {
        let mut left = 0u16;
        let mut right = self.header.key_count;
        while left < right {
            let mid = left + (right - left) / 2;
            if self.key_at(mid) < key {
                left = mid + 1;
            } else {
                right = mid;
            }
        }
        left
    }

    /// Live slot holding exactly `key`.
    pub fn find_exact(&self, key: i32) -> Option<u16> {
        let mut idx = self.find_insertion_point(key);
        while idx < self.header.key_count && self.key_at(idx) == key {
            if self.slot(idx).is_some_and(|s| !s.is_tombstone()) {
                return Some(idx);
            }
            idx += 1;
        }
        None
    }

    /// The exact slot if `key` is present, otherwise the first slot with a larger
    /// key, otherwise `None`. Prefer `find_exact` / `find_insertion_point`.
    pub fn search_key(&self, key: i32) -> Option<u16> {
        if let Some(idx) = self.find_exact(key) {
            return Some(idx);
        }
        let idx = self.find_insertion_point(key);
        (idx < self.header.key_count).then_some(idx)
    }

    /// O(n) scan that does not rely on directory order.
    pub fn linear_search_key(&self, key: i32) -> Option<u16> {
        (0..self.header.key_count).find(|&idx| {
            self.slot(idx).is_some_and(|s| !s.is_tombstone()) && self.key_at(idx) == key
        })
    }

    /// Insert `record` at its sorted position by `key`. Records are exactly
    /// `RECORD_SIZE` bytes and start with their key.
    ///
    /// Fails with `OutOfSpace` before touching the buffer when the record and
    /// its slot do not fit between `lower_ptr` and `upper_ptr`.
    pub fn insert(&mut self, record: &[u8], key: i32) -> Result<u16, PageError> {
        if record.len() != RECORD_SIZE {
            return Err(PageError::RecordSizeMismatch {
                expected: RECORD_SIZE,
                actual: record.len(),
            });
        }
        let required = SLOT_SIZE + record.len();
        let available = self.free_space();
        if available < required {
            return Err(PageError::OutOfSpace { required, available });
        }

        let target = self.find_insertion_point(key);

        // Open a gap in the directory at `target`.
        let dir_start = Self::slot_offset(target);
        let dir_end = self.header.lower_ptr as usize;
        self.data.copy_within(dir_start..dir_end, dir_start + SLOT_SIZE);

        let upper = self.header.upper_ptr as usize - record.len();
        self.data[upper..upper + record.len()].copy_from_slice(record);
        self.header.upper_ptr = upper as u16;

        self.write_slot(
            target,
            SlotEntry {
                offset: upper as u32,
                length: record.len() as u32,
            },
        );
        self.header.lower_ptr += SLOT_SIZE as u16;
        self.header.key_count += 1;
        self.seal();

        Ok(target)
    }

    fn expect_type(&self, expected: PageType) -> Result<(), PageError> {
        if self.header.page_type != expected {
            return Err(PageError::TypeMismatch {
                expected,
                actual: self.header.page_type,
            });
        }
        Ok(())
    }

    pub fn insert_leaf_entry(&mut self, key: i32, value: i32) -> Result<u16, PageError> {
        self.expect_type(PageType::Leaf)?;
        self.insert(&LeafEntry { key, value }.to_bytes(), key)
    }

    pub fn insert_internal_entry(&mut self, key: i32, child: PageId) -> Result<u16, PageError> {
        self.expect_type(PageType::Internal)?;
        self.insert(&InternalEntry { key, child }.to_bytes(), key)
    }

    /// Directory entry of a live, fixed-size record.
    fn live_slot(&self, slot_idx: u16) -> Result<SlotEntry, PageError> {
        let slot = self.slot(slot_idx).ok_or(PageError::SlotOutOfRange {
            slot: slot_idx,
            key_count: self.header.key_count,
        })?;
        if slot.is_tombstone() {
            return Err(PageError::SlotDeleted(slot_idx));
        }
        if slot.length as usize != RECORD_SIZE {
            return Err(PageError::RecordSizeMismatch {
                expected: RECORD_SIZE,
                actual: slot.length as usize,
            });
        }
        Ok(slot)
    }

    fn record(&self, slot_idx: u16) -> Result<&[u8], PageError> {
        let start = self.live_slot(slot_idx)?.offset as usize;
        Ok(&self.data[start..start + RECORD_SIZE])
    }

    pub fn get_leaf_entry(&self, slot_idx: u16) -> Result<LeafEntry, PageError> {
        self.expect_type(PageType::Leaf)?;
        Ok(LeafEntry::from_bytes(self.record(slot_idx)?))
    }

    pub fn get_internal_entry(&self, slot_idx: u16) -> Result<InternalEntry, PageError> {
        self.expect_type(PageType::Internal)?;
        Ok(InternalEntry::from_bytes(self.record(slot_idx)?))
    }

    /// Overwrite the value of a leaf record without moving it.
    pub fn update_leaf_value(&mut self, slot_idx: u16, value: i32) -> Result<(), PageError> {
        self.expect_type(PageType::Leaf)?;
        let offset = self.live_slot(slot_idx)?.offset as usize;
        write_i32(&mut self.data[..], offset + 4, value);
        self.seal();
        Ok(())
    }

    /// Live leaf records in directory order.
    pub fn leaf_entries(&self) -> Result<Vec<LeafEntry>, PageError> {
        self.expect_type(PageType::Leaf)?;
        self.live_slots().map(|idx| self.get_leaf_entry(idx)).collect()
    }

    /// Live internal records in directory order.
    pub fn internal_entries(&self) -> Result<Vec<InternalEntry>, PageError> {
        self.expect_type(PageType::Internal)?;
        self.live_slots().map(|idx| self.get_internal_entry(idx)).collect()
    }

    fn live_slots(&self) -> impl Iterator<Item = u16> + '_ {
        (0..self.header.key_count).filter(|&idx| self.slot(idx).is_some_and(|s| !s.is_tombstone()))
    }

    /// Logical delete: mark the slot as a tombstone. Space comes back on `compact`.
    pub fn delete(&mut self, slot_idx: u16) -> Result<(), PageError> {
        let mut slot = self.slot(slot_idx).ok_or(PageError::SlotOutOfRange {
            slot: slot_idx,
            key_count: self.header.key_count,
        })?;
        slot.length = 0;
        self.write_slot(slot_idx, slot);
        self.seal();
        Ok(())
    }

    /// Repack live records against the end of the page and drop tombstones
    /// from the directory. Slot indices of surviving records change.
    pub fn compact(&mut self) {
        let live: Vec<Vec<u8>> = (0..self.header.key_count)
            .filter_map(|idx| self.slot(idx))
            .filter(|slot| !slot.is_tombstone())
            .map(|slot| {
                let start = slot.offset as usize;
                self.data[start..start + slot.length as usize].to_vec()
            })
            .collect();

        let before = self.header.key_count;
        self.data[HEADER_SIZE..].fill(0);

        let mut upper = PAGE_SIZE;
        for (idx, record) in live.iter().enumerate() {
            upper -= record.len();
            self.data[upper..upper + record.len()].copy_from_slice(record);
            self.write_slot(
                idx as u16,
                SlotEntry {
                    offset: upper as u32,
                    length: record.len() as u32,
                },
            );
        }

        self.header.key_count = live.len() as u16;
        self.header.upper_ptr = upper as u16;
        self.header.lower_ptr = (HEADER_SIZE + live.len() * SLOT_SIZE) as u16;
        self.seal();

        debug!(
            "compact: page {} kept {} of {} slots, {} bytes free.",
            self.header.page_id,
            live.len(),
            before,
            self.free_space()
        );
    }
}

impl std::fmt::Debug for SlottedPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlottedPage")
            .field("header", &self.header)
            .field("dirty", &self.dirty)
            .field("pinned", &self.pinned)
            .field("links", &self.links)
            .finish()
    }
}
