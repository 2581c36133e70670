// ┌─────────────────────────────────────────────────────────────────────────┐
// │ Offset │ Length │ Description                                           │
// │────────┼────────┼───────────────────────────────────────────────────────│
// │   0    │   4    │ CHECKSUM  (u32): FNV-1a over bytes [4, PAGE_SIZE)     │
// │   4    │   4    │ MAGIC     (u32): 0x50414745, "PAGE"                   │
// │   8    │   2    │ VERSION   (u16)                                       │
// │  10    │   2    │ PAGE_TYPE (u16): 1 = internal, 2 = leaf               │
// │  12    │   8    │ LSN       (u64)                                       │
// │  20    │   4    │ PAGE_ID   (u32)                                       │
// │  24    │   2    │ UPPER_PTR (u16): start of the data area               │
// │  26    │   2    │ LOWER_PTR (u16): end of the slot directory            │
// │  28    │   2    │ KEY_COUNT (u16): number of slots                      │
// │────────┼────────┼───────────────────────────────────────────────────────│
// │  30    │  (PAGE_SIZE - 30) ┆ Slot directory, free space, data area      │
// └─────────────────────────────────────────────────────────────────────────┘

use crate::error::PageError;
use crate::storage::PageId;

pub const PAGE_SIZE: usize = 4096;

pub const CHECKSUM_OFFSET: usize  = 0;   // 4 bytes (u32)
pub const MAGIC_OFFSET: usize     = 4;   // 4 bytes (u32)
pub const VERSION_OFFSET: usize   = 8;   // 2 bytes (u16)
pub const PAGE_TYPE_OFFSET: usize = 10;  // 2 bytes (u16)
pub const LSN_OFFSET: usize       = 12;  // 8 bytes (u64)
pub const PAGE_ID_OFFSET: usize   = 20;  // 4 bytes (u32)
pub const UPPER_PTR_OFFSET: usize = 24;  // 2 bytes (u16)
pub const LOWER_PTR_OFFSET: usize = 26;  // 2 bytes (u16)
pub const KEY_COUNT_OFFSET: usize = 28;  // 2 bytes (u16)
pub const HEADER_SIZE: usize      = 30;  // total header length

/// The four bytes "PAGE".
pub const PAGE_MAGIC: u32 = 0x5041_4745;
pub const PAGE_VERSION: u16 = 1;

const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    Internal = 1,
    Leaf = 2,
}

impl PageType {
    pub fn to_code(self) -> u16 {
        self as u16
    }
}

impl TryFrom<u16> for PageType {
    type Error = PageError;

    fn try_from(code: u16) -> Result<Self, PageError> {
        match code {
            1 => Ok(PageType::Internal),
            2 => Ok(PageType::Leaf),
            other => Err(PageError::UnknownPageType(other)),
        }
    }
}

/// Decoded form of the first `HEADER_SIZE` bytes of every page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    pub checksum: u32,
    pub magic: u32,
    pub version: u16,
    pub page_type: PageType,
    pub lsn: u64,
    pub page_id: PageId,
    pub upper_ptr: u16,
    pub lower_ptr: u16,
    pub key_count: u16,
}

impl PageHeader {
    /// Header of an empty page: no slots, the whole body is free.
    pub fn new(page_id: PageId, page_type: PageType) -> Self {
        PageHeader {
            checksum: 0,
            magic: PAGE_MAGIC,
            version: PAGE_VERSION,
            page_type,
            lsn: 0,
            page_id,
            upper_ptr: PAGE_SIZE as u16,
            lower_ptr: HEADER_SIZE as u16,
            key_count: 0,
        }
    }

    /// Write every field at its fixed offset, little-endian.
    pub fn serialize(&self, buf: &mut [u8]) {
        write_u32(buf, CHECKSUM_OFFSET, self.checksum);
        write_u32(buf, MAGIC_OFFSET, self.magic);
        write_u16(buf, VERSION_OFFSET, self.version);
        write_u16(buf, PAGE_TYPE_OFFSET, self.page_type.to_code());
        write_u64(buf, LSN_OFFSET, self.lsn);
        write_u32(buf, PAGE_ID_OFFSET, self.page_id);
        write_u16(buf, UPPER_PTR_OFFSET, self.upper_ptr);
        write_u16(buf, LOWER_PTR_OFFSET, self.lower_ptr);
        write_u16(buf, KEY_COUNT_OFFSET, self.key_count);
    }

    /// Inverse of `serialize`. Only the page type can fail to decode; magic and
    /// checksum are left for `load` to judge.
    pub fn deserialize(buf: &[u8]) -> Result<Self, PageError> {
        Ok(PageHeader {
            checksum: read_u32(buf, CHECKSUM_OFFSET),
            magic: read_u32(buf, MAGIC_OFFSET),
            version: read_u16(buf, VERSION_OFFSET),
            page_type: PageType::try_from(read_u16(buf, PAGE_TYPE_OFFSET))?,
            lsn: read_u64(buf, LSN_OFFSET),
            page_id: read_u32(buf, PAGE_ID_OFFSET),
            upper_ptr: read_u16(buf, UPPER_PTR_OFFSET),
            lower_ptr: read_u16(buf, LOWER_PTR_OFFSET),
            key_count: read_u16(buf, KEY_COUNT_OFFSET),
        })
    }

    /// Decode the header of a page image read back from storage.
    ///
    /// The checksum is verified before any field is trusted, then the magic,
    /// then the pointer layout. A page failing any of these is unreadable.
    pub fn load(buf: &[u8; PAGE_SIZE]) -> Result<Self, PageError> {
        let stored = read_u32(buf, CHECKSUM_OFFSET);
        let computed = compute_checksum(buf);
        if stored != computed {
            return Err(PageError::ChecksumMismatch { stored, computed });
        }

        let magic = read_u32(buf, MAGIC_OFFSET);
        if magic != PAGE_MAGIC {
            return Err(PageError::BadMagic(magic));
        }

        let header = PageHeader::deserialize(buf)?;
        header.check_layout()?;
        Ok(header)
    }

    /// `HEADER_SIZE <= lower_ptr <= upper_ptr <= PAGE_SIZE` and the directory
    /// size agrees with `key_count`.
    pub fn check_layout(&self) -> Result<(), PageError> {
        let lower = self.lower_ptr as usize;
        let upper = self.upper_ptr as usize;
        let directory_end = HEADER_SIZE + self.key_count as usize * crate::storage::page::SLOT_SIZE;
        if lower < HEADER_SIZE || lower > upper || upper > PAGE_SIZE || lower != directory_end {
            return Err(PageError::CorruptLayout {
                lower: self.lower_ptr,
                upper: self.upper_ptr,
            });
        }
        Ok(())
    }
}

/// FNV-1a over every byte after the checksum field.
pub fn compute_checksum(buf: &[u8; PAGE_SIZE]) -> u32 {
    buf[MAGIC_OFFSET..]
        .iter()
        .fold(FNV_OFFSET_BASIS, |hash, &byte| (hash ^ byte as u32).wrapping_mul(FNV_PRIME))
}

/// Compute the page checksum and store it in the first four bytes.
pub fn finalize_checksum(buf: &mut [u8; PAGE_SIZE]) {
    let checksum = compute_checksum(buf);
    write_u32(buf, CHECKSUM_OFFSET, checksum);
}

pub fn verify_checksum(buf: &[u8; PAGE_SIZE]) -> bool {
    read_u32(buf, CHECKSUM_OFFSET) == compute_checksum(buf)
}

pub fn read_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

pub fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
}

pub fn read_i32(buf: &[u8], offset: usize) -> i32 {
    read_u32(buf, offset) as i32
}

pub fn read_u64(buf: &[u8], offset: usize) -> u64 {
    (read_u32(buf, offset) as u64) | ((read_u32(buf, offset + 4) as u64) << 32)
}

pub fn write_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

pub fn write_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

pub fn write_i32(buf: &mut [u8], offset: usize, value: i32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

pub fn write_u64(buf: &mut [u8], offset: usize, value: u64) {
    buf[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}
