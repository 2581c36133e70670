use thiserror::Error;
use std::io;

use crate::storage::header::PageType;
use crate::storage::PageId;

/// Failures raised by a single page: decoding, integrity checks and record layout.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PageError {
    #[error("checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },
    #[error("bad magic {0:#010x}, not a page image")]
    BadMagic(u32),
    #[error("unknown page type {0}")]
    UnknownPageType(u16),
    #[error("corrupt layout: lower_ptr {lower}, upper_ptr {upper}")]
    CorruptLayout { lower: u16, upper: u16 },
    #[error("corrupt slot {slot}: offset {offset}, length {length}")]
    CorruptSlot { slot: u16, offset: u32, length: u32 },
    #[error("no space: need {required} bytes, {available} free")]
    OutOfSpace { required: usize, available: usize },
    #[error("slot {slot} out of range (key_count {key_count})")]
    SlotOutOfRange { slot: u16, key_count: u16 },
    #[error("expected {expected:?} page, found {actual:?}")]
    TypeMismatch { expected: PageType, actual: PageType },
    #[error("slot {0} is a tombstone")]
    SlotDeleted(u16),
    #[error("record is {actual} bytes, slot holds {expected}")]
    RecordSizeMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    Page(#[from] PageError),
    #[error("invalid tree order {0}")]
    InvalidOrder(usize),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("page {0} is not resident")]
    PageNotResident(PageId),
    #[error("page {0} not found in store")]
    PageNotFound(PageId),
    #[error("page ids exhausted")]
    PageIdsExhausted,
    #[error("corrupt tree: {0}")]
    CorruptTree(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type DbResult<T> = Result<T, DbError>;
