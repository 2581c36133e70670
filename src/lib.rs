pub mod storage;
pub mod config;
pub mod error;

pub use config::TreeConfig;
pub use error::{DbError, DbResult, PageError};
pub use storage::btree::PagedBPlusTree;
pub use storage::buffer_pool::{BufferPoolManager, PoolStats};
pub use storage::header::{PageHeader, PageType, HEADER_SIZE, PAGE_SIZE};
pub use storage::page::{InternalEntry, LeafEntry, SlotEntry, SlottedPage};
pub use storage::pager::{FilePageStore, MemoryPageStore, PageStore};
pub use storage::{PageId, INVALID_PAGE_ID};
