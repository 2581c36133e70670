pub mod header;
pub mod page;
pub mod pager;
pub mod buffer_pool;
pub mod btree;

/// Page numbers are handed out by the buffer pool starting at 1.
pub type PageId = u32;

/// "No page": unset parent, end of the leaf chain.
pub const INVALID_PAGE_ID: PageId = 0;
