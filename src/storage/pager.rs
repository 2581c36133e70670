use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::debug;

use crate::storage::header::PAGE_SIZE;
use crate::storage::PageId;

/// Where flushed page images go. The buffer pool hands over sealed 4 KiB
/// images and asks for them back only on an explicit reload.
pub trait PageStore {
    fn write_page(&mut self, page_id: PageId, image: &[u8; PAGE_SIZE]) -> io::Result<()>;

    /// `Ok(None)` when the store has never seen `page_id`.
    fn read_page(&mut self, page_id: PageId) -> io::Result<Option<[u8; PAGE_SIZE]>>;

    fn sync(&mut self) -> io::Result<()>;

    /// Number of page positions the store covers (highest written id + 1).
    fn page_count(&self) -> u32;
}

/// One database file, page `n` at byte offset `n * PAGE_SIZE`.
pub struct FilePageStore {
    file: File,

    /// The number of whole pages present in the file.
    file_length_pages: u32,
}

impl FilePageStore {
    /// Open (or create) the database file at `path`.
    /// `file_length_pages` is floor(file_size / PAGE_SIZE).
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.as_ref())?;
        let file_len = file.metadata()?.len();
        let file_length_pages = (file_len as usize / PAGE_SIZE) as u32;

        debug!(
            "FilePageStore::open: {} holds {} pages.",
            path.as_ref().display(),
            file_length_pages
        );

        Ok(FilePageStore { file, file_length_pages })
    }

    pub fn file_length_pages(&self) -> u32 {
        self.file_length_pages
    }
}

impl PageStore for FilePageStore {
    fn write_page(&mut self, page_id: PageId, image: &[u8; PAGE_SIZE]) -> io::Result<()> {
        let offset = (page_id as u64) * (PAGE_SIZE as u64);
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(image)?;

        // A page past the old end extends the file (holes read back as zeros).
        if page_id >= self.file_length_pages {
            self.file_length_pages = page_id + 1;
        }
        Ok(())
    }

    fn read_page(&mut self, page_id: PageId) -> io::Result<Option<[u8; PAGE_SIZE]>> {
        if page_id >= self.file_length_pages {
            return Ok(None);
        }
        let mut image = [0u8; PAGE_SIZE];
        let offset = (page_id as u64) * (PAGE_SIZE as u64);
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut image)?;
        Ok(Some(image))
    }

    fn sync(&mut self) -> io::Result<()> {
        self.file.sync_all()
    }

    fn page_count(&self) -> u32 {
        self.file_length_pages
    }
}

/// Keeps flushed images in memory. The default store for trees that only live
/// as long as the process.
#[derive(Default)]
pub struct MemoryPageStore {
    pages: HashMap<PageId, Box<[u8; PAGE_SIZE]>>,
}

impl MemoryPageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Direct access to a stored image, e.g. to simulate media corruption.
    pub fn image_mut(&mut self, page_id: PageId) -> Option<&mut [u8; PAGE_SIZE]> {
        self.pages.get_mut(&page_id).map(|image| &mut **image)
    }
}

impl PageStore for MemoryPageStore {
    fn write_page(&mut self, page_id: PageId, image: &[u8; PAGE_SIZE]) -> io::Result<()> {
        self.pages.insert(page_id, Box::new(*image));
        Ok(())
    }

    fn read_page(&mut self, page_id: PageId) -> io::Result<Option<[u8; PAGE_SIZE]>> {
        Ok(self.pages.get(&page_id).map(|image| **image))
    }

    fn sync(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn page_count(&self) -> u32 {
        self.pages.keys().max().map_or(0, |&max| max + 1)
    }
}
