//! Lazy page cache over a single backing file. Pages are materialized into
//! memory on first access and written back only at `flush_all`/`close`; the
//! file itself carries no header, just a raw run of fixed-size pages.
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::errors::Error;

/// Same width as a virtual memory page on most architectures; also the
/// tree's unit of allocation.
pub const PAGE_SIZE: usize = 4096;
pub const TABLE_MAX_PAGES: usize = 100;

pub struct Pager {
    file: File,
    /// Pages that already exist on disk as of `open`; used to decide
    /// whether a freshly materialized slot should be read from the file
    /// or zero-initialized.
    disk_pages: u32,
    /// Highest allocated page number plus one.
    pages_count: u32,
    pages: heapless::Vec<Option<Box<[u8; PAGE_SIZE]>>, TABLE_MAX_PAGES>,
}

impl Pager {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let file = OpenOptions::new().read(true).write(true).create(true).open(path)?;
        let length = file.metadata()?.len();
        if length % PAGE_SIZE as u64 != 0 {
            return Err(crate::err!(
                CorruptFile,
                "file length {} is not a whole multiple of the page size {}",
                length,
                PAGE_SIZE
            ));
        }
        let disk_pages = (length / PAGE_SIZE as u64) as u32;

        let mut pages = heapless::Vec::new();
        for _ in 0..TABLE_MAX_PAGES {
            // capacity is fixed; this can't fail.
            let _ = pages.push(None);
        }

        Ok(Pager {
            file,
            disk_pages,
            pages_count: disk_pages,
            pages,
        })
    }

    pub fn pages_count(&self) -> u32 {
        self.pages_count
    }

    /// Returns a mutable reference to page `page_num`, materializing it
    /// (from disk if it predates this pager session, zeroed otherwise) on
    /// first access. The slot is stable for the pager's lifetime.
    pub fn get(&mut self, page_num: u32) -> Result<&mut [u8; PAGE_SIZE], Error> {
        if page_num as usize >= TABLE_MAX_PAGES {
            return Err(crate::err!(
                Storage,
                "tried to fetch page {} past the {} page limit",
                page_num,
                TABLE_MAX_PAGES
            ));
        }

        if self.pages[page_num as usize].is_none() {
            let mut buf = Box::new([0u8; PAGE_SIZE]);
            if page_num < self.disk_pages {
                debug!(page_num, "page fault: reading page from disk");
                self.file.seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))?;
                self.file.read_exact(buf.as_mut_slice())?;
            } else {
                debug!(page_num, "page fault: allocating new zeroed page");
            }
            self.pages[page_num as usize] = Some(buf);
        }
        if page_num + 1 > self.pages_count {
            self.pages_count = page_num + 1;
        }

        Ok(self.pages[page_num as usize].as_mut().unwrap())
    }

    /// Page numbers are assigned sequentially; deletion (and so page reuse)
    /// isn't implemented, matching the tree's Non-goals.
    pub fn get_unused_page_num(&self) -> u32 {
        self.pages_count
    }

    /// Writes every materialized page back to disk. Pages never pulled into
    /// memory this session are left untouched on disk.
    pub fn flush_all(&mut self) -> Result<(), Error> {
        let mut flushed = 0u32;
        for page_num in 0..self.pages_count {
            if let Some(page) = &self.pages[page_num as usize] {
                self.file.seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))?;
                self.file.write_all(page.as_slice())?;
                flushed += 1;
            }
        }
        self.file.flush()?;
        info!("Flushed {} pages.", flushed);
        Ok(())
    }

    pub fn close(mut self) -> Result<(), Error> {
        self.flush_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn opening_missing_file_starts_with_zero_pages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh.db");
        let pager = Pager::open(&path).unwrap();
        assert_eq!(pager.pages_count(), 0);
    }

    #[test]
    fn rejects_file_length_not_a_page_multiple() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), vec![0u8; PAGE_SIZE + 1]).unwrap();
        let result = Pager::open(file.path());
        assert!(matches!(result, Err(Error::CorruptFile(_))));
    }

    #[test]
    fn get_materializes_a_zeroed_page_and_bumps_pages_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh.db");
        let mut pager = Pager::open(&path).unwrap();
        let page = pager.get(0).unwrap();
        assert_eq!(page[0], 0);
        assert_eq!(pager.pages_count(), 1);
    }

    #[test]
    fn flush_then_reopen_round_trips_page_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.db");
        {
            let mut pager = Pager::open(&path).unwrap();
            let page = pager.get(0).unwrap();
            page[0] = 42;
            pager.close().unwrap();
        }
        {
            let mut pager = Pager::open(&path).unwrap();
            assert_eq!(pager.pages_count(), 1);
            let page = pager.get(0).unwrap();
            assert_eq!(page[0], 42);
        }
    }

    #[test]
    fn rejects_page_beyond_table_max_pages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh.db");
        let mut pager = Pager::open(&path).unwrap();
        let result = pager.get(TABLE_MAX_PAGES as u32);
        assert!(result.is_err());
    }

    #[test]
    fn get_unused_page_num_tracks_allocation_high_water_mark() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh.db");
        let mut pager = Pager::open(&path).unwrap();
        assert_eq!(pager.get_unused_page_num(), 0);
        pager.get(0).unwrap();
        assert_eq!(pager.get_unused_page_num(), 1);
    }
}
