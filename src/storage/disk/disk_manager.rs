use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use crate::common::config::{PageId, INVALID_PAGE_ID, PAGE_SIZE};
use crate::error::Result;

/// The pool's durable-storage dependency: read/write fixed-size pages and
/// issue/retire page ids. The buffer pool only ever talks to this trait, not
/// to a concrete file type, so alternate backends (in-memory, for tests; a
/// real file, for production) are interchangeable.
pub trait DiskManager: Send + Sync + 'static {
    /// Fills `buf` (exactly `PAGE_SIZE` bytes) with the durable content of
    /// `page_id`. A slot that was never written reads as all-zero.
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> Result<()>;

    /// Durably writes `buf` (exactly `PAGE_SIZE` bytes) for `page_id`.
    fn write_page(&self, page_id: PageId, buf: &[u8]) -> Result<()>;

    /// Returns a fresh id never previously live, or a reused deallocated id;
    /// always differs from `INVALID_PAGE_ID`.
    fn allocate_page(&self) -> Result<PageId>;

    /// Retires `page_id`'s storage for reuse. May be a no-op for
    /// free-space tracking (this implementation reuses the id).
    fn deallocate_page(&self, page_id: PageId) -> Result<()>;
}

/// A `DiskManager` backed by a flat file: a flat sequence of fixed-size
/// `PAGE_SIZE` slots indexed by page id, slot `i` at byte range
/// `[i * PAGE_SIZE, (i+1) * PAGE_SIZE)`.
pub struct FileDiskManager {
    db_io: Mutex<File>,
    next_page_id: AtomicU32,
    free_page_ids: Mutex<Vec<PageId>>,
}

impl FileDiskManager {
    /// Opens (or creates) the database file at `path`.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let db_io = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .or_else(|_| {
                OpenOptions::new()
                    .create(true)
                    .read(true)
                    .write(true)
                    .open(path)
            })?;
        Ok(Self {
            db_io: Mutex::new(db_io),
            next_page_id: AtomicU32::new(0),
            free_page_ids: Mutex::new(Vec::new()),
        })
    }
}

impl DiskManager for FileDiskManager {
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> Result<()> {
        assert_eq!(buf.len(), PAGE_SIZE, "read_page buffer must be PAGE_SIZE");
        let offset = page_id as u64 * PAGE_SIZE as u64;

        let mut file = self.db_io.lock();
        let file_len = file.metadata()?.len();
        if offset >= file_len {
            debug!(page_id, "read past end of file, returning zero page");
            buf.fill(0);
            return Ok(());
        }

        file.seek(SeekFrom::Start(offset))?;
        let read = file.read(buf)?;
        if read < buf.len() {
            debug!(page_id, read, "short read, zero-filling remainder");
            buf[read..].fill(0);
        }
        Ok(())
    }

    fn write_page(&self, page_id: PageId, buf: &[u8]) -> Result<()> {
        assert_eq!(buf.len(), PAGE_SIZE, "write_page buffer must be PAGE_SIZE");
        let offset = page_id as u64 * PAGE_SIZE as u64;

        let mut file = self.db_io.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(buf)?;
        file.flush()?;
        Ok(())
    }

    fn allocate_page(&self) -> Result<PageId> {
        if let Some(id) = self.free_page_ids.lock().pop() {
            return Ok(id);
        }
        let id = self.next_page_id.fetch_add(1, Ordering::SeqCst);
        assert_ne!(id, INVALID_PAGE_ID, "page id space exhausted");
        Ok(id)
    }

    fn deallocate_page(&self, page_id: PageId) -> Result<()> {
        self.free_page_ids.lock().push(page_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn read_write_page_roundtrip() {
        let dir = TempDir::new("test").unwrap();
        let db_file = dir.path().join("test.db");
        let dm = FileDiskManager::new(&db_file).unwrap();

        let mut buf = [0u8; PAGE_SIZE];
        dm.read_page(0, &mut buf).unwrap(); // tolerate empty read
        assert_eq!(buf, [0u8; PAGE_SIZE]);

        let mut data = [0u8; PAGE_SIZE];
        let test_str = b"A test string.";
        data[..test_str.len()].copy_from_slice(test_str);

        dm.write_page(0, &data).unwrap();
        dm.read_page(0, &mut buf).unwrap();
        assert_eq!(buf, data);

        buf.fill(0);
        dm.write_page(5, &data).unwrap();
        dm.read_page(5, &mut buf).unwrap();
        assert_eq!(buf, data);
    }

    #[test]
    fn allocate_page_reuses_deallocated_ids_first() {
        let dir = TempDir::new("test").unwrap();
        let db_file = dir.path().join("test.db");
        let dm = FileDiskManager::new(&db_file).unwrap();

        let a = dm.allocate_page().unwrap();
        let b = dm.allocate_page().unwrap();
        assert_ne!(a, b);

        dm.deallocate_page(a).unwrap();
        let c = dm.allocate_page().unwrap();
        assert_eq!(c, a);

        let d = dm.allocate_page().unwrap();
        assert_ne!(d, b);
        assert_ne!(d, a);
    }
}
