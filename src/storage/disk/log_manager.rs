use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use parking_lot::Mutex;
use tracing::trace;

use crate::common::config::PageId;
use crate::error::Result;

/// The pool's optional write-ahead-log collaborator. `flush` must be called
/// (and must complete) before a dirty frame carrying `page_id` is written
/// back to the disk manager on eviction — see the buffer pool's `FetchPage`/
/// `NewPage` victim handling. The buffer pool treats this as an opaque side
/// effect it must sequence correctly; it never inspects the log's contents.
pub trait LogManager: Send + Sync {
    fn flush(&self, page_id: PageId) -> Result<()>;
}

/// A minimal durable append-only log: each `flush(page_id)` call appends the
/// id's bytes and fsyncs. Exists to demonstrate the hook is real, not a
/// marker type — actual recovery/replay is out of scope (see Non-goals).
pub struct FileLogManager {
    log_io: Mutex<File>,
}

impl FileLogManager {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let log_io = OpenOptions::new()
            .append(true)
            .read(true)
            .open(path)
            .or_else(|_| {
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .read(true)
                    .open(path)
            })?;
        Ok(Self {
            log_io: Mutex::new(log_io),
        })
    }
}

impl LogManager for FileLogManager {
    fn flush(&self, page_id: PageId) -> Result<()> {
        trace!(page_id, "log manager: flush");
        let mut log_io = self.log_io.lock();
        log_io.write_all(&page_id.to_ne_bytes())?;
        log_io.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempdir::TempDir;

    #[test]
    fn flush_appends_record_per_call() {
        let dir = TempDir::new("test").unwrap();
        let log_file = dir.path().join("test.log");
        let log_manager = FileLogManager::new(&log_file).unwrap();

        log_manager.flush(1).unwrap();
        log_manager.flush(2).unwrap();

        let mut contents = Vec::new();
        File::open(&log_file)
            .unwrap()
            .read_to_end(&mut contents)
            .unwrap();
        assert_eq!(contents.len(), 8);
        assert_eq!(&contents[0..4], &1u32.to_ne_bytes());
        assert_eq!(&contents[4..8], &2u32.to_ne_bytes());
    }
}
