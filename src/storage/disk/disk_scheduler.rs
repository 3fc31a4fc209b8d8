use std::sync::mpsc::{self, Sender};
use std::thread;

use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::common::config::PageId;
use crate::error::{Error, Result};
use crate::storage::disk::DiskManager;
use crate::storage::page::Page;

/// A request scheduled for the background worker to execute against the
/// disk manager.
enum DiskRequest {
    Read {
        page_id: PageId,
        page: Page,
        reply: oneshot::Sender<Result<()>>,
    },
    Write {
        page_id: PageId,
        page: Page,
        reply: oneshot::Sender<Result<()>>,
    },
    Allocate {
        reply: oneshot::Sender<Result<PageId>>,
    },
    Deallocate {
        page_id: PageId,
        reply: oneshot::Sender<Result<()>>,
    },
}

/// Funnels all disk access for one pool through a single background worker
/// thread, reached via a channel with a synchronous one-shot reply.
///
/// This isn't a concurrency optimization — the buffer pool still blocks on
/// the reply, consistent with the pool holding its latch across I/O — it
/// exists so that `ReadPage`/`WritePage` of the same id are totally ordered
/// without every `DiskManager` impl having to reason about that itself.
pub struct DiskScheduler {
    request_queue: Option<Sender<DiskRequest>>,
    background_thread: Option<thread::JoinHandle<()>>,
}

impl DiskScheduler {
    pub fn new<D: DiskManager>(disk_manager: D) -> Self {
        let (tx, rx) = mpsc::channel::<DiskRequest>();
        let background_thread = thread::spawn(move || Self::start_worker_thread(rx, disk_manager));
        Self {
            request_queue: Some(tx),
            background_thread: Some(background_thread),
        }
    }

    pub fn read_page(&self, page_id: PageId, page: &Page) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(DiskRequest::Read {
            page_id,
            page: page.clone(),
            reply: tx,
        })?;
        rx.blocking_recv().map_err(|_| Error::SchedulerShutdown)?
    }

    pub fn write_page(&self, page_id: PageId, page: &Page) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(DiskRequest::Write {
            page_id,
            page: page.clone(),
            reply: tx,
        })?;
        rx.blocking_recv().map_err(|_| Error::SchedulerShutdown)?
    }

    pub fn allocate_page(&self) -> Result<PageId> {
        let (tx, rx) = oneshot::channel();
        self.send(DiskRequest::Allocate { reply: tx })?;
        rx.blocking_recv().map_err(|_| Error::SchedulerShutdown)?
    }

    pub fn deallocate_page(&self, page_id: PageId) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(DiskRequest::Deallocate { page_id, reply: tx })?;
        rx.blocking_recv().map_err(|_| Error::SchedulerShutdown)?
    }

    fn send(&self, request: DiskRequest) -> Result<()> {
        self.request_queue
            .as_ref()
            .ok_or(Error::SchedulerShutdown)?
            .send(request)
            .map_err(|_| Error::SchedulerShutdown)
    }

    fn start_worker_thread<D: DiskManager>(rx: mpsc::Receiver<DiskRequest>, disk_manager: D) {
        while let Ok(request) = rx.recv() {
            match request {
                DiskRequest::Read { page_id, page, reply } => {
                    trace!(page_id, "disk scheduler: read");
                    let mut buf = page.get_data_mut();
                    let result = disk_manager.read_page(page_id, &mut *buf);
                    drop(buf);
                    let _ = reply.send(result);
                }
                DiskRequest::Write { page_id, page, reply } => {
                    trace!(page_id, "disk scheduler: write");
                    let result = disk_manager.write_page(page_id, &*page.get_data());
                    let _ = reply.send(result);
                }
                DiskRequest::Allocate { reply } => {
                    let _ = reply.send(disk_manager.allocate_page());
                }
                DiskRequest::Deallocate { page_id, reply } => {
                    trace!(page_id, "disk scheduler: deallocate");
                    let _ = reply.send(disk_manager.deallocate_page(page_id));
                }
            }
        }
        debug!("disk scheduler worker thread exiting");
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        // Dropping the sender closes the channel, which ends the worker's
        // `recv` loop; only then do we join it.
        self.request_queue.take();
        if let Some(handle) = self.background_thread.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::disk::disk_manager::FileDiskManager;
    use tempdir::TempDir;

    #[test]
    fn schedule_read_write_roundtrip() {
        let dir = TempDir::new("test").unwrap();
        let db_file = dir.path().join("test.db");
        let dm = FileDiskManager::new(&db_file).unwrap();
        let scheduler = DiskScheduler::new(dm);

        let page = Page::new();
        page.get_data_mut()[..5].copy_from_slice(b"Hello");
        scheduler.write_page(0, &page).unwrap();

        let page2 = Page::new();
        scheduler.read_page(0, &page2).unwrap();
        assert_eq!(&page2.get_data()[..5], b"Hello");
    }

    #[test]
    fn schedule_allocate_and_deallocate() {
        let dir = TempDir::new("test").unwrap();
        let db_file = dir.path().join("test.db");
        let dm = FileDiskManager::new(&db_file).unwrap();
        let scheduler = DiskScheduler::new(dm);

        let a = scheduler.allocate_page().unwrap();
        let b = scheduler.allocate_page().unwrap();
        assert_ne!(a, b);
        scheduler.deallocate_page(a).unwrap();
        assert_eq!(scheduler.allocate_page().unwrap(), a);
    }
}
