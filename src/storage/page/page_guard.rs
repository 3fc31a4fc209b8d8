use std::mem::ManuallyDrop;
use std::sync::Arc;

use crate::buffer::buffer_pool_manager::BufferPoolManager;
use crate::common::config::PageId;
use crate::storage::page::page::{MutRefPageData, Page, RefPageData};

/// An RAII handle on a pinned page: the concrete form this crate gives to
/// the spec's reference-counted pinning protocol. Dropping a guard unpins
/// its page exactly once, with whatever dirty flag accumulated from calls
/// to `get_data_mut`.
///
/// `ReadPageGuard`/`WritePageGuard` express read-only vs. read-write intent
/// at the type level; they do not additionally hold a long-lived latch over
/// the guard's lifetime (`Page`'s internal `RwLock` already governs
/// concurrent byte-level access per call — see DESIGN.md).
pub struct BasicPageGuard {
    bpm: Arc<BufferPoolManager>,
    page: Page,
    is_dirty: bool,
}

impl BasicPageGuard {
    pub(crate) fn new(bpm: Arc<BufferPoolManager>, page: Page) -> BasicPageGuard {
        Self {
            bpm,
            page,
            is_dirty: false,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page.get_page_id().unwrap()
    }

    pub fn get_data(&self) -> RefPageData<'_> {
        self.page.get_data()
    }

    pub fn get_data_mut(&mut self) -> MutRefPageData<'_> {
        self.is_dirty = true;
        self.page.get_data_mut()
    }

    /// Converts this guard to a `ReadPageGuard` without releasing the pin:
    /// the page is never re-fetched or re-evicted across the upgrade.
    pub fn upgrade_read(self) -> ReadPageGuard {
        let this = ManuallyDrop::new(self);
        ReadPageGuard {
            bpm: this.bpm.clone(),
            page: this.page.clone(),
            is_dirty: this.is_dirty,
        }
    }

    /// Converts this guard to a `WritePageGuard` without releasing the pin.
    pub fn upgrade_write(self) -> WritePageGuard {
        let this = ManuallyDrop::new(self);
        WritePageGuard {
            bpm: this.bpm.clone(),
            page: this.page.clone(),
            is_dirty: this.is_dirty,
        }
    }
}

impl Drop for BasicPageGuard {
    fn drop(&mut self) {
        self.bpm.unpin_page(self.page_id(), self.is_dirty);
    }
}

pub struct ReadPageGuard {
    bpm: Arc<BufferPoolManager>,
    page: Page,
    is_dirty: bool,
}

impl ReadPageGuard {
    pub(crate) fn new(bpm: Arc<BufferPoolManager>, page: Page) -> Self {
        Self {
            bpm,
            page,
            is_dirty: false,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page.get_page_id().unwrap()
    }

    pub fn get_data(&self) -> RefPageData<'_> {
        self.page.get_data()
    }
}

impl Drop for ReadPageGuard {
    fn drop(&mut self) {
        self.bpm.unpin_page(self.page_id(), self.is_dirty);
    }
}

pub struct WritePageGuard {
    bpm: Arc<BufferPoolManager>,
    page: Page,
    is_dirty: bool,
}

impl WritePageGuard {
    pub(crate) fn new(bpm: Arc<BufferPoolManager>, page: Page) -> Self {
        Self {
            bpm,
            page,
            is_dirty: false,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page.get_page_id().unwrap()
    }

    pub fn get_data(&self) -> RefPageData<'_> {
        self.page.get_data()
    }

    pub fn get_data_mut(&mut self) -> MutRefPageData<'_> {
        self.is_dirty = true;
        self.page.get_data_mut()
    }
}

impl Drop for WritePageGuard {
    fn drop(&mut self) {
        self.bpm.unpin_page(self.page_id(), self.is_dirty);
    }
}
