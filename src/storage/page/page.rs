use std::sync::Arc;

use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

use crate::common::config::{PageId, PAGE_SIZE};

pub type RefPageData<'a> = MappedRwLockReadGuard<'a, [u8; PAGE_SIZE]>;
pub type MutRefPageData<'a> = MappedRwLockWriteGuard<'a, [u8; PAGE_SIZE]>;

/// In-memory slot holding one page's payload plus the buffer pool's
/// bookkeeping for it (page id, pin count, dirty bit). Frames are created
/// once at pool construction and handed around as cheap `Arc` clones; the
/// payload itself lives behind its own lock so a pinned caller can read or
/// write bytes without taking the pool's latch.
#[derive(Debug, Clone)]
pub struct Page(Arc<RwLock<PageInner>>);

#[derive(Debug)]
struct PageInner {
    data: [u8; PAGE_SIZE],
    page_id: Option<PageId>,
    pin_count: i32,
    is_dirty: bool,
}

impl Page {
    /// Constructs a fresh, unindexed, zeroed frame.
    pub fn new() -> Page {
        let inner = PageInner {
            data: [0; PAGE_SIZE],
            page_id: None,
            pin_count: 0,
            is_dirty: false,
        };
        Page(Arc::new(RwLock::new(inner)))
    }

    /// Returns the frame to the *free* state: no page id, pin 0, clean,
    /// payload zeroed.
    pub fn reset(&self) {
        let mut p = self.0.write();
        p.data.fill(0);
        p.page_id = None;
        p.pin_count = 0;
        p.is_dirty = false;
    }

    pub fn get_data(&self) -> RefPageData<'_> {
        RwLockReadGuard::map(self.0.read(), |i| &i.data)
    }

    pub fn get_data_mut(&self) -> MutRefPageData<'_> {
        RwLockWriteGuard::map(self.0.write(), |i| &mut i.data)
    }

    pub fn set_page_id(&self, page_id: PageId) {
        self.0.write().page_id = Some(page_id);
    }

    pub fn get_page_id(&self) -> Option<PageId> {
        self.0.read().page_id
    }

    pub fn get_pin_count(&self) -> i32 {
        self.0.read().pin_count
    }

    /// Increments the pin count and returns its new value.
    pub fn pin(&self) -> i32 {
        let mut inner = self.0.write();
        inner.pin_count += 1;
        inner.pin_count
    }

    /// Decrements the pin count and returns its new value.
    ///
    /// A pin count that is already zero is a contract violation (see
    /// `UnpinPage`'s contract in the buffer pool manager) — callers are
    /// expected to check `get_pin_count() > 0` before calling this.
    pub fn unpin(&self) -> i32 {
        let mut inner = self.0.write();
        assert!(
            inner.pin_count > 0,
            "contract violation: unpin of a frame with pin_count <= 0"
        );
        inner.pin_count -= 1;
        inner.pin_count
    }

    pub fn is_dirty(&self) -> bool {
        self.0.read().is_dirty
    }

    /// Dirty is sticky: this only ORs the bit in, it never clears it.
    /// Clearing happens exclusively via `FlushPage`/write-back on eviction.
    pub fn mark_dirty(&self, is_dirty: bool) {
        if is_dirty {
            self.0.write().is_dirty = true;
        }
    }

    /// Unconditionally clears the dirty bit (used after a successful
    /// write-back).
    pub fn clear_dirty(&self) {
        self.0.write().is_dirty = false;
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}
