pub mod buffer;
pub mod common;
pub mod error;
pub mod hash;
pub mod storage;

pub use buffer::{BufferPoolManager, LruReplacer};
pub use common::config::{FrameId, PageId, BUCKET_SIZE, INVALID_PAGE_ID, PAGE_SIZE};
pub use error::{Error, Result};
pub use hash::ExtendibleHashDirectory;
pub use storage::disk::{DiskManager, DiskScheduler, FileDiskManager, FileLogManager, LogManager};
pub use storage::page::{BasicPageGuard, MutRefPageData, Page, ReadPageGuard, RefPageData, WritePageGuard};
