//! Crate-wide tunables, mirroring the source's `common/config.h` convention.

/// Size in bytes of a single page / frame payload.
pub const PAGE_SIZE: usize = 4096;

/// Sentinel page id meaning "no page".
pub const INVALID_PAGE_ID: PageId = u32::MAX;

/// Default capacity of a single extendible hash bucket.
pub const BUCKET_SIZE: usize = 4;

/// Upper bound on the directory's global depth (bit width of the hash).
pub const MAX_GLOBAL_DEPTH: u32 = 64;

pub type FrameId = u32;
pub type PageId = u32;
