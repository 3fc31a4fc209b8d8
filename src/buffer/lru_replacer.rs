//! A FIFO-of-uniqueness replacer over frame ids: the ordered set of
//! unpinned-resident frames eligible for eviction.

use indexmap::IndexSet;
use parking_lot::Mutex;

use crate::common::config::FrameId;

/// Tracks frames whose pin count has fallen to zero, in touch order. The
/// head (oldest touch) is the preferred victim.
///
/// Backed by an `IndexSet` rather than the source's linear-scan sketch: a
/// hash index alongside insertion order gives amortized O(1) `insert`,
/// `victim`, and `erase` for any realistic pool size.
pub struct LruReplacer {
    frames: Mutex<IndexSet<FrameId>>,
}

impl LruReplacer {
    pub fn new() -> Self {
        Self {
            frames: Mutex::new(IndexSet::new()),
        }
    }

    /// Admits `frame_id`, or "touches" it if already present: either way it
    /// ends up at the tail (most-recently-used end).
    pub fn insert(&self, frame_id: FrameId) {
        let mut frames = self.frames.lock();
        frames.shift_remove(&frame_id);
        frames.insert(frame_id);
    }

    /// Pops and returns the least-recently-touched frame, or `None` if the
    /// replacer holds no candidates.
    pub fn victim(&self) -> Option<FrameId> {
        let mut frames = self.frames.lock();
        let victim = *frames.first()?;
        frames.shift_remove(&victim);
        Some(victim)
    }

    /// Removes `frame_id` if present, regardless of its position.
    pub fn erase(&self, frame_id: FrameId) -> bool {
        self.frames.lock().shift_remove(&frame_id)
    }

    pub fn size(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn contains(&self, frame_id: FrameId) -> bool {
        self.frames.lock().contains(&frame_id)
    }
}

impl Default for LruReplacer {
    fn default() -> Self {
        Self::new()
    }
}
