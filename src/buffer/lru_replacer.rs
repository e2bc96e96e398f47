use std::collections::{HashSet, VecDeque};

use parking_lot::Mutex;

use crate::common::config::FrameId;

/// LruReplacer implements the Least Recently Used replacement policy over
/// buffer pool frames.
///
/// "Least recently used" here means least recently *became evictable*: a
/// frame enters the tracking order when its pin count drops to zero and
/// leaves it when it is pinned again. Unpinning a frame that is already
/// tracked does not refresh its position.
pub struct LruReplacer {
    inner: Mutex<LruInner>,
}

struct LruInner {
    // Most recently unpinned at the front, victim taken from the back.
    queue: VecDeque<FrameId>,
    tracked: HashSet<FrameId>,
}

impl LruReplacer {
    /// @param num_frames the maximum number of frames the replacer will be
    /// required to track
    pub fn new(num_frames: usize) -> Self {
        Self {
            inner: Mutex::new(LruInner {
                queue: VecDeque::with_capacity(num_frames),
                tracked: HashSet::with_capacity(num_frames),
            }),
        }
    }

    /// Remove and return the frame that was unpinned least recently, or
    /// `None` if no frame is evictable.
    pub fn victim(&self) -> Option<FrameId> {
        let mut inner = self.inner.lock();
        let frame_id = inner.queue.pop_back()?;
        inner.tracked.remove(&frame_id);
        Some(frame_id)
    }

    /// Called after a page is pinned to a frame: the frame is in use and no
    /// longer a candidate for eviction. Untracked frames are ignored.
    pub fn pin(&self, frame_id: FrameId) {
        let mut inner = self.inner.lock();
        if inner.tracked.remove(&frame_id) {
            let pos = inner
                .queue
                .iter()
                .position(|f| *f == frame_id)
                .expect("tracked frame missing from lru queue");
            inner.queue.remove(pos);
        }
    }

    /// Called when the pin count of a frame drops to zero: the frame becomes
    /// a candidate for eviction. Unpinning an already-tracked frame is a
    /// no-op and does not reorder it.
    pub fn unpin(&self, frame_id: FrameId) {
        let mut inner = self.inner.lock();
        if inner.tracked.insert(frame_id) {
            inner.queue.push_front(frame_id);
        }
    }

    /// @return the number of evictable frames
    pub fn size(&self) -> usize {
        self.inner.lock().queue.len()
    }
}
