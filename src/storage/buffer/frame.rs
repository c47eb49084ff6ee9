//! Frame table: fixed-capacity per-pool array of frame descriptors.

use crate::storage::page::{BufferKind, TrainId};

/// Index of a frame within its pool.
pub type FrameId = usize;

/// One buffer slot and its control state.
pub struct Frame {
    data: Box<[u8]>,
    /// `None` while the frame is empty.
    pub(crate) key: Option<TrainId>,
    pub(crate) dirty: bool,
    pub(crate) referenced: bool,
    pub(crate) pin_count: u32,
    /// Next frame in the same hash bucket.
    pub(crate) next_in_chain: Option<FrameId>,
}

impl Frame {
    fn new(size: usize) -> Self {
        Self {
            data: vec![0u8; size].into_boxed_slice(),
            key: None,
            dirty: false,
            referenced: false,
            pin_count: 0,
            next_in_chain: None,
        }
    }

    pub fn key(&self) -> Option<TrainId> {
        self.key
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_pinned(&self) -> bool {
        self.pin_count > 0
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    fn reset(&mut self) {
        self.key = None;
        self.dirty = false;
        self.referenced = false;
        self.pin_count = 0;
        self.next_in_chain = None;
        self.data.fill(0);
    }

    fn state(&self) -> FrameState {
        FrameState {
            key: self.key,
            dirty: self.dirty,
            referenced: self.referenced,
            pin_count: self.pin_count,
        }
    }
}

/// Copy of a frame's control bits, for inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameState {
    pub key: Option<TrainId>,
    pub dirty: bool,
    pub referenced: bool,
    pub pin_count: u32,
}

/// The frames of one pool. Capacity is fixed at construction.
pub struct FrameTable {
    frames: Vec<Frame>,
}

impl FrameTable {
    pub fn new(kind: BufferKind, capacity: usize) -> Self {
        let size = kind.train_size();
        Self {
            frames: (0..capacity).map(|_| Frame::new(size)).collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.frames.len()
    }

    pub fn is_pinned(&self, frame_id: FrameId) -> bool {
        self.frames[frame_id].is_pinned()
    }

    pub fn is_referenced(&self, frame_id: FrameId) -> bool {
        self.frames[frame_id].referenced
    }

    pub fn key(&self, frame_id: FrameId) -> Option<TrainId> {
        self.frames[frame_id].key()
    }

    pub fn clear_referenced(&mut self, frame_id: FrameId) {
        self.frames[frame_id].referenced = false;
    }

    /// Returns the frame to the empty state. The caller must already have
    /// unregistered its key from the hash index.
    pub fn reset(&mut self, frame_id: FrameId) {
        self.frames[frame_id].reset();
    }

    pub fn state(&self, frame_id: FrameId) -> FrameState {
        self.frames[frame_id].state()
    }

    pub fn get(&self, frame_id: FrameId) -> &Frame {
        &self.frames[frame_id]
    }

    pub fn get_mut(&mut self, frame_id: FrameId) -> &mut Frame {
        &mut self.frames[frame_id]
    }

    pub(crate) fn next_in_chain(&self, frame_id: FrameId) -> Option<FrameId> {
        self.frames[frame_id].next_in_chain
    }

    pub(crate) fn set_next_in_chain(&mut self, frame_id: FrameId, next: Option<FrameId>) {
        self.frames[frame_id].next_in_chain = next;
    }
}
