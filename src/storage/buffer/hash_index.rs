//! Key-to-frame index. Collisions are chained through the frames'
//! `next_in_chain` slots, so the index itself only stores bucket heads.

use super::frame::{FrameId, FrameTable};
use crate::storage::error::{BufferError, BufferResult};
use crate::storage::page::{BufferKind, TrainId};

pub struct HashIndex {
    kind: BufferKind,
    buckets: Vec<Option<FrameId>>,
}

impl HashIndex {
    pub fn new(kind: BufferKind, capacity: usize) -> Self {
        Self {
            kind,
            buckets: vec![None; (capacity * 2).max(1)],
        }
    }

    fn bucket(&self, key: &TrainId) -> usize {
        (key.volume as usize + key.page_no as usize) % self.buckets.len()
    }

    /// Registers `key` as held by `frame_id`.
    pub fn insert(
        &mut self,
        key: TrainId,
        frame_id: FrameId,
        frames: &mut FrameTable,
    ) -> BufferResult<()> {
        if self.lookup(&key, frames).is_some() {
            return Err(BufferError::DuplicateKey {
                key,
                kind: self.kind,
            });
        }

        let bucket = self.bucket(&key);
        frames.set_next_in_chain(frame_id, self.buckets[bucket]);
        self.buckets[bucket] = Some(frame_id);
        Ok(())
    }

    pub fn lookup(&self, key: &TrainId, frames: &FrameTable) -> Option<FrameId> {
        let mut cursor = self.buckets[self.bucket(key)];
        while let Some(frame_id) = cursor {
            if frames.key(frame_id) == Some(*key) {
                return Some(frame_id);
            }
            cursor = frames.next_in_chain(frame_id);
        }
        None
    }

    /// Unlinks `key` and returns the frame that held it. A miss means the
    /// frame table and the index disagree.
    pub fn remove(&mut self, key: &TrainId, frames: &mut FrameTable) -> BufferResult<FrameId> {
        let bucket = self.bucket(key);
        let mut prev: Option<FrameId> = None;
        let mut cursor = self.buckets[bucket];

        while let Some(frame_id) = cursor {
            let next = frames.next_in_chain(frame_id);
            if frames.key(frame_id) == Some(*key) {
                match prev {
                    Some(prev_id) => frames.set_next_in_chain(prev_id, next),
                    None => self.buckets[bucket] = next,
                }
                frames.set_next_in_chain(frame_id, None);
                return Ok(frame_id);
            }
            prev = Some(frame_id);
            cursor = next;
        }

        Err(BufferError::HashKeyNotFound {
            key: *key,
            kind: self.kind,
        })
    }

    /// Drops every registration. Chain links in the frames are left for the
    /// caller to reset.
    pub fn clear(&mut self) {
        self.buckets.fill(None);
    }
}
