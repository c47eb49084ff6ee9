//! One buffer pool: frame table, hash index and clock hand for a single
//! buffer kind. Not internally synchronized; the owner serializes access.

use super::clock::{ClockReplacer, ScanOutcome};
use super::frame::{FrameId, FrameState, FrameTable};
use super::hash_index::HashIndex;
use crate::storage::disk::TrainStore;
use crate::storage::error::{BufferError, BufferResult};
use crate::storage::page::{BufferKind, TrainId};

/// Counters kept per pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Fix requests served from a resident frame.
    pub hits: u64,
    /// Fix requests that had to allocate a frame.
    pub misses: u64,
    /// Occupied frames reclaimed by the clock.
    pub evictions: u64,
    /// Dirty trains written back to the store.
    pub flushes: u64,
}

pub struct BufferPool {
    kind: BufferKind,
    frames: FrameTable,
    index: HashIndex,
    clock: ClockReplacer,
    stats: PoolStats,
}

impl BufferPool {
    pub fn new(kind: BufferKind, capacity: usize) -> Self {
        Self {
            kind,
            frames: FrameTable::new(kind, capacity),
            index: HashIndex::new(kind, capacity),
            clock: ClockReplacer::new(),
            stats: PoolStats::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.frames.capacity()
    }

    pub fn next_victim(&self) -> FrameId {
        self.clock.next_victim()
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    pub fn frame_state(&self, frame_id: FrameId) -> FrameState {
        self.frames.state(frame_id)
    }

    pub fn lookup(&self, key: &TrainId) -> Option<FrameId> {
        self.index.lookup(key, &self.frames)
    }

    /// Hands out an empty, unregistered frame, evicting the clock's victim.
    ///
    /// A dirty victim is written to `store` before its key leaves the index.
    /// If either step fails the victim and the hand are left untouched.
    pub fn alloc_train(&mut self, store: &mut dyn TrainStore) -> BufferResult<FrameId> {
        let victim = match self.clock.select_victim(&mut self.frames) {
            ScanOutcome::Victim(frame_id) => frame_id,
            ScanOutcome::Exhausted { examined } => {
                log::warn!(
                    "{} pool: every frame fixed after examining {} frames",
                    self.kind,
                    examined
                );
                return Err(BufferError::NoUnfixedBuffer { kind: self.kind });
            }
        };

        if let Some(key) = self.frames.key(victim) {
            let frame = self.frames.get(victim);
            if frame.is_dirty() {
                store.write_train(key, self.kind, frame.data())?;
                self.stats.flushes += 1;
            }

            if let Err(e) = self.index.remove(&key, &mut self.frames) {
                log::error!("{} pool: frame {} holds unindexed key {}", self.kind, victim, key);
                return Err(e);
            }

            self.stats.evictions += 1;
            log::debug!("{} pool: evicted {} from frame {}", self.kind, key, victim);
        }

        self.frames.reset(victim);
        self.clock.advance_past(victim, self.frames.capacity());
        Ok(victim)
    }

    /// Pins `key`, loading it from `store` if it is not resident.
    pub fn fix(&mut self, key: TrainId, store: &mut dyn TrainStore) -> BufferResult<FrameId> {
        if let Some(frame_id) = self.lookup(&key) {
            let frame = self.frames.get_mut(frame_id);
            frame.pin_count += 1;
            frame.referenced = true;
            self.stats.hits += 1;
            return Ok(frame_id);
        }

        let frame_id = self.alloc_train(store)?;
        if let Err(e) = store.read_train(key, self.kind, self.frames.get_mut(frame_id).data_mut()) {
            self.frames.reset(frame_id);
            return Err(e);
        }

        self.install(frame_id, key, false)?;
        self.stats.misses += 1;
        Ok(frame_id)
    }

    /// Pins a zero-filled frame for a train that does not exist yet. The
    /// frame starts dirty so it reaches the store on eviction.
    pub fn fix_new(&mut self, key: TrainId, store: &mut dyn TrainStore) -> BufferResult<FrameId> {
        if self.lookup(&key).is_some() {
            return Err(BufferError::DuplicateKey {
                key,
                kind: self.kind,
            });
        }

        let frame_id = self.alloc_train(store)?;
        self.install(frame_id, key, true)?;
        self.stats.misses += 1;
        Ok(frame_id)
    }

    fn install(&mut self, frame_id: FrameId, key: TrainId, dirty: bool) -> BufferResult<()> {
        {
            let frame = self.frames.get_mut(frame_id);
            frame.key = Some(key);
            frame.dirty = dirty;
            frame.referenced = true;
            frame.pin_count = 1;
        }

        if let Err(e) = self.index.insert(key, frame_id, &mut self.frames) {
            self.frames.reset(frame_id);
            return Err(e);
        }
        Ok(())
    }

    fn resident(&self, key: &TrainId) -> BufferResult<FrameId> {
        self.lookup(key).ok_or(BufferError::TrainNotResident {
            key: *key,
            kind: self.kind,
        })
    }

    pub fn unfix(&mut self, key: &TrainId) -> BufferResult<()> {
        let frame_id = self.resident(key)?;
        let frame = self.frames.get_mut(frame_id);
        if frame.pin_count == 0 {
            return Err(BufferError::NotFixed {
                key: *key,
                kind: self.kind,
            });
        }
        frame.pin_count -= 1;
        Ok(())
    }

    pub fn set_dirty(&mut self, key: &TrainId) -> BufferResult<()> {
        let frame_id = self.resident(key)?;
        self.frames.get_mut(frame_id).dirty = true;
        Ok(())
    }

    pub fn data(&self, key: &TrainId) -> BufferResult<&[u8]> {
        let frame_id = self.resident(key)?;
        Ok(self.frames.get(frame_id).data())
    }

    /// Mutable access to a resident train's bytes; marks it dirty.
    pub fn data_mut(&mut self, key: &TrainId) -> BufferResult<&mut [u8]> {
        let frame_id = self.resident(key)?;
        let frame = self.frames.get_mut(frame_id);
        frame.dirty = true;
        Ok(frame.data_mut())
    }

    /// Writes one resident train back if it is dirty.
    pub fn flush_train(&mut self, key: &TrainId, store: &mut dyn TrainStore) -> BufferResult<()> {
        let frame_id = self.resident(key)?;
        self.flush_frame(frame_id, store)
    }

    /// Writes back every dirty frame, pinned or not.
    pub fn flush_all(&mut self, store: &mut dyn TrainStore) -> BufferResult<()> {
        for frame_id in 0..self.frames.capacity() {
            self.flush_frame(frame_id, store)?;
        }
        Ok(())
    }

    fn flush_frame(&mut self, frame_id: FrameId, store: &mut dyn TrainStore) -> BufferResult<()> {
        let frame = self.frames.get_mut(frame_id);
        if let (Some(key), true) = (frame.key, frame.dirty) {
            store.write_train(key, self.kind, frame.data())?;
            frame.dirty = false;
            self.stats.flushes += 1;
            log::debug!("{} pool: flushed {} from frame {}", self.kind, key, frame_id);
        }
        Ok(())
    }

    /// Number of frames with a nonzero pin count.
    pub fn fixed_frames(&self) -> usize {
        (0..self.frames.capacity())
            .filter(|&frame_id| self.frames.is_pinned(frame_id))
            .count()
    }

    /// Empties every frame without writing anything back. Refused while any
    /// frame is fixed.
    pub fn discard_all(&mut self) -> BufferResult<()> {
        let count = self.fixed_frames();
        if count > 0 {
            return Err(BufferError::FramesFixed {
                kind: self.kind,
                count,
            });
        }

        for frame_id in 0..self.frames.capacity() {
            self.frames.reset(frame_id);
        }
        self.index.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::disk::MemoryStore;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::HashSet;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Read(TrainId),
        Write(TrainId),
    }

    /// Records every call and can be told to fail writes.
    #[derive(Default)]
    struct RecordingStore {
        calls: Vec<Call>,
        fail_writes: bool,
    }

    impl TrainStore for RecordingStore {
        fn read_train(
            &mut self,
            key: TrainId,
            _kind: BufferKind,
            buf: &mut [u8],
        ) -> BufferResult<()> {
            self.calls.push(Call::Read(key));
            buf.fill(0);
            Ok(())
        }

        fn write_train(
            &mut self,
            key: TrainId,
            _kind: BufferKind,
            _data: &[u8],
        ) -> BufferResult<()> {
            if self.fail_writes {
                return Err(std::io::Error::other("injected write failure").into());
            }
            self.calls.push(Call::Write(key));
            Ok(())
        }
    }

    /// Registers `key` in `frame_id` with the given bits, bypassing fix.
    fn occupy(pool: &mut BufferPool, frame_id: FrameId, key: TrainId, dirty: bool) {
        let frame = pool.frames.get_mut(frame_id);
        frame.key = Some(key);
        frame.dirty = dirty;
        pool.index.insert(key, frame_id, &mut pool.frames).unwrap();
    }

    fn empty_state() -> FrameState {
        FrameState {
            key: None,
            dirty: false,
            referenced: false,
            pin_count: 0,
        }
    }

    #[test]
    fn test_empty_pool_allocates_in_order() {
        let mut pool = BufferPool::new(BufferKind::Page, 4);
        let mut store = RecordingStore::default();

        let ids: Vec<_> = (0..4)
            .map(|_| pool.alloc_train(&mut store).unwrap())
            .collect();

        assert_eq!(ids, vec![0, 1, 2, 3]);
        assert!(store.calls.is_empty());
        assert_eq!(pool.next_victim(), 0);
        assert_eq!(pool.stats().evictions, 0);
    }

    #[test]
    fn test_clock_order_wraps() {
        let mut pool = BufferPool::new(BufferKind::Page, 3);
        let mut store = RecordingStore::default();

        let ids: Vec<_> = (0..7)
            .map(|_| pool.alloc_train(&mut store).unwrap())
            .collect();
        assert_eq!(ids, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn test_dirty_victim_is_flushed_then_unindexed() {
        let mut pool = BufferPool::new(BufferKind::Page, 2);
        let mut store = RecordingStore::default();
        let k1 = TrainId::new(0, 1);
        occupy(&mut pool, 0, k1, true);

        let frame_id = pool.alloc_train(&mut store).unwrap();

        assert_eq!(frame_id, 0);
        assert_eq!(store.calls, vec![Call::Write(k1)]);
        assert_eq!(pool.lookup(&k1), None);
        assert_eq!(pool.frame_state(0), empty_state());
        assert_eq!(pool.next_victim(), 1);
        assert_eq!(pool.stats().flushes, 1);
        assert_eq!(pool.stats().evictions, 1);
    }

    #[test]
    fn test_clean_victim_is_not_flushed() {
        let mut pool = BufferPool::new(BufferKind::LargeObject, 1);
        let mut store = RecordingStore::default();
        let key = TrainId::new(2, 40);
        occupy(&mut pool, 0, key, false);

        assert_eq!(pool.alloc_train(&mut store).unwrap(), 0);
        assert!(store.calls.is_empty());
        assert_eq!(pool.lookup(&key), None);
    }

    #[test]
    fn test_zero_capacity() {
        let mut pool = BufferPool::new(BufferKind::LargeObject, 0);
        let mut store = RecordingStore::default();

        let err = pool.alloc_train(&mut store).unwrap_err();
        assert!(matches!(
            err,
            BufferError::NoUnfixedBuffer {
                kind: BufferKind::LargeObject
            }
        ));
    }

    #[test]
    fn test_all_pinned_fails_and_keeps_state() {
        let mut pool = BufferPool::new(BufferKind::Page, 3);
        let mut store = MemoryStore::new();
        for page_no in 0..3 {
            pool.fix_new(TrainId::new(0, page_no), &mut store).unwrap();
        }
        let before: Vec<_> = (0..3).map(|id| pool.frame_state(id)).collect();

        let err = pool.alloc_train(&mut store).unwrap_err();

        assert!(matches!(err, BufferError::NoUnfixedBuffer { .. }));
        let after: Vec<_> = (0..3).map(|id| pool.frame_state(id)).collect();
        assert_eq!(before, after);
        assert!(after.iter().all(|state| state.referenced));
        assert_eq!(pool.next_victim(), 0);
    }

    #[test]
    fn test_pinned_frame_is_skipped() {
        let mut pool = BufferPool::new(BufferKind::Page, 3);
        let mut store = MemoryStore::new();
        let pinned = TrainId::new(0, 0);
        assert_eq!(pool.fix_new(pinned, &mut store).unwrap(), 0);

        // Frame 0 is pinned, so the hand moves on to 1 and then 2.
        assert_eq!(pool.alloc_train(&mut store).unwrap(), 1);
        assert_eq!(pool.alloc_train(&mut store).unwrap(), 2);
        assert_eq!(pool.alloc_train(&mut store).unwrap(), 1);
        assert_eq!(pool.lookup(&pinned), Some(0));
    }

    #[test]
    fn test_second_chance_survives_one_pass() {
        let mut pool = BufferPool::new(BufferKind::Page, 2);
        let mut store = MemoryStore::new();
        let hot = TrainId::new(0, 10);
        let cold = TrainId::new(0, 11);
        pool.fix_new(hot, &mut store).unwrap();
        pool.fix_new(cold, &mut store).unwrap();
        pool.unfix(&hot).unwrap();
        pool.unfix(&cold).unwrap();
        pool.frames.clear_referenced(1);

        // Hand at 0: hot loses its bit, cold is taken.
        assert_eq!(pool.alloc_train(&mut store).unwrap(), 1);
        assert_eq!(pool.lookup(&hot), Some(0));
        assert!(!pool.frame_state(0).referenced);

        // Hand wraps to 0: hot is now unreferenced and goes.
        assert_eq!(pool.alloc_train(&mut store).unwrap(), 0);
        assert_eq!(pool.lookup(&hot), None);
    }

    #[test]
    fn test_flush_failure_leaves_victim_intact() {
        let mut pool = BufferPool::new(BufferKind::Page, 2);
        let mut store = RecordingStore::default();
        let key = TrainId::new(1, 3);
        occupy(&mut pool, 0, key, true);
        pool.frames.get_mut(0).data_mut()[0] = 7;
        store.fail_writes = true;

        let err = pool.alloc_train(&mut store).unwrap_err();

        assert!(matches!(err, BufferError::Io(_)));
        let state = pool.frame_state(0);
        assert_eq!(state.key, Some(key));
        assert!(state.dirty);
        assert_eq!(pool.lookup(&key), Some(0));
        assert_eq!(pool.data(&key).unwrap()[0], 7);
        assert_eq!(pool.next_victim(), 0);

        // Same victim once the store recovers.
        store.fail_writes = false;
        assert_eq!(pool.alloc_train(&mut store).unwrap(), 0);
        assert_eq!(store.calls, vec![Call::Write(key)]);
    }

    #[test]
    fn test_unindexed_key_is_fatal() {
        let mut pool = BufferPool::new(BufferKind::Page, 2);
        let mut store = RecordingStore::default();
        let key = TrainId::new(0, 5);
        pool.frames.get_mut(0).key = Some(key);

        let err = pool.alloc_train(&mut store).unwrap_err();

        assert!(matches!(err, BufferError::HashKeyNotFound { .. }));
        assert!(err.is_fatal());
        assert_eq!(pool.frame_state(0).key, Some(key));
        assert_eq!(pool.next_victim(), 0);
    }

    #[test]
    fn test_fix_hit_and_miss() {
        let mut pool = BufferPool::new(BufferKind::Page, 2);
        let mut store = RecordingStore::default();
        let key = TrainId::new(0, 2);

        let first = pool.fix(key, &mut store).unwrap();
        let second = pool.fix(key, &mut store).unwrap();

        assert_eq!(first, second);
        assert_eq!(store.calls, vec![Call::Read(key)]);
        assert_eq!(pool.frame_state(first).pin_count, 2);
        assert!(pool.frame_state(first).referenced);
        assert_eq!(pool.stats().hits, 1);
        assert_eq!(pool.stats().misses, 1);
    }

    #[test]
    fn test_fix_read_failure_leaves_frame_empty() {
        let mut pool = BufferPool::new(BufferKind::Page, 1);
        let mut store = MemoryStore::new();
        let key = TrainId::new(0, 99);

        let err = pool.fix(key, &mut store).unwrap_err();

        assert!(matches!(err, BufferError::MissingOnDisk { .. }));
        assert_eq!(pool.lookup(&key), None);
        assert_eq!(pool.frame_state(0), empty_state());
    }

    #[test]
    fn test_fix_new_duplicate() {
        let mut pool = BufferPool::new(BufferKind::Page, 2);
        let mut store = MemoryStore::new();
        let key = TrainId::new(0, 1);
        pool.fix_new(key, &mut store).unwrap();

        let err = pool.fix_new(key, &mut store).unwrap_err();
        assert!(matches!(err, BufferError::DuplicateKey { .. }));
    }

    #[test]
    fn test_unfix_errors() {
        let mut pool = BufferPool::new(BufferKind::Page, 2);
        let mut store = MemoryStore::new();
        let key = TrainId::new(0, 1);

        assert!(matches!(
            pool.unfix(&key),
            Err(BufferError::TrainNotResident { .. })
        ));

        pool.fix_new(key, &mut store).unwrap();
        pool.unfix(&key).unwrap();
        assert!(matches!(pool.unfix(&key), Err(BufferError::NotFixed { .. })));
    }

    #[test]
    fn test_evicted_new_train_reaches_store() {
        let mut pool = BufferPool::new(BufferKind::Page, 1);
        let mut store = MemoryStore::new();
        let key = TrainId::new(0, 4);

        pool.fix_new(key, &mut store).unwrap();
        pool.data_mut(&key).unwrap()[10] = 0x5A;
        pool.unfix(&key).unwrap();

        // Referenced on first sweep, evicted on the second.
        pool.fix_new(TrainId::new(0, 5), &mut store).unwrap();

        assert_eq!(store.get(key, BufferKind::Page).unwrap()[10], 0x5A);
    }

    #[test]
    fn test_flush_all_clears_dirty() {
        let mut pool = BufferPool::new(BufferKind::Page, 3);
        let mut store = MemoryStore::new();
        pool.fix_new(TrainId::new(0, 0), &mut store).unwrap();
        pool.fix_new(TrainId::new(0, 1), &mut store).unwrap();

        pool.flush_all(&mut store).unwrap();

        assert_eq!(store.writes(), 2);
        assert!((0..3).all(|id| !pool.frame_state(id).dirty));

        // Nothing left to write.
        pool.flush_train(&TrainId::new(0, 0), &mut store).unwrap();
        assert_eq!(store.writes(), 2);
    }

    #[test]
    fn test_discard_all() {
        let mut pool = BufferPool::new(BufferKind::Page, 2);
        let mut store = MemoryStore::new();
        let key = TrainId::new(0, 0);
        pool.fix_new(key, &mut store).unwrap();

        let err = pool.discard_all().unwrap_err();
        assert!(matches!(err, BufferError::FramesFixed { count: 1, .. }));
        assert_eq!(pool.lookup(&key), Some(0));

        pool.unfix(&key).unwrap();
        pool.discard_all().unwrap();

        assert_eq!(pool.lookup(&key), None);
        assert_eq!(pool.frame_state(0), empty_state());
        assert_eq!(store.writes(), 0);
    }

    #[test]
    fn test_random_workload_never_evicts_pinned() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut pool = BufferPool::new(BufferKind::Page, 8);
        let mut store = MemoryStore::new();
        let mut held: Vec<TrainId> = Vec::new();

        for page_no in 0..32 {
            let key = TrainId::new(0, page_no);
            pool.fix_new(key, &mut store).unwrap();
            pool.unfix(&key).unwrap();
        }

        for _ in 0..2_000 {
            if !held.is_empty() && rng.gen_bool(0.5) {
                let key = held.swap_remove(rng.gen_range(0..held.len()));
                pool.unfix(&key).unwrap();
                continue;
            }

            let key = TrainId::new(0, rng.gen_range(0..32));
            let pinned: HashSet<FrameId> = (0..pool.capacity())
                .filter(|&id| pool.frame_state(id).pin_count > 0)
                .collect();
            let resident = pool.lookup(&key);

            match pool.fix(key, &mut store) {
                Ok(frame_id) => {
                    if resident.is_none() {
                        assert!(!pinned.contains(&frame_id));
                    }
                    held.push(key);
                }
                Err(BufferError::NoUnfixedBuffer { .. }) => {
                    assert_eq!(pinned.len(), pool.capacity());
                }
                Err(e) => panic!("unexpected error: {}", e),
            }

            for frame_id in 0..pool.capacity() {
                if let Some(k) = pool.frame_state(frame_id).key {
                    assert_eq!(pool.lookup(&k), Some(frame_id));
                }
            }
        }
    }
}
