pub mod clock;
pub mod frame;
pub mod hash_index;
pub mod pool;

use crate::storage::config::BufferConfig;
use crate::storage::disk::TrainStore;
use crate::storage::error::{BufferError, BufferResult};
use crate::storage::page::{BufferKind, TrainId};
use frame::{FrameId, FrameState};
use parking_lot::Mutex;
use pool::{BufferPool, PoolStats};
use std::sync::Arc;

/// Buffer manager owning one pool per [`BufferKind`].
///
/// Each pool sits behind its own latch, held for the whole of every
/// operation on that pool, including any store I/O it triggers. The store
/// latch is always taken after a pool latch.
#[derive(Clone)]
pub struct BufferManager {
    inner: Arc<BufferManagerInner>,
}

struct BufferManagerInner {
    config: BufferConfig,
    page_pool: Mutex<BufferPool>,
    train_pool: Mutex<BufferPool>,
    store: Mutex<Box<dyn TrainStore>>,
}

impl BufferManager {
    pub fn new(config: BufferConfig, store: Box<dyn TrainStore>) -> Self {
        log::info!(
            "buffer manager: {} page frames, {} train frames",
            config.page_buffers,
            config.train_buffers
        );
        Self {
            inner: Arc::new(BufferManagerInner {
                page_pool: Mutex::new(BufferPool::new(
                    BufferKind::Page,
                    config.capacity(BufferKind::Page),
                )),
                train_pool: Mutex::new(BufferPool::new(
                    BufferKind::LargeObject,
                    config.capacity(BufferKind::LargeObject),
                )),
                store: Mutex::new(store),
                config,
            }),
        }
    }

    fn pool(&self, kind: BufferKind) -> &Mutex<BufferPool> {
        match kind {
            BufferKind::Page => &self.inner.page_pool,
            BufferKind::LargeObject => &self.inner.train_pool,
        }
    }

    fn check_bulk_flush(&self) -> BufferResult<()> {
        if self.inner.config.use_bulk_flush {
            return Err(BufferError::NotSupported("bulk flush"));
        }
        Ok(())
    }

    /// Returns an empty, unregistered frame of the given kind, evicting the
    /// clock's victim if needed.
    pub fn allocate(&self, kind: BufferKind) -> BufferResult<FrameId> {
        self.check_bulk_flush()?;

        let mut pool = self.pool(kind).lock();
        let mut store = self.inner.store.lock();
        pool.alloc_train(&mut **store)
    }

    /// Pins `key`, reading it from the store on a miss.
    pub fn fix_train(&self, key: TrainId, kind: BufferKind) -> BufferResult<FrameId> {
        let mut pool = self.pool(kind).lock();
        if pool.lookup(&key).is_none() {
            self.check_bulk_flush()?;
        }

        let mut store = self.inner.store.lock();
        pool.fix(key, &mut **store)
    }

    /// Pins a zero-filled frame for a train that is being created.
    pub fn fix_new_train(&self, key: TrainId, kind: BufferKind) -> BufferResult<FrameId> {
        self.check_bulk_flush()?;

        let mut pool = self.pool(kind).lock();
        let mut store = self.inner.store.lock();
        pool.fix_new(key, &mut **store)
    }

    pub fn unfix_train(&self, key: TrainId, kind: BufferKind) -> BufferResult<()> {
        self.pool(kind).lock().unfix(&key)
    }

    /// Pins `key` for the lifetime of the returned guard.
    pub fn pin(&self, key: TrainId, kind: BufferKind) -> BufferResult<TrainGuard> {
        let frame_id = self.fix_train(key, kind)?;
        Ok(TrainGuard {
            manager: self.clone(),
            key,
            kind,
            frame_id,
        })
    }

    /// Like [`BufferManager::pin`] but for a train that does not exist yet.
    pub fn pin_new(&self, key: TrainId, kind: BufferKind) -> BufferResult<TrainGuard> {
        let frame_id = self.fix_new_train(key, kind)?;
        Ok(TrainGuard {
            manager: self.clone(),
            key,
            kind,
            frame_id,
        })
    }

    pub fn set_dirty(&self, key: TrainId, kind: BufferKind) -> BufferResult<()> {
        self.pool(kind).lock().set_dirty(&key)
    }

    /// Runs `f` over the train's bytes.
    ///
    /// `f` runs with the pool latch held. It must not call back into this
    /// manager for the same kind; the latch is not reentrant and the call
    /// deadlocks.
    pub fn with_train<R>(
        &self,
        key: TrainId,
        kind: BufferKind,
        f: impl FnOnce(&[u8]) -> R,
    ) -> BufferResult<R> {
        let pool = self.pool(kind).lock();
        Ok(f(pool.data(&key)?))
    }

    /// Runs `f` over the train's bytes and marks it dirty. Same latching
    /// rule as [`BufferManager::with_train`].
    pub fn with_train_mut<R>(
        &self,
        key: TrainId,
        kind: BufferKind,
        f: impl FnOnce(&mut [u8]) -> R,
    ) -> BufferResult<R> {
        let mut pool = self.pool(kind).lock();
        Ok(f(pool.data_mut(&key)?))
    }

    pub fn flush_train(&self, key: TrainId, kind: BufferKind) -> BufferResult<()> {
        let mut pool = self.pool(kind).lock();
        let mut store = self.inner.store.lock();
        pool.flush_train(&key, &mut **store)
    }

    /// Writes back every dirty frame of both pools.
    pub fn flush_all(&self) -> BufferResult<()> {
        self.check_bulk_flush()?;

        for kind in BufferKind::ALL {
            let mut pool = self.pool(kind).lock();
            let mut store = self.inner.store.lock();
            pool.flush_all(&mut **store)?;
        }
        log::info!("flushed all buffers");
        Ok(())
    }

    /// Drops every cached train of both pools without writing anything.
    ///
    /// Fails with `FramesFixed`, leaving both pools untouched, while any
    /// train of either kind is fixed.
    pub fn discard_all(&self) -> BufferResult<()> {
        let mut page_pool = self.inner.page_pool.lock();
        let mut train_pool = self.inner.train_pool.lock();

        let pools = [
            (BufferKind::Page, &*page_pool),
            (BufferKind::LargeObject, &*train_pool),
        ];
        for (kind, pool) in pools {
            let count = pool.fixed_frames();
            if count > 0 {
                return Err(BufferError::FramesFixed { kind, count });
            }
        }

        page_pool.discard_all()?;
        train_pool.discard_all()?;
        log::info!("discarded all buffers");
        Ok(())
    }

    pub fn lookup(&self, key: TrainId, kind: BufferKind) -> Option<FrameId> {
        self.pool(kind).lock().lookup(&key)
    }

    pub fn stats(&self, kind: BufferKind) -> PoolStats {
        self.pool(kind).lock().stats()
    }

    pub fn frame_state(&self, kind: BufferKind, frame_id: FrameId) -> FrameState {
        self.pool(kind).lock().frame_state(frame_id)
    }

    pub fn next_victim(&self, kind: BufferKind) -> FrameId {
        self.pool(kind).lock().next_victim()
    }
}

/// A pinned train. Unfixes on drop.
pub struct TrainGuard {
    manager: BufferManager,
    key: TrainId,
    kind: BufferKind,
    frame_id: FrameId,
}

impl TrainGuard {
    pub fn key(&self) -> TrainId {
        self.key
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// See [`BufferManager::with_train`]; `f` must not re-enter the manager
    /// for this kind.
    pub fn read<R>(&self, f: impl FnOnce(&[u8]) -> R) -> BufferResult<R> {
        self.manager.with_train(self.key, self.kind, f)
    }

    /// See [`BufferManager::with_train_mut`]; `f` must not re-enter the
    /// manager for this kind.
    pub fn write<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> BufferResult<R> {
        self.manager.with_train_mut(self.key, self.kind, f)
    }
}

impl Drop for TrainGuard {
    fn drop(&mut self) {
        if let Err(e) = self.manager.unfix_train(self.key, self.kind) {
            log::warn!("failed to unfix {} ({}): {}", self.key, self.kind, e);
        }
    }
}
