//! Buffer manager configuration.

use crate::storage::page::BufferKind;

/// Default number of page frames.
pub const DEFAULT_PAGE_BUFFERS: usize = 64;

/// Default number of large-object train frames.
pub const DEFAULT_TRAIN_BUFFERS: usize = 16;

/// Sizing and feature flags for a [`BufferManager`](crate::storage::BufferManager).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferConfig {
    /// Frames in the page pool.
    pub page_buffers: usize,
    /// Frames in the large-object pool.
    pub train_buffers: usize,
    /// Bulk flush mode. Not implemented; enabling it makes allocation fail.
    pub use_bulk_flush: bool,
}

impl BufferConfig {
    pub fn new(page_buffers: usize, train_buffers: usize) -> Self {
        Self {
            page_buffers,
            train_buffers,
            use_bulk_flush: false,
        }
    }

    pub fn with_bulk_flush(mut self, enabled: bool) -> Self {
        self.use_bulk_flush = enabled;
        self
    }

    /// Capacity of the pool for the given kind.
    pub fn capacity(&self, kind: BufferKind) -> usize {
        match kind {
            BufferKind::Page => self.page_buffers,
            BufferKind::LargeObject => self.train_buffers,
        }
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_BUFFERS, DEFAULT_TRAIN_BUFFERS)
    }
}
