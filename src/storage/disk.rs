//! Backing storage for buffered trains.

pub mod file_store;
pub mod memory_store;

pub use file_store::FileStore;
pub use memory_store::MemoryStore;

use crate::storage::error::BufferResult;
use crate::storage::page::{BufferKind, TrainId};

pub const PAGE_SIZE: usize = 8192;

/// Reads and persists whole trains. The buffer manager calls `write_train`
/// to flush a dirty frame and `read_train` to load a missing one.
pub trait TrainStore: Send {
    /// Fills `buf` (exactly `kind.train_size()` bytes) with the train's contents.
    fn read_train(&mut self, key: TrainId, kind: BufferKind, buf: &mut [u8]) -> BufferResult<()>;

    /// Persists `data` (exactly `kind.train_size()` bytes) as the train's contents.
    fn write_train(&mut self, key: TrainId, kind: BufferKind, data: &[u8]) -> BufferResult<()>;
}
