use super::TrainStore;
use crate::storage::error::{BufferError, BufferResult};
use crate::storage::page::{BufferKind, TrainId};
use std::collections::HashMap;

/// Keeps trains in memory. Same contract as [`FileStore`](super::FileStore)
/// minus persistence across processes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    trains: HashMap<(TrainId, BufferKind), Vec<u8>>,
    writes: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored contents of a train, if it was ever written.
    pub fn get(&self, key: TrainId, kind: BufferKind) -> Option<&[u8]> {
        self.trains.get(&(key, kind)).map(Vec::as_slice)
    }

    /// Total `write_train` calls served.
    pub fn writes(&self) -> u64 {
        self.writes
    }

    fn check_size(kind: BufferKind, len: usize) -> BufferResult<()> {
        let expected = kind.train_size();
        if len != expected {
            return Err(BufferError::InvalidBufferSize {
                expected,
                actual: len,
            });
        }
        Ok(())
    }
}

impl TrainStore for MemoryStore {
    fn read_train(&mut self, key: TrainId, kind: BufferKind, buf: &mut [u8]) -> BufferResult<()> {
        Self::check_size(kind, buf.len())?;
        let data = self
            .trains
            .get(&(key, kind))
            .ok_or(BufferError::MissingOnDisk { key })?;
        buf.copy_from_slice(data);
        Ok(())
    }

    fn write_train(&mut self, key: TrainId, kind: BufferKind, data: &[u8]) -> BufferResult<()> {
        Self::check_size(kind, data.len())?;
        self.trains.insert((key, kind), data.to_vec());
        self.writes += 1;
        Ok(())
    }
}
