use super::{TrainStore, PAGE_SIZE};
use crate::storage::error::{BufferError, BufferResult};
use crate::storage::page::{BufferKind, TrainId};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Stores each volume as page-addressed files in one directory, one file per
/// buffer kind: `vol_<n>.db` for pages and `vol_<n>.lob.db` for large-object
/// trains. A train occupies `kind.pages_per_train()` consecutive pages
/// starting at its `page_no`, so extents of different kinds never overlap.
pub struct FileStore {
    dir: PathBuf,
    volumes: HashMap<(u16, BufferKind), File>,
}

impl FileStore {
    pub fn open(dir: &Path) -> BufferResult<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            volumes: HashMap::new(),
        })
    }

    pub fn volume_path(&self, volume: u16, kind: BufferKind) -> PathBuf {
        match kind {
            BufferKind::Page => self.dir.join(format!("vol_{}.db", volume)),
            BufferKind::LargeObject => self.dir.join(format!("vol_{}.lob.db", volume)),
        }
    }

    /// Number of whole pages currently in the volume file for `kind`.
    pub fn num_pages(&mut self, volume: u16, kind: BufferKind) -> BufferResult<u32> {
        let file_size = self.volume(volume, kind)?.metadata()?.len();
        Ok((file_size / PAGE_SIZE as u64) as u32)
    }

    fn volume(&mut self, volume: u16, kind: BufferKind) -> BufferResult<&mut File> {
        let path = self.volume_path(volume, kind);
        match self.volumes.entry((volume, kind)) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(false)
                    .open(&path)?;
                log::debug!("opened {} volume {} at {}", kind, volume, path.display());
                Ok(entry.insert(file))
            }
        }
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

    fn train_offset(key: TrainId) -> u64 {
        key.page_no as u64 * PAGE_SIZE as u64
    }
}

impl TrainStore for FileStore {
    fn read_train(&mut self, key: TrainId, kind: BufferKind, buf: &mut [u8]) -> BufferResult<()> {
        Self::check_size(kind, buf.len())?;

        let offset = Self::train_offset(key);
        let file = self.volume(key.volume, kind)?;
        let file_size = file.metadata()?.len();

        if offset + buf.len() as u64 > file_size {
            return Err(BufferError::MissingOnDisk { key });
        }

        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)?;
        Ok(())
    }

    fn write_train(&mut self, key: TrainId, kind: BufferKind, data: &[u8]) -> BufferResult<()> {
        Self::check_size(kind, data.len())?;

        let offset = Self::train_offset(key);
        let file = self.volume(key.volume, kind)?;
        let end = offset + data.len() as u64;

        if end > file.metadata()?.len() {
            file.set_len(end)?;
        }

        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        file.sync_all()?;
        Ok(())
    }
}
