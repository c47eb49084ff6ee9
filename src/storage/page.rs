use crate::storage::PAGE_SIZE;

/// Number of pages making up one large-object train.
pub const TRAIN_PAGES: usize = 4;

/// Size in bytes of a large-object train.
pub const TRAIN_SIZE: usize = PAGE_SIZE * TRAIN_PAGES;

/// Identifies a cached train: the volume it lives on and its first page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrainId {
    pub volume: u16,
    pub page_no: u32,
}

impl TrainId {
    pub fn new(volume: u16, page_no: u32) -> Self {
        Self { volume, page_no }
    }
}

impl std::fmt::Display for TrainId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.volume, self.page_no)
    }
}

/// The two independent buffer pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// Regular single-page buffers.
    Page,
    /// Multi-page trains holding large objects.
    LargeObject,
}

impl BufferKind {
    pub const ALL: [BufferKind; 2] = [BufferKind::Page, BufferKind::LargeObject];

    /// Bytes held by one frame of this kind.
    pub fn train_size(self) -> usize {
        match self {
            BufferKind::Page => PAGE_SIZE,
            BufferKind::LargeObject => TRAIN_SIZE,
        }
    }

    /// Pages on disk covered by one train of this kind.
    pub fn pages_per_train(self) -> usize {
        match self {
            BufferKind::Page => 1,
            BufferKind::LargeObject => TRAIN_PAGES,
        }
    }
}

impl std::fmt::Display for BufferKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BufferKind::Page => write!(f, "page"),
            BufferKind::LargeObject => write!(f, "train"),
        }
    }
}
