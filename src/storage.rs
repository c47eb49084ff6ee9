//! Storage layer for trainbuf.
//!
//! The buffer manager caches fixed-size trains in two independent pools,
//! one for regular pages and one for large-object trains. Key components:
//!
//! - **FrameTable**: fixed-capacity array of frames per pool
//! - **HashIndex**: train key to frame, chained through the frames
//! - **ClockReplacer**: second-chance victim selection
//! - **BufferManager**: per-pool latching, allocation, fix/unfix and flushing
//! - **TrainStore**: where dirty trains go and missing trains come from

pub mod buffer;
pub mod config;
pub mod disk;
pub mod error;
pub mod page;

pub use buffer::{BufferManager, TrainGuard};
pub use config::BufferConfig;
pub use disk::{FileStore, MemoryStore, TrainStore, PAGE_SIZE};
pub use error::{BufferError, BufferResult};
pub use page::{BufferKind, TrainId};
