//! Second-chance clock replacement.
//!
//! The hand sweeps the frame table in circular order. For each frame:
//! - pinned: skip it, leaving its reference bit alone
//! - unpinned and referenced: clear the bit and move on
//! - unpinned and unreferenced: this is the victim
//!
//! The sweep gives up after two full revolutions. The first revolution may
//! do nothing but clear reference bits; the second finds what the first
//! cleared. If both pass without a victim, every frame is pinned.

use super::frame::{FrameId, FrameTable};

/// Result of one victim search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    Victim(FrameId),
    /// No candidate after examining `examined` frames.
    Exhausted { examined: usize },
}

#[derive(Debug, Default)]
pub struct ClockReplacer {
    /// Position the next sweep starts from.
    next_victim: FrameId,
}

impl ClockReplacer {
    pub fn new() -> Self {
        Self { next_victim: 0 }
    }

    pub fn next_victim(&self) -> FrameId {
        self.next_victim
    }

    /// Searches for a victim starting at the hand.
    ///
    /// Only reference bits are touched; the hand itself stays put until the
    /// caller has finished evicting and calls [`ClockReplacer::advance_past`].
    pub fn select_victim(&self, frames: &mut FrameTable) -> ScanOutcome {
        let capacity = frames.capacity();
        if capacity == 0 {
            return ScanOutcome::Exhausted { examined: 0 };
        }

        let mut victim = self.next_victim;
        for _ in 0..capacity * 2 {
            if !frames.is_pinned(victim) {
                if !frames.is_referenced(victim) {
                    return ScanOutcome::Victim(victim);
                }
                log::trace!("second chance for frame {}", victim);
                frames.clear_referenced(victim);
            }
            victim = (victim + 1) % capacity;
        }

        ScanOutcome::Exhausted {
            examined: capacity * 2,
        }
    }

    /// Moves the hand to the frame after `frame_id`.
    pub fn advance_past(&mut self, frame_id: FrameId, capacity: usize) {
        self.next_victim = (frame_id + 1) % capacity;
    }
}
