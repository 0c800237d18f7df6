//! Block tracker: a sliding window of recently delivered blocks and their
//! logs, used to detect reorgs and to replay dropped logs as removed.

use std::collections::VecDeque;

use orchwatch_core::types::{BlockHeader, RawLog};

/// A delivered block together with the logs it carried.
#[derive(Debug, Clone)]
pub struct TrackedBlock {
    pub header: BlockHeader,
    pub logs: Vec<RawLog>,
}

/// Tracks the last N delivered blocks.
pub struct BlockTracker {
    /// Oldest first.
    window: VecDeque<TrackedBlock>,
    window_size: usize,
}

impl BlockTracker {
    pub fn new(window_size: usize) -> Self {
        let window_size = window_size.max(1);
        Self {
            window: VecDeque::with_capacity(window_size),
            window_size,
        }
    }

    /// Returns `true` if `header` can be appended: the window is empty or
    /// `header` is the child of the current head.
    pub fn extends_head(&self, header: &BlockHeader) -> bool {
        self.window
            .back()
            .map_or(true, |head| header.extends(&head.header))
    }

    /// Append a block, evicting the oldest one when the window is full.
    /// Callers check [`extends_head`](Self::extends_head) first.
    pub fn push(&mut self, block: TrackedBlock) {
        if self.window.len() >= self.window_size {
            self.window.pop_front();
        }
        self.window.push_back(block);
    }

    /// Drop and return the current head.
    pub fn pop(&mut self) -> Option<TrackedBlock> {
        self.window.pop_back()
    }

    pub fn head(&self) -> Option<&BlockHeader> {
        self.window.back().map(|b| &b.header)
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}
