//! Store configuration types
//!
//! The store needs very little configuration: how much to preallocate and
//! whether to collapse repeated frames.

use serde::{Deserialize, Serialize};

/// Preallocation used on targets with more than 32 bits of address space
pub const LARGE_CAPACITY: usize = 10_000_000;

/// Preallocation used on 32-bit (and smaller) targets
pub const SMALL_CAPACITY: usize = 2_000_000;

/// Number of frames to preallocate for, chosen from the pointer width.
pub fn default_capacity() -> usize {
    if usize::BITS > 32 {
        LARGE_CAPACITY
    } else {
        SMALL_CAPACITY
    }
}

/// Configuration for a [`FrameStore`](crate::FrameStore)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Frames reserved for both the full store and the filtered view
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Collapse frames sharing (identifier, bus) into one row
    #[serde(default)]
    pub dedup: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            dedup: false,
        }
    }
}

impl StoreConfig {
    /// Create a new store configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the preallocated capacity
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Builder method: enable or disable dedup mode
    pub fn with_dedup(mut self, enabled: bool) -> Self {
        self.dedup = enabled;
        self
    }
}
