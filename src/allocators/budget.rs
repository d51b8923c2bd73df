//! Global byte budget bookkeeping

use crate::error::{FramePoolError, Result};

/// Byte budget shared by every slot allocation of one allocator
///
/// `max_bytes == 0` means unlimited. Callers hold the allocator lock around
/// every method so that the check and the charge are one atomic step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryBudget {
    /// Byte cap, 0 = unlimited
    pub max_bytes: usize,
    /// Bytes currently charged
    pub used_bytes: usize,
}

impl MemoryBudget {
    /// Create a budget with the given cap
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            used_bytes: 0,
        }
    }

    /// Whether the budget has a cap
    pub fn is_limited(&self) -> bool {
        self.max_bytes != 0
    }

    /// Charge `size` bytes, failing if the cap would be crossed
    pub fn try_charge(&mut self, size: usize) -> Result<()> {
        let next = self
            .used_bytes
            .checked_add(size)
            .ok_or_else(|| FramePoolError::out_of_memory(size))?;

        if self.is_limited() && next > self.max_bytes {
            return Err(FramePoolError::budget_exceeded(
                size,
                self.used_bytes,
                self.max_bytes,
            ));
        }

        self.used_bytes = next;
        Ok(())
    }

    /// Return `size` previously charged bytes
    pub fn refund(&mut self, size: usize) {
        debug_assert!(
            size <= self.used_bytes,
            "refund of {} bytes exceeds {} charged",
            size,
            self.used_bytes
        );
        self.used_bytes = self.used_bytes.saturating_sub(size);
    }

    /// Bytes left before the cap, `None` when unlimited
    pub fn remaining(&self) -> Option<usize> {
        self.is_limited()
            .then(|| self.max_bytes.saturating_sub(self.used_bytes))
    }
}
