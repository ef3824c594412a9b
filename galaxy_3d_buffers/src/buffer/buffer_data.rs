/// BufferData - one logical sub-region of a buffer, with its source bytes

use std::ops::Range;
use slotmap::new_key_type;
use crate::buffer::BufferKey;

new_key_type! {
    /// Stable key of a BufferData attached to a `BufferManager`
    pub struct BufferDataKey;
}

// ============================================================================
// DirtyRange
// ============================================================================

/// Half-open byte range `[min, max)`; empty when `min >= max`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DirtyRange {
    pub min: u64,
    pub max: u64,
}

impl DirtyRange {
    pub const EMPTY: DirtyRange = DirtyRange { min: 0, max: 0 };

    pub fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    pub fn is_empty(&self) -> bool {
        self.min >= self.max
    }

    pub fn len(&self) -> u64 {
        self.max.saturating_sub(self.min)
    }

    /// Grow to the bounding union with `[min, max)`
    ///
    /// An empty range is replaced, an empty argument is ignored.
    pub fn include(&mut self, min: u64, max: u64) {
        if min >= max {
            return;
        }
        if self.is_empty() {
            *self = DirtyRange { min, max };
        } else {
            self.min = self.min.min(min);
            self.max = self.max.max(max);
        }
    }

    pub fn clear(&mut self) {
        *self = DirtyRange::EMPTY;
    }

    pub fn as_range(&self) -> Option<Range<u64>> {
        if self.is_empty() {
            None
        } else {
            Some(self.min..self.max)
        }
    }
}

// ============================================================================
// BufferData
// ============================================================================

/// Who drops a BufferData when its buffer is destroyed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOwnership {
    /// Handed back to the caller by `destroy_buffer`
    Caller,
    /// Dropped with the buffer
    Engine,
}

/// One logical sub-allocation inside a buffer
///
/// The source bytes live here. Once attached, `first` is the byte offset of
/// this region inside its buffer, and `first + size <= total_size` holds.
#[derive(Debug, Clone)]
pub struct BufferData {
    pub(crate) first: u64,
    pub(crate) owner: Option<BufferKey>,
    pub(crate) dirty: DirtyRange,
    bytes: Vec<u8>,
    ownership: DataOwnership,
}

impl BufferData {
    /// Caller-owned data
    pub fn new(bytes: Vec<u8>) -> Self {
        Self::with_ownership(bytes, DataOwnership::Caller)
    }

    /// Engine-owned data (dropped with its buffer)
    pub fn engine_owned(bytes: Vec<u8>) -> Self {
        Self::with_ownership(bytes, DataOwnership::Engine)
    }

    /// Zero-filled caller-owned data of `size` bytes
    pub fn zeroed(size: usize) -> Self {
        Self::new(vec![0; size])
    }

    fn with_ownership(bytes: Vec<u8>, ownership: DataOwnership) -> Self {
        Self {
            first: 0,
            owner: None,
            dirty: DirtyRange::EMPTY,
            bytes,
            ownership,
        }
    }

    // ===== ACCESSORS =====

    pub fn first(&self) -> u64 {
        self.first
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn owner(&self) -> Option<BufferKey> {
        self.owner
    }

    pub fn ownership(&self) -> DataOwnership {
        self.ownership
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Dirty sub-range, relative to the start of this data
    pub fn dirty_range(&self) -> Option<Range<u64>> {
        self.dirty.as_range()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Mutable source bytes; the caller marks the changed range dirty
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}
