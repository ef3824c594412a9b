/// Buffer - one GPU buffer object and the sub-regions laid out in it
///
/// The attached `BufferData` live in the manager's arena; a `Buffer` keeps
/// their keys in layout order, the keys of the dirty ones, and the bounding
/// range of all pending changes in buffer offsets.

use slotmap::{new_key_type, SlotMap};
use crate::buffer::{BufferData, BufferDataKey, DirtyRange};
use crate::graphics_device::{BufferHandle, BufferTarget, BufferUsage};

new_key_type! {
    /// Stable key of a Buffer owned by a `BufferManager`
    pub struct BufferKey;
}

#[derive(Debug)]
pub struct Buffer {
    pub(crate) handle: Option<BufferHandle>,
    target: BufferTarget,
    pub(crate) usage: BufferUsage,
    total_size: u64,
    pub(crate) allocated_size: u64,
    layout: Vec<BufferDataKey>,
    dirty: Vec<BufferDataKey>,
    dirty_range: DirtyRange,
    pub(crate) built: bool,
}

impl Buffer {
    pub(crate) fn new(target: BufferTarget, usage: BufferUsage) -> Self {
        Self {
            handle: None,
            target,
            usage,
            total_size: 0,
            allocated_size: 0,
            layout: Vec::new(),
            dirty: Vec::new(),
            dirty_range: DirtyRange::EMPTY,
            built: false,
        }
    }

    // ===== ACCESSORS =====

    pub fn handle(&self) -> Option<BufferHandle> {
        self.handle
    }

    pub fn target(&self) -> BufferTarget {
        self.target
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    /// Sum of the sizes of every data laid out so far
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Bytes of GPU storage currently allocated (0 before `build`)
    pub fn allocated_size(&self) -> u64 {
        self.allocated_size
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    pub fn layout(&self) -> &[BufferDataKey] {
        &self.layout
    }

    pub fn dirty_data(&self) -> &[BufferDataKey] {
        &self.dirty
    }

    /// Buffer-wide dirty range `[min, max)`
    pub fn dirty_range(&self) -> DirtyRange {
        self.dirty_range
    }

    // ===== LAYOUT =====

    /// Append a region of `size` bytes; returns its offset
    pub(crate) fn append(&mut self, key: BufferDataKey, size: u64) -> u64 {
        let first = self.total_size;
        self.layout.push(key);
        self.total_size += size;
        first
    }

    /// Remove a region from the layout and the dirty set; the total size is kept
    pub(crate) fn remove(&mut self, key: BufferDataKey) {
        if let Some(position) = self.layout.iter().position(|k| *k == key) {
            self.layout.remove(position);
        }
        if let Some(position) = self.dirty.iter().position(|k| *k == key) {
            self.dirty.swap_remove(position);
        }
        if self.dirty.is_empty() {
            self.dirty_range.clear();
        }
    }

    /// Offsets and content the buffer has once compacted back to back
    pub(crate) fn plan_layout(&self, arena: &SlotMap<BufferDataKey, BufferData>) -> LayoutPlan {
        let mut offsets = Vec::with_capacity(self.layout.len());
        let mut size = 0;
        for key in &self.layout {
            offsets.push(size);
            size += arena.get(*key).map(|data| data.size()).unwrap_or(0);
        }

        let mut staging = vec![0u8; size as usize];
        for (key, offset) in self.layout.iter().zip(&offsets) {
            if let Some(data) = arena.get(*key) {
                let start = *offset as usize;
                staging[start..start + data.bytes().len()].copy_from_slice(data.bytes());
            }
        }

        LayoutPlan { offsets, staging }
    }

    /// Apply a plan made by `plan_layout` once its content reached the GPU
    pub(crate) fn commit_layout(&mut self, arena: &mut SlotMap<BufferDataKey, BufferData>, plan: &LayoutPlan) {
        for (key, offset) in self.layout.iter().zip(&plan.offsets) {
            if let Some(data) = arena.get_mut(*key) {
                data.first = *offset;
            }
        }
        self.total_size = plan.size();
    }

    // ===== DIRTY TRACKING =====

    /// Record a dirty buffer-relative range for `key`
    pub(crate) fn include_dirty(&mut self, key: BufferDataKey, min: u64, max: u64) {
        if !self.dirty.contains(&key) {
            self.dirty.push(key);
        }
        self.dirty_range.include(min, max);
    }

    /// Drop every pending change, returning the keys that were dirty
    pub(crate) fn take_dirty(&mut self) -> Vec<BufferDataKey> {
        self.dirty_range.clear();
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn take_layout(&mut self) -> Vec<BufferDataKey> {
        self.dirty.clear();
        self.dirty_range.clear();
        std::mem::take(&mut self.layout)
    }
}

/// Compacted layout of a buffer, ready to upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LayoutPlan {
    /// New offset of each data, in layout order
    pub offsets: Vec<u64>,
    /// Full buffer content at those offsets
    pub staging: Vec<u8>,
}

impl LayoutPlan {
    pub fn size(&self) -> u64 {
        self.staging.len() as u64
    }
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
