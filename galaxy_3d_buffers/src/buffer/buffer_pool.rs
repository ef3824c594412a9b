/// BufferPool - recycling cache of spare GPU buffer objects
///
/// Bucket `i` holds buffers whose storage is exactly `2^i` bytes. Released
/// buffers go to the back of their bucket and `acquire` takes from the front,
/// so the oldest spare is reused first and `trim` keeps the newest ones.
///
/// # Example
///
/// ```ignore
/// use galaxy_3d_buffers::galaxy3d::buffer::BufferPool;
///
/// let mut pool = BufferPool::new(device.clone());
/// let handle = pool.acquire(300)?;   // 512-byte buffer
/// pool.release(handle)?;
/// # Ok::<(), galaxy_3d_buffers::galaxy3d::Error>(())
/// ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use crate::error::Result;
use crate::graphics_device::{lock_device, BufferHandle, BufferTarget, BufferUsage, GraphicsDevice};

/// Number of size classes (`2^0` to `2^31` bytes)
pub const BUCKET_COUNT: usize = 32;

const SOURCE: &str = "galaxy3d::BufferPool";

/// Size class holding buffers of at least `size` bytes, `None` when out of range
pub fn bucket_for_size(size: u64) -> Option<usize> {
    if size == 0 {
        return None;
    }
    let bucket = (64 - (size - 1).leading_zeros()) as usize;
    (bucket < BUCKET_COUNT).then_some(bucket)
}

pub struct BufferPool {
    device: Arc<Mutex<dyn GraphicsDevice>>,
    target: BufferTarget,
    usage: BufferUsage,
    buckets: Vec<VecDeque<BufferHandle>>,
}

impl BufferPool {
    /// Empty pool creating vertex buffers with stream-draw usage
    pub fn new(device: Arc<Mutex<dyn GraphicsDevice>>) -> Self {
        Self {
            device,
            target: BufferTarget::Vertex,
            usage: BufferUsage::StreamDraw,
            buckets: (0..BUCKET_COUNT).map(|_| VecDeque::new()).collect(),
        }
    }

    /// Target and usage used for buffers created by `acquire`
    pub fn configure(&mut self, target: BufferTarget, usage: BufferUsage) {
        self.target = target;
        self.usage = usage;
        crate::engine_debug!(SOURCE, "Pool configured for {:?} buffers with {:?} usage", target, usage);
    }

    // ===== ACCESSORS =====

    pub fn target(&self) -> BufferTarget {
        self.target
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    /// Number of cached buffers in one bucket
    pub fn bucket_len(&self, bucket: usize) -> usize {
        self.buckets.get(bucket).map(VecDeque::len).unwrap_or(0)
    }

    /// Number of cached buffers
    pub fn len(&self) -> usize {
        self.buckets.iter().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(VecDeque::is_empty)
    }

    /// Sum of the storage sizes the device reports for every cached buffer
    pub fn total_bytes(&self) -> Result<u64> {
        let device = lock_device(&self.device)?;
        Ok(self
            .buckets
            .iter()
            .flatten()
            .map(|handle| device.buffer_size(*handle))
            .sum())
    }

    // ===== RECYCLING =====

    /// Hand a buffer to the pool
    ///
    /// Buffers whose storage is not a power of two (or too large for any
    /// bucket) are deleted instead of cached.
    pub fn release(&mut self, handle: BufferHandle) -> Result<()> {
        let mut device = lock_device(&self.device)?;
        let capacity = device.buffer_size(handle);

        let bucket = if capacity.is_power_of_two() {
            Some(capacity.trailing_zeros() as usize).filter(|bucket| *bucket < BUCKET_COUNT)
        } else {
            None
        };

        match bucket {
            Some(bucket) => {
                self.buckets[bucket].push_back(handle);
                crate::engine_trace!(SOURCE, "Cached {:?} in bucket {}", handle, bucket);
            }
            None => {
                device.delete_buffer(handle);
                crate::engine_debug!(
                    SOURCE,
                    "Deleted {:?}: capacity {} is not a cacheable power of two",
                    handle,
                    capacity
                );
            }
        }
        Ok(())
    }

    /// Take a buffer of at least `size` bytes (capacity `2^ceil(log2(size))`)
    ///
    /// Reuses the oldest cached buffer of that size class, or creates one with
    /// uninitialized storage.
    pub fn acquire(&mut self, size: u64) -> Result<BufferHandle> {
        let bucket = match bucket_for_size(size) {
            Some(bucket) => bucket,
            None => crate::engine_bail!(SOURCE, "Cannot acquire a pooled buffer of {} bytes", size),
        };

        if let Some(handle) = self.buckets[bucket].pop_front() {
            crate::engine_trace!(SOURCE, "Reused {:?} from bucket {}", handle, bucket);
            return Ok(handle);
        }

        let capacity = 1u64 << bucket;
        let mut device = lock_device(&self.device)?;
        let handle = device.create_buffer().map_err(|err| {
            crate::engine_error!(SOURCE, "Failed to create pooled buffer: {}", err);
            err
        })?;
        if let Err(err) = device.buffer_storage(handle, self.target, capacity, None, self.usage) {
            device.delete_buffer(handle);
            crate::engine_error!(SOURCE, "Failed to allocate {} bytes for pooled buffer: {}", capacity, err);
            return Err(err);
        }
        crate::engine_trace!(SOURCE, "Created {:?} with capacity {}", handle, capacity);
        Ok(handle)
    }

    /// Delete the oldest buffers of every bucket holding more than `max_per_bucket`
    pub fn trim(&mut self, max_per_bucket: usize) -> Result<usize> {
        let mut device = lock_device(&self.device)?;
        let mut deleted = 0;
        for handles in &mut self.buckets {
            while handles.len() > max_per_bucket {
                if let Some(handle) = handles.pop_front() {
                    device.delete_buffer(handle);
                    deleted += 1;
                }
            }
        }
        if deleted > 0 {
            crate::engine_debug!(SOURCE, "Trimmed {} pooled buffers", deleted);
        }
        Ok(deleted)
    }

    /// Delete every cached buffer
    pub fn clear(&mut self) -> Result<usize> {
        self.trim(0)
    }
}

impl Drop for BufferPool {
    fn drop(&mut self) {
        if self.is_empty() {
            return;
        }
        if let Err(err) = self.clear() {
            crate::engine_warn!(SOURCE, "Pooled buffers leaked on drop: {}", err);
        }
    }
}

#[cfg(test)]
#[path = "buffer_pool_tests.rs"]
mod tests;
