/// BufferManager - per-context owner of buffers, their data and pending updates
///
/// One manager exists per GPU context. It owns every `Buffer` and every
/// attached `BufferData` (slot-map arenas addressed by keys), the list of
/// buffers waiting for an update, the update strategy chosen from the device
/// capabilities, and the draw state left by the last activation.
///
/// Per frame the geometry layer mutates source bytes, marks them dirty,
/// calls `flush_pending()` once, then activates and draws.
///
/// # Example
///
/// ```ignore
/// use galaxy_3d_buffers::galaxy3d::buffer::{BufferData, BufferManager};
/// use galaxy_3d_buffers::galaxy3d::device::{BufferTarget, BufferUsage};
///
/// let mut manager = BufferManager::new(device)?;
/// let buffer = manager.create_buffer(BufferTarget::Generic);
/// let data = manager.attach(buffer, BufferData::zeroed(64))?;
/// manager.build(buffer, BufferUsage::DynamicDraw)?;
///
/// manager.data_mut(data)?.bytes_mut()[8..12].copy_from_slice(&[1, 2, 3, 4]);
/// manager.mark_dirty(data, Some(8..12))?;
/// manager.flush_pending()?;
/// # Ok::<(), galaxy_3d_buffers::galaxy3d::Error>(())
/// ```

use std::ops::Range;
use std::sync::{Arc, Mutex};
use rustc_hash::FxHashSet;
use slotmap::SlotMap;
use crate::buffer::{
    Buffer, BufferData, BufferDataKey, BufferKey, BufferPool, DataOwnership, DirtyUpload, DrawState,
    UpdateStrategy,
};
use crate::buffer::buffer_pool::bucket_for_size;
use crate::error::{Error, Result};
use crate::graphics_device::{
    lock_device, BufferTarget, BufferUsage, DeviceCapabilities, DeviceFeatures, GraphicsDevice,
    PrimitiveType, PrimitiveVariant, TypeTable, VertexArrayHandle,
};

const SOURCE: &str = "galaxy3d::BufferManager";

// ============================================================================
// Configuration
// ============================================================================

/// BufferManager configuration
#[derive(Debug, Clone)]
pub struct BufferManagerConfig {
    /// Forced update strategy; `None` selects from the device capabilities
    pub update_strategy: Option<UpdateStrategy>,
    /// Primitive family used by draws
    pub primitive_variant: PrimitiveVariant,
    /// Default usage for vertex buffers
    pub vertex_usage: BufferUsage,
    /// Default usage for index buffers
    pub index_usage: BufferUsage,
    /// Engine type to driver code translation
    pub type_table: TypeTable,
}

impl Default for BufferManagerConfig {
    fn default() -> Self {
        Self {
            update_strategy: None,
            primitive_variant: PrimitiveVariant::Standard,
            vertex_usage: BufferUsage::StreamDraw,
            index_usage: BufferUsage::StaticDraw,
            type_table: TypeTable::gl(),
        }
    }
}

// ============================================================================
// BufferManager
// ============================================================================

pub struct BufferManager {
    device: Arc<Mutex<dyn GraphicsDevice>>,
    capabilities: DeviceCapabilities,
    strategy: UpdateStrategy,
    config: BufferManagerConfig,
    buffers: SlotMap<BufferKey, Buffer>,
    data: SlotMap<BufferDataKey, BufferData>,
    /// Buffers needing an update, in first-registration order
    pending: Vec<BufferKey>,
    queued: FxHashSet<BufferKey>,
    sequences: FxHashSet<VertexArrayHandle>,
    draw_state: DrawState,
}

impl BufferManager {
    /// Create a manager with the default configuration
    pub fn new(device: Arc<Mutex<dyn GraphicsDevice>>) -> Result<Self> {
        Self::with_config(device, BufferManagerConfig::default())
    }

    /// Create a manager, querying the device capabilities once
    pub fn with_config(device: Arc<Mutex<dyn GraphicsDevice>>, config: BufferManagerConfig) -> Result<Self> {
        let capabilities = lock_device(&device)?.capabilities();

        let strategy = match config.update_strategy {
            Some(UpdateStrategy::RangeMap) if !capabilities.supports(DeviceFeatures::MAP_BUFFER_RANGE) => {
                crate::engine_warn!(SOURCE, "Range mapping not supported by device, using whole-buffer mapping");
                UpdateStrategy::WholeMap
            }
            Some(strategy) => strategy,
            None => UpdateStrategy::select(&capabilities),
        };

        crate::engine_debug!(
            SOURCE,
            "BufferManager created: strategy {:?}, features {:?}",
            strategy,
            capabilities.features
        );

        Ok(Self {
            device,
            capabilities,
            strategy,
            config,
            buffers: SlotMap::with_key(),
            data: SlotMap::with_key(),
            pending: Vec::new(),
            queued: FxHashSet::default(),
            sequences: FxHashSet::default(),
            draw_state: DrawState::default(),
        })
    }

    // ===== ACCESSORS =====

    pub fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    pub fn strategy(&self) -> UpdateStrategy {
        self.strategy
    }

    pub fn config(&self) -> &BufferManagerConfig {
        &self.config
    }

    pub fn type_table(&self) -> &TypeTable {
        &self.config.type_table
    }

    pub fn primitive_variant(&self) -> PrimitiveVariant {
        self.config.primitive_variant
    }

    /// Select the primitive family used by subsequent draws
    pub fn set_primitive_variant(&mut self, variant: PrimitiveVariant) {
        self.config.primitive_variant = variant;
    }

    /// Driver code for `primitive` in the current variant
    pub fn primitive_code(&self, primitive: PrimitiveType) -> u32 {
        self.config.type_table.primitive_code(primitive, self.config.primitive_variant)
    }

    pub fn buffer(&self, key: BufferKey) -> Option<&Buffer> {
        self.buffers.get(key)
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn data(&self, key: BufferDataKey) -> Option<&BufferData> {
        self.data.get(key)
    }

    /// Mutable access to the source bytes of an attached data
    pub fn data_mut(&mut self, key: BufferDataKey) -> Result<&mut BufferData> {
        self.data
            .get_mut(key)
            .ok_or_else(|| invalid_resource(format!("Unknown buffer data {:?}", key)))
    }

    /// Number of buffers waiting for `flush_pending`
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, key: BufferKey) -> bool {
        self.queued.contains(&key)
    }

    pub fn draw_state(&self) -> &DrawState {
        &self.draw_state
    }

    pub(crate) fn device(&self) -> &Arc<Mutex<dyn GraphicsDevice>> {
        &self.device
    }

    pub(crate) fn draw_state_mut(&mut self) -> &mut DrawState {
        &mut self.draw_state
    }

    // ===== LIFECYCLE =====

    /// Create an empty buffer; no GPU object exists until `build`
    pub fn create_buffer(&mut self, target: BufferTarget) -> BufferKey {
        let usage = match target {
            BufferTarget::Vertex => self.config.vertex_usage,
            BufferTarget::Index => self.config.index_usage,
            BufferTarget::Generic => BufferUsage::StaticDraw,
        };
        self.buffers.insert(Buffer::new(target, usage))
    }

    /// Release the GPU object and detach every data
    ///
    /// Caller-owned data are returned in layout order; engine-owned data are
    /// dropped.
    pub fn destroy_buffer(&mut self, key: BufferKey) -> Result<Vec<BufferData>> {
        if !self.buffers.contains_key(key) {
            return Err(invalid_resource(format!("Unknown buffer {:?}", key)));
        }
        let mut device = lock_device(&self.device)?;
        let Some(mut buffer) = self.buffers.remove(key) else {
            return Err(invalid_resource(format!("Unknown buffer {:?}", key)));
        };

        self.queued.remove(&key);
        self.pending.retain(|k| *k != key);

        if let Some(handle) = buffer.handle.take() {
            device.delete_buffer(handle);
            self.draw_state.forget_buffer(handle);
        }

        let mut returned = Vec::new();
        for data_key in buffer.take_layout() {
            if let Some(data) = self.data.remove(data_key) {
                if data.ownership() == DataOwnership::Caller {
                    returned.push(released(data));
                }
            }
        }
        Ok(returned)
    }

    // ===== LAYOUT =====

    /// Append `data` at the end of the buffer layout; no GPU call
    pub fn attach(&mut self, buffer: BufferKey, data: BufferData) -> Result<BufferDataKey> {
        let owner = self
            .buffers
            .get_mut(buffer)
            .ok_or_else(|| invalid_resource(format!("Unknown buffer {:?}", buffer)))?;

        let size = data.size();
        let key = self.data.insert(data);
        let first = owner.append(key, size);

        let attached = &mut self.data[key];
        attached.first = first;
        attached.owner = Some(buffer);
        attached.dirty.clear();

        crate::engine_trace!(SOURCE, "Attached {} bytes at offset {} of {:?}", size, first, buffer);
        Ok(key)
    }

    /// Remove a data from its buffer and hand it back; the buffer does not shrink
    pub fn detach(&mut self, key: BufferDataKey) -> Result<BufferData> {
        let data = self
            .data
            .remove(key)
            .ok_or_else(|| invalid_resource(format!("Unknown buffer data {:?}", key)))?;

        if let Some(owner) = data.owner {
            if let Some(buffer) = self.buffers.get_mut(owner) {
                buffer.remove(key);
                if buffer.dirty_data().is_empty() {
                    self.unqueue(owner);
                }
            }
        }
        Ok(released(data))
    }

    // ===== DIRTY TRACKING =====

    /// Mark `range` (relative to the data, `None` = all of it) for upload
    ///
    /// Marks only widen: the data range and the buffer range become the
    /// bounding union of every mark since the last flush. A range past the
    /// end of the data is clamped with a warning; an empty range is ignored.
    /// Data attached after `build` beyond the GPU storage is rejected until
    /// the buffer is built again.
    pub fn mark_dirty(&mut self, key: BufferDataKey, range: Option<Range<u64>>) -> Result<()> {
        let data = self
            .data
            .get_mut(key)
            .ok_or_else(|| invalid_resource(format!("Unknown buffer data {:?}", key)))?;

        let size = data.size();
        let (min, mut max) = match range {
            Some(range) => (range.start, range.end),
            None => (0, size),
        };
        if max > size {
            crate::engine_warn!(
                SOURCE,
                "Dirty range [{}, {}) exceeds data size {}, clamping",
                min,
                max,
                size
            );
            max = size;
        }
        if min >= max {
            return Ok(());
        }

        let owner = data
            .owner
            .ok_or_else(|| invalid_resource(format!("Buffer data {:?} is not attached", key)))?;
        let buffer = self
            .buffers
            .get_mut(owner)
            .ok_or_else(|| invalid_resource(format!("Buffer data {:?} has a stale owner", key)))?;

        if buffer.built && data.first + max > buffer.allocated_size {
            return Err(invalid_resource(format!(
                "Buffer data {:?} ends at {} past the {} bytes of GPU storage of {:?}, rebuild required",
                key,
                data.first + max,
                buffer.allocated_size,
                owner
            )));
        }

        data.dirty.include(min, max);
        buffer.include_dirty(key, data.first + min, data.first + max);
        self.enqueue(owner);
        Ok(())
    }

    /// Mark every attached data overlapping `range` (buffer offsets, `None` = all)
    pub fn mark_buffer_dirty(&mut self, buffer: BufferKey, range: Option<Range<u64>>) -> Result<()> {
        let target = self
            .buffers
            .get(buffer)
            .ok_or_else(|| invalid_resource(format!("Unknown buffer {:?}", buffer)))?;

        let total = target.total_size();
        let (min, max) = match range {
            Some(range) => (range.start, range.end.min(total)),
            None => (0, total),
        };

        let marks: Vec<(BufferDataKey, Range<u64>)> = target
            .layout()
            .iter()
            .filter_map(|key| {
                let data = self.data.get(*key)?;
                let start = min.max(data.first);
                let end = max.min(data.first + data.size());
                (start < end).then(|| (*key, start - data.first..end - data.first))
            })
            .collect();

        for (key, range) in marks {
            self.mark_dirty(key, Some(range))?;
        }
        Ok(())
    }

    fn enqueue(&mut self, key: BufferKey) {
        if self.queued.insert(key) {
            self.pending.push(key);
        }
    }

    fn unqueue(&mut self, key: BufferKey) {
        if self.queued.remove(&key) {
            self.pending.retain(|k| *k != key);
        }
    }

    // ===== GPU STORAGE =====

    /// Allocate GPU storage for the whole buffer and upload every data
    ///
    /// Offsets are compacted back to back first. Rebuilding reuses the GPU
    /// object. On failure the buffer keeps its previous layout and storage.
    pub fn build(&mut self, key: BufferKey, usage: BufferUsage) -> Result<()> {
        let mut device = lock_device(&self.device)?;
        let buffer = self
            .buffers
            .get_mut(key)
            .ok_or_else(|| invalid_resource(format!("Unknown buffer {:?}", key)))?;

        let plan = buffer.plan_layout(&self.data);

        let (handle, created) = match buffer.handle {
            Some(handle) => (handle, false),
            None => {
                let handle = device.create_buffer().map_err(|err| {
                    crate::engine_error!(SOURCE, "Failed to create buffer object: {}", err);
                    err
                })?;
                (handle, true)
            }
        };

        if let Err(err) = device.buffer_storage(handle, buffer.target(), plan.size(), Some(&plan.staging), usage) {
            if created {
                device.delete_buffer(handle);
            }
            crate::engine_error!(SOURCE, "Failed to allocate {} bytes of buffer storage: {}", plan.size(), err);
            return Err(err);
        }

        buffer.commit_layout(&mut self.data, &plan);
        buffer.handle = Some(handle);
        buffer.usage = usage;
        buffer.allocated_size = plan.size();
        buffer.built = true;
        for data_key in buffer.take_dirty() {
            if let Some(data) = self.data.get_mut(data_key) {
                data.dirty.clear();
            }
        }
        drop(device);
        self.unqueue(key);

        crate::engine_debug!(SOURCE, "Built {:?}: {} bytes as {:?}", handle, plan.size(), usage);
        Ok(())
    }

    /// Run one update per registered buffer, in registration order
    ///
    /// Returns the number of buffers updated. Unbuilt buffers only have their
    /// dirty state cleared since `build` uploads everything. When the driver
    /// fails an update, that buffer keeps its dirty state and stays registered
    /// for the next flush; the other buffers are still updated and the first
    /// error is returned afterwards.
    pub fn flush_pending(&mut self) -> Result<usize> {
        if self.pending.is_empty() {
            return Ok(0);
        }

        let mut device = lock_device(&self.device)?;
        let pending = std::mem::take(&mut self.pending);
        let mut retry = Vec::new();
        let mut first_error = None;
        let mut updated = 0;

        for key in pending {
            let Some(buffer) = self.buffers.get_mut(key) else {
                continue;
            };

            let handle = match (buffer.built, buffer.handle) {
                (true, Some(handle)) => handle,
                _ => {
                    for data_key in buffer.take_dirty() {
                        if let Some(data) = self.data.get_mut(data_key) {
                            data.dirty.clear();
                        }
                    }
                    continue;
                }
            };

            let range = buffer.dirty_range();
            let uploads: Vec<DirtyUpload<'_>> = buffer
                .dirty_data()
                .iter()
                .filter_map(|data_key| self.data.get(*data_key))
                .filter_map(|data| {
                    let dirty = data.dirty.as_range()?;
                    Some(DirtyUpload {
                        offset: data.first + dirty.start,
                        bytes: &data.bytes()[dirty.start as usize..dirty.end as usize],
                    })
                })
                .collect();

            match self.strategy.apply(&mut *device, handle, range, &uploads) {
                Ok(()) => {
                    for data_key in buffer.take_dirty() {
                        if let Some(data) = self.data.get_mut(data_key) {
                            data.dirty.clear();
                        }
                    }
                    updated += 1;
                }
                Err(err) => {
                    match err.driver_code() {
                        Some(code) => crate::engine_error!(
                            SOURCE,
                            "Update of {:?} abandoned (driver error 0x{:04X}), retrying next flush",
                            handle,
                            code
                        ),
                        None => crate::engine_error!(
                            SOURCE,
                            "Update of {:?} abandoned ({}), retrying next flush",
                            handle,
                            err
                        ),
                    }
                    retry.push(key);
                    first_error.get_or_insert(err);
                }
            }
        }

        self.queued = retry.iter().copied().collect();
        self.pending = retry;

        crate::engine_trace!(SOURCE, "Flushed {} buffers", updated);
        match first_error {
            Some(err) => Err(err),
            None => Ok(updated),
        }
    }

    /// Copy `bytes` into the source at `offset` and upload them right away
    ///
    /// Bypasses dirty tracking. Nothing reaches the GPU for unbuilt buffers.
    pub fn write_immediate(&mut self, key: BufferDataKey, offset: u64, bytes: &[u8]) -> Result<()> {
        let data = self
            .data
            .get_mut(key)
            .ok_or_else(|| invalid_resource(format!("Unknown buffer data {:?}", key)))?;

        let end = offset + bytes.len() as u64;
        if end > data.size() {
            return Err(invalid_resource(format!(
                "Immediate write [{}, {}) exceeds data size {}",
                offset,
                end,
                data.size()
            )));
        }

        let first = data.first;
        let built = data
            .owner
            .and_then(|owner| self.buffers.get(owner))
            .filter(|buffer| buffer.built);
        if let Some(buffer) = built {
            if first + end > buffer.allocated_size {
                return Err(invalid_resource(format!(
                    "Immediate write ends at {} past the {} bytes of GPU storage, rebuild required",
                    first + end,
                    buffer.allocated_size
                )));
            }
        }
        let handle = built.and_then(|buffer| buffer.handle);
        data.bytes_mut()[offset as usize..end as usize].copy_from_slice(bytes);

        if let Some(handle) = handle {
            lock_device(&self.device)?
                .buffer_sub_data(handle, first + offset, bytes)
                .map_err(|err| {
                    crate::engine_error!(SOURCE, "Immediate upload to {:?} failed: {}", handle, err);
                    err
                })?;
        }
        Ok(())
    }

    /// Move the buffer into a pooled GPU object of at least `size` bytes
    ///
    /// The current GPU object, if any, is returned to the pool. The whole
    /// content is uploaded to the new object, which leaves the buffer built
    /// and clean.
    pub fn reallocate_from_pool(&mut self, key: BufferKey, pool: &mut BufferPool, size: u64) -> Result<()> {
        let buffer = self
            .buffers
            .get(key)
            .ok_or_else(|| invalid_resource(format!("Unknown buffer {:?}", key)))?;

        let plan = buffer.plan_layout(&self.data);
        if size < plan.size() {
            return Err(invalid_resource(format!(
                "Pooled size {} is smaller than buffer content {}",
                size,
                plan.size()
            )));
        }
        let capacity = bucket_for_size(size).map(|bucket| 1u64 << bucket).unwrap_or(0);

        let handle = pool.acquire(size)?;
        let uploaded = lock_device(&self.device).and_then(|mut device| device.buffer_sub_data(handle, 0, &plan.staging));
        if let Err(err) = uploaded {
            crate::engine_error!(SOURCE, "Upload to pooled {:?} failed: {}", handle, err);
            pool.release(handle)?;
            return Err(err);
        }

        let Some(buffer) = self.buffers.get_mut(key) else {
            return Err(invalid_resource(format!("Unknown buffer {:?}", key)));
        };
        buffer.commit_layout(&mut self.data, &plan);
        let previous = buffer.handle.replace(handle);
        buffer.usage = pool.usage();
        buffer.allocated_size = capacity;
        buffer.built = true;
        for data_key in buffer.take_dirty() {
            if let Some(data) = self.data.get_mut(data_key) {
                data.dirty.clear();
            }
        }
        self.unqueue(key);

        if let Some(previous) = previous {
            self.draw_state.forget_buffer(previous);
            pool.release(previous)?;
        }
        crate::engine_debug!(SOURCE, "Reallocated {:?} into pooled {:?} ({} bytes)", key, handle, capacity);
        Ok(())
    }

    // ===== DRAW-TIME =====

    /// Bind the buffer to its target
    pub fn use_buffer(&mut self, key: BufferKey) -> Result<()> {
        let buffer = self
            .buffers
            .get(key)
            .ok_or_else(|| invalid_resource(format!("Unknown buffer {:?}", key)))?;
        let handle = match (buffer.built, buffer.handle) {
            (true, Some(handle)) => handle,
            _ => return Err(invalid_resource(format!("Buffer {:?} is not built", key))),
        };
        let target = buffer.target();

        lock_device(&self.device)?.bind_buffer(target, Some(handle));
        self.draw_state.bind_buffer(target, handle);
        Ok(())
    }

    /// Undo every binding made since the last `finish_render`
    pub fn finish_render(&mut self) -> Result<()> {
        if self.draw_state.is_clear() {
            return Ok(());
        }
        let mut device = lock_device(&self.device)?;
        std::mem::take(&mut self.draw_state).release(&mut *device);
        Ok(())
    }

    pub(crate) fn track_sequence(&mut self, handle: VertexArrayHandle) {
        self.sequences.insert(handle);
    }

    /// Delete a recorded binding sequence
    pub(crate) fn delete_sequence(&mut self, handle: VertexArrayHandle) -> Result<()> {
        lock_device(&self.device)?.delete_vertex_array(handle);
        self.sequences.remove(&handle);
        self.draw_state.forget_sequence(handle);
        Ok(())
    }
}

impl Drop for BufferManager {
    fn drop(&mut self) {
        let Ok(mut device) = lock_device(&self.device) else {
            crate::engine_warn!(SOURCE, "GPU objects leaked: device lock poisoned on drop");
            return;
        };
        for handle in self.sequences.drain() {
            device.delete_vertex_array(handle);
        }
        for (_, buffer) in self.buffers.iter_mut() {
            if let Some(handle) = buffer.handle.take() {
                device.delete_buffer(handle);
            }
        }
    }
}

/// Reset the attachment state of a data leaving its buffer
fn released(mut data: BufferData) -> BufferData {
    data.owner = None;
    data.first = 0;
    data.dirty.clear();
    data
}

fn invalid_resource(message: String) -> Error {
    crate::engine_error!(SOURCE, "{}", message);
    Error::InvalidResource(message)
}

#[cfg(test)]
#[path = "buffer_manager_tests.rs"]
mod tests;
