/// Partial-update strategies used by `BufferManager::flush_pending`

use crate::buffer::DirtyRange;
use crate::error::{Error, Result};
use crate::graphics_device::{BufferHandle, DeviceCapabilities, DeviceFeatures, GraphicsDevice, MapFlags};

/// One dirty region to copy: `bytes` go to buffer offset `offset`
#[derive(Debug, Clone, Copy)]
pub(crate) struct DirtyUpload<'a> {
    pub offset: u64,
    pub bytes: &'a [u8],
}

/// How dirty regions reach GPU storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateStrategy {
    /// Map the whole buffer, copy every dirty region at its buffer offset
    WholeMap,
    /// Map only the buffer-wide dirty range, copy, flush each region explicitly
    RangeMap,
}

impl UpdateStrategy {
    /// Range-map when the device supports sub-range mapping with explicit flush
    pub fn select(capabilities: &DeviceCapabilities) -> Self {
        if capabilities.supports(DeviceFeatures::MAP_BUFFER_RANGE) {
            UpdateStrategy::RangeMap
        } else {
            UpdateStrategy::WholeMap
        }
    }

    /// Copy `uploads` into the storage of `handle`; `range` bounds them all
    ///
    /// A failed map leaves the buffer untouched. The mapping is always ended
    /// once it succeeded.
    pub(crate) fn apply(
        self,
        device: &mut dyn GraphicsDevice,
        handle: BufferHandle,
        range: DirtyRange,
        uploads: &[DirtyUpload<'_>],
    ) -> Result<()> {
        if range.is_empty() || uploads.is_empty() {
            return Ok(());
        }

        match self {
            UpdateStrategy::WholeMap => {
                let copied = {
                    let mapped = device.map_buffer(handle, MapFlags::WRITE)?;
                    copy_uploads(mapped, 0, uploads)
                };
                let unmapped = device.unmap_buffer(handle);
                copied.and(unmapped)
            }
            UpdateStrategy::RangeMap => {
                let copied = {
                    let mapped = device.map_buffer_range(
                        handle,
                        range.min,
                        range.len(),
                        MapFlags::WRITE | MapFlags::FLUSH_EXPLICIT,
                    )?;
                    copy_uploads(mapped, range.min, uploads)
                };
                if copied.is_ok() {
                    for upload in uploads {
                        device.flush_mapped_range(handle, upload.offset - range.min, upload.bytes.len() as u64);
                    }
                }
                let unmapped = device.unmap_buffer(handle);
                copied.and(unmapped)
            }
        }
    }
}

/// Copy every upload into `mapped`, whose first byte is buffer offset `base`
fn copy_uploads(mapped: &mut [u8], base: u64, uploads: &[DirtyUpload<'_>]) -> Result<()> {
    for upload in uploads {
        let start = upload
            .offset
            .checked_sub(base)
            .ok_or_else(|| Error::InvalidResource(format!("upload at {} precedes mapped range", upload.offset)))?
            as usize;
        let end = start + upload.bytes.len();
        if end > mapped.len() {
            return Err(Error::InvalidResource(format!(
                "upload [{}, {}) exceeds mapped length {}",
                upload.offset,
                upload.offset + upload.bytes.len() as u64,
                mapped.len()
            )));
        }
        mapped[start..end].copy_from_slice(upload.bytes);
    }
    Ok(())
}

#[cfg(test)]
#[path = "update_strategy_tests.rs"]
mod tests;
