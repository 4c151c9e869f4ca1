//! Shared-memory framebuffers
//!
//! A [`BufferPool`] owns one anonymous file, its memory mapping and the
//! compositor-side pool object carved into `slot_count` equally sized
//! XRGB8888 buffers. Exactly one slot is *active* (owned by the application
//! for drawing); a slot becomes *busy* when it is presented and stays busy
//! until the compositor releases it.
//!
//! # Layout
//!
//! ```text
//!  offset 0                 slot_len               2 * slot_len
//!  ┌────────────────────────┬────────────────────────┬───
//!  │ slot 0 (stride*height) │ slot 1 (stride*height) │ ...
//!  └────────────────────────┴────────────────────────┴───
//! ```

use std::fs::File;
use std::os::fd::AsFd;

use log::{debug, info, warn};
use memmap2::MmapMut;

use crate::backend::{Backend, BufferId, BufferLayout, Capability, PoolId};
use crate::error::{PaneError, PaneResult};
use crate::session::Session;

/// Fixed pixel format: 32-bit XRGB, host byte order.
pub const BYTES_PER_PIXEL: u32 = 4;

/// Upper bound for `slot_count`.
pub const MAX_SLOTS: usize = 4;

/// Metadata for one framebuffer inside the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferSlot {
    pub index: usize,
    pub offset: usize,
    pub len: usize,
    pub busy: bool,
    pub buffer: BufferId,
}

/// Fixed-size ring of shared-memory framebuffers.
pub struct BufferPool {
    slots: Vec<BufferSlot>,
    active: usize,
    width: u32,
    height: u32,
    stride: u32,
    pool: PoolId,
    handles_live: bool,
    mmap: MmapMut,
    _file: File,
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("slots", &self.slots)
            .field("active", &self.active)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("pool", &self.pool)
            .finish()
    }
}

/// Bytes needed for one slot and for the whole pool.
pub fn pool_size(width: u32, height: u32, slot_count: usize) -> PaneResult<(u32, usize, usize)> {
    if width == 0 || height == 0 {
        return Err(PaneError::InvalidGeometry { width, height });
    }
    if slot_count == 0 || slot_count > MAX_SLOTS {
        return Err(PaneError::allocation(format!(
            "slot count {} outside 1..={}",
            slot_count, MAX_SLOTS
        )));
    }
    let stride = width
        .checked_mul(BYTES_PER_PIXEL)
        .ok_or(PaneError::InvalidGeometry { width, height })?;
    let slot_len = (stride as usize)
        .checked_mul(height as usize)
        .ok_or(PaneError::InvalidGeometry { width, height })?;
    let total = slot_len
        .checked_mul(slot_count)
        .filter(|total| *total <= i32::MAX as usize)
        .ok_or(PaneError::InvalidGeometry { width, height })?;
    Ok((stride, slot_len, total))
}

#[cfg(target_os = "linux")]
fn anonymous_file() -> std::io::Result<File> {
    use std::os::fd::{FromRawFd, OwnedFd};

    let name = b"wlpane-shm\0";
    // SAFETY: `name` is NUL-terminated and outlives the call.
    let fd = unsafe { libc::memfd_create(name.as_ptr().cast(), libc::MFD_CLOEXEC) };
    if fd < 0 {
        return Err(std::io::Error::last_os_error());
    }
    // SAFETY: memfd_create returned a fresh descriptor we exclusively own.
    Ok(File::from(unsafe { OwnedFd::from_raw_fd(fd) }))
}

#[cfg(not(target_os = "linux"))]
fn anonymous_file() -> std::io::Result<File> {
    tempfile::tempfile()
}

fn backing_file(size: usize) -> PaneResult<File> {
    let file = match anonymous_file() {
        Ok(file) => file,
        Err(e) => {
            debug!("memfd unavailable ({}), falling back to an unlinked temp file", e);
            tempfile::tempfile()
                .map_err(|e| PaneError::allocation(format!("backing file: {e}")))?
        }
    };
    file.set_len(size as u64)
        .map_err(|e| PaneError::allocation(format!("resize backing file to {size} bytes: {e}")))?;
    Ok(file)
}

impl BufferPool {
    /// Allocate `slot_count` framebuffers of `width`x`height` and register
    /// them with the session's shared-memory allocator.
    pub fn create<B: Backend>(
        session: &mut Session<B>,
        width: u32,
        height: u32,
        slot_count: usize,
    ) -> PaneResult<Self> {
        session.capability(Capability::SharedMemory)?;
        let (stride, slot_len, total) = pool_size(width, height, slot_count)?;

        let file = backing_file(total)?;
        // SAFETY: the file is private to this pool; the compositor only reads it.
        let mmap = unsafe { MmapMut::map_mut(&file) }
            .map_err(|e| PaneError::allocation(format!("mmap {total} bytes: {e}")))?;

        let backend = session.backend_mut();
        let pool = backend.create_pool(file.as_fd(), total)?;

        let mut slots = Vec::with_capacity(slot_count);
        for index in 0..slot_count {
            let layout = BufferLayout {
                offset: index * slot_len,
                width,
                height,
                stride,
            };
            match backend.create_buffer(pool, &layout) {
                Ok(buffer) => slots.push(BufferSlot {
                    index,
                    offset: layout.offset,
                    len: slot_len,
                    busy: false,
                    buffer,
                }),
                Err(e) => {
                    for slot in &slots {
                        backend.destroy_buffer(slot.buffer);
                    }
                    backend.destroy_pool(pool);
                    return Err(e);
                }
            }
        }

        info!(
            "🧱 Buffer pool ready: {}x{} x{} slots ({} bytes)",
            width, height, slot_count, total
        );

        Ok(Self {
            slots,
            active: 0,
            width,
            height,
            stride,
            pool,
            handles_live: true,
            mmap,
            _file: file,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn size_bytes(&self) -> usize {
        self.mmap.len()
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn slot(&self, index: usize) -> Option<&BufferSlot> {
        self.slots.get(index)
    }

    pub fn is_busy(&self, index: usize) -> bool {
        self.slots.get(index).map(|s| s.busy).unwrap_or(false)
    }

    pub fn active_is_busy(&self) -> bool {
        self.is_busy(self.active)
    }

    pub fn busy_count(&self) -> usize {
        self.slots.iter().filter(|s| s.busy).count()
    }

    pub fn active_buffer(&self) -> BufferId {
        self.slots[self.active].buffer
    }

    pub fn slot_for_buffer(&self, buffer: BufferId) -> Option<usize> {
        self.slots.iter().position(|s| s.buffer == buffer)
    }

    /// Writable pixels of the active slot.
    ///
    /// Fails with `BufferUnavailable` while the compositor still holds it.
    pub fn active_slot(&mut self) -> PaneResult<&mut [u32]> {
        let slot = &self.slots[self.active];
        if slot.busy {
            return Err(PaneError::BufferUnavailable { slot: slot.index });
        }
        let range = slot.offset..slot.offset + slot.len;
        bytemuck::try_cast_slice_mut(&mut self.mmap[range])
            .map_err(|e| PaneError::allocation(format!("pixel view: {e:?}")))
    }

    /// Read-only pixels of any slot.
    pub fn slot_pixels(&self, index: usize) -> Option<&[u32]> {
        let slot = self.slots.get(index)?;
        bytemuck::try_cast_slice(&self.mmap[slot.offset..slot.offset + slot.len]).ok()
    }

    /// Rotate the active index; a no-op with a single slot.
    pub fn advance(&mut self) -> usize {
        self.active = (self.active + 1) % self.slots.len();
        self.active
    }

    pub fn mark_busy(&mut self, index: usize) {
        match self.slots.get_mut(index) {
            Some(slot) => slot.busy = true,
            None => warn!("mark_busy on unknown slot {}", index),
        }
    }

    pub fn mark_free(&mut self, index: usize) {
        match self.slots.get_mut(index) {
            Some(slot) => slot.busy = false,
            None => warn!("mark_free on unknown slot {}", index),
        }
    }

    /// Destroy the compositor-side buffer and pool objects.
    pub(crate) fn release_handles<B: Backend>(&mut self, backend: &mut B) {
        if !self.handles_live {
            return;
        }
        for slot in &self.slots {
            backend.destroy_buffer(slot.buffer);
        }
        backend.destroy_pool(self.pool);
        self.handles_live = false;
        debug!("🧹 Released {} buffers and {}", self.slots.len(), self.pool);
    }

    /// Release the protocol objects, then the mapping and backing file.
    pub fn destroy<B: Backend>(mut self, backend: &mut B) {
        self.release_handles(backend);
    }
}

impl Drop for BufferPool {
    fn drop(&mut self) {
        if self.handles_live {
            warn!(
                "buffer pool dropped with live protocol objects ({}); memory is released anyway",
                self.pool
            );
        }
    }
}

#[cfg(test)]
mod tests;
