//! BufferRegistry - concurrent id-to-buffer table
//!
//! Owns every ManagedBuffer in the context. Creation runs the full
//! create / requirements / allocate / bind chain with rollback on every
//! failure branch, hands out monotonically increasing ids, and is the
//! only place GPU buffer handles are destroyed. Sharded locking comes
//! from DashMap, so creates and lookups from different threads do not
//! contend on a single table lock.

use dashmap::DashMap;
use rustc_hash::FxBuildHasher;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::driver::{BufferUsageFlags, GpuDriver, MemoryPropertyFlags, RawFence};
use crate::error::{Error, Result};
use crate::memory::MemoryTypeCache;
use crate::stats::TransferStats;
use crate::{gpu_error, gpu_trace, gpu_warn};

use super::managed_buffer::{BufferId, BufferInfo, ManagedBuffer, PersistentMapping};

const SOURCE: &str = "nebula::registry";

/// Concurrent registry of all managed buffers
pub struct BufferRegistry {
    driver: Arc<dyn GpuDriver>,
    memory_types: MemoryTypeCache,
    stats: Arc<TransferStats>,
    buffers: DashMap<BufferId, ManagedBuffer, FxBuildHasher>,
    /// Starts at 1; id 0 is the null sentinel
    next_id: AtomicU64,
}

impl BufferRegistry {
    pub fn new(driver: Arc<dyn GpuDriver>, stats: Arc<TransferStats>) -> Self {
        let memory_types = MemoryTypeCache::new(driver.memory_properties());
        Self {
            driver,
            memory_types,
            stats,
            buffers: DashMap::with_hasher(FxBuildHasher::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// The memory-type lookup cache built at construction
    pub fn memory_types(&self) -> &MemoryTypeCache {
        &self.memory_types
    }

    /// Create a buffer, allocate and bind its memory, and register it.
    ///
    /// `usage` is widened with TRANSFER_SRC | TRANSFER_DST so every
    /// buffer can be staged into and read back from. When
    /// `persistent_map` is set and the backing memory is host-visible,
    /// the whole buffer is mapped once for its lifetime.
    ///
    /// Any failure after buffer creation rolls back the partial state
    /// before returning; no half-created buffer is ever registered.
    pub fn create(
        &self,
        size: u64,
        usage: BufferUsageFlags,
        required: MemoryPropertyFlags,
        persistent_map: bool,
    ) -> Result<BufferId> {
        if size == 0 {
            gpu_warn!(SOURCE, "Rejected zero-sized buffer creation");
            return Err(Error::OutOfBounds {
                offset: 0,
                len: 0,
                size: 0,
            });
        }

        let full_usage =
            usage | BufferUsageFlags::TRANSFER_SRC | BufferUsageFlags::TRANSFER_DST;
        let buffer = self.driver.create_buffer(size, full_usage)?;
        let requirements = self.driver.buffer_memory_requirements(buffer);

        let Some(type_index) = self.memory_types.find_memory_type(required) else {
            self.driver.destroy_buffer(buffer);
            gpu_error!(
                SOURCE,
                "No memory type satisfies {:?} (size {})",
                required,
                size
            );
            return Err(Error::OutOfMemory);
        };

        let memory = match self.driver.allocate_memory(requirements.size, type_index) {
            Ok(memory) => memory,
            Err(e) => {
                self.driver.destroy_buffer(buffer);
                return Err(e);
            }
        };

        if let Err(e) = self.driver.bind_buffer_memory(buffer, memory) {
            self.driver.free_memory(memory);
            self.driver.destroy_buffer(buffer);
            return Err(e);
        }

        let properties = self.memory_types.properties_of(type_index);
        let is_device_local = properties.contains(MemoryPropertyFlags::DEVICE_LOCAL);
        let is_host_visible = properties.contains(MemoryPropertyFlags::HOST_VISIBLE);

        let mapping = if persistent_map && is_host_visible {
            match self.driver.map_memory(memory, 0, size) {
                Ok(ptr) => Some(PersistentMapping { ptr, len: size }),
                Err(e) => {
                    self.driver.free_memory(memory);
                    self.driver.destroy_buffer(buffer);
                    return Err(e);
                }
            }
        } else {
            None
        };

        let id = BufferId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.buffers.insert(
            id,
            ManagedBuffer {
                buffer,
                memory,
                size,
                alloc_size: requirements.size,
                usage: full_usage,
                properties,
                is_device_local,
                is_host_visible,
                mapping,
                transient_mapped: false,
                write_cursor: 0,
                last_write_fence: None,
                last_write_frame: 0,
            },
        );
        self.stats.buffer_created(requirements.size);
        gpu_trace!(
            SOURCE,
            "Created buffer {} ({} bytes, type {}, device_local={}, host_visible={})",
            id.0,
            size,
            type_index,
            is_device_local,
            is_host_visible
        );
        Ok(id)
    }

    /// Metadata snapshot for a buffer
    pub fn info(&self, id: BufferId) -> Result<BufferInfo> {
        let buf = self.buffers.get(&id).ok_or(Error::InvalidHandle(id.0))?;
        Ok(BufferInfo {
            raw: buf.buffer,
            size: buf.size,
            usage: buf.usage,
            properties: buf.properties,
            is_device_local: buf.is_device_local,
            is_host_visible: buf.is_host_visible,
        })
    }

    /// Whether an id refers to a live buffer
    pub fn contains(&self, id: BufferId) -> bool {
        self.buffers.contains_key(&id)
    }

    /// Number of live buffers
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Copy host bytes directly into a host-visible buffer.
    ///
    /// Uses the persistent mapping when one exists, otherwise maps the
    /// written range transiently for the duration of the copy.
    pub fn write_host(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<()> {
        let mut buf = self
            .buffers
            .get_mut(&id)
            .ok_or(Error::InvalidHandle(id.0))?;
        if !buf.is_host_visible {
            return Err(Error::NotHostVisible(id.0));
        }
        let len = data.len() as u64;
        if offset.checked_add(len).is_none_or(|end| end > buf.size) {
            return Err(Error::OutOfBounds {
                offset,
                len,
                size: buf.size,
            });
        }

        match &buf.mapping {
            Some(mapping) => unsafe {
                std::ptr::copy_nonoverlapping(
                    data.as_ptr(),
                    mapping.ptr.add(offset as usize),
                    data.len(),
                );
            },
            None => {
                let ptr = self.driver.map_memory(buf.memory, offset, len)?;
                unsafe {
                    std::ptr::copy_nonoverlapping(data.as_ptr(), ptr, data.len());
                }
                self.driver.unmap_memory(buf.memory);
            }
        }
        buf.write_cursor = offset + len;
        self.stats.direct_upload(len);
        Ok(())
    }

    /// Copy bytes out of a host-visible buffer into `out`
    pub fn read_host(&self, id: BufferId, offset: u64, out: &mut [u8]) -> Result<()> {
        let buf = self.buffers.get(&id).ok_or(Error::InvalidHandle(id.0))?;
        if !buf.is_host_visible {
            return Err(Error::NotHostVisible(id.0));
        }
        let len = out.len() as u64;
        if offset.checked_add(len).is_none_or(|end| end > buf.size) {
            return Err(Error::OutOfBounds {
                offset,
                len,
                size: buf.size,
            });
        }

        match &buf.mapping {
            Some(mapping) => unsafe {
                std::ptr::copy_nonoverlapping(
                    mapping.ptr.add(offset as usize),
                    out.as_mut_ptr(),
                    out.len(),
                );
            },
            None => {
                let ptr = self.driver.map_memory(buf.memory, offset, len)?;
                unsafe {
                    std::ptr::copy_nonoverlapping(ptr, out.as_mut_ptr(), out.len());
                }
                self.driver.unmap_memory(buf.memory);
            }
        }
        Ok(())
    }

    /// Map a range of a host-visible buffer for direct host access.
    ///
    /// Persistently mapped buffers return an offset into the standing
    /// mapping; others get a transient driver mapping released by
    /// [`unmap`](Self::unmap).
    pub fn map(&self, id: BufferId, offset: u64, size: u64) -> Result<*mut u8> {
        let mut buf = self
            .buffers
            .get_mut(&id)
            .ok_or(Error::InvalidHandle(id.0))?;
        if !buf.is_host_visible {
            return Err(Error::NotHostVisible(id.0));
        }
        if offset.checked_add(size).is_none_or(|end| end > buf.size) {
            return Err(Error::OutOfBounds {
                offset,
                len: size,
                size: buf.size,
            });
        }
        if let Some(mapping) = &buf.mapping {
            return Ok(unsafe { mapping.ptr.add(offset as usize) });
        }
        let ptr = self.driver.map_memory(buf.memory, offset, size)?;
        buf.transient_mapped = true;
        Ok(ptr)
    }

    /// Release a transient mapping; no-op for persistently mapped buffers
    pub fn unmap(&self, id: BufferId) -> Result<()> {
        let mut buf = self
            .buffers
            .get_mut(&id)
            .ok_or(Error::InvalidHandle(id.0))?;
        if buf.transient_mapped {
            self.driver.unmap_memory(buf.memory);
            buf.transient_mapped = false;
        }
        Ok(())
    }

    /// Record that a GPU-side write (staged upload, resize copy) into
    /// this buffer completes when `fence` signals
    pub fn note_gpu_write(
        &self,
        id: BufferId,
        end_offset: u64,
        fence: RawFence,
        frame: u64,
    ) -> Result<()> {
        let mut buf = self
            .buffers
            .get_mut(&id)
            .ok_or(Error::InvalidHandle(id.0))?;
        buf.write_cursor = buf.write_cursor.max(end_offset);
        buf.last_write_fence = Some(fence);
        buf.last_write_frame = frame;
        Ok(())
    }

    /// Fence of the most recent GPU-side write, if any
    pub fn gpu_write_fence(&self, id: BufferId) -> Result<Option<RawFence>> {
        let buf = self.buffers.get(&id).ok_or(Error::InvalidHandle(id.0))?;
        Ok(buf.last_write_fence)
    }

    /// Destroy a buffer and free its memory.
    ///
    /// Idempotent: returns false when the id is already gone. Callers
    /// are responsible for GPU-side quiescence (the frame scheduler's
    /// deferred-deletion queue provides it).
    pub fn destroy(&self, id: BufferId) -> bool {
        let Some((_, buf)) = self.buffers.remove(&id) else {
            return false;
        };
        if buf.mapping.is_some() || buf.transient_mapped {
            self.driver.unmap_memory(buf.memory);
        }
        self.driver.destroy_buffer(buf.buffer);
        self.driver.free_memory(buf.memory);
        self.stats.buffer_destroyed(buf.alloc_size);
        gpu_trace!(SOURCE, "Destroyed buffer {} ({} bytes)", id.0, buf.size);
        true
    }

    /// Destroy every remaining buffer (context teardown)
    pub fn drain_all(&self) {
        let ids: Vec<BufferId> = self.buffers.iter().map(|e| *e.key()).collect();
        if !ids.is_empty() {
            gpu_warn!(
                SOURCE,
                "Destroying {} buffer(s) still alive at teardown",
                ids.len()
            );
        }
        for id in ids {
            self.destroy(id);
        }
    }
}

impl Drop for BufferRegistry {
    fn drop(&mut self) {
        self.drain_all();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
