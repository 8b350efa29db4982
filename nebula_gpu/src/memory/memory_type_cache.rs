//! Memory-type classification and lookup
//!
//! Classifies the device's memory types once at startup into fast lookup
//! slots, then resolves a requested property mask to a concrete type
//! index. A failed lookup is a hard allocation failure for that buffer -
//! the device genuinely lacks the memory type, so there is no retry.

use crate::driver::{MemoryProperties, MemoryPropertyFlags, MemoryType};

/// Per-device memory-type lookup cache, immutable after construction
#[derive(Debug, Clone)]
pub struct MemoryTypeCache {
    /// First pure device-local type (not host-visible)
    device_local: Option<u32>,
    /// First host-visible (coherent preferred) type
    host_visible: Option<u32>,
    /// First host-visible + host-cached type
    host_cached: Option<u32>,
    /// Combined device-local + host-visible type (ReBAR/SAM), if any
    device_local_host_visible: Option<u32>,
    /// Raw per-type flags for the linear fallback scan
    types: Vec<MemoryType>,
}

impl MemoryTypeCache {
    /// Classify the device's memory types into lookup slots
    pub fn new(properties: &MemoryProperties) -> Self {
        let mut device_local = None;
        let mut host_visible = None;
        let mut host_cached = None;
        let mut device_local_host_visible = None;

        for (i, ty) in properties.memory_types.iter().enumerate() {
            let flags = ty.property_flags;
            let i = i as u32;

            if flags.contains(MemoryPropertyFlags::DEVICE_LOCAL) {
                if flags.contains(MemoryPropertyFlags::HOST_VISIBLE) {
                    if device_local_host_visible.is_none() {
                        device_local_host_visible = Some(i);
                    }
                } else if device_local.is_none() {
                    device_local = Some(i);
                }
            }

            if flags.contains(MemoryPropertyFlags::HOST_VISIBLE)
                && !flags.contains(MemoryPropertyFlags::DEVICE_LOCAL)
            {
                if flags.contains(MemoryPropertyFlags::HOST_CACHED) {
                    if host_cached.is_none() {
                        host_cached = Some(i);
                    }
                } else if host_visible.is_none() {
                    host_visible = Some(i);
                }
            }
        }

        Self {
            device_local,
            host_visible,
            host_cached,
            device_local_host_visible,
            types: properties.memory_types.clone(),
        }
    }

    /// Resolve a property mask to a memory type index.
    ///
    /// Resolution order, first match wins:
    /// 1. device-local + host-visible -> combined (ReBAR) slot, if the
    ///    device exposes one; otherwise fall through
    /// 2. device-local only -> device-local slot
    /// 3. host-cached -> host-cached slot
    /// 4. host-visible -> host-visible slot
    /// 5. linear scan for the first type whose flags are a superset
    pub fn find_memory_type(&self, required: MemoryPropertyFlags) -> Option<u32> {
        if required
            .contains(MemoryPropertyFlags::DEVICE_LOCAL | MemoryPropertyFlags::HOST_VISIBLE)
        {
            if let Some(i) = self.device_local_host_visible {
                return Some(i);
            }
        }

        if required.contains(MemoryPropertyFlags::DEVICE_LOCAL)
            && !required.contains(MemoryPropertyFlags::HOST_VISIBLE)
        {
            if let Some(i) = self.device_local {
                return Some(i);
            }
        }

        if required.contains(MemoryPropertyFlags::HOST_CACHED) {
            if let Some(i) = self.host_cached {
                return Some(i);
            }
        }

        if required.contains(MemoryPropertyFlags::HOST_VISIBLE) {
            if let Some(i) = self.host_visible {
                return Some(i);
            }
        }

        self.types
            .iter()
            .position(|t| t.property_flags.contains(required))
            .map(|i| i as u32)
    }

    /// Property flags of a memory type by index.
    ///
    /// Empty flags for an out-of-range index (callers only pass indices
    /// this cache produced).
    pub fn properties_of(&self, index: u32) -> MemoryPropertyFlags {
        self.types
            .get(index as usize)
            .map(|t| t.property_flags)
            .unwrap_or(MemoryPropertyFlags::empty())
    }

    /// Whether a combined device-local + host-visible type exists
    pub fn has_resizable_bar(&self) -> bool {
        self.device_local_host_visible.is_some()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "memory_type_cache_tests.rs"]
mod tests;
