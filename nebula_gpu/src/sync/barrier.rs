//! Fine-grained dependency/barrier construction (synchronization2-style)
//!
//! A dependency description is a set of buffer barriers, each carrying
//! independent 64-bit source/destination stage and access masks,
//! replacing a single global coarse barrier. The common hazard
//! transitions are named presets so call sites never hand-build masks.

use crate::driver::{AccessFlags, DriverCaps, RawBuffer, StageFlags};
use crate::error::{Error, Result};

/// Well-known hazard transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierKind {
    /// Transfer write -> vertex attribute read (post-staging-upload
    /// barrier for vertex buffers)
    TransferToVertexAttribute,
    /// Transfer write -> index read (post-staging-upload barrier for
    /// index buffers)
    TransferToIndex,
    /// Transfer write -> uniform/shader read in any shader stage
    TransferToShaderRead,
    /// Compute storage write -> vertex shader storage read
    /// (compute-to-graphics handoff)
    ComputeStorageToVertexShader,
    /// Compute storage write -> fragment shader storage read
    ComputeStorageToFragmentShader,
}

/// One buffer memory barrier with independent 64-bit masks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferBarrier {
    pub src_stage: StageFlags,
    pub src_access: AccessFlags,
    pub dst_stage: StageFlags,
    pub dst_access: AccessFlags,
    pub buffer: RawBuffer,
    pub offset: u64,
    pub size: u64,
}

/// A set of barriers submitted through a single pipeline-barrier command
#[derive(Debug, Clone, Default)]
pub struct DependencyInfo {
    pub buffer_barriers: Vec<BufferBarrier>,
}

impl DependencyInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a barrier to the set
    pub fn push(&mut self, barrier: BufferBarrier) {
        self.buffer_barriers.push(barrier);
    }
}

impl BarrierKind {
    /// Stage/access mask pair for the hazard's source side
    fn src_masks(&self) -> (StageFlags, AccessFlags) {
        match self {
            BarrierKind::TransferToVertexAttribute
            | BarrierKind::TransferToIndex
            | BarrierKind::TransferToShaderRead => {
                (StageFlags::COPY, AccessFlags::TRANSFER_WRITE)
            }
            BarrierKind::ComputeStorageToVertexShader
            | BarrierKind::ComputeStorageToFragmentShader => {
                (StageFlags::COMPUTE_SHADER, AccessFlags::SHADER_STORAGE_WRITE)
            }
        }
    }

    /// Stage/access mask pair for the hazard's destination side
    fn dst_masks(&self) -> (StageFlags, AccessFlags) {
        match self {
            BarrierKind::TransferToVertexAttribute => (
                StageFlags::VERTEX_ATTRIBUTE_INPUT,
                AccessFlags::VERTEX_ATTRIBUTE_READ,
            ),
            BarrierKind::TransferToIndex => (StageFlags::INDEX_INPUT, AccessFlags::INDEX_READ),
            BarrierKind::TransferToShaderRead => (
                StageFlags::VERTEX_SHADER
                    | StageFlags::FRAGMENT_SHADER
                    | StageFlags::COMPUTE_SHADER,
                AccessFlags::UNIFORM_READ | AccessFlags::SHADER_READ,
            ),
            BarrierKind::ComputeStorageToVertexShader => (
                StageFlags::VERTEX_SHADER,
                AccessFlags::SHADER_STORAGE_READ,
            ),
            BarrierKind::ComputeStorageToFragmentShader => (
                StageFlags::FRAGMENT_SHADER,
                AccessFlags::SHADER_STORAGE_READ,
            ),
        }
    }
}

/// Builds dependency descriptions, gated on the device's sync2 support
///
/// Callers on devices without synchronization2 get a typed capability
/// error: the coarse 32-bit barrier path is a structurally different
/// call and silently falling back to it would change semantics.
#[derive(Debug, Clone, Copy)]
pub struct BarrierBuilder {
    caps: DriverCaps,
}

impl BarrierBuilder {
    pub fn new(caps: DriverCaps) -> Self {
        Self { caps }
    }

    /// Build a single-barrier dependency for a named hazard transition
    pub fn buffer_barrier(
        &self,
        kind: BarrierKind,
        buffer: RawBuffer,
        offset: u64,
        size: u64,
    ) -> Result<DependencyInfo> {
        if !self.caps.sync2 {
            return Err(Error::UnsupportedCapability("synchronization2"));
        }
        let (src_stage, src_access) = kind.src_masks();
        let (dst_stage, dst_access) = kind.dst_masks();
        let mut dep = DependencyInfo::new();
        dep.push(BufferBarrier {
            src_stage,
            src_access,
            dst_stage,
            dst_access,
            buffer,
            offset,
            size,
        });
        Ok(dep)
    }

    pub fn transfer_to_vertex_attribute(
        &self,
        buffer: RawBuffer,
        offset: u64,
        size: u64,
    ) -> Result<DependencyInfo> {
        self.buffer_barrier(BarrierKind::TransferToVertexAttribute, buffer, offset, size)
    }

    pub fn transfer_to_index(
        &self,
        buffer: RawBuffer,
        offset: u64,
        size: u64,
    ) -> Result<DependencyInfo> {
        self.buffer_barrier(BarrierKind::TransferToIndex, buffer, offset, size)
    }

    pub fn compute_storage_to_vertex_shader(
        &self,
        buffer: RawBuffer,
        offset: u64,
        size: u64,
    ) -> Result<DependencyInfo> {
        self.buffer_barrier(BarrierKind::ComputeStorageToVertexShader, buffer, offset, size)
    }

    pub fn compute_storage_to_fragment_shader(
        &self,
        buffer: RawBuffer,
        offset: u64,
        size: u64,
    ) -> Result<DependencyInfo> {
        self.buffer_barrier(
            BarrierKind::ComputeStorageToFragmentShader,
            buffer,
            offset,
            size,
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "barrier_tests.rs"]
mod tests;
