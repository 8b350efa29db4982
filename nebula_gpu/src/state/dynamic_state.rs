//! Per-recording dynamic pipeline-state memoization
//!
//! Caches the last-set value for each dynamic state and suppresses the
//! native "set state" command when the value is unchanged. One tracker
//! belongs to one recording thread (it is deliberately not shared), and
//! must be reset at the start of every command-buffer recording scope:
//! native command buffers do not preserve dynamic state across begin.

use crate::driver::{
    CompareOp, CullMode, DriverCaps, FrontFace, GpuDriver, PrimitiveTopology, RawCommandBuffer,
};
use crate::error::{Error, Result};

/// Memoized dynamic-state cache for one recording thread
#[derive(Debug, Clone)]
pub struct DynamicStateTracker {
    caps: DriverCaps,
    cull_mode: Option<CullMode>,
    front_face: Option<FrontFace>,
    topology: Option<PrimitiveTopology>,
    depth_test: Option<bool>,
    depth_write: Option<bool>,
    depth_compare: Option<CompareOp>,
    stencil_test: Option<bool>,
}

impl DynamicStateTracker {
    pub fn new(caps: DriverCaps) -> Self {
        Self {
            caps,
            cull_mode: None,
            front_face: None,
            topology: None,
            depth_test: None,
            depth_write: None,
            depth_compare: None,
            stencil_test: None,
        }
    }

    /// Forget all cached values.
    ///
    /// Must be called at the start of each command-buffer recording
    /// scope, before the first `set_*`.
    pub fn reset(&mut self) {
        self.cull_mode = None;
        self.front_face = None;
        self.topology = None;
        self.depth_test = None;
        self.depth_write = None;
        self.depth_compare = None;
        self.stencil_test = None;
    }

    fn check_caps(&self) -> Result<()> {
        if !self.caps.extended_dynamic_state {
            return Err(Error::UnsupportedCapability("extended dynamic state"));
        }
        Ok(())
    }

    /// Set the cull mode; returns whether a command was emitted
    pub fn set_cull_mode(
        &mut self,
        driver: &dyn GpuDriver,
        cmd: RawCommandBuffer,
        mode: CullMode,
    ) -> Result<bool> {
        self.check_caps()?;
        if self.cull_mode == Some(mode) {
            return Ok(false);
        }
        driver.cmd_set_cull_mode(cmd, mode);
        self.cull_mode = Some(mode);
        Ok(true)
    }

    /// Set the front face; returns whether a command was emitted
    pub fn set_front_face(
        &mut self,
        driver: &dyn GpuDriver,
        cmd: RawCommandBuffer,
        front_face: FrontFace,
    ) -> Result<bool> {
        self.check_caps()?;
        if self.front_face == Some(front_face) {
            return Ok(false);
        }
        driver.cmd_set_front_face(cmd, front_face);
        self.front_face = Some(front_face);
        Ok(true)
    }

    /// Set the primitive topology; returns whether a command was emitted
    pub fn set_primitive_topology(
        &mut self,
        driver: &dyn GpuDriver,
        cmd: RawCommandBuffer,
        topology: PrimitiveTopology,
    ) -> Result<bool> {
        self.check_caps()?;
        if self.topology == Some(topology) {
            return Ok(false);
        }
        driver.cmd_set_primitive_topology(cmd, topology);
        self.topology = Some(topology);
        Ok(true)
    }

    /// Toggle depth testing; returns whether a command was emitted
    pub fn set_depth_test_enable(
        &mut self,
        driver: &dyn GpuDriver,
        cmd: RawCommandBuffer,
        enable: bool,
    ) -> Result<bool> {
        self.check_caps()?;
        if self.depth_test == Some(enable) {
            return Ok(false);
        }
        driver.cmd_set_depth_test_enable(cmd, enable);
        self.depth_test = Some(enable);
        Ok(true)
    }

    /// Toggle depth writes; returns whether a command was emitted
    pub fn set_depth_write_enable(
        &mut self,
        driver: &dyn GpuDriver,
        cmd: RawCommandBuffer,
        enable: bool,
    ) -> Result<bool> {
        self.check_caps()?;
        if self.depth_write == Some(enable) {
            return Ok(false);
        }
        driver.cmd_set_depth_write_enable(cmd, enable);
        self.depth_write = Some(enable);
        Ok(true)
    }

    /// Set the depth compare op; returns whether a command was emitted
    pub fn set_depth_compare_op(
        &mut self,
        driver: &dyn GpuDriver,
        cmd: RawCommandBuffer,
        op: CompareOp,
    ) -> Result<bool> {
        self.check_caps()?;
        if self.depth_compare == Some(op) {
            return Ok(false);
        }
        driver.cmd_set_depth_compare_op(cmd, op);
        self.depth_compare = Some(op);
        Ok(true)
    }

    /// Toggle stencil testing; returns whether a command was emitted
    pub fn set_stencil_test_enable(
        &mut self,
        driver: &dyn GpuDriver,
        cmd: RawCommandBuffer,
        enable: bool,
    ) -> Result<bool> {
        self.check_caps()?;
        if self.stencil_test == Some(enable) {
            return Ok(false);
        }
        driver.cmd_set_stencil_test_enable(cmd, enable);
        self.stencil_test = Some(enable);
        Ok(true)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "dynamic_state_tests.rs"]
mod tests;
