//! GPU memory limits
//!
//! wgpu does not report free VRAM, so the budget is estimated from the
//! device's buffer limits, keeping 30% headroom for the driver, staging
//! copies and other tenants. A run is rejected up front when the layout
//! cannot fit instead of failing halfway through the upload.

use super::device::{GpuDevice, GpuDeviceError};

/// Share of the estimated VRAM a run may use
pub const USABLE_FRACTION: f64 = 0.7;

/// GPU memory limits and statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuMemoryLimits {
    /// Total VRAM estimate (bytes)
    pub total_vram: u64,

    /// Budget for one run (70% of total to leave headroom)
    pub usable_vram: u64,

    /// Largest single buffer (bytes)
    pub max_buffer_size: u64,

    /// Largest storage binding (bytes)
    pub max_binding_size: u64,

    /// Largest workgroup count along one grid dimension
    pub max_workgroups_per_dimension: u32,

    /// Largest workgroup (threads)
    pub max_workgroup_size: u32,
}

impl GpuMemoryLimits {
    /// Read the limits of an open device
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn detect(device: &GpuDevice) -> Self {
        let limits = device.device().limits();

        // Most GPUs report max_buffer_size close to their VRAM
        let total_vram = limits.max_buffer_size;
        let usable_vram = (total_vram as f64 * USABLE_FRACTION) as u64;

        Self {
            total_vram,
            usable_vram,
            max_buffer_size: limits.max_buffer_size,
            max_binding_size: u64::from(limits.max_storage_buffer_binding_size),
            max_workgroups_per_dimension: limits.max_compute_workgroups_per_dimension,
            max_workgroup_size: limits
                .max_compute_invocations_per_workgroup
                .min(limits.max_compute_workgroup_size_x),
        }
    }

    /// Check if `bytes` fit in the run budget
    #[must_use]
    pub const fn fits_in_vram(&self, bytes: u64) -> bool {
        bytes <= self.usable_vram
    }

    /// Check every buffer against the binding limits and their sum against the budget
    ///
    /// # Errors
    ///
    /// Returns [`GpuDeviceError::InsufficientMemory`] naming the first limit exceeded
    pub fn check(&self, buffers: &[(&'static str, u64)]) -> Result<(), GpuDeviceError> {
        let binding_limit = self.max_binding_size.min(self.max_buffer_size);
        if let Some(&(what, required)) = buffers.iter().find(|(_, size)| *size > binding_limit) {
            return Err(GpuDeviceError::InsufficientMemory {
                what,
                required,
                available: binding_limit,
            });
        }

        let total: u64 = buffers.iter().map(|(_, size)| size).sum();
        if self.fits_in_vram(total) {
            Ok(())
        } else {
            Err(GpuDeviceError::InsufficientMemory {
                what: "all buffers",
                required: total,
                available: self.usable_vram,
            })
        }
    }
}
