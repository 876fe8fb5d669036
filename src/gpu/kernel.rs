//! Compute kernels
//!
//! Every kernel is one WGSL file with a single entry point of the same name.
//! The host prepends the launch constants (`WORKGROUP_SIZE`, `WARP_SIZE`)
//! and a shared prelude, so one source serves any [`GpuConfig`].

use super::device::{GpuDevice, GpuDeviceError};
use crate::config::GpuConfig;

const PRELUDE: &str = include_str!("shaders/prelude.wgsl");

/// How a kernel sees one of its buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Small parameter block
    Uniform,
    /// Storage buffer the kernel only reads
    Read,
    /// Storage buffer the kernel writes
    ReadWrite,
}

impl Access {
    const fn binding_type(self) -> wgpu::BindingType {
        let ty = match self {
            Self::Uniform => wgpu::BufferBindingType::Uniform,
            Self::Read => wgpu::BufferBindingType::Storage { read_only: true },
            Self::ReadWrite => wgpu::BufferBindingType::Storage { read_only: false },
        };
        wgpu::BindingType::Buffer {
            ty,
            has_dynamic_offset: false,
            min_binding_size: None,
        }
    }
}

/// The kernels of one `PageRank` iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelKind {
    /// Dangling mass plus teleport share, one workgroup
    LeakedMass,
    /// CSR product with `WARP_SIZE` threads per row
    CsrVector,
    /// ELL product with one thread per row
    EllScalar,
    /// Product over one JDS piece
    JdsPiece,
    /// Zero the rows no JDS piece covers
    NullifyDangling,
    /// Apply damping and add the leaked share
    FixOutput,
}

impl KernelKind {
    /// Every kernel
    pub const ALL: [Self; 6] = [
        Self::LeakedMass,
        Self::CsrVector,
        Self::EllScalar,
        Self::JdsPiece,
        Self::NullifyDangling,
        Self::FixOutput,
    ];

    /// Kernel name, which is also its entry point
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::LeakedMass => "leaked_mass",
            Self::CsrVector => "csr_vector",
            Self::EllScalar => "ell_scalar",
            Self::JdsPiece => "jds_piece",
            Self::NullifyDangling => "nullify_dangling",
            Self::FixOutput => "fix_output",
        }
    }

    const fn body(self) -> &'static str {
        match self {
            Self::LeakedMass => include_str!("shaders/leaked_mass.wgsl"),
            Self::CsrVector => include_str!("shaders/csr_vector.wgsl"),
            Self::EllScalar => include_str!("shaders/ell_scalar.wgsl"),
            Self::JdsPiece => include_str!("shaders/jds_piece.wgsl"),
            Self::NullifyDangling => include_str!("shaders/nullify_dangling.wgsl"),
            Self::FixOutput => include_str!("shaders/fix_output.wgsl"),
        }
    }

    /// Bindings in `@binding` order
    #[must_use]
    pub const fn bindings(self) -> &'static [Access] {
        use Access::{Read, ReadWrite, Uniform};
        match self {
            Self::LeakedMass => &[Uniform, Read, Read, ReadWrite],
            Self::CsrVector | Self::JdsPiece => &[Uniform, Read, Read, Read, Read, ReadWrite],
            Self::EllScalar => &[Uniform, Read, Read, Read, ReadWrite],
            Self::NullifyDangling | Self::FixOutput => &[Uniform, Read, ReadWrite],
        }
    }
}

/// Full WGSL text for `kind` under `gpu`'s launch sizes
#[must_use]
pub fn kernel_source(kind: KernelKind, gpu: &GpuConfig) -> String {
    format!(
        "const WORKGROUP_SIZE: u32 = {}u;\nconst WARP_SIZE: u32 = {}u;\n\n{PRELUDE}\n{}",
        gpu.workgroup_size,
        gpu.warp_size,
        kind.body()
    )
}

/// Split `workgroups` over a grid whose sides stay within `max_per_dimension`
///
/// Kernels recover the flat index as `y * x_size + x` and must bounds-check,
/// since `x * y` may exceed `workgroups`.
#[must_use]
pub fn launch_grid(workgroups: u32, max_per_dimension: u32) -> (u32, u32) {
    let max = max_per_dimension.max(1);
    if workgroups <= max {
        return (workgroups, 1);
    }
    let y = workgroups.div_ceil(max);
    (workgroups.div_ceil(y), y)
}

/// A compiled kernel and its bind group layout
#[derive(Debug)]
pub struct ComputeKernel {
    kind: KernelKind,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline: wgpu::ComputePipeline,
}

impl ComputeKernel {
    /// Compile and link `kind`
    ///
    /// # Errors
    ///
    /// Returns [`GpuDeviceError::KernelBuild`] with the compiler log if the
    /// source does not compile or the pipeline cannot be created
    pub async fn build(
        device: &GpuDevice,
        kind: KernelKind,
        gpu: &GpuConfig,
    ) -> Result<Self, GpuDeviceError> {
        let name = kind.name();
        let module = device.compile(name, &kernel_source(kind, gpu)).await?;

        let entries: Vec<wgpu::BindGroupLayoutEntry> = kind
            .bindings()
            .iter()
            .zip(0_u32..)
            .map(|(access, binding)| wgpu::BindGroupLayoutEntry {
                binding,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: access.binding_type(),
                count: None,
            })
            .collect();

        let wgpu_device = device.device();
        wgpu_device.push_error_scope(wgpu::ErrorFilter::Validation);
        let bind_group_layout =
            wgpu_device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(name),
                entries: &entries,
            });
        let pipeline_layout = wgpu_device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(name),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let pipeline = wgpu_device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(name),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: name,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });
        if let Some(error) = wgpu_device.pop_error_scope().await {
            return Err(GpuDeviceError::KernelBuild {
                kernel: name.to_string(),
                log: error.to_string(),
            });
        }

        log::debug!("built kernel {name}");
        Ok(Self {
            kind,
            bind_group_layout,
            pipeline,
        })
    }

    /// Which kernel this is
    #[must_use]
    pub const fn kind(&self) -> KernelKind {
        self.kind
    }

    /// Bind `buffers` in `@binding` order
    #[must_use]
    pub fn bind(&self, device: &GpuDevice, buffers: &[&wgpu::Buffer]) -> wgpu::BindGroup {
        debug_assert_eq!(buffers.len(), self.kind.bindings().len());
        let entries: Vec<wgpu::BindGroupEntry> = buffers
            .iter()
            .zip(0_u32..)
            .map(|(buffer, binding)| wgpu::BindGroupEntry {
                binding,
                resource: buffer.as_entire_binding(),
            })
            .collect();
        device
            .device()
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(self.kind.name()),
                layout: &self.bind_group_layout,
                entries: &entries,
            })
    }

    /// Record a launch of `workgroups` workgroups
    pub fn dispatch(
        &self,
        pass: &mut wgpu::ComputePass<'_>,
        bind_group: &wgpu::BindGroup,
        workgroups: u32,
        max_per_dimension: u32,
    ) {
        let (x, y) = launch_grid(workgroups, max_per_dimension);
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.dispatch_workgroups(x, y, 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_grid() {
        assert_eq!(launch_grid(0, 65_535), (0, 1));
        assert_eq!(launch_grid(100, 65_535), (100, 1));
        assert_eq!(launch_grid(65_535, 65_535), (65_535, 1));

        let (x, y) = launch_grid(200_000, 65_535);
        assert!(x <= 65_535 && y <= 65_535);
        assert!(u64::from(x) * u64::from(y) >= 200_000);
        assert_eq!(y, 4);
    }

    #[test]
    fn test_source_carries_launch_sizes() {
        let gpu = GpuConfig {
            warp_size: 32,
            workgroup_size: 128,
        };
        let source = kernel_source(KernelKind::CsrVector, &gpu);
        assert!(
            source.starts_with("const WORKGROUP_SIZE: u32 = 128u;\nconst WARP_SIZE: u32 = 32u;")
        );
        assert!(source.contains("fn workgroup_index"));
        assert!(source.contains("fn csr_vector("));
    }

    #[test]
    fn test_binding_counts_match_sources() {
        for kind in KernelKind::ALL {
            let body = kind.body();
            assert_eq!(
                body.matches("@binding(").count(),
                kind.bindings().len(),
                "{}",
                kind.name()
            );
            assert!(body.contains(&format!("fn {}(", kind.name())));
        }
    }

    #[tokio::test]
    async fn test_every_kernel_builds() {
        if !GpuDevice::is_gpu_available().await {
            eprintln!("⚠️  Skipping test_every_kernel_builds: GPU not available");
            return;
        }

        let device = GpuDevice::new().await.unwrap();
        let gpu = GpuConfig::default();
        for kind in KernelKind::ALL {
            let kernel = ComputeKernel::build(&device, kind, &gpu).await.unwrap();
            assert_eq!(kernel.kind(), kind);
        }
    }
}
