//! GPU `PageRank`
//!
//! Sparse matrix-vector multiplication (`SpMV`) based power iteration.
//! Based on Page et al. (1999), Bell & Garland (2009) "Implementing Sparse
//! Matrix-Vector Multiplication on Throughput-Oriented Processors" for the
//! CSR-vector and ELL kernels, and `GraphBLAST` (Yang et al., ACM `ToMS` 2022).
//!
//! The matrix arrays are uploaded once. Each iteration uploads `old`, runs
//!
//! 1. `leaked_mass` (one workgroup)
//! 2. the layout's product kernel(s), writing `Σ old[u] / out_degree[u]`
//! 3. `fix_output`: `new = leaked / n + damping * new`
//!
//! in a single submission and reads `new` back. The residual is computed on
//! the host in `f64` from `old` and `new`, exactly as the CPU strategies do,
//! so every strategy takes the same stop decision.

use super::buffer::{uniform_buffer, GpuLayout, GpuLayoutBuffers, GpuMatrixBuffers, RunParams};
use super::device::{GpuDevice, GpuDeviceError};
use super::kernel::{ComputeKernel, KernelKind};
use super::memory::GpuMemoryLimits;
use crate::algorithms::pagerank::{
    l2_distance, log_finished, normalize, PageRankResult, RankBuffers,
};
use crate::config::{GpuConfig, PageRankConfig, StopReason};
use crate::error::PageRankError;
use anyhow::{Context, Result};
use log::debug;
use std::time::Instant;

/// One recorded kernel launch
#[derive(Debug)]
struct Launch {
    kernel: usize,
    bind_group: wgpu::BindGroup,
    workgroups: u32,
}

/// Kernels built so far, each compiled once per run
#[derive(Debug, Default)]
struct KernelCache {
    kernels: Vec<ComputeKernel>,
}

impl KernelCache {
    /// Bind `bindings` to `kind`, building it on first use
    async fn launch(
        &mut self,
        device: &GpuDevice,
        gpu: &GpuConfig,
        kind: KernelKind,
        bindings: &[&wgpu::Buffer],
        workgroups: u32,
    ) -> Result<Launch, GpuDeviceError> {
        let kernel = match self.kernels.iter().position(|k| k.kind() == kind) {
            Some(index) => index,
            None => {
                self.kernels.push(ComputeKernel::build(device, kind, gpu).await?);
                self.kernels.len() - 1
            }
        };
        Ok(Launch {
            kernel,
            bind_group: self.kernels[kernel].bind(device, bindings),
            workgroups,
        })
    }
}

/// Everything an iteration needs, created once per run
#[derive(Debug)]
struct IterationPlan {
    kernels: Vec<ComputeKernel>,
    launches: Vec<Launch>,
    max_per_dimension: u32,
    rank_bytes: u64,
    ranks_in: wgpu::Buffer,
    ranks_out: wgpu::Buffer,
    staging_ranks: wgpu::Buffer,
    // bound only through bind groups, kept alive with the plan
    _scratch: [wgpu::Buffer; 2],
}

impl IterationPlan {
    #[allow(clippy::too_many_lines)]
    async fn build(
        device: &GpuDevice,
        buffers: &GpuLayoutBuffers,
        config: &PageRankConfig,
        gpu: &GpuConfig,
        limits: &GpuMemoryLimits,
    ) -> Result<Self> {
        let num_nodes =
            u32::try_from(buffers.num_nodes()).context("too many nodes for the GPU")?;
        let wg = gpu.workgroup_size;
        let row_groups = num_nodes.div_ceil(wg);
        let rank_bytes = u64::from(num_nodes) * 4;

        let run = RunParams::new(
            num_nodes,
            u32::try_from(buffers.num_leaves())?,
            config.damping,
        );
        let storage = wgpu::BufferUsages::STORAGE;
        let readable = wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST;
        let params = uniform_buffer(device, "run params", &run)?;
        let ranks_in =
            device.create_buffer("ranks_in", rank_bytes, storage | wgpu::BufferUsages::COPY_DST)?;
        let ranks_out =
            device.create_buffer("ranks_out", rank_bytes, storage | wgpu::BufferUsages::COPY_SRC)?;
        let leaked = device.create_buffer("leaked", 4, storage)?;

        let mut cache = KernelCache::default();
        let mut launches = vec![
            cache
                .launch(
                    device,
                    gpu,
                    KernelKind::LeakedMass,
                    &[&params, &buffers.leaves, &ranks_in, &leaked],
                    1,
                )
                .await?,
        ];

        match &buffers.matrix {
            GpuMatrixBuffers::Csr {
                row_offsets,
                col_indices,
                values,
            } => {
                let threads = num_nodes
                    .checked_mul(gpu.warp_size)
                    .context("too many CSR rows for one launch at this warp size")?;
                launches.push(
                    cache
                        .launch(
                            device,
                            gpu,
                            KernelKind::CsrVector,
                            &[&params, row_offsets, col_indices, values, &ranks_in, &ranks_out],
                            threads.div_ceil(wg),
                        )
                        .await?,
                );
            }
            GpuMatrixBuffers::Ell {
                params: ell,
                col_indices,
                values,
            } => {
                launches.push(
                    cache
                        .launch(
                            device,
                            gpu,
                            KernelKind::EllScalar,
                            &[ell, col_indices, values, &ranks_in, &ranks_out],
                            row_groups,
                        )
                        .await?,
                );
            }
            GpuMatrixBuffers::Jds { pieces, dangling } => {
                launches.push(
                    cache
                        .launch(
                            device,
                            gpu,
                            KernelKind::NullifyDangling,
                            &[&params, dangling, &ranks_out],
                            row_groups,
                        )
                        .await?,
                );
                for piece in pieces {
                    launches.push(
                        cache
                            .launch(
                                device,
                                gpu,
                                KernelKind::JdsPiece,
                                &[
                                    &piece.params,
                                    &piece.row_ind,
                                    &piece.col_indices,
                                    &piece.values,
                                    &ranks_in,
                                    &ranks_out,
                                ],
                                piece.num_rows.div_ceil(wg),
                            )
                            .await?,
                    );
                }
            }
        }

        launches.push(
            cache
                .launch(
                    device,
                    gpu,
                    KernelKind::FixOutput,
                    &[&params, &leaked, &ranks_out],
                    row_groups,
                )
                .await?,
        );

        debug!(
            "GPU plan: {} kernels, {} launches per iteration",
            cache.kernels.len(),
            launches.len()
        );
        Ok(Self {
            kernels: cache.kernels,
            launches,
            max_per_dimension: limits.max_workgroups_per_dimension,
            rank_bytes,
            ranks_in,
            ranks_out,
            staging_ranks: device.create_buffer("staging ranks", rank_bytes, readable)?,
            _scratch: [params, leaked],
        })
    }

    /// Run one iteration: `old` goes up, `new` comes down
    async fn iterate(
        &self,
        device: &GpuDevice,
        old: &[f32],
        new: &mut [f32],
    ) -> Result<(), GpuDeviceError> {
        device
            .queue()
            .write_buffer(&self.ranks_in, 0, bytemuck::cast_slice(old));

        let mut encoder = device
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("PageRank iteration"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("PageRank iteration"),
                timestamp_writes: None,
            });
            for launch in &self.launches {
                self.kernels[launch.kernel].dispatch(
                    &mut pass,
                    &launch.bind_group,
                    launch.workgroups,
                    self.max_per_dimension,
                );
            }
        }
        encoder.copy_buffer_to_buffer(&self.ranks_out, 0, &self.staging_ranks, 0, self.rank_bytes);
        device.queue().submit(Some(encoder.finish()));

        read_back(device, &self.staging_ranks, "ranks", new).await
    }
}

/// Copy a mapped staging buffer into `out`
async fn read_back(
    device: &GpuDevice,
    staging: &wgpu::Buffer,
    label: &str,
    out: &mut [f32],
) -> Result<(), GpuDeviceError> {
    let readback_error = |reason: String| GpuDeviceError::Readback {
        buffer: label.to_string(),
        reason,
    };

    let buffer_slice = staging.slice(..);
    let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
    buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });

    device.device().poll(wgpu::Maintain::Wait);
    match rx.receive().await {
        Some(Ok(())) => {}
        Some(Err(e)) => return Err(readback_error(e.to_string())),
        None => return Err(readback_error("mapping callback dropped".to_string())),
    }

    {
        let data = buffer_slice.get_mapped_range();
        out.copy_from_slice(bytemuck::cast_slice(&data));
    }
    staging.unmap();
    Ok(())
}

/// Run `PageRank` on the GPU
///
/// Accepts a CSR, ELL or JDS layout (anything convertible into
/// [`GpuLayout`]). The residual of every iteration is the `f64` L2 distance
/// between the uploaded and the downloaded vector, the same rule the CPU
/// strategies stop on.
///
/// # Errors
///
/// Returns error if:
/// - `config` or `gpu_config` is invalid, or the workgroup exceeds the device limit
/// - the layout does not fit in device memory ([`GpuDeviceError::InsufficientMemory`])
/// - a kernel fails to build ([`GpuDeviceError::KernelBuild`])
/// - result readback fails
///
/// # Example
///
/// ```ignore
/// # use sparse_pagerank::gpu::{gpu_pagerank, GpuDevice};
/// # use sparse_pagerank::{CsrMatrix, EdgeList, GpuConfig, PageRankConfig};
/// # async fn example() -> anyhow::Result<()> {
/// let device = GpuDevice::new().await?;
/// let edges = EdgeList::parse("3\t3\n0\t1\n1\t2\n2\t0\n")?;
/// let csr = CsrMatrix::from_edges(&edges)?;
///
/// let config = PageRankConfig::default();
/// let result = gpu_pagerank(&device, &csr, &config, &GpuConfig::default()).await?;
/// println!("Node 0 score: {:?}", result.scores[0]);
/// # Ok(())
/// # }
/// ```
pub async fn gpu_pagerank<'a>(
    device: &GpuDevice,
    layout: impl Into<GpuLayout<'a>>,
    config: &PageRankConfig,
    gpu_config: &GpuConfig,
) -> Result<PageRankResult> {
    config.validate()?;
    gpu_config.validate()?;
    let start = Instant::now();
    let layout = layout.into();
    let nodes_count = layout.as_layout().nodes_count();

    if nodes_count == 0 {
        return Ok(PageRankResult {
            scores: Vec::new(),
            iterations: 0,
            stop_reason: StopReason::Converged,
            residuals: Vec::new(),
        });
    }

    let limits = GpuMemoryLimits::detect(device);
    if gpu_config.workgroup_size > limits.max_workgroup_size {
        return Err(PageRankError::InvalidWorkgroup {
            warp_size: gpu_config.warp_size,
            workgroup_size: gpu_config.workgroup_size,
        }
        .into());
    }
    limits.check(&layout.buffer_sizes())?;

    let buffers = GpuLayoutBuffers::upload(device, layout)?;
    let plan = IterationPlan::build(device, &buffers, config, gpu_config, &limits).await?;

    let mut ranks = RankBuffers::uniform(nodes_count);
    let mut residuals = Vec::new();
    let mut iterations = 0;
    let stop_reason = loop {
        let (old, new) = ranks.split();
        plan.iterate(device, old, new).await?;
        let norm = l2_distance(new, old);
        ranks.swap();
        iterations += 1;
        residuals.push(norm);
        debug!("iteration {iterations}: norm {norm:.3e}");

        if let Some(reason) = config.stop_reason(iterations, norm) {
            break reason;
        }
    };

    let mut scores = ranks.into_current();
    normalize(&mut scores);
    let result = PageRankResult {
        scores,
        iterations,
        stop_reason,
        residuals,
    };
    log_finished(
        &format!("gpu/{}", layout.kind()),
        &result,
        config,
        start.elapsed(),
    );
    Ok(result)
}
