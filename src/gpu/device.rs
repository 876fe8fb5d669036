//! GPU device initialization and management
//!
//! Handles wgpu device creation, adapter selection, kernel compilation and
//! GPU resource lifecycle. Only GPU-class adapters (discrete, integrated or
//! virtual) are accepted; software rasterizers are rejected.

use thiserror::Error;
use wgpu::util::DeviceExt;

/// GPU backend errors
///
/// Every variant aborts the run; there is no degraded GPU path.
#[derive(Debug, Error)]
pub enum GpuDeviceError {
    /// No compatible GPU adapter found
    #[error("No compatible GPU adapter found")]
    NoAdapter,

    /// The only adapter available is not a GPU
    #[error("Adapter `{0}` is not a GPU")]
    NotGpuClass(String),

    /// Failed to request GPU device
    #[error("Failed to request GPU device: {0}")]
    DeviceRequest(String),

    /// A kernel failed to compile or link
    #[error("Failed to build kernel `{kernel}`:\n{log}")]
    KernelBuild {
        /// Kernel name
        kernel: String,
        /// Compiler diagnostics
        log: String,
    },

    /// The layout does not fit the device limits
    #[error("Layout needs {required} bytes ({what}) but the device allows {available}")]
    InsufficientMemory {
        /// Which limit was exceeded
        what: &'static str,
        /// Bytes the layout needs
        required: u64,
        /// Bytes the device allows
        available: u64,
    },

    /// Mapping a result buffer back to the host failed
    #[error("Failed to read back `{buffer}`: {reason}")]
    Readback {
        /// Buffer label
        buffer: String,
        /// What went wrong
        reason: String,
    },
}

/// GPU device wrapper for `PageRank` dispatch
///
/// # Example
///
/// ```ignore
/// # use sparse_pagerank::gpu::GpuDevice;
/// let device = GpuDevice::new().await?;
/// println!("{}", device.info().name);
/// ```
#[derive(Debug)]
pub struct GpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter: wgpu::Adapter,
}

impl GpuDevice {
    /// Check if GPU is available without keeping a device
    ///
    /// This is useful for tests to skip gracefully when GPU is not available.
    pub async fn is_gpu_available() -> bool {
        Self::new().await.is_ok()
    }

    /// Initialize GPU device with default settings
    ///
    /// # Errors
    ///
    /// Returns `GpuDeviceError` if:
    /// - No compatible GPU adapter found
    /// - The adapter is not a GPU
    /// - Device request fails
    pub async fn new() -> Result<Self, GpuDeviceError> {
        Self::new_with_backend(wgpu::Backends::all()).await
    }

    /// Initialize GPU device with specific backend
    ///
    /// # Errors
    ///
    /// Returns `GpuDeviceError` if device initialization fails
    pub async fn new_with_backend(backends: wgpu::Backends) -> Result<Self, GpuDeviceError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuDeviceError::NoAdapter)?;

        let info = adapter.get_info();
        if !matches!(
            info.device_type,
            wgpu::DeviceType::DiscreteGpu
                | wgpu::DeviceType::IntegratedGpu
                | wgpu::DeviceType::VirtualGpu
        ) {
            return Err(GpuDeviceError::NotGpuClass(info.name));
        }

        // Ask for everything the adapter offers so large layouts are bounded
        // by the hardware, not by the portable defaults
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("sparse-pagerank GPU device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: adapter.limits(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .map_err(|e| GpuDeviceError::DeviceRequest(e.to_string()))?;

        log::info!("GPU device: {} ({:?})", info.name, info.backend);

        Ok(Self {
            device,
            queue,
            adapter,
        })
    }

    /// Get adapter info (GPU name, backend, etc.)
    #[must_use]
    pub fn info(&self) -> wgpu::AdapterInfo {
        self.adapter.get_info()
    }

    /// Compile WGSL source into a shader module
    ///
    /// Validation errors are captured instead of reaching wgpu's default
    /// (panicking) handler.
    ///
    /// # Errors
    ///
    /// Returns [`GpuDeviceError::KernelBuild`] with the compiler log
    pub async fn compile(
        &self,
        kernel: &str,
        source: &str,
    ) -> Result<wgpu::ShaderModule, GpuDeviceError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(kernel),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
        match self.device.pop_error_scope().await {
            Some(error) => Err(GpuDeviceError::KernelBuild {
                kernel: kernel.to_string(),
                log: error.to_string(),
            }),
            None => Ok(module),
        }
    }

    /// Create GPU buffer with initial data
    ///
    /// # Errors
    ///
    /// Returns error if buffer creation fails (typically won't happen with wgpu)
    pub fn create_buffer_init(
        &self,
        label: &str,
        contents: &[u8],
        usage: wgpu::BufferUsages,
    ) -> Result<wgpu::Buffer, GpuDeviceError> {
        Ok(self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage,
            }))
    }

    /// Create empty GPU buffer
    ///
    /// # Errors
    ///
    /// Returns error if buffer creation fails
    pub fn create_buffer(
        &self,
        label: &str,
        size: u64,
        usage: wgpu::BufferUsages,
    ) -> Result<wgpu::Buffer, GpuDeviceError> {
        Ok(self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage,
            mapped_at_creation: false,
        }))
    }

    /// Get device reference
    #[must_use]
    pub const fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Get queue reference
    #[must_use]
    pub const fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_gpu_device_creation() {
        if !GpuDevice::is_gpu_available().await {
            eprintln!("⚠️  Skipping test_gpu_device_creation: GPU not available");
            return;
        }

        let device = GpuDevice::new().await.unwrap();
        let info = device.info();
        assert!(!info.name.is_empty(), "Adapter name should not be empty");
        assert_ne!(info.device_type, wgpu::DeviceType::Cpu);
    }

    #[tokio::test]
    async fn test_gpu_device_with_invalid_backend() {
        let device = GpuDevice::new_with_backend(wgpu::Backends::empty()).await;
        assert!(
            device.is_err(),
            "Device creation should fail with empty backends"
        );
    }

    #[test]
    fn test_gpu_device_error_display() {
        let err = GpuDeviceError::NoAdapter;
        assert_eq!(err.to_string(), "No compatible GPU adapter found");

        let err = GpuDeviceError::DeviceRequest("test error".to_string());
        assert_eq!(err.to_string(), "Failed to request GPU device: test error");

        let err = GpuDeviceError::KernelBuild {
            kernel: "csr_vector".to_string(),
            log: "unknown identifier".to_string(),
        };
        assert!(err.to_string().contains("csr_vector"));
    }

    #[tokio::test]
    async fn test_compile_reports_build_log() {
        if !GpuDevice::is_gpu_available().await {
            eprintln!("⚠️  Skipping test_compile_reports_build_log: GPU not available");
            return;
        }

        let device = GpuDevice::new().await.unwrap();
        let err = device
            .compile("broken", "fn main( { }")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GpuDeviceError::KernelBuild { ref kernel, .. } if kernel == "broken"
        ));
    }

    #[tokio::test]
    async fn test_create_buffer_init() {
        if !GpuDevice::is_gpu_available().await {
            eprintln!("⚠️  Skipping test_create_buffer_init: GPU not available");
            return;
        }

        let device = GpuDevice::new().await.unwrap();
        let data: Vec<u32> = vec![1, 2, 3, 4];

        let buffer = device
            .create_buffer_init(
                "test_init",
                bytemuck::cast_slice(&data),
                wgpu::BufferUsages::STORAGE,
            )
            .unwrap();

        assert_eq!(buffer.size(), (data.len() * 4) as u64);
    }
}
