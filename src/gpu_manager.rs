//! Headless GPU bootstrap, plus the few device helpers every stage needs.

use std::sync::{mpsc, Arc};

use crate::error::{Error, Result};

/// A logical device and its queue. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Gpu {
    /// The device every resource is created on
    pub device: Arc<wgpu::Device>,
    /// The queue every frame is submitted to
    pub queue: Arc<wgpu::Queue>,
}

impl Gpu {
    /// Wrap a device that was acquired elsewhere, for instance by a renderer.
    #[must_use]
    #[inline]
    pub const fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        Self { device, queue }
    }

    /// Run `build` inside a validation error scope, so that a bad shader or pipeline comes back as
    /// `CompileFailure` rather than tripping wgpu's uncaptured error handler.
    ///
    /// # Errors
    /// `CompileFailure` if the device reported a validation error while `build` ran
    #[inline]
    pub fn scoped<T>(&self, label: &str, build: impl FnOnce(&wgpu::Device) -> T) -> Result<T> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let built = build(&self.device);
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(Error::CompileFailure {
                shader: label.to_owned(),
                message: error.to_string(),
            });
        }
        Ok(built)
    }

    /// Copy a storage buffer into host memory. Blocks until the GPU has finished everything
    /// submitted so far.
    ///
    /// # Errors
    /// If mapping the staging buffer fails
    #[inline]
    pub fn read_buffer<T: bytemuck::Pod>(&self, buffer: &wgpu::Buffer) -> Result<Vec<T>> {
        let size = buffer.size();
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback staging"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("readback"),
            });
        encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, size);
        self.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            // The receiver only disappears if this function has already returned
            let _ignored = sender.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        receiver.recv().map_err(|_closed| Error::ReadbackChannel)??;

        let data = slice.get_mapped_range();
        let values = bytemuck::pod_collect_to_vec(&data);
        drop(data);
        staging.unmap();

        Ok(values)
    }
}

/// Owns the adapter and the device for a headless simulation
pub struct GPUManager {
    /// The adapter the device came from
    pub adapter: wgpu::Adapter,
    /// The device and queue
    pub gpu: Gpu,
}

impl GPUManager {
    /// The smallest device that can run every kernel. The particle kernel binds 5 storage buffers,
    /// one more than the downlevel defaults allow.
    #[must_use]
    #[inline]
    pub fn required_limits() -> wgpu::Limits {
        wgpu::Limits {
            max_storage_buffers_per_shader_stage: 5,
            ..wgpu::Limits::downlevel_defaults()
        }
    }

    /// Find an adapter and request a device from it. `WGPU_BACKEND` and `WGPU_ADAPTER_NAME` are
    /// respected.
    ///
    /// # Errors
    /// If there's no adapter, or the adapter can't run compute kernels
    #[inline]
    pub async fn setup() -> Result<Self> {
        log::info!("Initializing the GPU...");

        let backends = wgpu::util::backend_bits_from_env().unwrap_or_else(wgpu::Backends::all);
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });
        let adapter = wgpu::util::initialize_adapter_from_env_or_default(&instance, None)
            .await
            .ok_or(Error::NoAdapter)?;

        let adapter_info = adapter.get_info();
        log::info!("Using {} ({:?})", adapter_info.name, adapter_info.backend);

        let downlevel = adapter.get_downlevel_capabilities();
        if !downlevel
            .flags
            .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS)
        {
            return Err(Error::UnsupportedAdapter {
                adapter: adapter_info.name,
                reason: "no compute shader support".to_owned(),
            });
        }

        let required_limits = Self::required_limits();
        if !required_limits.check_limits(&adapter.limits()) {
            return Err(Error::UnsupportedAdapter {
                adapter: adapter_info.name,
                reason: format!(
                    "needs {} storage buffers per shader stage",
                    required_limits.max_storage_buffers_per_shader_stage
                ),
            });
        }

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("tether"),
                    required_features: wgpu::Features::empty(),
                    required_limits,
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await?;

        Ok(Self {
            adapter,
            gpu: Gpu::new(Arc::new(device), Arc::new(queue)),
        })
    }
}
