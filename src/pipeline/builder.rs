//! Shorthand for the wgpu descriptors every stage builds

use wgpu::util::DeviceExt as _;

/// Builds buffers, layouts, bind groups and pipelines on one device
pub struct Builder<'device> {
    /// The device everything is created on
    device: &'device wgpu::Device,
}

impl<'device> Builder<'device> {
    /// Instantiate
    #[must_use]
    #[inline]
    pub const fn new(device: &'device wgpu::Device) -> Self {
        Self { device }
    }

    /// A storage buffer binding, visible to compute kernels
    #[must_use]
    #[inline]
    pub const fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
        wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }
    }

    /// A uniform buffer binding, visible to compute kernels
    #[must_use]
    #[inline]
    pub const fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
        wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }
    }

    /// A buffer holding `contents`. Bindings can't be zero-sized, so an empty slice still gets room
    /// for one zeroed element.
    #[must_use]
    #[inline]
    pub fn init_buffer<T: bytemuck::Pod>(
        &self,
        label: &str,
        contents: &[T],
        usage: wgpu::BufferUsages,
    ) -> wgpu::Buffer {
        let placeholder = [T::zeroed()];
        let contents: &[T] = if contents.is_empty() {
            &placeholder
        } else {
            contents
        };
        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(contents),
                usage,
            })
    }

    /// A storage buffer that can also be written by the queue and copied out for readback
    #[must_use]
    #[inline]
    pub fn storage_buffer<T: bytemuck::Pod>(&self, label: &str, contents: &[T]) -> wgpu::Buffer {
        self.init_buffer(
            label,
            contents,
            wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
        )
    }

    /// A uniform buffer holding a single value. Can be copied out, for readback.
    #[must_use]
    #[inline]
    pub fn uniform_buffer<T: bytemuck::Pod>(&self, label: &str, value: &T) -> wgpu::Buffer {
        self.init_buffer(
            label,
            core::slice::from_ref(value),
            wgpu::BufferUsages::UNIFORM
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
        )
    }

    /// A bind group layout from its entries
    #[must_use]
    #[inline]
    pub fn bind_group_layout(
        &self,
        label: &str,
        entries: &[wgpu::BindGroupLayoutEntry],
    ) -> wgpu::BindGroupLayout {
        self.device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(label),
                entries,
            })
    }

    /// A bind group binding each of `buffers` whole, at binding indices `0..buffers.len()`
    #[must_use]
    #[inline]
    pub fn bind_group(
        &self,
        label: &str,
        layout: &wgpu::BindGroupLayout,
        buffers: &[&wgpu::Buffer],
    ) -> wgpu::BindGroup {
        let entries: Vec<wgpu::BindGroupEntry<'_>> = buffers
            .iter()
            .zip(0_u32..)
            .map(|(buffer, binding)| wgpu::BindGroupEntry {
                binding,
                resource: buffer.as_entire_binding(),
            })
            .collect();
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &entries,
        })
    }

    /// A compute pipeline from a compiled module and the layouts of its bind groups, in group order
    #[must_use]
    #[inline]
    pub fn compute_pipeline(
        &self,
        label: &str,
        module: &wgpu::ShaderModule,
        entry_point: &str,
        bind_group_layouts: &[&wgpu::BindGroupLayout],
    ) -> wgpu::ComputePipeline {
        let layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts,
                push_constant_ranges: &[],
            });
        self.device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&layout),
                module,
                entry_point: Some(entry_point),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            })
    }
}
