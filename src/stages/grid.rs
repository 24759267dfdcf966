//! Builds the spatial grid every frame.
//!
//! Each particle splices itself onto the front of its cell's linked list with an atomic exchange,
//! so particles racing for the same cell in the same dispatch never lose each other.

use tether_gpu_shared::{constants::SENTINEL, grid};

use crate::{
    error::{Error, Result},
    gpu_manager::Gpu,
    pipeline::{
        buffers::Buffers,
        builder::Builder,
        descriptor::{Descriptor, ResourceSet},
        KernelConfig, Stage,
    },
    registry::Registry,
    shader::ShaderLibrary,
};

const LAYOUT: &[wgpu::BindGroupLayoutEntry] = &[
    Builder::storage_entry(0, true),
    Builder::storage_entry(1, false),
    Builder::storage_entry(2, false),
];

/// The grid stage
pub struct GridStage {
    /// One invocation per particle
    particle_count: u32,
}

impl GridStage {
    /// Instantiate
    #[must_use]
    #[inline]
    pub const fn new(particle_count: u32) -> Self {
        Self { particle_count }
    }

    /// Number of cells covering the world
    #[must_use]
    #[inline]
    pub fn grid_cell_count(&self) -> u32 {
        grid::cell_count()
    }
}

impl Stage for GridStage {
    const LABEL: &'static str = "grid";

    #[inline]
    fn descriptor(&self) -> Descriptor {
        Descriptor {
            provides: ResourceSet {
                buffers: &[Buffers::GRID, Buffers::PARTICLE_NEXT],
                ..ResourceSet::EMPTY
            },
            requires: ResourceSet {
                buffers: &[Buffers::PARTICLES],
                ..ResourceSet::EMPTY
            },
            links: ResourceSet::EMPTY,
        }
    }

    #[inline]
    fn kernel(&self) -> KernelConfig {
        KernelConfig {
            shader: ShaderLibrary::GRID,
            entry_point: "main",
            workgroup_size: tether_gpu_shared::constants::WORKGROUP_SIZE,
            uses_global: false,
            bind_group_layouts: &[LAYOUT],
        }
    }

    #[inline]
    fn instance_count(&self) -> u32 {
        self.particle_count
    }

    #[inline]
    #[expect(clippy::as_conversions, reason = "u32 always fits in usize on our targets")]
    fn create_owned_resources(&mut self, gpu: &Gpu, registry: &mut Registry) -> Result<()> {
        let builder = Builder::new(&gpu.device);
        let cells = vec![SENTINEL; self.grid_cell_count() as usize];
        let next = vec![SENTINEL; self.particle_count as usize];
        log::debug!("Grid has {} cells for {} particles", cells.len(), next.len());

        registry.register_buffer(Buffers::GRID, builder.storage_buffer(Buffers::GRID, &cells));
        registry.register_buffer(
            Buffers::PARTICLE_NEXT,
            builder.storage_buffer(Buffers::PARTICLE_NEXT, &next),
        );
        Ok(())
    }

    #[inline]
    fn create_bind_groups(
        &self,
        gpu: &Gpu,
        registry: &Registry,
        layouts: &[wgpu::BindGroupLayout],
    ) -> Result<Vec<wgpu::BindGroup>> {
        let [layout] = layouts else {
            return Err(Error::Uninitialized(Self::LABEL));
        };
        let particles = registry.buffer(Buffers::PARTICLES)?;
        let cells = registry.buffer(Buffers::GRID)?;
        let next = registry.buffer(Buffers::PARTICLE_NEXT)?;

        let bind_group = Builder::new(&gpu.device).bind_group(
            Self::LABEL,
            layout,
            &[&*particles, &*cells, &*next],
        );
        Ok(vec![bind_group])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_grid_needs_particles_before_it_initializes() {
        let descriptor = GridStage::new(10).descriptor();
        assert_eq!(descriptor.requires.buffers, &[Buffers::PARTICLES]);
        assert_eq!(
            descriptor.provides.buffers,
            &[Buffers::GRID, Buffers::PARTICLE_NEXT]
        );
    }

    #[test]
    fn one_invocation_per_particle() {
        let stage = GridStage::new(288);
        assert_eq!(stage.instance_count(), 288);
        assert_eq!(stage.grid_cell_count(), 5151);
    }
}
