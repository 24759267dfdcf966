//! Resets the grid and the per-particle links to `SENTINEL`. Must run before the grid is built.

use tether_gpu_shared::constants::WORKGROUP_SIZE;

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
    Builder::storage_entry(0, false),
    Builder::storage_entry(1, false),
];

/// The grid clearing stage. Owns nothing, it works on the grid stage's buffers.
#[derive(Default)]
pub struct CleanGridStage {
    /// Has to cover both the cells and the particles
    instance_count: u32,
}

impl CleanGridStage {
    /// Instantiate with nothing to do. The count is only known once the grid exists.
    #[must_use]
    #[inline]
    pub const fn new() -> Self {
        Self { instance_count: 0 }
    }

    /// Cover `count` entries of both buffers
    #[inline]
    pub fn set_instance_count(&mut self, count: u32) {
        self.instance_count = count;
    }
}

impl Stage for CleanGridStage {
    const LABEL: &'static str = "clean grid";

    #[inline]
    fn descriptor(&self) -> Descriptor {
        Descriptor {
            provides: ResourceSet::EMPTY,
            requires: ResourceSet {
                buffers: &[Buffers::GRID, Buffers::PARTICLE_NEXT],
                ..ResourceSet::EMPTY
            },
            links: ResourceSet::EMPTY,
        }
    }

    #[inline]
    fn kernel(&self) -> KernelConfig {
        KernelConfig {
            shader: ShaderLibrary::CLEAN_GRID,
            entry_point: "main",
            workgroup_size: WORKGROUP_SIZE,
            uses_global: false,
            bind_group_layouts: &[LAYOUT],
        }
    }

    #[inline]
    fn instance_count(&self) -> u32 {
        self.instance_count
    }

    #[inline]
    fn create_owned_resources(&mut self, _gpu: &Gpu, _registry: &mut Registry) -> Result<()> {
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
        let cells = registry.buffer(Buffers::GRID)?;
        let next = registry.buffer(Buffers::PARTICLE_NEXT)?;

        let bind_group =
            Builder::new(&gpu.device).bind_group(Self::LABEL, layout, &[&*cells, &*next]);
        Ok(vec![bind_group])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn does_nothing_until_told_how_much_to_clear() {
        let mut stage = CleanGridStage::new();
        assert_eq!(stage.instance_count(), 0);
        stage.set_instance_count(5151);
        assert_eq!(stage.instance_count(), 5151);
    }
}
