//! Owns the particles and integrates them every frame.
//!
//! Each frame the kernel consumes the forces accumulated by the springs, adds gravity and the
//! separation from neighbouring particles found through the grid, then moves the particle and
//! resolves collisions with the obstacles, the pressed mouse and the world bounds. Pinned
//! particles still have their forces consumed but never move.

use glam::Vec2;
use rand::Rng as _;
use tether_gpu_shared::{constants::ROPE_HEIGHT, Particle};

use crate::{
    config::SimulationConfig,
    error::{Error, Result},
    gpu_manager::Gpu,
    pipeline::{
        buffers::{BindGroupLayouts, BindGroups, Buffers},
        builder::Builder,
        descriptor::{Descriptor, ResourceSet},
        KernelConfig, Stage,
    },
    registry::Registry,
    shader::ShaderLibrary,
};

/// Random stream used to scatter the free particles
const SEED_STREAM: u64 = 1;

/// Group 1, group 0 being the global mouse uniform
const LAYOUT: &[wgpu::BindGroupLayoutEntry] = &[
    Builder::storage_entry(0, false),
    Builder::storage_entry(1, false),
    Builder::storage_entry(2, true),
    Builder::storage_entry(3, true),
    Builder::storage_entry(4, true),
];

/// The initial particles: the rope first, then the free particles.
///
/// Rope particles are spread evenly across `x ∈ [-1, 1]` at `ROPE_HEIGHT`, with mass ramping from
/// 1 to 2 along the rope. The last one is pinned.
#[must_use]
#[inline]
#[expect(clippy::as_conversions, reason = "Particle counts are nowhere near 2^24")]
#[expect(clippy::cast_precision_loss, reason = "Particle counts are nowhere near 2^24")]
pub fn seed_particles(config: &SimulationConfig) -> Vec<Particle> {
    let rope = config.rope_particles;
    let mut particles = Vec::with_capacity(config.particle_count() as usize);

    for index in 0..rope {
        let along = if rope > 1 {
            index as f32 / (rope - 1) as f32
        } else {
            0.0
        };
        let mut particle = Particle::at_rest(Vec2::new(-1.0 + 2.0 * along, ROPE_HEIGHT), 1.0 + along);
        if index + 1 == rope {
            particle.is_static = 1;
        }
        particles.push(particle);
    }

    let mut rng = config.rng(SEED_STREAM);
    for _ in 0..config.free_particles {
        let position = Vec2::new(rng.gen_range(-1.0..=1.0), rng.gen_range(-1.0..=1.0));
        let mut particle = Particle::at_rest(position, rng.gen_range(0.5..=2.0));
        particle.velocity = Vec2::new(rng.gen::<f32>() - 0.5, rng.gen::<f32>() - 0.5) * 2.0;
        particles.push(particle);
    }

    particles
}

/// The particle stage
pub struct ParticleStage {
    /// Decides the initial particles
    config: SimulationConfig,
}

impl ParticleStage {
    /// Instantiate
    #[must_use]
    #[inline]
    pub const fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    /// Number of particles
    #[must_use]
    #[inline]
    pub const fn particle_count(&self) -> u32 {
        self.config.particle_count()
    }
}

impl Stage for ParticleStage {
    const LABEL: &'static str = "particle";

    #[inline]
    fn descriptor(&self) -> Descriptor {
        Descriptor {
            provides: ResourceSet {
                buffers: &[Buffers::PARTICLES],
                ..ResourceSet::EMPTY
            },
            requires: ResourceSet {
                buffers: &[Buffers::MOUSE, Buffers::OBSTACLES],
                bind_groups: &[BindGroups::GLOBAL],
                bind_group_layouts: &[BindGroupLayouts::GLOBAL],
            },
            links: ResourceSet {
                buffers: &[Buffers::FORCES, Buffers::GRID, Buffers::PARTICLE_NEXT],
                ..ResourceSet::EMPTY
            },
        }
    }

    #[inline]
    fn kernel(&self) -> KernelConfig {
        KernelConfig {
            shader: ShaderLibrary::PARTICLE,
            entry_point: "main",
            workgroup_size: tether_gpu_shared::constants::WORKGROUP_SIZE,
            uses_global: true,
            bind_group_layouts: &[LAYOUT],
        }
    }

    #[inline]
    fn instance_count(&self) -> u32 {
        self.particle_count()
    }

    #[inline]
    fn create_owned_resources(&mut self, gpu: &Gpu, registry: &mut Registry) -> Result<()> {
        let particles = seed_particles(&self.config);
        log::debug!("Seeded {} particles", particles.len());
        let buffer = Builder::new(&gpu.device).storage_buffer(Buffers::PARTICLES, &particles);
        registry.register_buffer(Buffers::PARTICLES, buffer);
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
        let forces = registry.buffer(Buffers::FORCES)?;
        let obstacles = registry.buffer(Buffers::OBSTACLES)?;
        let grid = registry.buffer(Buffers::GRID)?;
        let next = registry.buffer(Buffers::PARTICLE_NEXT)?;

        let bind_group = Builder::new(&gpu.device).bind_group(
            Self::LABEL,
            layout,
            &[&*particles, &*forces, &*obstacles, &*grid, &*next],
        );
        Ok(vec![bind_group])
    }
}
