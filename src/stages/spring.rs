//! Owns the springs and the force accumulator.
//!
//! Every frame each intact spring pulls its two endpoints together, or pushes them apart, in
//! proportion to its stretch. A spring whose elastic force exceeds its breaking threshold snaps
//! for good after that frame and contributes nothing from then on.

use rand::Rng as _;
use tether_gpu_shared::{
    constants::{BREAKING_FORCE, MIN_STIFFNESS, REST_LENGTH, STIFFNESS_RAMP, WORKGROUP_SIZE},
    ForceAccumulator, Spring,
};

use crate::{
    config::{SimulationConfig, SpringTopology},
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

/// Random stream used to pick the endpoints of random springs
const SEED_STREAM: u64 = 2;

const LAYOUT: &[wgpu::BindGroupLayoutEntry] = &[
    Builder::storage_entry(0, false),
    Builder::storage_entry(1, true),
    Builder::storage_entry(2, false),
];

/// The initial springs. Stiffness ramps up linearly with the spring's index.
#[must_use]
#[inline]
#[expect(clippy::as_conversions, reason = "Spring counts are nowhere near 2^24")]
#[expect(clippy::cast_precision_loss, reason = "Spring counts are nowhere near 2^24")]
pub fn seed_springs(config: &SimulationConfig) -> Vec<Spring> {
    let count = config.spring_count();
    let particle_count = config.particle_count();
    let mut rng = config.rng(SEED_STREAM);

    (0..count)
        .map(|index| {
            let (particle_a, particle_b) = match config.spring_topology {
                SpringTopology::Random { .. } => {
                    let a = rng.gen_range(0..particle_count);
                    // Skip over `a` so the endpoints always differ
                    let b = rng.gen_range(0..particle_count - 1);
                    (a, if b >= a { b + 1 } else { b })
                }
                SpringTopology::Rope => (index, index + 1),
            };
            let stiffness = if count > 1 {
                MIN_STIFFNESS + STIFFNESS_RAMP / (count - 1) as f32 * index as f32
            } else {
                MIN_STIFFNESS
            };
            Spring {
                particle_a,
                particle_b,
                rest_length: REST_LENGTH,
                stiffness,
                is_broken: 0,
                breaking_threshold: BREAKING_FORCE,
                padding: [0; 2],
            }
        })
        .collect()
}

/// The spring stage
pub struct SpringStage {
    /// Decides the initial springs
    config: SimulationConfig,
}

impl SpringStage {
    /// Instantiate
    #[must_use]
    #[inline]
    pub const fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    /// Number of springs
    #[must_use]
    #[inline]
    pub const fn spring_count(&self) -> u32 {
        self.config.spring_count()
    }
}

impl Stage for SpringStage {
    const LABEL: &'static str = "spring";

    #[inline]
    fn descriptor(&self) -> Descriptor {
        Descriptor {
            provides: ResourceSet {
                buffers: &[Buffers::SPRINGS, Buffers::FORCES],
                ..ResourceSet::EMPTY
            },
            requires: ResourceSet::EMPTY,
            links: ResourceSet {
                buffers: &[Buffers::PARTICLES],
                ..ResourceSet::EMPTY
            },
        }
    }

    #[inline]
    fn kernel(&self) -> KernelConfig {
        KernelConfig {
            shader: ShaderLibrary::SPRING,
            entry_point: "main",
            workgroup_size: WORKGROUP_SIZE,
            uses_global: false,
            bind_group_layouts: &[LAYOUT],
        }
    }

    #[inline]
    fn instance_count(&self) -> u32 {
        self.spring_count()
    }

    #[inline]
    #[expect(clippy::as_conversions, reason = "u32 always fits in usize on our targets")]
    fn create_owned_resources(&mut self, gpu: &Gpu, registry: &mut Registry) -> Result<()> {
        let builder = Builder::new(&gpu.device);

        let springs = seed_springs(&self.config);
        log::debug!("Seeded {} springs", springs.len());
        registry.register_buffer(
            Buffers::SPRINGS,
            builder.storage_buffer(Buffers::SPRINGS, &springs),
        );

        // One accumulator per particle, however many particles there are
        let forces = vec![ForceAccumulator::default(); self.config.particle_count() as usize];
        registry.register_buffer(
            Buffers::FORCES,
            builder.storage_buffer(Buffers::FORCES, &forces),
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
        let springs = registry.buffer(Buffers::SPRINGS)?;
        let particles = registry.buffer(Buffers::PARTICLES)?;
        let forces = registry.buffer(Buffers::FORCES)?;

        let bind_group = Builder::new(&gpu.device).bind_group(
            Self::LABEL,
            layout,
            &[&*springs, &*particles, &*forces],
        );
        Ok(vec![bind_group])
    }
}
