//! Owns every stage and the resources they share, and runs them in order every frame.
//!
//! Particles need the forces made by the springs and the grid built from the particles, while
//! springs and the grid both need the particles. Construction therefore happens in three phases:
//!   1. Every stage is initialized, creating and registering the buffers it owns. Order:
//!      particle, spring, grid, clean grid. The grid's own `requires` need the particles.
//!   2. The clean grid stage is sized to cover both the cells and the particles.
//!   3. Every stage builds its bind groups, by which point all the buffers exist.
//!
//! A frame is three compute passes, see [`FramePass`].

use std::sync::Arc;

use glam::Vec2;
use tether_gpu_shared::{constants::OBSTACLE_COUNT, GridSnapshot, MouseState, Particle, Spring};

use crate::{
    config::SimulationConfig,
    error::Result,
    gpu_manager::Gpu,
    pipeline::{
        buffers::{BindGroupLayouts, BindGroups, Buffers},
        builder::Builder,
        descriptor::{Descriptor, ResourceSet},
        ComputePipeline,
    },
    registry::Registry,
    shader::ShaderLoader,
    stages::{CleanGridStage, GridStage, ParticleStage, SpringStage},
};

/// Resources the engine creates itself, before any stage
pub const GLOBALS: ResourceSet = ResourceSet {
    buffers: &[Buffers::MOUSE, Buffers::OBSTACLES],
    bind_groups: &[BindGroups::GLOBAL],
    bind_group_layouts: &[BindGroupLayouts::GLOBAL],
};

/// One of the compute passes that make up a frame. Passes run in submission order and each sees
/// everything written by the ones before it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum FramePass {
    /// Reset the grid and particle links
    ClearGrid,
    /// Accumulate spring forces and build the grid. Neither writes what the other reads.
    SpringsAndGrid,
    /// Integrate the particles using the forces and the grid
    Particles,
}

impl FramePass {
    /// Every pass of a frame, in order
    pub const ORDER: [Self; 3] = [Self::ClearGrid, Self::SpringsAndGrid, Self::Particles];

    /// Label of the compute pass
    #[must_use]
    #[inline]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ClearGrid => "clear grid",
            Self::SpringsAndGrid => "springs and grid",
            Self::Particles => "particles",
        }
    }
}

/// The whole simulation
pub struct PhysicsEngine {
    /// Device and queue
    gpu: Gpu,
    /// Every shared resource, by name
    registry: Registry,
    /// Integrates particles
    particle: ComputePipeline<ParticleStage>,
    /// Accumulates spring forces
    spring: ComputePipeline<SpringStage>,
    /// Builds the grid
    grid: ComputePipeline<GridStage>,
    /// Clears the grid
    clean_grid: ComputePipeline<CleanGridStage>,
    /// Kept at hand for the renderer and for input
    mouse: Arc<wgpu::Buffer>,
    /// Kept at hand for the renderer
    particles: Arc<wgpu::Buffer>,
    /// Kept at hand for the renderer
    springs: Arc<wgpu::Buffer>,
    /// Kept at hand for the renderer
    obstacles: Arc<wgpu::Buffer>,
}

impl PhysicsEngine {
    /// Create the global resources and every stage, ready to run.
    ///
    /// # Errors
    /// Any failure aborts construction: missing dependencies, shaders that don't compile.
    #[inline]
    pub fn new(gpu: Gpu, config: SimulationConfig, shaders: &dyn ShaderLoader) -> Result<Self> {
        let mut registry = Registry::new();
        Self::create_globals(&gpu, &mut registry, &config)?;

        let mut particle = ComputePipeline::new(ParticleStage::new(config));
        let mut spring = ComputePipeline::new(SpringStage::new(config));
        let mut grid = ComputePipeline::new(GridStage::new(config.particle_count()));
        let mut clean_grid = ComputePipeline::new(CleanGridStage::new());

        log::info!("Initialization phase 1: creating owned resources and compiling kernels");
        particle.initialize(&gpu, &mut registry, shaders)?;
        spring.initialize(&gpu, &mut registry, shaders)?;
        grid.initialize(&gpu, &mut registry, shaders)?;
        clean_grid.initialize(&gpu, &mut registry, shaders)?;

        log::info!("Initialization phase 2: sizing the grid clear");
        let clear_count = particle
            .stage()
            .particle_count()
            .max(grid.stage().grid_cell_count());
        clean_grid.stage_mut().set_instance_count(clear_count);

        log::info!("Initialization phase 3: building bind groups");
        spring.complete_initialization(&gpu, &registry)?;
        particle.complete_initialization(&gpu, &registry)?;
        grid.complete_initialization(&gpu, &registry)?;
        clean_grid.complete_initialization(&gpu, &registry)?;

        registry.log_contents();

        Ok(Self {
            mouse: registry.buffer(Buffers::MOUSE)?,
            particles: registry.buffer(Buffers::PARTICLES)?,
            springs: registry.buffer(Buffers::SPRINGS)?,
            obstacles: registry.buffer(Buffers::OBSTACLES)?,
            gpu,
            registry,
            particle,
            spring,
            grid,
            clean_grid,
        })
    }

    /// The mouse uniform, the obstacles, and the global bind group that exposes the mouse
    fn create_globals(gpu: &Gpu, registry: &mut Registry, config: &SimulationConfig) -> Result<()> {
        let builder = Builder::new(&gpu.device);

        let mouse = builder.uniform_buffer(Buffers::MOUSE, &MouseState::default());
        let obstacles = builder.storage_buffer(Buffers::OBSTACLES, &config.obstacles);
        let layout =
            builder.bind_group_layout(BindGroupLayouts::GLOBAL, &[Builder::uniform_entry(0)]);
        let bind_group = builder.bind_group(BindGroups::GLOBAL, &layout, &[&mouse]);

        registry.register_buffer(Buffers::MOUSE, mouse);
        registry.register_buffer(Buffers::OBSTACLES, obstacles);
        registry.register_bind_group_layout(BindGroupLayouts::GLOBAL, layout);
        registry.register_bind_group(BindGroups::GLOBAL, bind_group);

        Descriptor {
            provides: GLOBALS,
            ..Descriptor::default()
        }
        .validate_provides("engine", registry)
    }

    /// Record a single pass of a frame
    #[inline]
    pub fn encode_pass(&self, encoder: &mut wgpu::CommandEncoder, pass: FramePass) {
        let mut compute = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(pass.label()),
            timestamp_writes: None,
        });
        match pass {
            FramePass::ClearGrid => self.clean_grid.run(&mut compute),
            FramePass::SpringsAndGrid => {
                self.spring.run(&mut compute);
                self.grid.run(&mut compute);
            }
            FramePass::Particles => self.particle.run(&mut compute),
        }
    }

    /// Record a whole frame
    #[inline]
    pub fn encode(&self, encoder: &mut wgpu::CommandEncoder) {
        for pass in FramePass::ORDER {
            self.encode_pass(encoder, pass);
        }
    }

    /// Record and submit a whole frame
    #[inline]
    pub fn run(&self) {
        let mut encoder = self.command_encoder();
        self.encode(&mut encoder);
        self.gpu.queue.submit(Some(encoder.finish()));
    }

    /// Record and submit a single pass
    #[inline]
    pub fn run_pass(&self, pass: FramePass) {
        let mut encoder = self.command_encoder();
        self.encode_pass(&mut encoder, pass);
        self.gpu.queue.submit(Some(encoder.finish()));
    }

    fn command_encoder(&self) -> wgpu::CommandEncoder {
        self.gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame"),
            })
    }

    /// Move the mouse, in world coordinates. Not validated.
    #[inline]
    pub fn update_mouse_position(&self, x: f32, y: f32) {
        self.gpu.queue.write_buffer(
            &self.mouse,
            MouseState::POSITION_OFFSET,
            bytemuck::bytes_of(&Vec2::new(x, y)),
        );
    }

    /// Press or release the mouse
    #[inline]
    pub fn update_mouse_pressed(&self, pressed: bool) {
        self.gpu.queue.write_buffer(
            &self.mouse,
            MouseState::PRESSED_OFFSET,
            bytemuck::bytes_of(&u32::from(pressed)),
        );
    }

    /// Every particle, for rendering
    #[must_use]
    #[inline]
    pub fn particle_buffer(&self) -> &wgpu::Buffer {
        &self.particles
    }

    /// Every spring, for rendering
    #[must_use]
    #[inline]
    pub fn spring_buffer(&self) -> &wgpu::Buffer {
        &self.springs
    }

    /// Every obstacle, for rendering
    #[must_use]
    #[inline]
    pub fn obstacle_buffer(&self) -> &wgpu::Buffer {
        &self.obstacles
    }

    /// Number of particles
    #[must_use]
    #[inline]
    pub const fn particle_count(&self) -> u32 {
        self.particle.stage().particle_count()
    }

    /// Number of springs
    #[must_use]
    #[inline]
    pub const fn spring_count(&self) -> u32 {
        self.spring.stage().spring_count()
    }

    /// Number of obstacles, always 3
    #[must_use]
    #[inline]
    #[expect(clippy::as_conversions, reason = "The obstacle count is tiny")]
    #[expect(clippy::cast_possible_truncation, reason = "The obstacle count is tiny")]
    pub const fn obstacle_count(&self) -> u32 {
        OBSTACLE_COUNT as u32
    }

    /// Number of grid cells
    #[must_use]
    #[inline]
    pub fn grid_cell_count(&self) -> u32 {
        self.grid.stage().grid_cell_count()
    }

    /// Every shared resource, by name
    #[must_use]
    #[inline]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The device the simulation runs on
    #[must_use]
    #[inline]
    pub const fn gpu(&self) -> &Gpu {
        &self.gpu
    }

    /// Copy the particles back from the GPU
    ///
    /// # Errors
    /// If the readback fails
    #[inline]
    pub fn read_particles(&self) -> Result<Vec<Particle>> {
        self.read_truncated(&self.particles, self.particle_count())
    }

    /// Copy the springs back from the GPU
    ///
    /// # Errors
    /// If the readback fails
    #[inline]
    pub fn read_springs(&self) -> Result<Vec<Spring>> {
        self.read_truncated(&self.springs, self.spring_count())
    }

    /// Copy the grid and the particle links back from the GPU
    ///
    /// # Errors
    /// If the readback fails
    #[inline]
    pub fn read_grid(&self) -> Result<GridSnapshot> {
        let heads = self.read_truncated(
            &*self.registry.buffer(Buffers::GRID)?,
            self.grid_cell_count(),
        )?;
        let next = self.read_truncated(
            &*self.registry.buffer(Buffers::PARTICLE_NEXT)?,
            self.particle_count(),
        )?;
        Ok(GridSnapshot { heads, next })
    }

    /// Empty buffers hold a placeholder element, which isn't part of the simulation
    #[expect(clippy::as_conversions, reason = "u32 always fits in usize on our targets")]
    fn read_truncated<T: bytemuck::Pod>(&self, buffer: &wgpu::Buffer, count: u32) -> Result<Vec<T>> {
        let mut values = self.gpu.read_buffer(buffer)?;
        values.truncate(count as usize);
        Ok(values)
    }
}

impl Drop for PhysicsEngine {
    #[inline]
    fn drop(&mut self) {
        log::debug!("Tearing down {} registered resources", self.registry.len());
        self.registry.clear();
    }
}
